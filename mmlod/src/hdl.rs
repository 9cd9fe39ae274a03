//! DefTool HDL manifests.
//!
//! `extractdef` emits one `.hdl` text manifest per DEF next to its frame
//! bitmaps; `extractwebp --hdl-structure` consumes the same layout back
//! into composed animations.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::compose::{
    self, apply_group_crop, frame_duration, group_label, is_fallback_label, most_repeated_frame,
    AnimationSink, ComposeOptions, ComposedFrame, PalettePolicy, ShadowMode,
};
use crate::config::DefConfig;
use crate::def::DefSprite;
use crate::error::{Error, Result};
use crate::pixels::{bmp, PixelBuffer};
use crate::utils::{name_stem, write_atomic};

/// Def types whose sprites never carry an external shadow.
const NO_SHADOW_TYPES: [u32; 4] = [0x40, 0x45, 0x46, 0x47];

/// One group parsed from a manifest.
#[derive(Debug, Clone)]
pub struct HdlGroup {
    pub group_id: u32,
    pub frames: Vec<String>,
    pub shadows: Vec<String>,
}

/// A parsed manifest.
#[derive(Debug, Clone)]
pub struct HdlDocument {
    pub def_type: u32,
    pub groups: Vec<HdlGroup>,
}

/// Parse an HDL manifest.
///
/// # Errors
/// This parser is forgiving like the original tool; it currently only
/// fails on missing mandatory structure (no `Group0=` line at all is
/// still accepted as an empty document).
pub fn parse(content: &str) -> Result<HdlDocument> {
    let mut type_digit = 3u32;
    for line in content.lines() {
        if let Some(v) = line.strip_prefix("Type=") {
            type_digit = v.trim().parse().unwrap_or(3);
        }
    }

    let mut groups = Vec::new();
    let mut index = 0u32;
    loop {
        let key = format!("Group{index}=");
        let Some(line) = content.lines().find(|l| l.starts_with(&key)) else {
            break;
        };
        let frames = split_list(&line[key.len()..]);
        let shadow_key = format!("Shadow{index}=");
        let shadows = content
            .lines()
            .find(|l| l.starts_with(&shadow_key))
            .map(|l| split_list(&l[shadow_key.len()..]))
            .unwrap_or_default();
        groups.push(HdlGroup {
            group_id: index,
            frames,
            shadows,
        });
        index += 1;
    }
    Ok(HdlDocument {
        def_type: 0x40 + type_digit,
        groups,
    })
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split('|')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Emit per-frame bitmaps plus one HDL manifest for a DEF, the DefTool
/// exchange layout. Returns per-frame error messages; a bad frame skips
/// only itself.
///
/// # Errors
/// Fails on filesystem errors and a structurally unusable DEF.
pub fn write_deftool_list(
    sprite: &DefSprite,
    hdl_path: &Path,
    external_shadow: bool,
    in_24_bits: bool,
) -> Result<Vec<String>> {
    let dir = hdl_path.parent().unwrap_or_else(|| Path::new("."));
    let def_type = sprite.header.def_type;
    let shadow_applies = external_shadow && !NO_SHADOW_TYPES.contains(&def_type);

    let mut shadow_dir = String::new();
    if shadow_applies {
        shadow_dir = "Shadow".to_string();
        let mut n = 0;
        while dir.join(&shadow_dir).exists() {
            shadow_dir = format!("Shadow_{n}");
            n += 1;
        }
        fs::create_dir_all(dir.join(&shadow_dir))?;
    }

    let mut text = String::new();
    text.push_str("[Data]\n");
    let _ = writeln!(text, "Type={}", def_type.saturating_sub(0x40));
    let _ = writeln!(text, "Shadow Type={}", if shadow_applies { 2 } else { 0 });

    let mut max_group = 0;
    for group in &sprite.groups {
        max_group = max_group.max(group.group_index);
        let files: String = group
            .frame_names
            .iter()
            .map(|n| format!("{n}.bmp|"))
            .collect();
        let _ = writeln!(text, "Group{}={files}", group.group_index);
        if shadow_applies {
            let shadows: String = group
                .frame_names
                .iter()
                .map(|n| format!("{shadow_dir}\\{n}.bmp|"))
                .collect();
            let _ = writeln!(text, "Shadow{}={shadows}", group.group_index);
        }
    }
    let _ = writeln!(text, "Groups Number={}", max_group + 1);
    text.push_str("Generate Selection=false\n");

    let colors: String = sprite.palette[..8]
        .iter()
        .map(|c| format!("${:02X}{:02X}{:02X}|", c[0], c[1], c[2]))
        .collect();
    let _ = writeln!(text, "ColorsBox.Colors={colors}");
    let _ = writeln!(text, "ShadowColorsBox.Colors={colors}");
    if def_type == 0x47 {
        let player: String = sprite.palette[224..256]
            .iter()
            .map(|c| format!("${:02X}{:02X}{:02X}|", c[0], c[1], c[2]))
            .collect();
        let _ = writeln!(text, "ColorsBox.PlayerColors={player}");
    }

    let mut checks = [false; 9];
    checks[0] = true;
    checks[5] = matches!(def_type, 0x43 | 0x44);
    if !shadow_applies && def_type == 0x42 {
        for check in &mut checks[1..8] {
            *check = true;
        }
    }
    let checks: String = checks
        .iter()
        .map(|&c| if c { "1|" } else { "0|" })
        .collect();
    let _ = writeln!(text, "ColorsBox.ColorChecks={checks}");
    let _ = writeln!(text, "ShadowColorsBox.ColorChecks={}", "1|".repeat(8));

    write_atomic(hdl_path, text.as_bytes())?;

    // Frame bitmaps: the main plane, plus the shadow plane in its own
    // directory when requested.
    let canvas_w = sprite.header.width as usize;
    let canvas_h = sprite.header.height as usize;
    let mut errors = Vec::new();
    for (g, f) in sprite.frame_indices() {
        let name = match sprite.frame_name(g, f) {
            Ok(n) => n.to_string(),
            Err(e) => {
                errors.push(e.to_string());
                continue;
            }
        };
        match sprite.frame_planes(g, f) {
            Ok(planes) => {
                let frame = &planes.frame;
                let main = paste_canvas(canvas_w, canvas_h, frame, &frame.pixels, 0);
                if let Err(e) = write_frame_bmp(
                    &dir.join(format!("{name}.bmp")),
                    canvas_w,
                    canvas_h,
                    &main,
                    sprite,
                    in_24_bits,
                ) {
                    errors.push(format!("{name}: {e}"));
                }
                if shadow_applies {
                    let shadow = paste_canvas(canvas_w, canvas_h, frame, &planes.shadow, 0);
                    if let Err(e) = write_frame_bmp(
                        &dir.join(&shadow_dir).join(format!("{name}.bmp")),
                        canvas_w,
                        canvas_h,
                        &shadow,
                        sprite,
                        in_24_bits,
                    ) {
                        errors.push(format!("{shadow_dir}/{name}: {e}"));
                    }
                }
            }
            Err(e) => errors.push(format!("{name}: {e}")),
        }
    }
    tracing::info!(hdl = %hdl_path.display(), frames = sprite.frames_total(), errors = errors.len(), "DefTool list written");
    Ok(errors)
}

fn paste_canvas(
    canvas_w: usize,
    canvas_h: usize,
    frame: &crate::def::DefFrame,
    plane: &[u8],
    background: u8,
) -> Vec<u8> {
    let mut canvas = vec![background; canvas_w * canvas_h];
    let w = frame.width as usize;
    for y in 0..frame.height as usize {
        let cy = frame.top as usize + y;
        if cy >= canvas_h {
            break;
        }
        for x in 0..w {
            let cx = frame.left as usize + x;
            if cx >= canvas_w {
                break;
            }
            canvas[cy * canvas_w + cx] = plane[y * w + x];
        }
    }
    canvas
}

fn write_frame_bmp(
    path: &Path,
    width: usize,
    height: usize,
    indexed: &[u8],
    sprite: &DefSprite,
    in_24_bits: bool,
) -> Result<()> {
    let bytes = if in_24_bits {
        let mut rgb = Vec::with_capacity(indexed.len() * 3);
        for &i in indexed {
            rgb.extend_from_slice(&sprite.palette[i as usize]);
        }
        bmp::encode_rgb(width as u32, height as u32, &rgb)
    } else {
        bmp::encode_indexed(width as u32, height as u32, indexed, &sprite.palette)
    };
    write_atomic(path, &bytes)
}

/// Compose animations from an HDL manifest and its bitmaps, mirroring
/// the DEF pipeline but sourcing frames from disk.
///
/// # Errors
/// Fails on unreadable manifests; individual bad frames only skip
/// themselves.
pub fn compose_from_hdl(
    hdl_path: &Path,
    config: &DefConfig,
    options: &ComposeOptions,
    sink: &mut dyn AnimationSink,
) -> Result<()> {
    let content = fs::read_to_string(hdl_path)?;
    let doc = parse(&content)?;
    let dir = hdl_path.parent().unwrap_or_else(|| Path::new("."));
    let def_name = hdl_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let def_type = doc.def_type;
    let object_name = config.object_name(&def_name, options.hota_names);
    let prefix = object_name
        .clone()
        .unwrap_or_else(|| def_name.clone());
    let creature_name = object_name.unwrap_or_default();
    let populated = doc.groups.iter().filter(|g| !g.frames.is_empty()).count();
    let is_map_creature = config.is_adv_map_creature(&def_name);

    for group in &doc.groups {
        if group.frames.is_empty() {
            continue;
        }
        let mut frames = Vec::with_capacity(group.frames.len());
        for (i, frame_rel) in group.frames.iter().enumerate() {
            let shadow_rel = if options.shadow == ShadowMode::ShadowInMain {
                None
            } else {
                group.shadows.get(i)
            };
            match compose_hdl_frame(dir, frame_rel, shadow_rel, &def_name, config, options) {
                Ok(frame) => frames.push(frame),
                Err(e) => {
                    tracing::warn!(hdl = %hdl_path.display(), frame = frame_rel, error = %e, "skipping frame");
                }
            }
        }
        if frames.is_empty() {
            continue;
        }

        apply_group_crop(&mut frames, def_type, &creature_name, config, options);

        let held = Some(most_repeated_frame(&group.frames));
        let count = frames.len();
        let label = group_label(config, def_type, group.group_id, &creature_name);
        for (i, frame) in frames.iter_mut().enumerate() {
            frame.duration_ms = frame_duration(
                &config.durations,
                def_type,
                group.group_id,
                i,
                count,
                held,
                is_map_creature,
            );
            frame.group_label = label.clone();
        }

        let file_name = if populated == 1 {
            prefix.clone()
        } else if is_fallback_label(&label) {
            format!("{prefix}_{}", group.group_id)
        } else {
            format!("{prefix} {label}")
        };
        sink.write_animation(&file_name, &frames)?;
    }
    Ok(())
}

fn compose_hdl_frame(
    dir: &Path,
    frame_rel: &str,
    shadow_rel: Option<&String>,
    def_name: &str,
    config: &DefConfig,
    options: &ComposeOptions,
) -> Result<ComposedFrame> {
    let main = load_indexed(dir, frame_rel)?;
    let policy = PalettePolicy {
        palette: &main.palette,
        keep_selection: config.keeps_selection_palette(def_name),
        hota_p2p3: config.uses_hota_shadow_p2p3(def_name, options.hota_palette),
        remap_255_to_5: config.needs_palette_255_fix(def_name, options.hota_palette),
    };

    let mut rgba = vec![0u8; main.pixels.len() * 4];
    if options.shadow == ShadowMode::ShadowInMain {
        for (px, out) in main.pixels.iter().zip(rgba.chunks_exact_mut(4)) {
            out.copy_from_slice(&policy.shadow_in_main_rgba(*px));
        }
    } else {
        for (px, out) in main.pixels.iter().zip(rgba.chunks_exact_mut(4)) {
            out.copy_from_slice(&policy.main_rgba(*px));
        }
        if let Some(rel) = shadow_rel {
            let shadow = load_indexed(dir, rel)?;
            if shadow.pixels.len() == main.pixels.len() {
                let mut shadow_rgba = vec![0u8; rgba.len()];
                for (px, out) in shadow.pixels.iter().zip(shadow_rgba.chunks_exact_mut(4)) {
                    out.copy_from_slice(&policy.shadow_plane_rgba(*px));
                }
                compose::composite_over(&mut rgba, &shadow_rgba);
            }
        }
    }

    Ok(ComposedFrame {
        rgba,
        width: main.width,
        height: main.height,
        origin: (0, 0),
        duration_ms: 0,
        group_label: String::new(),
    })
}

struct IndexedBmp {
    width: u32,
    height: u32,
    palette: crate::pixels::Palette,
    pixels: Vec<u8>,
}

fn load_indexed(dir: &Path, rel: &str) -> Result<IndexedBmp> {
    let rel = rel.replace('\\', "/");
    let bytes = fs::read(dir.join(&rel))?;
    let image = bmp::decode(&bytes)?;
    match image.buffer {
        PixelBuffer::Indexed { palette, pixels } => Ok(IndexedBmp {
            width: image.width,
            height: image.height,
            palette: *palette,
            pixels,
        }),
        _ => Err(Error::PaletteMissing(format!(
            "{} is not a palettised bitmap",
            name_stem(&rel)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_round_trip_fields() {
        let content = "[Data]\nType=2\nShadow Type=2\n\
                       Group0=a.bmp|b.bmp|\nShadow0=Shadow\\a.bmp|Shadow\\b.bmp|\n\
                       Group1=c.bmp|\nGroups Number=2\n";
        let doc = parse(content).unwrap();
        assert_eq!(doc.def_type, 0x42);
        assert_eq!(doc.groups.len(), 2);
        assert_eq!(doc.groups[0].frames, vec!["a.bmp", "b.bmp"]);
        assert_eq!(doc.groups[0].shadows, vec!["Shadow\\a.bmp", "Shadow\\b.bmp"]);
        assert_eq!(doc.groups[1].frames, vec!["c.bmp"]);
        assert!(doc.groups[1].shadows.is_empty());
    }

    #[test]
    fn missing_type_defaults_to_map_creature() {
        let doc = parse("[Data]\nGroup0=x.bmp|\n").unwrap();
        assert_eq!(doc.def_type, 0x43);
    }
}
