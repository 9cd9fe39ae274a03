//! Frame composition.
//!
//! Turns decoded palettised frames into RGBA under the shadow and
//! transparency palette policy, applies the configured cropping, labels
//! each group, computes per-frame durations, and hands finished
//! animations to an [`AnimationSink`]. The animated-image encoder itself
//! lives outside the core.

mod crop;
mod naming;
mod policy;
mod timing;

pub use crop::{crop_key, type_digit, CropMode, CropRect};
pub use naming::{group_label, is_fallback_label};
pub use policy::{PalettePolicy, SHADOW_BODY, SHADOW_EDGE, TRANSPARENT};
pub use timing::{frame_duration, most_repeated_frame};

use std::collections::BTreeSet;

use crate::config::DefConfig;
use crate::def::{DefFrame, DefSprite};
use crate::error::Result;

/// One RGBA frame ready for an animation sink.
#[derive(Debug, Clone)]
pub struct ComposedFrame {
    /// `width * height` RGBA samples, row-major.
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Placement of the decoded frame rectangle on the full canvas.
    pub origin: (i32, i32),
    pub duration_ms: u32,
    pub group_label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowMode {
    /// Composite the decoded shadow plane under each main frame.
    #[default]
    SeparateShadow,
    /// The main frame carries its own shadow indices.
    ShadowInMain,
}

/// Composition options, wired from the driver's flags.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    pub shadow: ShadowMode,
    pub crop: CropMode,
    /// Def-type digits exempt from cropping (the `--no-crop 2,4` form).
    pub no_crop_types: BTreeSet<String>,
    /// HotA palette overrides are active for these assets.
    pub hota_palette: bool,
    /// Prefer HotA display names.
    pub hota_names: bool,
}

/// Receives finished animations.
pub trait AnimationSink {
    /// `name` is the output stem (no extension). Frames share dimensions
    /// and carry their own durations.
    fn write_animation(&mut self, name: &str, frames: &[ComposedFrame]) -> Result<()>;
}

/// Compose every populated group of a DEF and emit them in group order.
///
/// # Errors
/// Propagates frame decode failures and sink errors.
pub fn compose_def(
    sprite: &DefSprite,
    def_name: &str,
    config: &DefConfig,
    options: &ComposeOptions,
    sink: &mut dyn AnimationSink,
) -> Result<()> {
    let def_type = sprite.header.def_type;
    let policy = PalettePolicy {
        palette: &sprite.palette,
        keep_selection: config.keeps_selection_palette(def_name),
        hota_p2p3: config.uses_hota_shadow_p2p3(def_name, options.hota_palette),
        remap_255_to_5: config.needs_palette_255_fix(def_name, options.hota_palette),
    };
    let object_name = config.object_name(def_name, options.hota_names);
    let prefix = object_name
        .clone()
        .unwrap_or_else(|| def_name.to_string());
    let creature_name = object_name.unwrap_or_default();
    let single_group = sprite.groups.len() == 1;
    let is_map_creature = config.is_adv_map_creature(def_name);

    for (group_pos, group) in sprite.groups.iter().enumerate() {
        if group.frame_count == 0 {
            continue;
        }
        let mut frames = Vec::with_capacity(group.frame_count as usize);
        for f in 0..group.frame_count as usize {
            frames.push(compose_frame(
                sprite,
                group_pos,
                f,
                &policy,
                options.shadow,
            )?);
        }

        apply_group_crop(&mut frames, def_type, &creature_name, config, options);

        let held = Some(most_repeated_frame(&group.frame_names));
        let count = frames.len();
        let label = group_label(config, def_type, group.group_index, &creature_name);
        for (i, frame) in frames.iter_mut().enumerate() {
            frame.duration_ms = frame_duration(
                &config.durations,
                def_type,
                group.group_index,
                i,
                count,
                held,
                is_map_creature,
            );
            frame.group_label = label.clone();
        }

        let file_name = if single_group {
            prefix.clone()
        } else if is_fallback_label(&label) {
            format!("{prefix}_{}", group.group_index)
        } else {
            format!("{prefix} {label}")
        };
        tracing::debug!(def = def_name, group = group.group_index, frames = count, "composed group");
        sink.write_animation(&file_name, &frames)?;
    }
    Ok(())
}

/// Apply the configured crop uniformly to one group's frames.
pub fn apply_group_crop(
    frames: &mut [ComposedFrame],
    def_type: u32,
    object_name: &str,
    config: &DefConfig,
    options: &ComposeOptions,
) {
    if frames.is_empty()
        || options.crop == CropMode::None
        || options.no_crop_types.contains(&type_digit(def_type))
    {
        return;
    }
    let rect = match options.crop {
        CropMode::Individual => crop::union_opaque_rect(frames),
        _ => {
            let key = crop_key(def_type, object_name);
            crop::configured_rect(
                &config.crop_bounds,
                &key,
                frames[0].width,
                frames[0].height,
            )
            .or_else(|| crop::union_opaque_rect(frames))
        }
    };
    if let Some(rect) = rect {
        crop::apply(frames, rect);
    }
}

/// One frame at full canvas size under the active shadow mode.
fn compose_frame(
    sprite: &DefSprite,
    group: usize,
    frame: usize,
    policy: &PalettePolicy<'_>,
    shadow: ShadowMode,
) -> Result<ComposedFrame> {
    match shadow {
        ShadowMode::ShadowInMain => {
            let decoded = sprite.frame(group, frame)?;
            Ok(canvas_frame(&decoded, |i| policy.shadow_in_main_rgba(i)))
        }
        ShadowMode::SeparateShadow => {
            let planes = sprite.frame_planes(group, frame)?;
            let mut main = canvas_frame(&planes.frame, |i| policy.main_rgba(i));
            let shadow_rgba =
                plane_canvas(&planes.frame, &planes.shadow, |i| policy.shadow_plane_rgba(i));
            composite_over(&mut main.rgba, &shadow_rgba);
            Ok(main)
        }
    }
}

fn canvas_frame(frame: &DefFrame, map: impl Fn(u8) -> [u8; 4]) -> ComposedFrame {
    ComposedFrame {
        rgba: plane_canvas(frame, &frame.pixels, map),
        width: frame.full_width,
        height: frame.full_height,
        origin: (frame.left, frame.top),
        duration_ms: 0,
        group_label: String::new(),
    }
}

/// Paint one indexed plane onto a transparent full canvas.
fn plane_canvas(frame: &DefFrame, plane: &[u8], map: impl Fn(u8) -> [u8; 4]) -> Vec<u8> {
    let fw = frame.full_width as usize;
    let fh = frame.full_height as usize;
    let w = frame.width as usize;
    let mut rgba = vec![0u8; fw * fh * 4];
    for y in 0..frame.height as usize {
        for x in 0..w {
            let color = map(plane[y * w + x]);
            let at = ((frame.top as usize + y) * fw + frame.left as usize + x) * 4;
            rgba[at..at + 4].copy_from_slice(&color);
        }
    }
    rgba
}

/// Standard "over" compositing of `top` onto `bottom`, in place.
pub(crate) fn composite_over(top: &mut [u8], bottom: &[u8]) {
    for (t, b) in top.chunks_exact_mut(4).zip(bottom.chunks_exact(4)) {
        let ta = u32::from(t[3]);
        let ba = u32::from(b[3]);
        if ta == 255 || ba == 0 {
            continue;
        }
        if ta == 0 {
            t.copy_from_slice(b);
            continue;
        }
        let blended = ta * 255 + ba * (255 - ta);
        for c in 0..3 {
            let tc = u32::from(t[c]) * ta * 255;
            let bc = u32::from(b[c]) * ba * (255 - ta);
            t[c] = ((tc + bc) / blended.max(1)) as u8;
        }
        t[3] = (blended / 255) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::def::{DefBuilder, DefFrame};
    use crate::pixels::Palette;

    struct CollectSink {
        animations: Vec<(String, Vec<ComposedFrame>)>,
    }

    impl AnimationSink for CollectSink {
        fn write_animation(&mut self, name: &str, frames: &[ComposedFrame]) -> Result<()> {
            self.animations.push((name.to_string(), frames.to_vec()));
            Ok(())
        }
    }

    fn palette() -> Palette {
        let mut p = [[0u8; 3]; 256];
        p[5] = [0, 200, 0];
        p[99] = [200, 0, 0];
        p
    }

    fn sprite_with_row(def_type: u32, pixels: Vec<u8>) -> DefSprite {
        let w = pixels.len() as u32;
        let mut builder = DefBuilder::new(def_type, w, 1, palette());
        let frame = DefFrame {
            size_on_disk: 0,
            encoding: 2,
            full_width: w,
            full_height: 1,
            width: w,
            height: 1,
            left: 0,
            top: 0,
            pixels,
        };
        let idx = builder.add_frame("frm00", frame, 2);
        builder.add_to_group(0, idx);
        DefSprite::parse(builder.build().unwrap()).unwrap()
    }

    use crate::def::DefSprite;

    fn pixel(frame: &ComposedFrame, x: usize) -> [u8; 4] {
        let mut px = [0u8; 4];
        px.copy_from_slice(&frame.rgba[x * 4..x * 4 + 4]);
        px
    }

    fn compose_single(
        sprite: &DefSprite,
        def_name: &str,
        config: &DefConfig,
        options: &ComposeOptions,
    ) -> Vec<ComposedFrame> {
        let mut sink = CollectSink {
            animations: Vec::new(),
        };
        compose_def(sprite, def_name, config, options, &mut sink).unwrap();
        assert_eq!(sink.animations.len(), 1);
        sink.animations.remove(0).1
    }

    #[test]
    fn default_mode_hides_background_and_selection() {
        let sprite = sprite_with_row(0x44, vec![0, 99, 5]);
        let config = DefConfig::default();
        let options = ComposeOptions {
            crop: CropMode::None,
            ..ComposeOptions::default()
        };
        let frames = compose_single(&sprite, "avtest0", &config, &options);
        assert_eq!(pixel(&frames[0], 0), [0, 0, 0, 0]);
        assert_eq!(pixel(&frames[0], 1), [200, 0, 0, 255]);
        assert_eq!(pixel(&frames[0], 2), [0, 0, 0, 0]);
    }

    #[test]
    fn keep_selection_set_restores_index_5() {
        let sprite = sprite_with_row(0x44, vec![0, 99, 5]);
        let mut config = DefConfig::default();
        config.keep_selection_palette.insert("avtest0".to_string());
        let options = ComposeOptions {
            crop: CropMode::None,
            ..ComposeOptions::default()
        };
        let frames = compose_single(&sprite, "avtest0", &config, &options);
        assert_eq!(pixel(&frames[0], 2), [0, 200, 0, 255]);
    }

    #[test]
    fn hota_p2p3_applies_without_shadow_in_main() {
        let sprite = sprite_with_row(0x44, vec![2, 3]);
        let mut config = DefConfig::default();
        config.hota_shadow_p2p3.insert("avtest0".to_string());
        let options = ComposeOptions {
            crop: CropMode::None,
            hota_palette: true,
            ..ComposeOptions::default()
        };
        let frames = compose_single(&sprite, "avtest0", &config, &options);
        assert_eq!(pixel(&frames[0], 0), [0, 0, 0, 127]);
        assert_eq!(pixel(&frames[0], 1), [0, 0, 0, 191]);
        // The set only bites while HotA palette handling is on.
        let plain = ComposeOptions {
            crop: CropMode::None,
            ..ComposeOptions::default()
        };
        let frames = compose_single(&sprite, "avtest0", &config, &plain);
        assert_eq!(pixel(&frames[0], 0), [0, 0, 0, 0]);
    }

    #[test]
    fn shadow_in_main_column() {
        let sprite = sprite_with_row(0x44, vec![1, 4, 99]);
        let config = DefConfig::default();
        let options = ComposeOptions {
            shadow: ShadowMode::ShadowInMain,
            crop: CropMode::None,
            ..ComposeOptions::default()
        };
        let frames = compose_single(&sprite, "avtest0", &config, &options);
        assert_eq!(pixel(&frames[0], 0), [0, 0, 0, 127]);
        assert_eq!(pixel(&frames[0], 1), [0, 0, 0, 191]);
        assert_eq!(pixel(&frames[0], 2), [200, 0, 0, 255]);
    }

    #[test]
    fn no_crop_preserves_canvas_and_origin() {
        let mut builder = DefBuilder::new(0x44, 8, 4, palette());
        let frame = DefFrame {
            size_on_disk: 0,
            encoding: 2,
            full_width: 8,
            full_height: 4,
            width: 2,
            height: 1,
            left: 3,
            top: 2,
            pixels: vec![99, 99],
        };
        let idx = builder.add_frame("frm00", frame, 2);
        builder.add_to_group(0, idx);
        let sprite = DefSprite::parse(builder.build().unwrap()).unwrap();

        let config = DefConfig::default();
        let options = ComposeOptions {
            crop: CropMode::None,
            ..ComposeOptions::default()
        };
        let frames = compose_single(&sprite, "avtest0", &config, &options);
        assert_eq!((frames[0].width, frames[0].height), (8, 4));
        assert_eq!(frames[0].origin, (3, 2));
        // The opaque pixels landed at the frame's canvas position.
        assert_eq!(pixel(&frames[0], 2 * 8 + 3), [200, 0, 0, 255]);

        // Individual crop tightens to the opaque box instead.
        let options = ComposeOptions {
            crop: CropMode::Individual,
            ..ComposeOptions::default()
        };
        let frames = compose_single(&sprite, "avtest0", &config, &options);
        assert_eq!((frames[0].width, frames[0].height), (2, 1));
        assert_eq!(frames[0].origin, (3, 2));
    }

    #[test]
    fn composition_covers_every_sample() {
        let sprite = sprite_with_row(0x44, vec![0, 1, 2, 3, 4, 5, 6, 7, 200]);
        let config = DefConfig::default();
        for shadow in [ShadowMode::SeparateShadow, ShadowMode::ShadowInMain] {
            let options = ComposeOptions {
                shadow,
                crop: CropMode::None,
                ..ComposeOptions::default()
            };
            let frames = compose_single(&sprite, "avtest0", &config, &options);
            assert_eq!(frames[0].rgba.len(), 9 * 4);
        }
    }
}
