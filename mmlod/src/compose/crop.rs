//! Frame cropping: predefined rectangles, per-group tight bounds, or
//! none.

use std::collections::BTreeMap;

use super::ComposedFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropRect {
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl CropRect {
    #[must_use]
    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    /// Look up the def type in the crop-bounds map; fall back to the
    /// per-group tight box when the type has no entry.
    #[default]
    Predefined,
    /// Tight bounding box of non-transparent pixels per group.
    Individual,
    /// Pass frames through on their full canvas.
    None,
}

/// The crop-bounds key digit for a def type.
#[must_use]
pub fn type_digit(def_type: u32) -> String {
    if (0x40..=0x49).contains(&def_type) {
        (def_type - 0x40).to_string()
    } else {
        "unknown".to_string()
    }
}

/// The crop-bounds lookup key, with the flying/water overrides for
/// def type 4 objects whose display name carries the vehicle token.
#[must_use]
pub fn crop_key(def_type: u32, object_name: &str) -> String {
    let digit = type_digit(def_type);
    if digit == "4" {
        if object_name.contains("Airship") {
            return "4Airship".to_string();
        }
        if object_name.contains("Boat") {
            return "4Boat".to_string();
        }
    }
    digit
}

/// A configured rectangle clamped to the canvas, `None` when degenerate.
#[must_use]
pub fn configured_rect(
    bounds: &BTreeMap<String, [i32; 4]>,
    key: &str,
    canvas_width: u32,
    canvas_height: u32,
) -> Option<CropRect> {
    let &[left, top, right, bottom] = bounds.get(key)?;
    let rect = CropRect {
        left: left.max(0) as u32,
        top: top.max(0) as u32,
        right: (right.max(0) as u32).min(canvas_width),
        bottom: (bottom.max(0) as u32).min(canvas_height),
    };
    (rect.width() > 0 && rect.height() > 0).then_some(rect)
}

/// Union of the tight non-transparent bounding boxes of all frames.
#[must_use]
pub fn union_opaque_rect(frames: &[ComposedFrame]) -> Option<CropRect> {
    let mut rect: Option<CropRect> = None;
    for frame in frames {
        let w = frame.width as usize;
        for y in 0..frame.height as usize {
            for x in 0..w {
                if frame.rgba[(y * w + x) * 4 + 3] == 0 {
                    continue;
                }
                let (x, y) = (x as u32, y as u32);
                rect = Some(match rect {
                    None => CropRect {
                        left: x,
                        top: y,
                        right: x + 1,
                        bottom: y + 1,
                    },
                    Some(r) => CropRect {
                        left: r.left.min(x),
                        top: r.top.min(y),
                        right: r.right.max(x + 1),
                        bottom: r.bottom.max(y + 1),
                    },
                });
            }
        }
    }
    rect
}

/// Cut every frame down to `rect`. Frame origins are placement metadata
/// and stay untouched.
pub fn apply(frames: &mut [ComposedFrame], rect: CropRect) {
    for frame in frames {
        let src_w = frame.width as usize;
        let w = rect.width() as usize;
        let h = rect.height() as usize;
        let mut out = vec![0u8; w * h * 4];
        for y in 0..h {
            let src_y = rect.top as usize + y;
            if src_y >= frame.height as usize {
                break;
            }
            let src_at = (src_y * src_w + rect.left as usize) * 4;
            let take = w.min(src_w.saturating_sub(rect.left as usize));
            out[y * w * 4..y * w * 4 + take * 4]
                .copy_from_slice(&frame.rgba[src_at..src_at + take * 4]);
        }
        frame.rgba = out;
        frame.width = rect.width();
        frame.height = rect.height();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(width: u32, height: u32, opaque: &[(u32, u32)]) -> ComposedFrame {
        let mut rgba = vec![0u8; (width * height * 4) as usize];
        for &(x, y) in opaque {
            rgba[((y * width + x) * 4 + 3) as usize] = 255;
        }
        ComposedFrame {
            rgba,
            width,
            height,
            origin: (0, 0),
            duration_ms: 0,
            group_label: String::new(),
        }
    }

    #[test]
    fn union_box_covers_all_frames() {
        let frames = vec![frame(8, 8, &[(2, 3)]), frame(8, 8, &[(5, 1)])];
        let rect = union_opaque_rect(&frames).unwrap();
        assert_eq!(
            rect,
            CropRect {
                left: 2,
                top: 1,
                right: 6,
                bottom: 4
            }
        );
    }

    #[test]
    fn fully_transparent_group_has_no_box() {
        assert!(union_opaque_rect(&[frame(4, 4, &[])]).is_none());
    }

    #[test]
    fn airship_override_applies_to_type_4() {
        assert_eq!(crop_key(0x44, "Airship (HotA)"), "4Airship");
        assert_eq!(crop_key(0x44, "Boat"), "4Boat");
        assert_eq!(crop_key(0x44, "Windmill"), "4");
        assert_eq!(crop_key(0x42, "Airship"), "2");
        assert_eq!(crop_key(0x20, "x"), "unknown");
    }

    #[test]
    fn apply_cuts_and_keeps_origin() {
        let mut frames = vec![frame(8, 8, &[(2, 3)])];
        frames[0].origin = (7, 9);
        apply(
            &mut frames,
            CropRect {
                left: 2,
                top: 3,
                right: 4,
                bottom: 5,
            },
        );
        assert_eq!((frames[0].width, frames[0].height), (2, 2));
        assert_eq!(frames[0].rgba.len(), 16);
        assert_eq!(frames[0].rgba[3], 255);
        assert_eq!(frames[0].origin, (7, 9));
    }
}
