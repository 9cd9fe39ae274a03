//! Animated-image sink backed by the APNG encoder.
//!
//! The core treats the animated-image encoder as a pluggable sink; this
//! implementation writes one looping APNG per animation with per-frame
//! delays and full 8-bit alpha.

use std::io;
use std::path::PathBuf;

use mmlod::compose::{AnimationSink, ComposedFrame};
use mmlod::utils::write_atomic;
use mmlod::{Error, Result};

pub struct ApngSink {
    out_dir: PathBuf,
}

impl ApngSink {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }
}

impl AnimationSink for ApngSink {
    fn write_animation(&mut self, name: &str, frames: &[ComposedFrame]) -> Result<()> {
        let Some(first) = frames.first() else {
            return Ok(());
        };

        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, first.width, first.height);
            encoder.set_color(png::ColorType::Rgba);
            encoder.set_depth(png::BitDepth::Eight);
            if frames.len() > 1 {
                encoder
                    .set_animated(frames.len() as u32, 0)
                    .map_err(png_err)?;
            }
            let mut writer = encoder.write_header().map_err(png_err)?;
            for frame in frames {
                if frames.len() > 1 {
                    writer
                        .set_frame_delay(clamp_delay(frame.duration_ms), 1000)
                        .map_err(png_err)?;
                }
                writer.write_image_data(&frame.rgba).map_err(png_err)?;
            }
            writer.finish().map_err(png_err)?;
        }

        let path = self.out_dir.join(format!("{}.png", sanitize(name)));
        write_atomic(&path, &buf)?;
        println!(
            "Created animation: {} ({} frames)",
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            frames.len()
        );
        Ok(())
    }
}

fn png_err(e: png::EncodingError) -> Error {
    Error::Io(io::Error::other(e))
}

fn clamp_delay(ms: u32) -> u16 {
    ms.min(u32::from(u16::MAX)) as u16
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if matches!(c, '/' | '\\' | ':') {
                '_'
            } else {
                c
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_apng_per_animation() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ApngSink::new(dir.path());
        let frame = |alpha: u8| ComposedFrame {
            rgba: vec![10, 20, 30, alpha, 40, 50, 60, alpha],
            width: 2,
            height: 1,
            origin: (0, 0),
            duration_ms: 125,
            group_label: "Standing".to_string(),
        };
        sink.write_animation("Peasant Standing", &[frame(255), frame(127)])
            .unwrap();
        let out = dir.path().join("Peasant Standing.png");
        let bytes = std::fs::read(out).unwrap();
        assert_eq!(&bytes[1..4], b"PNG");
        // acTL marks an animated PNG.
        assert!(bytes.windows(4).any(|w| w == b"acTL"));
    }

    #[test]
    fn single_frame_is_a_plain_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut sink = ApngSink::new(dir.path());
        let frame = ComposedFrame {
            rgba: vec![0, 0, 0, 255],
            width: 1,
            height: 1,
            origin: (0, 0),
            duration_ms: 100,
            group_label: String::new(),
        };
        sink.write_animation("single", &[frame]).unwrap();
        let bytes = std::fs::read(dir.path().join("single.png")).unwrap();
        assert!(!bytes.windows(4).any(|w| w == b"acTL"));
    }
}
