//! Minimal pixel sources.
//!
//! Enough decoding surface to recover a 256-colour palette plus an 8-bit
//! indexed buffer, or a truecolour buffer: the Heroes-internal and
//! standard PCX formats, uncompressed BMP, and the MM bitmap/sprite
//! payloads.

pub mod bmp;
pub mod mm;
pub mod pcx;

/// 256-entry RGB palette.
pub type Palette = [[u8; 3]; 256];

#[derive(Debug, Clone)]
pub enum PixelBuffer {
    /// 8-bit palettised pixels, row-major.
    Indexed {
        palette: Box<Palette>,
        pixels: Vec<u8>,
    },
    /// 24-bit RGB, row-major.
    Rgb(Vec<u8>),
    /// 32-bit RGBA, row-major.
    Rgba(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct PixelImage {
    pub width: u32,
    pub height: u32,
    pub buffer: PixelBuffer,
}

impl PixelImage {
    /// Serialise as a BMP of the buffer's natural depth.
    #[must_use]
    pub fn to_bmp(&self) -> Vec<u8> {
        match &self.buffer {
            PixelBuffer::Indexed { palette, pixels } => {
                bmp::encode_indexed(self.width, self.height, pixels, palette)
            }
            PixelBuffer::Rgb(rgb) => bmp::encode_rgb(self.width, self.height, rgb),
            PixelBuffer::Rgba(rgba) => bmp::encode_rgba(self.width, self.height, rgba),
        }
    }
}

/// Split a 768-byte block into palette triples.
pub(crate) fn palette_from_bytes(bytes: &[u8]) -> Palette {
    let mut palette = [[0u8; 3]; 256];
    for (i, entry) in palette.iter_mut().enumerate() {
        entry.copy_from_slice(&bytes[i * 3..i * 3 + 3]);
    }
    palette
}

/// Flatten a palette back into its on-disk 768-byte form.
pub(crate) fn palette_to_bytes(palette: &Palette) -> [u8; 768] {
    let mut out = [0u8; 768];
    for (i, entry) in palette.iter().enumerate() {
        out[i * 3..i * 3 + 3].copy_from_slice(entry);
    }
    out
}
