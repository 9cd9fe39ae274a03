//! Uncompressed BMP read/write (8-bit palettised, 24-bit, 32-bit).
//!
//! The DefTool exchange format is plain bottom-up BI_RGB bitmaps; nothing
//! fancier is decoded here.

use crate::error::{Error, Result};
use crate::reader::ByteReader;

use super::{Palette, PixelBuffer, PixelImage};

const FILE_HEADER_LEN: usize = 14;
const INFO_HEADER_LEN: usize = 40;

/// Decode an uncompressed 8-bit or 24-bit BMP.
///
/// # Errors
/// Returns [`Error::Truncated`] on short input and
/// [`Error::InvalidPixelStream`] for compressed or unsupported depths.
pub fn decode(data: &[u8]) -> Result<PixelImage> {
    let mut r = ByteReader::new(data);
    let magic = r.read_bytes(2)?;
    if magic != b"BM" {
        return Err(Error::InvalidPixelStream("missing BM signature".into()));
    }
    r.skip(8)?;
    let data_offset = r.read_u32()? as usize;
    let info_len = r.read_u32()? as usize;
    if info_len < INFO_HEADER_LEN {
        return Err(Error::InvalidPixelStream(format!(
            "BMP info header of {info_len} bytes is not supported"
        )));
    }
    let width = r.read_i32()?;
    let raw_height = r.read_i32()?;
    r.skip(2)?; // planes
    let bpp = r.read_u16()?;
    let compression = r.read_u32()?;
    if compression != 0 {
        return Err(Error::InvalidPixelStream(format!(
            "BMP compression {compression} is not supported"
        )));
    }
    if width <= 0 || raw_height == 0 {
        return Err(Error::InvalidPixelStream("BMP has empty dimensions".into()));
    }
    let top_down = raw_height < 0;
    let width = width as u32;
    let height = raw_height.unsigned_abs();

    match bpp {
        8 => {
            let pal_offset = FILE_HEADER_LEN + info_len;
            let mut pal_reader = r.subreader(pal_offset, 256 * 4)?;
            let mut palette: Palette = [[0u8; 3]; 256];
            for entry in &mut palette {
                let bgra = pal_reader.read_bytes(4)?;
                *entry = [bgra[2], bgra[1], bgra[0]];
            }
            let pixels = read_rows(&r, data_offset, width, height, 1, top_down)?;
            Ok(PixelImage {
                width,
                height,
                buffer: PixelBuffer::Indexed {
                    palette: Box::new(palette),
                    pixels,
                },
            })
        }
        24 => {
            let bgr = read_rows(&r, data_offset, width, height, 3, top_down)?;
            let mut rgb = bgr;
            for px in rgb.chunks_exact_mut(3) {
                px.swap(0, 2);
            }
            Ok(PixelImage {
                width,
                height,
                buffer: PixelBuffer::Rgb(rgb),
            })
        }
        other => Err(Error::InvalidPixelStream(format!(
            "BMP depth {other} is not supported"
        ))),
    }
}

fn read_rows(
    r: &ByteReader<'_>,
    data_offset: usize,
    width: u32,
    height: u32,
    bytes_per_px: usize,
    top_down: bool,
) -> Result<Vec<u8>> {
    let row_len = width as usize * bytes_per_px;
    let stride = (row_len + 3) & !3;
    let mut reader = r.subreader(data_offset, stride * height as usize)?;
    let mut out = vec![0u8; row_len * height as usize];
    for i in 0..height as usize {
        let row = reader.read_bytes(stride)?;
        let y = if top_down { i } else { height as usize - 1 - i };
        out[y * row_len..(y + 1) * row_len].copy_from_slice(&row[..row_len]);
    }
    Ok(out)
}

/// Encode an 8-bit palettised BMP.
#[must_use]
pub fn encode_indexed(width: u32, height: u32, pixels: &[u8], palette: &Palette) -> Vec<u8> {
    let row_len = width as usize;
    let stride = (row_len + 3) & !3;
    let data_offset = FILE_HEADER_LEN + INFO_HEADER_LEN + 256 * 4;
    let file_len = data_offset + stride * height as usize;

    let mut out = Vec::with_capacity(file_len);
    push_headers(&mut out, width, height, 8, data_offset, file_len);
    for entry in palette {
        out.extend_from_slice(&[entry[2], entry[1], entry[0], 0]);
    }
    for y in (0..height as usize).rev() {
        out.extend_from_slice(&pixels[y * row_len..(y + 1) * row_len]);
        out.resize(out.len() + (stride - row_len), 0);
    }
    out
}

/// Encode a 24-bit BMP from row-major RGB.
#[must_use]
pub fn encode_rgb(width: u32, height: u32, rgb: &[u8]) -> Vec<u8> {
    let row_len = width as usize * 3;
    let stride = (row_len + 3) & !3;
    let data_offset = FILE_HEADER_LEN + INFO_HEADER_LEN;
    let file_len = data_offset + stride * height as usize;

    let mut out = Vec::with_capacity(file_len);
    push_headers(&mut out, width, height, 24, data_offset, file_len);
    for y in (0..height as usize).rev() {
        let row = &rgb[y * row_len..(y + 1) * row_len];
        for px in row.chunks_exact(3) {
            out.extend_from_slice(&[px[2], px[1], px[0]]);
        }
        out.resize(out.len() + (stride - row_len), 0);
    }
    out
}

/// Encode a 32-bit BMP from row-major RGBA.
#[must_use]
pub fn encode_rgba(width: u32, height: u32, rgba: &[u8]) -> Vec<u8> {
    let row_len = width as usize * 4;
    let data_offset = FILE_HEADER_LEN + INFO_HEADER_LEN;
    let file_len = data_offset + row_len * height as usize;

    let mut out = Vec::with_capacity(file_len);
    push_headers(&mut out, width, height, 32, data_offset, file_len);
    for y in (0..height as usize).rev() {
        let row = &rgba[y * row_len..(y + 1) * row_len];
        for px in row.chunks_exact(4) {
            out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
        }
    }
    out
}

fn push_headers(
    out: &mut Vec<u8>,
    width: u32,
    height: u32,
    bpp: u16,
    data_offset: usize,
    file_len: usize,
) {
    out.extend_from_slice(b"BM");
    out.extend_from_slice(&(file_len as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(data_offset as u32).to_le_bytes());
    out.extend_from_slice(&(INFO_HEADER_LEN as u32).to_le_bytes());
    out.extend_from_slice(&(width as i32).to_le_bytes());
    out.extend_from_slice(&(height as i32).to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&bpp.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes()); // BI_RGB
    out.extend_from_slice(&((file_len - data_offset) as u32).to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    out.extend_from_slice(&2835i32.to_le_bytes());
    let colors: u32 = if bpp == 8 { 256 } else { 0 };
    out.extend_from_slice(&colors.to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexed_round_trip() {
        let mut palette = [[0u8; 3]; 256];
        palette[1] = [255, 0, 0];
        palette[200] = [1, 2, 3];
        // 3x2, deliberately unaligned width to exercise row padding
        let pixels = vec![1, 200, 0, 0, 1, 200];
        let bmp = encode_indexed(3, 2, &pixels, &palette);
        let back = decode(&bmp).unwrap();
        assert_eq!((back.width, back.height), (3, 2));
        match back.buffer {
            PixelBuffer::Indexed {
                palette: p,
                pixels: px,
            } => {
                assert_eq!(px, pixels);
                assert_eq!(p[1], [255, 0, 0]);
                assert_eq!(p[200], [1, 2, 3]);
            }
            _ => panic!("expected indexed buffer"),
        }
    }

    #[test]
    fn rgb_round_trip() {
        let rgb = vec![
            10, 20, 30, 40, 50, 60, //
            70, 80, 90, 100, 110, 120,
        ];
        let bmp = encode_rgb(2, 2, &rgb);
        let back = decode(&bmp).unwrap();
        match back.buffer {
            PixelBuffer::Rgb(px) => assert_eq!(px, rgb),
            _ => panic!("expected RGB buffer"),
        }
    }

    #[test]
    fn rejects_compressed_bmp() {
        let mut bmp = encode_rgb(2, 2, &[0u8; 12]);
        bmp[30] = 1; // BI_RLE8
        assert!(matches!(
            decode(&bmp),
            Err(Error::InvalidPixelStream(_))
        ));
    }
}
