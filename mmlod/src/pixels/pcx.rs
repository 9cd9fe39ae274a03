//! PCX pixel source.
//!
//! Two formats share the extension in Heroes archives: the game's own
//! headerless-RLE container (a 12-byte size/width/height header followed
//! by raw pixels) and genuine ZSoft PCX with its run-length scheme, where
//! a byte with the top two bits set encodes a run of `byte & 0x3F`.

use crate::error::{Error, Result};
use crate::reader::ByteReader;

use super::{palette_from_bytes, palette_to_bytes, PixelBuffer, PixelImage};

/// Decode either PCX variant, detecting which one by the header.
///
/// # Errors
/// Returns [`Error::Truncated`] on short input and
/// [`Error::InvalidPixelStream`] for unsupported depths.
pub fn decode(data: &[u8]) -> Result<PixelImage> {
    if is_standard_pcx(data) {
        decode_standard(data)
    } else {
        decode_heroes(data)
    }
}

fn is_standard_pcx(data: &[u8]) -> bool {
    data.len() >= 128
        && data[0] == 0x0A
        && data[1] <= 5
        && data[2] == 1
        && matches!(data[3], 1 | 8)
}

/// Decode the Heroes-internal PCX: `image_size, width, height` then raw
/// pixel rows, with a trailing 768-byte palette in the 8-bit case.
///
/// # Errors
/// Returns [`Error::Truncated`] / [`Error::InvalidPixelStream`] as above.
pub fn decode_heroes(data: &[u8]) -> Result<PixelImage> {
    let mut r = ByteReader::new(data);
    let image_size = r.read_u32()? as usize;
    let width = r.read_u32()?;
    let height = r.read_u32()?;

    let pixel_count = width as usize * height as usize;
    if pixel_count == 0 || image_size % pixel_count != 0 {
        return Err(Error::InvalidPixelStream(format!(
            "PCX image size {image_size} does not match {width}x{height}"
        )));
    }
    let bytes_per_pixel = image_size / pixel_count;
    let pixels = r.read_bytes(image_size)?.to_vec();
    match bytes_per_pixel {
        1 => {
            let palette = palette_from_bytes(r.read_bytes(768)?);
            Ok(PixelImage {
                width,
                height,
                buffer: PixelBuffer::Indexed {
                    palette: Box::new(palette),
                    pixels,
                },
            })
        }
        3 => Ok(PixelImage {
            width,
            height,
            buffer: PixelBuffer::Rgb(pixels),
        }),
        other => Err(Error::InvalidPixelStream(format!(
            "PCX depth of {other} bytes per pixel is not supported"
        ))),
    }
}

/// Serialise an image back into the Heroes-internal PCX layout.
#[must_use]
pub fn encode_heroes(image: &PixelImage) -> Vec<u8> {
    let mut out = Vec::new();
    match &image.buffer {
        PixelBuffer::Indexed { palette, pixels } => {
            out.extend_from_slice(&(pixels.len() as u32).to_le_bytes());
            out.extend_from_slice(&image.width.to_le_bytes());
            out.extend_from_slice(&image.height.to_le_bytes());
            out.extend_from_slice(pixels);
            out.extend_from_slice(&palette_to_bytes(palette));
        }
        PixelBuffer::Rgb(rgb) => {
            out.extend_from_slice(&(rgb.len() as u32).to_le_bytes());
            out.extend_from_slice(&image.width.to_le_bytes());
            out.extend_from_slice(&image.height.to_le_bytes());
            out.extend_from_slice(rgb);
        }
        PixelBuffer::Rgba(_) => {
            // The legacy container has no alpha form; callers convert
            // before packing.
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&image.width.to_le_bytes());
            out.extend_from_slice(&image.height.to_le_bytes());
        }
    }
    out
}

fn decode_standard(data: &[u8]) -> Result<PixelImage> {
    let mut r = ByteReader::new(data);
    r.skip(3)?;
    let bits_per_pixel = r.read_u8()?;
    let xmin = r.read_u16()?;
    let ymin = r.read_u16()?;
    let xmax = r.read_u16()?;
    let ymax = r.read_u16()?;
    if xmax < xmin || ymax < ymin {
        return Err(Error::InvalidPixelStream("PCX window is inverted".into()));
    }
    let width = u32::from(xmax - xmin) + 1;
    let height = u32::from(ymax - ymin) + 1;
    r.seek(65)?;
    let planes = r.read_u8()?;
    let bytes_per_line = r.read_u16()? as usize;
    r.seek(128)?;

    if bits_per_pixel != 8 || !matches!(planes, 1 | 3) {
        return Err(Error::InvalidPixelStream(format!(
            "PCX {bits_per_pixel}bpp x{planes} planes is not supported"
        )));
    }

    let row_bytes = bytes_per_line * planes as usize;
    let mut rows = Vec::with_capacity(height as usize);
    for _ in 0..height {
        rows.push(decode_rle_row(&mut r, row_bytes)?);
    }

    if planes == 1 {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for row in &rows {
            pixels.extend_from_slice(&row[..width as usize]);
        }
        // The VGA palette trails the image, preceded by an 0x0C marker.
        let palette = if data.len() >= 769 && data[data.len() - 769] == 0x0C {
            palette_from_bytes(&data[data.len() - 768..])
        } else {
            return Err(Error::PaletteMissing("PCX VGA palette".into()));
        };
        Ok(PixelImage {
            width,
            height,
            buffer: PixelBuffer::Indexed {
                palette: Box::new(palette),
                pixels,
            },
        })
    } else {
        let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);
        for row in &rows {
            for x in 0..width as usize {
                rgb.push(row[x]);
                rgb.push(row[bytes_per_line + x]);
                rgb.push(row[2 * bytes_per_line + x]);
            }
        }
        Ok(PixelImage {
            width,
            height,
            buffer: PixelBuffer::Rgb(rgb),
        })
    }
}

fn decode_rle_row(r: &mut ByteReader<'_>, row_bytes: usize) -> Result<Vec<u8>> {
    let mut row = Vec::with_capacity(row_bytes);
    while row.len() < row_bytes {
        let b = r.read_u8()?;
        if b & 0xC0 == 0xC0 {
            let run = (b & 0x3F) as usize;
            let value = r.read_u8()?;
            for _ in 0..run {
                row.push(value);
            }
        } else {
            row.push(b);
        }
    }
    // A final run may overshoot the scanline; the excess belongs to no row.
    row.truncate(row_bytes);
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heroes_indexed_round_trip() {
        let mut palette = [[0u8; 3]; 256];
        palette[7] = [10, 20, 30];
        let image = PixelImage {
            width: 4,
            height: 2,
            buffer: PixelBuffer::Indexed {
                palette: Box::new(palette),
                pixels: vec![7, 7, 0, 1, 2, 3, 4, 5],
            },
        };
        let packed = encode_heroes(&image);
        let back = decode(&packed).unwrap();
        match back.buffer {
            PixelBuffer::Indexed { palette, pixels } => {
                assert_eq!(pixels, vec![7, 7, 0, 1, 2, 3, 4, 5]);
                assert_eq!(palette[7], [10, 20, 30]);
            }
            _ => panic!("expected indexed buffer"),
        }
    }

    #[test]
    fn heroes_truncated_is_rejected() {
        let image = PixelImage {
            width: 4,
            height: 4,
            buffer: PixelBuffer::Indexed {
                palette: Box::new([[0; 3]; 256]),
                pixels: vec![0; 16],
            },
        };
        let mut packed = encode_heroes(&image);
        packed.truncate(packed.len() - 400);
        assert!(matches!(decode(&packed), Err(Error::Truncated { .. })));
    }

    #[test]
    fn standard_rle_runs() {
        // 4x1, 8bpp, one plane: a run of three 0xAA then a literal 0x12.
        let mut data = vec![0u8; 128];
        data[0] = 0x0A;
        data[1] = 5;
        data[2] = 1;
        data[3] = 8;
        data[4..6].copy_from_slice(&0u16.to_le_bytes());
        data[6..8].copy_from_slice(&0u16.to_le_bytes());
        data[8..10].copy_from_slice(&3u16.to_le_bytes());
        data[10..12].copy_from_slice(&0u16.to_le_bytes());
        data[65] = 1;
        data[66..68].copy_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&[0xC3, 0xAA, 0x12]);
        data.push(0x0C);
        data.extend_from_slice(&[0u8; 768]);

        let image = decode(&data).unwrap();
        assert_eq!((image.width, image.height), (4, 1));
        match image.buffer {
            PixelBuffer::Indexed { pixels, .. } => {
                assert_eq!(pixels, vec![0xAA, 0xAA, 0xAA, 0x12]);
            }
            _ => panic!("expected indexed buffer"),
        }
    }
}
