//! MM LOD bitmap, sprite, and palette payload decoding.
//!
//! MM archive entries are not packed at the directory level; bitmaps and
//! sprites carry their own zlib stream inside the payload, which also
//! begins with a copy of the entry name. Callers pass the payload with
//! the name prefix already skipped.

use crate::compression;
use crate::error::{Error, Result};
use crate::reader::ByteReader;

use super::{palette_from_bytes, Palette, PixelBuffer, PixelImage};

/// Post-name header of an MM bitmap payload.
#[derive(Debug, Clone)]
pub struct MmBitmapHeader {
    pub bmp_size: u32,
    pub data_size: u32,
    pub width: i16,
    pub height: i16,
    pub width_ln2: i16,
    pub height_ln2: i16,
    pub width_minus1: i16,
    pub height_minus1: i16,
    pub palette: i16,
    pub unk: i16,
    pub unp_size: u32,
    pub bits: u32,
}

pub(crate) const BITMAP_HEADER_LEN: usize = 32;

impl MmBitmapHeader {
    /// # Errors
    /// Returns [`Error::Truncated`] on short input.
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            bmp_size: r.read_u32()?,
            data_size: r.read_u32()?,
            width: r.read_i16()?,
            height: r.read_i16()?,
            width_ln2: r.read_i16()?,
            height_ln2: r.read_i16()?,
            width_minus1: r.read_i16()?,
            height_minus1: r.read_i16()?,
            palette: r.read_i16()?,
            unk: r.read_i16()?,
            unp_size: r.read_u32()?,
            bits: r.read_u32()?,
        })
    }
}

/// Decode an MM bitmap payload into a palettised image. Mipmap levels
/// trailing the base image are skipped.
///
/// # Errors
/// Returns [`Error::Truncated`], [`Error::DecompressionMismatch`], or
/// [`Error::InvalidPixelStream`].
pub fn unpack_bitmap(payload: &[u8]) -> Result<PixelImage> {
    let mut r = ByteReader::new(payload);
    let hdr = MmBitmapHeader::parse(&mut r)?;
    if hdr.width <= 0 || hdr.height <= 0 {
        return Err(Error::InvalidPixelStream(format!(
            "MM bitmap has invalid dimensions {}x{}",
            hdr.width, hdr.height
        )));
    }
    let width = hdr.width as u32;
    let height = hdr.height as u32;
    let stored = r.read_bytes(hdr.data_size as usize)?;
    let pixel_data = if hdr.unp_size > 0 {
        compression::decompress(stored, hdr.unp_size as usize)?
    } else {
        stored.to_vec()
    };
    let pixel_count = width as usize * height as usize;
    if pixel_data.len() < pixel_count {
        return Err(Error::InvalidPixelStream(format!(
            "MM bitmap pixel data of {} bytes is short of {pixel_count}",
            pixel_data.len()
        )));
    }
    let palette = palette_from_bytes(r.read_bytes(768)?);
    Ok(PixelImage {
        width,
        height,
        buffer: PixelBuffer::Indexed {
            palette: Box::new(palette),
            pixels: pixel_data[..pixel_count].to_vec(),
        },
    })
}

/// Decode a palette entry payload (a bitmap record with zeroed image
/// fields carrying only the 768 palette bytes).
///
/// # Errors
/// Returns [`Error::InvalidPixelStream`] when the payload is not a
/// palette record.
pub fn unpack_palette(payload: &[u8]) -> Result<Palette> {
    let mut r = ByteReader::new(payload);
    let hdr = MmBitmapHeader::parse(&mut r)?;
    if hdr.bmp_size != 0 || hdr.data_size != 0 || hdr.width != 0 {
        return Err(Error::InvalidPixelStream(
            "entry is not a palette record".into(),
        ));
    }
    Ok(palette_from_bytes(r.read_bytes(768)?))
}

/// Post-name header of an MM sprite payload.
#[derive(Debug, Clone)]
pub struct MmSpriteHeader {
    pub size: u32,
    pub width: i16,
    pub height: i16,
    pub palette: i16,
    pub unk_1: i16,
    pub yskip: i16,
    pub unk_2: i16,
    pub unp_size: u32,
}

pub(crate) const SPRITE_HEADER_LEN: usize = 20;
const SPRITE_LINE_LEN: usize = 8;

impl MmSpriteHeader {
    /// # Errors
    /// Returns [`Error::Truncated`] on short input.
    pub fn parse(r: &mut ByteReader<'_>) -> Result<Self> {
        Ok(Self {
            size: r.read_u32()?,
            width: r.read_i16()?,
            height: r.read_i16()?,
            palette: r.read_i16()?,
            unk_1: r.read_i16()?,
            yskip: r.read_i16()?,
            unk_2: r.read_i16()?,
            unp_size: r.read_u32()?,
        })
    }
}

/// Decode an MM sprite payload against the `palNNN` palette it names,
/// producing an RGBA image with transparent gaps.
///
/// # Errors
/// Returns [`Error::Truncated`], [`Error::DecompressionMismatch`], or
/// [`Error::InvalidPixelStream`].
pub fn unpack_sprite(payload: &[u8], palette: &Palette) -> Result<PixelImage> {
    let mut r = ByteReader::new(payload);
    let hdr = MmSpriteHeader::parse(&mut r)?;
    if hdr.width <= 0 || hdr.height <= 0 || hdr.yskip < 0 || hdr.yskip > hdr.height {
        return Err(Error::InvalidPixelStream(format!(
            "MM sprite has invalid geometry {}x{} (yskip {})",
            hdr.width, hdr.height, hdr.yskip
        )));
    }
    let width = hdr.width as usize;
    let line_count = (hdr.height - hdr.yskip) as usize;

    let mut lines = Vec::with_capacity(line_count);
    for _ in 0..line_count {
        let _a1 = r.read_i16()?;
        let _a2 = r.read_i16()?;
        lines.push(r.read_u32()? as usize);
    }

    let table_len = SPRITE_HEADER_LEN + line_count * SPRITE_LINE_LEN;
    let stored_len = (hdr.size as usize)
        .checked_sub(table_len)
        .ok_or_else(|| Error::InvalidPixelStream("MM sprite size underflows".into()))?;
    let stored = r.read_bytes(stored_len)?;
    let pixel_data = if hdr.unp_size > 0 {
        compression::decompress(stored, hdr.unp_size as usize)?
    } else {
        stored.to_vec()
    };

    let mut rgba = vec![0u8; width * hdr.height as usize * 4];
    for (y, &pos) in lines.iter().enumerate() {
        let mut p = pos;
        let mut x = 0usize;
        while x < width && p < pixel_data.len() {
            let run = pixel_data[p];
            p += 1;
            if run & 0x80 != 0 {
                x += (run & 0x7F) as usize;
                continue;
            }
            for _ in 0..run {
                if x >= width || p >= pixel_data.len() {
                    break;
                }
                let color = palette[pixel_data[p] as usize];
                let at = (y * width + x) * 4;
                rgba[at..at + 4].copy_from_slice(&[color[0], color[1], color[2], 255]);
                p += 1;
                x += 1;
            }
        }
    }

    Ok(PixelImage {
        width: width as u32,
        height: hdr.height as u32,
        buffer: PixelBuffer::Rgba(rgba),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bitmap_payload(width: i16, height: i16, pixels: &[u8], pack: bool) -> Vec<u8> {
        let data = if pack {
            compression::compress(pixels, compression::DEFAULT_LEVEL).unwrap()
        } else {
            pixels.to_vec()
        };
        let mut out = Vec::new();
        out.extend_from_slice(&((32 + data.len() + 768) as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&width.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&[0u8; 12]); // ln2/minus1/palette/unk
        out.extend_from_slice(&((if pack { pixels.len() } else { 0 }) as u32).to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes()); // bits
        out.extend_from_slice(&data);
        let mut palette = [0u8; 768];
        palette[3] = 0x55;
        out.extend_from_slice(&palette);
        out
    }

    #[test]
    fn bitmap_decodes_packed_payload() {
        let pixels: Vec<u8> = (0..16u8).map(|i| i % 4).collect();
        let payload = bitmap_payload(4, 4, &pixels, true);
        let image = unpack_bitmap(&payload).unwrap();
        match image.buffer {
            PixelBuffer::Indexed { palette, pixels: px } => {
                assert_eq!(px, pixels);
                assert_eq!(palette[1], [0x55, 0, 0]);
            }
            _ => panic!("expected indexed buffer"),
        }
    }

    #[test]
    fn bitmap_decodes_stored_payload() {
        let pixels = vec![9u8; 16];
        let payload = bitmap_payload(4, 4, &pixels, false);
        let image = unpack_bitmap(&payload).unwrap();
        assert_eq!((image.width, image.height), (4, 4));
    }

    #[test]
    fn sprite_runs_and_gaps() {
        let mut palette = [[0u8; 3]; 256];
        palette[9] = [100, 110, 120];
        // 4x1 sprite: skip 1, draw two pixels of index 9, stop.
        let pixel_data = [0x81u8, 2, 9, 9];
        let mut payload = Vec::new();
        let size = (SPRITE_HEADER_LEN + SPRITE_LINE_LEN + pixel_data.len()) as u32;
        payload.extend_from_slice(&size.to_le_bytes());
        payload.extend_from_slice(&4i16.to_le_bytes());
        payload.extend_from_slice(&1i16.to_le_bytes());
        payload.extend_from_slice(&0i16.to_le_bytes()); // palette
        payload.extend_from_slice(&0i16.to_le_bytes());
        payload.extend_from_slice(&0i16.to_le_bytes()); // yskip
        payload.extend_from_slice(&0i16.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes()); // unp_size
        payload.extend_from_slice(&0i16.to_le_bytes());
        payload.extend_from_slice(&0i16.to_le_bytes());
        payload.extend_from_slice(&0u32.to_le_bytes()); // line pos
        payload.extend_from_slice(&pixel_data);

        let image = unpack_sprite(&payload, &palette).unwrap();
        match image.buffer {
            PixelBuffer::Rgba(rgba) => {
                assert_eq!(&rgba[0..4], &[0, 0, 0, 0]);
                assert_eq!(&rgba[4..8], &[100, 110, 120, 255]);
                assert_eq!(&rgba[8..12], &[100, 110, 120, 255]);
                assert_eq!(&rgba[12..16], &[0, 0, 0, 0]);
            }
            _ => panic!("expected RGBA buffer"),
        }
    }
}
