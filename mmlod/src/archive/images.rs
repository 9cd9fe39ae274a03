//! Image-aware entry extraction.
//!
//! Heroes archives store their own PCX variant; MM bitmap archives store
//! name-prefixed bitmap payloads; sprites reference a `palNNN` palette
//! entry in a bitmaps archive. These helpers surface decoded images where
//! the flavour supports it and report `None` for plain data entries.

use std::io::{Read, Seek};

use crate::error::{Error, Result};
use crate::pixels::mm::{self, MmBitmapHeader, BITMAP_HEADER_LEN};
use crate::pixels::{pcx, Palette, PixelImage};
use crate::reader::ByteReader;
use crate::utils::{name_extension, name_stem};

use super::reader::Archive;
use super::types::{ArchiveFlavour, LodVersion};

impl<R: Read + Seek> Archive<R> {
    /// Decode the entry as an image where the flavour defines one:
    /// MM bitmaps (and palettes as 16x16 swatches are left to callers),
    /// Heroes `.pcx` entries. Sprites need an external palette, see
    /// [`Archive::extract_sprite_image`]. Returns `None` for raw data.
    ///
    /// # Errors
    /// Propagates decode failures for entries that should be images.
    pub fn extract_image(&mut self, index: usize) -> Result<Option<PixelImage>> {
        match self.flavour {
            ArchiveFlavour::Lod(
                LodVersion::Bitmaps | LodVersion::Icons | LodVersion::Mm8,
            ) => {
                let payload = self.mm_payload(index)?;
                Ok(Some(mm::unpack_bitmap(&payload)?))
            }
            ArchiveFlavour::Lod(LodVersion::Heroes) | ArchiveFlavour::Lwd => {
                let name = self.entry_checked(index)?.name.clone();
                if name_extension(&name) == "pcx" {
                    let data = self.entry_data(index)?;
                    return Ok(Some(pcx::decode(&data)?));
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    /// Decode a sprite entry against a palette resolved by the caller.
    ///
    /// # Errors
    /// Propagates decode failures.
    pub fn extract_sprite_image(&mut self, index: usize, palette: &Palette) -> Result<PixelImage> {
        let payload = self.mm_payload(index)?;
        mm::unpack_sprite(&payload, palette)
    }

    /// The `palNNN` index a sprite entry references.
    ///
    /// # Errors
    /// Returns [`Error::Truncated`] on a malformed sprite header.
    pub fn sprite_palette_id(&mut self, index: usize) -> Result<i16> {
        let payload = self.mm_payload(index)?;
        let mut r = ByteReader::new(&payload);
        Ok(mm::MmSpriteHeader::parse(&mut r)?.palette)
    }

    /// Load palette `pal` (entry `palNNN`) from this archive.
    ///
    /// # Errors
    /// Returns [`Error::PaletteMissing`] when the entry is absent.
    pub fn load_palette(&mut self, pal: i16) -> Result<Palette> {
        let name = format!("pal{pal:03}");
        let index = self
            .find(&name)
            .ok_or_else(|| Error::PaletteMissing(name.clone()))?;
        let payload = self.mm_payload(index)?;
        mm::unpack_palette(&payload)
    }

    /// Entry payload with the leading name copy stripped, as MM payloads
    /// carry one.
    fn mm_payload(&mut self, index: usize) -> Result<Vec<u8>> {
        let name_len = self.layout.name_len;
        let entry = self.entry_checked(index)?;
        let name = entry.name.clone();
        let data = self.entry_data(index)?;
        if data.len() < name_len {
            return Err(Error::CorruptEntry {
                name,
                reason: "payload is shorter than its name prefix".into(),
            });
        }
        Ok(data[name_len..].to_vec())
    }

    /// The file name an entry extracts under, with the flavour's
    /// conventional extension mapping applied.
    ///
    /// # Errors
    /// Propagates read failures when the payload has to be peeked.
    pub fn extract_name(&mut self, index: usize) -> Result<String> {
        let entry = self.entry_checked(index)?.clone();
        let name = entry.name;
        match self.flavour {
            ArchiveFlavour::Lod(LodVersion::Heroes) | ArchiveFlavour::Lwd => {
                if name_extension(&name) == "pcx" {
                    Ok(format!("{}.bmp", name_stem(&name)))
                } else {
                    Ok(name)
                }
            }
            ArchiveFlavour::Lod(LodVersion::Sprites) => Ok(format!("{name}.bmp")),
            ArchiveFlavour::Lod(
                LodVersion::Bitmaps | LodVersion::Icons | LodVersion::Mm8,
            ) => {
                let payload = self.mm_payload(index)?;
                let mut r = ByteReader::new(&payload);
                if let Ok(hdr) = MmBitmapHeader::parse(&mut r) {
                    if hdr.bmp_size != 0 {
                        return Ok(format!("{name}.bmp"));
                    }
                    if hdr.data_size == 0
                        && payload.len() >= BITMAP_HEADER_LEN + 768
                    {
                        return Ok(format!("{name}.act"));
                    }
                }
                Ok(format!("{name}.mmrawdata"))
            }
            ArchiveFlavour::Lod(_) => Ok(name),
            ArchiveFlavour::Snd { .. } => Ok(format!("{name}.wav")),
            ArchiveFlavour::Vid { .. } => {
                if name_extension(&name).is_empty() {
                    Ok(format!("{name}.smk"))
                } else {
                    Ok(name)
                }
            }
        }
    }
}
