//! Staged mutation and archive re-serialisation.
//!
//! `add` only stages an entry; the on-disk file is untouched until
//! `rebuild`/`save_as`, which emit a fresh contiguous layout
//! (header, directory, payload region) with insertion order preserved.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use crate::compression;
use crate::error::{Error, Result};
use crate::utils::{name_extension, name_stem, write_atomic};

use super::reader::Archive;
use super::types::{ArchiveFlavour, ArchiveHeader, LodVersion};
use super::{GAMES7_SIG, LOD_MAGIC, MIN_COMPRESS_SIZE, VID_SIZE_SIG_NO_EXT};

#[derive(Debug, Clone)]
pub(super) struct StagedEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compress: bool,
}

struct FinalEntry {
    name: String,
    file_type: u32,
    payload: Vec<u8>,
    packed_size: u32,
    unpacked_size: u32,
}

impl<R: Read + Seek> Archive<R> {
    /// Stage an entry for the next rebuild. An existing entry with the
    /// same name (case-insensitive) is replaced in place; otherwise the
    /// entry is appended.
    ///
    /// # Errors
    /// Returns [`Error::NameTooLong`] when the name does not fit the
    /// flavour's directory record.
    pub fn add(&mut self, name: &str, data: Vec<u8>, compress: bool) -> Result<()> {
        let name = self.adjust_add_name(name);
        if name.len() >= self.layout.name_len {
            return Err(Error::NameTooLong {
                name,
                limit: self.layout.name_len,
            });
        }
        self.pending.retain(|p| !p.name.eq_ignore_ascii_case(&name));
        self.pending.push(StagedEntry {
            name,
            data,
            compress,
        });
        Ok(())
    }

    /// SND entries are stored without extensions; no-extension VID
    /// archives also strip `.smk`.
    fn adjust_add_name(&self, name: &str) -> String {
        match self.flavour {
            ArchiveFlavour::Snd { .. } => name_stem(name).to_string(),
            ArchiveFlavour::Vid { no_extension: true } if name_extension(name) == "smk" => {
                name_stem(name).to_string()
            }
            _ => name.to_string(),
        }
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Serialise the archive (with staged entries applied) to a new file.
    ///
    /// # Errors
    /// Propagates read failures from the backing source; never tolerant.
    pub fn save_as(&mut self, path: &Path) -> Result<()> {
        let bytes = self.serialize()?;
        write_atomic(path, &bytes)?;
        tracing::info!(archive = %path.display(), size = bytes.len(), "archive written");
        Ok(())
    }

    fn serialize(&mut self) -> Result<Vec<u8>> {
        // Resolve the final entry list: existing entries in order with
        // same-name staged entries replacing them in place, then new
        // staged entries in insertion order.
        let existing = self.entries.clone();
        let mut pending: Vec<Option<StagedEntry>> =
            self.pending.iter().cloned().map(Some).collect();
        let mut finals: Vec<FinalEntry> = Vec::with_capacity(existing.len() + pending.len());

        for e in &existing {
            let mut replacement = None;
            for slot in &mut pending {
                let matches = slot
                    .as_ref()
                    .map_or(false, |s| s.name.eq_ignore_ascii_case(&e.name));
                if matches {
                    replacement = slot.take();
                    break;
                }
            }
            match replacement {
                Some(staged) => finals.push(self.pack_staged(staged)?),
                None => {
                    let payload = self.stored_bytes_at(
                        u64::from(e.offset),
                        e.stored_size() as usize,
                        &e.name,
                    )?;
                    finals.push(FinalEntry {
                        name: e.name.clone(),
                        file_type: e.file_type,
                        payload,
                        packed_size: e.packed_size,
                        unpacked_size: e.unpacked_size,
                    });
                }
            }
        }
        for staged in pending.into_iter().flatten() {
            finals.push(self.pack_staged(staged)?);
        }

        let count = finals.len();
        let dir_start = self.layout.dir_start as usize;
        let dir_len = count * self.layout.record_len;
        let payload_base = dir_start + dir_len;

        let mut offsets = Vec::with_capacity(count);
        let mut pos = payload_base;
        for f in &finals {
            offsets.push(pos as u32);
            pos += f.payload.len();
        }
        let payload_end = pos;

        // Header region.
        let mut out = vec![0u8; dir_start];
        match &self.header {
            ArchiveHeader::Heroes(h) => {
                out[0..4].copy_from_slice(&h.signature);
                // The legacy tools keep the version slot equal to the
                // entry count.
                out[4..8].copy_from_slice(&(count as u32).to_le_bytes());
                out[8..12].copy_from_slice(&(count as u32).to_le_bytes());
                out[12..12 + h.unknown.len()].copy_from_slice(&h.unknown);
            }
            ArchiveHeader::Mm(m) => {
                let ArchiveFlavour::Lod(version) = self.flavour else {
                    return Err(Error::Usage("MM header on a non-LOD archive".into()));
                };
                out[0..4].copy_from_slice(&LOD_MAGIC);
                write_str(&mut out, 4, version.version_str());
                write_str(&mut out, 84, version.description());
                out[164..168].copy_from_slice(&100i32.to_le_bytes());
                out[172..176].copy_from_slice(&1i32.to_le_bytes());
                write_str(&mut out, 256, version.lod_type_str());
                out[272..276].copy_from_slice(&m.archive_start.to_le_bytes());
                let archive_size = (payload_end - dir_start) as u32;
                out[276..280].copy_from_slice(&archive_size.to_le_bytes());
                out[284..286].copy_from_slice(&(count as u16).to_le_bytes());
                out[288..dir_start].copy_from_slice(&m.additional_data);
            }
            ArchiveHeader::CountOnly => {
                out[0..4].copy_from_slice(&(count as u32).to_le_bytes());
            }
        }

        // Directory.
        for (f, &off) in finals.iter().zip(&offsets) {
            let base = out.len();
            out.resize(base + self.layout.record_len, 0);
            let rec = &mut out[base..];
            rec[..f.name.len()].copy_from_slice(f.name.as_bytes());
            let rel = off - self.layout.addr_bias;
            rec[self.layout.addr_offset..self.layout.addr_offset + 4]
                .copy_from_slice(&rel.to_le_bytes());
            let stored = f.payload.len() as u32;
            if let Some(o) = self.layout.size_offset {
                rec[o..o + 4].copy_from_slice(&stored.to_le_bytes());
            }
            if let Some(o) = self.layout.unpacked_offset {
                rec[o..o + 4].copy_from_slice(&f.unpacked_size.to_le_bytes());
            }
            if let Some(o) = self.layout.packed_offset {
                rec[o..o + 4].copy_from_slice(&f.packed_size.to_le_bytes());
            }
            if let Some(o) = self.layout.type_offset {
                rec[o..o + 4].copy_from_slice(&f.file_type.to_le_bytes());
            }
        }

        // Payload region.
        for f in &finals {
            out.extend_from_slice(&f.payload);
        }

        // A contiguous rebuild lets VID sizes derive from neighbouring
        // offsets, so the legacy size table is not re-emitted; only the
        // no-extension marker survives.
        if let ArchiveFlavour::Vid { no_extension: true } = self.flavour {
            if finals.iter().all(|f| !name_extension(&f.name).is_empty()) {
                out.extend_from_slice(&VID_SIZE_SIG_NO_EXT);
            }
        }

        if self.flavour == ArchiveFlavour::Lod(LodVersion::Games7) {
            let has_map = finals.iter().any(|f| {
                matches!(
                    name_extension(&f.name).as_str(),
                    "blv" | "dlv" | "odm" | "ddm"
                )
            });
            if !has_map {
                out.extend_from_slice(&GAMES7_SIG);
            }
        }

        if (out.len() as u64) < self.layout.min_file_size {
            out.resize(self.layout.min_file_size as usize, 0);
        }
        Ok(out)
    }

    fn pack_staged(&self, staged: StagedEntry) -> Result<FinalEntry> {
        let unpacked_len = staged.data.len();
        let mut payload = staged.data;
        let mut packed_size = 0u32;
        if staged.compress && unpacked_len > MIN_COMPRESS_SIZE && self.layout.can_store_packed() {
            if let Some(packed) =
                compression::compress_if_smaller(&payload, compression::DEFAULT_LEVEL)?
            {
                packed_size = packed.len() as u32;
                payload = packed;
            }
        }
        Ok(FinalEntry {
            name: staged.name,
            file_type: 0,
            payload,
            packed_size,
            unpacked_size: unpacked_len as u32,
        })
    }
}

impl Archive<std::io::Cursor<Vec<u8>>> {
    /// A new, empty in-memory archive of the given flavour. Stage
    /// entries with [`Archive::add`] and write it out with
    /// [`Archive::save_as`].
    #[must_use]
    pub fn create(name: impl Into<std::path::PathBuf>, flavour: ArchiveFlavour) -> Self {
        use super::types::{ArchiveHeader, HeroesHeader, MmHeader};
        use super::{DirectoryLayout, LOD_MAGIC};

        let (layout, header) = match flavour {
            ArchiveFlavour::Lod(LodVersion::Heroes) | ArchiveFlavour::Lwd => (
                DirectoryLayout::heroes(92),
                ArchiveHeader::Heroes(HeroesHeader {
                    signature: LOD_MAGIC,
                    version: 200,
                    unknown: vec![0; 80],
                }),
            ),
            ArchiveFlavour::Lod(version) => (
                DirectoryLayout::mm(version, 288),
                ArchiveHeader::Mm(MmHeader {
                    archive_start: 288,
                    additional_data: Vec::new(),
                }),
            ),
            ArchiveFlavour::Snd { mm } => (DirectoryLayout::snd(mm), ArchiveHeader::CountOnly),
            ArchiveFlavour::Vid { .. } => (DirectoryLayout::vid(), ArchiveHeader::CountOnly),
        };
        Archive {
            source: std::io::BufReader::new(std::io::Cursor::new(Vec::new())),
            path: name.into(),
            flavour,
            layout,
            header,
            entries: Vec::new(),
            pending: Vec::new(),
            file_size: 0,
            tolerant: false,
        }
    }
}

impl Archive<File> {
    /// Rewrite the archive in place: serialise to a temporary file beside
    /// it, rename over the original, and re-open. Never tolerant — a
    /// corrupt input archive cannot be silently rewritten.
    ///
    /// # Errors
    /// Propagates serialisation and filesystem failures.
    pub fn rebuild(&mut self) -> Result<()> {
        let path = self.path.clone();
        let bytes = self.serialize()?;
        write_atomic(&path, &bytes)?;
        tracing::info!(archive = %path.display(), entries = self.entries.len() + self.pending.len(), "archive rebuilt");
        *self = Archive::open(&path)?;
        Ok(())
    }
}

fn write_str(out: &mut [u8], offset: usize, s: &str) {
    out[offset..offset + s.len()].copy_from_slice(s.as_bytes());
}
