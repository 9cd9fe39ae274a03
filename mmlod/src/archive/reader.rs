//! Archive detection, directory parsing, and entry access.

use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};

use crate::compression;
use crate::error::{Error, Result};
use crate::reader::ByteReader;
use crate::utils::{matches_glob, name_extension};

use super::layout::DirectoryLayout;
use super::types::{
    ArchiveEntry, ArchiveFlavour, ArchiveHeader, EntryKind, HeroesHeader, LodVersion, MmHeader,
};
use super::writer::StagedEntry;
use super::{
    GAMES7_SIG, HEROES_LEGACY_ID, LOD_MAGIC, MM7_MAP_SIG, VID_SIZE_SIG_END, VID_SIZE_SIG_NO_EXT,
    VID_SIZE_SIG_OLD, VID_SIZE_SIG_START,
};

/// A decompressed archive entry with its name.
#[derive(Debug, Clone)]
pub struct EntryData {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl EntryData {
    /// A bounded reader over the entry's bytes.
    #[must_use]
    pub fn reader(&self) -> ByteReader<'_> {
        ByteReader::new(&self.bytes)
    }
}

/// An open LOD-family archive.
///
/// The archive exclusively owns its backing source; entries reference
/// sub-ranges of it. Mutations are staged via [`Archive::add`] and only hit
/// the disk on [`Archive::rebuild`] / [`Archive::save_as`], which always
/// write a fresh contiguous layout.
pub struct Archive<R: Read + Seek> {
    pub(super) source: BufReader<R>,
    pub(super) path: PathBuf,
    pub(super) flavour: ArchiveFlavour,
    pub(super) layout: DirectoryLayout,
    pub(super) header: ArchiveHeader,
    pub(super) entries: Vec<ArchiveEntry>,
    pub(super) pending: Vec<StagedEntry>,
    pub(super) file_size: u64,
    pub(super) tolerant: bool,
}

impl Archive<File> {
    /// Open an archive from disk, detecting its flavour.
    ///
    /// # Errors
    /// Returns [`Error::UnknownFormat`] for unrecognised signatures and
    /// [`Error::CorruptIndex`] when the directory is out of range.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        Self::from_seekable(file, path)
    }
}

impl Archive<Cursor<Vec<u8>>> {
    /// Open an in-memory archive; `name` supplies the virtual file name
    /// used for flavour dispatch and error context.
    ///
    /// # Errors
    /// Same as [`Archive::open`].
    pub fn from_bytes(name: impl Into<PathBuf>, data: Vec<u8>) -> Result<Self> {
        Self::from_seekable(Cursor::new(data), name)
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Open an archive from any seekable source.
    ///
    /// # Errors
    /// Same as [`Archive::open`].
    pub fn from_seekable(inner: R, path: impl Into<PathBuf>) -> Result<Self> {
        let path: PathBuf = path.into();
        let mut source = BufReader::new(inner);
        let file_size = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        let archive = match ext.as_str() {
            "snd" => Self::parse_snd(source, path, file_size)?,
            "vid" => Self::parse_vid(source, path, file_size)?,
            _ => Self::parse_lod(source, path, file_size, ext == "lwd")?,
        };
        archive.validate_entries()?;
        Ok(archive)
    }

    fn parse_lod(
        mut source: BufReader<R>,
        path: PathBuf,
        file_size: u64,
        lwd: bool,
    ) -> Result<Self> {
        let head = read_padded(&mut source, 96)?;
        let signature = [head[0], head[1], head[2], head[3]];
        let version = le32(&head, 4);
        let count = le32(&head, 8);

        if signature == LOD_MAGIC {
            // A `LOD\0` signature is shared by Heroes-style archives (HotA
            // among them) and the structured MM header; Heroes-style files
            // keep plausible version/count dwords where the MM header has
            // string data.
            let simple = (version < 1000 && count < 10_000)
                || (version.abs_diff(count) <= 1 && count > 1000);
            if simple {
                return Self::parse_heroes_lod(
                    source, path, file_size, lwd, signature, version, count, 92, &head,
                );
            }
            return Self::parse_mm_lod(source, path, file_size, head);
        }
        if signature[0] == HEROES_LEGACY_ID {
            return Self::parse_heroes_lod(
                source, path, file_size, lwd, signature, version, count, 96, &head,
            );
        }
        Err(Error::UnknownFormat { path })
    }

    #[allow(clippy::too_many_arguments)]
    fn parse_heroes_lod(
        mut source: BufReader<R>,
        path: PathBuf,
        file_size: u64,
        lwd: bool,
        signature: [u8; 4],
        version: u32,
        count: u32,
        dir_start: u64,
        head: &[u8],
    ) -> Result<Self> {
        let layout = DirectoryLayout::heroes(dir_start);
        let flavour = if lwd {
            ArchiveFlavour::Lwd
        } else {
            ArchiveFlavour::Lod(LodVersion::Heroes)
        };
        let header = ArchiveHeader::Heroes(HeroesHeader {
            signature,
            version,
            unknown: head[12..dir_start as usize].to_vec(),
        });
        let entries = Self::parse_directory(
            &mut source,
            &layout,
            count as usize,
            &flavour,
            &path,
            file_size,
        )?;
        Ok(Self {
            source,
            path,
            flavour,
            layout,
            header,
            entries,
            pending: Vec::new(),
            file_size,
            tolerant: false,
        })
    }

    fn parse_mm_lod(
        mut source: BufReader<R>,
        path: PathBuf,
        file_size: u64,
        head: Vec<u8>,
    ) -> Result<Self> {
        let tail = read_padded(&mut source, 192)?;
        let mut full = head;
        full.extend_from_slice(&tail);

        let version_str = trim_nul(&full[4..84]);
        let lod_type = trim_nul(&full[256..272]);
        let archive_start = le32(&full, 272);
        let count = u16::from_le_bytes([full[284], full[285]]) as usize;

        let mut version = None;
        for v in LodVersion::MM_VARIANTS {
            if version_str == v.version_str().as_bytes() && lod_type == v.lod_type_str().as_bytes()
            {
                version = Some(v);
                break;
            }
        }
        let Some(mut version) = version else {
            return Err(Error::UnknownFormat { path });
        };

        if u64::from(archive_start) < 288 || u64::from(archive_start) > file_size {
            return Err(Error::CorruptIndex {
                path,
                reason: format!("MM header archive start {archive_start} out of range"),
            });
        }
        let mut additional = vec![0u8; archive_start as usize - 288];
        if source.read_exact(&mut additional).is_err() {
            return Err(Error::CorruptIndex {
                path,
                reason: "header additional data is truncated".into(),
            });
        }

        if version == LodVersion::Games && file_size >= GAMES7_SIG.len() as u64 {
            source.seek(SeekFrom::End(-(GAMES7_SIG.len() as i64)))?;
            let mut sig = [0u8; 16];
            source.read_exact(&mut sig)?;
            if sig == GAMES7_SIG {
                version = LodVersion::Games7;
            }
        }

        let layout = DirectoryLayout::mm(version, archive_start);
        let flavour = ArchiveFlavour::Lod(version);
        let entries =
            Self::parse_directory(&mut source, &layout, count, &flavour, &path, file_size)?;
        let mut archive = Self {
            source,
            path,
            flavour,
            layout,
            header: ArchiveHeader::Mm(MmHeader {
                archive_start,
                additional_data: additional,
            }),
            entries,
            pending: Vec::new(),
            file_size,
            tolerant: false,
        };
        if version == LodVersion::Games {
            archive.detect_games7_by_entries()?;
        }
        Ok(archive)
    }

    /// MM7 maps open with a signature pair; finding one promotes a
    /// GameMMVI archive without the trailing signature to the MM7 variant.
    fn detect_games7_by_entries(&mut self) -> Result<()> {
        for i in 0..self.entries.len() {
            let ext = name_extension(&self.entries[i].name);
            if !matches!(ext.as_str(), "blv" | "dlv" | "odm" | "ddm") {
                continue;
            }
            if self.entries[i].stored_size() < 16 {
                return Ok(());
            }
            let head = self.stored_prefix(i, 8)?;
            if (le32(&head, 0), le32(&head, 4)) == MM7_MAP_SIG {
                self.flavour = ArchiveFlavour::Lod(LodVersion::Games7);
            }
            return Ok(());
        }
        Ok(())
    }

    fn parse_snd(mut source: BufReader<R>, path: PathBuf, file_size: u64) -> Result<Self> {
        if file_size < 4 {
            return Err(Error::UnknownFormat { path });
        }
        source.seek(SeekFrom::Start(0))?;
        let count = source.read_u32::<LittleEndian>()? as usize;

        // The MM variant stores zlib-packed entries; probe the first one
        // for the stream signature.
        let mut mm = false;
        if count > 0 && file_size >= 4 + 0x34 {
            source.seek(SeekFrom::Start(4 + 0x28))?;
            let addr = source.read_u32::<LittleEndian>()?;
            if u64::from(addr) + 2 <= file_size {
                source.seek(SeekFrom::Start(u64::from(addr)))?;
                let mut sig = [0u8; 2];
                source.read_exact(&mut sig)?;
                mm = sig[0] == 0x78 && matches!(sig[1], 0x01 | 0x5E | 0x9C | 0xDA);
            }
        }

        let layout = DirectoryLayout::snd(mm);
        let flavour = ArchiveFlavour::Snd { mm };
        let entries =
            Self::parse_directory(&mut source, &layout, count, &flavour, &path, file_size)?;
        Ok(Self {
            source,
            path,
            flavour,
            layout,
            header: ArchiveHeader::CountOnly,
            entries,
            pending: Vec::new(),
            file_size,
            tolerant: false,
        })
    }

    fn parse_vid(mut source: BufReader<R>, path: PathBuf, file_size: u64) -> Result<Self> {
        if file_size < 4 {
            return Err(Error::UnknownFormat { path });
        }
        source.seek(SeekFrom::Start(0))?;
        let count = source.read_u32::<LittleEndian>()? as usize;

        let layout = DirectoryLayout::vid();
        let flavour = ArchiveFlavour::Vid { no_extension: false };
        let mut entries =
            Self::parse_directory(&mut source, &layout, count, &flavour, &path, file_size)?;

        // Trailing signatures: an optional size table and the
        // no-extension marker.
        let mut size_table: Option<Vec<u32>> = None;
        let mut no_ext_sig = false;
        let mut data_end = file_size;
        if file_size >= 16 {
            source.seek(SeekFrom::End(-16))?;
            let mut sig = [0u8; 16];
            source.read_exact(&mut sig)?;
            let table_bytes = 4 * count as u64;
            if sig == VID_SIZE_SIG_OLD {
                if file_size >= 16 + table_bytes {
                    let table_pos = file_size - 16 - table_bytes;
                    source.seek(SeekFrom::Start(table_pos))?;
                    size_table = Some(read_u32_table(&mut source, count)?);
                    data_end = table_pos;
                }
            } else if sig == VID_SIZE_SIG_END {
                if file_size >= 32 + table_bytes {
                    let start_pos = file_size - 32 - table_bytes;
                    source.seek(SeekFrom::Start(start_pos))?;
                    let mut start_sig = [0u8; 16];
                    source.read_exact(&mut start_sig)?;
                    if start_sig == VID_SIZE_SIG_START {
                        size_table = Some(read_u32_table(&mut source, count)?);
                        data_end = start_pos;
                    }
                }
            } else if sig == VID_SIZE_SIG_NO_EXT {
                no_ext_sig = true;
                data_end = file_size - 16;
            }
        }

        // Derive entry sizes from the size table or from the next
        // referenced address.
        let addrs: Vec<u32> = entries.iter().map(|e| e.offset).collect();
        for (i, entry) in entries.iter_mut().enumerate() {
            let start = u64::from(addrs[i]);
            let mut end = match &size_table {
                Some(table) => start + u64::from(table[i]),
                None => data_end,
            };
            for (j, &a) in addrs.iter().enumerate() {
                let a = u64::from(a);
                if j != i && a >= start && a < end {
                    end = a;
                }
            }
            entry.unpacked_size = end.saturating_sub(start) as u32;
        }

        let mut no_extension = no_ext_sig;
        for e in &entries {
            let ext = name_extension(&e.name);
            if ext.is_empty() {
                no_extension = true;
                break;
            }
            if ext == "smk" {
                break;
            }
        }

        Ok(Self {
            source,
            path,
            flavour: ArchiveFlavour::Vid { no_extension },
            layout,
            header: ArchiveHeader::CountOnly,
            entries,
            pending: Vec::new(),
            file_size,
            tolerant: false,
        })
    }

    fn parse_directory(
        source: &mut BufReader<R>,
        layout: &DirectoryLayout,
        count: usize,
        flavour: &ArchiveFlavour,
        path: &Path,
        file_size: u64,
    ) -> Result<Vec<ArchiveEntry>> {
        let dir_len = count as u64 * layout.record_len as u64;
        if layout.dir_start + dir_len > file_size {
            return Err(Error::CorruptIndex {
                path: path.to_path_buf(),
                reason: format!("directory of {count} records extends past end of file"),
            });
        }
        source.seek(SeekFrom::Start(layout.dir_start))?;
        let mut raw = vec![0u8; dir_len as usize];
        source.read_exact(&mut raw)?;

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let rec = &raw[i * layout.record_len..(i + 1) * layout.record_len];
            let mut name_reader = ByteReader::new(rec);
            let name = name_reader.read_name(layout.name_len)?;

            let addr = le32(rec, layout.addr_offset).wrapping_add(layout.addr_bias);
            let size_field = layout.size_offset.map(|o| le32(rec, o));
            let unpacked_field = layout.unpacked_offset.map(|o| le32(rec, o));
            let packed_field = layout.packed_offset.map(|o| le32(rec, o));

            let stored = match (size_field, packed_field, unpacked_field) {
                (Some(s), _, _) => s,
                (None, Some(p), _) if p != 0 => p,
                (None, _, Some(u)) => u,
                _ => 0,
            };
            let unpacked = unpacked_field.unwrap_or(stored);
            let is_packed = match (packed_field, size_field, unpacked_field) {
                (Some(p), _, _) => p != 0,
                (None, Some(s), Some(u)) => s != u,
                _ => false,
            };

            if entries
                .iter()
                .any(|e: &ArchiveEntry| e.name.eq_ignore_ascii_case(&name))
            {
                tracing::warn!(archive = %path.display(), name = %name, "duplicate entry name in directory");
            }

            entries.push(ArchiveEntry {
                kind: EntryKind::classify(&name, flavour),
                name,
                offset: addr,
                packed_size: if is_packed { stored } else { 0 },
                unpacked_size: unpacked,
                file_type: layout.type_offset.map_or(0, |o| le32(rec, o)),
            });
        }
        Ok(entries)
    }

    fn validate_entries(&self) -> Result<()> {
        for e in &self.entries {
            let start = u64::from(e.offset);
            let end = start + u64::from(e.stored_size());
            if start < self.layout.dir_start || end > self.file_size {
                return Err(Error::CorruptIndex {
                    path: self.path.clone(),
                    reason: format!(
                        "entry '{}' spans {start}..{end} outside the archive of {} bytes",
                        e.name, self.file_size
                    ),
                });
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn flavour(&self) -> ArchiveFlavour {
        self.flavour
    }

    #[must_use]
    pub fn entries(&self) -> &[ArchiveEntry] {
        &self.entries
    }

    #[must_use]
    pub fn entry(&self, index: usize) -> Option<&ArchiveEntry> {
        self.entries.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn archive_size(&self) -> u64 {
        self.file_size
    }

    /// Tolerant mode recovers what it can from damaged zlib streams and
    /// zero-fills the remainder instead of failing.
    pub fn set_tolerant(&mut self, tolerant: bool) {
        self.tolerant = tolerant;
    }

    #[must_use]
    pub fn is_tolerant(&self) -> bool {
        self.tolerant
    }

    /// Case-insensitive entry lookup.
    #[must_use]
    pub fn find(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Indices of entries matching a glob pattern (all when `None`).
    #[must_use]
    pub fn matching_indices(&self, pattern: Option<&str>) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, e)| pattern.map_or(true, |p| matches_glob(p, &e.name)))
            .map(|(i, _)| i)
            .collect()
    }

    pub(super) fn stored_bytes_at(
        &mut self,
        offset: u64,
        len: usize,
        name: &str,
    ) -> Result<Vec<u8>> {
        self.source.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; len];
        if self.source.read_exact(&mut buf).is_err() {
            return Err(Error::CorruptEntry {
                name: name.to_string(),
                reason: "stored data is out of range".into(),
            });
        }
        Ok(buf)
    }

    /// The entry's stored bytes, still compressed when packed.
    ///
    /// # Errors
    /// Returns [`Error::CorruptEntry`] when the stored range is
    /// unreadable.
    pub fn stored_bytes(&mut self, index: usize) -> Result<Vec<u8>> {
        let e = self.entry_checked(index)?.clone();
        self.stored_bytes_at(u64::from(e.offset), e.stored_size() as usize, &e.name)
    }

    fn stored_prefix(&mut self, index: usize, len: usize) -> Result<Vec<u8>> {
        let e = self.entry_checked(index)?.clone();
        let len = len.min(e.stored_size() as usize);
        self.stored_bytes_at(u64::from(e.offset), len, &e.name)
    }

    /// Open an entry: the stored bytes piped through the zlib codec when
    /// the entry is packed, yielding exactly `unpacked_size` bytes.
    ///
    /// # Errors
    /// Returns [`Error::DecompressionMismatch`] on codec failures unless
    /// the archive is in tolerant mode.
    pub fn open_entry(&mut self, index: usize) -> Result<EntryData> {
        let e = self.entry_checked(index)?.clone();
        let stored = self.stored_bytes_at(u64::from(e.offset), e.stored_size() as usize, &e.name)?;
        let bytes = if e.is_packed() {
            if self.tolerant {
                compression::decompress_tolerant(&stored, e.unpacked_size as usize)
            } else {
                compression::decompress(&stored, e.unpacked_size as usize)?
            }
        } else {
            stored
        };
        Ok(EntryData {
            name: e.name,
            bytes,
        })
    }

    /// The entry's unpacked bytes.
    ///
    /// # Errors
    /// Same as [`Archive::open_entry`].
    pub fn entry_data(&mut self, index: usize) -> Result<Vec<u8>> {
        Ok(self.open_entry(index)?.bytes)
    }

    pub(super) fn entry_checked(&self, index: usize) -> Result<&ArchiveEntry> {
        self.entries
            .get(index)
            .ok_or_else(|| Error::Usage(format!("entry index {index} out of range")))
    }
}

fn read_padded<R: Read>(source: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; n];
    let mut filled = 0;
    while filled < n {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(k) => filled += k,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(buf)
}

fn read_u32_table<R: Read>(source: &mut R, count: usize) -> Result<Vec<u32>> {
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
        table.push(source.read_u32::<LittleEndian>()?);
    }
    Ok(table)
}

pub(super) fn le32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

fn trim_nul(bytes: &[u8]) -> &[u8] {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    &bytes[..end]
}
