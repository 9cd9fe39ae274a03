//! LOD-family archive engine.
//!
//! One engine covers every directory-plus-payload container the legacy
//! games use: Heroes LOD (and the HotA variant), the MM6/MM7/MM8 LOD
//! family, SND sound archives, VID video archives, and LWD. Flavours
//! differ only in header shape and directory record layout; the record
//! geometry for each lives in [`layout`].

mod images;
mod layout;
mod reader;
mod types;
mod writer;

pub use reader::{Archive, EntryData};
pub use types::{ArchiveEntry, ArchiveFlavour, EntryKind, LodVersion};

pub(crate) use layout::DirectoryLayout;

/// Magic of `LOD\0`-signed archives (Heroes and the MM family).
pub(crate) const LOD_MAGIC: [u8; 4] = [b'L', b'O', b'D', 0];

/// First byte of the legacy Heroes signature (`C8 'LOD'`).
pub(crate) const HEROES_LEGACY_ID: u8 = 0xC8;

/// Trailing signature marking a GameMMVI archive as the MM7 variant.
pub(crate) const GAMES7_SIG: [u8; 16] = [
    0x3E, 0xB9, 0xC5, 0xC5, 0x79, 0x47, 0x48, 0xBD, 0x91, 0x3A, 0xAC, 0xEB, 0x28, 0xEB, 0xE0,
    0x15,
];

// VID archives carry no per-entry sizes; these trailing signatures mark an
// optional size table appended after the payload region.
pub(crate) const VID_SIZE_SIG_OLD: [u8; 16] = GAMES7_SIG;
pub(crate) const VID_SIZE_SIG_START: [u8; 16] = [
    0x87, 0x03, 0xC2, 0x4E, 0x26, 0xCF, 0x4C, 0xC6, 0x97, 0xDD, 0xE2, 0xEC, 0xAE, 0xBE, 0xCD,
    0xB4,
];
pub(crate) const VID_SIZE_SIG_END: [u8; 16] = [
    0x0B, 0x74, 0x52, 0x46, 0x76, 0x09, 0x4D, 0x9F, 0xAF, 0xE5, 0x3F, 0x7E, 0x9B, 0x23, 0x78,
    0x0E,
];
pub(crate) const VID_SIZE_SIG_NO_EXT: [u8; 16] = [
    0x3F, 0x78, 0xDE, 0x47, 0xE9, 0x2E, 0x40, 0x65, 0x9A, 0xF1, 0x74, 0xBB, 0xAE, 0x9D, 0x77,
    0xD7,
];

/// Signature pair at the start of MM7 map entries (`.blv`/`.odm`).
pub(crate) const MM7_MAP_SIG: (u32, u32) = (0x0001_6741, 0x6969_766D);

/// Entries shorter than this are never worth compressing.
pub(crate) const MIN_COMPRESS_SIZE: usize = 64;
