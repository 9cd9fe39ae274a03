//! Types for LOD-family archive handling.

use crate::utils::name_extension;

/// Sub-type of a `LOD\0`-family archive, following the legacy version and
/// lod-type strings stored in the MM header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LodVersion {
    /// Heroes LOD (simple header, per-entry zlib).
    Heroes,
    /// MM6 bitmaps.lod.
    Bitmaps,
    /// MM6 icons.lod.
    Icons,
    /// MM6 sprites.lod.
    Sprites,
    /// MM6 games.lod (maps).
    Games,
    /// MM7 games.lod, distinguished by map signatures.
    Games7,
    /// MM6 new.lod (chapter).
    Chapter,
    /// MM7 new.lod (chapter).
    Chapter7,
    /// MM8 per-language LOD with wide name fields.
    Mm8,
}

impl LodVersion {
    /// MM variants in header-detection order.
    pub(crate) const MM_VARIANTS: [LodVersion; 8] = [
        LodVersion::Bitmaps,
        LodVersion::Icons,
        LodVersion::Sprites,
        LodVersion::Games,
        LodVersion::Games7,
        LodVersion::Chapter,
        LodVersion::Chapter7,
        LodVersion::Mm8,
    ];

    /// The version string stored at offset 4 of the MM header.
    #[must_use]
    pub(crate) fn version_str(self) -> &'static str {
        match self {
            LodVersion::Heroes => "",
            LodVersion::Bitmaps
            | LodVersion::Icons
            | LodVersion::Sprites
            | LodVersion::Chapter => "MMVI",
            LodVersion::Games | LodVersion::Games7 => "GameMMVI",
            LodVersion::Chapter7 => "MMVII",
            LodVersion::Mm8 => "MMVIII",
        }
    }

    /// The lod-type string stored at offset 256 of the MM header.
    #[must_use]
    pub(crate) fn lod_type_str(self) -> &'static str {
        match self {
            LodVersion::Heroes => "",
            LodVersion::Bitmaps => "bitmaps",
            LodVersion::Icons => "icons",
            LodVersion::Sprites => "sprites08",
            LodVersion::Games | LodVersion::Games7 => "maps",
            LodVersion::Chapter | LodVersion::Chapter7 => "chapter",
            LodVersion::Mm8 => "language",
        }
    }

    /// The description string stored at offset 84 of the MM header.
    #[must_use]
    pub(crate) fn description(self) -> &'static str {
        match self {
            LodVersion::Heroes => "",
            LodVersion::Bitmaps => "Bitmaps for MMVI.",
            LodVersion::Icons => "Icons for MMVI.",
            LodVersion::Sprites => "Sprites for MMVI.",
            LodVersion::Games | LodVersion::Games7 => "Maps for MMVI",
            LodVersion::Chapter => "newmaps for MMVI",
            LodVersion::Chapter7 => "newmaps for MMVII",
            LodVersion::Mm8 => "Language for MMVIII.",
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            LodVersion::Heroes => "Heroes",
            LodVersion::Bitmaps => "MM6 bitmaps",
            LodVersion::Icons => "MM6 icons",
            LodVersion::Sprites => "MM6 sprites",
            LodVersion::Games => "MM6 maps",
            LodVersion::Games7 => "MM7 maps",
            LodVersion::Chapter => "MM6 chapter",
            LodVersion::Chapter7 => "MM7 chapter",
            LodVersion::Mm8 => "MM8 language",
        }
    }
}

/// Detected archive flavour. Fixes the header shape, directory record
/// layout, and per-entry compression semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFlavour {
    Lod(LodVersion),
    /// SND sound archive; the MM variant carries an unpacked-size column.
    Snd { mm: bool },
    /// VID video archive; sizes are derived from neighbouring offsets.
    Vid { no_extension: bool },
    /// LWD transparent-bitmap archive (Heroes LOD container).
    Lwd,
}

impl ArchiveFlavour {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveFlavour::Lod(v) => v.as_str(),
            ArchiveFlavour::Snd { mm: true } => "SND (MM)",
            ArchiveFlavour::Snd { mm: false } => "SND",
            ArchiveFlavour::Vid { .. } => "VID",
            ArchiveFlavour::Lwd => "LWD",
        }
    }

    /// Whether entries may be zlib-packed at the archive level.
    #[must_use]
    pub fn supports_packed_entries(&self) -> bool {
        matches!(
            self,
            ArchiveFlavour::Lod(LodVersion::Heroes) | ArchiveFlavour::Lwd | ArchiveFlavour::Snd { mm: true }
        )
    }
}

/// Rough content classification for listings and extraction naming.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Def,
    Pcx,
    Bitmap,
    Sprite,
    Palette,
    Sound,
    Video,
    Text,
    Data,
}

impl EntryKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EntryKind::Def => "def",
            EntryKind::Pcx => "pcx",
            EntryKind::Bitmap => "bitmap",
            EntryKind::Sprite => "sprite",
            EntryKind::Palette => "palette",
            EntryKind::Sound => "sound",
            EntryKind::Video => "video",
            EntryKind::Text => "text",
            EntryKind::Data => "data",
        }
    }

    pub(crate) fn classify(name: &str, flavour: &ArchiveFlavour) -> Self {
        match flavour {
            ArchiveFlavour::Snd { .. } => return EntryKind::Sound,
            ArchiveFlavour::Vid { .. } => return EntryKind::Video,
            ArchiveFlavour::Lod(LodVersion::Sprites) => return EntryKind::Sprite,
            ArchiveFlavour::Lod(
                LodVersion::Bitmaps | LodVersion::Icons | LodVersion::Mm8,
            ) => {
                if is_palette_name(name) {
                    return EntryKind::Palette;
                }
                return EntryKind::Bitmap;
            }
            _ => {}
        }
        match name_extension(name).as_str() {
            "def" => EntryKind::Def,
            "pcx" => EntryKind::Pcx,
            "bmp" => EntryKind::Bitmap,
            "pal" | "act" => EntryKind::Palette,
            "txt" => EntryKind::Text,
            "wav" => EntryKind::Sound,
            "smk" | "bik" => EntryKind::Video,
            _ => EntryKind::Data,
        }
    }
}

fn is_palette_name(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.strip_prefix("pal").is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
}

/// One directory entry, normalised across flavours.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    /// Entry name (unique within the archive, case-insensitive).
    pub name: String,
    /// Absolute offset of the stored bytes.
    pub offset: u32,
    /// Stored size when zlib-packed, 0 when stored uncompressed.
    pub packed_size: u32,
    /// Logical (unpacked) size.
    pub unpacked_size: u32,
    /// Raw directory `type` dword where the flavour has one, preserved on
    /// rebuild.
    pub file_type: u32,
    /// Content classification.
    pub kind: EntryKind,
}

impl ArchiveEntry {
    #[must_use]
    pub fn is_packed(&self) -> bool {
        self.packed_size != 0
    }

    /// Number of bytes the entry occupies in the payload region.
    #[must_use]
    pub fn stored_size(&self) -> u32 {
        if self.packed_size != 0 {
            self.packed_size
        } else {
            self.unpacked_size
        }
    }
}

/// Heroes-style archive header, preserved verbatim apart from the count.
#[derive(Debug, Clone)]
pub(crate) struct HeroesHeader {
    pub signature: [u8; 4],
    #[allow(dead_code)]
    pub version: u32,
    /// Bytes between the count field and the directory (80 for `LOD\0`,
    /// 84 for the legacy signature).
    pub unknown: Vec<u8>,
}

/// Structured 288-byte MM header.
#[derive(Debug, Clone)]
pub(crate) struct MmHeader {
    pub archive_start: u32,
    /// Bytes between the fixed header and the directory, preserved
    /// verbatim.
    pub additional_data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub(crate) enum ArchiveHeader {
    Heroes(HeroesHeader),
    Mm(MmHeader),
    /// SND and VID archives have only the leading entry count.
    CountOnly,
}
