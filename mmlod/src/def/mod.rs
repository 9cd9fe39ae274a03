//! DEF sprite/animation format.
//!
//! A DEF is a 16-byte header, a 256-colour palette, a group table (named
//! frames with body offsets), and per-frame pixel blocks in one of four
//! encodings. The decoder yields palettised frames with their placement
//! on the full canvas; the encoder is its exact inverse.

mod decoder;
mod encoder;
mod types;

pub use decoder::DefSprite;
pub use encoder::{encode_frame, DefBuilder};
pub use types::{DefFrame, DefGroup, DefHeader, FramePlanes};

pub use crate::pixels::Palette;

/// `def_type` values the decoder recognises.
pub const RECOGNISED_DEF_TYPES: [u32; 7] = [0x40, 0x42, 0x43, 0x44, 0x46, 0x47, 0x49];

/// Known DEF type codes with group-name tables or crop semantics.
pub const DEF_TYPE_SPELL: u32 = 0x40;
pub const DEF_TYPE_CREATURE: u32 = 0x42;
pub const DEF_TYPE_MAP_CREATURE: u32 = 0x43;
pub const DEF_TYPE_MAP_OBJECT: u32 = 0x44;
pub const DEF_TYPE_HERO: u32 = 0x49;

/// Default frame encoding used when the caller expresses no preference.
pub const DEFAULT_ENCODING: u32 = 2;

/// Shadow plane filler marking "no shadow here".
pub(crate) const NO_SHADOW: u8 = 0xFF;

/// Width of a fixed frame-name field in the group table.
pub(crate) const FRAME_NAME_LEN: usize = 13;

/// Size of the on-disk frame header.
pub(crate) const FRAME_HEADER_LEN: usize = 32;

/// Header plus palette.
pub(crate) const GROUP_TABLE_START: usize = 16 + 768;
