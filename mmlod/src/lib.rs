//! mmlod - Native Rust implementation of the MMArchive toolkit core
//!
//! This crate provides low-level access to the archive and sprite formats
//! used by the Heroes series and its Might & Magic siblings: LOD-family
//! archives (LOD, SND, VID, LWD) and DEF sprite/animation files.

pub mod archive;
pub mod compose;
pub mod compression;
pub mod config;
pub mod def;
pub mod error;
pub mod hdl;
pub mod pixels;
pub mod reader;
pub mod utils;

// Re-exports for convenience
pub use error::{Error, Result};

/// Prelude module for common imports
pub mod prelude {
    pub use crate::archive::{Archive, ArchiveEntry, ArchiveFlavour, EntryKind, LodVersion};
    pub use crate::compose::{AnimationSink, ComposeOptions, ComposedFrame, CropMode, ShadowMode};
    pub use crate::config::DefConfig;
    pub use crate::def::{DefBuilder, DefFrame, DefSprite};
    pub use crate::error::{Error, Result};
}

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
