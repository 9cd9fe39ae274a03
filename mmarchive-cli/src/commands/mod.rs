use std::path::{Path, PathBuf};

use clap::Subcommand;

pub mod add;
pub mod extract;
pub mod extractdef;
pub mod extractwebp;
pub mod list;
pub mod testdef;

#[derive(Subcommand)]
pub enum Commands {
    /// List entries in an archive
    List {
        /// Archive file (.lod, .snd, .vid, .lwd)
        archive: PathBuf,

        /// Only list entries matching a glob pattern (e.g. "*.def")
        #[arg(short, long)]
        filter: Option<String>,
    },

    /// Extract entries from an archive
    Extract {
        /// Archive file
        archive: PathBuf,

        /// Output directory (defaults next to the archive)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Only extract entries matching a glob pattern
        #[arg(short, long)]
        filter: Option<String>,

        /// Fail on the first unpacking error instead of skipping
        #[arg(long)]
        strict_errors: bool,

        /// Write stored bytes verbatim, skipping image conversion
        #[arg(long)]
        raw: bool,
    },

    /// Add or replace one file in an archive, rebuilding it
    Add {
        /// Archive file
        archive: PathBuf,

        /// File to add; its base name becomes the entry name
        file: PathBuf,
    },

    /// Extract DEF files as per-frame bitmaps plus DefTool manifests
    Extractdef {
        /// Archive or stand-alone .def file
        source: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Skip the external shadow directory
        #[arg(long)]
        no_shadow: bool,

        /// Write 24-bit bitmaps instead of palettised ones
        #[arg(long = "24bits")]
        in_24_bits: bool,

        /// Fail on the first DEF error instead of skipping
        #[arg(long)]
        strict_errors: bool,
    },

    /// Extract DEF files as animated images with computed frame durations
    Extractwebp {
        /// Archive, stand-alone .def file, or directory
        source: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Disable cropping, optionally only for the listed def types
        /// (e.g. --no-crop 2,4)
        #[arg(long, num_args = 0..=1, value_name = "TYPES")]
        no_crop: Option<Option<String>>,

        /// Crop to each group's tight bounding box instead of the
        /// predefined rectangles
        #[arg(long)]
        individual_crop: bool,

        /// Prefer HotA names and palette fixes
        #[arg(long)]
        hota: bool,

        /// Read HDL manifests and bitmaps instead of DEFs
        #[arg(long)]
        hdl_structure: bool,

        /// Treat main frames as carrying their own shadows
        #[arg(long)]
        shadow_in_main: bool,

        /// Fail on the first DEF error instead of skipping
        #[arg(long)]
        strict_errors: bool,

        /// JSON configuration overriding the built-in tables
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Decode DEF files without writing anything
    Testdef {
        /// Archive, stand-alone .def file, or directory
        source: PathBuf,

        /// Fail on the first DEF error
        #[arg(long)]
        strict_errors: bool,
    },
}

impl Commands {
    pub fn execute(self) -> anyhow::Result<()> {
        match self {
            Commands::List { archive, filter } => list::execute(&archive, filter.as_deref()),
            Commands::Extract {
                archive,
                output,
                filter,
                strict_errors,
                raw,
            } => extract::execute(&archive, output, filter.as_deref(), strict_errors, raw),
            Commands::Add { archive, file } => add::execute(&archive, &file),
            Commands::Extractdef {
                source,
                output,
                no_shadow,
                in_24_bits,
                strict_errors,
            } => extractdef::execute(&source, output, no_shadow, in_24_bits, strict_errors),
            Commands::Extractwebp {
                source,
                output,
                no_crop,
                individual_crop,
                hota,
                hdl_structure,
                shadow_in_main,
                strict_errors,
                config,
            } => extractwebp::execute(extractwebp::Args {
                source,
                output,
                no_crop,
                individual_crop,
                hota,
                hdl_structure,
                shadow_in_main,
                strict_errors,
                config,
            }),
            Commands::Testdef {
                source,
                strict_errors,
            } => testdef::execute(&source, strict_errors),
        }
    }
}

/// Default output directory next to the source, in the legacy naming
/// style (`data.lod` -> `data_webp/`).
pub(crate) fn default_output(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().replace('.', "_"))
        .unwrap_or_else(|| "out".to_string());
    source
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(format!("{stem}{suffix}"))
}

/// Lowercase extension of a path.
pub(crate) fn path_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default()
}

/// File stem as an owned string.
pub(crate) fn path_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}
