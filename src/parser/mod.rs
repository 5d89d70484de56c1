//! Trace loading.
//!
//! This module handles:
//! - Decoding CTF trace directories (LTTng-UST output)
//! - Parsing babeltrace text dumps
//! - Presenting both as one timestamp-ordered list of [`Event`]s

pub mod ctf;
pub mod event;
pub mod text;

pub use event::{Event, FieldValue};

use crate::utils::error::TraceError;
use clap::ValueEnum;
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Input format of a trace path
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TraceFormat {
    /// CTF for directories, text dump for regular files
    #[default]
    Auto,
    /// CTF trace directory, searched recursively
    Ctf,
    /// babeltrace text output
    Text,
}

impl TraceFormat {
    /// Concrete format for `path`
    pub fn resolve(self, path: &Path) -> Self {
        match self {
            Self::Auto if path.is_dir() => Self::Ctf,
            Self::Auto => Self::Text,
            other => other,
        }
    }
}

/// Load a trace as an ordered event list
///
/// **Public** - main entry point for reading traces
///
/// # Arguments
/// * `path` - Trace directory or text dump
/// * `format` - Input format, `Auto` picks by path type
///
/// # Errors
/// * `TraceError::NoTraceFound` - Path does not exist or holds no trace
/// * Any decoding error of the selected reader
pub fn load_trace(path: &Path, format: TraceFormat) -> Result<Vec<Event>, TraceError> {
    if !path.exists() {
        return Err(TraceError::NoTraceFound(path.to_path_buf()));
    }

    let format = format.resolve(path);
    debug!("Reading {} as {:?}", path.display(), format);

    match format {
        TraceFormat::Ctf => ctf::load_ctf(path),
        TraceFormat::Text | TraceFormat::Auto => text::load_text(path),
    }
}
