//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading a trace
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No trace found under {0}")]
    NoTraceFound(PathBuf),

    #[error("Invalid trace metadata: {0}")]
    Metadata(String),

    #[error("Failed to decode {file} at bit {bit_offset}: {message}")]
    Decode {
        file: PathBuf,
        bit_offset: u64,
        message: String,
    },

    #[error("Invalid text trace line {line}: {message}")]
    TextFormat { line: usize, message: String },
}

/// Errors that can occur while scanning run windows
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Event '{event}' at {timestamp} has no integer field '{field}'")]
    MissingField {
        event: String,
        field: String,
        timestamp: i64,
    },

    #[error("Chunk stop for [{start_ofs}, {stop_ofs}) stage {stage} at {timestamp} has no matching start")]
    UnmatchedChunkStop {
        start_ofs: u64,
        stop_ofs: u64,
        stage: i64,
        timestamp: i64,
    },

    #[error("Run stop at {stop} does not follow run start at {start}")]
    NonPositiveRuntime { start: i64, stop: i64 },

    #[error("No run window starts at event index {0}")]
    NotARunStart(usize),

    #[error("Run starting at event index {0} is never stopped")]
    UnterminatedRun(usize),
}

/// Errors that can occur while computing statistics
#[derive(Error, Debug, PartialEq)]
pub enum StatsError {
    #[error("Series lengths differ ({0} vs {1})")]
    LengthMismatch(usize, usize),

    #[error("Need at least 2 samples, got {0}")]
    NotEnoughSamples(usize),

    #[error("Series is constant, correlation is undefined")]
    ConstantInput,

    #[error("Invalid test distribution: {0}")]
    Distribution(String),
}

/// Errors that can occur during chart generation
#[derive(Error, Debug)]
pub enum ChartError {
    #[error("Empty dataset")]
    EmptyDataset,

    #[error("Chunk [{start_ofs}, {stop_ofs}) has no complete stage {stage} interval")]
    MissingStageInterval {
        start_ofs: u64,
        stop_ofs: u64,
        stage: i64,
    },

    #[error("Run has no chunk starting at offset 0, cannot derive axis ticks")]
    MissingChunkSize,

    #[error("Run has no chunks, cannot derive axis extent")]
    MissingInputSize,

    #[error("Chunk size is zero")]
    ZeroChunkSize,
}

/// Errors that can occur during file output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[from] std::io::Error),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),

    #[error("Invalid output content: {0}")]
    InvalidContent(String),
}

/// Errors that can occur while loading an analysis config
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
