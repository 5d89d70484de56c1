//! Common Trace Format (CTF 1.8) reader.
//!
//! A trace is a directory holding a `metadata` file and one or more binary
//! stream files. Directories are searched recursively, so pointing the tool
//! at an LTTng session output (`ust/uid/1000/64-bit/...`) works.

pub mod bits;
pub mod decoder;
pub mod lexer;
pub mod metadata;

pub use decoder::{decode_stream, CTF_MAGIC};
pub use metadata::{parse_metadata, Metadata};

use crate::parser::event::Event;
use crate::utils::error::TraceError;
use log::{debug, info};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Magic number of a packetized metadata stream
pub const METADATA_MAGIC: u32 = 0x75D1_1D57;

/// Size in bytes of a packetized metadata packet header
const METADATA_HEADER_LEN: usize = 37;

pub const METADATA_FILE: &str = "metadata";

/// Find every trace directory under `root`
///
/// **Public** - a trace directory is any directory holding a `metadata` file
pub fn find_trace_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file() && entry.file_name() == METADATA_FILE)
        .filter_map(|entry| entry.path().parent().map(Path::to_path_buf))
        .collect();
    dirs.sort();
    dirs
}

/// Read the metadata text of one trace, unwrapping packetized metadata
pub fn read_metadata(trace_dir: &Path) -> Result<String, TraceError> {
    let path = trace_dir.join(METADATA_FILE);
    let bytes = fs::read(&path).map_err(|source| TraceError::Io {
        path: path.clone(),
        source,
    })?;
    metadata_text(&bytes)
}

/// Metadata text from raw file contents, plain or packetized
pub fn metadata_text(bytes: &[u8]) -> Result<String, TraceError> {
    let Some(magic) = bytes.get(..4) else {
        return Ok(String::from_utf8_lossy(bytes).into_owned());
    };
    let magic_le = u32::from_le_bytes([magic[0], magic[1], magic[2], magic[3]]);
    let magic_be = u32::from_be_bytes([magic[0], magic[1], magic[2], magic[3]]);

    if magic_le == METADATA_MAGIC {
        unpacketize(bytes, u32::from_le_bytes)
    } else if magic_be == METADATA_MAGIC {
        unpacketize(bytes, u32::from_be_bytes)
    } else {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn unpacketize(bytes: &[u8], read_u32: fn([u8; 4]) -> u32) -> Result<String, TraceError> {
    let word = |at: usize| -> Option<u32> {
        bytes
            .get(at..at + 4)
            .map(|b| read_u32([b[0], b[1], b[2], b[3]]))
    };

    let mut text = Vec::with_capacity(bytes.len());
    let mut offset = 0;
    let mut packets = 0;

    while offset < bytes.len() {
        let malformed = |message: &str| {
            TraceError::Metadata(format!(
                "packetized metadata at byte {}: {}",
                offset, message
            ))
        };

        if word(offset) != Some(METADATA_MAGIC) {
            return Err(malformed("bad packet magic"));
        }
        // magic(4) uuid(16) checksum(4) content_size(4) packet_size(4) ...
        let content_bits = word(offset + 24).ok_or_else(|| malformed("truncated header"))?;
        let packet_bits = word(offset + 28).ok_or_else(|| malformed("truncated header"))?;
        if bytes.get(offset + 32).copied().unwrap_or(0) != 0 {
            return Err(malformed("compressed metadata is not supported"));
        }

        let content_len = (content_bits / 8) as usize;
        let packet_len = (packet_bits / 8) as usize;
        if content_len < METADATA_HEADER_LEN || packet_len < content_len {
            return Err(malformed("invalid packet sizes"));
        }
        let body = bytes
            .get(offset + METADATA_HEADER_LEN..offset + content_len)
            .ok_or_else(|| malformed("packet runs past end of file"))?;
        text.extend_from_slice(body);

        offset += packet_len;
        packets += 1;
    }

    debug!("Unpacked {} metadata packets", packets);
    Ok(String::from_utf8_lossy(&text).into_owned())
}

/// Stream files of a trace directory
///
/// Skips the metadata file, hidden files and the `index` directory.
fn stream_files(trace_dir: &Path) -> Result<Vec<PathBuf>, TraceError> {
    let io_error = |source| TraceError::Io {
        path: trace_dir.to_path_buf(),
        source,
    };

    let mut files = Vec::new();
    for entry in fs::read_dir(trace_dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == METADATA_FILE || name.starts_with('.') {
            continue;
        }
        if entry.file_type().map_err(io_error)?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

/// Read all events of one trace directory, unsorted
pub fn read_trace_dir(trace_dir: &Path) -> Result<Vec<Event>, TraceError> {
    let meta = parse_metadata(&read_metadata(trace_dir)?)?;

    let mut events = Vec::new();
    for file in stream_files(trace_dir)? {
        let data = fs::read(&file).map_err(|source| TraceError::Io {
            path: file.clone(),
            source,
        })?;
        events.extend(decode_stream(&meta, &data, &file)?);
    }
    Ok(events)
}

/// Load every CTF trace under `root` as one timestamp-ordered event list
///
/// **Public** - entry point for directory inputs
///
/// # Errors
/// * `TraceError::NoTraceFound` - no directory under `root` has a metadata file
/// * Any metadata or stream decoding error, which aborts the whole load
pub fn load_ctf(root: &Path) -> Result<Vec<Event>, TraceError> {
    let dirs = find_trace_dirs(root);
    if dirs.is_empty() {
        return Err(TraceError::NoTraceFound(root.to_path_buf()));
    }

    let mut events = Vec::new();
    for dir in &dirs {
        let before = events.len();
        events.extend(read_trace_dir(dir)?);
        debug!("{}: {} events", dir.display(), events.len() - before);
    }

    // Stable, so events sharing a timestamp keep their stream order
    events.sort_by_key(|e| e.timestamp);

    info!(
        "Loaded {} events from {} CTF trace(s)",
        events.len(),
        dirs.len()
    );
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn packet(text: &str, padding: usize) -> Vec<u8> {
        let content = METADATA_HEADER_LEN + text.len();
        let total = content + padding;
        let mut out = Vec::new();
        out.extend_from_slice(&METADATA_MAGIC.to_le_bytes());
        out.extend_from_slice(&[0u8; 16]);
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&((content * 8) as u32).to_le_bytes());
        out.extend_from_slice(&((total * 8) as u32).to_le_bytes());
        out.extend_from_slice(&[0, 0, 0, 1, 8]);
        out.extend_from_slice(text.as_bytes());
        out.resize(total, 0);
        out
    }

    #[test]
    fn test_plain_metadata_passthrough() {
        let text = "/* CTF 1.8 */\ntrace { major = 1; };";
        assert_eq!(metadata_text(text.as_bytes()).unwrap(), text);
    }

    #[test]
    fn test_packetized_metadata() {
        let mut bytes = packet("trace { major = 1; ", 11);
        bytes.extend(packet("minor = 8; };", 0));
        assert_eq!(
            metadata_text(&bytes).unwrap(),
            "trace { major = 1; minor = 8; };"
        );
    }

    #[test]
    fn test_packetized_metadata_truncated() {
        let mut bytes = packet("trace { major = 1; };", 0);
        bytes.truncate(bytes.len() - 4);
        assert!(matches!(
            metadata_text(&bytes),
            Err(TraceError::Metadata(_))
        ));
    }

    #[test]
    fn test_find_trace_dirs_recursive() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("ust/uid/1000/64-bit");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(METADATA_FILE), "").unwrap();
        fs::create_dir_all(root.path().join("empty")).unwrap();

        assert_eq!(find_trace_dirs(root.path()), vec![nested]);
    }

    #[test]
    fn test_load_ctf_without_trace() {
        let root = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_ctf(root.path()),
            Err(TraceError::NoTraceFound(_))
        ));
    }
}
