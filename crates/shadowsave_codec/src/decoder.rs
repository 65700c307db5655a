//! Marker reader.

use crate::error::{MarkerError, MarkerResult};
use crate::record::{MarkerRecord, MARKER_VERSION};
use std::fs;
use std::io;
use std::path::Path;

/// Decodes a record from bytes.
///
/// Returns a description of the problem when the bytes are not a
/// well-formed record of a supported version.
pub fn decode(bytes: &[u8]) -> Result<MarkerRecord, String> {
    let record: MarkerRecord = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
    if record.version > MARKER_VERSION {
        return Err(format!(
            "unsupported marker version {} (supported up to {MARKER_VERSION})",
            record.version
        ));
    }
    Ok(record)
}

/// Reads a marker file.
///
/// Returns `Ok(None)` if the file does not exist.
///
/// # Errors
///
/// - [`MarkerError::Parse`] if the file exists but is malformed
/// - [`MarkerError::Io`] if the file exists but cannot be read
pub fn read_marker(path: &Path) -> MarkerResult<Option<MarkerRecord>> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MarkerError::io(path, e)),
    };

    decode(&data)
        .map(Some)
        .map_err(|message| MarkerError::parse(path, message))
}
