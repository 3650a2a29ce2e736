//! Exit codes following sysexits.h conventions.
//!
//! Scripts driving `coverscan` can tell "nothing matched" apart from a broken
//! camera directory or an unreachable Discogs API.

use coverscan_core::{CoverscanError, FaultKind};

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// General error (catch-all).
pub const GENERAL_ERROR: i32 = 1;

/// Command line usage or configuration error.
/// Maps to EX_USAGE from sysexits.h.
pub const USAGE_ERROR: i32 = 64;

/// The image was read but matched nothing in the catalog.
/// Maps to EX_DATAERR from sysexits.h.
pub const NO_MATCH: i32 = 65;

/// Cannot open or decode the input image or frames directory.
/// Maps to EX_NOINPUT from sysexits.h.
pub const INPUT_ERROR: i32 = 66;

/// Service unavailable (Discogs API, image CDN).
/// Maps to EX_UNAVAILABLE from sysexits.h.
pub const NETWORK_ERROR: i32 = 69;

/// Catalog snapshot could not be read or written.
/// Maps to EX_IOERR from sysexits.h.
pub const IO_ERROR: i32 = 74;

/// Represents an exit code with optional error context.
pub struct ExitCode {
    pub code: i32,
    pub message: Option<String>,
}

impl ExitCode {
    pub const fn success() -> Self {
        Self {
            code: SUCCESS,
            message: None,
        }
    }

    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");

        let code = if let Some(kind) = err.downcast_ref::<FaultKind>() {
            code_for_fault(*kind)
        } else {
            err.chain()
                .find_map(|cause| cause.downcast_ref::<CoverscanError>())
                .map(code_for)
                .unwrap_or_else(|| code_for_message(&message))
        };

        Self {
            code,
            message: Some(message),
        }
    }
}

fn code_for(err: &CoverscanError) -> i32 {
    match err {
        CoverscanError::Decode(_) | CoverscanError::FrameSource(_) => INPUT_ERROR,
        CoverscanError::Fetch(_) | CoverscanError::Http(_) => NETWORK_ERROR,
        CoverscanError::StoreIo { .. } | CoverscanError::Serialization(_) => IO_ERROR,
        CoverscanError::Config(_) => USAGE_ERROR,
        _ => GENERAL_ERROR,
    }
}

fn code_for_fault(kind: FaultKind) -> i32 {
    match kind {
        FaultKind::FrameSource => INPUT_ERROR,
        FaultKind::Matching => GENERAL_ERROR,
    }
}

/// Classify errors raised by the CLI itself from their context text.
fn code_for_message(message: &str) -> i32 {
    if message.contains("No match found") {
        NO_MATCH
    } else if message.contains("Failed to read image")
        || message.contains("Failed to read frames")
        || message.contains("Failed to read records")
    {
        INPUT_ERROR
    } else if message.contains("Discogs") || message.contains("network") {
        NETWORK_ERROR
    } else if message.contains("Failed to write") {
        IO_ERROR
    } else {
        GENERAL_ERROR
    }
}
