//! Log writer module
//!
//! Resolves where each log stream goes: a file when one is configured,
//! stdout (access) or stderr (diagnostics) otherwise.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Writer for access log lines
pub fn access_writer(path: Option<&str>) -> io::Result<BoxMakeWriter> {
    Ok(match path {
        Some(p) => BoxMakeWriter::new(Mutex::new(open_log_file(p)?)),
        None => BoxMakeWriter::new(io::stdout),
    })
}

/// Writer for diagnostics (startup, warnings, errors)
pub fn error_writer(path: Option<&str>) -> io::Result<BoxMakeWriter> {
    Ok(match path {
        Some(p) => BoxMakeWriter::new(Mutex::new(open_log_file(p)?)),
        None => BoxMakeWriter::new(io::stderr),
    })
}

/// Open or create a log file for appending
fn open_log_file(path: &str) -> io::Result<File> {
    // Create parent directories if they don't exist
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    OpenOptions::new().create(true).append(true).open(path)
}
