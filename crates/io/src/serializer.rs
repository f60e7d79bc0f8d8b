//! Persists a [`TimelineDocument`] as pretty JSON.
//!
//! The document is written to a temporary file next to the target and then
//! renamed over it, so readers see either the old artifact or the new one.

use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use model::TimelineDocument;
use tempfile::NamedTempFile;

use crate::error::{ReadError, WriteError};

pub fn write_timeline(doc: &TimelineDocument, path: &Path) -> Result<(), WriteError> {
    let io_err = |source| WriteError::Io { path: path.to_path_buf(), source };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    {
        let mut w = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut w, doc).map_err(|source| WriteError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
        w.write_all(b"\n").map_err(io_err)?;
        w.flush().map_err(io_err)?;
    }
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|source| WriteError::Persist {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::info!(
        path = %path.display(),
        drivers = doc.timeline.drivers.len(),
        races = doc.timeline.race_count(),
        "timeline written"
    );
    Ok(())
}

pub fn read_timeline(path: &Path) -> Result<TimelineDocument, ReadError> {
    let f = File::open(path).map_err(|source| ReadError::Open { path: path.to_path_buf(), source })?;
    serde_json::from_reader(BufReader::new(f)).map_err(|source| ReadError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
