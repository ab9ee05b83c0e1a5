//! CSV persistence for the two pipeline stages.
//!
//! Stage 1 writes one [`ReviewRow`] per review to the intermediate file; stage 2
//! reads it back and writes one [`TopicRow`] per kept review to the output file.
//! The header row is derived from the row struct's field names.
//!
//! Writes go to a sibling `.tmp` file first and are renamed into place, so a
//! failed write never leaves a truncated file at the target path.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info, instrument};

use reviewtopics_shared::{Result, ReviewRow, ReviewTopicsError, TopicRow};

// ---------------------------------------------------------------------------
// Reviews (stage 1 output)
// ---------------------------------------------------------------------------

/// Write the tagged review collection, replacing any existing file.
#[instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_reviews(path: &Path, rows: &[ReviewRow]) -> Result<()> {
    write_csv(path, rows)?;
    info!("reviews written");
    Ok(())
}

/// Load the tagged review collection. Empty review bodies load as `None`.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_reviews(path: &Path) -> Result<Vec<ReviewRow>> {
    let rows = read_csv(path)?;
    debug!(rows = rows.len(), "reviews loaded");
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Topic rows (stage 2 output)
// ---------------------------------------------------------------------------

/// Write the enriched collection, replacing any existing file.
#[instrument(skip_all, fields(path = %path.display(), rows = rows.len()))]
pub fn write_topic_rows(path: &Path, rows: &[TopicRow]) -> Result<()> {
    write_csv(path, rows)?;
    info!("topic rows written");
    Ok(())
}

/// Load an enriched collection.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn read_topic_rows(path: &Path) -> Result<Vec<TopicRow>> {
    read_csv(path)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ReviewTopicsError::io(parent, e))?;
    }

    let tmp = tmp_path(path);
    let mut writer = csv::Writer::from_path(&tmp).map_err(|e| storage_error(&tmp, e))?;
    for row in rows {
        writer.serialize(row).map_err(|e| storage_error(&tmp, e))?;
    }
    writer
        .flush()
        .map_err(|e| ReviewTopicsError::io(&tmp, e))?;
    drop(writer);

    fs::rename(&tmp, path).map_err(|e| ReviewTopicsError::io(path, e))
}

fn read_csv<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path).map_err(|e| storage_error(path, e))?;
    reader
        .deserialize()
        .collect::<std::result::Result<Vec<T>, _>>()
        .map_err(|e| storage_error(path, e))
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn storage_error(path: &Path, e: csv::Error) -> ReviewTopicsError {
    ReviewTopicsError::Storage(format!("{}: {e}", path.display()))
}
