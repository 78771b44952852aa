//! Parquet copies of parsed source sheets, next to the sources.
//!
//! A copy is trusted only while it is at least as new as its source file.
//! Reading and writing are best effort: any failure means "parse the source".

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use polars::prelude::*;

use crate::error::Result;

/// `<dir>/<cache_dir>/<file name>.h<header_row>[.<sheet>].parquet`
pub fn cache_path(source: &Path, cache_dir: &str, header_row: usize, sheet: Option<&str>) -> Option<PathBuf> {
    let parent = source.parent()?;
    let file_name = source.file_name()?.to_str()?;
    let sheet_part = sheet
        .map(|s| {
            let clean: String = s
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
                .collect();
            format!(".{clean}")
        })
        .unwrap_or_default();
    Some(
        parent
            .join(cache_dir)
            .join(format!("{file_name}.h{header_row}{sheet_part}.parquet")),
    )
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// The cached frame, if it exists, is fresh and parses.
pub fn read_fresh(source: &Path, cache: &Path) -> Option<DataFrame> {
    let source_time = modified(source)?;
    let cache_time = modified(cache)?;
    if cache_time < source_time {
        log::debug!("stale cache {}", cache.display());
        return None;
    }
    let file = File::open(cache).ok()?;
    match ParquetReader::new(file).finish() {
        Ok(df) => Some(df),
        Err(err) => {
            log::warn!("unreadable cache {}: {err}", cache.display());
            None
        }
    }
}

pub fn write(cache: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(dir) = cache.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = File::create(cache)?;
    ParquetWriter::new(file).finish(df)?;
    Ok(())
}
