//! Finding and reading the source files of a database folder.
//!
//! Every cell is read as a string; typing happens later in
//! [`crate::store::prepare_table`].

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use serde::Serialize;

use crate::columnar_cache;
use crate::config::{CacheConfig, ReconConfig, SourceConfig};
use crate::error::{ReconError, Result};
use crate::schema::SourceKind;
use crate::store::RecordStore;

// ── Locating ────────────────────────────────────────────────────────────────

/// Newest file in `folder` whose name contains `source.pattern`
/// (case-insensitive) and whose extension is accepted.
pub fn locate_source(folder: &Path, source: &SourceConfig) -> Result<Option<PathBuf>> {
    let pattern = source.pattern.to_lowercase();
    let mut newest: Option<(SystemTime, PathBuf)> = None;

    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        // Office lock files
        if name.starts_with("~$") || !name.to_lowercase().contains(&pattern) {
            continue;
        }
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !source.accepts_extension(ext) {
            continue;
        }
        let modified = fs::metadata(&path)?.modified()?;
        if newest.as_ref().is_none_or(|(t, _)| modified > *t) {
            newest = Some((modified, path));
        }
    }

    Ok(newest.map(|(_, path)| path))
}

// ── Reading ─────────────────────────────────────────────────────────────────

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

fn separator_byte(separator: char) -> Result<u8> {
    u8::try_from(separator)
        .ok()
        .filter(u8::is_ascii)
        .ok_or_else(|| ReconError::Config(format!("separator '{separator}' is not ASCII")))
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

/// Every row of a sheet (or CSV file) as strings, header rows included.
pub fn read_grid(path: &Path, sheet: Option<&str>, separator: char) -> Result<Vec<Vec<String>>> {
    if is_csv(path) {
        let separator = separator_byte(separator)?;
        let df = CsvReadOptions::default()
            .with_has_header(false)
            .with_infer_schema_length(Some(0))
            .map_parse_options(|opts| {
                opts.with_separator(separator)
                    .with_encoding(CsvEncoding::LossyUtf8)
                    .with_truncate_ragged_lines(true)
            })
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;
        return frame_to_grid(&df);
    }

    let mut workbook = open_workbook_auto(path)?;
    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ReconError::source_read(path.display().to_string(), "workbook has no sheets"))?,
    };
    let range = workbook.worksheet_range(&sheet_name)?;
    Ok(range
        .rows()
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect())
}

fn frame_to_grid(df: &DataFrame) -> Result<Vec<Vec<String>>> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| c.str().map(|s| s.clone()))
        .collect::<PolarsResult<Vec<_>>>()?;
    Ok((0..df.height())
        .map(|i| {
            columns
                .iter()
                .map(|c| c.get(i).unwrap_or("").to_string())
                .collect()
        })
        .collect())
}

/// Trimmed header names; blanks become `column_<n>` and repeats get `_<k>`.
fn unique_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    raw.iter()
        .enumerate()
        .map(|(i, name)| {
            let base = match name.trim() {
                "" => format!("column_{}", i + 1),
                trimmed => trimmed.to_string(),
            };
            let mut candidate = base.clone();
            let mut k = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}_{k}");
                k += 1;
            }
            candidate
        })
        .collect()
}

/// Build a string table from a grid. Row `header_row` holds the headers,
/// rows above it are ignored and short rows are padded with "".
pub fn grid_to_frame(grid: &[Vec<String>], header_row: usize) -> Result<DataFrame> {
    let Some(header) = grid.get(header_row) else {
        return Err(ReconError::MissingInputData(format!(
            "no header at row {}",
            header_row + 1
        )));
    };
    let body = &grid[header_row + 1..];
    let width = body
        .iter()
        .map(Vec::len)
        .chain(std::iter::once(header.len()))
        .max()
        .unwrap_or(0);

    let mut names: Vec<String> = header.clone();
    names.resize(width, String::new());
    let names = unique_headers(&names);

    let columns = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let values: Vec<&str> = body
                .iter()
                .map(|row| row.get(i).map(String::as_str).unwrap_or(""))
                .collect();
            Column::new(name.as_str().into(), values)
        })
        .collect::<Vec<_>>();

    Ok(DataFrame::new(columns)?)
}

/// Read one source file into an all-string table with clean headers.
pub fn read_table(path: &Path, source: &SourceConfig) -> Result<DataFrame> {
    if !is_csv(path) {
        let grid = read_grid(path, source.sheet.as_deref(), source.separator)?;
        return grid_to_frame(&grid, source.header_row);
    }

    let separator = separator_byte(source.separator)?;
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_skip_rows(source.header_row)
        .with_infer_schema_length(Some(0))
        .map_parse_options(|opts| {
            opts.with_separator(separator)
                .with_encoding(CsvEncoding::LossyUtf8)
                .with_truncate_ragged_lines(true)
        })
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;

    let raw: Vec<String> = df
        .get_column_names_str()
        .iter()
        .map(|c| c.to_string())
        .collect();
    df.set_column_names(unique_headers(&raw).as_slice())?;
    Ok(df)
}

/// Rename file headers to canonical names. Headers absent from the table are
/// skipped.
pub fn apply_column_map(df: DataFrame, rename: &HashMap<String, String>) -> Result<DataFrame> {
    let schema = df.schema();
    let (old, new): (Vec<&str>, Vec<&str>) = rename
        .iter()
        .filter(|(header, canonical)| header != canonical && schema.contains(header.as_str()))
        .map(|(header, canonical)| (header.as_str(), canonical.as_str()))
        .unzip();
    if old.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().rename(old, new, true).collect()?)
}

// ── Folder load ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceLoad {
    pub kind: SourceKind,
    pub file: Option<String>,
    pub rows: usize,
    pub from_cache: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub sources: Vec<SourceLoad>,
}

impl LoadSummary {
    pub fn loaded(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_none()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &SourceLoad> {
        self.sources.iter().filter(|s| s.error.is_some())
    }

    pub fn message(&self) -> String {
        let mut message = format!("{}/{} sources loaded", self.loaded(), self.sources.len());
        for failure in self.failures() {
            if let Some(error) = &failure.error {
                message.push_str(&format!("; {}: {error}", failure.kind));
            }
        }
        message
    }
}

/// Raw table for `path`, from the columnar cache when it is fresh.
fn read_cached(path: &Path, source: &SourceConfig, cache: &CacheConfig) -> Result<(DataFrame, bool)> {
    let cache_file = cache
        .enabled
        .then(|| columnar_cache::cache_path(path, &cache.dir_name, source.header_row, source.sheet.as_deref()))
        .flatten();

    if let Some(cache_file) = &cache_file {
        if let Some(df) = columnar_cache::read_fresh(path, cache_file) {
            log::debug!("cache hit {}", cache_file.display());
            return Ok((df, true));
        }
    }

    let mut df = read_table(path, source)?;
    if let Some(cache_file) = &cache_file {
        if let Err(err) = columnar_cache::write(cache_file, &mut df) {
            log::warn!("could not write cache {}: {err}", cache_file.display());
        }
    }
    Ok((df, false))
}

fn load_source(
    folder: &Path,
    kind: SourceKind,
    config: &ReconConfig,
    store: &mut RecordStore,
    status: &mut SourceLoad,
) -> Result<()> {
    let source = config.sources.get(kind);
    let path = locate_source(folder, source)?.ok_or_else(|| {
        ReconError::NotFound(format!("no file matching '{}' in {}", source.pattern, folder.display()))
    })?;
    status.file = path.file_name().and_then(|n| n.to_str()).map(str::to_string);

    let (raw, from_cache) = read_cached(&path, source, &config.cache)?;
    let df = apply_column_map(raw, &source.rename_map(kind))?;
    status.rows = store.load(kind, df)?;
    status.from_cache = from_cache;
    Ok(())
}

/// Load all four sources from `folder` into `store`.
///
/// The lookup cache is dropped first. A source that fails keeps whatever
/// table the store already had and is reported in the summary.
pub fn load_folder(
    folder: &Path,
    config: &ReconConfig,
    store: &mut RecordStore,
    progress: &dyn Fn(&str),
) -> LoadSummary {
    store.clear_cache();
    let mut summary = LoadSummary::default();

    for kind in SourceKind::ALL {
        progress(&format!("Loading {kind}..."));
        let mut status = SourceLoad {
            kind,
            file: None,
            rows: 0,
            from_cache: false,
            error: None,
        };
        if let Err(err) = load_source(folder, kind, config, store, &mut status) {
            let err = match err {
                ReconError::SourceReadFailure { .. } => err,
                other => ReconError::source_read(kind.label(), other),
            };
            log::warn!("{err}");
            status.error = Some(err.to_string());
        }
        summary.sources.push(status);
    }

    log::info!("{}", summary.message());
    progress(&summary.message());
    summary
}
