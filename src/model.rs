use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::Serialize;

use crate::config::ReconConfig;
use crate::error::{ReconError, Result};
use crate::export;
use crate::ingest::{self, LoadSummary};
use crate::lookup::{self, LookupOutcome, LookupQuery};
use crate::propose::{self, ProposeRow, ProposeSummary};
use crate::reconcile::{self, PlaceholderProjection, Projection, ReconcileOptions};
use crate::report::Report;
use crate::schema::SourceKind;
use crate::store::RecordStore;

pub type ProgressFn = Box<dyn Fn(&str) + Send + Sync>;

/// Which NPRC rows a reconciliation reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeScope {
    /// The whole NPRC table.
    #[default]
    Full,
    /// The volume subset cached by the most recent successful lookup, or the
    /// whole table when there is none.
    LastLookup,
}

/// Session state: folders, loaded tables, propose rows and the last report.
#[cfg_attr(feature = "python", pyo3::pyclass(name = "Reconciler"))]
pub struct Reconciler {
    pub(crate) config: ReconConfig,
    pub(crate) db_folder: Option<PathBuf>,
    pub(crate) result_folder: Option<PathBuf>,
    pub(crate) store: RecordStore,
    pub(crate) propose: Vec<ProposeRow>,
    pub(crate) last_lookup: Option<String>,
    pub(crate) last_report: Option<Report>,
    progress: Option<ProgressFn>,
    projection: Box<dyn Projection + Send + Sync>,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self::new(ReconConfig::default())
    }
}

impl Reconciler {
    pub fn new(config: ReconConfig) -> Self {
        Self {
            config,
            db_folder: None,
            result_folder: None,
            store: RecordStore::new(),
            propose: Vec::new(),
            last_lookup: None,
            last_report: None,
            progress: None,
            projection: Box::new(PlaceholderProjection),
        }
    }

    pub fn config(&self) -> &ReconConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn set_progress(&mut self, progress: Option<ProgressFn>) {
        self.progress = progress;
    }

    pub fn set_projection(&mut self, projection: Box<dyn Projection + Send + Sync>) {
        self.projection = projection;
    }

    fn emit(progress: &Option<ProgressFn>, message: &str) {
        if let Some(callback) = progress {
            callback(message);
        }
    }

    // ── Folders and loading ─────────────────────────────────────────────────

    /// Point at a new database folder and load it from scratch.
    pub fn set_db_folder(&mut self, folder: impl AsRef<Path>) -> Result<LoadSummary> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(ReconError::NotFound(format!("folder {}", folder.display())));
        }
        self.store.clear();
        self.last_lookup = None;
        self.db_folder = Some(folder.to_path_buf());
        self.reload()
    }

    pub fn set_result_folder(&mut self, folder: impl AsRef<Path>) -> Result<()> {
        let folder = folder.as_ref();
        if !folder.is_dir() {
            return Err(ReconError::NotFound(format!("folder {}", folder.display())));
        }
        self.result_folder = Some(folder.to_path_buf());
        Ok(())
    }

    /// Re-read every source of the current database folder.
    pub fn reload(&mut self) -> Result<LoadSummary> {
        let folder = self
            .db_folder
            .clone()
            .ok_or(ReconError::DatabaseFolderNotSet)?;
        self.last_lookup = None;
        let progress = &self.progress;
        let summary = ingest::load_folder(&folder, &self.config, &mut self.store, &|m| {
            Self::emit(progress, m)
        });
        if summary.loaded() == 0 {
            return Err(ReconError::NoDataLoaded(summary.message()));
        }
        Ok(summary)
    }

    pub fn clear_cache(&mut self) {
        self.store.clear_cache();
        self.last_lookup = None;
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    pub fn lookup(&mut self, query: &LookupQuery) -> Result<LookupOutcome> {
        if !self.store.has_any_table() {
            return Err(ReconError::NoDataLoaded("select a database folder first".into()));
        }
        let outcome = lookup::lookup(&mut self.store, query)?;
        self.last_lookup = outcome.data().map(|data| data.cache_key.clone());
        Ok(outcome)
    }

    /// Raw NPRC rows cached for `key`.
    pub fn cached_volumes(&self, key: &str) -> Option<&DataFrame> {
        self.store.cached(key).map(|entry| &entry.volumes)
    }

    pub fn last_lookup_key(&self) -> Option<&str> {
        self.last_lookup.as_deref()
    }

    // ── Propose and reconciliation ──────────────────────────────────────────

    pub fn import_propose(&mut self, path: impl AsRef<Path>) -> Result<ProposeSummary> {
        let path = path.as_ref();
        let source = &self.config.propose;
        let grid = ingest::read_grid(path, source.sheet.as_deref(), source.separator)
            .map_err(|err| ReconError::source_read(path.display().to_string(), err))?;
        let rows = propose::parse_propose(&grid);
        if rows.is_empty() {
            return Err(ReconError::MissingInputData(format!(
                "no Part Numbers in {}",
                path.display()
            )));
        }
        let summary = propose::summarize(&rows);
        log::info!("propose: {} rows from {}", rows.len(), path.display());
        self.propose = rows;
        Ok(summary)
    }

    pub fn set_propose(&mut self, rows: Vec<ProposeRow>) -> ProposeSummary {
        let summary = propose::summarize(&rows);
        self.propose = rows;
        summary
    }

    pub fn propose(&self) -> &[ProposeRow] {
        &self.propose
    }

    pub fn reconcile(&mut self, scope: VolumeScope) -> Result<&Report> {
        reconcile::require_propose(&self.propose)?;

        let cached = match scope {
            VolumeScope::Full => None,
            VolumeScope::LastLookup => self
                .last_lookup
                .as_deref()
                .and_then(|key| self.store.cached(key))
                .map(|entry| &entry.volumes),
        };
        let volumes = match cached {
            Some(volumes) => volumes,
            None => self.store.require(SourceKind::Nprc)?,
        };

        let options = ReconcileOptions {
            calendar: self.config.calendar,
            projection: self.projection.as_ref(),
        };
        let progress = &self.progress;
        let report = reconcile::reconcile(&self.propose, &self.store, volumes, &options, &|m| {
            Self::emit(progress, m)
        })?;
        Self::emit(progress, &report.message());
        Ok(&*self.last_report.insert(report))
    }

    pub fn report(&self) -> Option<&Report> {
        self.last_report.as_ref()
    }

    pub fn export(&self, filename: Option<&str>) -> Result<PathBuf> {
        let folder = self
            .result_folder
            .as_deref()
            .ok_or(ReconError::OutputFolderNotSet)?;
        let report = self.last_report.as_ref().ok_or(ReconError::NoReport)?;
        export::export_report(report, folder, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{nprc, pfep};

    #[test]
    fn reload_without_folder_fails() {
        let mut reconciler = Reconciler::default();
        assert!(matches!(reconciler.reload(), Err(ReconError::DatabaseFolderNotSet)));
    }

    #[test]
    fn lookup_before_loading_fails() {
        let mut reconciler = Reconciler::default();
        let err = reconciler.lookup(&LookupQuery::new("123")).unwrap_err();
        assert!(matches!(err, ReconError::NoDataLoaded(_)));
    }

    #[test]
    fn export_errors_are_distinct() {
        let dir = tempfile::tempdir().unwrap();
        let mut reconciler = Reconciler::default();
        assert!(matches!(reconciler.export(None), Err(ReconError::OutputFolderNotSet)));
        reconciler.set_result_folder(dir.path()).unwrap();
        assert!(matches!(reconciler.export(None), Err(ReconError::NoReport)));
    }

    #[test]
    fn reconcile_without_propose_fails_before_tables_are_checked() {
        let mut reconciler = Reconciler::default();
        let err = reconciler.reconcile(VolumeScope::Full).unwrap_err();
        assert!(matches!(err, ReconError::MissingInputData(_)));
    }

    fn single_part_store(reconciler: &mut Reconciler) {
        reconciler
            .store
            .load_parts(
                df!(
                    pfep::PART_NUMBER => &["PN-1"],
                    pfep::SHORT_CODE => &["123"],
                    pfep::LONG_CODE => &[""],
                )
                .unwrap(),
            )
            .unwrap();
        reconciler
            .store
            .load_volumes(df!(nprc::PART_NUMBER => &["PN-1"], "1" => &["10"]).unwrap())
            .unwrap();
    }

    #[test]
    fn not_found_lookup_forgets_the_previous_key() {
        let mut reconciler = Reconciler::default();
        single_part_store(&mut reconciler);

        reconciler.lookup(&LookupQuery::new("123")).unwrap();
        assert_eq!(reconciler.last_lookup_key(), Some("short_code_123"));

        let outcome = reconciler.lookup(&LookupQuery::new("999")).unwrap();
        assert!(matches!(outcome, LookupOutcome::NotFound { .. }));
        assert_eq!(reconciler.last_lookup_key(), None);
    }

    #[test]
    fn propose_csv_uses_the_configured_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("propose.csv");
        std::fs::write(
            &path,
            "PN;AS IS;;TO BE;\n;QME;MDR;QME;MDR\nPN-1;50;M1;80;M2\n",
        )
        .unwrap();

        let config = ReconConfig::from_toml("[propose]\nseparator = \";\"\n").unwrap();
        let mut reconciler = Reconciler::new(config);
        let summary = reconciler.import_propose(&path).unwrap();
        assert_eq!(summary.rows, 1);
        assert_eq!(reconciler.propose()[0].part_number, "PN-1");
        assert_eq!(reconciler.propose()[0].to_be_qme, Some(80.0));
    }

    #[test]
    fn empty_folder_reports_no_data() {
        let dir = tempfile::tempdir().unwrap();
        let mut reconciler = Reconciler::default();
        let err = reconciler.set_db_folder(dir.path()).unwrap_err();
        assert!(matches!(err, ReconError::NoDataLoaded(_)));
    }
}
