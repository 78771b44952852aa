//! Python bindings. Every operation returns a JSON payload tagged by
//! `status`; frames come back as polars DataFrames.

use std::path::Path;

use pyo3::prelude::*;
use pyo3_polars::PyDataFrame;
use serde::Serialize;

use crate::config::ReconConfig;
use crate::ingest::LoadSummary;
use crate::lookup::{LookupOutcome, LookupQuery};
use crate::model::{Reconciler, VolumeScope};
use crate::response::Response;

fn load_response(result: crate::error::Result<LoadSummary>) -> String {
    Response::from_result(result, LoadSummary::message).to_json()
}

#[derive(Serialize)]
struct ExportData {
    path: String,
}

#[pymethods]
impl Reconciler {
    #[new]
    #[pyo3(signature = (config_path=None))]
    fn py_new(config_path: Option<&str>) -> PyResult<Self> {
        let config = match config_path {
            Some(path) => ReconConfig::from_file(Path::new(path))?,
            None => ReconConfig::default(),
        };
        Ok(Self::new(config))
    }

    // ── Folders ─────────────────────────────────────────────────────────────

    /// Select the database folder and load it. `None` means the user
    /// cancelled the folder picker.
    #[pyo3(name = "set_db_folder", signature = (folder=None))]
    fn py_set_db_folder(&mut self, folder: Option<&str>) -> String {
        match folder {
            Some(folder) => load_response(self.set_db_folder(folder)),
            None => Response::<LoadSummary>::cancel().to_json(),
        }
    }

    #[pyo3(name = "set_result_folder", signature = (folder=None))]
    fn py_set_result_folder(&mut self, folder: Option<&str>) -> String {
        let Some(folder) = folder else {
            return Response::<()>::cancel().to_json();
        };
        Response::from_result(self.set_result_folder(folder), |_| {
            format!("Output folder set to {folder}")
        })
        .to_json()
    }

    #[pyo3(name = "reload")]
    fn py_reload(&mut self) -> String {
        load_response(self.reload())
    }

    #[pyo3(name = "clear_cache")]
    fn py_clear_cache(&mut self) -> String {
        self.clear_cache();
        Response::success("Cache cleared", ()).to_json()
    }

    // ── Lookup ──────────────────────────────────────────────────────────────

    #[pyo3(name = "lookup", signature = (code, plant="", origin_city="", dest_city=""))]
    fn py_lookup(&mut self, code: &str, plant: &str, origin_city: &str, dest_city: &str) -> String {
        let query = LookupQuery::new(code)
            .with_plant(plant)
            .with_origin(origin_city)
            .with_destination(dest_city);
        match self.lookup(&query) {
            Ok(LookupOutcome::Found(data)) => {
                let message = format!("Found {} by {}", data.code, data.filter_used);
                Response::success(message, data).to_json()
            }
            Ok(LookupOutcome::NeedsDestination(data)) => {
                Response::success("Destination required", data).to_json()
            }
            Ok(LookupOutcome::NotFound { kind, code }) => Response::<()>::NotFound {
                message: format!("No part with {kind} {code}"),
            }
            .to_json(),
            Err(err) => Response::<()>::from(err).to_json(),
        }
    }

    /// Raw NPRC rows cached by a lookup, keyed as `<kind>_<code>`.
    #[pyo3(name = "cached_volumes")]
    fn py_cached_volumes(&self, key: &str) -> Option<PyDataFrame> {
        self.cached_volumes(key).cloned().map(PyDataFrame)
    }

    // ── Propose, reconcile, export ──────────────────────────────────────────

    #[pyo3(name = "import_propose", signature = (path=None))]
    fn py_import_propose(&mut self, path: Option<&str>) -> String {
        let Some(path) = path else {
            return Response::<()>::cancel().to_json();
        };
        Response::from_result(self.import_propose(path), |summary| {
            format!("{} propose rows loaded", summary.rows)
        })
        .to_json()
    }

    #[pyo3(name = "reconcile", signature = (use_last_lookup=false))]
    fn py_reconcile(&mut self, use_last_lookup: bool) -> String {
        let scope = if use_last_lookup {
            VolumeScope::LastLookup
        } else {
            VolumeScope::Full
        };
        match self.reconcile(scope) {
            Ok(report) => Response::success(report.message(), report).to_json(),
            Err(err) => Response::<()>::from(err).to_json(),
        }
    }

    #[pyo3(name = "export", signature = (filename=None))]
    fn py_export(&self, filename: Option<&str>) -> String {
        let result = self.export(filename).map(|path| ExportData {
            path: path.display().to_string(),
        });
        Response::from_result(result, |data| format!("Saved to {}", data.path)).to_json()
    }

    #[pyo3(name = "report_df")]
    fn py_report_df(&self) -> PyResult<Option<PyDataFrame>> {
        match self.report() {
            Some(report) => Ok(Some(PyDataFrame(report.to_frame()?))),
            None => Ok(None),
        }
    }

    /// Install a callable receiving progress strings, or `None` to remove it.
    #[pyo3(name = "set_progress", signature = (callback=None))]
    fn py_set_progress(&mut self, callback: Option<PyObject>) {
        let progress = callback.map(|callback| {
            Box::new(move |message: &str| {
                Python::with_gil(|py| {
                    if let Err(err) = callback.call1(py, (message,)) {
                        log::warn!("progress callback failed: {err}");
                    }
                })
            }) as crate::model::ProgressFn
        });
        self.set_progress(progress);
    }
}
