pub mod columnar_cache;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod lookup;
pub mod model;
pub mod normalize;
pub mod propose;
pub mod reconcile;
pub mod records;
pub mod report;
pub mod response;
pub mod schema;
pub mod store;

#[cfg(feature = "python")]
mod python;

pub use config::ReconConfig;
pub use error::{ReconError, Result};
pub use lookup::{LookupOutcome, LookupQuery};
pub use model::{Reconciler, VolumeScope};
pub use report::Report;
pub use response::Response;

#[cfg(feature = "python")]
mod py_module {
    use pyo3::prelude::*;
    use pyo3::types::PyModule;

    use crate::model::Reconciler;
    use crate::schema;

    /// Export canonical column names as Python submodules
    fn add_schema_exports(m: &Bound<'_, PyModule>) -> PyResult<()> {
        // PFEP
        let pfep = PyModule::new(m.py(), "pfep")?;
        pfep.add("PART_NUMBER", schema::pfep::PART_NUMBER)?;
        pfep.add("SHORT_CODE", schema::pfep::SHORT_CODE)?;
        pfep.add("LONG_CODE", schema::pfep::LONG_CODE)?;
        pfep.add("QME", schema::pfep::QME)?;
        pfep.add("MDR_CODE", schema::pfep::MDR_CODE)?;
        m.add_submodule(&pfep)?;

        // TDC
        let tdc = PyModule::new(m.py(), "tdc")?;
        tdc.add("ORIGIN_CODE", schema::tdc::ORIGIN_CODE)?;
        tdc.add("DESTINATION_CODE", schema::tdc::DESTINATION_CODE)?;
        tdc.add("CARRIER", schema::tdc::CARRIER)?;
        tdc.add("VEHICLE", schema::tdc::VEHICLE)?;
        m.add_submodule(&tdc)?;

        // MDR
        let mdr = PyModule::new(m.py(), "mdr")?;
        mdr.add("MDR_CODE", schema::mdr::MDR_CODE)?;
        mdr.add("VOLUME_M3", schema::mdr::VOLUME_M3)?;
        mdr.add("WEIGHT_KG", schema::mdr::WEIGHT_KG)?;
        m.add_submodule(&mdr)?;

        // NPRC
        let nprc = PyModule::new(m.py(), "nprc")?;
        nprc.add("PART_NUMBER", schema::nprc::PART_NUMBER)?;
        nprc.add("PLANT", schema::nprc::PLANT)?;
        nprc.add("MODEL", schema::nprc::MODEL)?;
        nprc.add("FOLD_COUNT", schema::nprc::FOLD_COUNT)?;
        nprc.add("MONTHS", schema::nprc::MONTHS.to_vec())?;
        m.add_submodule(&nprc)?;

        // Report
        let report = PyModule::new(m.py(), "report")?;
        report.add("PART_NUMBER", schema::report::PART_NUMBER)?;
        report.add("STATUS", schema::report::STATUS)?;
        report.add("SAVINGS", schema::report::SAVINGS)?;
        report.add("HAS_PROPOSE", schema::report::HAS_PROPOSE)?;
        m.add_submodule(&report)?;

        Ok(())
    }

    #[pymodule]
    fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
        m.add_class::<Reconciler>()?;
        add_schema_exports(m)?;
        Ok(())
    }
}
