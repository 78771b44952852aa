use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconError {
    #[error("Invalid code length: '{0}' must be 1 to 9 digits")]
    InvalidCodeLength(String),

    #[error("No data loaded: {0}")]
    NoDataLoaded(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing input data: {0}")]
    MissingInputData(String),

    #[error("Failed to read {source_name}: {message}")]
    SourceReadFailure {
        source_name: String,
        message: String,
    },

    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Configuration: {0}")]
    Config(String),

    #[error("Database folder not selected")]
    DatabaseFolderNotSet,

    #[error("Output folder not selected")]
    OutputFolderNotSet,

    #[error("No results to export")]
    NoReport,

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Excel export error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ReconError {
    pub(crate) fn source_read(source_name: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::SourceReadFailure {
            source_name: source_name.into(),
            message: err.to_string(),
        }
    }
}

#[cfg(feature = "python")]
impl From<ReconError> for pyo3::PyErr {
    fn from(err: ReconError) -> pyo3::PyErr {
        pyo3::exceptions::PyRuntimeError::new_err(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ReconError>;
