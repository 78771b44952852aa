use std::collections::HashMap;
use std::path::Path;

use chrono::Month;
use serde::Deserialize;

use crate::error::{ReconError, Result};
use crate::schema::{mdr, nprc, pfep, tdc, SourceKind};

// ── Top-level config ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReconConfig {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub calendar: MonthCalendar,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub propose: ProposeConfig,
}

impl ReconConfig {
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: ReconConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<()> {
        self.calendar.validate()?;
        for kind in SourceKind::ALL {
            let source = self.sources.get(kind);
            if source.pattern.trim().is_empty() {
                return Err(ReconError::Config(format!("{kind}: empty file pattern")));
            }
            if source.extensions.is_empty() {
                return Err(ReconError::Config(format!("{kind}: no file extensions")));
            }
        }
        Ok(())
    }
}

// ── Sources ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "SourceConfig::pfep")]
    pub pfep: SourceConfig,
    #[serde(default = "SourceConfig::tdc")]
    pub tdc: SourceConfig,
    #[serde(default = "SourceConfig::mdr")]
    pub mdr: SourceConfig,
    #[serde(default = "SourceConfig::nprc")]
    pub nprc: SourceConfig,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            pfep: SourceConfig::pfep(),
            tdc: SourceConfig::tdc(),
            mdr: SourceConfig::mdr(),
            nprc: SourceConfig::nprc(),
        }
    }
}

impl SourcesConfig {
    pub fn get(&self, kind: SourceKind) -> &SourceConfig {
        match kind {
            SourceKind::Pfep => &self.pfep,
            SourceKind::Tdc => &self.tdc,
            SourceKind::Mdr => &self.mdr,
            SourceKind::Nprc => &self.nprc,
        }
    }
}

/// How to find and read one source file inside the database folder.
///
/// `columns` maps canonical column names (see `schema`) to the header text in
/// the file. Entries given in TOML are merged over the built-in defaults, so a
/// config only needs to list the headers that differ.
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Case-insensitive substring of the file name.
    pub pattern: String,
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Rows above the header row.
    #[serde(default)]
    pub header_row: usize,
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default = "default_separator")]
    pub separator: char,
    #[serde(default)]
    pub columns: HashMap<String, String>,
}

fn default_extensions() -> Vec<String> {
    ["xlsx", "xlsm", "xls", "csv"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_separator() -> char {
    ','
}

impl SourceConfig {
    fn with_columns(pattern: &str, columns: &[(&str, &str)]) -> Self {
        Self {
            pattern: pattern.to_string(),
            extensions: default_extensions(),
            header_row: 0,
            sheet: None,
            separator: default_separator(),
            columns: columns
                .iter()
                .map(|(canonical, header)| (canonical.to_string(), header.to_string()))
                .collect(),
        }
    }

    pub fn pfep() -> Self {
        Self::with_columns(
            "pfep",
            &[
                (pfep::PART_NUMBER, "PN"),
                (pfep::SHORT_CODE, "SAP"),
                (pfep::LONG_CODE, "IMS"),
                (pfep::WEEKLY_UNITS, "Volume Semanal"),
                (pfep::WEEKLY_M3, "Volume Semanal m3"),
                (pfep::QME, "QME"),
                (pfep::MDR_CODE, "MDR"),
                (pfep::SUPPLIER_NAME, "Nome Fornecedor"),
                (pfep::SUPPLIER_CITY, "Cidade Fornecedor"),
                (pfep::SUPPLIER_STATE, "Estado Fornecedor"),
                (pfep::FLOW_TYPE, "Tipo de Fluxo"),
            ],
        )
    }

    pub fn tdc() -> Self {
        Self::with_columns(
            "tdc",
            &[
                (tdc::ORIGIN_CODE, "Origem"),
                (tdc::DESTINATION_CODE, "Destino"),
                (tdc::CARRIER, "Transportadora"),
                (tdc::VEHICLE, "Veiculo a ser Utilizado"),
                (tdc::ROUTE_CODE, "Rota"),
                (tdc::FLOW_TYPE, "Tipo de Fluxo"),
                (tdc::TRIP, "Viagem"),
                (tdc::DISTANCE_KM, "Distancia"),
                (tdc::CROSS_DOCK, "Cross Dock"),
            ],
        )
    }

    pub fn mdr() -> Self {
        Self::with_columns(
            "mdr",
            &[
                (mdr::MDR_CODE, "MDR"),
                (mdr::VOLUME_M3, "Volume m3"),
                (mdr::WEIGHT_KG, "Peso"),
            ],
        )
    }

    pub fn nprc() -> Self {
        Self::with_columns(
            "nprc",
            &[
                (nprc::PART_NUMBER, "PN"),
                (nprc::PLANT, "Planta"),
                (nprc::MODEL, "Modelo"),
            ],
        )
    }

    /// The built-in defaults for `kind`.
    pub fn defaults_for(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Pfep => Self::pfep(),
            SourceKind::Tdc => Self::tdc(),
            SourceKind::Mdr => Self::mdr(),
            SourceKind::Nprc => Self::nprc(),
        }
    }

    /// Header text -> canonical name, with the defaults for `kind` filled in
    /// for every canonical column the config does not mention.
    pub fn rename_map(&self, kind: SourceKind) -> HashMap<String, String> {
        let mut merged = Self::defaults_for(kind).columns;
        merged.extend(self.columns.clone());
        merged
            .into_iter()
            .map(|(canonical, header)| (header.trim().to_string(), canonical))
            .collect()
    }

    pub fn accepts_extension(&self, ext: &str) -> bool {
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

// ── Propose file ────────────────────────────────────────────────────────────

/// How the AS-IS/TO-BE file is read. Its columns are positional, so only the
/// sheet and the CSV separator are configurable.
#[derive(Debug, Clone, Deserialize)]
pub struct ProposeConfig {
    #[serde(default)]
    pub sheet: Option<String>,
    #[serde(default = "default_separator")]
    pub separator: char,
}

impl Default for ProposeConfig {
    fn default() -> Self {
        Self {
            sheet: None,
            separator: default_separator(),
        }
    }
}

// ── Calendar ────────────────────────────────────────────────────────────────

/// Calendar month that NPRC column "1" stands for. Column "n" maps onto
/// `first_month + n - 1`, wrapping around December.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct MonthCalendar {
    #[serde(default = "MonthCalendar::january")]
    pub first_month: u8,
}

impl Default for MonthCalendar {
    fn default() -> Self {
        Self {
            first_month: Self::january(),
        }
    }
}

impl MonthCalendar {
    fn january() -> u8 {
        1
    }

    pub fn starting_at(first_month: u8) -> Result<Self> {
        let calendar = Self { first_month };
        calendar.validate()?;
        Ok(calendar)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=12).contains(&self.first_month) {
            return Err(ReconError::Config(format!(
                "calendar.first_month must be 1..=12, got {}",
                self.first_month
            )));
        }
        Ok(())
    }

    /// Calendar month for NPRC column index `index` (0-based).
    pub fn month_for(&self, index: usize) -> Month {
        let number = (usize::from(self.first_month) - 1 + index) % 12 + 1;
        // number is always within 1..=12
        Month::try_from(number as u8).unwrap_or(Month::January)
    }

    pub fn labels(&self) -> Vec<String> {
        (0..nprc::MONTHS.len())
            .map(|i| self.month_for(i).name().to_string())
            .collect()
    }
}

// ── Columnar cache ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "CacheConfig::enabled_default")]
    pub enabled: bool,
    #[serde(default = "CacheConfig::dir_default")]
    pub dir_name: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: Self::enabled_default(),
            dir_name: Self::dir_default(),
        }
    }
}

impl CacheConfig {
    fn enabled_default() -> bool {
        true
    }

    fn dir_default() -> String {
        ".bcturbo-cache".to_string()
    }
}
