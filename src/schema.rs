/// Canonical column names for the four source tables and the report.
/// Source headers are renamed onto these at load time (see `config`).

// ── PFEP (part master) ──────────────────────────────────────────────────────
pub mod pfep {
    pub const PART_NUMBER: &str = "part_number";
    pub const SHORT_CODE: &str = "short_code";
    pub const LONG_CODE: &str = "long_code";
    pub const WEEKLY_UNITS: &str = "weekly_units";
    pub const WEEKLY_M3: &str = "weekly_m3";
    pub const QME: &str = "qme";
    pub const MDR_CODE: &str = "mdr_code";
    pub const SUPPLIER_NAME: &str = "supplier_name";
    pub const SUPPLIER_CITY: &str = "supplier_city";
    pub const SUPPLIER_STATE: &str = "supplier_state";
    pub const FLOW_TYPE: &str = "flow_type";

    pub const REQUIRED: [&str; 3] = [PART_NUMBER, SHORT_CODE, LONG_CODE];
    pub const IDENTIFIERS: [&str; 4] = [PART_NUMBER, SHORT_CODE, LONG_CODE, MDR_CODE];
    pub const TEXT: [&str; 4] = [SUPPLIER_NAME, SUPPLIER_CITY, SUPPLIER_STATE, FLOW_TYPE];
    pub const NUMERIC: [&str; 3] = [WEEKLY_UNITS, WEEKLY_M3, QME];
}

// ── TDC (routes) ────────────────────────────────────────────────────────────
pub mod tdc {
    pub const ORIGIN_CODE: &str = "origin_code";
    pub const DESTINATION_CODE: &str = "destination_code";
    pub const CARRIER: &str = "carrier";
    pub const VEHICLE: &str = "vehicle";
    pub const ROUTE_CODE: &str = "route_code";
    pub const FLOW_TYPE: &str = "flow_type";
    pub const TRIP: &str = "trip";
    pub const DISTANCE_KM: &str = "distance_km";
    pub const CROSS_DOCK: &str = "cross_dock";

    pub const REQUIRED: [&str; 2] = [ORIGIN_CODE, DESTINATION_CODE];
    pub const IDENTIFIERS: [&str; 2] = [ORIGIN_CODE, DESTINATION_CODE];
    pub const TEXT: [&str; 6] = [CARRIER, VEHICLE, ROUTE_CODE, FLOW_TYPE, TRIP, CROSS_DOCK];
    pub const NUMERIC: [&str; 1] = [DISTANCE_KM];
}

// ── MDR (packaging) ─────────────────────────────────────────────────────────
pub mod mdr {
    pub const MDR_CODE: &str = "mdr_code";
    pub const VOLUME_M3: &str = "volume_m3";
    pub const WEIGHT_KG: &str = "weight_kg";

    pub const REQUIRED: [&str; 1] = [MDR_CODE];
    pub const IDENTIFIERS: [&str; 1] = [MDR_CODE];
    pub const NUMERIC: [&str; 2] = [VOLUME_M3, WEIGHT_KG];
}

// ── NPRC (monthly volumes) ──────────────────────────────────────────────────
pub mod nprc {
    pub const PART_NUMBER: &str = "part_number";
    pub const PLANT: &str = "plant";
    pub const MODEL: &str = "model";
    /// Added by aggregation: how many raw rows were folded into one.
    pub const FOLD_COUNT: &str = "fold_count";

    pub const MONTHS: [&str; 12] = [
        "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12",
    ];

    pub const REQUIRED: [&str; 1] = [PART_NUMBER];
    pub const IDENTIFIERS: [&str; 1] = [PART_NUMBER];
    pub const TEXT: [&str; 2] = [PLANT, MODEL];
}

// ── Report columns ──────────────────────────────────────────────────────────
pub mod report {
    pub const ROW: &str = "row";
    pub const PART_NUMBER: &str = "pn";
    pub const PLANT: &str = "plant";
    pub const MODEL: &str = "model";
    pub const FOLD_COUNT: &str = "fold_count";
    pub const QME_AS_IS: &str = "qme_asis";
    pub const QME_TO_BE: &str = "qme_tobe";
    pub const MDR_AS_IS: &str = "mdr_asis";
    pub const MDR_TO_BE: &str = "mdr_tobe";
    pub const VOL_AS_IS: &str = "vol_asis";
    pub const VOL_TO_BE: &str = "vol_tobe";
    pub const WEIGHT_AS_IS: &str = "weight_asis";
    pub const WEIGHT_TO_BE: &str = "weight_tobe";
    pub const ANNUAL_VOLUME: &str = "annual_volume";
    pub const SAVINGS: &str = "savings";
    pub const STATUS: &str = "status";
    pub const HAS_PROPOSE: &str = "has_propose_data";
}

/// The four source tables kept by the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pfep,
    Tdc,
    Mdr,
    Nprc,
}

impl SourceKind {
    pub const ALL: [SourceKind; 4] = [Self::Pfep, Self::Tdc, Self::Mdr, Self::Nprc];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pfep => "PFEP",
            Self::Tdc => "TDC",
            Self::Mdr => "MDR",
            Self::Nprc => "NPRC",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}
