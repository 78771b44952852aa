use std::collections::HashMap;

use polars::prelude::*;
use serde::Serialize;

use crate::error::{ReconError, Result};
use crate::normalize::{normalize_column, normalize_str};
use crate::records::{PackagingRecord, PartRecord, RouteRecord};
use crate::schema::{mdr, nprc, pfep, tdc, SourceKind};

/// Which PFEP identifier column a lookup code belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierKind {
    /// Fewer than 7 digits.
    ShortCode,
    /// 7 to 9 digits.
    LongCode,
}

impl IdentifierKind {
    /// Classify a normalized code by digit count.
    pub fn classify(code: &str) -> Result<Self> {
        if code.is_empty() || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ReconError::InvalidCodeLength(code.to_string()));
        }
        match code.len() {
            1..=6 => Ok(Self::ShortCode),
            7..=9 => Ok(Self::LongCode),
            _ => Err(ReconError::InvalidCodeLength(code.to_string())),
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::ShortCode => pfep::SHORT_CODE,
            Self::LongCode => pfep::LONG_CODE,
        }
    }
}

impl std::fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// `"<identifier-kind>_<code>"`
pub fn cache_key(kind: IdentifierKind, code: &str) -> String {
    format!("{kind}_{code}")
}

/// Cross-reference computed by the first lookup of a code.
#[derive(Debug, Clone)]
pub struct LookupCacheEntry {
    pub kind: IdentifierKind,
    pub code: String,
    /// First PFEP row carrying the code.
    pub part: Option<PartRecord>,
    /// How many PFEP rows carry the code.
    pub part_matches: usize,
    /// Identifier bridging the part to the TDC origin column.
    pub pivot_code: String,
    /// Part Numbers of every PFEP row carrying the code.
    pub related_part_numbers: Vec<String>,
    /// Raw NPRC rows of `related_part_numbers`, not aggregated.
    pub volumes: DataFrame,
}

impl LookupCacheEntry {
    pub fn volume_matches(&self) -> usize {
        self.volumes.height()
    }
}

/// Result of a TDC query.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteMatch {
    /// Only the origin was given; these rows share it.
    DestinationRequired(Vec<RouteRecord>),
    /// Rows matching both ends.
    Exact(Vec<RouteRecord>),
}

/// Owner of the four source tables and of the lookup cache.
///
/// Every load replaces its table wholesale and drops the whole cache, so a
/// cache entry is never older than the tables it was computed from.
#[derive(Debug, Default)]
pub struct RecordStore {
    parts: Option<DataFrame>,
    routes: Option<DataFrame>,
    packaging: Option<DataFrame>,
    volumes: Option<DataFrame>,
    cache: HashMap<String, LookupCacheEntry>,
    volume_scans: usize,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Loading ─────────────────────────────────────────────────────────────

    pub fn load_parts(&mut self, raw: DataFrame) -> Result<usize> {
        let df = prepare_table(raw, SourceKind::Pfep)?;
        Ok(self.replace(SourceKind::Pfep, df))
    }

    pub fn load_routes(&mut self, raw: DataFrame) -> Result<usize> {
        let df = prepare_table(raw, SourceKind::Tdc)?;
        Ok(self.replace(SourceKind::Tdc, df))
    }

    pub fn load_packaging(&mut self, raw: DataFrame) -> Result<usize> {
        let df = prepare_table(raw, SourceKind::Mdr)?;
        Ok(self.replace(SourceKind::Mdr, df))
    }

    pub fn load_volumes(&mut self, raw: DataFrame) -> Result<usize> {
        let df = prepare_table(raw, SourceKind::Nprc)?;
        Ok(self.replace(SourceKind::Nprc, df))
    }

    /// Dispatch on `kind`.
    pub fn load(&mut self, kind: SourceKind, raw: DataFrame) -> Result<usize> {
        match kind {
            SourceKind::Pfep => self.load_parts(raw),
            SourceKind::Tdc => self.load_routes(raw),
            SourceKind::Mdr => self.load_packaging(raw),
            SourceKind::Nprc => self.load_volumes(raw),
        }
    }

    fn replace(&mut self, kind: SourceKind, df: DataFrame) -> usize {
        self.clear_cache();
        let rows = df.height();
        *self.slot_mut(kind) = Some(df);
        log::info!("{kind}: {rows} rows loaded");
        rows
    }

    fn slot_mut(&mut self, kind: SourceKind) -> &mut Option<DataFrame> {
        match kind {
            SourceKind::Pfep => &mut self.parts,
            SourceKind::Tdc => &mut self.routes,
            SourceKind::Mdr => &mut self.packaging,
            SourceKind::Nprc => &mut self.volumes,
        }
    }

    /// Drop every table and every cached lookup.
    pub fn clear(&mut self) {
        self.clear_cache();
        for kind in SourceKind::ALL {
            *self.slot_mut(kind) = None;
        }
    }

    pub fn clear_cache(&mut self) {
        if !self.cache.is_empty() {
            log::debug!("lookup cache invalidated ({} entries)", self.cache.len());
        }
        self.cache.clear();
    }

    // ── Accessors ───────────────────────────────────────────────────────────

    pub fn table(&self, kind: SourceKind) -> Option<&DataFrame> {
        match kind {
            SourceKind::Pfep => self.parts.as_ref(),
            SourceKind::Tdc => self.routes.as_ref(),
            SourceKind::Mdr => self.packaging.as_ref(),
            SourceKind::Nprc => self.volumes.as_ref(),
        }
    }

    pub fn is_loaded(&self, kind: SourceKind) -> bool {
        self.table(kind).is_some()
    }

    pub fn has_any_table(&self) -> bool {
        SourceKind::ALL.iter().any(|k| self.is_loaded(*k))
    }

    /// The table for `kind`, or `NoDataLoaded`.
    pub fn require(&self, kind: SourceKind) -> Result<&DataFrame> {
        self.table(kind)
            .ok_or_else(|| ReconError::NoDataLoaded(kind.label().to_string()))
    }

    /// Every PFEP row as a typed record.
    pub fn part_records(&self) -> Result<Vec<PartRecord>> {
        PartRecord::from_frame(self.require(SourceKind::Pfep)?)
    }

    /// Number of times the NPRC table has been filtered for a lookup.
    pub fn volume_scans(&self) -> usize {
        self.volume_scans
    }

    // ── Queries ─────────────────────────────────────────────────────────────

    /// PFEP rows whose `kind` column equals `code`.
    pub fn find_parts_by_code(&self, kind: IdentifierKind, code: &str) -> Result<Vec<PartRecord>> {
        let parts = self.require(SourceKind::Pfep)?;
        let code = normalize_str(code);
        if code.is_empty() {
            return Ok(Vec::new());
        }
        let matched = parts
            .clone()
            .lazy()
            .filter(col(kind.column()).eq(lit(code)))
            .collect()?;
        PartRecord::from_frame(&matched)
    }

    /// Raw NPRC rows whose Part Number is one of `part_numbers`.
    pub fn volumes_for_parts(&mut self, part_numbers: &[String]) -> Result<DataFrame> {
        let volumes = self
            .volumes
            .as_ref()
            .ok_or_else(|| ReconError::NoDataLoaded(SourceKind::Nprc.label().to_string()))?;
        self.volume_scans += 1;

        let keys = Series::new(nprc::PART_NUMBER.into(), part_numbers);
        let matched = volumes
            .clone()
            .lazy()
            .filter(col(nprc::PART_NUMBER).is_in(lit(keys), false))
            .collect()?;
        log::debug!(
            "NPRC scan #{}: {} rows for {} part numbers",
            self.volume_scans,
            matched.height(),
            part_numbers.len()
        );
        Ok(matched)
    }

    /// TDC rows by origin, and by destination when one is given.
    pub fn find_routes(&self, origin: &str, destination: Option<&str>) -> Result<RouteMatch> {
        let routes = self.require(SourceKind::Tdc)?;
        let origin = normalize_str(origin);
        let destination = destination.map(normalize_str).filter(|d| !d.is_empty());

        let mut predicate = col(tdc::ORIGIN_CODE).eq(lit(origin));
        if let Some(dest) = &destination {
            predicate = predicate.and(col(tdc::DESTINATION_CODE).eq(lit(dest.clone())));
        }
        let matched = routes.clone().lazy().filter(predicate).collect()?;
        let records = RouteRecord::from_frame(&matched)?;

        Ok(match destination {
            Some(_) => RouteMatch::Exact(records),
            None => RouteMatch::DestinationRequired(records),
        })
    }

    /// First MDR row with exactly this packaging code.
    pub fn find_packaging(&self, code: &str) -> Result<Option<PackagingRecord>> {
        let packaging = self.require(SourceKind::Mdr)?;
        let code = normalize_str(code);
        if code.is_empty() {
            return Ok(None);
        }
        let matched = packaging
            .clone()
            .lazy()
            .filter(col(mdr::MDR_CODE).eq(lit(code)))
            .limit(1)
            .collect()?;
        Ok(PackagingRecord::from_frame(&matched)?.into_iter().next())
    }

    // ── Cache ───────────────────────────────────────────────────────────────

    pub fn cached(&self, key: &str) -> Option<&LookupCacheEntry> {
        self.cache.get(key)
    }

    pub fn cache_insert(&mut self, entry: LookupCacheEntry) -> String {
        let key = cache_key(entry.kind, &entry.code);
        self.cache.insert(key.clone(), entry);
        key
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}

// ── Load-time schema enforcement ────────────────────────────────────────────

struct TableSchema {
    required: &'static [&'static str],
    identifiers: &'static [&'static str],
    text: &'static [&'static str],
    numeric: &'static [&'static str],
}

fn schema_for(kind: SourceKind) -> TableSchema {
    match kind {
        SourceKind::Pfep => TableSchema {
            required: &pfep::REQUIRED,
            identifiers: &pfep::IDENTIFIERS,
            text: &pfep::TEXT,
            numeric: &pfep::NUMERIC,
        },
        SourceKind::Tdc => TableSchema {
            required: &tdc::REQUIRED,
            identifiers: &tdc::IDENTIFIERS,
            text: &tdc::TEXT,
            numeric: &tdc::NUMERIC,
        },
        SourceKind::Mdr => TableSchema {
            required: &mdr::REQUIRED,
            identifiers: &mdr::IDENTIFIERS,
            text: &[],
            numeric: &mdr::NUMERIC,
        },
        SourceKind::Nprc => TableSchema {
            required: &nprc::REQUIRED,
            identifiers: &nprc::IDENTIFIERS,
            text: &nprc::TEXT,
            numeric: &nprc::MONTHS,
        },
    }
}

/// Bring a raw table onto the canonical schema of `kind`.
///
/// Required columns must exist. Optional columns that are missing are added
/// as `""` or `0.0`, numeric columns are coerced to Float64 (unparsable -> 0)
/// and identifier columns are normalized. This is the only place where
/// defaults are applied.
pub fn prepare_table(raw: DataFrame, kind: SourceKind) -> Result<DataFrame> {
    let schema = schema_for(kind);
    for &name in schema.required {
        if raw.column(name).is_err() {
            return Err(ReconError::MissingColumn(format!("{kind}: {name}")));
        }
    }

    let present = raw.schema();
    let mut exprs: Vec<Expr> = Vec::new();
    for &name in schema.identifiers.iter().chain(schema.text) {
        if present.contains(name) {
            exprs.push(
                col(name)
                    .cast(DataType::String)
                    .fill_null(lit(""))
                    .alias(name),
            );
        } else {
            exprs.push(lit("").alias(name));
        }
    }
    for &name in schema.numeric {
        if present.contains(name) {
            exprs.push(
                col(name)
                    .cast(DataType::String)
                    .str()
                    .strip_chars(lit(" \t\r\n"))
                    .cast(DataType::Float64)
                    .fill_null(lit(0.0))
                    .alias(name),
            );
        } else {
            exprs.push(lit(0.0).alias(name));
        }
    }

    let mut df = raw.lazy().with_columns(exprs).collect()?;
    for &name in schema.identifiers {
        normalize_column(&mut df, name)?;
    }
    Ok(df)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parts_frame() -> DataFrame {
        df!(
            pfep::PART_NUMBER => &["PN-1", "PN-2", "PN-3"],
            pfep::SHORT_CODE => &["123.0", " 456 ", ""],
            pfep::LONG_CODE => &["", "", "1234567"],
            pfep::QME => &["50", "abc", "12"],
        )
        .unwrap()
    }

    #[test]
    fn classify_by_length() {
        assert_eq!(IdentifierKind::classify("1").unwrap(), IdentifierKind::ShortCode);
        assert_eq!(IdentifierKind::classify("123456").unwrap(), IdentifierKind::ShortCode);
        assert_eq!(IdentifierKind::classify("1234567").unwrap(), IdentifierKind::LongCode);
        assert_eq!(IdentifierKind::classify("123456789").unwrap(), IdentifierKind::LongCode);
        assert!(matches!(
            IdentifierKind::classify(""),
            Err(ReconError::InvalidCodeLength(_))
        ));
        assert!(matches!(
            IdentifierKind::classify("1234567890"),
            Err(ReconError::InvalidCodeLength(_))
        ));
        assert!(matches!(
            IdentifierKind::classify("12A"),
            Err(ReconError::InvalidCodeLength(_))
        ));
    }

    #[test]
    fn cache_key_format() {
        assert_eq!(cache_key(IdentifierKind::ShortCode, "123"), "short_code_123");
        assert_eq!(cache_key(IdentifierKind::LongCode, "1234567"), "long_code_1234567");
    }

    #[test]
    fn queries_before_load_report_no_data() {
        let store = RecordStore::new();
        assert!(matches!(
            store.find_parts_by_code(IdentifierKind::ShortCode, "123"),
            Err(ReconError::NoDataLoaded(_))
        ));
        assert!(matches!(store.find_routes("1", None), Err(ReconError::NoDataLoaded(_))));
        assert!(matches!(store.find_packaging("M1"), Err(ReconError::NoDataLoaded(_))));
    }

    #[test]
    fn load_normalizes_and_defaults() {
        let mut store = RecordStore::new();
        assert_eq!(store.load_parts(parts_frame()).unwrap(), 3);

        let found = store.find_parts_by_code(IdentifierKind::ShortCode, "123").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].part_number, "PN-1");
        assert_eq!(found[0].qme, 50.0);
        assert_eq!(found[0].supplier_name, "");

        let found = store.find_parts_by_code(IdentifierKind::ShortCode, "456").unwrap();
        assert_eq!(found[0].qme, 0.0, "unparsable QME coerces to zero");

        let found = store.find_parts_by_code(IdentifierKind::LongCode, "1234567.0").unwrap();
        assert_eq!(found[0].part_number, "PN-3");
    }

    #[test]
    fn missing_required_column_is_rejected() {
        let raw = df!(pfep::PART_NUMBER => &["PN-1"]).unwrap();
        let mut store = RecordStore::new();
        assert!(matches!(store.load_parts(raw), Err(ReconError::MissingColumn(_))));
        assert!(!store.is_loaded(SourceKind::Pfep));
    }

    #[test]
    fn routes_need_both_ends_for_exact_match() {
        let mut store = RecordStore::new();
        store
            .load_routes(
                df!(
                    tdc::ORIGIN_CODE => &["123", "123", "999"],
                    tdc::DESTINATION_CODE => &["10", "20", "10"],
                    tdc::CARRIER => &["DHL", "TNT", "DHL"],
                )
                .unwrap(),
            )
            .unwrap();

        match store.find_routes("123", None).unwrap() {
            RouteMatch::DestinationRequired(rows) => assert_eq!(rows.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        match store.find_routes("123", Some("20.0")).unwrap() {
            RouteMatch::Exact(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].carrier, "TNT");
            }
            other => panic!("unexpected {other:?}"),
        }
        match store.find_routes("123", Some("30")).unwrap() {
            RouteMatch::Exact(rows) => assert!(rows.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn packaging_first_match_wins() {
        let mut store = RecordStore::new();
        store
            .load_packaging(
                df!(
                    mdr::MDR_CODE => &["M1", "M1", "M2"],
                    mdr::VOLUME_M3 => &["2.0", "9.0", "1.5"],
                    mdr::WEIGHT_KG => &["10", "90", "5"],
                )
                .unwrap(),
            )
            .unwrap();
        let m1 = store.find_packaging("M1").unwrap().unwrap();
        assert_eq!(m1.volume_m3, 2.0);
        assert_eq!(m1.weight_kg, 10.0);
        assert!(store.find_packaging("M9").unwrap().is_none());
        assert!(store.find_packaging("").unwrap().is_none());
    }

    #[test]
    fn any_load_drops_the_cache() {
        let mut store = RecordStore::new();
        store.load_parts(parts_frame()).unwrap();
        store.cache_insert(LookupCacheEntry {
            kind: IdentifierKind::ShortCode,
            code: "123".into(),
            part: None,
            part_matches: 0,
            pivot_code: "123".into(),
            related_part_numbers: vec![],
            volumes: DataFrame::empty(),
        });
        assert_eq!(store.cache_len(), 1);

        store
            .load_packaging(df!(mdr::MDR_CODE => &["M1"]).unwrap())
            .unwrap();
        assert_eq!(store.cache_len(), 0);
    }

    #[test]
    fn volume_filter_counts_scans() {
        let mut store = RecordStore::new();
        store
            .load_volumes(
                df!(
                    nprc::PART_NUMBER => &["A1", "A1", "B2"],
                    "1" => &["10", "20", "5"],
                )
                .unwrap(),
            )
            .unwrap();
        let subset = store.volumes_for_parts(&["A1".to_string()]).unwrap();
        assert_eq!(subset.height(), 2);
        assert_eq!(store.volume_scans(), 1);
        let months: Vec<Option<f64>> = subset.column("12").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(months, vec![Some(0.0), Some(0.0)]);
    }
}
