//! AS-IS vs TO-BE reconciliation.
//!
//! NPRC rows are folded per Part Number first, then intersected with PFEP;
//! only Part Numbers present on both sides reach the report. Propose rows and
//! MDR packaging are joined onto that intersection.

use std::collections::{BTreeMap, HashMap, HashSet};

use polars::prelude::*;

use crate::config::MonthCalendar;
use crate::error::{ReconError, Result};
use crate::propose::ProposeRow;
use crate::records::{AggregatedVolume, PartRecord};
use crate::report::{ComparisonRow, ComparisonStatus, Report, ReportSummary};
use crate::schema::nprc;
use crate::store::RecordStore;

// ── Projection ──────────────────────────────────────────────────────────────

/// TO-BE volume and savings rule.
pub trait Projection {
    /// Monthly TO-BE series for one row.
    fn to_be_months(&self, row: &ComparisonRow) -> [f64; 12];

    fn savings(&self, row: &ComparisonRow) -> f64;
}

/// Keeps the AS-IS series and reports no savings.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderProjection;

impl Projection for PlaceholderProjection {
    fn to_be_months(&self, row: &ComparisonRow) -> [f64; 12] {
        row.months
    }

    fn savings(&self, _row: &ComparisonRow) -> f64 {
        0.0
    }
}

pub struct ReconcileOptions<'a> {
    pub calendar: MonthCalendar,
    pub projection: &'a dyn Projection,
}

impl Default for ReconcileOptions<'_> {
    fn default() -> Self {
        Self {
            calendar: MonthCalendar::default(),
            projection: &PlaceholderProjection,
        }
    }
}

// ── Aggregation ─────────────────────────────────────────────────────────────

/// Fold NPRC rows by Part Number: months summed, first plant/model kept,
/// number of folded rows counted. Rows without a Part Number are dropped.
pub fn aggregate_volumes(volumes: &DataFrame) -> Result<Vec<AggregatedVolume>> {
    if volumes.height() == 0 {
        return Ok(Vec::new());
    }

    let mut aggs: Vec<Expr> = vec![col(nprc::PLANT).first(), col(nprc::MODEL).first()];
    aggs.extend(nprc::MONTHS.iter().map(|m| col(*m).sum()));
    aggs.push(
        col(nprc::PLANT)
            .count()
            .cast(DataType::Int64)
            .alias(nprc::FOLD_COUNT),
    );

    let grouped = volumes
        .clone()
        .lazy()
        .filter(col(nprc::PART_NUMBER).neq(lit("")))
        .group_by_stable([col(nprc::PART_NUMBER)])
        .agg(aggs)
        .collect()?;

    AggregatedVolume::from_frame(&grouped)
}

// ── Reconciliation ──────────────────────────────────────────────────────────

pub fn require_propose(propose: &[ProposeRow]) -> Result<()> {
    if propose.is_empty() {
        return Err(ReconError::MissingInputData(
            "load the AS IS/TO BE file before simulating".into(),
        ));
    }
    Ok(())
}

/// Build the comparison report.
///
/// `volumes` is either the full NPRC table or a cached lookup subset; both
/// come from `store` and are already on the canonical schema.
pub fn reconcile(
    propose: &[ProposeRow],
    store: &RecordStore,
    volumes: &DataFrame,
    options: &ReconcileOptions<'_>,
    progress: &dyn Fn(&str),
) -> Result<Report> {
    require_propose(propose)?;

    let mut parts: BTreeMap<String, PartRecord> = BTreeMap::new();
    for part in store.part_records()? {
        if !part.part_number.is_empty() {
            parts.entry(part.part_number.clone()).or_insert(part);
        }
    }

    progress(&format!("Aggregating {} volume rows", volumes.height()));
    let aggregated: BTreeMap<String, AggregatedVolume> = aggregate_volumes(volumes)?
        .into_iter()
        .map(|agg| (agg.part_number.clone(), agg))
        .collect();

    progress("Intersecting PFEP and NPRC");
    let dataset: Vec<&AggregatedVolume> = aggregated
        .values()
        .filter(|agg| parts.contains_key(&agg.part_number))
        .collect();
    log::info!(
        "reconcile: {} PFEP parts, {} NPRC parts, {} in both",
        parts.len(),
        aggregated.len(),
        dataset.len()
    );

    let mut propose_index: HashMap<&str, &ProposeRow> = HashMap::with_capacity(propose.len());
    for row in propose {
        propose_index.entry(row.part_number.as_str()).or_insert(row);
    }

    progress(&format!("Building {} comparison rows", dataset.len()));
    let mut packaging = PackagingResolver::new(store);
    let mut rows = Vec::with_capacity(dataset.len());
    for (i, agg) in dataset.iter().enumerate() {
        let part = &parts[&agg.part_number];
        let proposed = propose_index.get(agg.part_number.as_str());

        let qme_as_is = part.qme;
        let mdr_as_is = part.mdr_code.clone();
        let (qme_to_be, mdr_to_be) = match proposed {
            Some(p) => (p.to_be_qme.unwrap_or(0.0), p.to_be_mdr.clone()),
            None => (0.0, String::new()),
        };
        let (volume_m3_as_is, weight_kg_as_is) = packaging.resolve(&mdr_as_is);
        let (volume_m3_to_be, weight_kg_to_be) = packaging.resolve(&mdr_to_be);

        let mut row = ComparisonRow {
            row: i + 1,
            part_number: agg.part_number.clone(),
            plant: agg.plant.clone(),
            model: agg.model.clone(),
            fold_count: agg.fold_count,
            qme_as_is,
            qme_to_be,
            mdr_as_is,
            mdr_to_be,
            volume_m3_as_is,
            volume_m3_to_be,
            weight_kg_as_is,
            weight_kg_to_be,
            months: agg.months,
            annual_volume: agg.months.iter().sum(),
            savings: 0.0,
            status: ComparisonStatus::from_qme(qme_as_is, qme_to_be),
            has_propose_data: proposed.is_some(),
        };
        row.savings = options.projection.savings(&row);
        rows.push(row);
    }

    let mut monthly_as_is = [0.0f64; 12];
    let mut monthly_to_be = [0.0f64; 12];
    for row in &rows {
        let to_be = options.projection.to_be_months(row);
        for m in 0..12 {
            monthly_as_is[m] += row.months[m];
            monthly_to_be[m] += to_be[m];
        }
    }

    let in_dataset: HashSet<&str> = dataset.iter().map(|a| a.part_number.as_str()).collect();
    let (propose_in_dataset, propose_outside_dataset): (Vec<String>, Vec<String>) = propose
        .iter()
        .map(|p| p.part_number.clone())
        .partition(|pn| in_dataset.contains(pn.as_str()));

    let with_propose = rows.iter().filter(|r| r.has_propose_data).count();
    let summary = ReportSummary {
        total_rows: rows.len(),
        with_propose,
        without_propose: rows.len() - with_propose,
        improvements: rows
            .iter()
            .filter(|r| r.status == ComparisonStatus::Improvement)
            .count(),
        annual_as_is: monthly_as_is.iter().sum(),
        annual_to_be: monthly_to_be.iter().sum(),
        total_savings: rows.iter().map(|r| r.savings).sum(),
    };
    log::info!(
        "reconcile: {} rows ({} with propose data), {} propose PNs outside the dataset",
        summary.total_rows,
        summary.with_propose,
        propose_outside_dataset.len()
    );

    Ok(Report {
        rows,
        summary,
        month_labels: options.calendar.labels(),
        monthly_as_is,
        monthly_to_be,
        propose_in_dataset,
        propose_outside_dataset,
    })
}

/// MDR lookups memoized for one pass. A missing table or code yields zeros.
struct PackagingResolver<'a> {
    store: &'a RecordStore,
    memo: HashMap<String, (f64, f64)>,
    warned: bool,
}

impl<'a> PackagingResolver<'a> {
    fn new(store: &'a RecordStore) -> Self {
        Self {
            store,
            memo: HashMap::new(),
            warned: false,
        }
    }

    /// (volume m³, weight kg)
    fn resolve(&mut self, code: &str) -> (f64, f64) {
        if code.is_empty() {
            return (0.0, 0.0);
        }
        if let Some(hit) = self.memo.get(code) {
            return *hit;
        }
        let value = match self.store.find_packaging(code) {
            Ok(Some(record)) => (record.volume_m3, record.weight_kg),
            Ok(None) => (0.0, 0.0),
            Err(err) => {
                if !self.warned {
                    log::warn!("packaging volumes degraded to zero: {err}");
                    self.warned = true;
                }
                (0.0, 0.0)
            }
        };
        self.memo.insert(code.to_string(), value);
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{mdr, pfep};
    use pretty_assertions::assert_eq;

    fn propose(pn: &str, to_be_qme: f64, to_be_mdr: &str) -> ProposeRow {
        ProposeRow {
            part_number: pn.into(),
            as_is_qme: None,
            as_is_mdr: String::new(),
            to_be_qme: Some(to_be_qme),
            to_be_mdr: to_be_mdr.into(),
        }
    }

    fn no_progress(_: &str) {}

    fn scenario_store() -> RecordStore {
        let mut store = RecordStore::new();
        store
            .load_parts(
                df!(
                    pfep::PART_NUMBER => &["X", "ONLY-PFEP", "Y"],
                    pfep::SHORT_CODE => &["123", "124", "125"],
                    pfep::LONG_CODE => &["", "", ""],
                    pfep::QME => &["50", "10", "30"],
                    pfep::MDR_CODE => &["M1", "M1", "M2"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .load_volumes(
                df!(
                    nprc::PART_NUMBER => &["X", "Y", "Y", "ONLY-NPRC"],
                    nprc::PLANT => &["P1", "P2", "P3", "P1"],
                    "1" => &["100", "4", "6", "1"],
                    "2" => &["", "1", "1", "1"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .load_packaging(
                df!(
                    mdr::MDR_CODE => &["M1"],
                    mdr::VOLUME_M3 => &["2.0"],
                    mdr::WEIGHT_KG => &["12.5"],
                )
                .unwrap(),
            )
            .unwrap();
        store
    }

    fn run(store: &RecordStore, rows: &[ProposeRow]) -> Report {
        let volumes = store.require(crate::schema::SourceKind::Nprc).unwrap();
        reconcile(rows, store, volumes, &ReconcileOptions::default(), &no_progress).unwrap()
    }

    #[test]
    fn duplicate_rows_are_summed() {
        let volumes = df!(
            nprc::PART_NUMBER => &["A1", "A1", "A1", "B2"],
            nprc::PLANT => &["P1", "P2", "P3", "P9"],
            nprc::MODEL => &["M", "N", "O", "Z"],
            "1" => &[10.0, 20.0, 5.0, 1.0],
        )
        .unwrap();
        let volumes = crate::store::prepare_table(volumes, crate::schema::SourceKind::Nprc).unwrap();
        let aggs = aggregate_volumes(&volumes).unwrap();
        assert_eq!(aggs.len(), 2);
        assert_eq!(aggs[0].part_number, "A1");
        assert_eq!(aggs[0].months[0], 35.0);
        assert_eq!(aggs[0].fold_count, 3);
        assert_eq!(aggs[0].plant, "P1");
        assert_eq!(aggs[0].model, "M");
        assert_eq!(aggs[1].fold_count, 1);
    }

    #[test]
    fn empty_propose_fails_first() {
        let store = RecordStore::new();
        let err = reconcile(
            &[],
            &store,
            &DataFrame::empty(),
            &ReconcileOptions::default(),
            &no_progress,
        )
        .unwrap_err();
        assert!(matches!(err, ReconError::MissingInputData(_)));
    }

    #[test]
    fn end_to_end_single_part() {
        let store = scenario_store();
        let report = run(&store, &[propose("X", 80.0, "M1")]);

        let x = report.rows.iter().find(|r| r.part_number == "X").unwrap();
        assert_eq!(x.qme_as_is, 50.0);
        assert_eq!(x.qme_to_be, 80.0);
        assert_eq!(x.status, ComparisonStatus::Improvement);
        assert_eq!(x.volume_m3_as_is, 2.0);
        assert_eq!(x.volume_m3_to_be, 2.0);
        assert_eq!(x.weight_kg_as_is, 12.5);
        assert_eq!(x.months[0], 100.0);
        assert!(x.has_propose_data);
        assert_eq!(report.month_labels[0], "January");
    }

    #[test]
    fn one_sided_part_numbers_are_excluded() {
        let store = scenario_store();
        let report = run(&store, &[propose("X", 80.0, "M1"), propose("ONLY-PFEP", 1.0, "")]);
        let pns: Vec<&str> = report.rows.iter().map(|r| r.part_number.as_str()).collect();
        assert_eq!(pns, vec!["X", "Y"]);
        assert_eq!(report.propose_in_dataset, vec!["X"]);
        assert_eq!(report.propose_outside_dataset, vec!["ONLY-PFEP"]);
    }

    #[test]
    fn missing_propose_row_compares_against_zero() {
        let store = scenario_store();
        let report = run(&store, &[propose("X", 80.0, "M1")]);
        let y = report.rows.iter().find(|r| r.part_number == "Y").unwrap();
        assert!(!y.has_propose_data);
        assert_eq!(y.qme_to_be, 0.0);
        assert_eq!(y.mdr_to_be, "");
        assert_eq!(y.status, ComparisonStatus::NoChange);
        assert_eq!(y.volume_m3_as_is, 0.0, "M2 is not in MDR");
        assert_eq!(y.months[0], 10.0);
        assert_eq!(y.fold_count, 2);

        assert_eq!(report.summary.total_rows, 2);
        assert_eq!(report.summary.with_propose, 1);
        assert_eq!(report.summary.without_propose, 1);
    }

    #[test]
    fn monthly_rollup_and_annual_totals() {
        let store = scenario_store();
        let report = run(&store, &[propose("X", 80.0, "M1")]);
        assert_eq!(report.monthly_as_is[0], 110.0);
        assert_eq!(report.monthly_as_is[1], 2.0);
        assert_eq!(report.monthly_to_be, report.monthly_as_is);
        assert_eq!(report.summary.annual_as_is, 112.0);
        assert_eq!(report.summary.total_savings, 0.0);
    }

    #[test]
    fn absent_packaging_table_degrades_to_zero() {
        let mut store = RecordStore::new();
        store
            .load_parts(
                df!(
                    pfep::PART_NUMBER => &["X"],
                    pfep::SHORT_CODE => &["123"],
                    pfep::LONG_CODE => &[""],
                    pfep::MDR_CODE => &["M1"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .load_volumes(df!(nprc::PART_NUMBER => &["X"], "1" => &["3"]).unwrap())
            .unwrap();
        let report = run(&store, &[propose("X", 1.0, "M1")]);
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].volume_m3_as_is, 0.0);
    }

    struct DoubleSavings;

    impl Projection for DoubleSavings {
        fn to_be_months(&self, row: &ComparisonRow) -> [f64; 12] {
            row.months.map(|v| v / 2.0)
        }

        fn savings(&self, row: &ComparisonRow) -> f64 {
            row.qme_to_be - row.qme_as_is
        }
    }

    #[test]
    fn projection_is_pluggable() {
        let store = scenario_store();
        let volumes = store.require(crate::schema::SourceKind::Nprc).unwrap();
        let options = ReconcileOptions {
            calendar: MonthCalendar::starting_at(7).unwrap(),
            projection: &DoubleSavings,
        };
        let report =
            reconcile(&[propose("X", 80.0, "M1")], &store, volumes, &options, &no_progress).unwrap();
        assert_eq!(report.month_labels[0], "July");
        assert_eq!(report.monthly_to_be[0], 55.0);
        assert_eq!(report.summary.total_savings, 0.0, "X gains 30, Y loses 30");
    }
}
