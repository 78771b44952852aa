use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::schema::report;

/// Outcome of comparing TO-BE against AS-IS packaging size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComparisonStatus {
    /// TO-BE QME is not larger than AS-IS.
    NoChange,
    /// TO-BE QME is larger than AS-IS.
    Improvement,
}

impl ComparisonStatus {
    pub fn from_qme(as_is: f64, to_be: f64) -> Self {
        if to_be > as_is {
            Self::Improvement
        } else {
            Self::NoChange
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoChange => "no-change",
            Self::Improvement => "improvement",
        }
    }
}

/// One Part Number present in both PFEP and NPRC.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonRow {
    /// 1-based position in the report.
    pub row: usize,
    pub part_number: String,
    pub plant: String,
    pub model: String,
    pub fold_count: usize,
    pub qme_as_is: f64,
    pub qme_to_be: f64,
    pub mdr_as_is: String,
    pub mdr_to_be: String,
    pub volume_m3_as_is: f64,
    pub volume_m3_to_be: f64,
    pub weight_kg_as_is: f64,
    pub weight_kg_to_be: f64,
    /// Aggregated NPRC volumes, index 0 is NPRC column "1".
    pub months: [f64; 12],
    pub annual_volume: f64,
    pub savings: f64,
    pub status: ComparisonStatus,
    pub has_propose_data: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportSummary {
    pub total_rows: usize,
    pub with_propose: usize,
    pub without_propose: usize,
    pub improvements: usize,
    pub annual_as_is: f64,
    pub annual_to_be: f64,
    pub total_savings: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub rows: Vec<ComparisonRow>,
    pub summary: ReportSummary,
    /// Calendar month names for `months` / the monthly series, in order.
    pub month_labels: Vec<String>,
    pub monthly_as_is: [f64; 12],
    pub monthly_to_be: [f64; 12],
    /// Propose Part Numbers that made it into the dataset.
    pub propose_in_dataset: Vec<String>,
    /// Propose Part Numbers missing from PFEP or NPRC.
    pub propose_outside_dataset: Vec<String>,
}

impl Report {
    pub fn message(&self) -> String {
        format!("Simulation finished for {} PNs.", self.summary.total_rows)
    }

    /// Flatten the rows into a DataFrame, month columns named by `month_labels`.
    pub fn to_frame(&self) -> Result<DataFrame> {
        let rows = &self.rows;
        let mut columns: Vec<Column> = vec![
            Column::new(
                report::ROW.into(),
                rows.iter().map(|r| r.row as u64).collect::<Vec<_>>(),
            ),
            Column::new(
                report::PART_NUMBER.into(),
                rows.iter().map(|r| r.part_number.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                report::PLANT.into(),
                rows.iter().map(|r| r.plant.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                report::MODEL.into(),
                rows.iter().map(|r| r.model.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                report::FOLD_COUNT.into(),
                rows.iter().map(|r| r.fold_count as u64).collect::<Vec<_>>(),
            ),
            Column::new(
                report::QME_AS_IS.into(),
                rows.iter().map(|r| r.qme_as_is).collect::<Vec<_>>(),
            ),
            Column::new(
                report::QME_TO_BE.into(),
                rows.iter().map(|r| r.qme_to_be).collect::<Vec<_>>(),
            ),
            Column::new(
                report::MDR_AS_IS.into(),
                rows.iter().map(|r| r.mdr_as_is.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                report::MDR_TO_BE.into(),
                rows.iter().map(|r| r.mdr_to_be.as_str()).collect::<Vec<_>>(),
            ),
            Column::new(
                report::VOL_AS_IS.into(),
                rows.iter().map(|r| r.volume_m3_as_is).collect::<Vec<_>>(),
            ),
            Column::new(
                report::VOL_TO_BE.into(),
                rows.iter().map(|r| r.volume_m3_to_be).collect::<Vec<_>>(),
            ),
            Column::new(
                report::WEIGHT_AS_IS.into(),
                rows.iter().map(|r| r.weight_kg_as_is).collect::<Vec<_>>(),
            ),
            Column::new(
                report::WEIGHT_TO_BE.into(),
                rows.iter().map(|r| r.weight_kg_to_be).collect::<Vec<_>>(),
            ),
        ];

        for (i, label) in self.month_labels.iter().enumerate() {
            columns.push(Column::new(
                label.as_str().into(),
                rows.iter().map(|r| r.months[i]).collect::<Vec<_>>(),
            ));
        }

        columns.push(Column::new(
            report::ANNUAL_VOLUME.into(),
            rows.iter().map(|r| r.annual_volume).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            report::SAVINGS.into(),
            rows.iter().map(|r| r.savings).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            report::STATUS.into(),
            rows.iter().map(|r| r.status.as_str()).collect::<Vec<_>>(),
        ));
        columns.push(Column::new(
            report::HAS_PROPOSE.into(),
            rows.iter().map(|r| r.has_propose_data).collect::<Vec<_>>(),
        ));

        Ok(DataFrame::new(columns)?)
    }
}
