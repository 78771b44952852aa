//! Writing a [`Report`] to an xlsx workbook.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::error::Result;
use crate::report::{ComparisonRow, Report};

pub const RESULTS_SHEET: &str = "Results";
pub const MONTHLY_SHEET: &str = "Monthly";

/// Columns before the month block on the Results sheet.
const LEADING_HEADERS: [&str; 13] = [
    "#",
    "PN",
    "Plant",
    "Model",
    "Fold Count",
    "QME AS IS",
    "QME TO BE",
    "MDR AS IS",
    "MDR TO BE",
    "Volume m3 AS IS",
    "Volume m3 TO BE",
    "Weight kg AS IS",
    "Weight kg TO BE",
];

const TRAILING_HEADERS: [&str; 4] = ["Annual Volume", "Savings", "Status", "Has Propose"];

/// `BC_Turbo_Results_<YYYYmmdd_HHMMSS>.xlsx`
pub fn default_filename(at: DateTime<Local>) -> String {
    format!("BC_Turbo_Results_{}.xlsx", at.format("%Y%m%d_%H%M%S"))
}

/// Save `report` into `folder`; returns the written path.
pub fn export_report(report: &Report, folder: &Path, filename: Option<&str>) -> Result<PathBuf> {
    let name = filename
        .map(str::to_string)
        .unwrap_or_else(|| default_filename(Local::now()));
    let path = folder.join(name);

    let mut workbook = Workbook::new();

    let results = workbook.add_worksheet();
    results.set_name(RESULTS_SHEET)?;
    write_results(results, report)?;

    let monthly = workbook.add_worksheet();
    monthly.set_name(MONTHLY_SHEET)?;
    write_monthly(monthly, report)?;

    workbook.save(&path)?;
    log::info!("exported {} rows to {}", report.rows.len(), path.display());
    Ok(path)
}

fn write_results(ws: &mut Worksheet, report: &Report) -> Result<()> {
    let headers = LEADING_HEADERS
        .iter()
        .map(|h| h.to_string())
        .chain(report.month_labels.iter().cloned())
        .chain(TRAILING_HEADERS.iter().map(|h| h.to_string()));
    for (col, header) in headers.enumerate() {
        ws.write_string(0, col as u16, header)?;
    }

    for (i, row) in report.rows.iter().enumerate() {
        write_result_row(ws, i as u32 + 1, row)?;
    }
    Ok(())
}

fn write_result_row(ws: &mut Worksheet, line: u32, row: &ComparisonRow) -> Result<()> {
    ws.write_number(line, 0, row.row as f64)?;
    ws.write_string(line, 1, &row.part_number)?;
    ws.write_string(line, 2, &row.plant)?;
    ws.write_string(line, 3, &row.model)?;
    ws.write_number(line, 4, row.fold_count as f64)?;
    ws.write_number(line, 5, row.qme_as_is)?;
    ws.write_number(line, 6, row.qme_to_be)?;
    ws.write_string(line, 7, &row.mdr_as_is)?;
    ws.write_string(line, 8, &row.mdr_to_be)?;
    ws.write_number(line, 9, row.volume_m3_as_is)?;
    ws.write_number(line, 10, row.volume_m3_to_be)?;
    ws.write_number(line, 11, row.weight_kg_as_is)?;
    ws.write_number(line, 12, row.weight_kg_to_be)?;

    let mut col = LEADING_HEADERS.len() as u16;
    for value in row.months {
        ws.write_number(line, col, value)?;
        col += 1;
    }

    ws.write_number(line, col, row.annual_volume)?;
    ws.write_number(line, col + 1, row.savings)?;
    ws.write_string(line, col + 2, row.status.as_str())?;
    ws.write_boolean(line, col + 3, row.has_propose_data)?;
    Ok(())
}

fn write_monthly(ws: &mut Worksheet, report: &Report) -> Result<()> {
    ws.write_string(0, 0, "Month")?;
    ws.write_string(0, 1, "AS IS")?;
    ws.write_string(0, 2, "TO BE")?;

    let mut line: u32 = 1;
    for (i, label) in report.month_labels.iter().enumerate() {
        ws.write_string(line, 0, label)?;
        ws.write_number(line, 1, report.monthly_as_is[i])?;
        ws.write_number(line, 2, report.monthly_to_be[i])?;
        line += 1;
    }

    ws.write_string(line, 0, "Total")?;
    ws.write_number(line, 1, report.summary.annual_as_is)?;
    ws.write_number(line, 2, report.summary.annual_to_be)?;
    ws.write_string(line + 2, 0, "Savings")?;
    ws.write_number(line + 2, 1, report.summary.total_savings)?;
    Ok(())
}
