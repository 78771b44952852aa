//! The TO-BE ("propose") file.
//!
//! Layout, with an optional second header row:
//!
//! ```text
//! PN      | AS IS |     | TO BE |
//!         | QME   | MDR | QME   | MDR
//! 5201234 | 50    | M1  | 80    | M2
//! ```
//!
//! Columns are taken by position, so the header text itself is not trusted.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::normalize::normalize_str;

pub const COLUMNS: [&str; 5] = ["PN", "AS_IS_QME", "AS_IS_MDR", "TO_BE_QME", "TO_BE_MDR"];

const SAMPLE_SIZE: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProposeRow {
    pub part_number: String,
    pub as_is_qme: Option<f64>,
    pub as_is_mdr: String,
    pub to_be_qme: Option<f64>,
    pub to_be_mdr: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProposeSummary {
    pub rows: usize,
    pub columns: Vec<String>,
    pub sample_pns: Vec<String>,
    pub as_is_qme_total: f64,
    pub to_be_qme_total: f64,
    pub as_is_mdr_distinct: Vec<String>,
    pub to_be_mdr_distinct: Vec<String>,
}

/// Parse a cell grid (header rows included) into propose rows.
///
/// Rows whose Part Number is empty after normalization are dropped. When a
/// Part Number repeats, the first row wins.
pub fn parse_propose(grid: &[Vec<String>]) -> Vec<ProposeRow> {
    let start = if grid.get(1).is_some_and(|row| is_sub_header(row)) {
        2
    } else {
        1
    };

    let mut seen: HashSet<String> = HashSet::new();
    let mut rows = Vec::new();
    for (line, cells) in grid.iter().enumerate().skip(start) {
        let cell = |i: usize| cells.get(i).map(String::as_str).unwrap_or("");
        let part_number = normalize_str(cell(0));
        if part_number.is_empty() {
            continue;
        }
        if !seen.insert(part_number.clone()) {
            log::warn!("propose line {}: duplicate PN {part_number} ignored", line + 1);
            continue;
        }
        rows.push(ProposeRow {
            part_number,
            as_is_qme: parse_number(cell(1)),
            as_is_mdr: normalize_str(cell(2)),
            to_be_qme: parse_number(cell(3)),
            to_be_mdr: normalize_str(cell(4)),
        });
    }
    rows
}

fn is_sub_header(row: &[String]) -> bool {
    row.iter().any(|cell| {
        let cell = cell.trim();
        cell.eq_ignore_ascii_case("QME") || cell.eq_ignore_ascii_case("MDR")
    })
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

pub fn summarize(rows: &[ProposeRow]) -> ProposeSummary {
    let distinct = |pick: fn(&ProposeRow) -> &str| -> Vec<String> {
        rows.iter()
            .map(pick)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };

    ProposeSummary {
        rows: rows.len(),
        columns: COLUMNS.iter().map(|c| c.to_string()).collect(),
        sample_pns: rows
            .iter()
            .take(SAMPLE_SIZE)
            .map(|r| r.part_number.clone())
            .collect(),
        as_is_qme_total: rows.iter().filter_map(|r| r.as_is_qme).sum(),
        to_be_qme_total: rows.iter().filter_map(|r| r.to_be_qme).sum(),
        as_is_mdr_distinct: distinct(|r| r.as_is_mdr.as_str()),
        to_be_mdr_distinct: distinct(|r| r.to_be_mdr.as_str()),
    }
}
