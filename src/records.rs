//! Typed rows over the loaded source tables.
//!
//! The store keeps each source as a polars `DataFrame` whose columns were
//! normalized and defaulted at load time. These structs are the checked view
//! handed out by queries: every field exists, absent text is `""`, absent
//! numbers are `0.0`.

use polars::prelude::*;
use serde::Serialize;

use crate::error::Result;
use crate::schema::{mdr, nprc, pfep, tdc};

fn text<'a>(df: &'a DataFrame, column: &str) -> Result<&'a StringChunked> {
    Ok(df.column(column)?.str()?)
}

fn number<'a>(df: &'a DataFrame, column: &str) -> Result<&'a Float64Chunked> {
    Ok(df.column(column)?.f64()?)
}

fn text_at(ca: &StringChunked, i: usize) -> String {
    ca.get(i).unwrap_or("").to_string()
}

fn number_at(ca: &Float64Chunked, i: usize) -> f64 {
    ca.get(i).unwrap_or(0.0)
}

// ── PFEP ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartRecord {
    pub part_number: String,
    pub short_code: String,
    pub long_code: String,
    pub weekly_units: f64,
    pub weekly_m3: f64,
    /// Packaging size (units per package).
    pub qme: f64,
    pub mdr_code: String,
    pub supplier_name: String,
    pub supplier_city: String,
    pub supplier_state: String,
    pub flow_type: String,
}

impl PartRecord {
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let part_number = text(df, pfep::PART_NUMBER)?;
        let short_code = text(df, pfep::SHORT_CODE)?;
        let long_code = text(df, pfep::LONG_CODE)?;
        let weekly_units = number(df, pfep::WEEKLY_UNITS)?;
        let weekly_m3 = number(df, pfep::WEEKLY_M3)?;
        let qme = number(df, pfep::QME)?;
        let mdr_code = text(df, pfep::MDR_CODE)?;
        let supplier_name = text(df, pfep::SUPPLIER_NAME)?;
        let supplier_city = text(df, pfep::SUPPLIER_CITY)?;
        let supplier_state = text(df, pfep::SUPPLIER_STATE)?;
        let flow_type = text(df, pfep::FLOW_TYPE)?;

        Ok((0..df.height())
            .map(|i| PartRecord {
                part_number: text_at(part_number, i),
                short_code: text_at(short_code, i),
                long_code: text_at(long_code, i),
                weekly_units: number_at(weekly_units, i),
                weekly_m3: number_at(weekly_m3, i),
                qme: number_at(qme, i),
                mdr_code: text_at(mdr_code, i),
                supplier_name: text_at(supplier_name, i),
                supplier_city: text_at(supplier_city, i),
                supplier_state: text_at(supplier_state, i),
                flow_type: text_at(flow_type, i),
            })
            .collect())
    }
}

// ── TDC ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteRecord {
    pub origin_code: String,
    pub destination_code: String,
    pub carrier: String,
    pub vehicle: String,
    pub route_code: String,
    pub flow_type: String,
    pub trip: String,
    pub distance_km: f64,
    pub cross_dock: String,
}

impl RouteRecord {
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let origin_code = text(df, tdc::ORIGIN_CODE)?;
        let destination_code = text(df, tdc::DESTINATION_CODE)?;
        let carrier = text(df, tdc::CARRIER)?;
        let vehicle = text(df, tdc::VEHICLE)?;
        let route_code = text(df, tdc::ROUTE_CODE)?;
        let flow_type = text(df, tdc::FLOW_TYPE)?;
        let trip = text(df, tdc::TRIP)?;
        let distance_km = number(df, tdc::DISTANCE_KM)?;
        let cross_dock = text(df, tdc::CROSS_DOCK)?;

        Ok((0..df.height())
            .map(|i| RouteRecord {
                origin_code: text_at(origin_code, i),
                destination_code: text_at(destination_code, i),
                carrier: text_at(carrier, i),
                vehicle: text_at(vehicle, i),
                route_code: text_at(route_code, i),
                flow_type: text_at(flow_type, i),
                trip: text_at(trip, i),
                distance_km: number_at(distance_km, i),
                cross_dock: text_at(cross_dock, i),
            })
            .collect())
    }
}

// ── MDR ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackagingRecord {
    pub mdr_code: String,
    pub volume_m3: f64,
    pub weight_kg: f64,
}

impl PackagingRecord {
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let mdr_code = text(df, mdr::MDR_CODE)?;
        let volume_m3 = number(df, mdr::VOLUME_M3)?;
        let weight_kg = number(df, mdr::WEIGHT_KG)?;

        Ok((0..df.height())
            .map(|i| PackagingRecord {
                mdr_code: text_at(mdr_code, i),
                volume_m3: number_at(volume_m3, i),
                weight_kg: number_at(weight_kg, i),
            })
            .collect())
    }
}

// ── NPRC (aggregated) ───────────────────────────────────────────────────────

/// One Part Number after folding all of its NPRC rows together.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedVolume {
    pub part_number: String,
    /// First-seen plant.
    pub plant: String,
    /// First-seen model.
    pub model: String,
    /// Sums of NPRC columns "1".."12".
    pub months: [f64; 12],
    pub fold_count: usize,
}

impl AggregatedVolume {
    /// Read the output of `reconcile::aggregate_volumes`.
    pub fn from_frame(df: &DataFrame) -> Result<Vec<Self>> {
        let part_number = text(df, nprc::PART_NUMBER)?;
        let plant = text(df, nprc::PLANT)?;
        let model = text(df, nprc::MODEL)?;
        let fold_count = df.column(nprc::FOLD_COUNT)?.i64()?;
        let months = nprc::MONTHS
            .iter()
            .map(|m| number(df, m))
            .collect::<Result<Vec<_>>>()?;

        Ok((0..df.height())
            .map(|i| {
                let mut values = [0.0f64; 12];
                for (slot, ca) in values.iter_mut().zip(&months) {
                    *slot = number_at(ca, i);
                }
                AggregatedVolume {
                    part_number: text_at(part_number, i),
                    plant: text_at(plant, i),
                    model: text_at(model, i),
                    months: values,
                    fold_count: fold_count.get(i).unwrap_or(0).max(0) as usize,
                }
            })
            .collect())
    }
}
