//! Single-code lookup: PFEP part, TDC route and the NPRC cross-reference.

use serde::Serialize;

use crate::error::Result;
use crate::normalize::{is_numeric_code, normalize_str};
use crate::records::{PartRecord, RouteRecord};
use crate::schema::SourceKind;
use crate::store::{cache_key, IdentifierKind, LookupCacheEntry, RecordStore, RouteMatch};

/// Inputs of one lookup, as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct LookupQuery {
    pub code: String,
    pub plant: String,
    pub origin_city: String,
    pub dest_city: String,
}

impl LookupQuery {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_destination(mut self, dest_city: impl Into<String>) -> Self {
        self.dest_city = dest_city.into();
        self
    }

    pub fn with_origin(mut self, origin_city: impl Into<String>) -> Self {
        self.origin_city = origin_city.into();
        self
    }

    pub fn with_plant(mut self, plant: impl Into<String>) -> Self {
        self.plant = plant.into();
        self
    }
}

/// PFEP and TDC attributes flattened into one record.
///
/// Supplier fields always come from the part. Flow type and cross-dock come
/// from the route when it has them and fall back to the part (flow type) or
/// to an origin-only route (cross-dock) otherwise. Carrier, vehicle, route
/// code, trip and distance exist only on routes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MergedAttributes {
    pub supplier_name: String,
    pub supplier_city: String,
    pub supplier_state: String,
    pub flow_type: String,
    pub carrier: String,
    pub vehicle: String,
    pub route_code: String,
    pub trip: String,
    pub distance_km: f64,
    pub cross_dock: String,
}

impl MergedAttributes {
    pub fn merge(part: &PartRecord, route: Option<&RouteRecord>, cross_dock: &str) -> Self {
        let mut merged = Self {
            supplier_name: part.supplier_name.clone(),
            supplier_city: part.supplier_city.clone(),
            supplier_state: part.supplier_state.clone(),
            flow_type: part.flow_type.clone(),
            cross_dock: cross_dock.to_string(),
            ..Default::default()
        };
        if let Some(route) = route {
            merged.carrier = route.carrier.clone();
            merged.vehicle = route.vehicle.clone();
            merged.route_code = route.route_code.clone();
            merged.trip = route.trip.clone();
            merged.distance_km = route.distance_km;
            if !route.flow_type.is_empty() {
                merged.flow_type = route.flow_type.clone();
            }
            if !route.cross_dock.is_empty() {
                merged.cross_dock = route.cross_dock.clone();
            }
        }
        merged
    }
}

/// Distinct values across every route row that matched, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RouteOptions {
    pub carriers: Vec<String>,
    pub vehicles: Vec<String>,
    pub flows: Vec<String>,
    pub trips: Vec<String>,
}

impl RouteOptions {
    pub fn collect(routes: &[RouteRecord]) -> Self {
        let mut options = Self::default();
        for route in routes {
            push_distinct(&mut options.carriers, &route.carrier);
            push_distinct(&mut options.vehicles, &route.vehicle);
            push_distinct(&mut options.flows, &route.flow_type);
            push_distinct(&mut options.trips, &route.trip);
        }
        options
    }
}

fn push_distinct(values: &mut Vec<String>, value: &str) {
    if !value.is_empty() && !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LookupData {
    pub filter_used: IdentifierKind,
    pub code: String,
    pub plant: String,
    pub part: PartRecord,
    pub part_matches: usize,
    pub volume_rows: usize,
    pub pivot_code: String,
    pub origin_code: Option<String>,
    pub destination_code: Option<String>,
    pub needs_destination: bool,
    pub route: Option<RouteRecord>,
    pub attributes: MergedAttributes,
    pub options: RouteOptions,
    pub from_cache: bool,
    pub cache_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Part found; route resolved or not attempted.
    Found(LookupData),
    /// Part found but the route needs a destination code.
    NeedsDestination(LookupData),
    NotFound { kind: IdentifierKind, code: String },
}

impl LookupOutcome {
    pub fn data(&self) -> Option<&LookupData> {
        match self {
            Self::Found(data) | Self::NeedsDestination(data) => Some(data),
            Self::NotFound { .. } => None,
        }
    }
}

/// Resolve `query` against `store`, populating its cache on first use of a code.
///
/// Classification errors return before the cache is touched.
pub fn lookup(store: &mut RecordStore, query: &LookupQuery) -> Result<LookupOutcome> {
    let code = normalize_str(&query.code);
    let kind = IdentifierKind::classify(&code)?;
    let key = cache_key(kind, &code);

    let (entry, from_cache) = match store.cached(&key) {
        Some(entry) => {
            log::debug!("lookup cache hit: {key}");
            (entry.clone(), true)
        }
        None => {
            let entry = cross_reference(store, kind, &code)?;
            store.cache_insert(entry.clone());
            (entry, false)
        }
    };

    let Some(part) = entry.part.clone() else {
        return Ok(LookupOutcome::NotFound { kind, code });
    };

    let origin = Some(entry.pivot_code.clone())
        .filter(|p| !p.is_empty())
        .or_else(|| numeric_code(&query.origin_city));
    let destination = numeric_code(&query.dest_city);

    let mut data = LookupData {
        filter_used: kind,
        code,
        plant: query.plant.trim().to_string(),
        attributes: MergedAttributes::merge(&part, None, ""),
        part,
        part_matches: entry.part_matches,
        volume_rows: entry.volume_matches(),
        pivot_code: entry.pivot_code.clone(),
        origin_code: origin.clone(),
        destination_code: destination.clone(),
        needs_destination: false,
        route: None,
        options: RouteOptions::default(),
        from_cache,
        cache_key: key,
    };

    let Some(origin) = origin else {
        data.needs_destination = destination.is_none();
        return Ok(if data.needs_destination {
            LookupOutcome::NeedsDestination(data)
        } else {
            LookupOutcome::Found(data)
        });
    };

    if !store.is_loaded(SourceKind::Tdc) {
        log::warn!("{} not loaded: {} resolved without route data", SourceKind::Tdc, data.code);
        data.needs_destination = destination.is_none();
        return Ok(if data.needs_destination {
            LookupOutcome::NeedsDestination(data)
        } else {
            LookupOutcome::Found(data)
        });
    }

    match store.find_routes(&origin, destination.as_deref())? {
        RouteMatch::DestinationRequired(partial) => {
            let cross_dock = partial
                .iter()
                .map(|r| r.cross_dock.as_str())
                .find(|c| !c.is_empty())
                .unwrap_or("");
            data.attributes = MergedAttributes::merge(&data.part, None, cross_dock);
            data.needs_destination = true;
            Ok(LookupOutcome::NeedsDestination(data))
        }
        RouteMatch::Exact(routes) => {
            if let Some(first) = routes.first() {
                data.attributes = MergedAttributes::merge(&data.part, Some(first), "");
                data.options = RouteOptions::collect(&routes);
                data.route = Some(first.clone());
            }
            Ok(LookupOutcome::Found(data))
        }
    }
}

/// Steps run only on a cache miss: part match, pivot, NPRC subset.
fn cross_reference(
    store: &mut RecordStore,
    kind: IdentifierKind,
    code: &str,
) -> Result<LookupCacheEntry> {
    let parts = store.find_parts_by_code(kind, code)?;
    if parts.len() > 1 {
        log::debug!("{kind} {code}: {} PFEP rows share the code, using the first", parts.len());
    }

    let mut related_part_numbers: Vec<String> = Vec::new();
    for part in &parts {
        if !part.part_number.is_empty() && !related_part_numbers.contains(&part.part_number) {
            related_part_numbers.push(part.part_number.clone());
        }
    }

    let part = parts.first().cloned();
    let pivot_code = match (kind, &part) {
        (IdentifierKind::ShortCode, _) => code.to_string(),
        (IdentifierKind::LongCode, Some(p)) => p.short_code.clone(),
        (IdentifierKind::LongCode, None) => String::new(),
    };

    let volumes = match &part {
        Some(_) if store.is_loaded(SourceKind::Nprc) => store.volumes_for_parts(&related_part_numbers)?,
        Some(_) => {
            log::warn!("{} not loaded: {kind} {code} cached without volumes", SourceKind::Nprc);
            polars::prelude::DataFrame::empty()
        }
        None => polars::prelude::DataFrame::empty(),
    };

    Ok(LookupCacheEntry {
        kind,
        code: code.to_string(),
        part,
        part_matches: parts.len(),
        pivot_code,
        related_part_numbers,
        volumes,
    })
}

fn numeric_code(raw: &str) -> Option<String> {
    let code = normalize_str(raw);
    is_numeric_code(&code).then_some(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReconError;
    use crate::schema::{nprc, pfep, tdc};
    use polars::prelude::*;
    use pretty_assertions::assert_eq;

    fn store() -> RecordStore {
        let mut store = RecordStore::new();
        store
            .load_parts(
                df!(
                    pfep::PART_NUMBER => &["PN-1", "PN-1B", "PN-2"],
                    pfep::SHORT_CODE => &["123", "123", "456"],
                    pfep::LONG_CODE => &["", "", "7654321"],
                    pfep::SUPPLIER_NAME => &["ACME", "ACME", "GLOBEX"],
                    pfep::FLOW_TYPE => &["MILK RUN", "MILK RUN", ""],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .load_routes(
                df!(
                    tdc::ORIGIN_CODE => &["123", "123", "456"],
                    tdc::DESTINATION_CODE => &["10", "10", "20"],
                    tdc::CARRIER => &["DHL", "TNT", "DHL"],
                    tdc::VEHICLE => &["Truck", "Truck", "Van"],
                    tdc::FLOW_TYPE => &["FTL", "", ""],
                    tdc::CROSS_DOCK => &["Y", "", "N"],
                )
                .unwrap(),
            )
            .unwrap();
        store
            .load_volumes(
                df!(
                    nprc::PART_NUMBER => &["PN-1", "PN-1", "PN-1B", "PN-2"],
                    "1" => &["10", "20", "5", "7"],
                )
                .unwrap(),
            )
            .unwrap();
        store
    }

    #[test]
    fn short_code_full_route() {
        let mut store = store();
        let outcome = lookup(&mut store, &LookupQuery::new("123").with_destination("10")).unwrap();
        let LookupOutcome::Found(data) = outcome else {
            panic!("expected Found, got {outcome:?}");
        };
        assert_eq!(data.filter_used, IdentifierKind::ShortCode);
        assert_eq!(data.part.part_number, "PN-1");
        assert_eq!(data.part_matches, 2);
        assert_eq!(data.volume_rows, 3, "rows of every part sharing the code");
        assert_eq!(data.attributes.supplier_name, "ACME");
        assert_eq!(data.attributes.carrier, "DHL");
        assert_eq!(data.attributes.flow_type, "FTL", "route wins over part");
        assert_eq!(data.options.carriers, vec!["DHL", "TNT"]);
        assert_eq!(data.options.vehicles, vec!["Truck"]);
        assert!(!data.needs_destination);
    }

    #[test]
    fn long_code_pivots_through_short_code() {
        let mut store = store();
        let outcome = lookup(&mut store, &LookupQuery::new("7654321").with_destination("20")).unwrap();
        let data = outcome.data().unwrap();
        assert_eq!(data.filter_used, IdentifierKind::LongCode);
        assert_eq!(data.pivot_code, "456");
        assert_eq!(data.route.as_ref().map(|r| r.carrier.as_str()), Some("DHL"));
        assert_eq!(data.attributes.flow_type, "", "empty on both sides");
    }

    #[test]
    fn missing_destination_is_a_success_variant() {
        let mut store = store();
        let outcome = lookup(&mut store, &LookupQuery::new("123").with_destination("SAO PAULO")).unwrap();
        let LookupOutcome::NeedsDestination(data) = outcome else {
            panic!("expected NeedsDestination, got {outcome:?}");
        };
        assert!(data.needs_destination);
        assert!(data.route.is_none());
        assert_eq!(data.attributes.carrier, "");
        assert_eq!(data.attributes.cross_dock, "Y");
    }

    #[test]
    fn unknown_code_is_not_found() {
        let mut store = store();
        let outcome = lookup(&mut store, &LookupQuery::new("999")).unwrap();
        assert_eq!(
            outcome,
            LookupOutcome::NotFound {
                kind: IdentifierKind::ShortCode,
                code: "999".into()
            }
        );
        assert_eq!(store.volume_scans(), 0);
    }

    #[test]
    fn bad_codes_do_not_touch_the_cache() {
        let mut store = store();
        for code in ["", "1234567890", "12-3"] {
            let err = lookup(&mut store, &LookupQuery::new(code)).unwrap_err();
            assert!(matches!(err, ReconError::InvalidCodeLength(_)), "{code:?}");
        }
        assert_eq!(store.cache_len(), 0);
    }

    #[test]
    fn second_lookup_reuses_the_cache() {
        let mut store = store();
        let query = LookupQuery::new("123.0").with_destination("10");
        let first = lookup(&mut store, &query).unwrap();
        assert_eq!(store.volume_scans(), 1);

        let second = lookup(&mut store, &query).unwrap();
        assert_eq!(store.volume_scans(), 1);

        let (a, b) = (first.data().unwrap(), second.data().unwrap());
        assert!(!a.from_cache);
        assert!(b.from_cache);
        assert_eq!(a.part, b.part);
        assert_eq!(a.attributes, b.attributes);
        assert_eq!(a.volume_rows, b.volume_rows);
    }

    fn parts_only() -> RecordStore {
        let mut store = RecordStore::new();
        store
            .load_parts(
                df!(
                    pfep::PART_NUMBER => &["PN-1"],
                    pfep::SHORT_CODE => &["123"],
                    pfep::LONG_CODE => &[""],
                    pfep::SUPPLIER_NAME => &["ACME"],
                )
                .unwrap(),
            )
            .unwrap();
        store
    }

    #[test]
    fn routes_table_absent_still_reports_the_part() {
        let mut store = parts_only();
        store
            .load_volumes(df!(nprc::PART_NUMBER => &["PN-1"], "1" => &["10"]).unwrap())
            .unwrap();

        let outcome = lookup(&mut store, &LookupQuery::new("123")).unwrap();
        let LookupOutcome::NeedsDestination(data) = outcome else {
            panic!("expected NeedsDestination, got {outcome:?}");
        };
        assert_eq!(data.part.part_number, "PN-1");
        assert_eq!(data.volume_rows, 1);
        assert!(data.route.is_none());
        assert_eq!(data.attributes.supplier_name, "ACME");
        assert_eq!(data.attributes.carrier, "");

        let outcome = lookup(&mut store, &LookupQuery::new("123").with_destination("10")).unwrap();
        let LookupOutcome::Found(data) = outcome else {
            panic!("expected Found, got {outcome:?}");
        };
        assert!(data.route.is_none());
        assert_eq!(data.destination_code.as_deref(), Some("10"));
    }

    #[test]
    fn volumes_table_absent_caches_an_empty_subset() {
        let mut store = parts_only();
        store
            .load_routes(
                df!(
                    tdc::ORIGIN_CODE => &["123"],
                    tdc::DESTINATION_CODE => &["10"],
                    tdc::CARRIER => &["DHL"],
                )
                .unwrap(),
            )
            .unwrap();

        let outcome = lookup(&mut store, &LookupQuery::new("123").with_destination("10")).unwrap();
        let LookupOutcome::Found(data) = outcome else {
            panic!("expected Found, got {outcome:?}");
        };
        assert_eq!(data.volume_rows, 0);
        assert_eq!(data.attributes.carrier, "DHL");
        assert_eq!(store.volume_scans(), 0);
        assert_eq!(store.cached(&data.cache_key).map(|e| e.volume_matches()), Some(0));
    }

    #[test]
    fn parts_table_absent_is_still_an_error() {
        let mut store = RecordStore::new();
        store
            .load_volumes(df!(nprc::PART_NUMBER => &["PN-1"], "1" => &["10"]).unwrap())
            .unwrap();
        let err = lookup(&mut store, &LookupQuery::new("123")).unwrap_err();
        assert!(matches!(err, ReconError::NoDataLoaded(_)));
    }

    #[test]
    fn reload_forces_a_fresh_scan() {
        let mut store = store();
        let query = LookupQuery::new("123");
        lookup(&mut store, &query).unwrap();
        store
            .load_volumes(df!(nprc::PART_NUMBER => &["PN-1"], "1" => &["1"]).unwrap())
            .unwrap();
        let outcome = lookup(&mut store, &query).unwrap();
        assert_eq!(store.volume_scans(), 2);
        let data = outcome.data().unwrap();
        assert!(!data.from_cache);
        assert_eq!(data.volume_rows, 1);
    }
}
