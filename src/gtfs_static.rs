//! Static GTFS reference data: stops, routes, trips, and stop-times.
//!
//! The four tables are loaded once per process into an immutable
//! [`ReferenceStore`], which the correlation engine consults to resolve
//! live-feed identifiers into human-readable rows. Loading failures are
//! fatal; lookup misses never are.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

use serde::Deserialize;
use tracing::debug;

use crate::error::{LoadError, NotFoundError};

/// Sentinel returned when a live-feed stop_id has no static counterpart.
pub const UNKNOWN_STOP: &str = "Unknown Stop";

/// Map marker color used when a route declares no color of its own.
pub const DEFAULT_ROUTE_COLOR: &str = "#3388ff";

#[derive(Debug, Clone, Deserialize)]
pub struct Stop {
    pub stop_id: String,
    pub stop_name: String,
    #[serde(default)]
    pub stop_lat: Option<f64>,
    #[serde(default)]
    pub stop_lon: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    pub route_id: String,
    pub route_short_name: String,
    #[serde(default)]
    pub route_color: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trip {
    pub route_id: String,
    pub trip_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StopTime {
    pub trip_id: String,
    pub stop_id: String,
    #[serde(default)]
    pub stop_sequence: Option<u32>,
}

/// Read-only index over the four static GTFS tables.
///
/// Row vectors keep file order so that selector resolution is
/// deterministic when the data carries duplicates.
#[derive(Debug)]
pub struct ReferenceStore {
    stops: Vec<Stop>,
    stop_index: HashMap<String, usize>,
    routes: Vec<Route>,
    route_index: HashMap<String, usize>,
    trips_by_route: HashMap<String, HashSet<String>>,
    stop_ids_by_trip: HashMap<String, Vec<String>>,
}

fn load_table<T: serde::de::DeserializeOwned>(
    dir: &Path,
    file: &str,
) -> Result<Vec<T>, LoadError> {
    let path = dir.join(file);
    let handle = std::fs::File::open(&path).map_err(|source| LoadError::Io {
        file: file.to_string(),
        source,
    })?;
    let mut reader = csv::Reader::from_reader(handle);

    let mut rows = Vec::new();
    for record in reader.deserialize() {
        let row: T = record.map_err(|source| LoadError::Malformed {
            file: file.to_string(),
            source,
        })?;
        rows.push(row);
    }
    Ok(rows)
}

impl ReferenceStore {
    /// Loads `stops.txt`, `routes.txt`, `trips.txt`, and `stop_times.txt`
    /// from `dir` and builds the lookup indexes.
    ///
    /// # Errors
    ///
    /// Fails with [`LoadError`] if any of the four files is missing or a
    /// row lacks a required column.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, LoadError> {
        let dir = dir.as_ref();

        let stops: Vec<Stop> = load_table(dir, "stops.txt")?;
        let routes: Vec<Route> = load_table(dir, "routes.txt")?;
        let trips: Vec<Trip> = load_table(dir, "trips.txt")?;
        let stop_times: Vec<StopTime> = load_table(dir, "stop_times.txt")?;

        debug!(
            stops = stops.len(),
            routes = routes.len(),
            trips = trips.len(),
            stop_times = stop_times.len(),
            "Static reference tables loaded"
        );

        Ok(Self::from_tables(stops, routes, trips, stop_times))
    }

    /// Builds the store from already-parsed tables.
    pub fn from_tables(
        stops: Vec<Stop>,
        routes: Vec<Route>,
        trips: Vec<Trip>,
        stop_times: Vec<StopTime>,
    ) -> Self {
        let mut stop_index = HashMap::with_capacity(stops.len());
        for (i, stop) in stops.iter().enumerate() {
            stop_index.entry(stop.stop_id.clone()).or_insert(i);
        }

        let mut route_index = HashMap::with_capacity(routes.len());
        for (i, route) in routes.iter().enumerate() {
            route_index.entry(route.route_id.clone()).or_insert(i);
        }

        let mut trips_by_route: HashMap<String, HashSet<String>> = HashMap::new();
        for trip in &trips {
            trips_by_route
                .entry(trip.route_id.clone())
                .or_default()
                .insert(trip.trip_id.clone());
        }

        let mut stop_ids_by_trip: HashMap<String, Vec<String>> = HashMap::new();
        for st in &stop_times {
            stop_ids_by_trip
                .entry(st.trip_id.clone())
                .or_default()
                .push(st.stop_id.clone());
        }

        ReferenceStore {
            stops,
            stop_index,
            routes,
            route_index,
            trips_by_route,
            stop_ids_by_trip,
        }
    }

    /// Resolves a stop_id to its name, degrading to [`UNKNOWN_STOP`] on a
    /// miss. Never fails.
    pub fn resolve_stop_name(&self, stop_id: &str) -> &str {
        self.stop(stop_id)
            .map(|s| s.stop_name.as_str())
            .unwrap_or(UNKNOWN_STOP)
    }

    pub fn stop(&self, stop_id: &str) -> Option<&Stop> {
        self.stop_index.get(stop_id).map(|&i| &self.stops[i])
    }

    /// Maps a user-facing route short name (e.g. `"F"`) to its route_id.
    /// Exact, case-sensitive; the first matching row in file order wins.
    ///
    /// # Errors
    ///
    /// Fails with [`NotFoundError`] when no row matches.
    pub fn route_id_for_short_name(&self, short_name: &str) -> Result<&str, NotFoundError> {
        self.routes
            .iter()
            .find(|r| r.route_short_name == short_name)
            .map(|r| r.route_id.as_str())
            .ok_or_else(|| NotFoundError {
                short_name: short_name.to_string(),
            })
    }

    /// All trip_ids foreign-keyed to the route. Empty set for an unknown
    /// route_id.
    pub fn trip_ids_for_route(&self, route_id: &str) -> HashSet<&str> {
        self.trips_by_route
            .get(route_id)
            .map(|s| s.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// The route's declared color as a `#`-prefixed hex string, or
    /// [`DEFAULT_ROUTE_COLOR`] when absent or empty.
    pub fn route_color_for(&self, route_id: &str) -> String {
        self.route_index
            .get(route_id)
            .map(|&i| &self.routes[i])
            .and_then(|r| r.route_color.as_deref())
            .filter(|c| !c.is_empty())
            .map(|c| format!("#{c}"))
            .unwrap_or_else(|| DEFAULT_ROUTE_COLOR.to_string())
    }

    /// Distinct route short names in file order, for selector listings.
    pub fn route_short_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.routes
            .iter()
            .map(|r| r.route_short_name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The distinct stops served by a route, via its trips' stop-times.
    /// Returned in stops-file order.
    pub fn stops_for_route(&self, route_id: &str) -> Vec<&Stop> {
        let mut served: HashSet<&str> = HashSet::new();
        if let Some(trip_ids) = self.trips_by_route.get(route_id) {
            for trip_id in trip_ids {
                if let Some(stop_ids) = self.stop_ids_by_trip.get(trip_id) {
                    for stop_id in stop_ids {
                        served.insert(stop_id.as_str());
                    }
                }
            }
        }
        self.stops
            .iter()
            .filter(|s| served.contains(s.stop_id.as_str()))
            .collect()
    }

    /// Case-insensitive substring search over stop names; first match in
    /// file order. Lets the CLI accept "Roosevelt Island" instead of a raw
    /// stop_id.
    pub fn find_stop_id_by_name(&self, query: &str) -> Option<&str> {
        let needle = query.to_lowercase();
        self.stops
            .iter()
            .find(|s| s.stop_name.to_lowercase().contains(&needle))
            .map(|s| s.stop_id.as_str())
    }
}

/// Lazy per-process cache around [`ReferenceStore::load`].
///
/// First access loads and retains the store; later accesses share it.
/// `invalidate` drops the cached store so the next access reloads from
/// disk.
pub struct StoreCache {
    dir: std::path::PathBuf,
    slot: Mutex<Option<Arc<ReferenceStore>>>,
}

impl StoreCache {
    pub fn new(dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            slot: Mutex::new(None),
        }
    }

    /// Returns the cached store, loading it on first access.
    pub fn get_or_load(&self) -> Result<Arc<ReferenceStore>, LoadError> {
        let mut slot = self.slot.lock().expect("store cache poisoned");
        if let Some(store) = slot.as_ref() {
            return Ok(Arc::clone(store));
        }
        let store = Arc::new(ReferenceStore::load(&self.dir)?);
        *slot = Some(Arc::clone(&store));
        Ok(store)
    }

    pub fn invalidate(&self) {
        let mut slot = self.slot.lock().expect("store cache poisoned");
        *slot = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::fs;
    use std::path::PathBuf;

    fn fixture_dir(name: &str) -> PathBuf {
        let dir = env::temp_dir().join(format!("subway_board_static_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();

        fs::write(
            dir.join("stops.txt"),
            "stop_id,stop_name,stop_lat,stop_lon\n\
             R09N,Roosevelt Island,40.759145,-73.953260\n\
             R09S,Roosevelt Island,40.759145,-73.953260\n\
             F18N,Delancey St,40.718611,-73.988114\n",
        )
        .unwrap();
        fs::write(
            dir.join("routes.txt"),
            "route_id,route_short_name,route_color\n\
             F,F,FF6319\n\
             G,G,\n\
             Q,Q,FCCC0A\n",
        )
        .unwrap();
        fs::write(
            dir.join("trips.txt"),
            "route_id,trip_id\n\
             F,trip-f-1\n\
             F,trip-f-2\n\
             Q,trip-q-1\n",
        )
        .unwrap();
        fs::write(
            dir.join("stop_times.txt"),
            "trip_id,stop_id,stop_sequence\n\
             trip-f-1,F18N,1\n\
             trip-f-1,R09N,2\n\
             trip-f-2,R09S,1\n\
             trip-q-1,R09N,1\n",
        )
        .unwrap();

        dir
    }

    #[test]
    fn test_resolve_stop_name_hit_and_sentinel() {
        let dir = fixture_dir("resolve");
        let store = ReferenceStore::load(&dir).unwrap();

        assert_eq!(store.resolve_stop_name("R09N"), "Roosevelt Island");
        assert_eq!(store.resolve_stop_name("nope"), UNKNOWN_STOP);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_route_id_for_short_name() {
        let dir = fixture_dir("short_name");
        let store = ReferenceStore::load(&dir).unwrap();

        assert_eq!(store.route_id_for_short_name("F").unwrap(), "F");
        assert!(store.route_id_for_short_name("X").is_err());
        // Case-sensitive: "f" is not "F".
        assert!(store.route_id_for_short_name("f").is_err());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_trip_ids_for_route() {
        let dir = fixture_dir("trips");
        let store = ReferenceStore::load(&dir).unwrap();

        let trips = store.trip_ids_for_route("F");
        assert_eq!(trips.len(), 2);
        assert!(trips.contains("trip-f-1"));
        assert!(trips.contains("trip-f-2"));
        assert!(store.trip_ids_for_route("Z").is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_route_color_prefix_and_default() {
        let dir = fixture_dir("color");
        let store = ReferenceStore::load(&dir).unwrap();

        assert_eq!(store.route_color_for("F"), "#FF6319");
        // Empty color column falls back to the default.
        assert_eq!(store.route_color_for("G"), DEFAULT_ROUTE_COLOR);
        assert_eq!(store.route_color_for("missing"), DEFAULT_ROUTE_COLOR);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_route_short_names_dedup_keep_order() {
        let dir = fixture_dir("short_names");
        let store = ReferenceStore::load(&dir).unwrap();

        assert_eq!(store.route_short_names(), vec!["F", "G", "Q"]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_stops_for_route_dedups_across_trips() {
        let dir = fixture_dir("stops_for_route");
        let store = ReferenceStore::load(&dir).unwrap();

        let stops = store.stops_for_route("F");
        let ids: Vec<&str> = stops.iter().map(|s| s.stop_id.as_str()).collect();
        assert_eq!(ids, vec!["R09N", "R09S", "F18N"]);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_find_stop_id_by_name_case_insensitive() {
        let dir = fixture_dir("find_stop");
        let store = ReferenceStore::load(&dir).unwrap();

        assert_eq!(store.find_stop_id_by_name("roosevelt island"), Some("R09N"));
        assert_eq!(store.find_stop_id_by_name("Atlantic"), None);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_table_fails() {
        let dir = fixture_dir("missing_table");
        fs::remove_file(dir.join("stop_times.txt")).unwrap();

        assert!(matches!(
            ReferenceStore::load(&dir),
            Err(LoadError::Io { .. })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_missing_column_fails() {
        let dir = fixture_dir("missing_column");
        fs::write(dir.join("routes.txt"), "route_id,route_desc\nF,Sixth Ave Local\n").unwrap();

        assert!(matches!(
            ReferenceStore::load(&dir),
            Err(LoadError::Malformed { .. })
        ));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_store_cache_shares_and_invalidates() {
        let dir = fixture_dir("cache");
        let cache = StoreCache::new(&dir);

        let a = cache.get_or_load().unwrap();
        let b = cache.get_or_load().unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        cache.invalidate();
        let c = cache.get_or_load().unwrap();
        assert!(!Arc::ptr_eq(&a, &c));

        fs::remove_dir_all(&dir).unwrap();
    }
}
