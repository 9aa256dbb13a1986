//! Correlation engine: joins the live feed against the static reference
//! store and derives the arrival and position row sets the presentation
//! layer renders.
//!
//! Two pipelines share one decoded feed. The arrivals pipeline reads
//! trip-update entities and keeps predictions for a single stop inside a
//! bounded countdown window; the positions pipeline reads vehicle
//! entities, resolves stop names, normalizes timestamps to the transit
//! system's local time, and partitions by direction.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use tracing::{debug, warn};

use crate::decoder::decode_feed;
use crate::fetch::{HttpClient, fetch_bytes};
use crate::gtfs_rt::FeedMessage;
use crate::gtfs_static::ReferenceStore;

/// Countdown window (minutes) applied when the caller does not override it.
pub const DEFAULT_TIME_LIMIT: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    Northbound,
    Southbound,
    Unknown,
}

impl Direction {
    /// Classifies a train's direction.
    ///
    /// The feed's structured `direction_id` wins when present (0 north,
    /// 1 south, the NYCT convention). Otherwise falls back to the
    /// documented trip_id encoding, where the direction letter follows
    /// the `".."` separator (`"120700_F..N"`), or terminates the id.
    /// Anything else is [`Direction::Unknown`].
    pub fn classify(direction_id: Option<u32>, trip_id: &str) -> Direction {
        match direction_id {
            Some(0) => Direction::Northbound,
            Some(1) => Direction::Southbound,
            _ => Direction::from_trip_id(trip_id),
        }
    }

    fn from_trip_id(trip_id: &str) -> Direction {
        let marker = match trip_id.find("..") {
            Some(idx) => trip_id.as_bytes().get(idx + 2).copied(),
            None => trip_id.as_bytes().last().copied(),
        };
        match marker {
            Some(b'N') => Direction::Northbound,
            Some(b'S') => Direction::Southbound,
            _ => Direction::Unknown,
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Direction::Northbound => "Northbound",
            Direction::Southbound => "Southbound",
            Direction::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// One upcoming arrival at the target stop.
#[derive(Debug, Clone, Serialize)]
pub struct ArrivalRow {
    pub train_id: String,
    pub route: String,
    /// Local wall-clock arrival, `%H:%M:%S`.
    pub arrival_time: String,
    pub minutes_until_arrival: i64,
}

/// One live train position on the target route.
#[derive(Debug, Clone, Serialize)]
pub struct TrainPosition {
    pub train_id: String,
    pub route: String,
    pub current_stop: String,
    pub latitude: f32,
    pub longitude: f32,
    /// Unix timestamp as reported by the feed, 0 when absent.
    pub timestamp: i64,
    /// Local wall-clock time of the report, `%H:%M:%S`.
    pub local_time: String,
    pub direction: Direction,
}

/// Position rows partitioned by direction, each partition sorted by
/// ascending report timestamp.
#[derive(Debug, Default, Serialize)]
pub struct PositionBoard {
    pub northbound: Vec<TrainPosition>,
    pub southbound: Vec<TrainPosition>,
    pub unknown: Vec<TrainPosition>,
}

impl PositionBoard {
    pub fn len(&self) -> usize {
        self.northbound.len() + self.southbound.len() + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything one refresh cycle hands to the presentation layer.
///
/// Recoverable failures (fetch, decode) produce an empty snapshot with
/// `warning` set; they never escape as errors.
#[derive(Debug, Default, Serialize)]
pub struct Snapshot {
    pub arrivals: Vec<ArrivalRow>,
    pub positions: PositionBoard,
    pub warning: Option<String>,
}

impl Snapshot {
    fn failure(message: String) -> Self {
        Snapshot {
            warning: Some(message),
            ..Default::default()
        }
    }
}

fn local_hms(unix: i64, tz: Tz) -> String {
    DateTime::<Utc>::from_timestamp(unix, 0)
        .map(|t| t.with_timezone(&tz).format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

/// Scans trip-update entities for predictions at `stop_id` on `route_id`.
///
/// Countdowns are truncated toward zero; only rows with
/// `0 <= minutes_until_arrival <= time_limit` are kept. Trains that have
/// already passed or are beyond the window are dropped silently. Feed
/// order is preserved.
pub fn upcoming_arrivals(
    feed: &FeedMessage,
    route_id: &str,
    stop_id: &str,
    time_limit: i64,
    now: DateTime<Utc>,
    tz: Tz,
) -> Vec<ArrivalRow> {
    let mut rows = Vec::new();

    for entity in &feed.entity {
        let Some(trip_update) = &entity.trip_update else {
            continue;
        };
        let trip = &trip_update.trip;
        if trip.route_id.as_deref() != Some(route_id) {
            continue;
        }

        for stu in &trip_update.stop_time_update {
            if stu.stop_id.as_deref() != Some(stop_id) {
                continue;
            }
            let Some(arrival_unix) = stu.arrival.as_ref().and_then(|ev| ev.time) else {
                continue;
            };
            let Some(arrival) = DateTime::<Utc>::from_timestamp(arrival_unix, 0) else {
                continue;
            };

            let minutes = (arrival - now).num_seconds() / 60;
            if !(0..=time_limit).contains(&minutes) {
                continue;
            }

            rows.push(ArrivalRow {
                train_id: trip.trip_id.clone().unwrap_or_default(),
                route: route_id.to_string(),
                arrival_time: arrival.with_timezone(&tz).format("%H:%M:%S").to_string(),
                minutes_until_arrival: minutes,
            });
        }
    }

    rows
}

/// Builds the direction-partitioned position board for `route_id`.
///
/// Stop names degrade to the store's sentinel on a miss; missing
/// positions and timestamps default to zero rather than dropping the
/// train.
pub fn position_board(
    feed: &FeedMessage,
    route_id: &str,
    store: &ReferenceStore,
    tz: Tz,
) -> PositionBoard {
    let mut board = PositionBoard::default();

    for entity in &feed.entity {
        let Some(vehicle) = &entity.vehicle else {
            continue;
        };
        let Some(trip) = &vehicle.trip else {
            continue;
        };
        if trip.route_id.as_deref() != Some(route_id) {
            continue;
        }

        let train_id = trip.trip_id.clone().unwrap_or_default();
        let (latitude, longitude) = vehicle
            .position
            .as_ref()
            .map(|p| (p.latitude, p.longitude))
            .unwrap_or((0.0, 0.0));
        let timestamp = vehicle.timestamp.unwrap_or(0) as i64;
        let current_stop = vehicle
            .stop_id
            .as_deref()
            .map(|id| store.resolve_stop_name(id))
            .unwrap_or(crate::gtfs_static::UNKNOWN_STOP)
            .to_string();
        let direction = Direction::classify(trip.direction_id, &train_id);

        let row = TrainPosition {
            train_id,
            route: route_id.to_string(),
            current_stop,
            latitude,
            longitude,
            timestamp,
            local_time: local_hms(timestamp, tz),
            direction,
        };

        match direction {
            Direction::Northbound => board.northbound.push(row),
            Direction::Southbound => board.southbound.push(row),
            Direction::Unknown => board.unknown.push(row),
        }
    }

    board.northbound.sort_by_key(|r| r.timestamp);
    board.southbound.sort_by_key(|r| r.timestamp);
    board.unknown.sort_by_key(|r| r.timestamp);

    board
}

/// One full refresh cycle: fetch, decode, correlate.
///
/// Fetch and decode failures are absorbed here; the returned snapshot is
/// then empty and carries the failure message for the presentation layer.
pub async fn refresh<C: HttpClient + ?Sized>(
    client: &C,
    url: &str,
    store: &ReferenceStore,
    route_id: &str,
    stop_id: &str,
    time_limit: i64,
    tz: Tz,
) -> Snapshot {
    let bytes = match fetch_bytes(client, url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, url, "Feed fetch failed");
            return Snapshot::failure(format!("Failed to fetch feed: {e}"));
        }
    };

    let feed = match decode_feed(&bytes) {
        Ok(feed) => feed,
        Err(e) => {
            warn!(error = %e, bytes = bytes.len(), "Feed decode failed");
            return Snapshot::failure(format!("Failed to decode feed: {e}"));
        }
    };

    let (trip_updates, vehicles) = crate::decoder::entity_counts(&feed);
    debug!(trip_updates, vehicles, "Feed decoded");

    Snapshot {
        arrivals: upcoming_arrivals(&feed, route_id, stop_id, time_limit, Utc::now(), tz),
        positions: position_board(&feed, route_id, store, tz),
        warning: None,
    }
}
