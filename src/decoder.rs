//! Protobuf decoder for GTFS Realtime feeds.

use prost::Message;

use crate::error::DecodeError;
use crate::gtfs_rt::FeedMessage;

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// Pure transformation; no field of the result is assumed present beyond
/// what the wire schema requires.
///
/// # Errors
///
/// Returns [`DecodeError`] if the bytes are not valid protobuf for a
/// `FeedMessage`.
pub fn decode_feed(bytes: &[u8]) -> Result<FeedMessage, DecodeError> {
    Ok(FeedMessage::decode(bytes)?)
}

/// Counts trip-update and vehicle-position entities in a decoded feed.
pub fn entity_counts(feed: &FeedMessage) -> (usize, usize) {
    let trip_updates = feed.entity.iter().filter(|e| e.trip_update.is_some()).count();
    let vehicles = feed.entity.iter().filter(|e| e.vehicle.is_some()).count();
    (trip_updates, vehicles)
}
