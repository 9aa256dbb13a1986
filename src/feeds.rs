//! MTA GTFS-RT endpoint map.
//!
//! The MTA publishes one realtime feed per route group; the dashboard
//! picks the endpoint from the selected route's short name.

/// Base URL shared by all NYCT subway feeds.
pub const MTA_FEED_BASE_URL: &str =
    "https://api-endpoint.mta.info/Dataservice/mtagtfsfeeds/nyct%2Fgtfs";

/// Returns the feed URL suffix for a route short name, or `None` for a
/// route with no published feed.
pub fn feed_suffix_for_route(route: &str) -> Option<&'static str> {
    match route {
        // IRT numbered lines and the 42 St shuttle share the base feed
        "1" | "2" | "3" | "4" | "5" | "6" | "7" | "GS" => Some(""),
        "A" | "C" | "E" => Some("-ace"),
        "B" | "D" | "F" | "M" => Some("-bdfm"),
        "G" => Some("-g"),
        "J" | "Z" => Some("-jz"),
        "N" | "Q" | "R" | "W" => Some("-nqrw"),
        "L" => Some("-l"),
        "SI" | "SIR" => Some("-si"),
        _ => None,
    }
}

/// Full feed URL for a route short name.
pub fn feed_url_for_route(route: &str) -> Option<String> {
    feed_suffix_for_route(route).map(|suffix| format!("{MTA_FEED_BASE_URL}{suffix}"))
}
