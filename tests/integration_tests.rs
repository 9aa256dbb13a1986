use chrono::{DateTime, Utc};
use chrono_tz::America::New_York;
use prost::Message;
use subway_board::board::{DEFAULT_TIME_LIMIT, position_board, upcoming_arrivals};
use subway_board::decoder::{decode_feed, entity_counts};
use subway_board::gtfs_rt::{
    FeedEntity, FeedHeader, FeedMessage, Position, TripDescriptor, TripUpdate, VehiclePosition,
    trip_update::{StopTimeEvent, StopTimeUpdate},
};
use subway_board::gtfs_static::ReferenceStore;

fn encode_sample_feed(now_unix: i64) -> Vec<u8> {
    let trip = |route: &str, trip_id: &str| TripDescriptor {
        trip_id: Some(trip_id.to_string()),
        route_id: Some(route.to_string()),
        ..Default::default()
    };

    let feed = FeedMessage {
        header: FeedHeader {
            gtfs_realtime_version: "2.0".to_string(),
            timestamp: Some(now_unix as u64),
            incrementality: None,
            feed_version: None,
        },
        entity: vec![
            // F train predicted at Roosevelt Island in 12 minutes
            FeedEntity {
                id: "tu-1".to_string(),
                trip_update: Some(TripUpdate {
                    trip: trip("F", "120700_F..N"),
                    stop_time_update: vec![StopTimeUpdate {
                        stop_id: Some("R09N".to_string()),
                        arrival: Some(StopTimeEvent {
                            time: Some(now_unix + 12 * 60),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            // Q train at the same stop: filtered out by route
            FeedEntity {
                id: "tu-2".to_string(),
                trip_update: Some(TripUpdate {
                    trip: trip("Q", "121000_Q..N"),
                    stop_time_update: vec![StopTimeUpdate {
                        stop_id: Some("R09N".to_string()),
                        arrival: Some(StopTimeEvent {
                            time: Some(now_unix + 5 * 60),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }],
                    ..Default::default()
                }),
                ..Default::default()
            },
            // Two F vehicles, one per direction
            FeedEntity {
                id: "vp-1".to_string(),
                vehicle: Some(VehiclePosition {
                    trip: Some(trip("F", "120700_F..N")),
                    position: Some(Position {
                        latitude: 40.7590,
                        longitude: -73.9533,
                        ..Default::default()
                    }),
                    stop_id: Some("R09N".to_string()),
                    timestamp: Some(now_unix as u64),
                    ..Default::default()
                }),
                ..Default::default()
            },
            FeedEntity {
                id: "vp-2".to_string(),
                vehicle: Some(VehiclePosition {
                    trip: Some(trip("F", "120900_F..S")),
                    position: Some(Position {
                        latitude: 40.7180,
                        longitude: -73.9881,
                        ..Default::default()
                    }),
                    stop_id: Some("UNKNOWN99".to_string()),
                    timestamp: Some((now_unix - 30) as u64),
                    ..Default::default()
                }),
                ..Default::default()
            },
        ],
    };

    feed.encode_to_vec()
}

fn sample_store() -> ReferenceStore {
    use subway_board::gtfs_static::{Route, Stop, StopTime, Trip};

    ReferenceStore::from_tables(
        vec![
            Stop {
                stop_id: "R09N".to_string(),
                stop_name: "Roosevelt Island".to_string(),
                stop_lat: Some(40.759145),
                stop_lon: Some(-73.953260),
            },
            Stop {
                stop_id: "F18N".to_string(),
                stop_name: "Delancey St".to_string(),
                stop_lat: Some(40.718611),
                stop_lon: Some(-73.988114),
            },
        ],
        vec![Route {
            route_id: "F".to_string(),
            route_short_name: "F".to_string(),
            route_color: Some("FF6319".to_string()),
        }],
        vec![Trip {
            route_id: "F".to_string(),
            trip_id: "120700_F..N".to_string(),
        }],
        vec![StopTime {
            trip_id: "120700_F..N".to_string(),
            stop_id: "R09N".to_string(),
            stop_sequence: Some(1),
        }],
    )
}

#[test]
fn test_full_pipeline() {
    let now = DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap();
    let bytes = encode_sample_feed(now.timestamp());

    let feed = decode_feed(&bytes).expect("Failed to decode feed");

    // Hand-verified reference counts for the sample payload
    assert_eq!(entity_counts(&feed), (2, 2));

    let store = sample_store();

    let arrivals = upcoming_arrivals(&feed, "F", "R09N", DEFAULT_TIME_LIMIT, now, New_York);
    assert_eq!(arrivals.len(), 1);
    assert_eq!(arrivals[0].train_id, "120700_F..N");
    assert_eq!(arrivals[0].route, "F");
    assert_eq!(arrivals[0].minutes_until_arrival, 12);

    let board = position_board(&feed, "F", &store, New_York);
    assert_eq!(board.northbound.len(), 1);
    assert_eq!(board.southbound.len(), 1);
    assert!(board.unknown.is_empty());
    assert_eq!(board.northbound[0].current_stop, "Roosevelt Island");
    assert_eq!(board.southbound[0].current_stop, "Unknown Stop");
}

#[test]
fn test_decode_rejects_garbage() {
    let result = decode_feed(&[0xFF, 0xFE, 0x00, 0x01]);
    assert!(result.is_err());
}
