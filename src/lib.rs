pub mod board;
pub mod decoder;
pub mod error;
pub mod feeds;
pub mod fetch;
pub mod gtfs_static;
pub mod output;

pub mod gtfs_rt {
    include!(concat!(env!("OUT_DIR"), "/transit_realtime.rs"));
}
