//! CLI entry point for the subway board.
//!
//! Provides subcommands for the live arrivals board at a stop, the
//! direction-partitioned train position board, and listing selectable
//! routes from the static reference data.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::Path;
use subway_board::{
    board::{self, DEFAULT_TIME_LIMIT, Snapshot},
    feeds,
    fetch::{BasicClient, HttpClient, auth::ApiKey},
    gtfs_static::{ReferenceStore, StoreCache},
    output::{append_rows, print_json},
};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Timezone of the transit system's operating region.
const SYSTEM_TZ: chrono_tz::Tz = chrono_tz::America::New_York;

#[derive(Parser)]
#[command(name = "subway_board")]
#[command(about = "Live arrival and position boards for the NYC subway", long_about = None)]
struct Cli {
    /// Directory containing the static GTFS tables
    #[arg(short = 'd', long, default_value = "gtfs_static", global = true)]
    static_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show upcoming arrivals for a route at a stop
    Arrivals {
        /// Route short name (e.g. "F")
        #[arg(short, long, default_value = "F")]
        route: String,

        /// Target stop: a stop_id or a stop name fragment
        #[arg(short, long, default_value = "Roosevelt Island")]
        stop: String,

        /// Only show trains arriving within this many minutes
        #[arg(short, long, default_value_t = DEFAULT_TIME_LIMIT)]
        time_limit: i64,

        /// Override the feed URL (defaults to the route's MTA feed)
        #[arg(long)]
        url: Option<String>,

        /// CSV file to append the rows to
        #[arg(short, long)]
        output: Option<String>,

        /// Print the full snapshot as JSON instead of log lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Show live train positions for a route, split by direction
    Positions {
        /// Route short name (e.g. "F")
        #[arg(short, long, default_value = "F")]
        route: String,

        /// Override the feed URL (defaults to the route's MTA feed)
        #[arg(long)]
        url: Option<String>,

        /// CSV file to append the rows to
        #[arg(short, long)]
        output: Option<String>,

        /// Print the full snapshot as JSON instead of log lines
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List selectable routes from the static reference data
    Routes,
    /// List the stops served by a route, for the station map
    Stops {
        /// Route short name (e.g. "F")
        #[arg(short, long, default_value = "F")]
        route: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/subway_board.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("subway_board.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    // The static tables are loaded once per process and shared read-only.
    let store_cache = StoreCache::new(&cli.static_dir);

    match cli.command {
        Commands::Arrivals {
            route,
            stop,
            time_limit,
            url,
            output,
            json,
        } => {
            let store = store_cache.get_or_load()?;

            let Some((route_id, feed_url)) = resolve_route(&store, &route, url) else {
                return Ok(());
            };
            let Some(stop_id) = resolve_stop(&store, &stop) else {
                return Ok(());
            };

            info!(route = %route_id, stop = %stop_id, time_limit, "Fetching arrivals board");

            let snapshot = board::refresh(
                feed_client().as_ref(),
                &feed_url,
                &store,
                &route_id,
                &stop_id,
                time_limit,
                SYSTEM_TZ,
            )
            .await;

            render_warning(&snapshot);

            if json {
                print_json(&snapshot)?;
            } else if snapshot.arrivals.is_empty() && snapshot.warning.is_none() {
                info!(route = %route_id, stop = %stop_id, "No trains approaching within the window");
            } else {
                for row in &snapshot.arrivals {
                    info!(
                        train = %row.train_id,
                        route = %row.route,
                        arrives_in_mins = row.minutes_until_arrival,
                        arrival_time = %row.arrival_time,
                        "Arrival"
                    );
                }
            }

            if let Some(path) = output {
                append_rows(&path, &snapshot.arrivals)?;
            }
        }
        Commands::Positions {
            route,
            url,
            output,
            json,
        } => {
            let store = store_cache.get_or_load()?;

            let Some((route_id, feed_url)) = resolve_route(&store, &route, url) else {
                return Ok(());
            };

            info!(route = %route_id, "Fetching position board");

            // The positions board does not use a target stop; the engine
            // still needs one for the arrivals half of the snapshot.
            let snapshot = board::refresh(
                feed_client().as_ref(),
                &feed_url,
                &store,
                &route_id,
                "",
                DEFAULT_TIME_LIMIT,
                SYSTEM_TZ,
            )
            .await;

            render_warning(&snapshot);

            if json {
                print_json(&snapshot.positions)?;
            } else {
                let positions = &snapshot.positions;
                info!(
                    northbound = positions.northbound.len(),
                    southbound = positions.southbound.len(),
                    unknown = positions.unknown.len(),
                    "Position board"
                );
                for row in positions
                    .northbound
                    .iter()
                    .chain(&positions.southbound)
                    .chain(&positions.unknown)
                {
                    info!(
                        train = %row.train_id,
                        direction = %row.direction,
                        stop = %row.current_stop,
                        lat = row.latitude as f64,
                        lon = row.longitude as f64,
                        reported_at = %row.local_time,
                        "Train"
                    );
                }
            }

            if let Some(path) = output {
                let all: Vec<_> = snapshot
                    .positions
                    .northbound
                    .iter()
                    .chain(&snapshot.positions.southbound)
                    .chain(&snapshot.positions.unknown)
                    .cloned()
                    .collect();
                append_rows(&path, &all)?;
            }
        }
        Commands::Routes => {
            let store = store_cache.get_or_load()?;

            for route in store.routes() {
                info!(
                    route = %route.route_short_name,
                    route_id = %route.route_id,
                    color = %store.route_color_for(&route.route_id),
                    "Route"
                );
            }
            info!(total = store.routes().len(), "Route list");
        }
        Commands::Stops { route } => {
            let store = store_cache.get_or_load()?;

            let route_id = match store.route_id_for_short_name(&route) {
                Ok(id) => id.to_string(),
                Err(e) => {
                    warn!(route, error = %e, "Unknown route selector");
                    return Ok(());
                }
            };

            let color = store.route_color_for(&route_id);
            let stops = store.stops_for_route(&route_id);
            for stop in &stops {
                info!(
                    stop_id = %stop.stop_id,
                    name = %stop.stop_name,
                    lat = stop.stop_lat.unwrap_or_default(),
                    lon = stop.stop_lon.unwrap_or_default(),
                    "Stop"
                );
            }
            info!(route = %route_id, total = stops.len(), color = %color, "Stop list");
        }
    }

    Ok(())
}

/// Builds the feed HTTP client, attaching the MTA API key header when one
/// is configured in the environment.
fn feed_client() -> Box<dyn HttpClient> {
    match std::env::var("MTA_API_KEY") {
        Ok(key) if !key.is_empty() => match ApiKey::x_api_key(BasicClient::new(), &key) {
            Ok(client) => Box::new(client),
            Err(e) => {
                warn!(error = %e, "Ignoring MTA_API_KEY: not a valid header value");
                Box::new(BasicClient::new())
            }
        },
        _ => Box::new(BasicClient::new()),
    }
}

/// Resolves a route short name to its route_id and feed URL. Validation
/// misses are warnings, not errors.
fn resolve_route(
    store: &ReferenceStore,
    route: &str,
    url_override: Option<String>,
) -> Option<(String, String)> {
    let route_id = match store.route_id_for_short_name(route) {
        Ok(id) => id.to_string(),
        Err(e) => {
            warn!(route, error = %e, "Unknown route selector");
            return None;
        }
    };

    let feed_url = match url_override.or_else(|| feeds::feed_url_for_route(route)) {
        Some(url) => url,
        None => {
            warn!(route, "No published realtime feed for route");
            return None;
        }
    };

    Some((route_id, feed_url))
}

/// Resolves a stop selector (stop_id or name fragment) to a stop_id.
fn resolve_stop(store: &ReferenceStore, stop: &str) -> Option<String> {
    if store.stop(stop).is_some() {
        return Some(stop.to_string());
    }
    match store.find_stop_id_by_name(stop) {
        Some(id) => {
            info!(query = stop, stop_id = id, name = store.resolve_stop_name(id), "Stop resolved by name");
            Some(id.to_string())
        }
        None => {
            warn!(query = stop, "No stop matches selector");
            None
        }
    }
}

fn render_warning(snapshot: &Snapshot) {
    if let Some(warning) = &snapshot.warning {
        warn!("{warning}");
    }
}
