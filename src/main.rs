use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;

use lilyfarm::config::Config;
use lilyfarm::geography::{meters_to_miles, Coordinate};
use lilyfarm::sources::{
    DataSource, FacilityRecord, HttpClient, RefreshPolicy, Registry, SourceError, UreqClient,
};

/// lilyfarm: find the farmers' markets nearest a place.
///
/// Credentials are read from LILYFARM_GEONAMES_CREDENTIALS and
/// LILYFARM_USDA_CREDENTIALS.
///
/// Examples:
///   lilyfarm serve --port 8080
///   lilyfarm nearest --source newyork -n 5 --zip 10001
///   lilyfarm nearest --source usda -n 3 --lat 40.75 --lon -73.99
#[derive(Parser)]
#[command(name = "lilyfarm", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, short = 'p', default_value_t = 8080)]
        port: u16,
    },

    /// Print the nearest markets as JSON.
    Nearest {
        /// Data source name (newyork, usda).
        #[arg(long, short = 's')]
        source: String,

        /// Number of records; -1 for all.
        #[arg(short = 'n', allow_hyphen_values = true, default_value_t = 5)]
        n: i64,

        /// US zip code to center on.
        #[arg(long, conflicts_with_all = ["lat", "lon"])]
        zip: Option<String>,

        /// Latitude (-90 to 90).
        #[arg(long, allow_hyphen_values = true, requires = "lon")]
        lat: Option<f64>,

        /// Longitude (-180 to 180).
        #[arg(long, allow_hyphen_values = true, requires = "lat")]
        lon: Option<f64>,

        /// Also print each distance in miles to stderr.
        #[arg(long)]
        miles: bool,
    },
}

fn main() {
    lilyfarm::logging::init_logging();

    let cli = Cli::parse();
    let config = Config::from_env();
    let http: Arc<dyn HttpClient> = Arc::new(UreqClient::new());

    let registry = Registry::from_config(&config, http).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        process::exit(1);
    });

    match cli.command {
        Command::Serve { host, port } => serve(registry, &host, port),
        Command::Nearest {
            source,
            n,
            zip,
            lat,
            lon,
            miles,
        } => {
            let source = registry.get(&source).unwrap_or_else(|| {
                eprintln!(
                    "Error: Unknown data source '{}'. Available: {}",
                    source,
                    registry.names().join(", ")
                );
                process::exit(1);
            });
            nearest(source.as_ref(), n, zip, lat, lon, miles);
        }
    }
}

fn serve(registry: Registry, host: &str, port: u16) {
    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Error: Cannot start runtime: {}", e);
        process::exit(1);
    });

    if let Err(e) = runtime.block_on(lilyfarm::server::start(registry, host, port)) {
        eprintln!("Server error: {}", e);
        process::exit(1);
    }
}

fn nearest(
    source: &dyn DataSource,
    n: i64,
    zip: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    miles: bool,
) {
    let result = match (zip, lat, lon) {
        (Some(zip), _, _) => source.nearest_n_by_zip_code(n, &zip),
        (None, Some(lat), Some(lon)) => {
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                eprintln!("Error: Invalid coordinates. Lat: -90..90, Lon: -180..180");
                process::exit(1);
            }
            source.nearest_n(n, Coordinate::new(lat, lon))
        }
        _ => {
            eprintln!("Error: No location specified. Use --zip or --lat/--lon.");
            process::exit(1);
        }
    };

    let records = match result {
        Ok(records) => records,
        Err(SourceError::InsufficientRecords { requested, partial }) => {
            eprintln!(
                "Warning: requested {} records, found {}",
                requested,
                partial.len()
            );
            partial
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if miles {
        print_miles(&records, source.policy());
    }

    match serde_json::to_string_pretty(&records) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

/// Locally ranked sources report meters; live sources already use miles.
fn print_miles(records: &[FacilityRecord], policy: RefreshPolicy) {
    for record in records {
        let miles = match policy {
            RefreshPolicy::CacheOnDemand => meters_to_miles(record.distance),
            RefreshPolicy::LiveQuery => record.distance,
        };
        eprintln!("  {:>8.2} mi  {}", miles, record.name);
    }
}
