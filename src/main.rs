use clap::Parser;
use clinic_finder::facility::format_coords;
use clinic_finder::finder::render_listing;
use clinic_finder::source::{DataSource, OverpassSource, StaticSource};
use clinic_finder::{
    Coordinates, FacilityFinder, FacilityQuery, FinderConfig, SearchRequest, SortKey, StatusFilter,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Clinic Finder: hospitals and clinics near a point, from OpenStreetMap.
///
/// Fetches facilities around the reference point, evaluates their opening
/// hours in the configured timezone, and prints them nearest first.
///
/// Examples:
///   clinic-finder
///   clinic-finder "ortho" --status open
///   clinic-finder --lat 13.0827 --lon 80.2707 --radius 5000 --sort category
///   clinic-finder --input saved_overpass.json --status unknown
///   clinic-finder --serve --port 3000
#[derive(Parser)]
#[command(name = "clinic-finder", version, about, long_about = None)]
struct Cli {
    /// Text to match against name or address (case-insensitive).
    #[arg(index = 1)]
    query: Option<String>,

    /// Reference latitude (-90 to 90).
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Reference longitude (-180 to 180).
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Search radius in meters.
    #[arg(long, short = 'r')]
    radius: Option<u32>,

    /// IANA timezone for opening-hours evaluation (e.g. Asia/Kolkata).
    #[arg(long)]
    tz: Option<String>,

    /// Data source timeout in seconds.
    #[arg(long)]
    timeout: Option<u64>,

    /// Overpass API endpoint.
    #[arg(long)]
    endpoint: Option<String>,

    /// JSON config file; flags override its values.
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Read a saved Overpass JSON response instead of querying the network.
    #[arg(long)]
    input: Option<PathBuf>,

    /// Status filter: all, open, closed, unknown.
    #[arg(long, short = 's', default_value = "all")]
    status: StatusFilter,

    /// Sort key: default, distance, rating, price, category.
    #[arg(long, default_value = "distance")]
    sort: SortKey,

    /// Serve the JSON API instead of printing once.
    #[arg(long)]
    serve: bool,

    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Debug logging.
    #[arg(long, short = 'v')]
    verbose: bool,

    /// Only warnings and errors.
    #[arg(long, short = 'q')]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "clinic_finder=debug,info"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // ── Build configuration ─────────────────────────────────────

    let config = build_config(&cli);
    let source = build_source(&cli, &config);

    let finder = FacilityFinder::new(config.clone(), source).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    // ── Serve ───────────────────────────────────────────────────

    if cli.serve {
        let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
            eprintln!("Error: Cannot start runtime: {}", e);
            std::process::exit(1);
        });
        if let Err(e) = runtime.block_on(clinic_finder::server::start(Arc::new(finder), &cli.host, cli.port)) {
            eprintln!("Server error: {}", e);
            std::process::exit(1);
        }
        return;
    }

    // ── Search once ─────────────────────────────────────────────

    eprintln!(
        "  \u{1F4CD} {} \u{2022} {:.1} km \u{2022} {}",
        format_coords(config.reference),
        config.radius_km(),
        config.timezone
    );

    let request = SearchRequest {
        reference: config.reference,
        radius_m: config.radius_m,
        query: FacilityQuery::new(cli.query.clone().unwrap_or_default(), cli.status, cli.sort),
    };
    let results = finder.search(&request);

    // Listing to stderr, JSON to stdout.
    eprint!("{}", render_listing(&results));
    match serde_json::to_string_pretty(&results) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: Cannot serialize results: {}", e);
            std::process::exit(1);
        }
    }

    if results.failure.is_some() {
        std::process::exit(2);
    }
}

fn build_config(cli: &Cli) -> FinderConfig {
    let mut config = match &cli.config {
        Some(path) => FinderConfig::from_json_file(path).unwrap_or_else(|e| {
            eprintln!("Error: {}: {}", path.display(), e);
            std::process::exit(1);
        }),
        None => FinderConfig::default(),
    };

    match (cli.lat, cli.lon) {
        (Some(lat), Some(lon)) => config.reference = Coordinates::new(lat, lon),
        (None, None) => {}
        _ => {
            eprintln!("Error: --lat and --lon must be given together.");
            std::process::exit(1);
        }
    }
    if let Some(radius) = cli.radius {
        config.radius_m = radius;
    }
    if let Some(ref tz) = cli.tz {
        config.timezone = tz.clone();
    }
    if let Some(timeout) = cli.timeout {
        config.timeout_secs = timeout;
    }
    if let Some(ref endpoint) = cli.endpoint {
        config.endpoint = endpoint.clone();
    }
    config
}

fn build_source(cli: &Cli, config: &FinderConfig) -> Arc<dyn DataSource> {
    match &cli.input {
        Some(path) => {
            let body = std::fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error: Cannot read {}: {}", path.display(), e);
                std::process::exit(1);
            });
            let source = StaticSource::from_overpass_json(&body).unwrap_or_else(|e| {
                eprintln!("Error: {}: {}", path.display(), e);
                std::process::exit(1);
            });
            Arc::new(source)
        }
        None => Arc::new(OverpassSource::new(config.endpoint.clone())),
    }
}
