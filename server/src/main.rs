use axum::http::{header, HeaderValue, Method};
use clap::Parser;
use pong_server::config::ServerConfig;
use pong_server::ws::{router, AppState};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Authoritative server for two-player pong matches
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Address to listen on
    #[clap(short, long)]
    listen: Option<String>,
    /// Simulation ticks per second
    #[clap(short, long)]
    tick_rate: Option<u32>,
    /// Fixed seed for serve directions (random when omitted)
    #[clap(long)]
    seed: Option<u64>,
    /// Maximum number of simultaneous rooms
    #[clap(long)]
    max_rooms: Option<usize>,
    /// Allowed browser origin; repeat for several. `*` allows any origin.
    #[clap(long = "allow-origin")]
    allow_origins: Vec<String>,
    /// Accept paddle input for either slot from any seated player
    #[clap(long)]
    trust_client_slot: bool,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(listen) = self.listen {
            config.listen_addr = listen;
        }
        if let Some(tick_rate) = self.tick_rate {
            config.tick_rate_hz = tick_rate;
        }
        if self.seed.is_some() {
            config.rng_seed = self.seed;
        }
        if let Some(max_rooms) = self.max_rooms {
            config.max_rooms = max_rooms;
        }
        if self.allow_origins.iter().any(|o| o == "*") {
            config.allowed_origins.clear();
        } else if !self.allow_origins.is_empty() {
            config.allowed_origins = self.allow_origins;
        }
        if self.trust_client_slot {
            config.enforce_slot_ownership = false;
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::permissive();
    }
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid origin {:?}", origin);
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let mut config = ServerConfig::default();
    Args::parse().apply(&mut config);

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let app = router(AppState::new(&config)).layer(cors_layer(&config.allowed_origins));

    let listener = match tokio::net::TcpListener::bind(&config.listen_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("Failed to bind {}: {}", config.listen_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Starting pong server on {} ({} Hz)",
        config.listen_addr,
        config.tick_rate_hz
    );
    println!("Pong server listening on {}", config.listen_addr);

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
