pub use pong_shared::GameConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub tick_rate_hz: u32,
    /// Seed for serve directions; `None` draws from OS entropy per room.
    pub rng_seed: Option<u64>,
    /// Upper bound on simultaneously open rooms
    pub max_rooms: usize,
    pub room_inbox_capacity: usize,
    /// Per-connection outbound queue; frames beyond it are dropped
    pub outbound_capacity: usize,
    pub max_message_bytes: usize,
    /// Unparsable frames tolerated before the connection is closed
    pub max_parse_errors: u32,
    /// Drop paddle input whose slot is not the sender's own
    pub enforce_slot_ownership: bool,
    /// Empty means any origin is allowed
    pub allowed_origins: Vec<String>,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:4000".to_string(),
            tick_rate_hz: 60,
            rng_seed: None,
            max_rooms: 1024,
            room_inbox_capacity: 64,
            outbound_capacity: 128,
            max_message_bytes: 1024,
            max_parse_errors: 5,
            enforce_slot_ownership: true,
            allowed_origins: vec!["http://localhost:5173".to_string()],
            game: GameConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.tick_rate_hz == 0 || self.tick_rate_hz > 1000 {
            return Err("tick_rate_hz must be in 1..=1000".to_string());
        }
        if self.max_rooms == 0 {
            return Err("max_rooms must be > 0".to_string());
        }
        if self.room_inbox_capacity == 0 {
            return Err("room_inbox_capacity must be > 0".to_string());
        }
        if self.outbound_capacity == 0 {
            return Err("outbound_capacity must be > 0".to_string());
        }
        if self.max_message_bytes < 64 {
            return Err("max_message_bytes must be >= 64".to_string());
        }
        self.game.validate()
    }
}
