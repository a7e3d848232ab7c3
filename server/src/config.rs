use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Time between simulation ticks on each connection.
    pub tick_period: Duration,
    /// Lifetime of a checkpoint written when a match is interrupted.
    pub checkpoint_ttl: Duration,
    /// Lifetime of a tournament roster stored before play starts.
    pub setup_ttl: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            tick_period: Duration::from_millis(6),
            checkpoint_ttl: Duration::from_secs(500),
            setup_ttl: Duration::from_secs(500),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by `PONG_LISTEN_ADDR`, `PONG_TICK_MS`,
    /// `PONG_CHECKPOINT_TTL_SECS` and `PONG_SETUP_TTL_SECS`.
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = Self::default();
        if let Some(addr) = lookup("PONG_LISTEN_ADDR") {
            config.listen_addr = addr;
        }
        if let Some(ms) = lookup("PONG_TICK_MS") {
            config.tick_period = Duration::from_millis(parse_u64("PONG_TICK_MS", &ms)?);
        }
        if let Some(secs) = lookup("PONG_CHECKPOINT_TTL_SECS") {
            config.checkpoint_ttl =
                Duration::from_secs(parse_u64("PONG_CHECKPOINT_TTL_SECS", &secs)?);
        }
        if let Some(secs) = lookup("PONG_SETUP_TTL_SECS") {
            config.setup_ttl = Duration::from_secs(parse_u64("PONG_SETUP_TTL_SECS", &secs)?);
        }
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.listen_addr.is_empty() {
            return Err("listen_addr must not be empty".to_string());
        }
        if self.tick_period.is_zero() {
            return Err("tick_period must be > 0".to_string());
        }
        if self.tick_period > Duration::from_secs(1) {
            return Err("tick_period must be <= 1s".to_string());
        }
        if self.checkpoint_ttl.is_zero() {
            return Err("checkpoint_ttl must be > 0".to_string());
        }
        if self.setup_ttl.is_zero() {
            return Err("setup_ttl must be > 0".to_string());
        }
        Ok(())
    }
}

fn parse_u64(name: &str, value: &str) -> Result<u64, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} must be a non-negative integer, got {:?}", name, value))
}
