//! Runner configuration

use std::time::Duration;

/// Configuration for the multitrack runner
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the fleet REST backend
    pub api_base_url: String,
    /// WebSocket URL of the push-update source
    pub ws_url: String,
    /// Company scoping parameter sent with every fetch
    pub company_id: String,
    /// Session token for the REST backend
    pub session_token: String,
    /// Interval of the reclassification tick
    pub tick_interval: Duration,
    /// Re-fetch interval used while the push channel is down
    pub refetch_interval: Duration,
    /// Simulation mode (generate fake fleet data, no live backend)
    pub simulation_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            ws_url: "ws://localhost:9090/updates".to_string(),
            company_id: "demo".to_string(),
            session_token: String::new(),
            tick_interval: Duration::from_secs(30),
            refetch_interval: Duration::from_secs(60),
            simulation_mode: true,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        Self {
            api_base_url: std::env::var("FLEET_API_URL").unwrap_or(defaults.api_base_url),
            ws_url: std::env::var("FLEET_WS_URL").unwrap_or(defaults.ws_url),
            company_id: std::env::var("FLEET_COMPANY_ID").unwrap_or(defaults.company_id),
            session_token: std::env::var("FLEET_SESSION_TOKEN").unwrap_or(defaults.session_token),
            tick_interval: env_secs("FLEET_TICK_SECONDS", defaults.tick_interval),
            refetch_interval: env_secs("FLEET_REFETCH_SECONDS", defaults.refetch_interval),
            simulation_mode: std::env::var("FLEET_SIMULATION_MODE")
                .map(|s| s == "true" || s == "1")
                .unwrap_or(defaults.simulation_mode),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert!(config.simulation_mode);
        assert_eq!(config.tick_interval, Duration::from_secs(30));
    }
}
