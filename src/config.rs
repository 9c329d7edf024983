use std::env;
use std::time::Duration;

use log::{info, warn};

pub struct Config {
    pub bind_addr: String,
    pub database_url: String,
    pub store_timeout: Duration,
}

impl Config {
    pub fn load() -> Self {
        Self {
            bind_addr: load_or("BIND_ADDR", "0.0.0.0:3001"),
            database_url: load_or("DATABASE_URL", "sqlite:pollcast.db"),
            store_timeout: Duration::from_millis(parse_millis(
                "STORE_TIMEOUT_MS",
                &load_or("STORE_TIMEOUT_MS", "5000"),
            )),
        }
    }
}

fn load_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}

fn parse_millis(key: &str, raw: &str) -> u64 {
    raw.parse()
        .map_err(|e| {
            warn!("Invalid {} value {:?}: {}", key, raw, e);
        })
        .expect("Environment misconfigured!")
}

#[cfg(test)]
mod tests {
    use super::parse_millis;

    #[test]
    fn parses_valid_timeout() {
        assert_eq!(parse_millis("STORE_TIMEOUT_MS", "250"), 250);
    }

    #[test]
    #[should_panic(expected = "Environment misconfigured!")]
    fn rejects_non_integer_timeout() {
        parse_millis("STORE_TIMEOUT_MS", "soon");
    }
}
