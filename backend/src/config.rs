//! Server configuration read from the environment.
//!
//! # Environment Variables
//!
//! - `HOST`: bind host (default: `0.0.0.0`)
//! - `API_PORT`: bind port, falling back to `PORT` (default: 8000)
//! - `CORS_ORIGINS`: comma-separated list of allowed origins
//!   (default: `http://localhost:5173`)

use std::env;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            cors_origins: vec![DEFAULT_CORS_ORIGIN.to_string()],
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let host = lookup("HOST")
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or(defaults.host);

        let port = ["API_PORT", "PORT"]
            .iter()
            .find_map(|key| {
                let raw = lookup(key)?;
                match raw.trim().parse::<u16>() {
                    Ok(port) => Some(port),
                    Err(_) => {
                        log::warn!("Ignoring invalid {}={:?}", key, raw);
                        None
                    }
                }
            })
            .unwrap_or(defaults.port);

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| parse_origins(&raw))
            .filter(|origins| !origins.is_empty())
            .unwrap_or(defaults.cors_origins);

        Self {
            host,
            port,
            cors_origins,
        }
    }

    /// Host and port for `TcpListener::bind`. Hostnames are resolved at bind
    /// time; a bracketed IPv6 literal such as `[::1]` is unwrapped.
    pub fn bind_addr(&self) -> (&str, u16) {
        let host = self.host.trim();
        let host = host
            .strip_prefix('[')
            .and_then(|h| h.strip_suffix(']'))
            .unwrap_or(host);
        (host, self.port)
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|o| !o.is_empty())
        .map(|o| o.trim_end_matches('/').to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.port, 8000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5173"]);
    }

    #[test]
    fn test_api_port_wins_over_port() {
        let config = ServerConfig::from_lookup(lookup(&[("API_PORT", "9000"), ("PORT", "7000")]));
        assert_eq!(config.port, 9000);

        let config = ServerConfig::from_lookup(lookup(&[("PORT", "7000")]));
        assert_eq!(config.port, 7000);
    }

    #[test]
    fn test_invalid_port_falls_through() {
        let config = ServerConfig::from_lookup(lookup(&[("API_PORT", "abc"), ("PORT", "7000")]));
        assert_eq!(config.port, 7000);

        let config = ServerConfig::from_lookup(lookup(&[("API_PORT", "99999")]));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_cors_origins_are_split_and_trimmed() {
        let config = ServerConfig::from_lookup(lookup(&[(
            "CORS_ORIGINS",
            " http://localhost:5173/ , https://sasi.example.com,,",
        )]));
        assert_eq!(
            config.cors_origins,
            vec!["http://localhost:5173", "https://sasi.example.com"]
        );
    }

    #[test]
    fn test_bind_addr_accepts_ip_literals() {
        use std::net::ToSocketAddrs;

        for host in ["127.0.0.1", "0.0.0.0", "::", "[::1]"] {
            let config = ServerConfig::from_lookup(lookup(&[("HOST", host), ("PORT", "8123")]));
            let addr = config
                .bind_addr()
                .to_socket_addrs()
                .unwrap()
                .next()
                .unwrap();
            assert_eq!(addr.port(), 8123, "host={}", host);
        }
    }

    #[test]
    fn test_bind_addr_keeps_hostnames() {
        let config = ServerConfig::from_lookup(lookup(&[("HOST", "localhost")]));
        assert_eq!(config.bind_addr(), ("localhost", DEFAULT_PORT));
    }

    #[tokio::test]
    async fn test_bind_to_localhost() {
        let config = ServerConfig::from_lookup(lookup(&[("HOST", "localhost"), ("PORT", "0")]));
        let listener = tokio::net::TcpListener::bind(config.bind_addr())
            .await
            .unwrap();
        assert!(listener.local_addr().unwrap().ip().is_loopback());
    }
}
