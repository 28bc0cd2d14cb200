//! HTTP server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8000;

/// HTTP server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Camera ids started before the server accepts requests
    pub preload: Vec<String>,

    /// Run the registry cleanup task while serving
    pub cleanup_enabled: bool,

    /// Upper bound on stopping all streams at shutdown
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            preload: Vec::new(),
            cleanup_enabled: false,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set cameras to start eagerly
    pub fn preload<I, S>(mut self, cameras: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.preload = cameras.into_iter().map(Into::into).collect();
        self
    }

    /// Run the idle cleanup task
    pub fn enable_cleanup(mut self) -> Self {
        self.cleanup_enabled = true;
        self
    }

    /// Set shutdown timeout
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();

        assert_eq!(config.bind_addr.port(), 8000);
        assert!(config.bind_addr.ip().is_unspecified());
        assert!(config.preload.is_empty());
        assert!(!config.cleanup_enabled);
    }

    #[test]
    fn test_with_addr() {
        let addr: SocketAddr = "127.0.0.1:8080".parse().unwrap();
        let config = ServerConfig::with_addr(addr);

        assert_eq!(config.bind_addr.port(), 8080);
    }

    #[test]
    fn test_builder_chaining() {
        let addr: SocketAddr = "127.0.0.1:9000".parse().unwrap();
        let config = ServerConfig::default()
            .bind(addr)
            .preload(["Lobby", "Garage"])
            .enable_cleanup()
            .shutdown_timeout(Duration::from_secs(3));

        assert_eq!(config.bind_addr, addr);
        assert_eq!(config.preload, vec!["Lobby", "Garage"]);
        assert!(config.cleanup_enabled);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(3));
    }
}
