// src/probe/target.rs
use std::time::Duration;

/// One monitored endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub key: String,
    pub host: String,
    pub port: u16,
    pub timeout: Duration,
}

impl Target {
    pub fn new(key: impl Into<String>, host: impl Into<String>, port: u16, timeout: Duration) -> Self {
        Self {
            key: key.into(),
            host: host.into(),
            port,
            timeout,
        }
    }

    /// `host:port`, bracketing IPv6 literals.
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

/// Outcome of a single liveness check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub key: String,
    pub reachable: bool,
    pub elapsed: Duration,
}

impl ProbeResult {
    pub fn new(key: impl Into<String>, reachable: bool) -> Self {
        Self {
            key: key.into(),
            reachable,
            elapsed: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_address_formatting() {
        let t = Target::new("a", "example.com", 80, Duration::from_secs(1));
        assert_eq!(t.address(), "example.com:80");

        let t = Target::new("b", "::1", 22, Duration::from_secs(1));
        assert_eq!(t.address(), "[::1]:22");
    }
}
