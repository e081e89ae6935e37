// src/probe/prober.rs
use super::{ProbeResult, Target};
use async_trait::async_trait;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A liveness check against one target.
///
/// Implementations must never fail: every failure mode is reported as
/// `reachable = false`, and the check must resolve within the target's
/// timeout.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, target: &Target) -> ProbeResult;
}

/// Plain TCP connect-and-close. Nothing is written to the socket.
#[derive(Debug, Default, Clone)]
pub struct TcpProber;

impl TcpProber {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Prober for TcpProber {
    async fn probe(&self, target: &Target) -> ProbeResult {
        let start = Instant::now();

        // Name resolution happens inside `connect`, so it shares the deadline.
        let result = timeout(
            target.timeout,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await;

        let reachable = match result {
            Ok(Ok(stream)) => {
                drop(stream);
                true
            }
            Ok(Err(e)) => {
                debug!("{} connect failed: {}", target.address(), e);
                false
            }
            Err(_) => {
                debug!(
                    "{} connect timed out after {:?}",
                    target.address(),
                    target.timeout
                );
                false
            }
        };

        if reachable {
            info!("{} on", target.address());
        } else {
            warn!("{} off", target.address());
        }

        ProbeResult {
            key: target.key.clone(),
            reachable,
            elapsed: start.elapsed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_open_port_is_reachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let target = Target::new("local", "127.0.0.1", port, Duration::from_secs(2));
        let result = TcpProber::new().probe(&target).await;

        assert_eq!(result.key, "local");
        assert!(result.reachable);
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        // Bind then drop to get a port nobody listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let target = Target::new("closed", "127.0.0.1", port, Duration::from_secs(2));
        let result = TcpProber::new().probe(&target).await;

        assert!(!result.reachable);
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_unreachable() {
        let target = Target::new(
            "bogus",
            "host.invalid",
            80,
            Duration::from_secs(2),
        );
        let result = TcpProber::new().probe(&target).await;

        assert!(!result.reachable);
    }

    #[tokio::test]
    async fn test_unroutable_host_respects_timeout() {
        // TEST-NET-1, never routed.
        let target = Target::new("blackhole", "192.0.2.1", 81, Duration::from_millis(200));
        let result = TcpProber::new().probe(&target).await;

        assert!(!result.reachable);
        assert!(result.elapsed < Duration::from_secs(2));
    }
}
