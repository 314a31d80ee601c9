//! TCP reachability checks of local services.

use crate::config::ServiceTarget;
use crate::metrics::catalog;
use crate::metrics::Registry;
use futures_util::future::join_all;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{debug, warn};

/// Why a probe did not connect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeFailure {
    /// No connection within the probe timeout
    Timeout,
    /// The connect attempt failed (refused, unreachable, ...)
    Refused(std::io::ErrorKind),
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::Timeout => write!(f, "timed out"),
            ProbeFailure::Refused(kind) => write!(f, "connect failed: {}", kind),
        }
    }
}

/// Probes every configured [`ServiceTarget`] on localhost.
pub struct ServiceProbe {
    targets: Vec<ServiceTarget>,
    timeout: Duration,
    registry: Arc<Registry>,
}

impl ServiceProbe {
    pub fn new(targets: Vec<ServiceTarget>, timeout: Duration, registry: Arc<Registry>) -> Self {
        Self {
            targets,
            timeout,
            registry,
        }
    }

    /// Probe all targets concurrently and write each availability gauge.
    ///
    /// Every target ends up at exactly 0 or 1; connection errors never leave
    /// this method.
    pub async fn probe_all(&self) {
        let results = join_all(
            self.targets
                .iter()
                .map(|target| check_port(target.port, self.timeout)),
        )
        .await;

        for (target, result) in self.targets.iter().zip(results) {
            let availability = match result {
                Ok(()) => 1.0,
                Err(failure) => {
                    debug!(service = %target.name, port = target.port, %failure, "service unavailable");
                    0.0
                }
            };

            if let Err(e) =
                self.registry
                    .set_gauge(catalog::SERVICE_AVAILABILITY, &[&target.name], availability)
            {
                warn!(service = %target.name, error = %e, "rejected availability write");
            }
        }
    }
}

/// One TCP connect attempt to `localhost:port`, no retries.
pub async fn check_port(port: u16, timeout: Duration) -> Result<(), ProbeFailure> {
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => Ok(()),
        Ok(Err(e)) => Err(ProbeFailure::Refused(e.kind())),
        Err(_) => Err(ProbeFailure::Timeout),
    }
}
