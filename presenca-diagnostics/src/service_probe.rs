//! Face-service reachability checks

use chrono::{DateTime, Utc};
use presenca_facial::HttpFacialService;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Outcome of one health probe
#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    /// Whether the service answered healthy
    pub healthy: bool,
    /// Round-trip time of the probe
    pub latency: Duration,
    /// Failure detail when the probe itself failed
    pub error: Option<String>,
    /// When the probe ran
    pub checked_at: DateTime<Utc>,
}

/// Health prober for the face service
#[derive(Debug, Clone)]
pub struct ServiceProbe {
    service: HttpFacialService,
}

impl ServiceProbe {
    /// Create a probe for the given service
    pub fn new(service: HttpFacialService) -> Self {
        Self { service }
    }

    /// Run a single health check
    pub async fn probe(&self) -> ProbeResult {
        let started = Instant::now();
        let checked_at = Utc::now();
        let result = self.service.health().await;
        let latency = started.elapsed();

        match result {
            Ok(healthy) => {
                debug!(healthy, ?latency, url = self.service.base_url(), "face service probed");
                ProbeResult {
                    healthy,
                    latency,
                    error: None,
                    checked_at,
                }
            }
            Err(e) => {
                warn!(error = %e, url = self.service.base_url(), "face service probe failed");
                ProbeResult {
                    healthy: false,
                    latency,
                    error: Some(e.to_string()),
                    checked_at,
                }
            }
        }
    }

    /// Probe up to `attempts` times, `interval` apart, until the service is healthy
    pub async fn wait_until_healthy(&self, attempts: u32, interval: Duration) -> ProbeResult {
        let mut last = self.probe().await;
        for attempt in 1..attempts {
            if last.healthy {
                break;
            }
            debug!(attempt, "face service not healthy yet");
            tokio::time::sleep(interval).await;
            last = self.probe().await;
        }
        if last.healthy {
            info!(url = self.service.base_url(), "face service is healthy");
        }
        last
    }
}
