use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use super::{log::SessionLog, transport::Transport, Measurement, MeasurementKind};
use crate::error::SpeedTestError;

pub struct PingTest {
    transport: Arc<dyn Transport>,
    timeout: Duration,
}

impl PingTest {
    pub fn new(transport: Arc<dyn Transport>, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub async fn run(&self, log: &mut SessionLog) -> Measurement {
        log.info("Starting ping test...");
        let cache_buster = chrono::Utc::now().timestamp_millis();
        let start = Instant::now();

        let outcome = match tokio::time::timeout(self.timeout, self.transport.ping(cache_buster)).await {
            Ok(result) => result,
            Err(_) => Err(SpeedTestError::Network(format!(
                "no response within {} s",
                self.timeout.as_secs()
            ))),
        };
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        match outcome {
            Ok(()) => {
                log.info(format!("Ping ok: {elapsed_ms:.0} ms"));
                Measurement::ok(MeasurementKind::Ping, elapsed_ms)
            }
            Err(err) => {
                log.error(format!("Ping test error: {err}"));
                Measurement::failed_ping()
            }
        }
    }
}
