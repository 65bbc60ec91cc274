use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{
    clock::Deadline,
    log::SessionLog,
    progress::ProgressReporter,
    throughput::SpeedMeter,
    transport::Transport,
    Measurement, MeasurementKind,
};
use crate::error::{Result, SpeedTestError};

pub struct DownloadTest {
    transport: Arc<dyn Transport>,
    download_size: u64,
}

impl DownloadTest {
    pub fn new(transport: Arc<dyn Transport>, download_size: u64) -> Self {
        Self {
            transport,
            download_size,
        }
    }

    pub async fn run(
        &self,
        budget: Duration,
        log: &mut SessionLog,
        progress: &mut ProgressReporter,
    ) -> Measurement {
        log.info("Starting download test...");
        let deadline = Deadline::start(budget);
        let cancel = CancellationToken::new();
        let timer = DeadlineTimer::arm(deadline, cancel.clone());

        let mut meter = SpeedMeter::new(deadline);
        let outcome = self.consume(&cancel, &mut meter, progress).await;
        drop(timer);

        let ok = match outcome {
            Ok(()) => true,
            Err(err) if err.is_timeout_abort() => {
                log.info("Download test finished on time limit.");
                true
            }
            Err(err) => {
                log.error(format!("Download test error: {err}"));
                false
            }
        };

        let speed = meter.final_mbps();
        log.info(format!("Final download speed: {speed:.2} Mbps"));
        if ok {
            Measurement::ok(MeasurementKind::Download, speed)
        } else {
            Measurement::error(MeasurementKind::Download, speed)
        }
    }

    async fn consume(
        &self,
        cancel: &CancellationToken,
        meter: &mut SpeedMeter,
        progress: &mut ProgressReporter,
    ) -> Result<()> {
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SpeedTestError::TimeoutAbort),
            opened = self.transport.open_download(self.download_size) => opened?,
        };

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SpeedTestError::TimeoutAbort),
                next = stream.next() => next,
            };
            match next {
                Some(chunk) => {
                    let chunk = chunk?;
                    meter.publish(chunk.len() as u64, MeasurementKind::Download, progress);
                }
                None => return Ok(()),
            }
        }
    }
}

// Cancels the token at the deadline; dropping it disarms the timer.
struct DeadlineTimer(JoinHandle<()>);

impl DeadlineTimer {
    fn arm(deadline: Deadline, cancel: CancellationToken) -> Self {
        Self(tokio::spawn(async move {
            tokio::time::sleep_until(deadline.instant()).await;
            cancel.cancel();
        }))
    }
}

impl Drop for DeadlineTimer {
    fn drop(&mut self) {
        self.0.abort();
    }
}
