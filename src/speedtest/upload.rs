use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rand::{Rng, SeedableRng};

use super::{
    clock::Deadline, log::SessionLog, progress::ProgressReporter, throughput::SpeedMeter,
    transport::Transport, Measurement, MeasurementKind,
};

pub struct UploadTest {
    transport: Arc<dyn Transport>,
    chunk: Bytes,
}

impl UploadTest {
    pub fn new(transport: Arc<dyn Transport>, chunk_size: usize) -> Self {
        let mut rng = rand::rngs::StdRng::from_entropy();
        let data: Vec<u8> = (0..chunk_size).map(|_| rng.gen()).collect();
        Self {
            transport,
            chunk: Bytes::from(data),
        }
    }

    // A chunk in flight always completes; no chunk starts past the budget.
    pub async fn run(
        &self,
        budget: Duration,
        log: &mut SessionLog,
        progress: &mut ProgressReporter,
    ) -> Measurement {
        log.info("Starting upload test...");
        let deadline = Deadline::start(budget);
        let mut meter = SpeedMeter::new(deadline);
        let mut ok = true;

        while !deadline.is_past() {
            match self.transport.upload(self.chunk.clone()).await {
                // failed chunks never count towards the average
                Ok(()) => meter.publish(self.chunk.len() as u64, MeasurementKind::Upload, progress),
                Err(err) => {
                    log.error(format!("Upload test error: {err}"));
                    ok = false;
                    break;
                }
            }
        }

        let speed = meter.final_mbps();
        log.info(format!("Final upload speed: {speed:.2} Mbps"));
        if ok {
            Measurement::ok(MeasurementKind::Upload, speed)
        } else {
            Measurement::error(MeasurementKind::Upload, speed)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::speedtest::{testing::FakeTransport, Status, UpdateSink};

    const CHUNK: usize = 262_144;

    fn fixtures() -> (SessionLog, ProgressReporter) {
        (
            SessionLog::new(UpdateSink::disconnected()),
            ProgressReporter::new(UpdateSink::disconnected()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn slow_chunk_is_never_followed_past_deadline() {
        let transport = Arc::new(FakeTransport {
            upload_delay: Duration::from_secs(2),
            ..FakeTransport::default()
        });
        let (mut log, mut progress) = fixtures();
        let test = UploadTest::new(transport.clone(), CHUNK);

        let started = tokio::time::Instant::now();
        let result = test.run(Duration::from_secs(1), &mut log, &mut progress).await;
        let elapsed = started.elapsed();

        assert_eq!(transport.upload_calls(), 1);
        assert_eq!(transport.uploaded(), CHUNK as u64);
        assert_eq!(result.status, Status::Ok);
        let expected = 8.0 * CHUNK as f64 / elapsed.as_secs_f64() / 1e6;
        assert!((result.value - expected).abs() < 1e-9);
        assert_eq!(elapsed, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn keeps_sending_until_deadline() {
        let transport = Arc::new(FakeTransport {
            upload_delay: Duration::from_millis(300),
            ..FakeTransport::default()
        });
        let (mut log, mut progress) = fixtures();
        let test = UploadTest::new(transport.clone(), CHUNK);

        let result = test.run(Duration::from_secs(1), &mut log, &mut progress).await;

        // chunks start at 0, 300, 600 and 900 ms; the check at 1200 ms stops the loop
        assert_eq!(transport.upload_calls(), 4);
        let expected = 8.0 * (4 * CHUNK) as f64 / 1.2 / 1e6;
        assert!((result.value - expected).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_chunk_is_excluded() {
        let transport = Arc::new(FakeTransport {
            upload_delay: Duration::from_millis(250),
            upload_error_at: Some(2),
            ..FakeTransport::default()
        });
        let (mut log, mut progress) = fixtures();
        let test = UploadTest::new(transport.clone(), CHUNK);

        let result = test.run(Duration::from_secs(5), &mut log, &mut progress).await;

        assert_eq!(result.status, Status::Error);
        assert_eq!(transport.upload_calls(), 3);
        assert_eq!(transport.uploaded(), 2 * CHUNK as u64);
        // two good chunks over the 750 ms spent, including the failed one
        let expected = 8.0 * (2 * CHUNK) as f64 / 0.75 / 1e6;
        assert!((result.value - expected).abs() < 1e-9);
        assert!(log.entries().iter().any(|l| l.contains("Upload test error")));
    }

    #[test]
    fn chunk_has_requested_size() {
        let test = UploadTest::new(Arc::new(FakeTransport::default()), CHUNK);
        assert_eq!(test.chunk.len(), CHUNK);
    }
}
