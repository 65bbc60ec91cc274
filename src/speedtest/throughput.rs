use std::sync::Arc;
use std::time::Duration;

use super::{
    clock::Deadline, download::DownloadTest, log::SessionLog, progress::ProgressReporter,
    transport::Transport, upload::UploadTest, Measurement, MeasurementKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSample {
    pub bytes_so_far: u64,
    pub elapsed_ms: u64,
}

impl TransferSample {
    pub fn mbps(&self) -> f64 {
        megabits_per_second(self.bytes_so_far, Duration::from_millis(self.elapsed_ms))
    }
}

pub fn megabits_per_second(bytes: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if bytes == 0 || secs <= 0.0 {
        return 0.0;
    }
    bytes as f64 * 8.0 / secs / 1_000_000.0
}

#[derive(Debug)]
pub struct SpeedMeter {
    deadline: Deadline,
    bytes: u64,
}

impl SpeedMeter {
    pub fn new(deadline: Deadline) -> Self {
        Self { deadline, bytes: 0 }
    }

    pub fn record(&mut self, bytes: u64) -> TransferSample {
        self.bytes += bytes;
        TransferSample {
            bytes_so_far: self.bytes,
            elapsed_ms: self.deadline.elapsed().as_millis() as u64,
        }
    }

    pub fn publish(&mut self, bytes: u64, kind: MeasurementKind, progress: &mut ProgressReporter) {
        let sample = self.record(bytes);
        progress.speed(kind, sample);
        progress.update(self.deadline.percent());
    }

    // actual elapsed time, not the budget
    pub fn final_mbps(&self) -> f64 {
        megabits_per_second(self.bytes, self.deadline.elapsed())
    }
}

#[derive(Clone)]
pub struct ThroughputSampler {
    transport: Arc<dyn Transport>,
    download_size: u64,
    upload_chunk: usize,
}

impl ThroughputSampler {
    pub fn new(transport: Arc<dyn Transport>, download_size: u64, upload_chunk: usize) -> Self {
        Self {
            transport,
            download_size,
            upload_chunk,
        }
    }

    pub async fn sample(
        &self,
        direction: Direction,
        duration_secs: u64,
        log: &mut SessionLog,
        progress: &mut ProgressReporter,
    ) -> Measurement {
        let budget = Duration::from_secs(duration_secs.max(1));
        match direction {
            Direction::Download => {
                DownloadTest::new(Arc::clone(&self.transport), self.download_size)
                    .run(budget, log, progress)
                    .await
            }
            Direction::Upload => {
                UploadTest::new(Arc::clone(&self.transport), self.upload_chunk)
                    .run(budget, log, progress)
                    .await
            }
        }
    }
}
