pub mod clock;
pub mod download;
pub mod log;
pub mod ping;
pub mod progress;
#[cfg(test)]
pub(crate) mod testing;
pub mod throughput;
pub mod transport;
pub mod upload;

use tokio::sync::mpsc;

pub use throughput::{Direction, ThroughputSampler, TransferSample};

pub const SENTINEL: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MeasurementKind {
    Ping,
    Download,
    Upload,
}

impl MeasurementKind {
    pub fn unit(self) -> Unit {
        match self {
            MeasurementKind::Ping => Unit::Ms,
            MeasurementKind::Download | MeasurementKind::Upload => Unit::Mbps,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Ms,
    Mbps,
}

impl Unit {
    pub fn label(self) -> &'static str {
        match self {
            Unit::Ms => "ms",
            Unit::Mbps => "Mbps",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub kind: MeasurementKind,
    pub value: f64,
    pub unit: Unit,
    pub status: Status,
}

impl Measurement {
    pub fn ok(kind: MeasurementKind, value: f64) -> Self {
        Self::new(kind, value, Status::Ok)
    }

    pub fn error(kind: MeasurementKind, value: f64) -> Self {
        Self::new(kind, value, Status::Error)
    }

    pub fn failed_ping() -> Self {
        Self::error(MeasurementKind::Ping, SENTINEL)
    }

    fn new(kind: MeasurementKind, value: f64, status: Status) -> Self {
        Self {
            kind,
            value,
            unit: kind.unit(),
            status,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    pub fn rounded(&self) -> f64 {
        match self.unit {
            Unit::Ms => self.value.round(),
            Unit::Mbps => (self.value * 100.0).round() / 100.0,
        }
    }

    pub fn formatted(&self) -> String {
        match self.unit {
            Unit::Ms => format!("{:.0} {}", self.rounded(), self.unit.label()),
            Unit::Mbps => format!("{:.2} {}", self.rounded(), self.unit.label()),
        }
    }

    pub fn display(&self) -> String {
        if self.is_ok() {
            self.formatted()
        } else {
            "Error".to_string()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    Idle,
    Ping,
    Download,
    Upload,
    Reporting,
}

impl TestPhase {
    pub fn is_running(self) -> bool {
        self != TestPhase::Idle
    }
}

#[derive(Debug, Clone)]
pub enum TestUpdate {
    Phase(TestPhase),
    Log(String),
    Progress(f64),
    Speed {
        kind: MeasurementKind,
        sample: TransferSample,
    },
    PhaseComplete(Measurement),
    Reported {
        delivered: bool,
    },
}

// Progress, speed and log updates are dropped when the receiver lags.
#[derive(Debug, Clone, Default)]
pub struct UpdateSink {
    tx: Option<mpsc::Sender<TestUpdate>>,
}

impl UpdateSink {
    pub fn new(tx: mpsc::Sender<TestUpdate>) -> Self {
        Self { tx: Some(tx) }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }

    pub fn publish(&self, update: TestUpdate) {
        if let Some(tx) = &self.tx {
            let _ = tx.try_send(update);
        }
    }

    pub async fn deliver(&self, update: TestUpdate) {
        if let Some(tx) = &self.tx {
            let _ = tx.send(update).await;
        }
    }
}
