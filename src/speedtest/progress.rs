use super::{MeasurementKind, TestUpdate, TransferSample, UpdateSink};

#[derive(Debug)]
pub struct ProgressReporter {
    sink: UpdateSink,
    last: f64,
}

impl ProgressReporter {
    pub fn new(sink: UpdateSink) -> Self {
        Self { sink, last: 0.0 }
    }

    // Clamped to [0, 100], never moves backwards until `reset`.
    pub fn update(&mut self, pct: f64) -> f64 {
        let pct = if pct.is_nan() { 0.0 } else { pct.clamp(0.0, 100.0) };
        if pct > self.last {
            self.last = pct;
            self.sink.publish(TestUpdate::Progress(pct));
        }
        self.last
    }

    pub fn reset(&mut self) {
        self.set(0.0);
    }

    pub fn complete(&mut self) {
        self.set(100.0);
    }

    fn set(&mut self, pct: f64) {
        self.last = pct;
        self.sink.publish(TestUpdate::Progress(pct));
    }

    pub fn speed(&self, kind: MeasurementKind, sample: TransferSample) {
        self.sink.publish(TestUpdate::Speed { kind, sample });
    }

    pub fn last(&self) -> f64 {
        self.last
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_and_stays_monotonic() {
        let mut progress = ProgressReporter::new(UpdateSink::disconnected());
        assert_eq!(progress.update(-5.0), 0.0);
        assert_eq!(progress.update(40.0), 40.0);
        assert_eq!(progress.update(30.0), 40.0);
        assert_eq!(progress.update(250.0), 100.0);
        assert_eq!(progress.update(f64::NAN), 100.0);
    }

    #[test]
    fn reset_starts_a_new_phase() {
        let mut progress = ProgressReporter::new(UpdateSink::disconnected());
        progress.update(80.0);
        progress.reset();
        assert_eq!(progress.last(), 0.0);
        assert_eq!(progress.update(10.0), 10.0);
        progress.complete();
        assert_eq!(progress.last(), 100.0);
    }
}
