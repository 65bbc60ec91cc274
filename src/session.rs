use std::collections::BTreeMap;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use crate::geo::ClientInfo;
use crate::network::NetworkType;
use crate::report::{aggregate, Host, ResultPayload};
use crate::settings::{Settings, MAX_DURATION_SECS, MIN_DURATION_SECS};
use crate::speedtest::{
    log::SessionLog, ping::PingTest, progress::ProgressReporter, transport::Transport, Direction,
    Measurement, MeasurementKind, TestPhase, TestUpdate, ThroughputSampler, UpdateSink,
};

#[derive(Debug, Clone)]
pub struct ClientContext {
    pub client_info: ClientInfo,
    pub network_type: Option<NetworkType>,
}

pub struct TestSession {
    pub log: SessionLog,
    results: BTreeMap<MeasurementKind, Measurement>,
}

impl TestSession {
    fn new(sink: UpdateSink) -> Self {
        Self {
            log: SessionLog::new(sink),
            results: BTreeMap::new(),
        }
    }

    fn record(&mut self, measurement: Measurement) {
        self.results.insert(measurement.kind, measurement);
    }

    pub fn result(&self, kind: MeasurementKind) -> Option<&Measurement> {
        self.results.get(&kind)
    }

    // A phase that never recorded anything reports as failed.
    pub fn outcome(&self, kind: MeasurementKind) -> Measurement {
        match self.result(kind) {
            Some(measurement) => *measurement,
            None if kind == MeasurementKind::Ping => Measurement::failed_ping(),
            None => Measurement::error(kind, 0.0),
        }
    }
}

struct RunnerState {
    in_progress: AtomicBool,
    phase: watch::Sender<TestPhase>,
}

// Back to Idle on every exit route, aborted tasks included.
struct RunGuard(Arc<RunnerState>);

impl RunGuard {
    fn acquire(state: &Arc<RunnerState>) -> Option<Self> {
        state
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(Arc::clone(state)))
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.phase.send_replace(TestPhase::Idle);
        self.0.in_progress.store(false, Ordering::Release);
    }
}

#[derive(Clone)]
pub struct SpeedTest {
    transport: Arc<dyn Transport>,
    host: Arc<dyn Host>,
    sampler: ThroughputSampler,
    ping_timeout: Duration,
    state: Arc<RunnerState>,
}

impl SpeedTest {
    pub fn new(transport: Arc<dyn Transport>, host: Arc<dyn Host>, settings: &Settings) -> Self {
        let sampler = ThroughputSampler::new(
            Arc::clone(&transport),
            settings.download_size_bytes(),
            settings.upload_chunk_bytes(),
        );
        let (phase, _) = watch::channel(TestPhase::Idle);
        Self {
            transport,
            host,
            sampler,
            ping_timeout: Duration::from_secs(settings.ping_timeout_secs),
            state: Arc::new(RunnerState {
                in_progress: AtomicBool::new(false),
                phase,
            }),
        }
    }

    pub fn reconfigured(&self, settings: &Settings) -> Self {
        Self {
            sampler: ThroughputSampler::new(
                Arc::clone(&self.transport),
                settings.download_size_bytes(),
                settings.upload_chunk_bytes(),
            ),
            ping_timeout: Duration::from_secs(settings.ping_timeout_secs),
            ..self.clone()
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.in_progress.load(Ordering::Acquire)
    }

    pub fn phase(&self) -> TestPhase {
        *self.state.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<TestPhase> {
        self.state.phase.subscribe()
    }

    // `None` when a session is already in progress.
    // Duration is read at the start of each throughput phase.
    pub async fn run_test(
        &self,
        context: &ClientContext,
        duration_secs: &watch::Receiver<u64>,
        sink: UpdateSink,
    ) -> Option<ResultPayload> {
        let _guard = RunGuard::acquire(&self.state)?;

        let mut session = TestSession::new(sink.clone());
        let mut progress = ProgressReporter::new(sink.clone());
        progress.reset();
        session.log.info("Starting full speed test...");

        self.enter(TestPhase::Ping, &sink).await;
        let ping = PingTest::new(Arc::clone(&self.transport), self.ping_timeout)
            .run(&mut session.log)
            .await;
        self.finish(ping, &mut session, &sink).await;
        progress.reset();

        self.enter(TestPhase::Download, &sink).await;
        let download = self
            .sampler
            .sample(Direction::Download, read_duration(duration_secs), &mut session.log, &mut progress)
            .await;
        self.finish(download, &mut session, &sink).await;
        progress.reset();

        self.enter(TestPhase::Upload, &sink).await;
        let upload = self
            .sampler
            .sample(Direction::Upload, read_duration(duration_secs), &mut session.log, &mut progress)
            .await;
        self.finish(upload, &mut session, &sink).await;
        progress.complete();

        session.log.info("Speed test complete.");
        self.enter(TestPhase::Reporting, &sink).await;

        let payload = aggregate(
            &session.outcome(MeasurementKind::Ping),
            &session.outcome(MeasurementKind::Download),
            &session.outcome(MeasurementKind::Upload),
            &context.client_info,
            context.network_type.clone(),
            &session.log.render(),
        );
        let delivered = self.hand_off(&payload, &mut session.log).await;
        sink.deliver(TestUpdate::Reported { delivered }).await;

        Some(payload)
    }

    async fn enter(&self, phase: TestPhase, sink: &UpdateSink) {
        self.state.phase.send_replace(phase);
        sink.deliver(TestUpdate::Phase(phase)).await;
    }

    async fn finish(&self, measurement: Measurement, session: &mut TestSession, sink: &UpdateSink) {
        session.record(measurement);
        sink.deliver(TestUpdate::PhaseComplete(measurement)).await;
    }

    async fn hand_off(&self, payload: &ResultPayload, log: &mut SessionLog) -> bool {
        info!("{}", payload.summary_line());
        log.info("Sending results to host...");
        let sent = match payload.to_json() {
            Ok(json) => self.host.send_data(&json).await,
            Err(err) => Err(err),
        };
        match sent {
            Ok(()) => {
                log.info("Results delivered.");
                true
            }
            Err(err) => {
                error!("result hand-off failed: {err}");
                log.error(format!("Could not deliver results: {err}"));
                false
            }
        }
    }
}

fn read_duration(duration_secs: &watch::Receiver<u64>) -> u64 {
    (*duration_secs.borrow()).clamp(MIN_DURATION_SECS, MAX_DURATION_SECS)
}
