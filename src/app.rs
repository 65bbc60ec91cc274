use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use prospeed::{
    geo::GeoInfo,
    network::NetworkType,
    settings::{
        Settings, SettingsField, MAX_DOWNLOAD_MIB, MAX_DURATION_SECS, MAX_UPLOAD_CHUNK_KIB,
        MIN_DOWNLOAD_MIB, MIN_DURATION_SECS, MIN_UPLOAD_CHUNK_KIB,
    },
    speedtest::{Measurement, MeasurementKind, TestPhase, TestUpdate},
};
use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};

const MAX_SAMPLES: usize = 200;
const MAX_LOG_LINES: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppView {
    Main,
    Settings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel {
    Download,
    Upload,
    Ping,
}

impl Panel {
    pub fn next(self) -> Self {
        match self {
            Panel::Download => Panel::Upload,
            Panel::Upload => Panel::Ping,
            Panel::Ping => Panel::Download,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            Panel::Download => Panel::Ping,
            Panel::Upload => Panel::Download,
            Panel::Ping => Panel::Upload,
        }
    }
}

pub struct App {
    pub phase: TestPhase,
    pub should_quit: bool,

    // Results of the current or last session
    pub ping: Option<Measurement>,
    pub download: Option<Measurement>,
    pub upload: Option<Measurement>,
    pub delivered: Option<bool>,
    pub completed: bool,

    // UI state
    pub view: AppView,
    pub selected_panel: Panel,
    pub expanded: bool,

    // Settings
    pub settings: Settings,
    pub selected_setting: SettingsField,

    // Progress of the running phase, 0..=100
    pub progress: f64,

    // Speed samples for charts
    pub download_samples: Vec<f64>,
    pub upload_samples: Vec<f64>,

    pub log_lines: Vec<String>,

    // Collected once at start-up
    pub geo: GeoInfo,
    pub network_type: Option<NetworkType>,

    duration_tx: watch::Sender<u64>,
    task: Option<JoinHandle<()>>,
}

impl App {
    pub fn new(
        settings: Settings,
        geo: GeoInfo,
        network_type: Option<NetworkType>,
        duration_tx: watch::Sender<u64>,
    ) -> Self {
        duration_tx.send_replace(settings.duration_secs);
        Self {
            phase: TestPhase::Idle,
            should_quit: false,
            ping: None,
            download: None,
            upload: None,
            delivered: None,
            completed: false,
            view: AppView::Main,
            selected_panel: Panel::Download,
            expanded: false,
            settings,
            selected_setting: SettingsField::Duration,
            progress: 0.0,
            download_samples: Vec::new(),
            upload_samples: Vec::new(),
            log_lines: Vec::new(),
            geo,
            network_type,
            duration_tx,
            task: None,
        }
    }

    pub fn duration_receiver(&self) -> watch::Receiver<u64> {
        self.duration_tx.subscribe()
    }

    pub fn is_idle(&self) -> bool {
        !self.phase.is_running()
    }

    pub fn log(&mut self, line: impl Into<String>) {
        self.log_lines.push(line.into());
        if self.log_lines.len() > MAX_LOG_LINES {
            self.log_lines.remove(0);
        }
    }

    pub fn handle_key_event(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        if key.kind != KeyEventKind::Press {
            return None;
        }

        match self.view {
            AppView::Main => self.handle_main_key(key),
            AppView::Settings => self.handle_settings_key(key),
        }
    }

    fn handle_main_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Some(AppAction::Quit)
            }
            KeyCode::Char('s') => {
                if self.is_idle() {
                    self.view = AppView::Settings;
                }
                None
            }
            KeyCode::Enter => {
                if self.expanded {
                    self.expanded = false;
                    None
                } else if self.is_idle() {
                    Some(AppAction::StartTest)
                } else {
                    // Expand current panel during test
                    self.expanded = true;
                    None
                }
            }
            KeyCode::Esc => {
                if self.expanded {
                    self.expanded = false;
                    None
                } else if !self.is_idle() {
                    Some(AppAction::CancelTest)
                } else {
                    None
                }
            }
            // The duration applies from the next throughput phase, even mid-test
            KeyCode::Char('+') | KeyCode::Char('=') => {
                self.adjust_duration(1);
                None
            }
            KeyCode::Char('-') => {
                self.adjust_duration(-1);
                None
            }
            KeyCode::Tab | KeyCode::Right | KeyCode::Char('j') => {
                if !self.expanded {
                    self.selected_panel = self.selected_panel.next();
                }
                None
            }
            KeyCode::BackTab | KeyCode::Left | KeyCode::Char('k') => {
                if !self.expanded {
                    self.selected_panel = self.selected_panel.prev();
                }
                None
            }
            KeyCode::Char(' ') => {
                self.expanded = !self.expanded;
                None
            }
            _ => None,
        }
    }

    fn handle_settings_key(&mut self, key: event::KeyEvent) -> Option<AppAction> {
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc | KeyCode::Enter => {
                self.view = AppView::Main;
                None
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.selected_setting = self.selected_setting.prev();
                None
            }
            KeyCode::Down | KeyCode::Char('j') | KeyCode::Tab => {
                self.selected_setting = self.selected_setting.next();
                None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.step_setting(-1);
                None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.step_setting(1);
                None
            }
            _ => None,
        }
    }

    fn step_setting(&mut self, direction: i64) {
        match self.selected_setting {
            SettingsField::Duration => self.adjust_duration(direction),
            SettingsField::DownloadSize => {
                let size = self.settings.download_size_mib as i64 + direction;
                self.settings.download_size_mib =
                    size.clamp(MIN_DOWNLOAD_MIB as i64, MAX_DOWNLOAD_MIB as i64) as u64;
            }
            SettingsField::UploadChunk => {
                let chunk = self.settings.upload_chunk_kib as i64 + direction * 64;
                self.settings.upload_chunk_kib =
                    chunk.clamp(MIN_UPLOAD_CHUNK_KIB as i64, MAX_UPLOAD_CHUNK_KIB as i64) as usize;
            }
        }
    }

    fn adjust_duration(&mut self, delta: i64) {
        let secs = (self.settings.duration_secs as i64 + delta)
            .clamp(MIN_DURATION_SECS as i64, MAX_DURATION_SECS as i64) as u64;
        self.settings.duration_secs = secs;
        self.duration_tx.send_replace(secs);
    }

    // Leaves Idle right away so a second Enter cannot start another session
    // before the first phase update arrives.
    pub fn begin_test(&mut self) {
        self.phase = TestPhase::Ping;
        self.ping = None;
        self.download = None;
        self.upload = None;
        self.delivered = None;
        self.completed = false;
        self.progress = 0.0;
        self.download_samples.clear();
        self.upload_samples.clear();
        self.log_lines.clear();
        self.expanded = false;
    }

    pub fn apply(&mut self, update: TestUpdate) {
        match update {
            TestUpdate::Phase(phase) => {
                self.phase = phase;
                self.progress = 0.0;
            }
            TestUpdate::Log(line) => self.log(line),
            TestUpdate::Progress(pct) => self.progress = pct,
            TestUpdate::Speed { kind, sample } => {
                let samples = match kind {
                    MeasurementKind::Download => &mut self.download_samples,
                    MeasurementKind::Upload => &mut self.upload_samples,
                    MeasurementKind::Ping => return,
                };
                samples.push(sample.mbps());
                // Keep last 200 samples
                if samples.len() > MAX_SAMPLES {
                    samples.remove(0);
                }
            }
            TestUpdate::PhaseComplete(measurement) => match measurement.kind {
                MeasurementKind::Ping => self.ping = Some(measurement),
                MeasurementKind::Download => self.download = Some(measurement),
                MeasurementKind::Upload => self.upload = Some(measurement),
            },
            TestUpdate::Reported { delivered } => self.delivered = Some(delivered),
        }
    }

    pub fn set_task(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    pub fn session_ended(&mut self) {
        self.completed = self.upload.is_some();
        self.phase = TestPhase::Idle;
        self.task = None;
    }

    pub fn cancel_test(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.log("Test cancelled.");
        self.phase = TestPhase::Idle;
    }

    pub fn panel_progress(&self, kind: MeasurementKind) -> f64 {
        let running = match kind {
            MeasurementKind::Ping => TestPhase::Ping,
            MeasurementKind::Download => TestPhase::Download,
            MeasurementKind::Upload => TestPhase::Upload,
        };
        if self.phase == running {
            self.progress / 100.0
        } else if self.result(kind).is_some() {
            1.0
        } else {
            0.0
        }
    }

    pub fn result(&self, kind: MeasurementKind) -> Option<&Measurement> {
        match kind {
            MeasurementKind::Ping => self.ping.as_ref(),
            MeasurementKind::Download => self.download.as_ref(),
            MeasurementKind::Upload => self.upload.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum AppAction {
    Quit,
    StartTest,
    CancelTest,
}

pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}
