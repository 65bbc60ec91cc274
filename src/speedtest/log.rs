use chrono::Local;
use tracing::{error, info, warn};

use super::{TestUpdate, UpdateSink};

#[derive(Debug)]
pub struct SessionLog {
    entries: Vec<String>,
    sink: UpdateSink,
}

impl SessionLog {
    pub fn new(sink: UpdateSink) -> Self {
        Self {
            entries: Vec::new(),
            sink,
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(target: "session", "{message}");
        self.push(message);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(target: "session", "{message}");
        self.push(message);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!(target: "session", "{message}");
        self.push(message);
    }

    fn push(&mut self, message: String) {
        let line = format!("[{}] {}", Local::now().format("%H:%M:%S"), message);
        self.sink.publish(TestUpdate::Log(line.clone()));
        self.entries.push(line);
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn render(&self) -> String {
        self.entries.iter().map(|line| format!("{line}\n")).collect()
    }
}
