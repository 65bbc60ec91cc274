use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use crate::error::{Result, SpeedTestError};

#[async_trait]
pub trait Host: Send + Sync {
    fn ready(&self) {
        debug!("host ready");
    }

    async fn send_data(&self, data: &str) -> Result<()>;
}

pub struct StdoutHost;

#[async_trait]
impl Host for StdoutHost {
    async fn send_data(&self, data: &str) -> Result<()> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(data.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
        Ok(())
    }
}

pub struct FileHost {
    path: PathBuf,
}

impl FileHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Host for FileHost {
    fn ready(&self) {
        debug!("results will be appended to {}", self.path.display());
    }

    async fn send_data(&self, data: &str) -> Result<()> {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| {
                SpeedTestError::Host(format!("cannot open {}: {err}", self.path.display()))
            })?;
        file.write_all(format!("{data}\n").as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

pub struct WebhookHost {
    client: reqwest::Client,
    url: Url,
}

impl WebhookHost {
    pub fn new(url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl Host for WebhookHost {
    fn ready(&self) {
        debug!("results will be posted to {}", self.url);
    }

    async fn send_data(&self, data: &str) -> Result<()> {
        self.client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(data.to_string())
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| SpeedTestError::Host(err.to_string()))?;
        Ok(())
    }
}

pub struct NullHost;

#[async_trait]
impl Host for NullHost {
    async fn send_data(&self, _data: &str) -> Result<()> {
        Ok(())
    }
}
