use std::sync::{
    atomic::{AtomicU64, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream, StreamExt};

use super::transport::{ByteStream, Transport};
use crate::error::{Result, SpeedTestError};
use crate::geo::{ClientInfo, GeoInfo};

pub struct FakeTransport {
    pub ping_delay: Duration,
    pub ping_fails: bool,
    pub chunk_size: usize,
    pub chunk_interval: Duration,
    // `None` streams forever
    pub download_chunks: Option<usize>,
    // index of the chunk replaced by an error
    pub download_error_at: Option<usize>,
    pub download_refused: bool,
    pub upload_delay: Duration,
    // index of the failing upload call
    pub upload_error_at: Option<usize>,
    pub geo: Option<GeoInfo>,
    pub pings: AtomicUsize,
    pub downloads: AtomicUsize,
    pub downloaded_bytes: Arc<AtomicU64>,
    pub uploads: AtomicUsize,
    pub uploaded_bytes: AtomicU64,
}

impl Default for FakeTransport {
    fn default() -> Self {
        Self {
            ping_delay: Duration::from_millis(20),
            ping_fails: false,
            chunk_size: 64 * 1024,
            chunk_interval: Duration::from_millis(100),
            download_chunks: None,
            download_error_at: None,
            download_refused: false,
            upload_delay: Duration::from_millis(100),
            upload_error_at: None,
            geo: None,
            pings: AtomicUsize::new(0),
            downloads: AtomicUsize::new(0),
            downloaded_bytes: Arc::new(AtomicU64::new(0)),
            uploads: AtomicUsize::new(0),
            uploaded_bytes: AtomicU64::new(0),
        }
    }
}

impl FakeTransport {
    pub fn downloaded(&self) -> u64 {
        self.downloaded_bytes.load(Ordering::SeqCst)
    }

    pub fn uploaded(&self) -> u64 {
        self.uploaded_bytes.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn ping(&self, _cache_buster: i64) -> Result<()> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.ping_delay).await;
        if self.ping_fails {
            return Err(SpeedTestError::Network("connection refused".into()));
        }
        Ok(())
    }

    async fn open_download(&self, _size: u64) -> Result<ByteStream> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        if self.download_refused {
            return Err(SpeedTestError::Status(503));
        }
        let chunk = Bytes::from(vec![0u8; self.chunk_size]);
        let interval = self.chunk_interval;
        let limit = self.download_chunks;
        let error_at = self.download_error_at;
        let counter = Arc::clone(&self.downloaded_bytes);

        let body = stream::unfold(0usize, move |index| {
            let chunk = chunk.clone();
            let counter = Arc::clone(&counter);
            async move {
                if limit.is_some_and(|limit| index >= limit) {
                    return None;
                }
                tokio::time::sleep(interval).await;
                if error_at == Some(index) {
                    return Some((Err(SpeedTestError::Network("connection reset".into())), index + 1));
                }
                counter.fetch_add(chunk.len() as u64, Ordering::SeqCst);
                Some((Ok(chunk), index + 1))
            }
        });
        Ok(body.boxed())
    }

    async fn upload(&self, body: Bytes) -> Result<()> {
        let index = self.uploads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.upload_delay).await;
        if self.upload_error_at == Some(index) {
            return Err(SpeedTestError::Status(500));
        }
        self.uploaded_bytes
            .fetch_add(body.len() as u64, Ordering::SeqCst);
        Ok(())
    }

    async fn geo_info(&self) -> Result<GeoInfo> {
        self.geo
            .clone()
            .ok_or_else(|| SpeedTestError::Network("geo service down".into()))
    }
}

pub fn client() -> ClientInfo {
    ClientInfo {
        ip: "203.0.113.7".into(),
        city: "Oslo".into(),
        country: "Norway".into(),
    }
}
