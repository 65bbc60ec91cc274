use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{stream::BoxStream, StreamExt, TryStreamExt};
use reqwest::header::{self, HeaderMap, HeaderValue};
use url::Url;

use crate::error::{Result, SpeedTestError};
use crate::geo::GeoInfo;

pub type ByteStream = BoxStream<'static, Result<Bytes>>;

#[async_trait]
pub trait Transport: Send + Sync {
    async fn ping(&self, cache_buster: i64) -> Result<()>;

    async fn open_download(&self, size: u64) -> Result<ByteStream>;

    async fn upload(&self, body: Bytes) -> Result<()>;

    async fn geo_info(&self) -> Result<GeoInfo>;
}

pub struct HttpTransport {
    client: reqwest::Client,
    base: Url,
}

impl HttpTransport {
    pub fn new(mut base: Url) -> Result<Self> {
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let mut headers = HeaderMap::new();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(10))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|err| SpeedTestError::Config(format!("bad endpoint '{path}': {err}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn ping(&self, cache_buster: i64) -> Result<()> {
        let mut url = self.endpoint("ping")?;
        url.query_pairs_mut()
            .append_pair("t", &cache_buster.to_string());
        self.client.get(url).send().await?.error_for_status()?;
        Ok(())
    }

    async fn open_download(&self, size: u64) -> Result<ByteStream> {
        let mut url = self.endpoint("download")?;
        url.query_pairs_mut().append_pair("size", &size.to_string());
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.bytes_stream().map_err(SpeedTestError::from).boxed())
    }

    async fn upload(&self, body: Bytes) -> Result<()> {
        let url = self.endpoint("upload")?;
        self.client
            .post(url)
            .header(header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn geo_info(&self) -> Result<GeoInfo> {
        let url = self.endpoint("get_geo_info")?;
        let info = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<GeoInfo>()
            .await?;
        Ok(info)
    }
}
