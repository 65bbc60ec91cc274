pub mod host;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SpeedTestError};
use crate::geo::ClientInfo;
use crate::network::NetworkType;
use crate::speedtest::{Measurement, MeasurementKind};

pub use host::{FileHost, Host, NullHost, StdoutHost, WebhookHost};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub ping_ms: f64,
    pub download_mbps: f64,
    pub upload_mbps: f64,
    pub ping_ok: bool,
    pub download_ok: bool,
    pub upload_ok: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultPayload {
    pub ping: String,
    pub download: String,
    pub upload: String,
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_type: Option<NetworkType>,
    pub client_info: ClientInfo,
    pub full_log: String,
}

impl ResultPayload {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self)
            .map_err(|err| SpeedTestError::Host(format!("failed to encode results: {err}")))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|err| SpeedTestError::Host(format!("failed to decode results: {err}")))
    }

    pub fn summary_line(&self) -> String {
        format!(
            "TEST from IP: {}, Ping: {}, Download: {}, Upload: {}",
            self.client_info.ip, self.ping, self.download, self.upload
        )
    }
}

pub fn aggregate(
    ping: &Measurement,
    download: &Measurement,
    upload: &Measurement,
    client_info: &ClientInfo,
    network_type: Option<NetworkType>,
    log: &str,
) -> ResultPayload {
    debug_assert_eq!(ping.kind, MeasurementKind::Ping);
    debug_assert_eq!(download.kind, MeasurementKind::Download);
    debug_assert_eq!(upload.kind, MeasurementKind::Upload);

    ResultPayload {
        ping: ping.formatted(),
        download: download.formatted(),
        upload: upload.formatted(),
        metrics: Metrics {
            ping_ms: ping.rounded(),
            download_mbps: download.rounded(),
            upload_mbps: upload.rounded(),
            ping_ok: ping.is_ok(),
            download_ok: download.is_ok(),
            upload_ok: upload.is_ok(),
        },
        network_type,
        client_info: client_info.clone(),
        full_log: log.to_string(),
    }
}
