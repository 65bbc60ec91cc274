use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::speedtest::transport::Transport;

const UNAVAILABLE: &str = "unavailable";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientInfo {
    #[serde(default)]
    pub ip: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub country: String,
}

impl ClientInfo {
    pub fn unavailable() -> Self {
        Self {
            ip: UNAVAILABLE.into(),
            city: String::new(),
            country: UNAVAILABLE.into(),
        }
    }
}

impl fmt::Display for ClientInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {})", self.ip, self.city, self.country)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeoInfo {
    pub user: ClientInfo,
    pub server: ClientInfo,
}

impl GeoInfo {
    pub fn unavailable() -> Self {
        Self {
            user: ClientInfo::unavailable(),
            server: ClientInfo::unavailable(),
        }
    }
}

pub async fn lookup(transport: &dyn Transport) -> (GeoInfo, bool) {
    match transport.geo_info().await {
        Ok(info) => (info, true),
        Err(err) => {
            warn!("geo lookup failed: {err}");
            (GeoInfo::unavailable(), false)
        }
    }
}
