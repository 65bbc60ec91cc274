use std::{fs, path::Path};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, SpeedTestError};

pub const MIN_DURATION_SECS: u64 = 1;
pub const MAX_DURATION_SECS: u64 = 60;
pub const MIN_DOWNLOAD_MIB: u64 = 1;
pub const MAX_DOWNLOAD_MIB: u64 = 64;
pub const MIN_UPLOAD_CHUNK_KIB: usize = 64;
pub const MAX_UPLOAD_CHUNK_KIB: usize = 4096;

const MIB: u64 = 1024 * 1024;
const KIB: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub duration_secs: u64,
    pub download_size_mib: u64,
    pub upload_chunk_kib: usize,
    pub ping_timeout_secs: u64,
    pub log_level: String,
    pub log_file: String,
    pub report_file: Option<String>,
    pub webhook_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".into(),
            duration_secs: 10,
            download_size_mib: 16,
            upload_chunk_kib: 256,
            ping_timeout_secs: 5,
            log_level: "info".into(),
            log_file: "prospeed.log".into(),
            report_file: None,
            webhook_url: None,
        }
    }
}

impl Settings {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            SpeedTestError::Config(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            SpeedTestError::Config(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    // An unreadable or invalid file yields the defaults plus the reason.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<SpeedTestError>) {
        let loaded = Self::from_file(path).and_then(|settings| {
            settings.validate()?;
            Ok(settings)
        });
        match loaded {
            Ok(settings) => (settings, None),
            Err(err) => (Self::default(), Some(err)),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(MIN_DURATION_SECS..=MAX_DURATION_SECS).contains(&self.duration_secs) {
            return Err(SpeedTestError::Config(format!(
                "duration_secs must be between {MIN_DURATION_SECS} and {MAX_DURATION_SECS}, got {}",
                self.duration_secs
            )));
        }
        if !(MIN_DOWNLOAD_MIB..=MAX_DOWNLOAD_MIB).contains(&self.download_size_mib) {
            return Err(SpeedTestError::Config(format!(
                "download_size_mib must be between {MIN_DOWNLOAD_MIB} and {MAX_DOWNLOAD_MIB}, got {}",
                self.download_size_mib
            )));
        }
        if !(MIN_UPLOAD_CHUNK_KIB..=MAX_UPLOAD_CHUNK_KIB).contains(&self.upload_chunk_kib) {
            return Err(SpeedTestError::Config(format!(
                "upload_chunk_kib must be between {MIN_UPLOAD_CHUNK_KIB} and {MAX_UPLOAD_CHUNK_KIB}, got {}",
                self.upload_chunk_kib
            )));
        }
        if self.ping_timeout_secs == 0 {
            return Err(SpeedTestError::Config("ping_timeout_secs must be positive".into()));
        }
        self.server()?;
        if let Some(webhook) = &self.webhook_url {
            Url::parse(webhook).map_err(|err| {
                SpeedTestError::Config(format!("invalid webhook_url '{webhook}': {err}"))
            })?;
        }
        Ok(())
    }

    pub fn server(&self) -> Result<Url> {
        Url::parse(&self.server_url).map_err(|err| {
            SpeedTestError::Config(format!("invalid server_url '{}': {err}", self.server_url))
        })
    }

    // Clamped so an unvalidated value can neither overflow nor allocate without bound.
    pub fn download_size_bytes(&self) -> u64 {
        self.download_size_mib.clamp(MIN_DOWNLOAD_MIB, MAX_DOWNLOAD_MIB) * MIB
    }

    pub fn upload_chunk_bytes(&self) -> usize {
        self.upload_chunk_kib.clamp(MIN_UPLOAD_CHUNK_KIB, MAX_UPLOAD_CHUNK_KIB) * KIB
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    Duration,
    DownloadSize,
    UploadChunk,
}

impl SettingsField {
    pub fn next(self) -> Self {
        match self {
            SettingsField::Duration => SettingsField::DownloadSize,
            SettingsField::DownloadSize => SettingsField::UploadChunk,
            SettingsField::UploadChunk => SettingsField::Duration,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            SettingsField::Duration => SettingsField::UploadChunk,
            SettingsField::DownloadSize => SettingsField::Duration,
            SettingsField::UploadChunk => SettingsField::DownloadSize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_server_limits() {
        let settings = Settings::default();
        assert_eq!(settings.download_size_bytes(), 16_777_216);
        assert_eq!(settings.upload_chunk_bytes(), 262_144);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "server_url = \"https://speed.example.net\"").unwrap();
        writeln!(file, "duration_secs = 5").unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.server_url, "https://speed.example.net");
        assert_eq!(settings.duration_secs, 5);
        assert_eq!(settings.upload_chunk_kib, 256);
    }

    #[test]
    fn invalid_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "duration_secs = 0").unwrap();
        writeln!(file, "server_url = \"https://speed.example.net\"").unwrap();

        let (settings, problem) = Settings::load_or_default(file.path());
        assert_eq!(settings, Settings::default());
        assert!(matches!(problem, Some(SpeedTestError::Config(_))));

        let (settings, problem) = Settings::load_or_default("/nonexistent/prospeed.toml");
        assert_eq!(settings, Settings::default());
        assert!(problem.is_some());
    }

    #[test]
    fn valid_file_is_loaded_without_problem() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "duration_secs = 7").unwrap();

        let (settings, problem) = Settings::load_or_default(file.path());
        assert_eq!(settings.duration_secs, 7);
        assert!(problem.is_none());
    }

    #[test]
    fn rejects_out_of_range_duration() {
        let settings = Settings {
            duration_secs: 0,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(SpeedTestError::Config(_))));

        let settings = Settings {
            duration_secs: MAX_DURATION_SECS + 1,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_transfer_sizes() {
        let settings = Settings {
            download_size_mib: u64::MAX / 1024,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(SpeedTestError::Config(_))));
        assert_eq!(settings.download_size_bytes(), MAX_DOWNLOAD_MIB * MIB);

        let settings = Settings {
            upload_chunk_kib: 67_108_864,
            ..Settings::default()
        };
        assert!(matches!(settings.validate(), Err(SpeedTestError::Config(_))));
        assert_eq!(settings.upload_chunk_bytes(), MAX_UPLOAD_CHUNK_KIB * KIB);

        let settings = Settings {
            upload_chunk_kib: 16,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            download_size_mib: MAX_DOWNLOAD_MIB,
            upload_chunk_kib: MIN_UPLOAD_CHUNK_KIB,
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn rejects_unparseable_urls() {
        let settings = Settings {
            server_url: "not a url".into(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            webhook_url: Some("::".into()),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Settings::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.to_string().contains("unable to read config file"));
    }
}
