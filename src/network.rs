use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    Ethernet,
    Wifi,
    Cellular,
    Other(String),
}

impl fmt::Display for NetworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkType::Ethernet => write!(f, "Ethernet"),
            NetworkType::Wifi => write!(f, "Wi-Fi"),
            NetworkType::Cellular => write!(f, "Cellular"),
            NetworkType::Other(name) => write!(f, "{name}"),
        }
    }
}

pub fn detect() -> Option<NetworkType> {
    if cfg!(target_os = "linux") {
        detect_in(Path::new("/sys/class/net"))
    } else {
        None
    }
}

fn detect_in(sys_net: &Path) -> Option<NetworkType> {
    let mut names: Vec<String> = std::fs::read_dir(sys_net)
        .ok()?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name != "lo")
        .collect();
    names.sort();

    let mut fallback = None;
    for name in names {
        let dir = sys_net.join(&name);
        let state = std::fs::read_to_string(dir.join("operstate")).unwrap_or_default();
        if state.trim() != "up" {
            continue;
        }
        let kind = classify(&dir, &name);
        // physical links win over tunnels and bridges
        if !matches!(kind, NetworkType::Other(_)) {
            return Some(kind);
        }
        fallback.get_or_insert(kind);
    }
    fallback
}

fn classify(dir: &Path, name: &str) -> NetworkType {
    if dir.join("wireless").exists() || dir.join("phy80211").exists() {
        NetworkType::Wifi
    } else if name.starts_with("wwan") || name.starts_with("rmnet") {
        NetworkType::Cellular
    } else if dir.join("device").exists() {
        NetworkType::Ethernet
    } else {
        NetworkType::Other(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn iface(root: &Path, name: &str, state: &str, markers: &[&str]) {
        let dir = root.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("operstate"), format!("{state}\n")).unwrap();
        for marker in markers {
            fs::create_dir_all(dir.join(marker)).unwrap();
        }
    }

    #[test]
    fn prefers_physical_link() {
        let root = tempfile::tempdir().unwrap();
        iface(root.path(), "lo", "unknown", &[]);
        iface(root.path(), "tun0", "up", &[]);
        iface(root.path(), "wlp2s0", "up", &["wireless", "device"]);

        assert_eq!(detect_in(root.path()), Some(NetworkType::Wifi));
    }

    #[test]
    fn ignores_down_interfaces() {
        let root = tempfile::tempdir().unwrap();
        iface(root.path(), "eth0", "down", &["device"]);
        iface(root.path(), "wwan0", "up", &[]);

        assert_eq!(detect_in(root.path()), Some(NetworkType::Cellular));
    }

    #[test]
    fn virtual_only_falls_back_to_name() {
        let root = tempfile::tempdir().unwrap();
        iface(root.path(), "docker0", "up", &[]);

        assert_eq!(
            detect_in(root.path()),
            Some(NetworkType::Other("docker0".into()))
        );
    }

    #[test]
    fn missing_sysfs_is_none() {
        assert_eq!(detect_in(Path::new("/no/such/sys/class/net")), None);
    }
}
