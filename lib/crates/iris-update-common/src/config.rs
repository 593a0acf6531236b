use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Distribution server configuration, read from `IRIS_UPDATE_*` env vars.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:5051)
    #[serde(default = "default_listen_addr")]
    pub listen_addr: SocketAddr,

    /// Release Store written by the publisher (default: state.json)
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Directory holding `irispanel-<version>.tar.gz` artifacts (default: releases)
    #[serde(default = "default_releases_dir")]
    pub releases_dir: PathBuf,
}

fn default_listen_addr() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5051))
}

fn default_state_file() -> PathBuf {
    PathBuf::from("state.json")
}

fn default_releases_dir() -> PathBuf {
    PathBuf::from("releases")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            state_file: default_state_file(),
            releases_dir: default_releases_dir(),
        }
    }
}
