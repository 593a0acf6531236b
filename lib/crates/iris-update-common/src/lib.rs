//! Types shared by the iris-update publisher, distribution server and agent.

pub mod config;
pub mod release;
pub mod store;

pub use config::ServerConfig;
pub use release::{
    ARTIFACT_ROOT, Release, StoreState, VersionMismatch, artifact_file_name, is_valid_checksum,
    parse_artifact_version,
};
pub use store::{ReleaseStore, StoreError};
