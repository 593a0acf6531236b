//! Command implementations

pub mod agent;
pub mod publish;
pub mod version;
