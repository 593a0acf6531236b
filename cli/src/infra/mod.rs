//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, service
//! control, HTTP, archives, and filesystem access.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod archive;
pub mod clock;
pub mod command_runner;
pub mod config;
pub mod fs;
pub mod git;
pub mod http;
pub mod service;
pub mod signal;
pub mod state;
