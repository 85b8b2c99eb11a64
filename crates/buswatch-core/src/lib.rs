//! Shared state and protocol rules for the Buswatch telemetry system.
//!
//! # Modules
//!
//! - [`registry`] -- In-memory store of the latest position of every bus
//! - [`validation`] -- Schema checks for inbound telemetry and viewport
//!   updates
//! - [`config`] -- YAML configuration with environment overrides

pub mod config;
pub mod registry;
pub mod validation;

pub use config::{BuswatchConfig, ConfigError};
pub use registry::PositionRegistry;
pub use validation::{ValidationErrors, validate_bounds, validate_telemetry};
