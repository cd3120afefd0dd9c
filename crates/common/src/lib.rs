//! Shared building blocks for the chaingate crates:
//! - **Configuration**: strongly typed application configuration (`config`).
//! - **Networks**: network id → database registry (`networks`).
//! - **Telemetry**: logging and tracing setup (`telemetry`).
pub mod config;
pub mod networks;
pub mod telemetry;
