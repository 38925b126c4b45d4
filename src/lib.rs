pub mod cache;
pub mod configuration;
pub mod connectors;
pub mod forms;
pub mod models;
pub mod services;
pub mod startup;
pub mod telemetry;
