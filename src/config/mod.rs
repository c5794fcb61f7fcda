/// Database configuration and connection management
pub mod database;

/// Dashboard configuration loading from dashboard.toml
pub mod dashboard;
