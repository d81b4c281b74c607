pub mod settings;

pub use settings::{AuditConfig, Config, ConfigError, ReleaseConfig};
