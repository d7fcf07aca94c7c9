pub mod loader;
pub mod schema;

pub use loader::{
    apply_env_overrides, load_config, load_config_from_str, ENV_DATABASE_PATH, ENV_LOG,
};
pub use schema::{LogFormat, LoggingConfig, QueueConfig, ReviewConfig};
