//! Configuration management
//!
//! One TOML file, by default `<config dir>/shipyard/shipyard.toml`, with a
//! few environment overrides applied on load:
//! - `SHIPYARD_DEPLOY_TOKEN`: server-side deploy token
//! - `SHIPYARD_BIND`: listen address
//! - `SHIPYARD_STRATEGY`: `upload` or `cli`

pub mod parser;
pub mod paths;
pub mod schema;
pub mod store;

pub use parser::{parse_shipyard_toml, parse_shipyard_toml_str, to_toml};
pub use paths::default_config_path;
pub use schema::{
    CliConfig, DeployConfig, PipelineConfig, ServerConfig, ShipyardConfig, UploadConfig,
};
pub use store::{ConfigStore, ENV_BIND, ENV_DEPLOY_TOKEN, ENV_STRATEGY};
