//! TOML configuration for the `sdxmltv` binary.
//!
//! Provider credentials, guide settings and the static channel map, plus
//! the rules for finding the file (`--dir`, then the XDG config home).

#[allow(clippy::module_inception)]
mod config;
mod paths;

#[allow(clippy::module_name_repetitions)]
pub use config::AppConfig;
pub use paths::resolve_config_path;
