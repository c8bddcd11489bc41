//! Layered configuration loading
//!
//! Priority (highest to lowest):
//! 1. Environment variables (prefixed, `__` separates nested keys)
//! 2. Explicit config file (YAML/TOML/JSON by extension)
//! 3. Serialized defaults

use std::path::Path;

use errors::{GridgenError, GridgenResult};
use figment::{
    providers::{Env, Format, Json, Serialized, Toml, Yaml},
    Figment,
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

/// Build the figment without extracting it
pub fn layered_figment<T>(
    defaults: &T,
    file: Option<&Path>,
    env_prefix: &str,
) -> GridgenResult<Figment>
where
    T: Serialize,
{
    let mut figment = Figment::from(Serialized::defaults(defaults));

    if let Some(path) = file {
        if !path.is_file() {
            return Err(GridgenError::config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }

        let extension = path
            .extension()
            .and_then(|s| s.to_str())
            .ok_or_else(|| GridgenError::config("Config file must have an extension"))?;

        figment = match extension {
            "yaml" | "yml" => figment.merge(Yaml::file(path)),
            "toml" => figment.merge(Toml::file(path)),
            "json" => figment.merge(Json::file(path)),
            _ => {
                return Err(GridgenError::config(format!(
                    "Unsupported config file format: {extension}"
                )))
            },
        };
        debug!("Config file: {}", path.display());
    }

    Ok(figment.merge(Env::prefixed(env_prefix).split("__")))
}

/// Load `T` from defaults, an optional file and prefixed environment variables
pub fn load_layered<T>(defaults: T, file: Option<&Path>, env_prefix: &str) -> GridgenResult<T>
where
    T: Serialize + DeserializeOwned,
{
    Ok(layered_figment(&defaults, file, env_prefix)?.extract()?)
}
