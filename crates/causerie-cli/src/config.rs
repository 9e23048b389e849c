//! Demo configuration loaded from environment variables.
//!
//! All settings have defaults so the binary runs with zero configuration.

use std::path::PathBuf;

use causerie_sync::WritePolicy;

#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Filesystem path where uploaded pictures land.
    /// Env: `BLOB_STORAGE_PATH`
    /// Default: `./blobs`
    pub blob_storage_path: PathBuf,

    /// List-append coordination: `serialized` or `last-write-wins`.
    /// Env: `WRITE_POLICY`
    /// Default: `serialized`
    pub write_policy: WritePolicy,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            blob_storage_path: PathBuf::from("./blobs"),
            write_policy: WritePolicy::Serialized,
        }
    }
}

impl CliConfig {
    /// Load configuration from environment variables, falling back to
    /// defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("BLOB_STORAGE_PATH") {
            config.blob_storage_path = PathBuf::from(path);
        }

        if let Ok(policy) = std::env::var("WRITE_POLICY") {
            match policy.as_str() {
                "serialized" => config.write_policy = WritePolicy::Serialized,
                "last-write-wins" => config.write_policy = WritePolicy::LastWriteWins,
                other => {
                    tracing::warn!(value = %other, "Unknown WRITE_POLICY, using default");
                }
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = CliConfig::default();
        assert_eq!(config.blob_storage_path, PathBuf::from("./blobs"));
        assert_eq!(config.write_policy, WritePolicy::Serialized);
    }
}
