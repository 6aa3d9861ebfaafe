use std::env;
use std::path::PathBuf;

use serde::Deserialize;

/// Environment key the engine reads the tunnel device descriptor from.
pub const TUN_DEVICE_FD_KEY: &str = "tunnel.device.fd";

/// Environment variable overriding the engine binary launched by the process backend.
pub const ENGINE_BIN_ENV: &str = "TUNNEL_ENGINE_BIN";

/// Environment variable overriding the directory searched for per-node config files.
pub const NODE_DIR_ENV: &str = "TUNNEL_NODE_DIR";

/// Engine binary resolved through PATH when no override is set.
pub const DEFAULT_ENGINE_BIN: &str = "tunnel-engine";

/// Host-facing settings for the bridge layer.
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSettings {
    /// Binary launched by the process engine backend.
    pub engine_binary: String,
    /// Directory holding per-node engine configs, one `<name>.json` each.
    pub node_config_dir: PathBuf,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            engine_binary: env::var(ENGINE_BIN_ENV)
                .unwrap_or_else(|_| DEFAULT_ENGINE_BIN.to_string()),
            node_config_dir: env::var_os(NODE_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
        }
    }
}
