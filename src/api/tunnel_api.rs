// Host bridge: the string-contract control surface exposed to the app runtime.

use std::fs;
use std::path::Path;
use std::sync::{Arc, OnceLock};

use anyhow::Context;
use tracing::warn;

use crate::config::BridgeSettings;
use crate::controller::SessionController;
use crate::engine::ProcessEngineFactory;

/// Literal marker returned by every successful string-valued call.
pub const SUCCESS: &str = "success";
/// Prefix carried by every failed string-valued call.
pub const ERROR_PREFIX: &str = "error:";

const INVALID_HANDLE: i64 = -1;

struct Bridge {
    controller: SessionController,
    settings: BridgeSettings,
}

static BRIDGE: OnceLock<Bridge> = OnceLock::new();

fn bridge() -> &'static Bridge {
    BRIDGE.get_or_init(|| {
        let settings = BridgeSettings::default();
        let factory = Arc::new(ProcessEngineFactory::new(settings.clone()));
        Bridge {
            controller: SessionController::new(factory),
            settings,
        }
    })
}

fn status_string(result: crate::error::Result<()>) -> String {
    match result {
        Ok(()) => SUCCESS.to_string(),
        Err(e) => format!("{ERROR_PREFIX}{e}"),
    }
}

/// Start the engine with the given JSON config.
#[flutter_rust_bridge::frb(sync)]
pub fn start_proxy(config: String) -> String {
    status_string(bridge().controller.start(config.as_bytes()))
}

/// Stop the running engine.
#[flutter_rust_bridge::frb(sync)]
pub fn stop_proxy() -> String {
    status_string(bridge().controller.stop())
}

/// Whether the engine is currently running.
#[flutter_rust_bridge::frb(sync)]
pub fn proxy_running() -> bool {
    bridge().controller.status()
}

/// Start the engine in tunnel mode; -1 when the start is rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn start_tunnel(config: String) -> i64 {
    match bridge().controller.start_tunnel(config.as_bytes(), None) {
        Ok(handle) => handle,
        Err(e) => {
            warn!("tunnel start rejected: {}", e);
            INVALID_HANDLE
        }
    }
}

/// Start the engine in tunnel mode bound to a tun device descriptor.
#[flutter_rust_bridge::frb(sync)]
pub fn start_tunnel_with_fd(config: String, tun_fd: i32) -> i64 {
    match bridge().controller.start_tunnel(config.as_bytes(), Some(tun_fd)) {
        Ok(handle) => handle,
        Err(e) => {
            warn!("tunnel start rejected: {}", e);
            INVALID_HANDLE
        }
    }
}

/// Validate an inbound packet against a live session; 0 accepted, -1 rejected.
#[flutter_rust_bridge::frb(sync)]
pub fn submit_inbound_packet(handle: i64, packet: Vec<u8>, protocol: i32) -> i32 {
    match bridge().controller.submit_packet(handle, &packet, protocol) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Stop the tunnel session and the engine behind it.
#[flutter_rust_bridge::frb(sync)]
pub fn stop_tunnel(handle: i64) -> String {
    status_string(bridge().controller.stop_tunnel(handle))
}

/// Dispose a session handle without touching the engine.
#[flutter_rust_bridge::frb(sync)]
pub fn release_tunnel(handle: i64) -> String {
    status_string(bridge().controller.release_tunnel(handle))
}

/// Start the engine for a named node from `<name>.json` in the node config directory.
#[flutter_rust_bridge::frb(sync)]
pub fn start_node_service(name: String) -> String {
    let path = bridge()
        .settings
        .node_config_dir
        .join(format!("{name}.json"));
    status_string(bridge().controller.start_named(&name, move || {
        fs::read(&path).with_context(|| format!("read node config {}", path.display()))
    }))
}

/// Stop the engine on behalf of a named node.
#[flutter_rust_bridge::frb(sync)]
pub fn stop_node_service(name: String) -> String {
    status_string(bridge().controller.stop_named(&name))
}

/// Whether the named node currently holds a running engine.
#[flutter_rust_bridge::frb(sync)]
pub fn check_node_status(name: String) -> bool {
    bridge().controller.status_named(&name)
}

/// Write the three provisioning config files, creating parent directories.
#[flutter_rust_bridge::frb(sync)]
pub fn write_config_files(
    engine_path: String,
    engine_content: String,
    service_path: String,
    service_content: String,
    vpn_path: String,
    vpn_content: String,
    _password: String,
) -> String {
    let files = [
        (engine_path, engine_content),
        (service_path, service_content),
        (vpn_path, vpn_content),
    ];
    for (path, content) in &files {
        if let Err(e) = write_one(path, content) {
            return format!("{ERROR_PREFIX}{e:#}");
        }
    }
    SUCCESS.to_string()
}

fn write_one(path: &str, content: &str) -> anyhow::Result<()> {
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config directory {}", parent.display()))?;
        }
    }
    fs::write(path, content).with_context(|| format!("write config file {}", path.display()))
}
