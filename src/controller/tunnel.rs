// Tunnel session registry: handle allocation and the descriptor side channel.

use std::collections::HashMap;
use std::env;
use std::sync::atomic::{AtomicI64, Ordering};

use parking_lot::RwLock;
use tracing::debug;

use crate::config::TUN_DEVICE_FD_KEY;

/// One packet-tunnel session bound to the running engine.
pub struct TunnelSession {
    /// Host-provided tunnel device descriptor, if this session carries one.
    pub descriptor: Option<i32>,
}

/// Registry of live tunnel sessions keyed by opaque handle.
///
/// Handles come from a single shared counter, start at 1, strictly increase
/// and are never reused.
pub struct TunnelRegistry {
    seq: AtomicI64,
    sessions: RwLock<HashMap<i64, TunnelSession>>,
}

impl TunnelRegistry {
    pub fn new() -> Self {
        Self {
            seq: AtomicI64::new(0),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Allocate the next handle and store the session under it.
    pub fn register(&self, descriptor: Option<i32>) -> i64 {
        let handle = self.seq.fetch_add(1, Ordering::Relaxed) + 1;
        self.sessions
            .write()
            .insert(handle, TunnelSession { descriptor });
        debug!("tunnel session {} registered", handle);
        handle
    }

    pub fn contains(&self, handle: i64) -> bool {
        self.sessions.read().contains_key(&handle)
    }

    pub fn descriptor(&self, handle: i64) -> Option<i32> {
        self.sessions
            .read()
            .get(&handle)
            .and_then(|session| session.descriptor)
    }

    /// Remove the session; returns false when the handle was not registered.
    pub fn remove(&self, handle: i64) -> bool {
        self.sessions.write().remove(&handle).is_some()
    }
}

impl Default for TunnelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Environment alias the engine accepts alongside the canonical key.
pub fn normalize_env_name(key: &str) -> String {
    key.chars()
        .map(|c| match c {
            '.' | '-' => '_',
            c => c.to_ascii_uppercase(),
        })
        .collect()
}

/// Publish the tunnel descriptor where the engine reads it at startup.
///
/// Must happen before the engine starts; callers roll back with
/// [`clear_descriptor`] when the start fails.
pub fn publish_descriptor(fd: i32) {
    let value = fd.to_string();
    env::set_var(TUN_DEVICE_FD_KEY, &value);
    env::set_var(normalize_env_name(TUN_DEVICE_FD_KEY), &value);
}

/// Remove both descriptor keys from the process environment.
pub fn clear_descriptor() {
    env::remove_var(TUN_DEVICE_FD_KEY);
    env::remove_var(normalize_env_name(TUN_DEVICE_FD_KEY));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_env_name() {
        assert_eq!(normalize_env_name("tunnel.device.fd"), "TUNNEL_DEVICE_FD");
        assert_eq!(normalize_env_name("some-key.v2"), "SOME_KEY_V2");
        assert_eq!(normalize_env_name("PLAIN"), "PLAIN");
    }

    #[test]
    fn test_handles_increase_and_never_recycle() {
        let registry = TunnelRegistry::new();
        let h1 = registry.register(None);
        let h2 = registry.register(Some(7));
        assert_eq!(h1, 1);
        assert_eq!(h2, 2);
        assert_eq!(registry.descriptor(h2), Some(7));

        assert!(registry.remove(h1));
        let h3 = registry.register(None);
        assert_eq!(h3, 3);
        assert!(!registry.contains(h1));
        assert!(registry.contains(h2));
        assert!(registry.contains(h3));
    }
}
