// Session controller: the single writer of engine lifecycle state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, trace, warn};

use crate::controller::nodes::NodeRegistry;
use crate::controller::tunnel::{self, TunnelRegistry};
use crate::engine::traits::{EngineFactory, EngineHandle};
use crate::error::{Error, Result};

type EngineSlot = Option<Box<dyn EngineHandle>>;

/// Serializes every lifecycle transition of the one shared engine.
///
/// At most one engine instance exists per process. The slot lock covers all
/// start/stop paths; status queries and packet submission read the atomic
/// flag and the session registry without touching it.
pub struct SessionController {
    factory: Arc<dyn EngineFactory>,
    slot: Mutex<EngineSlot>,
    running: AtomicBool,
    nodes: NodeRegistry,
    tunnels: TunnelRegistry,
}

impl SessionController {
    pub fn new(factory: Arc<dyn EngineFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
            running: AtomicBool::new(false),
            nodes: NodeRegistry::new(),
            tunnels: TunnelRegistry::new(),
        }
    }

    /// Start the engine with the given config bytes.
    pub fn start(&self, config: &[u8]) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(Error::AlreadyRunning);
        }
        self.start_engine(&mut slot, config)?;
        info!("engine started");
        Ok(())
    }

    /// Stop the engine and reset all shared bookkeeping.
    ///
    /// On a failed close the handle is kept so the caller can retry.
    pub fn stop(&self) -> Result<()> {
        let mut slot = self.slot.lock();
        if slot.is_none() {
            return Err(Error::NotRunning);
        }
        self.close_engine(&mut slot)?;
        tunnel::clear_descriptor();
        self.nodes.clear();
        info!("engine stopped");
        Ok(())
    }

    /// Whether an engine instance is currently active.
    pub fn status(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    /// Start the engine on behalf of a named node, idempotently.
    ///
    /// A repeated start for the name that already holds the engine succeeds
    /// without touching the engine; a different name is refused while the
    /// engine runs.
    pub fn start_named<F>(&self, name: &str, load_config: F) -> Result<()>
    where
        F: FnOnce() -> anyhow::Result<Vec<u8>>,
    {
        let mut slot = self.slot.lock();
        if self.nodes.is_recorded(name) && slot.is_some() {
            debug!("node {} already active", name);
            return Ok(());
        }
        if slot.is_some() {
            return Err(Error::AlreadyRunning);
        }
        let config = load_config().map_err(Error::Config)?;
        self.start_engine(&mut slot, &config)?;
        self.nodes.record(name);
        info!("node {} started", name);
        Ok(())
    }

    /// Stop the engine on behalf of a named node.
    ///
    /// A stop by a name that was never recorded still shuts the engine down
    /// and wipes the registry, converging back to a consistent idle state.
    pub fn stop_named(&self, name: &str) -> Result<()> {
        let mut slot = self.slot.lock();
        if self.nodes.is_recorded(name) {
            if slot.is_some() {
                self.close_engine(&mut slot)?;
                tunnel::clear_descriptor();
                self.nodes.clear();
            }
            self.nodes.remove(name);
            info!("node {} stopped", name);
            Ok(())
        } else {
            if slot.is_some() {
                warn!("stop requested by unrecorded node {}, resetting engine state", name);
                self.close_engine(&mut slot)?;
                tunnel::clear_descriptor();
            }
            self.nodes.clear();
            Ok(())
        }
    }

    /// True only while the name is recorded and the engine is live.
    pub fn status_named(&self, name: &str) -> bool {
        self.nodes.is_recorded(name) && self.status()
    }

    /// Start the engine in tunnel mode and hand back a session handle.
    ///
    /// A descriptor, when given, must be positive and is published to the
    /// engine's environment keys before the start; a failed start rolls the
    /// keys back.
    pub fn start_tunnel(&self, config: &[u8], descriptor: Option<i32>) -> Result<i64> {
        if let Some(fd) = descriptor {
            if fd <= 0 {
                return Err(Error::InvalidArgument(
                    "tunnel descriptor must be positive".to_string(),
                ));
            }
        }

        let mut slot = self.slot.lock();
        if slot.is_some() {
            return Err(Error::AlreadyRunning);
        }

        if let Some(fd) = descriptor {
            tunnel::publish_descriptor(fd);
            debug!("tunnel descriptor {} published", fd);
        }
        if let Err(e) = self.start_engine(&mut slot, config) {
            if descriptor.is_some() {
                tunnel::clear_descriptor();
            }
            return Err(e);
        }

        let handle = self.tunnels.register(descriptor);
        info!("tunnel session {} started", handle);
        Ok(handle)
    }

    /// Accept an inbound packet for a live tunnel session.
    ///
    /// Delivery itself runs in the host packet-tunnel pipeline; this call
    /// only vouches that the session and engine are live.
    pub fn submit_packet(&self, handle: i64, packet: &[u8], protocol: i32) -> Result<()> {
        if handle <= 0 {
            return Err(Error::InvalidHandle);
        }
        if !self.tunnels.contains(handle) {
            return Err(Error::SessionNotFound);
        }
        if !self.status() {
            return Err(Error::NotRunning);
        }
        trace!(
            "inbound packet accepted handle={} len={} protocol={}",
            handle,
            packet.len(),
            protocol
        );
        Ok(())
    }

    /// Tear down a tunnel session together with the engine it started.
    pub fn stop_tunnel(&self, handle: i64) -> Result<()> {
        if handle <= 0 {
            return Err(Error::InvalidHandle);
        }
        let mut slot = self.slot.lock();
        if !self.tunnels.remove(handle) {
            return Err(Error::SessionNotFound);
        }
        let stopped = if slot.is_some() {
            self.close_engine(&mut slot)
        } else {
            Ok(())
        };
        // Keys go away even when the engine refuses to stop.
        tunnel::clear_descriptor();
        stopped?;
        self.nodes.clear();
        info!("tunnel session {} stopped", handle);
        Ok(())
    }

    /// Drop a session's bookkeeping without touching the engine.
    pub fn release_tunnel(&self, handle: i64) -> Result<()> {
        if handle <= 0 {
            return Err(Error::InvalidHandle);
        }
        self.tunnels.remove(handle);
        debug!("tunnel session {} released", handle);
        Ok(())
    }

    fn start_engine(&self, slot: &mut EngineSlot, config: &[u8]) -> Result<()> {
        self.factory.validate(config).map_err(Error::Config)?;
        let handle = self.factory.start(config).map_err(Error::EngineStart)?;
        *slot = Some(handle);
        self.running.store(true, Ordering::Relaxed);
        Ok(())
    }

    fn close_engine(&self, slot: &mut EngineSlot) -> Result<()> {
        if let Some(handle) = slot.as_mut() {
            handle.close().map_err(Error::EngineStop)?;
        }
        *slot = None;
        self.running.store(false, Ordering::Relaxed);
        Ok(())
    }
}
