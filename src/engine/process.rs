// Process engine backend: runs the tunnel engine as a supervised child process.

use std::fs;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::config::BridgeSettings;
use crate::engine::traits::{EngineFactory, EngineHandle};

static SCRATCH_SEQ: AtomicU64 = AtomicU64::new(0);

/// Launches the engine binary with a scratch config file and supervises it.
pub struct ProcessEngineFactory {
    settings: BridgeSettings,
}

impl ProcessEngineFactory {
    pub fn new(settings: BridgeSettings) -> Self {
        Self { settings }
    }
}

impl EngineFactory for ProcessEngineFactory {
    fn validate(&self, config: &[u8]) -> Result<()> {
        let value: serde_json::Value =
            serde_json::from_slice(config).context("engine config is not valid JSON")?;
        if !value.is_object() {
            bail!("engine config must be a JSON object");
        }
        Ok(())
    }

    fn start(&self, config: &[u8]) -> Result<Box<dyn EngineHandle>> {
        let seq = SCRATCH_SEQ.fetch_add(1, Ordering::Relaxed);
        let config_path = std::env::temp_dir().join(format!(
            "tunnel-engine-{}-{}.json",
            std::process::id(),
            seq
        ));
        fs::write(&config_path, config)
            .with_context(|| format!("write engine config {}", config_path.display()))?;

        let child = match Command::new(&self.settings.engine_binary)
            .arg("--config")
            .arg(&config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let _ = fs::remove_file(&config_path);
                return Err(e).with_context(|| {
                    format!("spawn engine binary {}", self.settings.engine_binary)
                });
            }
        };

        info!(
            "engine process started pid={} config={}",
            child.id(),
            config_path.display()
        );
        Ok(Box::new(ProcessEngineHandle { child, config_path }))
    }
}

pub struct ProcessEngineHandle {
    child: Child,
    config_path: PathBuf,
}

impl EngineHandle for ProcessEngineHandle {
    fn close(&mut self) -> Result<()> {
        self.child.kill().context("kill engine process")?;
        let status = self.child.wait().context("wait for engine process")?;
        debug!("engine process exited status={}", status);
        let _ = fs::remove_file(&self.config_path);
        Ok(())
    }
}

impl Drop for ProcessEngineHandle {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = fs::remove_file(&self.config_path);
    }
}
