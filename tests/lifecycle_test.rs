// Integration tests for engine lifecycle control.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;

use anyhow::bail;

use packet_tunnel_core::{EngineFactory, EngineHandle, Error, SessionController};

const CFG: &[u8] = b"{}";

/// Engine double that counts starts and closes and can be told to fail.
#[derive(Default)]
struct FakeFactory {
    starts: AtomicUsize,
    closes: Arc<AtomicUsize>,
    fail_start: AtomicBool,
    fail_close: Arc<AtomicBool>,
}

impl FakeFactory {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl EngineFactory for FakeFactory {
    fn validate(&self, config: &[u8]) -> anyhow::Result<()> {
        if config.is_empty() {
            bail!("empty config");
        }
        Ok(())
    }

    fn start(&self, _config: &[u8]) -> anyhow::Result<Box<dyn EngineHandle>> {
        if self.fail_start.load(Ordering::Relaxed) {
            bail!("engine refused to start");
        }
        self.starts.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(FakeEngine {
            closes: self.closes.clone(),
            fail_close: self.fail_close.clone(),
        }))
    }
}

struct FakeEngine {
    closes: Arc<AtomicUsize>,
    fail_close: Arc<AtomicBool>,
}

impl EngineHandle for FakeEngine {
    fn close(&mut self) -> anyhow::Result<()> {
        if self.fail_close.load(Ordering::Relaxed) {
            bail!("engine stuck");
        }
        self.closes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[test]
fn test_start_status_stop() {
    let factory = FakeFactory::new();
    let controller = SessionController::new(factory.clone());

    assert!(!controller.status());
    controller.start(CFG).unwrap();
    assert!(controller.status());
    assert_eq!(factory.starts.load(Ordering::Relaxed), 1);

    controller.stop().unwrap();
    assert!(!controller.status());
    assert_eq!(factory.closes.load(Ordering::Relaxed), 1);
}

#[test]
fn test_double_start_rejected() {
    let factory = FakeFactory::new();
    let controller = SessionController::new(factory.clone());

    controller.start(CFG).unwrap();
    let err = controller.start(CFG).unwrap_err();
    assert!(matches!(err, Error::AlreadyRunning));
    assert_eq!(factory.starts.load(Ordering::Relaxed), 1);
}

#[test]
fn test_stop_when_idle_rejected() {
    let controller = SessionController::new(FakeFactory::new());
    let err = controller.stop().unwrap_err();
    assert!(matches!(err, Error::NotRunning));
}

#[test]
fn test_second_stop_rejected() {
    let factory = FakeFactory::new();
    let controller = SessionController::new(factory.clone());

    controller.start(CFG).unwrap();
    controller.stop().unwrap();
    let err = controller.stop().unwrap_err();
    assert!(matches!(err, Error::NotRunning));
    assert_eq!(factory.closes.load(Ordering::Relaxed), 1);
}

#[test]
fn test_concurrent_starts_have_one_winner() {
    let factory = FakeFactory::new();
    let controller = Arc::new(SessionController::new(factory.clone()));
    let barrier = Arc::new(Barrier::new(8));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let controller = controller.clone();
        let barrier = barrier.clone();
        handles.push(thread::spawn(move || {
            barrier.wait();
            controller.start(CFG)
        }));
    }

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in &results {
        if let Err(e) = result {
            assert!(matches!(e, Error::AlreadyRunning));
        }
    }

    assert_eq!(factory.starts.load(Ordering::Relaxed), 1);
    assert!(controller.status());
}

#[test]
fn test_invalid_config_leaves_engine_idle() {
    let factory = FakeFactory::new();
    let controller = SessionController::new(factory.clone());

    let err = controller.start(b"").unwrap_err();
    assert!(matches!(err, Error::Config(_)));
    assert!(!controller.status());
    assert_eq!(factory.starts.load(Ordering::Relaxed), 0);

    // The failed attempt must not poison later starts.
    controller.start(CFG).unwrap();
    assert!(controller.status());
}

#[test]
fn test_start_failure_surfaces_engine_message() {
    let factory = FakeFactory::new();
    let controller = SessionController::new(factory.clone());

    factory.fail_start.store(true, Ordering::Relaxed);
    let err = controller.start(CFG).unwrap_err();
    assert!(matches!(err, Error::EngineStart(_)));
    assert!(err.to_string().contains("engine refused to start"));
    assert!(!controller.status());

    factory.fail_start.store(false, Ordering::Relaxed);
    controller.start(CFG).unwrap();
}

#[test]
fn test_failed_close_keeps_handle_for_retry() {
    let factory = FakeFactory::new();
    let controller = SessionController::new(factory.clone());

    controller.start(CFG).unwrap();
    factory.fail_close.store(true, Ordering::Relaxed);

    let err = controller.stop().unwrap_err();
    assert!(matches!(err, Error::EngineStop(_)));
    assert!(controller.status());

    factory.fail_close.store(false, Ordering::Relaxed);
    controller.stop().unwrap();
    assert!(!controller.status());
    assert_eq!(factory.closes.load(Ordering::Relaxed), 1);
}
