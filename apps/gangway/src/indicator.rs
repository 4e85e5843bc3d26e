use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// A pulse train: `pulses` flashes of `on` followed by `off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub pulses: u8,
    pub on: Duration,
    pub off: Duration,
}

impl Pattern {
    pub const fn new(pulses: u8, on_ms: u64, off_ms: u64) -> Self {
        Self {
            pulses,
            on: Duration::from_millis(on_ms),
            off: Duration::from_millis(off_ms),
        }
    }
}

// Fast flicker = waiting to be paired, slow quad = association started,
// twin slow pulses = still associating, quick double blink = traffic.
pub const PROVISIONING: Pattern = Pattern::new(10, 50, 50);
pub const ASSOCIATION_START: Pattern = Pattern::new(4, 125, 125);
pub const ASSOCIATION_RETRY: Pattern = Pattern::new(2, 125, 125);
pub const TRAFFIC: Pattern = Pattern::new(2, 20, 20);

/// Visual status output. Fire-and-forget: `pulse` must not block the
/// caller, and a pattern that cannot be displayed is dropped silently.
pub trait Indicator: Send + Sync {
    fn pulse(&self, pattern: Pattern);
}

/// Drives a board LED through its sysfs brightness file.
///
/// Overlapping requests are dropped rather than queued, so a burst of
/// traffic pulses cannot delay a provisioning pattern by minutes.
pub struct SysfsLed {
    brightness: PathBuf,
    busy: Arc<AtomicBool>,
}

impl SysfsLed {
    pub fn new(brightness: PathBuf) -> Self {
        Self {
            brightness,
            busy: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl Indicator for SysfsLed {
    fn pulse(&self, pattern: Pattern) {
        if self.busy.swap(true, Ordering::AcqRel) {
            return;
        }
        let path = self.brightness.clone();
        let busy = self.busy.clone();
        tokio::spawn(async move {
            for _ in 0..pattern.pulses {
                if let Err(err) = std::fs::write(&path, b"1") {
                    warn!(path = %path.display(), error = %err, "led write failed");
                    break;
                }
                tokio::time::sleep(pattern.on).await;
                if std::fs::write(&path, b"0").is_err() {
                    break;
                }
                tokio::time::sleep(pattern.off).await;
            }
            busy.store(false, Ordering::Release);
        });
    }
}

/// Fallback when no LED is configured: the pattern lands in the logs.
pub struct LogIndicator;

impl Indicator for LogIndicator {
    fn pulse(&self, pattern: Pattern) {
        debug!(
            pulses = pattern.pulses,
            on_ms = pattern.on.as_millis() as u64,
            off_ms = pattern.off.as_millis() as u64,
            "indicator pulse"
        );
    }
}

/// Discards every pattern.
pub struct NullIndicator;

impl Indicator for NullIndicator {
    fn pulse(&self, _pattern: Pattern) {}
}
