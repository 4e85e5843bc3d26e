use crate::connectivity::StateHandle;
use crate::indicator::{self, Indicator};
use crate::registry::ViewerRegistry;
use crate::serial::{SerialError, SerialPeer};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Rate change requested by the control endpoint. It is parked here and
/// applied at the top of the next poll cycle so an in-flight relay is
/// never disturbed. Zero means no change pending.
#[derive(Default)]
pub struct PendingBaud(AtomicU32);

impl PendingBaud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self, rate: u32) {
        self.0.store(rate, Ordering::Release);
    }

    fn take(&self) -> Option<u32> {
        match self.0.swap(0, Ordering::AcqRel) {
            0 => None,
            rate => Some(rate),
        }
    }
}

/// Timestamp of the last byte relayed in either direction. Drives the
/// idle/active signal only; correctness never depends on it.
#[derive(Clone)]
pub struct Activity {
    last: Arc<RwLock<Instant>>,
}

impl Activity {
    pub fn new() -> Self {
        Self {
            last: Arc::new(RwLock::new(Instant::now())),
        }
    }

    pub fn stamp(&self) {
        *self.last.write().unwrap() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last.read().unwrap().elapsed()
    }
}

impl Default for Activity {
    fn default() -> Self {
        Self::new()
    }
}

/// Relays bytes between the serial peer and the connected viewers.
///
/// Serial→network runs on the poll cycle and passes through the replay
/// ring; network→serial is written straight through with no caching.
/// Both directions are gated on the Connected state.
pub struct Bridge {
    serial: Arc<dyn SerialPeer>,
    registry: Arc<ViewerRegistry>,
    state: StateHandle,
    indicator: Arc<dyn Indicator>,
    pending_baud: Arc<PendingBaud>,
    activity: Activity,
}

impl Bridge {
    pub fn new(
        serial: Arc<dyn SerialPeer>,
        registry: Arc<ViewerRegistry>,
        state: StateHandle,
        indicator: Arc<dyn Indicator>,
        pending_baud: Arc<PendingBaud>,
        activity: Activity,
    ) -> Self {
        Self {
            serial,
            registry,
            state,
            indicator,
            pending_baud,
            activity,
        }
    }

    /// One poll cycle: apply a pending rate change, then drain whatever
    /// the serial peer has emitted as a single chunk and broadcast it.
    /// Serial errors are logged and survived; the next cycle retries.
    pub fn poll_once(&self) {
        if !self.state.is_connected() {
            return;
        }
        if let Some(rate) = self.pending_baud.take() {
            match self.serial.set_baud(rate) {
                Ok(()) => info!(rate, "serial rate reconfigured"),
                Err(err) => warn!(rate, error = %err, "serial rate change failed"),
            }
        }
        let chunk = match self.serial.read_available() {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(error = %err, "serial read failed");
                return;
            }
        };
        if chunk.is_empty() {
            return;
        }
        self.registry.broadcast(&chunk);
        self.indicator.pulse(indicator::TRAFFIC);
        self.activity.stamp();
    }

    /// The viewer→serial direction: written straight through, not cached.
    pub fn write_to_serial(&self, data: &[u8]) -> Result<(), SerialError> {
        if !self.state.is_connected() {
            debug!("dropping viewer input while link is down");
            return Ok(());
        }
        self.serial.write_all(data)?;
        self.activity.stamp();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectionState;
    use crate::indicator::NullIndicator;
    use crate::serial::MockSerialPeer;
    use tokio::sync::mpsc;

    fn bridge_with(serial: Arc<MockSerialPeer>, connected: bool) -> (Bridge, Arc<ViewerRegistry>) {
        let registry = Arc::new(ViewerRegistry::new(2000, 5));
        let state = StateHandle::new();
        if connected {
            state.set(ConnectionState::Connected);
        }
        let bridge = Bridge::new(
            serial,
            registry.clone(),
            state,
            Arc::new(NullIndicator),
            Arc::new(PendingBaud::new()),
            Activity::new(),
        );
        (bridge, registry)
    }

    #[tokio::test]
    async fn poll_drains_serial_into_ring_and_viewers() {
        let serial = Arc::new(MockSerialPeer::new());
        let (bridge, registry) = bridge_with(serial.clone(), true);
        let (tx, mut rx) = mpsc::unbounded_channel();
        registry.join(tx).unwrap();
        rx.recv().await.unwrap(); // replay frame

        serial.emit(b"boot ok\r\n");
        bridge.poll_once();

        assert_eq!(rx.recv().await.unwrap(), b"boot ok\r\n");
        assert_eq!(registry.replay_len(), 9);
    }

    #[tokio::test]
    async fn poll_relays_nothing_while_disconnected() {
        let serial = Arc::new(MockSerialPeer::new());
        let (bridge, registry) = bridge_with(serial.clone(), false);

        serial.emit(b"secret boot log");
        bridge.poll_once();

        assert_eq!(registry.replay_len(), 0);
    }

    #[tokio::test]
    async fn pending_rate_applies_on_next_cycle() {
        let serial = Arc::new(MockSerialPeer::new());
        let (bridge, _registry) = bridge_with(serial.clone(), true);

        bridge.pending_baud.request(9600);
        assert_eq!(serial.baud(), 0, "rate must not change mid-cycle");
        bridge.poll_once();
        assert_eq!(serial.baud(), 9600);

        // Applied once, not re-applied every cycle.
        serial.set_baud(115_200).unwrap();
        bridge.poll_once();
        assert_eq!(serial.baud(), 115_200);
    }

    #[tokio::test]
    async fn viewer_input_reaches_the_serial_peer() {
        let serial = Arc::new(MockSerialPeer::new());
        let (bridge, _registry) = bridge_with(serial.clone(), true);

        bridge.write_to_serial(b"reboot\n").unwrap();
        assert_eq!(serial.written(), b"reboot\n");
    }

    #[tokio::test]
    async fn viewer_input_is_dropped_while_disconnected() {
        let serial = Arc::new(MockSerialPeer::new());
        let (bridge, _registry) = bridge_with(serial.clone(), false);

        bridge.write_to_serial(b"reboot\n").unwrap();
        assert!(serial.written().is_empty());
    }
}
