use crate::indicator::{self, Indicator};
use crate::link::NetLink;
use crate::provision::Provisioner;
use crate::storage::CredentialStore;
use crate::storage::Credentials;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Where the device stands on the way to a usable network link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Associating,
    Connected,
    Provisioning,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Associating => "associating",
            ConnectionState::Connected => "connected",
            ConnectionState::Provisioning => "provisioning",
        };
        f.write_str(name)
    }
}

/// Shared read handle on the single process-wide connection state.
///
/// The [`ConnectivityManager`] is the only writer; the bridge and the
/// WebSocket layer read it to gate relaying.
#[derive(Clone)]
pub struct StateHandle {
    inner: Arc<RwLock<ConnectionState>>,
}

impl StateHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(ConnectionState::Disconnected)),
        }
    }

    pub fn get(&self) -> ConnectionState {
        *self.inner.read().unwrap()
    }

    pub fn is_connected(&self) -> bool {
        self.get() == ConnectionState::Connected
    }

    // Single-writer discipline: only the ConnectivityManager (and
    // in-crate tests) flips the state.
    pub(crate) fn set(&self, state: ConnectionState) {
        *self.inner.write().unwrap() = state;
    }
}

impl Default for StateHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Owns the network-interface lifecycle: associate with stored
/// credentials, fall back to provisioning when they are missing, invalid,
/// or time out, and re-enter the same machine whenever the watchdog sees
/// the link drop. Association failure is never fatal; everything degrades
/// toward provisioning.
pub struct ConnectivityManager {
    link: Arc<dyn NetLink>,
    provisioner: Arc<dyn Provisioner>,
    store: Arc<dyn CredentialStore>,
    indicator: Arc<dyn Indicator>,
    state: StateHandle,
    assoc_timeout: Duration,
    assoc_poll: Duration,
}

impl ConnectivityManager {
    pub fn new(
        link: Arc<dyn NetLink>,
        provisioner: Arc<dyn Provisioner>,
        store: Arc<dyn CredentialStore>,
        indicator: Arc<dyn Indicator>,
        assoc_timeout: Duration,
        assoc_poll: Duration,
    ) -> Self {
        Self {
            link,
            provisioner,
            store,
            indicator,
            state: StateHandle::new(),
            assoc_timeout,
            assoc_poll,
        }
    }

    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// Drives the machine until the link is usable. Returns only in the
    /// Connected state; the worst case is an indefinite human-paced wait
    /// inside provisioning.
    pub async fn ensure_connected(&self) {
        match self.store.load().filter(Credentials::is_usable) {
            Some(creds) => {
                self.state.set(ConnectionState::Associating);
                self.indicator.pulse(indicator::ASSOCIATION_START);
                info!(ssid = %creds.ssid, "associating with stored credentials");
                if self.try_associate(&creds).await {
                    self.state.set(ConnectionState::Connected);
                    info!(ssid = %creds.ssid, "link up");
                    return;
                }
                warn!(ssid = %creds.ssid, "association timed out, falling back to provisioning");
            }
            None => {
                info!("no usable credentials stored, entering provisioning");
            }
        }
        self.provision().await;
    }

    /// The periodic health check, invoked from the poll loop. When the
    /// link has dropped this re-enters the state machine synchronously:
    /// the caller is stalled until the device is Connected again.
    pub async fn watchdog(&self) {
        if self.state.get() != ConnectionState::Connected {
            return;
        }
        if self.link.link_up().await {
            return;
        }
        warn!("link lost, re-entering connection state machine");
        self.state.set(ConnectionState::Disconnected);
        self.ensure_connected().await;
    }

    /// One association pass: issue the command, then poll the link until
    /// it comes up or the window closes.
    async fn try_associate(&self, creds: &Credentials) -> bool {
        if let Err(err) = self.link.associate(creds).await {
            warn!(ssid = %creds.ssid, error = %err, "association command failed");
        }
        let deadline = Instant::now() + self.assoc_timeout;
        loop {
            if self.link.link_up().await {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            self.indicator.pulse(indicator::ASSOCIATION_RETRY);
            tokio::time::sleep(self.assoc_poll).await;
        }
    }

    /// Waits for a human to pair the device, persists what they taught it,
    /// and brings the link up with the learned credentials. No timeout:
    /// the machine stays here until pairing plus association succeed.
    async fn provision(&self) {
        self.state.set(ConnectionState::Provisioning);
        loop {
            self.indicator.pulse(indicator::PROVISIONING);
            let creds = match self.provisioner.pair().await {
                Ok(creds) => creds,
                Err(err) => {
                    warn!(error = %err, "pairing attempt failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };
            info!(ssid = %creds.ssid, "credentials learned via provisioning");
            if let Err(err) = self.store.save(&creds) {
                // Survivable: the session keeps the in-memory credentials
                // and the device re-provisions on the next restart.
                warn!(error = %err, "failed to persist learned credentials");
            }
            if self.try_associate(&creds).await {
                self.state.set(ConnectionState::Connected);
                info!(ssid = %creds.ssid, "link up");
                return;
            }
            warn!(ssid = %creds.ssid, "learned credentials failed to associate, waiting for a new pairing");
        }
    }
}
