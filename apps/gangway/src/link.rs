use crate::storage::Credentials;
use anyhow::{bail, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::process::Command;
use tracing::debug;

/// The device's network interface, reduced to the two things the state
/// machine needs: kick off an association and report link liveness.
#[async_trait]
pub trait NetLink: Send + Sync {
    /// Starts associating with the given credentials. Returning `Ok` does
    /// not mean the link is up yet; callers poll [`NetLink::link_up`].
    async fn associate(&self, creds: &Credentials) -> Result<()>;

    /// Whether the interface currently has a usable link.
    async fn link_up(&self) -> bool;
}

/// Wireless interface managed through NetworkManager's CLI, with liveness
/// read straight from the kernel's operstate file.
pub struct NmcliLink {
    ifname: String,
    operstate: PathBuf,
}

impl NmcliLink {
    pub fn new(ifname: String) -> Self {
        let operstate = PathBuf::from(format!("/sys/class/net/{ifname}/operstate"));
        Self { ifname, operstate }
    }
}

#[async_trait]
impl NetLink for NmcliLink {
    async fn associate(&self, creds: &Credentials) -> Result<()> {
        // The secret goes on the command line, never into the logs.
        let status = Command::new("nmcli")
            .args([
                "device",
                "wifi",
                "connect",
                &creds.ssid,
                "password",
                &creds.secret,
                "ifname",
                &self.ifname,
            ])
            .kill_on_drop(true)
            .status()
            .await?;
        if !status.success() {
            bail!("nmcli exited with {status}");
        }
        Ok(())
    }

    async fn link_up(&self) -> bool {
        match tokio::fs::read_to_string(&self.operstate).await {
            Ok(state) => state.trim() == "up",
            Err(err) => {
                debug!(ifname = %self.ifname, error = %err, "operstate read failed");
                false
            }
        }
    }
}

/// A link with externally controlled liveness: wired deployments where the
/// interface is simply up, and tests that script link drops.
#[derive(Default)]
pub struct StaticLink {
    up: AtomicBool,
}

impl StaticLink {
    pub fn new(up: bool) -> Self {
        Self {
            up: AtomicBool::new(up),
        }
    }

    pub fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::Release);
    }
}

#[async_trait]
impl NetLink for StaticLink {
    async fn associate(&self, _creds: &Credentials) -> Result<()> {
        Ok(())
    }

    async fn link_up(&self) -> bool {
        self.up.load(Ordering::Acquire)
    }
}
