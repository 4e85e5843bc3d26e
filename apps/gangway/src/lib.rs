//! Gangway bridges a serial console onto the network: serial output is
//! broadcast to WebSocket viewers (late joiners get a bounded replay of
//! the most recent screen), viewer text input is written back to the
//! serial peer, and a connectivity state machine keeps the device's
//! wireless link alive with an interactive provisioning fallback.

pub mod bridge;
pub mod cli;
pub mod config;
pub mod connectivity;
pub mod handlers;
pub mod indicator;
pub mod link;
pub mod provision;
pub mod registry;
pub mod serial;
pub mod storage;
pub mod websocket;
