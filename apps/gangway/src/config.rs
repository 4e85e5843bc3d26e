use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub serial_device: String,
    pub baud_rate: u32,
    pub replay_capacity: usize,
    pub max_viewers: usize,
    pub wireless_ifname: String,
    pub credentials_path: PathBuf,
    pub provision_path: PathBuf,
    pub assoc_timeout_secs: u64,
    pub assoc_poll_ms: u64,
    pub poll_interval_ms: u64,
    pub led_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Self {
        let replay_capacity = env::var("GANGWAY_REPLAY_CAPACITY")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(2000); // one conventional 80x25 terminal screen
        let max_viewers = env::var("GANGWAY_MAX_VIEWERS")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(5);
        let assoc_timeout_secs = env::var("GANGWAY_ASSOC_TIMEOUT")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(30);
        let assoc_poll_ms = env::var("GANGWAY_ASSOC_POLL_MS")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(500);
        let poll_interval_ms = env::var("GANGWAY_POLL_INTERVAL_MS")
            .ok()
            .and_then(|val| val.parse().ok())
            .unwrap_or(20);
        let led_path = env::var("GANGWAY_LED").ok().map(PathBuf::from);

        Self {
            port: env::var("GANGWAY_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            serial_device: env::var("GANGWAY_SERIAL_DEVICE")
                .unwrap_or_else(|_| "/dev/ttyUSB0".to_string()),
            baud_rate: env::var("GANGWAY_BAUD")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(115_200),
            replay_capacity,
            max_viewers,
            wireless_ifname: env::var("GANGWAY_WIFI_IFNAME")
                .unwrap_or_else(|_| "wlan0".to_string()),
            credentials_path: env::var("GANGWAY_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/var/lib/gangway/credentials.json")),
            provision_path: env::var("GANGWAY_PROVISION_DROP")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("/boot/gangway-provision.json")),
            assoc_timeout_secs,
            assoc_poll_ms,
            poll_interval_ms,
            led_path,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            serial_device: "/dev/ttyUSB0".to_string(),
            baud_rate: 115_200,
            replay_capacity: 2000,
            max_viewers: 5,
            wireless_ifname: "wlan0".to_string(),
            credentials_path: PathBuf::from("/var/lib/gangway/credentials.json"),
            provision_path: PathBuf::from("/boot/gangway-provision.json"),
            assoc_timeout_secs: 30,
            assoc_poll_ms: 500,
            poll_interval_ms: 20,
            led_path: None,
        }
    }
}
