use crate::protocol;
use std::time::Duration;

/// Tunables for opening and polling a headset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub vendor_id: u16,
    pub product_id: u16,
    /// HID interface numbers in polling order: HMD, status, controllers.
    pub interfaces: [u8; 3],
    pub keepalive_interval: Duration,
    /// Size of the buffer each non-blocking read fills. Raised to
    /// [`protocol::MIN_READ_BUFFER_SIZE`] when smaller.
    pub read_buffer_size: usize,
    /// Capacity of the channel created by [`crate::controller_channel`],
    /// at least 1.
    pub controller_queue: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            vendor_id: protocol::VID,
            product_id: protocol::PID,
            interfaces: [
                protocol::INTF_HMD,
                protocol::INTF_STATUS,
                protocol::INTF_CONTROLLERS,
            ],
            keepalive_interval: Duration::from_millis(1000),
            read_buffer_size: protocol::FEATURE_BUFFER_SIZE,
            controller_queue: 256,
        }
    }
}

impl SessionConfig {
    /// Defaults overridden by `RIFT_S_KEEPALIVE_MS`, `RIFT_S_READ_BUFFER`
    /// and `RIFT_S_CONTROLLER_QUEUE`.
    pub fn from_env() -> Self {
        let defaults = SessionConfig::default();
        let keepalive_ms = read_env_u64(
            "RIFT_S_KEEPALIVE_MS",
            defaults.keepalive_interval.as_millis() as u64,
        );
        let read_buffer_size = read_env_usize("RIFT_S_READ_BUFFER", defaults.read_buffer_size);
        if read_buffer_size < protocol::MIN_READ_BUFFER_SIZE {
            log::warn!(
                "RIFT_S_READ_BUFFER={} would truncate reports, using {}",
                read_buffer_size,
                protocol::MIN_READ_BUFFER_SIZE
            );
        }
        let controller_queue =
            read_env_usize("RIFT_S_CONTROLLER_QUEUE", defaults.controller_queue);
        if controller_queue == 0 {
            log::warn!("RIFT_S_CONTROLLER_QUEUE=0 would drop every report, using 1");
        }
        SessionConfig {
            keepalive_interval: Duration::from_millis(keepalive_ms),
            read_buffer_size: read_buffer_size.max(protocol::MIN_READ_BUFFER_SIZE),
            controller_queue: controller_queue.max(1),
            ..defaults
        }
    }
}

fn read_env_u64(name: &str, default: u64) -> u64 {
    match std::env::var(name) {
        Ok(v) => match v.trim().parse::<u64>() {
            Ok(parsed) => parsed,
            Err(_) => {
                log::warn!("Invalid {}='{}', using default {}", name, v, default);
                default
            }
        },
        Err(_) => default,
    }
}

fn read_env_usize(name: &str, default: usize) -> usize {
    read_env_u64(name, default as u64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.vendor_id, 0x2833);
        assert_eq!(cfg.product_id, 0x0051);
        assert_eq!(cfg.interfaces, [6, 7, 8]);
        assert_eq!(cfg.keepalive_interval, Duration::from_secs(1));
        assert_eq!(cfg.read_buffer_size, 256);
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("RIFT_S_KEEPALIVE_MS", "250");
        std::env::set_var("RIFT_S_CONTROLLER_QUEUE", "not-a-number");
        std::env::set_var("RIFT_S_READ_BUFFER", "64");
        let cfg = SessionConfig::from_env();
        std::env::set_var("RIFT_S_CONTROLLER_QUEUE", "0");
        let zero_queue = SessionConfig::from_env();
        std::env::remove_var("RIFT_S_KEEPALIVE_MS");
        std::env::remove_var("RIFT_S_CONTROLLER_QUEUE");
        std::env::remove_var("RIFT_S_READ_BUFFER");

        assert_eq!(cfg.keepalive_interval, Duration::from_millis(250));
        assert_eq!(cfg.controller_queue, 256);
        assert_eq!(cfg.read_buffer_size, protocol::MAX_CONTROLLER_REPORT_SIZE);
        assert_eq!(zero_queue.controller_queue, 1);
    }

    #[test]
    fn test_read_buffer_floor_fits_largest_report() {
        assert_eq!(protocol::MAX_CONTROLLER_REPORT_SIZE, 216);
        assert!(protocol::MIN_READ_BUFFER_SIZE >= protocol::HMD_REPORT_SIZE);
        assert!(SessionConfig::default().read_buffer_size >= protocol::MIN_READ_BUFFER_SIZE);
    }
}
