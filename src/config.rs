use std::time::Duration;

/// Tunables for a single transfer session, shared by sender and receiver.
///
/// Replaces the reference implementation's module-level `DEVMODE` flag and
/// per-class constants with a value threaded explicitly into every
/// component that needs timing or sizing behaviour.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    pub window_size: usize,
    pub timeout: Duration,
    pub max_retries: u32,
    pub payload_size: usize,
    pub inactivity_timeout: Duration,
    pub debug_log: bool,
}

pub const MAX_PAYLOAD: usize = 1450;
pub const DEFAULT_WINDOW_SIZE: usize = 10;
pub const DEFAULT_TIMEOUT_MS: u64 = 1000;
pub const DEFAULT_MAX_RETRIES: u32 = 20;
pub const DEFAULT_INACTIVITY_TIMEOUT_MS: u64 = 10_000;
pub const HANDSHAKE_MAX_ATTEMPTS: u32 = 5;
pub const EOF_MAX_ATTEMPTS: u32 = 10;

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
            payload_size: MAX_PAYLOAD,
            inactivity_timeout: Duration::from_millis(DEFAULT_INACTIVITY_TIMEOUT_MS),
            debug_log: false,
        }
    }
}
