use crate::types::Interface;

/// Why a frame or feature-report buffer was refused by the codec.
///
/// Rejects are ordinary values: the polling engine logs them and drops the
/// frame, it never tears the session down because of one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeReject {
    #[error("{report} report is {actual} bytes, expected {expected}")]
    Length {
        report: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{report} report truncated: need at least {needed} bytes, got {actual}")]
    Truncated {
        report: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("{report} report has id 0x{found:02x}, expected 0x{expected:02x}")]
    ReportId {
        report: &'static str,
        expected: u8,
        found: u8,
    },

    #[error("controller report declares {0} info blocks (max {max})", max = crate::protocol::MAX_INFO_BLOCKS)]
    TooManyBlocks(u8),

    #[error("controller report declares {0} extra bytes (max {max})", max = crate::protocol::MAX_EXTRA_BYTES)]
    TooManyExtraBytes(u8),

    #[error("{report} field {field} is invalid")]
    InvalidField {
        report: &'static str,
        field: &'static str,
    },

    #[error("malformed firmware block chunk: {0}")]
    ChunkHeader(String),

    #[error("firmware block declares {0} bytes (max {max})", max = crate::protocol::MAX_FIRMWARE_BLOCK_LEN)]
    FirmwareBlockTooLarge(u32),
}

/// Errors that can occur when driving a Rift S headset.
#[derive(Debug, thiserror::Error)]
pub enum RiftSError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),

    #[error("I/O error on {interface} interface: {message}")]
    Transport {
        interface: Interface,
        message: String,
    },

    #[error("no Rift S headset found (VID=2833 PID=0051)")]
    NoHeadset,

    #[error("no HID interface {interface} found for device {path}")]
    DeviceNotFound { path: String, interface: u8 },

    #[error("invalid response: {0}")]
    Decode(#[from] DecodeReject),

    #[error("failed to read {what}: {source}")]
    ConfigReadFailed {
        what: &'static str,
        #[source]
        source: Box<RiftSError>,
    },

    #[error("failed to open headset at {path}: {source}")]
    OpenFailed {
        path: String,
        #[source]
        source: Box<RiftSError>,
    },

    #[error("IMU calibration could not be parsed: {0}")]
    Calibration(String),

    #[error("no open session for {0}")]
    SessionNotOpen(String),

    #[error("invalid logical device index {0} (only 0 = HMD is supported)")]
    InvalidDeviceIndex(u32),

    #[error("controller stream stopped")]
    StreamStopped,

    #[error("timeout waiting for data")]
    Timeout,
}

impl RiftSError {
    pub(crate) fn transport(interface: Interface, err: impl std::fmt::Display) -> Self {
        RiftSError::Transport {
            interface,
            message: err.to_string(),
        }
    }

    pub(crate) fn config(what: &'static str, source: RiftSError) -> Self {
        RiftSError::ConfigReadFailed {
            what,
            source: Box::new(source),
        }
    }
}
