use std::fmt;

/// The three HID interfaces a Rift S exposes, in polling order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interface {
    /// HMD IMU reports, feature reports and commands.
    Hmd = 0,
    /// System status (proximity sensor, etc).
    Status = 1,
    /// Touch controller reports relayed by the headset radio.
    Controllers = 2,
}

impl Interface {
    pub const ALL: [Interface; 3] = [Interface::Hmd, Interface::Status, Interface::Controllers];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Interface::Hmd => "HMD",
            Interface::Status => "status",
            Interface::Controllers => "controller",
        })
    }
}

/// Panel description read from feature report 0x06.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    pub h_resolution: u16,
    pub v_resolution: u16,
    pub refresh_rate: u8,
    pub unknown1: u16,
    pub reserved: [u8; 14],
}

/// IMU sampling and unit conversion constants read from feature report 0x09.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuConfig {
    pub imu_hz: u32,
    /// Gyro full scale: value = reading * gyro_scale / 32768.
    pub gyro_scale: f32,
    /// Accel = reading * g / accel_scale.
    pub accel_scale: f32,
    /// Temperature = (reading - offset) / scale + 25.
    pub temperature_scale: f32,
    pub temperature_offset: f32,
}

/// Offset and axis-rectification for one sensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCalibration {
    /// Subtracted before rectification. For the accelerometer this is the
    /// offset at the factory reference temperature.
    pub offset: [f32; 3],
    /// Row-major 3x3 rectification matrix.
    pub rectification: [[f32; 3]; 3],
}

impl AxisCalibration {
    pub const IDENTITY: AxisCalibration = AxisCalibration {
        offset: [0.0; 3],
        rectification: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Factory IMU calibration stored in firmware block 0x0e.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuCalibration {
    pub accel: AxisCalibration,
    pub gyro: AxisCalibration,
}

/// One raw IMU sample inside an HMD report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ImuSample {
    /// Bit 7 set marks this sample and all following ones as invalid.
    pub marker: u8,
    pub accel: [i16; 3],
    pub gyro: [i16; 3],
    pub temperature: i16,
}

impl ImuSample {
    pub const INVALID_MARKER: u8 = 0x80;

    pub fn is_valid(&self) -> bool {
        self.marker & Self::INVALID_MARKER == 0
    }
}

/// Decoded HMD IMU report (id 0x65).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HmdReport {
    /// Report id, 0x65 on the wire.
    pub id: u8,
    pub unknown_const1: u16,
    /// Device clock in microseconds.
    pub timestamp: u32,
    pub samples: [ImuSample; 3],
    pub marker: u8,
    pub unknown2: u8,
    /// Frame timestamp and id advance every 12.5 ms while the panel runs.
    pub frame_timestamp: u32,
    pub unknown_zero1: i16,
    pub frame_id: i16,
    pub unknown_zero2: i16,
}

impl HmdReport {
    /// Samples up to (not including) the first one flagged invalid.
    pub fn valid_samples(&self) -> impl Iterator<Item = &ImuSample> {
        self.samples.iter().take_while(|s| s.is_valid())
    }
}

/// Decoded system status report (id 0x66).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusReport {
    /// Proximity sensor triggered (headset is being worn).
    pub proximity: bool,
}

bitflags::bitflags! {
    /// Button mask carried by a 0x0c controller block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Buttons: u8 {
        const A      = 0x01;
        const B      = 0x02;
        const STICK  = 0x04;
        const OCULUS = 0x08;
        /// Seen sometimes, meaning unknown. Low battery?
        const UNKNOWN_10 = 0x10;
    }
}

bitflags::bitflags! {
    /// Finger proximity mask carried by a 0x0d controller block.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fingers: u8 {
        const A_X_STRONG     = 0x01;
        const B_Y_STRONG     = 0x02;
        const STICK_STRONG   = 0x04;
        const TRIGGER_STRONG = 0x08;
        const A_X_WEAK       = 0x10;
        const B_Y_WEAK       = 0x20;
        const STICK_WEAK     = 0x40;
        const TRIGGER_WEAK   = 0x80;
    }
}

bitflags::bitflags! {
    /// Debug-log flags in the controller report header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct LogFlags: u8 {
        /// Toggles on each new batch of log characters.
        const PARITY   = 0x02;
        const NEW_LINE = 0x04;
    }
}

/// Which single-byte block a [`InfoBlock::Mask`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskKind {
    /// 0x08, meaning unknown. Values seen 0x28, 0x0a, 0x32, 0x46, 0x00.
    Mask08,
    /// 0x0c, see [`Buttons`].
    Buttons,
    /// 0x0d, see [`Fingers`].
    Fingers,
    /// 0x0e, meaning unknown. Only 0x00 seen.
    Mask0e,
}

/// One 19-byte sub-record of a controller report, interpreted by its tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoBlock {
    Imu {
        timestamp: u32,
        unknown_varying2: u16,
        accel: [i16; 3],
        gyro: [i16; 3],
    },
    Mask {
        kind: MaskKind,
        value: u8,
    },
    TriggerGrip {
        values: [u8; 3],
    },
    Joystick {
        x: i16,
        y: i16,
    },
    Capsense {
        a_x: u8,
        b_y: u8,
        joystick: u8,
        trigger: u8,
    },
    /// Any tag this crate does not know, kept verbatim (tag included).
    Raw([u8; 19]),
}

impl InfoBlock {
    pub fn buttons(&self) -> Option<Buttons> {
        match self {
            InfoBlock::Mask {
                kind: MaskKind::Buttons,
                value,
            } => Some(Buttons::from_bits_retain(*value)),
            _ => None,
        }
    }

    pub fn fingers(&self) -> Option<Fingers> {
        match self {
            InfoBlock::Mask {
                kind: MaskKind::Fingers,
                value,
            } => Some(Fingers::from_bits_retain(*value)),
            _ => None,
        }
    }
}

/// Up to three characters of controller debug log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogFragment {
    pub flags: LogFlags,
    pub chars: [u8; 3],
}

/// Decoded controller report (id 0x67).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerReport {
    pub device_id: u64,
    pub data_len: u8,
    /// Only meaningful when `data_len >= 4`.
    pub log: Option<LogFragment>,
    pub blocks: Vec<InfoBlock>,
    pub extra_bytes: Vec<u8>,
}

/// Well-known firmware blocks readable over the HMD interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareBlock {
    SerialNumber,
    Threshold,
    ImuCalibration,
    CameraCalibration,
    DisplayColorCalibration,
    LensCalibration,
    Other(u8),
}

impl FirmwareBlock {
    pub fn id(self) -> u8 {
        match self {
            FirmwareBlock::SerialNumber => 0x0b,
            FirmwareBlock::Threshold => 0x0d,
            FirmwareBlock::ImuCalibration => 0x0e,
            FirmwareBlock::CameraCalibration => 0x0f,
            FirmwareBlock::DisplayColorCalibration => 0x10,
            FirmwareBlock::LensCalibration => 0x12,
            FirmwareBlock::Other(id) => id,
        }
    }
}

/// Display properties reported to the generic device layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmdProperties {
    pub h_resolution: u16,
    pub v_resolution: u16,
    pub refresh_rate: u8,
    /// Per-eye aspect ratio.
    pub ratio: f32,
    /// Physical panel size in meters.
    pub h_size: f32,
    pub v_size: f32,
    pub lens_separation: f32,
    pub lens_v_position: f32,
    /// Horizontal field of view in radians.
    pub fov: f32,
}

impl HmdProperties {
    // Panel and lens geometry are not read from the device yet.
    const H_SIZE: f32 = 0.149760;
    const V_SIZE: f32 = 0.093600;
    const LENS_SEPARATION: f32 = 0.063500;
    const LENS_V_POSITION: f32 = 0.046800;
    const FOV_DEG: f32 = 89.962739;

    pub fn from_device_info(info: &DeviceInfo) -> Self {
        let ratio = if info.v_resolution == 0 {
            0.0
        } else {
            (info.h_resolution as f32 / info.v_resolution as f32) / 2.0
        };
        HmdProperties {
            h_resolution: info.h_resolution,
            v_resolution: info.v_resolution,
            refresh_rate: info.refresh_rate,
            ratio,
            h_size: Self::H_SIZE,
            v_size: Self::V_SIZE,
            lens_separation: Self::LENS_SEPARATION,
            lens_v_position: Self::LENS_V_POSITION,
            fov: Self::FOV_DEG.to_radians(),
        }
    }
}
