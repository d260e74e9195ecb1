//! Raw IMU sample → physical units, with factory calibration applied.

use crate::types::{AxisCalibration, ImuCalibration, ImuConfig, ImuSample};
use crate::Result;

/// Standard gravity in m/s².
pub const GRAVITY_EARTH: f32 = 9.80665;

/// Temperature the device reports its offset against, in °C.
const TEMPERATURE_REFERENCE_C: f32 = 25.0;

/// Parses the firmware IMU calibration blob (block 0x0e).
///
/// The blob's textual encoding is owned by the caller; any closure of the
/// right shape also works.
pub trait CalibrationParser: Send + Sync {
    fn parse(&self, blob: &[u8]) -> Result<ImuCalibration>;
}

impl<F> CalibrationParser for F
where
    F: Fn(&[u8]) -> Result<ImuCalibration> + Send + Sync,
{
    fn parse(&self, blob: &[u8]) -> Result<ImuCalibration> {
        self(blob)
    }
}

/// Per-unit multipliers derived once from [`ImuConfig`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImuScale {
    pub gyro: f32,
    pub accel: f32,
    pub temperature: f32,
    pub temperature_offset: f32,
    /// Nominal seconds between two samples.
    pub tick: f32,
}

impl ImuScale {
    pub fn new(config: &ImuConfig) -> Self {
        ImuScale {
            gyro: config.gyro_scale / 32768.0,
            accel: GRAVITY_EARTH / config.accel_scale,
            temperature: 1.0 / config.temperature_scale,
            temperature_offset: config.temperature_offset,
            tick: 1.0 / config.imu_hz as f32,
        }
    }
}

/// One sample in physical units, after offset and rectification.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibratedSample {
    /// m/s²
    pub accel: [f32; 3],
    /// rad/s
    pub gyro: [f32; 3],
    /// °C
    pub temperature: f32,
}

fn rotate_3x3(v: [f32; 3], m: &[[f32; 3]; 3]) -> [f32; 3] {
    let mut out = [0.0; 3];
    for (i, row) in m.iter().enumerate() {
        out[i] = row[0] * v[0] + row[1] * v[1] + row[2] * v[2];
    }
    out
}

fn correct(raw: [i16; 3], scale: f32, cal: &AxisCalibration) -> [f32; 3] {
    let mut v = [0.0; 3];
    for axis in 0..3 {
        v[axis] = scale * raw[axis] as f32 - cal.offset[axis];
    }
    rotate_3x3(v, &cal.rectification)
}

/// Convert one raw sample. Offsets are subtracted first, then rectified.
pub fn apply(sample: &ImuSample, scale: &ImuScale, calibration: &ImuCalibration) -> CalibratedSample {
    CalibratedSample {
        accel: correct(sample.accel, scale.accel, &calibration.accel),
        gyro: correct(sample.gyro, scale.gyro, &calibration.gyro),
        temperature: scale.temperature * (sample.temperature as f32 - scale.temperature_offset)
            + TEMPERATURE_REFERENCE_C,
    }
}
