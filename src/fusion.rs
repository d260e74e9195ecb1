/// Orientation filter fed with calibrated IMU samples.
///
/// The integration algorithm lives outside this crate; the session only
/// drives it and reads back the orientation.
pub trait Fusion: Send {
    /// `gyro` in rad/s, `accel` in m/s², `dt` in seconds.
    fn update(&mut self, dt: f32, gyro: [f32; 3], accel: [f32; 3], mag: [f32; 3]);

    /// Current orientation as `[x, y, z, w]`.
    fn orientation(&self) -> [f32; 4];
}

/// Builds one fresh [`Fusion`] per opened session.
pub type FusionFactory = Box<dyn Fn() -> Box<dyn Fusion> + Send + Sync>;
