//! Print panel, IMU and firmware details of the first connected Rift S.
//!
//! Calibration is not parsed here, so raw identity calibration is used.

use rift_s::{
    FirmwareBlock, Fusion, FusionFactory, ImuCalibration, LogicalDevice, SessionConfig,
    SessionRegistry,
};
use std::sync::Arc;

struct NoFusion;

impl Fusion for NoFusion {
    fn update(&mut self, _dt: f32, _gyro: [f32; 3], _accel: [f32; 3], _mag: [f32; 3]) {}

    fn orientation(&self) -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }
}

fn main() {
    env_logger::init();

    let parser = |_blob: &[u8]| -> rift_s::Result<ImuCalibration> { Ok(ImuCalibration::default()) };
    let fusion: FusionFactory = Box::new(|| Box::new(NoFusion) as Box<dyn Fusion>);

    let device = SessionRegistry::with_hidapi(Arc::new(parser), fusion, SessionConfig::from_env())
        .map(Arc::new)
        .and_then(|registry| LogicalDevice::open_first(&registry));
    let device = match device {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let props = device.properties();
    let imu = device.imu_config();
    println!("Path:       {}", device.path());
    println!(
        "Panel:      {}x{} @ {} Hz",
        props.h_resolution, props.v_resolution, props.refresh_rate
    );
    println!("FOV:        {:.2} deg", props.fov.to_degrees());
    println!(
        "IMU:        {} Hz, gyro scale {}, accel scale {}",
        imu.imu_hz, imu.gyro_scale, imu.accel_scale
    );

    match device.read_firmware_block(FirmwareBlock::SerialNumber) {
        Ok(serial) => println!("Serial:     {}", String::from_utf8_lossy(&serial).trim_end_matches('\0')),
        Err(e) => eprintln!("Serial:     unavailable ({})", e),
    }
    match device.read_firmware_block(FirmwareBlock::ImuCalibration) {
        Ok(blob) => println!("IMU calib:  {} bytes", blob.len()),
        Err(e) => eprintln!("IMU calib:  unavailable ({})", e),
    }
}
