//! Poll the first Rift S and print IMU and controller activity.
//!
//! Usage: cargo run --example stream
//! Press Ctrl+C to stop.

use rift_s::{
    controller_channel, Fusion, FusionFactory, ImuCalibration, LogicalDevice, SessionConfig,
    SessionRegistry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Integrates the gyro only. Drifts, but shows the headset moving.
struct GyroIntegrator {
    q: [f32; 4],
}

impl Fusion for GyroIntegrator {
    fn update(&mut self, dt: f32, gyro: [f32; 3], _accel: [f32; 3], _mag: [f32; 3]) {
        let [x, y, z, w] = self.q;
        let (gx, gy, gz) = (gyro[0] * 0.5 * dt, gyro[1] * 0.5 * dt, gyro[2] * 0.5 * dt);
        let q = [
            x + w * gx + y * gz - z * gy,
            y + w * gy + z * gx - x * gz,
            z + w * gz + x * gy - y * gx,
            w - x * gx - y * gy - z * gz,
        ];
        let norm = q.iter().map(|c| c * c).sum::<f32>().sqrt();
        if norm > 0.0 {
            self.q = q.map(|c| c / norm);
        }
    }

    fn orientation(&self) -> [f32; 4] {
        self.q
    }
}

fn main() {
    env_logger::init();

    let config = SessionConfig::from_env();
    let queue = config.controller_queue;
    let parser = |_blob: &[u8]| -> rift_s::Result<ImuCalibration> { Ok(ImuCalibration::default()) };
    let fusion: FusionFactory = Box::new(|| {
        Box::new(GyroIntegrator {
            q: [0.0, 0.0, 0.0, 1.0],
        }) as Box<dyn Fusion>
    });

    let device = SessionRegistry::with_hidapi(Arc::new(parser), fusion, config)
        .map(Arc::new)
        .and_then(|registry| LogicalDevice::open_first(&registry));
    let device = match device {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Failed to open headset: {}", e);
            std::process::exit(1);
        }
    };

    let (sink, controllers) = controller_channel(queue);
    device.set_controller_sink(Box::new(sink));

    println!("Streaming from {} (Ctrl+C to stop)...", device.path());

    let start = Instant::now();
    let mut samples: u64 = 0;
    let mut last_report = Instant::now();

    loop {
        let stats = device.update();
        samples += stats.imu_samples as u64;
        if !stats.failed_interfaces.is_empty() {
            eprintln!("Read errors on {:?}", stats.failed_interfaces);
        }

        while let Some(report) = controllers.try_recv() {
            for buttons in report.blocks.iter().filter_map(|b| b.buttons()) {
                println!("controller {:016x}: buttons {:?}", report.device_id, buttons);
            }
        }

        // Report rate every 3 seconds
        let now = Instant::now();
        if now.duration_since(last_report) >= Duration::from_secs(3) {
            let q = device.orientation();
            let elapsed = start.elapsed().as_secs_f64();
            println!(
                "--- {} samples in {:.1}s ({:.1} Hz)  quat=[{:+.3}, {:+.3}, {:+.3}, {:+.3}] ---",
                samples,
                elapsed,
                samples as f64 / elapsed,
                q[0], q[1], q[2], q[3],
            );
            last_report = now;
        }

        std::thread::sleep(Duration::from_millis(1));
    }
}
