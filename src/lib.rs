//! # rift-s - session and protocol layer for the Oculus Rift S
//!
//! Cross-platform driver core using hidapi. Provides:
//! - A field-by-field codec for the headset's HMD, status and controller
//!   reports and its feature-report commands
//! - A registry that shares one hardware session per headset between any
//!   number of logical devices
//! - A non-blocking, tick-driven poll loop that calibrates IMU samples and
//!   feeds them to an orientation filter
//!
//! ## Quick Start
//! ```no_run
//! use rift_s::{ImuCalibration, LogicalDevice, SessionConfig, SessionRegistry};
//! use std::sync::Arc;
//!
//! struct Still;
//! impl rift_s::Fusion for Still {
//!     fn update(&mut self, _dt: f32, _gyro: [f32; 3], _accel: [f32; 3], _mag: [f32; 3]) {}
//!     fn orientation(&self) -> [f32; 4] { [0.0, 0.0, 0.0, 1.0] }
//! }
//!
//! let parser = |_blob: &[u8]| -> rift_s::Result<ImuCalibration> { Ok(ImuCalibration::default()) };
//! let fusion: rift_s::FusionFactory = Box::new(|| Box::new(Still) as Box<dyn rift_s::Fusion>);
//! let registry = Arc::new(
//!     SessionRegistry::with_hidapi(Arc::new(parser), fusion, SessionConfig::from_env()).unwrap(),
//! );
//! let hmd = LogicalDevice::open_first(&registry).unwrap();
//! loop {
//!     hmd.update();
//!     println!("orientation: {:?}", hmd.orientation());
//! #   break;
//! }
//! ```

pub mod error;
pub mod types;
pub mod protocol;
pub mod calibration;
pub mod config;
pub mod state;
pub mod fusion;
pub mod hid;
pub mod controller;
pub mod session;
pub mod registry;
pub mod device;

pub use calibration::{CalibratedSample, CalibrationParser};
pub use config::SessionConfig;
pub use controller::{controller_channel, ControllerSink, ControllerStream};
pub use device::LogicalDevice;
pub use error::{DecodeReject, RiftSError};
pub use fusion::{Fusion, FusionFactory};
pub use hid::{HidApiTransport, HidInterface, Transport};
pub use registry::{Release, SessionHandle, SessionRegistry};
pub use session::{PollStats, Session};
pub use state::{DisplayPower, KeepaliveTimer};
pub use types::*;

/// Result type alias for rift-s operations.
pub type Result<T> = std::result::Result<T, RiftSError>;
