use crate::controller::ControllerSink;
use crate::registry::{Release, SessionHandle, SessionRegistry};
use crate::session::PollStats;
use crate::types::{DeviceInfo, FirmwareBlock, HmdProperties, ImuConfig};
use crate::{Result, RiftSError};
use std::sync::Arc;
use std::time::Instant;

/// One functional unit of a headset, as seen by the generic device layer.
///
/// Several logical devices may share a session. Closing (or dropping) one
/// gives its session reference back to the registry exactly once.
pub struct LogicalDevice {
    index: u32,
    registry: Arc<SessionRegistry>,
    session: SessionHandle,
    released: bool,
}

impl LogicalDevice {
    /// The head-mounted display itself. Other indices are reserved for the
    /// touch controllers.
    pub const HMD: u32 = 0;

    /// Open logical device `index` of the headset at `path`.
    pub fn open(registry: &Arc<SessionRegistry>, path: &str, index: u32) -> Result<LogicalDevice> {
        if index != Self::HMD {
            return Err(RiftSError::InvalidDeviceIndex(index));
        }
        let session = registry.acquire(path)?;
        Ok(LogicalDevice {
            index,
            registry: registry.clone(),
            session,
            released: false,
        })
    }

    /// Open the HMD of the first attached headset.
    pub fn open_first(registry: &Arc<SessionRegistry>) -> Result<LogicalDevice> {
        let path = registry
            .enumerate()?
            .into_iter()
            .next()
            .ok_or(RiftSError::NoHeadset)?;
        Self::open(registry, &path, Self::HMD)
    }

    /// Logical index, [`LogicalDevice::HMD`] for the headset.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// HID path of the underlying headset.
    pub fn path(&self) -> &str {
        self.session.path()
    }

    /// The shared session. Its reference is given back by [`LogicalDevice::close`]
    /// or on drop, not through this handle.
    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Poll the shared session using the host clock.
    pub fn update(&self) -> PollStats {
        self.update_at(Instant::now())
    }

    /// Poll the shared session at host time `now`.
    pub fn update_at(&self, now: Instant) -> PollStats {
        self.session.lock().update(now)
    }

    /// Orientation quaternion `[x, y, z, w]`.
    pub fn orientation(&self) -> [f32; 4] {
        self.session.lock().orientation()
    }

    /// Always the origin: the headset tracks rotation only.
    pub fn position(&self) -> [f32; 3] {
        [0.0; 3]
    }

    /// Resolution, refresh rate and optics of the headset.
    pub fn properties(&self) -> HmdProperties {
        HmdProperties::from_device_info(self.session.lock().device_info())
    }

    /// Panel description read at open.
    pub fn device_info(&self) -> DeviceInfo {
        *self.session.lock().device_info()
    }

    /// IMU rate and scales read at open.
    pub fn imu_config(&self) -> ImuConfig {
        *self.session.lock().imu_config()
    }

    /// Route decoded controller reports to `sink`.
    pub fn set_controller_sink(&self, sink: Box<dyn ControllerSink>) {
        self.session.lock().set_controller_sink(sink);
    }

    /// Dump a firmware block, e.g. the serial number or lens calibration.
    pub fn read_firmware_block(&self, block: FirmwareBlock) -> Result<Vec<u8>> {
        self.session.lock().read_firmware_block(block)
    }

    /// Close this logical device, releasing its session reference.
    pub fn close(mut self) -> Result<Release> {
        self.release_once()
    }

    fn release_once(&mut self) -> Result<Release> {
        self.released = true;
        log::debug!("Closing logical device {} on {}", self.index, self.path());
        self.registry.release(&self.session)
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = self.release_once() {
                log::warn!("Failed to release {}: {}", self.path(), e);
            }
        }
    }
}
