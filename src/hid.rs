use crate::config::SessionConfig;
use crate::protocol::{self, DEVICE_INFO_SIZE, FEATURE_BUFFER_SIZE, IMU_CONFIG_SIZE};
use crate::types::{DeviceInfo, ImuConfig};
use crate::{DecodeReject, Result, RiftSError};
use hidapi::{HidApi, HidDevice};
use std::sync::{Mutex, PoisonError};

/// One opened HID interface. Closing is dropping.
pub trait HidInterface: Send {
    /// Non-blocking read of one input report. `Ok(0)` means nothing pending.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// SET_REPORT(feature). `data[0]` is the report id.
    fn send_feature_report(&mut self, data: &[u8]) -> Result<()>;

    /// GET_REPORT(feature). `buf[0]` must hold the report id on entry.
    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Finds and opens headset interfaces.
pub trait Transport: Send + Sync {
    /// Paths of every attached headset's HMD interface.
    fn enumerate(&self) -> Result<Vec<String>>;

    /// Open interface `interface` of the headset identified by `path`, in
    /// non-blocking mode.
    fn open(&self, path: &str, interface: u8) -> Result<Box<dyn HidInterface>>;
}

/// [`Transport`] backed by hidapi.
pub struct HidApiTransport {
    api: Mutex<HidApi>,
    vendor_id: u16,
    product_id: u16,
    hmd_interface: u8,
}

impl HidApiTransport {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let api = HidApi::new()?;
        #[cfg(target_os = "macos")]
        {
            // Keep HID opens shared on macOS; three interfaces are opened.
            api.set_open_exclusive(false);
        }
        Ok(HidApiTransport {
            api: Mutex::new(api),
            vendor_id: config.vendor_id,
            product_id: config.product_id,
            hmd_interface: config.interfaces[0],
        })
    }

    fn is_rift_s(&self, d: &hidapi::DeviceInfo, interface: u8) -> bool {
        d.vendor_id() == self.vendor_id
            && d.product_id() == self.product_id
            && d.interface_number() == interface as i32
    }
}

impl Transport for HidApiTransport {
    fn enumerate(&self) -> Result<Vec<String>> {
        let mut api = self.api.lock().unwrap_or_else(PoisonError::into_inner);
        api.refresh_devices()?;
        Ok(api
            .device_list()
            .filter(|d| self.is_rift_s(d, self.hmd_interface))
            .map(|d| d.path().to_string_lossy().into_owned())
            .collect())
    }

    fn open(&self, path: &str, interface: u8) -> Result<Box<dyn HidInterface>> {
        let api = self.api.lock().unwrap_or_else(PoisonError::into_inner);

        // TODO: match sibling interfaces by their parent USB device so more
        // than one headset can be attached at a time.
        let info = api
            .device_list()
            .find(|d| self.is_rift_s(d, interface) && d.path().to_bytes() == path.as_bytes())
            .or_else(|| api.device_list().find(|d| self.is_rift_s(d, interface)))
            .ok_or_else(|| RiftSError::DeviceNotFound {
                path: path.to_string(),
                interface,
            })?;

        let device = info.open_device(&api).map_err(|e| {
            log::warn!(
                "Could not open {:?} (interface {}): {}. Check udev permissions.",
                info.path(),
                interface,
                e
            );
            e
        })?;
        device.set_blocking_mode(false)?;

        Ok(Box::new(HidApiInterface { device }))
    }
}

struct HidApiInterface {
    device: HidDevice,
}

impl HidInterface for HidApiInterface {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.device.read(buf)?)
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<()> {
        Ok(self.device.send_feature_report(data)?)
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.device.get_feature_report(buf)?)
    }
}

/// Feature-report commands and reads on the HMD interface.
pub struct HmdCommands<'a> {
    hid: &'a mut dyn HidInterface,
}

impl<'a> HmdCommands<'a> {
    pub fn new(hid: &'a mut dyn HidInterface) -> Self {
        HmdCommands { hid }
    }

    fn get_feature(&mut self, report_id: u8, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        buf[0] = report_id;
        let received = self.hid.get_feature_report(&mut buf)?;
        buf.truncate(received);
        Ok(buf)
    }

    /// Read panel resolution and refresh rate (report 0x06).
    pub fn read_device_info(&mut self) -> Result<DeviceInfo> {
        let buf = self.get_feature(protocol::FEATURE_DEVICE_INFO, DEVICE_INFO_SIZE)?;
        Ok(protocol::decode_device_info(&buf)?)
    }

    /// Read feature report 1. Its contents are not understood, but the
    /// headset expects it to be read before streaming.
    pub fn read_report1(&mut self) -> Result<Vec<u8>> {
        let buf = self.get_feature(protocol::FEATURE_REPORT1, FEATURE_BUFFER_SIZE)?;
        match buf.first() {
            Some(&protocol::FEATURE_REPORT1) => Ok(buf),
            found => Err(DecodeReject::ReportId {
                report: "report 1",
                expected: protocol::FEATURE_REPORT1,
                found: found.copied().unwrap_or(0),
            }
            .into()),
        }
    }

    /// Read IMU rate and scale constants (report 0x09).
    pub fn read_imu_config(&mut self) -> Result<ImuConfig> {
        let buf = self.get_feature(protocol::FEATURE_IMU_CONFIG, IMU_CONFIG_SIZE)?;
        Ok(protocol::decode_imu_config(&buf)?)
    }

    /// Request firmware block `block_id` and reassemble its chunks.
    pub fn read_firmware_block(&mut self, block_id: u8) -> Result<Vec<u8>> {
        self.hid
            .send_feature_report(&protocol::encode_firmware_block_request(block_id))?;
        let hid = &mut *self.hid;
        let blob = protocol::decode_firmware_block_stream(block_id, |buf| {
            hid.get_feature_report(buf)
        })?;
        log::debug!("Read firmware block 0x{:02x}: {} bytes", block_id, blob.len());
        Ok(blob)
    }

    /// Enable or disable the headset together with the controller radio.
    pub fn enable(&mut self, enable: bool) -> Result<()> {
        self.hid.send_feature_report(&protocol::encode_enable(enable))?;
        self.hid
            .send_feature_report(&protocol::encode_radio_enable(enable))
    }

    pub fn set_screen_enable(&mut self, enable: bool) -> Result<()> {
        self.hid
            .send_feature_report(&protocol::encode_screen_enable(enable))
    }

    pub fn send_keepalive(&mut self) -> Result<()> {
        self.hid.send_feature_report(&protocol::encode_keepalive())
    }
}
