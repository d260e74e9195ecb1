use crate::calibration::{self, CalibratedSample, CalibrationParser, ImuScale};
use crate::config::SessionConfig;
use crate::controller::ControllerSink;
use crate::fusion::Fusion;
use crate::hid::{HidInterface, HmdCommands, Transport};
use crate::protocol::{self, ReportKind};
use crate::state::{DisplayPower, KeepaliveTimer};
use crate::types::{
    DeviceInfo, FirmwareBlock, HmdReport, ImuCalibration, ImuConfig, Interface, StatusReport,
};
use crate::{Result, RiftSError};
use std::time::Instant;

/// What one [`Session::update`] tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollStats {
    pub keepalive_sent: bool,
    pub hmd_reports: usize,
    /// Valid IMU samples handed to fusion.
    pub imu_samples: usize,
    pub status_reports: usize,
    pub controller_reports: usize,
    /// Screen on/off commands issued by the display state machine.
    pub screen_commands: usize,
    /// Frames dropped because the codec refused them.
    pub rejected: usize,
    /// Frames with an unrecognized report id.
    pub unknown: usize,
    /// Interfaces whose polling stopped early on a read error.
    pub failed_interfaces: Vec<Interface>,
}

/// Hardware state shared by every logical device opened on one headset.
///
/// Dropping a session disables the headset (if it was enabled) and closes
/// its interfaces; [`Session::shutdown`] does the same eagerly.
pub struct Session {
    path: String,
    interfaces: [Option<Box<dyn HidInterface>>; 3],
    enabled: bool,

    device_info: DeviceInfo,
    imu_config: ImuConfig,
    calibration: ImuCalibration,
    scale: ImuScale,

    read_buffer: Vec<u8>,
    last_imu_timestamp: Option<u32>,
    keepalive: KeepaliveTimer,
    display: DisplayPower,
    fusion: Box<dyn Fusion>,
    last_sample: CalibratedSample,
    /// The headset has no magnetometer; fusion always sees zero.
    raw_mag: [f32; 3],
    controller_sink: Option<Box<dyn ControllerSink>>,
}

impl Session {
    /// Open all three interfaces of the headset at `path`, read its
    /// configuration and calibration, and enable it.
    ///
    /// On failure everything opened so far is closed again before the
    /// error is returned.
    pub fn open(
        path: &str,
        transport: &dyn Transport,
        parser: &dyn CalibrationParser,
        fusion: Box<dyn Fusion>,
        config: &SessionConfig,
    ) -> Result<Session> {
        Self::open_inner(path, transport, parser, fusion, config).map_err(|e| {
            log::error!("Failed to open Rift S at {}: {}", path, e);
            RiftSError::OpenFailed {
                path: path.to_string(),
                source: Box::new(e),
            }
        })
    }

    fn open_inner(
        path: &str,
        transport: &dyn Transport,
        parser: &dyn CalibrationParser,
        fusion: Box<dyn Fusion>,
        config: &SessionConfig,
    ) -> Result<Session> {
        let mut interfaces: [Option<Box<dyn HidInterface>>; 3] = [None, None, None];
        for (slot, &number) in interfaces.iter_mut().zip(config.interfaces.iter()) {
            *slot = Some(transport.open(path, number)?);
        }

        let Some(hmd) = interfaces[Interface::Hmd.index()].as_deref_mut() else {
            return Err(RiftSError::transport(Interface::Hmd, "interface not open"));
        };
        let mut commands = HmdCommands::new(hmd);

        let device_info = commands
            .read_device_info()
            .map_err(|e| RiftSError::config("device info", e))?;
        commands
            .read_report1()
            .map_err(|e| RiftSError::config("report 1", e))?;
        let imu_config = commands
            .read_imu_config()
            .map_err(|e| RiftSError::config("IMU configuration", e))?;
        let calibration = commands
            .read_firmware_block(FirmwareBlock::ImuCalibration.id())
            .and_then(|blob| parser.parse(&blob))
            .map_err(|e| RiftSError::config("IMU calibration", e))?;

        let mut session = Session {
            path: path.to_string(),
            interfaces,
            enabled: false,
            device_info,
            imu_config,
            calibration,
            scale: ImuScale::new(&imu_config),
            read_buffer: vec![0u8; config.read_buffer_size.max(protocol::MIN_READ_BUFFER_SIZE)],
            last_imu_timestamp: None,
            keepalive: KeepaliveTimer::new(config.keepalive_interval),
            display: DisplayPower::On,
            fusion,
            last_sample: CalibratedSample::default(),
            raw_mag: [0.0; 3],
            controller_sink: None,
        };

        // Marked first so a half-applied enable is still undone on drop.
        session.enabled = true;
        session.hmd()?.enable(true)?;

        log::info!(
            "Opened Rift S at {}: {}x{} @ {} Hz, IMU {} Hz",
            path,
            device_info.h_resolution,
            device_info.v_resolution,
            device_info.refresh_rate,
            imu_config.imu_hz
        );
        Ok(session)
    }

    fn hmd(&mut self) -> Result<HmdCommands<'_>> {
        match self.interfaces[Interface::Hmd.index()].as_deref_mut() {
            Some(hid) => Ok(HmdCommands::new(hid)),
            None => Err(RiftSError::transport(Interface::Hmd, "interface closed")),
        }
    }

    /// HID path this session was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// True until [`Session::shutdown`] has run.
    pub fn is_open(&self) -> bool {
        self.interfaces.iter().any(Option::is_some)
    }

    /// Panel description read at open.
    pub fn device_info(&self) -> &DeviceInfo {
        &self.device_info
    }

    /// IMU rate and scales read at open.
    pub fn imu_config(&self) -> &ImuConfig {
        &self.imu_config
    }

    /// Factory calibration parsed at open.
    pub fn calibration(&self) -> &ImuCalibration {
        &self.calibration
    }

    /// Current state of the proximity-driven display machine.
    pub fn display_power(&self) -> DisplayPower {
        self.display
    }

    /// Most recent calibrated IMU sample.
    pub fn last_sample(&self) -> &CalibratedSample {
        &self.last_sample
    }

    /// Orientation quaternion `[x, y, z, w]` from the fusion filter.
    pub fn orientation(&self) -> [f32; 4] {
        self.fusion.orientation()
    }

    /// Route decoded controller reports to `sink`, replacing any previous one.
    pub fn set_controller_sink(&mut self, sink: Box<dyn ControllerSink>) {
        self.controller_sink = Some(sink);
    }

    /// Read a firmware block over the HMD interface.
    pub fn read_firmware_block(&mut self, block: FirmwareBlock) -> Result<Vec<u8>> {
        self.hmd()?.read_firmware_block(block.id())
    }

    /// Run one polling tick at host time `now`.
    ///
    /// Sends a keepalive when due, then drains the HMD, status and
    /// controller interfaces in that order. Nothing here blocks and no
    /// error escapes: bad frames are dropped and a failing interface is
    /// skipped until the next tick.
    pub fn update(&mut self, now: Instant) -> PollStats {
        let mut stats = PollStats::default();

        if self.keepalive.fire(now) {
            stats.keepalive_sent = true;
            if let Err(e) = self.hmd().and_then(|mut hmd| hmd.send_keepalive()) {
                log::warn!("Failed to send keepalive: {}", e);
            }
        }

        let mut buf = std::mem::take(&mut self.read_buffer);
        for interface in Interface::ALL {
            loop {
                let Some(hid) = self.interfaces[interface.index()].as_mut() else {
                    break;
                };
                let size = match hid.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => n.min(buf.len()),
                    Err(e) => {
                        log::warn!("Error reading from {} interface: {}", interface, e);
                        stats.failed_interfaces.push(interface);
                        break;
                    }
                };
                self.dispatch(&buf[..size], &mut stats);
            }
        }
        self.read_buffer = buf;

        log::trace!("Rift S tick: {:?}", stats);
        stats
    }

    fn dispatch(&mut self, frame: &[u8], stats: &mut PollStats) {
        match ReportKind::of(frame) {
            None => {}
            Some(ReportKind::Hmd) => match protocol::decode_hmd_report(frame) {
                Ok(report) => {
                    stats.hmd_reports += 1;
                    stats.imu_samples += self.handle_hmd_report(&report);
                }
                Err(e) => {
                    log::debug!("Dropping HMD report: {}", e);
                    stats.rejected += 1;
                }
            },
            Some(ReportKind::Status) => match protocol::decode_status_report(frame) {
                Ok(status) => {
                    stats.status_reports += 1;
                    self.handle_status_report(status, stats);
                }
                Err(e) => {
                    log::debug!("Dropping status report: {}", e);
                    stats.rejected += 1;
                }
            },
            Some(ReportKind::Controller) => match protocol::decode_controller_report(frame) {
                Ok(report) => {
                    stats.controller_reports += 1;
                    if let Some(sink) = self.controller_sink.as_mut() {
                        sink.handle(report);
                    }
                }
                Err(e) => {
                    log::debug!("Dropping controller report: {}", e);
                    stats.rejected += 1;
                }
            },
            Some(ReportKind::Unknown(id)) => {
                log::warn!("Unknown Rift S report 0x{:02x}!", id);
                stats.unknown += 1;
            }
        }
    }

    /// Calibrate and fuse every valid sample of `report`. Returns how many
    /// samples were used.
    fn handle_hmd_report(&mut self, report: &HmdReport) -> usize {
        let mut dt = match self.last_imu_timestamp {
            Some(last) => report.timestamp.wrapping_sub(last) as f32 / 1_000_000.0,
            None => self.scale.tick,
        };

        let mut used = 0;
        for sample in report.valid_samples() {
            let calibrated = calibration::apply(sample, &self.scale, &self.calibration);
            self.fusion
                .update(dt, calibrated.gyro, calibrated.accel, self.raw_mag);
            self.last_sample = calibrated;
            dt = self.scale.tick;
            used += 1;
        }

        self.last_imu_timestamp = Some(report.timestamp);
        used
    }

    fn handle_status_report(&mut self, status: StatusReport, stats: &mut PollStats) {
        let Some(on) = self.display.observe(status.proximity) else {
            return;
        };
        log::info!(
            "Proximity sensor {}, turning display {}",
            if status.proximity { "triggered" } else { "cleared" },
            if on { "on" } else { "off" }
        );
        stats.screen_commands += 1;
        if let Err(e) = self.hmd().and_then(|mut hmd| hmd.set_screen_enable(on)) {
            log::warn!("Failed to switch display {}: {}", if on { "on" } else { "off" }, e);
        }
    }

    /// Disable the headset and close all interfaces. Idempotent.
    pub fn shutdown(&mut self) {
        if self.enabled {
            self.enabled = false;
            if let Err(e) = self.hmd().and_then(|mut hmd| hmd.enable(false)) {
                log::warn!("Failed to disable Rift S: {}", e);
            }
        }
        if self.is_open() {
            for slot in self.interfaces.iter_mut() {
                slot.take();
            }
            log::info!("Closed Rift S at {}", self.path);
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("enabled", &self.enabled)
            .field("device_info", &self.device_info)
            .field("imu_config", &self.imu_config)
            .field("display", &self.display)
            .finish_non_exhaustive()
    }
}
