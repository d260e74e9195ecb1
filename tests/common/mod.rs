//! In-memory headset used by the integration tests.

#![allow(dead_code)]

use rift_s::protocol::{self, DEVICE_INFO_SIZE, IMU_CONFIG_SIZE};
use rift_s::{
    CalibrationParser, Fusion, FusionFactory, HidInterface, ImuCalibration, ImuConfig, Interface,
    Result, RiftSError, SessionConfig, SessionRegistry, Transport,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const PATH: &str = "/dev/hidraw-rift-s";

pub enum Read {
    Frame(Vec<u8>),
    Error,
}

/// Everything one mock interface has seen and will return.
#[derive(Default)]
pub struct InterfaceState {
    pub reads: VecDeque<Read>,
    pub features_sent: Vec<Vec<u8>>,
    pub feature_responses: HashMap<u8, VecDeque<Vec<u8>>>,
    pub firmware_blocks: HashMap<u8, Vec<u8>>,
    pub opened: usize,
    pub closed: usize,
}

impl InterfaceState {
    pub fn is_open(&self) -> bool {
        self.opened > self.closed
    }

    pub fn count_sent(&self, command: &[u8]) -> usize {
        self.features_sent.iter().filter(|s| s.as_slice() == command).count()
    }

    pub fn sent_with_id(&self, id: u8) -> Vec<Vec<u8>> {
        self.features_sent
            .iter()
            .filter(|s| s.first() == Some(&id))
            .cloned()
            .collect()
    }
}

pub type Shared = Arc<Mutex<InterfaceState>>;

struct MockInterface {
    kind: Interface,
    state: Shared,
}

impl HidInterface for MockInterface {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match self.state.lock().unwrap().reads.pop_front() {
            None => Ok(0),
            Some(Read::Frame(frame)) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                Ok(n)
            }
            Some(Read::Error) => Err(RiftSError::Transport {
                interface: self.kind,
                message: "device disconnected".into(),
            }),
        }
    }

    fn send_feature_report(&mut self, data: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.features_sent.push(data.to_vec());
        if data[0] == protocol::CMD_FIRMWARE_BLOCK_READ {
            let block_id = data[1];
            if let Some(blob) = state.firmware_blocks.get(&block_id).cloned() {
                let chunks = firmware_chunks(block_id, &blob);
                state
                    .feature_responses
                    .entry(protocol::FEATURE_FIRMWARE_CHUNK)
                    .or_default()
                    .extend(chunks);
            }
        }
        Ok(())
    }

    fn get_feature_report(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        let response = state
            .feature_responses
            .get_mut(&buf[0])
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| RiftSError::Transport {
                interface: self.kind,
                message: format!("no feature report 0x{:02x}", buf[0]),
            })?;
        let n = response.len().min(buf.len());
        buf[..n].copy_from_slice(&response[..n]);
        Ok(n)
    }
}

impl Drop for MockInterface {
    fn drop(&mut self) {
        self.state.lock().unwrap().closed += 1;
    }
}

/// Split a blob into `[0x4b, block, len, payload]` chunks, length prefix first.
pub fn firmware_chunks(block_id: u8, blob: &[u8]) -> Vec<Vec<u8>> {
    let mut stream = (blob.len() as u32).to_le_bytes().to_vec();
    stream.extend_from_slice(blob);
    stream
        .chunks(protocol::FIRMWARE_CHUNK_SIZE - protocol::FIRMWARE_CHUNK_HEADER_SIZE)
        .map(|payload| {
            let mut chunk = vec![protocol::FEATURE_FIRMWARE_CHUNK, block_id, payload.len() as u8];
            chunk.extend_from_slice(payload);
            chunk
        })
        .collect()
}

pub fn device_info_bytes() -> Vec<u8> {
    let mut buf = vec![0u8; DEVICE_INFO_SIZE];
    buf[0] = protocol::FEATURE_DEVICE_INFO;
    buf[1..3].copy_from_slice(&1440u16.to_le_bytes());
    buf[3..5].copy_from_slice(&2560u16.to_le_bytes());
    buf[7] = 80;
    buf
}

pub fn imu_config_bytes(config: &ImuConfig) -> Vec<u8> {
    let mut buf = vec![0u8; IMU_CONFIG_SIZE];
    buf[0] = protocol::FEATURE_IMU_CONFIG;
    buf[1..5].copy_from_slice(&config.imu_hz.to_le_bytes());
    buf[5..9].copy_from_slice(&config.gyro_scale.to_le_bytes());
    buf[9..13].copy_from_slice(&config.accel_scale.to_le_bytes());
    buf[13..17].copy_from_slice(&config.temperature_scale.to_le_bytes());
    buf[17..21].copy_from_slice(&config.temperature_offset.to_le_bytes());
    buf
}

pub fn default_imu_config() -> ImuConfig {
    ImuConfig {
        imu_hz: 1000,
        gyro_scale: 2000.0,
        accel_scale: 2048.0,
        temperature_scale: 333.87,
        temperature_offset: 0.0,
    }
}

pub const CALIBRATION_BLOB: &[u8] = b"{\"ImuCalibration\":\"mock\"}";

/// The three interfaces of one simulated headset.
#[derive(Clone)]
pub struct MockHeadset {
    pub interfaces: [Shared; 3],
}

impl MockHeadset {
    pub fn new(imu_config: &ImuConfig) -> Self {
        let headset = MockHeadset {
            interfaces: Default::default(),
        };
        {
            let mut hmd = headset.hmd();
            hmd.feature_responses
                .insert(protocol::FEATURE_DEVICE_INFO, VecDeque::from([device_info_bytes()]));
            hmd.feature_responses.insert(
                protocol::FEATURE_REPORT1,
                VecDeque::from([vec![protocol::FEATURE_REPORT1, 0x42]]),
            );
            hmd.feature_responses.insert(
                protocol::FEATURE_IMU_CONFIG,
                VecDeque::from([imu_config_bytes(imu_config)]),
            );
            hmd.firmware_blocks.insert(0x0e, CALIBRATION_BLOB.to_vec());
        }
        headset
    }

    pub fn state(&self, interface: Interface) -> std::sync::MutexGuard<'_, InterfaceState> {
        self.interfaces[interface.index()].lock().unwrap()
    }

    pub fn hmd(&self) -> std::sync::MutexGuard<'_, InterfaceState> {
        self.state(Interface::Hmd)
    }

    pub fn push_frame(&self, interface: Interface, frame: Vec<u8>) {
        self.state(interface).reads.push_back(Read::Frame(frame));
    }

    pub fn push_error(&self, interface: Interface) {
        self.state(interface).reads.push_back(Read::Error);
    }

    pub fn all_closed(&self) -> bool {
        Interface::ALL.iter().all(|&i| !self.state(i).is_open())
    }
}

/// Transport serving [`MockHeadset`]s by path.
#[derive(Default)]
pub struct MockTransport {
    pub headsets: Mutex<HashMap<String, MockHeadset>>,
    /// Interface number whose open fails.
    pub fail_interface: Mutex<Option<u8>>,
    pub open_calls: AtomicUsize,
}

impl MockTransport {
    pub fn with_headset(path: &str, headset: MockHeadset) -> Self {
        let transport = MockTransport::default();
        transport
            .headsets
            .lock()
            .unwrap()
            .insert(path.to_string(), headset);
        transport
    }
}

impl Transport for MockTransport {
    fn enumerate(&self) -> Result<Vec<String>> {
        let mut paths: Vec<String> = self.headsets.lock().unwrap().keys().cloned().collect();
        paths.sort();
        Ok(paths)
    }

    fn open(&self, path: &str, interface: u8) -> Result<Box<dyn HidInterface>> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if *self.fail_interface.lock().unwrap() == Some(interface) {
            return Err(RiftSError::DeviceNotFound {
                path: path.to_string(),
                interface,
            });
        }
        let headsets = self.headsets.lock().unwrap();
        let headset = headsets.get(path).ok_or_else(|| RiftSError::DeviceNotFound {
            path: path.to_string(),
            interface,
        })?;
        let kind = match interface {
            protocol::INTF_HMD => Interface::Hmd,
            protocol::INTF_STATUS => Interface::Status,
            protocol::INTF_CONTROLLERS => Interface::Controllers,
            _ => {
                return Err(RiftSError::DeviceNotFound {
                    path: path.to_string(),
                    interface,
                })
            }
        };
        let state = headset.interfaces[kind.index()].clone();
        state.lock().unwrap().opened += 1;
        Ok(Box::new(MockInterface { kind, state }))
    }
}

/// One call into [`Fusion::update`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FusionCall {
    pub dt: f32,
    pub gyro: [f32; 3],
    pub accel: [f32; 3],
    pub mag: [f32; 3],
}

/// Fusion stand-in that records its inputs.
pub struct RecordingFusion {
    pub calls: Arc<Mutex<Vec<FusionCall>>>,
}

impl Fusion for RecordingFusion {
    fn update(&mut self, dt: f32, gyro: [f32; 3], accel: [f32; 3], mag: [f32; 3]) {
        self.calls.lock().unwrap().push(FusionCall { dt, gyro, accel, mag });
    }

    fn orientation(&self) -> [f32; 4] {
        [0.0, 0.0, 0.0, 1.0]
    }
}

pub fn recording_fusion() -> (FusionFactory, Arc<Mutex<Vec<FusionCall>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let shared = calls.clone();
    let factory: FusionFactory = Box::new(move || {
        Box::new(RecordingFusion {
            calls: shared.clone(),
        }) as Box<dyn Fusion>
    });
    (factory, calls)
}

/// Parser that accepts only [`CALIBRATION_BLOB`] and returns `calibration`.
pub fn fixed_parser(calibration: ImuCalibration) -> Arc<dyn CalibrationParser> {
    Arc::new(move |blob: &[u8]| -> Result<ImuCalibration> {
        if blob == CALIBRATION_BLOB {
            Ok(calibration)
        } else {
            Err(RiftSError::Calibration(format!("unexpected blob of {} bytes", blob.len())))
        }
    })
}

pub struct Rig {
    pub registry: Arc<SessionRegistry>,
    pub transport: Arc<MockTransport>,
    pub headset: MockHeadset,
    pub fusion_calls: Arc<Mutex<Vec<FusionCall>>>,
}

pub fn rig_with(imu_config: ImuConfig, calibration: ImuCalibration) -> Rig {
    rig_with_config(imu_config, calibration, SessionConfig::default())
}

pub fn rig_with_config(
    imu_config: ImuConfig,
    calibration: ImuCalibration,
    config: SessionConfig,
) -> Rig {
    let headset = MockHeadset::new(&imu_config);
    let transport = Arc::new(MockTransport::with_headset(PATH, headset.clone()));
    let (fusion, fusion_calls) = recording_fusion();
    let registry = Arc::new(SessionRegistry::new(
        transport.clone(),
        fixed_parser(calibration),
        fusion,
        config,
    ));
    Rig {
        registry,
        transport,
        headset,
        fusion_calls,
    }
}

pub fn rig() -> Rig {
    rig_with(default_imu_config(), ImuCalibration::default())
}
