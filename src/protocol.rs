//! Wire codec for every report exchanged with the headset.
//!
//! All decoders are pure functions of their input slice. Layouts are read
//! field by field in little-endian order, never overlaid on host structs.

use crate::error::DecodeReject;
use crate::types::{
    ControllerReport, DeviceInfo, HmdReport, ImuConfig, ImuSample, InfoBlock, LogFlags,
    LogFragment, MaskKind, StatusReport,
};

// -- USB identifiers --
pub const VID: u16 = 0x2833;
pub const PID: u16 = 0x0051;
pub const INTF_HMD: u8 = 6;
pub const INTF_STATUS: u8 = 7;
pub const INTF_CONTROLLERS: u8 = 8;

// -- Streamed report ids (first byte of each frame) --
pub const REPORT_HMD: u8 = 0x65;
pub const REPORT_STATUS: u8 = 0x66;
pub const REPORT_CONTROLLER: u8 = 0x67;

// -- Feature report ids --
pub const FEATURE_REPORT1: u8 = 0x01;
pub const FEATURE_DEVICE_INFO: u8 = 0x06;
pub const FEATURE_IMU_CONFIG: u8 = 0x09;
pub const FEATURE_FIRMWARE_CHUNK: u8 = 0x4b;

// -- Command ids --
pub const CMD_SCREEN_ENABLE: u8 = 0x08;
pub const CMD_RADIO_ENABLE: u8 = 0x0a;
pub const CMD_HMD_ENABLE: u8 = 0x14;
pub const CMD_FIRMWARE_BLOCK_READ: u8 = 0x4a;
pub const CMD_KEEPALIVE: u8 = 0x93;

// -- Geometry --
pub const FEATURE_BUFFER_SIZE: usize = 256;
pub const HMD_REPORT_SIZE: usize = 64;
pub const DEVICE_INFO_SIZE: usize = 22;
pub const IMU_CONFIG_SIZE: usize = 21;
pub const STATUS_REPORT_MIN_SIZE: usize = 2;
pub const CONTROLLER_HEADER_SIZE: usize = 15;
pub const INFO_BLOCK_SIZE: usize = 19;
pub const MAX_INFO_BLOCKS: usize = 8;
pub const MAX_EXTRA_BYTES: usize = 48;
pub const FIRMWARE_CHUNK_SIZE: usize = 64;
pub const FIRMWARE_CHUNK_HEADER_SIZE: usize = 3;
pub const MAX_FIRMWARE_BLOCK_LEN: usize = 64 * 1024;
/// Largest controller report: header, 8 blocks, extra length, 48 extra bytes.
pub const MAX_CONTROLLER_REPORT_SIZE: usize =
    CONTROLLER_HEADER_SIZE + MAX_INFO_BLOCKS * INFO_BLOCK_SIZE + 1 + MAX_EXTRA_BYTES;
/// Smallest read buffer that holds every inbound report whole.
pub const MIN_READ_BUFFER_SIZE: usize = MAX_CONTROLLER_REPORT_SIZE;

const IMU_SAMPLE_SIZE: usize = 15;
const HMD_SAMPLES_OFFSET: usize = 7;

// -- Controller block tags --
pub const BLOCK_MASK08: u8 = 0x08;
pub const BLOCK_BUTTONS: u8 = 0x0c;
pub const BLOCK_FINGERS: u8 = 0x0d;
pub const BLOCK_MASK0E: u8 = 0x0e;
pub const BLOCK_TRIGGER_GRIP: u8 = 0x1b;
pub const BLOCK_JOYSTICK: u8 = 0x22;
pub const BLOCK_CAPSENSE: u8 = 0x27;
pub const BLOCK_IMU: u8 = 0x91;

/// Keepalive with a 3000 ms device-side timeout (0x0bb8), sent every second.
pub const KEEPALIVE: [u8; 6] = [CMD_KEEPALIVE, 0x01, 0xb8, 0x0b, 0x00, 0x00];

/// Kind of an inbound frame, from its first byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Hmd,
    Status,
    Controller,
    Unknown(u8),
}

impl ReportKind {
    pub fn of(frame: &[u8]) -> Option<ReportKind> {
        frame.first().map(|&id| match id {
            REPORT_HMD => ReportKind::Hmd,
            REPORT_STATUS => ReportKind::Status,
            REPORT_CONTROLLER => ReportKind::Controller,
            other => ReportKind::Unknown(other),
        })
    }
}

fn le_u16(data: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([data[at], data[at + 1]])
}

fn le_i16(data: &[u8], at: usize) -> i16 {
    i16::from_le_bytes([data[at], data[at + 1]])
}

fn le_u32(data: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([data[at], data[at + 1], data[at + 2], data[at + 3]])
}

fn le_f32(data: &[u8], at: usize) -> f32 {
    f32::from_bits(le_u32(data, at))
}

fn le_i16x3(data: &[u8], at: usize) -> [i16; 3] {
    [le_i16(data, at), le_i16(data, at + 2), le_i16(data, at + 4)]
}

fn expect_len(report: &'static str, data: &[u8], expected: usize) -> Result<(), DecodeReject> {
    if data.len() != expected {
        return Err(DecodeReject::Length {
            report,
            expected,
            actual: data.len(),
        });
    }
    Ok(())
}

fn expect_id(report: &'static str, data: &[u8], expected: u8) -> Result<(), DecodeReject> {
    if data[0] != expected {
        return Err(DecodeReject::ReportId {
            report,
            expected,
            found: data[0],
        });
    }
    Ok(())
}

/// Parse a 64-byte HMD IMU report. Only the length is checked; routing
/// by report id is the caller's job.
///
/// Layout:
/// - `[0]`: 0x65
/// - `[1..3]`: unknown constant
/// - `[3..7]`: u32 device timestamp (µs)
/// - `[7..52]`: 3x sample: marker u8, accel i16x3, gyro i16x3, temperature i16
/// - `[52]`: marker, `[53]`: unknown
/// - `[54..58]`: u32 frame timestamp
/// - `[58..60]`: zero, `[60..62]`: i16 frame id, `[62..64]`: zero
pub fn decode_hmd_report(data: &[u8]) -> Result<HmdReport, DecodeReject> {
    expect_len("HMD", data, HMD_REPORT_SIZE)?;

    let mut samples = [ImuSample::default(); 3];
    for (i, sample) in samples.iter_mut().enumerate() {
        let at = HMD_SAMPLES_OFFSET + i * IMU_SAMPLE_SIZE;
        *sample = ImuSample {
            marker: data[at],
            accel: le_i16x3(data, at + 1),
            gyro: le_i16x3(data, at + 7),
            temperature: le_i16(data, at + 13),
        };
    }

    Ok(HmdReport {
        id: data[0],
        unknown_const1: le_u16(data, 1),
        timestamp: le_u32(data, 3),
        samples,
        marker: data[52],
        unknown2: data[53],
        frame_timestamp: le_u32(data, 54),
        unknown_zero1: le_i16(data, 58),
        frame_id: le_i16(data, 60),
        unknown_zero2: le_i16(data, 62),
    })
}

/// Inverse of [`decode_hmd_report`]. Used to synthesize frames.
pub fn encode_hmd_report(report: &HmdReport) -> [u8; HMD_REPORT_SIZE] {
    let mut buf = [0u8; HMD_REPORT_SIZE];
    buf[0] = report.id;
    buf[1..3].copy_from_slice(&report.unknown_const1.to_le_bytes());
    buf[3..7].copy_from_slice(&report.timestamp.to_le_bytes());
    for (i, s) in report.samples.iter().enumerate() {
        let at = HMD_SAMPLES_OFFSET + i * IMU_SAMPLE_SIZE;
        buf[at] = s.marker;
        for axis in 0..3 {
            buf[at + 1 + axis * 2..at + 3 + axis * 2].copy_from_slice(&s.accel[axis].to_le_bytes());
            buf[at + 7 + axis * 2..at + 9 + axis * 2].copy_from_slice(&s.gyro[axis].to_le_bytes());
        }
        buf[at + 13..at + 15].copy_from_slice(&s.temperature.to_le_bytes());
    }
    buf[52] = report.marker;
    buf[53] = report.unknown2;
    buf[54..58].copy_from_slice(&report.frame_timestamp.to_le_bytes());
    buf[58..60].copy_from_slice(&report.unknown_zero1.to_le_bytes());
    buf[60..62].copy_from_slice(&report.frame_id.to_le_bytes());
    buf[62..64].copy_from_slice(&report.unknown_zero2.to_le_bytes());
    buf
}

/// Parse a system status report. Byte 1 is the proximity sensor.
pub fn decode_status_report(data: &[u8]) -> Result<StatusReport, DecodeReject> {
    if data.len() < STATUS_REPORT_MIN_SIZE {
        return Err(DecodeReject::Truncated {
            report: "status",
            needed: STATUS_REPORT_MIN_SIZE,
            actual: data.len(),
        });
    }
    expect_id("status", data, REPORT_STATUS)?;
    Ok(StatusReport {
        proximity: data[1] != 0,
    })
}

fn decode_info_block(block: &[u8; INFO_BLOCK_SIZE]) -> InfoBlock {
    let mask = |kind| InfoBlock::Mask {
        kind,
        value: block[1],
    };
    match block[0] {
        BLOCK_MASK08 => mask(MaskKind::Mask08),
        BLOCK_BUTTONS => mask(MaskKind::Buttons),
        BLOCK_FINGERS => mask(MaskKind::Fingers),
        BLOCK_MASK0E => mask(MaskKind::Mask0e),
        BLOCK_TRIGGER_GRIP => InfoBlock::TriggerGrip {
            values: [block[1], block[2], block[3]],
        },
        BLOCK_JOYSTICK => InfoBlock::Joystick {
            x: le_i16(block, 1),
            y: le_i16(block, 3),
        },
        BLOCK_CAPSENSE => InfoBlock::Capsense {
            a_x: block[1],
            b_y: block[2],
            joystick: block[3],
            trigger: block[4],
        },
        BLOCK_IMU => InfoBlock::Imu {
            timestamp: le_u32(block, 1),
            unknown_varying2: le_u16(block, 5),
            accel: le_i16x3(block, 7),
            gyro: le_i16x3(block, 13),
        },
        _ => InfoBlock::Raw(*block),
    }
}

/// Parse a controller report.
///
/// Layout:
/// - `[0]`: 0x67
/// - `[1..9]`: u64 device id
/// - `[9]`: data length (flags and log are only valid when >= 4)
/// - `[10]`: log flags, `[11..14]`: log characters
/// - `[14]`: block count (max 8)
/// - 19 bytes per block, tag first
/// - extra-bytes length (max 48), then the extra bytes
///
/// The frame length must equal exactly what the header declares.
pub fn decode_controller_report(data: &[u8]) -> Result<ControllerReport, DecodeReject> {
    if data.len() < CONTROLLER_HEADER_SIZE {
        return Err(DecodeReject::Truncated {
            report: "controller",
            needed: CONTROLLER_HEADER_SIZE,
            actual: data.len(),
        });
    }
    expect_id("controller", data, REPORT_CONTROLLER)?;

    let block_count = data[14];
    if block_count as usize > MAX_INFO_BLOCKS {
        return Err(DecodeReject::TooManyBlocks(block_count));
    }

    let extra_len_at = CONTROLLER_HEADER_SIZE + block_count as usize * INFO_BLOCK_SIZE;
    if data.len() <= extra_len_at {
        return Err(DecodeReject::Truncated {
            report: "controller",
            needed: extra_len_at + 1,
            actual: data.len(),
        });
    }
    let extra_len = data[extra_len_at];
    if extra_len as usize > MAX_EXTRA_BYTES {
        return Err(DecodeReject::TooManyExtraBytes(extra_len));
    }
    expect_len("controller", data, extra_len_at + 1 + extra_len as usize)?;

    let data_len = data[9];
    let log = (data_len >= 4).then(|| LogFragment {
        flags: LogFlags::from_bits_retain(data[10]),
        chars: [data[11], data[12], data[13]],
    });

    let blocks = data[CONTROLLER_HEADER_SIZE..extra_len_at]
        .chunks_exact(INFO_BLOCK_SIZE)
        .map(|chunk| {
            let mut block = [0u8; INFO_BLOCK_SIZE];
            block.copy_from_slice(chunk);
            decode_info_block(&block)
        })
        .collect();

    let mut device_id = [0u8; 8];
    device_id.copy_from_slice(&data[1..9]);

    Ok(ControllerReport {
        device_id: u64::from_le_bytes(device_id),
        data_len,
        log,
        blocks,
        extra_bytes: data[extra_len_at + 1..].to_vec(),
    })
}

/// Parse feature report 0x06.
pub fn decode_device_info(data: &[u8]) -> Result<DeviceInfo, DecodeReject> {
    expect_len("device info", data, DEVICE_INFO_SIZE)?;
    expect_id("device info", data, FEATURE_DEVICE_INFO)?;

    let mut reserved = [0u8; 14];
    reserved.copy_from_slice(&data[8..22]);

    Ok(DeviceInfo {
        v_resolution: le_u16(data, 1),
        h_resolution: le_u16(data, 3),
        unknown1: le_u16(data, 5),
        refresh_rate: data[7],
        reserved,
    })
}

/// Parse feature report 0x09.
///
/// A zero sample rate or a zero/non-finite divisor is rejected, since every
/// sample would otherwise convert to infinity.
pub fn decode_imu_config(data: &[u8]) -> Result<ImuConfig, DecodeReject> {
    expect_len("IMU config", data, IMU_CONFIG_SIZE)?;
    expect_id("IMU config", data, FEATURE_IMU_CONFIG)?;

    let config = ImuConfig {
        imu_hz: le_u32(data, 1),
        gyro_scale: le_f32(data, 5),
        accel_scale: le_f32(data, 9),
        temperature_scale: le_f32(data, 13),
        temperature_offset: le_f32(data, 17),
    };

    let invalid = |field| DecodeReject::InvalidField {
        report: "IMU config",
        field,
    };
    if config.imu_hz == 0 {
        return Err(invalid("imu_hz"));
    }
    if !config.gyro_scale.is_finite() {
        return Err(invalid("gyro_scale"));
    }
    if !config.accel_scale.is_finite() || config.accel_scale == 0.0 {
        return Err(invalid("accel_scale"));
    }
    if !config.temperature_scale.is_finite() || config.temperature_scale == 0.0 {
        return Err(invalid("temperature_scale"));
    }
    if !config.temperature_offset.is_finite() {
        return Err(invalid("temperature_offset"));
    }
    Ok(config)
}

/// Keepalive command; the headset idles 3 s after the last one.
pub fn encode_keepalive() -> [u8; 6] {
    KEEPALIVE
}

/// Start or stop HMD streaming.
pub fn encode_enable(enable: bool) -> [u8; 2] {
    [CMD_HMD_ENABLE, enable as u8]
}

/// Turns the radio link to the touch controllers on or off.
pub fn encode_radio_enable(enable: bool) -> [u8; 2] {
    [CMD_RADIO_ENABLE, if enable { 0x02 } else { 0x00 }]
}

/// Switch the display panel on or off.
pub fn encode_screen_enable(enable: bool) -> [u8; 2] {
    [CMD_SCREEN_ENABLE, enable as u8]
}

/// Ask for firmware block `block_id`; the reply arrives as 0x4b chunks.
pub fn encode_firmware_block_request(block_id: u8) -> [u8; 2] {
    [CMD_FIRMWARE_BLOCK_READ, block_id]
}

/// Validate one firmware chunk header and return its payload.
///
/// Chunk layout: `[0x4b, block_id, len, payload[len]]`.
fn firmware_chunk_payload(chunk: &[u8], block_id: u8) -> Result<&[u8], DecodeReject> {
    if chunk.len() < FIRMWARE_CHUNK_HEADER_SIZE {
        return Err(DecodeReject::ChunkHeader(format!(
            "chunk is {} bytes, shorter than its header",
            chunk.len()
        )));
    }
    if chunk[0] != FEATURE_FIRMWARE_CHUNK {
        return Err(DecodeReject::ChunkHeader(format!(
            "report id 0x{:02x}",
            chunk[0]
        )));
    }
    if chunk[1] != block_id {
        return Err(DecodeReject::ChunkHeader(format!(
            "block 0x{:02x} while reading block 0x{:02x}",
            chunk[1], block_id
        )));
    }
    let len = chunk[2] as usize;
    let available = chunk.len() - FIRMWARE_CHUNK_HEADER_SIZE;
    if len > available {
        return Err(DecodeReject::ChunkHeader(format!(
            "declares {} payload bytes, only {} received",
            len, available
        )));
    }
    Ok(&chunk[FIRMWARE_CHUNK_HEADER_SIZE..FIRMWARE_CHUNK_HEADER_SIZE + len])
}

/// Reassemble a firmware block from its chunked feature-report stream.
///
/// `read_chunk` fills the given buffer (whose first byte is preset to the
/// chunk report id) and returns the number of bytes received. The first
/// chunk's payload starts with the blob length as u32 LE. The request
/// command must already have been sent.
pub fn decode_firmware_block_stream<F>(block_id: u8, mut read_chunk: F) -> crate::Result<Vec<u8>>
where
    F: FnMut(&mut [u8]) -> crate::Result<usize>,
{
    let mut chunk = [0u8; FIRMWARE_CHUNK_SIZE];
    let mut total: Option<usize> = None;
    let mut out = Vec::new();

    loop {
        chunk.fill(0);
        chunk[0] = FEATURE_FIRMWARE_CHUNK;
        let received = read_chunk(&mut chunk)?.min(FIRMWARE_CHUNK_SIZE);
        let mut payload = firmware_chunk_payload(&chunk[..received], block_id)?;

        let expected = match total {
            Some(expected) => {
                if payload.is_empty() {
                    return Err(DecodeReject::ChunkHeader(format!(
                        "empty chunk after {} of {} bytes",
                        out.len(),
                        expected
                    ))
                    .into());
                }
                expected
            }
            None => {
                if payload.len() < 4 {
                    return Err(DecodeReject::ChunkHeader(
                        "first chunk lacks the length prefix".into(),
                    )
                    .into());
                }
                let declared = le_u32(payload, 0);
                if declared as usize > MAX_FIRMWARE_BLOCK_LEN {
                    return Err(DecodeReject::FirmwareBlockTooLarge(declared).into());
                }
                payload = &payload[4..];
                out.reserve_exact(declared as usize);
                *total.insert(declared as usize)
            }
        };

        if out.len() + payload.len() > expected {
            return Err(DecodeReject::ChunkHeader(format!(
                "chunk overruns the declared {} bytes",
                expected
            ))
            .into());
        }
        out.extend_from_slice(payload);

        if out.len() == expected {
            return Ok(out);
        }
    }
}
