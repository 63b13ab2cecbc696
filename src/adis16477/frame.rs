// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use crate::adis16477::bits::DiagStat;

/// Length of a burst frame in bytes.
pub const FRAME_LEN: usize = 22;

const CHECKSUM_INDEX: usize = 20;

/// A burst frame as it came off the bus, fields still in sensor counts.
///
/// | bytes  | contents                         |
/// |--------|----------------------------------|
/// | 0..2   | command echo                     |
/// | 2..4   | DIAG_STAT                        |
/// | 4..10  | gyro x, y, z                     |
/// | 10..16 | accel x, y, z                    |
/// | 16..18 | temperature                      |
/// | 18..20 | DATA_CNTR                        |
/// | 20     | checksum                         |
/// | 21     | filler                           |
///
/// Every word is big endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawFrame {
    /// Whatever was clocked in while the burst command went out
    pub cmd: u16,
    /// Status flags
    pub diag_stat: DiagStat,
    /// Angular rate, 0.025 deg/s per count
    pub gyro: [i16; 3],
    /// Acceleration, 1.25 mg per count
    pub accel: [i16; 3],
    /// Temperature, 0.1 degC per count
    pub temp: i16,
    /// Free running sample counter
    pub data_cntr: u16,
    /// Checksum byte as received
    pub checksum: u8,
}

/// Why a frame was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameError {
    /// Buffer isn't a whole frame
    Length(usize),
    /// Checksum byte didn't match the bytes it covers
    Checksum {
        /// checksum byte in the frame
        received: u8,
        /// checksum computed over the frame
        computed: u8,
    },
}

/// Wrapping 8 bit sum of every byte except the checksum byte itself.
///
/// Coverage and word order are deliberate choices. The command echo and the filler
/// byte are summed too, and words are read big endian. The part's own checksum is a
/// 16 bit word over DIAG_STAT..DATA_CNTR only, so on real hardware byte 20 as read
/// here would be the high byte of that word. Check this before hardware bring-up.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != CHECKSUM_INDEX)
        .fold(0u8, |sum, (_, b)| sum.wrapping_add(*b))
}

fn word(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

/// Validates and unpacks one burst frame.
pub fn decode(bytes: &[u8]) -> Result<RawFrame, FrameError> {
    if bytes.len() != FRAME_LEN {
        return Err(FrameError::Length(bytes.len()));
    }

    let received = bytes[CHECKSUM_INDEX];
    let computed = checksum(bytes);
    if received != computed {
        return Err(FrameError::Checksum { received, computed });
    }

    let axes = |at: usize| {
        [
            word(bytes, at) as i16,
            word(bytes, at + 2) as i16,
            word(bytes, at + 4) as i16,
        ]
    };

    Ok(RawFrame {
        cmd: word(bytes, 0),
        diag_stat: DiagStat::from_bits(word(bytes, 2)),
        gyro: axes(4),
        accel: axes(10),
        temp: word(bytes, 16) as i16,
        data_cntr: word(bytes, 18),
        checksum: received,
    })
}

impl RawFrame {
    /// Packs the frame into bus order and fills in a valid checksum. Used to build frames for
    /// simulated devices.
    pub fn encode(&self) -> [u8; FRAME_LEN] {
        let mut bytes = [0u8; FRAME_LEN];
        let mut put = |at: usize, value: u16| {
            bytes[at..at + 2].copy_from_slice(&value.to_be_bytes());
        };

        put(0, self.cmd);
        put(2, self.diag_stat.bits());
        for (i, g) in self.gyro.iter().enumerate() {
            put(4 + 2 * i, *g as u16);
        }
        for (i, a) in self.accel.iter().enumerate() {
            put(10 + 2 * i, *a as u16);
        }
        put(16, self.temp as u16);
        put(18, self.data_cntr);

        bytes[CHECKSUM_INDEX] = checksum(&bytes);
        bytes
    }
}
