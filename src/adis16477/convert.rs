// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use core::f32::consts::{FRAC_1_SQRT_2, PI};

use strum::{EnumCount, EnumIter, FromRepr, IntoStaticStr};

use crate::adis16477::{ACCEL_LSB_MG, GYRO_LSB_DPS, ONE_G, TEMP_LSB_C};

/// Gyro scale, rad/s per count.
pub const GYRO_SCALE_RAD_S: f32 = GYRO_LSB_DPS * PI / 180.0;

/// Accelerometer scale, m/s^2 per count.
pub const ACCEL_SCALE_M_S2: f32 = ACCEL_LSB_MG * ONE_G / 1000.0;

const DEFAULT_GYRO_RANGE_DPS: f32 = 500.0;
const DEFAULT_ACCEL_RANGE_G: f32 = 40.0;

/// Per-axis bias and scale of one sensor. The bias is subtracted in output units before scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChannelCalibration {
    /// Bias per axis, rad/s or m/s^2
    pub offset: [f32; 3],
    /// Scale factor per axis
    pub scale: [f32; 3],
}

impl Default for ChannelCalibration {
    fn default() -> Self {
        ChannelCalibration {
            offset: [0.0; 3],
            scale: [1.0; 3],
        }
    }
}

impl ChannelCalibration {
    /// Calibrates an axis vector already in physical units.
    pub fn apply(&self, value: [f32; 3]) -> [f32; 3] {
        let mut out = [0.0; 3];
        for i in 0..3 {
            out[i] = (value[i] - self.offset[i]) * self.scale[i];
        }
        out
    }

    /// true if every coefficient is a finite number
    pub fn is_valid(&self) -> bool {
        self.offset
            .iter()
            .chain(self.scale.iter())
            .all(|v| v.is_finite())
    }
}

/// Calibration of both sensors plus the full scale ranges.
///
/// The ranges are only reported and used to raise the clipping flags. Samples outside them are
/// still forwarded.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationParameters {
    /// Gyro bias and scale
    pub gyro: ChannelCalibration,
    /// Accelerometer bias and scale
    pub accel: ChannelCalibration,
    /// Gyro full scale range in rad/s
    pub gyro_range_rad_s: f32,
    /// Accelerometer full scale range in m/s^2
    pub accel_range_m_s2: f32,
}

impl Default for CalibrationParameters {
    fn default() -> Self {
        CalibrationParameters {
            gyro: ChannelCalibration::default(),
            accel: ChannelCalibration::default(),
            gyro_range_rad_s: DEFAULT_GYRO_RANGE_DPS * PI / 180.0,
            accel_range_m_s2: DEFAULT_ACCEL_RANGE_G * ONE_G,
        }
    }
}

impl CalibrationParameters {
    /// Raw gyro counts to calibrated rad/s.
    pub fn convert_gyro(&self, raw: [i16; 3]) -> [f32; 3] {
        self.gyro.apply(scale(raw, GYRO_SCALE_RAD_S))
    }

    /// Raw accelerometer counts to calibrated m/s^2.
    pub fn convert_accel(&self, raw: [i16; 3]) -> [f32; 3] {
        self.accel.apply(scale(raw, ACCEL_SCALE_M_S2))
    }

    /// Axes at or beyond the accelerometer range.
    pub fn accel_clipping(&self, accel: &[f32; 3]) -> [bool; 3] {
        accel.map(|a| libm::fabsf(a) >= self.accel_range_m_s2)
    }

    /// true if both channels and both ranges are usable
    pub fn is_valid(&self) -> bool {
        self.gyro.is_valid()
            && self.accel.is_valid()
            && self.gyro_range_rad_s > 0.0
            && self.accel_range_m_s2 > 0.0
    }
}

fn scale(raw: [i16; 3], lsb: f32) -> [f32; 3] {
    raw.map(|r| r as f32 * lsb)
}

/// Temperature counts to degrees Celsius.
pub fn temperature_c(raw: i16) -> f32 {
    raw as f32 * TEMP_LSB_C
}

/// Sensor mounting rotation, applied after calibration.
///
/// The discriminants follow the usual autopilot numbering, so a parameter index maps straight to
/// a variant through [`Rotation::from_repr`]. Each rotation is a yaw in 45 degree steps, optionally
/// preceded by a roll of 180 degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, FromRepr, IntoStaticStr, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum Rotation {
    #[default]
    None = 0,
    Yaw45 = 1,
    Yaw90 = 2,
    Yaw135 = 3,
    Yaw180 = 4,
    Yaw225 = 5,
    Yaw270 = 6,
    Yaw315 = 7,
    Roll180 = 8,
    Roll180Yaw45 = 9,
    Roll180Yaw90 = 10,
    Roll180Yaw135 = 11,
    /// same as a roll of 180 followed by a yaw of 180
    Pitch180 = 12,
    Roll180Yaw225 = 13,
    Roll180Yaw270 = 14,
    Roll180Yaw315 = 15,
}

impl Rotation {
    /// Roll flag and number of 45 degree yaw steps.
    fn decompose(self) -> (bool, u8) {
        let index = self as u8;
        (index >= 8, index % 8)
    }

    /// Rotates a sensor frame vector into the vehicle frame.
    pub fn apply(self, v: [f32; 3]) -> [f32; 3] {
        let (roll, steps) = self.decompose();
        let [x, y, z] = if roll { [v[0], -v[1], -v[2]] } else { v };

        let (c, s) = match steps {
            0 => (1.0, 0.0),
            1 => (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            2 => (0.0, 1.0),
            3 => (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
            4 => (-1.0, 0.0),
            5 => (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
            6 => (0.0, -1.0),
            _ => (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
        };

        [c * x - s * y, s * x + c * y, z]
    }

    /// Name for logging.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}
