// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

/// Register bitfields (DIAG_STAT, GLOB_CMD, MSC_CTRL, FILT_CTRL)
pub mod bits;

/// Unit conversion, calibration and mounting rotation
pub mod convert;

/// Error counters, callback timing statistics and the fault-stop monitor
pub mod counters;

/// The driver itself: lifecycle state machine, periodic callback and control surface
pub mod driver;

/// Second order low pass filter bank
pub mod filter;

/// Burst frame layout and checksum validation
pub mod frame;

/// Delta-angle and delta-velocity integrators
pub mod integrator;

/// Per-sample processing chain from a decoded frame to finished reports
pub mod pipeline;

/// Finished sample reports and the publisher interface
pub mod report;


/// The SPI module holds the bus transport used to talk to the device
pub mod spi;

pub use bits::{DiagStat, FiltCtrl, GlobCmd, MscCtrl};
pub use convert::{CalibrationParameters, ChannelCalibration, Rotation};
pub use counters::{Counters, FaultMonitor, IntervalStats};
pub use driver::{Adis16477, SampleError, Status, Timer};
pub use filter::LowPassFilter2p;
pub use frame::{FrameError, RawFrame, FRAME_LEN};
pub use integrator::{Coalesce, Integrator};
pub use pipeline::Pipeline;
pub use report::{AccelReport, GyroReport, Publisher, ReportQueue};
pub use self_test::SelfTestFailure;
pub use spi::{SpiTransport, Transport};

use strum::IntoStaticStr;

const READ_REG: bool = true;
const WRITE_REG: bool = false;

/// Expected contents of PROD_ID.
pub const PROD_ID_ADIS16477: u16 = 0x405D;

/// Gyro sensitivity in degrees per second per LSB.
pub const GYRO_LSB_DPS: f32 = 0.025;
/// Accelerometer sensitivity in mg per LSB.
pub const ACCEL_LSB_MG: f32 = 1.25;
/// Temperature sensitivity in degrees Celsius per LSB.
pub const TEMP_LSB_C: f32 = 0.1;
/// Standard gravity in m/s^2.
pub const ONE_G: f32 = 9.80665;

/// Internal sample rate that DEC_RATE divides down from.
pub const INTERNAL_RATE_HZ: u16 = 2000;

/// Default output data rate.
pub const DEFAULT_SAMPLE_RATE_HZ: u16 = 1000;
/// Default gyro low pass cutoff.
pub const DEFAULT_GYRO_CUTOFF_HZ: f32 = 80.0;
/// Default accelerometer low pass cutoff.
pub const DEFAULT_ACCEL_CUTOFF_HZ: f32 = 30.0;
/// Default window of the accelerometer integrator, in microseconds.
pub const DEFAULT_ACCEL_WINDOW_US: u32 = 4000;

/// MSC_CTRL after reset: data ready active high, point of percussion alignment and linear-g
/// compensation enabled.
pub const MSC_CTRL_DEFAULT: u16 = 0x00C1;

// Timings from the data sheet
const RESET_RECOVERY_MS: u32 = 193;
const MEMORY_TEST_MS: u32 = 32;
const SENSOR_TEST_MS: u32 = 14;
const STALL_US: u32 = 16;

/// The possible errors that the driver can return from its command paths.
///
/// `Bus` wraps whatever the transport reported. The rest are produced by the driver itself.
/// Per-sample problems inside the periodic callback never show up here, see
/// [`SampleError`](driver::SampleError).
#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    /// An error occurred when using the bus
    #[error("bus error: {0:?}")]
    Bus(E),
    /// PROD_ID did not hold the ADIS16477 identifier
    #[error("unexpected product id {found:#06x}")]
    Probe {
        /// Value read from PROD_ID
        found: u16,
    },
    /// A configuration register did not read back what was written
    #[error("{register:?} read back {found:#06x}, wrote {expected:#06x}")]
    Configuration {
        /// Register that failed verification
        register: Register,
        /// Value written
        expected: u16,
        /// Value read back
        found: u16,
    },
    /// A built-in test failed
    #[error("self-test failed: {0}")]
    SelfTest(SelfTestFailure),
    /// An invalid input was passed to the function
    #[error("invalid input")]
    InvalidInput,
    /// The operation is not allowed in the current driver state
    #[error("not allowed while {0:?}")]
    InvalidState(DriverState),
    /// Periodic sampling is running, stop it first
    #[error("sampling is active")]
    Busy,
}

impl<E> From<E> for Error<E> {
    fn from(error: E) -> Self {
        Error::Bus(error)
    }
}

#[cfg(feature = "defmt")]
impl<E> defmt::Format for Error<E> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Bus(_) => defmt::write!(fmt, "Bus Error!"),
            Error::Probe { found } => {
                defmt::write!(fmt, "Unexpected product id {=u16:#x}", *found)
            }
            Error::Configuration {
                register,
                expected,
                found,
            } => defmt::write!(
                fmt,
                "{} read back {=u16:#x}, wrote {=u16:#x}",
                register,
                *found,
                *expected
            ),
            Error::SelfTest(failure) => defmt::write!(fmt, "Self-test failed: {}", failure),
            Error::InvalidInput => defmt::write!(fmt, "Invalid input in the function!"),
            Error::InvalidState(state) => defmt::write!(fmt, "Not allowed while {}", state),
            Error::Busy => defmt::write!(fmt, "Sampling is active"),
        }
    }
}

/// Lifecycle states of the driver.
///
/// ```text
/// Uninitialized -> Probed -> Configured -> Sampling <-> Faulted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DriverState {
    /// Nothing known about the device yet
    Uninitialized,
    /// Product id matched
    Probed,
    /// Reset and configuration registers verified
    Configured,
    /// Periodic callback registered
    Sampling,
    /// Sampling was stopped because of persistent errors, probe again to recover
    Faulted,
}

impl DriverState {
    /// Name of the state, for logging.
    pub fn as_str(self) -> &'static str {
        self.into()
    }
}

/// Registers used by the driver. Addresses are those of the low byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Register {
    /// Status and error flags
    DiagStat,
    /// Gyro x output, upper word
    XGyroOut,
    /// Gyro y output, upper word
    YGyroOut,
    /// Gyro z output, upper word
    ZGyroOut,
    /// Accelerometer x output, upper word
    XAcclOut,
    /// Accelerometer y output, upper word
    YAcclOut,
    /// Accelerometer z output, upper word
    ZAcclOut,
    /// Temperature output
    TempOut,
    /// Sample counter
    DataCntr,
    /// Bartlett window FIR filter control
    FiltCtrl,
    /// Miscellaneous control
    MscCtrl,
    /// Decimation rate
    DecRate,
    /// Global commands
    GlobCmd,
    /// Firmware revision
    FirmRev,
    /// Product identification
    ProdId,
    /// Serial number
    SerialNum,
}

impl Register {
    /// Address byte for a register access. Writes carry the top bit set.
    pub fn get_addr(&self, is_read: bool) -> u8 {
        let addr = match *self {
            Register::DiagStat => 0x02,
            Register::XGyroOut => 0x06,
            Register::YGyroOut => 0x0A,
            Register::ZGyroOut => 0x0E,
            Register::XAcclOut => 0x12,
            Register::YAcclOut => 0x16,
            Register::ZAcclOut => 0x1A,
            Register::TempOut => 0x1C,
            Register::DataCntr => 0x22,
            Register::FiltCtrl => 0x5C,
            Register::MscCtrl => 0x60,
            Register::DecRate => 0x64,
            Register::GlobCmd => 0x68,
            Register::FirmRev => 0x6C,
            Register::ProdId => 0x72,
            Register::SerialNum => 0x74,
        };

        if is_read {
            addr
        } else {
            1 << 7 | addr
        }
    }
}

/// Bartlett window FIR filter length, applied inside the device ahead of decimation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FirTaps {
    /// Filter off
    Disabled,
    /// 2 taps
    Taps2,
    /// 4 taps
    Taps4,
    /// 8 taps
    Taps8,
    /// 16 taps
    Taps16,
    /// 32 taps
    Taps32,
    /// 64 taps
    Taps64,
}

impl FirTaps {
    fn bits(self) -> u8 {
        match self {
            FirTaps::Disabled => 0,
            FirTaps::Taps2 => 1,
            FirTaps::Taps4 => 2,
            FirTaps::Taps8 => 3,
            FirTaps::Taps16 => 4,
            FirTaps::Taps32 => 5,
            FirTaps::Taps64 => 6,
        }
    }
}

/// Driver configuration. Everything here is fixed while sampling; change it through the
/// driver's control methods after stopping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Output data rate in Hz. Must divide 2000 Hz evenly.
    pub sample_rate_hz: u16,
    /// Gyro low pass cutoff in Hz, zero disables the filter
    pub gyro_cutoff_hz: f32,
    /// Accelerometer low pass cutoff in Hz, zero disables the filter
    pub accel_cutoff_hz: f32,
    /// Quality factor of both low pass filters. 1/sqrt(2) is Butterworth, 0.5 critically damped.
    pub filter_q: f32,
    /// The accelerometer integrator reports once this much time has accumulated
    pub accel_window_us: u32,
    /// FIR filter inside the device
    pub fir_taps: FirTaps,
    /// Scale, bias and full scale range of both channels
    pub calibration: CalibrationParameters,
    /// Mounting rotation from sensor frame to vehicle frame
    pub rotation: Rotation,
    /// Sampling stops once more than this many of the last 64 transfers went bad
    pub bad_transfer_limit: u8,
    /// Sampling stops once DIAG_STAT stays set for this many consecutive frames
    pub diag_fault_limit: u8,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            gyro_cutoff_hz: DEFAULT_GYRO_CUTOFF_HZ,
            accel_cutoff_hz: DEFAULT_ACCEL_CUTOFF_HZ,
            filter_q: filter::BUTTERWORTH_Q,
            accel_window_us: DEFAULT_ACCEL_WINDOW_US,
            fir_taps: FirTaps::Taps16,
            calibration: CalibrationParameters::default(),
            rotation: Rotation::None,
            bad_transfer_limit: 8,
            diag_fault_limit: 10,
        }
    }
}

impl Config {
    /// Period of the sampling callback in microseconds.
    pub fn interval_us(&self) -> u32 {
        1_000_000 / self.sample_rate_hz.max(1) as u32
    }

    /// Checks the configuration for values the driver can't run with.
    pub fn validate(&self) -> bool {
        dec_rate(self.sample_rate_hz).is_some()
            && self.filter_q.is_finite()
            && self.filter_q > 0.0
            && self.gyro_cutoff_hz.is_finite()
            && self.accel_cutoff_hz.is_finite()
            && self.accel_window_us > 0
            && self.bad_transfer_limit > 0
            && self.bad_transfer_limit < counters::TRANSFER_WINDOW
            && self.diag_fault_limit > 0
    }

    fn filt_ctrl(&self) -> FiltCtrl {
        let mut filt = FiltCtrl::default();
        filt.set_taps(self.fir_taps.bits());
        filt
    }
}

/// DEC_RATE value for an output rate, if the rate is one the device can produce.
pub fn dec_rate(rate_hz: u16) -> Option<u16> {
    if rate_hz == 0 || rate_hz > INTERNAL_RATE_HZ || INTERNAL_RATE_HZ % rate_hz != 0 {
        None
    } else {
        Some(INTERNAL_RATE_HZ / rate_hz - 1)
    }
}
