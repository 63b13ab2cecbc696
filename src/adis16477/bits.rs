// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use bitfield::bitfield;

bitfield! {
    /// bitfields of DIAG_STAT register. Every flag is an error or status condition, so a healthy
    /// device reads all zeros.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct DiagStat(u16);
    impl Debug;
    /// the device has stopped because of an internal clock failure
    pub clock_error, set_clock_error: 7;
    /// flash memory test failed
    pub memory_failure, set_memory_failure: 6;
    /// one of the inertial sensors failed its self test
    pub sensor_failure, set_sensor_failure: 5;
    /// the supply dropped low enough to put the device in standby
    pub standby, set_standby: 4;
    /// the last SPI transaction did not complete with a whole number of 16 bit words
    pub spi_error, set_spi_error: 3;
    /// the last flash update did not complete
    pub flash_update_failure, set_flash_update_failure: 2;
    /// samples were overwritten before they were read
    pub data_path_overrun, set_data_path_overrun: 1;
}

bitfield! {
    /// bitfields of GLOB_CMD register. Writing a one starts the command.
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct GlobCmd(u16);
    impl Debug;
    /// software reset
    pub software_reset, set_software_reset: 7;
    /// flash memory test
    pub flash_test, set_flash_test: 4;
    /// save the user registers to flash
    pub flash_update, set_flash_update: 3;
    /// run the automatic sensor self test
    pub sensor_self_test, set_sensor_self_test: 2;
    /// restore factory calibration
    pub factory_restore, set_factory_restore: 1;
}

bitfield! {
    /// bitfields of MSC_CTRL register
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct MscCtrl(u16);
    impl Debug;
    /// apply an internal excitation to the sensors, used by the manual self test
    pub sensor_self_test, set_sensor_self_test: 10;
    /// compensate the gyros for linear acceleration
    pub linear_g_compensation, set_linear_g_compensation: 7;
    /// align the accelerometer outputs to the point of percussion
    pub point_of_percussion, set_point_of_percussion: 6;
    /// sync function. 0 = internal clock, 1 = direct sync, 2 = scaled sync, 3 = output sync
    pub u8, sync_mode, set_sync_mode: 4, 2;
    /// sample on the rising edge of the sync input
    pub sync_rising_edge, set_sync_rising_edge: 1;
    /// data ready pin is active high
    pub data_ready_active_high, set_data_ready_active_high: 0;
}

bitfield! {
    /// bitfields of FILT_CTRL register
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct FiltCtrl(u16);
    impl Debug;
    /// Bartlett window FIR filter size, 2^taps taps. Zero disables it.
    pub u8, taps, set_taps: 2, 0;
}

macro_rules! raw_access {
    ($($name:ident),*) => {
        $(
            impl $name {
                /// Wraps a raw register value.
                pub const fn from_bits(bits: u16) -> Self {
                    $name(bits)
                }

                /// The raw register value.
                pub const fn bits(&self) -> u16 {
                    self.0
                }
            }
        )*
    };
}

raw_access!(DiagStat, GlobCmd, MscCtrl, FiltCtrl);

impl DiagStat {
    /// true if any flag is raised
    pub fn any(&self) -> bool {
        self.0 != 0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for DiagStat {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(
            fmt,
            "DiagStat {{ clock: {}, memory: {}, sensor: {}, standby: {}, spi: {}, flash: {}, overrun: {} }}",
            self.clock_error(),
            self.memory_failure(),
            self.sensor_failure(),
            self.standby(),
            self.spi_error(),
            self.flash_update_failure(),
            self.data_path_overrun()
        )
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for MscCtrl {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "MscCtrl({=u16:#x})", self.0)
    }
}
