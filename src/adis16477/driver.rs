// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use embedded_hal::delay::DelayNs;

use crate::adis16477::bits::{DiagStat, GlobCmd};
use crate::adis16477::convert::{CalibrationParameters, ChannelCalibration, Rotation};
use crate::adis16477::counters::{Counters, FaultMonitor};
use crate::adis16477::frame::{self, FrameError, FRAME_LEN};
use crate::adis16477::pipeline::Pipeline;
use crate::adis16477::report::Publisher;
use crate::adis16477::self_test;
use crate::adis16477::spi::Transport;
use crate::adis16477::{dec_rate, Config, DriverState, Error, Register};
use crate::adis16477::{MSC_CTRL_DEFAULT, PROD_ID_ADIS16477, RESET_RECOVERY_MS};

const PROBE_ATTEMPTS: usize = 3;

/// Periodic scheduler the driver runs on. The owner calls [`Adis16477::measure`] every time the
/// scheduled period elapses.
pub trait Timer {
    /// Monotonic time in microseconds.
    fn now_us(&self) -> u64;

    /// Starts calling back every `interval_us`, replacing any previous schedule.
    fn schedule_periodic(&mut self, interval_us: u32);

    /// Stops the callbacks. Must be fine to call when nothing is scheduled.
    fn cancel(&mut self);
}

/// Outcome of a sampling period that did not produce a clean sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SampleError {
    /// The driver isn't sampling
    Inactive,
    /// The bus reported an error, the period was skipped
    Bus,
    /// The frame failed its checksum, the period was skipped
    Checksum,
    /// The frame carried DIAG_STAT flags. It was still published.
    Diagnostic(DiagStat),
    /// Sampling stopped because of persistent errors
    Faulted,
}

/// Snapshot of the driver's health.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status {
    /// Lifecycle state
    pub state: DriverState,
    /// Bus plus checksum errors since the driver was created
    pub bad_transfers: u32,
    /// DIAG_STAT of the most recent good frame
    pub last_diag: DiagStat,
    /// All counters
    pub counters: Counters,
    /// PROD_ID read during probe
    pub product_id: u16,
    /// FIRM_REV read during probe
    pub firmware_revision: u16,
    /// SERIAL_NUM read during probe
    pub serial_number: u16,
}

/// ADIS16477 driver.
///
/// Owns the transport, the timer and the publisher. All commands take `&mut self`, and the
/// configuration commands are refused with [`Error::Busy`] while sampling, so the periodic path
/// never sees a half-applied change.
pub struct Adis16477<T, H, P> {
    transport: T,
    timer: H,
    publisher: P,

    config: Config,
    state: DriverState,

    pipeline: Pipeline,
    counters: Counters,
    monitor: FaultMonitor,

    last_diag: DiagStat,
    last_data_cntr: Option<u16>,

    product_id: u16,
    firmware_revision: u16,
    serial_number: u16,
}

impl<T, H, P> Adis16477<T, H, P>
where
    T: Transport,
    H: Timer,
    P: Publisher,
{
    /// Creates the driver. Nothing is sent to the device until [`probe`](Self::probe).
    pub fn new(
        transport: T,
        timer: H,
        publisher: P,
        config: Config,
    ) -> Result<Self, Error<T::Error>> {
        if !config.validate() {
            return Err(Error::InvalidInput);
        }

        Ok(Adis16477 {
            transport,
            timer,
            publisher,
            pipeline: Pipeline::new(&config),
            counters: Counters::default(),
            monitor: FaultMonitor::new(config.bad_transfer_limit, config.diag_fault_limit),
            config,
            state: DriverState::Uninitialized,
            last_diag: DiagStat::default(),
            last_data_cntr: None,
            product_id: 0,
            firmware_revision: 0,
            serial_number: 0,
        })
    }

    fn set_state(&mut self, state: DriverState) {
        if self.state != state {
            info!("ADIS16477: {} -> {}", self.state.as_str(), state.as_str());
            self.state = state;
        }
    }

    fn refuse_while_sampling(&self) -> Result<(), Error<T::Error>> {
        if self.state == DriverState::Sampling {
            Err(Error::Busy)
        } else {
            Ok(())
        }
    }

    fn write_verify_register(
        &mut self,
        register: Register,
        value: u16,
    ) -> Result<(), Error<T::Error>> {
        self.transport.write_register(register, value)?;
        let found = self.transport.read_register(register)?;
        if found != value {
            warn!(
                "ADIS16477: {:?} read back {:#x}, wrote {:#x}",
                register,
                found,
                value
            );
            return Err(Error::Configuration {
                register,
                expected: value,
                found,
            });
        }
        Ok(())
    }

    /// Checks that an ADIS16477 answers on the bus.
    ///
    /// The first word read after power up can be junk, so PROD_ID gets a few attempts. Works from
    /// every state except sampling, which is how a faulted driver is brought back.
    pub fn probe(&mut self) -> Result<(), Error<T::Error>> {
        self.refuse_while_sampling()?;

        let mut result = self.transport.read_register(Register::ProdId);
        for _ in 1..PROBE_ATTEMPTS {
            if matches!(result, Ok(PROD_ID_ADIS16477)) {
                break;
            }
            result = self.transport.read_register(Register::ProdId);
        }

        match result {
            Ok(PROD_ID_ADIS16477) => {}
            Ok(found) => {
                error!("ADIS16477: unexpected product id {:#x}", found);
                self.set_state(DriverState::Uninitialized);
                return Err(Error::Probe { found });
            }
            Err(e) => {
                self.set_state(DriverState::Uninitialized);
                return Err(Error::Bus(e));
            }
        }

        self.product_id = PROD_ID_ADIS16477;
        self.firmware_revision = self.transport.read_register(Register::FirmRev)?;
        self.serial_number = self.transport.read_register(Register::SerialNum)?;

        self.set_state(DriverState::Probed);
        Ok(())
    }

    /// Resets the device and writes the configuration, checking every register by reading it
    /// back. On any failure the driver drops back to probed and configure can simply be retried.
    pub fn configure<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<T::Error>> {
        match self.state {
            DriverState::Sampling => return Err(Error::Busy),
            DriverState::Probed | DriverState::Configured => {}
            state => return Err(Error::InvalidState(state)),
        }

        // whatever was configured before is gone after the reset
        self.set_state(DriverState::Probed);

        let mut reset = GlobCmd::default();
        reset.set_software_reset(true);
        self.transport.write_register(Register::GlobCmd, reset.bits())?;
        delay.delay_ms(RESET_RECOVERY_MS);

        let dec = dec_rate(self.config.sample_rate_hz).ok_or(Error::InvalidInput)?;
        self.write_verify_register(Register::MscCtrl, MSC_CTRL_DEFAULT)?;
        self.write_verify_register(Register::FiltCtrl, self.config.filt_ctrl().bits())?;
        self.write_verify_register(Register::DecRate, dec)?;

        self.pipeline.reset(&self.config);
        self.monitor =
            FaultMonitor::new(self.config.bad_transfer_limit, self.config.diag_fault_limit);
        self.last_diag = DiagStat::default();
        self.last_data_cntr = None;

        self.set_state(DriverState::Configured);
        Ok(())
    }

    /// Schedules the periodic callback. A second call while sampling does nothing.
    pub fn start(&mut self) -> Result<(), Error<T::Error>> {
        match self.state {
            DriverState::Sampling => Ok(()),
            DriverState::Configured => {
                self.pipeline.resume();
                self.counters.interval.restart();
                self.last_data_cntr = None;
                self.timer.schedule_periodic(self.config.interval_us());
                self.set_state(DriverState::Sampling);
                Ok(())
            }
            state => Err(Error::InvalidState(state)),
        }
    }

    /// Cancels the periodic callback. Always safe; filter and integrator state are kept for the
    /// next start. A faulted driver stays faulted.
    pub fn stop(&mut self) {
        self.timer.cancel();
        if self.state == DriverState::Sampling {
            self.set_state(DriverState::Configured);
        }
    }

    fn fault(&mut self) -> SampleError {
        self.timer.cancel();
        error!(
            "ADIS16477: sampling stopped, {} bad transfers, diag {:#x}",
            self.counters.bad_transfers(),
            self.last_diag.bits()
        );
        self.set_state(DriverState::Faulted);
        SampleError::Faulted
    }

    fn bad_transfer(&mut self, kind: SampleError) -> SampleError {
        if self.monitor.record_transfer(true) {
            self.fault()
        } else {
            kind
        }
    }

    /// The periodic callback. Reads one frame and pushes it through the pipeline to the
    /// publisher.
    ///
    /// Bus and checksum errors skip the period and leave the pipeline untouched. A frame with
    /// DIAG_STAT flags is still published, unless it is the one that makes the run long enough to
    /// stop sampling.
    pub fn measure(&mut self) -> Result<(), SampleError> {
        match self.state {
            DriverState::Sampling => {}
            DriverState::Faulted => return Err(SampleError::Faulted),
            _ => return Err(SampleError::Inactive),
        }

        let now = self.timer.now_us();
        self.counters.interval.record(now);

        let mut buf = [0u8; FRAME_LEN];
        if self.transport.transfer(&mut buf).is_err() {
            self.counters.bus_errors = self.counters.bus_errors.saturating_add(1);
            debug!("ADIS16477: bus error");
            return Err(self.bad_transfer(SampleError::Bus));
        }

        let sample = match frame::decode(&buf) {
            Ok(sample) => sample,
            Err(FrameError::Checksum { received, computed }) => {
                self.counters.checksum_errors = self.counters.checksum_errors.saturating_add(1);
                debug!(
                    "ADIS16477: checksum {:#x}, expected {:#x}",
                    received,
                    computed
                );
                return Err(self.bad_transfer(SampleError::Checksum));
            }
            Err(FrameError::Length(_)) => {
                self.counters.checksum_errors = self.counters.checksum_errors.saturating_add(1);
                return Err(self.bad_transfer(SampleError::Checksum));
            }
        };
        self.monitor.record_transfer(false);

        if let Some(prev) = self.last_data_cntr {
            if sample.data_cntr.wrapping_sub(prev) > 1 {
                self.counters.counter_gaps = self.counters.counter_gaps.saturating_add(1);
                trace!("ADIS16477: DATA_CNTR jumped {} -> {}", prev, sample.data_cntr);
            }
        }
        self.last_data_cntr = Some(sample.data_cntr);

        self.last_diag = sample.diag_stat;
        let diag = sample.diag_stat.any();
        if diag {
            self.counters.diag_faults = self.counters.diag_faults.saturating_add(1);
            trace!("ADIS16477: DIAG_STAT {:#x}", sample.diag_stat.bits());
        }
        if self.monitor.record_diag(diag) {
            return Err(self.fault());
        }

        let error_count = self.counters.bad_transfers();
        let (gyro, accel) = self.pipeline.process(now, &sample, &self.config, error_count);
        if let Some(report) = gyro {
            self.publisher.publish_gyro(&report);
        }
        if let Some(report) = accel {
            self.publisher.publish_accel(&report);
        }
        self.counters.samples = self.counters.samples.saturating_add(1);

        if diag {
            Err(SampleError::Diagnostic(sample.diag_stat))
        } else {
            Ok(())
        }
    }

    fn self_test_allowed(&self) -> Result<(), Error<T::Error>> {
        match self.state {
            DriverState::Sampling => Err(Error::Busy),
            DriverState::Probed | DriverState::Configured => Ok(()),
            state => Err(Error::InvalidState(state)),
        }
    }

    /// Runs the flash memory test. Blocks for about 32 ms.
    pub fn self_test_memory<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<T::Error>> {
        self.self_test_allowed()?;
        let result = self_test::memory(&mut self.transport, delay);
        match &result {
            Ok(()) => info!("ADIS16477: memory self test passed"),
            Err(_) => error!("ADIS16477: memory self test failed"),
        }
        result
    }

    /// Runs the sensor self test. MSC_CTRL is put back to its configured value afterwards, pass or
    /// fail.
    pub fn self_test_sensor<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<T::Error>> {
        self.self_test_allowed()?;
        let result = self_test::sensor(&mut self.transport, delay, MSC_CTRL_DEFAULT);
        match &result {
            Ok(()) => info!("ADIS16477: sensor self test passed"),
            Err(_) => error!("ADIS16477: sensor self test failed"),
        }
        result
    }

    /// Memory test followed by the sensor test.
    pub fn self_test<D: DelayNs>(&mut self, delay: &mut D) -> Result<(), Error<T::Error>> {
        self.self_test_memory(delay)?;
        self.self_test_sensor(delay)
    }

    /// Changes the output data rate. The rate has to divide 2000 Hz.
    ///
    /// A configured device gets the new DEC_RATE right away and the filters are recomputed;
    /// otherwise the rate is applied by the next [`configure`](Self::configure).
    pub fn set_sample_rate(&mut self, rate_hz: u16) -> Result<(), Error<T::Error>> {
        self.refuse_while_sampling()?;
        let dec = dec_rate(rate_hz).ok_or(Error::InvalidInput)?;

        if self.state == DriverState::Configured {
            if let Err(e) = self.write_verify_register(Register::DecRate, dec) {
                self.set_state(DriverState::Probed);
                return Err(e);
            }
        }

        self.config.sample_rate_hz = rate_hz;
        self.pipeline.reset(&self.config);
        info!("ADIS16477: sample rate {} Hz", rate_hz);
        Ok(())
    }

    /// Replaces the gyro bias and scale.
    pub fn set_gyro_calibration(
        &mut self,
        calibration: ChannelCalibration,
    ) -> Result<(), Error<T::Error>> {
        self.refuse_while_sampling()?;
        if !calibration.is_valid() {
            return Err(Error::InvalidInput);
        }
        self.config.calibration.gyro = calibration;
        Ok(())
    }

    /// Replaces the accelerometer bias and scale.
    pub fn set_accel_calibration(
        &mut self,
        calibration: ChannelCalibration,
    ) -> Result<(), Error<T::Error>> {
        self.refuse_while_sampling()?;
        if !calibration.is_valid() {
            return Err(Error::InvalidInput);
        }
        self.config.calibration.accel = calibration;
        Ok(())
    }

    /// Replaces both calibrations and the ranges.
    pub fn set_calibration(
        &mut self,
        calibration: CalibrationParameters,
    ) -> Result<(), Error<T::Error>> {
        self.refuse_while_sampling()?;
        if !calibration.is_valid() {
            return Err(Error::InvalidInput);
        }
        self.config.calibration = calibration;
        Ok(())
    }

    /// Changes the mounting rotation.
    pub fn set_rotation(&mut self, rotation: Rotation) -> Result<(), Error<T::Error>> {
        self.refuse_while_sampling()?;
        self.config.rotation = rotation;
        Ok(())
    }

    /// Changes the gyro low pass cutoff. Zero disables the filter.
    pub fn set_gyro_cutoff(&mut self, cutoff_hz: f32) -> Result<(), Error<T::Error>> {
        self.refuse_while_sampling()?;
        if !cutoff_hz.is_finite() || cutoff_hz < 0.0 {
            return Err(Error::InvalidInput);
        }
        self.config.gyro_cutoff_hz = cutoff_hz;
        self.pipeline.set_gyro_cutoff(&self.config);
        Ok(())
    }

    /// Changes the accelerometer low pass cutoff. Zero disables the filter.
    pub fn set_accel_cutoff(&mut self, cutoff_hz: f32) -> Result<(), Error<T::Error>> {
        self.refuse_while_sampling()?;
        if !cutoff_hz.is_finite() || cutoff_hz < 0.0 {
            return Err(Error::InvalidInput);
        }
        self.config.accel_cutoff_hz = cutoff_hz;
        self.pipeline.set_accel_cutoff(&self.config);
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DriverState {
        self.state
    }

    /// Active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Counters since the driver was created.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Filter and integrator state.
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Health snapshot.
    pub fn status(&self) -> Status {
        Status {
            state: self.state,
            bad_transfers: self.counters.bad_transfers(),
            last_diag: self.last_diag,
            counters: self.counters,
            product_id: self.product_id,
            firmware_revision: self.firmware_revision,
            serial_number: self.serial_number,
        }
    }

    /// Logs the status block.
    pub fn print_info(&self) {
        let c = &self.counters;
        info!(
            "ADIS16477: {} id {:#x} fw {:#x} sn {:#x}",
            self.state.as_str(),
            self.product_id,
            self.firmware_revision,
            self.serial_number
        );
        info!(
            "rate {} Hz, gyro lpf {} Hz, accel lpf {} Hz, rotation {}",
            self.config.sample_rate_hz,
            self.config.gyro_cutoff_hz,
            self.config.accel_cutoff_hz,
            self.config.rotation.as_str()
        );
        info!(
            "samples {} bus errors {} checksum errors {} diag faults {} counter gaps {}",
            c.samples,
            c.bus_errors,
            c.checksum_errors,
            c.diag_faults,
            c.counter_gaps
        );
        info!(
            "interval min {} max {} mean {} us",
            c.interval.min_us(),
            c.interval.max_us(),
            c.interval.mean_us()
        );
    }

    /// Reports sink.
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    /// Reports sink, mutably, to drain it.
    pub fn publisher_mut(&mut self) -> &mut P {
        &mut self.publisher
    }

    /// Bus transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Timer.
    pub fn timer(&self) -> &H {
        &self.timer
    }

    /// Cancels sampling and gives back the transport, timer and publisher.
    pub fn release(mut self) -> (T, H, P) {
        self.timer.cancel();
        (self.transport, self.timer, self.publisher)
    }
}

#[cfg(feature = "defmt")]
impl<T, H, P> defmt::Format for Adis16477<T, H, P> {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "ADIS16477 IMU ({})", self.state)
    }
}
