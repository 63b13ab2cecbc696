// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use adis16477_driver::adis16477::{
    Adis16477, Config, GlobCmd, MscCtrl, RawFrame, Register, ReportQueue, Timer, Transport,
    FRAME_LEN, MSC_CTRL_DEFAULT, PROD_ID_ADIS16477,
};
use adis16477_driver::adis16477::{DiagStat, DriverState};
use embedded_hal_mock::eh1::delay::NoopDelay;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusFault;

/// What the simulated device holds and how it misbehaves.
pub struct DeviceState {
    pub registers: [u16; 0x80],
    pub prod_id: u16,
    /// PROD_ID reads that return junk before the real value
    pub prod_id_garbage: usize,
    pub gyro: [i16; 3],
    pub accel: [i16; 3],
    pub temp: i16,
    pub diag: u16,
    pub memory_fault: bool,
    pub sensor_fault: bool,
    /// Counts added to every axis while MSC_CTRL bit 10 is set
    pub excitation_gyro: i16,
    pub excitation_accel: i16,
    pub counter: u16,
    pub counter_step: u16,
    /// Frames to deliver with a flipped bit
    pub corrupt_next: usize,
    /// Transfers to fail on the bus
    pub fail_transfers: usize,
    /// Every transfer after this many in total fails
    pub fail_after: Option<u32>,
    /// Register that reads back a fixed value no matter what was written
    pub readback_override: Option<(Register, u16)>,
    pub writes: Vec<(Register, u16)>,
    pub resets: u32,
    pub transfers: u32,
}

impl Default for DeviceState {
    fn default() -> Self {
        let mut state = DeviceState {
            registers: [0; 0x80],
            prod_id: PROD_ID_ADIS16477,
            prod_id_garbage: 0,
            gyro: [0; 3],
            accel: [0, 0, 800],
            temp: 250,
            diag: 0,
            memory_fault: false,
            sensor_fault: false,
            excitation_gyro: 1600,
            excitation_accel: 400,
            counter: 0,
            counter_step: 1,
            corrupt_next: 0,
            fail_transfers: 0,
            fail_after: None,
            readback_override: None,
            writes: Vec::new(),
            resets: 0,
            transfers: 0,
        };
        state.power_on();
        state
    }
}

impl DeviceState {
    fn power_on(&mut self) {
        self.registers = [0; 0x80];
        self.set(Register::MscCtrl, MSC_CTRL_DEFAULT);
        self.set(Register::FiltCtrl, 0x0004);
        self.set(Register::DecRate, 0x0001);
        self.set(Register::FirmRev, 0x0203);
        self.set(Register::SerialNum, 0x1234);
    }

    fn set(&mut self, reg: Register, value: u16) {
        self.registers[reg.get_addr(true) as usize] = value;
    }

    pub fn get(&self, reg: Register) -> u16 {
        self.registers[reg.get_addr(true) as usize]
    }

    fn excited(&self) -> bool {
        MscCtrl::from_bits(self.get(Register::MscCtrl)).sensor_self_test()
    }

    fn diag_bits(&self) -> u16 {
        let mut diag = DiagStat::from_bits(self.diag);
        if self.excited() && self.sensor_fault {
            diag.set_sensor_failure(true);
        }
        diag.bits()
    }
}

/// Simulated ADIS16477 behind the transport trait. Clones share the same device.
#[derive(Clone, Default)]
pub struct FakeImu {
    pub device: Rc<RefCell<DeviceState>>,
}

impl Transport for FakeImu {
    type Error = BusFault;

    fn read_register(&mut self, reg: Register) -> Result<u16, BusFault> {
        let mut dev = self.device.borrow_mut();
        if let Some((over, value)) = dev.readback_override {
            if over == reg {
                return Ok(value);
            }
        }
        Ok(match reg {
            Register::ProdId if dev.prod_id_garbage > 0 => {
                dev.prod_id_garbage -= 1;
                0xFFFF
            }
            Register::ProdId => dev.prod_id,
            Register::DiagStat => dev.diag_bits(),
            other => dev.get(other),
        })
    }

    fn write_register(&mut self, reg: Register, value: u16) -> Result<(), BusFault> {
        let mut dev = self.device.borrow_mut();
        dev.writes.push((reg, value));

        if reg == Register::GlobCmd {
            let cmd = GlobCmd::from_bits(value);
            if cmd.software_reset() {
                dev.resets += 1;
                dev.power_on();
            }
            if cmd.flash_test() && dev.memory_fault {
                dev.diag |= 1 << 6;
            }
            return Ok(());
        }

        dev.set(reg, value);
        Ok(())
    }

    fn transfer(&mut self, frame: &mut [u8; FRAME_LEN]) -> Result<(), BusFault> {
        let mut dev = self.device.borrow_mut();
        dev.transfers += 1;
        let transfers = dev.transfers;
        if matches!(dev.fail_after, Some(n) if transfers > n) {
            return Err(BusFault);
        }
        if dev.fail_transfers > 0 {
            dev.fail_transfers -= 1;
            return Err(BusFault);
        }

        let (g, a) = if dev.excited() {
            (dev.excitation_gyro, dev.excitation_accel)
        } else {
            (0, 0)
        };
        let sample = RawFrame {
            diag_stat: DiagStat::from_bits(dev.diag_bits()),
            gyro: dev.gyro.map(|v| v.saturating_add(g)),
            accel: dev.accel.map(|v| v.saturating_add(a)),
            temp: dev.temp,
            data_cntr: dev.counter,
            ..Default::default()
        };
        dev.counter = dev.counter.wrapping_add(dev.counter_step);

        *frame = sample.encode();
        if dev.corrupt_next > 0 {
            dev.corrupt_next -= 1;
            frame[5] ^= 0x01;
        }
        Ok(())
    }
}

/// Manually advanced clock that remembers what was scheduled.
#[derive(Clone, Default)]
pub struct FakeTimer {
    pub now: Rc<Cell<u64>>,
    pub scheduled: Rc<Cell<Option<u32>>>,
    pub schedule_calls: Rc<Cell<u32>>,
}

impl FakeTimer {
    pub fn advance(&self, us: u64) {
        self.now.set(self.now.get() + us);
    }
}

impl Timer for FakeTimer {
    fn now_us(&self) -> u64 {
        self.now.get()
    }

    fn schedule_periodic(&mut self, interval_us: u32) {
        self.scheduled.set(Some(interval_us));
        self.schedule_calls.set(self.schedule_calls.get() + 1);
    }

    fn cancel(&mut self) {
        self.scheduled.set(None);
    }
}

pub type Imu = Adis16477<FakeImu, FakeTimer, ReportQueue<512>>;

pub struct Bench {
    pub imu: Imu,
    pub device: Rc<RefCell<DeviceState>>,
    pub timer: FakeTimer,
}

impl Bench {
    pub fn new(config: Config) -> Self {
        let fake = FakeImu::default();
        let device = fake.device.clone();
        let timer = FakeTimer::default();
        let imu = Adis16477::new(fake, timer.clone(), ReportQueue::new(), config).unwrap();
        Bench { imu, device, timer }
    }

    /// Driver probed and configured, not yet sampling.
    pub fn configured(config: Config) -> Self {
        let mut bench = Bench::new(config);
        bench.imu.probe().unwrap();
        bench.imu.configure(&mut NoopDelay::new()).unwrap();
        assert_eq!(bench.imu.state(), DriverState::Configured);
        bench
    }

    /// Driver running its periodic callback.
    pub fn sampling(config: Config) -> Self {
        let mut bench = Bench::configured(config);
        bench.imu.start().unwrap();
        bench
    }

    /// Advances the clock one period and runs the callback.
    pub fn tick(&mut self) -> Result<(), adis16477_driver::adis16477::SampleError> {
        let interval = self.imu.config().interval_us() as u64;
        self.timer.advance(interval);
        self.imu.measure()
    }
}
