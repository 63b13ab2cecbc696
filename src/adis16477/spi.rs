// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

use crate::adis16477::frame::FRAME_LEN;
use crate::adis16477::Register;
use crate::adis16477::{READ_REG, STALL_US, WRITE_REG};

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

/// First byte of a burst read, the GLOB_CMD address with the read bit.
pub const BURST_CMD: u8 = 0x68;

/// Register and burst access to the device.
///
/// The driver only ever talks to the device through this trait, so it can sit on top of any bus
/// implementation. [`SpiTransport`] covers `embedded-hal` SPI devices.
pub trait Transport {
    /// Error reported by the underlying bus
    type Error: core::fmt::Debug;

    /// Reads one 16 bit register.
    fn read_register(&mut self, reg: Register) -> Result<u16, Self::Error>;

    /// Writes one 16 bit register, low byte first.
    fn write_register(&mut self, reg: Register, value: u16) -> Result<(), Self::Error>;

    /// Runs one burst read into `frame`. The first two bytes hold whatever the bus clocked in
    /// while the command went out.
    fn transfer(&mut self, frame: &mut [u8; FRAME_LEN]) -> Result<(), Self::Error>;
}

/// SPI transport. Every 16 bit word is its own chip select cycle, followed by the stall time the
/// device needs between words.
pub struct SpiTransport<SPI, D> {
    spi: SPI,
    delay: D,
    databuf: [u8; 2],
}

impl<SPI, D> SpiTransport<SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    /// Takes ownership of the SPI device and a delay used for the stall time.
    pub fn new(spi: SPI, delay: D) -> Self {
        SpiTransport {
            spi,
            delay,
            databuf: [0; 2],
        }
    }

    /// Gives the SPI device and delay back.
    pub fn release(self) -> (SPI, D) {
        (self.spi, self.delay)
    }

    fn stall(&mut self) {
        self.delay.delay_us(STALL_US);
    }
}

impl<SPI, D> Transport for SpiTransport<SPI, D>
where
    SPI: SpiDevice<u8>,
    D: DelayNs,
{
    type Error = SPI::Error;

    fn read_register(&mut self, reg: Register) -> Result<u16, Self::Error> {
        self.databuf[0] = reg.get_addr(READ_REG);
        self.databuf[1] = 0;
        self.spi.write(&self.databuf)?;
        self.stall();

        // the answer comes back in the following word
        self.databuf = [0; 2];
        self.spi.transfer_in_place(&mut self.databuf)?;
        self.stall();

        Ok(u16::from_be_bytes(self.databuf))
    }

    fn write_register(&mut self, reg: Register, value: u16) -> Result<(), Self::Error> {
        let addr = reg.get_addr(WRITE_REG);
        let [hi, lo] = value.to_be_bytes();

        self.databuf = [addr, lo];
        self.spi.write(&self.databuf)?;
        self.stall();

        self.databuf = [addr + 1, hi];
        self.spi.write(&self.databuf)?;
        self.stall();

        Ok(())
    }

    // Bytes land as clocked; see `frame::checksum` for the assumed layout.
    fn transfer(&mut self, frame: &mut [u8; FRAME_LEN]) -> Result<(), Self::Error> {
        frame.fill(0);
        frame[0] = BURST_CMD;
        self.spi.transfer_in_place(frame)?;
        self.stall();

        Ok(())
    }
}
