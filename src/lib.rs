// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

//! Device agnostic driver for the ADIS16477 IMU (inertial measurement unit).
//! The driver depends on embedded-hal, so as long as the HAL you use implements those traits, then
//! this driver should be compatible.
//!
//! The driver is built around a fixed-rate sampling pipeline. Every period one burst frame is read
//! over SPI, checked, converted to physical units, calibrated, rotated into the vehicle frame,
//! low-pass filtered and integrated into delta-angle and delta-velocity reports:
//!
//! ```text
//! burst frame -> checksum -> rad/s, m/s^2 -> calibration -> rotation -> LPF -> integrator -> publisher
//! ```
//!
//! The hardware timer, the bus and the place the reports end up are all supplied by the
//! application through the [`adis16477::Transport`], [`adis16477::Timer`] and
//! [`adis16477::Publisher`] traits. A ready made SPI transport over `embedded-hal` 1.0 and a
//! bounded in-memory report queue are included.
//!
//! The driver assumes control of the bus. Share it with `embedded-hal-bus` if other devices live on
//! the same SPI peripheral.
//!
//! Logging goes through `defmt` when the `defmt` feature is enabled, or through the `log` facade
//! with the `log` feature. Without either the log statements compile to nothing.

#![cfg_attr(not(test), no_std)]
#![deny(missing_docs)]

#[macro_use]
mod fmt;

/// Main module that holds the sampling pipeline and the driver lifecycle.
/// Also holds the register map, constants and error types shared between the submodules.
pub mod adis16477;
