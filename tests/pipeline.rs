// Copyright (c) 2022, Zachary D. Olkin.
// This code is provided under the MIT license.

mod common;

use adis16477_driver::adis16477::convert::{ACCEL_SCALE_M_S2, GYRO_SCALE_RAD_S};
use adis16477_driver::adis16477::{
    ChannelCalibration, Config, DriverState, SampleError, ONE_G,
};
use common::Bench;

fn unfiltered() -> Config {
    Config {
        gyro_cutoff_hz: 0.0,
        accel_cutoff_hz: 0.0,
        ..Default::default()
    }
}

#[test]
fn ten_valid_frames_give_ten_gyro_reports() {
    let mut bench = Bench::sampling(unfiltered());
    bench.device.borrow_mut().gyro = [100, 0, 0];

    for _ in 0..10 {
        assert_eq!(bench.tick(), Ok(()));
    }

    let queue = bench.imu.publisher();
    assert_eq!(queue.gyro_len(), 10);

    let expected = 100.0 * GYRO_SCALE_RAD_S;
    let mut last_timestamp = 0;
    for report in queue.gyro() {
        assert!(report.timestamp_us > last_timestamp);
        last_timestamp = report.timestamp_us;

        assert_eq!(report.integral_dt_us, 1000);
        assert_eq!(report.raw, [100, 0, 0]);
        assert!((report.rate[0] - expected).abs() < 1e-6);
        assert!((report.delta_angle[0] - expected * 1e-3).abs() < 1e-8);
        assert!((report.temperature - 25.0).abs() < 1e-4);
        assert_eq!(report.scaling, GYRO_SCALE_RAD_S);
    }
    assert_eq!(bench.imu.counters().samples, 10);
}

#[test]
fn filtered_rate_converges_to_the_input() {
    let mut bench = Bench::sampling(Config::default());
    bench.device.borrow_mut().gyro = [100, 0, 0];

    for _ in 0..300 {
        bench.tick().unwrap();
    }

    let last = bench.imu.publisher().gyro().last().copied().unwrap();
    let expected = 100.0 * GYRO_SCALE_RAD_S;
    assert!((last.rate[0] - expected).abs() < 1e-5);
    assert!(last.rate[1].abs() < 1e-6);
}

#[test]
fn one_corrupt_frame_is_dropped_and_counted() {
    let mut bench = Bench::sampling(unfiltered());
    bench.device.borrow_mut().gyro = [100, 0, 0];

    let mut results = Vec::new();
    for i in 0..10 {
        if i == 4 {
            bench.device.borrow_mut().corrupt_next = 1;
        }
        results.push(bench.tick());
    }

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 9);
    assert_eq!(results[4], Err(SampleError::Checksum));
    assert_eq!(bench.imu.publisher().gyro_len(), 9);

    let status = bench.imu.status();
    assert_eq!(status.bad_transfers, 1);
    assert_eq!(status.counters.checksum_errors, 1);
    assert_eq!(status.state, DriverState::Sampling);

    // reports after the error carry the count
    let last = bench.imu.publisher().gyro().last().copied().unwrap();
    assert_eq!(last.error_count, 1);
}

#[test]
fn persistent_diagnostics_stop_sampling() {
    let mut bench = Bench::sampling(Config::default());
    bench.device.borrow_mut().diag = 1 << 1;

    for _ in 0..9 {
        assert!(matches!(bench.tick(), Err(SampleError::Diagnostic(_))));
    }
    // flagged frames are still forwarded
    assert_eq!(bench.imu.publisher().gyro_len(), 9);

    assert_eq!(bench.tick(), Err(SampleError::Faulted));
    assert_eq!(bench.imu.state(), DriverState::Faulted);
    assert_eq!(bench.timer.scheduled.get(), None);
    assert_eq!(bench.imu.publisher().gyro_len(), 9);
    assert_eq!(bench.imu.counters().diag_faults, 10);
    assert!(bench.imu.status().last_diag.data_path_overrun());

    assert_eq!(bench.tick(), Err(SampleError::Faulted));
}

#[test]
fn a_clean_frame_breaks_the_diagnostic_run() {
    let mut bench = Bench::sampling(Config::default());

    for _ in 0..3 {
        bench.device.borrow_mut().diag = 1 << 3;
        for _ in 0..9 {
            assert!(matches!(bench.tick(), Err(SampleError::Diagnostic(_))));
        }
        bench.device.borrow_mut().diag = 0;
        assert_eq!(bench.tick(), Ok(()));
    }
    assert_eq!(bench.imu.state(), DriverState::Sampling);
}

#[test]
fn repeated_bus_errors_stop_sampling() {
    let mut bench = Bench::sampling(Config::default());
    bench.device.borrow_mut().fail_transfers = 100;

    for _ in 0..8 {
        assert_eq!(bench.tick(), Err(SampleError::Bus));
    }
    assert_eq!(bench.tick(), Err(SampleError::Faulted));
    assert_eq!(bench.imu.state(), DriverState::Faulted);
    assert_eq!(bench.timer.scheduled.get(), None);
    assert_eq!(bench.imu.counters().bus_errors, 9);
    assert_eq!(bench.imu.publisher().gyro_len(), 0);
}

#[test]
fn scattered_bus_errors_are_tolerated() {
    let mut bench = Bench::sampling(Config::default());

    for i in 0..640 {
        if i % 10 == 0 {
            bench.device.borrow_mut().fail_transfers = 1;
        }
        let _ = bench.tick();
    }
    assert_eq!(bench.imu.state(), DriverState::Sampling);
    assert_eq!(bench.imu.counters().bus_errors, 64);
}

#[test]
fn bus_error_mid_window_keeps_filter_and_integrator_state() {
    let mut bench = Bench::sampling(Config::default());
    bench.device.borrow_mut().gyro = [100, 0, 0];
    let rate = 100.0 * GYRO_SCALE_RAD_S;

    // 75 whole accel windows to settle both filters, then one period into the next
    for _ in 0..301 {
        bench.tick().unwrap();
    }
    let windows = bench.imu.publisher().accel_len();
    assert_eq!(windows, 75);

    bench.device.borrow_mut().fail_transfers = 1;
    assert_eq!(bench.tick(), Err(SampleError::Bus));

    bench.tick().unwrap();
    let gyro = bench.imu.publisher().gyro().last().copied().unwrap();
    assert!((gyro.rate[0] - rate).abs() < 1e-5);
    assert_eq!(gyro.integral_dt_us, 2000);
    assert!((gyro.delta_angle[0] - rate * 2e-3).abs() < 1e-7);
    assert_eq!(bench.imu.publisher().accel_len(), windows);

    bench.tick().unwrap();
    let queue = bench.imu.publisher();
    assert_eq!(queue.accel_len(), windows + 1);
    let accel = queue.accel().last().copied().unwrap();
    assert_eq!(accel.integral_dt_us, 4000);
    assert!((accel.accel[2] - ONE_G).abs() < 1e-4);
    assert!((accel.delta_velocity[2] - accel.accel[2] * 4e-3).abs() < 1e-5);
    assert_eq!(bench.imu.counters().bus_errors, 1);
}

#[test]
fn accel_reports_once_per_window() {
    let mut bench = Bench::sampling(unfiltered());

    for _ in 0..12 {
        bench.tick().unwrap();
    }

    let queue = bench.imu.publisher();
    assert_eq!(queue.accel_len(), 3);
    for report in queue.accel() {
        assert_eq!(report.integral_dt_us, 4000);
        assert!((report.accel[2] - ONE_G).abs() < 1e-4);
        assert!((report.delta_velocity[2] - ONE_G * 4e-3).abs() < 1e-5);
        assert_eq!(report.scaling, ACCEL_SCALE_M_S2);
        assert_eq!(report.clipping, [false; 3]);
    }
}

#[test]
fn out_of_range_accel_is_flagged_not_clamped() {
    let mut bench = Bench::sampling(unfiltered());
    bench.device.borrow_mut().accel = [i16::MAX, 0, 800];

    for _ in 0..4 {
        bench.tick().unwrap();
    }

    let report = bench.imu.publisher().accel().last().copied().unwrap();
    assert_eq!(report.clipping, [true, false, false]);
    assert!((report.accel[0] - i16::MAX as f32 * ACCEL_SCALE_M_S2).abs() < 1e-2);
}

#[test]
fn calibration_is_applied() {
    let mut bench = Bench::configured(unfiltered());
    let expected = 100.0 * GYRO_SCALE_RAD_S;
    bench
        .imu
        .set_gyro_calibration(ChannelCalibration {
            offset: [expected, 0.0, 0.0],
            scale: [1.0, 2.0, 1.0],
        })
        .unwrap();
    bench.imu.start().unwrap();
    bench.device.borrow_mut().gyro = [100, 100, 0];

    bench.tick().unwrap();

    let report = bench.imu.publisher().gyro().last().copied().unwrap();
    assert!(report.rate[0].abs() < 1e-6);
    assert!((report.rate[1] - 2.0 * expected).abs() < 1e-6);
}

#[test]
fn counter_gaps_and_interval_statistics() {
    let mut bench = Bench::sampling(Config::default());
    bench.device.borrow_mut().counter_step = 2;

    for _ in 0..5 {
        bench.tick().unwrap();
    }

    let counters = bench.imu.counters();
    assert_eq!(counters.counter_gaps, 4);
    assert_eq!(counters.interval.count(), 4);
    assert_eq!(counters.interval.min_us(), 1000);
    assert_eq!(counters.interval.max_us(), 1000);
    assert_eq!(counters.interval.mean_us(), 1000);
}
