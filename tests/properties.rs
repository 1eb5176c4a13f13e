// Sampled properties over seeded random drives.

use rand::{rngs::StdRng, Rng, SeedableRng};

use longitudinal_ctrl::control::{
    config::{BrakeParams, Distribution, ControllerParams},
    law::REGEN_CUTOFF_SPEED_MS,
    Controller, ControllerConfig,
};

const CASES: usize = 200;

fn controller(params: ControllerParams) -> Controller {
    Controller::new(ControllerConfig::new(params).unwrap())
}

#[test]
fn torque_follows_error_sign() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..CASES {
        let c = controller(ControllerParams::default());
        let reading = rng.random_range(2.0..20.0);
        let error = rng.random_range(0.1..5.0) * if rng.random_bool(0.5) { 1.0 } else { -1.0 };
        c.set_speed_reading(reading);
        c.set_speed_request(reading + error);

        let mut cmd = c.step();
        for _ in 0..200 {
            cmd = c.step();
        }
        if error > 0.0 {
            assert!(cmd.torque_left > 0 && cmd.torque_right > 0, "error {error} gave {cmd:?}");
        } else {
            assert!(cmd.torque_left < 0 && cmd.torque_right < 0, "error {error} gave {cmd:?}");
        }
    }
}

#[test]
fn no_negative_torque_below_cutoff() {
    let mut rng = StdRng::seed_from_u64(11);
    let c = controller(ControllerParams::default().with_torque_rate_limit(0.0));
    for _ in 0..CASES * 5 {
        c.set_speed_reading(rng.random_range(0.0..REGEN_CUTOFF_SPEED_MS));
        c.set_speed_request(rng.random_range(0.01..3.0));
        let cmd = c.step();
        if c.snapshot().previous_torque < 0.0 {
            assert_eq!((cmd.torque_left, cmd.torque_right), (0, 0));
        }
        assert!(cmd.torque_left >= 0 && cmd.torque_right >= 0);
    }
}

#[test]
fn consecutive_torque_change_is_rate_limited() {
    let mut rng = StdRng::seed_from_u64(42);
    let rate = 100.0;
    let dt = 0.01;
    let c = controller(ControllerParams::default().with_torque_rate_limit(rate).with_dt(dt));
    let mut previous = c.snapshot().previous_torque;
    for _ in 0..CASES * 5 {
        c.set_speed_reading(rng.random_range(0.0..30.0));
        c.set_speed_request(rng.random_range(0.01..30.0));
        c.step();
        let torque = c.snapshot().previous_torque;
        assert!((torque - previous).abs() <= rate * dt + 1e-9);
        previous = torque;
    }
}

#[test]
fn wheel_torque_stays_within_limit() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..CASES {
        let limit = rng.random_range(0.0..=2400.0);
        let distribution = if rng.random_bool(0.5) { Distribution::Even } else { Distribution::Unsplit };
        let bound = match distribution {
            Distribution::Even => limit / 2.0,
            Distribution::Unsplit => limit,
        };
        let c = controller(
            ControllerParams::default()
                .with_torque_limit(limit)
                .with_torque_rate_limit(0.0)
                .with_distribution(distribution),
        );
        for _ in 0..20 {
            c.set_speed_reading(rng.random_range(0.0..40.0));
            c.set_speed_request(rng.random_range(0.01..40.0));
            let cmd = c.step();
            assert!((cmd.torque_left.abs() as f64) <= bound);
            assert!((cmd.torque_right.abs() as f64) <= bound);
        }
    }
}

#[test]
fn stop_request_is_exclusive_with_torque() {
    let mut rng = StdRng::seed_from_u64(99);
    let c = controller(ControllerParams::default().with_brake(Some(BrakeParams::default())));
    for _ in 0..CASES * 5 {
        let request = rng.random_range(-5.0..5.0);
        c.set_speed_reading(rng.random_range(0.0..20.0));
        c.set_speed_request(request);
        let cmd = c.step();
        if request <= 0.0 {
            assert_eq!((cmd.torque_left, cmd.torque_right), (0, 0));
            assert!(cmd.brake_duty_cycle_ns > 0);
        } else {
            assert_eq!(cmd.brake_duty_cycle_ns, 0);
        }
    }
}

#[test]
fn fresh_controller_brakes_before_any_request() {
    let mut rng = StdRng::seed_from_u64(123);
    for _ in 0..CASES {
        let c = controller(
            ControllerParams::default()
                .with_brake(Some(BrakeParams::default()))
                .with_torque_rate_limit(0.0),
        );
        c.set_speed_reading(rng.random_range(0.0..30.0));
        for _ in 0..rng.random_range(1..10) {
            let cmd = c.step();
            assert_eq!((cmd.torque_left, cmd.torque_right), (0, 0));
            assert!(cmd.brake_duty_cycle_ns > 0);
        }
    }
}
