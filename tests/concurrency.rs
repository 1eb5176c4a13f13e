// Several writer threads and one stepper thread sharing one controller.

use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicBool, Ordering},
    },
    thread,
};

use longitudinal_ctrl::control::{
    config::{BrakeParams, ControllerParams},
    Controller, ControllerConfig,
};

const WRITES_PER_THREAD: usize = 20_000;

fn shared(params: ControllerParams) -> Arc<Controller> {
    Arc::new(Controller::new(ControllerConfig::new(params).unwrap()))
}

#[test]
fn stepper_sees_whole_consistent_state() {
    let c = shared(ControllerParams::default().with_brake(Some(BrakeParams::default())));
    let done = Arc::new(AtomicBool::new(false));
    let barrier = Arc::new(Barrier::new(4));

    let writers: Vec<_> = (0..3)
        .map(|w| {
            let c = Arc::clone(&c);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for i in 0..WRITES_PER_THREAD {
                    match w {
                        0 => c.set_speed_reading((i % 50) as f64 * 0.4),
                        1 => c.set_speed_request(if i % 3 == 0 { 0.0 } else { (i % 40) as f64 * 0.5 }),
                        _ => c.set_speed_request(-((i % 7) as f64)),
                    }
                }
            })
        })
        .collect();

    let stepper = {
        let c = Arc::clone(&c);
        let done = Arc::clone(&done);
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            barrier.wait();
            let mut steps = 0u64;
            while !done.load(Ordering::Acquire) {
                let cmd = c.step();
                // torque and brake are never commanded together
                assert!(!(cmd.is_braking() && (cmd.torque_left != 0 || cmd.torque_right != 0)));

                let snap = c.snapshot();
                assert_eq!(snap.stop_requested, snap.speed_request <= 0.0);
                steps += 1;
            }
            steps
        })
    };

    for w in writers {
        w.join().unwrap();
    }
    done.store(true, Ordering::Release);
    let steps = stepper.join().unwrap();
    assert!(steps > 0);
    assert_eq!(c.snapshot().steps, steps);
}

#[test]
fn last_write_wins_after_writers_finish() {
    let c = shared(ControllerParams::default().with_torque_rate_limit(0.0));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let c = Arc::clone(&c);
            thread::spawn(move || {
                for i in 0..WRITES_PER_THREAD {
                    c.set_speed_reading(i as f64 * 0.001);
                }
                c.set_speed_reading(6.0);
                c.set_speed_request(9.0);
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let cmd = c.step();
    let snap = c.snapshot();
    assert_eq!(snap.speed_reading, 6.0);
    assert_eq!(snap.speed_request, 9.0);
    assert!(cmd.torque_left > 0);
}

#[test]
fn controller_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Controller>();
}
