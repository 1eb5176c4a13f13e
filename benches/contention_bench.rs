/*
Writers hammering the setters while one thread steps the same controller.
Measures how the single state lock scales with the number of writer threads.
*/

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::{
    hint::black_box,
    sync::Arc,
    thread,
};

use longitudinal_ctrl::control::{Controller, ControllerConfig, ControllerParams};

// Writer threads contending with the stepper
const WRITER_COUNTS: &[usize] = &[1, 2, 4, 8];

const OPS_PER_THREAD: usize = 20_000;

fn bench_writer_stepper_contention(c: &mut Criterion) {
    let mut group = c.benchmark_group("writer_stepper_contention");

    for &writers in WRITER_COUNTS {
        group.bench_with_input(BenchmarkId::from_parameter(writers), &writers, |b, &writers| {
            let controller = match ControllerConfig::new(ControllerParams::default()) {
                Ok(config) => Arc::new(Controller::new(config)),
                Err(e) => panic!("bench parameters rejected: {}", e),
            };

            b.iter(|| {
                let mut handles = Vec::with_capacity(writers + 1);

                for w in 0..writers {
                    let ctl = Arc::clone(&controller);
                    handles.push(thread::spawn(move || {
                        for i in 0..OPS_PER_THREAD {
                            let v = black_box((i % 100) as f64 * 0.1);
                            if w % 2 == 0 {
                                ctl.set_speed_reading(v);
                            } else {
                                ctl.set_speed_request(v);
                            }
                        }
                    }));
                }

                let ctl = Arc::clone(&controller);
                handles.push(thread::spawn(move || {
                    for _ in 0..OPS_PER_THREAD {
                        black_box(ctl.step());
                    }
                }));

                for h in handles {
                    let _ = h.join();
                }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_writer_stepper_contention);
criterion_main!(benches);
