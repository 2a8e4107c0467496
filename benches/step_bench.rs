use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::Rng;
use std::time::Duration;
use wator::{rng, Schedule, Simulation, Species, WatorConfig};

fn seeded_simulation(size: usize, schedule: Schedule) -> Simulation {
    let config = WatorConfig {
        width: size,
        height: size,
        schedule,
        rng_seed: Some(0xBEEF),
        ..WatorConfig::default()
    };
    let Ok(mut sim) = Simulation::new(config) else {
        panic!("bench configuration rejected");
    };
    let mut rng = rng::create_rng(0xF15);
    for y in 0..size as isize {
        for x in 0..size as isize {
            let roll: f64 = rng.gen();
            if roll < 0.3 {
                sim.place(x, y, Some(Species::Prey));
            } else if roll < 0.4 {
                sim.place(x, y, Some(Species::Predator));
            }
        }
    }
    sim.recount();
    sim
}

fn bench_schedules(c: &mut Criterion) {
    let mut group = c.benchmark_group("generation_step");
    let steps: usize = std::env::var("WATOR_BENCH_STEPS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(32);
    let size: usize = std::env::var("WATOR_BENCH_SIZE")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .filter(|v| *v >= 8)
        .unwrap_or(256);
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(5));

    let schedules = [
        ("sequential", Schedule::Sequential),
        ("banded1", Schedule::Banded { workers: 1 }),
        ("banded2", Schedule::Banded { workers: 2 }),
        ("banded4", Schedule::Banded { workers: 4 }),
        ("banded8", Schedule::Banded { workers: 8 }),
    ];
    for (label, schedule) in schedules {
        group.bench_function(format!("{label}_{size}x{size}_steps{steps}"), |b| {
            b.iter_batched(
                || seeded_simulation(size, schedule),
                |mut sim| {
                    for _ in 0..steps {
                        if sim.step().is_err() {
                            break;
                        }
                    }
                    sim
                },
                BatchSize::PerIteration,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_schedules);
criterion_main!(benches);
