/// Pure Rust solver benchmarks.
///
/// Uses std::time::Instant for timing, a deterministic LCG PRNG for data generation,
/// and std::hint::black_box to prevent dead-code elimination.
use std::hint::black_box;
use std::time::{Duration, Instant};

use ndarray::{Array1, Array2};
use rsas_core::{solve, TransportInputs, UniformSas};

const REPEATS: usize = 7;

/// Simple LCG PRNG for deterministic data generation.
fn make_data(n: usize, seed: u64) -> (Array1<f64>, Array2<f64>, Array1<f64>) {
    let mut state = seed;
    let mut next_f64 = || -> f64 {
        state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (state >> 33) as f64 / (1u64 << 31) as f64
    };

    let inflow: Array1<f64> = (0..n).map(|_| next_f64() * 4.0).collect();
    let discharge: Vec<f64> = (0..n).map(|_| 0.5 + next_f64() * 1.0).collect();
    let evapotranspiration: Vec<f64> = (0..n).map(|_| next_f64() * 0.5).collect();
    let outflows = Array2::from_shape_fn((n, 2), |(t, q)| {
        if q == 0 {
            discharge[t]
        } else {
            evapotranspiration[t]
        }
    });
    let concentration: Array1<f64> = (0..n).map(|_| next_f64() * 10.0).collect();
    (inflow, outflows, concentration)
}

/// Run a closure `REPEATS` times, return the median duration.
fn median_time<F: FnMut()>(mut f: F) -> Duration {
    let mut times: Vec<Duration> = (0..REPEATS)
        .map(|_| {
            let start = Instant::now();
            f();
            start.elapsed()
        })
        .collect();
    times.sort();
    times[REPEATS / 2]
}

fn bench_case(
    label: &'static str,
    sizes: &[(usize, usize)],
    n_substeps: usize,
    with_solute: bool,
) -> Vec<(&'static str, usize, usize, Duration)> {
    let mut results = Vec::new();

    for &(n, max_age) in sizes {
        let (inflow, outflows, concentration) = make_data(n, 42);
        let mut builder = TransportInputs::builder(inflow, outflows.into_dyn())
            .st_init(Array1::linspace(0.0, 50.0, max_age + 1))
            .n_substeps(n_substeps);
        if with_solute {
            builder = builder.c_j(concentration.into_dyn());
        }
        let inputs = match builder.build() {
            Ok(inputs) => inputs,
            Err(e) => {
                eprintln!("{label}: {e}");
                continue;
            }
        };
        let (discharge, evapotranspiration) = match (
            UniformSas::constant(0.0, 60.0, n),
            UniformSas::constant(0.0, 20.0, n),
        ) {
            (Ok(d), Ok(e)) => (d, e),
            _ => continue,
        };

        // Warmup, which also surfaces solver errors before timing
        if let Err(e) = solve(&inputs, &[&discharge, &evapotranspiration]) {
            eprintln!("{label}: {e}");
            continue;
        }

        let dur = median_time(|| {
            let _ = black_box(solve(&inputs, &[&discharge, &evapotranspiration]));
        });
        results.push((label, n, max_age, dur));
    }
    results
}

fn main() {
    println!("Pure Rust Solver Benchmarks");
    println!("============================================================");
    println!("{:<18} {:>6} {:>8}   {:>12}", "Case", "N", "max_age", "Median (ms)");
    println!("--------------------------------------------------------");

    let mut all_results: Vec<(&str, usize, usize, Duration)> = Vec::new();

    all_results.extend(bench_case("water", &[(365, 100), (3650, 365)], 1, false));
    all_results.extend(bench_case("water_substep4", &[(365, 100)], 4, false));
    all_results.extend(bench_case("solute", &[(365, 100), (3650, 365)], 1, true));

    for (case, n, max_age, dur) in &all_results {
        let ms = dur.as_secs_f64() * 1000.0;
        println!("{:<18} {:>6} {:>8}      {:>8.2}", case, n, max_age, ms);
    }

    println!("============================================================");
}
