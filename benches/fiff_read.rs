use std::hint::black_box;
use std::path::PathBuf;

use criterion::{criterion_group, criterion_main, Criterion};
use dpx::fiff::open_raw;
use dpx::Recording;

/// Preprocessed raw FIF to read, from `DPX_BENCH_FIF`.  Benches are skipped
/// when it is unset or missing.
fn bench_file() -> Option<PathBuf> {
    let path = PathBuf::from(std::env::var_os("DPX_BENCH_FIF")?);
    path.exists().then_some(path)
}

fn bench_open_raw(c: &mut Criterion) {
    let Some(fif) = bench_file() else { return };
    c.bench_function("open_raw (header + tree)", |b| {
        b.iter(|| {
            let raw = open_raw(black_box(&fif)).unwrap();
            black_box(raw.info.n_chan())
        })
    });
}

fn bench_read_data(c: &mut Criterion) {
    let Some(fif) = bench_file() else { return };
    let raw = open_raw(&fif).unwrap();
    c.bench_function("read_data", |b| {
        b.iter(|| {
            let data = raw.read_data().unwrap();
            black_box(data.ncols())
        })
    });
}

fn bench_recording(c: &mut Criterion) {
    let Some(fif) = bench_file() else { return };
    c.bench_function("Recording::from_fif + events", |b| {
        b.iter(|| {
            let rec = Recording::from_fif(black_box(&fif)).unwrap();
            black_box(rec.events().0.len())
        })
    });
}

criterion_group!(benches, bench_open_raw, bench_read_data, bench_recording);
criterion_main!(benches);
