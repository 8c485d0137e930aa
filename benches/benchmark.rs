use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::Array3;
use spectral_stack::processing::indices::{StandardIndices, NDI};
use spectral_stack::processing::parallel::IndexCalculator;
use spectral_stack::processing::ParallelProcessor;
use spectral_stack::stack::{bands, GeoInfo, RasterStack};

/// Synthetic 4-band stack simulating surface reflectance
fn synthetic_stack(times: usize, size: usize) -> RasterStack {
    let mut stack = RasterStack::new(GeoInfo::default());
    let band = |base: f32, period: usize| {
        Array3::from_shape_fn((times, size, size), |(t, r, c)| {
            base + ((t * 31 + r * size + c) % period) as f32 / 10000.0
        })
    };

    for (name, data) in [
        (bands::GREEN, band(0.08, 400)),
        (bands::RED, band(0.05, 50)),
        (bands::NIR, band(0.3, 100)),
        (bands::SWIR1, band(0.15, 200)),
    ] {
        if let Err(e) = stack.insert_band(name, data) {
            panic!("failed to build benchmark stack: {e}");
        }
    }
    stack
}

/// Benchmark the core NDI calculation logic on a single slice
fn benchmark_ndi_calculation(c: &mut Criterion) {
    let stack = synthetic_stack(1, 1024);
    let inputs = [
        stack.slice(bands::NIR, 0).unwrap(),
        stack.slice(bands::RED, 0).unwrap(),
    ];
    let ndi = NDI::ndvi();

    c.bench_function("ndi_core_calculation", |b| {
        b.iter(|| ndi.calculate(black_box(&inputs)))
    });
}

/// Benchmark a full time series, one rayon task per slice
fn benchmark_stack_processing(c: &mut Criterion) {
    let stack = synthetic_stack(12, 512);
    let ndvi = NDI::ndvi();

    for threads in [1, 4] {
        let processor = ParallelProcessor::new(Some(threads)).unwrap();
        c.bench_function(&format!("ndvi_stack_{}_threads", threads), |b| {
            b.iter(|| processor.process(black_box(&ndvi), black_box(&stack)).unwrap())
        });
    }

    let processor = ParallelProcessor::default();
    c.bench_function("standard_indices_stack", |b| {
        b.iter(|| {
            let mut stack = stack.clone();
            processor
                .compute_standard_indices(&mut stack, black_box(&StandardIndices::default()))
                .unwrap();
            stack
        })
    });
}

criterion_group!(benches, benchmark_ndi_calculation, benchmark_stack_processing);
criterion_main!(benches);
