use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array2;
use spectrakit::spectral::{codec, forward, inverse, StftParams, WindowKind};

const SR: u32 = 44100;

fn test_signal(seconds: f64) -> Array2<f32> {
    let len = (SR as f64 * seconds) as usize;
    Array2::from_shape_fn((len, 2), |(i, c)| {
        let t = i as f32 / SR as f32;
        let f = if c == 0 { 440.0 } else { 660.0 };
        0.5 * (2.0 * std::f32::consts::PI * f * t).sin()
    })
}

fn bench_transform_pair(c: &mut Criterion) {
    let samples = test_signal(2.0);
    let mut group = c.benchmark_group("stft");
    group.sample_size(20);

    for n_fft in [512usize, 2048] {
        let params = StftParams::new(n_fft, n_fft / 4, WindowKind::Hann);
        group.bench_with_input(BenchmarkId::new("forward", n_fft), &params, |b, &p| {
            b.iter(|| forward(black_box(samples.view()), SR, p).unwrap())
        });

        let tensor = forward(samples.view(), SR, params).unwrap();
        group.bench_with_input(BenchmarkId::new("inverse", n_fft), &tensor, |b, t| {
            b.iter(|| inverse(black_box(t)).unwrap())
        });
    }
    group.finish();
}

fn bench_codec(c: &mut Criterion) {
    let tensor = forward(test_signal(2.0).view(), SR, StftParams::default()).unwrap();
    let bytes = codec::encode(&tensor).unwrap();

    c.bench_function("spx_encode", |b| b.iter(|| codec::encode(black_box(&tensor)).unwrap()));
    c.bench_function("spx_decode", |b| b.iter(|| codec::decode(black_box(&bytes)).unwrap()));
}

criterion_group!(benches, bench_transform_pair, bench_codec);
criterion_main!(benches);
