use criterion::{criterion_group, criterion_main, Criterion};
use kaze::image::{gaussian_kernel, horizontal_filter, vertical_filter, GrayFloatImage};
use kaze::{Kaze, KazeOptions};

fn checkerboard(width: usize, height: usize, square: usize) -> GrayFloatImage {
    let mut image = GrayFloatImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let value = if ((x / square) + (y / square)) % 2 == 0 {
                1.0
            } else {
                0.0
            };
            image.put(x, y, value);
        }
    }
    image
}

fn extract(c: &mut Criterion) {
    let image = checkerboard(256, 256, 16);
    c.bench_function("extract", |b| {
        let mut kaze = Kaze::new(KazeOptions::new(256, 256)).unwrap();
        b.iter(|| kaze.extract_from_gray_float_image(&image).unwrap())
    });
}

criterion_group!(
    name = kaze;
    config = Criterion::default().sample_size(10);
    targets = extract
);

fn bench_horizontal_filter(c: &mut Criterion) {
    let image = checkerboard(256, 256, 16);
    let small_kernel = gaussian_kernel(1.0, 7);
    c.bench_function("horizontal_filter_small_kernel", |b| {
        b.iter(|| horizontal_filter(&image, &small_kernel))
    });
    let large_kernel = gaussian_kernel(10.0, 71);
    c.bench_function("horizontal_filter_large_kernel", |b| {
        b.iter(|| horizontal_filter(&image, &large_kernel))
    });
}

fn bench_vertical_filter(c: &mut Criterion) {
    let image = checkerboard(256, 256, 16);
    let small_kernel = gaussian_kernel(1.0, 7);
    c.bench_function("vertical_filter_small_kernel", |b| {
        b.iter(|| vertical_filter(&image, &small_kernel))
    });
    let large_kernel = gaussian_kernel(10.0, 71);
    c.bench_function("vertical_filter_large_kernel", |b| {
        b.iter(|| vertical_filter(&image, &large_kernel))
    });
}

criterion_group!(
    name = kaze_image;
    config = Criterion::default().sample_size(10);
    targets = bench_horizontal_filter, bench_vertical_filter
);

criterion_main!(kaze, kaze_image);
