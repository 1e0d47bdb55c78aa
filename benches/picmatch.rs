use criterion::{criterion_group, criterion_main, Criterion};
use picmatch::{
    scan_first, tasked_row_search, AcceleratorMode, EmulatedDevice, MatchConfig, Object, Picture,
    PictureMatcher,
};
use std::hint::black_box;

fn make_picture(id: i32, size: usize) -> Picture {
    let mut data = Vec::with_capacity(size * size);
    for i in 0..size {
        for j in 0..size {
            let value = (((j * 13) ^ (i * 7) ^ (i * j)) & 0xFF) as i32 + 1;
            data.push(value);
        }
    }
    Picture::new(id, size, data).unwrap()
}

fn extract_object(picture: &Picture, id: i32, i0: usize, j0: usize, size: usize) -> Object {
    let mut out = Vec::with_capacity(size * size);
    for r in 0..size {
        let row = (i0 + r) * picture.size();
        out.extend_from_slice(&picture.data()[row + j0..row + j0 + size]);
    }
    Object::new(id, size, out).unwrap()
}

fn bench_search(c: &mut Criterion) {
    let picture = make_picture(1, 384);
    let late = extract_object(&picture, 2, 300, 310, 48);
    let absent = Object::new(3, 48, vec![1000; 48 * 48]).unwrap();
    let threshold = 0.05;

    c.bench_function("scan_first_late_match", |b| {
        b.iter(|| black_box(scan_first(&picture, &late, threshold)));
    });
    c.bench_function("tasked_rows_late_match", |b| {
        b.iter(|| black_box(tasked_row_search(&picture, &late, threshold)));
    });
    c.bench_function("tasked_rows_no_match", |b| {
        b.iter(|| black_box(tasked_row_search(&picture, &absent, threshold)));
    });

    let objects = vec![absent.clone(), absent.clone(), late.clone()];
    let cpu = PictureMatcher::with_accelerator(
        &MatchConfig {
            accelerator: AcceleratorMode::Disabled,
            threads: 0,
        },
        None::<&EmulatedDevice>,
    )
    .unwrap();
    c.bench_function("matcher_cpu_three_objects", |b| {
        b.iter(|| black_box(cpu.match_picture(&picture, &objects, threshold)));
    });

    let device = EmulatedDevice::new();
    let emulated = PictureMatcher::with_accelerator(&MatchConfig::default(), Some(&device)).unwrap();
    c.bench_function("matcher_emulated_three_objects", |b| {
        b.iter(|| black_box(emulated.match_picture(&picture, &objects, threshold)));
    });
}

criterion_group!(benches, bench_search);
criterion_main!(benches);
