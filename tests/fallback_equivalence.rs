use picmatch::{
    scan_first, score, tasked_row_search, AcceleratorMode, EmulatedDevice, MatchConfig, Object, Picture,
    PictureMatcher,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const THRESHOLD: f64 = 0.05;

fn random_grid(rng: &mut StdRng, size: usize) -> Vec<i32> {
    (0..size * size).map(|_| rng.random_range(1..=255)).collect()
}

/// Copies a window of `picture` into an object, nudging one value so the
/// score is small but not always zero.
fn cut_object(rng: &mut StdRng, id: i32, picture: &Picture, size: usize) -> Object {
    let span = picture.size() - size + 1;
    let (i0, j0) = (rng.random_range(0..span), rng.random_range(0..span));
    let mut data = Vec::with_capacity(size * size);
    for r in 0..size {
        let row = &picture.data()[(i0 + r) * picture.size()..][..picture.size()];
        data.extend_from_slice(&row[j0..j0 + size]);
    }
    if rng.random_bool(0.5) {
        data[0] += 1;
    }
    Object::new(id, size, data).unwrap()
}

fn random_case(seed: u64) -> (Vec<Picture>, Vec<Object>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let pictures: Vec<Picture> = (0..4)
        .map(|id| {
            let size = rng.random_range(6..=14);
            Picture::new(id, size, random_grid(&mut rng, size)).unwrap()
        })
        .collect();

    let mut objects = Vec::new();
    for id in 0..6 {
        let object = if rng.random_bool(0.4) {
            let source = &pictures[rng.random_range(0..pictures.len())];
            let size = rng.random_range(1..=source.size().min(5));
            cut_object(&mut rng, 100 + id, source, size)
        } else {
            let size = rng.random_range(1..=16);
            Object::new(100 + id, size, random_grid(&mut rng, size)).unwrap()
        };
        objects.push(object);
    }
    (pictures, objects)
}

#[test]
fn row_search_agrees_with_sequential_scan() {
    for seed in 0..8 {
        let (pictures, objects) = random_case(seed);
        for picture in &pictures {
            for object in objects.iter().filter(|o| o.fits_in(picture)) {
                let tasked = tasked_row_search(picture, object, THRESHOLD);
                let first = scan_first(picture, object, THRESHOLD);
                assert_eq!(tasked.is_some(), first.is_some(), "seed {seed}");
                if let Some(pos) = tasked {
                    let value = score(picture, object, pos.i, pos.j).unwrap();
                    assert!(value < THRESHOLD, "seed {seed}: score {value}");
                }
            }
        }
    }
}

#[test]
fn accelerated_and_cpu_matchers_report_same_object() {
    let cpu = PictureMatcher::with_accelerator(
        &MatchConfig {
            accelerator: AcceleratorMode::Disabled,
            threads: 2,
        },
        None::<&EmulatedDevice>,
    )
    .unwrap();
    let device = EmulatedDevice::new();
    let accelerated = PictureMatcher::with_accelerator(
        &MatchConfig {
            accelerator: AcceleratorMode::Auto,
            threads: 2,
        },
        Some(&device),
    )
    .unwrap();
    assert!(accelerated.uses_accelerator());

    for seed in 0..8 {
        let (pictures, objects) = random_case(seed);
        for picture in &pictures {
            let expected = cpu.match_picture(picture, &objects, THRESHOLD);
            let actual = accelerated.match_picture(picture, &objects, THRESHOLD);
            assert_eq!(expected.picture_id(), actual.picture_id());
            assert_eq!(
                expected.matched().map(|f| f.object_id),
                actual.matched().map(|f| f.object_id),
                "seed {seed}, picture {}",
                picture.id()
            );
            if let Some(found) = actual.matched() {
                let object = objects.iter().find(|o| o.id() == found.object_id).unwrap();
                let value = score(picture, object, found.position.i, found.position.j).unwrap();
                assert!(value < THRESHOLD);
            }
        }
    }
}

#[test]
fn declining_device_resumes_on_cpu_without_changing_results() {
    let cpu = PictureMatcher::with_accelerator(
        &MatchConfig {
            accelerator: AcceleratorMode::Disabled,
            threads: 1,
        },
        None::<&EmulatedDevice>,
    )
    .unwrap();

    for fail_at in 0..3 {
        let device = EmulatedDevice::new().failing_at_evaluation(fail_at);
        let flaky = PictureMatcher::with_accelerator(&MatchConfig::default(), Some(&device)).unwrap();
        let (pictures, objects) = random_case(42 + fail_at as u64);
        for picture in &pictures {
            let expected = cpu.match_picture(picture, &objects, THRESHOLD);
            let actual = flaky.match_picture(picture, &objects, THRESHOLD);
            assert_eq!(
                expected.matched().map(|f| f.object_id),
                actual.matched().map(|f| f.object_id)
            );
        }
    }
}
