use picmatch::cluster::{local_cluster, run_worker, ROOT};
use picmatch::{
    parse_dataset, AcceleratorMode, DistributeConfig, EmulatedDevice, MatchConfig, MatchResult,
    Position, WorkDistributor,
};
use std::thread;

// Three pictures, three objects. Picture 20 contains object 2 at (2,2) and
// object 3 (which comes later) at (0,0). Picture 30 is smaller than every
// object.
const INPUT: &str = "\
0.05
3
10 4
1 2 3 4
5 6 7 8
9 10 11 12
13 14 15 16
20 4
3 3 1 1
3 3 1 1
1 1 8 9
1 1 7 6
30 1
50
3
1 2
100 100 100 100
2 2
8 9
7 6
3 2
3 3
3 3
";

fn cpu_config(workers: usize) -> DistributeConfig {
    DistributeConfig {
        workers,
        matcher: MatchConfig {
            accelerator: AcceleratorMode::Disabled,
            threads: 2,
        },
    }
}

fn lines(results: &[MatchResult]) -> Vec<String> {
    results.iter().map(ToString::to_string).collect()
}

#[test]
fn distributor_reports_first_object_in_input_order() {
    let dataset = parse_dataset(INPUT).unwrap();
    let results = WorkDistributor::new(cpu_config(3)).run(&dataset).unwrap();

    assert_eq!(
        lines(&results),
        vec![
            "Picture 10 No Objects were found".to_string(),
            "Picture 20 found Object 2 in Position(2,2)".to_string(),
            "Picture 30 No Objects were found".to_string(),
        ]
    );
}

#[test]
fn results_do_not_depend_on_worker_count() {
    let dataset = parse_dataset(INPUT).unwrap();
    let single = WorkDistributor::new(cpu_config(1)).run(&dataset).unwrap();
    for workers in 2..=5 {
        let many = WorkDistributor::new(cpu_config(workers)).run(&dataset).unwrap();
        assert_eq!(lines(&single), lines(&many), "workers {workers}");
    }
}

#[test]
fn emulated_accelerator_produces_same_lines() {
    let dataset = parse_dataset(INPUT).unwrap();
    let device = EmulatedDevice::new();
    let cfg = DistributeConfig {
        workers: 2,
        matcher: MatchConfig::default(),
    };
    let results = WorkDistributor::with_accelerator(cfg, Some(&device))
        .run(&dataset)
        .unwrap();

    // Each position here is the only one below the threshold.
    let found = results[1].matched().unwrap();
    assert_eq!(found.object_id, 2);
    assert_eq!(found.position, Position { i: 2, j: 2 });
    assert!(!results[0].is_found());
    assert!(!results[2].is_found());
}

#[test]
fn zero_workers_is_rejected() {
    let dataset = parse_dataset(INPUT).unwrap();
    assert!(WorkDistributor::new(cpu_config(0)).run(&dataset).is_err());
}

#[test]
fn workers_exchange_only_records_with_root() {
    let dataset = parse_dataset(INPUT).unwrap();
    let cfg = MatchConfig {
        accelerator: AcceleratorMode::Disabled,
        threads: 1,
    };

    let merged = thread::scope(|scope| {
        let handles: Vec<_> = local_cluster(2)
            .into_iter()
            .enumerate()
            .map(|(rank, comm)| {
                let payload = (rank == ROOT).then_some(&dataset);
                let cfg = &cfg;
                scope.spawn(move || run_worker(&comm, payload, cfg, None::<&EmulatedDevice>))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect::<Vec<_>>()
    });

    assert!(merged[ROOT].is_some());
    assert!(merged[1].is_none());
    assert_eq!(merged[ROOT].as_ref().unwrap().len(), 3);
}
