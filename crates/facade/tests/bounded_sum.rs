use dp_stats::primitives::test_utils::ZeroNoiseBuilder;
use dp_stats::{ApproxBounds, BoundedSum, LaplaceMechanismBuilder, Summary};

#[test]
fn sharded_auto_bounds_pipeline_recovers_the_clamped_sum() {
    // Three shards ingest disjoint data in parallel and are merged into one
    // aggregator before a single noise-addition pass.
    let epsilon = 1000.0;
    let make_shard = |seed: u64| -> BoundedSum<f64> {
        let estimator = ApproxBounds::builder()
            .with_epsilon(epsilon)
            .with_seed(seed)
            .build()
            .expect("valid estimator");
        BoundedSum::builder()
            .with_epsilon(epsilon)
            .with_approx_bounds(estimator)
            .with_mechanism_builder(LaplaceMechanismBuilder::new().with_seed(seed))
            .build()
            .expect("valid aggregator")
    };

    let mut shards = [make_shard(1), make_shard(2), make_shard(3)];
    for i in 0..300 {
        let value = if i % 3 == 0 { 4.0 } else { -2.0 };
        shards[i % 3].add_entry(value);
    }

    let [mut root, s1, s2] = shards;
    root.merge(&s1.serialize()).expect("compatible shard");
    root.merge(&s2.serialize()).expect("compatible shard");

    let output = root.generate_result(1.0).expect("result");
    let value = output.value.expect("value");

    // 100 entries of 4.0 and 200 of -2.0, none clamped: true sum is 0.
    // With epsilon this large, noise is far below the assertion slack.
    assert!(value.abs() < 1.0, "noised sum {value} too far from 0");

    let report = output.error_report.expect("error report");
    let bounding = report.bounding_report.expect("bounding report");
    assert_eq!(bounding.num_inputs, 300);
    assert_eq!(bounding.lower, -bounding.upper);
    assert!(report.noise_confidence_interval.is_some());
}

#[test]
fn summaries_survive_a_serialization_boundary() {
    let build = || -> BoundedSum<i64, ZeroNoiseBuilder> {
        BoundedSum::builder()
            .with_epsilon(1.0)
            .with_bounds(-10, 10)
            .with_mechanism_builder(ZeroNoiseBuilder::new())
            .build()
            .expect("valid aggregator")
    };

    let mut remote = build();
    for v in [7, -3, 25, -25] {
        remote.add_entry(v);
    }

    // Ship the summary across a process boundary as JSON.
    let wire = serde_json::to_string(&remote.serialize()).expect("encode");
    let summary: Summary<i64> = serde_json::from_str(&wire).expect("decode");

    let mut local = build();
    local.merge(&summary).expect("compatible");
    let output = local.generate_result(1.0).expect("result");
    // 7 - 3 + 10 - 10 = 4 after clamping.
    assert_eq!(output.value, Some(4));
}

#[test]
fn manual_bounds_expose_a_confidence_interval_up_front() {
    let mut agg: BoundedSum<f64> = BoundedSum::builder()
        .with_epsilon(2.0)
        .with_bounds(-5.0, 5.0)
        .with_mechanism_builder(LaplaceMechanismBuilder::new().with_seed(11))
        .build()
        .expect("valid aggregator");

    let interval = agg
        .noise_confidence_interval(0.95, 1.0)
        .expect("fixed sensitivity");
    assert!(interval.lower < 0.0 && interval.upper > 0.0);
    assert!((interval.lower + interval.upper).abs() < 1e-9);
}
