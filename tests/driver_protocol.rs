// tests/driver_protocol.rs
use cachesim_rust::errors::SimulatorError;
use cachesim_rust::memory_hierarchy::config::ReplacementPolicy;
use cachesim_rust::memory_hierarchy::simulator::{
    latency_for_size, stream_buffers_for_size, LevelSpec, TraceExperiment,
};
use cachesim_rust::memory_hierarchy::storage::AccessType;
use cachesim_rust::utils::parser::TraceRecord;

fn spec(size_kb: usize) -> LevelSpec {
    LevelSpec {
        size_kb,
        associativity: 4,
        block_size: 64,
        write_through: false,
    }
}

fn tiny_trace() -> Vec<TraceRecord> {
    [0x1000u64, 0x2000, 0x1000, 0x3040]
        .iter()
        .map(|&address| TraceRecord {
            address,
            access: AccessType::Read,
        })
        .collect()
}

#[test]
fn latency_profiles_match_the_size_table() {
    let small = latency_for_size(32).unwrap();
    assert_eq!((small.bus_latency, small.hit_latency), (0, 3));

    let large = latency_for_size(256).unwrap();
    assert_eq!((large.bus_latency, large.hit_latency), (6, 4));

    assert!(matches!(
        latency_for_size(64),
        Err(SimulatorError::UnsupportedCacheSize(64))
    ));
}

#[test]
fn stream_buffer_counts_match_the_size_table() {
    assert_eq!(stream_buffers_for_size(32).unwrap(), 64);
    assert_eq!(stream_buffers_for_size(256).unwrap(), 1024);
    assert!(stream_buffers_for_size(128).is_err());
}

#[test]
fn bypass_is_enabled_only_on_the_masked_level() {
    let level1 = spec(32).to_cache_config(1).unwrap();
    assert!(level1.bypass_shiftbit.is_none());

    let level2 = spec(256).to_cache_config(2).unwrap();
    assert_eq!(level2.bypass_shiftbit, Some(32));
    assert!((level2.bypass_threshold - 0.8).abs() < f64::EPSILON);

    let level3 = spec(256).to_cache_config(3).unwrap();
    assert!(level3.bypass_shiftbit.is_none());
}

#[test]
fn derived_geometry_follows_the_protocol() {
    let config = spec(32).to_cache_config(1).unwrap();
    assert_eq!(config.size, 32 * 1024);
    assert_eq!(config.set_num, 32 * 1024 / (4 * 64));
    assert_eq!(config.block_bit, 6);
    assert_eq!(config.set_bit, 7);
    assert!(config.write_allocate);
    assert_eq!(config.pf_buf_num, 64);

    let through = LevelSpec {
        write_through: true,
        ..spec(32)
    }
    .to_cache_config(1)
    .unwrap();
    assert!(through.write_through);
    assert!(!through.write_allocate);
}

#[test]
fn unknown_policy_codes_are_rejected() {
    assert!(ReplacementPolicy::from_code(0x2A).is_err());
    assert!(ReplacementPolicy::from_code(0).is_err());
    for code in 0x20..=0x29 {
        let policy = ReplacementPolicy::from_code(code).unwrap();
        assert_eq!(policy.code(), code);
    }
}

#[test]
fn level_count_is_validated() {
    assert!(TraceExperiment::new(&[], tiny_trace()).is_err());

    let too_many = vec![spec(32), spec(32), spec(32), spec(32)];
    assert!(TraceExperiment::new(&too_many, tiny_trace()).is_err());
}

#[test]
fn measurement_runs_on_reset_statistics() {
    let experiment = TraceExperiment::new(&[spec(32)], tiny_trace()).unwrap();
    let outcome = experiment.run_policy(ReplacementPolicy::LRU);

    // 10 measured passes over 4 records.
    assert_eq!(outcome.levels[0].access_counter, 40);
    // The working set fits after warm-up: the measured phase never misses.
    assert_eq!(outcome.levels[0].miss_num, 0);
    assert_eq!(outcome.memory.access_counter, 0);
    // AMAT with a zero miss rate is the bare hit latency.
    assert!((outcome.amat - 3.0).abs() < 1e-12);
}

#[test]
fn run_all_covers_every_policy_code() {
    let experiment = TraceExperiment::new(&[spec(32)], tiny_trace()).unwrap();
    let outcomes = experiment.run_all();

    let codes: Vec<u32> = outcomes.iter().map(|outcome| outcome.code).collect();
    assert_eq!(codes, (0x20..=0x29).collect::<Vec<u32>>());
}
