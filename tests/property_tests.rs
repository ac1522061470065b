use proptest::prelude::*;
use quickcheck::TestResult;
use std::io::Write;

use cachesim_rust::memory_hierarchy::config::{CacheConfig, ReplacementPolicy};
use cachesim_rust::memory_hierarchy::simulator::Hierarchy;
use cachesim_rust::memory_hierarchy::storage::{AccessType, StorageLatency, StorageStats};
use cachesim_rust::utils::parser::load_trace;

// Property-based tests using proptest

fn small_hierarchy(config: CacheConfig) -> Hierarchy {
    Hierarchy::new(vec![(config, StorageLatency::new(0, 3))])
}

fn replay(
    hierarchy: &Hierarchy,
    trace: &[(u64, bool)],
    policy: ReplacementPolicy,
) -> (StorageStats, StorageStats) {
    for &(addr, is_write) in trace {
        let access = if is_write {
            AccessType::Write
        } else {
            AccessType::Read
        };
        hierarchy.handle_request(addr, access, policy);
    }
    (hierarchy.level_stats(0), hierarchy.memory_stats())
}

// The structural invariants every request must preserve, checked per set.
fn assert_set_invariants(hierarchy: &Hierarchy, policy: ReplacementPolicy) {
    let cache = hierarchy.level(0);
    let cache = cache.borrow();
    let associativity = cache.config.associativity;

    for set in &cache.sets {
        assert!(set.valid_count() <= associativity);

        let mut tags: Vec<u64> = set
            .lines
            .iter()
            .filter(|line| line.valid)
            .map(|line| line.tag)
            .collect();
        let valid = tags.len();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(valid, tags.len(), "duplicate valid tags under {:?}", policy);

        for line in &set.lines {
            if line.dirty {
                assert!(line.valid, "dirty invalid line under {:?}", policy);
            }
        }

        match policy {
            ReplacementPolicy::SLRU | ReplacementPolicy::LFRU => {
                assert!(
                    set.protected_count() <= associativity / 2,
                    "protected quota exceeded under {:?}",
                    policy
                );
            },
            ReplacementPolicy::ARC => {
                assert!(set.arc_lim >= 1 && set.arc_lim <= associativity - 1);
                assert!(set.protected_count() <= associativity - 1);
            },
            _ => {},
        }
    }
}

proptest! {
    #[test]
    fn invariants_hold_after_every_request(
        trace in prop::collection::vec((0u64..4096, any::<bool>()), 1..200),
        policy_index in 0usize..10,
    ) {
        let policy = ReplacementPolicy::ALL[policy_index];
        let hierarchy = small_hierarchy(CacheConfig::new(64, 4, 4));

        for &(addr, is_write) in &trace {
            let access = if is_write { AccessType::Write } else { AccessType::Read };
            hierarchy.handle_request(addr, access, policy);

            let stats = hierarchy.level_stats(0);
            prop_assert!(stats.miss_num <= stats.access_counter);
            prop_assert!(stats.fetch_num <= stats.access_counter + stats.prefetch_num);
            assert_set_invariants(&hierarchy, policy);
        }
    }

    #[test]
    fn write_through_invariants_hold_as_well(
        trace in prop::collection::vec((0u64..4096, any::<bool>()), 1..200),
        policy_index in 0usize..10,
    ) {
        let policy = ReplacementPolicy::ALL[policy_index];
        let hierarchy = small_hierarchy(CacheConfig::new(64, 4, 4).with_write_through(true));

        for &(addr, is_write) in &trace {
            let access = if is_write { AccessType::Write } else { AccessType::Read };
            hierarchy.handle_request(addr, access, policy);
            assert_set_invariants(&hierarchy, policy);

            // Write-through never leaves dirty state behind.
            let cache = hierarchy.level(0);
            let cache = cache.borrow();
            for set in &cache.sets {
                prop_assert!(set.lines.iter().all(|line| !line.dirty));
            }
        }
    }

    #[test]
    fn deterministic_policies_replay_identically(
        trace in prop::collection::vec((0u64..2048, any::<bool>()), 1..150),
        policy_index in 0usize..10,
    ) {
        let policy = ReplacementPolicy::ALL[policy_index];
        prop_assume!(policy != ReplacementPolicy::RR);

        let first = replay(&small_hierarchy(CacheConfig::new(64, 4, 4)), &trace, policy);
        let second = replay(&small_hierarchy(CacheConfig::new(64, 4, 4)), &trace, policy);

        prop_assert_eq!(first, second);
    }

    #[test]
    fn second_touch_always_hits(addr in 0u64..65536) {
        for policy in [
            ReplacementPolicy::LRU,
            ReplacementPolicy::LFU,
            ReplacementPolicy::SLRU,
            ReplacementPolicy::ARC,
        ] {
            let hierarchy = small_hierarchy(CacheConfig::new(256, 4, 4));

            hierarchy.handle_request(addr, AccessType::Read, policy);
            hierarchy.handle_request(addr, AccessType::Read, policy);

            prop_assert_eq!(hierarchy.level_stats(0).miss_num, 1);
        }
    }
}

// QuickCheck-based tests

fn qc_stats_stay_bounded(addrs: Vec<u16>, policy_index: u8) -> TestResult {
    if addrs.is_empty() || addrs.len() > 500 {
        return TestResult::discard();
    }

    let policy = ReplacementPolicy::ALL[(policy_index as usize) % 10];
    let hierarchy = small_hierarchy(CacheConfig::new(64, 2, 4).with_prefetch_buffers(2));

    for &addr in &addrs {
        hierarchy.handle_request(u64::from(addr), AccessType::Read, policy);
    }

    let stats = hierarchy.level_stats(0);
    TestResult::from_bool(
        stats.access_counter == addrs.len() as u64
            && stats.miss_num <= stats.access_counter
            && stats.fetch_num <= stats.access_counter + stats.prefetch_num,
    )
}

fn qc_every_write_through_reaches_memory(addrs: Vec<u16>) -> TestResult {
    if addrs.is_empty() || addrs.len() > 500 {
        return TestResult::discard();
    }

    let hierarchy = small_hierarchy(CacheConfig::new(64, 2, 4).with_write_through(true));

    for &addr in &addrs {
        hierarchy.handle_request(u64::from(addr), AccessType::Write, ReplacementPolicy::LRU);
    }

    // A write hit forwards one write, a write miss goes straight to memory:
    // one memory access either way.
    TestResult::from_bool(hierarchy.memory_stats().access_counter == addrs.len() as u64)
}

fn qc_trace_files_round_trip(records: Vec<(u32, bool)>) -> TestResult {
    if records.is_empty() || records.len() > 200 {
        return TestResult::discard();
    }

    let mut file = match tempfile::NamedTempFile::new() {
        Ok(file) => file,
        Err(_) => return TestResult::discard(),
    };
    for &(addr, is_write) in &records {
        let kind = if is_write { 'w' } else { 'r' };
        if writeln!(file, "{}{:x}", kind, addr).is_err() {
            return TestResult::discard();
        }
    }

    let parsed = match load_trace(file.path()) {
        Ok(parsed) => parsed,
        Err(_) => return TestResult::from_bool(false),
    };

    if parsed.len() != records.len() {
        return TestResult::from_bool(false);
    }
    let matches = parsed.iter().zip(records.iter()).all(|(record, &(addr, is_write))| {
        record.address == u64::from(addr)
            && (record.access == AccessType::Write) == is_write
    });
    TestResult::from_bool(matches)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_quickcheck_tests() {
        // Run a smaller number of tests to avoid overwhelming output
        quickcheck::QuickCheck::new()
            .tests(20)
            .quickcheck(qc_stats_stay_bounded as fn(Vec<u16>, u8) -> TestResult);

        quickcheck::QuickCheck::new()
            .tests(20)
            .quickcheck(qc_every_write_through_reaches_memory as fn(Vec<u16>) -> TestResult);

        quickcheck::QuickCheck::new()
            .tests(10)
            .quickcheck(qc_trace_files_round_trip as fn(Vec<(u32, bool)>) -> TestResult);
    }
}
