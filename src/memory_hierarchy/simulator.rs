// Copyright (c) 2024 Mudit Bhargava
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.
//

// simulator.rs
//
// This file contains the hierarchy assembly and the trace experiment driver.
// It builds the level chain bottom-up over a shared main memory, replays a
// trace under the warm-up/measure protocol for each replacement policy, and
// folds AMAT from the memory leaf upward.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;
use serde::Serialize;

use super::components::Cache;
use super::config::{CacheConfig, ReplacementPolicy};
use super::storage::{AccessType, MainMemory, Storage, StorageLatency, StorageStats};
use crate::errors::SimulatorError;
use crate::utils::parser::TraceRecord;

// Warm the hierarchy with 100 passes over the trace, then measure 10.
pub const WARMUP_ITERATIONS: usize = 100;
pub const MEASURE_ITERATIONS: usize = 10;

// Bypass is enabled on the levels selected by this mask (bit i = level i,
// counted from 1 at the top).
pub const BYPASS_LEVEL_MASK: u32 = 0x4;
pub const BYPASS_SHIFTBIT: u32 = 32;
pub const BYPASS_THRESHOLD: f64 = 0.8;

// Latency profile keyed by cache size; sizes without a profile are a
// configuration fault.
pub fn latency_for_size(size_kb: usize) -> Result<StorageLatency, SimulatorError> {
    match size_kb {
        32 => Ok(StorageLatency::new(0, 3)),
        256 => Ok(StorageLatency::new(6, 4)),
        _ => Err(SimulatorError::UnsupportedCacheSize(size_kb)),
    }
}

pub fn stream_buffers_for_size(size_kb: usize) -> Result<usize, SimulatorError> {
    match size_kb {
        32 => Ok(64),
        256 => Ok(1024),
        _ => Err(SimulatorError::UnsupportedCacheSize(size_kb)),
    }
}

// One cache level as supplied by the interactive configuration.
#[derive(Debug, Clone)]
pub struct LevelSpec {
    pub size_kb: usize,
    pub associativity: usize,
    pub block_size: usize,
    pub write_through: bool,
}

impl LevelSpec {
    // `level` counts from 1 at the top, matching the bypass mask.
    pub fn to_cache_config(&self, level: usize) -> Result<CacheConfig, SimulatorError> {
        let pf_buf_num = stream_buffers_for_size(self.size_kb)?;
        let mut config =
            CacheConfig::new(1024 * self.size_kb, self.associativity, self.block_size)
                .with_write_through(self.write_through)
                .with_prefetch_buffers(pf_buf_num);
        if (BYPASS_LEVEL_MASK >> level) & 1 == 1 {
            config = config.with_bypass(BYPASS_SHIFTBIT, BYPASS_THRESHOLD);
        }
        Ok(config)
    }
}

// A linear chain of caches over one main memory. Level 0 is the top; every
// cache borrows its lower neighbour and the shared leaf.
pub struct Hierarchy {
    caches: Vec<Rc<RefCell<Cache>>>,
    memory: Rc<RefCell<MainMemory>>,
}

impl Hierarchy {
    pub fn new(levels: Vec<(CacheConfig, StorageLatency)>) -> Self {
        assert!(!levels.is_empty(), "At least one cache level is required");

        let memory = Rc::new(RefCell::new(MainMemory::new()));
        let mut caches: Vec<Rc<RefCell<Cache>>> = Vec::with_capacity(levels.len());

        // Bottom-up so each level's lower pointer already exists.
        let mut lower: Rc<RefCell<dyn Storage>> = memory.clone();
        for (config, latency) in levels.into_iter().rev() {
            let cache = Rc::new(RefCell::new(Cache::new(
                config,
                lower,
                memory.clone(),
                latency,
            )));
            lower = cache.clone();
            caches.push(cache);
        }
        caches.reverse();

        Self { caches, memory }
    }

    pub fn handle_request(&self, addr: u64, access: AccessType, policy: ReplacementPolicy) {
        self.caches[0].borrow_mut().handle_request(addr, access, policy);
    }

    pub fn level_count(&self) -> usize {
        self.caches.len()
    }

    pub fn level(&self, index: usize) -> Rc<RefCell<Cache>> {
        self.caches[index].clone()
    }

    pub fn memory(&self) -> Rc<RefCell<MainMemory>> {
        self.memory.clone()
    }

    pub fn level_stats(&self, index: usize) -> StorageStats {
        self.caches[index].borrow().stats().clone()
    }

    pub fn memory_stats(&self) -> StorageStats {
        self.memory.borrow().stats().clone()
    }

    // Zero every level's statistics and learned bypass state (between the
    // warm-up and measurement phases).
    pub fn reset(&self) {
        for cache in &self.caches {
            let mut cache = cache.borrow_mut();
            cache.reset_stats();
            cache.bypass_clear();
        }
        self.memory.borrow_mut().reset_stats();
    }

    pub fn total_cycles(&self) -> u64 {
        let cache_cycles: u64 = self
            .caches
            .iter()
            .map(|cache| cache.borrow().stats().access_cycle)
            .sum();
        cache_cycles + self.memory.borrow().stats().access_cycle
    }

    // AMAT_i = hit_i + miss_rate_i * (bus_i + AMAT_{i+1}), seeded with the
    // memory leaf's hit latency.
    pub fn amat(&self) -> f64 {
        let mut amat = self.memory.borrow().latency().hit_latency as f64;
        for cache in self.caches.iter().rev() {
            let cache = cache.borrow();
            let latency = cache.latency();
            amat = latency.hit_latency as f64
                + cache.stats().miss_rate() * (latency.bus_latency as f64 + amat);
        }
        amat
    }
}

// Everything the driver reports for one replacement policy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PolicyOutcome {
    pub policy: String,
    pub code: u32,
    pub levels: Vec<StorageStats>,
    pub memory: StorageStats,
    pub miss_rates: Vec<f64>,
    pub total_cycles: u64,
    pub amat: f64,
}

// Replays one trace against a fixed level configuration, once per policy,
// always on a freshly built hierarchy.
pub struct TraceExperiment {
    levels: Vec<(CacheConfig, StorageLatency)>,
    trace: Vec<TraceRecord>,
}

impl TraceExperiment {
    pub fn new(specs: &[LevelSpec], trace: Vec<TraceRecord>) -> Result<Self, SimulatorError> {
        if !(1..=3).contains(&specs.len()) {
            return Err(SimulatorError::InvalidCacheLevels(specs.len()));
        }

        let mut levels = Vec::with_capacity(specs.len());
        for (index, spec) in specs.iter().enumerate() {
            let latency = latency_for_size(spec.size_kb)?;
            levels.push((spec.to_cache_config(index + 1)?, latency));
        }

        Ok(Self { levels, trace })
    }

    pub fn run_policy(&self, policy: ReplacementPolicy) -> PolicyOutcome {
        let hierarchy = Hierarchy::new(self.levels.clone());

        info!("warming up {} for {} passes", policy.name(), WARMUP_ITERATIONS);
        for _ in 0..WARMUP_ITERATIONS {
            self.replay(&hierarchy, policy);
        }

        hierarchy.reset();

        for _ in 0..MEASURE_ITERATIONS {
            self.replay(&hierarchy, policy);
        }

        let levels: Vec<StorageStats> = (0..hierarchy.level_count())
            .map(|i| hierarchy.level_stats(i))
            .collect();
        let miss_rates = levels.iter().map(StorageStats::miss_rate).collect();

        PolicyOutcome {
            policy: policy.name().to_string(),
            code: policy.code(),
            memory: hierarchy.memory_stats(),
            miss_rates,
            total_cycles: hierarchy.total_cycles(),
            amat: hierarchy.amat(),
            levels,
        }
    }

    pub fn run_all(&self) -> Vec<PolicyOutcome> {
        ReplacementPolicy::ALL
            .iter()
            .map(|&policy| self.run_policy(policy))
            .collect()
    }

    fn replay(&self, hierarchy: &Hierarchy, policy: ReplacementPolicy) {
        for record in &self.trace {
            hierarchy.handle_request(record.address, record.access, policy);
        }
    }
}
