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

// components.rs
//
// This file contains the storage components of a single cache level: the
// CacheLine and CacheSet structs, the ghost ring buffers backing ARC, and
// the Cache itself with its request pipeline and write/fetch controller.

use std::cell::RefCell;
use std::rc::Rc;

use log::info;

use super::bypass::BypassFilter;
use super::config::{CacheConfig, ReplacementPolicy};
use super::prefetch::{StreamLookup, StreamPrefetcher};
use super::replacement::ReplaceOutcome;
use super::storage::{AccessType, MainMemory, Storage, StorageLatency, StorageStats};

// Ghost ring capacity used by ARC's B1/B2 history.
pub const GHOST_CAPACITY: usize = 8;

// A single cache line. The weight word is the only ordering key between
// lines; each replacement policy packs its own quantity into it (recency
// timestamp, frequency counter, protection bit in the LSB, ARC's dual age
// key). A cache warmed under one policy has no meaningful weights under
// another.
#[derive(Debug, Clone, Default)]
pub struct CacheLine {
    pub valid: bool,
    pub dirty: bool,
    pub tag: u64,
    pub weight: u64,
}

// A bounded recency window of evicted tags. Not a full LRU history: eight
// slots, overwritten in ring order.
#[derive(Debug, Clone)]
pub struct GhostRing {
    keys: Vec<u64>,
    head: usize,
    capacity: usize,
}

impl GhostRing {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Ghost ring capacity must be positive");
        Self {
            keys: Vec::new(),
            head: 0,
            capacity,
        }
    }

    // Slots are allocated on the first push; an untouched ring matches
    // nothing.
    pub fn push(&mut self, tag: u64) {
        if self.keys.is_empty() {
            self.keys = vec![0; self.capacity];
        }
        self.keys[self.head] = tag;
        self.head = (self.head + 1) % self.capacity;
    }

    pub fn contains(&self, tag: u64) -> bool {
        self.keys.iter().any(|&key| key == tag)
    }
}

pub struct CacheSet {
    pub lines: Vec<CacheLine>,
    // ARC's target protected-partition size, kept in [1, associativity-1].
    pub arc_lim: usize,
    // Ghost histories of probationary (b1) and protected (b2) evictions.
    pub b1: GhostRing,
    pub b2: GhostRing,
}

impl CacheSet {
    pub fn new(associativity: usize) -> Self {
        assert!(associativity > 0, "Associativity must be positive");
        Self {
            lines: vec![CacheLine::default(); associativity],
            arc_lim: (associativity / 2).max(1),
            b1: GhostRing::new(GHOST_CAPACITY),
            b2: GhostRing::new(GHOST_CAPACITY),
        }
    }

    pub fn valid_count(&self) -> usize {
        self.lines.iter().filter(|line| line.valid).count()
    }

    // Lines whose weight carries the protection bit (SLRU/LFRU/ARC).
    pub fn protected_count(&self) -> usize {
        self.lines
            .iter()
            .filter(|line| line.valid && line.weight & 1 == 1)
            .count()
    }
}

// One level of the hierarchy. Requests that miss (and are not bypassed or
// prefetch-satisfied) descend through `lower`; `memory` is the shared leaf,
// addressed directly only by write-no-allocate writes.
pub struct Cache {
    pub config: CacheConfig,
    pub sets: Vec<CacheSet>,
    stats: StorageStats,
    latency: StorageLatency,
    bypass: BypassFilter,
    prefetcher: StreamPrefetcher,
    lower: Rc<RefCell<dyn Storage>>,
    memory: Rc<RefCell<MainMemory>>,
}

impl Cache {
    pub fn new(
        config: CacheConfig,
        lower: Rc<RefCell<dyn Storage>>,
        memory: Rc<RefCell<MainMemory>>,
        latency: StorageLatency,
    ) -> Self {
        let sets = (0..config.set_num)
            .map(|_| CacheSet::new(config.associativity))
            .collect();
        let bypass = BypassFilter::new(config.bypass_shiftbit, config.bypass_threshold);
        let prefetcher = StreamPrefetcher::new(config.pf_buf_num);

        info!(
            "creating cache: {} sets x {} ways, {}B blocks, {} stream buffers",
            config.set_num, config.associativity, config.block_size, config.pf_buf_num
        );

        Self {
            config,
            sets,
            stats: StorageStats::new(),
            latency,
            bypass,
            prefetcher,
            lower,
            memory,
        }
    }

    // Drop the bypass filter's learned statistics (between warm-up and
    // measurement phases).
    pub fn bypass_clear(&mut self) {
        self.bypass.clear();
    }

    pub fn prefetcher(&self) -> &StreamPrefetcher {
        &self.prefetcher
    }

    // Apply a miss outcome: evict the victim, install the new line, and
    // fetch from (or forward to) the level below.
    fn fill_line(
        &mut self,
        addr: u64,
        victim: usize,
        weight: u64,
        access: AccessType,
        prefetched: bool,
        policy: ReplacementPolicy,
    ) {
        let (tag, set_idx) = self.config.split_address(addr);

        match access {
            AccessType::Read => {
                self.evict_victim(set_idx, victim, policy);

                let line = &mut self.sets[set_idx].lines[victim];
                line.valid = true;
                line.dirty = false;
                line.tag = tag;
                line.weight = weight;

                if !prefetched {
                    self.lower
                        .borrow_mut()
                        .handle_request(addr, AccessType::Read, policy);
                }
                self.stats.fetch_num += 1;
            },
            AccessType::Write => {
                if !self.config.write_allocate {
                    // No local install: the write goes straight to memory.
                    self.memory
                        .borrow_mut()
                        .handle_request(addr, AccessType::Write, policy);
                } else {
                    self.evict_victim(set_idx, victim, policy);

                    let line = &mut self.sets[set_idx].lines[victim];
                    line.valid = true;
                    line.dirty = true;
                    line.tag = tag;
                    line.weight = weight;

                    self.lower
                        .borrow_mut()
                        .handle_request(addr, AccessType::Write, policy);
                    self.stats.fetch_num += 1;
                }
            },
        }
    }

    // Account the replacement and write a dirty victim back before its slot
    // is reused.
    fn evict_victim(&mut self, set_idx: usize, victim: usize, policy: ReplacementPolicy) {
        let line = &self.sets[set_idx].lines[victim];
        if line.valid {
            self.stats.replace_num += 1;
            if line.dirty {
                let tag_bit = self.config.block_bit + self.config.set_bit;
                let victim_addr =
                    (line.tag << tag_bit) | ((set_idx as u64) << self.config.block_bit);
                self.lower
                    .borrow_mut()
                    .handle_request(victim_addr, AccessType::Write, policy);
            }
        }
    }
}

impl Storage for Cache {
    fn handle_request(&mut self, addr: u64, access: AccessType, policy: ReplacementPolicy) {
        self.stats.access_counter += 1;
        let (tag, set_idx) = self.config.split_address(addr);

        // Hot-miss regions skip this level entirely: no local latency, no
        // local state change beyond the filter's own counters.
        if self.bypass.should_bypass(tag) {
            self.lower.borrow_mut().handle_request(addr, access, policy);
            return;
        }

        self.stats.access_cycle += self.latency.bus_latency;

        let counter = self.stats.access_counter;
        match self.sets[set_idx].replace_decision(tag, policy, counter) {
            ReplaceOutcome::Hit { line, weight } => {
                self.stats.access_cycle += self.latency.hit_latency;
                let hit_line = &mut self.sets[set_idx].lines[line];
                hit_line.weight = weight;

                if access == AccessType::Write {
                    if self.config.write_through {
                        self.lower
                            .borrow_mut()
                            .handle_request(addr, AccessType::Write, policy);
                    } else {
                        hit_line.dirty = true;
                    }
                }
            },
            ReplaceOutcome::Miss { victim, weight } => {
                self.stats.miss_num += 1;
                self.bypass.record_miss(tag);

                // A block already streamed in elides the read fetch; a fresh
                // miss claims the LRU stream buffer instead.
                let block = self.config.block_of(addr);
                let prefetched = match self.prefetcher.lookup(block) {
                    StreamLookup::AlreadyPrefetched => true,
                    StreamLookup::Fill(index) => {
                        self.stats.prefetch_num += 1;
                        let now = self.stats.access_counter;
                        self.prefetcher.install(index, block, now);
                        false
                    },
                    StreamLookup::Unavailable => false,
                };

                self.fill_line(addr, victim, weight, access, prefetched, policy);
            },
        }
    }

    fn stats(&self) -> &StorageStats {
        &self.stats
    }

    fn reset_stats(&mut self) {
        self.stats = StorageStats::new();
    }

    fn latency(&self) -> StorageLatency {
        self.latency
    }
}
