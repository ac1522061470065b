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

// storage.rs
//
// This file contains the pieces every storage node in the hierarchy shares:
// the access statistics record, the latency pair, the Storage capability the
// levels compose through, and the terminal main-memory node.

use serde::Serialize;

use super::config::ReplacementPolicy;

// Main memory answers every request with a fixed hit latency.
pub const MEMORY_BUS_LATENCY: u64 = 0;
pub const MEMORY_HIT_LATENCY: u64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub access_counter: u64,
    pub miss_num: u64,
    pub access_cycle: u64,  // Cycles charged at this node
    pub replace_num: u64,   // Valid lines evicted
    pub fetch_num: u64,     // Fills from the lower level
    pub prefetch_num: u64,  // Stream buffer installs
}

impl StorageStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn miss_rate(&self) -> f64 {
        if self.access_counter == 0 {
            0.0
        } else {
            self.miss_num as f64 / self.access_counter as f64
        }
    }

    pub fn summary(&self) -> String {
        let mut result = String::new();

        result.push_str(&format!("  access_counter: {}\n", self.access_counter));
        result.push_str(&format!("  miss_num:       {}\n", self.miss_num));
        result.push_str(&format!(
            "  miss_rate:      {:.4}%\n",
            self.miss_rate() * 100.0
        ));
        result.push_str(&format!("  access_cycle:   {}\n", self.access_cycle));
        result.push_str(&format!("  replace_num:    {}\n", self.replace_num));
        result.push_str(&format!("  fetch_num:      {}\n", self.fetch_num));

        result
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StorageLatency {
    pub bus_latency: u64, // Added to each request that is not bypassed
    pub hit_latency: u64, // Added on a hit at this node
}

impl StorageLatency {
    pub fn new(bus_latency: u64, hit_latency: u64) -> Self {
        Self {
            bus_latency,
            hit_latency,
        }
    }
}

// One request operation shared by every node in the chain. Statistics are
// updated locally before any forwarding so per-level counters stay
// consistent after each top-level call.
pub trait Storage {
    fn handle_request(&mut self, addr: u64, access: AccessType, policy: ReplacementPolicy);

    fn stats(&self) -> &StorageStats;

    fn reset_stats(&mut self);

    fn latency(&self) -> StorageLatency;
}

// The terminal sink of the hierarchy: accounts latency, keeps no state.
#[derive(Debug)]
pub struct MainMemory {
    stats: StorageStats,
    latency: StorageLatency,
}

impl MainMemory {
    pub fn new() -> Self {
        Self {
            stats: StorageStats::new(),
            latency: StorageLatency::new(MEMORY_BUS_LATENCY, MEMORY_HIT_LATENCY),
        }
    }
}

impl Default for MainMemory {
    fn default() -> Self {
        Self::new()
    }
}

impl Storage for MainMemory {
    fn handle_request(&mut self, _addr: u64, _access: AccessType, _policy: ReplacementPolicy) {
        self.stats.access_counter += 1;
        self.stats.access_cycle += self.latency.bus_latency + self.latency.hit_latency;
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
