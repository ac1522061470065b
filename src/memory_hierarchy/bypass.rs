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

// bypass.rs
//
// This file contains the adaptive bypass filter. Addresses are bucketed by a
// coarse tag (high-order tag bits); a bucket whose observed miss rate stays
// above the configured threshold is routed straight to the lower level
// without touching the local sets.

use std::collections::HashMap;

use log::debug;

// A coarse tag must be seen this many times before its miss rate is trusted.
const HOT_TAG_MIN_ACCESSES: u64 = 100;

#[derive(Debug)]
pub struct BypassFilter {
    shiftbit: Option<u32>,
    threshold: f64,
    access_counts: HashMap<u64, u64>,
    miss_counts: HashMap<u64, u64>,
}

impl BypassFilter {
    pub fn new(shiftbit: Option<u32>, threshold: f64) -> Self {
        Self {
            shiftbit,
            threshold,
            access_counts: HashMap::new(),
            miss_counts: HashMap::new(),
        }
    }

    // Account the access against its coarse bucket and decide whether the
    // request should skip this cache. The count is updated even when the
    // answer is no: the filter adapts continuously.
    pub fn should_bypass(&mut self, tag: u64) -> bool {
        let shiftbit = match self.shiftbit {
            Some(s) => s,
            None => return false,
        };

        let coarse = tag >> shiftbit;
        let count = self.access_counts.entry(coarse).or_insert(0);
        *count += 1;

        if *count > HOT_TAG_MIN_ACCESSES {
            let misses = self.miss_counts.get(&coarse).copied().unwrap_or(0);
            let miss_rate = misses as f64 / *count as f64;
            if miss_rate > self.threshold {
                debug!(
                    "bypassing coarse tag 0x{:X} (miss rate {:.3})",
                    coarse, miss_rate
                );
                return true;
            }
        }
        false
    }

    // Called on a real miss in the local sets.
    pub fn record_miss(&mut self, tag: u64) {
        if let Some(shiftbit) = self.shiftbit {
            let coarse = tag >> shiftbit;
            *self.miss_counts.entry(coarse).or_insert(0) += 1;
        }
    }

    pub fn clear(&mut self) {
        self.access_counts.clear();
        self.miss_counts.clear();
    }
}
