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

// config.rs
//
// This file contains the configuration structs for the cache hierarchy.
// It defines the per-cache geometry, write policies, bypass and prefetch
// knobs, and the set of replacement policies the simulator understands.

use crate::errors::SimulatorError;

#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub size: usize,          // Cache size in bytes
    pub associativity: usize, // Number of ways (lines per set)
    pub set_num: usize,       // Number of sets
    pub block_size: usize,    // Size of each cache line in bytes
    pub block_bit: u32,       // log2(block_size)
    pub set_bit: u32,         // log2(set_num)
    pub write_through: bool,  // true = write-through, false = write-back
    pub write_allocate: bool, // true = allocate on a write miss
    pub bypass_shiftbit: Option<u32>, // None disables the bypass filter
    pub bypass_threshold: f64, // Coarse-tag miss rate above which accesses bypass
    pub pf_buf_num: usize,    // Number of stream prefetch buffers
}

impl CacheConfig {
    pub fn new(size: usize, associativity: usize, block_size: usize) -> Self {
        // Validate configuration
        assert!(size > 0, "Cache size must be positive");
        assert!(associativity > 0, "Associativity must be positive");
        assert!(block_size > 0, "Block size must be positive");
        assert!(
            size % (associativity * block_size) == 0,
            "Cache size must be divisible by (associativity * block_size)"
        );
        assert!(
            block_size.is_power_of_two(),
            "Block size must be a power of two"
        );

        let set_num = size / (associativity * block_size);
        assert!(
            set_num.is_power_of_two(),
            "Set count must be a power of two"
        );

        Self {
            size,
            associativity,
            set_num,
            block_size,
            block_bit: block_size.trailing_zeros(),
            set_bit: set_num.trailing_zeros(),
            write_through: false,
            write_allocate: true,
            bypass_shiftbit: None,
            bypass_threshold: 0.0,
            pf_buf_num: 0,
        }
    }

    // Write-allocate is the complement of write-through: a write-through
    // cache forwards writes eagerly and never installs on a write miss.
    pub fn with_write_through(mut self, enabled: bool) -> Self {
        self.write_through = enabled;
        self.write_allocate = !enabled;
        self
    }

    pub fn with_bypass(mut self, shiftbit: u32, threshold: f64) -> Self {
        assert!(
            (0.0..=1.0).contains(&threshold),
            "Bypass threshold must be a miss rate in [0, 1]"
        );
        self.bypass_shiftbit = Some(shiftbit);
        self.bypass_threshold = threshold;
        self
    }

    pub fn with_prefetch_buffers(mut self, pf_buf_num: usize) -> Self {
        self.pf_buf_num = pf_buf_num;
        self
    }

    // Split an address into (tag, set index). The block offset carries no
    // information here: the simulator models no data.
    pub fn split_address(&self, addr: u64) -> (u64, usize) {
        let tag_bit = self.block_bit + self.set_bit;
        let tag = addr >> tag_bit;
        let set_idx = ((addr >> self.block_bit) & ((1u64 << self.set_bit) - 1)) as usize;
        (tag, set_idx)
    }

    // Block number of an address: everything above the offset bits.
    pub fn block_of(&self, addr: u64) -> u64 {
        addr >> self.block_bit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplacementPolicy {
    LRU,   // Least Recently Used
    MRU,   // Most Recently Used
    RR,    // Random replacement
    SLRU,  // Segmented LRU (probationary/protected)
    LFU,   // Least Frequently Used
    LFRU,  // LFU with a protected partition
    LFUDA, // LFU with Dynamic Aging
    ARC,   // Adaptive Replacement Cache (set-local)
    FIFO,  // First In First Out
    LIFO,  // Last In First Out
}

impl ReplacementPolicy {
    pub const ALL: [ReplacementPolicy; 10] = [
        ReplacementPolicy::LRU,
        ReplacementPolicy::MRU,
        ReplacementPolicy::RR,
        ReplacementPolicy::SLRU,
        ReplacementPolicy::LFU,
        ReplacementPolicy::LFRU,
        ReplacementPolicy::LFUDA,
        ReplacementPolicy::ARC,
        ReplacementPolicy::FIFO,
        ReplacementPolicy::LIFO,
    ];

    pub fn from_code(code: u32) -> Result<Self, SimulatorError> {
        match code {
            0x20 => Ok(ReplacementPolicy::LRU),
            0x21 => Ok(ReplacementPolicy::MRU),
            0x22 => Ok(ReplacementPolicy::RR),
            0x23 => Ok(ReplacementPolicy::SLRU),
            0x24 => Ok(ReplacementPolicy::LFU),
            0x25 => Ok(ReplacementPolicy::LFRU),
            0x26 => Ok(ReplacementPolicy::LFUDA),
            0x27 => Ok(ReplacementPolicy::ARC),
            0x28 => Ok(ReplacementPolicy::FIFO),
            0x29 => Ok(ReplacementPolicy::LIFO),
            _ => Err(SimulatorError::UnknownReplacementPolicy(code)),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            ReplacementPolicy::LRU => 0x20,
            ReplacementPolicy::MRU => 0x21,
            ReplacementPolicy::RR => 0x22,
            ReplacementPolicy::SLRU => 0x23,
            ReplacementPolicy::LFU => 0x24,
            ReplacementPolicy::LFRU => 0x25,
            ReplacementPolicy::LFUDA => 0x26,
            ReplacementPolicy::ARC => 0x27,
            ReplacementPolicy::FIFO => 0x28,
            ReplacementPolicy::LIFO => 0x29,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ReplacementPolicy::LRU => "LRU",
            ReplacementPolicy::MRU => "MRU",
            ReplacementPolicy::RR => "RR",
            ReplacementPolicy::SLRU => "SLRU",
            ReplacementPolicy::LFU => "LFU",
            ReplacementPolicy::LFRU => "LFRU",
            ReplacementPolicy::LFUDA => "LFUDA",
            ReplacementPolicy::ARC => "ARC",
            ReplacementPolicy::FIFO => "FIFO",
            ReplacementPolicy::LIFO => "LIFO",
        }
    }
}
