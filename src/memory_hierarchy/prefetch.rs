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

// prefetch.rs
//
// This file contains the sequential stream prefetcher. Each stream buffer
// remembers the next four block numbers after a missing block plus the time
// it was filled; a later miss that lands in any buffer skips its
// lower-level fetch. Buffers are recycled LRU across streams.

// Blocks held per stream.
pub const STREAM_DEPTH: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct StreamBuffer {
    pub blocks: [u64; STREAM_DEPTH],
    pub filled_at: u64, // Global access counter at fill time
}

// Outcome of consulting the buffers on a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamLookup {
    // The missing block is already streamed in; the fetch can be elided.
    AlreadyPrefetched,
    // No buffer holds the block; this one is the LRU candidate to refill.
    Fill(usize),
    // Prefetching is disabled (no buffers configured).
    Unavailable,
}

#[derive(Debug)]
pub struct StreamPrefetcher {
    buffers: Vec<StreamBuffer>,
}

impl StreamPrefetcher {
    // All-zero initial state: block 0 may spuriously match a cold buffer,
    // which is acceptable because a cold timestamp loses every LRU contest.
    pub fn new(pf_buf_num: usize) -> Self {
        Self {
            buffers: vec![StreamBuffer::default(); pf_buf_num],
        }
    }

    pub fn lookup(&self, block: u64) -> StreamLookup {
        let mut victim: Option<usize> = None;

        for (i, buffer) in self.buffers.iter().enumerate() {
            if buffer.blocks.contains(&block) {
                return StreamLookup::AlreadyPrefetched;
            }
            if victim.map_or(true, |v| buffer.filled_at < self.buffers[v].filled_at) {
                victim = Some(i);
            }
        }

        match victim {
            Some(index) => StreamLookup::Fill(index),
            None => StreamLookup::Unavailable,
        }
    }

    // Overwrite the chosen buffer with the stream following `block`.
    pub fn install(&mut self, index: usize, block: u64, now: u64) {
        let buffer = &mut self.buffers[index];
        for (i, slot) in buffer.blocks.iter_mut().enumerate() {
            *slot = block + i as u64 + 1;
        }
        buffer.filled_at = now;
    }

    pub fn buffers(&self) -> &[StreamBuffer] {
        &self.buffers
    }
}
