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

// replacement.rs
//
// This file contains the replacement engine. Each policy scans the lines of
// one set and either reports a hit (with the weight to install in the hit
// line) or chooses a victim (with the weight the incoming line will carry).
// Cold lines are always preferred as victims; ties break on the first index.

use rand::Rng;

use super::components::CacheSet;
use super::config::ReplacementPolicy;

// Result of consulting the engine for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplaceOutcome {
    Hit { line: usize, weight: u64 },
    Miss { victim: usize, weight: u64 },
}

impl CacheSet {
    pub fn replace_decision(
        &mut self,
        tag: u64,
        policy: ReplacementPolicy,
        access_counter: u64,
    ) -> ReplaceOutcome {
        match policy {
            ReplacementPolicy::LRU => self.decide_lru(tag, access_counter),
            ReplacementPolicy::MRU => self.decide_mru(tag, access_counter),
            ReplacementPolicy::RR => self.decide_rr(tag),
            ReplacementPolicy::SLRU => self.decide_slru(tag, access_counter),
            ReplacementPolicy::LFU => self.decide_lfu(tag),
            ReplacementPolicy::LFRU => self.decide_lfru(tag),
            ReplacementPolicy::LFUDA => self.decide_lfuda(tag),
            ReplacementPolicy::ARC => self.decide_arc(tag, access_counter),
            ReplacementPolicy::FIFO => self.decide_fifo(tag),
            ReplacementPolicy::LIFO => self.decide_lifo(tag),
        }
    }

    // Weight = access timestamp; victim = smallest timestamp.
    fn decide_lru(&mut self, tag: u64, counter: u64) -> ReplaceOutcome {
        let mut victim: Option<usize> = None;
        let mut cold: Option<usize> = None;

        for i in 0..self.lines.len() {
            if self.lines[i].valid {
                if self.lines[i].tag == tag {
                    return ReplaceOutcome::Hit {
                        line: i,
                        weight: counter,
                    };
                }
                if victim.map_or(true, |v| self.lines[i].weight < self.lines[v].weight) {
                    victim = Some(i);
                }
            } else if cold.is_none() {
                cold = Some(i);
            }
        }

        ReplaceOutcome::Miss {
            victim: cold.or(victim).unwrap_or(0),
            weight: counter,
        }
    }

    // Same timestamps as LRU; victim = largest.
    fn decide_mru(&mut self, tag: u64, counter: u64) -> ReplaceOutcome {
        let mut victim: Option<usize> = None;
        let mut cold: Option<usize> = None;

        for i in 0..self.lines.len() {
            if self.lines[i].valid {
                if self.lines[i].tag == tag {
                    return ReplaceOutcome::Hit {
                        line: i,
                        weight: counter,
                    };
                }
                if victim.map_or(true, |v| self.lines[i].weight > self.lines[v].weight) {
                    victim = Some(i);
                }
            } else if cold.is_none() {
                cold = Some(i);
            }
        }

        ReplaceOutcome::Miss {
            victim: cold.or(victim).unwrap_or(0),
            weight: counter,
        }
    }

    // Weights stay 0; hits are recognized by tag alone, victims are drawn
    // uniformly when no cold line exists.
    fn decide_rr(&mut self, tag: u64) -> ReplaceOutcome {
        let mut cold: Option<usize> = None;

        for i in 0..self.lines.len() {
            if self.lines[i].valid && self.lines[i].tag == tag {
                return ReplaceOutcome::Hit { line: i, weight: 0 };
            }
            if cold.is_none() && !self.lines[i].valid {
                cold = Some(i);
            }
        }

        let victim =
            cold.unwrap_or_else(|| rand::thread_rng().gen_range(0..self.lines.len()));
        ReplaceOutcome::Miss { victim, weight: 0 }
    }

    // Weight = (timestamp << 1) | protected-bit. A probationary hit promotes
    // the line, demoting the least-recent protected line when the quota
    // (associativity / 2) is full. Victims come from the probationary side.
    fn decide_slru(&mut self, tag: u64, counter: u64) -> ReplaceOutcome {
        let quota = self.lines.len() / 2;
        let mut victim: Option<usize> = None;
        let mut cold: Option<usize> = None;

        for i in 0..self.lines.len() {
            if self.lines[i].valid && self.lines[i].tag == tag {
                if self.lines[i].weight & 1 == 0 {
                    self.demote_protected_at_quota(quota);
                }
                return ReplaceOutcome::Hit {
                    line: i,
                    weight: (counter << 1) | 1,
                };
            }

            if cold.is_none() && !self.lines[i].valid {
                cold = Some(i);
            }
            if self.lines[i].weight & 1 == 0
                && victim.map_or(true, |v| self.lines[i].weight < self.lines[v].weight)
            {
                victim = Some(i);
            }
        }

        ReplaceOutcome::Miss {
            victim: cold.or(victim).unwrap_or(0),
            weight: counter << 1,
        }
    }

    // Pure frequency counter, no aging. Insertions start at 1.
    fn decide_lfu(&mut self, tag: u64) -> ReplaceOutcome {
        let mut victim: Option<usize> = None;
        let mut cold: Option<usize> = None;

        for i in 0..self.lines.len() {
            if self.lines[i].valid {
                if self.lines[i].tag == tag {
                    return ReplaceOutcome::Hit {
                        line: i,
                        weight: self.lines[i].weight + 1,
                    };
                }
                if victim.map_or(true, |v| self.lines[i].weight < self.lines[v].weight) {
                    victim = Some(i);
                }
            } else if cold.is_none() {
                cold = Some(i);
            }
        }

        ReplaceOutcome::Miss {
            victim: cold.or(victim).unwrap_or(0),
            weight: 1,
        }
    }

    // SLRU's partition scheme over a frequency counter. Hits add 2 to keep
    // the protection bit intact; insertions enter probationary at 2.
    fn decide_lfru(&mut self, tag: u64) -> ReplaceOutcome {
        let quota = self.lines.len() / 2;
        let mut victim: Option<usize> = None;
        let mut cold: Option<usize> = None;

        for i in 0..self.lines.len() {
            if self.lines[i].valid && self.lines[i].tag == tag {
                let weight = if self.lines[i].weight & 1 == 1 {
                    self.lines[i].weight + 2
                } else {
                    self.demote_protected_at_quota(quota);
                    (self.lines[i].weight + 2) | 1
                };
                return ReplaceOutcome::Hit { line: i, weight };
            }

            if cold.is_none() && !self.lines[i].valid {
                cold = Some(i);
            }
            if self.lines[i].weight & 1 == 0
                && victim.map_or(true, |v| self.lines[i].weight < self.lines[v].weight)
            {
                victim = Some(i);
            }
        }

        ReplaceOutcome::Miss {
            victim: cold.or(victim).unwrap_or(0),
            weight: 2,
        }
    }

    // LFU where an evicted line's weight + 1 seeds the replacement, so the
    // frequency floor rises over time and stale heavy hitters age out.
    fn decide_lfuda(&mut self, tag: u64) -> ReplaceOutcome {
        let mut victim: Option<usize> = None;
        let mut cold: Option<usize> = None;
        let mut weight = 0u64;

        for i in 0..self.lines.len() {
            if self.lines[i].valid {
                if self.lines[i].tag == tag {
                    return ReplaceOutcome::Hit {
                        line: i,
                        weight: self.lines[i].weight + 1,
                    };
                }
                if victim.map_or(true, |v| self.lines[i].weight < self.lines[v].weight) {
                    victim = Some(i);
                    weight = self.lines[i].weight + 1;
                }
            } else if cold.is_none() {
                cold = Some(i);
            }
        }

        match cold {
            Some(c) => ReplaceOutcome::Miss {
                victim: c,
                weight: 1,
            },
            None => ReplaceOutcome::Miss {
                victim: victim.unwrap_or(0),
                weight,
            },
        }
    }

    // Two segments with packed ages: upper 32 bits order the protected
    // partition, lower 32 the probationary one, LSB is the protection bit.
    // Ghost hits on a miss steer arc_lim; probationary evictions from a full
    // set are remembered in B1, demotions in B2.
    fn decide_arc(&mut self, tag: u64, counter: u64) -> ReplaceOutcome {
        let associativity = self.lines.len();
        let mut victim: Option<usize> = None;
        let mut cold: Option<usize> = None;

        for i in 0..associativity {
            if self.lines[i].valid && self.lines[i].tag == tag {
                if self.lines[i].weight & 1 == 0 {
                    // Make room in the protected partition, one demotion per
                    // round: arc_lim may sit below the current population.
                    loop {
                        let mut protected_num = 0;
                        let mut pro_victim: Option<usize> = None;
                        for j in 0..associativity {
                            let line = &self.lines[j];
                            if line.valid && line.weight & 1 == 1 {
                                protected_num += 1;
                                if pro_victim.map_or(true, |p| {
                                    (line.weight >> 32) < (self.lines[p].weight >> 32)
                                }) {
                                    pro_victim = Some(j);
                                }
                            }
                        }
                        if protected_num < self.arc_lim {
                            break;
                        }
                        let p = match pro_victim {
                            Some(p) => p,
                            None => break,
                        };
                        let demoted = self.lines[p].tag;
                        self.b2.push(demoted);
                        // Clear protection, keep only the probationary age.
                        self.lines[p].weight ^= 1;
                        self.lines[p].weight &= u64::from(u32::MAX);
                    }
                }
                return ReplaceOutcome::Hit {
                    line: i,
                    weight: ((counter << 1) | 1) + (1u64 << 32),
                };
            }

            if cold.is_none() && !self.lines[i].valid {
                cold = Some(i);
            }
            if self.lines[i].weight & 1 == 0
                && victim.map_or(true, |v| self.lines[i].weight < self.lines[v].weight)
            {
                victim = Some(i);
            }
        }

        // Ghost hits: a tag we recently threw away from the probationary
        // side argues for a smaller protected target, one from the
        // protected side for a larger one.
        if self.b1.contains(tag) && self.arc_lim > 1 {
            self.arc_lim -= 1;
        }
        if self.b2.contains(tag) && self.arc_lim < associativity - 1 {
            self.arc_lim += 1;
        }

        let weight = counter << 1;
        match cold {
            Some(c) => ReplaceOutcome::Miss { victim: c, weight },
            None => {
                let v = victim.unwrap_or(0);
                let evicted = self.lines[v].tag;
                self.b1.push(evicted);
                ReplaceOutcome::Miss { victim: v, weight }
            },
        }
    }

    // Insertion order, oldest at index 0. Hits bubble toward the tail of
    // the valid region; a miss in a full set ages every line one slot and
    // recycles the tail.
    fn decide_fifo(&mut self, tag: u64) -> ReplaceOutcome {
        let ways = self.lines.len();

        for i in 0..ways {
            if !self.lines[i].valid {
                return ReplaceOutcome::Miss {
                    victim: i,
                    weight: 0,
                };
            }
            if self.lines[i].tag == tag {
                let slot = self.compact_hit_toward_tail(i);
                return ReplaceOutcome::Hit {
                    line: slot,
                    weight: self.lines[slot].weight,
                };
            }
        }

        for i in 0..ways - 1 {
            self.lines.swap(i, i + 1);
        }
        ReplaceOutcome::Miss {
            victim: ways - 1,
            weight: 0,
        }
    }

    // Same hit compaction as FIFO, but a full set always recycles the tail
    // (the newest slot).
    fn decide_lifo(&mut self, tag: u64) -> ReplaceOutcome {
        let ways = self.lines.len();

        for i in 0..ways {
            if !self.lines[i].valid {
                return ReplaceOutcome::Miss {
                    victim: i,
                    weight: 0,
                };
            }
            if self.lines[i].tag == tag {
                let slot = self.compact_hit_toward_tail(i);
                return ReplaceOutcome::Hit {
                    line: slot,
                    weight: self.lines[slot].weight,
                };
            }
        }

        ReplaceOutcome::Miss {
            victim: ways - 1,
            weight: 0,
        }
    }

    // Swap the hit line with its next valid neighbour until it sits at the
    // tail of the valid region; returns its final slot.
    fn compact_hit_toward_tail(&mut self, hit: usize) -> usize {
        let ways = self.lines.len();
        let mut slot = hit;
        while slot + 1 < ways && self.lines[slot + 1].valid {
            self.lines.swap(slot, slot + 1);
            slot += 1;
        }
        slot
    }

    // Clear the protection bit of the stalest protected line when the
    // partition is at quota (SLRU and LFRU share this step).
    fn demote_protected_at_quota(&mut self, quota: usize) {
        let mut protected_num = 0;
        let mut pro_victim: Option<usize> = None;

        for j in 0..self.lines.len() {
            let line = &self.lines[j];
            if line.valid && line.weight & 1 == 1 {
                protected_num += 1;
                if pro_victim.map_or(true, |p| line.weight < self.lines[p].weight) {
                    pro_victim = Some(j);
                }
            }
        }

        if protected_num >= quota {
            if let Some(p) = pro_victim {
                self.lines[p].weight ^= 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warm_set(tags: &[u64], policy: ReplacementPolicy) -> (CacheSet, u64) {
        let mut set = CacheSet::new(4);
        let mut counter = 0;
        for &tag in tags {
            counter += 1;
            if let ReplaceOutcome::Miss { victim, weight } =
                set.replace_decision(tag, policy, counter)
            {
                let line = &mut set.lines[victim];
                line.valid = true;
                line.tag = tag;
                line.weight = weight;
            }
        }
        (set, counter)
    }

    #[test]
    fn lru_picks_stalest_valid_line() {
        let (mut set, counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::LRU);

        match set.replace_decision(5, ReplacementPolicy::LRU, counter + 1) {
            ReplaceOutcome::Miss { victim, .. } => assert_eq!(victim, 0),
            outcome => panic!("expected a miss, got {:?}", outcome),
        }
    }

    #[test]
    fn mru_picks_freshest_valid_line() {
        let (mut set, counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::MRU);

        match set.replace_decision(5, ReplacementPolicy::MRU, counter + 1) {
            ReplaceOutcome::Miss { victim, .. } => assert_eq!(victim, 3),
            outcome => panic!("expected a miss, got {:?}", outcome),
        }
    }

    #[test]
    fn cold_lines_win_over_any_victim() {
        let mut set = CacheSet::new(4);
        set.lines[0].valid = true;
        set.lines[0].tag = 9;
        set.lines[0].weight = 1;

        for policy in ReplacementPolicy::ALL {
            let mut probe = CacheSet::new(4);
            probe.lines[0] = set.lines[0].clone();
            match probe.replace_decision(7, policy, 2) {
                ReplaceOutcome::Miss { victim, .. } => {
                    assert!(
                        !probe.lines[victim].valid,
                        "{:?} evicted a valid line with cold slots open",
                        policy
                    );
                },
                outcome => panic!("expected a miss under {:?}, got {:?}", policy, outcome),
            }
        }
    }

    #[test]
    fn slru_protects_on_second_touch() {
        let (mut set, counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::SLRU);

        match set.replace_decision(2, ReplacementPolicy::SLRU, counter + 1) {
            ReplaceOutcome::Hit { line, weight } => {
                assert_eq!(weight & 1, 1);
                set.lines[line].weight = weight;
            },
            outcome => panic!("expected a hit, got {:?}", outcome),
        }
        assert_eq!(set.protected_count(), 1);
    }

    #[test]
    fn slru_demotion_respects_quota() {
        let (mut set, mut counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::SLRU);

        // Touch every line twice: the protected partition must stay at the
        // quota, older promotions falling back to probationary.
        for _ in 0..2 {
            for tag in [1, 2, 3, 4] {
                counter += 1;
                if let ReplaceOutcome::Hit { line, weight } =
                    set.replace_decision(tag, ReplacementPolicy::SLRU, counter)
                {
                    set.lines[line].weight = weight;
                }
            }
        }
        assert!(set.protected_count() <= 2);
    }

    #[test]
    fn fifo_full_set_recycles_oldest() {
        let (mut set, counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::FIFO);

        match set.replace_decision(5, ReplacementPolicy::FIFO, counter + 1) {
            ReplaceOutcome::Miss { victim, .. } => {
                assert_eq!(victim, 3);
                // The shift moved the oldest tag into the recycled slot.
                assert_eq!(set.lines[victim].tag, 1);
                assert_eq!(
                    set.lines.iter().map(|l| l.tag).collect::<Vec<_>>(),
                    vec![2, 3, 4, 1]
                );
            },
            outcome => panic!("expected a miss, got {:?}", outcome),
        }
    }

    #[test]
    fn fifo_hit_compacts_toward_tail() {
        let (mut set, counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::FIFO);

        match set.replace_decision(2, ReplacementPolicy::FIFO, counter + 1) {
            ReplaceOutcome::Hit { line, .. } => {
                assert_eq!(line, 3);
                assert_eq!(set.lines[3].tag, 2);
            },
            outcome => panic!("expected a hit, got {:?}", outcome),
        }
    }

    #[test]
    fn lifo_full_set_recycles_tail() {
        let (mut set, counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::LIFO);

        match set.replace_decision(5, ReplacementPolicy::LIFO, counter + 1) {
            ReplaceOutcome::Miss { victim, .. } => {
                assert_eq!(victim, 3);
                assert_eq!(set.lines[victim].tag, 4);
            },
            outcome => panic!("expected a miss, got {:?}", outcome),
        }
    }

    #[test]
    fn lfuda_seeds_from_evicted_weight() {
        let (mut set, counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::LFUDA);
        set.lines[2].weight = 7;

        match set.replace_decision(5, ReplacementPolicy::LFUDA, counter + 1) {
            ReplaceOutcome::Miss { victim, weight } => {
                // All other lines sit at weight 1, so one of them loses and
                // its weight + 1 seeds the insertion.
                assert_ne!(victim, 2);
                assert_eq!(weight, 2);
            },
            outcome => panic!("expected a miss, got {:?}", outcome),
        }
    }

    #[test]
    fn arc_ghost_hit_shrinks_protected_target() {
        let (mut set, mut counter) = warm_set(&[1, 2, 3, 4], ReplacementPolicy::ARC);
        let starting_lim = set.arc_lim;

        // Fill pressure: a fifth tag evicts a probationary line into B1.
        counter += 1;
        let evicted = match set.replace_decision(5, ReplacementPolicy::ARC, counter) {
            ReplaceOutcome::Miss { victim, weight } => {
                let evicted = set.lines[victim].tag;
                set.lines[victim].tag = 5;
                set.lines[victim].weight = weight;
                evicted
            },
            outcome => panic!("expected a miss, got {:?}", outcome),
        };
        assert!(set.b1.contains(evicted));

        // Re-requesting the ghosted tag argues for a larger probationary
        // side; arc_lim shrinks but never below 1.
        counter += 1;
        let _ = set.replace_decision(evicted, ReplacementPolicy::ARC, counter);
        assert!(set.arc_lim < starting_lim || starting_lim == 1);
        assert!(set.arc_lim >= 1);
    }
}
