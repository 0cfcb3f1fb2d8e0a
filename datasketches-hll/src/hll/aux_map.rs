// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Exception table for slots whose value does not fit the packed width.
//!
//! Open addressing over a power-of-two array of coupons. Probing starts at `slot & mask` and
//! advances by an odd stride derived from the slot's high bits, so every cell is visited before
//! the probe wraps around. The table doubles once it is more than 3/4 full and never shrinks.

use crate::error::Error;
use crate::hll::RESIZE_DENOM;
use crate::hll::RESIZE_NUMER;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::pack_coupon;

/// Sentinel value indicating an empty cell.
const EMPTY: u32 = 0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AuxMap {
    lg_size: u8,
    /// Coupons packing (slot, value); `EMPTY` marks a free cell.
    entries: Box<[u32]>,
    count: u32,
}

impl AuxMap {
    pub fn new(lg_size: u8) -> Self {
        Self {
            lg_size,
            entries: vec![EMPTY; 1 << lg_size].into_boxed_slice(),
            count: 0,
        }
    }

    /// Loads a table from its hash array, as written by the updatable layout.
    pub fn from_hash_array(lg_size: u8, entries: Vec<u32>) -> Result<Self, Error> {
        debug_assert_eq!(entries.len(), 1 << lg_size);
        let count = entries.iter().filter(|&&e| e != EMPTY).count() as u32;
        let map = Self {
            lg_size,
            entries: entries.into_boxed_slice(),
            count,
        };
        if map.over_load_factor(count) {
            return Err(Error::deserial(format!(
                "exception table holds {count} entries in {} cells",
                map.capacity()
            )));
        }
        Ok(map)
    }

    pub fn lg_size(&self) -> u8 {
        self.lg_size
    }

    pub fn capacity(&self) -> usize {
        self.entries.len()
    }

    pub fn count(&self) -> u32 {
        self.count
    }

    /// Raw cells in hash order.
    pub fn cells(&self) -> &[u32] {
        &self.entries
    }

    /// Returns the index holding `slot`, or the empty cell where it would be inserted.
    ///
    /// Returns `None` only if the table is full and does not contain `slot`.
    fn find_index(&self, slot: u32) -> Option<usize> {
        Self::find_in_entries(&self.entries, self.lg_size, slot)
    }

    fn find_in_entries(entries: &[u32], lg_size: u8, slot: u32) -> Option<usize> {
        let mask = (1u32 << lg_size) - 1;
        let mut probe = slot & mask;
        let loop_index = probe;
        loop {
            let entry = entries[probe as usize];
            if entry == EMPTY || get_slot(entry) == slot {
                return Some(probe as usize);
            }
            let stride = (slot >> lg_size) | 1;
            probe = (probe + stride) & mask;
            if probe == loop_index {
                return None;
            }
        }
    }

    pub fn find(&self, slot: u32) -> Option<u8> {
        let index = self.find_index(slot)?;
        let entry = self.entries[index];
        if entry == EMPTY {
            None
        } else {
            Some(get_value(entry))
        }
    }

    /// Like [`find`](Self::find), for a slot already known to be escaped.
    pub fn must_find(&self, slot: u32) -> Result<u8, Error> {
        self.find(slot).ok_or_else(|| Error::missing_exception(slot))
    }

    /// Whether `put(slot, _)` would grow the table.
    pub fn needs_grow_for(&self, slot: u32) -> bool {
        self.find(slot).is_none() && self.over_load_factor(self.count + 1)
    }

    /// Inserts or replaces the value for `slot`.
    pub fn put(&mut self, slot: u32, value: u8) {
        debug_assert!(value > 0, "exception values are never zero");
        let Some(index) = self.find_index(slot) else {
            unreachable!("the load factor keeps at least one empty cell");
        };

        let is_new = self.entries[index] == EMPTY;
        self.entries[index] = pack_coupon(slot, value);
        if is_new {
            self.count += 1;
            if self.over_load_factor(self.count) {
                self.grow();
            }
        }
    }

    /// Removes `slot`, returning its value if it was present.
    ///
    /// Open addressing has no tombstones here, so the remaining entries are rehashed in place.
    pub fn remove(&mut self, slot: u32) -> Option<u8> {
        let value = self.find(slot)?;
        let remaining: Vec<u32> = self
            .entries
            .iter()
            .copied()
            .filter(|&e| e != EMPTY && get_slot(e) != slot)
            .collect();
        self.rebuild(self.lg_size, remaining);
        Some(value)
    }

    /// Keeps only the entries for which `keep` returns true, rehashing at most once.
    pub fn retain(&mut self, mut keep: impl FnMut(u32, u8) -> bool) {
        let kept: Vec<u32> = self
            .entries
            .iter()
            .copied()
            .filter(|&e| e != EMPTY && keep(get_slot(e), get_value(e)))
            .collect();
        if kept.len() as u32 != self.count {
            self.rebuild(self.lg_size, kept);
        }
    }

    /// Entries ordered by slot.
    pub fn sorted_coupons(&self) -> Vec<u32> {
        let mut coupons: Vec<u32> = self.entries.iter().copied().filter(|&e| e != EMPTY).collect();
        coupons.sort_unstable_by_key(|&c| get_slot(c));
        coupons
    }

    fn over_load_factor(&self, count: u32) -> bool {
        RESIZE_DENOM * count > RESIZE_NUMER * (1u32 << self.lg_size)
    }

    fn grow(&mut self) {
        let new_lg_size = self.lg_size + 1;
        tracing::debug!(
            from = self.capacity(),
            to = 1usize << new_lg_size,
            count = self.count,
            "growing exception table"
        );
        let coupons: Vec<u32> = self.entries.iter().copied().filter(|&e| e != EMPTY).collect();
        self.rebuild(new_lg_size, coupons);
    }

    fn rebuild(&mut self, lg_size: u8, coupons: Vec<u32>) {
        let mut entries = vec![EMPTY; 1 << lg_size].into_boxed_slice();
        for &coupon in &coupons {
            let Some(index) = Self::find_in_entries(&entries, lg_size, get_slot(coupon)) else {
                unreachable!("rebuild target always has room for every entry");
            };
            entries[index] = coupon;
        }
        self.lg_size = lg_size;
        self.entries = entries;
        self.count = coupons.len() as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_find_replace() {
        let mut map = AuxMap::new(2);
        assert_eq!(map.find(3), None);

        map.put(3, 20);
        assert_eq!(map.find(3), Some(20));
        assert_eq!(map.count(), 1);

        map.put(3, 25);
        assert_eq!(map.find(3), Some(25));
        assert_eq!(map.count(), 1);
    }

    #[test]
    fn test_must_find_miss_is_internal_error() {
        let map = AuxMap::new(2);
        let err = map.must_find(1).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InternalConsistency);
    }

    #[test]
    fn test_colliding_slots_probe() {
        // all of these start probing at cell 0 of a 4-cell table
        let mut map = AuxMap::new(2);
        map.put(0, 16);
        map.put(4, 17);
        map.put(8, 18);
        assert_eq!(map.lg_size(), 2);
        assert_eq!(map.find(0), Some(16));
        assert_eq!(map.find(4), Some(17));
        assert_eq!(map.find(8), Some(18));
        assert_eq!(map.find(12), None);
    }

    #[test]
    fn test_grows_past_load_factor() {
        let mut map = AuxMap::new(2);
        for slot in 0..3 {
            map.put(slot, 20);
        }
        assert_eq!(map.capacity(), 4);
        assert!(map.needs_grow_for(3));
        assert!(!map.needs_grow_for(2));

        map.put(3, 21);
        assert_eq!(map.capacity(), 8);
        assert_eq!(map.count(), 4);
        for slot in 0..3 {
            assert_eq!(map.find(slot), Some(20));
        }
        assert_eq!(map.find(3), Some(21));
    }

    #[test]
    fn test_remove_keeps_probe_chains() {
        let mut map = AuxMap::new(3);
        map.put(0, 16);
        map.put(8, 17);
        map.put(16, 18);

        assert_eq!(map.remove(8), Some(17));
        assert_eq!(map.remove(8), None);
        assert_eq!(map.count(), 2);
        assert_eq!(map.capacity(), 8);
        assert_eq!(map.find(0), Some(16));
        assert_eq!(map.find(16), Some(18));
    }

    #[test]
    fn test_retain_drops_rejected_entries() {
        let mut map = AuxMap::new(3);
        for (slot, value) in [(0, 16), (8, 30), (16, 18), (3, 40)] {
            map.put(slot, value);
        }
        let mut seen = 0;
        map.retain(|_, value| {
            seen += 1;
            value >= 30
        });
        assert_eq!(seen, 4);
        assert_eq!(map.count(), 2);
        assert_eq!(map.capacity(), 8);
        assert_eq!(map.find(0), None);
        assert_eq!(map.find(8), Some(30));
        assert_eq!(map.find(3), Some(40));
    }

    #[test]
    fn test_sorted_coupons() {
        let mut map = AuxMap::new(4);
        for slot in [9, 2, 14, 5] {
            map.put(slot, 30);
        }
        let slots: Vec<u32> = map.sorted_coupons().into_iter().map(get_slot).collect();
        assert_eq!(slots, vec![2, 5, 9, 14]);
    }

    #[test]
    fn test_from_hash_array_round_trip() {
        let mut map = AuxMap::new(3);
        map.put(1, 40);
        map.put(6, 41);
        let loaded = AuxMap::from_hash_array(3, map.cells().to_vec()).unwrap();
        assert_eq!(loaded, map);

        let overfull = vec![pack_coupon(1, 20); 4];
        assert!(AuxMap::from_hash_array(2, overfull).is_err());
    }
}
