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

//! Packed register array.
//!
//! Slot `i` occupies bits `[i * w, (i + 1) * w)` of the packed region, least significant bit
//! first, where `w` is the width of the [`HllType`]. Widths 4 and 8 never straddle a byte; 6-bit
//! slots are read and written through a little-endian 16-bit window when they do.

use std::borrow::Cow;
use std::fmt;

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::error::Error;
use crate::hll::DEFAULT_LG_K;
use crate::hll::HllType;
use crate::hll::Layout;
use crate::hll::MAX_LG_K;
use crate::hll::MAX_REGISTER_VALUE;
use crate::hll::MIN_LG_K;
use crate::hll::aux_map::AuxMap;
use crate::hll::initial_lg_aux_arr;
use crate::hll::iter::PairIter;
use crate::hll::serialization::*;
use crate::hll::store::ByteStore;

/// HLL register array over owned or borrowed bytes.
///
/// The backing bytes always hold a valid image: the updatable layout for owned and writable
/// sketches, or whichever layout was wrapped for read-only views. Every mutation is written
/// through, so a writable view can be handed back to its owner at any point.
///
/// An `HllArray` is not synchronized; callers serialize mutating calls. A read-only view may be
/// shared across threads as long as nobody mutates the underlying bytes.
pub struct HllArray<'a> {
    lg_config_k: u8,
    hll_type: HllType,
    store: ByteStore<'a>,
    /// Whether `store` holds the compact layout. Only read-only views can be compact.
    compact: bool,
    /// Baseline subtracted from every packed value; never decreases.
    cur_min: u8,
    /// Count of slots whose value equals `cur_min`.
    num_at_cur_min: u32,
    /// Created on the first escape and kept for the lifetime of the sketch.
    aux_map: Option<AuxMap>,
}

/// Builder for an empty [`HllArray`].
#[derive(Debug, Clone)]
pub struct HllArrayBuilder {
    lg_config_k: u8,
    hll_type: HllType,
}

impl Default for HllArrayBuilder {
    fn default() -> Self {
        Self {
            lg_config_k: DEFAULT_LG_K,
            hll_type: HllType::Hll4,
        }
    }
}

impl HllArrayBuilder {
    /// Set log2 of the number of slots.
    ///
    /// # Panics
    ///
    /// If lg_config_k is not in range [2, 21]
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_hll::hll::HllArray;
    /// let array = HllArray::builder().lg_config_k(10).build();
    /// assert_eq!(array.lg_config_k(), 10);
    /// ```
    pub fn lg_config_k(mut self, lg_config_k: u8) -> Self {
        assert!(
            (MIN_LG_K..=MAX_LG_K).contains(&lg_config_k),
            "lg_config_k must be in [{}, {}], got {}",
            MIN_LG_K,
            MAX_LG_K,
            lg_config_k
        );
        self.lg_config_k = lg_config_k;
        self
    }

    /// Set the packing width.
    pub fn hll_type(mut self, hll_type: HllType) -> Self {
        self.hll_type = hll_type;
        self
    }

    /// Build an array that owns its buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_hll::hll::{HllArray, HllType};
    /// let array = HllArray::builder().hll_type(HllType::Hll6).build();
    /// assert!(array.is_empty());
    /// assert!(!array.is_borrowed());
    /// ```
    pub fn build(self) -> HllArray<'static> {
        let len = HllArray::initial_updatable_bytes(self.lg_config_k, self.hll_type);
        let mut bytes = vec![0u8; len];
        init_image(&mut bytes, self.lg_config_k, self.hll_type);
        HllArray::empty(self.lg_config_k, self.hll_type, ByteStore::Owned(bytes))
    }

    /// Build an empty array directly in caller memory.
    ///
    /// The region must hold at least
    /// [`HllArray::initial_updatable_bytes`] bytes; its previous content is overwritten.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_hll::hll::{HllArray, HllType};
    /// let len = HllArray::initial_updatable_bytes(8, HllType::Hll4);
    /// let mut region = vec![0u8; len];
    /// let mut array = HllArray::builder().lg_config_k(8).build_in(&mut region).unwrap();
    /// array.update(3, 7).unwrap();
    /// drop(array);
    ///
    /// let view = HllArray::wrap(&region).unwrap();
    /// assert_eq!(view.get_slot(3).unwrap(), 7);
    /// ```
    pub fn build_in(self, bytes: &mut [u8]) -> Result<HllArray<'_>, Error> {
        let len = HllArray::initial_updatable_bytes(self.lg_config_k, self.hll_type);
        let mut store = ByteStore::writable(bytes, len)?;
        init_image(store.as_mut_slice()?, self.lg_config_k, self.hll_type);
        Ok(HllArray::empty(self.lg_config_k, self.hll_type, store))
    }
}

impl HllArray<'static> {
    /// Create a new builder.
    pub fn builder() -> HllArrayBuilder {
        HllArrayBuilder::default()
    }

    /// Size of the updatable image of an empty array.
    ///
    /// This is the smallest region [`HllArrayBuilder::build_in`] accepts. Widths that can
    /// escape reserve room for the initial exception table.
    pub fn initial_updatable_bytes(lg_config_k: u8, hll_type: HllType) -> usize {
        updatable_bytes(lg_config_k, hll_type, initial_lg_aux_arr(lg_config_k))
    }

    /// Copy an image of either layout into a new owned array.
    pub fn heapify(bytes: &[u8]) -> Result<HllArray<'static>, Error> {
        HllArray::wrap(bytes).map(|array| array.to_owned_array())
    }
}

impl<'a> HllArray<'a> {
    fn empty(lg_config_k: u8, hll_type: HllType, store: ByteStore<'a>) -> Self {
        Self {
            lg_config_k,
            hll_type,
            store,
            compact: false,
            cur_min: 0,
            num_at_cur_min: 1 << lg_config_k,
            aux_map: None,
        }
    }

    fn from_preamble(preamble: Preamble, store: ByteStore<'a>, aux_map: Option<AuxMap>) -> Self {
        Self {
            lg_config_k: preamble.lg_config_k,
            hll_type: preamble.hll_type,
            store,
            compact: preamble.compact,
            cur_min: preamble.cur_min,
            num_at_cur_min: preamble.num_at_cur_min,
            aux_map,
        }
    }

    /// Wrap an image of either layout as a read-only view.
    ///
    /// Fails with `NullInput` for an empty region and `InsufficientSize` when the region is
    /// shorter than the image its header describes. Packed values and exception entries that
    /// disagree with the header fail with `MalformedDeserializeData`.
    pub fn wrap(bytes: &'a [u8]) -> Result<Self, Error> {
        let preamble = Preamble::read(bytes)?;
        let store = ByteStore::read_only(bytes, preamble.total_bytes())?;
        let aux_map = preamble.read_body(store.as_slice())?;
        Ok(Self::from_preamble(preamble, store, aux_map))
    }

    /// Wrap an updatable image as a writable view; updates land in `bytes`.
    pub fn writable_wrap(bytes: &'a mut [u8]) -> Result<Self, Error> {
        let preamble = Preamble::read(bytes)?;
        if preamble.compact {
            return Err(Error::config_invalid(
                "cannot wrap a compact image for writing, heapify it instead",
            ));
        }
        let store = ByteStore::writable(bytes, preamble.total_bytes())?;
        let aux_map = preamble.read_body(store.as_slice())?;
        Ok(Self::from_preamble(preamble, store, aux_map))
    }

    /// Copy into a new array that owns its (updatable) buffer.
    pub fn to_owned_array(&self) -> HllArray<'static> {
        let bytes = self.serialized_bytes(Layout::Updatable).into_owned();
        HllArray {
            lg_config_k: self.lg_config_k,
            hll_type: self.hll_type,
            store: ByteStore::Owned(bytes),
            compact: false,
            cur_min: self.cur_min,
            num_at_cur_min: self.num_at_cur_min,
            aux_map: self.aux_map.clone(),
        }
    }

    pub fn lg_config_k(&self) -> u8 {
        self.lg_config_k
    }

    pub fn hll_type(&self) -> HllType {
        self.hll_type
    }

    pub fn cur_min(&self) -> u8 {
        self.cur_min
    }

    pub fn num_at_cur_min(&self) -> u32 {
        self.num_at_cur_min
    }

    /// Number of slots whose value lives in the exception table.
    pub fn aux_count(&self) -> u32 {
        self.aux_map.as_ref().map_or(0, AuxMap::count)
    }

    /// Whether the backing bytes hold the compact layout.
    pub fn is_compact(&self) -> bool {
        self.compact
    }

    pub fn is_read_only(&self) -> bool {
        !self.store.is_writable()
    }

    /// Whether the bytes belong to the caller rather than to this array.
    pub fn is_borrowed(&self) -> bool {
        self.store.is_borrowed()
    }

    /// Whether every slot is zero.
    pub fn is_empty(&self) -> bool {
        self.cur_min == 0 && self.num_at_cur_min == 1 << self.lg_config_k
    }

    /// Returns the effective value of `slot`.
    pub fn get_slot(&self, slot: u32) -> Result<u8, Error> {
        self.check_slot(slot)?;
        self.slot_value(slot)
    }

    /// Raises `slot` to `value` if `value` is larger; smaller values are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_hll::hll::{HllArray, HllType};
    /// let mut array = HllArray::builder().lg_config_k(2).hll_type(HllType::Hll4).build();
    /// array.update(0, 20).unwrap();
    /// array.update(0, 5).unwrap();
    /// assert_eq!(array.get_slot(0).unwrap(), 20);
    /// assert_eq!(array.aux_count(), 1);
    /// ```
    pub fn update(&mut self, slot: u32, value: u8) -> Result<(), Error> {
        self.check_writable()?;
        self.check_slot(slot)?;
        self.check_value(value)?;

        // cur_min never decreases, so it is a lower bound for every slot
        if value <= self.cur_min {
            return Ok(());
        }
        let old_value = self.slot_value(slot)?;
        if value <= old_value {
            return Ok(());
        }
        self.write_slot(slot, old_value, value)
    }

    /// Sets `slot` to `value`, which may be lower than the current value but not below
    /// [`cur_min`](Self::cur_min).
    pub fn put_slot(&mut self, slot: u32, value: u8) -> Result<(), Error> {
        self.check_writable()?;
        self.check_slot(slot)?;
        self.check_value(value)?;
        if value < self.cur_min {
            return Err(Error::invalid_argument(format!(
                "value {value} is below cur_min {}",
                self.cur_min
            ))
            .with_context("slot", slot));
        }

        let old_value = self.slot_value(slot)?;
        if value == old_value {
            return Ok(());
        }
        self.write_slot(slot, old_value, value)
    }

    /// Iterates `(slot, value)` over every slot in ascending order.
    pub fn iter(&self) -> PairIter<'_> {
        PairIter::new(self)
    }

    /// Clears every slot, the exception table and the estimator state.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.check_writable()?;
        let len = HllArray::initial_updatable_bytes(self.lg_config_k, self.hll_type);
        self.store.truncate(len);
        init_image(self.store.as_mut_slice()?, self.lg_config_k, self.hll_type);
        self.cur_min = 0;
        self.num_at_cur_min = 1 << self.lg_config_k;
        self.aux_map = None;
        Ok(())
    }

    /// State of the external estimator, carried in the header.
    pub fn estimator_state(&self) -> EstimatorState {
        EstimatorState::read(self.store.as_slice())
    }

    pub fn set_estimator_state(&mut self, state: EstimatorState) -> Result<(), Error> {
        state.write(self.store.as_mut_slice()?);
        Ok(())
    }

    pub fn compact_serialization_bytes(&self) -> usize {
        compact_bytes(self.lg_config_k, self.hll_type, self.aux_count())
    }

    pub fn updatable_serialization_bytes(&self) -> usize {
        updatable_bytes(self.lg_config_k, self.hll_type, self.lg_aux_arr())
    }

    /// Serializes into `layout`.
    ///
    /// When the backing bytes already hold `layout` they are returned without copying.
    pub fn serialized_bytes(&self, layout: Layout) -> Cow<'_, [u8]> {
        let header = &self.store.as_slice()[..HLL_BYTE_ARR_START];
        match (layout, self.compact) {
            (Layout::Compact, true) => {
                Cow::Borrowed(&self.store.as_slice()[..self.compact_serialization_bytes()])
            }
            (Layout::Updatable, false) => {
                Cow::Borrowed(&self.store.as_slice()[..self.updatable_serialization_bytes()])
            }
            (Layout::Compact, false) => Cow::Owned(compact_image(
                header,
                self.packed_region(),
                self.aux_map.as_ref(),
                self.lg_config_k,
                self.hll_type,
            )),
            (Layout::Updatable, true) => Cow::Owned(updatable_image(
                header,
                self.packed_region(),
                self.aux_map.as_ref(),
                self.lg_config_k,
                self.hll_type,
            )),
        }
    }

    /// Serializes into the compact layout.
    ///
    /// Arrays holding the same slot values serialize to identical bytes.
    pub fn serialize_compact(&self) -> Vec<u8> {
        self.serialized_bytes(Layout::Compact).into_owned()
    }

    /// Serializes into the updatable layout, which [`HllArray::writable_wrap`] accepts.
    pub fn serialize_updatable(&self) -> Vec<u8> {
        self.serialized_bytes(Layout::Updatable).into_owned()
    }

    /// Effective value of a slot already known to be in range.
    pub(crate) fn slot_value(&self, slot: u32) -> Result<u8, Error> {
        let raw = read_packed(self.packed_region(), self.hll_type.bits(), slot);
        if raw == self.hll_type.aux_token() {
            self.aux_map
                .as_ref()
                .ok_or_else(|| Error::missing_exception(slot))?
                .must_find(slot)
        } else {
            Ok(raw + self.cur_min)
        }
    }

    fn lg_aux_arr(&self) -> u8 {
        if !self.hll_type.can_escape() {
            return 0;
        }
        self.aux_map
            .as_ref()
            .map_or_else(|| initial_lg_aux_arr(self.lg_config_k), AuxMap::lg_size)
    }

    fn packed_region(&self) -> &[u8] {
        &self.store.as_slice()[HLL_BYTE_ARR_START..aux_start(self.lg_config_k, self.hll_type)]
    }

    fn check_writable(&self) -> Result<(), Error> {
        if self.store.is_writable() {
            Ok(())
        } else {
            Err(Error::write_access())
        }
    }

    fn check_slot(&self, slot: u32) -> Result<(), Error> {
        let k = 1u32 << self.lg_config_k;
        if slot >= k {
            return Err(Error::invalid_argument(format!(
                "slot {slot} out of range for k = {k}"
            )));
        }
        Ok(())
    }

    fn check_value(&self, value: u8) -> Result<(), Error> {
        if value > MAX_REGISTER_VALUE {
            return Err(Error::invalid_argument(format!(
                "register value must be in [0, {MAX_REGISTER_VALUE}], got {value}"
            )));
        }
        Ok(())
    }

    /// Stores `new_value` for `slot` and keeps `cur_min` bookkeeping in step.
    ///
    /// Everything that can fail (exception table room, the rebase scan) is resolved before the
    /// first byte changes.
    fn write_slot(&mut self, slot: u32, old_value: u8, new_value: u8) -> Result<(), Error> {
        let token = self.hll_type.aux_token();
        let bits = self.hll_type.bits();
        let shifted = new_value - self.cur_min;
        let escaped = shifted >= token;

        if escaped {
            self.reserve_exception(slot)?;
        }
        let leaves_cur_min = old_value == self.cur_min && new_value != self.cur_min;
        let rebase_to = if leaves_cur_min && self.num_at_cur_min == 1 {
            Some(self.min_value_after(slot, new_value)?)
        } else {
            None
        };

        let region = packed_region_mut(&mut self.store, self.lg_config_k, self.hll_type)?;
        let old_raw = read_packed(region, bits, slot);
        write_packed(region, bits, slot, if escaped { token } else { shifted });

        if escaped {
            let lg_config_k = self.lg_config_k;
            let aux = self.aux_map.get_or_insert_with(|| {
                tracing::debug!(lg_config_k, "creating exception table");
                AuxMap::new(initial_lg_aux_arr(lg_config_k))
            });
            aux.put(slot, new_value);
            self.sync_aux()?;
        } else if old_raw == token {
            if let Some(aux) = self.aux_map.as_mut() {
                aux.remove(slot);
            }
            self.sync_aux()?;
        }

        if leaves_cur_min {
            self.num_at_cur_min -= 1;
        } else if old_value != self.cur_min && new_value == self.cur_min {
            self.num_at_cur_min += 1;
        }
        self.store
            .put_u32_le(CUR_MIN_COUNT_INT, self.num_at_cur_min)?;

        if let Some(new_cur_min) = rebase_to {
            self.rebase(new_cur_min)?;
        }
        self.sync_empty_flag()
    }

    /// Makes sure the store can hold the exception table after `slot` is inserted.
    fn reserve_exception(&mut self, slot: u32) -> Result<(), Error> {
        let lg_aux_arr = match &self.aux_map {
            Some(aux) if aux.needs_grow_for(slot) => aux.lg_size() + 1,
            Some(aux) => aux.lg_size(),
            None => initial_lg_aux_arr(self.lg_config_k),
        };
        self.store
            .ensure_len(updatable_bytes(self.lg_config_k, self.hll_type, lg_aux_arr))
    }

    /// Smallest effective value once `slot` holds `new_value`.
    fn min_value_after(&self, slot: u32, new_value: u8) -> Result<u8, Error> {
        // the only slot at cur_min is leaving it, so nothing can be lower than cur_min + 1
        let floor = self.cur_min + 1;
        let mut min = new_value;
        for other in 0..1u32 << self.lg_config_k {
            if other == slot {
                continue;
            }
            min = min.min(self.slot_value(other)?);
            if min == floor {
                break;
            }
        }
        Ok(min)
    }

    /// Moves the baseline up to `new_cur_min`, the current minimum over all slots.
    ///
    /// Packed values are shifted down and exceptions that now fit are demoted back into the
    /// packed region.
    fn rebase(&mut self, new_cur_min: u8) -> Result<(), Error> {
        debug_assert!(new_cur_min > self.cur_min);
        let token = self.hll_type.aux_token();
        let bits = self.hll_type.bits();
        let shift = new_cur_min - self.cur_min;
        let mut num_at_new = 0u32;
        let mut demoted = 0u32;

        let region = packed_region_mut(&mut self.store, self.lg_config_k, self.hll_type)?;
        for slot in 0..1u32 << self.lg_config_k {
            let raw = read_packed(region, bits, slot);
            if raw != token {
                debug_assert!(raw >= shift, "slot {slot} is below the new cur_min");
                let shifted = raw - shift;
                write_packed(region, bits, slot, shifted);
                if shifted == 0 {
                    num_at_new += 1;
                }
            }
        }
        if let Some(aux) = self.aux_map.as_mut() {
            aux.retain(|slot, value| {
                let shifted = value - new_cur_min;
                if shifted >= token {
                    return true;
                }
                write_packed(region, bits, slot, shifted);
                demoted += 1;
                if shifted == 0 {
                    num_at_new += 1;
                }
                false
            });
        }

        tracing::debug!(
            old_cur_min = self.cur_min,
            new_cur_min,
            num_at_new,
            demoted,
            "rebased cur_min"
        );
        self.cur_min = new_cur_min;
        self.num_at_cur_min = num_at_new;
        self.store.put_u8(HLL_CUR_MIN_BYTE, new_cur_min)?;
        self.store.put_u32_le(CUR_MIN_COUNT_INT, num_at_new)?;
        self.sync_aux()
    }

    /// Writes the exception table into the updatable exception region.
    fn sync_aux(&mut self) -> Result<(), Error> {
        let Some(aux) = &self.aux_map else {
            return Ok(());
        };
        let start = aux_start(self.lg_config_k, self.hll_type);
        let bytes = self.store.as_mut_slice()?;
        bytes[LG_ARR_BYTE] = aux.lg_size();
        LittleEndian::write_u32(&mut bytes[AUX_COUNT_INT..], aux.count());
        for (i, &cell) in aux.cells().iter().enumerate() {
            LittleEndian::write_u32(&mut bytes[start + 4 * i..], cell);
        }
        Ok(())
    }

    fn sync_empty_flag(&mut self) -> Result<(), Error> {
        let flags = self.store.get_u8(FLAGS_BYTE);
        let updated = if self.is_empty() {
            flags | EMPTY_FLAG_MASK
        } else {
            flags & !EMPTY_FLAG_MASK
        };
        if updated != flags {
            self.store.put_u8(FLAGS_BYTE, updated)?;
        }
        Ok(())
    }
}

impl<'b> PartialEq<HllArray<'b>> for HllArray<'_> {
    /// Logical equality: same configuration, same cur_min and same value in every slot.
    fn eq(&self, other: &HllArray<'b>) -> bool {
        self.lg_config_k == other.lg_config_k
            && self.hll_type == other.hll_type
            && self.cur_min == other.cur_min
            && self
                .iter()
                .zip(other.iter())
                .all(|pair| matches!(pair, (Ok(a), Ok(b)) if a == b))
    }
}

impl fmt::Debug for HllArray<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HllArray")
            .field("lg_config_k", &self.lg_config_k)
            .field("hll_type", &self.hll_type)
            .field("cur_min", &self.cur_min)
            .field("num_at_cur_min", &self.num_at_cur_min)
            .field("aux_count", &self.aux_count())
            .field("compact", &self.compact)
            .field("borrowed", &self.store.is_borrowed())
            .field("read_only", &self.is_read_only())
            .finish()
    }
}

fn packed_region_mut<'s>(
    store: &'s mut ByteStore<'_>,
    lg_config_k: u8,
    hll_type: HllType,
) -> Result<&'s mut [u8], Error> {
    let end = aux_start(lg_config_k, hll_type);
    Ok(&mut store.as_mut_slice()?[HLL_BYTE_ARR_START..end])
}

/// Reads the `bits`-wide value of `slot` from a packed region.
#[inline]
pub(super) fn read_packed(region: &[u8], bits: u32, slot: u32) -> u8 {
    let mask = (1u16 << bits) - 1;
    let start_bit = slot * bits;
    let byte_idx = (start_bit >> 3) as usize;
    let shift = start_bit & 7;

    if shift + bits <= 8 {
        ((region[byte_idx] as u16 >> shift) & mask) as u8
    } else {
        let two_bytes = u16::from_le_bytes([region[byte_idx], region[byte_idx + 1]]);
        ((two_bytes >> shift) & mask) as u8
    }
}

/// Writes the `bits`-wide value of `slot`, preserving neighbouring slots.
#[inline]
fn write_packed(region: &mut [u8], bits: u32, slot: u32, value: u8) {
    let mask = (1u16 << bits) - 1;
    debug_assert!(value as u16 <= mask, "{value} does not fit {bits} bits");
    let start_bit = slot * bits;
    let byte_idx = (start_bit >> 3) as usize;
    let shift = start_bit & 7;

    if shift + bits <= 8 {
        let byte = region[byte_idx] as u16;
        region[byte_idx] = ((byte & !(mask << shift)) | ((value as u16 & mask) << shift)) as u8;
    } else {
        let mut two_bytes = u16::from_le_bytes([region[byte_idx], region[byte_idx + 1]]);
        two_bytes &= !(mask << shift);
        two_bytes |= (value as u16 & mask) << shift;
        let [lo, hi] = two_bytes.to_le_bytes();
        region[byte_idx] = lo;
        region[byte_idx + 1] = hi;
    }
}
