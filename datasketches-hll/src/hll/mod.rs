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

//! Packed HyperLogLog register storage.
//!
//! # Overview
//!
//! An HLL sketch keeps `k = 2^lg_config_k` small registers. This module owns how those
//! registers are stored and persisted; it does not hash items or compute estimates.
//!
//! Registers are packed into 4, 6 or 8 bits per slot (see [`HllType`]). Every stored value is
//! relative to a per-sketch baseline, `cur_min`, so the packed width stays small as the
//! registers grow. A value that still does not fit is *escaped*: the slot stores the reserved
//! aux token (the all-ones pattern of the width) and the real value lives in an exception
//! table keyed by slot.
//!
//! # Storage modes
//!
//! An [`HllArray`] either owns its buffer or is a view over caller memory:
//!
//! - [`HllArray::builder`] and [`HllArray::heapify`] produce an owned sketch.
//! - [`HllArray::wrap`] gives a read-only view; every mutating call fails with
//!   [`ErrorKind::WriteAccess`](crate::error::ErrorKind::WriteAccess).
//! - [`HllArray::writable_wrap`] and [`HllArrayBuilder::build_in`] give a writable view whose
//!   updates land directly in the caller's bytes.
//!
//! # Layouts
//!
//! - [`Layout::Compact`]: the exception entries are written sorted by slot, so equal
//!   sketches always serialize to identical bytes.
//! - [`Layout::Updatable`]: the exception table is written as its hash array, so the bytes can
//!   be wrapped writable and updated in place.
//!
//! # Coupons
//!
//! Exception entries are stored as coupons: a 32-bit value encoding a slot number (low 26 bits)
//! and a register value (upper 6 bits).

mod array;
mod aux_map;
mod iter;
mod serialization;
mod store;

pub use array::HllArray;
pub use array::HllArrayBuilder;
pub use iter::PairIter;
pub use serialization::EstimatorState;

/// Number of bits used to encode register values per slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HllType {
    /// 4 bits per slot, escapes are common once values spread beyond 14 of the baseline.
    Hll4 = 0,
    /// 6 bits per slot.
    Hll6 = 1,
    /// 8 bits per slot; register values never escape.
    Hll8 = 2,
}

impl HllType {
    /// Width of a packed slot in bits.
    pub const fn bits(self) -> u32 {
        match self {
            HllType::Hll4 => 4,
            HllType::Hll6 => 6,
            HllType::Hll8 => 8,
        }
    }

    /// The reserved packed value meaning "see the exception table".
    pub const fn aux_token(self) -> u8 {
        ((1u32 << self.bits()) - 1) as u8
    }

    /// Bytes taken by the packed slot region for `2^lg_config_k` slots.
    pub const fn packed_bytes(self, lg_config_k: u8) -> usize {
        ((1usize << lg_config_k) * self.bits() as usize).div_ceil(8)
    }

    /// Whether a register value can ever reach the aux token of this width.
    pub(crate) const fn can_escape(self) -> bool {
        self.aux_token() <= MAX_REGISTER_VALUE
    }

    pub(crate) fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            0 => Some(HllType::Hll4),
            1 => Some(HllType::Hll6),
            2 => Some(HllType::Hll8),
            _ => None,
        }
    }
}

/// Serialization layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Minimal and canonical: exceptions written sorted by slot.
    Compact,
    /// Fixed-capacity exception region in hash order, wrappable for in-place updates.
    Updatable,
}

/// Minimum log2 of K.
pub const MIN_LG_K: u8 = 2;
/// Maximum log2 of K.
pub const MAX_LG_K: u8 = 21;
/// Default log2 of K.
pub const DEFAULT_LG_K: u8 = 12;
/// Largest register value a slot may hold.
pub const MAX_REGISTER_VALUE: u8 = 63;

const KEY_BITS_26: u32 = 26;
const KEY_MASK_26: u32 = (1 << KEY_BITS_26) - 1;

// Resize at 3/4 = 75% load factor
const RESIZE_NUMER: u32 = 3;
const RESIZE_DENOM: u32 = 4;

/// Initial log2 capacity of the exception table, indexed by lg_config_k.
const LG_AUX_ARR_INTS: [u8; MAX_LG_K as usize + 1] = [
    0, 2, 2, 2, 2, 2, 2, 3, 3, 3, 4, 4, 5, 5, 6, 7, 8, 9, 10, 11, 12, 13,
];

/// Extract slot number (low 26 bits) from coupon
#[inline]
fn get_slot(coupon: u32) -> u32 {
    coupon & KEY_MASK_26
}

/// Extract value (upper 6 bits) from coupon
#[inline]
fn get_value(coupon: u32) -> u8 {
    (coupon >> KEY_BITS_26) as u8
}

/// Pack slot number and value into a coupon
///
/// Format: [value (6 bits) << 26] | [slot (26 bits)]
#[inline]
fn pack_coupon(slot: u32, value: u8) -> u32 {
    ((value as u32) << KEY_BITS_26) | (slot & KEY_MASK_26)
}

fn initial_lg_aux_arr(lg_config_k: u8) -> u8 {
    LG_AUX_ARR_INTS[lg_config_k as usize]
}

/// Smallest table capacity (as log2) that holds `count` entries under the load factor.
fn lg_aux_arr_for_count(lg_config_k: u8, count: u32) -> u8 {
    let mut ceil_pow2 = count.max(1).next_power_of_two();
    if RESIZE_DENOM * count > RESIZE_NUMER * ceil_pow2 {
        ceil_pow2 <<= 1;
    }
    initial_lg_aux_arr(lg_config_k).max(ceil_pow2.trailing_zeros() as u8)
}
