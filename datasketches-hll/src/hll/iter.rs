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

use std::iter::FusedIterator;

use crate::error::Error;
use crate::hll::HllArray;

/// Iterator over `(slot, value)` pairs of an [`HllArray`], in slot order.
///
/// Escaped slots are resolved through the exception table. A slot marked escaped with no table
/// entry yields an `InternalConsistency` error for that item; iteration continues afterwards.
pub struct PairIter<'s> {
    array: &'s HllArray<'s>,
    index: u32,
    len: u32,
}

impl<'s> PairIter<'s> {
    pub(super) fn new(array: &'s HllArray<'s>) -> Self {
        Self {
            array,
            index: 0,
            len: 1 << array.lg_config_k(),
        }
    }
}

impl Iterator for PairIter<'_> {
    type Item = Result<(u32, u8), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.len {
            return None;
        }
        let slot = self.index;
        self.index += 1;
        Some(self.array.slot_value(slot).map(|value| (slot, value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.len - self.index) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for PairIter<'_> {}

impl FusedIterator for PairIter<'_> {}
