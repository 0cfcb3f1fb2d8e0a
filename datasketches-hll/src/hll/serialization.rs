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

//! Header layout and the compact/updatable codecs.
//!
//! Every image starts with a 40-byte header followed by the packed slot region. What follows
//! depends on the compact flag: a slot-sorted list of exception coupons (compact), or the
//! exception table's hash array (updatable).

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hll::HllType;
use crate::hll::MAX_LG_K;
use crate::hll::MAX_REGISTER_VALUE;
use crate::hll::MIN_LG_K;
use crate::hll::array::read_packed;
use crate::hll::aux_map::AuxMap;
use crate::hll::get_slot;
use crate::hll::get_value;
use crate::hll::initial_lg_aux_arr;
use crate::hll::lg_aux_arr_for_count;

// Byte offsets
pub(crate) const PREAMBLE_INTS_BYTE: usize = 0;
pub(crate) const SER_VER_BYTE: usize = 1;
pub(crate) const FAMILY_BYTE: usize = 2;
pub(crate) const LG_K_BYTE: usize = 3;
pub(crate) const LG_ARR_BYTE: usize = 4;
pub(crate) const FLAGS_BYTE: usize = 5;
pub(crate) const HLL_CUR_MIN_BYTE: usize = 6;
pub(crate) const MODE_BYTE: usize = 7;
pub(crate) const HIP_ACCUM_DOUBLE: usize = 8;
pub(crate) const KXQ0_DOUBLE: usize = 16;
pub(crate) const KXQ1_DOUBLE: usize = 24;
pub(crate) const CUR_MIN_COUNT_INT: usize = 32;
pub(crate) const AUX_COUNT_INT: usize = 36;
pub(crate) const HLL_BYTE_ARR_START: usize = 40;

pub(crate) const HLL_PREINTS: u8 = 10;
pub(crate) const SER_VER: u8 = 1;
pub(crate) const HLL_FAMILY_ID: u8 = 7;

pub(crate) const EMPTY_FLAG_MASK: u8 = 4;
pub(crate) const COMPACT_FLAG_MASK: u8 = 8;

pub(crate) const CUR_MODE_HLL: u8 = 2;

pub(crate) fn encode_mode_byte(cur_mode: u8, tgt_type: u8) -> u8 {
    (cur_mode & 3) | ((tgt_type & 3) << 2)
}

pub(crate) fn extract_cur_mode(mode_byte: u8) -> u8 {
    mode_byte & 3
}

pub(crate) fn extract_tgt_hll_type(mode_byte: u8) -> u8 {
    (mode_byte >> 2) & 3
}

/// Offset of the exception region.
pub(crate) fn aux_start(lg_config_k: u8, hll_type: HllType) -> usize {
    HLL_BYTE_ARR_START + hll_type.packed_bytes(lg_config_k)
}

/// Bytes of an updatable image whose exception region has `2^lg_aux_arr` cells.
pub(crate) fn updatable_bytes(lg_config_k: u8, hll_type: HllType, lg_aux_arr: u8) -> usize {
    let aux_bytes = if hll_type.can_escape() {
        4 << lg_aux_arr
    } else {
        0
    };
    aux_start(lg_config_k, hll_type) + aux_bytes
}

/// Bytes of a compact image holding `aux_count` exceptions.
pub(crate) fn compact_bytes(lg_config_k: u8, hll_type: HllType, aux_count: u32) -> usize {
    aux_start(lg_config_k, hll_type) + 4 * aux_count as usize
}

/// State of the external HIP estimator, stored in the header and carried verbatim.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EstimatorState {
    /// HIP accumulator.
    pub hip_accum: f64,
    /// Sum of `2^-value` for register values below 32.
    pub kxq0: f64,
    /// Sum of `2^-value` for register values of 32 and above.
    pub kxq1: f64,
}

impl EstimatorState {
    /// The state of a sketch whose `2^lg_config_k` registers are all zero.
    pub fn initial(lg_config_k: u8) -> Self {
        Self {
            hip_accum: 0.0,
            kxq0: (1u64 << lg_config_k) as f64,
            kxq1: 0.0,
        }
    }

    pub(crate) fn read(header: &[u8]) -> Self {
        Self {
            hip_accum: LittleEndian::read_f64(&header[HIP_ACCUM_DOUBLE..]),
            kxq0: LittleEndian::read_f64(&header[KXQ0_DOUBLE..]),
            kxq1: LittleEndian::read_f64(&header[KXQ1_DOUBLE..]),
        }
    }

    pub(crate) fn write(&self, header: &mut [u8]) {
        LittleEndian::write_f64(&mut header[HIP_ACCUM_DOUBLE..], self.hip_accum);
        LittleEndian::write_f64(&mut header[KXQ0_DOUBLE..], self.kxq0);
        LittleEndian::write_f64(&mut header[KXQ1_DOUBLE..], self.kxq1);
    }
}

/// Writes the image of an empty updatable sketch into the front of `bytes`.
pub(crate) fn init_image(bytes: &mut [u8], lg_config_k: u8, hll_type: HllType) {
    let lg_aux_arr = initial_lg_aux_arr(lg_config_k);
    let len = updatable_bytes(lg_config_k, hll_type, lg_aux_arr);
    bytes[..len].fill(0);

    bytes[PREAMBLE_INTS_BYTE] = HLL_PREINTS;
    bytes[SER_VER_BYTE] = SER_VER;
    bytes[FAMILY_BYTE] = HLL_FAMILY_ID;
    bytes[LG_K_BYTE] = lg_config_k;
    bytes[LG_ARR_BYTE] = if hll_type.can_escape() { lg_aux_arr } else { 0 };
    bytes[FLAGS_BYTE] = EMPTY_FLAG_MASK;
    bytes[HLL_CUR_MIN_BYTE] = 0;
    bytes[MODE_BYTE] = encode_mode_byte(CUR_MODE_HLL, hll_type as u8);
    EstimatorState::initial(lg_config_k).write(bytes);
    LittleEndian::write_u32(&mut bytes[CUR_MIN_COUNT_INT..], 1 << lg_config_k);
    LittleEndian::write_u32(&mut bytes[AUX_COUNT_INT..], 0);
}

/// Header fields the storage engine reads.
///
/// Family and serial version are validated by the caller's preamble parser and are not
/// checked here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Preamble {
    pub lg_config_k: u8,
    pub hll_type: HllType,
    pub lg_aux_arr: u8,
    pub compact: bool,
    pub cur_min: u8,
    pub num_at_cur_min: u32,
    pub aux_count: u32,
}

impl Preamble {
    pub fn read(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.is_empty() {
            return Err(Error::null_input("memory region"));
        }
        if bytes.len() < HLL_BYTE_ARR_START {
            return Err(Error::insufficient_size(
                "memory region",
                HLL_BYTE_ARR_START,
                bytes.len(),
            ));
        }

        let mode_byte = bytes[MODE_BYTE];
        if extract_cur_mode(mode_byte) != CUR_MODE_HLL {
            return Err(Error::config_invalid("image is not in HLL mode")
                .with_context("mode_byte", mode_byte));
        }
        let selector = extract_tgt_hll_type(mode_byte);
        let hll_type = HllType::from_selector(selector).ok_or_else(|| {
            Error::config_invalid(format!("unknown packing width selector: {selector}"))
        })?;

        let lg_config_k = bytes[LG_K_BYTE];
        if !(MIN_LG_K..=MAX_LG_K).contains(&lg_config_k) {
            return Err(Error::config_invalid(format!(
                "lg_config_k must be in [{MIN_LG_K}, {MAX_LG_K}], got {lg_config_k}"
            )));
        }
        let k = 1u32 << lg_config_k;

        let compact = bytes[FLAGS_BYTE] & COMPACT_FLAG_MASK != 0;
        let cur_min = bytes[HLL_CUR_MIN_BYTE];
        let num_at_cur_min = LittleEndian::read_u32(&bytes[CUR_MIN_COUNT_INT..]);
        let aux_count = LittleEndian::read_u32(&bytes[AUX_COUNT_INT..]);
        if cur_min > MAX_REGISTER_VALUE {
            return Err(Error::deserial(format!("cur_min out of range: {cur_min}")));
        }
        if num_at_cur_min == 0 || num_at_cur_min > k {
            return Err(Error::deserial(format!(
                "num_at_cur_min must be in [1, {k}], got {num_at_cur_min}"
            )));
        }
        if aux_count > k || (!hll_type.can_escape() && aux_count > 0) {
            return Err(Error::deserial(format!(
                "exception count {aux_count} is invalid for {hll_type:?} with k = {k}"
            )));
        }

        let lg_aux_arr = if !hll_type.can_escape() {
            0
        } else if compact {
            lg_aux_arr_for_count(lg_config_k, aux_count)
        } else {
            let lg_aux_arr = bytes[LG_ARR_BYTE];
            let min = initial_lg_aux_arr(lg_config_k);
            if !(min..=lg_config_k + 1).contains(&lg_aux_arr) {
                return Err(Error::deserial(format!(
                    "exception table lg size must be in [{min}, {}], got {lg_aux_arr}",
                    lg_config_k + 1
                )));
            }
            lg_aux_arr
        };

        Ok(Self {
            lg_config_k,
            hll_type,
            lg_aux_arr,
            compact,
            cur_min,
            num_at_cur_min,
            aux_count,
        })
    }

    pub fn aux_start(&self) -> usize {
        aux_start(self.lg_config_k, self.hll_type)
    }

    /// Size of the image this header describes.
    pub fn total_bytes(&self) -> usize {
        if self.compact {
            compact_bytes(self.lg_config_k, self.hll_type, self.aux_count)
        } else {
            updatable_bytes(self.lg_config_k, self.hll_type, self.lg_aux_arr)
        }
    }

    /// Reads the exception entries and checks the packed region against them and the header.
    pub fn read_body(&self, bytes: &[u8]) -> Result<Option<AuxMap>, Error> {
        let aux = self.read_aux(bytes)?;
        self.check_packed(bytes, aux.as_ref())?;
        Ok(aux)
    }

    /// Reads the exception entries that follow the packed region.
    pub fn read_aux(&self, bytes: &[u8]) -> Result<Option<AuxMap>, Error> {
        if self.compact {
            self.read_compact_aux(bytes)
        } else {
            self.read_updatable_aux(bytes)
        }
    }

    fn read_compact_aux(&self, bytes: &[u8]) -> Result<Option<AuxMap>, Error> {
        if self.aux_count == 0 {
            return Ok(None);
        }

        let mut aux = AuxMap::new(self.lg_aux_arr);
        let mut cursor = SketchSlice::new(&bytes[self.aux_start()..]);
        for _ in 0..self.aux_count {
            let coupon = cursor.read_u32_le().map_err(|e| {
                Error::deserial("exception list is truncated").set_source(e)
            })?;
            self.check_entry(coupon)?;
            aux.put(get_slot(coupon), get_value(coupon));
        }
        if aux.count() != self.aux_count {
            return Err(Error::deserial("exception list repeats a slot"));
        }
        Ok(Some(aux))
    }

    fn read_updatable_aux(&self, bytes: &[u8]) -> Result<Option<AuxMap>, Error> {
        if !self.hll_type.can_escape() {
            return Ok(None);
        }

        let start = self.aux_start();
        let cells = 1usize << self.lg_aux_arr;
        let mut entries = Vec::with_capacity(cells);
        for i in 0..cells {
            let coupon = LittleEndian::read_u32(&bytes[start + 4 * i..]);
            if coupon != 0 {
                self.check_entry(coupon)?;
            }
            entries.push(coupon);
        }
        let aux = AuxMap::from_hash_array(self.lg_aux_arr, entries)?;
        if aux.count() != self.aux_count {
            return Err(Error::deserial(format!(
                "header declares {} exceptions, table holds {}",
                self.aux_count,
                aux.count()
            )));
        }
        Ok(Some(aux))
    }

    /// An exception must name a slot in range and hold a value that does not fit the packed
    /// width at `cur_min`.
    fn check_entry(&self, coupon: u32) -> Result<(), Error> {
        let slot = get_slot(coupon);
        let value = get_value(coupon);
        let token = self.hll_type.aux_token();
        if slot >= 1 << self.lg_config_k
            || value > MAX_REGISTER_VALUE
            || value < self.cur_min
            || value - self.cur_min < token
        {
            return Err(Error::deserial(format!(
                "invalid exception entry: slot {slot}, value {value}"
            ))
            .with_context("cur_min", self.cur_min));
        }
        Ok(())
    }

    /// Every escaped slot needs an exception entry, every other slot a register value of at
    /// most 63, and `num_at_cur_min` must count the slots at `cur_min`.
    fn check_packed(&self, bytes: &[u8], aux: Option<&AuxMap>) -> Result<(), Error> {
        let token = self.hll_type.aux_token();
        let bits = self.hll_type.bits();
        let max_raw = MAX_REGISTER_VALUE - self.cur_min;
        let packed = &bytes[HLL_BYTE_ARR_START..self.aux_start()];

        let mut escaped = 0u32;
        let mut at_cur_min = 0u32;
        for slot in 0..1u32 << self.lg_config_k {
            let raw = read_packed(packed, bits, slot);
            if raw == token && self.hll_type.can_escape() {
                if aux.and_then(|aux| aux.find(slot)).is_none() {
                    return Err(Error::deserial("escaped slot has no exception entry")
                        .with_context("slot", slot));
                }
                escaped += 1;
            } else if raw > max_raw {
                return Err(Error::deserial(format!(
                    "packed value {raw} exceeds {max_raw} at cur_min {}",
                    self.cur_min
                ))
                .with_context("slot", slot));
            } else if raw == 0 {
                at_cur_min += 1;
            }
        }

        if escaped != self.aux_count {
            return Err(Error::deserial(format!(
                "header declares {} exceptions, packed region escapes {escaped} slots",
                self.aux_count
            )));
        }
        if at_cur_min != self.num_at_cur_min {
            return Err(Error::deserial(format!(
                "header declares {} slots at cur_min, packed region holds {at_cur_min}",
                self.num_at_cur_min
            )));
        }
        Ok(())
    }
}

/// Builds a compact image: header, packed region, then exceptions sorted by slot.
pub(crate) fn compact_image(
    header: &[u8],
    packed: &[u8],
    aux: Option<&AuxMap>,
    lg_config_k: u8,
    hll_type: HllType,
) -> Vec<u8> {
    let coupons = aux.map(AuxMap::sorted_coupons).unwrap_or_default();
    let aux_count = coupons.len() as u32;

    let mut bytes = SketchBytes::with_capacity(compact_bytes(lg_config_k, hll_type, aux_count));
    bytes.write(&header[..HLL_BYTE_ARR_START]);
    bytes.write(packed);
    for coupon in coupons {
        bytes.write_u32_le(coupon);
    }

    let lg_aux_arr = if hll_type.can_escape() {
        lg_aux_arr_for_count(lg_config_k, aux_count)
    } else {
        0
    };
    bytes.set_u8(LG_ARR_BYTE, lg_aux_arr);
    bytes.set_u8(FLAGS_BYTE, header[FLAGS_BYTE] | COMPACT_FLAG_MASK);
    bytes.set_u32_le(AUX_COUNT_INT, aux_count);
    bytes.into_bytes()
}

/// Builds an updatable image: header, packed region, then the exception table's hash array.
pub(crate) fn updatable_image(
    header: &[u8],
    packed: &[u8],
    aux: Option<&AuxMap>,
    lg_config_k: u8,
    hll_type: HllType,
) -> Vec<u8> {
    let lg_aux_arr = if hll_type.can_escape() {
        aux.map_or_else(|| initial_lg_aux_arr(lg_config_k), AuxMap::lg_size)
    } else {
        0
    };
    let total = updatable_bytes(lg_config_k, hll_type, lg_aux_arr);

    let mut bytes = SketchBytes::with_capacity(total);
    bytes.write(&header[..HLL_BYTE_ARR_START]);
    bytes.write(packed);
    if hll_type.can_escape() {
        match aux {
            Some(aux) => {
                for &cell in aux.cells() {
                    bytes.write_u32_le(cell);
                }
            }
            None => bytes.write(&vec![0u8; 4 << lg_aux_arr]),
        }
    }

    bytes.set_u8(LG_ARR_BYTE, lg_aux_arr);
    bytes.set_u8(FLAGS_BYTE, header[FLAGS_BYTE] & !COMPACT_FLAG_MASK);
    bytes.set_u32_le(AUX_COUNT_INT, aux.map_or(0, AuxMap::count));
    bytes.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::hll::pack_coupon;

    fn empty_image(lg_config_k: u8, hll_type: HllType) -> Vec<u8> {
        let lg_aux_arr = initial_lg_aux_arr(lg_config_k);
        let mut bytes = vec![0xffu8; updatable_bytes(lg_config_k, hll_type, lg_aux_arr)];
        init_image(&mut bytes, lg_config_k, hll_type);
        bytes
    }

    #[test]
    fn test_mode_byte() {
        let mode = encode_mode_byte(CUR_MODE_HLL, HllType::Hll6 as u8);
        assert_eq!(mode, 0b0000_0110);
        assert_eq!(extract_cur_mode(mode), CUR_MODE_HLL);
        assert_eq!(extract_tgt_hll_type(mode), 1);
    }

    #[test]
    fn test_init_image_reads_back() {
        let bytes = empty_image(10, HllType::Hll4);
        // 40 header + 512 packed + 4 << 4 exception cells
        assert_eq!(bytes.len(), 40 + 512 + 64);
        assert!(bytes[HLL_BYTE_ARR_START..].iter().all(|&b| b == 0));

        let preamble = Preamble::read(&bytes).unwrap();
        assert_eq!(preamble.lg_config_k, 10);
        assert_eq!(preamble.hll_type, HllType::Hll4);
        assert_eq!(preamble.lg_aux_arr, 4);
        assert!(!preamble.compact);
        assert_eq!(preamble.cur_min, 0);
        assert_eq!(preamble.num_at_cur_min, 1024);
        assert_eq!(preamble.aux_count, 0);
        assert_eq!(preamble.total_bytes(), bytes.len());
        assert_eq!(preamble.read_body(&bytes).unwrap(), Some(AuxMap::new(4)));

        let state = EstimatorState::read(&bytes);
        assert_eq!(state, EstimatorState::initial(10));
    }

    #[test]
    fn test_hll8_has_no_exception_region() {
        let bytes = empty_image(4, HllType::Hll8);
        assert_eq!(bytes.len(), 40 + 16);
        assert_eq!(bytes[LG_ARR_BYTE], 0);
        assert_eq!(Preamble::read(&bytes).unwrap().total_bytes(), 56);
    }

    #[test]
    fn test_preamble_rejects_bad_fields() {
        let err = Preamble::read(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NullInput);

        let err = Preamble::read(&[0u8; 12]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientSize);

        let mut bytes = empty_image(4, HllType::Hll4);
        bytes[MODE_BYTE] = encode_mode_byte(CUR_MODE_HLL, 3);
        let err = Preamble::read(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let mut bytes = empty_image(4, HllType::Hll4);
        bytes[LG_K_BYTE] = 30;
        let err = Preamble::read(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);

        let mut bytes = empty_image(4, HllType::Hll8);
        LittleEndian::write_u32(&mut bytes[AUX_COUNT_INT..], 1);
        let err = Preamble::read(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }

    #[test]
    fn test_compact_and_updatable_images() {
        let lg_config_k = 4;
        let header = empty_image(lg_config_k, HllType::Hll4);
        let packed = vec![0u8; HllType::Hll4.packed_bytes(lg_config_k)];
        let mut aux = AuxMap::new(2);
        aux.put(9, 30);
        aux.put(2, 31);

        let compact = compact_image(&header, &packed, Some(&aux), lg_config_k, HllType::Hll4);
        assert_eq!(compact.len(), 40 + 8 + 8);
        assert_eq!(compact[FLAGS_BYTE] & COMPACT_FLAG_MASK, COMPACT_FLAG_MASK);
        assert_eq!(LittleEndian::read_u32(&compact[AUX_COUNT_INT..]), 2);
        assert_eq!(LittleEndian::read_u32(&compact[48..]), pack_coupon(2, 31));
        assert_eq!(LittleEndian::read_u32(&compact[52..]), pack_coupon(9, 30));

        let preamble = Preamble::read(&compact).unwrap();
        assert!(preamble.compact);
        assert_eq!(preamble.total_bytes(), compact.len());
        let loaded = preamble.read_aux(&compact).unwrap().unwrap();
        assert_eq!(loaded.find(2), Some(31));
        assert_eq!(loaded.find(9), Some(30));

        let updatable = updatable_image(&compact, &packed, Some(&loaded), lg_config_k, HllType::Hll4);
        assert_eq!(updatable.len(), 40 + 8 + 16);
        assert_eq!(updatable[FLAGS_BYTE] & COMPACT_FLAG_MASK, 0);
        let preamble = Preamble::read(&updatable).unwrap();
        assert_eq!(preamble.read_aux(&updatable).unwrap(), Some(loaded));
    }

    #[test]
    fn test_exception_entries_must_escape() {
        let lg_config_k = 4;
        let mut header = empty_image(lg_config_k, HllType::Hll4);
        header[HLL_CUR_MIN_BYTE] = 5;
        let packed = vec![0u8; HllType::Hll4.packed_bytes(lg_config_k)];

        // below cur_min, fits the packed width at cur_min, and the zero coupon value
        for value in [3, 19, 0] {
            let mut aux = AuxMap::new(2);
            aux.put(1, 30);
            let mut compact =
                compact_image(&header, &packed, Some(&aux), lg_config_k, HllType::Hll4);
            LittleEndian::write_u32(&mut compact[48..], pack_coupon(1, value));

            let preamble = Preamble::read(&compact).unwrap();
            let err = preamble.read_aux(&compact).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        }
    }

    #[test]
    fn test_packed_region_must_match_header() {
        let lg_config_k = 3;
        let good = empty_image(lg_config_k, HllType::Hll8);
        Preamble::read(&good).unwrap().read_body(&good).unwrap();

        let mut bytes = good.clone();
        bytes[HLL_CUR_MIN_BYTE] = 10;
        bytes[HLL_BYTE_ARR_START] = 54;
        LittleEndian::write_u32(&mut bytes[CUR_MIN_COUNT_INT..], 7);
        let err = Preamble::read(&bytes).unwrap().read_body(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);

        let mut bytes = good;
        bytes[HLL_BYTE_ARR_START] = 1;
        let err = Preamble::read(&bytes).unwrap().read_body(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);

        let mut bytes = empty_image(lg_config_k, HllType::Hll4);
        bytes[HLL_BYTE_ARR_START] = 0x0f;
        let err = Preamble::read(&bytes).unwrap().read_body(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }

    #[test]
    fn test_truncated_exception_list() {
        let lg_config_k = 4;
        let header = empty_image(lg_config_k, HllType::Hll4);
        let packed = vec![0u8; HllType::Hll4.packed_bytes(lg_config_k)];
        let mut aux = AuxMap::new(2);
        aux.put(1, 30);
        let compact = compact_image(&header, &packed, Some(&aux), lg_config_k, HllType::Hll4);

        let preamble = Preamble::read(&compact).unwrap();
        let err = preamble.read_aux(&compact[..compact.len() - 1]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    }
}
