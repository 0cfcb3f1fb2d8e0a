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

use datasketches_hll::error::ErrorKind;
use datasketches_hll::hll::HllArray;
use datasketches_hll::hll::HllType;
use googletest::assert_that;
use googletest::prelude::eq;
use googletest::prelude::ge;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

const ALL_TYPES: [HllType; 3] = [HllType::Hll4, HllType::Hll6, HllType::Hll8];

fn new_array(lg_config_k: u8, hll_type: HllType) -> HllArray<'static> {
    HllArray::builder()
        .lg_config_k(lg_config_k)
        .hll_type(hll_type)
        .build()
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Plain per-slot maximum that the packed array must agree with.
struct Model {
    values: Vec<u8>,
}

impl Model {
    fn new(lg_config_k: u8) -> Self {
        Self {
            values: vec![0; 1 << lg_config_k],
        }
    }

    fn update(&mut self, slot: u32, value: u8) {
        let current = &mut self.values[slot as usize];
        *current = (*current).max(value);
    }

    fn min(&self) -> u8 {
        self.values.iter().copied().min().unwrap()
    }

    fn count_at(&self, value: u8) -> u32 {
        self.values.iter().filter(|&&v| v == value).count() as u32
    }

    fn escaped(&self, hll_type: HllType) -> u32 {
        let token = hll_type.aux_token();
        let min = self.min();
        if token > 63 {
            return 0;
        }
        self.values.iter().filter(|&&v| v - min >= token).count() as u32
    }
}

fn assert_matches_model(array: &HllArray<'_>, model: &Model) {
    for (slot, &expected) in model.values.iter().enumerate() {
        assert_that!(array.get_slot(slot as u32).unwrap(), eq(expected));
    }
    assert_that!(array.cur_min(), eq(model.min()));
    assert_that!(array.num_at_cur_min(), eq(model.count_at(model.min())));
    assert_that!(array.aux_count(), eq(model.escaped(array.hll_type())));
}

#[test]
fn test_new_array_is_empty() {
    for hll_type in ALL_TYPES {
        let array = new_array(10, hll_type);
        assert!(array.is_empty());
        assert!(!array.is_read_only());
        assert!(!array.is_borrowed());
        assert_that!(array.cur_min(), eq(0));
        assert_that!(array.num_at_cur_min(), eq(1024));
        assert_that!(array.aux_count(), eq(0));
        assert!(array.iter().all(|pair| pair.unwrap().1 == 0));
    }
}

#[test]
fn test_boundary_escape_scenario() {
    let mut array = new_array(2, HllType::Hll4);

    array.update(0, 20).unwrap();
    assert_that!(array.get_slot(0).unwrap(), eq(20));
    assert_that!(array.aux_count(), eq(1));

    array.update(1, 3).unwrap();
    assert_that!(array.get_slot(1).unwrap(), eq(3));
    assert_that!(array.aux_count(), eq(1));

    assert_that!(array.cur_min(), eq(0));
    assert_that!(array.num_at_cur_min(), eq(2));
    assert_that!(array.compact_serialization_bytes(), eq(40 + 2 + 4));
}

#[test]
fn test_random_updates_match_model() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for hll_type in ALL_TYPES {
        for lg_config_k in [2u8, 4, 7, 11] {
            let mut array = new_array(lg_config_k, hll_type);
            let mut model = Model::new(lg_config_k);
            let k = 1u32 << lg_config_k;

            // enough updates to push cur_min up a few times on the small configs
            for _ in 0..k * 24 {
                let slot = rng.random_range(0..k);
                let value = rng.random_range(0..=63u8);
                array.update(slot, value).unwrap();
                model.update(slot, value);
            }
            assert_matches_model(&array, &model);
        }
    }
}

#[test]
fn test_cur_min_is_monotonic() {
    let mut rng = StdRng::seed_from_u64(7);
    for hll_type in ALL_TYPES {
        let mut array = new_array(5, hll_type);
        let mut last = array.cur_min();
        for _ in 0..4000 {
            let slot = rng.random_range(0..32);
            let value = rng.random_range(0..=40u8);
            array.update(slot, value).unwrap();
            assert_that!(array.cur_min(), ge(last));
            last = array.cur_min();
        }
        assert_that!(last, ge(1));
    }
}

#[test]
fn test_non_increasing_update_changes_nothing() {
    let mut rng = StdRng::seed_from_u64(42);
    for hll_type in ALL_TYPES {
        let mut array = new_array(6, hll_type);
        for _ in 0..500 {
            array
                .update(rng.random_range(0..64), rng.random_range(0..=50u8))
                .unwrap();
        }

        let before = array.serialize_updatable();
        let cur_min = array.cur_min();
        let num_at_cur_min = array.num_at_cur_min();
        let aux_count = array.aux_count();

        for slot in 0..64 {
            let current = array.get_slot(slot).unwrap();
            array.update(slot, current).unwrap();
            array.update(slot, current / 2).unwrap();
            array.update(slot, 0).unwrap();
        }

        assert_eq!(array.serialize_updatable(), before);
        assert_that!(array.cur_min(), eq(cur_min));
        assert_that!(array.num_at_cur_min(), eq(num_at_cur_min));
        assert_that!(array.aux_count(), eq(aux_count));
    }
}

#[test]
fn test_escape_then_demotion() {
    init_logging();
    let mut array = new_array(3, HllType::Hll4);
    array.update(5, 18).unwrap();
    assert_that!(array.aux_count(), eq(1));

    // lift every other slot to 4: 18 - 4 = 14 now fits under the token
    for slot in (0..8).filter(|&s| s != 5) {
        array.update(slot, 4).unwrap();
    }
    assert_that!(array.cur_min(), eq(4));
    assert_that!(array.aux_count(), eq(0));
    assert_that!(array.get_slot(5).unwrap(), eq(18));

    // the slot is no longer escaped: raising it again still reads back correctly
    array.update(5, 19).unwrap();
    assert_that!(array.get_slot(5).unwrap(), eq(19));
    assert_that!(array.aux_count(), eq(1));
}

#[test]
fn test_exception_table_grows() {
    init_logging();
    let mut array = new_array(8, HllType::Hll6);
    let before = array.updatable_serialization_bytes();
    for slot in 0..100 {
        array.update(slot, 63).unwrap();
    }
    assert_that!(array.aux_count(), eq(100));
    assert!(array.updatable_serialization_bytes() > before);
    for slot in 0..100 {
        assert_that!(array.get_slot(slot).unwrap(), eq(63));
    }
    assert_that!(array.get_slot(100).unwrap(), eq(0));
}

#[test]
fn test_hll8_never_escapes() {
    let mut array = new_array(4, HllType::Hll8);
    for slot in 0..16 {
        array.update(slot, 63).unwrap();
    }
    assert_that!(array.aux_count(), eq(0));
    assert_that!(array.cur_min(), eq(63));
    assert_that!(array.num_at_cur_min(), eq(16));
    assert_that!(
        array.updatable_serialization_bytes(),
        eq(HllArray::initial_updatable_bytes(4, HllType::Hll8))
    );
}

#[test]
fn test_put_slot_can_lower() {
    let mut array = new_array(4, HllType::Hll4);
    array.put_slot(2, 30).unwrap();
    array.put_slot(2, 9).unwrap();
    assert_that!(array.get_slot(2).unwrap(), eq(9));
    assert_that!(array.aux_count(), eq(0));

    array.put_slot(2, 0).unwrap();
    assert!(array.is_empty());
}

#[test]
fn test_put_slot_below_cur_min_fails() {
    let mut array = new_array(2, HllType::Hll6);
    for slot in 0..4 {
        array.update(slot, 3).unwrap();
    }
    assert_that!(array.cur_min(), eq(3));

    let before = array.serialize_updatable();
    let err = array.put_slot(0, 2).unwrap_err();
    assert_that!(err.kind(), eq(ErrorKind::InvalidArgument));
    assert_eq!(array.serialize_updatable(), before);
}

#[test]
fn test_invalid_arguments() {
    let mut array = new_array(4, HllType::Hll4);
    assert_that!(
        array.update(16, 1).unwrap_err().kind(),
        eq(ErrorKind::InvalidArgument)
    );
    assert_that!(
        array.update(0, 64).unwrap_err().kind(),
        eq(ErrorKind::InvalidArgument)
    );
    assert_that!(
        array.get_slot(16).unwrap_err().kind(),
        eq(ErrorKind::InvalidArgument)
    );
    assert!(array.is_empty());
}

#[test]
#[should_panic(expected = "lg_config_k must be in [2, 21]")]
fn test_builder_rejects_lg_k() {
    let _ = HllArray::builder().lg_config_k(22);
}

#[test]
fn test_reset() {
    let mut array = new_array(5, HllType::Hll4);
    for slot in 0..32 {
        array.update(slot, 40 + (slot % 7) as u8).unwrap();
    }
    assert!(!array.is_empty());

    array.reset().unwrap();
    assert!(array.is_empty());
    assert_that!(array.aux_count(), eq(0));
    assert_eq!(
        array.serialize_updatable(),
        new_array(5, HllType::Hll4).serialize_updatable()
    );
}

#[test]
fn test_estimator_state_is_carried() {
    use datasketches_hll::hll::EstimatorState;

    let mut array = new_array(6, HllType::Hll8);
    assert_that!(array.estimator_state(), eq(EstimatorState::initial(6)));

    let state = EstimatorState {
        hip_accum: 12.5,
        kxq0: 60.25,
        kxq1: 0.125,
    };
    array.set_estimator_state(state).unwrap();
    array.update(3, 9).unwrap();

    let restored = HllArray::heapify(&array.serialize_compact()).unwrap();
    assert_that!(restored.estimator_state(), eq(state));
}
