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

//! Packed HyperLogLog register storage and serialization.
//!
//! This crate stores the `k` registers of an HLL sketch in 4, 6 or 8 bits per slot, handles
//! register values that overflow the packed width, and reads and writes the sketch image in
//! owned memory or directly in caller-provided bytes. Hashing items and computing cardinality
//! estimates are left to the caller.
//!
//! # Usage
//!
//! ```rust
//! # use datasketches_hll::hll::{HllArray, HllType, Layout};
//! let mut array = HllArray::builder()
//!     .lg_config_k(10)
//!     .hll_type(HllType::Hll4)
//!     .build();
//! array.update(17, 3).unwrap();
//! array.update(900, 22).unwrap();
//!
//! let bytes = array.serialize_compact();
//! let view = HllArray::wrap(&bytes).unwrap();
//! assert_eq!(view.get_slot(900).unwrap(), 22);
//! assert!(view.serialized_bytes(Layout::Compact).as_ref() == bytes.as_slice());
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]

mod codec;
pub mod error;
pub mod hll;
