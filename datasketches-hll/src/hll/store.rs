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

//! Where the sketch bytes live.

use byteorder::ByteOrder;
use byteorder::LittleEndian;

use crate::error::Error;

/// Byte region backing an [`HllArray`](super::HllArray).
///
/// Offsets passed to the accessors are computed from a layout whose size was checked when the
/// store was created or last grown, so plain slice indexing is used for bounds checking.
#[derive(Debug)]
pub(crate) enum ByteStore<'a> {
    /// Allocated by the sketch, grows on demand.
    Owned(Vec<u8>),
    /// Caller memory; writes are visible to the caller. Never reallocated.
    Writable(&'a mut [u8]),
    /// Caller memory that must not be modified.
    ReadOnly(&'a [u8]),
}

impl<'a> ByteStore<'a> {
    pub fn read_only(bytes: &'a [u8], min_len: usize) -> Result<Self, Error> {
        check_region(bytes.len(), min_len)?;
        Ok(ByteStore::ReadOnly(bytes))
    }

    pub fn writable(bytes: &'a mut [u8], min_len: usize) -> Result<Self, Error> {
        check_region(bytes.len(), min_len)?;
        Ok(ByteStore::Writable(bytes))
    }

    pub fn is_writable(&self) -> bool {
        !matches!(self, ByteStore::ReadOnly(_))
    }

    pub fn is_borrowed(&self) -> bool {
        !matches!(self, ByteStore::Owned(_))
    }

    pub fn as_slice(&self) -> &[u8] {
        match self {
            ByteStore::Owned(bytes) => &bytes[..],
            ByteStore::Writable(bytes) => &bytes[..],
            ByteStore::ReadOnly(bytes) => &bytes[..],
        }
    }

    pub fn as_mut_slice(&mut self) -> Result<&mut [u8], Error> {
        match self {
            ByteStore::Owned(bytes) => Ok(&mut bytes[..]),
            ByteStore::Writable(bytes) => Ok(&mut bytes[..]),
            ByteStore::ReadOnly(_) => Err(Error::write_access()),
        }
    }

    pub fn get_u8(&self, offset: usize) -> u8 {
        self.as_slice()[offset]
    }

    pub fn put_u8(&mut self, offset: usize, value: u8) -> Result<(), Error> {
        self.as_mut_slice()?[offset] = value;
        Ok(())
    }

    pub fn put_u32_le(&mut self, offset: usize, value: u32) -> Result<(), Error> {
        LittleEndian::write_u32(&mut self.as_mut_slice()?[offset..offset + 4], value);
        Ok(())
    }

    /// Makes sure at least `len` bytes are addressable.
    ///
    /// An owned buffer is zero-extended; borrowed memory is never reallocated, so a region that
    /// is too short fails without modification.
    pub fn ensure_len(&mut self, len: usize) -> Result<(), Error> {
        match self {
            ByteStore::Owned(bytes) => {
                if bytes.len() < len {
                    tracing::debug!(from = bytes.len(), to = len, "growing owned store");
                    bytes.resize(len, 0);
                }
                Ok(())
            }
            ByteStore::Writable(bytes) => {
                if bytes.len() < len {
                    Err(Error::insufficient_size("writable region", len, bytes.len()))
                } else {
                    Ok(())
                }
            }
            ByteStore::ReadOnly(_) => Err(Error::write_access()),
        }
    }

    /// Releases owned bytes past `len`. Borrowed regions keep their length.
    pub fn truncate(&mut self, len: usize) {
        if let ByteStore::Owned(bytes) = self {
            bytes.truncate(len);
        }
    }
}

fn check_region(actual: usize, required: usize) -> Result<(), Error> {
    if actual == 0 {
        return Err(Error::null_input("memory region"));
    }
    if actual < required {
        return Err(Error::insufficient_size("memory region", required, actual));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_region_checks() {
        let empty: [u8; 0] = [];
        let err = ByteStore::read_only(&empty, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NullInput);

        let short = [0u8; 3];
        let err = ByteStore::read_only(&short, 4).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InsufficientSize);

        let mut ok = [0u8; 8];
        let store = ByteStore::writable(&mut ok, 4).unwrap();
        assert!(store.is_writable());
        assert!(store.is_borrowed());
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let bytes = [1u8, 2, 3, 4];
        let mut store = ByteStore::read_only(&bytes, 4).unwrap();
        assert!(!store.is_writable());
        assert_eq!(store.put_u8(0, 9).unwrap_err().kind(), ErrorKind::WriteAccess);
        assert_eq!(store.ensure_len(4).unwrap_err().kind(), ErrorKind::WriteAccess);
        assert_eq!(LittleEndian::read_u32(store.as_slice()), 0x04030201);
    }

    #[test]
    fn test_owned_grows_writable_does_not() {
        let mut store = ByteStore::Owned(vec![0u8; 4]);
        store.put_u32_le(0, 0xdeadbeef).unwrap();
        store.ensure_len(12).unwrap();
        assert_eq!(store.as_slice().len(), 12);
        assert_eq!(LittleEndian::read_u32(store.as_slice()), 0xdeadbeef);
        store.truncate(4);
        assert_eq!(store.as_slice().len(), 4);

        let mut region = [0u8; 8];
        let mut store = ByteStore::writable(&mut region, 8).unwrap();
        assert_eq!(
            store.ensure_len(12).unwrap_err().kind(),
            ErrorKind::InsufficientSize
        );
        store.put_u8(7, 5).unwrap();
        drop(store);
        assert_eq!(region[7], 5);
    }
}
