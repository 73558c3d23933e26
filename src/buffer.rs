// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Frame and data buffers.
//!
//! A buffer is (re)allocated once per transaction and keeps its contents
//! until the next allocation. [`Static`] never touches the heap, [`Dynamic`]
//! grows on demand.

use core::fmt::Debug;

use crate::error::Error;

/// A resizable buffer of plain values.
pub trait Buffer<T>: Default + Debug {
    /// The current contents.
    fn as_slice(&self) -> &[T];

    /// Drop the current contents.
    fn clear(&mut self);

    /// Replace the contents with `len` zeroed values.
    ///
    /// Fails with [`Error::Alloc`] if the buffer cannot hold `len` values.
    fn alloc(&mut self, len: usize) -> Result<&mut [T], Error>;
}

impl<T, const N: usize> Buffer<T> for heapless::Vec<T, N>
where
    T: Copy + Default + Debug,
{
    fn as_slice(&self) -> &[T] {
        self
    }

    fn clear(&mut self) {
        heapless::Vec::clear(self);
    }

    fn alloc(&mut self, len: usize) -> Result<&mut [T], Error> {
        heapless::Vec::clear(self);
        self.resize(len, T::default()).map_err(|()| Error::Alloc)?;
        Ok(self.as_mut_slice())
    }
}

#[cfg(feature = "alloc")]
impl<T> Buffer<T> for alloc::vec::Vec<T>
where
    T: Copy + Default + Debug,
{
    fn as_slice(&self) -> &[T] {
        self
    }

    fn clear(&mut self) {
        alloc::vec::Vec::clear(self);
    }

    fn alloc(&mut self, len: usize) -> Result<&mut [T], Error> {
        alloc::vec::Vec::clear(self);
        self.try_reserve(len).map_err(|_| Error::Alloc)?;
        self.resize(len, T::default());
        Ok(self.as_mut_slice())
    }
}

/// Memory strategy of a master or slave.
pub trait Storage {
    /// Frame buffers and packed coils.
    type Bytes: Buffer<u8>;
    /// Decoded register values.
    type Words: Buffer<u16>;
}

/// Fixed-capacity buffers of `N` items each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Static<const N: usize = { crate::rtu::MAX_FRAME_LEN }>;

impl<const N: usize> Storage for Static<N> {
    type Bytes = heapless::Vec<u8, N>;
    type Words = heapless::Vec<u16, N>;
}

/// Heap allocated buffers.
#[cfg(feature = "alloc")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dynamic;

#[cfg(feature = "alloc")]
impl Storage for Dynamic {
    type Bytes = alloc::vec::Vec<u8>;
    type Words = alloc::vec::Vec<u16>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_buffer_rejects_oversized_allocations() {
        let mut buf = <Static<8> as Storage>::Bytes::default();
        assert_eq!(buf.alloc(9).err(), Some(Error::Alloc));
        assert!(buf.as_slice().is_empty());
        assert_eq!(buf.alloc(8).map(|b| b.len()), Ok(8));
    }

    #[test]
    fn allocation_zeroes_previous_contents() {
        let mut buf = heapless::Vec::<u16, 4>::default();
        buf.alloc(3).unwrap().copy_from_slice(&[1, 2, 3]);
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        assert_eq!(buf.alloc(2).unwrap(), &[0, 0]);
        Buffer::clear(&mut buf);
        assert!(buf.as_slice().is_empty());
    }

    #[cfg(feature = "alloc")]
    #[test]
    fn dynamic_buffer_grows() {
        let mut buf = <Dynamic as Storage>::Bytes::default();
        assert_eq!(buf.alloc(300).map(|b| b.len()), Ok(300));
        assert_eq!(buf.alloc(4).unwrap(), &[0; 4]);
    }
}
