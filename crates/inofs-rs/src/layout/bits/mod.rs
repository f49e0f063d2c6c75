//! Allocation bitmaps backed by whole blocks, with lowest-free search.


use super::constants::{BITS_PER_BLOCK, BLOCK_SIZE};
use super::div_ceil;

#[derive(Clone, Eq, PartialEq, Debug)]
/// Bitmap tracks `len` allocation bits. Storage is padded to whole blocks so
/// each block can be written back on its own.
pub struct Bitmap {
    bytes: Vec<u8>,
    len: u32,
}

impl Bitmap {
    #[must_use]
    /// `new` returns a bitmap of `len` clear bits.
    pub fn new(len: u32) -> Self {
        let blocks = Self::blocks_for(len) as usize;
        Self {
            bytes: vec![0u8; blocks * BLOCK_SIZE],
            len,
        }
    }

    #[must_use]
    /// `from_bytes` rebuilds a bitmap of `len` bits from its stored blocks.
    /// Missing trailing bytes read as clear.
    pub fn from_bytes(stored: &[u8], len: u32) -> Self {
        let mut map = Self::new(len);
        let n = stored.len().min(map.bytes.len());
        map.bytes[..n].copy_from_slice(&stored[..n]);
        map
    }

    #[must_use]
    /// `blocks_for` is the number of blocks needed to store `len` bits.
    pub const fn blocks_for(len: u32) -> u32 {
        let blocks = div_ceil(len as u64, BITS_PER_BLOCK as u64) as u32;
        if blocks == 0 { 1 } else { blocks }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    #[must_use]
    /// `get` returns the bit at `i`. Bits past `len` read as clear.
    pub fn get(&self, i: u32) -> bool {
        if i >= self.len {
            return false;
        }
        let (byte, bit) = ((i >> 3) as usize, i & 7);
        (self.bytes[byte] >> bit) & 1 == 1
    }

    #[inline]
    /// `set` updates the bit at `i` and returns its previous value.
    ///
    /// # Panics
    /// Panics if `i` is out of range.
    pub fn set(&mut self, i: u32, val: bool) -> bool {
        assert!(i < self.len, "bit {i} out of range ({})", self.len);
        let (byte, bit) = ((i >> 3) as usize, i & 7);
        let m = 1u8 << bit;
        let prev = self.bytes[byte] & m != 0;
        if val {
            self.bytes[byte] |= m;
        } else {
            self.bytes[byte] &= !m;
        }
        prev
    }

    #[must_use]
    /// `first_clear` returns the lowest clear bit, if any.
    pub fn first_clear(&self) -> Option<u32> {
        let (index, byte) = self
            .bytes
            .iter()
            .enumerate()
            .find(|(_, b)| **b != u8::MAX)?;
        let i = (index as u32) * 8 + byte.trailing_ones();
        (i < self.len).then_some(i)
    }

    #[must_use]
    pub fn count_set(&self) -> u32 {
        (0..self.len).filter(|i| self.get(*i)).count() as u32
    }

    #[must_use]
    pub fn count_clear(&self) -> u32 {
        self.len - self.count_set()
    }

    /// `iter_set` yields the indices of all set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.len).filter(|i| self.get(*i))
    }

    #[must_use]
    /// `block_of` is the index of the storage block holding bit `i`.
    pub const fn block_of(i: u32) -> u32 {
        i / BITS_PER_BLOCK
    }

    #[must_use]
    /// `block_bytes` returns storage block `index` for write-back.
    pub fn block_bytes(&self, index: u32) -> &[u8] {
        let start = index as usize * BLOCK_SIZE;
        &self.bytes[start..start + BLOCK_SIZE]
    }

    #[must_use]
    pub fn storage_blocks(&self) -> u32 {
        (self.bytes.len() / BLOCK_SIZE) as u32
    }
}
