//! Layout arithmetic and the `dyn` layout contract.

/// Size of a `dyn<T>` view in bytes.
pub const DYN_SIZE: u32 = 16;
/// Alignment of a `dyn<T>` view.
pub const DYN_ALIGNMENT: u32 = 8;
/// Offset of the `i32` element count.
pub const DYN_LENGTH_OFFSET: u32 = 0;
/// Offset of the `u64` data address. Bytes `4..8` are padding.
pub const DYN_DATA_OFFSET: u32 = 8;

/// Largest size of a type, and of an instance's global data or frame.
pub const MAX_SIZE: u32 = 1 << 28;

/// Computed size and alignment of a finalised type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Layout {
    pub size: u32,
    pub alignment: u32,
}

impl Layout {
    pub const EMPTY: Layout = Layout {
        size: 0,
        alignment: 1,
    };

    /// Distance between consecutive array elements of this layout.
    pub const fn stride(self) -> u32 {
        align_up(self.size, self.alignment)
    }

    /// `(offset, end)` of a value of this layout placed at the first
    /// aligned offset from `cursor`; `None` past [`MAX_SIZE`].
    pub fn place(self, cursor: u32) -> Option<(u32, u32)> {
        if cursor > MAX_SIZE {
            return None;
        }
        let offset = align_up(cursor, self.alignment);
        let end = offset.checked_add(self.size).filter(|&end| end <= MAX_SIZE)?;
        Some((offset, end))
    }

    /// Size of `len` consecutive elements; `None` past [`MAX_SIZE`].
    pub fn repeat(self, len: u32) -> Option<u32> {
        self.stride()
            .checked_mul(len)
            .filter(|&size| size <= MAX_SIZE)
    }
}

/// Round `offset` up to a multiple of `alignment` (a power of two, or 1).
pub const fn align_up(offset: u32, alignment: u32) -> u32 {
    if alignment <= 1 {
        return offset;
    }
    offset.div_ceil(alignment) * alignment
}

#[cfg(test)]
mod tests;
