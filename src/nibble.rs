use std::ops::{Index, IndexMut};

/// A 4-bit unsigned integer (nibble).
///
/// Used for register and key selectors, so indexing a 16-entry array with it can
/// never go out of range.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub struct u4(u8);

impl u4 {
    /// Creates a new `u4` from a `u8`.
    ///
    /// Panics if the value is greater than 0x0F.
    pub const fn new(value: u8) -> Self {
        assert!(value <= 0x0F, "u4 value must be in range 0x0-0xF");
        Self(value)
    }
}

impl TryFrom<u8> for u4 {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value <= 0x0F { Ok(Self(value)) } else { Err(value) }
    }
}

impl From<u4> for usize {
    fn from(v: u4) -> usize {
        v.0 as usize
    }
}

impl From<u4> for u8 {
    fn from(v: u4) -> u8 {
        v.0
    }
}

impl<T> Index<u4> for [T; 16] {
    type Output = T;

    fn index(&self, index: u4) -> &Self::Output {
        &self[index.0 as usize]
    }
}

impl<T> IndexMut<u4> for [T; 16] {
    fn index_mut(&mut self, index: u4) -> &mut Self::Output {
        &mut self[index.0 as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_from_accepts_hex_digits() {
        for value in 0..=0x0F {
            assert_eq!(u4::try_from(value).map(u8::from), Ok(value));
        }
    }

    #[test]
    fn try_from_rejects_wide_values() {
        assert_eq!(u4::try_from(0x10), Err(0x10));
        assert_eq!(u4::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn indexes_sixteen_entry_arrays() {
        let mut regs = [0u8; 16];
        regs[u4::new(0xF)] = 7;
        assert_eq!(regs[15], 7);
        assert_eq!(regs[u4::new(0xF)], 7);
    }

    #[test]
    #[should_panic(expected = "u4 value must be in range")]
    fn new_panics_on_wide_value() {
        let _ = u4::new(0x10);
    }
}
