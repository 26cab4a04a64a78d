use crate::error::{KasError, Result};

/// The 8 recognized element types. Codes 8 and above are invalid; new
/// types may only be added with a major-version bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ElementType {
    Int8 = 0,
    Uint8 = 1,
    Int32 = 2,
    Uint32 = 3,
    Int64 = 4,
    Uint64 = 5,
    Float32 = 6,
    Float64 = 7,
}

impl ElementType {
    /// Fixed byte width of one element of this type.
    pub const fn width(self) -> u64 {
        match self {
            ElementType::Int8 | ElementType::Uint8 => 1,
            ElementType::Int32 | ElementType::Uint32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::Uint64 | ElementType::Float64 => 8,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ElementType {
    type Error = KasError;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(ElementType::Int8),
            1 => Ok(ElementType::Uint8),
            2 => Ok(ElementType::Int32),
            3 => Ok(ElementType::Uint32),
            4 => Ok(ElementType::Int64),
            5 => Ok(ElementType::Uint64),
            6 => Ok(ElementType::Float32),
            7 => Ok(ElementType::Float64),
            other => Err(KasError::BadType(other)),
        }
    }
}

bitflags::bitflags! {
    /// Flags accepted by [`crate::Store::open`].
    ///
    /// `NO_MMAP` is the only recognized bit; all others are reserved and
    /// must be zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        /// Force buffered reads even where memory mapping is available.
        const NO_MMAP = 1 << 0;
    }
}

impl TryFrom<u32> for OpenFlags {
    type Error = KasError;

    fn try_from(bits: u32) -> Result<Self> {
        OpenFlags::from_bits(bits).ok_or(KasError::BadMode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_matches_spec_table() {
        assert_eq!(ElementType::Int8.width(), 1);
        assert_eq!(ElementType::Uint8.width(), 1);
        assert_eq!(ElementType::Int32.width(), 4);
        assert_eq!(ElementType::Uint32.width(), 4);
        assert_eq!(ElementType::Int64.width(), 8);
        assert_eq!(ElementType::Uint64.width(), 8);
        assert_eq!(ElementType::Float32.width(), 4);
        assert_eq!(ElementType::Float64.width(), 8);
    }

    #[test]
    fn codes_above_seven_are_rejected() {
        for code in 8..=255u8 {
            assert!(matches!(ElementType::try_from(code), Err(KasError::BadType(c)) if c == code));
        }
    }

    #[test]
    fn codes_zero_through_seven_round_trip() {
        for code in 0..=7u8 {
            let ty = ElementType::try_from(code).expect("valid code");
            assert_eq!(ty.code(), code);
        }
    }

    #[test]
    fn open_flags_rejects_reserved_bits() {
        assert!(OpenFlags::try_from(1u32 << 31).is_err());
        assert!(OpenFlags::try_from(0).is_ok());
        assert!(OpenFlags::try_from(OpenFlags::NO_MMAP.bits()).is_ok());
    }
}
