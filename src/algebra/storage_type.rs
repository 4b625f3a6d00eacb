//! Parallel storage type of distributed vectors and matrices.
//!
//! The type is a bitmask: a vector whose ghosts all hold the same value is
//! CONSISTENT, one whose true value is the sum over all copies is ADDITIVE,
//! and UNIQUE is the additive special case in which only the master copy is
//! non-zero. A vector may carry several bits at once (a zero vector is all
//! three). Arithmetic on two vectors keeps only the common bits.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageType(u8);

impl StorageType {
    pub const UNDEFINED: StorageType = StorageType(0);
    pub const CONSISTENT: StorageType = StorageType(1);
    pub const ADDITIVE: StorageType = StorageType(2);
    pub const UNIQUE: StorageType = StorageType(4);
    /// Every representation at once (zero and purely local vectors).
    pub const ALL: StorageType = StorageType(1 | 2 | 4);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        StorageType(bits & 7)
    }

    /// True if every bit of `required` is set. UNDEFINED is contained in nothing.
    pub const fn contains(self, required: StorageType) -> bool {
        required.0 != 0 && self.0 & required.0 == required.0
    }

    pub const fn is_undefined(self) -> bool {
        self.0 == 0
    }

    /// UNIQUE values are also a valid additive representation.
    pub const fn normalized(self) -> Self {
        if self.0 & Self::UNIQUE.0 != 0 {
            StorageType(self.0 | Self::ADDITIVE.0)
        } else {
            self
        }
    }
}

impl BitAnd for StorageType {
    type Output = StorageType;
    fn bitand(self, rhs: Self) -> Self {
        StorageType(self.0 & rhs.0)
    }
}

impl BitOr for StorageType {
    type Output = StorageType;
    fn bitor(self, rhs: Self) -> Self {
        StorageType(self.0 | rhs.0)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_undefined() {
            return write!(f, "UNDEFINED");
        }
        let names = [
            (Self::CONSISTENT, "CONSISTENT"),
            (Self::ADDITIVE, "ADDITIVE"),
            (Self::UNIQUE, "UNIQUE"),
        ];
        let mut first = true;
        for (bit, name) in names {
            if self.contains(bit) {
                if !first {
                    write!(f, "|")?;
                }
                write!(f, "{name}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StorageType({self})")
    }
}
