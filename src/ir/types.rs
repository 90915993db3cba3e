//! Value types and integer constants.
//!
//! The IR only models what mutation needs to see: integers of a handful of
//! widths, opaque pointers and `void`. Constants are carried as `i64` and kept
//! normalised (sign-extended from their width) so two equal constants always
//! compare and print the same way.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// The type of an IR value.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    /// No value (stores, branches, calls without a result).
    Void,
    /// Boolean produced by comparisons.
    I1,
    /// 8-bit integer.
    I8,
    /// 32-bit integer.
    I32,
    /// 64-bit integer.
    I64,
    /// Opaque pointer.
    Ptr,
}

impl Type {
    /// Returns the bit width of an integer type, `64` for pointers and `0` for `void`.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Type::Void => 0,
            Type::I1 => 1,
            Type::I8 => 8,
            Type::I32 => 32,
            Type::I64 | Type::Ptr => 64,
        }
    }

    /// Returns `true` for the integer types.
    #[must_use]
    pub const fn is_integer(self) -> bool {
        matches!(self, Type::I1 | Type::I8 | Type::I32 | Type::I64)
    }

    /// Truncates `value` to this type's width and sign-extends it back to `i64`.
    ///
    /// # Arguments
    ///
    /// * `value` - The raw value to normalise.
    ///
    /// # Returns
    ///
    /// The canonical `i64` representation of `value` for this type.
    #[must_use]
    pub const fn normalize(self, value: i64) -> i64 {
        let bits = self.bits();
        if bits == 0 {
            0
        } else if bits >= 64 {
            value
        } else {
            let shift = 64 - bits;
            (value << shift) >> shift
        }
    }

    /// Interprets a normalised value as unsigned within this type's width.
    #[must_use]
    pub const fn to_unsigned(self, value: i64) -> u64 {
        let bits = self.bits();
        if bits == 0 {
            0
        } else if bits >= 64 {
            value as u64
        } else {
            (value as u64) & ((1u64 << bits) - 1)
        }
    }
}

/// An integer (or null pointer) constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Constant {
    ty: Type,
    value: i64,
}

impl Constant {
    /// Creates a constant, normalising `value` to the width of `ty`.
    #[must_use]
    pub const fn new(ty: Type, value: i64) -> Self {
        Self {
            ty,
            value: ty.normalize(value),
        }
    }

    /// Shorthand for an `i1` constant.
    #[must_use]
    pub const fn bool(value: bool) -> Self {
        Self::new(Type::I1, value as i64)
    }

    /// Shorthand for an `i32` constant.
    #[must_use]
    pub const fn i32(value: i64) -> Self {
        Self::new(Type::I32, value)
    }

    /// The type of this constant.
    #[must_use]
    pub const fn ty(&self) -> Type {
        self.ty
    }

    /// The signed, normalised value.
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.value
    }

    /// The value zero-extended from the type width.
    #[must_use]
    pub const fn unsigned(&self) -> u64 {
        self.ty.to_unsigned(self.value)
    }

    /// Returns `true` if the constant is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.value == 0
    }

    /// Returns `true` if the constant is one.
    #[must_use]
    pub const fn is_one(&self) -> bool {
        self.value == 1 || (matches!(self.ty, Type::I1) && self.value == -1)
    }

    /// Returns `true` if every bit of the constant is set.
    #[must_use]
    pub const fn is_all_ones(&self) -> bool {
        self.value == -1
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ty {
            Type::I1 => write!(f, "{}", if self.value == 0 { "false" } else { "true" }),
            Type::Ptr if self.value == 0 => write!(f, "null"),
            _ => write!(f, "{}", self.value),
        }
    }
}
