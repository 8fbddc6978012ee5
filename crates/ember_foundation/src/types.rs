//! Type tags for slot constraint checking.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tag naming the variant of a [`Value`](crate::Value).
///
/// Slot constraints declare the set of tags a slot accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TypeTag {
    /// The void type.
    Void,
    /// Boolean type.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// String type.
    Str,
    /// Symbol type.
    Symbol,
    /// Multifield type.
    List,
    /// Fact address type.
    FactAddress,
}

impl TypeTag {
    /// Returns true for the numeric tags (`Int` and `Float`).
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Int | Self::Float)
    }

    /// Returns the CLIPS-style name of this tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Void => "VOID",
            Self::Bool => "BOOLEAN",
            Self::Int => "INTEGER",
            Self::Float => "FLOAT",
            Self::Str => "STRING",
            Self::Symbol => "SYMBOL",
            Self::List => "MULTIFIELD",
            Self::FactAddress => "FACT-ADDRESS",
        }
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
