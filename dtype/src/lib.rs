//! Scalar element types for tiling planners.
//!
//! Planners never touch tensor data, they only need to know how wide an element is,
//! which family it belongs to and whether an index stream may be narrowed to a
//! smaller integer type. [`ScalarDType`] carries exactly that.

use enumset::EnumSet;

pub mod cast;


/// Scalar data types.
#[derive(Debug, Hash, PartialOrd, Ord)]
#[derive(strum::EnumCount, strum::EnumIter, strum::VariantArray, strum::FromRepr)]
#[derive(enumset::EnumSetType)]
#[cfg_attr(feature = "proptest", derive(proptest_derive::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[enumset(repr = "u32")]
pub enum ScalarDType {
    Bool = 0,

    // Interleaved signed/unsigned, narrowest first.
    Int8 = 1,
    UInt8 = 2,
    Int16 = 3,
    UInt16 = 4,
    Int32 = 5,
    UInt32 = 6,
    Int64 = 7,
    UInt64 = 8,

    Float16 = 9,
    BFloat16 = 10,
    Float32 = 11,
    Float64 = 12,
}

/// Floating point types that a sort-then-reduce accumulation keeps bit-exact across runs.
pub const FLOATS: EnumSet<ScalarDType> =
    enumset::enum_set!(ScalarDType::Float16 | ScalarDType::BFloat16 | ScalarDType::Float32 | ScalarDType::Float64);

/// Integer types usable as gather/scatter indices.
pub const INDEX_TYPES: EnumSet<ScalarDType> = enumset::enum_set!(
    ScalarDType::Int8
        | ScalarDType::UInt8
        | ScalarDType::Int16
        | ScalarDType::UInt16
        | ScalarDType::Int32
        | ScalarDType::UInt32
        | ScalarDType::Int64
        | ScalarDType::UInt64
);

impl ScalarDType {
    pub const fn bytes(&self) -> u64 {
        match self {
            Self::Bool => 1,
            Self::Int8 => 1,
            Self::Int16 => 2,
            Self::Int32 => 4,
            Self::Int64 => 8,
            Self::UInt8 => 1,
            Self::UInt16 => 2,
            Self::UInt32 => 4,
            Self::UInt64 => 8,
            Self::Float16 => 2,
            Self::BFloat16 => 2,
            Self::Float32 => 4,
            Self::Float64 => 8,
        }
    }

    pub const fn is_bool(&self) -> bool {
        matches!(self, Self::Bool)
    }

    pub const fn is_signed(&self) -> bool {
        matches!(self, Self::Int8 | Self::Int16 | Self::Int32 | Self::Int64)
    }

    pub const fn is_unsigned(&self) -> bool {
        matches!(self, Self::UInt8 | Self::UInt16 | Self::UInt32 | Self::UInt64)
    }

    pub const fn is_int(&self) -> bool {
        self.is_signed() || self.is_unsigned()
    }

    pub const fn is_float(&self) -> bool {
        matches!(self, Self::Float16 | Self::BFloat16 | Self::Float32 | Self::Float64)
    }

    /// Largest value representable by an integer type, `None` for non-integers.
    pub const fn int_max(&self) -> Option<u64> {
        match self {
            Self::Int8 => Some(i8::MAX as u64),
            Self::UInt8 => Some(u8::MAX as u64),
            Self::Int16 => Some(i16::MAX as u64),
            Self::UInt16 => Some(u16::MAX as u64),
            Self::Int32 => Some(i32::MAX as u64),
            Self::UInt32 => Some(u32::MAX as u64),
            Self::Int64 => Some(i64::MAX as u64),
            Self::UInt64 => Some(u64::MAX),
            _ => None,
        }
    }

    /// Short lowercase name used in diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float16 => "float16",
            Self::BFloat16 => "bfloat16",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for ScalarDType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Render a dtype set as a space separated list, narrowest first.
pub fn describe_set(set: EnumSet<ScalarDType>) -> String {
    set.iter().map(|d| d.name()).collect::<Vec<_>>().join(" ")
}
