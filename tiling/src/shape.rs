//! Shape analysis: validate the four tensor descriptors and fold them into the
//! handful of scalars every planning branch works from.

use enumset::EnumSet;
use smallvec::SmallVec;
use snafu::{OptionExt, ensure};
use tilecraft_dtype::{ScalarDType, describe_set};
use tracing::trace;

use crate::error::{Result, ShapeMismatchSnafu, UnsupportedDtypeSnafu};

/// Element types the scatter-add kernels are compiled for.
pub const VAR_DTYPES: EnumSet<ScalarDType> = enumset::enum_set!(
    ScalarDType::Float32
        | ScalarDType::Float16
        | ScalarDType::BFloat16
        | ScalarDType::Int32
        | ScalarDType::Int8
        | ScalarDType::UInt8
);

/// Index types the scatter-add kernels read.
pub const INDEX_DTYPES: EnumSet<ScalarDType> = enumset::enum_set!(ScalarDType::Int32 | ScalarDType::Int64);

pub type Dims = SmallVec<[u64; 4]>;

/// Declared shape and element type of one operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TensorDesc {
    pub dims: Dims,
    pub dtype: ScalarDType,
}

impl TensorDesc {
    pub fn new(dims: impl IntoIterator<Item = u64>, dtype: ScalarDType) -> Self {
        Self { dims: dims.into_iter().collect(), dtype }
    }

    /// Rank-0 tensor holding a single element.
    pub fn scalar(dtype: ScalarDType) -> Self {
        Self { dims: Dims::new(), dtype }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Element count, `None` when it does not fit in `u64`.
    pub fn numel(&self) -> Option<u64> {
        checked_product(&self.dims)
    }

    /// Element count and byte size, rejected when either overflows `u64`.
    fn checked_numel(&self, role: &'static str) -> Result<u64> {
        self.numel()
            .filter(|n| n.checked_mul(self.dtype.bytes()).is_some())
            .context(ShapeMismatchSnafu { reason: format!("{role} shape {:?} overflows a 64-bit size", self.dims) })
    }
}

fn checked_product(dims: &[u64]) -> Option<u64> {
    dims.iter().try_fold(1u64, |acc, &dim| acc.checked_mul(dim))
}

/// Operands of `output = var; output[indices[i]] += updates[i]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ScatterAddInputs {
    pub var: TensorDesc,
    pub indices: TensorDesc,
    pub updates: TensorDesc,
    pub output: TensorDesc,
}

impl ScatterAddInputs {
    /// Inputs with the output mirroring `var`.
    pub fn new(var: TensorDesc, indices: TensorDesc, updates: TensorDesc) -> Self {
        let output = var.clone();
        Self { var, indices, updates, output }
    }
}

/// Flattened view of a validated scatter-add problem.
///
/// `var` is treated as a `var_rows x var_cols` matrix; each index selects one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ShapeDescriptor {
    pub var_rows: u64,
    pub var_cols: u64,
    pub var_elements: u64,
    pub indices_count: u64,
    pub updates_count: u64,
    pub var_dtype: ScalarDType,
    pub indices_dtype: ScalarDType,
    pub updates_dtype: ScalarDType,
    pub update_is_scalar: bool,
}

impl ShapeDescriptor {
    pub const fn var_bytes(&self) -> u64 {
        self.var_dtype.bytes()
    }

    pub const fn indices_bytes(&self) -> u64 {
        self.indices_dtype.bytes()
    }

    pub const fn updates_bytes(&self) -> u64 {
        self.updates_dtype.bytes()
    }

    /// Bytes of one `var` row.
    pub const fn row_bytes(&self) -> u64 {
        self.var_cols.saturating_mul(self.var_bytes())
    }

    /// No row, column or index to process.
    pub const fn is_empty(&self) -> bool {
        self.var_rows == 0 || self.var_cols == 0 || self.indices_count == 0
    }
}

/// Validate the operands and derive the [`ShapeDescriptor`].
///
/// Shapes are checked before dtypes. A rank-0 `updates` broadcasts one value to every
/// indexed row and skips the shape relation.
#[tracing::instrument(skip_all, fields(var = ?inputs.var.dims, indices = ?inputs.indices.dims))]
pub fn analyze(inputs: &ScatterAddInputs) -> Result<ShapeDescriptor> {
    let ScatterAddInputs { var, indices, updates, output } = inputs;

    ensure!(var.rank() >= 1, ShapeMismatchSnafu { reason: "var must have rank >= 1" });
    ensure!(
        output.dims == var.dims,
        ShapeMismatchSnafu { reason: format!("output shape {:?} differs from var shape {:?}", output.dims, var.dims) }
    );

    let update_is_scalar = updates.rank() == 0;
    if !update_is_scalar {
        check_update_shape(var, indices, updates)?;
    }

    check_dtype("indices", indices.dtype, INDEX_DTYPES)?;
    check_dtype("var", var.dtype, VAR_DTYPES)?;
    check_dtype("updates", updates.dtype, VAR_DTYPES)?;
    check_dtype("updates", updates.dtype, EnumSet::only(var.dtype))?;
    check_dtype("output", output.dtype, EnumSet::only(var.dtype))?;

    let var_elements = var.checked_numel("var")?;
    let var_rows = var.dims[0];
    let var_cols = checked_product(&var.dims[1..])
        .context(ShapeMismatchSnafu { reason: format!("var row of {:?} overflows a 64-bit size", &var.dims[1..]) })?;
    let descriptor = ShapeDescriptor {
        var_rows,
        var_cols,
        var_elements,
        indices_count: indices.checked_numel("indices")?,
        updates_count: updates.checked_numel("updates")?,
        var_dtype: var.dtype,
        indices_dtype: indices.dtype,
        updates_dtype: updates.dtype,
        update_is_scalar,
    };

    trace!(descriptor = ?descriptor, "Analyzed scatter-add shapes");
    Ok(descriptor)
}

fn check_update_shape(var: &TensorDesc, indices: &TensorDesc, updates: &TensorDesc) -> Result<()> {
    let expected_rank = indices.rank() + var.rank() - 1;
    ensure!(
        updates.rank() == expected_rank,
        ShapeMismatchSnafu {
            reason: format!(
                "updates rank {} != indices rank {} + var rank {} - 1",
                updates.rank(),
                indices.rank(),
                var.rank()
            )
        }
    );

    let (leading, trailing) = updates.dims.split_at(indices.rank());
    ensure!(
        leading == indices.dims.as_slice(),
        ShapeMismatchSnafu {
            reason: format!("updates leading dims {leading:?} differ from indices shape {:?}", indices.dims)
        }
    );
    ensure!(
        trailing == &var.dims[1..],
        ShapeMismatchSnafu {
            reason: format!("updates trailing dims {trailing:?} differ from var dims {:?}", &var.dims[1..])
        }
    );
    Ok(())
}

fn check_dtype(role: &'static str, dtype: ScalarDType, supported: EnumSet<ScalarDType>) -> Result<()> {
    ensure!(supported.contains(dtype), UnsupportedDtypeSnafu { role, dtype, supported: describe_set(supported) });
    Ok(())
}
