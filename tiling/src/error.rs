use snafu::Snafu;
use tilecraft_dtype::ScalarDType;

pub type Result<T, E = PlanError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub))]
pub enum PlanError {
    /// Declared ranks or extents violate the scatter-add shape relation.
    #[snafu(display("shape mismatch: {reason}"))]
    ShapeMismatch { reason: String },

    /// A tensor dtype is outside the set the kernels are compiled for.
    #[snafu(display("unsupported {role} dtype {dtype}; supported: {supported}"))]
    UnsupportedDtype { role: &'static str, dtype: ScalarDType, supported: String },

    /// A denominator that must be positive turned out to be zero.
    #[snafu(display("degenerate budget: {what} is zero"))]
    DegenerateBudget { what: &'static str },

    /// Fast memory cannot hold even the smallest batch of a planning branch.
    #[snafu(display("insufficient fast memory: need {required} bytes, {available} available"))]
    InsufficientFastMemory { required: u64, available: u64 },

    /// A finished plan failed its self-check.
    #[snafu(display("plan invariant violated: {invariant}"))]
    InvariantViolated { invariant: String },
}
