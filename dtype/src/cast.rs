use super::*;

/// Narrowing targets tried for index streams, narrowest first.
///
/// Only types the sort kernels accept as keys are listed, which is why `Int8` and the
/// wide unsigned types are absent.
const INDEX_NARROWING_LADDER: [ScalarDType; 3] = [ScalarDType::UInt8, ScalarDType::Int16, ScalarDType::Int32];

impl ScalarDType {
    /// Smallest integer type that can hold every index into a dimension of `extent` rows.
    ///
    /// Returns `None` when `self` is not an index type or no strictly narrower type fits.
    /// The bound is exclusive on both sides: an extent equal to the target's maximum is
    /// rejected, so the narrowed key space never saturates.
    pub fn narrow_index(self, extent: u64) -> Option<Self> {
        if !INDEX_TYPES.contains(self) {
            return None;
        }

        INDEX_NARROWING_LADDER
            .into_iter()
            .filter(|target| target.bytes() < self.bytes())
            .find(|target| target.int_max().is_some_and(|max| extent < max))
    }
}
