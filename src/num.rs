use alloy::primitives::U256;
use fastnum::{
    bint,
    decimal::{Context, RoundingMode, UnsignedDecimal},
};

/// Fixed-point to decimal converter.
#[derive(Clone, Copy, Debug, Default)]
pub struct Converter {
    decimals: i32,
}

impl Converter {
    pub(crate) const fn new(decimals: u8) -> Self {
        Self {
            decimals: decimals as i32,
        }
    }

    pub fn from_unsigned<const N: usize>(&self, value: U256) -> UnsignedDecimal<N> {
        self.checked_from_unsigned(value)
            .expect("Converter: U256 -> UInt::<N>")
    }

    /// Like [`Self::from_unsigned`], returning `None` when `value` does not
    /// fit `N` 64-bit digits. On-chain values are unbounded, so conversion
    /// into a narrow decimal must stay fallible.
    pub fn checked_from_unsigned<const N: usize>(&self, value: U256) -> Option<UnsignedDecimal<N>> {
        let unscaled = bint::UInt::<N>::from_le_slice(value.as_le_slice())?;
        Some(UnsignedDecimal::<N>::from_parts(
            unscaled,
            -self.decimals,
            Context::default().with_rounding_mode(RoundingMode::Floor),
        ))
    }

    /// Ratio of two raw fixed-point amounts sharing this converter's scale,
    /// kept to `decimals` fractional digits (floor). Returns `None` when the
    /// denominator is zero or the result does not fit the target decimal
    /// width.
    pub fn ratio<const N: usize>(
        &self,
        numerator: U256,
        denominator: U256,
    ) -> Option<UnsignedDecimal<N>> {
        if denominator.is_zero() {
            return None;
        }
        let scale = U256::from(10).pow(U256::from(self.decimals));
        let scaled = numerator.checked_mul(scale)?;
        self.checked_from_unsigned(scaled / denominator)
    }
}
