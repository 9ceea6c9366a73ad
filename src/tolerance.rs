//! Tolerance evaluation
//!
//! A plan may under-spend or over-spend the requested amount within a
//! configured window. The residual is the signed relative deviation
//! `(actual - requested) / requested`; the window check allows a fixed
//! epsilon of 10⁻⁶ on both sides.

use crate::decimal::Decimal;
use crate::error::EngineError;
use crate::money::Money;

/// Scale at which residuals are computed.
const RESIDUAL_SCALE: u32 = 18;
/// Scale at which window comparisons are made.
const WINDOW_COMPARE_SCALE: u32 = 12;
/// Scale of the tolerance amplifier used for search pruning.
const AMPLIFIER_SCALE: u32 = 18;

/// Fixed slack applied on both window edges.
pub fn residual_epsilon() -> Decimal {
    Decimal::from_raw(1, 6)
}

/// Allowed under-/over-spend ratios, both in `[0, 1)`.
#[derive(Debug, Clone)]
pub struct ToleranceWindow {
    min_ratio: Decimal,
    max_ratio: Decimal,
}

impl ToleranceWindow {
    pub fn new(min_ratio: Decimal, max_ratio: Decimal) -> Result<Self, EngineError> {
        let one = Decimal::one(0);
        for ratio in [&min_ratio, &max_ratio] {
            if ratio.is_negative() || *ratio >= one {
                return Err(EngineError::InvalidInput(format!(
                    "tolerance ratio must be in [0, 1), got {ratio}"
                )));
            }
        }
        Ok(Self { min_ratio, max_ratio })
    }

    pub fn min_ratio(&self) -> &Decimal {
        &self.min_ratio
    }

    pub fn max_ratio(&self) -> &Decimal {
        &self.max_ratio
    }

    /// Signed relative deviation of `actual` from `requested`.
    pub fn residual(requested: &Money, actual: &Money) -> Result<Decimal, EngineError> {
        if requested.currency() != actual.currency() {
            return Err(EngineError::currency_mismatch(
                requested.currency(),
                actual.currency(),
            ));
        }
        if requested.is_zero() {
            return Err(EngineError::InvalidInput(
                "requested spend must not be zero".to_string(),
            ));
        }
        actual
            .amount()
            .sub(requested.amount())
            .div_with_scale(requested.amount(), RESIDUAL_SCALE)
    }

    /// Returns the residual when it falls inside the window (with epsilon
    /// slack), `None` otherwise.
    pub fn evaluate(
        &self,
        requested: &Money,
        actual: &Money,
    ) -> Result<Option<Decimal>, EngineError> {
        let residual = Self::residual(requested, actual)?;
        let epsilon = residual_epsilon();

        let upper = self
            .max_ratio
            .add(&epsilon)
            .with_scale(WINDOW_COMPARE_SCALE)?;
        let lower = self
            .min_ratio
            .add(&epsilon)
            .with_scale(WINDOW_COMPARE_SCALE)?;
        let compared = residual.with_scale(WINDOW_COMPARE_SCALE)?;

        if compared > upper {
            return Ok(None);
        }
        if compared.is_negative() && compared.abs() > lower {
            return Ok(None);
        }
        Ok(Some(residual))
    }
}

/// Pruning amplifier `1 / (1 - tolerance)` at scale 18. The tolerance is
/// clamped into `[0, 1 - 10⁻¹⁸]` so the amplifier stays finite.
pub fn tolerance_amplifier(tolerance: &Decimal) -> Result<Decimal, EngineError> {
    let zero = Decimal::zero(AMPLIFIER_SCALE);
    let one = Decimal::one(AMPLIFIER_SCALE);
    let ceiling = one.sub(&Decimal::from_raw(1, AMPLIFIER_SCALE));

    let clamped = tolerance.max(&zero).min(ceiling);
    let denominator = one.sub(&clamped);
    one.div_with_scale(&denominator, AMPLIFIER_SCALE)
}
