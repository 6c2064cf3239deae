use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal_macros::dec;

use crate::error::ProjectionError;
use crate::types::{Money, Rate};
use crate::ProjectionResult;

const CONVERGENCE_THRESHOLD: Decimal = dec!(0.0000001);
const STEP_THRESHOLD: Decimal = dec!(0.0000000001);
const MAX_IRR_ITERATIONS: u32 = 100;
const MAX_BISECTION_ITERATIONS: u32 = 200;

/// Lowest and highest rates the IRR solvers will consider.
const IRR_FLOOR: Rate = dec!(-0.99);
const IRR_CEILING: Rate = dec!(10);

/// Growth factor `(1 + rate)^periods`.
pub fn growth_factor(rate: Rate, periods: u32) -> ProjectionResult<Decimal> {
    (Decimal::ONE + rate)
        .checked_powu(u64::from(periods))
        .ok_or_else(|| ProjectionError::overflow(format!("growth factor (1 + {rate})^{periods}")))
}

/// Compound `value` at `rate` for `periods` periods.
pub fn compound(value: Money, rate: Rate, periods: u32) -> ProjectionResult<Money> {
    let factor = growth_factor(rate, periods)?;
    value
        .checked_mul(factor)
        .ok_or_else(|| ProjectionError::overflow("compounded value"))
}

/// Sum of `terms`; `Overflow` names `context` when the total does not fit.
pub fn checked_sum(context: &str, terms: &[Money]) -> ProjectionResult<Money> {
    terms.iter().try_fold(Decimal::ZERO, |acc, term| {
        acc.checked_add(*term)
            .ok_or_else(|| ProjectionError::overflow(context))
    })
}

/// `value * rate`, with the same overflow reporting as [`checked_sum`].
pub fn checked_scale(context: &str, value: Money, rate: Rate) -> ProjectionResult<Money> {
    value
        .checked_mul(rate)
        .ok_or_else(|| ProjectionError::overflow(context))
}

/// Net Present Value of a series of cash flows
pub fn npv(rate: Rate, cash_flows: &[Money]) -> ProjectionResult<Money> {
    if rate <= dec!(-1) {
        return Err(ProjectionError::InvalidInput {
            field: "rate".into(),
            reason: "Discount rate must be greater than -100%".into(),
        });
    }
    npv_and_derivative(cash_flows, rate).map(|(value, _)| value)
}

/// Payment (PMT) for a fully amortizing annuity, spreadsheet sign convention:
/// a positive present value yields a negative payment.
pub fn pmt(
    rate: Rate,
    nper: u32,
    present_value: Money,
    future_value: Money,
) -> ProjectionResult<Money> {
    if nper == 0 {
        return Err(ProjectionError::InvalidInput {
            field: "nper".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }

    if rate.is_zero() {
        return Ok(-(present_value + future_value) / Decimal::from(nper));
    }

    let factor = growth_factor(rate, nper)?;
    let annuity_factor = (factor - Decimal::ONE) / rate;

    if annuity_factor.is_zero() {
        return Err(ProjectionError::DivisionByZero {
            context: "PMT annuity factor".into(),
        });
    }

    let numerator = present_value
        .checked_mul(factor)
        .and_then(|v| v.checked_add(future_value))
        .ok_or_else(|| ProjectionError::overflow("PMT numerator"))?;
    Ok(-numerator / annuity_factor)
}

/// Internal Rate of Return.
///
/// Newton-Raphson from `guess`; when Newton stalls, diverges or overflows the
/// root is bracketed on [-99%, 1000%] and bisected. Cash flows without a sign
/// change have no IRR and are rejected up front.
pub fn irr(cash_flows: &[Money], guess: Rate) -> ProjectionResult<Rate> {
    if cash_flows.len() < 2 {
        return Err(ProjectionError::InsufficientData(
            "IRR requires at least 2 cash flows".into(),
        ));
    }

    let has_inflow = cash_flows.iter().any(|cf| *cf > Decimal::ZERO);
    let has_outflow = cash_flows.iter().any(|cf| *cf < Decimal::ZERO);
    if !(has_inflow && has_outflow) {
        return Err(ProjectionError::InsufficientData(
            "IRR requires both positive and negative cash flows".into(),
        ));
    }

    match newton_irr(cash_flows, guess) {
        Ok(rate) => Ok(rate),
        Err(newton_err) => bisection_irr(cash_flows).map_err(|_| newton_err),
    }
}

fn newton_irr(cash_flows: &[Money], guess: Rate) -> ProjectionResult<Rate> {
    let mut rate = guess;
    let mut last_delta = Decimal::MAX;

    for i in 0..MAX_IRR_ITERATIONS {
        let (npv_val, dnpv) = npv_and_derivative(cash_flows, rate)?;
        last_delta = npv_val;

        if npv_val.abs() < CONVERGENCE_THRESHOLD {
            return Ok(rate);
        }

        if dnpv.is_zero() {
            return Err(ProjectionError::ConvergenceFailure {
                function: "IRR".into(),
                iterations: i,
                last_delta: npv_val,
            });
        }

        let step = npv_val
            .checked_div(dnpv)
            .ok_or_else(|| ProjectionError::overflow("IRR Newton step"))?;
        rate -= step;

        // Guard against divergence
        rate = rate.clamp(IRR_FLOOR, IRR_CEILING);

        if step.abs() < STEP_THRESHOLD {
            return Ok(rate);
        }
    }

    Err(ProjectionError::ConvergenceFailure {
        function: "IRR".into(),
        iterations: MAX_IRR_ITERATIONS,
        last_delta,
    })
}

fn bisection_irr(cash_flows: &[Money]) -> ProjectionResult<Rate> {
    let mut lo = IRR_FLOOR;
    let mut hi = IRR_CEILING;
    let mut sign_lo = npv_sign(cash_flows, lo)?;
    let sign_hi = npv_sign(cash_flows, hi)?;

    if sign_lo == 0 {
        return Ok(lo);
    }
    if sign_hi == 0 {
        return Ok(hi);
    }
    if sign_lo == sign_hi {
        return Err(ProjectionError::ConvergenceFailure {
            function: "IRR (bisection)".into(),
            iterations: 0,
            last_delta: Decimal::ZERO,
        });
    }

    for _ in 0..MAX_BISECTION_ITERATIONS {
        let mid = (lo + hi) / dec!(2);
        let sign_mid = npv_sign(cash_flows, mid)?;
        if sign_mid == 0 || (hi - lo).abs() < STEP_THRESHOLD {
            return Ok(mid);
        }
        if sign_mid == sign_lo {
            lo = mid;
            sign_lo = sign_mid;
        } else {
            hi = mid;
        }
    }

    Ok((lo + hi) / dec!(2))
}

/// NPV(r) = sum CF_t / (1+r)^t and its derivative d(NPV)/dr.
fn npv_and_derivative(cash_flows: &[Money], rate: Rate) -> ProjectionResult<(Decimal, Decimal)> {
    let one_plus_r = Decimal::ONE + rate;
    if one_plus_r <= Decimal::ZERO {
        return Err(ProjectionError::DivisionByZero {
            context: "NPV discount factor".into(),
        });
    }

    let overflow = || ProjectionError::overflow(format!("NPV at rate {rate}"));
    let mut npv = Decimal::ZERO;
    let mut dnpv = Decimal::ZERO;
    let mut discount = Decimal::ONE; // (1+r)^-t

    for (t, cf) in cash_flows.iter().enumerate() {
        let pv = cf.checked_mul(discount).ok_or_else(overflow)?;
        npv = npv.checked_add(pv).ok_or_else(overflow)?;
        if t > 0 {
            // d/dr of CF_t / (1+r)^t = -t * CF_t / (1+r)^(t+1)
            let slope = pv
                .checked_mul(Decimal::from(t as u64))
                .and_then(|v| v.checked_div(one_plus_r))
                .ok_or_else(overflow)?;
            dnpv = dnpv.checked_sub(slope).ok_or_else(overflow)?;
        }
        discount = discount.checked_div(one_plus_r).ok_or_else(overflow)?;
    }

    Ok((npv, dnpv))
}

/// Sign of NPV(r) without overflowing for deeply negative rates.
///
/// For r < 0 the sum is scaled by the positive factor (1+r)^n and evaluated
/// in Horner form, so every intermediate power is at most one.
fn npv_sign(cash_flows: &[Money], rate: Rate) -> ProjectionResult<i8> {
    let one_plus_r = Decimal::ONE + rate;
    let value = if one_plus_r < Decimal::ONE {
        cash_flows.iter().try_fold(Decimal::ZERO, |acc, cf| {
            acc.checked_mul(one_plus_r)
                .and_then(|v| v.checked_add(*cf))
                .ok_or_else(|| ProjectionError::overflow("scaled NPV"))
        })?
    } else {
        npv_and_derivative(cash_flows, rate)?.0
    };

    Ok(if value.is_zero() {
        0
    } else if value.is_sign_positive() {
        1
    } else {
        -1
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_npv_basic() {
        let cfs = vec![dec!(-1000), dec!(300), dec!(400), dec!(500)];
        let result = npv(dec!(0.10), &cfs).unwrap();
        // NPV at 10%: -1000 + 300/1.1 + 400/1.21 + 500/1.331 ≈ -21.04
        assert!((result - dec!(-21.04)).abs() < dec!(1.0));
    }

    #[test]
    fn test_npv_zero_rate() {
        let cfs = vec![dec!(-100), dec!(50), dec!(50), dec!(50)];
        let result = npv(dec!(0.0), &cfs).unwrap();
        assert_eq!(result, dec!(50));
    }

    #[test]
    fn test_irr_basic() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        // IRR should be ~9.7%
        assert!((result - dec!(0.097)).abs() < dec!(0.01));
    }

    #[test]
    fn test_irr_negative_rate() {
        // Lose half the stake over two years => (0.5)^(1/2) - 1 ≈ -29.3%
        let cfs = vec![dec!(-1000), dec!(0), dec!(500)];
        let result = irr(&cfs, dec!(0.10)).unwrap();
        assert!((result - dec!(-0.2929)).abs() < dec!(0.001));
    }

    #[test]
    fn test_irr_rejects_one_signed_flows() {
        let all_positive = vec![dec!(100), dec!(50), dec!(50)];
        assert!(irr(&all_positive, dec!(0.10)).is_err());

        let all_negative = vec![dec!(-100), dec!(-50)];
        assert!(irr(&all_negative, dec!(0.10)).is_err());
    }

    #[test]
    fn test_irr_requires_two_flows() {
        assert!(matches!(
            irr(&[dec!(-100)], dec!(0.10)),
            Err(ProjectionError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_irr_long_horizon_does_not_overflow() {
        // Heavy early losses over a 60-year horizon push Newton towards -99%,
        // where (1+r)^-t would overflow.
        let mut cfs = vec![dec!(-100000)];
        cfs.extend(std::iter::repeat(dec!(-5000)).take(58));
        cfs.push(dec!(1000));
        let result = irr(&cfs, dec!(0.10));
        if let Ok(rate) = result {
            assert!(rate >= IRR_FLOOR && rate <= IRR_CEILING);
        }
    }

    #[test]
    fn test_bisection_matches_newton() {
        let cfs = vec![dec!(-1000), dec!(400), dec!(400), dec!(400)];
        let newton = newton_irr(&cfs, dec!(0.10)).unwrap();
        let bisect = bisection_irr(&cfs).unwrap();
        assert!((newton - bisect).abs() < dec!(0.000001));
    }

    #[test]
    fn test_pmt_mortgage() {
        // 120,000 over 300 months at 3.5% / 12 ≈ 600.75 per month
        let monthly = dec!(0.035) / dec!(12);
        let payment = pmt(monthly, 300, dec!(-120000), Decimal::ZERO).unwrap();
        assert!((payment - dec!(600.75)).abs() < dec!(0.05));
    }

    #[test]
    fn test_pmt_zero_rate_is_straight_line() {
        let payment = pmt(Decimal::ZERO, 10, dec!(-1000), Decimal::ZERO).unwrap();
        assert_eq!(payment, dec!(100));
    }

    #[test]
    fn test_pmt_zero_periods_rejected() {
        assert!(pmt(dec!(0.01), 0, dec!(-1000), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_compound_growth_and_decline() {
        assert_eq!(compound(dec!(100), dec!(0.10), 2).unwrap(), dec!(121));
        assert_eq!(compound(dec!(100), dec!(-0.10), 2).unwrap(), dec!(81));
        assert_eq!(growth_factor(dec!(0.02), 0).unwrap(), Decimal::ONE);
    }

    #[test]
    fn test_checked_sum_reports_overflow() {
        assert_eq!(checked_sum("charges", &[dec!(1), dec!(2), dec!(-0.5)]).unwrap(), dec!(2.5));
        assert!(matches!(
            checked_sum("charges", &[Decimal::MAX, Decimal::ONE]),
            Err(ProjectionError::Overflow { context }) if context == "charges"
        ));
        assert!(checked_scale("tax", Decimal::MAX, dec!(1.172)).is_err());
        assert_eq!(checked_scale("tax", dec!(1000), dec!(0.3)).unwrap(), dec!(300));
    }
}
