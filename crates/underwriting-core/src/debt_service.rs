use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::UnderwritingError;
use crate::types::{Money, Percent};
use crate::UnderwritingResult;

const MONTHS_PER_YEAR: Decimal = dec!(12);
const HUNDRED: Decimal = dec!(100);

/// Longest loan term accepted, in years.
pub const MAX_LOAN_TERM_YEARS: u32 = 100;
/// Highest annual interest rate accepted, in percent.
pub const MAX_INTEREST_RATE_PERCENT: Decimal = dec!(1000);

/// Financing terms derived from a deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebtService {
    pub down_payment: Money,
    pub loan_amount: Money,
    /// Monthly periodic rate as a fraction (6% annual = 0.005)
    pub monthly_rate: Decimal,
    pub total_payments: u32,
    pub monthly_payment: Money,
    pub annual_debt_service: Money,
}

/// One year of an amortisation schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmortizationYear {
    pub year: u32,
    pub interest_paid: Money,
    pub principal_paid: Money,
    pub ending_balance: Money,
}

/// `price * down% / 100`
pub fn down_payment(purchase_price: Money, down_payment_percent: Percent) -> Money {
    purchase_price * down_payment_percent / HUNDRED
}

/// `price * (1 - down% / 100)`, never negative (a down payment above 100%
/// means no loan, not a negative one).
pub fn loan_amount(purchase_price: Money, down_payment_percent: Percent) -> Money {
    (purchase_price - down_payment(purchase_price, down_payment_percent)).max(Decimal::ZERO)
}

/// Monthly periodic rate from an annual nominal percentage.
pub fn monthly_rate(interest_rate_percent: Percent) -> Decimal {
    interest_rate_percent / HUNDRED / MONTHS_PER_YEAR
}

/// Reject loan terms the payment maths cannot evaluate meaningfully.
pub fn check_loan_terms(
    interest_rate_percent: Percent,
    loan_term_years: u32,
) -> UnderwritingResult<()> {
    if interest_rate_percent < Decimal::ZERO {
        return Err(UnderwritingError::InvalidInput {
            field: "interest_rate_percent".into(),
            reason: "Interest rate cannot be negative".into(),
        });
    }
    if interest_rate_percent > MAX_INTEREST_RATE_PERCENT {
        return Err(UnderwritingError::InvalidInput {
            field: "interest_rate_percent".into(),
            reason: format!("Interest rate cannot exceed {MAX_INTEREST_RATE_PERCENT}%"),
        });
    }
    if loan_term_years == 0 || loan_term_years > MAX_LOAN_TERM_YEARS {
        return Err(UnderwritingError::InvalidInput {
            field: "loan_term_years".into(),
            reason: format!("Loan term must be between 1 and {MAX_LOAN_TERM_YEARS} years"),
        });
    }
    Ok(())
}

/// `base^exp` by squaring; `None` once the result exceeds `Decimal::MAX`.
fn checked_powu(base: Decimal, exp: u32) -> Option<Decimal> {
    let mut result = Decimal::ONE;
    let mut base = base;
    let mut exp = exp;
    while exp > 0 {
        if exp & 1 == 1 {
            result = result.checked_mul(base)?;
        }
        exp >>= 1;
        if exp > 0 {
            base = base.checked_mul(base)?;
        }
    }
    Some(result)
}

/// Standard fixed-rate payment: P * r(1+r)^n / ((1+r)^n - 1).
///
/// A zero rate amortises straight-line; a zero loan or zero payment count
/// yields a zero payment. When `(1+r)^n` is too large to represent the
/// payment is its limit, interest only (`P * r`).
pub fn monthly_payment(principal: Money, monthly_rate: Decimal, total_payments: u32) -> Money {
    if principal <= Decimal::ZERO || total_payments == 0 {
        return Decimal::ZERO;
    }
    if monthly_rate.is_zero() {
        return principal / Decimal::from(total_payments);
    }

    let Some(compound) = checked_powu(Decimal::ONE + monthly_rate, total_payments) else {
        return principal * monthly_rate;
    };

    let denominator = compound - Decimal::ONE;
    if denominator.is_zero() {
        return principal / Decimal::from(total_payments);
    }
    principal * monthly_rate * (compound / denominator)
}

/// Debt service for a purchase at the given leverage and loan terms.
pub fn compute_debt_service(
    purchase_price: Money,
    down_payment_percent: Percent,
    interest_rate_percent: Percent,
    loan_term_years: u32,
) -> DebtService {
    let loan = loan_amount(purchase_price, down_payment_percent);
    let rate = monthly_rate(interest_rate_percent);
    let total_payments = loan_term_years.saturating_mul(12);
    let payment = monthly_payment(loan, rate, total_payments);

    DebtService {
        down_payment: down_payment(purchase_price, down_payment_percent),
        loan_amount: loan,
        monthly_rate: rate,
        total_payments,
        monthly_payment: payment,
        annual_debt_service: payment * MONTHS_PER_YEAR,
    }
}

/// Outstanding principal after `payments_made` level payments.
pub fn remaining_balance(
    principal: Money,
    monthly_rate: Decimal,
    total_payments: u32,
    payments_made: u32,
) -> Money {
    let payment = monthly_payment(principal, monthly_rate, total_payments);
    let mut balance = principal.max(Decimal::ZERO);
    for _ in 0..payments_made.min(total_payments) {
        let interest = balance * monthly_rate;
        balance -= payment - interest;
    }
    if payments_made >= total_payments {
        Decimal::ZERO
    } else {
        balance.max(Decimal::ZERO)
    }
}

/// Year-by-year interest, principal and ending balance over the full term.
pub fn amortization_schedule(
    principal: Money,
    monthly_rate: Decimal,
    total_payments: u32,
) -> Vec<AmortizationYear> {
    let payment = monthly_payment(principal, monthly_rate, total_payments);
    let mut balance = principal.max(Decimal::ZERO);
    let mut schedule = Vec::with_capacity((total_payments / 12 + 1) as usize);

    let mut month = 0u32;
    let mut year = 0u32;
    while month < total_payments {
        year += 1;
        let mut interest_paid = Decimal::ZERO;
        let mut principal_paid = Decimal::ZERO;
        for _ in 0..12 {
            if month >= total_payments {
                break;
            }
            month += 1;
            let interest = balance * monthly_rate;
            let mut principal_part = payment - interest;
            // Final payment retires whatever rounding left behind
            if month == total_payments {
                principal_part = balance;
            }
            interest_paid += interest;
            principal_paid += principal_part;
            balance -= principal_part;
        }
        schedule.push(AmortizationYear {
            year,
            interest_paid,
            principal_paid,
            ending_balance: balance.max(Decimal::ZERO),
        });
    }

    schedule
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_thirty_year_mortgage() {
        let ds = compute_debt_service(dec!(300000), dec!(25), dec!(6), 30);
        assert_eq!(ds.loan_amount, dec!(225000));
        assert_eq!(ds.monthly_rate, dec!(0.005));
        assert_eq!(ds.total_payments, 360);
        assert!(
            (ds.monthly_payment - dec!(1349.02)).abs() < dec!(0.05),
            "Expected ~1349.02, got {}",
            ds.monthly_payment
        );
        assert!(
            (ds.monthly_payment - dec!(1348.99)).abs() < dec!(0.01),
            "Expected 1348.99 to the cent, got {}",
            ds.monthly_payment
        );
        assert!(
            (ds.annual_debt_service - dec!(16188.24)).abs() < dec!(0.5),
            "Expected ~16188.24, got {}",
            ds.annual_debt_service
        );
    }

    #[test]
    fn test_zero_rate_is_straight_line() {
        let ds = compute_debt_service(dec!(240000), dec!(25), Decimal::ZERO, 15);
        assert_eq!(ds.monthly_payment, dec!(180000) / dec!(180));
        assert_eq!(ds.monthly_payment, dec!(1000));
        assert_eq!(ds.annual_debt_service, dec!(12000));
    }

    #[test]
    fn test_all_cash_purchase_has_no_payment() {
        let ds = compute_debt_service(dec!(400000), dec!(100), dec!(7), 30);
        assert_eq!(ds.loan_amount, Decimal::ZERO);
        assert_eq!(ds.monthly_payment, Decimal::ZERO);
        assert_eq!(ds.annual_debt_service, Decimal::ZERO);
    }

    #[test]
    fn test_down_payment_over_100_does_not_go_negative() {
        let ds = compute_debt_service(dec!(100000), dec!(120), dec!(5), 30);
        assert_eq!(ds.down_payment, dec!(120000));
        assert_eq!(ds.loan_amount, Decimal::ZERO);
    }

    #[test]
    fn test_zero_term_yields_zero_payment() {
        assert_eq!(monthly_payment(dec!(100000), dec!(0.005), 0), Decimal::ZERO);
    }

    #[test]
    fn test_remaining_balance_endpoints() {
        let r = dec!(0.005);
        assert_eq!(remaining_balance(dec!(225000), r, 360, 0), dec!(225000));
        assert_eq!(remaining_balance(dec!(225000), r, 360, 360), Decimal::ZERO);
        let after_five_years = remaining_balance(dec!(225000), r, 360, 60);
        assert!(
            (after_five_years - dec!(209372.30)).abs() < dec!(0.01),
            "Expected ~209,372.30, got {after_five_years}"
        );
    }

    #[test]
    fn test_amortization_schedule_retires_loan() {
        let schedule = amortization_schedule(dec!(225000), dec!(0.005), 360);
        assert_eq!(schedule.len(), 30);
        assert_eq!(schedule.last().unwrap().ending_balance, Decimal::ZERO);
        let principal: Decimal = schedule.iter().map(|y| y.principal_paid).sum();
        assert!((principal - dec!(225000)).abs() < dec!(0.0001));
        // Early years are interest-heavy
        assert!(schedule[0].interest_paid > schedule[0].principal_paid);
        assert!(schedule[29].interest_paid < schedule[29].principal_paid);
    }

    #[test]
    fn test_extreme_rate_converges_to_interest_only() {
        // 300% annual: (1 + 0.25)^360 is far beyond Decimal range
        let ds = compute_debt_service(dec!(300000), dec!(25), dec!(300), 30);
        assert_eq!(ds.monthly_rate, dec!(0.25));
        assert_eq!(ds.monthly_payment, dec!(225000) * dec!(0.25));
        let schedule = amortization_schedule(ds.loan_amount, ds.monthly_rate, ds.total_payments);
        assert_eq!(schedule.len(), 30);
        assert_eq!(schedule[29].ending_balance, Decimal::ZERO);
        let balance = remaining_balance(ds.loan_amount, ds.monthly_rate, ds.total_payments, 120);
        assert!(balance > Decimal::ZERO);
    }

    #[test]
    fn test_loan_term_and_rate_bounds() {
        assert!(check_loan_terms(dec!(6), 30).is_ok());
        assert!(check_loan_terms(dec!(300), MAX_LOAN_TERM_YEARS).is_ok());
        assert!(check_loan_terms(dec!(6), 0).is_err());
        assert!(check_loan_terms(dec!(6), MAX_LOAN_TERM_YEARS + 1).is_err());
        assert!(check_loan_terms(dec!(-1), 30).is_err());
        assert!(check_loan_terms(dec!(1000.01), 30).is_err());
    }

    #[test]
    fn test_checked_powu_matches_repeated_multiplication() {
        let base = dec!(1.005);
        let mut repeated = Decimal::ONE;
        for _ in 0..37 {
            repeated *= base;
        }
        let squared = checked_powu(base, 37).unwrap();
        assert!((squared - repeated).abs() < dec!(0.000000000001));
        assert_eq!(checked_powu(base, 0), Some(Decimal::ONE));
        assert_eq!(checked_powu(dec!(1.25), 360), None);
    }

    #[test]
    fn test_partial_final_year() {
        let schedule = amortization_schedule(dec!(12000), Decimal::ZERO, 18);
        assert_eq!(schedule.len(), 2);
        assert!((schedule[0].principal_paid - dec!(8000)).abs() < dec!(0.000001));
        assert!((schedule[1].principal_paid - dec!(4000)).abs() < dec!(0.000001));
        assert_eq!(schedule[1].ending_balance, Decimal::ZERO);
    }
}
