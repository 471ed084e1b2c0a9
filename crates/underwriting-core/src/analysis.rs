use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

use crate::debt_service::{check_loan_terms, compute_debt_service, DebtService};
use crate::error::UnderwritingError;
use crate::income::{
    aggregate_income, total_operating_expenses, ExpenseSource, IncomeSource, IncomeSummary,
    OperatingExpenseLine, RentRollUnit,
};
use crate::market::MarketDefaults;
use crate::metrics::{compute_underwriting, DealInput, UnderwritingMetrics};
use crate::normalize::{normalize_deal, RawDealInput};
use crate::scenarios::{generate_scenarios, ScenarioSet};
use crate::types::{ratio_or_zero, with_metadata, ComputationOutput};
use crate::UnderwritingResult;

const HUNDRED: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A fully typed underwriting request with explicit income and expense modes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingRequest {
    pub deal: DealInput,
    pub income: IncomeSource,
    pub expenses: ExpenseSource,
}

impl UnderwritingRequest {
    /// Manual income and ratio expenses, both read from the deal itself.
    pub fn from_deal(deal: DealInput) -> Self {
        UnderwritingRequest {
            income: IncomeSource::from_deal(&deal),
            expenses: ExpenseSource::from_deal(&deal),
            deal,
        }
    }
}

/// Request as captured from a deal-entry form: raw deal fields plus an
/// optional rent roll and itemised P&L.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawUnderwritingRequest {
    pub deal: RawDealInput,
    pub rent_roll: Vec<RentRollUnit>,
    pub expense_lines: Vec<OperatingExpenseLine>,
}

/// Complete underwriting for one deal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnderwritingReport {
    #[serde(flatten)]
    pub metrics: UnderwritingMetrics,
    pub expense_mode: String,
    pub income: IncomeSummary,
    pub debt_service: DebtService,
    pub scenarios: ScenarioSet,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Underwrite a deal: debt service, income, expenses, metrics and scenarios.
///
/// Structurally invalid requests (negative prices, percentages outside
/// 0–100, a zero loan term) are rejected. Numeric edge cases such as zero
/// denominators are not errors; they evaluate to zero and may add warnings.
pub fn underwrite(
    request: &UnderwritingRequest,
    defaults: &MarketDefaults,
) -> UnderwritingResult<ComputationOutput<UnderwritingReport>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    validate_request(request, &mut warnings)?;

    let report = build_report(request, defaults);
    flag_risks(&report, &mut warnings);

    debug!(
        income_mode = report.income.mode.as_str(),
        expense_mode = report.expense_mode.as_str(),
        noi = %report.metrics.noi,
        cash_flow = %report.metrics.cash_flow,
        "underwriting computed"
    );

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "Income Property Underwriting (NOI / Cap Rate / DSCR)",
        request,
        warnings,
        elapsed,
        report,
    ))
}

/// Normalise a raw form request, then underwrite it. Normalisation warnings
/// lead the output warning list.
pub fn underwrite_raw(
    raw: &RawUnderwritingRequest,
    defaults: &MarketDefaults,
) -> UnderwritingResult<ComputationOutput<UnderwritingReport>> {
    let (request, parse_warnings) = resolve_raw_request(raw, defaults);
    let mut output = underwrite(&request, defaults)?;
    let mut warnings: Vec<String> = parse_warnings;
    warnings.append(&mut output.warnings);
    output.warnings = warnings;
    Ok(output)
}

/// Turn a raw form request into an explicit request. A non-empty rent roll
/// selects rent-roll income; non-empty expense lines select itemised
/// expenses. Returns the request and any normalisation warnings.
pub fn resolve_raw_request(
    raw: &RawUnderwritingRequest,
    defaults: &MarketDefaults,
) -> (UnderwritingRequest, Vec<String>) {
    let normalized = normalize_deal(&raw.deal, defaults);
    let deal = normalized.deal;
    let income = IncomeSource::from_rent_roll_or_deal(raw.rent_roll.clone(), &deal);
    let expenses = if raw.expense_lines.is_empty() {
        ExpenseSource::from_deal(&deal)
    } else {
        ExpenseSource::Itemized {
            lines: raw.expense_lines.clone(),
        }
    };
    let warnings = normalized.warnings.iter().map(|w| w.to_string()).collect();
    (
        UnderwritingRequest {
            deal,
            income,
            expenses,
        },
        warnings,
    )
}

/// Run the calculation pipeline without validation or envelope.
pub fn build_report(request: &UnderwritingRequest, defaults: &MarketDefaults) -> UnderwritingReport {
    let deal = &request.deal;
    let debt = compute_debt_service(
        deal.purchase_price,
        deal.down_payment_percent,
        deal.interest_rate_percent,
        deal.loan_term_years,
    );
    let income = aggregate_income(&request.income);
    let opex = total_operating_expenses(&request.expenses, income.effective_gross_income);
    let metrics = compute_underwriting(deal, &income, opex, &debt, defaults);
    let scenarios = generate_scenarios(deal, &income, &metrics, &defaults.scenario_policy);

    UnderwritingReport {
        metrics,
        expense_mode: request.expenses.mode().to_string(),
        income,
        debt_service: debt,
        scenarios,
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> UnderwritingError {
    UnderwritingError::InvalidInput {
        field: field.into(),
        reason: reason.into(),
    }
}

fn check_percent(field: &str, value: Decimal) -> UnderwritingResult<()> {
    if value < Decimal::ZERO || value > HUNDRED {
        return Err(invalid(field, "Percentage must be between 0 and 100"));
    }
    Ok(())
}

fn validate_request(
    request: &UnderwritingRequest,
    warnings: &mut Vec<String>,
) -> UnderwritingResult<()> {
    let deal = &request.deal;

    if deal.purchase_price < Decimal::ZERO {
        return Err(invalid("purchase_price", "Purchase price cannot be negative"));
    }
    if deal.down_payment_percent < Decimal::ZERO {
        return Err(invalid(
            "down_payment_percent",
            "Down payment cannot be negative",
        ));
    }
    check_loan_terms(deal.interest_rate_percent, deal.loan_term_years)?;
    if let Some(closing) = deal.closing_cost_percent {
        check_percent("closing_cost_percent", closing)?;
    }

    match &request.income {
        IncomeSource::Manual {
            gross_monthly_rent,
            vacancy_rate_percent,
        } => {
            if *gross_monthly_rent < Decimal::ZERO {
                return Err(invalid(
                    "gross_monthly_rent",
                    "Gross monthly rent cannot be negative",
                ));
            }
            check_percent("vacancy_rate_percent", *vacancy_rate_percent)?;
        }
        IncomeSource::RentRoll { units } => {
            for (i, unit) in units.iter().enumerate() {
                if unit.monthly_rent < Decimal::ZERO {
                    return Err(invalid(
                        format!("rent_roll[{i}].monthly_rent"),
                        "Rent cannot be negative",
                    ));
                }
                if unit.market_rent < Decimal::ZERO {
                    return Err(invalid(
                        format!("rent_roll[{i}].market_rent"),
                        "Market rent cannot be negative",
                    ));
                }
            }
            if units.is_empty() {
                warnings.push("Rent roll is empty — income evaluates to zero".into());
            }
        }
    }

    match &request.expenses {
        ExpenseSource::Ratio { percent } => {
            check_percent("operating_expense_ratio_percent", *percent)?;
            if deal.has_expense_overrides() {
                warnings.push(
                    "Itemised expense overrides are ignored in ratio expense mode".into(),
                );
            }
        }
        ExpenseSource::Itemized { lines } => {
            for line in lines.iter().filter(|l| l.annual_amount < Decimal::ZERO) {
                warnings.push(format!(
                    "Expense line '{}' is negative ({}) and reduces total expenses",
                    line.category, line.annual_amount
                ));
            }
        }
    }

    if deal.down_payment_percent > HUNDRED {
        warnings.push(format!(
            "Down payment of {}% exceeds the purchase price",
            deal.down_payment_percent
        ));
    }

    Ok(())
}

fn flag_risks(report: &UnderwritingReport, warnings: &mut Vec<String>) {
    let m = &report.metrics;

    if m.dscr > Decimal::ZERO && m.dscr < dec!(1.2) {
        warnings.push(format!(
            "DSCR of {:.2} is below 1.20x — lender covenant risk",
            m.dscr
        ));
    }

    if m.cash_flow < Decimal::ZERO {
        warnings.push(format!(
            "Negative annual cash flow of {:.0} after debt service",
            m.cash_flow
        ));
    }

    if m.ltv_percent > dec!(80) {
        warnings.push(format!(
            "LTV of {:.1}% exceeds 80% — high leverage",
            m.ltv_percent
        ));
    }

    let uncapped = ratio_or_zero(
        m.total_operating_expenses + m.annual_debt_service,
        m.gross_annual_rent,
    ) * HUNDRED;
    if uncapped > HUNDRED {
        warnings.push(format!(
            "Expenses and debt service exceed gross rent (break-even {:.1}%, reported as 100%)",
            uncapped
        ));
    }
}
