use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::income::IncomeSummary;
use crate::metrics::{DealInput, UnderwritingMetrics};
use crate::types::{ratio_or_zero, Money, Multiple, Percent};

const HUNDRED: Decimal = dec!(100);

pub const CONSERVATIVE_RENT_FACTOR: Decimal = dec!(0.95);
pub const CONSERVATIVE_VACANCY_DELTA_POINTS: Decimal = dec!(3);
pub const CONSERVATIVE_OPEX_FACTOR: Decimal = dec!(1.10);

pub const OPTIMISTIC_RENT_FACTOR: Decimal = dec!(1.05);
pub const OPTIMISTIC_VACANCY_DELTA_POINTS: Decimal = dec!(-2);
pub const OPTIMISTIC_VACANCY_FLOOR_PERCENT: Decimal = dec!(1);
pub const OPTIMISTIC_OPEX_FACTOR: Decimal = dec!(0.95);

/// Perturbation applied to the base case to form one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAdjustment {
    /// Multiplier on gross annual rent
    pub rent_factor: Decimal,
    /// Percentage points added to the vacancy rate
    pub vacancy_delta_points: Decimal,
    /// Lowest vacancy the scenario may assume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacancy_floor_percent: Option<Percent>,
    /// Multiplier on total operating expenses
    pub opex_factor: Decimal,
}

impl ScenarioAdjustment {
    pub fn conservative() -> Self {
        ScenarioAdjustment {
            rent_factor: CONSERVATIVE_RENT_FACTOR,
            vacancy_delta_points: CONSERVATIVE_VACANCY_DELTA_POINTS,
            vacancy_floor_percent: None,
            opex_factor: CONSERVATIVE_OPEX_FACTOR,
        }
    }

    pub fn optimistic() -> Self {
        ScenarioAdjustment {
            rent_factor: OPTIMISTIC_RENT_FACTOR,
            vacancy_delta_points: OPTIMISTIC_VACANCY_DELTA_POINTS,
            vacancy_floor_percent: Some(OPTIMISTIC_VACANCY_FLOOR_PERCENT),
            opex_factor: OPTIMISTIC_OPEX_FACTOR,
        }
    }

    fn adjust_vacancy(&self, vacancy_rate_percent: Percent) -> Percent {
        let mut adjusted = vacancy_rate_percent + self.vacancy_delta_points;
        if let Some(floor) = self.vacancy_floor_percent {
            adjusted = adjusted.max(floor);
        }
        adjusted.max(Decimal::ZERO).min(HUNDRED)
    }
}

/// Conservative and optimistic deltas used by [`generate_scenarios`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioPolicy {
    pub conservative: ScenarioAdjustment,
    pub optimistic: ScenarioAdjustment,
}

impl Default for ScenarioPolicy {
    fn default() -> Self {
        ScenarioPolicy {
            conservative: ScenarioAdjustment::conservative(),
            optimistic: ScenarioAdjustment::optimistic(),
        }
    }
}

/// Outcome of one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub gross_annual_rent: Money,
    pub vacancy_rate_percent: Percent,
    pub effective_gross_income: Money,
    pub total_operating_expenses: Money,
    pub noi: Money,
    pub annual_debt_service: Money,
    pub cash_flow: Money,
    pub cash_on_cash_percent: Percent,
    pub cap_rate_percent: Percent,
    pub dscr: Multiple,
}

/// Conservative / base / optimistic projections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub conservative: ScenarioResult,
    pub base: ScenarioResult,
    pub optimistic: ScenarioResult,
}

impl ScenarioSet {
    pub fn iter(&self) -> impl Iterator<Item = &ScenarioResult> {
        [&self.conservative, &self.base, &self.optimistic].into_iter()
    }
}

/// Vacancy that reproduces the base EGI from gross rent. For a rent roll
/// this is economic vacancy (vacancy loss / gross potential rent), so that
/// in-place rents below market are carried into every scenario.
fn base_vacancy(income: &IncomeSummary) -> Percent {
    match income.rent_roll {
        Some(_) => ratio_or_zero(income.vacancy_loss_annual, income.gross_annual_rent) * HUNDRED,
        None => income.vacancy_rate_percent,
    }
}

fn evaluate(
    name: &str,
    gross_annual_rent: Money,
    vacancy_rate_percent: Percent,
    total_operating_expenses: Money,
    deal: &DealInput,
    base: &UnderwritingMetrics,
) -> ScenarioResult {
    let effective_gross_income = gross_annual_rent * (Decimal::ONE - vacancy_rate_percent / HUNDRED);
    let noi = effective_gross_income - total_operating_expenses;
    let cash_flow = noi - base.annual_debt_service;

    ScenarioResult {
        name: name.to_string(),
        gross_annual_rent,
        vacancy_rate_percent,
        effective_gross_income,
        total_operating_expenses,
        noi,
        annual_debt_service: base.annual_debt_service,
        cash_flow,
        cash_on_cash_percent: ratio_or_zero(cash_flow, base.down_payment) * HUNDRED,
        cap_rate_percent: ratio_or_zero(noi, deal.purchase_price) * HUNDRED,
        dscr: ratio_or_zero(noi, base.annual_debt_service),
    }
}

fn apply(
    name: &str,
    adjustment: &ScenarioAdjustment,
    deal: &DealInput,
    income: &IncomeSummary,
    base: &UnderwritingMetrics,
) -> ScenarioResult {
    evaluate(
        name,
        income.gross_annual_rent * adjustment.rent_factor,
        adjustment.adjust_vacancy(base_vacancy(income)),
        base.total_operating_expenses * adjustment.opex_factor,
        deal,
        base,
    )
}

/// Project the base case under the policy's conservative and optimistic
/// deltas, holding annual debt service fixed.
pub fn generate_scenarios(
    deal: &DealInput,
    income: &IncomeSummary,
    base: &UnderwritingMetrics,
    policy: &ScenarioPolicy,
) -> ScenarioSet {
    let base_result = ScenarioResult {
        name: "base".to_string(),
        gross_annual_rent: base.gross_annual_rent,
        vacancy_rate_percent: base_vacancy(income),
        effective_gross_income: base.effective_gross_income,
        total_operating_expenses: base.total_operating_expenses,
        noi: base.noi,
        annual_debt_service: base.annual_debt_service,
        cash_flow: base.cash_flow,
        cash_on_cash_percent: base.cash_on_cash_percent,
        cap_rate_percent: base.cap_rate_percent,
        dscr: base.dscr,
    };

    ScenarioSet {
        conservative: apply("conservative", &policy.conservative, deal, income, base),
        base: base_result,
        optimistic: apply("optimistic", &policy.optimistic, deal, income, base),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debt_service::compute_debt_service;
    use crate::income::{
        aggregate_income, total_operating_expenses, ExpenseSource, IncomeSource, RentRollUnit,
        UnitStatus,
    };
    use crate::market::MarketDefaults;
    use crate::metrics::compute_underwriting;
    use pretty_assertions::assert_eq;

    fn scenarios_for(deal: &DealInput, source: IncomeSource) -> ScenarioSet {
        let income = aggregate_income(&source);
        let opex = total_operating_expenses(
            &ExpenseSource::from_deal(deal),
            income.effective_gross_income,
        );
        let debt = compute_debt_service(
            deal.purchase_price,
            deal.down_payment_percent,
            deal.interest_rate_percent,
            deal.loan_term_years,
        );
        let base = compute_underwriting(deal, &income, opex, &debt, &MarketDefaults::default());
        generate_scenarios(deal, &income, &base, &ScenarioPolicy::default())
    }

    fn cash_flowing_deal() -> DealInput {
        DealInput {
            purchase_price: dec!(600000),
            down_payment_percent: dec!(30),
            interest_rate_percent: dec!(6),
            loan_term_years: 30,
            gross_monthly_rent: dec!(6500),
            vacancy_rate_percent: dec!(5),
            operating_expense_ratio_percent: dec!(35),
            ..DealInput::default()
        }
    }

    #[test]
    fn test_conservative_deltas() {
        let deal = cash_flowing_deal();
        let set = scenarios_for(&deal, IncomeSource::from_deal(&deal));
        let c = &set.conservative;
        assert_eq!(c.gross_annual_rent, dec!(78000) * dec!(0.95));
        assert_eq!(c.vacancy_rate_percent, dec!(8));
        assert_eq!(c.total_operating_expenses, set.base.total_operating_expenses * dec!(1.10));
        assert_eq!(c.annual_debt_service, set.base.annual_debt_service);
        assert_eq!(c.noi, c.effective_gross_income - c.total_operating_expenses);
        assert_eq!(c.cash_flow, c.noi - c.annual_debt_service);
    }

    #[test]
    fn test_optimistic_vacancy_floor() {
        let deal = DealInput {
            vacancy_rate_percent: dec!(2),
            ..cash_flowing_deal()
        };
        let set = scenarios_for(&deal, IncomeSource::from_deal(&deal));
        assert_eq!(set.optimistic.vacancy_rate_percent, dec!(1));
        assert_eq!(set.optimistic.gross_annual_rent, dec!(78000) * dec!(1.05));

        let deal = DealInput {
            vacancy_rate_percent: dec!(7),
            ..cash_flowing_deal()
        };
        let set = scenarios_for(&deal, IncomeSource::from_deal(&deal));
        assert_eq!(set.optimistic.vacancy_rate_percent, dec!(5));
    }

    #[test]
    fn test_scenario_ordering_for_positive_cash_flow() {
        let deal = cash_flowing_deal();
        let set = scenarios_for(&deal, IncomeSource::from_deal(&deal));
        assert!(set.base.cash_flow > Decimal::ZERO, "base {}", set.base.cash_flow);
        assert!(set.conservative.cash_flow <= set.base.cash_flow);
        assert!(set.base.cash_flow <= set.optimistic.cash_flow);
        assert!(set.conservative.cash_on_cash_percent <= set.optimistic.cash_on_cash_percent);
    }

    #[test]
    fn test_ordering_holds_at_zero_vacancy() {
        let deal = DealInput {
            vacancy_rate_percent: Decimal::ZERO,
            ..cash_flowing_deal()
        };
        let set = scenarios_for(&deal, IncomeSource::from_deal(&deal));
        assert_eq!(set.optimistic.vacancy_rate_percent, dec!(1));
        assert!(set.base.cash_flow <= set.optimistic.cash_flow);
    }

    #[test]
    fn test_conservative_vacancy_capped() {
        let deal = DealInput {
            vacancy_rate_percent: dec!(99),
            ..cash_flowing_deal()
        };
        let set = scenarios_for(&deal, IncomeSource::from_deal(&deal));
        assert_eq!(set.conservative.vacancy_rate_percent, dec!(100));
        assert_eq!(set.conservative.effective_gross_income, Decimal::ZERO);
    }

    #[test]
    fn test_rent_roll_base_uses_economic_vacancy() {
        let deal = cash_flowing_deal();
        let units = vec![
            RentRollUnit {
                unit: Some("1A".into()),
                monthly_rent: dec!(1800),
                market_rent: dec!(2000),
                status: UnitStatus::Occupied,
            },
            RentRollUnit {
                unit: Some("1B".into()),
                monthly_rent: dec!(0),
                market_rent: dec!(2000),
                status: UnitStatus::Vacant,
            },
        ];
        let set = scenarios_for(&deal, IncomeSource::RentRoll { units });
        // GPR 48,000, actual 21,600 -> economic vacancy 55%
        assert_eq!(set.base.vacancy_rate_percent, dec!(55));
        assert_eq!(set.base.effective_gross_income, dec!(21600));
        assert_eq!(set.conservative.vacancy_rate_percent, dec!(58));
    }

    #[test]
    fn test_custom_policy() {
        let deal = cash_flowing_deal();
        let income = aggregate_income(&IncomeSource::from_deal(&deal));
        let opex = total_operating_expenses(
            &ExpenseSource::from_deal(&deal),
            income.effective_gross_income,
        );
        let debt = compute_debt_service(deal.purchase_price, dec!(30), dec!(6), 30);
        let base = compute_underwriting(&deal, &income, opex, &debt, &MarketDefaults::default());
        let flat = ScenarioAdjustment {
            rent_factor: Decimal::ONE,
            vacancy_delta_points: Decimal::ZERO,
            vacancy_floor_percent: None,
            opex_factor: Decimal::ONE,
        };
        let policy = ScenarioPolicy {
            conservative: flat.clone(),
            optimistic: flat,
        };
        let set = generate_scenarios(&deal, &income, &base, &policy);
        assert_eq!(set.conservative.noi, set.base.noi);
        assert_eq!(set.optimistic.cash_flow, set.base.cash_flow);
    }
}
