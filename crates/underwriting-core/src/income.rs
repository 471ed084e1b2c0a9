use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::market::MarketDefaults;
use crate::metrics::DealInput;
use crate::types::{ratio_or_zero, round_whole, Money, Percent};

const MONTHS_PER_YEAR: Decimal = dec!(12);
const HUNDRED: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lease status of a rent-roll unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitStatus {
    Occupied,
    Vacant,
    /// Tenant has given notice; not counted as occupied income.
    Notice,
}

/// One line of a rent roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentRollUnit {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// In-place contract rent per month
    pub monthly_rent: Money,
    /// Market rent per month
    pub market_rent: Money,
    pub status: UnitStatus,
}

/// One itemised operating expense. The annual amount is the stored value;
/// the monthly amount is always derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatingExpenseLine {
    pub category: String,
    pub annual_amount: Money,
}

impl OperatingExpenseLine {
    pub fn annual(category: impl Into<String>, annual_amount: Money) -> Self {
        OperatingExpenseLine {
            category: category.into(),
            annual_amount,
        }
    }

    pub fn monthly(category: impl Into<String>, monthly_amount: Money) -> Self {
        OperatingExpenseLine {
            category: category.into(),
            annual_amount: monthly_amount * MONTHS_PER_YEAR,
        }
    }

    /// `round(annual / 12)`
    pub fn monthly_amount(&self) -> Money {
        round_whole(self.annual_amount / MONTHS_PER_YEAR)
    }

    pub fn set_annual(&mut self, annual_amount: Money) {
        self.annual_amount = annual_amount;
    }

    pub fn set_monthly(&mut self, monthly_amount: Money) {
        self.annual_amount = monthly_amount * MONTHS_PER_YEAR;
    }
}

/// Where rental income comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IncomeSource {
    Manual {
        gross_monthly_rent: Money,
        vacancy_rate_percent: Percent,
    },
    RentRoll {
        units: Vec<RentRollUnit>,
    },
}

impl IncomeSource {
    /// Manual income taken from the deal's own rent and vacancy fields.
    pub fn from_deal(deal: &DealInput) -> Self {
        IncomeSource::Manual {
            gross_monthly_rent: deal.gross_monthly_rent,
            vacancy_rate_percent: deal.vacancy_rate_percent,
        }
    }

    /// Rent-roll income when `units` is non-empty, manual deal income otherwise.
    pub fn from_rent_roll_or_deal(units: Vec<RentRollUnit>, deal: &DealInput) -> Self {
        if units.is_empty() {
            IncomeSource::from_deal(deal)
        } else {
            IncomeSource::RentRoll { units }
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            IncomeSource::Manual { .. } => "manual",
            IncomeSource::RentRoll { .. } => "rent_roll",
        }
    }
}

/// How operating expenses are determined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ExpenseSource {
    Ratio { percent: Percent },
    Itemized { lines: Vec<OperatingExpenseLine> },
}

impl ExpenseSource {
    pub fn from_deal(deal: &DealInput) -> Self {
        ExpenseSource::Ratio {
            percent: deal.operating_expense_ratio_percent,
        }
    }

    pub fn mode(&self) -> &'static str {
        match self {
            ExpenseSource::Ratio { .. } => "ratio",
            ExpenseSource::Itemized { .. } => "itemized",
        }
    }
}

/// Unit-level breakdown of a rent roll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RentRollSummary {
    pub total_units: u32,
    pub occupied_units: u32,
    pub vacant_units: u32,
    pub notice_units: u32,
    /// Σ market rent × 12
    pub gross_potential_rent: Money,
    /// Σ in-place rent of occupied units × 12
    pub actual_annual_rent: Money,
    pub vacancy_loss_annual: Money,
    /// Σ (market − in-place) × 12 over occupied units
    pub loss_to_lease_annual: Money,
    pub occupancy_rate_percent: Percent,
}

/// Income side of the underwriting, independent of the income mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncomeSummary {
    pub mode: String,
    /// Gross annual rent before vacancy (manual gross or rent-roll GPR)
    pub gross_annual_rent: Money,
    pub vacancy_loss_annual: Money,
    pub effective_gross_income: Money,
    /// Vacancy applied (manual) or derived from non-occupied units (rent roll)
    pub vacancy_rate_percent: Percent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub occupancy_rate_percent: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rent_roll: Option<RentRollSummary>,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Aggregate a rent roll. Only occupied units contribute actual income.
pub fn summarize_rent_roll(units: &[RentRollUnit]) -> RentRollSummary {
    let mut market_monthly = Decimal::ZERO;
    let mut actual_monthly = Decimal::ZERO;
    let mut loss_to_lease_monthly = Decimal::ZERO;
    let (mut occupied, mut vacant, mut notice) = (0u32, 0u32, 0u32);

    for unit in units {
        market_monthly += unit.market_rent;
        match unit.status {
            UnitStatus::Occupied => {
                occupied += 1;
                actual_monthly += unit.monthly_rent;
                loss_to_lease_monthly += unit.market_rent - unit.monthly_rent;
            }
            UnitStatus::Vacant => vacant += 1,
            UnitStatus::Notice => notice += 1,
        }
    }

    let total_units = units.len() as u32;
    let gross_potential_rent = market_monthly * MONTHS_PER_YEAR;
    let actual_annual_rent = actual_monthly * MONTHS_PER_YEAR;
    let occupancy_rate_percent =
        ratio_or_zero(Decimal::from(occupied), Decimal::from(total_units)) * HUNDRED;

    RentRollSummary {
        total_units,
        occupied_units: occupied,
        vacant_units: vacant,
        notice_units: notice,
        gross_potential_rent,
        actual_annual_rent,
        vacancy_loss_annual: gross_potential_rent - actual_annual_rent,
        loss_to_lease_annual: loss_to_lease_monthly * MONTHS_PER_YEAR,
        occupancy_rate_percent,
    }
}

/// Effective gross income for either income mode.
pub fn aggregate_income(source: &IncomeSource) -> IncomeSummary {
    match source {
        IncomeSource::Manual {
            gross_monthly_rent,
            vacancy_rate_percent,
        } => {
            let gross_annual_rent = *gross_monthly_rent * MONTHS_PER_YEAR;
            let effective_gross_income =
                gross_annual_rent * (Decimal::ONE - *vacancy_rate_percent / HUNDRED);
            IncomeSummary {
                mode: source.mode().to_string(),
                gross_annual_rent,
                vacancy_loss_annual: gross_annual_rent - effective_gross_income,
                effective_gross_income,
                vacancy_rate_percent: *vacancy_rate_percent,
                occupancy_rate_percent: None,
                rent_roll: None,
            }
        }
        IncomeSource::RentRoll { units } => {
            let roll = summarize_rent_roll(units);
            let vacancy_rate_percent = if roll.total_units == 0 {
                Decimal::ZERO
            } else {
                HUNDRED - roll.occupancy_rate_percent
            };
            IncomeSummary {
                mode: source.mode().to_string(),
                gross_annual_rent: roll.gross_potential_rent,
                vacancy_loss_annual: roll.vacancy_loss_annual,
                effective_gross_income: roll.actual_annual_rent,
                vacancy_rate_percent,
                occupancy_rate_percent: Some(roll.occupancy_rate_percent),
                rent_roll: Some(roll),
            }
        }
    }
}

/// Total annual operating expenses for either expense mode.
pub fn total_operating_expenses(source: &ExpenseSource, effective_gross_income: Money) -> Money {
    match source {
        ExpenseSource::Ratio { percent } => effective_gross_income * (*percent / HUNDRED),
        ExpenseSource::Itemized { lines } => lines.iter().map(|l| l.annual_amount).sum(),
    }
}

/// Itemised expense lines built from the deal's overrides, falling back to
/// area defaults for property tax (rate × price) and insurance.
pub fn expense_lines_from_overrides(
    deal: &DealInput,
    defaults: &MarketDefaults,
) -> Vec<OperatingExpenseLine> {
    let property_tax = deal.annual_property_tax.or_else(|| {
        defaults
            .property_tax_rate_percent
            .map(|rate| round_whole(deal.purchase_price * rate / HUNDRED))
    });
    let insurance = deal.annual_insurance.or(defaults.annual_insurance);

    [
        ("property_tax", property_tax),
        ("insurance", insurance),
        ("maintenance", deal.annual_maintenance),
        ("reserves", deal.annual_reserves),
    ]
    .into_iter()
    .filter_map(|(category, amount)| amount.map(|a| OperatingExpenseLine::annual(category, a)))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn unit(monthly: Decimal, market: Decimal, status: UnitStatus) -> RentRollUnit {
        RentRollUnit {
            unit: None,
            monthly_rent: monthly,
            market_rent: market,
            status,
        }
    }

    fn four_unit_roll() -> Vec<RentRollUnit> {
        vec![
            unit(dec!(1000), dec!(1050), UnitStatus::Occupied),
            unit(dec!(1200), dec!(1200), UnitStatus::Occupied),
            unit(dec!(0), dec!(1150), UnitStatus::Vacant),
            unit(dec!(1100), dec!(1150), UnitStatus::Occupied),
        ]
    }

    #[test]
    fn test_rent_roll_occupancy_and_actual_rent() {
        let summary = summarize_rent_roll(&four_unit_roll());
        assert_eq!(summary.total_units, 4);
        assert_eq!(summary.occupied_units, 3);
        assert_eq!(summary.vacant_units, 1);
        assert_eq!(summary.occupancy_rate_percent, dec!(75));
        assert_eq!(summary.actual_annual_rent, dec!(39600));
        // (1050 + 1200 + 1150 + 1150) * 12
        assert_eq!(summary.gross_potential_rent, dec!(54600));
        assert_eq!(summary.vacancy_loss_annual, dec!(15000));
        // (50 + 0 + 50) * 12
        assert_eq!(summary.loss_to_lease_annual, dec!(1200));
    }

    #[test]
    fn test_notice_units_do_not_count_as_income() {
        let roll = vec![
            unit(dec!(900), dec!(900), UnitStatus::Occupied),
            unit(dec!(900), dec!(900), UnitStatus::Notice),
        ];
        let summary = summarize_rent_roll(&roll);
        assert_eq!(summary.actual_annual_rent, dec!(10800));
        assert_eq!(summary.notice_units, 1);
        assert_eq!(summary.occupancy_rate_percent, dec!(50));
    }

    #[test]
    fn test_empty_rent_roll_is_zero_not_nan() {
        let income = aggregate_income(&IncomeSource::RentRoll { units: vec![] });
        assert_eq!(income.occupancy_rate_percent, Some(Decimal::ZERO));
        assert_eq!(income.vacancy_rate_percent, Decimal::ZERO);
        assert_eq!(income.effective_gross_income, Decimal::ZERO);
    }

    #[test]
    fn test_rent_roll_income_derives_vacancy() {
        let income = aggregate_income(&IncomeSource::RentRoll {
            units: four_unit_roll(),
        });
        assert_eq!(income.mode, "rent_roll");
        assert_eq!(income.effective_gross_income, dec!(39600));
        assert_eq!(income.vacancy_rate_percent, dec!(25));
    }

    #[test]
    fn test_manual_income() {
        let income = aggregate_income(&IncomeSource::Manual {
            gross_monthly_rent: dec!(8000),
            vacancy_rate_percent: dec!(5),
        });
        assert_eq!(income.gross_annual_rent, dec!(96000));
        assert_eq!(income.effective_gross_income, dec!(91200));
        assert_eq!(income.vacancy_loss_annual, dec!(4800));
        assert_eq!(income.occupancy_rate_percent, None);
    }

    #[test]
    fn test_ratio_and_itemized_expenses() {
        let ratio = ExpenseSource::Ratio { percent: dec!(35) };
        assert_eq!(total_operating_expenses(&ratio, dec!(91200)), dec!(31920));

        let itemized = ExpenseSource::Itemized {
            lines: vec![
                OperatingExpenseLine::annual("property_tax", dec!(12000)),
                OperatingExpenseLine::monthly("utilities", dec!(450)),
            ],
        };
        // Itemised totals ignore EGI entirely
        assert_eq!(total_operating_expenses(&itemized, dec!(0)), dec!(17400));
    }

    #[test]
    fn test_expense_line_monthly_annual_consistency() {
        let mut line = OperatingExpenseLine::annual("insurance", dec!(2500));
        // 2500 / 12 = 208.33 -> 208
        assert_eq!(line.monthly_amount(), dec!(208));
        line.set_monthly(dec!(300));
        assert_eq!(line.annual_amount, dec!(3600));
        assert_eq!(line.monthly_amount(), dec!(300));
        line.set_annual(dec!(6006));
        // 500.5 rounds half away from zero
        assert_eq!(line.monthly_amount(), dec!(501));
    }

    #[test]
    fn test_rent_roll_or_deal_selects_mode_explicitly() {
        let deal = DealInput::default();
        assert_eq!(IncomeSource::from_rent_roll_or_deal(vec![], &deal).mode(), "manual");
        assert_eq!(
            IncomeSource::from_rent_roll_or_deal(four_unit_roll(), &deal).mode(),
            "rent_roll"
        );
    }

    #[test]
    fn test_expense_lines_from_overrides_uses_area_tax_rate() {
        let deal = DealInput {
            purchase_price: dec!(500000),
            annual_maintenance: Some(dec!(4000)),
            ..DealInput::default()
        };
        let defaults = MarketDefaults {
            property_tax_rate_percent: Some(dec!(1.25)),
            ..MarketDefaults::default()
        };
        let lines = expense_lines_from_overrides(&deal, &defaults);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].category, "property_tax");
        assert_eq!(lines[0].annual_amount, dec!(6250));
        assert_eq!(lines[1].category, "maintenance");
    }

    #[test]
    fn test_income_source_json_is_tagged() {
        let json = r#"{"mode": "manual", "gross_monthly_rent": "5000", "vacancy_rate_percent": "4"}"#;
        let source: IncomeSource = serde_json::from_str(json).unwrap();
        assert_eq!(
            source,
            IncomeSource::Manual {
                gross_monthly_rent: dec!(5000),
                vacancy_rate_percent: dec!(4),
            }
        );
    }
}
