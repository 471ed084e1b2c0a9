use clap::Args;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use underwriting_core::debt_service::{
    self, amortization_schedule, check_loan_terms, compute_debt_service, DebtService,
};
use underwriting_core::market::{MarketDefaults, PropertyType};

/// Loan terms for the debt-service and amortize commands
#[derive(Args, Debug, Default)]
#[command(allow_hyphen_values = true)]
pub struct FinancingArgs {
    /// Purchase price (financed at --down-payment)
    #[arg(long)]
    pub purchase_price: Option<Decimal>,

    /// Loan principal, used as-is instead of price less down payment
    #[arg(long, conflicts_with = "purchase_price")]
    pub loan_amount: Option<Decimal>,

    /// Down payment, percent of price
    #[arg(long, default_value = "0")]
    pub down_payment: Decimal,

    /// Annual interest rate, percent (defaults to the typical rate for the property type)
    #[arg(long)]
    pub rate: Option<Decimal>,

    /// Loan term in years (defaults to the market term)
    #[arg(long)]
    pub term: Option<u32>,

    /// Property type used to pick a default rate
    #[arg(long, default_value = "multifamily")]
    pub property_type: PropertyType,

    /// Also report the outstanding balance after this many years
    #[arg(long)]
    pub balance_after: Option<u32>,
}

impl FinancingArgs {
    fn resolve(
        &self,
        defaults: &MarketDefaults,
    ) -> Result<DebtService, Box<dyn std::error::Error>> {
        let rate = self
            .rate
            .unwrap_or_else(|| defaults.typical_rate(self.property_type));
        let term = self.term.unwrap_or(defaults.loan_term_years);
        check_loan_terms(rate, term)?;
        let (price, down) = match (self.loan_amount, self.purchase_price) {
            (Some(loan), _) => (loan, Decimal::ZERO),
            (None, Some(price)) => (price, self.down_payment),
            (None, None) => return Err("--purchase-price or --loan-amount is required".into()),
        };
        if price < Decimal::ZERO {
            return Err("loan principal cannot be negative".into());
        }
        Ok(compute_debt_service(price, down, rate, term))
    }
}

pub fn run_debt_service(
    args: FinancingArgs,
    defaults: &MarketDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let debt = args.resolve(defaults)?;
    let mut value = serde_json::to_value(&debt)?;
    if let Some(years) = args.balance_after {
        let balance = debt_service::remaining_balance(
            debt.loan_amount,
            debt.monthly_rate,
            debt.total_payments,
            years.saturating_mul(12),
        );
        value["balance_after_years"] = json!(years);
        value["remaining_balance"] = serde_json::to_value(balance)?;
    }
    Ok(value)
}

pub fn run_amortize(
    args: FinancingArgs,
    defaults: &MarketDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let debt = args.resolve(defaults)?;
    let schedule = amortization_schedule(debt.loan_amount, debt.monthly_rate, debt.total_payments);
    Ok(json!({
        "loan_amount": debt.loan_amount,
        "monthly_payment": debt.monthly_payment,
        "results": schedule,
    }))
}
