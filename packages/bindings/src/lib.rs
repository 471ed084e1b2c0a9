use napi::Result as NapiResult;
use napi_derive::napi;
use rust_decimal::Decimal;
use serde::Deserialize;

use underwriting_core::market::{MarketDefaults, PropertyType};

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Market defaults from an optional JSON document; built-in values otherwise.
fn parse_defaults(market_json: Option<String>) -> NapiResult<MarketDefaults> {
    match market_json {
        Some(json) if !json.trim().is_empty() => {
            serde_json::from_str(&json).map_err(to_napi_error)
        }
        _ => Ok(MarketDefaults::default()),
    }
}

// ---------------------------------------------------------------------------
// Underwriting
// ---------------------------------------------------------------------------

#[napi]
pub fn underwrite(input_json: String, market_json: Option<String>) -> NapiResult<String> {
    let defaults = parse_defaults(market_json)?;
    let input: underwriting_core::analysis::UnderwritingRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        underwriting_core::analysis::underwrite(&input, &defaults).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn underwrite_form(input_json: String, market_json: Option<String>) -> NapiResult<String> {
    let defaults = parse_defaults(market_json)?;
    let input: underwriting_core::analysis::RawUnderwritingRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        underwriting_core::analysis::underwrite_raw(&input, &defaults).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn normalize_deal(input_json: String, market_json: Option<String>) -> NapiResult<String> {
    let defaults = parse_defaults(market_json)?;
    let input: underwriting_core::normalize::RawDealInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output = underwriting_core::normalize::normalize_deal(&input, &defaults);
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn generate_scenarios(input_json: String, market_json: Option<String>) -> NapiResult<String> {
    let defaults = parse_defaults(market_json)?;
    let input: underwriting_core::analysis::UnderwritingRequest =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        underwriting_core::analysis::underwrite(&input, &defaults).map_err(to_napi_error)?;
    serde_json::to_string(&output.result.scenarios).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Financing
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct LoanTerms {
    purchase_price: Decimal,
    #[serde(default)]
    down_payment_percent: Decimal,
    interest_rate_percent: Decimal,
    loan_term_years: u32,
}

impl LoanTerms {
    fn parse(input_json: &str) -> NapiResult<Self> {
        let t: LoanTerms = serde_json::from_str(input_json).map_err(to_napi_error)?;
        underwriting_core::debt_service::check_loan_terms(t.interest_rate_percent, t.loan_term_years)
            .map_err(to_napi_error)?;
        Ok(t)
    }
}

#[napi]
pub fn debt_service(input_json: String) -> NapiResult<String> {
    let t = LoanTerms::parse(&input_json)?;
    let output = underwriting_core::debt_service::compute_debt_service(
        t.purchase_price,
        t.down_payment_percent,
        t.interest_rate_percent,
        t.loan_term_years,
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let t = LoanTerms::parse(&input_json)?;
    let debt = underwriting_core::debt_service::compute_debt_service(
        t.purchase_price,
        t.down_payment_percent,
        t.interest_rate_percent,
        t.loan_term_years,
    );
    let output = underwriting_core::debt_service::amortization_schedule(
        debt.loan_amount,
        debt.monthly_rate,
        debt.total_payments,
    );
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn rate_sheet(property_type: String, market_json: Option<String>) -> NapiResult<String> {
    let defaults = parse_defaults(market_json)?;
    let property_type: PropertyType = property_type.parse().map_err(to_napi_error)?;
    serde_json::to_string(&defaults.rate_sheet(property_type)).map_err(to_napi_error)
}
