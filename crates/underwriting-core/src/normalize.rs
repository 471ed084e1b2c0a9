//! Coerces raw deal-entry values (form text or JSON numbers) into a
//! [`DealInput`].
//!
//! Normalisation never fails. Anything that cannot be read as a number
//! becomes zero (or the field's documented default) and the reason is
//! reported alongside as a [`ParseWarning`], so callers can surface
//! "interest rate parsed as 0" without changing the numbers.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

use crate::debt_service::MAX_LOAN_TERM_YEARS;
use crate::market::{MarketDefaults, PropertyType};
use crate::metrics::DealInput;

const HUNDRED: Decimal = dec!(100);

/// A raw field value as entered: free text or an already-numeric value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawField {
    Number(f64),
    Text(String),
}

impl From<&str> for RawField {
    fn from(s: &str) -> Self {
        RawField::Text(s.to_string())
    }
}

impl From<String> for RawField {
    fn from(s: String) -> Self {
        RawField::Text(s)
    }
}

impl From<f64> for RawField {
    fn from(n: f64) -> Self {
        RawField::Number(n)
    }
}

/// Why a raw value was not taken at face value.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParseWarning {
    #[error("{field}: empty value, using {used}")]
    Empty { field: String, used: Decimal },

    #[error("{field}: '{raw}' is not a number, parsed as 0 — check input")]
    NotNumeric { field: String, raw: String },

    #[error("{field}: '{raw}' is not a finite number, parsed as 0 — check input")]
    NotFinite { field: String, raw: String },

    #[error("{field}: negative value {value} clamped to 0")]
    Negative { field: String, value: Decimal },

    #[error("{field}: {value} exceeds {max}, clamped to {max}")]
    AboveMaximum {
        field: String,
        value: Decimal,
        max: Decimal,
    },

    #[error("{field}: {value} is not usable, using default {used}")]
    Defaulted {
        field: String,
        value: Decimal,
        used: Decimal,
    },

    #[error("{field}: unknown value '{raw}', using {used}")]
    UnknownCategory {
        field: String,
        raw: String,
        used: String,
    },
}

impl ParseWarning {
    pub fn field(&self) -> &str {
        match self {
            ParseWarning::Empty { field, .. }
            | ParseWarning::NotNumeric { field, .. }
            | ParseWarning::NotFinite { field, .. }
            | ParseWarning::Negative { field, .. }
            | ParseWarning::AboveMaximum { field, .. }
            | ParseWarning::Defaulted { field, .. }
            | ParseWarning::UnknownCategory { field, .. } => field,
        }
    }
}

/// Deal fields exactly as captured from a form. Absent fields take their
/// documented defaults during normalisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDealInput {
    pub purchase_price: Option<RawField>,
    pub down_payment_percent: Option<RawField>,
    pub interest_rate_percent: Option<RawField>,
    pub loan_term_years: Option<RawField>,
    pub gross_monthly_rent: Option<RawField>,
    pub vacancy_rate_percent: Option<RawField>,
    pub operating_expense_ratio_percent: Option<RawField>,
    pub closing_cost_percent: Option<RawField>,
    pub annual_property_tax: Option<RawField>,
    pub annual_insurance: Option<RawField>,
    pub annual_maintenance: Option<RawField>,
    pub annual_reserves: Option<RawField>,
    pub units: Option<RawField>,
    pub square_feet: Option<RawField>,
    pub property_type: Option<String>,
}

/// Normalised deal plus everything that was coerced on the way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedDeal {
    pub deal: DealInput,
    pub warnings: Vec<ParseWarning>,
}

fn is_blank(raw: &RawField) -> bool {
    matches!(raw, RawField::Text(s) if s.trim().is_empty())
}

/// Parse one raw value into a decimal.
///
/// Text is trimmed and may carry a leading `$`, thousands separators
/// (`,` or `_`) and a trailing `%`; decimal and scientific notation are
/// both accepted.
pub fn parse_field(field: &str, raw: &RawField) -> Result<Decimal, ParseWarning> {
    match raw {
        RawField::Number(n) => {
            if !n.is_finite() {
                return Err(ParseWarning::NotFinite {
                    field: field.to_string(),
                    raw: n.to_string(),
                });
            }
            Decimal::from_str(&n.to_string())
                .ok()
                .or_else(|| Decimal::from_f64(*n))
                .ok_or_else(|| ParseWarning::NotNumeric {
                    field: field.to_string(),
                    raw: n.to_string(),
                })
        }
        RawField::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Err(ParseWarning::Empty {
                    field: field.to_string(),
                    used: Decimal::ZERO,
                });
            }
            let cleaned: String = trimmed
                .trim_start_matches('$')
                .trim_end_matches('%')
                .chars()
                .filter(|c| !matches!(c, ',' | '_' | ' '))
                .collect();
            let lowered = cleaned.trim_start_matches(['+', '-']).to_ascii_lowercase();
            if matches!(lowered.as_str(), "inf" | "infinity" | "nan") {
                return Err(ParseWarning::NotFinite {
                    field: field.to_string(),
                    raw: text.clone(),
                });
            }
            Decimal::from_str(&cleaned)
                .or_else(|_| Decimal::from_scientific(&cleaned))
                .map_err(|_| ParseWarning::NotNumeric {
                    field: field.to_string(),
                    raw: text.clone(),
                })
        }
    }
}

/// Collects coercion warnings while reading fields.
struct Coercer<'a> {
    warnings: &'a mut Vec<ParseWarning>,
}

impl Coercer<'_> {
    /// Parse, falling back to `default` when absent or blank and to zero when
    /// unreadable. Negative results are clamped to zero.
    fn non_negative(&mut self, field: &str, raw: Option<&RawField>, default: Decimal) -> Decimal {
        let value = match raw {
            None => return default,
            Some(r) if is_blank(r) => {
                self.warnings.push(ParseWarning::Empty {
                    field: field.to_string(),
                    used: default,
                });
                return default;
            }
            Some(r) => match parse_field(field, r) {
                Ok(v) => v,
                Err(w) => {
                    self.warnings.push(w);
                    return Decimal::ZERO;
                }
            },
        };
        if value < Decimal::ZERO {
            self.warnings.push(ParseWarning::Negative {
                field: field.to_string(),
                value,
            });
            return Decimal::ZERO;
        }
        value
    }

    fn percent(&mut self, field: &str, raw: Option<&RawField>, default: Decimal) -> Decimal {
        let value = self.non_negative(field, raw, default);
        if value > HUNDRED {
            self.warnings.push(ParseWarning::AboveMaximum {
                field: field.to_string(),
                value,
                max: HUNDRED,
            });
            return HUNDRED;
        }
        value
    }

    fn optional(&mut self, field: &str, raw: Option<&RawField>) -> Option<Decimal> {
        match raw {
            None => None,
            Some(r) if is_blank(r) => None,
            Some(_) => Some(self.non_negative(field, raw, Decimal::ZERO)),
        }
    }

    fn optional_percent(&mut self, field: &str, raw: Option<&RawField>) -> Option<Decimal> {
        match raw {
            None => None,
            Some(r) if is_blank(r) => None,
            Some(_) => Some(self.percent(field, raw, Decimal::ZERO)),
        }
    }

    fn optional_count(&mut self, field: &str, raw: Option<&RawField>) -> Option<u32> {
        self.optional(field, raw)
            .map(|v| v.floor().to_u32().unwrap_or(u32::MAX))
    }

    fn loan_term(&mut self, raw: Option<&RawField>, default: u32) -> u32 {
        let field = "loan_term_years";
        let used = Decimal::from(default);
        let value = self.non_negative(field, raw, used).floor();
        match value.to_u32() {
            Some(years) if (1..=MAX_LOAN_TERM_YEARS).contains(&years) => years,
            _ => {
                self.warnings.push(ParseWarning::Defaulted {
                    field: field.to_string(),
                    value,
                    used,
                });
                default
            }
        }
    }

    fn property_type(&mut self, raw: Option<&str>) -> PropertyType {
        match raw.map(str::trim) {
            None | Some("") => PropertyType::default(),
            Some(text) => text.parse().unwrap_or_else(|_| {
                let used = PropertyType::default();
                self.warnings.push(ParseWarning::UnknownCategory {
                    field: "property_type".to_string(),
                    raw: text.to_string(),
                    used: used.to_string(),
                });
                used
            }),
        }
    }
}

/// Coerce raw form values into a [`DealInput`].
///
/// Absent values default to zero, except the interest rate (the market's
/// typical rate for the property type) and the loan term (the market default
/// term). Closing costs stay unset so the engine applies the market default.
pub fn normalize_deal(raw: &RawDealInput, defaults: &MarketDefaults) -> NormalizedDeal {
    let mut warnings = Vec::new();
    let mut c = Coercer {
        warnings: &mut warnings,
    };

    let property_type = c.property_type(raw.property_type.as_deref());
    let zero = Decimal::ZERO;

    let deal = DealInput {
        purchase_price: c.non_negative("purchase_price", raw.purchase_price.as_ref(), zero),
        down_payment_percent: c.non_negative(
            "down_payment_percent",
            raw.down_payment_percent.as_ref(),
            zero,
        ),
        interest_rate_percent: c.non_negative(
            "interest_rate_percent",
            raw.interest_rate_percent.as_ref(),
            defaults.typical_rate(property_type),
        ),
        loan_term_years: c.loan_term(raw.loan_term_years.as_ref(), defaults.loan_term_years),
        gross_monthly_rent: c.non_negative(
            "gross_monthly_rent",
            raw.gross_monthly_rent.as_ref(),
            zero,
        ),
        vacancy_rate_percent: c.percent(
            "vacancy_rate_percent",
            raw.vacancy_rate_percent.as_ref(),
            zero,
        ),
        operating_expense_ratio_percent: c.percent(
            "operating_expense_ratio_percent",
            raw.operating_expense_ratio_percent.as_ref(),
            zero,
        ),
        closing_cost_percent: c
            .optional_percent("closing_cost_percent", raw.closing_cost_percent.as_ref()),
        annual_property_tax: c.optional("annual_property_tax", raw.annual_property_tax.as_ref()),
        annual_insurance: c.optional("annual_insurance", raw.annual_insurance.as_ref()),
        annual_maintenance: c.optional("annual_maintenance", raw.annual_maintenance.as_ref()),
        annual_reserves: c.optional("annual_reserves", raw.annual_reserves.as_ref()),
        units: c.optional_count("units", raw.units.as_ref()),
        square_feet: c.optional_count("square_feet", raw.square_feet.as_ref()),
        property_type,
    };

    NormalizedDeal { deal, warnings }
}
