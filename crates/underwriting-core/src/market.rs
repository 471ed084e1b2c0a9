use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::UnderwritingError;
use crate::scenarios::ScenarioPolicy;
use crate::types::{Money, Percent};
use crate::UnderwritingResult;

/// Market base rate the per-property-type spreads are quoted against.
pub const DEFAULT_BASE_RATE_PERCENT: Decimal = dec!(7.125);

/// Closing costs as a share of purchase price when no area data is known.
pub const DEFAULT_CLOSING_COST_PERCENT: Decimal = dec!(3.5);

pub const DEFAULT_LOAN_TERM_YEARS: u32 = 30;

// ---------------------------------------------------------------------------
// Property types and rate sheets
// ---------------------------------------------------------------------------

/// Lending category of the collateral; drives the default interest rate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PropertyType {
    Residential,
    #[default]
    Multifamily,
    MixedUse,
    Industrial,
    Land,
}

impl PropertyType {
    pub const ALL: [PropertyType; 5] = [
        PropertyType::Residential,
        PropertyType::Multifamily,
        PropertyType::MixedUse,
        PropertyType::Industrial,
        PropertyType::Land,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PropertyType::Residential => "Single Family Residential",
            PropertyType::Multifamily => "Multifamily (5+ units)",
            PropertyType::MixedUse => "Mixed Use",
            PropertyType::Industrial => "Industrial/Warehouse",
            PropertyType::Land => "Land",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PropertyType::Residential => "residential",
            PropertyType::Multifamily => "multifamily",
            PropertyType::MixedUse => "mixed-use",
            PropertyType::Industrial => "industrial",
            PropertyType::Land => "land",
        };
        f.write_str(s)
    }
}

impl FromStr for PropertyType {
    type Err = UnderwritingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "residential" | "sfr" => Ok(PropertyType::Residential),
            "multifamily" => Ok(PropertyType::Multifamily),
            "mixeduse" => Ok(PropertyType::MixedUse),
            "industrial" => Ok(PropertyType::Industrial),
            "land" => Ok(PropertyType::Land),
            _ => Err(UnderwritingError::InvalidInput {
                field: "property_type".into(),
                reason: format!(
                    "Unknown property type '{s}' (expected residential, multifamily, mixed-use, industrial or land)"
                ),
            }),
        }
    }
}

/// A single loan product quoted on a rate sheet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateProduct {
    pub product: String,
    pub rate_percent: Percent,
}

/// Indicative lending rates for one property type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateSheet {
    pub property_type: PropertyType,
    pub description: String,
    pub products: Vec<RateProduct>,
    pub typical_percent: Percent,
    pub min_percent: Percent,
    pub max_percent: Percent,
}

const RESIDENTIAL_PRODUCTS: &[(&str, Decimal)] = &[
    ("thirty_year_fixed", dec!(-0.5)),
    ("fifteen_year_fixed", dec!(-1.25)),
    ("five_one_arm", dec!(-0.875)),
];
const MULTIFAMILY_PRODUCTS: &[(&str, Decimal)] = &[
    ("agency_fixed", dec!(0.25)),
    ("bank_fixed", dec!(0.75)),
    ("bridge_loan", dec!(2.5)),
];
const MIXED_USE_PRODUCTS: &[(&str, Decimal)] = &[
    ("bank_fixed", dec!(1.0)),
    ("sba_loan", dec!(0.5)),
    ("portfolio_loan", dec!(1.25)),
];
const INDUSTRIAL_PRODUCTS: &[(&str, Decimal)] = &[
    ("bank_fixed", dec!(1.25)),
    ("cmbs", dec!(1.5)),
    ("life_insurance", dec!(0.75)),
];
const LAND_PRODUCTS: &[(&str, Decimal)] = &[
    ("bank_loan", dec!(2.0)),
    ("seller_financing", dec!(1.5)),
];

/// Spreads over the base rate: (products, typical, min, max).
fn spreads(
    property_type: PropertyType,
) -> (&'static [(&'static str, Decimal)], Decimal, Decimal, Decimal) {
    match property_type {
        PropertyType::Residential => (RESIDENTIAL_PRODUCTS, dec!(-0.5), dec!(-1.0), dec!(0.5)),
        PropertyType::Multifamily => (MULTIFAMILY_PRODUCTS, dec!(0.5), dec!(0), dec!(3.0)),
        PropertyType::MixedUse => (MIXED_USE_PRODUCTS, dec!(1.0), dec!(0.25), dec!(2.0)),
        PropertyType::Industrial => (INDUSTRIAL_PRODUCTS, dec!(1.25), dec!(0.5), dec!(2.5)),
        PropertyType::Land => (LAND_PRODUCTS, dec!(2.0), dec!(1.0), dec!(4.0)),
    }
}

// ---------------------------------------------------------------------------
// Market defaults
// ---------------------------------------------------------------------------

/// Calculator defaults. Passed explicitly into every computation so that
/// callers (and tests) control the rates in force.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDefaults {
    /// Base rate that rate-sheet spreads are added to
    pub base_rate_percent: Percent,
    /// Current quoted mortgage rate; replaces the rate-sheet typical rate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mortgage_rate_percent: Option<Percent>,
    /// Closing costs as a percentage of purchase price
    pub closing_cost_percent: Percent,
    /// Loan term used when the deal does not supply a usable one
    pub loan_term_years: u32,
    /// Annual property tax as a percentage of purchase price
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_tax_rate_percent: Option<Percent>,
    /// Annual insurance estimate for the area
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annual_insurance: Option<Money>,
    /// Sensitivity deltas for conservative / optimistic scenarios
    pub scenario_policy: ScenarioPolicy,
}

impl Default for MarketDefaults {
    fn default() -> Self {
        MarketDefaults {
            base_rate_percent: DEFAULT_BASE_RATE_PERCENT,
            mortgage_rate_percent: None,
            closing_cost_percent: DEFAULT_CLOSING_COST_PERCENT,
            loan_term_years: DEFAULT_LOAN_TERM_YEARS,
            property_tax_rate_percent: None,
            annual_insurance: None,
            scenario_policy: ScenarioPolicy::default(),
        }
    }
}

impl MarketDefaults {
    /// Indicative rate sheet for a property type, quoted off the base rate.
    pub fn rate_sheet(&self, property_type: PropertyType) -> RateSheet {
        let base = self.base_rate_percent;
        let (products, typical, min, max) = spreads(property_type);
        RateSheet {
            property_type,
            description: property_type.label().to_string(),
            products: products
                .iter()
                .map(|(name, spread)| RateProduct {
                    product: (*name).to_string(),
                    rate_percent: base + spread,
                })
                .collect(),
            typical_percent: base + typical,
            min_percent: base + min,
            max_percent: base + max,
        }
    }

    /// Interest rate assumed when a deal leaves the rate blank.
    pub fn typical_rate(&self, property_type: PropertyType) -> Percent {
        match self.mortgage_rate_percent {
            Some(rate) => rate,
            None => self.base_rate_percent + spreads(property_type).1,
        }
    }

    /// Merge area enrichment over these defaults, returning a new snapshot.
    /// Fields the enrichment leaves out keep their current values.
    pub fn with_enrichment(&self, enrichment: &AreaEnrichment) -> MarketDefaults {
        let mut merged = self.clone();
        if let Some(base) = enrichment.base_rate_percent {
            merged.base_rate_percent = base;
        }
        if let Some(rate) = enrichment.mortgage_rate_percent {
            merged.mortgage_rate_percent = Some(rate);
        }
        if let Some(closing) = enrichment.closing_cost_percent {
            merged.closing_cost_percent = closing;
        }
        if let Some(tax) = enrichment.tax_rate_percent {
            merged.property_tax_rate_percent = Some(tax);
        }
        if let Some(insurance) = enrichment.insurance_estimate {
            merged.annual_insurance = Some(insurance);
        }
        merged
    }
}

// ---------------------------------------------------------------------------
// Area enrichment
// ---------------------------------------------------------------------------

/// Location an enrichment lookup is made for.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaQuery {
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
}

impl fmt::Display for AreaQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<&str> = [&self.city, &self.state, &self.zip]
            .iter()
            .filter_map(|p| p.as_deref())
            .collect();
        if parts.is_empty() {
            f.write_str("(no location)")
        } else {
            f.write_str(&parts.join(", "))
        }
    }
}

/// Area benchmarks returned by an enrichment source. Every field is optional;
/// absent fields leave the calculator defaults untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaEnrichment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate_percent: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insurance_estimate: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closing_cost_percent: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mortgage_rate_percent: Option<Percent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_rate_percent: Option<Percent>,
}

/// Source of area enrichment data.
pub trait EnrichmentProvider {
    fn fetch(&self, query: &AreaQuery) -> UnderwritingResult<AreaEnrichment>;
}

/// One entry in an enrichment data file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AreaRecord {
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(flatten)]
    pub enrichment: AreaEnrichment,
}

impl AreaRecord {
    fn matches(&self, query: &AreaQuery) -> bool {
        if let (Some(zip), Some(wanted)) = (&self.zip, &query.zip) {
            return zip.trim() == wanted.trim();
        }
        match (&self.city, &self.state, &query.city, &query.state) {
            (Some(city), Some(state), Some(q_city), Some(q_state)) => {
                city.trim().eq_ignore_ascii_case(q_city.trim())
                    && state.trim().eq_ignore_ascii_case(q_state.trim())
            }
            _ => false,
        }
    }
}

/// Enrichment provider backed by a JSON array of [`AreaRecord`]s on disk.
#[derive(Debug, Clone)]
pub struct JsonFileEnrichmentProvider {
    path: PathBuf,
}

impl JsonFileEnrichmentProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileEnrichmentProvider { path: path.into() }
    }
}

impl EnrichmentProvider for JsonFileEnrichmentProvider {
    fn fetch(&self, query: &AreaQuery) -> UnderwritingResult<AreaEnrichment> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            UnderwritingError::Enrichment(format!(
                "failed to read '{}': {e}",
                self.path.display()
            ))
        })?;
        let records: Vec<AreaRecord> = serde_json::from_str(&contents)?;
        records
            .into_iter()
            .find(|r| r.matches(query))
            .map(|r| r.enrichment)
            .ok_or_else(|| UnderwritingError::Enrichment(format!("no area data for {query}")))
    }
}

/// Fetch enrichment for `query` and merge it over `prior`.
///
/// Failures are logged and swallowed: the calculator keeps running on the
/// prior defaults. There is no retry.
pub fn resolve_defaults(
    provider: &dyn EnrichmentProvider,
    query: &AreaQuery,
    prior: &MarketDefaults,
) -> MarketDefaults {
    match provider.fetch(query) {
        Ok(enrichment) => {
            debug!(area = %query, ?enrichment, "merged area enrichment");
            prior.with_enrichment(&enrichment)
        }
        Err(err) => {
            warn!(area = %query, error = %err, "area enrichment unavailable, keeping prior defaults");
            prior.clone()
        }
    }
}
