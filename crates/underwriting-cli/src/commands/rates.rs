use clap::Args;
use serde_json::{json, Value};

use underwriting_core::market::{MarketDefaults, PropertyType};

/// Arguments for the rate sheet
#[derive(Args, Debug, Default)]
pub struct RatesArgs {
    /// Show a single property type; omit for all types
    #[arg(long)]
    pub property_type: Option<PropertyType>,
}

/// Indicative rates. One property type gives its sheet with the products as
/// rows; otherwise every product of every type is listed.
pub fn run_rates(
    args: RatesArgs,
    defaults: &MarketDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(property_type) = args.property_type {
        let sheet = defaults.rate_sheet(property_type);
        return Ok(json!({
            "property_type": sheet.property_type,
            "description": sheet.description,
            "typical_percent": sheet.typical_percent,
            "min_percent": sheet.min_percent,
            "max_percent": sheet.max_percent,
            "results": sheet.products,
        }));
    }

    let rows: Vec<Value> = PropertyType::ALL
        .into_iter()
        .map(|pt| defaults.rate_sheet(pt))
        .flat_map(|sheet| {
            let typical = sheet.typical_percent;
            let property_type = sheet.property_type;
            sheet.products.into_iter().map(move |p| {
                json!({
                    "property_type": property_type.label(),
                    "product": p.product,
                    "rate_percent": p.rate_percent,
                    "typical_percent": typical,
                })
            })
        })
        .collect();

    Ok(json!({
        "base_rate_percent": defaults.base_rate_percent,
        "results": rows,
    }))
}
