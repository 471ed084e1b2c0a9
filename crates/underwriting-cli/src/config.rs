use clap::Args;
use tracing::info;

use underwriting_core::market::{
    resolve_defaults, AreaQuery, JsonFileEnrichmentProvider, MarketDefaults,
};

use crate::input;

/// Market assumptions shared by every command
#[derive(Args, Debug, Default)]
pub struct MarketArgs {
    /// Market defaults file (JSON or YAML): base rate, closing costs, scenario deltas
    #[arg(long, global = true)]
    pub market: Option<String>,

    /// Area enrichment data file (JSON array of area records)
    #[arg(long, global = true)]
    pub enrichment: Option<String>,

    /// City for the enrichment lookup
    #[arg(long, global = true)]
    pub city: Option<String>,

    /// State for the enrichment lookup
    #[arg(long, global = true)]
    pub state: Option<String>,

    /// ZIP code for the enrichment lookup (takes precedence over city/state)
    #[arg(long, global = true)]
    pub zip: Option<String>,
}

/// Built-in defaults, overlaid with `--market`, then with area enrichment.
/// A failed enrichment lookup is logged and leaves the defaults unchanged.
pub fn load_defaults(args: &MarketArgs) -> Result<MarketDefaults, Box<dyn std::error::Error>> {
    let base: MarketDefaults = match &args.market {
        Some(path) => {
            info!(path = path.as_str(), "loading market defaults");
            input::file::read_config(path)?
        }
        None => MarketDefaults::default(),
    };

    let Some(path) = &args.enrichment else {
        return Ok(base);
    };

    let query = AreaQuery {
        city: args.city.clone(),
        state: args.state.clone(),
        zip: args.zip.clone(),
    };
    let provider = JsonFileEnrichmentProvider::new(path);
    Ok(resolve_defaults(&provider, &query, &base))
}
