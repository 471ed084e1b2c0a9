use clap::Args;
use serde_json::{json, Value};

use underwriting_core::analysis::{
    self, resolve_raw_request, RawUnderwritingRequest, UnderwritingRequest,
};
use underwriting_core::income::{expense_lines_from_overrides, ExpenseSource};
use underwriting_core::market::MarketDefaults;
use underwriting_core::normalize::{RawDealInput, RawField};

use crate::input;
use crate::input::stdin::PipedRequest;

/// Deal inputs. Flags take form-style text ("$450,000", "6.5%"), which is
/// normalised the same way as a `--form` file.
#[derive(Args, Debug, Default)]
#[command(allow_hyphen_values = true)]
pub struct DealArgs {
    /// Path to a typed underwriting request (JSON: deal, income, expenses)
    #[arg(long)]
    pub input: Option<String>,

    /// Path to a raw form request (JSON: deal fields as text or numbers,
    /// optional rent_roll and expense_lines)
    #[arg(long)]
    pub form: Option<String>,

    /// Purchase price
    #[arg(long)]
    pub purchase_price: Option<String>,

    /// Down payment, percent of price (e.g. 25)
    #[arg(long)]
    pub down_payment: Option<String>,

    /// Annual interest rate, percent (defaults to the typical rate for the property type)
    #[arg(long)]
    pub rate: Option<String>,

    /// Loan term in years
    #[arg(long)]
    pub term: Option<String>,

    /// Gross monthly rent
    #[arg(long)]
    pub rent: Option<String>,

    /// Vacancy rate, percent
    #[arg(long)]
    pub vacancy: Option<String>,

    /// Operating expense ratio, percent of EGI
    #[arg(long)]
    pub expense_ratio: Option<String>,

    /// Closing costs, percent of price
    #[arg(long)]
    pub closing_costs: Option<String>,

    /// Annual property tax
    #[arg(long)]
    pub property_tax: Option<String>,

    /// Annual insurance
    #[arg(long)]
    pub insurance: Option<String>,

    /// Annual maintenance
    #[arg(long)]
    pub maintenance: Option<String>,

    /// Annual reserves
    #[arg(long)]
    pub reserves: Option<String>,

    /// Number of units
    #[arg(long)]
    pub units: Option<String>,

    /// Building square footage
    #[arg(long)]
    pub sqft: Option<String>,

    /// Property type (residential, multifamily, mixed-use, industrial, land)
    #[arg(long)]
    pub property_type: Option<String>,

    /// Rent roll file (JSON array of units); switches income to rent-roll mode
    #[arg(long)]
    pub rent_roll: Option<String>,

    /// Expense lines file (JSON array); switches expenses to itemised mode
    #[arg(long)]
    pub expenses: Option<String>,

    /// Itemise expenses from the tax/insurance/maintenance/reserve figures,
    /// filling gaps from market defaults
    #[arg(long)]
    pub itemize: bool,
}

impl DealArgs {
    /// Any flag that sets a deal field, rent roll or expense lines.
    fn has_field_flags(&self) -> bool {
        let deal = self.to_raw_deal();
        deal != RawDealInput::default() || self.rent_roll.is_some() || self.expenses.is_some()
    }

    /// Typed requests are taken as-is; field flags would be silently lost.
    fn reject_field_flags(&self, source: &str) -> Result<(), Box<dyn std::error::Error>> {
        if self.has_field_flags() {
            return Err(format!(
                "deal flags cannot be combined with {source}; use a form request to override fields"
            )
            .into());
        }
        Ok(())
    }

    /// Lay every supplied flag over a form request. Flags win.
    fn overlay(&self, raw: &mut RawUnderwritingRequest) -> Result<(), Box<dyn std::error::Error>> {
        fn set<T>(slot: &mut Option<T>, flag: Option<T>) {
            if flag.is_some() {
                *slot = flag;
            }
        }

        let flags = self.to_raw_request()?;
        let deal = &mut raw.deal;
        set(&mut deal.purchase_price, flags.deal.purchase_price);
        set(&mut deal.down_payment_percent, flags.deal.down_payment_percent);
        set(&mut deal.interest_rate_percent, flags.deal.interest_rate_percent);
        set(&mut deal.loan_term_years, flags.deal.loan_term_years);
        set(&mut deal.gross_monthly_rent, flags.deal.gross_monthly_rent);
        set(&mut deal.vacancy_rate_percent, flags.deal.vacancy_rate_percent);
        set(
            &mut deal.operating_expense_ratio_percent,
            flags.deal.operating_expense_ratio_percent,
        );
        set(&mut deal.closing_cost_percent, flags.deal.closing_cost_percent);
        set(&mut deal.annual_property_tax, flags.deal.annual_property_tax);
        set(&mut deal.annual_insurance, flags.deal.annual_insurance);
        set(&mut deal.annual_maintenance, flags.deal.annual_maintenance);
        set(&mut deal.annual_reserves, flags.deal.annual_reserves);
        set(&mut deal.units, flags.deal.units);
        set(&mut deal.square_feet, flags.deal.square_feet);
        set(&mut deal.property_type, flags.deal.property_type);
        if self.rent_roll.is_some() {
            raw.rent_roll = flags.rent_roll;
        }
        if self.expenses.is_some() {
            raw.expense_lines = flags.expense_lines;
        }
        Ok(())
    }

    fn to_raw_deal(&self) -> RawDealInput {
        let text = |v: &Option<String>| v.as_deref().map(RawField::from);
        RawDealInput {
            purchase_price: text(&self.purchase_price),
            down_payment_percent: text(&self.down_payment),
            interest_rate_percent: text(&self.rate),
            loan_term_years: text(&self.term),
            gross_monthly_rent: text(&self.rent),
            vacancy_rate_percent: text(&self.vacancy),
            operating_expense_ratio_percent: text(&self.expense_ratio),
            closing_cost_percent: text(&self.closing_costs),
            annual_property_tax: text(&self.property_tax),
            annual_insurance: text(&self.insurance),
            annual_maintenance: text(&self.maintenance),
            annual_reserves: text(&self.reserves),
            units: text(&self.units),
            square_feet: text(&self.sqft),
            property_type: self.property_type.clone(),
        }
    }

    fn to_raw_request(&self) -> Result<RawUnderwritingRequest, Box<dyn std::error::Error>> {
        let rent_roll = match &self.rent_roll {
            Some(path) => input::file::read_json(path)?,
            None => Vec::new(),
        };
        let expense_lines = match &self.expenses {
            Some(path) => input::file::read_json(path)?,
            None => Vec::new(),
        };
        Ok(RawUnderwritingRequest {
            deal: self.to_raw_deal(),
            rent_roll,
            expense_lines,
        })
    }
}

/// Resolve the request from `--input`, `--form`, stdin or flags. Flags are
/// laid over form requests (file or piped); a typed request rejects them.
/// Returns the request and any normalisation warnings.
pub fn load_request(
    args: &DealArgs,
    defaults: &MarketDefaults,
) -> Result<(UnderwritingRequest, Vec<String>), Box<dyn std::error::Error>> {
    let piped = if args.input.is_none() && args.form.is_none() {
        input::stdin::read_request()?
    } else {
        None
    };
    resolve_request(args, piped, defaults)
}

fn resolve_request(
    args: &DealArgs,
    piped: Option<PipedRequest>,
    defaults: &MarketDefaults,
) -> Result<(UnderwritingRequest, Vec<String>), Box<dyn std::error::Error>> {
    let (mut request, warnings) = if let Some(ref path) = args.input {
        args.reject_field_flags("--input")?;
        (input::file::read_json::<UnderwritingRequest>(path)?, Vec::new())
    } else if let Some(ref path) = args.form {
        let mut raw: RawUnderwritingRequest = input::file::read_json(path)?;
        args.overlay(&mut raw)?;
        resolve_raw_request(&raw, defaults)
    } else {
        match piped {
            Some(PipedRequest::Typed(request)) => {
                args.reject_field_flags("a typed request on stdin")?;
                (request, Vec::new())
            }
            Some(PipedRequest::Form(mut raw)) => {
                args.overlay(&mut raw)?;
                resolve_raw_request(&raw, defaults)
            }
            None if args.has_field_flags() => resolve_raw_request(&args.to_raw_request()?, defaults),
            None => {
                return Err(
                    "--purchase-price and --rent are required (or provide --input, --form or stdin)"
                        .into(),
                )
            }
        }
    };

    if args.itemize && matches!(request.expenses, ExpenseSource::Ratio { .. }) {
        request.expenses = ExpenseSource::Itemized {
            lines: expense_lines_from_overrides(&request.deal, defaults),
        };
    }
    Ok((request, warnings))
}

pub fn run_underwrite(
    args: DealArgs,
    defaults: &MarketDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let (request, parse_warnings) = load_request(&args, defaults)?;
    let mut output = analysis::underwrite(&request, defaults)?;
    let mut warnings = parse_warnings;
    warnings.append(&mut output.warnings);
    output.warnings = warnings;
    Ok(serde_json::to_value(output)?)
}

pub fn run_scenarios(
    args: DealArgs,
    defaults: &MarketDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let (request, parse_warnings) = load_request(&args, defaults)?;
    let output = analysis::underwrite(&request, defaults)?;
    let warnings: Vec<String> = parse_warnings.into_iter().chain(output.warnings).collect();
    let scenarios: Vec<Value> = output
        .result
        .scenarios
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<_, _>>()?;
    Ok(json!({
        "results": scenarios,
        "warnings": warnings,
    }))
}
