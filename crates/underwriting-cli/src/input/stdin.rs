use serde_json::Value;
use std::io::{self, Read};

use underwriting_core::analysis::{RawUnderwritingRequest, UnderwritingRequest};

/// A request piped in on stdin.
#[derive(Debug)]
pub enum PipedRequest {
    /// Carries an `income` or `expenses` object
    Typed(UnderwritingRequest),
    /// Form-style fields, normalised before use
    Form(RawUnderwritingRequest),
}

impl PipedRequest {
    pub fn from_value(data: Value) -> Result<Self, Box<dyn std::error::Error>> {
        if data.get("income").is_some() || data.get("expenses").is_some() {
            Ok(PipedRequest::Typed(serde_json::from_value(data)?))
        } else {
            Ok(PipedRequest::Form(serde_json::from_value(data)?))
        }
    }
}

/// Read an underwriting request piped on stdin.
/// Returns None if stdin is a TTY (interactive) or empty.
pub fn read_request() -> Result<Option<PipedRequest>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;

    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let data: Value =
        serde_json::from_str(trimmed).map_err(|e| format!("Failed to parse stdin: {e}"))?;
    PipedRequest::from_value(data).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_income_object_marks_typed_request() {
        let data = json!({
            "deal": {
                "purchase_price": "300000",
                "down_payment_percent": "25",
                "interest_rate_percent": "6",
                "loan_term_years": 30,
                "gross_monthly_rent": "3400",
                "vacancy_rate_percent": "5",
                "operating_expense_ratio_percent": "35"
            },
            "income": {"mode": "manual", "gross_monthly_rent": "3400", "vacancy_rate_percent": "5"},
            "expenses": {"mode": "ratio", "percent": "35"}
        });
        assert!(matches!(
            PipedRequest::from_value(data).unwrap(),
            PipedRequest::Typed(_)
        ));
    }

    #[test]
    fn test_plain_fields_are_a_form() {
        let data = json!({"deal": {"purchase_price": "$300,000", "gross_monthly_rent": 3400}});
        assert!(matches!(
            PipedRequest::from_value(data).unwrap(),
            PipedRequest::Form(_)
        ));
    }
}
