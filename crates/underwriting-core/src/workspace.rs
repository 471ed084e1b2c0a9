use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::analysis::{UnderwritingReport, UnderwritingRequest};
use crate::error::UnderwritingError;
use crate::UnderwritingResult;

/// A saved underwriting session: the inputs plus the result computed from
/// them at save time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceRecord {
    pub id: String,
    pub name: String,
    pub saved_at: DateTime<Utc>,
    pub request: UnderwritingRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<UnderwritingReport>,
}

impl WorkspaceRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        request: UnderwritingRequest,
        result: Option<UnderwritingReport>,
    ) -> Self {
        WorkspaceRecord {
            id: id.into(),
            name: name.into(),
            saved_at: Utc::now(),
            request,
            result,
        }
    }
}

/// Listing entry for a saved workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceSummary {
    pub id: String,
    pub name: String,
    pub saved_at: DateTime<Utc>,
}

/// Directory of JSON workspace blobs, one `<id>.json` file per workspace.
#[derive(Debug, Clone)]
pub struct WorkspaceStore {
    dir: PathBuf,
}

/// Workspace ids become file names, so only `[A-Za-z0-9_-]` is allowed.
pub fn validate_id(id: &str) -> UnderwritingResult<()> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(UnderwritingError::InvalidInput {
            field: "workspace_id".into(),
            reason: format!("'{id}' must be 1-128 characters of letters, digits, '-' or '_'"),
        })
    }
}

impl WorkspaceStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> UnderwritingResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(WorkspaceStore { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> UnderwritingResult<PathBuf> {
        validate_id(id)?;
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Write a record, replacing any existing workspace with the same id.
    pub fn save(&self, record: &WorkspaceRecord) -> UnderwritingResult<PathBuf> {
        let path = self.path_for(&record.id)?;
        let json = serde_json::to_string_pretty(record)?;
        // Write to a sibling temp file first so a failed write never
        // truncates an existing workspace.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &path)?;
        debug!(id = record.id.as_str(), path = %path.display(), "workspace saved");
        Ok(path)
    }

    pub fn load(&self, id: &str) -> UnderwritingResult<WorkspaceRecord> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Err(UnderwritingError::Workspace(format!(
                "workspace '{id}' not found"
            )));
        }
        let contents = fs::read_to_string(&path)?;
        let record: WorkspaceRecord = serde_json::from_str(&contents)?;
        Ok(record)
    }

    /// All readable workspaces, newest first. Unreadable files are skipped.
    pub fn list(&self) -> UnderwritingResult<Vec<WorkspaceSummary>> {
        let mut summaries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let parsed = fs::read_to_string(&path)
                .map_err(UnderwritingError::from)
                .and_then(|s| serde_json::from_str::<WorkspaceRecord>(&s).map_err(Into::into));
            match parsed {
                Ok(record) => summaries.push(WorkspaceSummary {
                    id: record.id,
                    name: record.name,
                    saved_at: record.saved_at,
                }),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "skipping unreadable workspace")
                }
            }
        }
        summaries.sort_by(|a, b| b.saved_at.cmp(&a.saved_at));
        Ok(summaries)
    }

    /// Remove a workspace. Returns false if it did not exist.
    pub fn delete(&self, id: &str) -> UnderwritingResult<bool> {
        let path = self.path_for(id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::build_report;
    use crate::income::{ExpenseSource, IncomeSource, OperatingExpenseLine, RentRollUnit, UnitStatus};
    use crate::market::MarketDefaults;
    use crate::metrics::DealInput;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn sample_request() -> UnderwritingRequest {
        UnderwritingRequest {
            deal: DealInput {
                purchase_price: dec!(850000),
                down_payment_percent: dec!(30),
                interest_rate_percent: dec!(6.75),
                loan_term_years: 25,
                closing_cost_percent: Some(dec!(2.5)),
                annual_insurance: Some(dec!(3200)),
                units: Some(6),
                square_feet: Some(5400),
                ..DealInput::default()
            },
            income: IncomeSource::RentRoll {
                units: vec![RentRollUnit {
                    unit: Some("101".into()),
                    monthly_rent: dec!(1450.50),
                    market_rent: dec!(1500),
                    status: UnitStatus::Notice,
                }],
            },
            expenses: ExpenseSource::Itemized {
                lines: vec![OperatingExpenseLine::annual("insurance", dec!(3200))],
            },
        }
    }

    #[test]
    fn test_save_load_round_trip_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        let request = sample_request();
        let report = build_report(&request, &MarketDefaults::default());
        let record = WorkspaceRecord::new("deal-1", "Riverside Apartments", request, Some(report));

        store.save(&record).unwrap();
        let loaded = store.load("deal-1").unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_list_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        store
            .save(&WorkspaceRecord::new("a", "First", sample_request(), None))
            .unwrap();
        store
            .save(&WorkspaceRecord::new("b", "Second", sample_request(), None))
            .unwrap();
        fs::write(dir.path().join("junk.json"), "not json").unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 2);

        assert!(store.delete("a").unwrap());
        assert!(!store.delete("a").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_workspace() {
        let dir = tempfile::tempdir().unwrap();
        let store = WorkspaceStore::open(dir.path()).unwrap();
        assert!(matches!(
            store.load("nope"),
            Err(UnderwritingError::Workspace(_))
        ));
    }

    #[test]
    fn test_ids_cannot_escape_store() {
        assert!(validate_id("../etc/passwd").is_err());
        assert!(validate_id("").is_err());
        assert!(validate_id("with space").is_err());
        assert!(validate_id("deal_2024-Q1").is_ok());
    }
}
