use clap::{Args, Subcommand};
use serde_json::{json, Value};

use underwriting_core::analysis;
use underwriting_core::market::MarketDefaults;
use underwriting_core::workspace::{WorkspaceRecord, WorkspaceStore};

use super::underwrite::{load_request, DealArgs};

/// Arguments for saved workspaces
#[derive(Args, Debug)]
pub struct WorkspaceArgs {
    /// Directory holding workspace files
    #[arg(long, default_value = ".uwc/workspaces", global = true)]
    pub dir: String,

    #[command(subcommand)]
    pub action: WorkspaceAction,
}

#[derive(Subcommand, Debug)]
pub enum WorkspaceAction {
    /// Underwrite a deal and save inputs and result under an id
    Save {
        /// Workspace id (letters, digits, '-' or '_')
        #[arg(long)]
        id: String,

        /// Display name; defaults to the id
        #[arg(long)]
        name: Option<String>,

        #[command(flatten)]
        deal: DealArgs,
    },
    /// Print a saved workspace
    Load {
        #[arg(long)]
        id: String,
    },
    /// List saved workspaces, newest first
    List,
    /// Delete a saved workspace
    Delete {
        #[arg(long)]
        id: String,
    },
}

pub fn run_workspace(
    args: WorkspaceArgs,
    defaults: &MarketDefaults,
) -> Result<Value, Box<dyn std::error::Error>> {
    let store = WorkspaceStore::open(&args.dir)?;

    match args.action {
        WorkspaceAction::Save { id, name, deal } => {
            let (request, _) = load_request(&deal, defaults)?;
            let output = analysis::underwrite(&request, defaults)?;
            let record = WorkspaceRecord::new(
                id.clone(),
                name.unwrap_or_else(|| id.clone()),
                request,
                Some(output.result),
            );
            let path = store.save(&record)?;
            Ok(json!({
                "id": record.id,
                "name": record.name,
                "saved_at": record.saved_at,
                "path": path.display().to_string(),
            }))
        }
        WorkspaceAction::Load { id } => Ok(serde_json::to_value(store.load(&id)?)?),
        WorkspaceAction::List => Ok(json!({ "results": store.list()? })),
        WorkspaceAction::Delete { id } => {
            let deleted = store.delete(&id)?;
            if !deleted {
                return Err(format!("workspace '{id}' not found").into());
            }
            Ok(json!({ "id": id, "deleted": true }))
        }
    }
}
