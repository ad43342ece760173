//! Access profile of a user.

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use schoolgate_core::rbac::UserId;

use super::Session;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct ProfileArgs {
    /// User id
    pub user: String,
}

#[derive(Tabled, Serialize)]
struct ModuleRow {
    #[tabled(rename = "Module")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Actions")]
    actions: String,
}

pub async fn execute(args: ProfileArgs, session: &Session, format: OutputFormat) -> Result<()> {
    let profile = session.gate.build_profile(&UserId::new(&args.user)).await?;

    if format != OutputFormat::Table {
        return output::print_item(&profile, format);
    }

    output::print_header(&format!("Access profile: {}", args.user));
    if profile.is_empty() {
        println!("No permissions.");
        return Ok(());
    }

    let rows: Vec<ModuleRow> = profile
        .modules
        .iter()
        .map(|m| ModuleRow {
            key: m.key.clone(),
            name: m.name.clone(),
            actions: profile.actions_for(&m.key).join(", "),
        })
        .collect();
    output::print_list(&rows, format)?;
    output::print_detail("Permissions", &profile.permissions.len().to_string());
    Ok(())
}
