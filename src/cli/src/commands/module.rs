//! Module lifecycle per school.

use anyhow::Result;
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use schoolgate_core::directory::Directory;
use schoolgate_core::rbac::{ModuleFilter, ModuleId, ModuleKey, SchoolId};

use super::Session;
use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ModuleCommands {
    /// Activate a module for a school and grant it to its default roles
    Enable {
        /// School id
        school: String,

        /// Module id or key
        module: String,

        /// Write the result back to the snapshot file
        #[arg(long)]
        save: bool,
    },

    /// Deactivate a module for a school
    Disable {
        /// School id
        school: String,

        /// Module id or key
        module: String,

        /// Write the result back to the snapshot file
        #[arg(long)]
        save: bool,
    },

    /// Show module activation for a school
    Status {
        /// School id
        school: String,
    },
}

#[derive(Tabled, Serialize)]
struct StatusRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Active")]
    active: bool,
    #[tabled(rename = "Requires")]
    requires: String,
}

pub async fn execute(cmd: ModuleCommands, session: &Session, format: OutputFormat) -> Result<()> {
    match cmd {
        ModuleCommands::Enable { school, module, save } => {
            let record = session.resolve_module(&module).await?;
            session
                .gate
                .enable_module(&SchoolId::new(&school), &record.id)
                .await?;
            if save {
                session.save()?;
            }
            output::print_success(&format!("Enabled {} for {}", record.key, school));
        }

        ModuleCommands::Disable { school, module, save } => {
            let record = session.resolve_module(&module).await?;
            session
                .gate
                .disable_module(&SchoolId::new(&school), &record.id)
                .await?;
            if save {
                session.save()?;
            }
            output::print_success(&format!("Disabled {} for {}", record.key, school));
        }

        ModuleCommands::Status { school } => {
            let school_id = SchoolId::new(&school);
            let mut modules = session.directory.list_modules(&ModuleFilter::all()).await?;
            modules.sort_by(|a, b| a.display_order.cmp(&b.display_order).then_with(|| a.key.cmp(&b.key)));

            let ids: Vec<ModuleId> = modules.iter().map(|m| m.id.clone()).collect();
            let activations = session
                .directory
                .list_school_module_activations(&school_id, &ids)
                .await?;

            let rows: Vec<StatusRow> = modules
                .into_iter()
                .map(|m| {
                    let active = activations
                        .iter()
                        .any(|a| a.module_id == m.id && a.is_active);
                    let requires = ModuleKey::parse(&m.key)
                        .map(|key| {
                            session
                                .gate
                                .graph()
                                .dependencies(key)
                                .map(|d| d.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default();
                    StatusRow {
                        key: m.key,
                        name: m.name,
                        active,
                        requires,
                    }
                })
                .collect();
            output::print_list(&rows, format)?;
        }
    }

    Ok(())
}
