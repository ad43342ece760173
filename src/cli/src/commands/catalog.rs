//! Catalog inspection: permissions, modules and a self-check.

use anyhow::{bail, Result};
use clap::Subcommand;
use serde::Serialize;
use tabled::Tabled;

use schoolgate_core::rbac::{ModuleDependencyGraph, ModuleKey, PermissionCatalog, SystemRole};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// List permission definitions
    Permissions {
        /// Only permissions of this module (e.g. paces)
        #[arg(short, long)]
        module: Option<String>,

        /// Only permissions listed for this role (e.g. TEACHER)
        #[arg(short, long)]
        role: Option<String>,
    },

    /// List modules with their dependencies and default grant roles
    Modules,

    /// Validate the catalog and the dependency graph
    Validate,
}

#[derive(Tabled, Serialize)]
struct PermissionRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Module")]
    module: String,
    #[tabled(rename = "Scope")]
    scope: String,
    #[tabled(rename = "Roles")]
    roles: String,
}

#[derive(Tabled, Serialize)]
struct ModuleRow {
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Requires")]
    requires: String,
    #[tabled(rename = "Default grants")]
    default_grants: String,
}

pub async fn execute(cmd: CatalogCommands, format: OutputFormat) -> Result<()> {
    let catalog = PermissionCatalog::standard();

    match cmd {
        CatalogCommands::Permissions { module, role } => {
            let module = match module {
                Some(key) => match ModuleKey::parse(&key) {
                    Some(m) => Some(m),
                    None => bail!("Unknown module: {}", key),
                },
                None => None,
            };
            let role = match role {
                Some(name) => match SystemRole::from_name(&name.to_uppercase()) {
                    Some(r) => Some(r),
                    None => bail!("Unknown role: {}", name),
                },
                None => None,
            };

            let rows: Vec<PermissionRow> = catalog
                .definitions()
                .iter()
                .filter(|d| module.map_or(true, |m| d.module == m))
                .filter(|d| role.map_or(true, |r| catalog.role_has_permission(r, d.key)))
                .map(|d| PermissionRow {
                    key: d.key.to_string(),
                    module: d.module.to_string(),
                    scope: d.scope.to_string(),
                    roles: SystemRole::all()
                        .into_iter()
                        .filter(|r| catalog.role_has_permission(*r, d.key))
                        .map(|r| r.name())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect();
            output::print_list(&rows, format)?;
        }

        CatalogCommands::Modules => {
            let graph = ModuleDependencyGraph::standard()?;
            let rows: Vec<ModuleRow> = ModuleKey::ALL
                .into_iter()
                .map(|m| ModuleRow {
                    key: m.as_str().to_string(),
                    name: m.display_name().to_string(),
                    requires: graph
                        .dependencies(m)
                        .map(|d| d.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                    default_grants: m
                        .default_grant_roles()
                        .iter()
                        .map(|r| r.name())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .collect();
            output::print_list(&rows, format)?;
        }

        CatalogCommands::Validate => {
            catalog.validate()?;
            let graph = ModuleDependencyGraph::standard()?;
            let order: Vec<&str> = graph.topological_order().iter().map(|m| m.as_str()).collect();

            match format {
                OutputFormat::Table => {
                    output::print_success("Catalog and dependency graph are valid");
                    output::print_detail("Permissions", &catalog.len().to_string());
                    output::print_detail("Dependencies", &graph.edges().count().to_string());
                    output::print_detail("Enable order", &order.join(" -> "));
                }
                _ => output::print_item(
                    &serde_json::json!({
                        "valid": true,
                        "permissions": catalog.len(),
                        "dependencies": graph.edges().count(),
                        "enable_order": order,
                    }),
                    format,
                )?,
            }
        }
    }

    Ok(())
}
