//! Snapshot file management.

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use std::path::PathBuf;

use schoolgate_core::directory::memory::{standard_module_id, standard_role_id};
use schoolgate_core::directory::{InMemoryDirectory, UserRecord};
use schoolgate_core::rbac::{ModuleKey, SchoolId, SystemRole};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Write a snapshot with the system roles and one row per module
    Init {
        /// Destination file (.json or .toml)
        file: PathBuf,

        /// Also add a sample school with one user per role
        #[arg(long)]
        demo: bool,

        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn execute(cmd: SnapshotCommands, format: OutputFormat) -> Result<()> {
    match cmd {
        SnapshotCommands::Init { file, demo, force } => {
            if file.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", file.display());
            }

            let directory = InMemoryDirectory::with_standard_catalog();
            if demo {
                seed_demo(&directory);
            }
            let snapshot = directory.to_snapshot();
            snapshot
                .save(&file)
                .with_context(|| format!("Failed to write {}", file.display()))?;

            match format {
                OutputFormat::Table => {
                    output::print_success(&format!("Wrote {}", file.display()));
                    output::print_detail("Roles", &snapshot.roles.len().to_string());
                    output::print_detail("Modules", &snapshot.modules.len().to_string());
                    output::print_detail("Users", &snapshot.users.len().to_string());
                }
                _ => output::print_item(
                    &serde_json::json!({
                        "file": file.display().to_string(),
                        "roles": snapshot.roles.len(),
                        "modules": snapshot.modules.len(),
                        "users": snapshot.users.len(),
                    }),
                    format,
                )?,
            }
        }
    }
    Ok(())
}

/// One user per role in `demo-school`, with `students` active.
fn seed_demo(directory: &InMemoryDirectory) {
    let school = SchoolId::new("demo-school");

    directory.insert_user(UserRecord::new("superadmin").with_role(standard_role_id(SystemRole::Superadmin)));
    directory.insert_user(
        UserRecord::new("school-admin")
            .in_school(school.as_str())
            .with_role(standard_role_id(SystemRole::SchoolAdmin)),
    );
    directory.insert_user(
        UserRecord::new("teacher")
            .in_school(school.as_str())
            .with_role(standard_role_id(SystemRole::Teacher)),
    );
    directory.insert_user(
        UserRecord::new("parent")
            .in_school(school.as_str())
            .with_role(standard_role_id(SystemRole::Parent))
            .with_linked_student("student-1"),
    );
    directory.insert_user(
        UserRecord::new("student")
            .in_school(school.as_str())
            .with_role(standard_role_id(SystemRole::Student))
            .as_student("student-1"),
    );

    let students = standard_module_id(ModuleKey::Students);
    directory.set_activation(&school, &students, true);
    for role in ModuleKey::Students.default_grant_roles() {
        directory.grant(&standard_role_id(*role), &school, &students);
    }
}
