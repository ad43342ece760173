//! Single access decisions.

use anyhow::Result;
use clap::Args;
use serde::Serialize;

use schoolgate_core::rbac::{PolicyDecision, StudentId, UserId};

use super::Session;
use crate::output::{self, OutputFormat};

#[derive(Args)]
pub struct CheckArgs {
    /// User id
    pub user: String,

    /// Permission key (e.g. students.read)
    pub permission: String,

    /// Student id owning the resource, for *Own permissions
    #[arg(long)]
    pub owner: Option<String>,

    /// Print the reason behind the decision
    #[arg(long)]
    pub explain: bool,
}

#[derive(Serialize)]
struct CheckResult<'a> {
    user: &'a str,
    permission: &'a str,
    owner: Option<&'a str>,
    allowed: bool,
    reason: String,
}

pub async fn execute(args: CheckArgs, session: &Session, format: OutputFormat) -> Result<()> {
    let user_id = UserId::new(&args.user);
    let owner = args.owner.as_deref().map(StudentId::new);

    let decision = session
        .gate
        .evaluate(&user_id, &args.permission, owner.as_ref())
        .await?;

    let reason = match &decision {
        PolicyDecision::Allow(reason) => reason.to_string(),
        PolicyDecision::Deny(reason) => reason.to_string(),
    };

    match format {
        OutputFormat::Table => {
            let subject = format!("{} -> {}", args.user, args.permission);
            if decision.is_allowed() {
                output::print_success(&subject);
            } else {
                output::print_denied(&subject);
            }
            if args.explain {
                output::print_detail("Reason", &reason);
            }
        }
        _ => output::print_item(
            &CheckResult {
                user: &args.user,
                permission: &args.permission,
                owner: args.owner.as_deref(),
                allowed: decision.is_allowed(),
                reason,
            },
            format,
        )?,
    }

    Ok(())
}
