use crate::infra::{build_store, operator_session};
use clap::Args;
use matri_admin::config::ConsoleConfig;
use matri_admin::directory::{
    duplicate_reference_codes, AdminConsole, Agent, Effect, InMemoryRecordStore, Member,
    OperatorSession,
};
use matri_admin::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// JSON fixture to browse instead of the bundled sample directory.
    #[arg(long)]
    pub(crate) seed: Option<PathBuf>,
    /// Operator name shown on the demo session.
    #[arg(long, default_value = "demo-operator")]
    pub(crate) operator: String,
    /// Skip the moderation walkthrough and only print directory views.
    #[arg(long)]
    pub(crate) read_only: bool,
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        seed,
        operator,
        read_only,
    } = args;

    let store = Arc::new(build_store(seed.as_deref())?);
    let console = AdminConsole::new(Arc::clone(&store));
    let session = operator_session(&ConsoleConfig {
        seed_path: seed,
        operator,
        session_ttl_minutes: None,
    });

    println!("Admin console demo (operator {})", session.operator);

    let directory = console.refresh_directory(&session).await?.into_inner();
    println!("\nMember directory ({} members, newest first)", directory.len());
    for member in &directory {
        println!("  {}", member_line(member));
    }

    let agents = console.refresh_agents(&session).await?.into_inner();
    println!("\nAgents ({})", agents.len());
    for agent in &agents {
        let referred = console.select_agent(&session, agent).await?.into_inner();
        println!(
            "  {} [{}] referred {} member(s)",
            agent.name,
            agent.reference_code,
            referred.len()
        );
        for member in &referred {
            println!("    - {}", member.name);
        }
    }
    console.close_agent();
    for duplicate in duplicate_reference_codes(&agents) {
        println!(
            "  ! reference code {} is shared by {} agents",
            duplicate.reference_code,
            duplicate.agents.len()
        );
    }

    let queue = console.refresh_report_queue(&session).await?.into_inner();
    println!("\nReport queue ({})", queue.len());
    for member in &queue {
        println!("  {} -> {}", member.name, member.report_reason.join(", "));
    }

    if read_only {
        return Ok(());
    }

    run_moderation(&console, &session, &directory, &queue).await?;

    println!("\nBlobs remaining in storage: {}", store.blob_count());
    Ok(())
}

async fn run_moderation(
    console: &AdminConsole<InMemoryRecordStore>,
    session: &OperatorSession,
    directory: &[Member],
    queue: &[Member],
) -> Result<(), AppError> {
    println!("\nModeration walkthrough");

    if let Some(member) = directory.iter().find(|member| !member.verified_by_admin) {
        let first = console.verify(session, member).await?;
        let second = console.verify(session, &first.member).await?;
        println!(
            "  verify {}: {} then {}",
            member.name,
            effect_label(first.effect),
            effect_label(second.effect)
        );
    }

    if let Some(member) = queue.first() {
        let cleared = console.clear_report(session, member).await?;
        println!(
            "  clear report on {}: {} (reported={}, reasons={})",
            member.name,
            effect_label(cleared.effect),
            cleared.member.reported,
            cleared.member.report_reason.len()
        );
    }

    if let Some((member, photo)) = directory
        .iter()
        .find_map(|member| member.photos.first().map(|photo| (member, photo)))
    {
        let removal = console.remove_photo(session, member, photo).await?;
        println!(
            "  remove photo {} from {}: {} photo(s) left",
            photo,
            member.name,
            removal.member.photos.len()
        );
    }

    for warning in console.drain_warnings() {
        println!("  ! {warning}");
    }

    if let Some(member) = directory.first() {
        let referrers: Vec<Agent> = console.referring_agents(session, member).await?;
        let names: Vec<&str> = referrers.iter().map(|agent| agent.name.as_str()).collect();
        println!(
            "  {} was referred by: {}",
            member.name,
            if names.is_empty() {
                "no known agent".to_string()
            } else {
                names.join(", ")
            }
        );
    }

    Ok(())
}

fn effect_label(effect: Effect) -> &'static str {
    match effect {
        Effect::Applied => "applied",
        Effect::Unchanged => "unchanged",
    }
}

fn member_line(member: &Member) -> String {
    let created = member
        .created_at
        .map(|created_at| created_at.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".to_string());
    let mut flags = Vec::new();
    if member.verified_by_admin {
        flags.push("verified");
    }
    if member.reported {
        flags.push("reported");
    }
    format!(
        "{:<20} {:<10} {:<8} {}",
        member.name,
        created,
        member
            .agent_ref_code
            .as_ref()
            .map_or("-", |code| code.as_str()),
        flags.join(",")
    )
}
