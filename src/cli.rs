//! Command-line interface for one-shot operations
//!
//! Each command runs against the gateway opened at startup and prints a
//! plain-text result. `serve` is handled by the binary itself.

use std::fmt::Write as _;
use std::path::PathBuf;

use clap::Subcommand;
use tracing::info;

use crate::assist::Suggester;
use crate::config::{BackendEndpoint, BackendSettings};
use crate::error::{CascadeError, Result};
use crate::gateway::{Gateway, SCHEMA_SQL};
use crate::import;
use crate::model::{
    Gender, IndicatorDraft, NewStaff, Perspective, PlanStatus, PlanType, Role, StaffId,
    StaffMember,
};
use crate::session;
use crate::store::LocalStore;
use crate::summary;
use crate::traversal::{self, ExpansionState};
use crate::workflow::{self, InterventionWorkflow, PlanForm};

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the HTTP dashboard (default)
    Serve,

    /// Show backend and snapshot status
    Status,

    /// Sign in by business key (NIP)
    Login {
        business_key: String,
    },

    /// Forget the signed-in member
    Logout,

    /// Show the signed-in member
    Whoami,

    /// Print the cascade matrix as an outline
    Tree {
        /// Plan ids to expand
        #[arg(short, long)]
        expand: Vec<String>,
        /// Expand every plan
        #[arg(long)]
        all: bool,
    },

    /// Create, intervene, edit and delete plans
    #[command(subcommand)]
    Plan(PlanCommands),

    /// Manage staff records
    #[command(subcommand)]
    Staff(StaffCommands),

    /// Organization counters and the progress table
    Summary {
        /// Filter by name or business key
        #[arg(short, long, default_value = "")]
        search: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// A member's plans (defaults to the signed-in member)
    MyPlans {
        id: Option<StaffId>,
    },

    /// Part-time members and the leaders' plans
    PartTime {
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Backend connection settings
    #[command(subcommand)]
    Settings(SettingsCommands),
}

/// Shared form fields of plan commands
#[derive(Debug, clap::Args)]
pub struct PlanFields {
    #[arg(short, long)]
    pub title: Option<String>,
    #[arg(short, long)]
    pub description: Option<String>,
    /// Utama or Tambahan
    #[arg(long = "type")]
    pub plan_type: Option<PlanType>,
    /// Draft, Review or Approved
    #[arg(long)]
    pub status: Option<PlanStatus>,
    /// Indicator as "text|target|perspective"; repeatable
    #[arg(short, long = "indicator", value_parser = parse_indicator)]
    pub indicators: Vec<IndicatorDraft>,
}

impl PlanFields {
    fn apply(self, form: &mut PlanForm) {
        if let Some(title) = self.title {
            form.title = title;
        }
        if let Some(description) = self.description {
            form.description = description;
        }
        if let Some(t) = self.plan_type {
            form.plan_type = t;
        }
        if let Some(s) = self.status {
            form.status = s;
        }
        if !self.indicators.is_empty() {
            form.indicators = self.indicators;
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum PlanCommands {
    /// New top-level plan
    Add {
        /// Owner id (defaults to the signed-in member)
        #[arg(long)]
        owner: Option<StaffId>,
        #[command(flatten)]
        fields: PlanFields,
    },

    /// Cascade a plan to a direct subordinate of its owner
    Intervene {
        parent: String,
        target: StaffId,
        /// Pre-fill from the suggestion service; explicit fields still win
        #[arg(long)]
        suggest: bool,
        #[command(flatten)]
        fields: PlanFields,
    },

    /// Edit an existing plan
    Edit {
        id: String,
        #[command(flatten)]
        fields: PlanFields,
    },

    /// Delete a plan and everything cascaded from it
    Delete {
        id: String,
    },

    /// Members a plan can be cascaded to
    Targets {
        parent: String,
    },

    /// Show a suggested intervention without saving it
    Suggest {
        parent: String,
        target: StaffId,
    },
}

#[derive(Debug, Subcommand)]
pub enum StaffCommands {
    /// List staff records
    List {
        #[arg(short, long, default_value = "")]
        search: String,
    },

    /// Add a staff member
    Add {
        business_key: String,
        name: String,
        #[arg(short, long, default_value = "")]
        position: String,
        #[arg(short, long, default_value = "PELAKSANA")]
        role: Role,
        /// L or P
        #[arg(short, long)]
        gender: Gender,
        #[arg(long)]
        superior: Option<StaffId>,
        #[arg(long)]
        part_time: bool,
    },

    /// Update fields of a staff member
    Update {
        id: StaffId,
        #[arg(long)]
        business_key: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        position: Option<String>,
        #[arg(long)]
        role: Option<Role>,
        #[arg(long)]
        gender: Option<Gender>,
        #[arg(long, conflicts_with = "no_superior")]
        superior: Option<StaffId>,
        /// Detach from the current superior
        #[arg(long)]
        no_superior: bool,
        #[arg(long)]
        part_time: Option<bool>,
    },

    /// Delete a staff member and their plans
    Delete {
        id: StaffId,
    },

    /// Import staff from a JSON array of rows
    Import {
        file: PathBuf,
        /// Create the rows; without it only the preview is printed
        #[arg(long)]
        commit: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum SettingsCommands {
    /// Show the active and saved backend endpoints
    Show,

    /// Save a backend endpoint override (used from the next start)
    Set {
        url: String,
        key: String,
    },

    /// Remove the saved override
    Clear,

    /// Print the backend schema
    Schema,

    /// Create or refresh the default administrator record
    SeedAdmin,
}

/// Parse "text|target|perspective"; the perspective defaults to Kualitas
pub fn parse_indicator(s: &str) -> std::result::Result<IndicatorDraft, String> {
    let mut parts = s.split('|').map(str::trim);
    let text = parts.next().unwrap_or_default();
    let target = parts.next().unwrap_or_default();
    if text.is_empty() || target.is_empty() {
        return Err(format!("expected \"text|target[|perspective]\", got \"{}\"", s));
    }
    let perspective = match parts.next() {
        Some(p) if !p.is_empty() => p.parse::<Perspective>().map_err(|e| e.to_string())?,
        _ => Perspective::default(),
    };
    Ok(IndicatorDraft {
        text: text.to_string(),
        target: target.to_string(),
        perspective,
    })
}

/// What commands run against
pub struct CliContext<'a> {
    pub gateway: &'a Gateway,
    pub store: &'a LocalStore,
    pub suggester: &'a dyn Suggester,
    pub backend: Option<&'a BackendSettings>,
}

impl CliContext<'_> {
    async fn signed_in(&self) -> Result<StaffMember> {
        let snap = self.gateway.snapshot().await;
        session::restore(self.store, &snap.org)?
            .ok_or_else(|| CascadeError::NotFound("nobody is signed in; run `login` first".into()))
    }

    async fn member_or_self(&self, id: Option<StaffId>) -> Result<StaffId> {
        match id {
            Some(id) => Ok(id),
            None => Ok(self.signed_in().await?.id),
        }
    }
}

/// Execute a command and return its printable output
pub async fn execute_command(ctx: &CliContext<'_>, command: Commands) -> Result<String> {
    match command {
        Commands::Serve => Ok("serve is handled by the binary".to_string()),

        Commands::Status => {
            let snap = ctx.gateway.snapshot().await;
            let mut out = String::new();
            let _ = writeln!(out, "Backend:    {:?}", ctx.gateway.backend_kind());
            let _ = writeln!(out, "Source:     {:?}", snap.source);
            if let Some(b) = ctx.backend {
                let _ = writeln!(out, "Endpoint:   {} ({:?})", b.endpoint.url, b.source);
            }
            let _ = writeln!(out, "Generation: {}", snap.generation);
            let _ = writeln!(out, "Loaded at:  {}", snap.loaded_at.to_rfc3339());
            let _ = writeln!(out, "Staff:      {}", snap.org.len());
            let _ = writeln!(out, "Plans:      {}", snap.goals.len());
            let _ = writeln!(out, "Assist:     {}", ctx.suggester.is_available());
            for w in &snap.warnings {
                let _ = writeln!(out, "warning: {}", w);
            }
            Ok(out)
        }

        Commands::Login { business_key } => {
            let snap = ctx.gateway.snapshot().await;
            let member = session::login(ctx.store, &snap.org, &business_key)?;
            Ok(format!("Signed in as {}", format_member(&member)))
        }

        Commands::Logout => {
            session::logout(ctx.store)?;
            Ok("Signed out".to_string())
        }

        Commands::Whoami => Ok(format_member(&ctx.signed_in().await?)),

        Commands::Tree { expand, all } => {
            let snap = ctx.gateway.snapshot().await;
            let mut expanded = ExpansionState::new();
            if all {
                for plan in snap.goals.plans() {
                    expanded.expand(&plan.id);
                }
            }
            for id in &expand {
                expanded.expand(id);
            }
            let tree = traversal::render(&snap.goals, &snap.org, &expanded);
            Ok(traversal::render_outline(&tree))
        }

        Commands::Plan(cmd) => execute_plan(ctx, cmd).await,
        Commands::Staff(cmd) => execute_staff(ctx, cmd).await,
        Commands::Settings(cmd) => execute_settings(ctx, cmd).await,

        Commands::Summary { search, limit } => {
            let snap = ctx.gateway.snapshot().await;
            let s = summary::org_summary(&snap.org, &snap.goals);
            let mut out = String::new();
            let _ = writeln!(out, "Staff: {}  Plans: {}  Draft: {}  Without plans: {}",
                s.total_staff, s.total_plans, s.draft_plans, s.subordinates_without_plans);
            for row in summary::progress(&snap.org, &snap.goals, &search, limit) {
                let _ = writeln!(
                    out,
                    "{:<8} {:<32} {:<10} {:>3} {}",
                    row.staff_id,
                    row.name,
                    row.role.as_str(),
                    row.plan_count,
                    if row.filled { "filled" } else { "empty" }
                );
            }
            Ok(out)
        }

        Commands::MyPlans { id } => {
            let id = ctx.member_or_self(id).await?;
            let snap = ctx.gateway.snapshot().await;
            let mine = summary::my_plans(&snap.org, &snap.goals, &id)
                .ok_or_else(|| CascadeError::NotFound(format!("unknown staff member {}", id)))?;

            let mut out = String::new();
            let _ = writeln!(out, "{}", format_member(&mine.member));
            if let Some(sup) = &mine.superior {
                let _ = writeln!(out, "Reports to {}", format_member(sup));
            }
            if mine.plans.is_empty() {
                let _ = writeln!(out, "(no plans yet)");
            }
            for own in &mine.plans {
                let _ = writeln!(
                    out,
                    "- [{}] {} ({}, {})",
                    own.plan.id,
                    own.plan.title,
                    own.plan.plan_type.as_str(),
                    own.plan.status.as_str()
                );
                if let Some(parent) = &own.parent_title {
                    let _ = writeln!(out, "    from: {}", parent);
                }
            }
            Ok(out)
        }

        Commands::PartTime { search } => {
            let snap = ctx.gateway.snapshot().await;
            let mut out = String::new();
            let roster = summary::part_time_roster(&snap.org, &snap.goals, &search);
            if roster.is_empty() {
                let _ = writeln!(out, "(no part-time members)");
            }
            for entry in roster {
                let _ = writeln!(out, "{} - {} plans", format_member(&entry.member), entry.plans.len());
            }
            let _ = writeln!(out, "Leader plans:");
            for plan in summary::leader_plans(&snap.org, &snap.goals, "") {
                let _ = writeln!(out, "- [{}] {}", plan.id, plan.title);
            }
            Ok(out)
        }
    }
}

async fn execute_plan(ctx: &CliContext<'_>, command: PlanCommands) -> Result<String> {
    let snap = ctx.gateway.snapshot().await;
    let mut wf = InterventionWorkflow::new();

    let fields = match command {
        PlanCommands::Add { owner, fields } => {
            let owner = ctx.member_or_self(owner).await?;
            wf.open_top_level(&snap, &owner)?;
            fields
        }

        PlanCommands::Intervene {
            parent,
            target,
            suggest,
            fields,
        } => {
            wf.open_intervention(&snap, &parent, &target)?;
            if suggest && !wf.request_suggestion(&snap, ctx.suggester).await? {
                info!(parent = %parent, "No suggestion returned; using given fields");
            }
            fields
        }

        PlanCommands::Edit { id, fields } => {
            wf.open_edit(&snap, &id)?;
            fields
        }

        PlanCommands::Delete { id } => {
            let removed = ctx.gateway.delete_plan(&id).await?;
            return Ok(format!("Deleted {} plans: {}", removed.len(), removed.join(", ")));
        }

        PlanCommands::Targets { parent } => {
            let targets = workflow::intervention_targets(&snap, &parent)?;
            if targets.is_empty() {
                return Ok("(no direct subordinates to cascade to)".to_string());
            }
            return Ok(targets.into_iter().map(format_member).collect::<Vec<_>>().join("\n"));
        }

        PlanCommands::Suggest { parent, target } => {
            wf.open_intervention(&snap, &parent, &target)?;
            if !wf.request_suggestion(&snap, ctx.suggester).await? {
                return Ok("(no suggestion)".to_string());
            }
            return Ok(wf.form().map(format_form).unwrap_or_default());
        }
    };

    if let Some(form) = wf.form_mut() {
        fields.apply(form);
    }
    let id = wf.submit(ctx.gateway).await?;
    Ok(format!("Saved plan {}", id))
}

async fn execute_staff(ctx: &CliContext<'_>, command: StaffCommands) -> Result<String> {
    match command {
        StaffCommands::List { search } => {
            let snap = ctx.gateway.snapshot().await;
            let needle = search.trim().to_lowercase();
            let lines: Vec<String> = snap
                .org
                .members()
                .iter()
                .filter(|m| {
                    needle.is_empty()
                        || m.name.to_lowercase().contains(&needle)
                        || m.business_key.contains(&needle)
                })
                .map(|m| {
                    format!(
                        "{} superior={}{}",
                        format_member(m),
                        m.superior_id.as_deref().unwrap_or("-"),
                        if m.is_part_time { " part-time" } else { "" }
                    )
                })
                .collect();
            Ok(lines.join("\n"))
        }

        StaffCommands::Add {
            business_key,
            name,
            position,
            role,
            gender,
            superior,
            part_time,
        } => {
            let id = ctx
                .gateway
                .create_staff(NewStaff {
                    business_key,
                    name,
                    position,
                    role,
                    gender,
                    superior_id: superior,
                    is_part_time: part_time,
                })
                .await?;
            Ok(format!("Created staff member {}", id))
        }

        StaffCommands::Update {
            id,
            business_key,
            name,
            position,
            role,
            gender,
            superior,
            no_superior,
            part_time,
        } => {
            let snap = ctx.gateway.snapshot().await;
            let mut member = snap
                .org
                .get(&id)
                .cloned()
                .ok_or_else(|| CascadeError::NotFound(format!("unknown staff member {}", id)))?;

            if let Some(v) = business_key {
                member.business_key = v;
            }
            if let Some(v) = name {
                member.name = v;
            }
            if let Some(v) = position {
                member.position = v;
            }
            if let Some(v) = role {
                member.role = v;
            }
            if let Some(v) = gender {
                member.gender = v;
            }
            if no_superior {
                member.superior_id = None;
            } else if superior.is_some() {
                member.superior_id = superior;
            }
            if let Some(v) = part_time {
                member.is_part_time = v;
            }

            ctx.gateway.update_staff(member).await?;
            Ok(format!("Updated staff member {}", id))
        }

        StaffCommands::Delete { id } => {
            let removed = ctx.gateway.delete_staff(&id).await?;
            Ok(format!("Deleted staff member {} and {} plans", id, removed.len()))
        }

        StaffCommands::Import { file, commit } => {
            let input = std::fs::read_to_string(&file)?;
            let snap = ctx.gateway.snapshot().await;
            let preview = import::preview_json(&input, &snap.org)?;

            let mut out = String::new();
            let _ = writeln!(out, "{} rows accepted, {} rejected", preview.accepted.len(), preview.rejected.len());
            for r in &preview.rejected {
                let _ = writeln!(out, "  row {}: {}", r.row, r.reason);
            }

            if !commit {
                let _ = writeln!(out, "Dry run; pass --commit to create the accepted rows");
            } else if !preview.is_clean() {
                let _ = writeln!(out, "Nothing imported; fix the rejected rows first");
            } else {
                let created = ctx.gateway.bulk_create_staff(preview.accepted).await?;
                let _ = writeln!(out, "Imported {} staff members", created.len());
            }
            Ok(out)
        }
    }
}

async fn execute_settings(ctx: &CliContext<'_>, command: SettingsCommands) -> Result<String> {
    match command {
        SettingsCommands::Show => {
            let mut out = String::new();
            match ctx.backend {
                Some(b) => {
                    let _ = writeln!(out, "Active:  {} key={} ({:?})", b.endpoint.url, b.endpoint.masked_key(), b.source);
                }
                None => {
                    let _ = writeln!(out, "Active:  none (in-memory demo data)");
                }
            }
            match ctx.store.backend_override()? {
                Some(e) => {
                    let _ = writeln!(out, "Saved:   {} key={}", e.url, e.masked_key());
                }
                None => {
                    let _ = writeln!(out, "Saved:   none");
                }
            }
            Ok(out)
        }

        SettingsCommands::Set { url, key } => {
            let endpoint = BackendEndpoint::new(&url, &key)?;
            ctx.store.set_backend_override(&endpoint)?;
            Ok(format!("Saved {}; restart to connect", endpoint.url))
        }

        SettingsCommands::Clear => {
            ctx.store.clear_backend_override()?;
            Ok("Override cleared; restart to apply".to_string())
        }

        SettingsCommands::Schema => Ok(SCHEMA_SQL.to_string()),

        SettingsCommands::SeedAdmin => {
            let id = ctx.gateway.seed_admin().await?;
            Ok(format!("Administrator record is {}", id))
        }
    }
}

fn format_member(m: &StaffMember) -> String {
    format!("[{}] {} ({}) {} - {}", m.id, m.name, m.business_key, m.role, m.position)
}

fn format_form(form: &PlanForm) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Title:       {}", form.title);
    let _ = writeln!(out, "Description: {}", form.description);
    for ind in &form.indicators {
        let _ = writeln!(out, "  * {} -> {} ({})", ind.text, ind.target, ind.perspective);
    }
    out
}
