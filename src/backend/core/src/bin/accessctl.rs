//! accessctl - administrative command-line interface for the access control core
//!
//! Sweeps the token blacklist, reports logout and role statistics, exports
//! and prunes the audit trail, and applies database migrations.

use access_core::{
    app::AppState,
    audit::{AuditFilter, ExportFormat},
    config::Config,
    db::{Database, DatabaseHealth},
    rbac::UserId,
    session::LogoutStats,
    telemetry::{init_logging, LogFormat, LoggingConfig},
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;
use tabled::{
    settings::{object::Columns, Alignment, Modify, Style},
    Table, Tabled,
};

// ═══════════════════════════════════════════════════════════════════════════════
// CLI Structure
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Parser)]
#[command(
    name = "accessctl",
    version,
    about = "Administer roles, sessions and the audit trail",
    propagate_version = true
)]
struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Configuration file path (environment variables still override it)
    #[arg(short, long, global = true, env = "ACCESS_CONFIG")]
    config: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Acting administrator recorded in the audit trail
    #[arg(long, global = true, env = "ACCESS_ACTOR")]
    actor: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Table,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove expired entries from the token blacklist
    SweepTokens,

    /// Show token blacklist statistics
    LogoutStats,

    /// Show how many users hold each role
    RoleDistribution,

    /// Export audit records as JSON or CSV
    AuditExport {
        /// Export format
        #[arg(long, value_enum, default_value = "json")]
        export_format: ExportFormatArg,

        /// Only records for this user
        #[arg(long)]
        user: Option<String>,

        /// Only records with this action (e.g. user_logout)
        #[arg(long)]
        action: Option<String>,

        /// Earliest creation time (RFC 3339)
        #[arg(long)]
        since: Option<DateTime<Utc>>,

        /// Latest creation time (RFC 3339)
        #[arg(long)]
        until: Option<DateTime<Utc>>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete audit records older than the retention period
    AuditCleanup {
        /// Retention in days; defaults to the configured value
        #[arg(long)]
        retention_days: Option<i64>,
    },

    /// Apply pending database migrations
    Migrate,

    /// Probe the database and the blacklist cache
    Health,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormatArg {
    Json,
    Csv,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Csv => ExportFormat::Csv,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Table Rows
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize, Tabled)]
struct RoleRow {
    #[tabled(rename = "Role")]
    role: String,
    #[tabled(rename = "Users")]
    count: u64,
}

// ═══════════════════════════════════════════════════════════════════════════════
// Output Helpers
// ═══════════════════════════════════════════════════════════════════════════════

struct OutputHelper {
    format: OutputFormat,
}

impl OutputHelper {
    fn new(format: OutputFormat, no_color: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format }
    }

    fn is_json(&self) -> bool {
        matches!(self.format, OutputFormat::Json)
    }

    fn print_success(&self, message: &str) {
        if self.is_json() {
            println!("{}", serde_json::json!({ "status": "success", "message": message }));
        } else {
            println!("{} {}", "[OK]".green().bold(), message);
        }
    }

    fn print_error(&self, message: &str) {
        if self.is_json() {
            eprintln!("{}", serde_json::json!({ "status": "error", "message": message }));
        } else {
            eprintln!("{} {}", "[ERROR]".red().bold(), message);
        }
    }

    fn print_table<T: Tabled + Serialize>(&self, items: &[T]) -> Result<()> {
        if self.is_json() {
            return self.print_json(&items);
        }
        if items.is_empty() {
            println!("{}", "No results found.".dimmed());
            return Ok(());
        }
        let table = Table::new(items)
            .with(Style::rounded())
            .with(Modify::new(Columns::first()).with(Alignment::left()))
            .to_string();
        println!("{}", table);
        Ok(())
    }

    fn print_json<T: Serialize>(&self, data: &T) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(data)?);
        Ok(())
    }

    fn print_header(&self, title: &str) {
        if !self.is_json() {
            println!();
            println!("{}", title.bold().underline());
            println!();
        }
    }

    fn print_key_value(&self, key: &str, value: &str) {
        if !self.is_json() {
            println!("  {}: {}", key.cyan(), value);
        }
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ═══════════════════════════════════════════════════════════════════════════════
// Command Handlers
// ═══════════════════════════════════════════════════════════════════════════════

async fn handle_sweep(state: &AppState, actor: Option<&UserId>, output: &OutputHelper) -> Result<()> {
    let spinner = create_spinner("Sweeping expired blacklist entries...");
    let purged = state.logout.cleanup_expired_tokens(actor).await;
    spinner.finish_and_clear();

    output.print_success(&format!("Removed {} expired blacklist entries", purged?));
    Ok(())
}

async fn handle_logout_stats(state: &AppState, output: &OutputHelper) -> Result<()> {
    let stats = state.logout.logout_stats().await?;
    if output.is_json() {
        return output.print_json(&stats);
    }

    output.print_header("Token Blacklist");
    output.print_key_value("Blacklisted tokens", &stats.blacklist.total_blacklisted_tokens.to_string());
    output.print_key_value("Backend", &stats.blacklist.backend);
    output.print_key_value("Scan method", &stats.blacklist.scan_method);
    output.print_key_value("Token lifetime", &format!("{}s", stats.token_max_lifetime_secs));
    output.print_key_value("Timestamp", &stats.blacklist.timestamp.to_rfc3339());
    Ok(())
}

async fn handle_role_distribution(state: &AppState, output: &OutputHelper) -> Result<()> {
    let rows: Vec<RoleRow> = state
        .rbac
        .role_distribution()
        .await?
        .into_iter()
        .map(|r| RoleRow {
            role: r.role.to_string(),
            count: r.count,
        })
        .collect();

    output.print_header("Role Distribution");
    output.print_table(&rows)
}

async fn handle_audit_export(
    state: &AppState,
    actor: &UserId,
    format: ExportFormat,
    filter: AuditFilter,
    destination: Option<PathBuf>,
    output: &OutputHelper,
) -> Result<()> {
    let export = state.audit.export(actor, &filter, format).await?;

    match destination {
        Some(path) => {
            tokio::fs::write(&path, &export.body)
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            output.print_success(&format!("Exported {} records to {}", export.records, path.display()));
        }
        None => {
            println!("{}", String::from_utf8_lossy(&export.body));
        }
    }
    Ok(())
}

async fn handle_audit_cleanup(
    state: &AppState,
    actor: Option<&UserId>,
    retention_days: Option<i64>,
    output: &OutputHelper,
) -> Result<()> {
    let removed = match retention_days {
        Some(days) => state.audit.cleanup(actor, days).await?,
        None => state.audit.cleanup_default(actor).await?,
    };
    output.print_success(&format!("Deleted {} audit records", removed));
    Ok(())
}

async fn handle_migrate(config: &Config, output: &OutputHelper) -> Result<()> {
    let mut db_config = config.database.clone();
    db_config.run_migrations = false;

    let spinner = create_spinner("Applying migrations...");
    let result = async {
        let db = Database::connect(&db_config).await?;
        db.migrate().await
    }
    .await;
    spinner.finish_and_clear();

    result?;
    output.print_success("Database migrations applied");
    Ok(())
}

async fn handle_health(state: &AppState, output: &OutputHelper) -> Result<()> {
    let database = match &state.database {
        Some(db) => Some(db.health().await),
        None => None,
    };
    let blacklist = state.logout.logout_stats().await;
    let healthy = database.as_ref().map_or(true, |h| h.healthy) && blacklist.is_ok();

    if output.is_json() {
        output.print_json(&serde_json::json!({
            "healthy": healthy,
            "database": database,
            "blacklist": blacklist.as_ref().ok().map(|s| &s.blacklist),
            "blacklist_error": blacklist.as_ref().err().map(|e| e.user_message()),
        }))?;
    } else {
        print_health(database.as_ref(), &blacklist, output);
    }

    if !healthy {
        anyhow::bail!("one or more dependencies are unhealthy");
    }
    Ok(())
}

fn print_health(database: Option<&DatabaseHealth>, blacklist: &access_core::Result<LogoutStats>, output: &OutputHelper) {
    output.print_header("Health");
    match database {
        Some(h) if h.healthy => output.print_key_value(
            "Database",
            &format!("{} ({}ms, {}/{} idle)", "up".green(), h.latency_ms, h.idle_connections, h.pool_size),
        ),
        Some(h) => output.print_key_value("Database", &format!("{} ({}ms)", "down".red(), h.latency_ms)),
        None => output.print_key_value("Database", "not configured"),
    }
    match blacklist {
        Ok(stats) => output.print_key_value("Blacklist", &format!("{} ({})", "up".green(), stats.blacklist.backend)),
        Err(e) => output.print_key_value("Blacklist", &format!("{} ({})", "down".red(), e)),
    }
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path).with_context(|| format!("failed to load config from {}", path)),
        None => Config::load().context("failed to load config from environment"),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Main Entry Point
// ═══════════════════════════════════════════════════════════════════════════════

async fn run(cli: Cli, output: &OutputHelper) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;

    init_logging(
        &LoggingConfig {
            level: if cli.verbose { "debug".to_string() } else { "warn".to_string() },
            format: LogFormat::Compact,
            ..LoggingConfig::from(&config.observability)
        },
        "cli",
    )?;

    if let Commands::Migrate = cli.command {
        return handle_migrate(&config, output).await;
    }

    let state = AppState::connect(&config).await?;
    let actor = cli.actor.map(UserId::new);

    match cli.command {
        Commands::SweepTokens => handle_sweep(&state, actor.as_ref(), output).await,
        Commands::LogoutStats => handle_logout_stats(&state, output).await,
        Commands::RoleDistribution => handle_role_distribution(&state, output).await,
        Commands::AuditExport {
            export_format,
            user,
            action,
            since,
            until,
            output: destination,
        } => {
            let filter = AuditFilter {
                user_id: user.map(UserId::new),
                action,
                start: since,
                end: until,
                ..Default::default()
            };
            let actor = actor.unwrap_or_else(|| UserId::new("accessctl"));
            handle_audit_export(&state, &actor, export_format.into(), filter, destination, output).await
        }
        Commands::AuditCleanup { retention_days } => {
            handle_audit_cleanup(&state, actor.as_ref(), retention_days, output).await
        }
        Commands::Health => handle_health(&state, output).await,
        Commands::Migrate => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let output = OutputHelper::new(cli.format, cli.no_color);

    if let Err(e) = run(cli, &output).await {
        output.print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
