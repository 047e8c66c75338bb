//! Growth Admin CLI — inspect the tier catalog, check entitlements, validate
//! license keys, and manage user accounts in a store snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use growth_accounts::{redeem_license, AccountStore, MemoryStore};
use growth_admin_console::AdminOps;
use growth_core::{AppConfig, Tier, UserAccount};
use growth_licensing::{
    catalog, get_limit, is_feature_enabled, Feature, LicenseValidator, Limit, Resource,
};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "growth-admin")]
#[command(about = "Growth Dashboard administration tool")]
#[command(version)]
struct Cli {
    /// TOML config file (environment variables with prefix GROWTH__ override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Store snapshot file (overrides store.snapshot_path)
    #[arg(long, global = true, env = "GROWTH__STORE__SNAPSHOT_PATH")]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tier catalog
    Tiers,

    /// Check a feature or resource limit for a tier value
    Check {
        /// Raw tier value (unrecognized values are denied everything)
        #[arg(long)]
        tier: String,

        /// Feature name: export, admin, coach_mode, analytics
        #[arg(long, conflicts_with = "resource")]
        feature: Option<String>,

        /// Resource name: habits, tasks, journal_entries
        #[arg(long)]
        resource: Option<String>,

        /// Existing item count to check against the resource limit
        #[arg(long, requires = "resource")]
        count: Option<u64>,
    },

    /// Validate a license key against the license service
    Validate {
        #[arg(short, long)]
        key: String,
    },

    /// Create an account (sign-up normally happens via the auth provider)
    Signup {
        uid: String,
        email: String,

        #[arg(long, default_value = "starter")]
        tier: String,
    },

    /// Redeem a license key for an account and apply its tier
    Redeem {
        uid: String,

        #[arg(short, long)]
        key: String,
    },

    /// Privileged user management
    Users {
        /// Acting admin's uid; their tier must include the admin capability
        #[arg(long)]
        actor: String,

        #[command(subcommand)]
        action: UsersAction,
    },
}

#[derive(Subcommand)]
enum UsersAction {
    /// List users, newest first, with record counts
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show a single user
    Show { uid: String },

    /// Change a user's tier
    SetTier { uid: String, tier: String },

    /// Delete a user and all of their records
    Delete { uid: String },
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.logging.filter.clone().into());
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if config.logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn parse_tier(s: &str) -> anyhow::Result<Tier> {
    s.parse::<Tier>()
        .context("expected one of: starter, coach, business")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match cli.config.as_deref() {
        Some(path) => AppConfig::load_from(Some(path))
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => AppConfig::load().unwrap_or_else(|e| {
            eprintln!("Failed to load config ({e}), using defaults");
            AppConfig::default()
        }),
    };
    init_tracing(&config);

    let data = cli
        .data
        .unwrap_or_else(|| PathBuf::from(&config.store.snapshot_path));

    match cli.command {
        Commands::Tiers => cmd_tiers(),
        Commands::Check {
            tier,
            feature,
            resource,
            count,
        } => cmd_check(&tier, feature.as_deref(), resource.as_deref(), count)?,
        Commands::Validate { key } => cmd_validate(&config, &key).await?,
        Commands::Signup { uid, email, tier } => cmd_signup(&data, uid, email, &tier).await?,
        Commands::Redeem { uid, key } => cmd_redeem(&config, &data, &uid, &key).await?,
        Commands::Users { actor, action } => cmd_users(&data, &actor, action).await?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Catalog commands
// ---------------------------------------------------------------------------

fn format_cents(cents: u32) -> String {
    format!("{}.{:02}", cents / 100, cents % 100)
}

fn cmd_tiers() {
    println!("Available tiers:");
    println!();
    for def in catalog::all() {
        let features: Vec<&str> = def.features.enabled().iter().map(Feature::as_str).collect();
        println!(
            "  {:<10} {:<10} ${:>6}/mo  habits {:<9} tasks {:<9} journal {:<9} features: {}",
            def.tier.as_str(),
            def.name,
            format_cents(def.monthly_price_cents),
            def.limits.habits,
            def.limits.tasks,
            def.limits.journal_entries,
            if features.is_empty() {
                "-".to_string()
            } else {
                features.join(", ")
            }
        );
    }
}

fn cmd_check(
    tier: &str,
    feature: Option<&str>,
    resource: Option<&str>,
    count: Option<u64>,
) -> anyhow::Result<()> {
    if catalog::get_tier(tier).is_none() {
        warn!(tier, "Unrecognized tier, all entitlements denied");
    }
    match (feature, resource) {
        (Some(feature), _) => {
            let enabled = is_feature_enabled(tier, feature);
            println!("{tier}: feature '{feature}' is {}", if enabled { "ENABLED" } else { "DISABLED" });
        }
        (None, Some(resource)) => {
            let raw = get_limit(tier, resource);
            let limit = Limit::from_raw(raw);
            println!("{tier}: {resource} limit = {limit} (raw {raw})");
            if let Some(count) = count {
                let verdict = if Resource::parse(resource).is_some() && limit.allows(count) {
                    "ALLOWED"
                } else {
                    "DENIED"
                };
                println!("  with {count} existing, creating one more is {verdict}");
            }
        }
        (None, None) => bail!("pass either --feature or --resource"),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// License commands
// ---------------------------------------------------------------------------

async fn cmd_validate(config: &AppConfig, key: &str) -> anyhow::Result<()> {
    let validator = LicenseValidator::from_config(&config.license)
        .context("failed to build license client")?;
    let result = validator.validate(key).await;

    if result.valid {
        println!("License is VALID");
        println!();
        println!("  Tier:       {}", result.tier);
        if let Some(license) = &result.license {
            println!("  License ID: {}", license.id);
            println!("  Product:    {}", license.product_id);
            println!("  Created:    {}", license.created_at.format("%Y-%m-%d %H:%M UTC"));
            match license.expires_at {
                Some(exp) => println!("  Expires:    {}", exp.format("%Y-%m-%d %H:%M UTC")),
                None => println!("  Expires:    never"),
            }
        }
        let features: Vec<&str> = result.features.enabled().iter().map(Feature::as_str).collect();
        println!("  Features:   {}", features.join(", "));
        return Ok(());
    }

    match &result.failure {
        Some(failure) => {
            eprintln!("License is INVALID: {}", failure.user_message());
            eprintln!("  detail: {failure}");
        }
        None => eprintln!("License is INVALID"),
    }
    if result.is_timeout() {
        eprintln!("  no answer within {:?}", validator.timeout());
    }
    std::process::exit(if result.is_timeout() { 2 } else { 1 });
}

async fn cmd_redeem(
    config: &AppConfig,
    data: &std::path::Path,
    uid: &str,
    key: &str,
) -> anyhow::Result<()> {
    let store = MemoryStore::open(data)?;
    let validator = LicenseValidator::from_config(&config.license)
        .context("failed to build license client")?;

    let redemption = redeem_license(&store, &validator, uid, key).await?;
    store.save_snapshot(data)?;
    println!(
        "Redeemed license for {uid}: tier is now {}",
        redemption.record.tier
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Account commands
// ---------------------------------------------------------------------------

async fn cmd_signup(
    data: &std::path::Path,
    uid: String,
    email: String,
    tier: &str,
) -> anyhow::Result<()> {
    let tier = parse_tier(tier)?;
    let store = MemoryStore::open(data)?;
    let account = store
        .create_account(UserAccount::new(uid, email).with_tier(tier))
        .await?;
    store.save_snapshot(data)?;
    println!("Created account {} ({}) on {}", account.uid, account.email, account.tier);
    Ok(())
}

async fn cmd_users(data: &std::path::Path, actor: &str, action: UsersAction) -> anyhow::Result<()> {
    let store = Arc::new(MemoryStore::open(data)?);
    let ops = AdminOps::for_actor(store.clone(), actor).await?;

    match action {
        UsersAction::List { json } => {
            let users = ops.list_users().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
                return Ok(());
            }
            println!(
                "{:<24} {:<28} {:<10} {:>6} {:>6} {:>8}  {}",
                "UID", "EMAIL", "TIER", "HABITS", "TASKS", "JOURNAL", "CREATED"
            );
            for u in &users {
                let tier = match u.recognized_tier() {
                    Some(t) => t.to_string(),
                    None => format!("?{}", u.tier),
                };
                println!(
                    "{:<24} {:<28} {:<10} {:>6} {:>6} {:>8}  {}",
                    u.uid,
                    u.email,
                    tier,
                    u.habit_count,
                    u.task_count,
                    u.journal_entry_count,
                    u.created_at.format("%Y-%m-%d")
                );
            }
            println!();
            println!("{} users", users.len());
        }
        UsersAction::Show { uid } => {
            let u = ops.get_user(&uid).await?;
            println!("  UID:         {}", u.uid);
            println!("  Email:       {}", u.email);
            if let Some(name) = &u.display_name {
                println!("  Name:        {name}");
            }
            println!("  Tier:        {}", u.tier);
            println!("  Created:     {}", u.created_at.format("%Y-%m-%d %H:%M UTC"));
            match u.last_login_at {
                Some(ts) => println!("  Last login:  {}", ts.format("%Y-%m-%d %H:%M UTC")),
                None => println!("  Last login:  never"),
            }
            println!("  Habits:      {}", u.habit_count);
            println!("  Tasks:       {}", u.task_count);
            println!("  Journal:     {}", u.journal_entry_count);
        }
        UsersAction::SetTier { uid, tier } => {
            let tier = parse_tier(&tier)?;
            let change = ops.update_user_tier(&uid, tier).await?;
            store.save_snapshot(data)?;
            println!("{uid}: {} -> {}", change.previous_tier, change.new_tier);
        }
        UsersAction::Delete { uid } => {
            let report = ops.delete_user(&uid).await?;
            store.save_snapshot(data)?;
            if report.account_removed {
                println!("Deleted {uid} and {} records", report.total_removed());
            } else {
                println!("{uid} was already deleted ({} stray records removed)", report.total_removed());
            }
            info!(uid = %uid, "Deletion saved");
        }
    }
    Ok(())
}
