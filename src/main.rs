//! # Sticky: introduction event operator CLI
//!
//! Usage:
//!   sticky init --roster roster.toml       # Load groups, units, slots and content
//!   sticky assign Mentorgroep-1            # Random unvisited free unit
//!   sticky assign Mentorgroep-1 -p "Commissie A"
//!   sticky release "Commissie A"           # End the unit's current visit
//!   sticky unlock mg-1 2                   # Unlock content unit 2 for a group
//!   sticky remind --delay Sticky:10        # Run the reminder timer until Ctrl-C,
//!                                          # then print what fired

mod roster;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde::Serialize;
use sticky_core::StickyConfig;
use sticky_core::model::{PartyRecord, Side};
use sticky_engine::{AssignmentEngine, ProgressTracker};
use sticky_scheduler::{LogSink, ReminderScheduler, TimerScheduler};
use sticky_store::StateStore;
use tracing_subscriber::EnvFilter;

use crate::roster::RosterFile;

#[derive(Parser)]
#[command(
    name = "sticky",
    version,
    about = "🤝 Sticky: pairing and reminders for introduction events"
)]
struct Cli {
    /// Config file (default: ~/.sticky/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load a roster into the state store
    Init {
        #[arg(long)]
        roster: PathBuf,
    },
    /// Pair a group with a unit (random unless --provider is given)
    Assign {
        group: String,
        #[arg(short, long)]
        provider: Option<String>,
    },
    /// Finish the current visit of a unit
    Release { provider: String },
    /// Finish every open visit
    ReleaseAll,
    /// Units free right now
    Available,
    /// Visit history of a group
    History { group: String },
    /// Unlock one content unit (0-based) for a group
    Unlock { group_key: String, unit: usize },
    /// Content currently unlocked for a group
    Unlocked { group_key: String },
    /// Dump every group and unit
    Status,
    /// Seed slot reminders, fire them until Ctrl-C, then print the fired ones
    Remind {
        /// Push a category back, e.g. `Sticky:10` (minutes, repeatable)
        #[arg(long, value_name = "CATEGORY:MINUTES")]
        delay: Vec<String>,
    },
}

#[derive(Serialize)]
struct Status {
    requesters: Vec<PartyRecord>,
    providers: Vec<PartyRecord>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        "sticky=debug,sticky_engine=debug,sticky_store=debug,sticky_scheduler=debug"
    } else {
        "sticky=info,sticky_engine=info,sticky_store=info,sticky_scheduler=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => StickyConfig::load_from(&PathBuf::from(shellexpand::tilde(path).to_string()))?,
        None => StickyConfig::load()?,
    };
    let db_path = config.store.resolved_path();
    let store = Arc::new(StateStore::open(&db_path)?);
    tracing::debug!("🗄️ State store at {}", db_path.display());

    let engine = AssignmentEngine::new(store.clone());
    let tracker = ProgressTracker::new(store.clone(), &config.progress);

    match cli.command {
        Command::Init { roster } => {
            let summary = RosterFile::load(&roster)?.apply(&store, &tracker)?;
            print_json(&summary)?;
        }
        Command::Assign { group, provider } => {
            let group = find(&store, Side::Requester, &group)?;
            let outcome = match provider {
                Some(name) => {
                    let unit = find(&store, Side::Provider, &name)?;
                    engine.request_explicit(group.id, unit.id)?
                }
                None => engine.request_random(group.id)?,
            };
            print_json(&outcome)?;
        }
        Command::Release { provider } => {
            let unit = find(&store, Side::Provider, &provider)?;
            print_json(&engine.release(unit.id)?)?;
        }
        Command::ReleaseAll => {
            let released = engine.release_all()?;
            print_json(&serde_json::json!({ "released": released }))?;
        }
        Command::Available => {
            print_json(&engine.available_providers()?)?;
        }
        Command::History { group } => {
            let group = find(&store, Side::Requester, &group)?;
            print_json(&engine.history(group.id)?)?;
        }
        Command::Unlock { group_key, unit } => {
            print_json(&tracker.unlock_unit(&group_key, unit)?)?;
        }
        Command::Unlocked { group_key } => {
            let unlocked = tracker.list_unlocked(&group_key)?;
            let items: Vec<_> = unlocked.iter().collect();
            print_json(&items)?;
        }
        Command::Status => {
            print_json(&Status {
                requesters: store.requesters()?,
                providers: store.providers()?,
            })?;
        }
        Command::Remind { delay } => {
            run_reminders(&config, &store, &delay).await?;
        }
    }

    Ok(())
}

fn find(store: &StateStore, side: Side, name: &str) -> Result<PartyRecord> {
    store
        .party_by_name(side, name)?
        .with_context(|| format!("No {side} named '{name}'"))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `Category:minutes`.
fn parse_delay(arg: &str) -> Result<(String, chrono::Duration)> {
    let Some((category, minutes)) = arg.rsplit_once(':') else {
        bail!("delay '{arg}' is not CATEGORY:MINUTES");
    };
    let minutes: i64 = minutes
        .trim()
        .parse()
        .with_context(|| format!("delay '{arg}' has no minute count"))?;
    Ok((category.trim().to_string(), chrono::Duration::minutes(minutes)))
}

async fn run_reminders(config: &StickyConfig, store: &StateStore, delays: &[String]) -> Result<()> {
    let grace = i64::try_from(config.event.misfire_grace_secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX);
    let timer = Arc::new(TimerScheduler::new(Arc::new(LogSink)).with_misfire_grace(grace));
    let reminders = ReminderScheduler::new(timer.clone(), config.event.date);
    let seeded = reminders.seed_from_store(store, &config.event.lead_times)?;
    if seeded == 0 {
        tracing::warn!("⚠️ No slots found; run `sticky init --roster` first");
    }

    for arg in delays {
        let (category, delta) = parse_delay(arg)?;
        reminders.reschedule_category(&category, delta)?;
    }

    for job in timer.pending() {
        tracing::debug!(
            "   {} {} → '{}' ({})",
            job.handle,
            job.fire_at.format("%H:%M"),
            job.reminder.group.name,
            job.label
        );
    }

    let handle = timer.spawn(Duration::from_secs(config.event.tick_secs));
    tokio::signal::ctrl_c().await?;
    handle.abort();
    tracing::info!("👋 Reminder timer stopped ({} job(s) left)", timer.pending_count());
    print_json(&timer.history())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_delay() {
        let (category, delta) = parse_delay("Sticky:10").unwrap();
        assert_eq!(category, "Sticky");
        assert_eq!(delta, chrono::Duration::minutes(10));
        assert!(parse_delay("Sticky").is_err());
        assert!(parse_delay("Sticky:soon").is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["sticky", "assign", "G1", "-p", "A"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Assign { ref group, provider: Some(ref p) } if group == "G1" && p == "A"
        ));
        let cli = Cli::try_parse_from(["sticky", "remind", "--delay", "Sticky:5", "--delay", "Aes:1"]).unwrap();
        assert!(matches!(cli.command, Command::Remind { ref delay } if delay.len() == 2));
    }
}
