use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use nestlog_client::alerts::{spawn_alert_loop, TracingAlertSink};
use nestlog_client::log::format_elapsed;
use nestlog_client::state::lock_state;
use nestlog_client::{
    open_tracker, ClientConfig, CommandOutcome, TakeoverResolution, Tracker, TrackerEvent,
};
use nestlog_shared::room_code::RoomRef;
use nestlog_shared::ActivityType;
use nestlog_store::NotificationSettings;
use nestlog_sync::SyncOutcome;

#[derive(Parser)]
#[command(name = "nestlog", version, about = "Baby sleep, wake and feed log with shared rooms")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the current activity and sync state
    Status {
        #[arg(long)]
        json: bool,
    },
    /// List recorded entries by day
    History {
        /// Only the most recent N days
        #[arg(long)]
        days: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Toggle between sleeping and awake
    Sleep,
    /// Start or finish a feed
    Eat,
    /// Change an entry's start and end time
    Edit {
        /// Entry id or unique id prefix
        id: String,
        #[arg(long, value_parser = parse_time)]
        start: DateTime<Utc>,
        #[arg(long, value_parser = parse_time)]
        end: DateTime<Utc>,
    },
    /// Change an entry's type
    Retype {
        id: String,
        /// sleeping, awake or eating
        kind: ActivityType,
    },
    /// Split an entry in two at the given time
    Split {
        id: String,
        #[arg(long, value_parser = parse_time)]
        at: DateTime<Utc>,
    },
    /// Delete an entry
    Delete { id: String },
    /// Shared room management
    Room {
        #[command(subcommand)]
        action: RoomAction,
    },
    /// Show or change elapsed-time alerts
    Alerts {
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        #[arg(long)]
        disable: bool,
        #[arg(long)]
        awake_minutes: Option<u32>,
        #[arg(long)]
        sleep_minutes: Option<u32>,
    },
    /// Save the document store access key
    ApiKey { key: String },
    /// Stay running: sync, alert, and accept single-key commands on stdin
    Watch,
}

#[derive(Subcommand)]
enum RoomAction {
    /// Create a room from the local log
    Create,
    /// Join a room by id or share code
    Join { reference: String },
    /// Stop syncing with the current room
    Leave,
    /// Show the current room
    Show,
}

/// RFC 3339, or `YYYY-MM-DD HH:MM` taken as UTC.
fn parse_time(raw: &str) -> Result<DateTime<Utc>, String> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Ok(t.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M")
        .map(|t| t.and_utc())
        .map_err(|_| format!("expected RFC 3339 or 'YYYY-MM-DD HH:MM', got '{raw}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    nestlog_client::init_tracing();

    let cli = Cli::parse();
    let config = ClientConfig::from_env();
    let tracker = open_tracker(&config).context("Failed to open local data")?;

    match cli.command {
        Command::Status { json } => {
            tracker.resume().await;
            print_status(&tracker, json)?;
        }
        Command::History { days, json } => {
            tracker.resume().await;
            print_history(&tracker, days, json)?;
        }
        Command::Sleep => {
            tracker.resume().await;
            let outcome = tracker.toggle_sleep_awake().await?;
            finish_command(&tracker, outcome).await?;
        }
        Command::Eat => {
            tracker.resume().await;
            let outcome = tracker.toggle_eating().await?;
            finish_command(&tracker, outcome).await?;
        }
        Command::Edit { id, start, end } => {
            tracker.resume().await;
            let id = resolve_id(&tracker, &id)?;
            let outcome = tracker.update_entry(&id, start, end).await?;
            finish_command(&tracker, outcome).await?;
        }
        Command::Retype { id, kind } => {
            tracker.resume().await;
            let id = resolve_id(&tracker, &id)?;
            let outcome = tracker.update_entry_type(&id, kind).await?;
            finish_command(&tracker, outcome).await?;
        }
        Command::Split { id, at } => {
            tracker.resume().await;
            let id = resolve_id(&tracker, &id)?;
            let outcome = tracker.split_entry(&id, at).await?;
            finish_command(&tracker, outcome).await?;
        }
        Command::Delete { id } => {
            tracker.resume().await;
            let id = resolve_id(&tracker, &id)?;
            let outcome = tracker.delete_entry(&id).await?;
            finish_command(&tracker, outcome).await?;
        }
        Command::Room { action } => room(&tracker, action).await?,
        Command::Alerts {
            enable,
            disable,
            awake_minutes,
            sleep_minutes,
        } => {
            let mut settings: NotificationSettings = tracker.notification_settings();
            let changed =
                enable || disable || awake_minutes.is_some() || sleep_minutes.is_some();
            if enable {
                settings.enabled = true;
            }
            if disable {
                settings.enabled = false;
            }
            if let Some(minutes) = awake_minutes {
                settings.awake_alert_minutes = minutes;
            }
            if let Some(minutes) = sleep_minutes {
                settings.sleep_alert_minutes = minutes;
            }
            if changed {
                tracker.update_notification_settings(settings.clone())?;
            }
            println!(
                "Alerts {}: awake after {} min, asleep after {} min",
                if settings.enabled { "on" } else { "off" },
                settings.awake_alert_minutes,
                settings.sleep_alert_minutes
            );
        }
        Command::ApiKey { key } => {
            tracker.save_api_key(&key)?;
            println!("API key saved.");
        }
        Command::Watch => watch(&tracker, &config).await?,
    }

    Ok(())
}

async fn room(tracker: &Tracker, action: RoomAction) -> anyhow::Result<()> {
    match action {
        RoomAction::Create => {
            let room = tracker.create_room().await?;
            println!("Room created. Share code {} (id {})", room.human_code, room.document_id);
        }
        RoomAction::Join { reference } => {
            let reference = RoomRef::parse(&reference)?;
            let (room, outcome) = tracker.join_room(&reference).await?;
            println!("Joined room {} (id {})", room.human_code, room.document_id);
            if let SyncOutcome::Failed(reason) = outcome {
                println!("First sync failed: {reason}");
            }
        }
        RoomAction::Leave => {
            let room = tracker.leave_room()?;
            println!("Left room {}", room.human_code);
        }
        RoomAction::Show => match tracker.room() {
            Some(room) => println!("Room {} (id {})", room.human_code, room.document_id),
            None => println!("Not in a room."),
        },
    }
    Ok(())
}

/// Settle a mutation: ask about a take-over if one is needed, then report.
async fn finish_command(tracker: &Tracker, outcome: CommandOutcome) -> anyhow::Result<()> {
    match outcome {
        CommandOutcome::Applied { sync } => report_sync(sync),
        CommandOutcome::AwaitingTakeover { current_writer } => {
            let question = format!(
                "Device {} is currently recording for this room. Take over? [y/N] ",
                current_writer.short()
            );
            let accept = ask(&question).await?;
            match tracker.resolve_takeover(accept).await? {
                TakeoverResolution::Accepted { claim, .. } => report_sync(claim),
                TakeoverResolution::Declined { .. } => {
                    println!("Left unchanged. This device is now read-only for the room.");
                }
            }
        }
    }
    print_status(tracker, false)
}

fn report_sync(sync: Option<SyncOutcome>) {
    match sync {
        Some(SyncOutcome::Failed(reason)) => println!("Saved locally; sync failed: {reason}"),
        Some(SyncOutcome::RoomNotFound) => println!("Saved locally; room not found."),
        Some(SyncOutcome::Skipped) => println!("Saved locally; will sync on the next tick."),
        _ => {}
    }
}

async fn ask(question: &str) -> anyhow::Result<bool> {
    use std::io::Write;

    print!("{question}");
    std::io::stdout().flush()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn resolve_id(tracker: &Tracker, prefix: &str) -> anyhow::Result<String> {
    let state = lock_state(tracker.state());
    let matches: Vec<&str> = state
        .log
        .entries()
        .iter()
        .map(|e| e.id.as_str())
        .filter(|id| id.starts_with(prefix))
        .collect();
    match matches.as_slice() {
        [id] => Ok(id.to_string()),
        [] => bail!("No entry matches '{prefix}'"),
        _ => bail!("'{prefix}' matches {} entries, use more characters", matches.len()),
    }
}

fn print_status(tracker: &Tracker, json: bool) -> anyhow::Result<()> {
    let status = tracker.status(Utc::now());
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "{} for {} (since {})",
        status.activity,
        format_elapsed(status.elapsed_secs),
        status.since.format("%Y-%m-%d %H:%M UTC")
    );
    match &status.room {
        Some(room) => println!(
            "Room {}: {} ({})",
            room.human_code, status.sync_message, status.role
        ),
        None => println!("Not in a room; {} entries kept locally", status.entries),
    }
    Ok(())
}

fn print_history(tracker: &Tracker, days: Option<usize>, json: bool) -> anyhow::Result<()> {
    let mut groups = lock_state(tracker.state()).log.grouped_by_day();
    if let Some(days) = days {
        groups.truncate(days);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&groups)?);
        return Ok(());
    }

    for group in groups {
        println!("{}", group.date);
        for entry in group.entries {
            let end = entry
                .end_time
                .map(|t| t.format("%H:%M").to_string())
                .unwrap_or_else(|| "now".to_string());
            println!(
                "  {}-{}  {:<8}  {:>8}  {}",
                entry.start_time.format("%H:%M"),
                end,
                entry.kind,
                format_elapsed(entry.duration_secs().unwrap_or(0)),
                entry.short_id()
            );
        }
    }
    Ok(())
}

fn print_event(event: &TrackerEvent) {
    match event {
        TrackerEvent::StateChanged {
            activity, since, ..
        } => println!("> now {activity} (since {})", since.format("%H:%M")),
        TrackerEvent::TakeoverRequested { current_writer } => println!(
            "> device {} is recording for this room. Take over? (y/n)",
            current_writer.short()
        ),
        TrackerEvent::SyncStatusChanged { message, .. } => println!("> {message}"),
        TrackerEvent::RoomChanged { room } => match room {
            Some(room) => println!("> joined room {}", room.human_code),
            None => println!("> left room"),
        },
        TrackerEvent::Alert { title, body, .. } => println!("> {title}: {body}"),
    }
}

async fn watch(tracker: &Tracker, config: &ClientConfig) -> anyhow::Result<()> {
    let mut events = tracker.subscribe();
    if tracker.resume().await.is_none() {
        println!("Not in a room; tracking locally.");
    }

    let cancel = CancellationToken::new();
    let alert_loop = spawn_alert_loop(
        Arc::clone(tracker.state()),
        Arc::new(TracingAlertSink),
        tracker.events().clone(),
        config.alert_interval,
        cancel.clone(),
    );

    println!("s = sleep/wake, e = feed, y/n = answer take-over, enter = status, q = quit");
    print_status(tracker, false)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event),
                Err(RecvError::Lagged(missed)) => {
                    tracing::warn!(missed, "Event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let result: anyhow::Result<()> = match line.trim() {
                    "s" => tracker.toggle_sleep_awake().await.map(drop).map_err(Into::into),
                    "e" => tracker.toggle_eating().await.map(drop).map_err(Into::into),
                    "y" => tracker.resolve_takeover(true).await.map(drop).map_err(Into::into),
                    "n" => tracker.resolve_takeover(false).await.map(drop).map_err(Into::into),
                    "q" => break,
                    "" => print_status(tracker, false),
                    other => {
                        println!("Unknown command '{other}'");
                        Ok(())
                    }
                };
                if let Err(e) = result {
                    println!("Error: {e}");
                }
            }
        }
    }

    cancel.cancel();
    alert_loop.await.ok();
    Ok(())
}
