use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::info;

use litemirror_api::{ReadClient, SessionClient};
use litemirror_core::config::Config;
use litemirror_core::read::TrackerRead;
use litemirror_core::types::NewStory;
use litemirror_engine::{PollCursor, PollLoop, SyncEngine, SystemNotifier};
use litemirror_store::{CommentRepo, Database, StoryRepo};

#[derive(Parser)]
#[command(
    name = "litemirror",
    version,
    about = "Local mirror and notifier for a LiteTracker account"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the poll + sync daemon until interrupted
    Daemon,
    /// One-shot sync of every tracked project, then exit
    Sync,
    /// Show the authenticated user's profile
    Me,
    /// List all projects visible to the token
    Projects,
    /// Aggregate story counts from the local mirror
    Stats,
    /// Stories owned by the configured user, from the local mirror
    Mine {
        /// Only started/unstarted stories
        #[arg(long)]
        active: bool,
    },
    /// Recent comments from the local mirror, newest first
    Comments {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Post a comment on a story
    Comment {
        #[arg(long)]
        story: i64,
        text: String,
    },
    /// Add a label to a story
    AddLabel {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        story: i64,
        name: String,
    },
    /// Add an owner to a story
    AddOwner {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        story: i64,
        user: i64,
    },
    /// Create a story in a project
    CreateStory {
        #[arg(long)]
        project: i64,
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        story_type: Option<String>,
        #[arg(long)]
        estimate: Option<i64>,
        /// Comma-separated label names
        #[arg(long)]
        labels: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = run(cli.command, config).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(command: Command, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Daemon => daemon(config).await,
        Command::Sync => {
            litemirror_telemetry::init_stderr();
            config.ensure_data_dir()?;
            let db = Database::open(&config.db_path())?;
            let tracker: Arc<dyn TrackerRead> = Arc::new(ReadClient::from_config(&config));
            let engine = SyncEngine::new(tracker, db.clone(), &config);
            engine.sync_all().await;
            drop(engine);
            db.close()?;
            Ok(())
        }
        Command::Me => {
            litemirror_telemetry::init_stderr();
            print_json(&ReadClient::from_config(&config).me().await?)
        }
        Command::Projects => {
            litemirror_telemetry::init_stderr();
            print_json(&ReadClient::from_config(&config).projects().await?)
        }
        Command::Stats => {
            litemirror_telemetry::init_stderr();
            config.ensure_data_dir()?;
            let db = Database::open(&config.db_path())?;
            print_json(&StoryRepo::new(db).stats()?)
        }
        Command::Mine { active } => {
            litemirror_telemetry::init_stderr();
            config.ensure_data_dir()?;
            let repo = StoryRepo::new(Database::open(&config.db_path())?);
            if active {
                print_json(&repo.my_active_stories()?)
            } else {
                print_json(&repo.my_stories()?)
            }
        }
        Command::Comments { limit } => {
            litemirror_telemetry::init_stderr();
            config.ensure_data_dir()?;
            let repo = CommentRepo::new(Database::open(&config.db_path())?);
            print_json(&repo.recent(limit)?)
        }
        Command::Comment { story, text } => {
            litemirror_telemetry::init_stderr();
            let comment = session_client(&config).post_comment(story, &text).await?;
            print_json(&comment)
        }
        Command::AddLabel {
            project,
            story,
            name,
        } => {
            litemirror_telemetry::init_stderr();
            let label = session_client(&config).add_label(story, project, &name).await?;
            print_json(&label)
        }
        Command::AddOwner {
            project,
            story,
            user,
        } => {
            litemirror_telemetry::init_stderr();
            let owners = session_client(&config).add_owner(story, project, user).await?;
            print_json(&owners)
        }
        Command::CreateStory {
            project,
            title,
            description,
            story_type,
            estimate,
            labels,
        } => {
            litemirror_telemetry::init_stderr();
            let story = NewStory {
                name: title,
                description,
                story_type,
                estimate,
                labels: labels
                    .as_deref()
                    .map(NewStory::parse_labels)
                    .unwrap_or_default(),
            };
            let created = ReadClient::from_config(&config)
                .create_story(project, &story)
                .await?;
            print_json(&created)
        }
    }
}

async fn daemon(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    config.ensure_data_dir()?;
    litemirror_telemetry::init_json_file(&config.log_path())?;
    info!("=== litemirror daemon starting ===");

    if config.project_ids.is_empty() {
        return Err("no LITETRACKER_PROJECT_IDS configured".into());
    }
    info!(
        projects = ?config.project_ids,
        interval_ms = config.poll_interval.as_millis() as u64,
        user_id = config.user_id,
        "polling config"
    );

    let db = Database::open(&config.db_path())?;
    let tracker: Arc<dyn TrackerRead> = Arc::new(ReadClient::from_config(&config));
    let engine = SyncEngine::new(tracker.clone(), db.clone(), &config);
    let poll = PollLoop::new(
        tracker,
        Arc::new(SystemNotifier),
        PollCursor::new(config.poll_state_path()),
        &config,
    );

    let shutdown = CancellationToken::new();
    spawn_signal_listener(shutdown.clone());

    info!("=== litemirror daemon running ===");
    poll.run(&engine, shutdown).await;

    drop(engine);
    db.close()?;
    info!("store closed, daemon exiting");
    Ok(())
}

fn spawn_signal_listener(shutdown: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            let mut term = match tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            ) {
                Ok(term) => term,
                Err(e) => {
                    tracing::error!(error = %e, "cannot install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
        }
        info!("received termination signal");
        shutdown.cancel();
    });
}

fn session_client(config: &Config) -> SessionClient {
    let read = Arc::new(ReadClient::from_config(config));
    SessionClient::new(config, read)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
