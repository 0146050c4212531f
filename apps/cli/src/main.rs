use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use console::style;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{Mutex, mpsc},
};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};
use tubechat_core::{
    BackgroundRouter, Config, ExtensionMessage, FileStorage, HttpBackend, Intent, MemoryStorage,
    MessageResponse, ModelId, PageObserver, SessionDeps, SessionHandle, StorageBridge, StorageKey,
    TabChannel, start_session,
};

use crate::{
    commands::{Command, HELP},
    page::{LocalTab, TERMINAL_TAB, TerminalPlayer},
};

mod commands;
mod page;
mod render;

/// CLI wrapper for ModelId (needed for clap ValueEnum)
#[derive(Clone, Copy, ValueEnum)]
enum CliModel {
    Fast,
    Thorough,
}

impl From<CliModel> for ModelId {
    fn from(cli: CliModel) -> Self {
        match cli {
            CliModel::Fast => ModelId::Fast,
            CliModel::Thorough => ModelId::Thorough,
        }
    }
}

#[derive(Parser)]
#[command(name = "tubechat")]
#[command(about = "Chat about the transcript of a YouTube video")]
struct Cli {
    /// Video URL or id to open on start
    video: Option<String>,

    /// Backend base URL (defaults to TUBECHAT_API_URL or http://localhost:8080)
    #[arg(long)]
    api_url: Option<String>,

    /// API key; stored for later sessions. Falls back to TUBECHAT_API_KEY.
    #[arg(short = 'k', long)]
    api_key: Option<String>,

    /// Model for new questions
    #[arg(short, long)]
    model: Option<CliModel>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Storage file (defaults to the user config directory)
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Keep everything in memory; nothing is persisted
    #[arg(long)]
    ephemeral: bool,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn build_config(cli: &Cli) -> Config {
    let mut config = Config::from_env();
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.clone();
    }
    if let Some(secs) = cli.timeout {
        config.request_timeout = Duration::from_secs(secs);
    }
    if let Some(path) = &cli.storage {
        config.storage_path = path.clone();
    }
    if let Some(model) = cli.model {
        config.default_model = model.into();
    }
    config
}

async fn open_storage(cli: &Cli, config: &Config) -> Result<Arc<dyn StorageBridge>> {
    if cli.ephemeral {
        return Ok(Arc::new(MemoryStorage::new()));
    }
    Ok(Arc::new(FileStorage::open(&config.storage_path).await?))
}

async fn open_video(page: &Mutex<PageObserver>, video: &str) -> Result<()> {
    if crate::page::navigate(page, video).await?.is_none() {
        println!(
            "{} already on {}",
            style("!").yellow().bold(),
            style(video).dim()
        );
    }
    Ok(())
}

fn nth_user_message(session: &SessionHandle, turn: usize) -> Option<String> {
    session
        .snapshot()
        .messages
        .iter()
        .filter(|m| m.is_user())
        .nth(turn - 1)
        .map(|m| m.id.clone())
}

async fn print_panel(page: &Mutex<PageObserver>) {
    let state = if page.lock().await.popup_visible() {
        "shown"
    } else {
        "hidden"
    };
    println!("{} chat panel {}", style("✓").green().bold(), state);
}

/// Returns false once the user asked to leave.
async fn dispatch(
    command: Command,
    session: &SessionHandle,
    page: &Mutex<PageObserver>,
    router: &BackgroundRouter<LocalTab>,
    storage: &Arc<dyn StorageBridge>,
) -> Result<bool> {
    match command {
        Command::Ask(text) => session.submit_query(text).await?,
        Command::Quick(n) => match session.snapshot().quick_questions.get(n - 1) {
            Some(question) => session.submit_query(question.clone()).await?,
            None => println!("{} no quick question #{n}", style("!").yellow().bold()),
        },
        Command::Video(video) => open_video(page, &video).await?,
        Command::Model(model) => {
            session.send(Intent::ChangeModel(model)).await?;
            println!("{} model set to {}", style("✓").green().bold(), model);
        }
        Command::Retry { turn, model } => match nth_user_message(session, turn) {
            Some(message_id) => {
                session
                    .send(Intent::Resubmit { message_id, model })
                    .await?
            }
            None => println!("{} no turn #{turn}", style("!").yellow().bold()),
        },
        Command::Seek(seconds) => {
            let sent = router
                .channel()
                .send(TERMINAL_TAB, ExtensionMessage::SeekToTimestamp { seconds })
                .await;
            if !matches!(sent, Ok(MessageResponse { success: true })) {
                println!("{} seek failed", style("!").yellow().bold());
            }
        }
        Command::Popup => {
            router.on_action_clicked(TERMINAL_TAB).await;
            print_panel(page).await;
        }
        Command::ClosePopup => {
            if let Err(e) = router
                .channel()
                .send(TERMINAL_TAB, ExtensionMessage::ClosePopup)
                .await
            {
                println!("{} {}", style("!").yellow().bold(), e);
            }
            print_panel(page).await;
        }
        Command::Key(key) => storage.set_one(StorageKey::ApiKey, key).await?,
        Command::Logout => storage.remove(&[StorageKey::ApiKey]).await?,
        Command::Help => println!("{HELP}"),
        Command::Quit => return Ok(false),
    }
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = build_config(&cli);

    let storage = open_storage(&cli, &config).await?;
    if let Some(key) = cli.api_key.clone().or_else(Config::api_key_from_env) {
        storage.set_one(StorageKey::ApiKey, key).await?;
    }
    if let Some(model) = cli.model {
        storage
            .set_one(StorageKey::Model, ModelId::from(model).name().to_string())
            .await?;
    }

    println!(
        "\n{}  {}",
        style("tubechat").cyan().bold(),
        style("Video Chat").dim()
    );
    println!(
        "{} {}\n",
        style("Backend:").dim(),
        style(&config.api_base_url).cyan()
    );

    let backend = Arc::new(HttpBackend::new(&config)?);
    let session = start_session(SessionDeps {
        transcripts: backend.clone(),
        queries: backend,
        storage: Arc::clone(&storage),
        default_model: config.default_model,
    });
    let renderer = tokio::spawn(render::run(session.subscribe()));

    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel();
    let page = Arc::new(Mutex::new(
        PageObserver::new(Arc::clone(&storage), Arc::new(TerminalPlayer)).with_notifier(notify_tx),
    ));
    let router = Arc::new(BackgroundRouter::new(LocalTab::new(Arc::clone(&page))));
    let background = {
        let router = Arc::clone(&router);
        tokio::spawn(async move {
            while let Some(message) = notify_rx.recv().await {
                router.on_message(&message);
            }
        })
    };

    if let Some(video) = &cli.video {
        open_video(&page, video).await?;
    }
    // Starting the CLI is the first click on the extension action.
    router.on_action_clicked(TERMINAL_TAB).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match commands::parse(&line) {
            Ok(Some(command)) => {
                if !dispatch(command, &session, &page, &router, &storage).await? {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => println!("{} {}", style("Error:").red().bold(), e),
        }
    }

    session.close().await;
    let _ = renderer.await;
    background.abort();
    Ok(())
}
