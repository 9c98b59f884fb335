mod chat;
mod ui;
mod video;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

use konspekt_core::{
    Assistant, Settings, StoreHandle, format_chat, format_chat_history, format_storage_info,
    format_summary_history, format_summary_readable, paths::get_settings_path,
    settings::{API_KEY_ENV_VAR, mask_api_key},
    types::now_millis,
};

use crate::{
    ui::{create_spinner, ok, print_error, print_header, print_rule, warn},
    video::{Target, load_transcript, load_video},
};

#[derive(Parser)]
#[command(name = "konspekt", version)]
#[command(about = "Summarize YouTube videos and chat about them with Gemini")]
struct Cli {
    /// Show debug logs (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Summarize a video
    Summary {
        #[command(flatten)]
        target: Target,

        /// Ignore the cached summary and generate a new one
        #[arg(short, long)]
        force: bool,
    },

    /// Ask questions about a video
    Chat {
        #[command(flatten)]
        target: Target,
    },

    /// Print the transcript found on a video page
    Transcript {
        #[command(flatten)]
        target: Target,

        /// Ask the page to open its transcript panel before reading
        #[arg(long)]
        open: bool,
    },

    /// Browse saved summaries and chats
    History {
        #[command(subcommand)]
        command: HistoryCommand,
    },

    /// Delete all saved summaries and chats
    Clear,

    /// Show what is stored and how much space it takes
    Info,

    /// Manage the Gemini API key
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
}

#[derive(Subcommand)]
enum HistoryCommand {
    /// List saved summaries, or print one
    Summaries {
        #[arg(long, value_name = "ID")]
        video: Option<String>,
    },
    /// List saved chats, or print one
    Chats {
        #[arg(long, value_name = "ID")]
        video: Option<String>,
    },
    /// Remove the summary and chat of a video
    Remove { video: String },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Save the API key
    SetKey { key: String },
    /// Check that the configured key works
    Test,
    /// Show where settings live and which key is in use
    Show,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn assistant(store: StoreHandle) -> Result<Assistant> {
    let settings = Settings::load().await?;
    Ok(Assistant::from_settings(&settings, store)?)
}

async fn summary(target: Target, force: bool) -> Result<()> {
    print_header("Video Summary");
    let store = StoreHandle::open_default();
    let assistant = assistant(store.clone()).await?;

    let (video, data) = load_video(&target).await?;
    if force {
        store.remove_summary(&video.video_id).await?;
    }

    let spinner = create_spinner("Generating summary with Gemini...");
    let summary = match assistant
        .try_video_summary(&video.video_id, &video.video_title, data.transcript.as_ref())
        .await
    {
        Ok(summary) => summary,
        Err(e) => {
            spinner.finish_and_clear();
            bail!(e);
        }
    };
    spinner.finish_with_message(ok("Summary ready"));

    println!();
    print_rule();
    println!(
        "{}",
        format_summary_readable(&video.video_id, &video.video_title, &summary)
    );
    Ok(())
}

async fn chat(target: Target) -> Result<()> {
    print_header("Video Chat");
    let assistant = assistant(StoreHandle::open_default()).await?;
    let (video, data) = load_video(&target).await?;
    println!("{}\n", style(&video.video_title).bold());
    chat::run_chat(&assistant, &video, data.transcript.as_ref()).await
}

async fn transcript(target: Target, open: bool) -> Result<()> {
    print_header("Transcript");
    let transcript = load_transcript(&target, open).await?;
    if transcript.is_caption_track() {
        println!("{}", warn("Only a caption track reference was found:"));
    }
    println!("{}", transcript.as_str());
    Ok(())
}

async fn history(command: HistoryCommand) -> Result<()> {
    let store = StoreHandle::open_default();
    let now = now_millis();

    match command {
        HistoryCommand::Summaries { video: None } => {
            print!("{}", format_summary_history(&store.list_summaries().await?, now));
        }
        HistoryCommand::Summaries { video: Some(id) } => {
            let entry = store
                .list_summaries()
                .await?
                .into_iter()
                .find(|s| s.video_id == id);
            match entry {
                Some(s) => println!("{}", format_summary_readable(&s.video_id, &s.video_title, &s.summary)),
                None => bail!("No saved summary for {}", id),
            }
        }
        HistoryCommand::Chats { video: None } => {
            print!("{}", format_chat_history(&store.list_chats().await?, now));
        }
        HistoryCommand::Chats { video: Some(id) } => {
            let entry = store.list_chats().await?.into_iter().find(|c| c.video_id == id);
            match entry {
                Some(c) => {
                    println!("{}\n", style(&c.video_title).bold());
                    print!("{}", format_chat(&c.messages));
                }
                None => bail!("No saved chat for {}", id),
            }
        }
        HistoryCommand::Remove { video } => {
            store.remove_summary(&video).await?;
            store.remove_chat(&video).await?;
            println!("{}", ok(format!("Removed saved data for {}", video)));
        }
    }
    Ok(())
}

async fn settings(command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::SetKey { key } => {
            let mut settings = Settings::load().await?;
            settings.set_api_key(&key)?;
            settings.save().await?;
            println!("{}", ok("Settings saved successfully!"));
        }
        SettingsCommand::Test => {
            let assistant = assistant(StoreHandle::open_default()).await?;
            let spinner = create_spinner("Testing API key...");
            match assistant.test_api_key().await {
                Ok(_) => spinner.finish_with_message(ok("API key is working correctly!")),
                Err(e) => {
                    spinner.finish_and_clear();
                    bail!(e);
                }
            }
        }
        SettingsCommand::Show => {
            let settings = Settings::load().await?;
            println!("{} {}", style("Settings:").dim(), get_settings_path().display());
            let source = if std::env::var(API_KEY_ENV_VAR).is_ok_and(|k| !k.trim().is_empty()) {
                API_KEY_ENV_VAR
            } else {
                "settings file"
            };
            match settings.api_key() {
                Some(key) => println!(
                    "{} {} {}",
                    style("API key:").dim(),
                    mask_api_key(&key),
                    style(format!("({})", source)).dim()
                ),
                None => println!("{} {}", style("API key:").dim(), style("not set").yellow()),
            }
            if let Some(model) = &settings.model {
                println!("{} {}", style("Model:").dim(), model);
            }
        }
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Summary { target, force } => summary(target, force).await,
        Commands::Chat { target } => chat(target).await,
        Commands::Transcript { target, open } => transcript(target, open).await,
        Commands::History { command } => history(command).await,
        Commands::Clear => {
            StoreHandle::open_default().clear_all().await?;
            println!("{}", ok("Cleared all saved summaries and chats"));
            Ok(())
        }
        Commands::Info => {
            let info = StoreHandle::open_default().info().await?;
            print!("{}", format_storage_info(&info));
            Ok(())
        }
        Commands::Settings { command } => settings(command).await,
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        print_error(e);
        std::process::exit(1);
    }
}
