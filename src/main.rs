use clap::{Parser, Subcommand};
use tracing::Level;

use vidsearch::bot::{Bot, Event};
use vidsearch::config::Config;

/// Local driver for the video search backend. Plays the role of the chat
/// transport: each invocation delivers one user event and prints the reply.
#[derive(Parser)]
#[command(name = "vidsearch", version)]
struct Cli {
    /// Chat/session identifier the command acts for.
    #[arg(long)]
    user: String,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Provision (or reset) the user's store and collection
    Start,
    /// Ingest every video already in the user's video directory
    ProcessVideos,
    /// Upload a video and add its embedding to the collection
    Add { video: std::path::PathBuf },
    /// Upload a video and print its closest stored matches
    Closest { video: std::path::PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    tracing::info!(version = vidsearch::VERSION, "video search backend starting");

    let mut bot = Bot::new(&config);

    let event = match cli.cmd {
        Cmd::Start => Event::Start,
        Cmd::ProcessVideos => Event::ProcessVideos,
        Cmd::Add { video } => upload_event(&video, "add_db").await?,
        Cmd::Closest { video } => upload_event(&video, "get_closest").await?,
    };

    let reply = bot.handle(&cli.user, event).await;
    println!("{reply}");
    Ok(())
}

async fn upload_event(video: &std::path::Path, caption: &str) -> anyhow::Result<Event> {
    let file_name = video
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("video path has no usable file name"))?
        .to_string();
    let bytes = tokio::fs::read(video).await?;
    Ok(Event::Upload {
        file_name,
        bytes,
        caption: caption.to_string(),
    })
}
