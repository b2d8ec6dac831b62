use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use playlist_paste::auth::split_callback_url;
use playlist_paste::pipeline::ProgressReporter;
use playlist_paste::{
    CatalogClient, Config, CredentialManager, DemoPipeline, MemoryStore, Phase, Pipelines,
    ProgressUpdate, ResolutionPipeline, Session,
};

#[derive(Parser)]
#[command(name = "playlist-paste")]
#[command(about = "Turn a pasted song list into a Spotify playlist")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show how a pasted text is recognised
    Parse {
        /// Read the text from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Create a Spotify playlist from a pasted text
    Create {
        /// Read the text from a file instead of stdin
        #[arg(long)]
        file: Option<PathBuf>,

        /// Run without logging in; nothing is created on Spotify
        #[arg(long)]
        demo: bool,

        /// Override the playlist title
        #[arg(long)]
        title: Option<String>,

        /// Drop a song by its number in the preview (repeatable)
        #[arg(long)]
        skip: Vec<usize>,

        /// Replace a song, e.g. --edit "2=Windowlicker / Aphex Twin" (repeatable)
        #[arg(long)]
        edit: Vec<String>,

        /// Do not ask for confirmation
        #[arg(short, long)]
        yes: bool,

        /// Spotify client ID (or set SPOTIFY_CLIENT_ID env var)
        #[arg(long, env = "SPOTIFY_CLIENT_ID")]
        client_id: Option<String>,
    },

    /// Show setup guide
    Setup,
}

fn setup_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(cli.verbose);

    match cli.command {
        Commands::Parse { file } => {
            parse_text(file)?;
        }
        Commands::Create {
            file,
            demo,
            title,
            skip,
            edit,
            yes,
            client_id,
        } => {
            let options = CreateOptions {
                file,
                demo,
                title,
                skip,
                edit,
                yes,
                client_id,
            };
            create(options).await?;
        }
        Commands::Setup => {
            show_setup_guide();
        }
    }

    Ok(())
}

struct CreateOptions {
    file: Option<PathBuf>,
    demo: bool,
    title: Option<String>,
    skip: Vec<usize>,
    edit: Vec<String>,
    yes: bool,
    client_id: Option<String>,
}

fn read_text(file: &Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read stdin")?;
            Ok(text)
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

fn parse_text(file: Option<PathBuf>) -> Result<()> {
    let text = read_text(&file)?;

    match playlist_paste::parse(&text) {
        Some(playlist) => {
            println!("{}", serde_json::to_string_pretty(&playlist)?);
        }
        None => {
            println!(
                "{}",
                "Not recognised: expected a title line followed by \"song / artist\" lines"
                    .yellow()
            );
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn create(options: CreateOptions) -> Result<()> {
    println!("{}", "Paste to Playlist".cyan().bold());
    println!("{}", "=".repeat(50));

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(client_id) = &options.client_id {
        config = config.with_client_id(client_id.clone());
    }

    let demo = options.demo || config.is_demo();
    if demo {
        println!(
            "{}",
            "DEMO MODE - songs are not looked up and no playlist is created".yellow()
        );
    }
    if !demo && options.file.is_none() {
        bail!("Logging in to Spotify needs the text in a file; pass --file or use --demo");
    }

    let mut session = Session::new();
    let text = read_text(&options.file)?;
    session.set_input(text, Instant::now())?;

    if !session.advance()? {
        println!(
            "{}",
            "Could not recognise a playlist: expected a title line followed by song lines".red()
        );
        std::process::exit(1);
    }

    apply_edits(&mut session, &options)?;
    print_preview(&session);

    if options.file.is_some() && !options.yes {
        let answer = prompt("\nCreate this playlist? [Y/n] ")?;
        if answer.eq_ignore_ascii_case("n") || answer.eq_ignore_ascii_case("no") {
            println!("{}", "Cancelled".yellow());
            return Ok(());
        }
    }

    if !demo {
        login(&mut session, &config).await;
    }

    let pipelines = Pipelines {
        live: ResolutionPipeline::with_client(CatalogClient::new(&config), config.search_delay),
        demo: DemoPipeline::new(config.demo_delay),
    };

    let pb = ProgressBar::new(100);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );
    let reporter = BarReporter(pb.clone());

    session.create_playlist(&pipelines, &reporter).await?;
    pb.finish_and_clear();

    match session.phase() {
        Phase::Done => print_summary(&mut session)?,
        _ => {
            if let Some(error) = session.error() {
                println!("{}", error.red());
            }
            println!("{}", "Your songs are unchanged; fix them and run again.".yellow());
            std::process::exit(1);
        }
    }

    Ok(())
}

fn apply_edits(session: &mut Session, options: &CreateOptions) -> Result<()> {
    if let Some(title) = &options.title {
        session.set_title(title.clone())?;
    }

    for edit in &options.edit {
        let (number, song) = edit
            .split_once('=')
            .with_context(|| format!("Invalid --edit {:?}, expected N=TITLE / ARTIST", edit))?;
        let index = song_index(number.trim().parse().context("Invalid song number")?)?;

        let (song_title, artist) = song.split_once(" / ").unwrap_or((song, ""));
        session.edit_title(index, song_title.trim())?;
        session.edit_artist(index, artist.trim())?;
    }

    let mut skip = options.skip.clone();
    skip.sort_unstable();
    skip.dedup();
    for number in skip.into_iter().rev() {
        session.remove_song(song_index(number)?)?;
    }

    Ok(())
}

fn song_index(number: usize) -> Result<usize> {
    match number.checked_sub(1) {
        Some(index) => Ok(index),
        None => bail!("Song numbers start at 1"),
    }
}

/// Authorization failures only leave the session logged out; the run then falls back to demo.
async fn login(session: &mut Session, config: &Config) {
    let credentials = CredentialManager::new(config, Arc::new(MemoryStore::new()));

    let result = async {
        let url = credentials.begin_authorization()?;
        session.login_started()?;

        println!("\nOpen this URL in your browser to authorize Spotify:");
        println!("{}\n", url);

        let redirect = prompt("Enter the URL you were redirected to: ")
            .map_err(|e| playlist_paste::AppError::Config(e.to_string()))?;

        let callback = split_callback_url(&redirect)?.ok_or_else(|| {
            playlist_paste::AppError::InvalidCallback("no code in URL".to_string())
        })?;
        debug!("Callback received at {}", callback.clean_url);

        let token = credentials.complete_authorization(&callback.code).await?;
        let user = CatalogClient::new(config).fetch_current_user(&token).await?;
        Ok::<_, playlist_paste::AppError>((token, user))
    }
    .await;

    match result.and_then(|(token, user)| session.login_completed(token, user)) {
        Ok(()) => {
            if let Some(user) = session.auth().user() {
                println!("{} {}", "Logged in as".green(), user.name().bold());
            }
        }
        Err(e) => {
            session.login_failed(&e);
            println!(
                "{}",
                "Login did not complete - continuing in demo mode".yellow()
            );
        }
    }
}

struct BarReporter(ProgressBar);

impl ProgressReporter for BarReporter {
    fn report(&self, update: ProgressUpdate) {
        if let Some(percent) = update.percent() {
            self.0.set_position(percent.round() as u64);
        }
        if !matches!(update, ProgressUpdate::Resolved { .. }) {
            self.0.set_message(update.message());
        }
    }
}

fn print_preview(session: &Session) {
    println!("\n{}", session.title().bold());
    for (i, song) in session.songs().iter().enumerate() {
        if song.artist.is_empty() {
            println!("{:3}. {}", i + 1, song.title.green());
        } else {
            println!("{:3}. {} - {}", i + 1, song.title.green(), song.artist);
        }
    }
    println!("\n{}", format!("Total: {} songs", session.songs().len()).cyan());
}

fn print_summary(session: &mut Session) -> Result<()> {
    let results = session.results();
    let found = results.iter().filter(|r| r.found).count();

    println!();
    println!("{}", "=".repeat(60));
    println!("{}", session.title().bold());
    println!("{}", "=".repeat(60));

    for (i, result) in results.iter().enumerate() {
        match &result.remote_track {
            Some(track) if result.found => {
                println!(
                    "{:3}. {} {} - {}",
                    i + 1,
                    "✓".green(),
                    track.name,
                    track.artist_names()
                );
            }
            _ => {
                println!(
                    "{:3}. {} {} ({})",
                    i + 1,
                    "✗".red(),
                    result.song.title,
                    "not found".red()
                );
            }
        }
    }

    println!(
        "\nFound {} of {} songs",
        found.to_string().green(),
        results.len()
    );

    match session.playlist_url() {
        Some(url) => println!("{} {}", "Playlist:".green().bold(), url),
        None => println!("{}", "Demo run - no playlist was created".yellow()),
    }

    let listing = session.copy_listing()?;
    println!("\n{}\n{}", "Listing:".cyan(), listing);

    Ok(())
}

fn show_setup_guide() {
    println!("{}", "Paste to Playlist Setup Guide".cyan().bold());
    println!("{}", "=".repeat(50));

    println!("\n{}", "1. Spotify API Setup".yellow());
    println!("   - Go to https://developer.spotify.com/dashboard/");
    println!("   - Create a new app (no client secret is needed)");
    println!("   - Copy your Client ID");
    println!("   - Add 'http://127.0.0.1:8080/callback' as a redirect URI");

    println!("\n{}", "2. Configuration".yellow());
    println!("   - Create a .env file with:");
    println!("     SPOTIFY_CLIENT_ID=your_spotify_client_id");
    println!("     SPOTIFY_REDIRECT_URI=http://127.0.0.1:8080/callback");
    println!("   - Without a client ID every run is a demo run");

    match Config::from_env() {
        Ok(config) => {
            let missing = config.get_missing_config();
            if missing.is_empty() {
                println!("\n{}", "Configuration found".green());
            } else {
                println!("\n{} {}", "Missing:".red(), missing.join(", "));
            }
        }
        Err(e) => println!("\n{} {}", "Configuration error:".red(), e),
    }

    println!("\n{}", "3. Paste format".yellow());
    println!("   My Road Trip");
    println!("   1. Bachelorette / Björk");
    println!("   2. Windowlicker - Aphex Twin");

    println!("\n{}", "4. Usage".yellow());
    println!("   - playlist-paste parse --file list.txt        (check recognition)");
    println!("   - playlist-paste create --file list.txt --demo (dry run)");
    println!("   - playlist-paste create --file list.txt        (create on Spotify)");

    println!("\n{}", "Ready to paste!".green());
}
