use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, process, thread};

use clap::{Args, Parser, Subcommand};
use log::{debug, info, LevelFilter};
use waterfall::playback::{Frame, LogSink, Renderer, SystemClock};
use waterfall::parser::DEFAULT_TEMPO;
use waterfall::{load_score, PartSelection, PlaybackConfig, Session, WaterfallError};

/// Compile MusicXML scores into falling-note timelines and play them.
///
/// Logging is controlled with RUST_LOG; see docs for the env_logger crate.
/// If RUST_LOG is not set, the log level defaults to Info.
/// Set RUST_LOG=waterfall=debug to see every triggered note.
#[derive(Parser)]
#[command(version, about, long_about = None, verbatim_doc_comment)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the title, tempo and parts of a score
    Info {
        file: PathBuf,
        /// Dump the parsed score as YAML
        #[arg(long)]
        yaml: bool,
    },
    /// Play a score in real time, logging notes instead of sending them to a device
    Play(PlayOptions),
}

#[derive(Args)]
struct PlayOptions {
    file: PathBuf,
    /// Parts you play, shown as falling notes (default: the first part)
    #[arg(long, value_delimiter = ',')]
    voice: Vec<String>,
    /// Parts sent to the sink (default: every part)
    #[arg(long, value_delimiter = ',')]
    accompany: Vec<String>,
    /// Tempo in BPM (default: the score's own)
    #[arg(long)]
    tempo: Option<f64>,
    /// YAML playback settings
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Logs the notes in view whenever the set changes
#[derive(Default)]
struct LogRenderer {
    in_view: usize,
}

impl Renderer for LogRenderer {
    fn render(&mut self, frame: &Frame<'_>) {
        if frame.notes.len() == self.in_view {
            return;
        }
        self.in_view = frame.notes.len();
        let names: Vec<String> = frame.notes.iter().map(|d| d.note.name()).collect();
        debug!("{:>7.2}s {:>3} bpm  {}", frame.time_code, frame.tempo, names.join(" "));
    }
}

fn load_config(path: Option<&Path>) -> Result<PlaybackConfig, WaterfallError> {
    match path {
        Some(path) => PlaybackConfig::load(path),
        None => Ok(PlaybackConfig::default()),
    }
}

fn show_info(file: &Path, yaml: bool) -> Result<(), WaterfallError> {
    let score = load_score(file)?;
    if yaml {
        print!("{}", serde_yaml::to_string(&score)?);
        return Ok(());
    }

    println!("Title: {}", score.title);
    match score.tempo {
        Some(tempo) => println!("Tempo: {} bpm", tempo),
        None => println!("Tempo: {} bpm (default)", DEFAULT_TEMPO),
    }
    if let Some(time) = &score.time_signature {
        println!("Time:  {}/{}", time.beats, time.beat_type);
    }
    println!("Length: {:.1}s", score.duration());
    println!("Parts:");
    for part in &score.parts {
        println!("  {:<6} {:<24} {} notes", part.id, part.name, score.notes_for(&part.id).count());
    }
    Ok(())
}

fn play(options: PlayOptions) -> Result<(), WaterfallError> {
    let config = load_config(options.config.as_deref())?;
    let frame_time = Duration::from_millis(1000 / config.frame_rate as u64);
    let mut session = Session::load(&options.file, config)?;

    if !options.voice.is_empty() || !options.accompany.is_empty() {
        let players = if options.voice.is_empty() {
            session.selection().players.clone()
        } else {
            options.voice.into_iter().collect()
        };
        session.set_selection(PartSelection {
            players,
            accompaniment: options.accompany.into_iter().collect(),
        });
    }
    for id in session.selection().players.iter().chain(&session.selection().accompaniment) {
        if session.score().part(id).is_none() {
            return Err(WaterfallError::Config(format!("no part with id {id}")));
        }
    }
    if let Some(tempo) = options.tempo {
        session.set_tempo(tempo)?;
    }

    let mut player = session.play(SystemClock::new(), LogSink)?;
    let mut renderer = LogRenderer::default();
    info!("playing \"{}\" at {} bpm", session.score().title, session.tempo());
    while !player.finished() {
        player.step();
        player.render(&mut renderer);
        thread::sleep(frame_time);
    }
    player.stop();
    info!("finished");
    Ok(())
}

fn run() -> Result<(), WaterfallError> {
    let cli = Cli::parse();
    let mut log_builder = env_logger::builder();
    if env::var("RUST_LOG").is_err() {
        log_builder.filter_level(LevelFilter::Info);
    }
    log_builder.init();

    match cli.command {
        Commands::Info { file, yaml } => show_info(&file, yaml),
        Commands::Play(options) => play(options),
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("error: {e}");
        process::exit(1);
    }
}
