//! amg CLI — submit MIDI seeds for generation and play MIDI files.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use amg_core::audio::engine::{render_document, write_wav, DEFAULT_SAMPLE_RATE};
use amg_core::audio::SynthConfig;
use amg_core::generate::{ClientConfig, HttpGenerationClient, DEFAULT_ENDPOINT};
use amg_core::midi::{parse_midi_file, MidiDocument};
use amg_core::session::{PlaybackSession, PlaybackSummary, SessionConfig};
use amg_core::Studio;

// ─── Top-level CLI ───────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "amg",
    about = "Generate music from a MIDI seed and play it back",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit a MIDI file to the generation service
    Generate(GenerateArgs),
    /// Play a MIDI file through the built-in synthesizer
    Play(PlayArgs),
    /// Print tempo, meter, and track summary of a MIDI file
    Inspect(InspectArgs),
    /// Render a MIDI file to WAV
    Render(RenderArgs),
}

// ─── Shared arguments (embedded in each subcommand) ──────────────

#[derive(Parser, Debug)]
struct SharedArgs {
    /// Show verbose output
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

#[derive(Parser, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// Seed MIDI file (.mid or .midi)
    input: PathBuf,

    /// Generation endpoint
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Directory for generated-music.midi
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    /// Request timeout in seconds (default: wait indefinitely)
    #[arg(long)]
    timeout: Option<u64>,

    /// Play the generated music when it arrives
    #[arg(long, default_value_t = false)]
    play: bool,
}

#[derive(Parser, Debug)]
struct PlayArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// MIDI file to play
    input: PathBuf,
}

#[derive(Parser, Debug)]
struct InspectArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// MIDI file to inspect
    input: PathBuf,

    /// Print the full document as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    #[command(flatten)]
    shared: SharedArgs,

    /// MIDI file to render
    input: PathBuf,

    /// Output WAV path
    #[arg(long, short)]
    output: PathBuf,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,
}

// ─── Main ────────────────────────────────────────────────────────

fn main() {
    let cli = Cli::parse();

    let verbose = match &cli.command {
        Command::Generate(a) => a.shared.verbose,
        Command::Play(a) => a.shared.verbose,
        Command::Inspect(a) => a.shared.verbose,
        Command::Render(a) => a.shared.verbose,
    };
    let log_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Generate(args) => run_generate(args),
        Command::Play(args) => run_play(args),
        Command::Inspect(args) => run_inspect(args),
        Command::Render(args) => run_render(args),
    };

    if let Err(e) = result {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

// ─── Helpers ─────────────────────────────────────────────────────

const POLL_INTERVAL: Duration = Duration::from_millis(20);

fn validate_input(path: &std::path::Path) -> Result<()> {
    if !path.exists() {
        bail!("File not found: {}", path.display());
    }
    Ok(())
}

fn print_summary(summary: &PlaybackSummary) {
    let meter = summary
        .time_signature
        .map(|(n, d)| format!("{}/{}", n, d))
        .unwrap_or_else(|| "4/4 (default)".to_string());
    println!(
        "Playing {} notes, {:.1} BPM, {}, {:.1}s",
        summary.notes, summary.bpm, meter, summary.duration
    );
}

// ─── Runners ─────────────────────────────────────────────────────

fn run_generate(args: GenerateArgs) -> Result<()> {
    validate_input(&args.input)?;

    let client = HttpGenerationClient::new(ClientConfig {
        endpoint: args.endpoint,
        timeout: args.timeout.map(Duration::from_secs),
    })?;

    let mut studio = Studio::new(SessionConfig::default());
    studio.select_path(&args.input)?;

    println!("Generating from {} via {} ...", args.input.display(), client.endpoint());
    studio.submit(&client);
    if let Some(msg) = studio.error() {
        bail!("{}", msg);
    }

    let path = studio
        .download_to(&args.output_dir)?
        .context("Generation finished without a result")?;
    println!("Output: {}", path.display());

    if args.play {
        let summary = studio.play().context("Generated file could not be played")?;
        print_summary(&summary);
        studio.session_mut().wait_until_idle(POLL_INTERVAL)?;
        if let Some(msg) = studio.error() {
            bail!("{}", msg);
        }
    }
    Ok(())
}

fn run_play(args: PlayArgs) -> Result<()> {
    validate_input(&args.input)?;
    let doc = parse_midi_file(&args.input)?;

    let mut session = PlaybackSession::new(SessionConfig::default());
    let summary = session.play_document(&doc);
    print_summary(&summary);
    session.wait_until_idle(POLL_INTERVAL)?;
    Ok(())
}

fn run_inspect(args: InspectArgs) -> Result<()> {
    validate_input(&args.input)?;
    let doc = parse_midi_file(&args.input)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }
    print_document(&doc);
    Ok(())
}

fn print_document(doc: &MidiDocument) {
    if let Some(name) = &doc.header.name {
        println!("Name:      {}", name);
    }
    match doc.header.ppq {
        Some(ppq) => println!("PPQ:       {}", ppq),
        None => println!("PPQ:       (SMPTE timecode)"),
    }
    println!("Tempo:     {:.1} BPM", doc.initial_bpm());
    if doc.header.tempos.len() > 1 {
        println!("           {} tempo changes", doc.header.tempos.len() - 1);
    }
    match doc.initial_time_signature() {
        Some(ts) => println!("Meter:     {}/{}", ts.numerator, ts.denominator),
        None => println!("Meter:     (none)"),
    }
    println!("Duration:  {:.2}s", doc.duration);
    println!("Notes:     {}", doc.note_count());
    for (i, track) in doc.tracks.iter().enumerate() {
        let name = track.name.as_deref().unwrap_or("");
        let channel = track
            .channel
            .map(|c| (c + 1).to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  track {:>2}: ch {:>2}, program {:>3}, {:>5} notes  {}",
            i,
            channel,
            track.program,
            track.notes.len(),
            name
        );
    }
}

fn run_render(args: RenderArgs) -> Result<()> {
    validate_input(&args.input)?;
    if args.sample_rate == 0 {
        bail!("Sample rate must be positive");
    }
    let doc = parse_midi_file(&args.input)?;

    let samples = render_document(&doc, SynthConfig::default(), args.sample_rate);
    write_wav(&args.output, &samples, args.sample_rate)?;
    println!(
        "Output: {} ({:.1}s)",
        args.output.display(),
        samples.len() as f64 / args.sample_rate as f64
    );
    Ok(())
}
