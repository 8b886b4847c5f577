//! Rocket League replay parser CLI
//!
//! A command-line interface for decoding replays and extracting trajectories.
//!
//! ## Commands
//!
//! - `info` - Display header, version and table sizes
//! - `frames` - Decode and print network frames
//! - `trajectory` - Print ball or player trajectories
//! - `distance` - Print the distance between two subjects over time
//! - `validate` - Validate a replay (exit codes for scripting)

use std::io::Write;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use rl_replay_parser::analysis::{DistanceSeries, PlayerIdentity, Subject, TrajectorySegment};
use rl_replay_parser::network::{DecodeProgress, NoProgress};
use rl_replay_parser::replay::{ParseOptions, ParsedReplay, ReplaySections};
use rl_replay_parser::{ArchetypeNaming, ParserError};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Rocket League replay parser
#[derive(Parser)]
#[command(name = "rl-replay")]
#[command(about = "Rocket League replay parser and trajectory analyser", long_about = None)]
#[command(version)]
struct Cli {
    /// Log decoding details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show frame decoding progress on stderr
    #[arg(long, global = true)]
    progress: bool,

    /// Rewrite archetype suffixes before net-cache lookup
    #[arg(long, global = true)]
    normalize_archetypes: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display replay information
    Info {
        /// Path to the replay file
        file: PathBuf,
        /// Output format: json, pretty
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
        /// Decode frames and list the players
        #[arg(long)]
        players: bool,
    },
    /// Decode network frames
    Frames {
        /// Path to the replay file
        file: PathBuf,
        /// Output format: json, pretty
        #[arg(short, long, default_value = "json")]
        output: OutputFormat,
    },
    /// Print trajectories of the ball or players
    Trajectory {
        /// Path to the replay file
        file: PathBuf,
        /// `Ball` or player names
        #[arg(required = true)]
        subjects: Vec<String>,
        /// Cut trajectories at goals
        #[arg(long)]
        slice: bool,
        /// Print per-axis components of in-play samples
        #[arg(long)]
        components: bool,
        /// Output format: json, pretty
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
    /// Print the distance between two subjects, or of one from the origin
    Distance {
        /// Path to the replay file
        file: PathBuf,
        /// `Ball` or a player name
        subject: String,
        /// `Ball` or a player name to measure against
        reference: Option<String>,
        /// Output format: json, pretty
        #[arg(short, long, default_value = "pretty")]
        output: OutputFormat,
    },
    /// Validate replay format
    Validate {
        /// Path to the replay file
        file: PathBuf,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

// ============================================================================
// Serializable Output Structures
// ============================================================================

#[derive(Serialize)]
struct InfoOutput<'a> {
    crc: &'a str,
    version: &'a str,
    game_type: &'a str,
    num_frames: Option<usize>,
    goals: Vec<usize>,
    tables: TableSizes,
    #[serde(skip_serializing_if = "Option::is_none")]
    players: Option<Vec<PlayerIdentity>>,
}

#[derive(Serialize)]
struct TableSizes {
    maps: usize,
    keyframes: usize,
    netstream_bytes: usize,
    debug_log: usize,
    goal_events: usize,
    packages: usize,
    objects: usize,
    names: usize,
    classes: usize,
    net_cache: usize,
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = ParseOptions {
        naming: if cli.normalize_archetypes {
            ArchetypeNaming::Normalized
        } else {
            ArchetypeNaming::Verbatim
        },
        ..ParseOptions::default()
    };
    let loader = Loader {
        options,
        progress: cli.progress,
    };

    let result = match cli.command {
        Commands::Info {
            file,
            output,
            players,
        } => cmd_info(&loader, &file, output, players),
        Commands::Frames { file, output } => cmd_frames(&loader, &file, output),
        Commands::Trajectory {
            file,
            subjects,
            slice,
            components,
            output,
        } => cmd_trajectory(&loader, &file, &subjects, slice, components, output),
        Commands::Distance {
            file,
            subject,
            reference,
            output,
        } => cmd_distance(&loader, &file, &subject, reference.as_deref(), output),
        Commands::Validate { file } => return cmd_validate(&loader, &file),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ============================================================================
// Loading
// ============================================================================

struct Loader {
    options: ParseOptions,
    progress: bool,
}

impl Loader {
    fn read(file: &Path) -> Result<Vec<u8>, String> {
        std::fs::read(file).map_err(|e| format!("Failed to read {}: {}", file.display(), e))
    }

    fn sections(&self, file: &Path) -> Result<ReplaySections, String> {
        let data = Self::read(file)?;
        ReplaySections::parse(&data).map_err(describe)
    }

    fn replay(&self, file: &Path) -> Result<ParsedReplay, String> {
        let sections = self.sections(file)?;
        let result = if self.progress {
            let mut report = |p: DecodeProgress| {
                eprint!(
                    "\rDecoding frames: {}/{} ({:.0}%)",
                    p.frames_done,
                    p.frames_total,
                    p.fraction() * 100.0
                );
                let _ = std::io::stderr().flush();
                ControlFlow::Continue(())
            };
            let result = sections.decode_network(self.options, &mut report);
            eprintln!();
            result
        } else {
            sections.decode_network(self.options, &mut NoProgress)
        };
        result.map_err(describe)
    }
}

fn describe(error: ParserError) -> String {
    match &error {
        ParserError::FrameDecodeFailed {
            frame, last_actors, ..
        } => format!(
            "{} (frame {}, {} live actors): {}",
            error,
            frame,
            last_actors.len(),
            error.root_cause()
        ),
        ParserError::MalformedFrame { last_actors, .. } => {
            format!("{} ({} live actors)", error, last_actors.len())
        }
        _ => error.to_string(),
    }
}

// ============================================================================
// Commands
// ============================================================================

fn cmd_info(loader: &Loader, file: &Path, output: OutputFormat, players: bool) -> Result<(), String> {
    let (sections, player_list) = if players {
        let replay = loader.replay(file)?;
        let analyser = replay.analyser().map_err(describe)?;
        let list = analyser.players().values().cloned().collect::<Vec<_>>();
        (replay.sections, Some(list))
    } else {
        (loader.sections(file)?, None)
    };

    let meta = &sections.meta;
    let info = InfoOutput {
        crc: &sections.preamble.crc,
        version: &sections.preamble.version,
        game_type: &sections.header.game_type,
        num_frames: sections.header.num_frames().ok(),
        goals: sections.header.goal_frames().map_err(describe)?,
        tables: TableSizes {
            maps: meta.maps.len(),
            keyframes: meta.keyframes.len(),
            netstream_bytes: meta.netstream.len(),
            debug_log: meta.debug_log.len(),
            goal_events: meta.goals.len(),
            packages: meta.packages.len(),
            objects: meta.objects.len(),
            names: meta.names.len(),
            classes: meta.class_index.len(),
            net_cache: meta.net_cache.len(),
        },
        players: player_list,
    };

    match output {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Pretty => print_info(&info),
    }
    Ok(())
}

fn print_info(info: &InfoOutput<'_>) {
    println!("=== Replay Information ===\n");
    println!("Version: {}", info.version);
    println!("CRC: {}", info.crc);
    println!("Game Type: {}", info.game_type);
    match info.num_frames {
        Some(frames) => println!("Frames: {}", frames),
        None => println!("Frames: unknown"),
    }
    println!("Goals at frames: {:?}", info.goals);
    println!();

    let t = &info.tables;
    println!("Tables:");
    println!("  Maps: {}", t.maps);
    println!("  Keyframes: {}", t.keyframes);
    println!("  Network stream: {} bytes", t.netstream_bytes);
    println!("  Debug log: {}", t.debug_log);
    println!("  Goal events: {}", t.goal_events);
    println!("  Packages: {}", t.packages);
    println!("  Objects: {}", t.objects);
    println!("  Names: {}", t.names);
    println!("  Classes: {}", t.classes);
    println!("  Net cache: {}", t.net_cache);

    if let Some(players) = &info.players {
        println!();
        println!("Players ({}):", players.len());
        for player in players {
            println!("  [team {}] {}", player.team, player.name);
        }
    }
}

fn cmd_frames(loader: &Loader, file: &Path, output: OutputFormat) -> Result<(), String> {
    let replay = loader.replay(file)?;
    match output {
        OutputFormat::Json => print_json(&replay.frames),
        OutputFormat::Pretty => {
            for frame in &replay.frames {
                println!(
                    "Frame {:>6} @ {:>9.3}s: {} actors",
                    frame.index,
                    frame.current_time,
                    frame.touched_actors.len()
                );
                for delta in frame.actors() {
                    println!(
                        "    {:>4} {:?} {} ({} properties)",
                        delta.actor_id,
                        delta.lifecycle,
                        delta.archetype,
                        delta.properties.len()
                    );
                }
            }
        }
    }
    Ok(())
}

fn cmd_trajectory(
    loader: &Loader,
    file: &Path,
    subjects: &[String],
    slice: bool,
    components: bool,
    output: OutputFormat,
) -> Result<(), String> {
    let replay = loader.replay(file)?;
    let analyser = replay.analyser().map_err(describe)?;
    let subjects: Vec<Subject> = subjects.iter().map(|s| Subject::from(s.as_str())).collect();
    let trajectories = analyser.trajectories(&subjects, slice).map_err(describe)?;

    if components {
        let series: Vec<_> = trajectories
            .values()
            .flatten()
            .map(TrajectorySegment::components)
            .collect();
        match output {
            OutputFormat::Json => print_json(&series),
            OutputFormat::Pretty => {
                for s in &series {
                    println!("{}: {} in-play samples", s.title, s.z.len());
                }
            }
        }
        return Ok(());
    }

    match output {
        OutputFormat::Json => print_json(&trajectories),
        OutputFormat::Pretty => {
            for (subject, segments) in &trajectories {
                println!("=== {} ({} segments) ===", subject, segments.len());
                for segment in segments {
                    print_segment(segment);
                }
            }
        }
    }
    Ok(())
}

fn print_segment(segment: &TrajectorySegment) {
    println!(
        "  frames {}-{} ({:.2}s - {:.2}s): {} samples",
        segment.frame_start,
        segment.frame_end,
        segment.time_start,
        segment.time_end,
        segment.positions.len()
    );
}

fn cmd_distance(
    loader: &Loader,
    file: &Path,
    subject: &str,
    reference: Option<&str>,
    output: OutputFormat,
) -> Result<(), String> {
    let replay = loader.replay(file)?;
    let analyser = replay.analyser().map_err(describe)?;
    let reference = reference.map(Subject::from);
    let series = analyser
        .distance(&Subject::from(subject), reference.as_ref())
        .map_err(describe)?;

    match (output, series) {
        (OutputFormat::Json, series) => print_json(&series),
        (OutputFormat::Pretty, None) => println!("No overlapping frames"),
        (OutputFormat::Pretty, Some(series)) => print_distance(&series),
    }
    Ok(())
}

fn print_distance(series: &DistanceSeries) {
    for (time, distance) in series.time.iter().zip(&series.distance) {
        println!("{:>9.3}s {:>10.2}", time, distance);
    }
}

fn cmd_validate(loader: &Loader, file: &Path) -> ExitCode {
    match loader.replay(file) {
        Ok(replay) => {
            println!(
                "{}: VALID ({} frames, version {})",
                file.display(),
                replay.frames.len(),
                replay.sections.preamble.version
            );
            ExitCode::SUCCESS
        }
        Err(reason) => {
            println!("{}: INVALID", file.display());
            println!("  - {}", reason);
            ExitCode::FAILURE
        }
    }
}

fn print_json<T: Serialize + ?Sized>(output: &T) {
    match serde_json::to_string_pretty(output) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing to JSON: {}", e),
    }
}
