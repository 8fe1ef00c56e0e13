//! streamdash CLI - Command-line interface for the streamdash engine
//!
//! Commands:
//! - participants: List participant folders under the data directory
//! - summarize: Bin a participant's modality and write the summary table
//! - load: Normalize a single export and stream its samples as NDJSON
//! - overview: Collection totals, wearing bands, EEG sessions and diaries

use clap::{Parser, Subcommand, ValueEnum};
use chrono::Duration;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use streamdash::config::parse_origin;
use streamdash::encoder::TableEncoder;
use streamdash::error::{ComputeError, ConfigError, LoadError};
use streamdash::pipeline::{ParticipantOverview, SummaryProcessor};
use streamdash::summary::WearingBand;
use streamdash::{BinConfig, Modality, ParticipantId, TimeSeriesLoader, STREAMDASH_VERSION};

/// streamdash - Binned summaries of wearable study data
#[derive(Parser)]
#[command(name = "streamdash")]
#[command(version = STREAMDASH_VERSION)]
#[command(about = "Summarize participant wearable data into chartable tables", long_about = None)]
struct Cli {
    /// Study data directory (one folder per participant)
    #[arg(long, env = "STREAMDASH_DATA_DIR", default_value = ".", global = true)]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List participants found in the data directory
    Participants {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Bin a participant's modality and write the summary table
    Summarize {
        /// Participant folder name
        #[arg(short, long)]
        participant: String,

        /// Modality to summarize
        #[arg(short, long, default_value = "wristband")]
        modality: ModalityArg,

        /// Bin width in minutes
        #[arg(long, default_value = "60")]
        bin_minutes: i64,

        /// Time of day bins are aligned to (HH:MM or HH:MM:SS)
        #[arg(long, default_value = "00:00")]
        origin: String,

        /// Duration one worn sample represents; defaults to the modality's sampling interval
        #[arg(long)]
        worn_sample_minutes: Option<i64>,

        /// JSON config file; replaces the bin options above
        #[arg(long)]
        config: Option<PathBuf>,

        /// Abort on the first malformed record
        #[arg(long)]
        strict: bool,

        /// Output format
        #[arg(long, default_value = "csv")]
        format: OutputFormat,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,
    },

    /// Normalize one wearing-detection export and print samples as NDJSON
    Load {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,

        /// Participant the export belongs to
        #[arg(short, long, default_value = "unknown")]
        participant: String,

        /// Abort on the first malformed record
        #[arg(long)]
        strict: bool,
    },

    /// Show collection totals, wearing bands, EEG sessions and diaries for a participant
    Overview {
        /// Participant folder name
        #[arg(short, long)]
        participant: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ModalityArg {
    Wristband,
    Sleep,
    Meditation,
}

impl From<ModalityArg> for Modality {
    fn from(arg: ModalityArg) -> Self {
        match arg {
            ModalityArg::Wristband => Modality::Wristband,
            ModalityArg::Sleep => Modality::Sleep,
            ModalityArg::Meditation => Modality::Meditation,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Comma-separated table with a header row
    Csv,
    /// JSON array of rows
    Json,
    /// Indented JSON array of rows
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", serde_json::to_string(&CliError::from(e)).unwrap_or_else(|_| "Unknown error".to_string()));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), StreamdashCliError> {
    match cli.command {
        Commands::Participants { json } => cmd_participants(&cli.data_dir, json),

        Commands::Summarize {
            participant,
            modality,
            bin_minutes,
            origin,
            worn_sample_minutes,
            config,
            strict,
            format,
            output,
        } => {
            let modality = Modality::from(modality);
            let config = match config {
                Some(path) => BinConfig::from_json(&fs::read_to_string(path)?)?,
                None => bin_config_from_args(modality, bin_minutes, &origin, worn_sample_minutes)?,
            };
            cmd_summarize(
                &cli.data_dir,
                &ParticipantId::new(participant),
                modality,
                config,
                strict,
                format,
                &output,
            )
        }

        Commands::Load {
            input,
            participant,
            strict,
        } => cmd_load(&input, &ParticipantId::new(participant), strict),

        Commands::Overview { participant, json } => {
            cmd_overview(&cli.data_dir, &ParticipantId::new(participant), json)
        }
    }
}

fn bin_config_from_args(
    modality: Modality,
    bin_minutes: i64,
    origin: &str,
    worn_sample_minutes: Option<i64>,
) -> Result<BinConfig, StreamdashCliError> {
    let bin_width = Duration::try_minutes(bin_minutes).ok_or_else(|| {
        ConfigError::InvalidConfiguration(format!("bin width of {} minutes is out of range", bin_minutes))
    })?;

    let worn_sample_duration = match worn_sample_minutes {
        Some(minutes) => Duration::try_minutes(minutes).ok_or_else(|| {
            ConfigError::InvalidConfiguration(format!("worn sample of {} minutes is out of range", minutes))
        })?,
        None => {
            let nominal = modality
                .nominal_sample_interval()
                .ok_or(StreamdashCliError::NoSampleDuration(modality))?;
            log::info!(
                "no --worn-sample-minutes given, using the {} sampling interval ({}s)",
                modality,
                nominal.num_seconds()
            );
            nominal
        }
    };

    Ok(BinConfig::new(bin_width, parse_origin(origin)?, worn_sample_duration)?)
}

fn cmd_participants(data_dir: &Path, json: bool) -> Result<(), StreamdashCliError> {
    let processor = SummaryProcessor::new(data_dir, BinConfig::hourly(Duration::minutes(1))?);
    let participants = processor.participants()?;

    if json {
        println!("{}", serde_json::to_string(&participants)?);
    } else {
        for participant in &participants {
            println!("{}", participant);
        }
    }
    Ok(())
}

fn cmd_summarize(
    data_dir: &Path,
    participant: &ParticipantId,
    modality: Modality,
    config: BinConfig,
    strict: bool,
    format: OutputFormat,
    output: &Path,
) -> Result<(), StreamdashCliError> {
    let mut processor = SummaryProcessor::new(data_dir, config).strict(strict);
    let report = processor.summarize(participant, modality)?;

    if !report.rejected.is_empty() {
        log::warn!(
            "{} record(s) rejected while loading {} data for {}",
            report.rejected.len(),
            modality,
            participant
        );
    }

    let encoder = TableEncoder::new();
    let output_data = match format {
        OutputFormat::Csv => encoder.to_csv(&report.bins)?,
        OutputFormat::Json => encoder.to_json(&report.bins, false)? + "\n",
        OutputFormat::JsonPretty => encoder.to_json(&report.bins, true)? + "\n",
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_load(input: &Path, participant: &ParticipantId, strict: bool) -> Result<(), StreamdashCliError> {
    let loader = TimeSeriesLoader::for_modality(Modality::Wristband)?.strict(strict);
    let outcome = loader
        .load(participant, Modality::Wristband, input)
        .map_err(ComputeError::from)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(TableEncoder::new().samples_to_ndjson(&outcome.samples)?.as_bytes())?;
    out.flush()?;

    let stderr = io::stderr();
    let mut err = stderr.lock();
    for rejected in &outcome.rejected {
        writeln!(err, "{}", serde_json::to_string(rejected)?)?;
    }

    Ok(())
}

fn cmd_overview(data_dir: &Path, participant: &ParticipantId, json: bool) -> Result<(), StreamdashCliError> {
    let processor = SummaryProcessor::new(data_dir, BinConfig::hourly(Duration::minutes(1))?);
    let overview = processor.overview(participant)?;

    if json {
        // Indent only for humans
        let text = if atty::is(atty::Stream::Stdout) {
            serde_json::to_string_pretty(&overview)?
        } else {
            serde_json::to_string(&overview)?
        };
        println!("{}", text);
    } else {
        print_overview(&overview);
    }
    Ok(())
}

fn print_overview(overview: &ParticipantOverview) {
    println!("Participant {}", overview.participant_id);
    println!("=================");
    println!(
        "Wristband:  {} day(s), {:.1} h",
        overview.wristband.days_with_data, overview.wristband.total_hours
    );
    println!(
        "Sleep:      {} night(s), {:.1} h",
        overview.sleep.sessions, overview.sleep.total_hours
    );
    println!(
        "Meditation: {} session(s), {:.1} h",
        overview.meditation.sessions, overview.meditation.total_hours
    );

    if !overview.wearing_bands.is_empty() {
        println!("\nHours per wearing band:");
        let labels: Vec<String> = WearingBand::ALL
            .iter()
            .map(|b| format!("{:>7}", b.label()))
            .collect();
        println!("  {:<10} {}", "day", labels.join(" "));
        for day in &overview.wearing_bands {
            let hours: Vec<String> = WearingBand::ALL
                .iter()
                .map(|b| format!("{:>7.2}", day.hours.get(b).copied().unwrap_or(0.0)))
                .collect();
            println!("  {:<10} {}", day.day, hours.join(" "));
        }
    }

    for (title, sessions) in [
        ("Sleep sessions", &overview.sleep_sessions),
        ("Meditation sessions", &overview.meditation_sessions),
    ] {
        if sessions.is_empty() {
            continue;
        }
        println!("\n{}:", title);
        for recording in sessions {
            println!(
                "  {:<12} {} -> {} ({:.2} h)",
                recording.session,
                recording.start.format("%Y-%m-%d %H:%M"),
                recording.stop.format("%Y-%m-%d %H:%M"),
                recording.duration_hours
            );
        }
    }

    if !overview.diaries.is_empty() {
        println!("\nDiaries:");
        for entry in &overview.diaries {
            let file = entry
                .file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let status = match (entry.has_data, entry.recording_date) {
                (false, _) => "empty".to_string(),
                (true, Some(date)) => format!("last entry {}", date.format("%Y-%m-%d %H:%M")),
                (true, None) => "filled, undated".to_string(),
            };
            println!("  {:<15} {:<28} {}", entry.section.as_str(), file, status);
        }
    }
}

// Error types

#[derive(Debug)]
enum StreamdashCliError {
    Io(io::Error),
    Compute(ComputeError),
    Json(serde_json::Error),
    NoSampleDuration(Modality),
}

impl From<io::Error> for StreamdashCliError {
    fn from(e: io::Error) -> Self {
        StreamdashCliError::Io(e)
    }
}

impl From<ComputeError> for StreamdashCliError {
    fn from(e: ComputeError) -> Self {
        StreamdashCliError::Compute(e)
    }
}

impl From<ConfigError> for StreamdashCliError {
    fn from(e: ConfigError) -> Self {
        StreamdashCliError::Compute(ComputeError::Config(e))
    }
}

impl From<serde_json::Error> for StreamdashCliError {
    fn from(e: serde_json::Error) -> Self {
        StreamdashCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl CliError {
    fn new(code: &str, message: String, hint: &str) -> Self {
        Self {
            code: code.to_string(),
            message,
            hint: Some(hint.to_string()),
        }
    }
}

impl From<StreamdashCliError> for CliError {
    fn from(e: StreamdashCliError) -> Self {
        match e {
            StreamdashCliError::Io(e) => {
                CliError::new("IO_ERROR", e.to_string(), "Check file paths and permissions")
            }
            StreamdashCliError::Json(e) => CliError::new("JSON_ERROR", e.to_string(), "Check JSON syntax"),
            StreamdashCliError::NoSampleDuration(modality) => CliError::new(
                "INVALID_CONFIGURATION",
                format!("{} has no fixed sampling interval", modality),
                "Pass --worn-sample-minutes",
            ),
            StreamdashCliError::Compute(e) => {
                let message = e.to_string();
                match e {
                    ComputeError::Load(LoadError::FileNotFound(_)) => CliError::new(
                        "FILE_NOT_FOUND",
                        message,
                        "Check --data-dir and the participant folder name",
                    ),
                    ComputeError::Load(LoadError::Parse(_)) => CliError::new(
                        "PARSE_ERROR",
                        message,
                        "Fix the record or rerun without --strict",
                    ),
                    ComputeError::Load(LoadError::EmptyResult { .. }) => CliError::new(
                        "EMPTY_RESULT",
                        message,
                        "The source has no valid records",
                    ),
                    ComputeError::Load(LoadError::Malformed { .. }) => CliError::new(
                        "MALFORMED_SOURCE",
                        message,
                        "Ensure the file is a wearing-detection CSV export",
                    ),
                    ComputeError::Load(LoadError::Io { .. }) | ComputeError::Io(_) => {
                        CliError::new("IO_ERROR", message, "Check file paths and permissions")
                    }
                    ComputeError::Config(_) => CliError::new(
                        "INVALID_CONFIGURATION",
                        message,
                        "Bin width and worn sample duration must be positive",
                    ),
                    ComputeError::UnsupportedModality(_) => CliError::new(
                        "UNSUPPORTED_MODALITY",
                        message,
                        "Sleep and meditation are session reports; use 'streamdash overview'",
                    ),
                    ComputeError::JsonError(_) | ComputeError::CsvError(_) | ComputeError::EncodingError(_) => {
                        CliError::new("ENCODING_ERROR", message, "Report this as a bug")
                    }
                }
            }
        }
    }
}
