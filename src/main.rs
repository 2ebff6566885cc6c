use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use env_logger::Env;
use fourier_series::pipeline::{parse_kind, DEFAULT_TERMS};
use fourier_series::{
  run, EngineConfig, InboundRequest, MaximaEngine, Piece, PiecewiseFunction,
  SeriesRequest,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Commands,

  /// Maxima executable
  #[arg(long, global = true, env = "FOURIER_MAXIMA", default_value = "maxima")]
  maxima: String,

  /// Log level (overridden by RUST_LOG when set)
  #[arg(
    long,
    global = true,
    env = "FOURIER_LOG",
    value_enum,
    default_value_t = LogLevel::Warn
  )]
  log_level: LogLevel,

  /// Pretty-print the JSON response
  #[arg(long, global = true)]
  pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
  /// Compute a series from pieces given on the command line
  Series {
    /// Series kind: trigonometric, half-range-cosine, half-range-sine, complex
    #[arg(long, default_value = "trigonometric")]
    kind: String,

    /// Integration variable
    #[arg(long, default_value = "x")]
    var: String,

    /// One piece: expression, lower bound, upper bound (repeatable)
    #[arg(
      long,
      num_args = 3,
      value_names = ["EXPR", "LOWER", "UPPER"],
      required = true
    )]
    piece: Vec<String>,

    /// Number of harmonic terms to expand
    #[arg(long, env = "FOURIER_TERMS", default_value_t = DEFAULT_TERMS)]
    terms: usize,
  },
  /// Compute a series from a JSON request file ("-" reads stdin)
  Request {
    /// Path to the request file
    file: PathBuf,
  },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
  Error,
  Warn,
  Info,
  Debug,
  Trace,
}

impl From<LogLevel> for log::LevelFilter {
  fn from(level: LogLevel) -> Self {
    match level {
      LogLevel::Error => log::LevelFilter::Error,
      LogLevel::Warn => log::LevelFilter::Warn,
      LogLevel::Info => log::LevelFilter::Info,
      LogLevel::Debug => log::LevelFilter::Debug,
      LogLevel::Trace => log::LevelFilter::Trace,
    }
  }
}

fn init_logging(level: LogLevel) {
  let mut builder = env_logger::Builder::new();
  builder.filter_level(level.into());
  // RUST_LOG, when present, wins over the flag
  builder.parse_env(Env::default());
  builder.init();
}

fn series_request(
  kind: &str,
  var: String,
  piece: Vec<String>,
  terms: usize,
) -> Result<SeriesRequest> {
  let pieces = piece
    .chunks_exact(3)
    .map(|chunk| Piece::new(&chunk[0], &chunk[1], &chunk[2]))
    .collect();
  let function = PiecewiseFunction::new(pieces, var)?;
  Ok(SeriesRequest::new(function, parse_kind(kind)?, terms)?)
}

fn read_request(file: &Path) -> Result<SeriesRequest> {
  let content = if file.as_os_str() == "-" {
    std::io::read_to_string(std::io::stdin())
      .context("failed to read request from stdin")?
  } else {
    std::fs::read_to_string(file)
      .with_context(|| format!("failed to read {}", file.display()))?
  };
  let inbound: InboundRequest =
    serde_json::from_str(&content).context("request is not valid JSON")?;
  Ok(SeriesRequest::try_from(inbound)?)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  let cli = Cli::parse();
  init_logging(cli.log_level);

  let request = match cli.command {
    Commands::Series {
      kind,
      var,
      piece,
      terms,
    } => series_request(&kind, var, piece, terms)?,
    Commands::Request { file } => read_request(&file)?,
  };

  let config = EngineConfig::default().with_executable(cli.maxima);
  let engine = MaximaEngine::new(config.clone());
  let response = run(request, &config, &engine).await;

  let json = if cli.pretty {
    serde_json::to_string_pretty(&response)?
  } else {
    serde_json::to_string(&response)?
  };
  println!("{json}");

  if !response.is_success() {
    std::process::exit(1);
  }
  Ok(())
}
