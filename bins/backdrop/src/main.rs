//! backdrop: blur the background of a portrait photo.

use anyhow::Context;
use backdrop_cli::output::{format_duration, format_size, report_error, Status};
use backdrop_cli::progress::{finish_error, finish_success, spinner};
use backdrop_core::config::{Config, MatteSource};
use backdrop_core::error::exit_codes;
use backdrop_image::{decode_data_uri, decode_metadata, detect_format, plan};
use backdrop_matte_client::config::api_key_from_env;
use backdrop_pipeline::{Orchestrator, ProcessRequest};
use backdrop_telemetry::{metrics, TelemetryConfig};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "backdrop")]
#[command(about = "Cut out the subject of a photo and blur what is behind it")]
#[command(version)]
struct Cli {
    /// Configuration file (default: backdrop.toml, .backdrop.toml or .config/backdrop.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline on one photo
    Process(ProcessArgs),
    /// Show the dimensions a source would be resized to
    Plan {
        /// Source width
        width: u32,
        /// Source height
        height: u32,
        /// Longest allowed edge (default: pipeline.max_dimension)
        #[arg(long)]
        max: Option<u32>,
    },
    /// Show format and dimensions of an image
    Inspect {
        /// Path to image file
        path: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct ProcessArgs {
    /// Path to the photo
    path: PathBuf,

    /// Blur amount (default: pipeline.default_blur)
    #[arg(long)]
    blur: Option<f32>,

    /// Directory for the four output images
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Print the result, data URIs included, as JSON instead of writing files
    #[arg(long)]
    json: bool,

    /// Threshold matte computed locally instead of the remote service
    #[arg(long)]
    local: bool,

    /// Print collected metrics to stderr when done
    #[arg(long)]
    metrics: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<backdrop_core::Error>() {
            Some(pipeline_err) => {
                report_error(pipeline_err);
                exit_code(pipeline_err.exit_code())
            }
            None => {
                Status::error(&format!("{err:#}"));
                exit_code(exit_codes::FAILURE)
            }
        },
    }
}

fn exit_code(code: i32) -> ExitCode {
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;

    let mut telemetry = TelemetryConfig::from(&config.schema.logging);
    if cli.verbose {
        telemetry = telemetry.with_level("debug");
    }
    telemetry.json |= cli.log_json;
    backdrop_telemetry::init_with_config(telemetry)?;

    if let Some(path) = &config.path {
        tracing::debug!(path = %path, "Loaded configuration");
    }

    match cli.command {
        Commands::Process(args) => process(args, config).await,
        Commands::Plan { width, height, max } => {
            let max = max.unwrap_or(config.schema.pipeline.max_dimension);
            let target = plan(width, height, max).map_err(backdrop_core::Error::from)?;
            println!("{target}");
            Ok(())
        }
        Commands::Inspect { path, json } => inspect(&path, json, &config),
    }
}

async fn process(args: ProcessArgs, mut config: Config) -> anyhow::Result<()> {
    if args.local {
        config.schema.pipeline.matte_source = MatteSource::LocalThreshold;
    }
    let api_key = match config.schema.pipeline.matte_source {
        MatteSource::Remote => api_key_from_env(),
        MatteSource::LocalThreshold => None,
    };
    let pipeline = Orchestrator::from_schema(&config.schema, api_key)?;

    let bytes = std::fs::read(&args.path).with_context(|| format!("reading {}", args.path.display()))?;
    let filename = args
        .path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let mime_type = detect_format(&bytes)
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream");

    let mut request = ProcessRequest::new(bytes, mime_type, filename);
    request.blur_amount = args.blur;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    let started = Instant::now();
    let pb = spinner(&format!("Processing {}", args.path.display()), !args.json);
    let outcome = pipeline.process_image_with_cancel(request, cancel).await;
    let elapsed = started.elapsed();

    let result = match outcome {
        Ok(result) => {
            finish_success(&pb, &format!("Processed in {}", format_duration(elapsed)));
            result
        }
        Err(err) => {
            finish_error(&pb, "Processing failed");
            if args.json {
                println!("{}", serde_json::to_string_pretty(&err.to_report())?);
            }
            return Err(err.into());
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        std::fs::create_dir_all(&args.out_dir)
            .with_context(|| format!("creating {}", args.out_dir.display()))?;

        for (name, uri) in result.artifacts() {
            let image = decode_data_uri(uri).map_err(backdrop_core::Error::from)?;
            let path = args.out_dir.join(format!("{name}.{}", image.format().extension()));
            std::fs::write(&path, image.data()).with_context(|| format!("writing {}", path.display()))?;
            Status::success(&format!("{} ({})", path.display(), format_size(image.len() as u64)));
        }

        let diagnostics = &result.diagnostics;
        Status::field("dimensions", result.dimensions);
        Status::field("matte", &diagnostics.matte_source);
        Status::field("attempts", diagnostics.matte_attempts);
        if diagnostics.matte_backoff_ms > 0 {
            Status::field(
                "backoff",
                format_duration(std::time::Duration::from_millis(diagnostics.matte_backoff_ms)),
            );
        }
        Status::field("blur", diagnostics.blur_sigma);
        if diagnostics.metadata_fallback {
            Status::warning("Source metadata was unreadable; used the fallback size");
        }
    }

    if args.metrics {
        eprintln!("{}", serde_json::to_string_pretty(&metrics().export_json())?);
    }

    Ok(())
}

fn inspect(path: &Path, json: bool, config: &Config) -> anyhow::Result<()> {
    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let meta = decode_metadata(&data).map_err(backdrop_core::Error::from)?;
    let target = plan(meta.width, meta.height, config.schema.pipeline.max_dimension)
        .map_err(backdrop_core::Error::from)?;

    if json {
        let value = serde_json::json!({
            "metadata": meta,
            "mime_type": meta.format.mime_type(),
            "planned": target,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let orientation = if meta.is_landscape() {
        "Landscape"
    } else if meta.is_portrait() {
        "Portrait"
    } else {
        "Square"
    };

    Status::header(&path.display().to_string());
    Status::field("format", format!("{:?}", meta.format));
    Status::field("mime", meta.format.mime_type());
    Status::field("dimensions", meta.dimensions());
    Status::field("aspect", format!("{:.2}", meta.aspect_ratio()));
    Status::field("orientation", orientation);
    Status::field("size", format_size(meta.size_bytes as u64));
    Status::field("planned", target);
    Ok(())
}
