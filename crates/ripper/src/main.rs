use std::path::{Path, PathBuf};
use std::process::ExitCode;

use glripper::config;
use glripper::export::{export_batch, ExportBatch, ExportReport, FsSink};
use glripper::trace::{replay, Trace};
use glripper::Session;
use shared::CaptureSettings;

const USAGE: &str = "usage:
  glripper replay <trace.json> [--out DIR] [--settings FILE] [--no-pacing]
  glripper settings [--settings FILE] [--write]";

enum Command {
    Replay {
        trace: PathBuf,
        out: PathBuf,
        no_pacing: bool,
    },
    Settings {
        write: bool,
    },
}

struct Args {
    command: Command,
    settings: Option<PathBuf>,
}

fn parse_args(args: &[String]) -> Result<Args, String> {
    let Some(name) = args.get(1) else {
        return Err("missing command".into());
    };

    let mut positional = Vec::new();
    let mut out = PathBuf::from("rips");
    let mut settings = None;
    let mut no_pacing = false;
    let mut write = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--out" | "--settings" if i + 1 >= args.len() => {
                return Err(format!("{} needs a value", args[i]));
            }
            "--out" => {
                out = PathBuf::from(&args[i + 1]);
                i += 1;
            }
            "--settings" => {
                settings = Some(PathBuf::from(&args[i + 1]));
                i += 1;
            }
            "--no-pacing" => no_pacing = true,
            "--write" => write = true,
            other if other.starts_with("--") => return Err(format!("unknown flag {other}")),
            other => positional.push(PathBuf::from(other)),
        }
        i += 1;
    }

    let command = match name.as_str() {
        "replay" => {
            let trace = positional
                .into_iter()
                .next()
                .ok_or_else(|| "replay needs a trace file".to_string())?;
            Command::Replay {
                trace,
                out,
                no_pacing,
            }
        }
        "settings" => Command::Settings { write },
        other => return Err(format!("unknown command {other}")),
    };

    Ok(Args { command, settings })
}

#[tokio::main]
async fn main() -> ExitCode {
    let argv: Vec<String> = std::env::args().collect();
    let args = match parse_args(&argv) {
        Ok(args) => args,
        Err(msg) => {
            eprintln!("{msg}\n{USAGE}");
            return ExitCode::from(2);
        }
    };

    // Settings decide the default log level, so they load before tracing is up.
    let loaded = config::load_settings(args.settings.as_deref());
    let debug = loaded.as_ref().map(|s| s.debug_logging).unwrap_or(false);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                if debug {
                    "glripper=debug".into()
                } else {
                    "glripper=info".into()
                }
            }),
        )
        .init();

    let settings = match loaded {
        Ok(settings) => settings,
        Err(e) => {
            tracing::error!("Failed to load settings: {e}");
            return ExitCode::FAILURE;
        }
    };

    match args.command {
        Command::Replay {
            trace,
            out,
            no_pacing,
        } => match run_replay(&trace, out, settings, no_pacing).await {
            Ok(report) if report.failed == 0 => ExitCode::SUCCESS,
            Ok(_) => ExitCode::FAILURE,
            Err(e) => {
                tracing::error!("Replay of {} failed: {e}", trace.display());
                ExitCode::FAILURE
            }
        },
        Command::Settings { write } => show_settings(&settings, args.settings.as_deref(), write),
    }
}

async fn run_replay(
    path: &Path,
    out: PathBuf,
    settings: CaptureSettings,
    no_pacing: bool,
) -> glripper::Result<ExportReport> {
    let json = tokio::fs::read_to_string(path).await?;
    let trace = Trace::from_json(&json)?;

    let mut settings = trace.settings.clone().unwrap_or(settings);
    if no_pacing {
        settings.export_pacing_ms = 0;
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<ExportBatch>();
    let mut session = Session::new(settings, Box::new(tx));
    let summary = replay(&trace, &mut session);
    tracing::info!(
        contexts = summary.contexts,
        calls = summary.calls,
        suppressed = summary.suppressed,
        "Replayed {}",
        path.display()
    );
    // Closes the channel so the drain below ends.
    drop(session);

    let sink = FsSink::new(out);
    let mut total = ExportReport::default();
    let mut batches = 0;
    while let Some(batch) = rx.recv().await {
        let report = export_batch(&sink, batch).await;
        total.written += report.written;
        total.failed += report.failed;
        batches += 1;
    }

    if batches == 0 {
        tracing::warn!("No frame was captured; check the trace arms capture before a clear");
    } else {
        tracing::info!(
            batches,
            written = total.written,
            failed = total.failed,
            "Exported to {}",
            sink.root().display()
        );
    }
    Ok(total)
}

fn show_settings(settings: &CaptureSettings, explicit: Option<&Path>, write: bool) -> ExitCode {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(config::default_settings_path);
    match &path {
        Some(path) => println!("# {}", path.display()),
        None => println!("# no config directory available"),
    }
    match serde_json::to_string_pretty(settings) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            tracing::error!("Failed to serialize settings: {e}");
            return ExitCode::FAILURE;
        }
    }

    if write {
        let Some(path) = path else {
            return ExitCode::FAILURE;
        };
        if let Err(e) = config::save_settings(&path, settings) {
            tracing::error!("Failed to write {}: {e}", path.display());
            return ExitCode::FAILURE;
        }
        tracing::info!("Wrote {}", path.display());
    }
    ExitCode::SUCCESS
}
