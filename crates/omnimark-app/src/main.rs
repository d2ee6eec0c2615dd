//! Command-line entry point.
//!
//! Opens an image, restores its stroke log and writes the annotated result:
//!
//! ```text
//! omnimark <image> [--log strokes.json] [--out annotated.png] [--config omnimark.json]
//! omnimark --shortcuts
//! ```

use omnimark_app::{App, AppConfig, ShortcutRegistry};
use omnimark_core::StrokeLog;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Default)]
struct Args {
    image: Option<PathBuf>,
    log: Option<PathBuf>,
    out: Option<PathBuf>,
    config: Option<PathBuf>,
    shortcuts: bool,
}

fn parse_args() -> Result<Args, String> {
    let mut args = Args::default();
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |flag: &str| {
            iter.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("{} needs a value", flag))
        };
        match arg.as_str() {
            "--log" => args.log = Some(value("--log")?),
            "--out" => args.out = Some(value("--out")?),
            "--config" => args.config = Some(value("--config")?),
            "--shortcuts" => args.shortcuts = true,
            flag if flag.starts_with("--") => return Err(format!("unknown option {}", flag)),
            _ if args.image.is_none() => args.image = Some(PathBuf::from(&arg)),
            _ => return Err(format!("unexpected argument {}", arg)),
        }
    }
    Ok(args)
}

fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };
    let image = args.image.ok_or("no image given")?;

    let mut app = App::new(config);
    app.request_open(image.clone());
    app.wait_for_load().ok_or("image load was cancelled")??;

    if let Some(path) = &args.log {
        let json = std::fs::read_to_string(path)?;
        app.load_stroke_log(&StrokeLog::from_json(&json)?)?;
        log::info!("Applied stroke log {}", path.display());
    }

    let out = args.out.unwrap_or_else(|| image.with_extension("annotated.png"));
    app.export_png(out.clone())?;
    if let Some(outcome) = app.wait_for_export() {
        let bytes = outcome.result?;
        println!("Wrote {} ({} bytes)", out.display(), bytes);
    }
    Ok(())
}

#[cfg(feature = "native")]
fn init_logging() {
    env_logger::init();
}

#[cfg(not(feature = "native"))]
fn init_logging() {}

fn main() -> ExitCode {
    init_logging();
    log::info!("Starting OmniMark");

    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("omnimark: {}", e);
            return ExitCode::from(2);
        }
    };
    if args.shortcuts {
        ShortcutRegistry::print_all();
        return ExitCode::SUCCESS;
    }
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            eprintln!("omnimark: {}", e);
            ExitCode::FAILURE
        }
    }
}
