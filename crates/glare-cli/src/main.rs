mod config;

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use glare_core::curve::{clamp_strength, MAX_STRENGTH, MIN_STRENGTH};
use glare_core::sim::SimulatedBackend;
use glare_core::{fault, CurveSpec, Engine, GammaBackend, MonitorInfo, ToneCurve};
use glare_x11::X11Backend;
use serde::Serialize;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "glare")]
#[command(version, about = "Verified gamma ramps for attached displays", long_about = None)]
struct Cli {
    /// Run against two in-memory displays instead of the X server
    #[arg(long, global = true)]
    simulate: bool,

    /// Debug logging (RUST_LOG is used otherwise)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List displays with their estimated gamma
    List {
        #[arg(long)]
        json: bool,
    },

    /// Apply a tone curve at the given strength
    Apply {
        /// Strength, 0.1 - 9.0 (1.0 = unchanged for power curves)
        #[arg(value_name = "STRENGTH", value_parser = parse_strength)]
        strength: f64,

        /// Curve shape; defaults to the saved one
        #[arg(long, value_parser = parse_curve)]
        curve: Option<ToneCurve>,

        /// Control points for the custom curve (x:y,x:y,...)
        #[arg(long, value_name = "X:Y,...")]
        points: Option<String>,

        /// Only this display index
        #[arg(short, long, value_name = "N")]
        monitor: Option<usize>,

        /// Keep running and restore the original ramps on Ctrl-C or SIGTERM
        #[arg(long)]
        hold: bool,

        /// Do not remember strength and curve
        #[arg(long)]
        no_save: bool,
    },

    /// Change the saved strength by DELTA and apply it
    Nudge {
        #[arg(value_name = "DELTA", allow_negative_numbers = true, default_value_t = 0.1)]
        delta: f64,

        #[arg(short, long, value_name = "N")]
        monitor: Option<usize>,
    },

    /// Apply the identity ramp and save strength 1.0
    Reset {
        #[arg(short, long, value_name = "N")]
        monitor: Option<usize>,
    },

    /// Print the estimated gamma of a display (primary by default)
    Read {
        #[arg(short, long, value_name = "N")]
        monitor: Option<usize>,
    },
}

fn parse_strength(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("{s:?} is not a number"))?;
    if !(MIN_STRENGTH..=MAX_STRENGTH).contains(&value) {
        return Err(format!("strength must be within {MIN_STRENGTH} - {MAX_STRENGTH}"));
    }
    Ok(value)
}

fn parse_curve(s: &str) -> Result<ToneCurve, String> {
    ToneCurve::ALL
        .iter()
        .copied()
        .find(|c| c.name() == s)
        .ok_or_else(|| {
            let names: Vec<_> = ToneCurve::ALL.iter().map(|c| c.name()).collect();
            format!("unknown curve {s:?}, expected one of: {}", names.join(", "))
        })
}

#[derive(Serialize)]
struct ListEntry {
    #[serde(flatten)]
    info: MonitorInfo,
    gamma: Option<f64>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let backend: Result<Arc<dyn GammaBackend>> = if cli.simulate {
        Ok(Arc::new(SimulatedBackend::demo()))
    } else {
        X11Backend::connect()
            .map(|b| Arc::new(b) as Arc<dyn GammaBackend>)
            .context("failed to connect to the X server")
    };
    let result = backend.and_then(|backend| run(cli.command, backend));
    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("glare: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns false when a display could not be given the requested ramp
fn run<B: GammaBackend>(command: Commands, backend: B) -> Result<bool> {
    let mut engine = Engine::new(backend);
    let count = engine.initialize().context("failed to enumerate displays")?;
    debug!(count, "engine ready");
    match engine.restore_handle() {
        Some(handle) => fault::install(handle),
        None => warn!("originals will not be restored on panic"),
    }

    match command {
        Commands::List { json } => list(&engine, json),
        Commands::Read { monitor } => {
            let index = target_index(&engine, monitor)?;
            let gamma = engine.read_gamma(index)?;
            println!("{gamma:.2}");
            Ok(true)
        }
        Commands::Apply {
            strength,
            curve,
            points,
            monitor,
            hold,
            no_save,
        } => {
            let mut settings = Settings::load();
            settings.strength = strength;
            if let Some(curve) = curve {
                settings.curve = curve;
            }
            if let Some(points) = points {
                settings.custom_points = config::format_points(&config::parse_points(&points)?);
            }
            let spec = settings.curve_spec()?;
            let ok = apply(&mut engine, &spec, settings.strength, monitor)?;
            if !no_save {
                settings.save()?;
            }
            if hold {
                hold_until_signal(&engine, monitor)?;
            }
            Ok(ok)
        }
        Commands::Nudge { delta, monitor } => {
            let mut settings = Settings::load();
            settings.strength = clamp_strength(settings.strength + delta);
            let spec = settings.curve_spec()?;
            let ok = apply(&mut engine, &spec, settings.strength, monitor)?;
            settings.save()?;
            println!("{:.2}", settings.strength);
            Ok(ok)
        }
        Commands::Reset { monitor } => {
            let ok = apply(&mut engine, &CurveSpec::Linear, 1.0, monitor)?;
            let mut settings = Settings::load();
            settings.strength = 1.0;
            settings.save()?;
            Ok(ok)
        }
    }
}

fn target_index<B: GammaBackend>(engine: &Engine<B>, monitor: Option<usize>) -> Result<usize> {
    match monitor {
        Some(index) if index < engine.monitor_count() => Ok(index),
        Some(index) => bail!(
            "no display {index}, {} attached",
            engine.monitor_count()
        ),
        None => Ok(engine.primary_index()?),
    }
}

fn apply<B: GammaBackend>(
    engine: &mut Engine<B>,
    spec: &CurveSpec,
    strength: f64,
    monitor: Option<usize>,
) -> Result<bool> {
    info!(curve = spec.tone().name(), strength, "applying");
    let ok = match monitor {
        Some(index) => {
            let index = target_index(engine, Some(index))?;
            engine.apply_one(index, spec, strength)
        }
        None => engine.apply_all(spec, strength),
    };
    if !ok {
        eprintln!("glare: some displays only accepted identity");
    }
    Ok(ok)
}

fn list<B: GammaBackend>(engine: &Engine<B>, json: bool) -> Result<bool> {
    let entries: Vec<ListEntry> = engine
        .monitors()
        .into_iter()
        .map(|info| {
            let gamma = engine
                .read_gamma(info.index)
                .map_err(|e| warn!(name = %info.name, error = %e, "gamma unreadable"))
                .ok();
            ListEntry { info, gamma }
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(true);
    }
    for entry in &entries {
        let info = &entry.info;
        let gamma = entry
            .gamma
            .map_or_else(|| "?".to_string(), |g| format!("{g:.2}"));
        println!(
            "{}{:>2}  {:<10} {:<24} gamma {}",
            if info.primary { '*' } else { ' ' },
            info.index,
            info.name,
            info.model.as_deref().unwrap_or("-"),
            gamma
        );
    }
    Ok(true)
}

/// Block until Ctrl-C or SIGTERM, then put the original ramps back
fn hold_until_signal<B: GammaBackend>(engine: &Engine<B>, monitor: Option<usize>) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal runtime")?;
    info!("holding, press Ctrl-C to restore");
    runtime
        .block_on(wait_for_shutdown())
        .context("failed to wait for signals")?;

    match monitor {
        Some(index) => {
            if !engine.restore_one(index)? {
                warn!(index, "restore failed");
            }
        }
        None => match engine.restore_handle() {
            Some(handle) => handle.restore_each(|index, ok| {
                if ok {
                    debug!(index, "restored");
                } else {
                    warn!(index, "restore failed");
                }
            }),
            None => {
                engine.restore_all();
            }
        },
    }
    fault::uninstall();
    Ok(())
}

async fn wait_for_shutdown() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res?,
            _ = term.recv() => {}
        }
        Ok(())
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}
