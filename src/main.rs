use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossbeam_channel::{select, unbounded};

use render_host::cli::Cli;
use render_host::core::bitmap::Bitmap;
use render_host::core::memory_guard::MemoryGuard;
use render_host::core::status::{ChannelStatusSink, LogStatusSink};
use render_host::engines::SoftwareEngine;
use render_host::logging::{init_logging, LoggingConfig};
use render_host::{HeadlessSurface, RenderCoordinator, RenderEvent, RenderState, StartOutcome};

// === Constants ===

const UI_TICK: Duration = Duration::from_millis(20);

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig {
        env_filter: cli.log.clone(),
        ..LoggingConfig::default()
    });

    let settings = cli
        .coordinator_settings()
        .context("failed to load coordinator settings")?;
    let config = cli.render_config();
    let guard = MemoryGuard::system(settings.low_memory_floor_mb);

    let engine = Arc::new(SoftwareEngine::new().with_memory_guard(guard));
    let surface = HeadlessSurface::new(cli.width.max(1) as u32, cli.height.max(1) as u32);
    let coordinator =
        RenderCoordinator::with_system_memory(engine, Box::new(surface.clone()), settings)
            .context("failed to create coordinator")?;

    let (status_tx, status_rx) = unbounded();
    coordinator.add_status_sink(Arc::new(ChannelStatusSink::new(status_tx)));
    if cli.log_status {
        coordinator.add_status_sink(Arc::new(LogStatusSink));
    }
    let (event_tx, event_rx) = unbounded();
    coordinator.on_event(move |event| {
        let _ = event_tx.send(event.clone());
    });

    match coordinator.start(config).context("failed to start render")? {
        StartOutcome::Started { primitives } => log::info!("tracing {primitives} primitives"),
        StartOutcome::AlreadyBusy => bail!("coordinator was already busy"),
    }

    let started = Instant::now();
    let stop_at = cli.stop_after().map(|d| started + d);
    let deadline = started + cli.timeout();
    let ticker = crossbeam_channel::tick(UI_TICK);

    let outcome = loop {
        select! {
            recv(status_rx) -> snapshot => {
                match snapshot {
                    Ok(snapshot) if !cli.quiet => println!("{snapshot}"),
                    _ => {}
                }
            }
            recv(event_rx) -> event => {
                if let Ok(event) = event {
                    break event;
                }
            }
            recv(ticker) -> _ => {
                let now = Instant::now();
                if stop_at.is_some_and(|at| now >= at) && coordinator.state() == RenderState::Busy {
                    log::info!("stop requested after {:?}", now - started);
                    coordinator.stop();
                }
                if now >= deadline {
                    coordinator.stop();
                    bail!("render did not end within {:?}", cli.timeout());
                }
            }
        }
    };

    coordinator
        .wait_for_task(Duration::from_secs(5))
        .context("status task did not exit")?;
    let snapshot = coordinator.status_snapshot();

    match &outcome {
        RenderEvent::Finished(_) => log::info!("render finished"),
        RenderEvent::Stopped(_) => log::info!("render stopped"),
        RenderEvent::Failed { kind, message } => log::error!("render failed ({kind}): {message}"),
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        println!("{snapshot}");
    }

    if let Some(path) = &cli.output {
        let frame = surface
            .last_frame()
            .context("no frame was presented")?;
        write_ppm(path, &frame)?;
        log::info!("wrote {}", path.display());
    }

    if let RenderEvent::Failed { message, .. } = outcome {
        bail!(message);
    }
    Ok(())
}

fn write_ppm(path: &Path, image: &Bitmap) -> Result<()> {
    let file = File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    write!(out, "P6\n{} {}\n255\n", image.width(), image.height())?;
    for pixel in image.pixels().chunks_exact(4) {
        out.write_all(&pixel[..3])?;
    }
    out.flush()?;
    Ok(())
}
