// SPDX-License-Identifier: MIT OR Apache-2.0
//! `OrdoPlay` Presenter - slide presentations from animated components
//!
//! Loads a presentation manifest, compiles every listed segment source onto
//! one timeline, writes the marker sidecar and compiled segments to the output
//! directory and then runs host commands from a script file or stdin. With
//! `--restore` the timeline is rebuilt from the output directory instead:
//!
//! ```text
//! ordoplay_presenter deck.ron --script talk.txt
//! echo "next" | ordoplay_presenter deck.ron --restore --verbose
//! ```

mod commands;
mod manifest;
mod session;

use anyhow::Context;
use clap::Parser;
use manifest::PresentationManifest;
use ordoplay_presenter_timeline::PresenterSettings;
use session::Session;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(
    name = "ordoplay_presenter",
    about = "Assemble animated components into a presentation and navigate it",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Settings file, overrides the one named in the manifest
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Presentation manifest
    manifest: PathBuf,

    /// Command script, stdin when omitted
    #[arg(long)]
    script: Option<PathBuf>,

    /// Directory for the marker sidecar and compiled segments, next to the manifest by default
    #[arg(long)]
    sidecar_dir: Option<PathBuf>,

    /// Rebuild from the sidecar and compiled segments instead of compiling the sources
    #[arg(long)]
    restore: bool,
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("ordoplay_presenter_app={level}").parse()?)
        .add_directive(format!("ordoplay_presenter_timeline={level}").parse()?);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    Ok(())
}

fn load_settings(cli: &Cli, manifest: &PresentationManifest, base: &Path) -> anyhow::Result<PresenterSettings> {
    let path = cli.settings.clone().or_else(|| manifest.settings_path(base));
    match path {
        Some(path) => PresenterSettings::load(&path)
            .with_context(|| format!("loading settings from {}", path.display())),
        None => Ok(PresenterSettings::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    tracing::info!("Starting OrdoPlay Presenter v{}", env!("CARGO_PKG_VERSION"));

    let mut manifest = PresentationManifest::load(&cli.manifest)
        .with_context(|| format!("loading manifest {}", cli.manifest.display()))?;
    let base = cli
        .manifest
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    let settings = load_settings(&cli, &manifest, &base)?;

    let sidecar_dir = cli.sidecar_dir.clone().unwrap_or_else(|| {
        let stem = cli.manifest.file_stem().unwrap_or_default();
        base.join(stem)
    });
    let mut session = Session::new(settings).with_output_dir(&sidecar_dir);

    if cli.restore {
        let reply = session
            .restore()
            .with_context(|| format!("restoring from {}", sidecar_dir.display()))?;
        println!("{reply}");
    } else {
        for (index, path) in manifest.source_paths(&base).into_iter().enumerate() {
            let reply = session
                .compile(&path, None, None)
                .with_context(|| format!("compiling {}", path.display()))?;
            println!("{reply}");
            if let Some(segment) = session.compiled().last() {
                manifest.record_compiled(index, segment.descriptor());
            }
        }
        manifest
            .save(&cli.manifest)
            .with_context(|| format!("saving manifest {}", cli.manifest.display()))?;

        if !session.compiled().is_empty() {
            println!("{}", session.assemble().context("assembling timeline")?);
        }
    }

    match &cli.script {
        Some(path) => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("opening script {}", path.display()))?;
            run_script(&mut session, std::io::BufReader::new(file))
        }
        None => run_script(&mut session, std::io::stdin().lock()),
    }
}

fn run_script(session: &mut Session, reader: impl BufRead) -> anyhow::Result<()> {
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("reading command script")?;
        match session.execute_line(&line) {
            None => {}
            Some(Ok(reply)) => println!("{reply}"),
            Some(Err(e)) => tracing::warn!("line {}: {e:#}", line_no + 1),
        }
    }
    Ok(())
}
