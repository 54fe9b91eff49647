// Copyright (c) 2024-2025 Jesse Morgan
// Licensed under the MIT License. See LICENSE file for details.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};
use tracing::{debug, Level};

use civitai_dl::config::{Config, DEFAULT_CONFIG_FILE};
use civitai_dl::reference::Invocation;
use civitai_dl::utils::mask_sensitive;
use civitai_dl::{download_model, FetchError, FetchEvent};

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit codes. Only success and failure are distinguished.
mod exit_codes {
    /// Success - everything downloaded
    pub const SUCCESS: i32 = 0;
    /// Any fatal error
    pub const ERROR: i32 = 1;
}

use exit_codes::*;

/// civitai-dl - Download Civitai models into a ComfyUI model tree.
#[derive(Parser)]
#[command(name = "civitai-dl")]
#[command(version = VERSION)]
#[command(about = "Download Civitai models, previews and metadata into a ComfyUI model tree.")]
#[command(long_about = "civitai-dl - Civitai model downloader\n\n\
    By URL:    civitai-dl loras https://civitai.com/models/328553?modelVersionId=368189\n\
    By AIR:    civitai-dl loras urn:air:sdxl:lora:civitai:328553@368189\n\
    AIR only:  civitai-dl urn:air:sdxl:lora:civitai:328553@368189 -\n\n\
    Files land in <comfyui.base_model_path>/<MODEL_TYPE>/ next to their\n\
    .preview.png, .civitai.info and .description.txt sidecars.")]
struct Cli {
    /// Model type directory (loras, checkpoints, vae, ...), or an AIR
    model_type: String,

    /// Model page URL, download URL, or AIR
    model: String,

    /// Path to the YAML config
    #[arg(short = 'c', long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Quiet mode: no progress bars
    #[arg(short = 'q', long)]
    quiet: bool,

    /// Verbose mode: detailed output for debugging
    #[arg(short = 'v', long)]
    verbose: bool,
}

/// Renders [`FetchEvent`]s as one progress bar per file.
struct ProgressRenderer {
    quiet: bool,
    bar: Option<ProgressBar>,
    file_name: String,
}

impl ProgressRenderer {
    fn new(quiet: bool) -> Self {
        Self {
            quiet,
            bar: None,
            file_name: String::new(),
        }
    }

    fn handle(&mut self, event: FetchEvent<'_>) {
        match event {
            FetchEvent::Started { file_name, total } => {
                self.file_name = file_name.to_string();
                if self.quiet {
                    return;
                }
                let bar = match total {
                    Some(total) => {
                        let bar = ProgressBar::new(total);
                        bar.set_style(
                            ProgressStyle::with_template(
                                "  {spinner:.green} [{bar:30.cyan/blue}] {bytes:>10}/{total_bytes:<10} {bytes_per_sec:>12} {msg}",
                            )
                            .unwrap_or_else(|_| ProgressStyle::default_bar())
                            .progress_chars("█▓░"),
                        );
                        bar
                    }
                    None => {
                        let bar = ProgressBar::new_spinner();
                        bar.set_style(
                            ProgressStyle::with_template("  {spinner:.green} {bytes:>10} {bytes_per_sec:>12} {msg}")
                                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                        );
                        bar
                    }
                };
                bar.set_message(file_name.to_string());
                bar.enable_steady_tick(Duration::from_millis(100));
                self.bar = Some(bar);
            }
            FetchEvent::Progress { downloaded } => {
                if let Some(bar) = &self.bar {
                    bar.set_position(downloaded);
                }
            }
            FetchEvent::Finished { path } => {
                let size = self.bar.take().map(|bar| {
                    let pos = bar.position();
                    bar.finish_and_clear();
                    pos
                });
                if !self.quiet {
                    match size {
                        Some(size) => println!("{} {} ({})", "[OK]".green(), self.file_name, HumanBytes(size)),
                        None => println!("{} {}", "[OK]".green(), self.file_name),
                    }
                }
                debug!("Finished {}", path.display());
            }
        }
    }

    /// Drop a bar left behind by a failed download.
    fn abandon(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.abandon();
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let invocation = Invocation::from_args(&cli.model_type, &cli.model);
    let reference = invocation.resolve()?;
    debug!(
        "Reference {:?}: type={:?} version={}",
        reference.kind(),
        reference.model_type(),
        reference.version_id()
    );

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;
    debug!("Using token {}", mask_sensitive(config.token(), 4));

    let mut renderer = ProgressRenderer::new(cli.quiet);
    let result = download_model(&reference, &config, |event| renderer.handle(event));
    renderer.abandon();
    let placed = result?;

    println!(
        "{} Model files downloaded to {}",
        "[OK]".green().bold(),
        placed.directory.display()
    );
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        match e.downcast_ref::<FetchError>() {
            Some(fetch_error) => eprintln!("{}", fetch_error.report().red()),
            None => eprintln!("{} {:#}", "[✗]".red(), e),
        }
        std::process::exit(ERROR);
    }
    std::process::exit(SUCCESS);
}
