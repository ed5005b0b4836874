use avmc_config::{Overrides, PROVIDERS};
use clap::builder::PossibleValuesParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "avmc", version, about = "Catalogue a local video library for media servers")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Scan a library root, then scrape, render and move what each code needs
    Run(RunArgs),
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Library root; without it, `avmc.json` in the current directory must name one
    pub path: Option<PathBuf>,
    /// Provider to try first
    #[arg(long, value_parser = PossibleValuesParser::new(PROVIDERS.iter().copied()))]
    pub provider: Option<String>,
    /// Write to disk; without this the run is a dry-run
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub apply: Option<bool>,
}
impl RunArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            path: self.path.clone(),
            provider: self.provider.clone(),
            apply: self.apply,
        }
    }
}
