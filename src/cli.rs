use anyhow::{Context, Result};
use clap::Parser;

use crate::{run::RunSpec, source::Location};

const BUILD_INFO: &str = env!("MERGEBOT_BUILD_INFO");

/// How evaluated plans are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayMode {
    Quiet,
    #[default]
    Normal,
    Detailed,
    Json,
}

#[derive(Parser, Default, Debug)]
#[command(
    about = "Compute the triage plan (labels, board column, comments, merge/close) for pull request snapshots"
)]
#[command(long_version = BUILD_INFO)]
struct CliArgs {
    /// Snapshot JSON files ('-' reads standard input)
    #[arg(value_name = "SNAPSHOT", required = true)]
    pub snapshots: Vec<String>,

    /// Current PR state to diff mutations against (single snapshot only)
    #[arg(short = 's', long, value_name = "FILE")]
    pub state: Option<String>,

    /// Print the mutations a dry run would apply instead of the plans
    #[arg(short = 'm', long)]
    pub mutations: bool,

    /// Print plans as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the full plan for each PR, including comment bodies
    #[arg(short = 'd', long)]
    pub detailed: bool,

    /// Print PR numbers only
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

impl CliArgs {
    pub fn validate(&self) -> Result<()> {
        let stdin_count = self.snapshots.iter().filter(|s| s.trim() == "-").count();
        if stdin_count > 1 {
            anyhow::bail!("Standard input ('-') can only be read once");
        }

        if let Some(state) = &self.state {
            if self.snapshots.len() != 1 {
                anyhow::bail!("--state can only be used with a single snapshot");
            }
            if state.trim() == "-" && stdin_count == 1 {
                anyhow::bail!("--state and the snapshot cannot both read standard input");
            }
            if !self.mutations {
                anyhow::bail!("--state only makes sense together with --mutations");
            }
        }

        if self.json && (self.detailed || self.quiet) {
            anyhow::bail!("Cannot combine --json with --detailed or --quiet");
        }

        Ok(())
    }
}

fn parse_location(arg: &str) -> Result<Location> {
    let arg = arg.trim();
    if arg.is_empty() {
        anyhow::bail!("Empty snapshot path");
    }
    Ok(Location::parse(arg))
}

fn determine_display_mode(cli: &CliArgs) -> DisplayMode {
    match (cli.json, cli.quiet, cli.detailed) {
        (true, _, _) => DisplayMode::Json,
        (_, true, _) => DisplayMode::Quiet,
        (_, _, true) => DisplayMode::Detailed,
        _ => DisplayMode::Normal,
    }
}

fn create_run_spec(cli: CliArgs) -> Result<RunSpec> {
    cli.validate()?;

    let snapshots = cli
        .snapshots
        .iter()
        .map(|s| parse_location(s))
        .collect::<Result<Vec<_>>>()?;

    let state = cli
        .state
        .as_deref()
        .map(parse_location)
        .transpose()
        .context("Invalid --state")?;

    Ok(RunSpec {
        snapshots,
        state,
        mutations: cli.mutations,
    })
}

/// Parses command-line arguments into a [`RunSpec`] and display mode.
pub fn parse_args<I, T>(args: I) -> Result<(RunSpec, DisplayMode)>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    let cli = CliArgs::try_parse_from(args)?;
    let display_mode = determine_display_mode(&cli);
    let spec = create_run_spec(cli)?;
    Ok((spec, display_mode))
}
