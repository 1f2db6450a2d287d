use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "CLJFF CLI - Evaluate Coulomb + Lennard-Jones energies and run rigid-body Monte Carlo on molecular systems.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the Coulomb and Lennard-Jones energy of a molecular system.
    Energy(EnergyArgs),
    /// Run a Metropolis Monte Carlo simulation of rigid molecular translations.
    Mc(McArgs),
}

/// Inputs shared by every subcommand.
#[derive(Args, Debug)]
pub struct SystemArgs {
    /// Molecule table in CSV format (columns: molecule,x,y,z,charge,lj_type).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub molecules: PathBuf,

    /// LJ parameter file in TOML format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub params: PathBuf,

    /// Optional bond table in CSV format (columns: molecule,atom1,atom2).
    #[arg(short, long, value_name = "PATH")]
    pub bonds: Option<PathBuf>,

    /// Path to the forcefield configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Forcefield Overrides ---
    /// Override both cutoffs from the config file.
    #[arg(long, value_name = "FLOAT")]
    pub cutoff: Option<f64>,

    /// Override the combining rules ('arithmetic' or 'geometric').
    #[arg(long, value_name = "RULE")]
    pub combining_rules: Option<String>,

    /// Force bit-for-bit reproducible parallel sums.
    #[arg(long)]
    pub reproducible: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S soft.alpha=0.5
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `energy` subcommand.
#[derive(Args, Debug)]
pub struct EnergyArgs {
    #[command(flatten)]
    pub system: SystemArgs,
}

/// Arguments for the `mc` subcommand.
#[derive(Args, Debug)]
pub struct McArgs {
    #[command(flatten)]
    pub system: SystemArgs,

    /// Number of attempted moves.
    #[arg(short = 'n', long, default_value_t = 1000, value_name = "INT")]
    pub steps: usize,

    /// Largest displacement along each axis in Angstroms.
    #[arg(long, default_value_t = 0.5, value_name = "FLOAT")]
    pub max_displacement: f64,

    /// Temperature in Kelvin.
    #[arg(short, long, default_value_t = 298.15, value_name = "FLOAT")]
    pub temperature: f64,

    /// Seed of the random number generator.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Compare the incremental energy with a full recalculation every N steps (0 disables).
    #[arg(long, default_value_t = 0, value_name = "INT")]
    pub check_every: usize,
}
