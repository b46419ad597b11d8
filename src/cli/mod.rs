use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod formatters;

#[derive(Parser)]
#[command(name = "taxsim")]
#[command(
    version,
    about = "Brazilian corporate tax regime simulator"
)]
#[command(
    long_about = "Compare the tax burden of a company under Simples Nacional, Lucro Presumido and Lucro Real from one financial snapshot."
)]
pub struct Cli {
    /// Disable colorized/ANSI output
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    /// Database file (defaults to ~/.taxsim/data.db)
    #[arg(long = "db", global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Engine configuration file (defaults to ~/.taxsim/config.toml)
    #[arg(long = "config", global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Create the database and load the statutory reference tables
    Init,

    /// Run the three regimes over a snapshot and compare them
    Simulate {
        /// Snapshot JSON file
        input: PathBuf,

        /// Months covered by the snapshot (IRPJ surtax threshold)
        #[arg(short, long, default_value_t = 1)]
        months: u32,

        /// Read reference tables from a JSON file instead of the database
        #[arg(long, value_name = "JSON")]
        tables: Option<PathBuf>,

        /// Compute only, don't save results
        #[arg(short, long)]
        dry_run: bool,

        /// Also write the itemized comparison to a CSV file
        #[arg(long, value_name = "CSV")]
        export: Option<PathBuf>,
    },

    /// Show the stored result set of a snapshot
    Results {
        /// Snapshot id
        snapshot_id: i64,
    },

    /// Reference table management
    Tables {
        #[command(subcommand)]
        action: TablesCommands,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum TablesCommands {
    /// Show the reference tables stored in the database
    Show {
        /// Only brackets of this Simples Nacional annex
        #[arg(long)]
        annex: Option<u32>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simulate_with_options() {
        let cli = Cli::try_parse_from([
            "taxsim",
            "--json",
            "simulate",
            "snapshot.json",
            "--months",
            "3",
            "--dry-run",
        ])
        .expect("parse failed");

        assert!(cli.json);
        assert_eq!(
            cli.command,
            Commands::Simulate {
                input: PathBuf::from("snapshot.json"),
                months: 3,
                tables: None,
                dry_run: true,
                export: None,
            }
        );
    }

    #[test]
    fn parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["taxsim", "tables", "show", "--annex", "3", "--db", "x.db"])
            .expect("parse failed");

        assert_eq!(cli.db, Some(PathBuf::from("x.db")));
        assert_eq!(
            cli.command,
            Commands::Tables {
                action: TablesCommands::Show { annex: Some(3) }
            }
        );
    }

    #[test]
    fn simulate_requires_input() {
        assert!(Cli::try_parse_from(["taxsim", "simulate"]).is_err());
    }
}
