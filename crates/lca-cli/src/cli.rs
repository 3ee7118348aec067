//! Command-line definition

use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;

pub(crate) fn command() -> Command {
    Command::new("lca")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Life cycle assessment calculations with guarded footprint write-back")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("calculate")
                .about("Run a calculation job for a bill of materials and sync the results")
                .arg(
                    Arg::new("bom")
                        .long("bom")
                        .required(true)
                        .value_parser(value_parser!(PathBuf))
                        .help("Bill of materials (JSON)"),
                )
                .arg(
                    Arg::new("factors")
                        .long("factors")
                        .value_parser(value_parser!(PathBuf))
                        .help("Reference tables (JSON); built-in tables when omitted"),
                )
                .arg(
                    Arg::new("config")
                        .long("config")
                        .value_parser(value_parser!(PathBuf))
                        .help("Configuration file (TOML)"),
                )
                .arg(
                    Arg::new("iso")
                        .long("iso")
                        .action(ArgAction::SetTrue)
                        .help("Use the ISO-aligned methodology variant"),
                )
                .arg(
                    Arg::new("previous-carbon")
                        .long("previous-carbon")
                        .help("Stored carbon footprint before this calculation (kg CO2e)"),
                )
                .arg(
                    Arg::new("previous-water")
                        .long("previous-water")
                        .help("Stored water footprint before this calculation (L)"),
                )
                .arg(
                    Arg::new("previous-waste")
                        .long("previous-waste")
                        .help("Stored waste footprint before this calculation (kg)"),
                )
                .arg(
                    Arg::new("no-sync")
                        .long("no-sync")
                        .action(ArgAction::SetTrue)
                        .help("Validate only; never write footprints"),
                ),
        )
        .subcommand(
            Command::new("factors")
                .about("Print the built-in reference tables")
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
}
