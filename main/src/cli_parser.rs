/*  keyclave: Multi-realm identity server
 *  Copyright (C) 2023 The keyclave developers
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;

pub const FLAG_CONFIG: &str = "config";
pub const FLAG_CONFIG_DEFAULT: &str = "/etc/keyclave/config.yml";

pub const FLAG_VERBOSE: &str = "verbose";

pub const COMMAND_START: &str = "start";
pub const COMMAND_START_DEV: &str = "start-dev";

pub fn parse_arguments() -> ArgMatches {
    command().get_matches()
}

fn command() -> Command {
    Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .subcommand_required(true)
        .arg(
            Arg::new(FLAG_CONFIG)
                .short('c')
                .long(FLAG_CONFIG)
                .value_name("PATH")
                .help("The config file to run with")
                .num_args(1)
                .default_value(FLAG_CONFIG_DEFAULT),
        )
        .arg(
            Arg::new(FLAG_VERBOSE)
                .short('v')
                .long(FLAG_VERBOSE)
                .action(ArgAction::Count)
                .global(true)
                .help("Raise the log level"),
        )
        .subcommand(Command::new(COMMAND_START).about("Run in production mode"))
        .subcommand(Command::new(COMMAND_START_DEV).about("Run in development mode"))
}
