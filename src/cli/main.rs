//-
// Copyright (c) 2020, The Relaymail Developers
//
// This file is part of Relaymail.
//
// Relaymail is free software: you can  redistribute it and/or modify it under the
// terms of  the GNU General Public  License as published by  the Free Software
// Foundation, either version  3 of the License, or (at  your option) any later
// version.
//
// Relaymail is distributed  in the hope that  it will be useful,  but WITHOUT ANY
// WARRANTY; without  even the implied  warranty of MERCHANTABILITY  or FITNESS
// FOR  A PARTICULAR  PURPOSE.  See the  GNU General  Public  License for  more
// details.
//
// You should have received a copy of the GNU General Public License along with
// Relaymail. If not, see <http://www.gnu.org/licenses/>.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::LevelFilter;
use structopt::StructOpt;

use crate::support::error::Error;
use crate::support::sysexits::*;
use crate::support::system_config::{SystemConfig, CONFIG_FILE_NAME};

#[derive(StructOpt)]
#[structopt(max_term_width = 80)]
enum Command {
    /// Parse a message file and show its MIME structure and text.
    ///
    /// The file must hold a single RFC 822 message. Both DOS and UNIX line
    /// endings are accepted. "-" reads the message from standard input.
    Inspect(InspectSubcommand),
    /// Commands which operate on the persistent mail cache.
    Cache(CacheSubcommand),
    /// Parse the configuration and print it with all defaults filled in.
    CheckConfig(CommonOptions),
}

#[derive(StructOpt, Default)]
pub(super) struct CommonOptions {
    /// The directory containing `relaymail.toml` etc
    /// [default: /etc/relaymail or /usr/local/etc/relaymail]
    #[structopt(long, parse(from_os_str))]
    pub(super) root: Option<PathBuf>,
}

#[derive(StructOpt)]
pub(super) struct InspectSubcommand {
    /// Print only the MIME tree and not the message text.
    #[structopt(long)]
    pub(super) tree_only: bool,

    /// The message to parse.
    #[structopt(parse(from_os_str))]
    pub(super) input: PathBuf,
}

#[derive(StructOpt)]
pub(super) enum CacheSubcommand {
    /// List the messages cached for one account and folder.
    ///
    /// The account is identified by the same credentials used to log in to
    /// the webmail. Host and port default to those in the configuration.
    /// Nothing is fetched from the relay.
    List(CacheListSubcommand),
}

#[derive(StructOpt)]
pub(super) struct CacheListSubcommand {
    #[structopt(flatten)]
    pub(super) common: CommonOptions,

    /// The user name of the account.
    #[structopt(long, short)]
    pub(super) user: String,

    /// The password of the account.
    #[structopt(long, short)]
    pub(super) password: String,

    /// The POP3 host of the account [default: from configuration]
    #[structopt(long)]
    pub(super) host: Option<String>,

    /// The POP3 port of the account [default: from configuration]
    #[structopt(long)]
    pub(super) port: Option<u16>,

    /// The folder to list (Inbox, Drafts, Sent or Trash).
    #[structopt(long, short, default_value = "Inbox")]
    pub(super) folder: String,

    /// Listing order: date, sender, subject or size, with a leading "-" to
    /// reverse it.
    #[structopt(long, default_value = "date")]
    pub(super) sort: String,
}

pub fn main() {
    // Clap exits with status 1 instead of EX_USAGE if we use the more concise
    // API
    let cmd = Command::from_clap(&match Command::clap().get_matches_safe() {
        Ok(matches) => matches,
        Err(
            e @ clap::Error {
                kind: clap::ErrorKind::HelpDisplayed,
                ..
            },
        )
        | Err(
            e @ clap::Error {
                kind: clap::ErrorKind::VersionDisplayed,
                ..
            },
        ) => {
            println!("{}", e.message);
            return;
        }
        Err(e) => {
            eprintln!("{}", e.message);
            EX_USAGE.exit()
        }
    });

    match cmd {
        Command::Inspect(cmd) => {
            if let Err(e) = crate::init_simple_log(LevelFilter::Warn) {
                die!(EX_SOFTWARE, "Failed to initialise logging: {}", e);
            }
            super::inspect::inspect(cmd);
        }
        Command::Cache(CacheSubcommand::List(cmd)) => {
            let root = find_root(cmd.common.root.clone());
            let system_config = load_config(&root);
            init_logging(&root, &system_config);
            super::cache::list(system_config, root, cmd);
        }
        Command::CheckConfig(common) => {
            let root = find_root(common.root);
            let system_config = load_config(&root);
            print!("{}", system_config.to_text());
        }
    }
}

fn find_root(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| {
        if Path::new("/etc/relaymail").join(CONFIG_FILE_NAME).is_file() {
            "/etc/relaymail".to_owned().into()
        } else if Path::new("/usr/local/etc/relaymail")
            .join(CONFIG_FILE_NAME)
            .is_file()
        {
            "/usr/local/etc/relaymail".to_owned().into()
        } else {
            die!(
                EX_CONFIG,
                "Neither /etc/relaymail nor /usr/local/etc/relaymail looks\n\
                 like the Relaymail root; use --root=/path/to/relaymail if\n\
                 your installation is elsewhere."
            )
        }
    })
}

/// Load the configuration under `root`.
///
/// A missing file means every setting takes its default, the same as the
/// webmail does.
fn load_config(root: &Path) -> SystemConfig {
    if !root.is_dir() {
        die!(EX_CONFIG, "'{}' is not a directory", root.display());
    }

    let path = root.join(CONFIG_FILE_NAME);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if io::ErrorKind::NotFound == e.kind() => {
            eprintln!("'{}' not found; using defaults", path.display());
            return SystemConfig::default();
        }
        Err(e) => die!(EX_CONFIG, "Error reading '{}': {}", path.display(), e),
    };

    match SystemConfig::parse(&text) {
        Ok(config) => config,
        Err(Error::Toml(e)) => die!(
            EX_CONFIG,
            "Error in config file at '{}': {}",
            path.display(),
            e
        ),
        Err(e) => die!(EX_CONFIG, "{}: {}", path.display(), e),
    }
}

fn init_logging(root: &Path, system_config: &SystemConfig) {
    let level = if system_config.logging.debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    // log4rs *or* syslog; log4rs-syslog is not in a usable state
    let log_config_file = root.join("logging.toml");
    let result = if log_config_file.is_file() {
        log4rs::init_file(log_config_file, log4rs::file::Deserializers::new())
            .map_err(|e| e.to_string())
    } else if system_config.logging.syslog {
        init_syslog(level)
    } else {
        crate::init_simple_log(level)
    };

    if let Err(e) = result {
        die!(EX_SOFTWARE, "Failed to initialise logging: {}", e);
    }
}

fn init_syslog(level: LevelFilter) -> Result<(), String> {
    let formatter = syslog::Formatter3164 {
        facility: syslog::Facility::LOG_MAIL,
        hostname: None,
        process: env!("CARGO_PKG_NAME").to_owned(),
        pid: std::process::id() as i32,
    };
    let logger = syslog::unix(formatter).map_err(|e| e.to_string())?;
    log::set_boxed_logger(Box::new(syslog::BasicLogger::new(logger)))
        .map(|_| log::set_max_level(level))
        .map_err(|e| e.to_string())
}
