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
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::Error;

pub const CONFIG_FILE_NAME: &str = "relaymail.toml";
pub const MIN_PAGE_SIZE: usize = 5;

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SystemConfig {
    /// Where the mail relay lives.
    pub server: ServerConfig,
    /// How the sender address of outgoing mail is determined.
    pub sender: SenderConfig,
    pub composer: ComposerConfig,
    pub pager: PagerConfig,
    /// Behaviour of the connection to the POP3 side of the relay.
    pub pop3: Pop3Config,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub pop3_port: u16,
    pub smtp_port: u16,
    /// If true, the host and ports given in the login form are ignored and
    /// the values here are used instead.
    pub fixed_ports: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_owned(),
            pop3_port: 7660,
            smtp_port: 7659,
            fixed_ports: true,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct SenderConfig {
    /// If true, the sender is always `<user@domain>` and cannot be edited.
    pub fixed: bool,
    pub domain: String,
    /// Display name put in front of the address of the fixed sender.
    pub name: String,
}

impl SenderConfig {
    /// The `From` value for a user whose address is `address`.
    pub fn format(&self, address: &str) -> String {
        let name = self
            .name
            .replace(|c: char| c.is_control() || '"' == c, "");
        let name = name.trim();
        if name.is_empty() {
            format!("<{}>", address)
        } else if name.contains(' ') {
            format!("\"{}\" <{}>", name, address)
        } else {
            format!("{} <{}>", name, address)
        }
    }
}

impl Default for SenderConfig {
    fn default() -> Self {
        SenderConfig {
            fixed: true,
            domain: "mail.i2p".to_owned(),
            name: String::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ComposerConfig {
    /// Initial state of the "send a copy to myself" box.
    pub bcc_to_self: bool,
    /// Upper bound on the text plus attachments of one outgoing message.
    pub max_message_size: u64,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        ComposerConfig {
            bcc_to_self: true,
            max_message_size: 10 * 1024 * 1024,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct PagerConfig {
    pub page_size: usize,
}

impl Default for PagerConfig {
    fn default() -> Self {
        PagerConfig { page_size: 20 }
    }
}

impl PagerConfig {
    pub fn effective_page_size(&self) -> usize {
        self.page_size.max(MIN_PAGE_SIZE)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Pop3Config {
    /// If false, messages are deleted from the relay once cached locally.
    pub leave_on_server: bool,
    pub background_check: bool,
    pub check_interval_minutes: u32,
}

impl Default for Pop3Config {
    fn default() -> Self {
        Pop3Config {
            leave_on_server: false,
            background_check: true,
            check_interval_minutes: 30,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root of the persistent mail cache. Relative paths are resolved against
    /// the configuration root.
    pub cache_dir: PathBuf,
    /// Where uploaded and forwarded attachments are kept until sent.
    pub attachment_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            cache_dir: "cache".into(),
            attachment_dir: "attachments".into(),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log to syslog instead of stderr when no `logging.toml` is present.
    pub syslog: bool,
    pub debug: bool,
}

impl SystemConfig {
    pub fn parse(text: &str) -> Result<Self, Error> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(root: &Path) -> Result<Self, Error> {
        let text = fs::read_to_string(root.join(CONFIG_FILE_NAME))?;
        SystemConfig::parse(&text)
    }

    /// Render the configuration as TOML.
    pub fn to_text(&self) -> String {
        // Every field is a plain table or scalar, so serialisation cannot fail
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn cache_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.storage.cache_dir)
    }

    pub fn attachment_dir(&self, root: &Path) -> PathBuf {
        root.join(&self.storage.attachment_dir)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = SystemConfig::parse("").unwrap();
        assert_eq!(SystemConfig::default(), config);
        assert_eq!("127.0.0.1", config.server.host);
        assert_eq!(7660, config.server.pop3_port);
        assert_eq!(7659, config.server.smtp_port);
        assert!(config.sender.fixed);
        assert_eq!(20, config.pager.page_size);
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SystemConfig::parse(
            "[server]\n\
             pop3_port = 1110\n\
             [pager]\n\
             page_size = 2\n",
        )
        .unwrap();
        assert_eq!(1110, config.server.pop3_port);
        assert_eq!(7659, config.server.smtp_port);
        assert_eq!("127.0.0.1", config.server.host);
        assert_eq!(MIN_PAGE_SIZE, config.pager.effective_page_size());
    }

    #[test]
    fn text_round_trips() {
        let mut config = SystemConfig::default();
        config.sender.domain = "example.i2p".to_owned();
        config.logging.debug = true;
        assert_eq!(config, SystemConfig::parse(&config.to_text()).unwrap());
    }

    #[test]
    fn sender_name_is_put_before_address() {
        let mut sender = SenderConfig::default();
        assert_eq!("<me@mail.i2p>", sender.format("me@mail.i2p"));

        sender.name = "Alice".to_owned();
        assert_eq!("Alice <me@mail.i2p>", sender.format("me@mail.i2p"));

        sender.name = " Alice \"A\" Smith\r\n".to_owned();
        assert_eq!(
            "\"Alice A Smith\" <me@mail.i2p>",
            sender.format("me@mail.i2p")
        );

        let config = SystemConfig::parse("[sender]\nname = \"Bob\"\n").unwrap();
        assert_eq!("Bob", config.sender.name);
        assert!(config.sender.fixed);
    }

    #[test]
    fn bad_config_is_an_error() {
        assert_matches!(
            Err(Error::Toml(_)),
            SystemConfig::parse("[server]\npop3_port = \"many\"\n")
        );
    }

    #[test]
    fn relative_dirs_resolve_against_root() {
        let config = SystemConfig::default();
        assert_eq!(
            Path::new("/srv/mail/cache"),
            config.cache_dir(Path::new("/srv/mail"))
        );
    }
}
