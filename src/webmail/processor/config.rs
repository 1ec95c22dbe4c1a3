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
use std::path::PathBuf;
use std::sync::Arc;

use log::{error, info};

use super::defs::*;
use crate::support::file_ops;
use crate::support::system_config::{SystemConfig, CONFIG_FILE_NAME};
use crate::webmail::action::{Action, CONFIG_TEXT};
use crate::webmail::request::{Query, Request};
use crate::webmail::session::Session;
use crate::webmail::state::State;
use crate::webmail::view::*;

/// The only host the configuration may be switched to besides the current
/// one.
const LOCAL_HOST: &str = "localhost";

impl Webmail {
    pub(super) fn dispatch_config(
        &self,
        session: &mut Session,
        action: Action,
        request: &Request,
    ) -> Response {
        match action {
            Action::SaveConfig => self.save_config(session, request),
            Action::Cancel => Response::redirect(Query::new()),
            _ => {
                let text = self.config_text();
                self.render_config(session, text)
            }
        }
    }

    fn config_path(&self) -> PathBuf {
        self.root.join(CONFIG_FILE_NAME)
    }

    /// The configuration file as written, or the effective configuration if
    /// there is no file.
    fn config_text(&self) -> String {
        fs::read_to_string(self.config_path())
            .unwrap_or_else(|_| self.config().to_text())
    }

    /// Show the configuration editor again with the text of a rejected form.
    pub(super) fn redisplay_config(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Response {
        let text = match request.param(CONFIG_TEXT) {
            Some(_) => request.text(CONFIG_TEXT).replace("\r\n", "\n"),
            None => self.config_text(),
        };
        self.render_config(session, text)
    }

    fn render_config(&self, session: &mut Session, text: String) -> Response {
        let view = ConfigView {
            text,
            path: self.config_path().display().to_string(),
        };
        self.page(
            session,
            State::Config,
            "Configuration",
            PageBody::Config(view),
        )
    }

    fn save_config(&self, session: &mut Session, request: &Request) -> Response {
        let text = request.text(CONFIG_TEXT).replace("\r\n", "\n");
        let mut config = match SystemConfig::parse(&text) {
            Ok(config) => config,
            Err(e) => {
                session.error(format!("Invalid configuration: {}", e));
                return self.render_config(session, text);
            }
        };

        let old = self.config();
        let text = if config.server.host != old.server.host
            && LOCAL_HOST != config.server.host
        {
            session.error(format!(
                "Changing the host to {} is not permitted.",
                config.server.host
            ));
            config.server.host = old.server.host.clone();
            config.to_text()
        } else {
            text
        };

        let written = file_ops::spit(
            &self.root,
            self.config_path(),
            true,
            0o600,
            text.as_bytes(),
        );
        if let Err(e) = written {
            error!(
                "{} Failed to write configuration: {}",
                session.log_prefix, e
            );
            session.error(format!("Cannot save configuration: {}", e));
            return self.render_config(session, text);
        }

        session.page_size = config.pager.effective_page_size();
        session.bcc_to_self = config.composer.bcc_to_self;
        *self.config.lock().unwrap() = Arc::new(config);
        info!("{} Configuration saved", session.log_prefix);
        session.info("Configuration saved.");

        Response::redirect(Query::new())
    }
}
