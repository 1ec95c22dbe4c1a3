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

use std::sync::{Arc, Mutex};
use std::time::Instant;

use log::{error, info};

use super::commands::view_query;
use super::defs::*;
use crate::cache::source::Credentials;
use crate::cache::store::PersistentMailCache;
use crate::webmail::request::{Query, Request};
use crate::webmail::session::{Account, Session};
use crate::webmail::state::State;
use crate::webmail::view::Response;

impl Webmail {
    pub(super) fn log_in(
        &self,
        session: &mut Session,
        request: &Request,
        offline: bool,
    ) -> Response {
        let config = self.config();
        let user = request.text(USER).trim().to_owned();
        let password = request.text(PASSWORD).to_owned();
        let (host, pop3_port, smtp_port) = if config.server.fixed_ports {
            (
                config.server.host.clone(),
                Some(config.server.pop3_port),
                Some(config.server.smtp_port),
            )
        } else {
            (
                request.text(HOST).trim().to_owned(),
                parse_port(request.text(POP3_PORT)),
                parse_port(request.text(SMTP_PORT)),
            )
        };

        let errors_before = session.errors.len();
        if user.is_empty() {
            session.error("Need username for authentication.");
        }
        if password.is_empty() {
            session.error("Need password for authentication.");
        }
        if host.is_empty() {
            session.error("Need hostname for connect.");
        }
        if pop3_port.is_none() {
            session.error("POP3 port number is invalid.");
        }
        if smtp_port.is_none() {
            session.error("SMTP port number is invalid.");
        }

        let (pop3_port, smtp_port) = match (pop3_port, smtp_port) {
            (Some(pop3), Some(smtp)) if errors_before == session.errors.len() => {
                (pop3, smtp)
            }
            _ => return self.render_auth(session),
        };

        let credentials = Credentials {
            host,
            pop3_port,
            smtp_port,
            user,
            password,
        };
        session.log_prefix.set_user(credentials.user.clone());

        let store = match PersistentMailCache::new(
            &config.cache_dir(&self.root),
            &credentials.host,
            credentials.pop3_port,
            &credentials.user,
            &credentials.password,
            session.log_prefix.clone(),
        ) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                error!(
                    "{} Failed to open the mail cache: {}",
                    session.log_prefix, e
                );
                session.error(format!("Cannot open the mail cache: {}", e));
                return self.render_auth(session);
            }
        };

        let source = if offline {
            None
        } else {
            Some(Arc::new(Mutex::new(self.connector.open(&credentials))))
        };

        info!(
            "{} Logged in to {}:{}{}",
            session.log_prefix,
            credentials.host,
            credentials.pop3_port,
            if offline { " (offline)" } else { "" }
        );

        let sender = sender_address(&credentials.user, &config.sender.domain);
        let account =
            Account::new(credentials, sender, store, source, &session.log_prefix);
        account.load_all();
        session.account = Some(account);
        session.state = State::List;
        session.last_check = None;
        self.start_check(session, &config);
        wait_for_folders(session);

        Response::redirect(Query::new())
    }

    pub(super) fn log_out(&self, session: &mut Session) -> Response {
        info!("{} Logged out", session.log_prefix);
        self.discard_unsaved_compose(session);
        session.log_out();
        self.registry.remove(&session.id);
        Response::redirect(Query::new())
    }

    pub(super) fn refresh(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Response {
        if account!(session).is_offline() {
            session.error("Cannot check for new mail while offline.");
        } else {
            let config = self.config();
            self.start_check(session, &config);
        }
        Response::redirect(view_query(request))
    }
}

fn parse_port(text: &str) -> Option<u16> {
    text.trim().parse::<u16>().ok()
}

/// The address mail from `user` is sent from.
fn sender_address(user: &str, domain: &str) -> String {
    if user.contains('@') {
        user.to_owned()
    } else {
        format!("{}@{}", user, domain)
    }
}

/// Give the folders a little time to load, so that the common case does not
/// show the loading page.
fn wait_for_folders(session: &Session) {
    let account = match session.account {
        Some(ref account) => account,
        None => return,
    };

    let deadline = Instant::now() + LOADING_WAIT;
    for folder in account.folders() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if !folder.wait_loaded(remaining) {
            break;
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::fixture::*;
    use super::*;
    use crate::cache::source::NewMailListener;
    use crate::support::system_config::SystemConfig;
    use crate::webmail::action;
    use crate::webmail::request::NONCE;
    use crate::webmail::session::LOGIN_NONCE;
    use crate::webmail::view::PageBody;

    #[test]
    fn port_parsing() {
        assert_eq!(Some(0), parse_port("0"));
        assert_eq!(Some(65535), parse_port(" 65535 "));
        assert_eq!(None, parse_port("65536"));
        assert_eq!(None, parse_port("-1"));
        assert_eq!(None, parse_port(""));
    }

    #[test]
    fn sender_addresses() {
        assert_eq!("me@mail.i2p", sender_address("me", "mail.i2p"));
        assert_eq!(
            "me@elsewhere.i2p",
            sender_address("me@elsewhere.i2p", "mail.i2p")
        );
    }

    #[test]
    fn free_ports_are_validated() {
        let mut config = SystemConfig::default();
        config.server.fixed_ports = false;
        let fixture = set_up_with(&[], config);

        let page = fixture.page(Request::get(&[]));
        match page.body {
            PageBody::Auth(ref view) => assert!(!view.fixed_ports),
            ref body => panic!("Unexpected body {:?}", body),
        }

        let page = fixture.page(Request::post(&[
            (action::LOGIN, "Login"),
            (NONCE, LOGIN_NONCE.as_str()),
            (USER, "me"),
            (PASSWORD, "pw"),
            (HOST, "127.0.0.1"),
            (POP3_PORT, "99999"),
            (SMTP_PORT, "7659"),
        ]));
        assert_eq!(State::Auth, page.state);
        assert_eq!(
            vec!["POP3 port number is invalid.".to_owned()],
            page.errors
        );
    }

    #[test]
    fn refused_login_is_reported_once() {
        let fixture = set_up(&[("m1", M1)]);
        fixture.fake.server.lock().unwrap().refuse_login = true;
        fixture.log_in(0);
        fixture.wait_until(|| {
            let session = fixture.session();
            let session = session.lock().unwrap();
            match session.background.take_check() {
                Some(outcome) => {
                    session.background.found_new_mail(outcome);
                    true
                }
                None => false,
            }
        });

        let page = fixture.page(Request::get(&[]));
        assert_eq!(State::List, page.state);
        assert_eq!(1, page.errors.len());
        assert!(page.errors[0].starts_with("Cannot connect to the server"));
        assert!(fixture.page(Request::get(&[])).errors.is_empty());
    }
}
