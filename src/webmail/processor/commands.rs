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
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{info, warn};

use super::defs::*;
use crate::cache::mail_cache::spawn_check;
use crate::cache::source::{Connector, NewMailListener};
use crate::support::{
    error::Error, log_prefix::LogPrefix, system_config::SystemConfig,
};
use crate::webmail::action::{Action, CONFIG_TEXT};
use crate::webmail::request::{Query, Request, NONCE};
use crate::webmail::session::{Session, SessionRegistry, SESSION_EXPIRY};
use crate::webmail::state::State;
use crate::webmail::view::*;

impl Webmail {
    pub fn new(
        root: PathBuf,
        config: SystemConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, Error> {
        fs::create_dir_all(config.cache_dir(&root))?;
        fs::create_dir_all(config.attachment_dir(&root))?;

        Ok(Webmail {
            log_prefix: LogPrefix::new("webmail".to_owned()),
            root,
            config: Mutex::new(Arc::new(config)),
            connector,
            registry: SessionRegistry::default(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The configuration currently in effect.
    pub fn config(&self) -> Arc<SystemConfig> {
        Arc::clone(&self.config.lock().unwrap())
    }

    pub fn session_count(&self) -> usize {
        self.registry.len()
    }

    /// Handle one request of the session identified by `session_id`.
    pub fn handle(&self, session_id: &str, mut request: Request) -> Response {
        let expired = self.registry.sweep(SESSION_EXPIRY);
        if expired > 0 {
            info!("{} Dropped {} idle sessions", self.log_prefix, expired);
        }

        let config = self.config();
        let session = self.registry.get_or_create(session_id, || {
            Session::new(
                session_id,
                config.pager.effective_page_size(),
                config.composer.bcc_to_self,
            )
        });
        let mut session = session.lock().unwrap();
        session.last_access = Instant::now();
        session.absorb_background();

        let mut action = requested_action(&request);
        let mut rejected = false;
        if request.is_post() && !session.is_valid_nonce(request.text(NONCE)) {
            warn!("{} Rejected form with unknown nonce", session.log_prefix);
            session.error(
                "Invalid form submission, probably because of session \
                 timeout. Please repeat the action.",
            );
            action = None;
            rejected = true;
        }

        if session.account.is_none() {
            return match action {
                Some(Action::Login) => {
                    self.log_in(&mut session, &request, false)
                }
                Some(Action::Offline) => {
                    self.log_in(&mut session, &request, true)
                }
                Some(action) if is_config_target(action, &request) => {
                    self.dispatch_config(&mut session, action, &request)
                }
                _ if rejected && State::Config == session.state => {
                    self.redisplay_config(&mut session, &request)
                }
                _ => self.render_auth(&mut session),
            };
        }

        self.check_periodically(&mut session, &config);

        let exempt = Some(Action::Logout) == action
            || action.map_or(false, |a| is_config_target(a, &request));
        if !exempt {
            let loading = account!(session).loading_folders();
            if !loading.is_empty() {
                return self.render_loading(&mut session, loading, &request);
            }
        }

        match action {
            Some(action) => self.dispatch(&mut session, action, &mut request),
            None if rejected => self.redisplay(&mut session, &request),
            None => self.render_view(&mut session, &request),
        }
    }

    /// Show the page the session was on again after its form was rejected.
    fn redisplay(&self, session: &mut Session, request: &Request) -> Response {
        match session.state {
            State::New => self.redisplay_compose(session, request),
            State::Config => self.redisplay_config(session, request),
            _ => self.render_view(session, request),
        }
    }

    fn dispatch(
        &self,
        session: &mut Session,
        action: Action,
        request: &mut Request,
    ) -> Response {
        match action {
            Action::Login | Action::Offline => {
                Response::redirect(Query::new())
            }
            Action::Logout => self.log_out(session),
            Action::Refresh => self.refresh(session, request),
            Action::Configure | Action::SaveConfig => {
                self.dispatch_config(session, action, request)
            }
            Action::Cancel if request.param(CONFIG_TEXT).is_some() => {
                self.dispatch_config(session, action, request)
            }
            Action::Cancel
            | Action::Send
            | Action::SaveDraft
            | Action::Upload
            | Action::DeleteAttachment => {
                self.compose_action(session, action, request)
            }
            Action::New
            | Action::Reply
            | Action::ReplyAll
            | Action::Forward => self.start_compose(session, action, request),
            Action::Delete | Action::ReallyDelete if request.has(B64UIDL) => {
                self.message_delete(session, action, request)
            }
            Action::Delete | Action::ReallyDelete => {
                self.list_delete(session, action, request)
            }
            Action::Prev | Action::Next | Action::List => {
                self.message_navigate(session, action, request)
            }
            Action::FirstPage
            | Action::PrevPage
            | Action::NextPage
            | Action::LastPage
            | Action::SetPageSize => self.paging(session, action, request),
            Action::MarkAll | Action::Clear | Action::Invert => {
                self.toggle(session, action, request)
            }
        }
    }

    /// Render the view named by the parameters of a GET request.
    pub(super) fn render_view(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Response {
        if request.param(DOWNLOAD).is_some() || request.has(SAVE_AS) {
            self.download(session, request)
        } else if request.param(COMPOSE).is_some() {
            self.show_compose(session, request)
        } else if request.param(SHOW).is_some() {
            self.show_message(session, request)
        } else {
            self.show_list(session, request, |_| false, false)
        }
    }

    /// Build a page, issuing the nonce its forms will carry.
    pub(super) fn page(
        &self,
        session: &mut Session,
        state: State,
        subtitle: impl Into<String>,
        body: PageBody,
    ) -> Response {
        session.state = state;
        let nonce = session.issue_nonce();
        Response::Page(Page {
            state,
            subtitle: subtitle.into(),
            nonce,
            errors: mem::replace(&mut session.errors, Vec::new()),
            info: mem::replace(&mut session.info, Vec::new()),
            body,
        })
    }

    pub(super) fn render_auth(&self, session: &mut Session) -> Response {
        let config = self.config();
        let view = AuthView {
            fixed_ports: config.server.fixed_ports,
            host: config.server.host.clone(),
            pop3_port: config.server.pop3_port,
            smtp_port: config.server.smtp_port,
        };
        self.page(session, State::Auth, "Login", PageBody::Auth(view))
    }

    fn render_loading(
        &self,
        session: &mut Session,
        folders: Vec<String>,
        request: &Request,
    ) -> Response {
        let view = LoadingView {
            folders,
            refresh: view_query(request).to_string(),
        };
        self.page(session, State::Loading, "Loading", PageBody::Loading(view))
    }

    fn check_periodically(&self, session: &mut Session, config: &SystemConfig) {
        if !config.pop3.background_check {
            return;
        }

        let interval =
            Duration::from_secs(60 * u64::from(config.pop3.check_interval_minutes));
        if session.last_check.map_or(false, |t| t.elapsed() < interval) {
            return;
        }

        self.start_check(session, config);
    }

    /// Check the live source for new mail in the background, unless a check
    /// is already running.
    pub(super) fn start_check(&self, session: &mut Session, config: &SystemConfig) {
        let inbox = match session.account {
            Some(ref account) if !account.is_offline() => {
                Arc::clone(account.inbox())
            }
            _ => return,
        };

        if inbox.is_checking() {
            return;
        }

        session.last_check = Some(Instant::now());
        let listener: Arc<dyn NewMailListener> =
            Arc::clone(&session.background) as _;
        spawn_check(inbox, config.pop3.leave_on_server, listener);
    }
}

/// Only the configure link acts on a GET; every other action is a form
/// submission.
fn requested_action(request: &Request) -> Option<Action> {
    match Action::classify(request) {
        Some(Action::Configure) => Some(Action::Configure),
        action if request.is_post() => action,
        _ => None,
    }
}

fn is_config_target(action: Action, request: &Request) -> bool {
    match action {
        Action::Configure | Action::SaveConfig => true,
        Action::Cancel => request.param(CONFIG_TEXT).is_some(),
        _ => false,
    }
}

/// The query reproducing the view of `request`.
pub(super) fn view_query(request: &Request) -> Query {
    [FOLDER, PAGE, SORT, SHOW, COMPOSE]
        .iter()
        .fold(Query::new(), |query, &key| query.with_opt(key, request.param(key)))
}
