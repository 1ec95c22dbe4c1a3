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

//! Per-user session state and the registry of live sessions.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use lazy_static::lazy_static;
use log::info;

use super::state::State;
use crate::cache::mail_cache::MailCache;
use crate::cache::source::{
    Credentials, FetchOutcome, NewMailListener, SharedSource,
};
use crate::cache::store::PersistentMailCache;
use crate::mail::draft::Draft;
use crate::support::log_prefix::LogPrefix;

/// How many recently issued form tokens stay valid.
pub const MAX_NONCES: usize = 15;

/// Sessions idle for longer than this are discarded.
pub const SESSION_EXPIRY: Duration = Duration::from_secs(24 * 3600);

pub const INBOX: &str = "Inbox";
pub const DRAFTS: &str = "Drafts";
pub const SENT: &str = "Sent";
pub const TRASH: &str = "Trash";
/// Every folder of an account, in display order.
pub const FOLDERS: [&str; 4] = [INBOX, DRAFTS, SENT, TRASH];

lazy_static! {
    /// The token of the login form, which is rendered before any session
    /// exists to remember a token for.
    pub static ref LOGIN_NONCE: String = new_nonce();
}

fn new_nonce() -> String {
    format!("{:016x}", rand::random::<u64>())
}

/// The anti-forgery tokens issued most recently to one session.
#[derive(Clone, Debug, Default)]
pub struct NonceWindow {
    nonces: VecDeque<String>,
}

impl NonceWindow {
    /// Issue a fresh token, retiring the oldest one if the window is full.
    pub fn issue(&mut self) -> String {
        let nonce = new_nonce();
        self.push(nonce.clone());
        nonce
    }

    fn push(&mut self, nonce: String) {
        self.nonces.push_front(nonce);
        self.nonces.truncate(MAX_NONCES);
    }

    pub fn contains(&self, nonce: &str) -> bool {
        self.nonces.iter().any(|n| n == nonce)
    }

    pub fn len(&self) -> usize {
        self.nonces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nonces.is_empty()
    }
}

/// Results of background work, waiting to be shown on the next page.
///
/// Background threads outlive the request which started them, so they report
/// here instead of to the session directly.
#[derive(Debug, Default)]
pub struct BackgroundStatus {
    check: Mutex<Option<FetchOutcome>>,
    sends: Mutex<Vec<Result<String, String>>>,
}

impl BackgroundStatus {
    /// The outcome of the most recent check for new mail, if not yet taken.
    pub fn take_check(&self) -> Option<FetchOutcome> {
        self.check.lock().unwrap().take()
    }

    /// Record the result of sending the message with the given subject.
    pub fn report_send(&self, result: Result<String, String>) {
        self.sends.lock().unwrap().push(result);
    }

    pub fn take_sends(&self) -> Vec<Result<String, String>> {
        std::mem::replace(&mut *self.sends.lock().unwrap(), Vec::new())
    }
}

impl NewMailListener for BackgroundStatus {
    fn found_new_mail(&self, outcome: FetchOutcome) {
        *self.check.lock().unwrap() = Some(outcome);
    }
}

/// Everything a logged in session has open.
pub struct Account {
    pub credentials: Credentials,
    /// Sender address of outgoing mail.
    pub sender: String,
    pub store: Arc<PersistentMailCache>,
    pub source: Option<SharedSource>,
    folders: Vec<Arc<MailCache>>,
}

impl Account {
    pub fn new(
        credentials: Credentials,
        sender: String,
        store: Arc<PersistentMailCache>,
        source: Option<SharedSource>,
        log_prefix: &LogPrefix,
    ) -> Self {
        let folders = FOLDERS
            .iter()
            .map(|&name| {
                let folder_source = if INBOX == name {
                    source.clone()
                } else {
                    None
                };
                Arc::new(MailCache::new(
                    name,
                    Arc::clone(&store),
                    folder_source,
                    log_prefix,
                ))
            })
            .collect();

        Account {
            credentials,
            sender,
            store,
            source,
            folders,
        }
    }

    pub fn folder(&self, name: &str) -> Option<&Arc<MailCache>> {
        self.folders.iter().find(|f| f.folder() == name)
    }

    pub fn folders(&self) -> &[Arc<MailCache>] {
        &self.folders
    }

    /// The inbox, which always exists.
    pub fn inbox(&self) -> &Arc<MailCache> {
        &self.folders[0]
    }

    pub fn is_offline(&self) -> bool {
        self.source.is_none()
    }

    /// Names of the folders still being read from disk.
    pub fn loading_folders(&self) -> Vec<String> {
        self.folders
            .iter()
            .filter(|f| !f.is_loaded())
            .map(|f| f.folder().to_owned())
            .collect()
    }

    /// Start loading every folder that is not loaded yet.
    pub fn load_all(&self) {
        for folder in &self.folders {
            folder.load();
        }
    }

    pub fn close(&self) {
        if let Some(ref source) = self.source {
            source.lock().unwrap().close();
        }
    }
}

/// The state of one browser session.
pub struct Session {
    pub id: String,
    pub state: State,
    pub nonces: NonceWindow,
    pub account: Option<Account>,
    /// The draft being composed, if any.
    pub compose: Option<Draft>,
    pub errors: Vec<String>,
    pub info: Vec<String>,
    pub background: Arc<BackgroundStatus>,
    pub page_size: usize,
    pub bcc_to_self: bool,
    pub last_access: Instant,
    pub last_check: Option<Instant>,
    pub log_prefix: LogPrefix,
}

impl Session {
    pub fn new(id: &str, page_size: usize, bcc_to_self: bool) -> Self {
        let log_prefix = LogPrefix::new("webmail".to_owned());
        log_prefix.set_session(id.to_owned());

        Session {
            id: id.to_owned(),
            state: State::Auth,
            nonces: NonceWindow::default(),
            account: None,
            compose: None,
            errors: vec![],
            info: vec![],
            background: Arc::new(BackgroundStatus::default()),
            page_size,
            bcc_to_self,
            last_access: Instant::now(),
            last_check: None,
            log_prefix,
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.info.push(message.into());
    }

    /// Whether `nonce` may authorise a form submission.
    ///
    /// The login token is only good while logged out.
    pub fn is_valid_nonce(&self, nonce: &str) -> bool {
        (State::Auth == self.state && *LOGIN_NONCE == nonce)
            || self.nonces.contains(nonce)
    }

    /// The token to embed in the page about to be rendered.
    pub fn issue_nonce(&mut self) -> String {
        if State::Auth == self.state {
            LOGIN_NONCE.clone()
        } else {
            self.nonces.issue()
        }
    }

    /// Turn background results into messages for the next page.
    pub fn absorb_background(&mut self) {
        match self.background.take_check() {
            Some(FetchOutcome::Found(n)) => {
                self.info(format!("{} new message(s)", n))
            }
            Some(FetchOutcome::NotFound) | None => (),
            Some(FetchOutcome::Failed(reason)) => {
                self.error(format!("Cannot connect to the server: {}", reason))
            }
        }

        for result in self.background.take_sends() {
            match result {
                Ok(subject) => self.info(format!("Message sent: {}", subject)),
                Err(reason) => {
                    self.error(format!("Error sending mail: {}", reason))
                }
            }
        }
    }

    /// Close the account and forget everything tied to it.
    pub fn log_out(&mut self) {
        if let Some(account) = self.account.take() {
            account.close();
        }
        self.compose = None;
        self.state = State::Auth;
        self.last_check = None;
        self.background = Arc::new(BackgroundStatus::default());
    }
}

/// Every live session of the process, each behind its own monitor.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, Arc<Mutex<Session>>>>,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        SessionRegistry {
            sessions: Mutex::new(HashMap::new()),
        }
    }
}

impl SessionRegistry {
    /// Get the session `id`, creating it with `create` if it does not exist.
    pub fn get_or_create(
        &self,
        id: &str,
        create: impl FnOnce() -> Session,
    ) -> Arc<Mutex<Session>> {
        let mut sessions = self.sessions.lock().unwrap();
        Arc::clone(
            sessions
                .entry(id.to_owned())
                .or_insert_with(|| Arc::new(Mutex::new(create()))),
        )
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.lock().unwrap().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }

    /// Forget session `id`.
    ///
    /// The caller is responsible for logging the session out.
    pub fn remove(&self, id: &str) {
        self.sessions.lock().unwrap().remove(id);
    }

    /// Log out and forget every session idle for longer than `expiry`.
    ///
    /// Sessions busy with a request are never idle.
    pub fn sweep(&self, expiry: Duration) -> usize {
        let expired = {
            let mut sessions = self.sessions.lock().unwrap();
            let ids = sessions
                .iter()
                .filter(|&(_, session)| match session.try_lock() {
                    Ok(session) => session.last_access.elapsed() > expiry,
                    Err(_) => false,
                })
                .map(|(id, _)| id.clone())
                .collect::<Vec<_>>();
            ids.into_iter()
                .filter_map(|id| sessions.remove(&id))
                .collect::<Vec<_>>()
        };

        // Closing an account locks its source, so the registry must already
        // be released here.
        for session in &expired {
            let mut session = session.lock().unwrap();
            info!("{} Session expired", session.log_prefix);
            session.log_out();
        }
        expired.len()
    }
}
