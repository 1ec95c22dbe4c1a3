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

//! Shared set-up for the tests of the state machine.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tempfile::TempDir;

use super::defs::*;
use crate::cache::mail_cache::MailCache;
use crate::cache::source::fake::FakeSource;
use crate::support::system_config::SystemConfig;
use crate::webmail::action;
use crate::webmail::request::{Query, Request, NONCE};
use crate::webmail::session::{Session, LOGIN_NONCE};
use crate::webmail::view::{Page, Response};

pub const SESSION: &str = "0123456789abcdef";

pub const M1: &str = "Date: Mon, 1 Jun 2020 10:00:00 +0000\r\n\
                      From: Alice <alice@mail.i2p>\r\n\
                      To: me@mail.i2p, carol@mail.i2p\r\n\
                      Subject: hello\r\n\
                      \r\n\
                      first line\r\n\
                      second line\r\n";

pub const M2: &str = "Date: Tue, 2 Jun 2020 10:00:00 +0000\r\n\
                      From: Bob <bob@mail.i2p>\r\n\
                      Reply-To: bob-list@mail.i2p\r\n\
                      To: me@mail.i2p\r\n\
                      Subject: second\r\n\
                      MIME-Version: 1.0\r\n\
                      Content-Type: multipart/mixed; boundary=\"b\"\r\n\
                      \r\n\
                      --b\r\n\
                      Content-Type: text/plain; charset=utf-8\r\n\
                      \r\n\
                      see attached\r\n\
                      --b\r\n\
                      Content-Type: application/octet-stream; name=\"data.bin\"\r\n\
                      Content-Transfer-Encoding: base64\r\n\
                      \r\n\
                      AAEC\r\n\
                      --b--\r\n";

pub struct Fixture {
    pub root: TempDir,
    pub fake: FakeSource,
    pub webmail: Webmail,
}

pub fn set_up(messages: &[(&str, &str)]) -> Fixture {
    set_up_with(messages, SystemConfig::default())
}

pub fn set_up_with(messages: &[(&str, &str)], config: SystemConfig) -> Fixture {
    crate::init_test_log();

    let root = TempDir::new().unwrap();
    let fake = FakeSource::with_messages(messages);
    let webmail =
        Webmail::new(root.path().to_owned(), config, Arc::new(fake.clone()))
            .unwrap();
    Fixture {
        root,
        fake,
        webmail,
    }
}

impl Fixture {
    pub fn request(&self, request: Request) -> Response {
        self.webmail.handle(SESSION, request)
    }

    pub fn page(&self, request: Request) -> Page {
        match self.request(request) {
            Response::Page(page) => page,
            response => panic!("Expected page, got {:?}", response),
        }
    }

    /// A nonce valid for the next form submission.
    pub fn nonce(&self) -> String {
        self.page(Request::get(&[])).nonce
    }

    /// Submit a form carrying a valid nonce.
    pub fn post(&self, params: &[(&str, &str)]) -> Response {
        let nonce = self.nonce();
        let mut params = params.to_vec();
        params.push((NONCE, nonce.as_str()));
        self.request(Request::post(&params))
    }

    pub fn post_page(&self, params: &[(&str, &str)]) -> Page {
        match self.post(params) {
            Response::Page(page) => page,
            response => panic!("Expected page, got {:?}", response),
        }
    }

    /// Log in and wait until the inbox holds `expected` messages.
    pub fn log_in(&self, expected: usize) {
        let response = self.request(Request::post(&[
            (action::LOGIN, "Login"),
            (NONCE, LOGIN_NONCE.as_str()),
            (USER, "me"),
            (PASSWORD, "hunter2"),
        ]));
        assert_eq!(Response::redirect(Query::new()), response);

        let inbox = self.folder("Inbox");
        self.wait_until(|| expected == inbox.len() && !inbox.is_checking());
    }

    pub fn session(&self) -> Arc<std::sync::Mutex<Session>> {
        self.webmail
            .registry
            .get_or_create(SESSION, || panic!("No session"))
    }

    pub fn folder(&self, name: &str) -> Arc<MailCache> {
        let session = self.session();
        let session = session.lock().unwrap();
        Arc::clone(
            session
                .account
                .as_ref()
                .and_then(|a| a.folder(name))
                .unwrap(),
        )
    }

    pub fn folder_len(&self, name: &str) -> usize {
        self.folder(name).len()
    }

    /// Poll `condition` until it holds, failing after a few seconds.
    pub fn wait_until(&self, mut condition: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !condition() {
            assert!(Instant::now() < deadline, "Timed out");
            thread::sleep(Duration::from_millis(10));
        }
    }
}
