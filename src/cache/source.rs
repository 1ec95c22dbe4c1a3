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

//! The contract of the live mail source.
//!
//! The wire protocols themselves live elsewhere; the cache and the session
//! only ever see a `MailSource` produced by a `Connector`.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};

use crate::mail::draft::Envelope;
use crate::support::error::Error;

/// Everything needed to reach one account on the mail relay.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub pop3_port: u16,
    pub smtp_port: u16,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("pop3_port", &self.pop3_port)
            .field("smtp_port", &self.smtp_port)
            .field("user", &self.user)
            .finish()
    }
}

/// A remote mailbox.
///
/// Every method blocks; callers run them on background threads.
pub trait MailSource: Send {
    /// Log in, if not already connected.
    fn connect(&mut self) -> Result<(), Error>;

    fn is_connected(&self) -> bool;

    /// The uidl and size of every message on the server.
    fn uidls(&mut self) -> Result<Vec<(String, u64)>, Error>;

    /// Write the header block of `uidl` to `out`.
    ///
    /// Returns `Ok(false)` if the server has no such message.
    fn fetch_header(
        &mut self,
        uidl: &str,
        out: &mut dyn Write,
    ) -> Result<bool, Error>;

    /// Write the complete message `uidl` to `out`.
    ///
    /// Returns `Ok(false)` if the server has no such message.
    fn fetch_body(
        &mut self,
        uidl: &str,
        out: &mut dyn Write,
    ) -> Result<bool, Error>;

    /// Delete the given messages from the server.
    fn delete(&mut self, uidls: &[String]) -> Result<(), Error>;

    /// Hand a message over for delivery.
    fn send(&mut self, envelope: &Envelope) -> Result<(), Error>;

    fn close(&mut self);
}

/// A mail source shared between the request threads and background work of
/// one session.
pub type SharedSource = Arc<Mutex<Box<dyn MailSource>>>;

/// Creates mail sources for freshly authenticated sessions.
pub trait Connector: Send + Sync {
    fn open(&self, credentials: &Credentials) -> Box<dyn MailSource>;
}

/// How hard `MailCache::get` tries to obtain a message it does not have.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchMode {
    /// Never contact the live source.
    CacheOnly,
    /// Fetch the header block if not yet known.
    Header,
    /// Fetch the complete message if not yet known.
    Full,
}

/// The result of one check of the live source for new mail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// This many new messages were found.
    Found(usize),
    NotFound,
    /// The check could not be completed.
    Failed(String),
}

/// Receives the result of a background check for new mail.
pub trait NewMailListener: Send + Sync {
    fn found_new_mail(&self, outcome: FetchOutcome);
}

/// A connector for sessions that never reach the network.
///
/// Every source it creates reports itself offline.
#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineConnector;

impl Connector for OfflineConnector {
    fn open(&self, _: &Credentials) -> Box<dyn MailSource> {
        Box::new(OfflineSource)
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct OfflineSource;

impl MailSource for OfflineSource {
    fn connect(&mut self) -> Result<(), Error> {
        Err(Error::Offline)
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn uidls(&mut self) -> Result<Vec<(String, u64)>, Error> {
        Err(Error::Offline)
    }

    fn fetch_header(&mut self, _: &str, _: &mut dyn Write) -> Result<bool, Error> {
        Err(Error::Offline)
    }

    fn fetch_body(&mut self, _: &str, _: &mut dyn Write) -> Result<bool, Error> {
        Err(Error::Offline)
    }

    fn delete(&mut self, _: &[String]) -> Result<(), Error> {
        Err(Error::Offline)
    }

    fn send(&mut self, _: &Envelope) -> Result<(), Error> {
        Err(Error::Offline)
    }

    fn close(&mut self) {}
}


#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            host: "127.0.0.1".to_owned(),
            pop3_port: 7660,
            smtp_port: 7659,
            user: "alice".to_owned(),
            password: "hunter2".to_owned(),
        };
        let debug = format!("{:?}", credentials);
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn offline_source_refuses_everything() {
        let mut source = OfflineConnector.open(&Credentials {
            host: String::new(),
            pop3_port: 0,
            smtp_port: 0,
            user: String::new(),
            password: String::new(),
        });
        assert_matches!(Err(Error::Offline), source.connect());
        assert!(!source.is_connected());
        assert_matches!(Err(Error::Offline), source.uidls());
    }
}
