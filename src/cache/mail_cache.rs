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

//! The in-memory index of one folder, layered over the persistent store and,
//! for the inbox, the live mail source.

use std::collections::HashMap;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering::SeqCst};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::{error, info, warn};

use super::source::{FetchMode, FetchOutcome, NewMailListener, SharedSource};
use super::store::{EntryKind, PersistentMailCache};
use crate::mail::mail::Mail;
use crate::support::error::Error;
use crate::support::log_prefix::LogPrefix;
use crate::support::threading::{spawn_detached, Latch};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Loaded,
}

/// A message being received from the live source.
///
/// Nothing of it reaches the store or the index until it is passed to
/// `MailCache::commit` with `success` set.
#[derive(Debug)]
pub struct WriteBuffer {
    uidl: String,
    kind: EntryKind,
    data: Vec<u8>,
}

impl WriteBuffer {
    pub fn uidl(&self) -> &str {
        &self.uidl
    }
}

impl Write for WriteBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Inner {
    state: LoadState,
    mails: HashMap<String, Mail>,
}

pub struct MailCache {
    folder: String,
    store: Arc<PersistentMailCache>,
    source: Option<SharedSource>,
    inner: Mutex<Inner>,
    loaded: Latch,
    checking: AtomicBool,
    log_prefix: LogPrefix,
}

impl MailCache {
    /// Create the (not yet loaded) cache of `folder`.
    ///
    /// `source` is only given for the folder backed by the live source.
    pub fn new(
        folder: impl Into<String>,
        store: Arc<PersistentMailCache>,
        source: Option<SharedSource>,
        log_prefix: &LogPrefix,
    ) -> Self {
        let folder = folder.into();
        MailCache {
            log_prefix: log_prefix.for_folder(&folder),
            folder,
            store,
            source,
            inner: Mutex::new(Inner {
                state: LoadState::Idle,
                mails: HashMap::new(),
            }),
            loaded: Latch::new(),
            checking: AtomicBool::new(false),
        }
    }

    pub fn folder(&self) -> &str {
        &self.folder
    }

    pub fn state(&self) -> LoadState {
        self.inner.lock().unwrap().state
    }

    pub fn is_loaded(&self) -> bool {
        LoadState::Loaded == self.state()
    }

    /// Whether a check of the live source is in progress.
    pub fn is_checking(&self) -> bool {
        self.checking.load(SeqCst)
    }

    /// Wait up to `timeout` for loading to complete.
    pub fn wait_loaded(&self, timeout: Duration) -> bool {
        self.loaded.wait_timeout(timeout)
    }

    /// Begin loading the folder from disk in the background.
    ///
    /// Returns whether this call started the load; if the folder is already
    /// loading or loaded, nothing happens.
    pub fn load(self: &Arc<Self>) -> bool {
        if !self.begin_load() {
            return false;
        }

        let this = Arc::clone(self);
        spawn_detached("cache-loader", move || this.populate());
        true
    }

    /// Load the folder from disk on the calling thread.
    pub fn load_blocking(&self) {
        if self.begin_load() {
            self.populate();
        } else {
            self.loaded.wait();
        }
    }

    fn begin_load(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if LoadState::Idle != inner.state {
            return false;
        }
        inner.state = LoadState::Loading;
        true
    }

    fn populate(&self) {
        let loaded = match self.store.load_folder(&self.folder) {
            Ok(mails) => mails,
            Err(e) => {
                error!("{} Failed to load folder: {}", self.log_prefix, e);
                Vec::new()
            }
        };

        {
            let mut inner = self.inner.lock().unwrap();
            for mail in loaded {
                // Anything fetched while the load ran is at least as fresh
                let keep_existing = inner.mails.get(&mail.uidl).map_or(
                    false,
                    |existing| {
                        existing.has_body()
                            || (existing.has_header() && !mail.has_body())
                    },
                );
                if !keep_existing {
                    inner.mails.insert(mail.uidl.clone(), mail);
                }
            }
            inner.state = LoadState::Loaded;
            info!(
                "{} Folder loaded with {} messages",
                self.log_prefix,
                inner.mails.len()
            );
        }

        self.loaded.fire();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().mails.len()
    }

    pub fn is_empty(&self) -> bool {
        0 == self.len()
    }

    pub fn contains(&self, uidl: &str) -> bool {
        self.inner.lock().unwrap().mails.contains_key(uidl)
    }

    /// A copy of every indexed message.
    pub fn snapshot(&self) -> Vec<Mail> {
        self.inner.lock().unwrap().mails.values().cloned().collect()
    }

    /// Get the message `uidl`, going as far as `mode` allows to obtain it.
    ///
    /// Failures to reach the live source or the store are logged and result
    /// in whatever was already known being returned.
    pub fn get(&self, uidl: &str, mode: FetchMode) -> Option<Mail> {
        let (indexed, loaded) = {
            let inner = self.inner.lock().unwrap();
            (
                inner.mails.get(uidl).cloned(),
                LoadState::Loaded == inner.state,
            )
        };

        let existing = match indexed {
            Some(mail) => Some(mail),
            None if !loaded => self.read_store(uidl),
            None => None,
        };

        let satisfied = match (mode, &existing) {
            (FetchMode::CacheOnly, _) => true,
            (_, Some(mail)) if mail.has_body() => true,
            (FetchMode::Header, Some(mail)) => mail.has_header(),
            _ => false,
        };
        if satisfied {
            return existing;
        }

        let kind = if FetchMode::Full == mode {
            EntryKind::Full
        } else {
            EntryKind::Header
        };

        match self.fetch(uidl, kind) {
            Ok(Some(mail)) => Some(mail),
            Ok(None) => existing,
            Err(e) => {
                warn!(
                    "{} Failed to fetch {} of {}: {}",
                    self.log_prefix,
                    if EntryKind::Full == kind { "body" } else { "header" },
                    uidl,
                    e
                );
                existing
            }
        }
    }

    fn read_store(&self, uidl: &str) -> Option<Mail> {
        match self.store.read(&self.folder, uidl) {
            Ok(Some(mail)) => {
                let mut inner = self.inner.lock().unwrap();
                Some(
                    inner
                        .mails
                        .entry(uidl.to_owned())
                        .or_insert(mail)
                        .clone(),
                )
            }
            Ok(None) => None,
            Err(e) => {
                error!(
                    "{} Failed to read {} from disk: {}",
                    self.log_prefix, uidl, e
                );
                None
            }
        }
    }

    fn fetch(&self, uidl: &str, kind: EntryKind) -> Result<Option<Mail>, Error> {
        let source = match self.source {
            Some(ref source) => source,
            None => return Ok(None),
        };

        let mut buffer = self.open_write_buffer(uidl, kind);
        let found = {
            let mut source = source.lock().unwrap();
            match kind {
                EntryKind::Header => source.fetch_header(uidl, &mut buffer),
                EntryKind::Full => source.fetch_body(uidl, &mut buffer),
            }
        };

        let success = matches!(found, Ok(true));
        let mail = self.commit(buffer, success)?;
        found?;
        Ok(mail)
    }

    /// Start receiving message `uidl` as `kind`.
    pub fn open_write_buffer(&self, uidl: &str, kind: EntryKind) -> WriteBuffer {
        WriteBuffer {
            uidl: uidl.to_owned(),
            kind,
            data: Vec::new(),
        }
    }

    /// Finish receiving a message.
    ///
    /// If `success` is false the buffer is discarded and nothing changes.
    /// Otherwise the data is saved to the store and indexed, and the updated
    /// message is returned.
    pub fn commit(
        &self,
        buffer: WriteBuffer,
        success: bool,
    ) -> Result<Option<Mail>, Error> {
        if !success {
            return Ok(None);
        }

        let WriteBuffer { uidl, kind, data } = buffer;
        match kind {
            EntryKind::Header => {
                self.store.save_header(&self.folder, &uidl, &data)?
            }
            EntryKind::Full => self.store.save_full(&self.folder, &uidl, &data)?,
        }

        let mut inner = self.inner.lock().unwrap();
        let mail = inner
            .mails
            .entry(uidl.clone())
            .or_insert_with(|| Mail::new(uidl));
        match kind {
            EntryKind::Header if !mail.has_body() => mail.set_header(data),
            EntryKind::Header => (),
            EntryKind::Full => mail.set_body(data),
        }
        Ok(Some(mail.clone()))
    }

    /// Store a locally created message under `uidl`, replacing any previous
    /// version.
    pub fn put(&self, uidl: &str, data: Vec<u8>) -> Result<Mail, Error> {
        self.store.replace_full(&self.folder, uidl, &data)?;

        let mut mail = Mail::new(uidl);
        mail.set_body(data);
        self.inner
            .lock()
            .unwrap()
            .mails
            .insert(uidl.to_owned(), mail.clone());
        Ok(mail)
    }

    /// Delete the given messages from this folder, and from the live source
    /// if there is one.
    ///
    /// Returns the number of messages which were indexed.
    pub fn delete(&self, uidls: &[String]) -> usize {
        let mut removed = 0;
        for uidl in uidls {
            if self.inner.lock().unwrap().mails.remove(uidl).is_some() {
                removed += 1;
            }
            if let Err(e) = self.store.delete(&self.folder, uidl) {
                error!(
                    "{} Failed to delete {} from disk: {}",
                    self.log_prefix, uidl, e
                );
            }
        }

        self.delete_remote(uidls);
        removed
    }

    fn delete_remote(&self, uidls: &[String]) {
        if uidls.is_empty() {
            return;
        }

        if let Some(ref source) = self.source {
            if let Err(e) = source.lock().unwrap().delete(uidls) {
                warn!(
                    "{} Failed to delete {} messages from the server: {}",
                    self.log_prefix,
                    uidls.len(),
                    e
                );
            }
        }
    }

    /// Move `uidl` from this folder to `dest`.
    ///
    /// Both folders must be fully loaded. A message leaving the folder of the
    /// live source is first fetched in full and then deleted from the server.
    pub fn move_to(&self, uidl: &str, dest: &MailCache) -> Result<(), Error> {
        if !self.is_loaded() || !dest.is_loaded() {
            return Err(Error::FolderNotLoaded);
        }

        if self.source.is_some() {
            match self.get(uidl, FetchMode::Full) {
                Some(ref mail) if mail.has_body() => (),
                _ => return Err(Error::NxMessage),
            }
        } else if !self.contains(uidl) {
            return Err(Error::NxMessage);
        }

        self.store.rename(&self.folder, &dest.folder, uidl)?;

        let mail = self.inner.lock().unwrap().mails.remove(uidl);
        if let Some(mut mail) = mail {
            mail.is_new = false;
            mail.mark_for_deletion = false;
            dest.inner
                .lock()
                .unwrap()
                .mails
                .insert(uidl.to_owned(), mail);
        }

        self.delete_remote(&[uidl.to_owned()]);
        info!("{} Moved {} to {}", self.log_prefix, uidl, dest.folder);
        Ok(())
    }

    /// Mark `uidl` as seen.
    pub fn mark_seen(&self, uidl: &str) {
        if let Some(mail) = self.inner.lock().unwrap().mails.get_mut(uidl) {
            mail.is_new = false;
        }
    }

    /// Take the parse error recorded on `uidl`, so it is reported only once.
    pub fn take_error(&self, uidl: &str) -> Option<String> {
        self.inner
            .lock()
            .unwrap()
            .mails
            .get_mut(uidl)
            .and_then(Mail::take_error)
    }

    /// Index a message seen on the live source.
    ///
    /// Returns whether it was not known before.
    fn insert_remote(&self, uidl: &str, size: u64) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.mails.contains_key(uidl) {
            return false;
        }

        let mut mail = Mail::new(uidl);
        mail.size = size;
        mail.is_new = true;
        inner.mails.insert(uidl.to_owned(), mail);
        true
    }

    /// Connect to the live source and fetch whatever it has that this folder
    /// does not.
    ///
    /// Fetching waits until the folder has been loaded from disk, so that
    /// messages already cached are not fetched again. When
    /// `leave_on_server` is false, new messages are fetched in full and
    /// deleted from the server once safely on disk.
    pub fn check_new_mail(&self, leave_on_server: bool) -> FetchOutcome {
        let source = match self.source {
            Some(ref source) => source,
            None => return FetchOutcome::NotFound,
        };

        self.checking.store(true, SeqCst);
        let outcome = self.check_source(source, leave_on_server);
        self.checking.store(false, SeqCst);

        match outcome {
            Ok(0) => FetchOutcome::NotFound,
            Ok(n) => FetchOutcome::Found(n),
            Err(e) => {
                warn!("{} Mail check failed: {}", self.log_prefix, e);
                FetchOutcome::Failed(e.to_string())
            }
        }
    }

    fn check_source(
        &self,
        source: &SharedSource,
        leave_on_server: bool,
    ) -> Result<usize, Error> {
        {
            let mut source = source.lock().unwrap();
            if !source.is_connected() {
                source.connect()?;
            }
        }

        self.loaded.wait();

        let remote = source.lock().unwrap().uidls()?;
        let mode = if leave_on_server {
            FetchMode::Header
        } else {
            FetchMode::Full
        };

        let mut found = 0;
        let mut fetched = Vec::new();
        for (uidl, size) in remote {
            if !self.insert_remote(&uidl, size) {
                continue;
            }

            found += 1;
            match self.get(&uidl, mode) {
                Some(ref mail) if mail.has_body() => fetched.push(uidl),
                _ => (),
            }
        }

        if !leave_on_server {
            self.delete_remote(&fetched);
        }

        info!(
            "{} Mail check found {} new messages",
            self.log_prefix, found
        );
        Ok(found)
    }

    /// Close the connection to the live source, if any.
    pub fn close_source(&self) {
        if let Some(ref source) = self.source {
            source.lock().unwrap().close();
        }
    }
}

/// Check `inbox` for new mail on a background thread and report the outcome
/// to `listener`.
pub fn spawn_check(
    inbox: Arc<MailCache>,
    leave_on_server: bool,
    listener: Arc<dyn NewMailListener>,
) {
    spawn_detached("mail-check", move || {
        let outcome = inbox.check_new_mail(leave_on_server);
        listener.found_new_mail(outcome);
    });
}

#[cfg(test)]
mod test {
    use std::sync::mpsc;

    use tempfile::TempDir;

    use super::super::source::fake::FakeSource;
    use super::*;

    const M1: &str = "Subject: one\r\nFrom: a@b.i2p\r\n\r\nfirst\r\n";
    const M2: &str = "Subject: two\r\nFrom: c@d.i2p\r\n\r\nsecond\r\n";
    const M3: &str = "Subject: three\r\nFrom: e@f.i2p\r\n\r\nthird\r\n";

    struct Setup {
        _root: TempDir,
        store: Arc<PersistentMailCache>,
        fake: FakeSource,
    }

    fn set_up(messages: &[(&str, &str)]) -> Setup {
        crate::init_test_log();

        let root = TempDir::new().unwrap();
        let store = Arc::new(
            PersistentMailCache::new(
                root.path(),
                "127.0.0.1",
                7660,
                "user",
                "password",
                LogPrefix::new("cache".to_owned()),
            )
            .unwrap(),
        );
        Setup {
            _root: root,
            store,
            fake: FakeSource::with_messages(messages),
        }
    }

    impl Setup {
        fn inbox(&self) -> Arc<MailCache> {
            Arc::new(MailCache::new(
                "Inbox",
                Arc::clone(&self.store),
                Some(self.fake.shared()),
                &LogPrefix::new("cache".to_owned()),
            ))
        }

        fn local(&self, folder: &str) -> Arc<MailCache> {
            Arc::new(MailCache::new(
                folder,
                Arc::clone(&self.store),
                None,
                &LogPrefix::new("cache".to_owned()),
            ))
        }
    }

    struct ChannelListener(Mutex<mpsc::Sender<FetchOutcome>>);

    impl NewMailListener for ChannelListener {
        fn found_new_mail(&self, outcome: FetchOutcome) {
            let _ = self.0.lock().unwrap().send(outcome);
        }
    }

    #[test]
    fn load_is_idempotent() {
        let setup = set_up(&[]);
        setup.store.save_full("Trash", "t1", M1.as_bytes()).unwrap();
        setup.store.save_header("Trash", "t2", M2.as_bytes()).unwrap();

        let trash = setup.local("Trash");
        assert_eq!(LoadState::Idle, trash.state());
        assert!(trash.load());
        assert!(!trash.load());
        assert!(trash.wait_loaded(Duration::from_secs(10)));
        assert!(trash.is_loaded());
        assert_ne!(LoadState::Loading, trash.state());
        assert!(!trash.load());

        assert_eq!(2, trash.len());
        assert!(trash.get("t1", FetchMode::CacheOnly).unwrap().has_body());
        assert!(!trash.get("t2", FetchMode::Full).unwrap().has_body());
    }

    #[test]
    fn cache_only_never_contacts_source() {
        let setup = set_up(&[("u1", M1)]);
        let inbox = setup.inbox();
        inbox.load_blocking();

        assert!(inbox.get("u1", FetchMode::CacheOnly).is_none());
        let server = setup.fake.server.lock().unwrap();
        assert_eq!(0, server.header_fetches);
        assert_eq!(0, server.body_fetches);
    }

    #[test]
    fn fetch_modes_populate_store() {
        let setup = set_up(&[("u1", M1)]);
        let inbox = setup.inbox();
        inbox.load_blocking();

        let mail = inbox.get("u1", FetchMode::Header).unwrap();
        assert_eq!("one", mail.subject);
        assert!(!mail.has_body());
        assert_eq!(
            Some(EntryKind::Header),
            setup.store.stored_kind("Inbox", "u1").unwrap()
        );

        // Already known; no second fetch
        inbox.get("u1", FetchMode::Header).unwrap();
        assert_eq!(1, setup.fake.server.lock().unwrap().header_fetches);

        let mail = inbox.get("u1", FetchMode::Full).unwrap();
        assert!(mail.has_body());
        assert_eq!(
            Some(EntryKind::Full),
            setup.store.stored_kind("Inbox", "u1").unwrap()
        );

        inbox.get("u1", FetchMode::Full).unwrap();
        assert_eq!(1, setup.fake.server.lock().unwrap().body_fetches);
    }

    #[test]
    fn failed_write_leaves_nothing() {
        let setup = set_up(&[]);
        let inbox = setup.inbox();
        inbox.load_blocking();

        let mut buffer = inbox.open_write_buffer("u1", EntryKind::Full);
        buffer.write_all(b"Subject: partial\r\n").unwrap();
        assert_eq!("u1", buffer.uidl());
        assert!(inbox.commit(buffer, false).unwrap().is_none());

        assert!(!inbox.contains("u1"));
        assert_eq!(None, setup.store.stored_kind("Inbox", "u1").unwrap());

        let mut buffer = inbox.open_write_buffer("u1", EntryKind::Full);
        buffer.write_all(M1.as_bytes()).unwrap();
        let mail = inbox.commit(buffer, true).unwrap().unwrap();
        assert_eq!("one", mail.subject);
        assert_eq!(
            Some(EntryKind::Full),
            setup.store.stored_kind("Inbox", "u1").unwrap()
        );
    }

    #[test]
    fn get_reads_store_before_load() {
        let setup = set_up(&[]);
        setup.store.save_full("Sent", "s1", M1.as_bytes()).unwrap();

        let sent = setup.local("Sent");
        let mail = sent.get("s1", FetchMode::CacheOnly).unwrap();
        assert_eq!("one", mail.subject);
        assert!(sent.contains("s1"));

        sent.load_blocking();
        assert_eq!(1, sent.len());
    }

    #[test]
    fn move_requires_both_folders_loaded() {
        let setup = set_up(&[("u1", M1)]);
        let inbox = setup.inbox();
        let trash = setup.local("Trash");

        inbox.load_blocking();
        inbox.get("u1", FetchMode::Header).unwrap();
        assert_matches!(Err(Error::FolderNotLoaded), inbox.move_to("u1", &trash));

        trash.load_blocking();
        inbox.move_to("u1", &trash).unwrap();

        assert!(!inbox.contains("u1"));
        assert!(trash.get("u1", FetchMode::CacheOnly).unwrap().has_body());
        assert_eq!(None, setup.store.stored_kind("Inbox", "u1").unwrap());
        assert_eq!(
            Some(EntryKind::Full),
            setup.store.stored_kind("Trash", "u1").unwrap()
        );
        assert_eq!(
            vec!["u1".to_owned()],
            setup.fake.server.lock().unwrap().deleted
        );

        assert_matches!(Err(Error::NxMessage), trash.move_to("nx", &inbox));
    }

    #[test]
    fn delete_removes_everywhere() {
        let setup = set_up(&[("u1", M1), ("u2", M2)]);
        let inbox = setup.inbox();
        inbox.load_blocking();
        inbox.get("u1", FetchMode::Full).unwrap();

        assert_eq!(1, inbox.delete(&["u1".to_owned(), "u2".to_owned()]));
        assert!(!inbox.contains("u1"));
        assert_eq!(None, setup.store.stored_kind("Inbox", "u1").unwrap());
        assert!(setup.fake.server.lock().unwrap().messages.is_empty());
    }

    #[test]
    fn put_replaces_local_message() {
        let setup = set_up(&[]);
        let drafts = setup.local("Drafts");
        drafts.load_blocking();

        drafts.put("d1", M1.as_bytes().to_vec()).unwrap();
        drafts.put("d1", M2.as_bytes().to_vec()).unwrap();
        assert_eq!(1, drafts.len());
        assert_eq!("two", drafts.get("d1", FetchMode::CacheOnly).unwrap().subject);
        assert_eq!(
            "two",
            setup.store.read("Drafts", "d1").unwrap().unwrap().subject
        );
    }

    #[test]
    fn check_waits_for_loader_and_skips_cached() {
        let setup = set_up(&[("u1", M1), ("u2", M2), ("u3", M3)]);
        setup.store.save_full("Inbox", "u1", M1.as_bytes()).unwrap();

        let inbox = setup.inbox();
        let (send, recv) = mpsc::channel();
        spawn_check(
            Arc::clone(&inbox),
            true,
            Arc::new(ChannelListener(Mutex::new(send))),
        );

        // The check cannot finish until the loader has run
        assert!(recv.recv_timeout(Duration::from_millis(200)).is_err());
        assert!(inbox.load());

        assert_eq!(
            FetchOutcome::Found(2),
            recv.recv_timeout(Duration::from_secs(10)).unwrap()
        );
        assert_eq!(3, inbox.len());
        assert!(inbox.get("u2", FetchMode::CacheOnly).unwrap().is_new);
        assert!(!inbox.get("u1", FetchMode::CacheOnly).unwrap().is_new);
        assert_eq!(2, setup.fake.server.lock().unwrap().header_fetches);
        assert!(!inbox.is_checking());

        assert_eq!(FetchOutcome::NotFound, inbox.check_new_mail(true));
    }

    #[test]
    fn check_without_leave_on_server_moves_mail_here() {
        let setup = set_up(&[("u1", M1)]);
        let inbox = setup.inbox();
        inbox.load_blocking();

        assert_eq!(FetchOutcome::Found(1), inbox.check_new_mail(false));
        assert!(setup.fake.server.lock().unwrap().messages.is_empty());
        assert_eq!(
            Some(EntryKind::Full),
            setup.store.stored_kind("Inbox", "u1").unwrap()
        );
    }

    #[test]
    fn failed_login_is_reported() {
        let setup = set_up(&[("u1", M1)]);
        setup.fake.server.lock().unwrap().refuse_login = true;
        let inbox = setup.inbox();
        inbox.load_blocking();

        assert_matches!(FetchOutcome::Failed(_), inbox.check_new_mail(true));
        assert!(inbox.is_empty());
    }

    #[test]
    fn parse_errors_are_taken_once() {
        let setup = set_up(&[]);
        let drafts = setup.local("Drafts");
        drafts.load_blocking();
        drafts
            .put(
                "d1",
                b"Content-Type: multipart/mixed; boundary=nowhere\r\n\r\nplain\r\n"
                    .to_vec(),
            )
            .unwrap();

        assert!(drafts.take_error("d1").is_some());
        assert!(drafts.take_error("d1").is_none());
    }
}
