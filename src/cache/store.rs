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

//! The on-disk message cache of one account.
//!
//! Layout:
//!
//! ```text
//! <cache_dir>/cache-<b64(sha3(host:port:user:password))>/
//!   tmp/                                staging area for atomic writes
//!   <folder>/s<c>/mail-<b64(uidl)>.hdr.txt.gz    header only
//!   <folder>/s<c>/mail-<b64(uidl)>.full.txt.gz   complete message
//! ```
//!
//! `<c>` is the first character of the url-safe base64 SHA-3 of the uidl,
//! giving at most 64 shards per folder.
//!
//! A uidl has at most one of the two files at rest. Saving the full message
//! writes the full file first and only then deletes the header file, so a
//! reader racing with the save finds one of them as long as it looks for the
//! full file again after missing the header file.

use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use log::{error, info, warn};
use tiny_keccak::{Hasher, Sha3};

use super::lock::{account_lock, AccountGuard, AccountLock};
use crate::mail::mail::Mail;
use crate::support::error::Error;
use crate::support::file_ops::{self, IgnoreKinds};
use crate::support::log_prefix::LogPrefix;
use crate::support::safe_name::is_safe_name;
use crate::support::threading::WorkerPool;

/// How long a writer waits for the account lock before giving up.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

const ACCOUNT_DIR_PREFIX: &str = "cache-";
const SHARD_PREFIX: &str = "s";
const FILE_PREFIX: &str = "mail-";
const HEADER_SUFFIX: &str = ".hdr.txt.gz";
const FULL_SUFFIX: &str = ".full.txt.gz";
const TMP_DIR: &str = "tmp";
const FILE_MODE: u32 = 0o600;

/// Which representation of a message a file holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum EntryKind {
    Header,
    Full,
}

impl EntryKind {
    fn suffix(self) -> &'static str {
        match self {
            EntryKind::Header => HEADER_SUFFIX,
            EntryKind::Full => FULL_SUFFIX,
        }
    }
}

/// Lookup order for a single uidl. The second look for the full file covers a
/// full save completing between the first two lookups.
const LOOKUP_ORDER: [EntryKind; 3] =
    [EntryKind::Full, EntryKind::Header, EntryKind::Full];

/// One file found while scanning a folder.
#[derive(Clone, Debug)]
struct Entry {
    uidl: String,
    kind: EntryKind,
    path: PathBuf,
}

pub struct PersistentMailCache {
    root: PathBuf,
    tmp: PathBuf,
    lock: Arc<AccountLock>,
    log_prefix: LogPrefix,
}

impl PersistentMailCache {
    /// Open (creating if needed) the cache of the given account under
    /// `cache_dir`.
    pub fn new(
        cache_dir: &Path,
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        log_prefix: LogPrefix,
    ) -> Result<Self, Error> {
        let key = digest(
            format!("{}:{}:{}:{}", host, port, user, password).as_bytes(),
        );
        let root = cache_dir.join(format!("{}{}", ACCOUNT_DIR_PREFIX, key));
        let tmp = root.join(TMP_DIR);
        fs::create_dir_all(&tmp)?;

        Ok(PersistentMailCache {
            lock: account_lock(&root.to_string_lossy()),
            root,
            tmp,
            log_prefix,
        })
    }

    /// The directory holding this account's folders.
    pub fn account_dir(&self) -> &Path {
        &self.root
    }

    fn write_lock(&self) -> Result<AccountGuard<'_>, Error> {
        self.lock.lock(LOCK_TIMEOUT).map_err(|e| {
            error!(
                "{} Gave up waiting for the account lock after {:?}",
                self.log_prefix, LOCK_TIMEOUT
            );
            e
        })
    }

    fn folder_dir(&self, folder: &str) -> Result<PathBuf, Error> {
        if !is_safe_name(folder) || TMP_DIR == folder {
            return Err(Error::UnsafeName);
        }
        Ok(self.root.join(folder))
    }

    fn path_for(
        &self,
        folder: &str,
        uidl: &str,
        kind: EntryKind,
    ) -> Result<PathBuf, Error> {
        Ok(self.folder_dir(folder)?.join(shard_of(uidl)).join(format!(
            "{}{}{}",
            FILE_PREFIX,
            base64::encode_config(uidl, base64::URL_SAFE_NO_PAD),
            kind.suffix()
        )))
    }

    /// Which representation of `uidl` is currently stored, if any.
    pub fn stored_kind(
        &self,
        folder: &str,
        uidl: &str,
    ) -> Result<Option<EntryKind>, Error> {
        for &kind in &LOOKUP_ORDER {
            if self.path_for(folder, uidl, kind)?.is_file() {
                return Ok(Some(kind));
            }
        }
        Ok(None)
    }

    /// Store the header block of `uidl`.
    ///
    /// Does nothing if either representation is already stored.
    pub fn save_header(
        &self,
        folder: &str,
        uidl: &str,
        data: &[u8],
    ) -> Result<(), Error> {
        let full = self.path_for(folder, uidl, EntryKind::Full)?;
        let header = self.path_for(folder, uidl, EntryKind::Header)?;

        let _guard = self.write_lock()?;
        if full.is_file() {
            return Ok(());
        }
        self.write_gz(&header, data)
    }

    /// Store the complete message `uidl`, replacing any header-only entry.
    ///
    /// Saving a message which is already stored in full is a successful
    /// no-op; the existing file is not touched.
    pub fn save_full(
        &self,
        folder: &str,
        uidl: &str,
        data: &[u8],
    ) -> Result<(), Error> {
        let full = self.path_for(folder, uidl, EntryKind::Full)?;
        let header = self.path_for(folder, uidl, EntryKind::Header)?;

        let _guard = self.write_lock()?;
        self.write_gz(&full, data)?;
        fs::remove_file(&header).ignore_not_found()?;
        Ok(())
    }

    /// Store the complete message `uidl`, overwriting any stored copy.
    ///
    /// This is for locally owned messages such as drafts, whose content
    /// changes under a fixed uidl.
    pub fn replace_full(
        &self,
        folder: &str,
        uidl: &str,
        data: &[u8],
    ) -> Result<(), Error> {
        let full = self.path_for(folder, uidl, EntryKind::Full)?;
        let header = self.path_for(folder, uidl, EntryKind::Header)?;

        let _guard = self.write_lock()?;
        self.write_gz_with(&full, data, true)?;
        fs::remove_file(&header).ignore_not_found()?;
        Ok(())
    }

    fn write_gz(&self, path: &Path, data: &[u8]) -> Result<(), Error> {
        self.write_gz_with(path, data, false)
    }

    fn write_gz_with(
        &self,
        path: &Path,
        data: &[u8],
        overwrite: bool,
    ) -> Result<(), Error> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        file_ops::spit_with(&self.tmp, path, overwrite, FILE_MODE, |f| {
            let mut encoder = GzEncoder::new(f, Compression::default());
            encoder.write_all(data)?;
            encoder.finish()?;
            Ok(())
        })
        .ignore_already_exists()?;
        Ok(())
    }

    /// Remove every representation of `uidl`.
    pub fn delete(&self, folder: &str, uidl: &str) -> Result<(), Error> {
        let full = self.path_for(folder, uidl, EntryKind::Full)?;
        let header = self.path_for(folder, uidl, EntryKind::Header)?;

        let _guard = self.write_lock()?;
        fs::remove_file(&full).ignore_not_found()?;
        fs::remove_file(&header).ignore_not_found()?;
        Ok(())
    }

    /// Move `uidl` from folder `from` to folder `to`.
    ///
    /// If the destination already has the message in full, the source copy is
    /// simply removed.
    pub fn rename(&self, from: &str, to: &str, uidl: &str) -> Result<(), Error> {
        let _guard = self.write_lock()?;

        for &kind in &[EntryKind::Full, EntryKind::Header] {
            let src = self.path_for(from, uidl, kind)?;
            if !src.is_file() {
                continue;
            }

            let dst = self.path_for(to, uidl, kind)?;
            let dst_full = self.path_for(to, uidl, EntryKind::Full)?;
            if EntryKind::Header == kind && dst_full.is_file() {
                fs::remove_file(&src).ignore_not_found()?;
                continue;
            }

            if let Some(parent) = dst.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(&src, &dst)?;

            if EntryKind::Full == kind {
                let dst_header = self.path_for(to, uidl, EntryKind::Header)?;
                fs::remove_file(&dst_header).ignore_not_found()?;
            }
        }

        Ok(())
    }

    /// Read `uidl`, preferring the full representation.
    pub fn read(&self, folder: &str, uidl: &str) -> Result<Option<Mail>, Error> {
        for &kind in &LOOKUP_ORDER {
            let path = self.path_for(folder, uidl, kind)?;
            match read_entry(&path, uidl, kind) {
                Ok(mail) => return Ok(Some(mail)),
                Err(e) if io::ErrorKind::NotFound == e.kind() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    /// Load every message of `folder` using a pool sized for the number of
    /// files found.
    pub fn load_folder(&self, folder: &str) -> Result<Vec<Mail>, Error> {
        let entries = self.scan(folder)?;
        let pool = WorkerPool::for_items(entries.len());
        Ok(self.load_entries(entries, pool))
    }

    /// Load every message of `folder` with the given pool.
    pub fn load_folder_with(
        &self,
        folder: &str,
        pool: WorkerPool,
    ) -> Result<Vec<Mail>, Error> {
        let entries = self.scan(folder)?;
        Ok(self.load_entries(entries, pool))
    }

    fn load_entries(&self, entries: Vec<Entry>, pool: WorkerPool) -> Vec<Mail> {
        let count = entries.len();
        let log_prefix = &self.log_prefix;
        let mails = pool
            .run(entries, |entry| {
                match read_scanned(&entry) {
                    Ok(mail) => Some(mail),
                    Err(e) => {
                        warn!(
                            "{} Skipping unreadable cache file {}: {}",
                            log_prefix,
                            entry.path.display(),
                            e
                        );
                        None
                    }
                }
            })
            .into_iter()
            .flatten()
            .collect::<Vec<_>>();

        info!(
            "{} Loaded {} of {} cached messages with {} workers",
            self.log_prefix,
            mails.len(),
            count,
            pool.workers
        );
        mails
    }

    /// Find every stored entry of `folder`, one per uidl.
    fn scan(&self, folder: &str) -> Result<Vec<Entry>, Error> {
        let dir = self.folder_dir(folder)?;
        let mut entries = Vec::<Entry>::new();

        let shards = match fs::read_dir(&dir) {
            Ok(shards) => shards,
            Err(e) if io::ErrorKind::NotFound == e.kind() => {
                return Ok(entries)
            }
            Err(e) => return Err(e.into()),
        };

        for shard in shards {
            let shard = shard?;
            if !shard.file_name().to_string_lossy().starts_with(SHARD_PREFIX)
                || !shard.file_type()?.is_dir()
            {
                continue;
            }

            for file in fs::read_dir(shard.path())? {
                let file = file?;
                let name = file.file_name();
                if let Some((uidl, kind)) = parse_file_name(&name.to_string_lossy())
                {
                    entries.push(Entry {
                        uidl,
                        kind,
                        path: file.path(),
                    });
                }
            }
        }

        // A save interrupted between writing the full file and removing the
        // header file leaves both; the full one wins.
        entries.sort_by(|a, b| a.uidl.cmp(&b.uidl).then(b.kind.cmp(&a.kind)));
        entries.dedup_by(|later, earlier| later.uidl == earlier.uidl);
        Ok(entries)
    }
}

fn read_entry(path: &Path, uidl: &str, kind: EntryKind) -> io::Result<Mail> {
    let mut data = Vec::new();
    GzDecoder::new(fs::File::open(path)?).read_to_end(&mut data)?;

    let mut mail = Mail::new(uidl);
    match kind {
        EntryKind::Header => mail.set_header(data),
        EntryKind::Full => mail.set_body(data),
    }
    Ok(mail)
}

/// Read a file found by `scan`, following a header file which has been
/// replaced by a full file since.
fn read_scanned(entry: &Entry) -> io::Result<Mail> {
    match read_entry(&entry.path, &entry.uidl, entry.kind) {
        Err(e)
            if io::ErrorKind::NotFound == e.kind()
                && EntryKind::Header == entry.kind =>
        {
            let name = entry.path.file_name().map(|n| n.to_string_lossy());
            let full = match name
                .as_ref()
                .and_then(|n| n.strip_suffix(HEADER_SUFFIX))
            {
                Some(stem) => entry.path.with_file_name(format!(
                    "{}{}",
                    stem, FULL_SUFFIX
                )),
                None => return Err(e),
            };
            read_entry(&full, &entry.uidl, EntryKind::Full)
        }
        result => result,
    }
}

fn parse_file_name(name: &str) -> Option<(String, EntryKind)> {
    let (stem, kind) = if let Some(stem) = name.strip_suffix(FULL_SUFFIX) {
        (stem, EntryKind::Full)
    } else if let Some(stem) = name.strip_suffix(HEADER_SUFFIX) {
        (stem, EntryKind::Header)
    } else {
        return None;
    };

    let encoded = stem.strip_prefix(FILE_PREFIX)?;
    let uidl = base64::decode_config(encoded, base64::URL_SAFE_NO_PAD).ok()?;
    String::from_utf8(uidl).ok().map(|uidl| (uidl, kind))
}

/// Url-safe base64 of the SHA-3 digest of `data`.
fn digest(data: &[u8]) -> String {
    let mut hasher = Sha3::v256();
    hasher.update(data);
    let mut hash = [0u8; 32];
    hasher.finalize(&mut hash);
    base64::encode_config(&hash, base64::URL_SAFE_NO_PAD)
}

fn shard_of(uidl: &str) -> String {
    let digest = digest(uidl.as_bytes());
    format!("{}{}", SHARD_PREFIX, &digest[..1])
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use rayon::prelude::*;
    use tempfile::TempDir;

    use super::*;

    struct Setup {
        _root: TempDir,
        store: PersistentMailCache,
    }

    fn set_up() -> Setup {
        crate::init_test_log();

        let root = TempDir::new().unwrap();
        let store = PersistentMailCache::new(
            root.path(),
            "127.0.0.1",
            7660,
            "user",
            "password",
            LogPrefix::new("store".to_owned()),
        )
        .unwrap();
        Setup { _root: root, store }
    }

    fn message(uidl: &str) -> Vec<u8> {
        format!("Subject: {}\r\n\r\nbody of {}\r\n", uidl, uidl).into_bytes()
    }

    fn stored_files(store: &PersistentMailCache, folder: &str) -> Vec<String> {
        let mut names = Vec::new();
        for shard in fs::read_dir(store.account_dir().join(folder)).unwrap() {
            for file in fs::read_dir(shard.unwrap().path()).unwrap() {
                names.push(
                    file.unwrap().file_name().to_string_lossy().into_owned(),
                );
            }
        }
        names.sort();
        names
    }

    #[test]
    fn account_directory_is_keyed_by_credentials() {
        let setup = set_up();
        let parent = setup.store.account_dir().parent().unwrap();

        let same = PersistentMailCache::new(
            parent,
            "127.0.0.1",
            7660,
            "user",
            "password",
            LogPrefix::new("store".to_owned()),
        )
        .unwrap();
        assert_eq!(setup.store.account_dir(), same.account_dir());
        assert!(Arc::ptr_eq(&setup.store.lock, &same.lock));

        let other = PersistentMailCache::new(
            parent,
            "127.0.0.1",
            7660,
            "user",
            "other password",
            LogPrefix::new("store".to_owned()),
        )
        .unwrap();
        assert_ne!(setup.store.account_dir(), other.account_dir());
    }

    #[test]
    fn full_save_replaces_header() {
        let setup = set_up();
        let store = &setup.store;

        store.save_header("Inbox", "u1", b"Subject: u1\r\n\r\n").unwrap();
        assert_eq!(Some(EntryKind::Header), store.stored_kind("Inbox", "u1").unwrap());
        let mail = store.read("Inbox", "u1").unwrap().unwrap();
        assert!(mail.has_header());
        assert!(!mail.has_body());

        store.save_full("Inbox", "u1", &message("u1")).unwrap();
        assert_eq!(Some(EntryKind::Full), store.stored_kind("Inbox", "u1").unwrap());
        assert_eq!(1, stored_files(store, "Inbox").len());

        // A late header save must not resurrect the header file
        store.save_header("Inbox", "u1", b"Subject: u1\r\n\r\n").unwrap();
        assert_eq!(1, stored_files(store, "Inbox").len());

        let mail = store.read("Inbox", "u1").unwrap().unwrap();
        assert!(mail.has_body());
        assert_eq!("u1", mail.subject);
    }

    #[test]
    fn full_save_is_idempotent() {
        let setup = set_up();
        let store = &setup.store;

        store.save_full("Inbox", "u1", &message("u1")).unwrap();
        let before = stored_files(store, "Inbox");
        store.save_full("Inbox", "u1", b"Subject: changed\r\n\r\n").unwrap();
        assert_eq!(before, stored_files(store, "Inbox"));

        let mail = store.read("Inbox", "u1").unwrap().unwrap();
        assert_eq!("u1", mail.subject);
    }

    #[test]
    fn delete_and_rename() {
        let setup = set_up();
        let store = &setup.store;

        store.save_full("Inbox", "u1", &message("u1")).unwrap();
        store.save_header("Inbox", "u2", b"Subject: u2\r\n\r\n").unwrap();

        store.rename("Inbox", "Trash", "u1").unwrap();
        store.rename("Inbox", "Trash", "u2").unwrap();
        assert_eq!(None, store.stored_kind("Inbox", "u1").unwrap());
        assert_eq!(Some(EntryKind::Full), store.stored_kind("Trash", "u1").unwrap());
        assert_eq!(Some(EntryKind::Header), store.stored_kind("Trash", "u2").unwrap());

        store.delete("Trash", "u1").unwrap();
        store.delete("Trash", "u1").unwrap();
        assert!(store.read("Trash", "u1").unwrap().is_none());
        assert_eq!(1, store.load_folder("Trash").unwrap().len());
    }

    #[test]
    fn replace_overwrites_drafts() {
        let setup = set_up();
        let store = &setup.store;

        store.save_full("Drafts", "d1", b"Subject: first\r\n\r\n").unwrap();
        store.replace_full("Drafts", "d1", b"Subject: second\r\n\r\n").unwrap();
        assert_eq!(1, stored_files(store, "Drafts").len());
        let mail = store.read("Drafts", "d1").unwrap().unwrap();
        assert_eq!("second", mail.subject);
    }

    #[test]
    fn unsafe_folder_names_are_rejected() {
        let setup = set_up();
        assert_matches!(
            Err(Error::UnsafeName),
            setup.store.save_full("../escape", "u1", b"x")
        );
        assert_matches!(
            Err(Error::UnsafeName),
            setup.store.load_folder("tmp")
        );
    }

    #[test]
    fn missing_folder_loads_empty() {
        let setup = set_up();
        assert!(setup.store.load_folder("Drafts").unwrap().is_empty());
    }

    #[test]
    fn bulk_load_of_forty_files() {
        let setup = set_up();
        let store = &setup.store;

        for i in 0..40 {
            let uidl = format!("uidl-{}", i);
            if 0 == i % 5 {
                store.save_header("Inbox", &uidl, &message(&uidl)).unwrap();
            } else {
                store.save_full("Inbox", &uidl, &message(&uidl)).unwrap();
            }
        }

        let mails = store
            .load_folder_with("Inbox", WorkerPool { workers: 4 })
            .unwrap();
        assert_eq!(40, mails.len());

        let mut seen = HashSet::new();
        for mail in &mails {
            assert_eq!(mail.uidl, mail.subject);
            assert_eq!(
                mail.has_body(),
                !mail.uidl.ends_with('0') && !mail.uidl.ends_with('5')
            );
            assert!(seen.insert(mail.uidl.clone()));
        }
    }

    #[test]
    fn corrupt_files_are_skipped() {
        let setup = set_up();
        let store = &setup.store;

        store.save_full("Inbox", "good", &message("good")).unwrap();
        let bad = store.path_for("Inbox", "bad", EntryKind::Full).unwrap();
        fs::create_dir_all(bad.parent().unwrap()).unwrap();
        fs::write(&bad, b"this is not gzip").unwrap();

        let mails = store.load_folder("Inbox").unwrap();
        assert_eq!(1, mails.len());
        assert_eq!("good", mails[0].uidl);
        assert!(store.read("Inbox", "bad").is_err());
    }

    #[test]
    fn interrupted_save_prefers_full_file() {
        let setup = set_up();
        let store = &setup.store;

        store.save_full("Inbox", "u1", &message("u1")).unwrap();
        // Simulate a crash between writing the full file and removing the
        // header file.
        let header = store.path_for("Inbox", "u1", EntryKind::Header).unwrap();
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"Subject: stale\r\n\r\n").unwrap();
        fs::write(&header, encoder.finish().unwrap()).unwrap();

        let mails = store.load_folder("Inbox").unwrap();
        assert_eq!(1, mails.len());
        assert!(mails[0].has_body());
    }

    #[test]
    fn concurrent_saves_never_leave_both_files() {
        let setup = set_up();
        let store = &setup.store;

        (0..200).into_par_iter().for_each(|i| {
            let uidl = format!("u{}", i % 10);
            if 0 == i % 3 {
                store.save_header("Inbox", &uidl, &message(&uidl)).unwrap();
            } else {
                store.save_full("Inbox", &uidl, &message(&uidl)).unwrap();
            }
        });

        for i in 0..10 {
            let uidl = format!("u{}", i);
            let full = store.path_for("Inbox", &uidl, EntryKind::Full).unwrap();
            let header =
                store.path_for("Inbox", &uidl, EntryKind::Header).unwrap();
            assert!(full.is_file());
            assert!(!header.is_file());
        }
        assert_eq!(10, stored_files(store, "Inbox").len());
    }

    #[test]
    fn readers_always_find_a_message_being_completed() {
        let setup = set_up();
        let store = &setup.store;

        let uidls = (0..300).map(|i| format!("r{}", i)).collect::<Vec<_>>();
        for uidl in &uidls {
            store.save_header("Inbox", uidl, &message(uidl)).unwrap();
        }

        let done = AtomicBool::new(false);
        let misses = AtomicUsize::new(0);
        crossbeam::scope(|s| {
            for _ in 0..3 {
                s.spawn(|_| {
                    while !done.load(Ordering::SeqCst) {
                        for uidl in &uidls {
                            if store.read("Inbox", uidl).unwrap().is_none()
                                || store
                                    .stored_kind("Inbox", uidl)
                                    .unwrap()
                                    .is_none()
                            {
                                misses.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    }
                });
            }

            for uidl in &uidls {
                store.save_full("Inbox", uidl, &message(uidl)).unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(0, misses.load(Ordering::SeqCst));
        for uidl in &uidls {
            assert_eq!(
                Some(EntryKind::Full),
                store.stored_kind("Inbox", uidl).unwrap()
            );
        }
    }

    #[test]
    fn scanned_header_file_follows_completed_save() {
        let setup = set_up();
        let store = &setup.store;

        store.save_header("Inbox", "u1", &message("u1")).unwrap();
        let entry = store.scan("Inbox").unwrap().pop().unwrap();
        assert_eq!(EntryKind::Header, entry.kind);

        store.save_full("Inbox", "u1", &message("u1")).unwrap();
        let mail = read_scanned(&entry).unwrap();
        assert!(mail.has_body());
    }

    #[test]
    fn file_names_round_trip() {
        let name = format!(
            "{}{}{}",
            FILE_PREFIX,
            base64::encode_config("weird/uidl+=", base64::URL_SAFE_NO_PAD),
            HEADER_SUFFIX
        );
        assert_eq!(
            Some(("weird/uidl+=".to_owned(), EntryKind::Header)),
            parse_file_name(&name)
        );
        assert_eq!(None, parse_file_name("mail-abc.txt"));
        assert!(shard_of("anything").starts_with(SHARD_PREFIX));
        assert_eq!(2, shard_of("anything").len());
    }
}
