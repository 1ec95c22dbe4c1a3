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

use std::path::PathBuf;

use super::main::CacheListSubcommand;
use crate::cache::store::PersistentMailCache;
use crate::mail::mail::Mail;
use crate::support::{
    error::Error, log_prefix::LogPrefix, sysexits::*,
    system_config::SystemConfig,
};
use crate::webmail::folder::Sort;
use crate::webmail::session::FOLDERS;

pub(super) fn list(
    system_config: SystemConfig,
    root: PathBuf,
    cmd: CacheListSubcommand,
) {
    let folder = match FOLDERS
        .iter()
        .find(|f| f.eq_ignore_ascii_case(&cmd.folder))
    {
        Some(&f) => f,
        None => die!(
            EX_USAGE,
            "{}: No such folder; expected one of {}",
            cmd.folder,
            FOLDERS.join(", ")
        ),
    };
    let sort = match Sort::parse(&cmd.sort) {
        Some(sort) => sort,
        None => die!(EX_USAGE, "{}: Unknown sort order", cmd.sort),
    };

    let host = cmd.host.unwrap_or(system_config.server.host.clone());
    let port = cmd.port.unwrap_or(system_config.server.pop3_port);
    let log_prefix = LogPrefix::new("cache-list".to_owned());
    log_prefix.set_user(cmd.user.clone());

    let store = match PersistentMailCache::new(
        &system_config.cache_dir(&root),
        &host,
        port,
        &cmd.user,
        &cmd.password,
        log_prefix,
    ) {
        Ok(store) => store,
        Err(e) => die!(Sysexit::for_error(&e), "Failed to open cache: {}", e),
    };

    match listing(&store, folder, sort) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
        }
        Err(e) => die!(
            Sysexit::for_error(&e),
            "Failed to load {}: {}",
            folder,
            e
        ),
    }
}

/// One tab-separated line per message of `folder`, in `sort` order.
fn listing(
    store: &PersistentMailCache,
    folder: &str,
    sort: Sort,
) -> Result<Vec<String>, Error> {
    let mut mails = store.load_folder(folder)?;
    sort.apply(&mut mails);
    Ok(mails.iter().map(format_line).collect())
}

fn format_line(mail: &Mail) -> String {
    let date = if mail.formatted_date.is_empty() {
        "-"
    } else {
        &mail.formatted_date
    };
    format!(
        "{}\t{}\t{}\t{}",
        mail.uidl, date, mail.short_sender, mail.short_subject
    )
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn listing_is_sorted_and_tab_separated() {
        crate::init_test_log();

        let root = TempDir::new().unwrap();
        let store = PersistentMailCache::new(
            root.path(),
            "127.0.0.1",
            7660,
            "me",
            "hunter2",
            LogPrefix::new("cache-list".to_owned()),
        )
        .unwrap();
        store
            .save_full(
                "Inbox",
                "old",
                b"From: Alice <alice@mail.i2p>\r\n\
                  Subject: first\r\n\
                  Date: Mon, 1 Jun 2020 10:00:00 +0000\r\n\
                  \r\n\
                  body\r\n",
            )
            .unwrap();
        store
            .save_header(
                "Inbox",
                "new",
                b"From: bob@mail.i2p\r\n\
                  Subject: second\r\n\
                  Date: Tue, 2 Jun 2020 10:00:00 +0000\r\n\
                  \r\n",
            )
            .unwrap();

        let lines = listing(&store, "Inbox", Sort::default()).unwrap();
        assert_eq!(
            vec![
                "new\t2020-06-02 10:00\tbob@mail.i2p\tsecond".to_owned(),
                "old\t2020-06-01 10:00\tAlice\tfirst".to_owned(),
            ],
            lines
        );

        let lines =
            listing(&store, "Inbox", Sort::parse("-date").unwrap()).unwrap();
        assert!(lines[0].starts_with("old\t"));

        assert!(listing(&store, "Trash", Sort::default()).unwrap().is_empty());
    }

    #[test]
    fn undated_message_shows_placeholder() {
        let mut mail = Mail::new("u1");
        mail.set_header(b"Subject: hi\r\n\r\n".to_vec());
        assert_eq!("u1\t-\t\thi", format_line(&mail));
    }
}
