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

use std::collections::HashSet;
use std::sync::Arc;

use log::{info, warn};

use super::defs::*;
use crate::cache::mail_cache::MailCache;
use crate::cache::source::FetchMode;
use crate::mail::mail::Mail;
use crate::support::system_config::MIN_PAGE_SIZE;
use crate::webmail::action::Action;
use crate::webmail::folder::{Pager, Sort};
use crate::webmail::request::{encode_uidl, Query, Request};
use crate::webmail::session::{Session, FOLDERS, INBOX, TRASH};
use crate::webmail::state::State;
use crate::webmail::view::*;

/// The folder, page and order a request refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) struct Location {
    pub folder: &'static str,
    pub page: usize,
    pub sort: Sort,
}

impl Location {
    pub fn from_request(request: &Request) -> Self {
        let name = request.text(FOLDER);
        Location {
            folder: FOLDERS
                .iter()
                .copied()
                .find(|&f| f == name)
                .unwrap_or(INBOX),
            page: request.number(PAGE).unwrap_or(1).max(1),
            sort: request.param(SORT).and_then(Sort::parse).unwrap_or_default(),
        }
    }

    /// The query of the listing at this location, leaving out defaults.
    pub fn query(&self) -> Query {
        Query::new()
            .with_opt(FOLDER, Some(self.folder).filter(|&f| INBOX != f))
            .with_opt(PAGE, Some(self.page).filter(|&p| p > 1))
            .with_opt(SORT, Some(self.sort).filter(|s| !s.is_default()))
    }

    /// The query showing `uidl` from this location.
    pub fn show(&self, uidl: &str) -> Query {
        self.query().with(SHOW, encode_uidl(uidl))
    }
}

/// The messages of `folder` in the order of `sort`.
pub(super) fn sorted(folder: &MailCache, sort: Sort) -> Vec<Mail> {
    let mut mails = folder.snapshot();
    sort.apply(&mut mails);
    mails
}

pub(super) fn sorted_uidls(folder: &MailCache, sort: Sort) -> Vec<String> {
    sorted(folder, sort).into_iter().map(|m| m.uidl).collect()
}

impl Webmail {
    /// Render the folder listing of `request`.
    ///
    /// `checked` decides which items are shown ticked. With `really_delete`
    /// the page asks to confirm deleting them.
    pub(super) fn show_list(
        &self,
        session: &mut Session,
        request: &Request,
        checked: impl Fn(&str) -> bool,
        really_delete: bool,
    ) -> Response {
        let location = Location::from_request(request);
        let cache = folder!(session, location.folder);
        let mails = sorted(&cache, location.sort);
        let pager = Pager::new(mails.len(), session.page_size, location.page);

        let items = mails[pager.range(mails.len())]
            .iter()
            .map(|mail| {
                let fetched = if mail.has_header() {
                    None
                } else {
                    cache.get(&mail.uidl, FetchMode::Header)
                };
                folder_item(fetched.as_ref().unwrap_or(mail), &checked)
            })
            .collect::<Vec<_>>();

        let account = account!(session);
        let folders = account
            .folders()
            .iter()
            .map(|folder| FolderSummary {
                name: folder.folder().to_owned(),
                messages: folder.len(),
                new_messages: folder
                    .snapshot()
                    .iter()
                    .filter(|m| m.is_new)
                    .count(),
            })
            .collect();

        let view = FolderView {
            folder: location.folder.to_owned(),
            folders,
            sort: location.sort,
            page: pager.page,
            pages: pager.pages,
            page_size: pager.page_size,
            items,
            really_delete,
            offline: account.is_offline(),
            checking: account.inbox().is_checking(),
        };
        let subtitle = format!("{} ({} messages)", location.folder, mails.len());
        self.page(session, State::List, subtitle, PageBody::List(view))
    }

    pub(super) fn paging(
        &self,
        session: &mut Session,
        action: Action,
        request: &Request,
    ) -> Response {
        let mut location = Location::from_request(request);
        let cache = folder!(session, location.folder);

        if Action::SetPageSize == action {
            match request.number(PAGE_SIZE) {
                Some(size) => session.page_size = size.max(MIN_PAGE_SIZE),
                None => session.error("Invalid page size."),
            }
        }

        let pager = Pager::new(cache.len(), session.page_size, location.page);
        location.page = match action {
            Action::FirstPage => 1,
            Action::PrevPage => pager.prev(),
            Action::NextPage => pager.next(),
            Action::LastPage => pager.pages,
            _ => pager.page,
        };
        Response::redirect(location.query())
    }

    /// Render the listing with the selection changed as requested.
    pub(super) fn toggle(
        &self,
        session: &mut Session,
        action: Action,
        request: &Request,
    ) -> Response {
        match action {
            Action::MarkAll => self.show_list(session, request, |_| true, false),
            Action::Clear => self.show_list(session, request, |_| false, false),
            _ => {
                let checked =
                    request.checked_uidls().into_iter().collect::<HashSet<_>>();
                self.show_list(session, request, |u| !checked.contains(u), false)
            }
        }
    }

    /// Delete the checked messages of a listing.
    ///
    /// In the trash they are deleted for good at once. Elsewhere the first
    /// request asks for confirmation, and the confirmed request moves them to
    /// the trash.
    pub(super) fn list_delete(
        &self,
        session: &mut Session,
        action: Action,
        request: &Request,
    ) -> Response {
        let location = Location::from_request(request);
        let uidls = request.checked_uidls();
        if uidls.is_empty() {
            session.error("No messages marked for deletion.");
            return self.show_list(session, request, |_| false, false);
        }

        let cache = folder!(session, location.folder);
        if TRASH == location.folder {
            let deleted = cache.delete(&uidls);
            info!("{} Deleted {} messages", session.log_prefix, deleted);
            session.info(format!("{} message(s) deleted.", deleted));
            return Response::redirect(location.query());
        }

        if Action::Delete == action {
            let checked = uidls.into_iter().collect::<HashSet<_>>();
            return self.show_list(
                session,
                request,
                |u| checked.contains(u),
                true,
            );
        }

        let trash = folder!(session, TRASH);
        let moved = self.move_to_trash(session, &cache, &trash, &uidls);
        session.info(format!("{} message(s) moved to the trash.", moved));
        Response::redirect(location.query())
    }

    /// Move `uidls` from `cache` to `trash`, returning how many were moved.
    pub(super) fn move_to_trash(
        &self,
        session: &mut Session,
        cache: &Arc<MailCache>,
        trash: &Arc<MailCache>,
        uidls: &[String],
    ) -> usize {
        let mut moved = 0;
        for uidl in uidls {
            match cache.move_to(uidl, trash) {
                Ok(()) => moved += 1,
                Err(e) => {
                    warn!(
                        "{} Failed to move {} to the trash: {}",
                        session.log_prefix, uidl, e
                    );
                    session.error(format!("Cannot delete message: {}", e));
                }
            }
        }
        moved
    }
}

fn folder_item(mail: &Mail, checked: impl Fn(&str) -> bool) -> FolderItem {
    FolderItem {
        uidl: mail.uidl.clone(),
        b64uidl: encode_uidl(&mail.uidl),
        sender: mail.short_sender.clone(),
        subject: mail.short_subject.clone(),
        date: mail.formatted_date.clone(),
        size: mail.size,
        is_new: mail.is_new,
        is_spam: mail.is_spam,
        loaded: mail.has_header(),
        checked: checked(&mail.uidl),
    }
}
