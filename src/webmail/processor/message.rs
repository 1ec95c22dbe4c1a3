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

use log::{info, warn};

use super::defs::*;
use super::listing::{sorted_uidls, Location};
use crate::cache::source::FetchMode;
use crate::webmail::action::Action;
use crate::webmail::folder::neighbours;
use crate::webmail::render::render;
use crate::webmail::request::{encode_uidl, Query, Request};
use crate::webmail::session::{Session, DRAFTS, TRASH};
use crate::webmail::state::State;
use crate::webmail::view::*;

impl Webmail {
    pub(super) fn show_message(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Response {
        let location = Location::from_request(request);
        let uidl = match request.uidl(SHOW) {
            Some(uidl) => uidl,
            None => return self.message_not_found(session, request),
        };

        // Drafts open in the composer
        if DRAFTS == location.folder {
            return Response::redirect(
                Query::new().with(COMPOSE, encode_uidl(&uidl)),
            );
        }

        let cache = folder!(session, location.folder);
        let mail = match cache.get(&uidl, FetchMode::Full) {
            Some(mail) if mail.has_header() => mail,
            _ => return self.message_not_found(session, request),
        };
        cache.mark_seen(&uidl);
        if let Some(problem) = cache.take_error(&uidl) {
            session.error(problem);
        }

        let order = sorted_uidls(&cache, location.sort);
        let (prev, next) = neighbours(&order, &uidl);
        let view = MessageView {
            folder: location.folder.to_owned(),
            b64uidl: encode_uidl(&uidl),
            uidl,
            sender: mail.sender.clone(),
            to: mail.to.clone(),
            cc: mail.cc.clone(),
            subject: mail.subject.clone(),
            date: mail.formatted_date.clone(),
            prev: prev.map(encode_uidl),
            next: next.map(encode_uidl),
            ask_delete: request.has(ASK_DELETE) && TRASH != location.folder,
            spam: mail.is_spam,
            segments: mail.part().map(|p| render(p)).unwrap_or_default(),
            complete: mail.has_body(),
        };
        self.page(
            session,
            State::Show,
            mail.short_subject.clone(),
            PageBody::Show(view),
        )
    }

    fn message_not_found(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Response {
        session.error("Message not found.");
        self.show_list(session, request, |_| false, false)
    }

    /// Leave the message view, for a neighbour or for the listing.
    pub(super) fn message_navigate(
        &self,
        session: &mut Session,
        action: Action,
        request: &Request,
    ) -> Response {
        let location = Location::from_request(request);
        let uidl = match request.uidl(B64UIDL) {
            Some(uidl) if Action::List != action => uidl,
            _ => return Response::redirect(location.query()),
        };

        let cache = folder!(session, location.folder);
        let order = sorted_uidls(&cache, location.sort);
        let (prev, next) = neighbours(&order, &uidl);
        let target = if Action::Prev == action { prev } else { next };
        Response::redirect(location.show(target.unwrap_or(uidl.as_str())))
    }

    /// Delete the message being shown.
    ///
    /// Outside the trash this first asks for confirmation and then moves the
    /// message to the trash; in the trash it is deleted for good at once.
    pub(super) fn message_delete(
        &self,
        session: &mut Session,
        action: Action,
        request: &Request,
    ) -> Response {
        let location = Location::from_request(request);
        let uidl = match request.uidl(B64UIDL) {
            Some(uidl) => uidl,
            None => return Response::redirect(location.query()),
        };
        let cache = folder!(session, location.folder);

        if TRASH == location.folder {
            if cache.delete(&[uidl.clone()]) > 0 {
                info!("{} Deleted {}", session.log_prefix, uidl);
                session.info("Message deleted.");
            }
            return Response::redirect(location.query());
        }

        if Action::Delete == action {
            return Response::redirect(
                location.show(&uidl).with(ASK_DELETE, 1),
            );
        }

        let order = sorted_uidls(&cache, location.sort);
        let next = neighbours(&order, &uidl).1.map(str::to_owned);
        let trash = folder!(session, TRASH);
        if self.move_to_trash(session, &cache, &trash, &[uidl]) > 0 {
            session.info("Message moved to the trash.");
        }

        match next {
            Some(next) => Response::redirect(location.show(&next)),
            None => Response::redirect(location.query()),
        }
    }

    /// Serve one part of a message, or with `saveas` the whole raw message.
    pub(super) fn download(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Response {
        let location = Location::from_request(request);
        let uidl = match request.uidl(B64UIDL) {
            Some(uidl) => uidl,
            None => return Response::NotFound("No message given".to_owned()),
        };

        let cache = folder!(session, location.folder);
        let mail = match cache.get(&uidl, FetchMode::Full) {
            Some(mail) if mail.has_body() => mail,
            _ => return Response::NotFound("Message not found".to_owned()),
        };

        if request.has(SAVE_AS) {
            return Response::Download(Download {
                content_type: "message/rfc822".to_owned(),
                file_name: format!("{}.eml", file_name_of(&mail.subject)),
                data: mail.body().map(|b| b.to_vec()).unwrap_or_default(),
            });
        }

        let part = request
            .number(DOWNLOAD)
            .and_then(|id| mail.part().and_then(|root| root.find(id)));
        let part = match part {
            Some(part) if part.is_leaf() => part,
            _ => return Response::NotFound("No such part".to_owned()),
        };

        match part.decode() {
            Ok(data) => Response::Download(Download {
                content_type: part.content_type.mime_type(),
                file_name: part
                    .name
                    .as_deref()
                    .map(file_name_of)
                    .unwrap_or_else(|| format!("part{}", part.id)),
                data,
            }),
            Err(e) => {
                warn!(
                    "{} Cannot decode part {} of {}: {}",
                    session.log_prefix, part.id, uidl, e
                );
                Response::NotFound(format!("Cannot decode part: {}", e))
            }
        }
    }
}

/// Reduce `text` to something usable as a file name.
fn file_name_of(text: &str) -> String {
    let name = text
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '"' | '<' | '>' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect::<String>();
    let name = name.trim().trim_start_matches('.');
    if name.is_empty() {
        "message".to_owned()
    } else {
        name.to_owned()
    }
}

#[cfg(test)]
mod test {
    use super::super::fixture::*;
    use super::*;
    use crate::webmail::action;
    use crate::webmail::render::Segment;

    fn message(page: Page) -> MessageView {
        match page.body {
            PageBody::Show(view) => view,
            body => panic!("Unexpected body {:?}", body),
        }
    }

    #[test]
    fn file_names() {
        assert_eq!("a_b_c", file_name_of("a/b\\c"));
        assert_eq!("message", file_name_of(" .. "));
        assert_eq!("Grüße", file_name_of("Grüße"));
    }

    #[test]
    fn show_renders_body_and_neighbours() {
        let fixture = set_up(&[("m1", M1), ("m2", M2)]);
        fixture.log_in(2);

        let b64 = encode_uidl("m2");
        let view =
            message(fixture.page(Request::get(&[(SHOW, b64.as_str())])));
        assert_eq!("second", view.subject);
        assert_eq!(None, view.prev);
        assert_eq!(Some(encode_uidl("m1")), view.next);
        assert!(view.complete);
        assert!(!view.ask_delete);
        assert_matches!(&Segment::Text(_), &view.segments[0]);
        assert_matches!(&Segment::Attachment(_), &view.segments[1]);

        assert!(!fixture
            .folder("Inbox")
            .get("m2", FetchMode::CacheOnly)
            .unwrap()
            .is_new);

        assert_eq!(
            Response::redirect(format!("?show={}", encode_uidl("m1"))),
            fixture.post(&[(action::NEXT, "Next"), (B64UIDL, b64.as_str())])
        );
        assert_eq!(
            Response::redirect(format!("?show={}", b64)),
            fixture.post(&[(action::PREV, "Prev"), (B64UIDL, b64.as_str())])
        );
        assert_eq!(
            Response::redirect("?"),
            fixture.post(&[(action::LIST, "List"), (B64UIDL, b64.as_str())])
        );
    }

    #[test]
    fn missing_message_falls_back_to_listing() {
        let fixture = set_up(&[("m1", M1)]);
        fixture.log_in(1);

        let nx = encode_uidl("nx");
        let page = fixture.page(Request::get(&[(SHOW, nx.as_str())]));
        assert_eq!(State::List, page.state);
        assert_eq!(vec!["Message not found.".to_owned()], page.errors);
    }

    #[test]
    fn single_delete_asks_first() {
        let fixture = set_up(&[("m1", M1), ("m2", M2)]);
        fixture.log_in(2);
        let b64 = encode_uidl("m2");

        let confirm = format!("?show={}&ask_delete=1", b64);
        assert_eq!(
            Response::redirect(confirm.clone()),
            fixture.post(&[(action::DELETE, "Delete"), (B64UIDL, b64.as_str())])
        );
        assert_eq!(2, fixture.folder_len("Inbox"));
        assert!(message(fixture.page(Request::get(&[
            (SHOW, b64.as_str()),
            (ASK_DELETE, "1"),
        ])))
        .ask_delete);

        assert_eq!(
            Response::redirect(format!("?show={}", encode_uidl("m1"))),
            fixture.post(&[(action::REALLY_DELETE, "Yes"), (B64UIDL, b64.as_str())])
        );
        assert_eq!(1, fixture.folder_len("Inbox"));
        assert!(fixture.folder("Trash").contains("m2"));

        assert_eq!(
            Response::redirect("?folder=Trash"),
            fixture.post(&[
                (action::DELETE, "Delete"),
                (FOLDER, "Trash"),
                (B64UIDL, b64.as_str()),
            ])
        );
        assert!(fixture.folder("Trash").is_empty());
    }

    #[test]
    fn downloads() {
        let fixture = set_up(&[("m1", M1), ("m2", M2)]);
        fixture.log_in(2);
        let b64 = encode_uidl("m2");

        assert_eq!(
            Response::Download(Download {
                content_type: "application/octet-stream".to_owned(),
                file_name: "data.bin".to_owned(),
                data: vec![0, 1, 2],
            }),
            fixture.request(Request::get(&[(DOWNLOAD, "2"), (B64UIDL, b64.as_str())]))
        );

        let response = fixture
            .request(Request::get(&[(SAVE_AS, "1"), (B64UIDL, b64.as_str())]));
        match response {
            Response::Download(download) => {
                assert_eq!("message/rfc822", download.content_type);
                assert_eq!("second.eml", download.file_name);
                assert_eq!(M2.as_bytes(), &download.data[..]);
            }
            response => panic!("Unexpected response {:?}", response),
        }

        assert_matches!(
            Response::NotFound(_),
            fixture.request(Request::get(&[(DOWNLOAD, "9"), (B64UIDL, b64.as_str())]))
        );
    }
}
