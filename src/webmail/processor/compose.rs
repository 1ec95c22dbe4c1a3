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

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};

use super::defs::*;
use super::listing::Location;
use crate::cache::mail_cache::MailCache;
use crate::cache::source::{FetchMode, SharedSource};
use crate::mail::address;
use crate::mail::attachment::{Attachment, ATTACHMENT_FILE_PREFIX};
use crate::mail::draft::{upload_encoding, Draft, Envelope};
use crate::mail::mail::Mail;
use crate::mime::header::single_line;
use crate::support::{error::Error, log_prefix::LogPrefix, threading};
use crate::webmail::action::Action;
use crate::webmail::render::render_text;
use crate::webmail::request::{encode_uidl, Query, Request};
use crate::webmail::session::{BackgroundStatus, Session, DRAFTS, SENT};
use crate::webmail::state::State;
use crate::webmail::view::*;

impl Webmail {
    /// Start a new message, possibly as a reply to or forward of the message
    /// being shown.
    pub(super) fn start_compose(
        &self,
        session: &mut Session,
        action: Action,
        request: &Request,
    ) -> Response {
        let account = account!(session);
        let own_address = account.sender.clone();
        let mut draft = Draft::default();
        draft.sender = self.config().sender.format(&own_address);

        if Action::New != action {
            let location = Location::from_request(request);
            let cache = folder!(session, location.folder);
            let original = match request
                .uidl(B64UIDL)
                .and_then(|uidl| cache.get(&uidl, FetchMode::Full))
            {
                Some(mail) if mail.has_body() => mail,
                _ => {
                    session.error("Message not found.");
                    return Response::redirect(location.query());
                }
            };

            match action {
                Action::Forward => {
                    forward(&mut draft, &original);
                    self.copy_attachments(session, &mut draft, &original);
                }
                _ => reply(
                    &mut draft,
                    &original,
                    Action::ReplyAll == action,
                    &own_address,
                ),
            }
        }

        self.discard_unsaved_compose(session);
        let target = Query::new().with(COMPOSE, encode_uidl(&draft.uidl));
        session.compose = Some(draft);
        Response::redirect(target)
    }

    /// Show the composer for the draft named by the request.
    pub(super) fn show_compose(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Response {
        let uidl = match request.uidl(COMPOSE) {
            Some(uidl) => uidl,
            None => return Response::redirect(Query::new()),
        };

        if session.compose.as_ref().map_or(true, |d| d.uidl != uidl) {
            match self.load_draft(session, &uidl) {
                Some(draft) => {
                    self.discard_unsaved_compose(session);
                    session.compose = Some(draft);
                }
                None => {
                    session.error("Draft not found.");
                    return Response::redirect(Query::new());
                }
            }
        }

        self.render_compose(session)
    }

    /// Show the composer again after its form was rejected, keeping what
    /// was typed into it.
    pub(super) fn redisplay_compose(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Response {
        let own_address = account!(session).sender.clone();
        let uidl = request.uidl(DRAFT);
        match session.compose {
            Some(ref mut draft) if uidl.as_ref() == Some(&draft.uidl) => {
                self.fill_draft(draft, &own_address, request);
                session.bcc_to_self = request.has(BCC_TO_SELF);
            }
            Some(_) => (),
            None => return self.render_view(session, request),
        }

        self.render_compose(session)
    }

    /// Copy the fields of the compose form into `draft`.
    fn fill_draft(
        &self,
        draft: &mut Draft,
        own_address: &str,
        request: &Request,
    ) {
        let config = self.config();
        if config.sender.fixed || request.text(FROM).trim().is_empty() {
            draft.sender = config.sender.format(own_address);
        } else {
            draft.sender = single_line(request.text(FROM)).trim().to_owned();
        }
        draft.to = address::split_recipient_field(request.text(TO));
        draft.cc = address::split_recipient_field(request.text(CC));
        draft.bcc = address::split_recipient_field(request.text(BCC));
        draft.subject = single_line(request.text(SUBJECT)).trim().to_owned();
        draft.text = request.text(BODY).replace("\r\n", "\n");
    }

    fn render_compose(&self, session: &mut Session) -> Response {
        let config = self.config();
        let view = match session.compose {
            Some(ref draft) => ComposeView {
                draft: encode_uidl(&draft.uidl),
                from: draft.sender.clone(),
                sender_fixed: config.sender.fixed,
                to: draft.to.join(", "),
                cc: draft.cc.join(", "),
                bcc: draft.bcc.join(", "),
                subject: draft.subject.clone(),
                text: draft.text.clone(),
                bcc_to_self: session.bcc_to_self,
                attachments: draft
                    .attachments()
                    .iter()
                    .map(|a| AttachmentItem {
                        id: a.id(),
                        file_name: a.file_name().to_owned(),
                        content_type: a.content_type().to_owned(),
                        size: a.size(),
                    })
                    .collect(),
            },
            None => return Response::redirect(Query::new()),
        };

        self.page(session, State::New, "New message", PageBody::New(view))
    }

    /// Handle a submission of the compose form.
    pub(super) fn compose_action(
        &self,
        session: &mut Session,
        action: Action,
        request: &mut Request,
    ) -> Response {
        let config = self.config();
        let own_address = account!(session).sender.clone();
        let mut draft = match self.take_draft(session, request) {
            Some(draft) => draft,
            None => {
                session.error("This message is no longer available.");
                return Response::redirect(Query::new());
            }
        };

        self.fill_draft(&mut draft, &own_address, request);
        session.bcc_to_self = request.has(BCC_TO_SELF);

        let compose_query =
            Query::new().with(COMPOSE, encode_uidl(&draft.uidl));
        match action {
            Action::Cancel => {
                self.discard(session, draft);
                Response::redirect(Query::new())
            }

            Action::Upload => {
                let limit = config
                    .composer
                    .max_message_size
                    .saturating_sub(draft.content_size());
                self.attach_upload(session, &mut draft, request, limit);
                session.compose = Some(draft);
                Response::redirect(compose_query)
            }

            Action::DeleteAttachment => {
                let ids = request.checked_items();
                if ids.is_empty() {
                    session.error("No attachments marked.");
                }
                for id in ids {
                    draft.remove_attachment(id);
                }
                session.compose = Some(draft);
                Response::redirect(compose_query)
            }

            Action::SaveDraft => {
                let drafts = folder!(session, DRAFTS);
                match drafts.put(&draft.uidl, draft.encode()) {
                    Ok(_) => {
                        info!(
                            "{} Saved draft {}",
                            session.log_prefix, draft.uidl
                        );
                        session.info("Draft saved.");
                        Response::redirect(
                            Location {
                                folder: DRAFTS,
                                page: 1,
                                sort: Default::default(),
                            }
                            .query(),
                        )
                    }
                    Err(e) => {
                        error!(
                            "{} Failed to save draft {}: {}",
                            session.log_prefix, draft.uidl, e
                        );
                        session.error(format!("Cannot save draft: {}", e));
                        session.compose = Some(draft);
                        self.render_compose(session)
                    }
                }
            }

            _ => self.send(session, draft),
        }
    }

    /// Validate and store the draft, then send it in the background.
    ///
    /// On any failure the composer is shown again with the problem.
    fn send(&self, session: &mut Session, draft: Draft) -> Response {
        let config = self.config();
        let problems = validate(&draft, config.composer.max_message_size);
        let source = account!(session).source.clone();
        let source = match source {
            Some(source) if problems.is_empty() => source,
            source => {
                for problem in problems {
                    session.error(problem);
                }
                if source.is_none() {
                    session.error("Cannot send mail while offline.");
                }
                session.compose = Some(draft);
                return self.render_compose(session);
            }
        };

        let envelope =
            match draft.envelope(&config.sender.domain, session.bcc_to_self) {
                Ok(envelope) => envelope,
                Err(e) => {
                    session.error(format!("Cannot build message: {}", e));
                    session.compose = Some(draft);
                    return self.render_compose(session);
                }
            };

        let drafts = folder!(session, DRAFTS);
        let sent = folder!(session, SENT);
        if let Err(e) = drafts.put(&draft.uidl, draft.encode()) {
            error!(
                "{} Failed to store draft {} before sending: {}",
                session.log_prefix, draft.uidl, e
            );
            session.error(format!("Cannot save draft: {}", e));
            session.compose = Some(draft);
            return self.render_compose(session);
        }

        info!(
            "{} Sending {} to {} recipients",
            session.log_prefix,
            draft.uidl,
            envelope.recipients.len()
        );
        spawn_send(
            source,
            envelope,
            draft,
            drafts,
            sent,
            Arc::clone(&session.background),
            session.log_prefix.clone(),
        );
        session.info("Sending message.");
        Response::redirect(Query::new())
    }

    /// Take the draft the compose form refers to out of the session, or
    /// failing that from the drafts folder.
    fn take_draft(
        &self,
        session: &mut Session,
        request: &Request,
    ) -> Option<Draft> {
        let uidl = request.uidl(DRAFT)?;
        match session.compose.take() {
            Some(draft) if draft.uidl == uidl => return Some(draft),
            Some(other) => session.compose = Some(other),
            None => (),
        }

        self.load_draft(session, &uidl)
            .or_else(|| Some(Draft::new(uidl)))
    }

    fn load_draft(&self, session: &Session, uidl: &str) -> Option<Draft> {
        let drafts = session.account.as_ref()?.folder(DRAFTS)?;
        let mail = drafts.get(uidl, FetchMode::Full)?;
        let dir = self.config().attachment_dir(&self.root);
        match Draft::from_mail(&mail, &dir) {
            Ok(draft) => Some(draft),
            Err(e) => {
                warn!(
                    "{} Cannot load draft {}: {}",
                    session.log_prefix, uidl, e
                );
                None
            }
        }
    }

    /// Throw away `draft`, its stored copy and its attachments.
    fn discard(&self, session: &mut Session, draft: Draft) {
        draft.delete_attachment_data();
        let drafts = session.account.as_ref().and_then(|a| a.folder(DRAFTS));
        if let Some(drafts) = drafts {
            drafts.delete(&[draft.uidl.clone()]);
        }
        info!("{} Discarded draft {}", session.log_prefix, draft.uidl);
        session.info("Message discarded.");
    }

    /// Drop the message being composed, deleting its attachments unless a
    /// stored draft still refers to them.
    pub(super) fn discard_unsaved_compose(&self, session: &mut Session) {
        let draft = match session.compose.take() {
            Some(draft) => draft,
            None => return,
        };

        let saved = session
            .account
            .as_ref()
            .and_then(|a| a.folder(DRAFTS))
            .map_or(false, |drafts| drafts.contains(&draft.uidl));
        if !saved {
            draft.delete_attachment_data();
        }
    }

    fn attach_upload(
        &self,
        session: &mut Session,
        draft: &mut Draft,
        request: &mut Request,
        limit: u64,
    ) {
        let mut upload = match request.upload.take() {
            Some(upload) if !upload.file_name.trim().is_empty() => upload,
            _ => {
                session.error("No file selected.");
                return;
            }
        };

        let dir = self.config().attachment_dir(&self.root);
        match spool(&dir, &mut upload.data, limit) {
            Ok(path) => {
                let file_name = base_name(&upload.file_name).to_owned();
                let (content_type, encoding) =
                    upload_encoding(&upload.content_type);
                info!(
                    "{} Attached {} as {}",
                    session.log_prefix,
                    file_name,
                    path.display()
                );
                draft.add_attachment(Attachment::new(
                    file_name,
                    content_type,
                    encoding,
                    path,
                ));
            }
            Err(e) => {
                warn!("{} Upload failed: {}", session.log_prefix, e);
                session.error(format!("Error reading uploaded file: {}", e));
            }
        }
    }

    /// Attach copies of the named attachments of `original`.
    fn copy_attachments(
        &self,
        session: &mut Session,
        draft: &mut Draft,
        original: &Mail,
    ) {
        let root = match original.part() {
            Some(root) => root,
            None => return,
        };

        let dir = self.config().attachment_dir(&self.root);
        for part in root.walk() {
            let name = match part.name {
                Some(ref name) if part.is_leaf() && 0 != part.id => name,
                _ => continue,
            };

            let copied = part.decode().and_then(|data| {
                spool(&dir, &mut &data[..], data.len() as u64)
            });
            match copied {
                Ok(path) => {
                    let content_type = match part.charset {
                        Some(ref charset) => format!(
                            "{}; charset=\"{}\"",
                            part.content_type.mime_type(),
                            charset
                        ),
                        None => part.content_type.mime_type(),
                    };
                    let (content_type, encoding) =
                        upload_encoding(&content_type);
                    draft.add_attachment(Attachment::new(
                        name.clone(),
                        content_type,
                        encoding,
                        path,
                    ));
                }
                Err(e) => {
                    warn!(
                        "{} Cannot copy attachment {}: {}",
                        session.log_prefix, name, e
                    );
                    session.error(format!(
                        "Cannot forward attachment {}: {}",
                        name, e
                    ));
                }
            }
        }
    }
}

/// Fill in `draft` as a reply to `original`.
fn reply(draft: &mut Draft, original: &Mail, all: bool, own_address: &str) {
    let recipient = original
        .reply_to
        .clone()
        .unwrap_or_else(|| original.sender.clone());
    let recipient_address = address::get_address(&recipient);

    if all {
        draft.cc = original
            .to
            .iter()
            .chain(&original.cc)
            .filter(|r| {
                let addr = address::get_address(r);
                addr.as_deref() != Some(own_address)
                    && addr != recipient_address
            })
            .cloned()
            .collect();
    }
    if !recipient.trim().is_empty() {
        draft.to = vec![recipient];
    }

    draft.subject = prefixed("Re:", &original.subject);

    let mut text = format!(
        "On {} UTC {} wrote:\n",
        original.formatted_date, original.sender
    );
    let quoted = original.part().map(|p| render_text(p)).unwrap_or_default();
    for line in quoted.lines() {
        text.push_str("> ");
        text.push_str(line);
        text.push('\n');
    }
    draft.text = text;
}

/// Fill in `draft` as a forward of `original`, without its attachments.
fn forward(draft: &mut Draft, original: &Mail) {
    draft.subject = prefixed("Fwd:", &original.subject);

    let mut text = String::from("\n\n---- begin forwarded mail ----\n");
    let _ = writeln!(text, "From: {}", original.sender);
    if !original.to.is_empty() {
        let _ = writeln!(text, "To: {}", original.to.join(", "));
    }
    if !original.cc.is_empty() {
        let _ = writeln!(text, "Cc: {}", original.cc.join(", "));
    }
    let _ = writeln!(text, "Date: {}", original.formatted_date);
    text.push('\n');
    let rendered = original.part().map(|p| render_text(p)).unwrap_or_default();
    text.push_str(&rendered);
    if !text.ends_with('\n') {
        text.push('\n');
    }
    text.push_str("----  end forwarded mail  ----\n");
    draft.text = text;
}

/// `subject` with `prefix`, unless it already has it.
fn prefixed(prefix: &str, subject: &str) -> String {
    let trimmed = subject.trim();
    if trimmed.len() >= prefix.len()
        && trimmed.is_char_boundary(prefix.len())
        && trimmed[..prefix.len()].eq_ignore_ascii_case(prefix)
    {
        trimmed.to_owned()
    } else {
        format!("{} {}", prefix, trimmed)
    }
}

/// Everything that prevents `draft` from being sent.
fn validate(draft: &Draft, max_size: u64) -> Vec<String> {
    let mut problems = Vec::new();
    if !address::validate_address(&draft.sender) {
        problems.push(format!("Invalid sender address: {}", draft.sender));
    }
    if draft.to.is_empty() {
        problems.push("No recipients given.".to_owned());
    }
    for recipient in draft.to.iter().chain(&draft.cc).chain(&draft.bcc) {
        if !address::validate_address(recipient) {
            problems.push(format!("Invalid address: {}", recipient));
        }
    }
    if draft.content_size() > max_size {
        problems.push(format!(
            "Message exceeds the maximum size of {} bytes.",
            max_size
        ));
    }
    problems
}

/// The last component of a file name as sent by a browser.
fn base_name(file_name: &str) -> &str {
    let file_name = file_name.trim();
    file_name
        .rsplit(|c| '/' == c || '\\' == c)
        .next()
        .unwrap_or(file_name)
}

/// Copy `data` into a new file in `dir`.
///
/// Fails without leaving anything behind if `data` is longer than `limit`.
fn spool(
    dir: &Path,
    data: &mut dyn Read,
    limit: u64,
) -> Result<PathBuf, Error> {
    fs::create_dir_all(dir)?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".upload-")
        .tempfile_in(dir)?;
    let mut data = data.take(limit.saturating_add(1));
    let copied = io::copy(&mut data, tmp.as_file_mut())?;
    if copied > limit {
        return Err(Error::UploadTooLarge);
    }

    let path = dir.join(format!(
        "{}{:016x}",
        ATTACHMENT_FILE_PREFIX,
        rand::random::<u64>()
    ));
    tmp.persist_noclobber(&path).map_err(|e| e.error)?;
    Ok(path)
}

/// Send `envelope` on a background thread, then file the message in the
/// sent folder and drop the draft.
fn spawn_send(
    source: SharedSource,
    envelope: Envelope,
    draft: Draft,
    drafts: Arc<MailCache>,
    sent: Arc<MailCache>,
    status: Arc<BackgroundStatus>,
    log_prefix: LogPrefix,
) {
    threading::spawn_detached("mail-send", move || {
        let result = {
            let mut source = source.lock().unwrap();
            let connected = if source.is_connected() {
                Ok(())
            } else {
                source.connect()
            };
            connected.and_then(|()| source.send(&envelope))
        };

        match result {
            Ok(()) => {
                info!("{} Sent {}", log_prefix, draft.uidl);
                if let Err(e) = sent.put(&draft.uidl, envelope.message) {
                    error!(
                        "{} Failed to file {} as sent: {}",
                        log_prefix, draft.uidl, e
                    );
                }
                drafts.delete(&[draft.uidl.clone()]);
                draft.delete_attachment_data();
                status.report_send(Ok(draft.subject));
            }
            Err(e) => {
                warn!("{} Failed to send {}: {}", log_prefix, draft.uidl, e);
                status.report_send(Err(e.to_string()));
            }
        }
    });
}
