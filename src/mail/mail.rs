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

use std::sync::Arc;

use chrono::prelude::*;

use super::address;
use crate::mime::encoded_word::{decode_unstructured, header_text};
use crate::mime::header;
use crate::mime::model::TransferEncoding;
use crate::mime::part::MailPart;

/// Display width of the sender column of folder listings.
pub const SHORT_SENDER_LEN: usize = 30;
/// Display width of the subject column of folder listings.
pub const SHORT_SUBJECT_LEN: usize = 60;

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One message of a folder.
///
/// A `Mail` starts out empty and is populated first with its header block and
/// later with the full message. The display fields are derived whenever the
/// header changes.
#[derive(Clone, Debug, Default)]
pub struct Mail {
    pub uidl: String,
    header: Option<Arc<Vec<u8>>>,
    body: Option<Arc<Vec<u8>>>,
    part: Option<Arc<MailPart>>,
    /// Size of the full message in bytes, if known.
    pub size: u64,
    pub is_new: bool,
    pub is_spam: bool,
    pub mark_for_deletion: bool,
    /// A problem found while parsing this message, shown once.
    pub error: Option<String>,

    /// Decoded `From` header.
    pub sender: String,
    /// Bare address of the sender, if one could be found.
    pub sender_address: Option<String>,
    /// Bare address of `Reply-To`, if present and valid.
    pub reply_to: Option<String>,
    pub subject: String,
    /// `sender` cut down to a listing column.
    pub short_sender: String,
    /// `subject` cut down to a listing column.
    pub short_subject: String,
    pub date: Option<DateTime<Utc>>,
    /// `date` as `YYYY-MM-DD HH:MM` in UTC, or empty.
    pub formatted_date: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
}

impl Mail {
    pub fn new(uidl: impl Into<String>) -> Self {
        Mail {
            uidl: uidl.into(),
            ..Mail::default()
        }
    }

    pub fn has_header(&self) -> bool {
        self.header.is_some()
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// The raw header block, if known.
    pub fn header(&self) -> Option<&[u8]> {
        self.header.as_ref().map(|h| &h[..])
    }

    /// The complete raw message, if known.
    pub fn body(&self) -> Option<&Arc<Vec<u8>>> {
        self.body.as_ref()
    }

    /// The MIME tree of the full message, if known.
    pub fn part(&self) -> Option<&Arc<MailPart>> {
        self.part.as_ref()
    }

    /// Populate from a header-only fetch.
    ///
    /// Anything after the blank line ending the header block is ignored.
    pub fn set_header(&mut self, raw: Vec<u8>) {
        let end = header_end(&raw);
        let mut raw = raw;
        raw.truncate(end);
        self.header = Some(Arc::new(raw));
        self.parse_header();
    }

    /// Populate from the complete message.
    pub fn set_body(&mut self, raw: Vec<u8>) {
        let raw = Arc::new(raw);
        let part = MailPart::parse(Arc::clone(&raw));

        self.size = raw.len() as u64;
        self.header = Some(Arc::new(part.header().to_vec()));
        self.error = structural_problem(&part);
        self.part = Some(Arc::new(part));
        self.body = Some(raw);
        self.parse_header();
    }

    /// Discard the full message, keeping only the header.
    pub fn drop_body(&mut self) {
        self.body = None;
        self.part = None;
    }

    /// Take the recorded parse error, so that it is only reported once.
    pub fn take_error(&mut self) -> Option<String> {
        self.error.take()
    }

    /// Decoded value of the first header named `name`.
    pub fn header_value(&self, name: &str) -> Option<String> {
        self.header()
            .and_then(|h| header::find(h, name))
            .map(|v| decode_unstructured(&v))
    }

    fn parse_header(&mut self) {
        let raw = match self.header {
            Some(ref h) => Arc::clone(h),
            None => return,
        };

        let from = header::find(&raw, "From");
        self.sender = from
            .as_ref()
            .map(|v| decode_unstructured(v))
            .unwrap_or_default();
        self.sender_address = from
            .as_ref()
            .and_then(|v| address::get_address(&header_text(v)));

        self.reply_to = header::find(&raw, "Reply-To")
            .and_then(|v| address::get_address(&header_text(&v)));

        self.subject = header::find(&raw, "Subject")
            .map(|v| decode_unstructured(&v))
            .unwrap_or_default();

        self.date = header::find(&raw, "Date")
            .and_then(|v| header::parse_datetime(&v))
            .map(|d| d.with_timezone(&Utc));
        self.formatted_date = self
            .date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default();

        self.to = recipients(&raw, "To");
        self.cc = recipients(&raw, "Cc");

        self.is_spam = header::find(&raw, "X-Spam-Flag")
            .map_or(false, |v| v.eq_ignore_ascii_case(b"YES"));

        let short_sender = self
            .sender_display_name()
            .unwrap_or_else(|| self.sender.clone());
        self.short_sender = shorten(&short_sender, SHORT_SENDER_LEN);
        self.short_subject = shorten(&self.subject, SHORT_SUBJECT_LEN);
    }

    fn sender_display_name(&self) -> Option<String> {
        let raw = self.header()?;
        let from = header::find(raw, "From")?;
        let list = header::parse_address_list(&from)?;
        let first = list.first()?.mailboxes().into_iter().next()?;
        first.display_name()
    }
}

/// Every recipient of the `name` headers, decoded, one entry per address.
fn recipients(raw: &[u8], name: &str) -> Vec<String> {
    let mut out = Vec::new();
    for value in header::find_all(raw, name) {
        for recipient in address::split_recipients(&decode_unstructured(&value))
        {
            out.push(recipient);
        }
    }
    out
}

/// Shorten `s` to at most `max` characters, marking truncation with an
/// ellipsis.
pub fn shorten(s: &str, max: usize) -> String {
    let s = s.trim();
    if s.chars().count() <= max {
        return s.to_owned();
    }

    let mut out = s.chars().take(max.saturating_sub(3)).collect::<String>();
    out.push_str("...");
    out
}

/// Offset just past the blank line ending the header block, or the whole
/// length if there is none.
pub fn header_end(raw: &[u8]) -> usize {
    if raw.starts_with(b"\r\n") {
        2
    } else if let Some(ix) = memchr::memmem::find(raw, b"\r\n\r\n") {
        ix + 4
    } else if let Some(ix) = memchr::memmem::find(raw, b"\n\n") {
        ix + 2
    } else {
        raw.len()
    }
}

/// Describe structural damage worth telling the user about.
fn structural_problem(part: &MailPart) -> Option<String> {
    for p in part.walk() {
        if let TransferEncoding::Unknown(ref name) = p.encoding {
            if p.is_leaf() {
                return Some(format!(
                    "Part {} uses the unknown encoding '{}'",
                    p.id, name
                ));
            }
        }

        if p.multipart
            && 1 == p.children.len()
            && !p.children[0].mime_headers
            && p.children[0].body_begin == p.body_begin
        {
            return Some(format!(
                "Part {} has no '{}' boundaries",
                p.id,
                p.boundary.as_deref().unwrap_or_default()
            ));
        }
    }

    None
}
