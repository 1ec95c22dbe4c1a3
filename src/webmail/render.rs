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

//! Turning a MIME tree into something to show.
//!
//! Rendering decides which parts are displayed: of a `multipart/alternative`
//! only the first `text/plain` child is shown, other multiparts and
//! encapsulated messages show all their children, and leaves are either
//! shown as text or offered as attachments.

use std::fmt::Write as _;

use crate::mime::encoding::decode_charset;
use crate::mime::part::MailPart;

/// Charset assumed for text parts which do not declare one.
pub const DEFAULT_CHARSET: &str = "iso-8859-1";

/// One piece of a rendered message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Body text, with `\n` line endings.
    Text(String),
    /// Something the reader should know about how the message was shown.
    Notice(String),
    /// A part offered for download.
    Attachment(AttachmentLink),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentLink {
    /// Pre-order id of the part.
    pub part_id: usize,
    /// Human-readable description of the part.
    pub label: String,
    pub content_type: String,
    pub size: usize,
}

/// Render a whole message.
pub fn render(root: &MailPart) -> Vec<Segment> {
    let mut out = Vec::new();
    render_into(root, 0, &mut out, true);
    out
}

/// Render a whole message as plain text, for quoting and forwarding.
///
/// Attachments are named but not included; charset warnings are left out.
pub fn render_text(root: &MailPart) -> String {
    let mut segments = Vec::new();
    render_into(root, 0, &mut segments, false);

    let mut text = String::new();
    for segment in segments {
        match segment {
            Segment::Text(t) => text.push_str(&t),
            Segment::Notice(n) => {
                let _ = writeln!(text, "{}", n);
            }
            Segment::Attachment(a) => {
                let _ = writeln!(text, "Attachment ({}).", a.label);
            }
        }
    }
    text
}

fn render_into(
    part: &MailPart,
    level: usize,
    out: &mut Vec<Segment>,
    warn_charset: bool,
) {
    if part.multipart {
        if part.content_type.is("multipart", "alternative") {
            if let Some(plain) = part
                .children
                .iter()
                .find(|c| c.content_type.is("text", "plain"))
            {
                render_into(plain, level + 1, out, warn_charset);
            }
            return;
        }

        for child in &part.children {
            render_into(child, level + 1, out, warn_charset);
        }
        return;
    }

    if part.message {
        for child in &part.children {
            render_into(child, level + 1, out, warn_charset);
        }
        return;
    }

    let not_mime = 0 == level && !part.mime_headers;
    if not_mime || part.content_type.is("text", "plain") {
        render_text_leaf(part, out, warn_charset);
    } else {
        out.push(Segment::Attachment(AttachmentLink {
            part_id: part.id,
            label: label(part),
            content_type: part.content_type.mime_type(),
            size: part.size(),
        }));
    }
}

fn render_text_leaf(part: &MailPart, out: &mut Vec<Segment>, warn_charset: bool) {
    let charset = match part.charset {
        Some(ref charset) => charset.as_str(),
        None => {
            if warn_charset {
                out.push(Segment::Notice(format!(
                    "Warning: no charset found, assuming {}.",
                    DEFAULT_CHARSET
                )));
            }
            DEFAULT_CHARSET
        }
    };

    let decoded = match part.decode() {
        Ok(decoded) => decoded,
        Err(e) => {
            out.push(Segment::Notice(format!(
                "Part ({}) not shown, because of {}",
                label(part),
                e
            )));
            return;
        }
    };

    match decode_charset(charset, &decoded) {
        Some(text) => {
            let mut text = text.replace("\r\n", "\n");
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            out.push(Segment::Text(text));
        }
        None => out.push(Segment::Notice(format!(
            "Charset '{}' not supported.",
            charset
        ))),
    }
}

/// Describe a part by whatever it says about itself.
fn label(part: &MailPart) -> String {
    let mut label = String::new();
    if let Some(ref description) = part.description {
        let _ = write!(label, "{}, ", description);
    }
    if let Some(ref name) = part.name {
        let _ = write!(label, "{}, ", name);
    }
    let _ = write!(label, "({})", part.content_type.mime_type());
    label
}
