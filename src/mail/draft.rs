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

//! Drafts and the messages synthesised from them.
//!
//! A draft is stored like any other message: a plain text body under a header
//! block. Attachments and Bcc recipients, which have no place in a received
//! message, are carried in extra header lines so that a reloaded draft is
//! identical to the one saved.

use std::fmt::Write as _;
use std::io::Write as _;
use std::path::Path;

use chrono::prelude::*;
use log::warn;

use super::address;
use super::attachment::{Attachment, ATTACHMENT_FILE_PREFIX};
use super::mail::Mail;
use crate::mime::encoded_word::{decode_unstructured, ew_encode};
use crate::mime::header::{self, single_line};
use crate::mime::model::{ContentType, TransferEncoding};
use crate::mime::quoted_printable::qp_encode;
use crate::support::error::Error;

/// Header carrying one attachment of a stored draft.
pub const ATTACHMENT_HEADER: &str = "X-Attachment";

/// Prefix of the uidls given to locally created messages.
pub const DRAFT_UIDL_PREFIX: &str = "draft-";

/// A message ready to hand to the mail source for delivery.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Envelope {
    /// Bare address of the sender.
    pub sender: String,
    /// Bare addresses of every recipient, Bcc included.
    pub recipients: Vec<String>,
    /// The complete RFC 822 message.
    pub message: Vec<u8>,
}

/// A message being composed.
#[derive(Clone, Debug)]
pub struct Draft {
    pub uidl: String,
    pub sender: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub bcc: Vec<String>,
    pub subject: String,
    /// The body text, with `\n` line endings.
    pub text: String,
    pub date: DateTime<Utc>,
    attachments: Vec<Attachment>,
}

impl Default for Draft {
    fn default() -> Self {
        Draft::new(new_uidl())
    }
}

/// A fresh uidl for a locally created message.
pub fn new_uidl() -> String {
    format!("{}{:016x}", DRAFT_UIDL_PREFIX, rand::random::<u64>())
}

impl Draft {
    pub fn new(uidl: impl Into<String>) -> Self {
        Draft {
            uidl: uidl.into(),
            sender: String::new(),
            to: vec![],
            cc: vec![],
            bcc: vec![],
            subject: String::new(),
            text: String::new(),
            date: Utc::now(),
            attachments: vec![],
        }
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn add_attachment(&mut self, attachment: Attachment) {
        self.attachments.push(attachment);
    }

    /// Remove the attachment with the given id, deleting its file.
    ///
    /// Returns whether such an attachment existed.
    pub fn remove_attachment(&mut self, id: &str) -> bool {
        match self.attachments.iter().position(|a| a.id() == id) {
            Some(ix) => {
                self.attachments.remove(ix).delete_data();
                true
            }
            None => false,
        }
    }

    /// Delete every attachment file. Used once the draft is sent or
    /// discarded.
    pub fn delete_attachment_data(&self) {
        for attachment in &self.attachments {
            attachment.delete_data();
        }
    }

    /// Total size of the text and the raw attachment content.
    pub fn content_size(&self) -> u64 {
        self.text.len() as u64
            + self.attachments.iter().map(Attachment::size).sum::<u64>()
    }

    /// Produce the stored form of this draft.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = String::new();
        write_address_header(&mut out, "From", std::slice::from_ref(&self.sender));
        write_address_header(&mut out, "To", &self.to);
        write_address_header(&mut out, "Cc", &self.cc);
        write_address_header(&mut out, "Bcc", &self.bcc);
        let _ = write!(
            out,
            "Subject: {}\r\n",
            ew_encode(&single_line(&self.subject))
        );
        let _ = write!(out, "Date: {}\r\n", self.date.to_rfc2822());
        out.push_str("MIME-Version: 1.0\r\n");
        out.push_str("Content-Type: text/plain; charset=\"utf-8\"\r\n");
        out.push_str("Content-Transfer-Encoding: quoted-printable\r\n");

        for attachment in &self.attachments {
            let _ = write!(
                out,
                "{}: {},{},{},{}\r\n",
                ATTACHMENT_HEADER,
                base64::encode(attachment.file_name()),
                single_line(attachment.content_type()),
                attachment.transfer_encoding(),
                base64::encode(
                    attachment.path().to_string_lossy().as_bytes()
                ),
            );
        }

        out.push_str("\r\n");
        out.push_str(&qp_encode(self.text.as_bytes()));
        out.into_bytes()
    }

    /// Reconstruct a draft from its stored form.
    ///
    /// The mail must have its full body. Attachments whose files are not
    /// directly inside `attachment_dir` are dropped.
    pub fn from_mail(
        mail: &Mail,
        attachment_dir: &Path,
    ) -> Result<Self, Error> {
        let raw = mail.header().ok_or(Error::NxMessage)?;
        let part = mail.part().ok_or(Error::NxMessage)?;

        let body = part.decode()?;
        let text = String::from_utf8_lossy(&body).replace("\r\n", "\n");

        let bcc = header::find_all(raw, "Bcc")
            .iter()
            .flat_map(|v| address::split_recipients(&decode_unstructured(v)))
            .collect();

        let attachments = header::find_all(raw, ATTACHMENT_HEADER)
            .iter()
            .filter_map(|line| {
                let line = String::from_utf8_lossy(line);
                let attachment =
                    parse_attachment_line(&line, attachment_dir);
                if attachment.is_none() {
                    warn!(
                        "{}: ignoring malformed attachment line '{}'",
                        mail.uidl, line
                    );
                }
                attachment
            })
            .collect();

        Ok(Draft {
            uidl: mail.uidl.clone(),
            sender: mail.sender.clone(),
            to: mail.to.clone(),
            cc: mail.cc.clone(),
            bcc,
            subject: mail.subject.clone(),
            text,
            date: mail.date.unwrap_or_else(Utc::now),
            attachments,
        })
    }

    /// Build the message to be sent, as it will appear to recipients.
    ///
    /// Bcc recipients are not named in the message itself.
    pub fn build_message(&self, sender_domain: &str) -> Result<Vec<u8>, Error> {
        let mut out = Vec::<u8>::new();
        let mut head = String::new();
        write_address_header(&mut head, "From", std::slice::from_ref(&self.sender));
        write_address_header(&mut head, "To", &self.to);
        write_address_header(&mut head, "Cc", &self.cc);
        let _ = write!(
            head,
            "Subject: {}\r\n",
            ew_encode(&single_line(&self.subject))
        );
        let _ = write!(head, "Date: {}\r\n", Utc::now().to_rfc2822());
        let _ = write!(
            head,
            "Message-ID: <{:016x}@{}>\r\n",
            rand::random::<u64>(),
            sender_domain
        );
        head.push_str("MIME-Version: 1.0\r\n");
        out.extend_from_slice(head.as_bytes());

        let text_part = format!(
            "Content-Type: text/plain; charset=\"utf-8\"\r\n\
             Content-Transfer-Encoding: quoted-printable\r\n\r\n{}\r\n",
            qp_encode(self.text.as_bytes())
        );

        if self.attachments.is_empty() {
            out.extend_from_slice(text_part.as_bytes());
            return Ok(out);
        }

        let boundary = format!("=_{:032x}", rand::random::<u128>());
        write!(
            out,
            "Content-Type: multipart/mixed; boundary=\"{}\"\r\n\r\n\
             This is a multi-part message in MIME format.\r\n\
             --{}\r\n{}",
            boundary, boundary, text_part
        )?;

        for attachment in &self.attachments {
            let data = attachment.read_data()?;
            let encoding = attachment.transfer_encoding();
            let name = ew_encode(&single_line(attachment.file_name()))
                .replace('"', "'");
            write!(
                out,
                "--{}\r\n\
                 Content-Type: {}; name=\"{}\"\r\n\
                 Content-Transfer-Encoding: {}\r\n\
                 Content-Disposition: attachment; filename=\"{}\"\r\n\r\n",
                boundary,
                single_line(attachment.content_type()),
                name,
                encoding,
                name
            )?;
            out.extend_from_slice(&encoding.encode(&data)?);
            // This line break belongs to the following delimiter
            out.extend_from_slice(b"\r\n");
        }

        write!(out, "--{}--\r\n", boundary)?;
        Ok(out)
    }

    /// Build the envelope for sending this draft.
    ///
    /// If `bcc_to_self` is set the sender receives a copy.
    pub fn envelope(
        &self,
        sender_domain: &str,
        bcc_to_self: bool,
    ) -> Result<Envelope, Error> {
        let sender = address::get_address(&self.sender)
            .ok_or_else(|| Error::BadAddress(self.sender.clone()))?;

        let mut recipients = Vec::new();
        for r in self.to.iter().chain(&self.cc).chain(&self.bcc) {
            let addr = address::get_address(r)
                .ok_or_else(|| Error::BadAddress(r.clone()))?;
            if !recipients.contains(&addr) {
                recipients.push(addr);
            }
        }
        if bcc_to_self && !recipients.contains(&sender) {
            recipients.push(sender.clone());
        }

        Ok(Envelope {
            sender,
            recipients,
            message: self.build_message(sender_domain)?,
        })
    }
}

/// Choose the transfer encoding for an uploaded file.
///
/// Text is sent as quoted-printable with an explicit charset, anything else
/// as base64.
pub fn upload_encoding(content_type: &str) -> (String, TransferEncoding) {
    let parsed = header::parse_content_type(content_type.as_bytes())
        .unwrap_or_else(|| ContentType::new("application", "octet-stream"));

    if "text" == parsed.typ {
        let content_type = if parsed.parameter("charset").is_some() {
            parsed
        } else {
            parsed.with_parameter("charset", "utf-8")
        };
        (content_type.to_string(), TransferEncoding::QuotedPrintable)
    } else {
        (parsed.to_string(), TransferEncoding::Base64)
    }
}

fn write_address_header(out: &mut String, name: &str, addresses: &[String]) {
    let addresses = addresses
        .iter()
        .map(|a| single_line(a))
        .filter(|a| !a.trim().is_empty())
        .map(|a| encode_address(a.trim()))
        .collect::<Vec<_>>();
    if !addresses.is_empty() {
        let _ = write!(out, "{}: {}\r\n", name, addresses.join(", "));
    }
}

/// Encode the display name of `address` if it is not ASCII, leaving the
/// angle-bracketed address itself readable.
fn encode_address(address: &str) -> String {
    if address.is_ascii() {
        return address.to_owned();
    }

    match address.rfind('<') {
        Some(ix) => {
            let name = address[..ix].trim().trim_matches('"');
            format!("{} {}", ew_encode(name), &address[ix..])
        }
        None => ew_encode(address).into_owned(),
    }
}

fn parse_attachment_line(line: &str, dir: &Path) -> Option<Attachment> {
    let comma = line.find(',')?;
    let file_name = String::from_utf8(base64::decode(line[..comma].trim()).ok()?)
        .ok()?;

    let mut rest = line[comma + 1..].rsplitn(3, ',');
    let path = String::from_utf8(base64::decode(rest.next()?.trim()).ok()?)
        .ok()?;
    if !is_spooled_file(Path::new(&path), dir) {
        return None;
    }
    let encoding = TransferEncoding::parse(rest.next()?);
    let content_type = rest.next()?.trim();

    Some(Attachment::new(file_name, content_type, encoding, path))
}

/// Whether `path` names an attachment file created in `dir`.
fn is_spooled_file(path: &Path, dir: &Path) -> bool {
    Some(dir) == path.parent()
        && path
            .file_name()
            .map_or(false, |n| {
                n.to_string_lossy().starts_with(ATTACHMENT_FILE_PREFIX)
            })
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::mime::part::MailPart;

    fn stored(draft: &Draft) -> Mail {
        let mut mail = Mail::new(draft.uidl.clone());
        mail.set_body(draft.encode());
        mail
    }

    fn sample_draft(dir: &TempDir) -> Draft {
        let path1 = dir.path().join("att-1");
        fs::write(&path1, b"first line\nsecond line\n").unwrap();

        let mut draft = Draft::new("draft-test");
        draft.sender = "Me <me@mail.i2p>".to_owned();
        draft.to = vec!["Jörg <joerg@mail.i2p>".to_owned()];
        draft.cc = vec!["carol@mail.i2p".to_owned()];
        draft.bcc = vec!["secret@mail.i2p".to_owned()];
        draft.subject = "Grüße".to_owned();
        draft.text = "Hello,\n\nthis is = a test.\n".to_owned();
        draft.add_attachment(Attachment::new(
            "a.txt",
            "text/plain",
            TransferEncoding::QuotedPrintable,
            path1,
        ));
        draft
    }

    #[test]
    fn encode_then_reparse_is_identical() {
        let dir = TempDir::new().unwrap();
        let draft = sample_draft(&dir);

        let reparsed =
            Draft::from_mail(&stored(&draft), dir.path()).unwrap();
        assert_eq!(draft.uidl, reparsed.uidl);
        assert_eq!(draft.sender, reparsed.sender);
        assert_eq!(draft.to, reparsed.to);
        assert_eq!(draft.cc, reparsed.cc);
        assert_eq!(draft.bcc, reparsed.bcc);
        assert_eq!(draft.subject, reparsed.subject);
        assert_eq!(draft.text, reparsed.text);

        let tuples = |d: &Draft| {
            d.attachments()
                .iter()
                .map(|a| {
                    (
                        a.file_name().to_owned(),
                        a.content_type().to_owned(),
                        a.transfer_encoding().to_string(),
                        a.path().to_owned(),
                    )
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(tuples(&draft), tuples(&reparsed));
        assert_eq!("a.txt", reparsed.attachments()[0].file_name());
        assert_eq!(
            "quoted-printable",
            reparsed.attachments()[0].transfer_encoding().as_str()
        );
    }

    #[test]
    fn content_type_with_commas_survives() {
        let line = format!(
            "{},text/plain; name=\"a,b\",base64,{}",
            base64::encode("a,b"),
            base64::encode("/tmp/att-x")
        );
        let attachment =
            parse_attachment_line(&line, Path::new("/tmp")).unwrap();
        assert_eq!("a,b", attachment.file_name());
        assert_eq!("text/plain; name=\"a,b\"", attachment.content_type());
        assert_eq!(&TransferEncoding::Base64, attachment.transfer_encoding());
        assert_eq!(Path::new("/tmp/att-x"), attachment.path());

        assert!(parse_attachment_line("garbage", Path::new("/tmp")).is_none());
    }

    #[test]
    fn attachment_paths_outside_dir_are_dropped() {
        let line = |path: &str| {
            format!(
                "{},text/plain,base64,{}",
                base64::encode("loot.txt"),
                base64::encode(path)
            )
        };
        let dir = Path::new("/srv/relaymail/attachments");

        assert!(
            parse_attachment_line(&line("/srv/relaymail/attachments/att-1"), dir)
                .is_some()
        );
        assert!(parse_attachment_line(&line("/etc/passwd"), dir).is_none());
        assert!(parse_attachment_line(
            &line("/srv/relaymail/attachments/../relaymail.toml"),
            dir
        )
        .is_none());
        assert!(parse_attachment_line(
            &line("/srv/relaymail/attachments/sub/att-1"),
            dir
        )
        .is_none());
        assert!(parse_attachment_line(
            &line("/srv/relaymail/attachments/relaymail.toml"),
            dir
        )
        .is_none());
    }

    #[test]
    fn line_breaks_cannot_forge_header_lines() {
        let dir = TempDir::new().unwrap();
        let victim = dir.path().join("att-victim");
        fs::write(&victim, b"secret").unwrap();
        let forged = format!(
            "{}: {},text/plain,base64,{}",
            ATTACHMENT_HEADER,
            base64::encode("loot.txt"),
            base64::encode(victim.to_string_lossy().as_bytes())
        );

        let mut draft = Draft::new("draft-forged");
        draft.sender = "me@mail.i2p\r\nBcc: spy@mail.i2p".to_owned();
        draft.subject = format!("hi\r\n{}", forged);
        draft.to = vec![format!("bob@mail.i2p\r\n{}", forged)];
        draft.cc = vec![format!("carol@mail.i2p\n{}", forged)];

        let reparsed =
            Draft::from_mail(&stored(&draft), dir.path()).unwrap();
        assert!(reparsed.attachments().is_empty());
        assert!(reparsed.bcc.is_empty());
        assert!(!reparsed.subject.contains('\n'));
        assert!(reparsed.subject.starts_with("hi "));

        let message = draft.build_message("mail.i2p").unwrap();
        let part = MailPart::parse(std::sync::Arc::new(message));
        assert_eq!(None, part.header_value(ATTACHMENT_HEADER));
        assert_eq!(None, part.header_value("Bcc"));
        assert!(victim.exists());
    }

    #[test]
    fn envelope_and_message() {
        let dir = TempDir::new().unwrap();
        let draft = sample_draft(&dir);

        let envelope = draft.envelope("mail.i2p", true).unwrap();
        assert_eq!("me@mail.i2p", envelope.sender);
        assert_eq!(
            vec![
                "joerg@mail.i2p".to_owned(),
                "carol@mail.i2p".to_owned(),
                "secret@mail.i2p".to_owned(),
                "me@mail.i2p".to_owned(),
            ],
            envelope.recipients
        );

        let part = MailPart::parse(std::sync::Arc::new(envelope.message));
        assert!(part.content_type.is("multipart", "mixed"));
        assert_eq!(None, part.header_value("Bcc"));
        assert_eq!("Grüße", part.header_value("Subject").unwrap());
        assert_eq!(2, part.children.len());
        assert_eq!(
            b"Hello,\r\n\r\nthis is = a test.\r\n".to_vec(),
            part.children[0].decode().unwrap()
        );
        assert_eq!(Some("a.txt"), part.children[1].name.as_deref());
        assert_eq!(
            b"first line\r\nsecond line\r\n".to_vec(),
            part.children[1].decode().unwrap()
        );
    }

    #[test]
    fn bad_recipient_fails_envelope() {
        let mut draft = Draft::new("d");
        draft.sender = "me@mail.i2p".to_owned();
        draft.to = vec!["nobody".to_owned()];
        assert_matches!(
            Err(Error::BadAddress(_)),
            draft.envelope("mail.i2p", false)
        );
    }

    #[test]
    fn upload_encodings() {
        assert_eq!(
            (
                "text/plain; charset=\"utf-8\"".to_owned(),
                TransferEncoding::QuotedPrintable
            ),
            upload_encoding("text/plain")
        );
        assert_eq!(
            (
                "text/csv; charset=\"latin1\"".to_owned(),
                TransferEncoding::QuotedPrintable
            ),
            upload_encoding("text/csv; charset=latin1")
        );
        assert_eq!(
            ("image/png".to_owned(), TransferEncoding::Base64),
            upload_encoding("image/png")
        );
        assert_eq!(
            ("application/octet-stream".to_owned(), TransferEncoding::Base64),
            upload_encoding("")
        );
    }
}
