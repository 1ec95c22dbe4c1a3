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

//! The MIME structure of a message, parsed in place over a shared buffer.
//!
//! Parsing only looks at headers and boundary lines. Leaf content is left
//! untouched until `MailPart::decode` is called for that leaf.

use std::fmt;
use std::sync::Arc;

use memchr::memmem;

use super::encoded_word::decode_unstructured;
use super::header::{self, Field};
use super::model::*;
use crate::support::error::Error;

/// Nesting beyond this depth is treated as opaque leaf content.
pub const MAX_DEPTH: usize = 32;

/// One node of a message's MIME tree.
#[derive(Clone)]
pub struct MailPart {
    /// Pre-order index of this part within its message; the root is 0.
    pub id: usize,
    pub content_type: ContentType,
    pub boundary: Option<String>,
    /// Lower-cased `charset` parameter, if any.
    pub charset: Option<String>,
    pub disposition: Option<ContentDisposition>,
    pub encoding: TransferEncoding,
    /// Decoded file name from the disposition or the content type.
    pub name: Option<String>,
    pub description: Option<String>,
    pub multipart: bool,
    pub message: bool,
    /// Whether the part has `Content-Type` or `MIME-Version` headers of its
    /// own.
    pub mime_headers: bool,
    /// Offset of the first header byte.
    pub begin: usize,
    /// Offset of the first body byte.
    pub body_begin: usize,
    /// Offset one past the last byte of the part.
    pub end: usize,
    pub children: Vec<MailPart>,
    buffer: Arc<Vec<u8>>,
}

impl fmt::Debug for MailPart {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("MailPart")
            .field("id", &self.id)
            .field("content_type", &self.content_type)
            .field("encoding", &self.encoding)
            .field("name", &self.name)
            .field("range", &(self.begin..self.end))
            .field("body_begin", &self.body_begin)
            .field("children", &self.children)
            .finish()
    }
}

impl MailPart {
    /// Parse the whole of `buffer` as one message.
    pub fn parse(buffer: Arc<Vec<u8>>) -> Self {
        let end = buffer.len();
        Self::parse_range(buffer, 0, end)
    }

    /// Parse `buffer[begin..end]` as one message.
    pub fn parse_range(buffer: Arc<Vec<u8>>, begin: usize, end: usize) -> Self {
        let end = end.min(buffer.len());
        let begin = begin.min(end);
        let mut parser = Parser {
            buffer: &buffer,
            next_id: 0,
        };
        parser.part(begin, end, 0, None)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Size of the whole part in bytes, headers included.
    pub fn size(&self) -> usize {
        self.end - self.begin
    }

    /// The raw header block, including the blank line ending it if present.
    pub fn header(&self) -> &[u8] {
        &self.buffer[self.begin..self.body_begin]
    }

    /// The body exactly as it appears in the message.
    pub fn raw_body(&self) -> &[u8] {
        &self.buffer[self.body_begin..self.end]
    }

    /// The decoded value of the first header named `name`.
    pub fn header_value(&self, name: &str) -> Option<String> {
        header::find(self.header(), name).map(|v| decode_unstructured(&v))
    }

    /// Undo the transfer encoding of this part's body.
    pub fn decode(&self) -> Result<Vec<u8>, Error> {
        Ok(self.encoding.decode(self.raw_body())?.into_owned())
    }

    /// Find the part with the given pre-order id.
    pub fn find(&self, id: usize) -> Option<&MailPart> {
        if id == self.id {
            return Some(self);
        }

        // Children are in id order, so the candidate is the last child whose
        // id does not exceed the target.
        self.children
            .iter()
            .take_while(|c| c.id <= id)
            .last()
            .and_then(|c| c.find(id))
    }

    /// All parts of this tree in pre-order.
    pub fn walk(&self) -> Vec<&MailPart> {
        let mut out = Vec::new();
        self.walk_into(&mut out);
        out
    }

    fn walk_into<'a>(&'a self, out: &mut Vec<&'a MailPart>) {
        out.push(self);
        for child in &self.children {
            child.walk_into(out);
        }
    }
}

struct Parser<'a> {
    buffer: &'a Arc<Vec<u8>>,
    next_id: usize,
}

impl<'a> Parser<'a> {
    fn part(
        &mut self,
        begin: usize,
        end: usize,
        depth: usize,
        implicit_type: Option<ContentType>,
    ) -> MailPart {
        let buffer: &'a Arc<Vec<u8>> = self.buffer;
        let body_begin = begin + header_length(&buffer[begin..end]);
        let fields = header::fields(&buffer[begin..body_begin]);

        let raw_content_type = field(&fields, "Content-Type");
        let mime_headers = raw_content_type.is_some()
            || field(&fields, "MIME-Version").is_some();
        let content_type = raw_content_type
            .and_then(header::parse_content_type)
            .or(implicit_type)
            .unwrap_or_default();
        let encoding = field(&fields, "Content-Transfer-Encoding")
            .map(|v| TransferEncoding::parse(&String::from_utf8_lossy(v)))
            .unwrap_or_default();
        let disposition = field(&fields, "Content-Disposition")
            .and_then(header::parse_content_disposition);
        let name = disposition
            .as_ref()
            .and_then(ContentDisposition::filename)
            .or_else(|| content_type.parameter("name"))
            .map(|n| decode_unstructured(n.as_bytes()))
            .filter(|n| !n.trim().is_empty());
        let description =
            field(&fields, "Content-Description").map(decode_unstructured);
        let charset = content_type
            .parameter("charset")
            .map(|c| c.trim().to_ascii_lowercase());
        let boundary = content_type
            .parameter("boundary")
            .map(|b| b.into_owned())
            .filter(|b| !b.is_empty());

        let within_depth = depth < MAX_DEPTH;
        let multipart =
            within_depth && "multipart" == content_type.typ && boundary.is_some();
        let message = within_depth && "message" == content_type.typ;

        let id = self.next_id;
        self.next_id += 1;

        let children = if multipart {
            let digest = "digest" == content_type.subtype;
            let boundary = boundary.as_deref().unwrap_or_default();
            self.multipart_children(body_begin, end, boundary, depth, digest)
        } else if message {
            vec![self.part(body_begin, end, depth + 1, None)]
        } else {
            vec![]
        };

        MailPart {
            id,
            content_type,
            boundary,
            charset,
            disposition,
            encoding,
            name,
            description,
            multipart,
            message,
            mime_headers,
            begin,
            body_begin,
            end,
            children,
            buffer: Arc::clone(self.buffer),
        }
    }

    /// A leaf spanning `begin..end` with no headers of its own.
    fn headerless(&mut self, begin: usize, end: usize) -> MailPart {
        let id = self.next_id;
        self.next_id += 1;

        MailPart {
            id,
            content_type: ContentType::default(),
            boundary: None,
            charset: None,
            disposition: None,
            encoding: TransferEncoding::default(),
            name: None,
            description: None,
            multipart: false,
            message: false,
            mime_headers: false,
            begin,
            body_begin: begin,
            end,
            children: vec![],
            buffer: Arc::clone(self.buffer),
        }
    }

    fn multipart_children(
        &mut self,
        body_begin: usize,
        end: usize,
        boundary: &str,
        depth: usize,
        digest: bool,
    ) -> Vec<MailPart> {
        let delimiter = format!("--{}", boundary);
        let finder = memmem::Finder::new(delimiter.as_bytes());
        let buffer: &'a Arc<Vec<u8>> = self.buffer;
        let implicit_type = if digest {
            Some(ContentType::new("message", "rfc822"))
        } else {
            None
        };

        let mut children = Vec::new();
        let mut child_begin = None::<usize>;
        let mut pos = body_begin;
        let mut closed = false;

        while let Some(hit) =
            find_delimiter(buffer, &finder, body_begin, pos, end)
        {
            if let Some(begin) = child_begin {
                // The line break before the delimiter belongs to it
                let mut stop = hit;
                if stop > begin && b'\n' == buffer[stop - 1] {
                    stop -= 1;
                    if stop > begin && b'\r' == buffer[stop - 1] {
                        stop -= 1;
                    }
                }
                children.push(self.part(
                    begin,
                    stop,
                    depth + 1,
                    implicit_type.clone(),
                ));
            }

            let after = hit + delimiter.len();
            if buffer[after..end].starts_with(b"--") {
                closed = true;
                break;
            }

            // Skip any transport padding after the delimiter
            match memchr::memchr(b'\n', &buffer[after..end]) {
                Some(nl) => {
                    child_begin = Some(after + nl + 1);
                    pos = after + nl + 1;
                }
                None => {
                    child_begin = None;
                    break;
                }
            }
        }

        if !closed {
            if let Some(begin) = child_begin {
                children.push(self.part(begin, end, depth + 1, implicit_type));
            }
        }

        if children.is_empty() {
            children.push(self.headerless(body_begin, end));
        }

        children
    }
}

/// Find the next boundary delimiter at or after `from`.
///
/// A delimiter only counts at the start of a line, and only when it is not a
/// prefix of some longer token.
fn find_delimiter(
    buffer: &[u8],
    finder: &memmem::Finder,
    body_begin: usize,
    from: usize,
    end: usize,
) -> Option<usize> {
    let mut pos = from;
    while pos < end {
        let hit = pos + finder.find(&buffer[pos..end])?;
        let after = hit + finder.needle().len();
        let line_start = hit == body_begin || b'\n' == buffer[hit - 1];
        let token_end = after >= end
            || matches!(buffer[after], b'\r' | b'\n' | b' ' | b'\t' | b'-');

        if line_start && token_end {
            return Some(hit);
        }
        pos = hit + 1;
    }

    None
}

/// Length of the header block at the start of `data`, including the blank
/// line which ends it.
fn header_length(data: &[u8]) -> usize {
    if data.starts_with(b"\r\n") {
        2
    } else if data.starts_with(b"\n") {
        1
    } else if let Some(ix) = memmem::find(data, b"\r\n\r\n") {
        ix + 4
    } else if let Some(ix) = memmem::find(data, b"\n\n") {
        ix + 2
    } else {
        data.len()
    }
}

fn field<'a>(fields: &'a [Field<'a>], name: &str) -> Option<&'a [u8]> {
    fields
        .iter()
        .find(|f| f.name.eq_ignore_ascii_case(name.as_bytes()))
        .map(|f| &f.value[..])
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;
    use crate::mime::encoding::DECODE_CALLS;

    fn parse(message: &[u8]) -> MailPart {
        MailPart::parse(Arc::new(message.to_vec()))
    }

    fn decode_calls() -> usize {
        DECODE_CALLS.with(|c| c.get())
    }

    static NESTED: &[u8] = b"From: Alice <alice@mail.i2p>\r\n\
Subject: =?ISO-8859-1?Q?Andr=E9?=\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"outer\"\r\n\
\r\n\
This is the preamble.\r\n\
--outer\r\n\
Content-Type: multipart/alternative; boundary=inner\r\n\
\r\n\
--inner\r\n\
Content-Type: text/plain; charset=UTF-8\r\n\
\r\n\
plain body\r\n\
--inner\r\n\
Content-Type: text/html\r\n\
\r\n\
<p>html body</p>\r\n\
--inner--\r\n\
--outer\r\n\
Content-Type: application/octet-stream; name=\"data.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
Content-Disposition: attachment; filename=\"report.bin\"\r\n\
\r\n\
aGVsbG8g\r\n\
d29ybGQ=\r\n\
--outer--\r\n\
epilogue\r\n";

    #[test]
    fn non_mime_message_is_single_leaf() {
        let root = parse(b"From: a@b\r\nSubject: hi\r\n\r\nHello\r\n");
        assert!(root.is_leaf());
        assert!(!root.mime_headers);
        assert!(root.content_type.is("text", "plain"));
        assert_eq!(b"Hello\r\n", root.raw_body());
        assert_eq!("hi", root.header_value("subject").unwrap());
    }

    #[test]
    fn nested_multipart_tree() {
        let root = parse(NESTED);
        assert!(root.multipart);
        assert!(root.mime_headers);
        assert_eq!("André", root.header_value("Subject").unwrap());
        assert_eq!(2, root.children.len());

        let ids = root.walk().iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(vec![0, 1, 2, 3, 4], ids);

        let alternative = &root.children[0];
        assert!(alternative.content_type.is("multipart", "alternative"));
        assert_eq!(2, alternative.children.len());
        assert_eq!(b"plain body", alternative.children[0].raw_body());
        assert_eq!(Some("utf-8"), alternative.children[0].charset.as_deref());
        assert_eq!(b"<p>html body</p>", alternative.children[1].raw_body());

        let attachment = root.find(4).unwrap();
        assert_eq!(Some("report.bin"), attachment.name.as_deref());
        assert!(attachment.disposition.as_ref().unwrap().is_attachment());
        assert_eq!(TransferEncoding::Base64, attachment.encoding);
        assert_eq!(b"hello world", &attachment.decode().unwrap()[..]);

        assert_eq!(3, root.find(3).unwrap().id);
        assert!(root.find(5).is_none());
    }

    #[test]
    fn unterminated_multipart_keeps_remainder() {
        let root = parse(
            b"Content-Type: multipart/mixed; boundary=b\r\n\
\r\n\
--b\r\n\
\r\n\
first\r\n\
--b\r\n\
Content-Type: text/plain\r\n\
\r\n\
second and no end",
        );
        assert_eq!(2, root.children.len());
        assert_eq!(b"first", root.children[0].raw_body());
        assert_eq!(b"second and no end", root.children[1].raw_body());
        assert_eq!(root.end, root.children[1].end);
    }

    #[test]
    fn multipart_without_delimiters_is_one_part() {
        let root = parse(
            b"Content-Type: multipart/mixed; boundary=nowhere\r\n\
\r\n\
just some text\r\n",
        );
        assert_eq!(1, root.children.len());
        let child = &root.children[0];
        assert!(child.is_leaf());
        assert!(child.content_type.is("text", "plain"));
        assert_eq!(b"just some text\r\n", child.raw_body());
    }

    #[test]
    fn multipart_without_boundary_is_leaf() {
        let root = parse(
            b"Content-Type: multipart/mixed\r\n\r\n--x\r\n\r\nbody\r\n--x--\r\n",
        );
        assert!(!root.multipart);
        assert!(root.is_leaf());
    }

    #[test]
    fn boundary_prefix_is_not_a_delimiter() {
        let root = parse(
            b"Content-Type: multipart/mixed; boundary=abc\r\n\
\r\n\
--abc\r\n\
\r\n\
--abcdef is just text\r\n\
--abc--\r\n",
        );
        assert_eq!(1, root.children.len());
        assert_eq!(
            b"--abcdef is just text",
            root.children[0].raw_body()
        );
    }

    #[test]
    fn message_part_has_one_child() {
        let root = parse(
            b"Content-Type: message/rfc822\r\n\
\r\n\
Subject: inner\r\n\
\r\n\
inner body\r\n",
        );
        assert!(root.message);
        assert_eq!(1, root.children.len());
        assert_eq!("inner", root.children[0].header_value("Subject").unwrap());
        assert_eq!(b"inner body\r\n", root.children[0].raw_body());
    }

    #[test]
    fn digest_children_default_to_messages() {
        let root = parse(
            b"Content-Type: multipart/digest; boundary=d\r\n\
\r\n\
--d\r\n\
\r\n\
Subject: one\r\n\
\r\n\
first\r\n\
--d--\r\n",
        );
        let child = &root.children[0];
        assert!(child.message);
        assert_eq!("one", child.children[0].header_value("Subject").unwrap());
    }

    #[test]
    fn large_leaf_is_not_decoded_until_asked() {
        let payload = vec![0x5Au8; 10 * 1024 * 1024];
        let mut message = b"MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"big\"\r\n\
\r\n\
--big\r\n\
Content-Type: text/plain\r\n\
\r\n\
see attached\r\n\
--big\r\n\
Content-Type: application/octet-stream\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n"
            .to_vec();
        message.extend_from_slice(
            &TransferEncoding::Base64.encode(&payload).unwrap(),
        );
        message.extend_from_slice(b"--big--\r\n");

        let before = decode_calls();
        let root = parse(&message);
        root.walk();
        assert_eq!(before, decode_calls());

        let leaf = &root.children[1];
        assert_eq!(payload, leaf.decode().unwrap());
        assert_eq!(before + 1, decode_calls());
    }

    #[test]
    fn deep_nesting_is_bounded() {
        let mut message = Vec::new();
        for _ in 0..500 {
            message.extend_from_slice(b"Content-Type: message/rfc822\r\n\r\n");
        }
        message.extend_from_slice(b"bottom\r\n");

        let root = parse(&message);
        assert_eq!(MAX_DEPTH + 1, root.walk().len());
    }

    proptest! {
        #[test]
        fn parse_never_panics(
            s in prop::collection::vec(prop::num::u8::ANY, 0..400)
        ) {
            parse(&s).walk();
        }

        #[test]
        fn multipart_parse_never_panics(body in r"(--b(--)?\r?\n|[a-z:\r\n ]{0,10}){0,20}") {
            let mut message =
                b"Content-Type: multipart/mixed; boundary=b\r\n\r\n".to_vec();
            message.extend_from_slice(body.as_bytes());
            let root = parse(&message);
            for part in root.walk() {
                prop_assert!(part.begin <= part.body_begin);
                prop_assert!(part.body_begin <= part.end);
                prop_assert!(part.end <= message.len());
            }
        }
    }
}
