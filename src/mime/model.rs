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

use std::borrow::Cow;
use std::fmt;

use super::encoded_word::decode_phrase;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AddrSpec<'a> {
    pub local: Vec<Cow<'a, [u8]>>,
    pub domain: Vec<Cow<'a, [u8]>>,
}

impl fmt::Display for AddrSpec<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for (ix, part) in self.local.iter().enumerate() {
            if ix > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", String::from_utf8_lossy(part))?;
        }
        write!(f, "@")?;
        for (ix, part) in self.domain.iter().enumerate() {
            if ix > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", String::from_utf8_lossy(part))?;
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailboxSpec<'a> {
    pub addr: AddrSpec<'a>,
    pub name: Vec<Cow<'a, [u8]>>,
}

impl MailboxSpec<'_> {
    /// The decoded display name, if there is a non-blank one.
    pub fn display_name(&self) -> Option<String> {
        if self.name.is_empty() {
            return None;
        }

        let name = decode_phrase(&self.name);
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(name.to_owned())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupSpec<'a> {
    pub name: Vec<Cow<'a, [u8]>>,
    pub boxes: Vec<MailboxSpec<'a>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Address<'a> {
    Mailbox(MailboxSpec<'a>),
    Group(GroupSpec<'a>),
}

impl<'a> Address<'a> {
    /// Every mailbox named by this address, flattening groups.
    pub fn mailboxes(&self) -> Vec<&MailboxSpec<'a>> {
        match *self {
            Address::Mailbox(ref m) => vec![m],
            Address::Group(ref g) => g.boxes.iter().collect(),
        }
    }
}

/// A parsed `Content-Type` header.
///
/// Type and subtype are always lower case. Parameter names are lower case;
/// values are as written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentType {
    pub typ: String,
    pub subtype: String,
    pub parameters: Vec<(String, String)>,
}

impl Default for ContentType {
    fn default() -> Self {
        ContentType::new("text", "plain")
    }
}

impl ContentType {
    pub fn new(typ: &str, subtype: &str) -> Self {
        ContentType {
            typ: typ.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            parameters: vec![],
        }
    }

    /// Whether this is `typ/subtype`. A `subtype` of `*` matches any subtype.
    pub fn is(&self, typ: &str, subtype: &str) -> bool {
        self.typ.eq_ignore_ascii_case(typ)
            && ("*" == subtype || self.subtype.eq_ignore_ascii_case(subtype))
    }

    pub fn mime_type(&self) -> String {
        format!("{}/{}", self.typ, self.subtype)
    }

    pub fn parameter(&self, name: &str) -> Option<Cow<str>> {
        find_parameter(&self.parameters, name)
    }

    pub fn with_parameter(mut self, name: &str, value: &str) -> Self {
        self.parameters
            .push((name.to_ascii_lowercase(), value.to_owned()));
        self
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}/{}", self.typ, self.subtype)?;
        for &(ref name, ref value) in &self.parameters {
            write!(f, "; {}=\"{}\"", name, value.replace('"', "\\\""))?;
        }
        Ok(())
    }
}

/// A parsed `Content-Disposition` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentDisposition {
    /// `inline`, `attachment`, etc, lower case.
    pub kind: String,
    pub parameters: Vec<(String, String)>,
}

impl ContentDisposition {
    pub fn is_attachment(&self) -> bool {
        "attachment" == self.kind
    }

    pub fn filename(&self) -> Option<Cow<str>> {
        find_parameter(&self.parameters, "filename")
    }
}

/// Look up a header parameter, falling back to the RFC 2231 extended form
/// (`name*=charset'lang'pct-encoded`) when the plain form is absent.
fn find_parameter<'a>(
    parameters: &'a [(String, String)],
    name: &str,
) -> Option<Cow<'a, str>> {
    if let Some(&(_, ref value)) =
        parameters.iter().find(|&&(ref n, _)| n == name)
    {
        return Some(Cow::Borrowed(value));
    }

    let extended = format!("{}*", name);
    parameters
        .iter()
        .find(|&&(ref n, _)| *n == extended)
        .and_then(|&(_, ref value)| decode_rfc2231(value))
        .map(Cow::Owned)
}

fn decode_rfc2231(value: &str) -> Option<String> {
    let mut parts = value.splitn(3, '\'');
    let charset = parts.next()?;
    let _language = parts.next()?;
    let encoded = parts.next()?;

    let mut bytes = Vec::with_capacity(encoded.len());
    let mut it = encoded.bytes();
    while let Some(b) = it.next() {
        if b'%' == b {
            let hi = it.next()?;
            let lo = it.next()?;
            let hex = [hi, lo];
            let hex = std::str::from_utf8(&hex).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
        } else {
            bytes.push(b);
        }
    }

    let charset = if charset.is_empty() { "us-ascii" } else { charset };
    super::encoding::decode_charset(charset, &bytes)
}

/// The value of a `Content-Transfer-Encoding` header.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransferEncoding {
    SevenBit,
    EightBit,
    Binary,
    QuotedPrintable,
    Base64,
    Unknown(String),
}

impl Default for TransferEncoding {
    fn default() -> Self {
        TransferEncoding::SevenBit
    }
}

impl TransferEncoding {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.eq_ignore_ascii_case("7bit") {
            TransferEncoding::SevenBit
        } else if value.eq_ignore_ascii_case("8bit") {
            TransferEncoding::EightBit
        } else if value.eq_ignore_ascii_case("binary") {
            TransferEncoding::Binary
        } else if value.eq_ignore_ascii_case("quoted-printable") {
            TransferEncoding::QuotedPrintable
        } else if value.eq_ignore_ascii_case("base64") {
            TransferEncoding::Base64
        } else {
            TransferEncoding::Unknown(value.to_ascii_lowercase())
        }
    }

    pub fn as_str(&self) -> &str {
        match *self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::Binary => "binary",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
            TransferEncoding::Unknown(ref s) => s,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rfc2231_parameters() {
        let ct = ContentType {
            typ: "application".to_owned(),
            subtype: "pdf".to_owned(),
            parameters: vec![(
                "name*".to_owned(),
                "utf-8''r%C3%A9sum%C3%A9.pdf".to_owned(),
            )],
        };
        assert_eq!("résumé.pdf", ct.parameter("name").unwrap());
        assert_eq!(None, ct.parameter("charset"));
    }

    #[test]
    fn transfer_encoding_names() {
        assert_eq!(
            TransferEncoding::QuotedPrintable,
            TransferEncoding::parse(" Quoted-Printable ")
        );
        assert_eq!(
            TransferEncoding::Unknown("x-uuencode".to_owned()),
            TransferEncoding::parse("X-UUENCODE")
        );
        assert_eq!("base64", TransferEncoding::Base64.to_string());
    }

    #[test]
    fn content_type_display() {
        let ct = ContentType::new("Text", "Plain")
            .with_parameter("charset", "utf-8");
        assert!(ct.is("text", "plain"));
        assert!(ct.is("TEXT", "*"));
        assert_eq!("text/plain; charset=\"utf-8\"", ct.to_string());
    }
}
