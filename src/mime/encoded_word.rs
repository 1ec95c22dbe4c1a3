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

use encoding_rs::*;
use lazy_static::lazy_static;
use regex::Regex;

use super::quoted_printable::qp_decode;

lazy_static! {
    static ref ENCODED_WORD: Regex =
        Regex::new(r"^=\?([!->@-~]*)\?([!->@-~]*)\?([!->@-~]*)\?=$").unwrap();
}

/// Bytes of UTF-8 carried by each encoded word we produce, chosen so the word
/// stays within the RFC 2047 limit of 75 characters.
const ENCODE_CHUNK: usize = 45;

/// Test if `word` (in its entirety) is an RFC 2047 "encoded word".
///
/// If it is, decode it and return its decoded value.
///
/// Returns `None` if it is not an encoded word or if it could not be decoded.
/// The distinction matters to callers since whitespace between adjacent
/// encoded words is deleted, but must be left alone in all other cases.
///
/// Encoded words longer than the RFC 2047 limit are accepted, since real
/// agents produce them.
pub fn ew_decode(word: &str) -> Option<Cow<str>> {
    let captures = ENCODED_WORD.captures(word)?;

    let charset = captures.get(1)?.as_str();
    let transfer_encoding = captures.get(2)?.as_str();
    let mut content = Cow::Borrowed(captures.get(3)?.as_str().as_bytes());

    // _ in the content (before transfer decoding) stands for ASCII space
    // regardless of charset
    if content.contains(&b'_') {
        for b in content.to_mut() {
            if *b == b'_' {
                *b = b' ';
            }
        }
    }

    // If the cow becomes owned at any stage it stays owned the rest of the
    // way, so the borrowed case only ever borrows from `word`.
    let content = match content {
        Cow::Owned(content) => decode_xfer(transfer_encoding, &content)
            .map(Cow::into_owned)
            .map(Cow::Owned),
        Cow::Borrowed(content) => decode_xfer(transfer_encoding, content),
    }?;

    match content {
        Cow::Owned(content) => decode_charset(charset, &content)
            .map(Cow::into_owned)
            .map(Cow::Owned),
        Cow::Borrowed(content) => decode_charset(charset, content),
    }
}

fn decode_xfer<'a>(xfer: &str, content: &'a [u8]) -> Option<Cow<'a, [u8]>> {
    match xfer {
        "q" | "Q" => Some(qp_decode(content)),
        "b" | "B" => base64::decode(content).ok().map(Cow::Owned),
        _ => None,
    }
}

fn decode_charset<'a>(
    charset: &str,
    content: &'a [u8],
) -> Option<Cow<'a, str>> {
    // RFC 2231 permits a language suffix on the charset
    let charset = charset.split('*').next().unwrap_or(charset);
    Some(
        Encoding::for_label_no_replacement(charset.as_bytes())?
            .decode_with_bom_removal(content)
            .0,
    )
}

/// Interpret raw header bytes as text.
///
/// Headers ought to be ASCII, but 8-bit headers are common. These are taken
/// as UTF-8 when valid, and as windows-1252 (the de facto meaning of
/// ISO-8859-1) otherwise.
pub fn header_text(raw: &[u8]) -> Cow<str> {
    match std::str::from_utf8(raw) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => WINDOWS_1252.decode_without_bom_handling(raw).0,
    }
}

/// Decode an unstructured header value such as `Subject`, expanding any
/// encoded words it contains.
pub fn decode_unstructured(raw: &[u8]) -> String {
    let text = header_text(raw);
    let mut out = String::with_capacity(text.len());
    let mut pending_space = "";
    let mut last_was_encoded = false;

    for (is_space, chunk) in whitespace_chunks(&text) {
        if is_space {
            pending_space = chunk;
            continue;
        }

        match ew_decode(chunk) {
            Some(decoded) => {
                if !last_was_encoded {
                    out.push_str(pending_space);
                }
                out.push_str(&decoded);
                last_was_encoded = true;
            }
            None => {
                out.push_str(pending_space);
                out.push_str(chunk);
                last_was_encoded = false;
            }
        }
        pending_space = "";
    }

    out.push_str(pending_space);
    out
}

/// Decode the words of a parsed `phrase`, joining them with single spaces
/// except between adjacent encoded words.
pub fn decode_phrase(words: &[Cow<[u8]>]) -> String {
    let mut out = String::new();
    let mut last_was_encoded = false;

    for (ix, word) in words.iter().enumerate() {
        let text = header_text(word);
        match ew_decode(&text) {
            Some(decoded) => {
                if ix > 0 && !last_was_encoded {
                    out.push(' ');
                }
                out.push_str(&decoded);
                last_was_encoded = true;
            }
            None => {
                if ix > 0 && "." != text {
                    out.push(' ');
                }
                out.push_str(&text);
                last_was_encoded = false;
            }
        }
    }

    out
}

/// Split `s` into alternating runs of whitespace and non-whitespace.
fn whitespace_chunks(s: &str) -> Vec<(bool, &str)> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut in_space = None;

    for (ix, ch) in s.char_indices() {
        let space = ch.is_whitespace();
        match in_space {
            Some(prev) if prev != space => {
                chunks.push((prev, &s[start..ix]));
                start = ix;
            }
            _ => (),
        }
        in_space = Some(space);
    }

    if let Some(prev) = in_space {
        chunks.push((prev, &s[start..]));
    }

    chunks
}

/// Encode `text` for use in an unstructured header.
///
/// ASCII text is returned unchanged. Anything else becomes a sequence of
/// base64 UTF-8 encoded words separated by folding whitespace.
pub fn ew_encode(text: &str) -> Cow<str> {
    if text.is_ascii() && !text.contains("=?") {
        return Cow::Borrowed(text);
    }

    let mut words = Vec::new();
    let mut start = 0;
    while start < text.len() {
        let mut end = (start + ENCODE_CHUNK).min(text.len());
        while !text.is_char_boundary(end) {
            end -= 1;
        }

        words.push(format!(
            "=?UTF-8?B?{}?=",
            base64::encode(&text[start..end])
        ));
        start = end;
    }

    Cow::Owned(words.join("\r\n "))
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_ew_decode() {
        assert_eq!(None, ew_decode("hello world"));

        // Examples from RFC 2047
        assert_eq!(
            "Keith Moore",
            ew_decode("=?US-ASCII?Q?Keith_Moore?=").unwrap()
        );
        assert_eq!(
            "Keld Jørn Simonsen",
            ew_decode("=?ISO-8859-1?Q?Keld_J=F8rn_Simonsen?=").unwrap()
        );
        assert_eq!("André", ew_decode("=?ISO-8859-1?Q?Andr=E9?=").unwrap());
        assert_eq!(
            "If you can read this yo",
            ew_decode("=?ISO-8859-1?B?SWYgeW91IGNhbiByZWFkIHRoaXMgeW8=?=")
                .unwrap()
        );
        assert_eq!(
            "םולש ןב ילטפנ",
            ew_decode("=?iso-8859-8?b?7eXs+SDv4SDp7Oj08A==?=").unwrap()
        );
        assert_eq!(None, ew_decode("=?x-no-such-charset?Q?abc?="));
    }

    #[test]
    fn unstructured_values() {
        assert_eq!("plain subject", decode_unstructured(b"plain subject"));
        assert_eq!(
            "ab",
            decode_unstructured(b"=?ISO-8859-1?Q?a?= =?ISO-8859-1?Q?b?=")
        );
        assert_eq!(
            "a b",
            decode_unstructured(b"=?ISO-8859-1?Q?a?= b")
        );
        assert_eq!(
            "Re: André",
            decode_unstructured(b"Re: =?ISO-8859-1?Q?Andr=E9?=")
        );
        assert_eq!("caf\u{e9}", decode_unstructured(b"caf\xe9"));
    }

    #[test]
    fn phrases() {
        let words: Vec<Cow<[u8]>> = vec![
            Cow::Borrowed(&b"=?ISO-8859-1?Q?Keld?="[..]),
            Cow::Borrowed(&b"=?ISO-8859-1?Q?_J=F8rn?="[..]),
            Cow::Borrowed(&b"Simonsen"[..]),
            Cow::Borrowed(&b"."[..]),
        ];
        assert_eq!("Keld Jørn Simonsen.", decode_phrase(&words));
    }

    #[test]
    fn encode_round_trip() {
        assert_eq!("hello", ew_encode("hello"));

        let subject = "Grüße aus dem Café, ".repeat(5);
        let encoded = ew_encode(&subject);
        assert!(encoded.is_ascii());
        for line in encoded.split("\r\n") {
            assert!(line.trim().len() <= 75, "{}", line);
        }
        assert_eq!(subject, decode_unstructured(encoded.as_bytes()));
    }

    proptest! {
        #[test]
        fn ew_decode_never_panics(s in r"=\?.*\?.*\?.*\?=") {
            ew_decode(&s);
        }

        #[test]
        fn unstructured_never_panics(
            s in prop::collection::vec(prop::num::u8::ANY, 0..80)
        ) {
            decode_unstructured(&s);
        }
    }
}
