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
use std::fmt::Write;

/// Longest encoded line, not counting the soft-break `=` and the line ending.
const MAX_LINE: usize = 75;

/// Decode a complete quoted-printable buffer.
///
/// Invalid escapes are passed through verbatim. A `=` at the very end of the
/// data is treated as a soft line break.
pub fn qp_decode(s: &[u8]) -> Cow<[u8]> {
    if !s.contains(&b'=') {
        return Cow::Borrowed(s);
    }

    let mut transformed = Vec::with_capacity(s.len());
    let mut ix = 0;
    while ix < s.len() {
        let b = s[ix];
        if b'=' != b {
            transformed.push(b);
            ix += 1;
            continue;
        }

        let rest = &s[ix + 1..];
        if rest.starts_with(b"\r\n") {
            // Soft line break with DOS ending, discard
            ix += 3;
        } else if rest.starts_with(b"\n") {
            // Soft line break with UNIX ending, discard
            ix += 2;
        } else if rest.is_empty() {
            ix += 1;
        } else if let Some(ch) = rest.get(..2).and_then(hex_pair) {
            transformed.push(ch);
            ix += 3;
        } else {
            transformed.push(b'=');
            ix += 1;
        }
    }

    Cow::Owned(transformed)
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    if !pair.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }

    std::str::from_utf8(pair)
        .ok()
        .and_then(|e| u8::from_str_radix(e, 16).ok())
}

/// Encode `data` as quoted-printable with CRLF line endings.
///
/// Bare LF and CRLF in the input both become hard line breaks.
pub fn qp_encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() + data.len() / 8);
    let mut lines = data.split(|&b| b'\n' == b).peekable();

    while let Some(line) = lines.next() {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let mut width = 0;

        for (ix, &b) in line.iter().enumerate() {
            let last = ix + 1 == line.len();
            let literal = (b'!'..=b'~').contains(&b) && b'=' != b
                || (b' ' == b || b'\t' == b) && !last;

            let needed = if literal { 1 } else { 3 };
            if width + needed > MAX_LINE {
                out.push_str("=\r\n");
                width = 0;
            }

            if literal {
                out.push(b as char);
            } else {
                let _ = write!(out, "={:02X}", b);
            }
            width += needed;
        }

        if lines.peek().is_some() {
            out.push_str("\r\n");
        }
    }

    out
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn assert_qp(expected: &[u8], input: &[u8]) {
        assert_eq!(expected, &qp_decode(input)[..]);
    }

    #[test]
    fn test_qp_decode() {
        assert_qp(b"hello world", b"hello world");
        assert_qp(b"\xabfoo", b"=ABfoo");
        assert_qp(b"fo\xabo", b"fo=ABo");
        assert_qp(b"foo\xab", b"foo=AB");
        assert_qp(b"foo\xab\xcd", b"foo=ab=CD");

        assert_qp(b"foo", b"foo=\n");
        assert_qp(b"foobar", b"foo=\nbar");
        assert_qp(b"foo", b"foo=\r\n");
        assert_qp(b"foobar", b"foo=\r\nbar");

        assert_qp(b"foo=()bar", b"foo=()bar");
        assert_qp(b"foo=\xabbar", b"foo==ABbar");
        assert_qp(b"foo=A\xabbar", b"foo=A=ABbar");
        assert_qp(b"foo=+1", b"foo=+1");
        assert_qp("foo=ゑbar".as_bytes(), "foo=ゑbar".as_bytes());

        assert_qp(b"foo", b"foo=");
        assert_qp(b"foo=A", b"foo=A");
        assert_qp(b"foo=\r", b"foo=\r");
    }

    #[test]
    fn qp_decode_borrows_when_nothing_to_do() {
        assert_matches!(Cow::Borrowed(_), qp_decode(b"plain text\r\n"));
    }

    #[test]
    fn test_qp_encode() {
        assert_eq!("hello world", qp_encode(b"hello world"));
        assert_eq!("a=3Db", qp_encode(b"a=b"));
        assert_eq!("trailing=20", qp_encode(b"trailing "));
        assert_eq!("one\r\ntwo\r\n", qp_encode(b"one\ntwo\n"));
        assert_eq!("one\r\ntwo", qp_encode(b"one\r\ntwo"));
        assert_eq!("caf=C3=A9", qp_encode("café".as_bytes()));

        let long = "x".repeat(200);
        let encoded = qp_encode(long.as_bytes());
        for line in encoded.split("\r\n") {
            assert!(line.len() <= MAX_LINE + 1, "{}", line);
        }
        assert_eq!(long.as_bytes(), &qp_decode(encoded.as_bytes())[..]);
    }

    proptest! {
        #[test]
        fn qp_decode_never_fails_for_bytes(
            s in prop::collection::vec(prop::num::u8::ANY, 0..40)
        ) {
            qp_decode(&s);
        }

        #[test]
        fn qp_encoding_is_reversible_for_single_lines(
            s in prop::collection::vec(prop::num::u8::ANY, 0..300)
                .prop_filter("no line breaks", |s| !s.contains(&b'\n'))
        ) {
            let encoded = qp_encode(&s);
            let expected = s.strip_suffix(b"\r").unwrap_or(&s);
            prop_assert_eq!(expected, &qp_decode(encoded.as_bytes())[..]);
        }
    }
}
