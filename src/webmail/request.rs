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

//! The transport-independent form of one browser request.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;

/// Parameter carrying the anti-forgery token of a form submission.
pub const NONCE: &str = "nonce";
/// Prefix of the checkbox parameters selecting list items.
pub const CHECK_PREFIX: &str = "check";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A file submitted with a compose form.
pub struct Upload {
    pub file_name: String,
    pub content_type: String,
    pub data: Box<dyn Read + Send>,
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .finish()
    }
}

#[derive(Debug)]
pub struct Request {
    pub method: Method,
    pub params: BTreeMap<String, String>,
    pub upload: Option<Upload>,
}

impl Request {
    pub fn get(params: &[(&str, &str)]) -> Self {
        Request::new(Method::Get, params)
    }

    pub fn post(params: &[(&str, &str)]) -> Self {
        Request::new(Method::Post, params)
    }

    fn new(method: Method, params: &[(&str, &str)]) -> Self {
        Request {
            method,
            params: params
                .iter()
                .map(|&(k, v)| (k.to_owned(), v.to_owned()))
                .collect(),
            upload: None,
        }
    }

    pub fn with_upload(mut self, upload: Upload) -> Self {
        self.upload = Some(upload);
        self
    }

    pub fn is_post(&self) -> bool {
        Method::Post == self.method
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// The parameter `name`, or the empty string.
    pub fn text(&self, name: &str) -> &str {
        self.param(name).unwrap_or("")
    }

    /// Whether a button-shaped field `name` is present with a value.
    pub fn has(&self, name: &str) -> bool {
        self.param(name).map_or(false, |v| !v.is_empty())
    }

    /// Decode a parameter carrying an encoded uidl.
    pub fn uidl(&self, name: &str) -> Option<String> {
        self.param(name).and_then(decode_uidl)
    }

    pub fn number(&self, name: &str) -> Option<usize> {
        self.param(name).and_then(|v| v.trim().parse::<usize>().ok())
    }

    /// The suffixes of every checked `check<suffix>=1` parameter.
    pub fn checked_items(&self) -> Vec<&str> {
        self.params
            .iter()
            .filter(|&(k, v)| k.starts_with(CHECK_PREFIX) && "1" == v)
            .map(|(k, _)| &k[CHECK_PREFIX.len()..])
            .collect()
    }

    /// The uidls of every checked list item.
    pub fn checked_uidls(&self) -> Vec<String> {
        self.checked_items()
            .into_iter()
            .filter_map(decode_uidl)
            .collect()
    }
}

/// Encode a uidl for use in a URL or a parameter name.
pub fn encode_uidl(uidl: &str) -> String {
    base64::encode_config(uidl, base64::URL_SAFE_NO_PAD)
}

pub fn decode_uidl(encoded: &str) -> Option<String> {
    base64::decode_config(encoded, base64::URL_SAFE_NO_PAD)
        .ok()
        .and_then(|d| String::from_utf8(d).ok())
        .filter(|s| !s.is_empty())
}

/// Builds the query string of a redirect target.
#[derive(Clone, Debug, Default)]
pub struct Query {
    parts: Vec<(&'static str, String)>,
}

impl Query {
    pub fn new() -> Self {
        Query::default()
    }

    pub fn with(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.parts.push((key, value.to_string()));
        self
    }

    pub fn with_opt(
        self,
        key: &'static str,
        value: Option<impl fmt::Display>,
    ) -> Self {
        match value {
            Some(value) => self.with(key, value),
            None => self,
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("?")?;
        for (ix, &(key, ref value)) in self.parts.iter().enumerate() {
            if ix > 0 {
                f.write_str("&")?;
            }
            write!(f, "{}=", key)?;
            for ch in value.chars() {
                match ch {
                    'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' => {
                        write!(f, "{}", ch)?
                    }
                    ch => {
                        let mut buf = [0u8; 4];
                        for b in ch.encode_utf8(&mut buf).bytes() {
                            write!(f, "%{:02X}", b)?;
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn uidl_encoding() {
        let encoded = encode_uidl("abc/+=?");
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('+'));
        assert_eq!(Some("abc/+=?".to_owned()), decode_uidl(&encoded));
        assert_eq!(None, decode_uidl("!!!"));
        assert_eq!(None, decode_uidl(""));
    }

    #[test]
    fn checked_items() {
        let req = Request::post(&[
            ("check", "1"),
            ("checkYQ", "1"),
            ("checkYg", "0"),
            ("checkYw", "1"),
            ("other", "1"),
        ]);
        assert_eq!(vec!["", "YQ", "Yw"], req.checked_items());
        assert_eq!(vec!["a".to_owned(), "c".to_owned()], req.checked_uidls());
    }

    #[test]
    fn buttons_need_a_value() {
        let req = Request::post(&[("send", "Send"), ("cancel", "")]);
        assert!(req.has("send"));
        assert!(!req.has("cancel"));
        assert!(!req.has("list"));
        assert!(req.is_post());
    }

    #[test]
    fn query_formatting() {
        assert_eq!(
            "?page=2&sort=-date&folder=Inbox",
            Query::new()
                .with("page", 2)
                .with("sort", "-date")
                .with("folder", "Inbox")
                .to_string()
        );
        assert_eq!(
            "?x=a%20b%2Fc",
            Query::new()
                .with("x", "a b/c")
                .with_opt("y", None::<u32>)
                .to_string()
        );
    }
}
