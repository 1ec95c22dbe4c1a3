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

//! The loose address syntax accepted in compose forms.
//!
//! Form fields hold things like `Alice <alice@mail.i2p>` or a bare
//! `bob@mail.i2p`. A field is valid when exactly one whitespace-separated
//! token of it is an address.

use lazy_static::lazy_static;
use regex::Regex;

use crate::mime::header;

lazy_static! {
    static ref BARE_ADDRESS: Regex =
        Regex::new(r"^[^@<>\s]+@[^@<>\s]+$").unwrap();
    static ref ANGLE_ADDRESS: Regex =
        Regex::new(r"^<([^@<>\s]+@[^@<>\s]+)>$").unwrap();
}

/// Extract the address from a single token, if the token is one.
fn token_address(token: &str) -> Option<&str> {
    if BARE_ADDRESS.is_match(token) {
        Some(token)
    } else {
        ANGLE_ADDRESS
            .captures(token)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str())
    }
}

/// Whether `address` names exactly one mailbox.
pub fn validate_address(address: &str) -> bool {
    if address.contains('\r') || address.contains('\n') {
        return false;
    }

    1 == address
        .split_whitespace()
        .filter_map(token_address)
        .count()
}

/// Return the bare `local@domain` part of `address`.
///
/// If no token is an address on its own, the whole text is tried as an RFC
/// 2822 mailbox so that quoted display names containing `<` still work.
pub fn get_address(address: &str) -> Option<String> {
    if let Some(addr) = address.split_whitespace().find_map(token_address) {
        return Some(addr.to_owned());
    }

    header::parse_address_list(address.as_bytes())
        .and_then(|list| {
            list.iter()
                .flat_map(|a| a.mailboxes())
                .next()
                .map(|m| m.addr.to_string())
        })
        .filter(|a| BARE_ADDRESS.is_match(a))
}

/// Split a comma-separated recipient list, honouring quotes and angle
/// brackets. Empty entries are dropped.
pub fn split_recipients(list: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut angle = false;
    let mut escaped = false;

    for ch in list.chars() {
        if escaped {
            escaped = false;
        } else if quoted && '\\' == ch {
            escaped = true;
        } else if '"' == ch {
            quoted = !quoted;
        } else if !quoted && '<' == ch {
            angle = true;
        } else if !quoted && '>' == ch {
            angle = false;
        } else if !quoted && !angle && ',' == ch {
            push_recipient(&mut out, &current);
            current.clear();
            continue;
        }
        current.push(ch);
    }
    push_recipient(&mut out, &current);

    out
}

fn push_recipient(out: &mut Vec<String>, recipient: &str) {
    let recipient = recipient.trim();
    if !recipient.is_empty() {
        out.push(recipient.to_owned());
    }
}

/// Split a recipient form field, which may separate recipients by commas or
/// by line breaks.
pub fn split_recipient_field(field: &str) -> Vec<String> {
    let field = field.replace(|c: char| '\r' == c || '\n' == c, ",");
    split_recipients(&header::single_line(&field))
}
