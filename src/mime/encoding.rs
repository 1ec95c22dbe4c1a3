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

//! Content transfer encodings and charsets of leaf parts.

use std::borrow::Cow;

use encoding_rs::Encoding;

use super::model::TransferEncoding;
use super::quoted_printable::{qp_decode, qp_encode};
use crate::support::error::Error;

/// Length of base64 lines we produce, not counting the line ending.
const BASE64_LINE: usize = 76;

#[cfg(test)]
thread_local! {
    pub static DECODE_CALLS: std::cell::Cell<usize> = std::cell::Cell::new(0);
}

impl TransferEncoding {
    /// Undo this transfer encoding on `data`.
    ///
    /// Identity encodings borrow the input. Base64 tolerates embedded
    /// whitespace and line breaks.
    pub fn decode<'a>(&self, data: &'a [u8]) -> Result<Cow<'a, [u8]>, Error> {
        #[cfg(test)]
        DECODE_CALLS.with(|c| c.set(c.get() + 1));

        match *self {
            TransferEncoding::SevenBit
            | TransferEncoding::EightBit
            | TransferEncoding::Binary => Ok(Cow::Borrowed(data)),
            TransferEncoding::QuotedPrintable => Ok(qp_decode(data)),
            TransferEncoding::Base64 => {
                let clean = data
                    .iter()
                    .copied()
                    .filter(|b| !b.is_ascii_whitespace())
                    .collect::<Vec<u8>>();
                Ok(Cow::Owned(base64::decode(&clean)?))
            }
            TransferEncoding::Unknown(ref name) => Err(Error::Decoding(
                format!("unsupported transfer encoding '{}'", name),
            )),
        }
    }

    /// Apply this transfer encoding to `data`, producing CRLF line endings
    /// for the textual encodings.
    pub fn encode(&self, data: &[u8]) -> Result<Vec<u8>, Error> {
        match *self {
            TransferEncoding::SevenBit
            | TransferEncoding::EightBit
            | TransferEncoding::Binary => Ok(data.to_vec()),
            TransferEncoding::QuotedPrintable => {
                Ok(qp_encode(data).into_bytes())
            }
            TransferEncoding::Base64 => {
                let encoded = base64::encode(data);
                let mut out = Vec::with_capacity(
                    encoded.len() + encoded.len() / BASE64_LINE * 2 + 2,
                );
                for line in encoded.as_bytes().chunks(BASE64_LINE) {
                    out.extend_from_slice(line);
                    out.extend_from_slice(b"\r\n");
                }
                Ok(out)
            }
            TransferEncoding::Unknown(ref name) => Err(Error::Decoding(
                format!("unsupported transfer encoding '{}'", name),
            )),
        }
    }
}

/// Convert `data` in the named charset to a string.
///
/// Returns `None` if the charset is not recognised. Malformed sequences are
/// replaced rather than rejected.
pub fn decode_charset(label: &str, data: &[u8]) -> Option<String> {
    let encoding = Encoding::for_label_no_replacement(label.trim().as_bytes())?;
    Some(encoding.decode_with_bom_removal(data).0.into_owned())
}
