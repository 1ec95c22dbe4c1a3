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

//! Utilities for working with individual RFC 2822 / RFC 2045 headers.
//!
//! Header values given to the parsers here are expected to have been
//! unfolded already; any remaining line endings are treated as whitespace.

use std::borrow::Cow;
use std::str;

use chrono::prelude::*;
use nom::{
    branch::alt,
    bytes::complete::{is_a, is_not, tag, take, take_while1, take_while_m_n},
    character::is_digit,
    combinator::{map, opt},
    error::ErrorKind,
    multi::{fold_many0, many0, many0_count, many1_count, separated_nonempty_list},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use super::model::*;

/// One header field of a header block, with its value unfolded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field<'a> {
    pub name: &'a [u8],
    pub value: Cow<'a, [u8]>,
}

/// Split a raw header block into its fields.
///
/// Continuation lines are joined onto the preceding field with the line
/// ending removed. Lines which are neither fields nor continuations are
/// ignored. Scanning stops at the first empty line.
pub fn fields(block: &[u8]) -> Vec<Field<'_>> {
    let mut fields: Vec<Field<'_>> = Vec::new();

    for line in block.split(|&b| b'\n' == b) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        if line.is_empty() {
            break;
        }

        if b' ' == line[0] || b'\t' == line[0] {
            if let Some(last) = fields.last_mut() {
                last.value.to_mut().extend_from_slice(line);
            }
            continue;
        }

        if let Some(colon) = memchr::memchr(b':', line) {
            let name = trim(&line[..colon]);
            if !name.is_empty() {
                fields.push(Field {
                    name,
                    value: Cow::Borrowed(trim(&line[colon + 1..])),
                });
            }
        }
    }

    for field in &mut fields {
        if let Cow::Owned(ref mut value) = field.value {
            let trimmed = trim(value).to_vec();
            *value = trimmed;
        }
    }

    fields
}

/// Return the unfolded value of the first header named `name`
/// (case-insensitive).
pub fn find<'a>(block: &'a [u8], name: &str) -> Option<Cow<'a, [u8]>> {
    fields(block)
        .into_iter()
        .find(|f| f.name.eq_ignore_ascii_case(name.as_bytes()))
        .map(|f| f.value)
}

/// Return the unfolded values of every header named `name`.
pub fn find_all<'a>(block: &'a [u8], name: &str) -> Vec<Cow<'a, [u8]>> {
    fields(block)
        .into_iter()
        .filter(|f| f.name.eq_ignore_ascii_case(name.as_bytes()))
        .map(|f| f.value)
        .collect()
}

fn trim(s: &[u8]) -> &[u8] {
    let start = s
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(s.len());
    let end = s
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |p| p + 1);
    &s[start..end]
}

/// Parse the content of a `Date` header.
pub fn parse_datetime(i: &[u8]) -> Option<DateTime<FixedOffset>> {
    date_time(i).ok().and_then(|(_, dt)| dt)
}

/// Parse the content of a header which is defined as an `address-list`.
pub fn parse_address_list(i: &[u8]) -> Option<Vec<Address<'_>>> {
    address_list(i).ok().map(|(_, v)| v)
}

/// Parse the content of a `Content-Type` header.
pub fn parse_content_type(i: &[u8]) -> Option<ContentType> {
    content_type(i).ok().map(|(_, v)| v)
}

/// Parse the content of a `Content-Disposition` header.
pub fn parse_content_disposition(i: &[u8]) -> Option<ContentDisposition> {
    content_disposition(i).ok().map(|(_, v)| v)
}

// ==================== RFC 2822 LEXICAL TOKENS ====================

// RFC 2822 3.2.2 "quoted-pair", including the 8-bit clean "obsolete" syntax
fn quoted_pair(i: &[u8]) -> IResult<&[u8], &[u8]> {
    preceded(tag("\\"), take(1usize))(i)
}

// RFC 2822 3.2.3 "Folding white space", collapsed to a single space.
fn fws(i: &[u8]) -> IResult<&[u8], &[u8]> {
    map(is_a(" \t\r\n"), |_| &b" "[..])(i)
}

// RFC 2822 3.2.3 "Comment content". FWS is folded in here rather than being
// part of the comment production.
fn ccontent(i: &[u8]) -> IResult<&[u8], ()> {
    alt((
        map(is_not("()\\ \t\r\n"), |_| ()),
        map(quoted_pair, |_| ()),
        map(fws, |_| ()),
        comment,
    ))(i)
}

// RFC 2822 3.2.3 "Comment". Note it is recursive.
fn comment(i: &[u8]) -> IResult<&[u8], ()> {
    map(delimited(tag("("), many0_count(ccontent), tag(")")), |_| ())(i)
}

// RFC 2822 3.2.3 "Comment or folding white space". Always succeeds.
fn cfws(i: &[u8]) -> IResult<&[u8], ()> {
    map(many0_count(alt((map(fws, |_| ()), comment))), |_| ())(i)
}

// RFC 2822 3.2.4 "Atom text", amended by RFC 6532 to include all non-ASCII
fn is_atext(ch: u8) -> bool {
    ch.is_ascii_alphanumeric()
        || b"!#$%&'*+-/=?^_`{|}~".contains(&ch)
        || ch >= 0x80
}

// RFC 2822 3.2.4 "Atom"
fn atom(i: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(cfws, take_while1(is_atext), cfws)(i)
}

// RFC 2822 3.2.5 "Quoted [string] content". As with comments, FWS is moved
// into the content.
fn qcontent(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((is_not(" \t\r\n\\\""), quoted_pair, fws))(i)
}

// RFC 2822 3.2.5 "Quoted string"
fn quoted_string(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    delimited(
        pair(cfws, tag("\"")),
        fold_many0(
            qcontent,
            Cow::Borrowed(&[] as &[u8]),
            |mut acc: Cow<[u8]>, item| {
                if acc.is_empty() {
                    acc = Cow::Borrowed(item);
                } else {
                    acc.to_mut().extend_from_slice(item);
                }
                acc
            },
        ),
        pair(tag("\""), cfws),
    )(i)
}

// RFC 2822 3.2.6 "word"
fn word(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    alt((map(atom, Cow::Borrowed), quoted_string))(i)
}

// RFC 2822 3.2.6 "phrase", plus the obsolete syntax which accounts for the
// '.' that many agents put unquoted into display names.
fn phrase(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    map(
        pair(
            word,
            many0(alt((
                word,
                map(terminated(tag("."), cfws), Cow::Borrowed),
            ))),
        ),
        |(head, mut tail)| {
            tail.insert(0, head);
            tail
        },
    )(i)
}

// ==================== RFC 2822 DATE AND TIME ====================

fn parse_u32_infallible(i: &[u8]) -> u32 {
    str::from_utf8(i).unwrap().parse::<u32>().unwrap()
}

fn day(i: &[u8]) -> IResult<&[u8], u32> {
    map(take_while_m_n(1, 2, is_digit), parse_u32_infallible)(i)
}

fn two_digit(i: &[u8]) -> IResult<&[u8], u32> {
    map(take_while_m_n(2, 2, is_digit), parse_u32_infallible)(i)
}

fn year(i: &[u8]) -> IResult<&[u8], u32> {
    map(take_while_m_n(2, 4, is_digit), |s: &[u8]| {
        let y = parse_u32_infallible(s);
        // Two- and three-digit years per RFC 2822 4.3
        if 2 == s.len() && y < 50 {
            y + 2000
        } else if s.len() < 4 {
            y + 1900
        } else {
            y
        }
    })(i)
}

static MONTHS: [&[u8]; 12] = [
    b"jan", b"feb", b"mar", b"apr", b"may", b"jun", b"jul", b"aug", b"sep",
    b"oct", b"nov", b"dec",
];

fn month(i: &[u8]) -> IResult<&[u8], u32> {
    let (rest, name) =
        take_while_m_n(3, 3, |b: u8| b.is_ascii_alphabetic())(i)?;
    MONTHS
        .iter()
        .position(|m| m.eq_ignore_ascii_case(name))
        .map(|ix| (rest, ix as u32 + 1))
        .ok_or(nom::Err::Error((i, ErrorKind::Tag)))
}

fn time_sep(i: &[u8]) -> IResult<&[u8], ()> {
    map(tuple((cfws, tag(":"), cfws)), |_| ())(i)
}

fn time_of_day(i: &[u8]) -> IResult<&[u8], (u32, u32, u32)> {
    tuple((
        terminated(two_digit, time_sep),
        two_digit,
        map(opt(preceded(time_sep, two_digit)), |s| s.unwrap_or(0)),
    ))(i)
}

// Offset in seconds east of UTC
fn numeric_zone(i: &[u8]) -> IResult<&[u8], i32> {
    map(
        pair(alt((tag("+"), tag("-"))), pair(two_digit, two_digit)),
        |(sign, (h, m))| {
            let n = (h * 3600 + m * 60) as i32;
            if b"-" == sign {
                -n
            } else {
                n
            }
        },
    )(i)
}

fn obs_zone(i: &[u8]) -> IResult<&[u8], i32> {
    map(take_while1(|b: u8| b.is_ascii_alphabetic()), |name: &[u8]| {
        let hours = match name.to_ascii_lowercase().as_slice() {
            b"ut" | b"gmt" | b"z" => 0,
            b"edt" => -4,
            b"est" | b"cdt" => -5,
            b"cst" | b"mdt" => -6,
            b"mst" | b"pdt" => -7,
            b"pst" => -8,
            // Military and unrecognised zones must be treated as UTC
            _ => 0,
        };
        hours * 3600
    })(i)
}

fn date_time(i: &[u8]) -> IResult<&[u8], Option<DateTime<FixedOffset>>> {
    map(
        tuple((
            // Day of week, which we don't care about
            opt(terminated(atom, tag(","))),
            cfws,
            terminated(day, cfws),
            terminated(month, cfws),
            terminated(year, cfws),
            terminated(time_of_day, cfws),
            opt(alt((numeric_zone, obs_zone))),
        )),
        |(_, _, day, month, year, (hour, minute, second), zone)| {
            FixedOffset::east_opt(zone.unwrap_or(0))
                .and_then(|off| off.ymd_opt(year as i32, month, day).single())
                .and_then(|date| date.and_hms_opt(hour, minute, second))
        },
    )(i)
}

// ==================== RFC 2822 ADDRESSES ====================

// RFC 2822 3.4.1 local part, parsed as the obsolete `word *("." word)`
// which encompasses both dot-atom and quoted-string.
fn local_part(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    separated_nonempty_list(tag("."), word)(i)
}

// RFC 2822 3.4.1 domain literal. FWS is moved into the content.
fn domain_literal(i: &[u8]) -> IResult<&[u8], Vec<u8>> {
    map(
        delimited(
            pair(cfws, tag("[")),
            fold_many0(
                alt((is_not("[]\\ \t\r\n"), quoted_pair, fws)),
                vec![b'['],
                |mut acc: Vec<u8>, item| {
                    acc.extend_from_slice(item);
                    acc
                },
            ),
            pair(tag("]"), cfws),
        ),
        |mut res| {
            res.push(b']');
            res
        },
    )(i)
}

// RFC 2822 3.4.1 domain, with the obsolete form encompassing dot-atom
fn domain(i: &[u8]) -> IResult<&[u8], Vec<Cow<[u8]>>> {
    alt((
        separated_nonempty_list(tag("."), map(atom, Cow::Borrowed)),
        map(domain_literal, |v| vec![Cow::Owned(v)]),
    ))(i)
}

// RFC 2822 3.4.1 address specification
fn addr_spec(i: &[u8]) -> IResult<&[u8], AddrSpec> {
    map(
        pair(local_part, preceded(tag("@"), domain)),
        |(local, domain)| AddrSpec { local, domain },
    )(i)
}

// RFC 2822 3.4 angle-delimited address
fn angle_addr(i: &[u8]) -> IResult<&[u8], AddrSpec> {
    delimited(pair(cfws, tag("<")), addr_spec, pair(tag(">"), cfws))(i)
}

// RFC 2822 3.4 mailbox
fn mailbox(i: &[u8]) -> IResult<&[u8], MailboxSpec> {
    alt((
        map(pair(opt(phrase), angle_addr), |(name, addr)| MailboxSpec {
            name: name.unwrap_or_default(),
            addr,
        }),
        map(addr_spec, |addr| MailboxSpec { name: vec![], addr }),
    ))(i)
}

// List delimiter, including the RFC 2822 4.4 obsolete empty elements
fn list_delim(i: &[u8]) -> IResult<&[u8], ()> {
    map(many1_count(tuple((cfws, tag(","), cfws))), |_| ())(i)
}

// RFC 2822 3.4 mailbox list
fn mailbox_list(i: &[u8]) -> IResult<&[u8], Vec<MailboxSpec>> {
    delimited(
        opt(list_delim),
        separated_nonempty_list(list_delim, mailbox),
        opt(list_delim),
    )(i)
}

// RFC 2822 3.4 group
fn group(i: &[u8]) -> IResult<&[u8], GroupSpec> {
    map(
        pair(
            terminated(phrase, tag(":")),
            terminated(opt(mailbox_list), tuple((cfws, tag(";"), cfws))),
        ),
        |(name, boxes)| GroupSpec {
            name,
            boxes: boxes.unwrap_or_default(),
        },
    )(i)
}

// RFC 2822 3.4 address
fn address(i: &[u8]) -> IResult<&[u8], Address> {
    alt((map(mailbox, Address::Mailbox), map(group, Address::Group)))(i)
}

// RFC 2822 3.4 address list
fn address_list(i: &[u8]) -> IResult<&[u8], Vec<Address>> {
    delimited(
        opt(list_delim),
        separated_nonempty_list(list_delim, address),
        opt(list_delim),
    )(i)
}

// ==================== RFC 2045 CONTENT HEADERS ====================

// RFC 2045 5.1 token: any US-ASCII CHAR except SPACE, CTLs, or tspecials
fn is_token_char(ch: u8) -> bool {
    ch > b' ' && ch < 0x7f && !b"()<>@,;:\\\"/[]?=".contains(&ch)
}

fn token(i: &[u8]) -> IResult<&[u8], &[u8]> {
    delimited(cfws, take_while1(is_token_char), cfws)(i)
}

// Parameter values are formally a token or quoted string. Agents routinely
// emit unquoted values containing tspecials (usually file names), so
// anything up to the next `;` is also accepted.
fn parameter_value(i: &[u8]) -> IResult<&[u8], Cow<[u8]>> {
    alt((
        quoted_string,
        map(is_not(";"), |v: &[u8]| Cow::Borrowed(trim(v))),
    ))(i)
}

fn parameter(i: &[u8]) -> IResult<&[u8], (String, String)> {
    map(
        tuple((token, tag("="), parameter_value)),
        |(name, _, value)| {
            (
                String::from_utf8_lossy(name).to_ascii_lowercase(),
                String::from_utf8_lossy(&value).into_owned(),
            )
        },
    )(i)
}

// Parsing stops quietly at the first malformed parameter.
fn parameters(i: &[u8]) -> IResult<&[u8], Vec<(String, String)>> {
    many0(preceded(pair(cfws, tag(";")), parameter))(i)
}

fn content_type(i: &[u8]) -> IResult<&[u8], ContentType> {
    map(
        tuple((token, tag("/"), token, parameters)),
        |(typ, _, subtype, parameters)| ContentType {
            typ: String::from_utf8_lossy(typ).to_ascii_lowercase(),
            subtype: String::from_utf8_lossy(subtype).to_ascii_lowercase(),
            parameters,
        },
    )(i)
}

fn content_disposition(i: &[u8]) -> IResult<&[u8], ContentDisposition> {
    map(pair(token, parameters), |(kind, parameters)| {
        ContentDisposition {
            kind: String::from_utf8_lossy(kind).to_ascii_lowercase(),
            parameters,
        }
    })(i)
}

/// `text` with every line break and other control character replaced by a
/// space, so that it cannot end the header line it is written into.
pub fn single_line(text: &str) -> Cow<str> {
    if text.chars().any(char::is_control) {
        Cow::Owned(
            text.chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect(),
        )
    } else {
        Cow::Borrowed(text)
    }
}
