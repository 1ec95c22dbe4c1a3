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

//! Ordering and paging of folder listings.

use std::cmp::Ordering;
use std::fmt;
use std::ops::Range;

use crate::mail::mail::Mail;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortKey {
    Date,
    Sender,
    Subject,
    Size,
}

/// A listing order.
///
/// The natural direction of every key puts the most interesting messages
/// first: newest, largest, or last in the alphabet. `reversed` flips that.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Sort {
    pub key: SortKey,
    pub reversed: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Sort {
            key: SortKey::Date,
            reversed: false,
        }
    }
}

impl Sort {
    /// Parse `date`, `-date`, `sender`, and so on.
    pub fn parse(s: &str) -> Option<Self> {
        let (reversed, name) = match s.strip_prefix('-') {
            Some(name) => (true, name),
            None => (false, s),
        };

        let key = match name {
            "date" => SortKey::Date,
            "sender" => SortKey::Sender,
            "subject" => SortKey::Subject,
            "size" => SortKey::Size,
            _ => return None,
        };

        Some(Sort { key, reversed })
    }

    pub fn is_default(self) -> bool {
        Sort::default() == self
    }

    /// Sort `mails` in place.
    ///
    /// Messages whose header is not known yet always come last. Ties are
    /// broken by date, newest first, and then by uidl.
    pub fn apply(self, mails: &mut [Mail]) {
        mails.sort_by(|a, b| {
            b.has_header()
                .cmp(&a.has_header())
                .then_with(|| {
                    let natural = self.natural_order(a, b);
                    if self.reversed {
                        natural.reverse()
                    } else {
                        natural
                    }
                })
                .then_with(|| b.date.cmp(&a.date))
                .then_with(|| a.uidl.cmp(&b.uidl))
        });
    }

    fn natural_order(self, a: &Mail, b: &Mail) -> Ordering {
        match self.key {
            SortKey::Date => b.date.cmp(&a.date),
            SortKey::Size => b.size.cmp(&a.size),
            SortKey::Sender => sender_key(b).cmp(&sender_key(a)),
            SortKey::Subject => subject_key(b).cmp(&subject_key(a)),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.reversed {
            f.write_str("-")?;
        }
        f.write_str(match self.key {
            SortKey::Date => "date",
            SortKey::Sender => "sender",
            SortKey::Subject => "subject",
            SortKey::Size => "size",
        })
    }
}

fn sender_key(mail: &Mail) -> String {
    mail.sender
        .chars()
        .filter(|&c| '"' != c && '<' != c && '>' != c)
        .collect::<String>()
        .trim()
        .to_lowercase()
}

fn subject_key(mail: &Mail) -> String {
    let mut subject = mail.subject.trim().to_lowercase();
    loop {
        let stripped = ["re:", "fwd:", "fw:"]
            .iter()
            .find_map(|prefix| subject.strip_prefix(prefix))
            .map(|rest| rest.trim_start().to_owned());
        match stripped {
            Some(rest) => subject = rest,
            None => return subject,
        }
    }
}

/// Which page of a listing is shown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Pager {
    pub page_size: usize,
    /// Number of pages, at least 1.
    pub pages: usize,
    /// Current page, starting at 1.
    pub page: usize,
}

impl Pager {
    /// Page `page` of `items` items, clamped into range.
    pub fn new(items: usize, page_size: usize, page: usize) -> Self {
        let page_size = page_size.max(1);
        let pages = ((items + page_size - 1) / page_size).max(1);
        Pager {
            page_size,
            pages,
            page: page.max(1).min(pages),
        }
    }

    /// The indices of the items on the current page.
    pub fn range(&self, items: usize) -> Range<usize> {
        let start = ((self.page - 1) * self.page_size).min(items);
        start..(start + self.page_size).min(items)
    }

    pub fn prev(&self) -> usize {
        self.page.saturating_sub(1).max(1)
    }

    pub fn next(&self) -> usize {
        (self.page + 1).min(self.pages)
    }
}

/// The items before and after `uidl` in `order`.
pub fn neighbours<'a>(
    order: &'a [String],
    uidl: &str,
) -> (Option<&'a str>, Option<&'a str>) {
    match order.iter().position(|u| u == uidl) {
        Some(ix) => (
            ix.checked_sub(1).map(|p| order[p].as_str()),
            order.get(ix + 1).map(String::as_str),
        ),
        None => (None, None),
    }
}
