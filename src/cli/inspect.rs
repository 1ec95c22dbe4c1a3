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

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::sync::Arc;

use super::main::InspectSubcommand;
use crate::mime::part::MailPart;
use crate::support::sysexits::*;
use crate::webmail::render::render_text;

pub(super) fn inspect(cmd: InspectSubcommand) {
    let mut data = Vec::new();
    let result = if "-" == cmd.input.as_os_str() {
        io::stdin().lock().read_to_end(&mut data).map(|_| ())
    } else {
        fs::File::open(&cmd.input)
            .and_then(|mut f| f.read_to_end(&mut data))
            .map(|_| ())
    };

    if let Err(e) = result {
        let ex = if io::ErrorKind::NotFound == e.kind() {
            EX_NOINPUT
        } else {
            EX_IOERR
        };
        die!(ex, "Error reading '{}': {}", cmd.input.display(), e);
    }

    let part = MailPart::parse(Arc::new(data));
    print!("{}", format_tree(&part));
    if !cmd.tree_only {
        println!();
        print!("{}", render_text(&part));
    }
}

/// One line per part, children indented under their parent.
fn format_tree(root: &MailPart) -> String {
    let mut out = String::new();
    format_part(root, 0, &mut out);
    out
}

fn format_part(part: &MailPart, depth: usize, out: &mut String) {
    let _ = write!(
        out,
        "{:indent$}[{}] {} {} {}..{}",
        "",
        part.id,
        part.content_type.mime_type(),
        part.encoding.as_str(),
        part.begin,
        part.end,
        indent = depth * 2,
    );
    if let Some(ref charset) = part.charset {
        let _ = write!(out, " charset={}", charset);
    }
    if let Some(ref name) = part.name {
        let _ = write!(out, " \"{}\"", name);
    }
    out.push('\n');

    for child in &part.children {
        format_part(child, depth + 1, out);
    }
}
