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

use std::io;

use super::error::Error;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct Sysexit(pub i32);

pub const EX_USAGE: Sysexit = Sysexit(64);
pub const EX_DATAERR: Sysexit = Sysexit(65);
pub const EX_NOINPUT: Sysexit = Sysexit(66);
pub const EX_SOFTWARE: Sysexit = Sysexit(70);
pub const EX_IOERR: Sysexit = Sysexit(74);
pub const EX_TEMPFAIL: Sysexit = Sysexit(75);
pub const EX_CONFIG: Sysexit = Sysexit(78);

impl Sysexit {
    pub fn exit(self) -> ! {
        std::process::exit(self.0)
    }

    /// The conventional exit status for a command that failed with `e`.
    pub fn for_error(e: &Error) -> Self {
        match *e {
            Error::Io(ref e) if io::ErrorKind::NotFound == e.kind() => {
                EX_NOINPUT
            }
            Error::Io(_) => EX_IOERR,
            Error::LockTimeout => EX_TEMPFAIL,
            Error::Toml(_) => EX_CONFIG,
            Error::UnsafeName | Error::BadAddress(_) => EX_USAGE,
            Error::Decoding(_) | Error::Base64(_) => EX_DATAERR,
            _ => EX_SOFTWARE,
        }
    }
}
