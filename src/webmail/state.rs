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

use std::fmt;

/// The page a session is on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Not logged in.
    Auth,
    /// Logged in, but some folder is still being read from disk.
    Loading,
    /// Looking at the list of one folder.
    List,
    /// Looking at one message.
    Show,
    /// Composing a message.
    New,
    /// Editing the configuration.
    Config,
}

impl State {
    pub fn as_str(self) -> &'static str {
        match self {
            State::Auth => "auth",
            State::Loading => "loading",
            State::List => "list",
            State::Show => "show",
            State::New => "new",
            State::Config => "config",
        }
    }

    pub fn is_authenticated(self) -> bool {
        State::Auth != self
    }
}

impl Default for State {
    fn default() -> Self {
        State::Auth
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
