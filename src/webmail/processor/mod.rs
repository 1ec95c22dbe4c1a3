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

//! The webmail session state machine.
//!
//! This module is split into several submodules for manageability, but is
//! best thought of as one single module: every submodule adds handlers to
//! `Webmail`.

// These are macros since a method would borrow the whole `Session` rather
// than just its account.
macro_rules! account {
    ($session:expr) => {
        match $session.account {
            Some(ref account) => account,
            None => return Response::redirect(Query::new()),
        }
    };
}

macro_rules! folder {
    ($session:expr, $name:expr) => {
        match account!($session).folder($name) {
            Some(folder) => ::std::sync::Arc::clone(folder),
            None => return Response::redirect(Query::new()),
        }
    };
}

mod auth;
mod commands;
mod compose;
mod config;
mod defs;
mod listing;
mod message;

#[cfg(test)]
mod fixture;

pub use self::defs::Webmail;
