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
use std::sync::{Arc, Mutex};

/// A shared, mutable prefix for log lines.
///
/// Clones share the same state, so a prefix handed to a background thread
/// picks up the user name once the session learns it.
#[derive(Clone)]
pub struct LogPrefix {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Clone)]
struct Inner {
    component: String,
    session: Option<String>,
    user: Option<String>,
    folder: Option<String>,
}

impl LogPrefix {
    pub fn new(component: String) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                component,
                session: None,
                user: None,
                folder: None,
            })),
        }
    }

    pub fn deep_clone(&self) -> Self {
        let inner = self.inner.lock().unwrap();
        Self {
            inner: Arc::new(Mutex::new(Inner::clone(&inner))),
        }
    }

    /// A detached copy of this prefix tagged with `folder`.
    pub fn for_folder(&self, folder: &str) -> Self {
        let copy = self.deep_clone();
        copy.inner.lock().unwrap().folder = Some(sanitise(folder.to_owned()));
        copy
    }

    pub fn set_session(&self, session: String) {
        self.inner.lock().unwrap().session = Some(sanitise(session));
    }

    pub fn set_user(&self, user: String) {
        self.inner.lock().unwrap().user = Some(sanitise(user));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        write!(f, "{}", inner.component)?;
        if let Some(ref session) = inner.session {
            write!(f, "[{}]", session)?;
        }
        if let Some(ref user) = inner.user {
            write!(f, "[{}]", user)?;
        }
        if let Some(ref folder) = inner.folder {
            write!(f, "/{}", folder)?;
        }
        Ok(())
    }
}

fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(64) {
        s.truncate(truncate_len);
    }

    s
}
