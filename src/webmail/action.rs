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

//! Classification of form submissions.
//!
//! Every form button is a named submit field; which one the browser sent
//! tells us what the user asked for.

use super::request::Request;

pub const LOGIN: &str = "login";
pub const OFFLINE: &str = "offline";
pub const LOGOUT: &str = "logout";
pub const REFRESH: &str = "refresh";
pub const CONFIGURE: &str = "configure";
pub const SAVE_CONFIG: &str = "save";
pub const CANCEL: &str = "cancel";
pub const NEW: &str = "new";
pub const REPLY: &str = "reply";
pub const REPLY_ALL: &str = "replyall";
pub const FORWARD: &str = "forward";
pub const DELETE: &str = "delete";
pub const REALLY_DELETE: &str = "really_delete";
pub const SEND: &str = "send";
pub const SAVE_DRAFT: &str = "savedraft";
pub const UPLOAD: &str = "new_upload";
pub const DELETE_ATTACHMENT: &str = "delete_attachment";
pub const FIRST_PAGE: &str = "firstpage";
pub const PREV_PAGE: &str = "prevpage";
pub const NEXT_PAGE: &str = "nextpage";
pub const LAST_PAGE: &str = "lastpage";
pub const SET_PAGE_SIZE: &str = "setpagesize";
pub const MARK_ALL: &str = "markall";
pub const CLEAR: &str = "clearselection";
pub const INVERT: &str = "invertselection";
pub const PREV: &str = "prev";
pub const NEXT: &str = "next";
pub const LIST: &str = "list";

/// Field holding the text of the configuration editor. Its presence is what
/// distinguishes the configuration form from the compose form, which shares
/// the cancel button.
pub const CONFIG_TEXT: &str = "config_text";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    Login,
    Offline,
    Logout,
    Refresh,
    Configure,
    SaveConfig,
    Cancel,
    New,
    Reply,
    ReplyAll,
    Forward,
    Delete,
    ReallyDelete,
    Send,
    SaveDraft,
    Upload,
    DeleteAttachment,
    FirstPage,
    PrevPage,
    NextPage,
    LastPage,
    SetPageSize,
    MarkAll,
    Clear,
    Invert,
    Prev,
    Next,
    List,
}

/// Buttons in order of precedence, for the odd browser which submits more
/// than one.
static BUTTONS: &[(&str, Action)] = &[
    (LOGOUT, Action::Logout),
    (LOGIN, Action::Login),
    (OFFLINE, Action::Offline),
    (SEND, Action::Send),
    (SAVE_DRAFT, Action::SaveDraft),
    (UPLOAD, Action::Upload),
    (DELETE_ATTACHMENT, Action::DeleteAttachment),
    (SAVE_CONFIG, Action::SaveConfig),
    (CANCEL, Action::Cancel),
    (REFRESH, Action::Refresh),
    (NEW, Action::New),
    (REPLY_ALL, Action::ReplyAll),
    (REPLY, Action::Reply),
    (FORWARD, Action::Forward),
    (REALLY_DELETE, Action::ReallyDelete),
    (DELETE, Action::Delete),
    (PREV, Action::Prev),
    (NEXT, Action::Next),
    (LIST, Action::List),
    (FIRST_PAGE, Action::FirstPage),
    (PREV_PAGE, Action::PrevPage),
    (NEXT_PAGE, Action::NextPage),
    (LAST_PAGE, Action::LastPage),
    (SET_PAGE_SIZE, Action::SetPageSize),
    (MARK_ALL, Action::MarkAll),
    (CLEAR, Action::Clear),
    (INVERT, Action::Invert),
];

impl Action {
    /// Determine the action requested by a form submission.
    pub fn classify(request: &Request) -> Option<Action> {
        for &(name, action) in BUTTONS {
            if !request.has(name) {
                continue;
            }

            if Action::SaveConfig == action
                && request.param(CONFIG_TEXT).is_none()
            {
                continue;
            }

            return Some(action);
        }

        // The configure link carries no value
        if request.param(CONFIGURE).is_some() {
            return Some(Action::Configure);
        }

        None
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification() {
        assert_eq!(None, Action::classify(&Request::post(&[])));
        assert_eq!(
            Some(Action::Send),
            Action::classify(&Request::post(&[(SEND, "Send")]))
        );
        assert_eq!(
            Some(Action::ReplyAll),
            Action::classify(&Request::post(&[
                (REPLY, "Reply"),
                (REPLY_ALL, "Reply all")
            ]))
        );
        assert_eq!(
            Some(Action::Logout),
            Action::classify(&Request::post(&[
                (DELETE, "x"),
                (LOGOUT, "x")
            ]))
        );
        assert_eq!(
            None,
            Action::classify(&Request::post(&[(DELETE, "")]))
        );
    }

    #[test]
    fn save_needs_config_text() {
        assert_eq!(
            None,
            Action::classify(&Request::post(&[(SAVE_CONFIG, "Save")]))
        );
        assert_eq!(
            Some(Action::SaveConfig),
            Action::classify(&Request::post(&[
                (SAVE_CONFIG, "Save"),
                (CONFIG_TEXT, "")
            ]))
        );
    }

    #[test]
    fn configure_link_has_no_value() {
        assert_eq!(
            Some(Action::Configure),
            Action::classify(&Request::get(&[(CONFIGURE, "")]))
        );
    }
}
