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

//! What the session state machine hands to the rendering layer.
//!
//! Every page is described by a fresh view-model built for that one
//! response; nothing here is kept in the session.

use super::folder::Sort;
use super::render::Segment;
use super::state::State;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Send the browser to this query string of the webmail page.
    Redirect(String),
    Page(Page),
    Download(Download),
    NotFound(String),
}

impl Response {
    pub fn redirect(target: impl ToString) -> Self {
        Response::Redirect(target.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Download {
    pub content_type: String,
    pub file_name: String,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Page {
    pub state: State,
    pub subtitle: String,
    /// Token to embed in every form of the page.
    pub nonce: String,
    pub errors: Vec<String>,
    pub info: Vec<String>,
    pub body: PageBody,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PageBody {
    Auth(AuthView),
    Loading(LoadingView),
    List(FolderView),
    Show(MessageView),
    New(ComposeView),
    Config(ConfigView),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthView {
    /// If set, only user name and password are asked for.
    pub fixed_ports: bool,
    pub host: String,
    pub pop3_port: u16,
    pub smtp_port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoadingView {
    pub folders: Vec<String>,
    /// Where the page should poll.
    pub refresh: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderSummary {
    pub name: String,
    pub messages: usize,
    pub new_messages: usize,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderItem {
    pub uidl: String,
    pub b64uidl: String,
    pub sender: String,
    pub subject: String,
    pub date: String,
    pub size: u64,
    pub is_new: bool,
    pub is_spam: bool,
    /// Whether the header is known yet.
    pub loaded: bool,
    pub checked: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FolderView {
    pub folder: String,
    pub folders: Vec<FolderSummary>,
    pub sort: Sort,
    pub page: usize,
    pub pages: usize,
    pub page_size: usize,
    pub items: Vec<FolderItem>,
    /// Ask whether the checked messages should really be deleted.
    pub really_delete: bool,
    pub offline: bool,
    pub checking: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageView {
    pub folder: String,
    pub uidl: String,
    pub b64uidl: String,
    pub sender: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub date: String,
    pub prev: Option<String>,
    pub next: Option<String>,
    /// Ask whether this message should really be deleted.
    pub ask_delete: bool,
    pub spam: bool,
    /// The body, or empty if it could not be fetched.
    pub segments: Vec<Segment>,
    pub complete: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttachmentItem {
    pub id: String,
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComposeView {
    pub draft: String,
    pub from: String,
    pub sender_fixed: bool,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub text: String,
    pub bcc_to_self: bool,
    pub attachments: Vec<AttachmentItem>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfigView {
    pub text: String,
    pub path: String,
}
