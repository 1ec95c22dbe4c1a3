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

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::source::Connector;
use crate::support::{log_prefix::LogPrefix, system_config::SystemConfig};
use crate::webmail::session::SessionRegistry;

/// How long a login waits for the folders to load before falling back to the
/// loading page.
pub(super) const LOADING_WAIT: Duration = Duration::from_secs(5);

/// Query parameters identifying the view of a GET request.
pub(super) const FOLDER: &str = "folder";
pub(super) const PAGE: &str = "page";
pub(super) const SORT: &str = "sort";
pub(super) const SHOW: &str = "show";
pub(super) const COMPOSE: &str = "compose";
pub(super) const ASK_DELETE: &str = "ask_delete";
pub(super) const DOWNLOAD: &str = "download";
pub(super) const SAVE_AS: &str = "saveas";

/// Form fields.
pub(super) const B64UIDL: &str = "b64uidl";
pub(super) const DRAFT: &str = "draft";
pub(super) const USER: &str = "user";
pub(super) const PASSWORD: &str = "pass";
pub(super) const HOST: &str = "host";
pub(super) const POP3_PORT: &str = "pop3";
pub(super) const SMTP_PORT: &str = "smtp";
pub(super) const PAGE_SIZE: &str = "page_size";
pub(super) const FROM: &str = "from";
pub(super) const TO: &str = "to";
pub(super) const CC: &str = "cc";
pub(super) const BCC: &str = "bcc";
pub(super) const SUBJECT: &str = "subject";
pub(super) const BODY: &str = "body";
pub(super) const BCC_TO_SELF: &str = "bcc_to_self";

/// Drives the webmail sessions of one installation.
///
/// Requests of one session are handled strictly one at a time; requests of
/// different sessions run in parallel.
pub struct Webmail {
    pub(super) log_prefix: LogPrefix,
    pub(super) root: PathBuf,
    pub(super) config: Mutex<Arc<SystemConfig>>,
    pub(super) connector: Arc<dyn Connector>,
    pub(super) registry: SessionRegistry,
}
