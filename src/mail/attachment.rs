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

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::warn;

use crate::mime::model::TransferEncoding;
use crate::support::file_ops::IgnoreKinds;

/// Prefix of the names of attachment files in the attachment directory.
pub const ATTACHMENT_FILE_PREFIX: &str = "att-";

/// A file attached to a draft.
///
/// The content lives in a file of its own in the attachment directory. The
/// `Attachment` owns that file: removing the attachment from its draft, or
/// discarding or sending the draft, must call `delete_data`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Attachment {
    file_name: String,
    content_type: String,
    transfer_encoding: TransferEncoding,
    path: PathBuf,
}

impl Attachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        transfer_encoding: TransferEncoding,
        path: impl Into<PathBuf>,
    ) -> Self {
        Attachment {
            file_name: file_name.into(),
            content_type: content_type.into(),
            transfer_encoding,
            path: path.into(),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn transfer_encoding(&self) -> &TransferEncoding {
        &self.transfer_encoding
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A stable identifier for selecting this attachment in forms, derived
    /// from the backing file name.
    pub fn id(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Size of the (unencoded) content, or 0 if the file is gone.
    pub fn size(&self) -> u64 {
        fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
    }

    /// Read the unencoded content.
    pub fn read_data(&self) -> io::Result<Vec<u8>> {
        fs::read(&self.path)
    }

    /// Remove the backing file. A file which is already gone is not an
    /// error.
    pub fn delete_data(&self) {
        if let Err(e) = fs::remove_file(&self.path).ignore_not_found() {
            warn!(
                "Failed to remove attachment file {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
