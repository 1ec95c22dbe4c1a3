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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsafe folder name")]
    UnsafeName,
    #[error("Folder not loaded")]
    FolderNotLoaded,
    #[error("Timed out waiting for the account lock")]
    LockTimeout,
    #[error("Message not found")]
    NxMessage,
    #[error("Invalid address: {0}")]
    BadAddress(String),
    #[error("Decoding failed: {0}")]
    Decoding(String),
    #[error("Not connected to the mail server")]
    Offline,
    #[error("Mail server error: {0}")]
    Source(String),
    #[error("Upload exceeds the maximum message size")]
    UploadTooLarge,
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}
