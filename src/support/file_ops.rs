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
use std::io::{self, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

/// Atomically write `data` to `path`, staging it in a temporary file under
/// `tmp`.
///
/// If `overwrite` is false and `path` already exists, this fails with
/// `AlreadyExists` and the existing file is untouched.
pub fn spit(
    tmp: impl AsRef<Path>,
    path: impl AsRef<Path>,
    overwrite: bool,
    mode: u32,
    data: &[u8],
) -> io::Result<()> {
    spit_with(tmp, path, overwrite, mode, |f| f.write_all(data))
}

/// Like `spit`, but the content is produced by `write` directly into the
/// staging file.
///
/// Nothing becomes visible at `path` unless `write` succeeds in full.
pub fn spit_with(
    tmp: impl AsRef<Path>,
    path: impl AsRef<Path>,
    overwrite: bool,
    mode: u32,
    write: impl FnOnce(&mut fs::File) -> io::Result<()>,
) -> io::Result<()> {
    let mut tf = tempfile::NamedTempFile::new_in(tmp)?;
    write(tf.as_file_mut())?;
    chmod(tf.path(), mode)?;
    tf.as_file_mut().sync_all()?;
    if overwrite {
        tf.persist(path)?;
    } else {
        tf.persist_noclobber(path)?;
    }
    Ok(())
}

pub fn chmod(path: impl AsRef<Path>, mode: u32) -> io::Result<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

pub trait IgnoreKinds {
    fn ignore_already_exists(self) -> Self;
    fn ignore_not_found(self) -> Self;
}

impl<R: Default> IgnoreKinds for Result<R, io::Error> {
    fn ignore_already_exists(self) -> Self {
        match self {
            Ok(r) => Ok(r),
            Err(e) if io::ErrorKind::AlreadyExists == e.kind() => {
                Ok(R::default())
            }
            Err(e) => Err(e),
        }
    }

    fn ignore_not_found(self) -> Self {
        match self {
            Ok(r) => Ok(r),
            Err(e) if io::ErrorKind::NotFound == e.kind() => Ok(R::default()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod test {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn spit_noclobber_leaves_existing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("target");

        spit(dir.path(), &path, false, 0o600, b"first").unwrap();
        let err = spit(dir.path(), &path, false, 0o600, b"second")
            .unwrap_err();
        assert_eq!(io::ErrorKind::AlreadyExists, err.kind());
        assert_eq!(b"first".to_vec(), fs::read(&path).unwrap());

        spit(dir.path(), &path, false, 0o600, b"third")
            .ignore_already_exists()
            .unwrap();
        assert_eq!(b"first".to_vec(), fs::read(&path).unwrap());

        spit(dir.path(), &path, true, 0o600, b"fourth").unwrap();
        assert_eq!(b"fourth".to_vec(), fs::read(&path).unwrap());
    }

    #[test]
    fn failed_writer_leaves_nothing_behind() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("target");

        let err = spit_with(dir.path(), &path, false, 0o600, |f| {
            f.write_all(b"partial")?;
            Err(io::Error::new(io::ErrorKind::Other, "disk full"))
        })
        .unwrap_err();
        assert_eq!(io::ErrorKind::Other, err.kind());
        assert!(!path.exists());
        assert_eq!(0, fs::read_dir(dir.path()).unwrap().count());
    }

    #[test]
    fn ignore_not_found_only_ignores_not_found() {
        let dir = TempDir::new().unwrap();
        fs::remove_file(dir.path().join("nx")).ignore_not_found().unwrap();
        assert!(fs::remove_file(dir.path()).ignore_not_found().is_err());
    }
}
