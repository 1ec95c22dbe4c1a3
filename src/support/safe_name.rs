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

/// Whether `name` can be used as a folder directory name in the store.
pub fn is_safe_name(name: &str) -> bool {
    !name.is_empty() &&
        name.len() <= 64 &&
        // Block directory traversal through .. and creation of hidden files on
        // UNIX
        name.chars().next() != Some('.') &&
        name.find('/').is_none() &&
        // Only a path separator on Windows, but always block since it has high
        // potential of causing problems
        name.find('\\').is_none() &&
        // Folder names travel unescaped in redirect URLs
        name.find(|c: char| !c.is_ascii_alphanumeric() && c != '-' && c != '_')
            .is_none()
}

#[cfg(test)]
mod test {
    use super::is_safe_name;

    #[test]
    fn test_is_safe_name() {
        assert!(is_safe_name("Inbox"));
        assert!(is_safe_name("Drafts"));
        assert!(is_safe_name("old-mail_2"));
        assert!(!is_safe_name(""));
        assert!(!is_safe_name("."));
        assert!(!is_safe_name(".."));
        assert!(!is_safe_name(".hidden"));
        assert!(!is_safe_name("foo/bar"));
        assert!(!is_safe_name("/foo"));
        assert!(!is_safe_name("foo\\bar"));
        assert!(!is_safe_name("foo bar"));
        assert!(!is_safe_name("foo&page=2"));
        assert!(!is_safe_name("Entwürfe"));
        assert!(!is_safe_name("foo\0"));
        assert!(!is_safe_name(&"x".repeat(65)));
    }
}
