//! Reading the keys of a batch from a line-oriented source.
//!
//! Every non-blank line holds one key. Surrounding whitespace is ignored and
//! lines starting with `#` are comments. Duplicates are dropped, keeping the
//! first occurrence, so the resulting order is the input order.

use std::{
    collections::HashSet,
    fmt::Display,
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
};

use serde::Serialize;

use crate::{Fields, Key, Request, Result};

const STDIN: &str = "-";

/// Where the keys of a batch come from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeySource {
    /// A file with one key per line
    FsPath(PathBuf),
    /// Standard input
    Stdin,
}

impl KeySource {
    /// Interpret a command line argument; `-` stands for standard input
    #[must_use]
    pub fn new(value: &str) -> Self {
        if value == STDIN {
            Self::Stdin
        } else {
            Self::FsPath(PathBuf::from(value))
        }
    }

    /// Read all keys from this source
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be opened or read.
    pub fn read_keys(&self) -> Result<Vec<Key>> {
        match self {
            Self::FsPath(path) => {
                let file = File::open(path).map_err(|e| (path.clone(), e))?;
                read_keys(BufReader::new(file)).map_err(|e| match e {
                    crate::ErrorKind::IoError(None, e) => (path.clone(), e).into(),
                    e => e,
                })
            }
            Self::Stdin => read_keys(io::stdin().lock()),
        }
    }
}

impl Display for KeySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FsPath(path) => write!(f, "{}", path.display()),
            Self::Stdin => f.write_str("stdin"),
        }
    }
}

impl Serialize for KeySource {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

/// Read the unique keys of `reader`, in input order
///
/// # Errors
///
/// Returns an error if reading fails.
pub fn read_keys<R: BufRead>(reader: R) -> Result<Vec<Key>> {
    let mut keys = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim_start().starts_with('#') {
            continue;
        }
        keys.extend(Key::new(&line));
    }
    Ok(unique_keys(keys))
}

/// Drop repeated keys, keeping the first occurrence of each
pub fn unique_keys<I>(keys: I) -> Vec<Key>
where
    I: IntoIterator<Item = Key>,
{
    let mut seen = HashSet::new();
    keys.into_iter()
        .filter(|key| seen.insert(key.clone()))
        .collect()
}

/// Turn keys into requests sharing the same field selector
pub fn requests<I>(keys: I, fields: Option<&Fields>) -> impl Iterator<Item = Request>
where
    I: IntoIterator<Item = Key>,
{
    let fields = fields.cloned();
    keys.into_iter()
        .map(move |key| Request::new(key, fields.clone()))
}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::NamedTempFile;

    use super::*;
    use crate::ErrorKind;

    fn strings(keys: &[Key]) -> Vec<&str> {
        keys.iter().map(Key::as_str).collect()
    }

    #[test]
    fn test_keys_are_trimmed_and_deduplicated() {
        let input = "id1\nid2\nid1\n id3 \n";
        let keys = read_keys(Cursor::new(input)).unwrap();
        assert_eq!(strings(&keys), vec!["id1", "id2", "id3"]);
    }

    #[test]
    fn test_blank_lines_and_comments_are_skipped() {
        let input = "\n# exported from the shared drive\nabc\n   \n\t\n  # abc\nabc \r\ndef";
        let keys = read_keys(Cursor::new(input)).unwrap();
        assert_eq!(strings(&keys), vec!["abc", "def"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(read_keys(Cursor::new("")).unwrap().is_empty());
    }

    #[rstest]
    #[case("-", KeySource::Stdin)]
    #[case("ids.txt", KeySource::FsPath(PathBuf::from("ids.txt")))]
    fn test_key_source(#[case] value: &str, #[case] expected: KeySource) {
        assert_eq!(KeySource::new(value), expected);
    }

    #[test]
    fn test_read_keys_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "b\na\nb").unwrap();

        let keys = KeySource::FsPath(file.path().to_path_buf())
            .read_keys()
            .unwrap();
        assert_eq!(strings(&keys), vec!["b", "a"]);
    }

    #[test]
    fn test_missing_file() {
        let source = KeySource::new("/this/path/does/not/exist.txt");
        assert!(matches!(
            source.read_keys(),
            Err(ErrorKind::IoError(Some(_), _))
        ));
    }

    #[test]
    fn test_requests_share_fields() {
        let fields = Fields::new("id,name");
        let keys = unique_keys([Key::new("a").unwrap(), Key::new("b").unwrap()]);
        let requests: Vec<_> = requests(keys, fields.as_ref()).collect();

        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.fields == fields));
    }
}
