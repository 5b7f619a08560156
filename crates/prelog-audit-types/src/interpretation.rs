//! Event interpretations.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// The fixed vocabulary naming what kind of operation an event records.
///
/// Each term is the lowercase name of the intercepted operation, so a log
/// reader can tell `openat64` apart from `open` without extra fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumIter, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Interpretation {
    // Open / create
    Creat,
    Open,
    Openat,
    Open64,
    Openat64,
    Mkfifo,
    Mkfifoat,
    Mkdir,
    Mkdirat,

    // Buffered streams
    Fopen,
    Freopen,
    Popen,
    Fdopen,

    // Duplication
    Dup,
    Dup2,
    Dup3,

    // Links
    Link,
    Linkat,
    Symlink,
    Symlinkat,

    // Renames
    Rename,
    Renameat,
    Renameat2,

    // Removal
    Unlink,
    Rmdir,
    Remove,

    // Closing
    Close,
    Fclose,
    Pclose,
    Closedir,

    // Process lifecycle
    Fork,

    // Directory streams
    Opendir,
    Fdopendir,

    // Sockets, pipes and shared memory
    Socket,
    Socketpair,
    Pipe,
    Pipe2,
    #[serde(rename = "shm_open")]
    #[strum(serialize = "shm_open")]
    ShmOpen,
    #[serde(rename = "shm_unlink")]
    #[strum(serialize = "shm_unlink")]
    ShmUnlink,
}

impl Interpretation {
    /// The term as written to the log.
    pub fn as_str(&self) -> &'static str {
        (*self).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;
    use test_case::test_case;

    #[test_case(Interpretation::Open, "open")]
    #[test_case(Interpretation::Openat64, "openat64")]
    #[test_case(Interpretation::Renameat2, "renameat2")]
    #[test_case(Interpretation::Dup3, "dup3")]
    #[test_case(Interpretation::ShmOpen, "shm_open")]
    #[test_case(Interpretation::ShmUnlink, "shm_unlink")]
    #[test_case(Interpretation::Fdopendir, "fdopendir")]
    fn test_log_term(interpretation: Interpretation, term: &str) {
        assert_eq!(interpretation.as_str(), term);
        assert_eq!(interpretation.to_string(), term);
        assert_eq!(Interpretation::from_str(term).unwrap(), interpretation);
    }

    #[test]
    fn test_serde_matches_log_term() {
        for interpretation in Interpretation::iter() {
            let json = serde_json::to_string(&interpretation).unwrap();
            assert_eq!(json, format!("\"{}\"", interpretation.as_str()));
        }
    }
}
