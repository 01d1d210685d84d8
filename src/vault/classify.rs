//! Classification of remote store failures.
//!
//! The store reports conflicts only as error text, with no structured code.
//! The substrings below are the only place in the crate that inspects remote
//! error messages; a wording change upstream degrades these conflicts into
//! plain store errors.

use crate::errors::Error;

const CAS_MISMATCH: &str = "check-and-set parameter did not match the current version";
const PATH_IN_USE: &str = "path is already in use";

/// Conflict the store reported through its error text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteConflict {
    /// A check-and-set write found a different current version
    CasMismatch,
    /// A mount already exists at the requested path
    PathInUse,
}

pub fn conflict_signature(error: &Error) -> Option<RemoteConflict> {
    let Error::Store { status: Some(_), message } = error else {
        return None;
    };
    if message.contains(CAS_MISMATCH) {
        Some(RemoteConflict::CasMismatch)
    } else if message.contains(PATH_IN_USE) {
        Some(RemoteConflict::PathInUse)
    } else {
        None
    }
}

pub fn is_cas_mismatch(error: &Error) -> bool {
    conflict_signature(error) == Some(RemoteConflict::CasMismatch)
}

pub fn is_path_in_use(error: &Error) -> bool {
    conflict_signature(error) == Some(RemoteConflict::PathInUse)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signatures() {
        let cas = Error::store(
            Some(400),
            "check-and-set parameter did not match the current version",
        );
        assert_eq!(conflict_signature(&cas), Some(RemoteConflict::CasMismatch));

        let mount = Error::store(Some(400), "path is already in use at secrets/kv/");
        assert!(is_path_in_use(&mount));

        assert_eq!(conflict_signature(&Error::store(Some(403), "permission denied")), None);
    }

    #[test]
    fn test_only_remote_responses_classified() {
        let local = Error::validation("check-and-set parameter did not match the current version");
        assert!(!is_cas_mismatch(&local));

        let transport = Error::store(None, "path is already in use");
        assert!(!is_path_in_use(&transport));
    }
}
