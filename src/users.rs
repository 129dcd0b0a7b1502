use crate::error::{Result, SupervisorError};

/// Resolve a user name to its numeric UID.
///
/// The system user database is consulted first. Names it does not know are
/// retried through `id -u`, which also sees NSS-provided users.
#[cfg(unix)]
pub fn lookup_uid(name: &str) -> Result<u32> {
    if name.is_empty() {
        return Err(SupervisorError::UserLookupError(
            "user name must not be empty".to_string(),
        ));
    }

    match nix::unistd::User::from_name(name) {
        Ok(Some(user)) => return Ok(user.uid.as_raw()),
        Ok(None) => {}
        Err(e) => tracing::debug!("User database lookup for {} failed: {}", name, e),
    }

    lookup_uid_with_id(name)
}

#[cfg(not(unix))]
pub fn lookup_uid(name: &str) -> Result<u32> {
    Err(SupervisorError::Unsupported(format!(
        "looking up user {name} is not supported on this platform"
    )))
}

#[cfg(unix)]
fn lookup_uid_with_id(name: &str) -> Result<u32> {
    let output = std::process::Command::new("id")
        .arg("-u")
        .arg(name)
        .output()
        .map_err(|e| SupervisorError::UserLookupError(format!("failed to run id -u {name}: {e}")))?;

    if !output.status.success() {
        return Err(SupervisorError::UserLookupError(format!(
            "unknown user {name}: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_uid(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| SupervisorError::UserLookupError(format!("id -u {name} printed no UID")))
}

fn parse_uid(output: &str) -> Option<u32> {
    output.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_uid() {
        assert_eq!(parse_uid("0\n"), Some(0));
        assert_eq!(parse_uid(" 1000 "), Some(1000));
        assert_eq!(parse_uid("-1\n"), None);
        assert_eq!(parse_uid(""), None);
        assert_eq!(parse_uid("root"), None);
    }

    #[cfg(unix)]
    #[test]
    fn test_lookup_root() {
        assert_eq!(lookup_uid("root").unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_lookup_unknown_user() {
        let err = lookup_uid("no-such-user-k0s-test").unwrap_err();
        assert!(matches!(err, SupervisorError::UserLookupError(_)));
    }

    #[test]
    fn test_lookup_empty_name() {
        assert!(lookup_uid("").is_err());
    }
}
