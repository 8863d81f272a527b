//! User identity management.
//!
//! User resolution order:
//! 1) CLI --user (explicit)
//! 2) TW_USER environment variable
//! 3) Persisted value in `<data_dir>/user`
//! 4) Config default (default_user) or "unknown"

use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::{Error, Result};

const USER_FILENAME: &str = "user";

/// Resolve the current user using CLI, environment, persisted value,
/// and config.
pub fn resolve_user(data_dir: Option<&Path>, cli_user: Option<&str>) -> Result<String> {
    if let Some(user) = non_empty(cli_user) {
        return Ok(user.to_string());
    }

    if let Ok(env_user) = std::env::var("TW_USER") {
        if let Some(user) = non_empty(Some(env_user.as_str())) {
            return Ok(user.to_string());
        }
    }

    if let Some(dir) = data_dir {
        if let Some(user) = load_persisted_user(dir)? {
            return Ok(user);
        }

        let config = Config::load_from_dir(dir)?;
        return Ok(config.default_user);
    }

    Ok("unknown".to_string())
}

/// Persist the user identity in `<data_dir>/user`.
pub fn persist_user(data_dir: &Path, user: &str) -> Result<()> {
    let user = non_empty(Some(user))
        .ok_or_else(|| Error::InvalidArgument("user name cannot be empty".to_string()))?;

    std::fs::create_dir_all(data_dir)?;
    let path = user_path(data_dir);
    std::fs::write(path, format!("{user}\n"))?;
    Ok(())
}

/// Load the persisted user identity, if present.
pub fn load_persisted_user(data_dir: &Path) -> Result<Option<String>> {
    let path = user_path(data_dir);
    if !path.exists() {
        return Ok(None);
    }

    let raw = std::fs::read_to_string(path)?;
    let user = raw.trim();
    if user.is_empty() {
        return Ok(None);
    }

    Ok(Some(user.to_string()))
}

fn user_path(data_dir: &Path) -> PathBuf {
    data_dir.join(USER_FILENAME)
}

fn non_empty(input: Option<&str>) -> Option<&str> {
    input.and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed)
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn cli_user_wins() {
        let dir = TempDir::new().unwrap();
        persist_user(dir.path(), "stored").unwrap();

        let user = resolve_user(Some(dir.path()), Some("cli")).unwrap();
        assert_eq!(user, "cli");
    }

    #[test]
    fn persisted_user_round_trips() {
        let dir = TempDir::new().unwrap();
        assert!(load_persisted_user(dir.path()).unwrap().is_none());

        persist_user(dir.path(), "alice").unwrap();
        assert_eq!(
            load_persisted_user(dir.path()).unwrap().as_deref(),
            Some("alice")
        );

        let user = resolve_user(Some(dir.path()), None).unwrap();
        assert_eq!(user, "alice");
    }

    #[test]
    fn empty_user_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = persist_user(dir.path(), "   ").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn falls_back_to_config_default() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(crate::config::CONFIG_FILENAME),
            "default_user = \"team\"\n",
        )
        .unwrap();

        let user = resolve_user(Some(dir.path()), None).unwrap();
        assert_eq!(user, "team");
    }
}
