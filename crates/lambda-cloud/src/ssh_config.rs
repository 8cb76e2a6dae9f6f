//! `~/.ssh/config` entries for launched instances.
//!
//! Entries written here are preceded by a marker comment so they can be found
//! and removed again without touching hand-written hosts.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::providers::traits::Instance;

/// Prefix of the comment line that marks a managed entry.
const ENTRY_MARKER: &str = "# Lambda Cloud instance";

/// Login user on Lambda Cloud images.
const DEFAULT_USER: &str = "ubuntu";

/// SSH config errors.
#[derive(Error, Debug)]
pub enum SshConfigError {
    /// Reading or writing the config failed.
    #[error("SSH config I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The home directory could not be determined.
    #[error("Could not determine home directory")]
    NoHomeDir,

    /// The instance has no public IP yet.
    #[error("Instance {0} has no IP address")]
    NoIpAddress(String),

    /// A `Host` with this alias already exists.
    #[error("SSH config entry '{0}' already exists")]
    DuplicateAlias(String),
}

/// Handle on an SSH client config file.
pub struct SshConfig {
    path: PathBuf,
}

impl SshConfig {
    /// Use the config file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `~/.ssh/config`.
    ///
    /// # Errors
    /// Returns [`SshConfigError::NoHomeDir`] if no home directory is known.
    pub fn user_default() -> Result<Self, SshConfigError> {
        let home = dirs::home_dir().ok_or(SshConfigError::NoHomeDir)?;
        Ok(Self::new(home.join(".ssh").join("config")))
    }

    /// Path of the config file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Alias used when the caller does not pick one.
    #[must_use]
    pub fn default_alias(instance: &Instance) -> String {
        let short: String = instance.id.chars().take(8).collect();
        format!("lambda-{short}")
    }

    /// Append a `Host` entry for `instance`, returning the alias used.
    ///
    /// # Errors
    /// Fails if the instance has no IP, the alias is taken, or on I/O errors.
    pub fn add(&self, instance: &Instance, alias: Option<&str>) -> Result<String, SshConfigError> {
        let ip = instance
            .ip
            .as_deref()
            .filter(|ip| !ip.is_empty())
            .ok_or_else(|| SshConfigError::NoIpAddress(instance.id.clone()))?;

        let alias = alias
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map_or_else(|| Self::default_alias(instance), str::to_string);

        let mut content = self.read()?;
        if content
            .lines()
            .any(|line| line.trim() == format!("Host {alias}"))
        {
            return Err(SshConfigError::DuplicateAlias(alias));
        }

        if !content.is_empty() {
            if !content.ends_with('\n') {
                content.push('\n');
            }
            content.push('\n');
        }
        let entry = [
            format!("{ENTRY_MARKER} {}", instance.id),
            format!("Host {alias}"),
            format!("    HostName {ip}"),
            format!("    User {DEFAULT_USER}"),
            "    ForwardAgent yes".to_string(),
            "    StrictHostKeyChecking no".to_string(),
            "    UserKnownHostsFile /dev/null".to_string(),
        ];
        content.push_str(&entry.join("\n"));
        content.push('\n');

        self.write(&content)?;
        info!(alias = %alias, path = %self.path.display(), "Added SSH config entry");
        Ok(alias)
    }

    /// Remove every managed entry, returning how many were removed.
    ///
    /// # Errors
    /// Returns error on I/O failure.
    pub fn remove_all(&self) -> Result<usize, SshConfigError> {
        let content = self.read()?;
        let mut kept: Vec<&str> = Vec::new();
        let mut removed = 0;
        let mut in_entry = false;
        let mut seen_host = false;

        for line in content.lines() {
            let trimmed = line.trim();

            if trimmed.starts_with(ENTRY_MARKER) {
                // Drop the blank separator written before the entry.
                if kept.last().is_some_and(|l| l.trim().is_empty()) {
                    kept.pop();
                }
                in_entry = true;
                seen_host = false;
                removed += 1;
                continue;
            }

            if in_entry {
                let is_host = trimmed.starts_with("Host ");
                if is_host && !seen_host {
                    seen_host = true;
                    continue;
                }
                let ends_entry = trimmed.is_empty()
                    || is_host
                    || trimmed.starts_with("Match ")
                    || trimmed.starts_with('#');
                if !ends_entry {
                    continue;
                }
                in_entry = false;
            }

            kept.push(line);
        }

        if removed == 0 {
            debug!(path = %self.path.display(), "No managed SSH config entries found");
            return Ok(0);
        }

        let mut rewritten = kept.join("\n");
        if !rewritten.is_empty() {
            rewritten.push('\n');
        }
        self.write(&rewritten)?;
        info!(removed, path = %self.path.display(), "Removed SSH config entries");
        Ok(removed)
    }

    fn read(&self) -> Result<String, SshConfigError> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(String::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, content: &str) -> Result<(), SshConfigError> {
        if let Some(dir) = self.path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir)?;
                set_mode(dir, 0o700)?;
            }
        }
        fs::write(&self.path, content)?;
        set_mode(&self.path, 0o600)?;
        Ok(())
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::instance;

    fn config_in(dir: &tempfile::TempDir) -> SshConfig {
        SshConfig::new(dir.path().join(".ssh").join("config"))
    }

    #[test]
    fn test_add_creates_file_with_entry() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        let alias = config.add(&instance("0920582c7ff0"), None).unwrap();

        assert_eq!(alias, "lambda-0920582c");
        let content = fs::read_to_string(config.path()).unwrap();
        assert!(content.starts_with("# Lambda Cloud instance 0920582c7ff0\nHost lambda-0920582c\n"));
        assert!(content.contains("    HostName 198.51.100.7\n"));
        assert!(content.contains("    User ubuntu\n"));
    }

    #[cfg(unix)]
    #[test]
    fn test_add_sets_private_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        config.add(&instance("abc"), Some("gpu-box")).unwrap();

        let mode = fs::metadata(config.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
        let dir_mode = fs::metadata(config.path().parent().unwrap())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o777, 0o700);
    }

    #[test]
    fn test_duplicate_alias_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        config.add(&instance("abc"), Some("gpu-box")).unwrap();

        let err = config.add(&instance("def"), Some("gpu-box")).unwrap_err();
        assert!(matches!(err, SshConfigError::DuplicateAlias(a) if a == "gpu-box"));
    }

    #[test]
    fn test_instance_without_ip_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut booting = instance("abc");
        booting.ip = None;

        let err = config_in(&dir).add(&booting, None).unwrap_err();
        assert!(matches!(err, SshConfigError::NoIpAddress(_)));
    }

    #[test]
    fn test_remove_all_keeps_other_hosts() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);
        fs::create_dir_all(config.path().parent().unwrap()).unwrap();
        fs::write(
            config.path(),
            "Host github.com\n    User git\n\n# work bastion\nHost bastion\n    HostName 10.0.0.1\n",
        )
        .unwrap();

        config.add(&instance("aaa"), Some("one")).unwrap();
        config.add(&instance("bbb"), Some("two")).unwrap();
        fs::write(
            config.path(),
            fs::read_to_string(config.path()).unwrap() + "\nHost after\n    User me\n",
        )
        .unwrap();

        assert_eq!(config.remove_all().unwrap(), 2);

        let content = fs::read_to_string(config.path()).unwrap();
        assert_eq!(
            content,
            "Host github.com\n    User git\n\n# work bastion\nHost bastion\n    HostName 10.0.0.1\n\nHost after\n    User me\n"
        );
    }

    #[test]
    fn test_remove_all_without_entries() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(config_in(&dir).remove_all().unwrap(), 0);
    }
}
