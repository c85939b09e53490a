//! Single-tenant credential store over the `.env` file.
//!
//! The OAuth callback persists the vendor token here so it survives a
//! restart; the running process also sees it immediately via the process
//! environment.

use std::path::{Path, PathBuf};

use tracing::info;

use bi_core::{Error, Result};

/// Writes key/value pairs into an env file, replacing existing lines.
pub struct EnvCredentialStore {
    path: PathBuf,
}

impl EnvCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Persists a key, updating the line in place or appending it.
    pub fn save(&self, key: &str, value: &str) -> Result<()> {
        let updated = match std::fs::read_to_string(&self.path) {
            Ok(contents) => rewrite(&contents, key, value),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => format!("{key}={value}\n"),
            Err(e) => return Err(Error::internal(format!("failed to read env file: {e}"))),
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::internal(format!("failed to create env dir: {e}")))?;
        }

        std::fs::write(&self.path, updated)
            .map_err(|e| Error::internal(format!("failed to write env file: {e}")))?;

        // The running process picks the new value up without a restart.
        std::env::set_var(key, value);

        info!(key, path = %self.path.display(), "Credential persisted");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn rewrite(contents: &str, key: &str, value: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut found = false;

    for line in contents.lines() {
        if line.trim_start().starts_with(&format!("{key}=")) {
            lines.push(format!("{key}={value}"));
            found = true;
        } else {
            lines.push(line.to_string());
        }
    }

    if !found {
        lines.push(format!("{key}={value}"));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
