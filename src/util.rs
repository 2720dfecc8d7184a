use crate::error::{Error, Result};
use std::fs;
use std::path::Path;

pub fn user_agent() -> String {
    return format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
}

/// Reads a registry password, dropping the trailing newline editors add.
pub fn read_password_file(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path).map_err(|source| Error::PasswordFile {
        path: path.display().to_string(),
        source,
    })?;
    return Ok(content.trim_end_matches(['\r', '\n']).to_string());
}
