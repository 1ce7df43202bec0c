//! Runner control-channel authentication token
//!
//! The orchestrator side writes a fresh random token before launching the tunnel
//! runner. The runner reads it on startup and rejects every control request on a
//! connection until that connection has presented the same token.
//!
//! - Token is 32 bytes of random data, hex-encoded (64 chars)
//! - Token file has mode 0600 (owner read/write only) on Unix
//!
//! Any local process can connect to the control port; only processes of the same
//! user and installation can read the token.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Length of the authentication token in bytes (before hex encoding)
const TOKEN_BYTES: usize = 32;

const TOKEN_FILENAME: &str = "control_token";

/// Path of the token file for the installation rooted at `state_dir`
pub fn token_path(state_dir: &Path) -> PathBuf {
    state_dir.join(TOKEN_FILENAME)
}

/// Generate a new random authentication token
pub fn generate_token() -> String {
    use rand::Rng;
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::thread_rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Generate a token, write it to the token file and return it
pub fn issue_token(state_dir: &Path) -> io::Result<String> {
    let token = generate_token();
    write_token(state_dir, &token)?;
    tracing::debug!("Issued control token at {}", token_path(state_dir).display());
    Ok(token)
}

/// Write `token` to the token file, creating the state directory if needed
pub fn write_token(state_dir: &Path, token: &str) -> io::Result<PathBuf> {
    fs::create_dir_all(state_dir)?;
    let path = token_path(state_dir);

    // Remove first so an existing file with looser permissions is not reused
    match fs::remove_file(&path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e),
    }

    let mut options = OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options.open(&path)?;
    file.write_all(token.as_bytes())?;

    Ok(path)
}

/// Read the token from the token file
pub fn read_token(state_dir: &Path) -> io::Result<String> {
    match fs::read_to_string(token_path(state_dir)) {
        Ok(token) => Ok(token.trim().to_string()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            Err(io::Error::new(io::ErrorKind::NotFound, "No control token found"))
        }
        Err(e) => Err(e),
    }
}

/// Remove the token file. Ignores a missing file.
pub fn remove_token(state_dir: &Path) -> io::Result<()> {
    match fs::remove_file(token_path(state_dir)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Compare a presented token with the expected one in constant time
pub fn validate_token(provided: &str, expected: &str) -> bool {
    if provided.len() != expected.len() {
        return false;
    }

    let mut result = 0u8;
    for (a, b) in provided.bytes().zip(expected.bytes()) {
        result |= a ^ b;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_generate_token() {
        let token = generate_token();
        assert_eq!(token.len(), TOKEN_BYTES * 2);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(token, generate_token());
    }

    #[test]
    fn test_validate_token() {
        let token = "abc123def456";
        assert!(validate_token(token, token));
        assert!(!validate_token(token, "abc123def457"));
        assert!(!validate_token(token, "abc123def45"));
    }

    #[test]
    fn test_issue_and_read() {
        let dir = tempdir().unwrap();
        let state_dir = dir.path().join("meshgate");

        let token = issue_token(&state_dir).unwrap();
        assert_eq!(read_token(&state_dir).unwrap(), token);

        // Reissuing replaces the previous token
        let next = issue_token(&state_dir).unwrap();
        assert_ne!(next, token);
        assert_eq!(read_token(&state_dir).unwrap(), next);

        remove_token(&state_dir).unwrap();
        assert_eq!(
            read_token(&state_dir).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        remove_token(&state_dir).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_token_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        issue_token(dir.path()).unwrap();

        let mode = fs::metadata(token_path(dir.path())).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
