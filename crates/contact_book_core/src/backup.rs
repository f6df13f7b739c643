//! Remote backup of the contact book database file.
//!
//! # Responsibility
//! - Read the database file in full and hand it to an upload capability.
//! - Resolve the access token from an explicit value or a token file.
//! - Provide the Dropbox uploader used by the CLI.
//!
//! # Invariants
//! - Uploads overwrite the remote object at a fixed path.
//! - Tokens are never logged.
//! - Failures are reported once; there is no retry.

use log::{error, info};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Remote path the database is stored under.
pub const DEFAULT_REMOTE_PATH: &str = "/contact_book.db";
/// Token file read when no token is passed explicitly.
pub const DEFAULT_TOKEN_FILE: &str = ".dropbox_token";

const DROPBOX_UPLOAD_URL: &str = "https://content.dropboxapi.com/2/files/upload";
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_ERROR_BODY_CHARS: usize = 200;

pub type BackupResult<T> = Result<T, BackupError>;

/// Errors from backup operations.
#[derive(Debug)]
pub enum BackupError {
    /// Reading the database or token file failed.
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Token passed on the command line is blank.
    BlankToken,
    /// Token file exists but holds no token.
    EmptyToken(PathBuf),
    /// Request could not be built or sent.
    Http(reqwest::Error),
    /// Upload argument header could not be encoded.
    Encode(serde_json::Error),
    /// Remote storage answered with a non-success status.
    Rejected { status: u16, body: String },
}

impl Display for BackupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "cannot read `{}`: {source}", path.display()),
            Self::BlankToken => write!(f, "access token must not be blank"),
            Self::EmptyToken(path) => write!(f, "token file `{}` is empty", path.display()),
            Self::Http(err) => write!(f, "upload request failed: {err}"),
            Self::Encode(err) => write!(f, "cannot encode upload arguments: {err}"),
            Self::Rejected { status, body } => {
                write!(f, "remote storage rejected upload with status {status}: {body}")
            }
        }
    }
}

impl Error for BackupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Http(err) => Some(err),
            Self::Encode(err) => Some(err),
            Self::BlankToken | Self::EmptyToken(_) | Self::Rejected { .. } => None,
        }
    }
}

impl From<reqwest::Error> for BackupError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(value: serde_json::Error) -> Self {
        Self::Encode(value)
    }
}

/// Capability that stores one backup blob remotely.
pub trait BackupUploader {
    fn upload(&self, bytes: &[u8]) -> BackupResult<()>;
}

/// Uploads `db_path` through `uploader`.
///
/// Returns the number of bytes uploaded.
pub fn backup_database(db_path: &Path, uploader: &dyn BackupUploader) -> BackupResult<usize> {
    let started_at = Instant::now();
    info!("event=backup_upload module=backup status=start");

    let bytes = std::fs::read(db_path).map_err(|source| BackupError::Io {
        path: db_path.to_path_buf(),
        source,
    })?;

    match uploader.upload(&bytes) {
        Ok(()) => {
            info!(
                "event=backup_upload module=backup status=ok bytes={} duration_ms={}",
                bytes.len(),
                started_at.elapsed().as_millis()
            );
            Ok(bytes.len())
        }
        Err(err) => {
            error!(
                "event=backup_upload module=backup status=error bytes={} duration_ms={} error={}",
                bytes.len(),
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

/// Picks the explicit token when given, otherwise reads `token_file`.
///
/// Surrounding whitespace is trimmed in both cases.
pub fn resolve_token(explicit: Option<&str>, token_file: &Path) -> BackupResult<String> {
    if let Some(token) = explicit {
        let token = token.trim();
        if token.is_empty() {
            return Err(BackupError::BlankToken);
        }
        return Ok(token.to_string());
    }

    let contents = std::fs::read_to_string(token_file).map_err(|source| BackupError::Io {
        path: token_file.to_path_buf(),
        source,
    })?;
    let token = contents.trim();
    if token.is_empty() {
        return Err(BackupError::EmptyToken(token_file.to_path_buf()));
    }
    Ok(token.to_string())
}

#[derive(Debug, Serialize)]
struct UploadArg<'a> {
    path: &'a str,
    mode: &'a str,
    mute: bool,
}

/// Dropbox content-upload client.
pub struct DropboxUploader {
    client: Client,
    token: String,
    remote_path: String,
}

impl DropboxUploader {
    pub fn new(token: impl Into<String>) -> BackupResult<Self> {
        let client = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self {
            client,
            token: token.into(),
            remote_path: DEFAULT_REMOTE_PATH.to_string(),
        })
    }

    pub fn with_remote_path(mut self, remote_path: impl Into<String>) -> Self {
        self.remote_path = remote_path.into();
        self
    }

    fn upload_arg(&self) -> BackupResult<String> {
        Ok(serde_json::to_string(&UploadArg {
            path: self.remote_path.as_str(),
            mode: "overwrite",
            mute: true,
        })?)
    }
}

impl BackupUploader for DropboxUploader {
    fn upload(&self, bytes: &[u8]) -> BackupResult<()> {
        let response = self
            .client
            .post(DROPBOX_UPLOAD_URL)
            .bearer_auth(&self.token)
            .header("Dropbox-API-Arg", self.upload_arg()?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes.to_vec())
            .send()?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().unwrap_or_default();
        Err(BackupError::Rejected {
            status: status.as_u16(),
            body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_token_wins_and_is_trimmed() {
        let token = resolve_token(Some("  abc  "), Path::new("/nonexistent/token")).unwrap();
        assert_eq!(token, "abc");
    }

    #[test]
    fn blank_explicit_token_is_rejected_without_reading_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "secret-token\n").unwrap();

        let err = resolve_token(Some("  "), &path).unwrap_err();
        assert!(matches!(err, BackupError::BlankToken));
        assert!(!err.to_string().contains("token file"));
    }

    #[test]
    fn token_is_read_from_file_when_not_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, "secret-token\n").unwrap();

        assert_eq!(resolve_token(None, &path).unwrap(), "secret-token");
    }

    #[test]
    fn blank_token_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token");
        std::fs::write(&path, " \n").unwrap();

        let err = resolve_token(None, &path).unwrap_err();
        assert!(matches!(err, BackupError::EmptyToken(p) if p == path));
    }

    #[test]
    fn missing_token_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_token(None, &dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, BackupError::Io { .. }));
    }

    #[test]
    fn upload_arg_overwrites_fixed_path() {
        let uploader = DropboxUploader::new("token")
            .unwrap()
            .with_remote_path("/backups/contacts.db");
        let arg: serde_json::Value = serde_json::from_str(&uploader.upload_arg().unwrap()).unwrap();
        assert_eq!(arg["path"], "/backups/contacts.db");
        assert_eq!(arg["mode"], "overwrite");
    }
}
