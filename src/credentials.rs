use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::AuthError;
use crate::models::Role;

/// One row of the flat credential store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    #[serde(rename = "password")]
    pub password_hash: String,
    pub role: Role,
}

/// SHA-256 of the plaintext password as lowercase hex.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Append-only credential file with columns `username,password,role`.
///
/// Nothing guards against two processes registering at the same time.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the store with just a header row if it does not exist yet.
    pub fn ensure_exists(&self) -> Result<(), AuthError> {
        if self.path.exists() {
            return Ok(());
        }
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(["username", "password", "role"])?;
        writer.flush()?;
        tracing::info!(path = %self.path.display(), "credential store created");
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<Credential>, AuthError> {
        self.ensure_exists()?;
        let mut reader = csv::Reader::from_path(&self.path)?;
        let mut credentials = Vec::new();
        for result in reader.deserialize::<Credential>() {
            credentials.push(result?);
        }
        Ok(credentials)
    }

    pub fn find(&self, username: &str) -> Result<Option<Credential>, AuthError> {
        Ok(self
            .load()?
            .into_iter()
            .find(|credential| credential.username == username))
    }

    /// Appends a new account; an existing username leaves the store untouched.
    pub fn register(&self, username: &str, password: &str, role: Role) -> Result<Credential, AuthError> {
        let username = username.trim();
        if self.find(username)?.is_some() {
            tracing::warn!(username, "registration rejected: username taken");
            return Err(AuthError::DuplicateUser(username.to_string()));
        }

        let credential = Credential {
            username: username.to_string(),
            password_hash: hash_password(password),
            role,
        };

        let file = OpenOptions::new().append(true).open(&self.path)?;
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
        writer.serialize(&credential)?;
        writer.flush()?;

        tracing::info!(username, role = %role, "account registered");
        Ok(credential)
    }

    /// Role of the account when both username and password hash match.
    pub fn check_login(&self, username: &str, password: &str) -> Result<Option<Role>, AuthError> {
        let hashed = hash_password(password);
        Ok(self
            .load()?
            .into_iter()
            .find(|credential| credential.username == username.trim() && credential.password_hash == hashed)
            .map(|credential| credential.role))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    pub(crate) fn temp_dir(prefix: &str) -> PathBuf {
        let p = std::env::temp_dir().join(format!(
            "{}-{}",
            prefix,
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .expect("clock")
                .as_nanos()
        ));
        std::fs::create_dir_all(&p).expect("create temp dir");
        p
    }

    #[test]
    fn hash_is_sha256_hex() {
        assert_eq!(
            hash_password("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn store_is_bootstrapped_with_header() {
        let dir = temp_dir("attendance-store-bootstrap");
        let store = CredentialStore::new(dir.join("auth/users.csv"));
        assert!(store.load().expect("load").is_empty());
        let contents = std::fs::read_to_string(store.path()).expect("read store");
        assert_eq!(contents, "username,password,role\n");
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn register_then_login() {
        let dir = temp_dir("attendance-store-login");
        let store = CredentialStore::new(dir.join("users.csv"));
        store.register("23E51A6601", "secret", Role::Student).expect("register");
        store.register("prof", "pw", Role::Faculty).expect("register");

        assert_eq!(store.check_login("23E51A6601", "secret").expect("login"), Some(Role::Student));
        assert_eq!(store.check_login("prof", "pw").expect("login"), Some(Role::Faculty));
        assert_eq!(store.check_login("prof", "wrong").expect("login"), None);
        assert_eq!(store.check_login("nobody", "pw").expect("login"), None);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn duplicate_registration_leaves_store_unchanged() {
        let dir = temp_dir("attendance-store-duplicate");
        let store = CredentialStore::new(dir.join("users.csv"));
        store.register("prof", "pw", Role::Faculty).expect("register");
        let before = std::fs::read(store.path()).expect("read store");

        let err = store.register("prof", "other", Role::Student).unwrap_err();
        assert!(matches!(err, AuthError::DuplicateUser(name) if name == "prof"));
        assert_eq!(std::fs::read(store.path()).expect("read store"), before);
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn stored_rows_use_plain_columns() {
        let dir = temp_dir("attendance-store-columns");
        let store = CredentialStore::new(dir.join("users.csv"));
        store.register("prof", "pw", Role::Faculty).expect("register");
        let contents = std::fs::read_to_string(store.path()).expect("read store");
        let expected = format!("username,password,role\nprof,{},faculty\n", hash_password("pw"));
        assert_eq!(contents, expected);
        let _ = std::fs::remove_dir_all(dir);
    }
}
