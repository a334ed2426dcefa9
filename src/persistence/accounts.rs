use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated,
    Registered,
    WrongPassword,
}

impl AuthOutcome {
    pub fn is_accepted(self) -> bool {
        !matches!(self, AuthOutcome::WrongPassword)
    }
}

/// Salted SHA-1 of a password, stored as hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordDigest {
    pub salt: String,
    pub hash: String,
}

impl PasswordDigest {
    pub fn with_salt(password: &str, salt: &str) -> Self {
        Self {
            salt: salt.to_string(),
            hash: salted_sha1(salt, password),
        }
    }

    pub fn generate(login: &str, password: &str) -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_nanos())
            .unwrap_or_default();
        let mut salt = salted_sha1(&nanos.to_string(), login);
        salt.truncate(SALT_LEN);
        Self::with_salt(password, &salt)
    }

    pub fn verify(&self, password: &str) -> bool {
        salted_sha1(&self.salt, password) == self.hash
    }
}

fn salted_sha1(salt: &str, value: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(salt.as_bytes());
    hasher.update(value.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub login: String,
    pub password: PasswordDigest,
}

impl UserRecord {
    pub fn register(login: &str, password: &str) -> Self {
        Self {
            login: login.to_string(),
            password: PasswordDigest::generate(login, password),
        }
    }
}

/// Logins compare case-insensitively.
pub fn normalize_login(login: &str) -> String {
    login.trim().to_lowercase()
}

/// Decides an authenticate-or-register attempt against whatever record the
/// store holds. A new record is returned when the login is unknown.
pub fn authenticate_or_register_record(
    existing: Option<&UserRecord>,
    login: &str,
    password: &str,
) -> (AuthOutcome, Option<UserRecord>) {
    match existing {
        Some(record) if record.password.verify(password) => (AuthOutcome::Authenticated, None),
        Some(_) => (AuthOutcome::WrongPassword, None),
        None => (
            AuthOutcome::Registered,
            Some(UserRecord::register(login, password)),
        ),
    }
}
