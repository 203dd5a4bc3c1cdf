//! Account registry.
//!
//! Accounts are keyed by normalized email (trimmed, lowercased) at every entry
//! point, so `A@x.com` and `a@x.com` are the same account. Passwords are kept
//! as Argon2id PHC strings; records written by older builds with a plaintext
//! password still log in and are rehashed on that login.

use std::sync::OnceLock;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AccountsConfig;
use crate::error::{AuthError, Error, RegistrationError};
use crate::store::{Collection, JsonStore, Records};

/// Prefix shared by every hashed password record.
const HASH_PREFIX: &str = "$argon2";

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Normalized email; the account's primary key.
    pub email: String,
    /// Display name.
    pub full_name: String,
}

/// Persisted form of an account, keyed by email in the users collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserRecord {
    full_name: String,
    password: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

/// Trim and lowercase an email address.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Check a password against the policy: long enough, with at least one digit
/// and at least one non-alphanumeric character.
#[must_use]
pub fn password_valid(password: &str, min_length: usize) -> bool {
    if password.chars().count() < min_length {
        return false;
    }
    let has_number = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());
    has_number && has_special
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid email pattern")
    })
}

/// Hash a password with a fresh random salt.
fn hash_password(password: &str) -> crate::Result<String> {
    let salt = SaltString::encode_b64(uuid::Uuid::new_v4().as_bytes())
        .map_err(|e| Error::internal(format!("password salt rejected: {e}")))?;
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::internal(format!("password hashing failed: {e}")))
}

/// How a stored password matched.
#[derive(Debug, PartialEq, Eq)]
enum PasswordMatch {
    Hashed,
    Legacy,
    Mismatch,
}

fn verify_password(stored: &str, password: &str) -> PasswordMatch {
    if stored.starts_with(HASH_PREFIX) {
        let verified = PasswordHash::new(stored).is_ok_and(|hash| {
            Argon2::default()
                .verify_password(password.as_bytes(), &hash)
                .is_ok()
        });
        return if verified {
            PasswordMatch::Hashed
        } else {
            PasswordMatch::Mismatch
        };
    }
    // Compare digests so plaintext records are not compared byte by byte
    if blake3::hash(stored.as_bytes()) == blake3::hash(password.as_bytes()) {
        PasswordMatch::Legacy
    } else {
        PasswordMatch::Mismatch
    }
}

/// Owns the users collection.
#[derive(Debug, Clone)]
pub struct AccountRegistry {
    store: JsonStore,
    min_password_length: usize,
}

impl AccountRegistry {
    /// Create a registry over the given store.
    #[must_use]
    pub fn new(store: JsonStore, config: &AccountsConfig) -> Self {
        Self {
            store,
            min_password_length: config.min_password_length,
        }
    }

    /// Register a new account.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::WeakPassword`] if the password fails the
    /// policy, [`RegistrationError::InvalidEmail`] if the email is malformed,
    /// [`RegistrationError::EmailTaken`] if the normalized email exists, or
    /// [`RegistrationError::Store`] if the store fails.
    pub fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<User, RegistrationError> {
        if !password_valid(password, self.min_password_length) {
            return Err(RegistrationError::WeakPassword {
                min_length: self.min_password_length,
            });
        }

        let email = normalize_email(email);
        if !email_pattern().is_match(&email) {
            return Err(RegistrationError::InvalidEmail { email });
        }

        let mut users = self.store.load(Collection::Users)?;
        if users.contains_key(&email) {
            return Err(RegistrationError::EmailTaken { email });
        }

        let record = UserRecord {
            full_name: full_name.trim().to_string(),
            password: hash_password(password)?,
            created_at: Some(Utc::now()),
        };
        users.insert(email.clone(), serde_json::to_value(&record).map_err(Error::from)?);
        self.store.save(Collection::Users, &users)?;

        info!(email = %email, "Registered account");
        Ok(User {
            email,
            full_name: record.full_name,
        })
    }

    /// Check credentials and return the account.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidCredentials`] for an unknown email or a
    /// wrong password alike, or [`AuthError::Store`] if the store fails.
    pub fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let mut users = self.store.load(Collection::Users)?;

        let Some(record) = Self::record(&users, &email)? else {
            warn!(email = %email, "Login failed");
            return Err(AuthError::InvalidCredentials);
        };

        match verify_password(&record.password, password) {
            PasswordMatch::Hashed => {}
            PasswordMatch::Legacy => {
                let upgraded = UserRecord {
                    password: hash_password(password)?,
                    ..record.clone()
                };
                users.insert(
                    email.clone(),
                    serde_json::to_value(&upgraded).map_err(Error::from)?,
                );
                self.store.save(Collection::Users, &users)?;
                info!(email = %email, "Upgraded plaintext password to hashed form");
            }
            PasswordMatch::Mismatch => {
                warn!(email = %email, "Login failed");
                return Err(AuthError::InvalidCredentials);
            }
        }

        debug!(email = %email, "Login succeeded");
        Ok(User {
            email,
            full_name: record.full_name,
        })
    }

    /// Look up an account by email.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails or the record is malformed.
    pub fn get_user(&self, email: &str) -> crate::Result<Option<User>> {
        let email = normalize_email(email);
        let users = self.store.load(Collection::Users)?;
        Ok(Self::record(&users, &email)?.map(|record| User {
            email,
            full_name: record.full_name,
        }))
    }

    fn record(users: &Records, email: &str) -> crate::Result<Option<UserRecord>> {
        users
            .get(email)
            .map(|value| serde_json::from_value(value.clone()).map_err(Error::from))
            .transpose()
    }
}
