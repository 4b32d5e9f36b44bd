use serde::{Deserialize, Serialize};

use agora_core::{DomainError, DomainResult, UserId};

/// Normalized e-mail address (trimmed, lower-cased, minimally validated).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let normalized = raw.trim().to_lowercase();
        let Some((local, domain)) = normalized.split_once('@') else {
            return Err(DomainError::validation("email must contain '@'"));
        };
        if local.is_empty() || domain.is_empty() || domain.contains('@') || !domain.contains('.') {
            return Err(DomainError::validation(format!("invalid email address: {raw}")));
        }
        if normalized.len() > 255 {
            return Err(DomainError::validation("email must be at most 255 bytes"));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Email {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A registered user as stored.
///
/// The password hash never leaves the process: it is skipped on serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    #[serde(skip)]
    pub password_hash: String,
}

/// Registration fields after validation, before the password is hashed.
#[derive(Clone, PartialEq, Eq)]
pub struct Registration {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub password: String,
}

impl Registration {
    pub const MIN_PASSWORD_CHARS: usize = 8;
    pub const MAX_NAME_CHARS: usize = 255;

    pub fn parse(first_name: &str, last_name: &str, email: &str, password: &str) -> DomainResult<Self> {
        let first_name = name("first_name", first_name)?;
        let last_name = name("last_name", last_name)?;
        let email = Email::parse(email)?;
        if password.chars().count() < Self::MIN_PASSWORD_CHARS {
            return Err(DomainError::validation(format!(
                "password must be at least {} characters",
                Self::MIN_PASSWORD_CHARS
            )));
        }
        Ok(Self {
            first_name,
            last_name,
            email,
            password: password.to_string(),
        })
    }

    /// Swap the plaintext password for its hash.
    pub fn into_new_user(self, password_hash: String) -> NewUser {
        NewUser {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash,
        }
    }
}

impl core::fmt::Debug for Registration {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registration")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// A user ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: Email,
    pub password_hash: String,
}

/// Profile edit after validation. Absent fields keep their stored value.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<Email>,
    pub password: Option<String>,
}

impl ProfileUpdate {
    pub fn parse(
        first_name: Option<&str>,
        last_name: Option<&str>,
        email: Option<&str>,
        password: Option<&str>,
    ) -> DomainResult<Self> {
        let password = match password {
            Some(p) if p.chars().count() < Registration::MIN_PASSWORD_CHARS => {
                return Err(DomainError::validation(format!(
                    "password must be at least {} characters",
                    Registration::MIN_PASSWORD_CHARS
                )));
            }
            other => other.map(str::to_string),
        };
        Ok(Self {
            first_name: first_name.map(|raw| name("first_name", raw)).transpose()?,
            last_name: last_name.map(|raw| name("last_name", raw)).transpose()?,
            email: email.map(Email::parse).transpose()?,
            password,
        })
    }

    /// Swap the plaintext password, if any, for its hash.
    pub fn into_user_update(self, password_hash: Option<String>) -> UserUpdate {
        UserUpdate {
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            password_hash,
        }
    }
}

impl core::fmt::Debug for ProfileUpdate {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProfileUpdate")
            .field("first_name", &self.first_name)
            .field("last_name", &self.last_name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Field changes ready to be stored; `None` leaves a column as it is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<Email>,
    pub password_hash: Option<String>,
}

fn name(field: &str, raw: &str) -> DomainResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(format!("{field} must not be empty")));
    }
    if trimmed.chars().count() > Registration::MAX_NAME_CHARS {
        return Err(DomainError::validation(format!(
            "{field} must be at most {} characters",
            Registration::MAX_NAME_CHARS
        )));
    }
    Ok(trimmed.to_string())
}

/// A user ranked by how many answers they have posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AnswerCount {
    pub user_id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub answer_count: u64,
}
