use thiserror::Error;

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 25;
pub const PASSWORD_MIN_CHARS: usize = 6;

/// Field-level problems with a registration form.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistrationError {
    #[error("username is required")]
    MissingUsername,

    #[error("username must be between 3 and 25 characters")]
    UsernameLength,

    #[error("password is required")]
    MissingPassword,

    #[error("password must be at least 6 characters")]
    PasswordTooShort,

    #[error("passwords do not match")]
    PasswordMismatch,

    #[error("username is already taken")]
    UsernameTaken,
}

/// Raw registration input as typed by the user.
#[derive(Debug, Clone, Default)]
pub struct RegistrationDraft {
    pub username: String,
    pub password: String,
    pub password_confirm: String,
}

/// Registration input that passed field validation.
///
/// Uniqueness of the username is checked by the store, not here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    username: String,
    password: String,
}

impl RegistrationDraft {
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        password_confirm: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            password_confirm: password_confirm.into(),
        }
    }

    /// Validate field presence, lengths and password confirmation.
    ///
    /// # Errors
    ///
    /// Returns the first `RegistrationError` found, checking the username
    /// before the password.
    pub fn validate(self) -> Result<Registration, RegistrationError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(RegistrationError::MissingUsername);
        }
        let len = username.chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&len) {
            return Err(RegistrationError::UsernameLength);
        }

        if self.password.trim().is_empty() {
            return Err(RegistrationError::MissingPassword);
        }
        if self.password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(RegistrationError::PasswordTooShort);
        }
        if self.password != self.password_confirm {
            return Err(RegistrationError::PasswordMismatch);
        }

        Ok(Registration {
            username: username.to_owned(),
            password: self.password,
        })
    }
}

impl Registration {
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Plain password, to be handed to the caller's hash function.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}
