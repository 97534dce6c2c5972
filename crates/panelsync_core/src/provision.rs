//! Find-or-create of users by email.
//!
//! A provisioned user is committed in its own transaction, so it survives
//! even when the operation that asked for it is later rolled back.

use crate::config::UsernameConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::random::TokenGenerator;
use panelsync_store::model::is_valid_username;
use panelsync_store::{NewUser, Store, Transaction, User};
use std::time::{Duration, Instant};

const INITIAL_BACKOFF: Duration = Duration::from_millis(1);
const MAX_BACKOFF: Duration = Duration::from_millis(25);

/// Placeholder given name of provisioned users.
pub const PLACEHOLDER_FIRST_NAME: &str = "Server";
/// Placeholder family name of provisioned users.
pub const PLACEHOLDER_LAST_NAME: &str = "Subuser";

/// Looks up a user by email, case-insensitively, as seen by `txn`.
pub fn find_user_by_email<S: Store>(
    store: &S,
    txn: &Transaction,
    email: &str,
) -> ServiceResult<Option<User>> {
    let email = email.trim();
    Ok(store.find_first_where::<User, _>(txn, |u| u.email.eq_ignore_ascii_case(email))?)
}

/// Resolves an email to a user, creating one when none exists.
pub struct UserProvisioner<'a, S> {
    store: &'a S,
    tokens: &'a dyn TokenGenerator,
    username: &'a UsernameConfig,
}

impl<'a, S: Store> UserProvisioner<'a, S> {
    /// Creates a provisioner.
    pub fn new(store: &'a S, tokens: &'a dyn TokenGenerator, username: &'a UsernameConfig) -> Self {
        Self {
            store,
            tokens,
            username,
        }
    }

    /// Returns the committed user with this email, creating it if needed.
    pub fn provision(&self, email: &str) -> ServiceResult<User> {
        let email = email.trim();
        if let Some(user) = self.find_committed(email)? {
            return Ok(user);
        }

        let mut attempt = 0;
        let deadline = Instant::now() + self.username.contention_wait();
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let fields = NewUser {
                email: email.to_string(),
                username: self.derive_username(email)?,
                name_first: PLACEHOLDER_FIRST_NAME.to_string(),
                name_last: PLACEHOLDER_LAST_NAME.to_string(),
                root_admin: false,
            };

            let err = match self
                .store
                .transaction(|txn| self.store.create::<User>(txn, fields))
            {
                Ok(user) => {
                    tracing::info!(user = %user.id, username = %user.username, "provisioned user");
                    return Ok(user);
                }
                Err(err) => err,
            };

            let constraint = err.violated_constraint().map(str::to_owned);
            match constraint.as_deref() {
                Some(User::USERNAME_UNIQUE) => {
                    attempt += 1;
                    if attempt >= self.username.max_attempts {
                        return Err(ServiceError::validation(format!(
                            "could not derive a unique username for {email:?} after {attempt} attempts"
                        )));
                    }
                    tracing::debug!(attempt, "derived username taken, retrying");
                }
                Some(User::EMAIL_UNIQUE) => {
                    // Another transaction holds the email; wait for it to finish.
                    if let Some(user) = self.find_committed(email)? {
                        return Ok(user);
                    }
                    if Instant::now() >= deadline {
                        return Err(err.into());
                    }
                    tracing::debug!(?backoff, "email reserved by another transaction, waiting");
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
                _ => return Err(err.into()),
            }
        }
    }

    /// Derives `<local part prefix>_<random suffix>`, lower-cased.
    pub fn derive_username(&self, email: &str) -> ServiceResult<String> {
        let local = email.split('@').next().unwrap_or_default();
        let prefix: String = local
            .chars()
            .take(self.username.prefix_length)
            .collect::<String>()
            .to_lowercase();
        let suffix = self
            .tokens
            .token(self.username.suffix_length)
            .to_lowercase();
        let username = format!("{prefix}_{suffix}");

        if !is_valid_username(&username) {
            return Err(ServiceError::validation(format!(
                "cannot derive a valid username from {email:?}"
            )));
        }
        Ok(username)
    }

    fn find_committed(&self, email: &str) -> ServiceResult<Option<User>> {
        let mut txn = self.store.begin()?;
        let found = find_user_by_email(self.store, &txn, email);
        self.store.rollback(&mut txn)?;
        found
    }
}
