//! Principals.

use crate::error::{StoreError, StoreResult};
use crate::record::{assign, Record, UniqueKey};
use crate::types::{Table, UserId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An identity that may own servers or be granted access to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Primary key.
    pub id: UserId,
    /// External identifier.
    pub uuid: Uuid,
    /// Login name.
    pub username: String,
    /// Email address, unique case-insensitively.
    pub email: String,
    /// Given name.
    pub name_first: String,
    /// Family name.
    pub name_last: String,
    /// Administrative flag. Set at creation and never changed by a changeset.
    pub root_admin: bool,
}

/// Insert payload for [`User`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Email address.
    pub email: String,
    /// Login name.
    pub username: String,
    /// Given name.
    pub name_first: String,
    /// Family name.
    pub name_last: String,
    /// Administrative flag.
    pub root_admin: bool,
}

/// Changeset for [`User`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserChanges {
    /// New email address.
    pub email: Option<String>,
    /// New login name.
    pub username: Option<String>,
    /// New given name.
    pub name_first: Option<String>,
    /// New family name.
    pub name_last: Option<String>,
}

impl User {
    /// Unique index over lower-cased emails.
    pub const EMAIL_UNIQUE: &'static str = "users.email";
    /// Unique index over usernames.
    pub const USERNAME_UNIQUE: &'static str = "users.username";
}

impl Record for User {
    type Id = UserId;
    type Fields = NewUser;
    type Changes = UserChanges;

    const TABLE: Table = Table::Users;

    fn id(&self) -> UserId {
        self.id
    }

    fn from_fields(id: UserId, fields: NewUser) -> Self {
        Self {
            id,
            uuid: Uuid::new_v4(),
            username: fields.username.to_lowercase(),
            email: fields.email,
            name_first: fields.name_first,
            name_last: fields.name_last,
            root_admin: fields.root_admin,
        }
    }

    fn apply(&mut self, changes: UserChanges) -> bool {
        let mut changed = false;
        assign(&mut self.email, changes.email, &mut changed);
        assign(
            &mut self.username,
            changes.username.map(|u| u.to_lowercase()),
            &mut changed,
        );
        assign(&mut self.name_first, changes.name_first, &mut changed);
        assign(&mut self.name_last, changes.name_last, &mut changed);
        changed
    }

    fn unique_keys(&self) -> Vec<UniqueKey> {
        vec![
            UniqueKey::new(Self::EMAIL_UNIQUE, self.email.to_lowercase()),
            UniqueKey::new(Self::USERNAME_UNIQUE, self.username.clone()),
        ]
    }

    fn validate(&self) -> StoreResult<()> {
        if !is_valid_email(&self.email) {
            return Err(StoreError::validation(
                Table::Users,
                format!("{:?} is not a valid email address", self.email),
            ));
        }
        if !is_valid_username(&self.username) {
            return Err(StoreError::validation(
                Table::Users,
                format!(
                    "username {:?} must be 3-255 characters of a-z, 0-9, '_', '.', '-' \
                     and start and end with a letter or digit",
                    self.username
                ),
            ));
        }
        if self.name_first.is_empty() || self.name_last.is_empty() {
            return Err(StoreError::validation(Table::Users, "names must not be empty"));
        }
        Ok(())
    }
}

/// Checks the shape `local@domain` with a dotted domain and no whitespace.
#[must_use]
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

/// Checks `^[a-z0-9]([\w.-]+)[a-z0-9]$` with a 255 character cap.
#[must_use]
pub fn is_valid_username(username: &str) -> bool {
    let bytes = username.as_bytes();
    if bytes.len() < 3 || bytes.len() > 255 {
        return false;
    }
    let edge = |b: u8| b.is_ascii_lowercase() || b.is_ascii_digit();
    let inner = |b: u8| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-');
    edge(bytes[0]) && edge(bytes[bytes.len() - 1]) && bytes.iter().all(|&b| inner(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User::from_fields(
            UserId::new(1),
            NewUser {
                email: "Alice@Example.com".into(),
                username: "Alice_01".into(),
                name_first: "Alice".into(),
                name_last: "Doe".into(),
                root_admin: false,
            },
        )
    }

    #[test]
    fn username_is_lowercased_on_insert() {
        assert_eq!(user().username, "alice_01");
    }

    #[test]
    fn email_key_is_case_insensitive() {
        let keys = user().unique_keys();
        assert!(keys.contains(&UniqueKey::new(User::EMAIL_UNIQUE, "alice@example.com")));
    }

    #[test]
    fn changes_cannot_touch_admin_flag() {
        let mut u = user();
        let changed = u.apply(UserChanges {
            name_first: Some("Alicia".into()),
            ..UserChanges::default()
        });
        assert!(changed);
        assert!(!u.root_admin);
        assert!(!u.apply(UserChanges::default()));
    }

    #[test]
    fn email_shapes() {
        assert!(is_valid_email("new.user@example.com"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("a@b@example.com"));
        assert!(!is_valid_email("a@localhost"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn username_shapes() {
        assert!(is_valid_username("new.user_ab12cd"));
        assert!(!is_valid_username("ab"));
        assert!(!is_valid_username("_leading"));
        assert!(!is_valid_username("trailing-"));
        assert!(!is_valid_username("plus+sign"));
    }

    #[test]
    fn validate_rejects_bad_email() {
        let mut u = user();
        u.email = "broken".into();
        assert!(matches!(u.validate(), Err(StoreError::Validation { .. })));
    }
}
