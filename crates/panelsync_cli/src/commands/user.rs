//! User commands.

use super::{App, CliError};
use panelsync_core::ServiceError;
use panelsync_store::{NewUser, Store, User};

/// Creates a user.
pub fn create(
    app: &App,
    email: String,
    username: String,
    name_first: String,
    name_last: String,
    root_admin: bool,
) -> Result<(), CliError> {
    let fields = NewUser {
        email,
        username,
        name_first,
        name_last,
        root_admin,
    };
    let user: User = app
        .db()
        .transaction(|txn| app.db().create::<User>(txn, fields))
        .map_err(ServiceError::from)?;

    app.emit(&user, |user| {
        println!("Created user {} ({} <{}>)", user.id, user.username, user.email);
    })
}

/// Lists all users.
pub fn list(app: &App) -> Result<(), CliError> {
    let users = app.db().list::<User>()?;
    app.emit(&users, |users| {
        println!("{:<10} {:<20} {:<32} ADMIN", "ID", "USERNAME", "EMAIL");
        for user in users {
            println!(
                "{:<10} {:<20} {:<32} {}",
                user.id.as_u64(),
                user.username,
                user.email,
                if user.root_admin { "yes" } else { "no" }
            );
        }
    })
}
