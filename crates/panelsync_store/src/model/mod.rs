//! Row types for each table.

mod node;
mod server;
mod subuser;
mod user;

pub use node::{NewNode, Node, NodeChanges};
pub use server::{NewServer, Server, ServerChanges};
pub use subuser::{NewSubuser, Subuser, SubuserChanges};
pub use user::{is_valid_email, is_valid_username, NewUser, User, UserChanges};
