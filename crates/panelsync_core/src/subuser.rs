//! Subuser grant services.
//!
//! A subuser is a user granted scoped access to someone else's server. The
//! grant's secret and daemon permissions are mirrored to the daemon hosting
//! the server; every change here goes through the [`SyncCoordinator`].

use crate::context::ServiceContext;
use crate::coordinator::SyncCoordinator;
use crate::error::{ServiceError, ServiceResult};
use crate::provision::{find_user_by_email, UserProvisioner};
use crate::resolve::ServerRef;
use panelsync_daemon::{encode, HttpClient, PermissionSet, SyncedPermissionSet};
use panelsync_store::{
    NewSubuser, Node, NodeId, RowKey, Server, ServerId, Store, StoreError, Subuser, SubuserChanges,
    SubuserId, Table, Transaction, UserId,
};
use std::sync::Arc;

/// A staged grant plus what the daemon call needs.
struct StagedGrant {
    subuser: Subuser,
    server: Server,
    node: Node,
    permissions: SyncedPermissionSet,
}

fn find_node<S: Store>(store: &S, txn: &Transaction, id: NodeId) -> ServiceResult<Node> {
    store
        .find::<Node>(txn, id)?
        .ok_or_else(|| ServiceError::not_found(Table::Nodes, id.raw()))
}

fn find_server<S: Store>(store: &S, txn: &Transaction, id: ServerId) -> ServiceResult<Server> {
    store
        .find::<Server>(txn, id)?
        .ok_or_else(|| ServiceError::not_found(Table::Servers, id.raw()))
}

fn grant_error(err: StoreError, user_id: UserId, server_id: ServerId) -> ServiceError {
    if err.violated_constraint() == Some(Subuser::PAIR_UNIQUE) {
        ServiceError::DuplicateGrant { user_id, server_id }
    } else {
        err.into()
    }
}

/// Adds subusers to servers.
pub struct SubuserCreationService<S, C> {
    ctx: Arc<ServiceContext<S, C>>,
}

impl<S: Store, C: HttpClient> SubuserCreationService<S, C> {
    /// Creates the service.
    pub fn new(ctx: Arc<ServiceContext<S, C>>) -> Self {
        Self { ctx }
    }

    /// Grants the user with `email` access to `server`.
    ///
    /// Unknown emails are provisioned as new users first; such a user is
    /// kept even if the grant fails afterwards.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the server or its node does not exist
    /// - [`ServiceError::OwnershipConflict`] if the user owns the server
    /// - [`ServiceError::DuplicateGrant`] if the user already has access
    /// - [`ServiceError::Validation`] for a bad permission set or email
    /// - [`ServiceError::DaemonUnreachable`] if the daemon call failed
    pub fn handle(
        &self,
        server: impl Into<ServerRef>,
        email: &str,
        permissions: &PermissionSet,
    ) -> ServiceResult<Subuser> {
        let ctx = &*self.ctx;
        let server = server.into().resolve(ctx.store())?;
        let provisioner = UserProvisioner::new(ctx.store(), ctx.tokens(), &ctx.config().username);

        let staged = SyncCoordinator::new(ctx).run(
            "subuser.create",
            |store, txn| {
                let user = match find_user_by_email(store, txn, email)? {
                    Some(user) => user,
                    None => provisioner.provision(email)?,
                };
                if user.id == server.owner_id {
                    return Err(ServiceError::OwnershipConflict {
                        user_id: user.id,
                        server_id: server.id,
                    });
                }

                let existing = store.find_count_where::<Subuser, _>(txn, |s| {
                    s.user_id == user.id && s.server_id == server.id
                })?;
                if existing > 0 {
                    return Err(ServiceError::DuplicateGrant {
                        user_id: user.id,
                        server_id: server.id,
                    });
                }

                let subuser = store
                    .create::<Subuser>(
                        txn,
                        NewSubuser {
                            user_id: user.id,
                            server_id: server.id,
                            daemon_secret: ctx.generate_secret(),
                            permissions: permissions.as_slice().to_vec(),
                        },
                    )
                    .map_err(|e| grant_error(e, user.id, server.id))?;
                let encoded = encode(permissions)?;
                let node = find_node(store, txn, server.node_id)?;

                Ok(StagedGrant {
                    subuser,
                    server: server.clone(),
                    node,
                    permissions: encoded,
                })
            },
            |daemon, staged: &StagedGrant| {
                daemon
                    .for_node(&staged.node)
                    .for_server(staged.server.uuid)
                    .set_subuser_key(&staged.subuser.daemon_secret, &staged.permissions)
            },
        )?;
        Ok(staged.subuser)
    }
}

/// Changes the permissions of existing subusers.
pub struct SubuserUpdateService<S, C> {
    ctx: Arc<ServiceContext<S, C>>,
}

impl<S: Store, C: HttpClient> SubuserUpdateService<S, C> {
    /// Creates the service.
    pub fn new(ctx: Arc<ServiceContext<S, C>>) -> Self {
        Self { ctx }
    }

    /// Replaces a subuser's permissions and pushes them to the daemon.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::NotFound`] if the subuser does not exist
    /// - [`ServiceError::Conflict`] if another operation is changing the subuser
    /// - [`ServiceError::Validation`] for a bad permission set
    /// - [`ServiceError::DaemonUnreachable`] if the daemon call failed
    pub fn handle(&self, id: SubuserId, permissions: &PermissionSet) -> ServiceResult<Subuser> {
        let ctx = &*self.ctx;
        let staged = SyncCoordinator::new(ctx).run(
            "subuser.update",
            |store, txn| {
                let encoded = encode(permissions)?;
                store.update::<Subuser>(
                    txn,
                    id,
                    SubuserChanges {
                        permissions: Some(permissions.as_slice().to_vec()),
                        ..SubuserChanges::default()
                    },
                )?;
                let subuser = store
                    .find::<Subuser>(txn, id)?
                    .ok_or_else(|| ServiceError::not_found(Table::Subusers, id.raw()))?;
                let server = find_server(store, txn, subuser.server_id)?;
                let node = find_node(store, txn, server.node_id)?;

                Ok(StagedGrant {
                    subuser,
                    server,
                    node,
                    permissions: encoded,
                })
            },
            |daemon, staged: &StagedGrant| {
                daemon
                    .for_node(&staged.node)
                    .for_server(staged.server.uuid)
                    .set_subuser_key(&staged.subuser.daemon_secret, &staged.permissions)
            },
        )?;
        Ok(staged.subuser)
    }
}

/// Removes subusers.
pub struct SubuserDeletionService<S, C> {
    ctx: Arc<ServiceContext<S, C>>,
}

impl<S: Store, C: HttpClient> SubuserDeletionService<S, C> {
    /// Creates the service.
    pub fn new(ctx: Arc<ServiceContext<S, C>>) -> Self {
        Self { ctx }
    }

    /// Deletes a subuser and revokes its key on the daemon.
    ///
    /// Returns `false` if the subuser does not exist, without contacting any
    /// daemon. The row is kept if the daemon call fails.
    ///
    /// # Errors
    ///
    /// - [`ServiceError::Conflict`] if another operation is changing the subuser
    /// - [`ServiceError::DaemonUnreachable`] if the daemon call failed
    pub fn handle(&self, id: SubuserId) -> ServiceResult<bool> {
        let ctx = &*self.ctx;
        let revoked = SyncCoordinator::new(ctx).run(
            "subuser.delete",
            |store, txn| {
                let Some(subuser) = store.find::<Subuser>(txn, id)? else {
                    return Ok(None);
                };
                if !store.delete::<Subuser>(txn, id)? {
                    return Ok(None);
                }
                let server = find_server(store, txn, subuser.server_id)?;
                let node = find_node(store, txn, server.node_id)?;
                Ok(Some((subuser, server, node)))
            },
            |daemon, staged: &Option<(Subuser, Server, Node)>| match staged {
                Some((subuser, server, node)) => daemon
                    .for_node(node)
                    .for_server(server.uuid)
                    .revoke_subuser_key(&subuser.daemon_secret),
                None => Ok(()),
            },
        )?;
        Ok(revoked.is_some())
    }
}
