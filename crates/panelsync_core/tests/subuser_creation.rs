//! Subuser creation against a mock daemon.

use panelsync_core::{ServerRef, ServiceError};
use panelsync_daemon::{DaemonCode, PermissionSet, SubuserKeyUpdate, ACCESS_SERVER_HEADER, ACCESS_TOKEN_HEADER};
use panelsync_store::{Node, NodeId, NewServer, Server, ServerId, Store, Subuser, Table, User};
use panelsync_testkit::{Reply, SequenceTokens, TestPanel};

struct World {
    panel: TestPanel,
    owner: User,
    node: Node,
    server: Server,
}

fn world() -> World {
    let panel = TestPanel::new();
    let owner = panel.seed_user("owner@example.com", "owner");
    let node = panel.seed_node("eu-1");
    let server = panel.seed_server(&owner, &node);
    World {
        panel,
        owner,
        node,
        server,
    }
}

fn perms(list: &[&str]) -> PermissionSet {
    PermissionSet::new(list)
}

fn find_user(panel: &TestPanel, email: &str) -> Option<User> {
    panel
        .db
        .list::<User>()
        .unwrap()
        .into_iter()
        .find(|u| u.email.eq_ignore_ascii_case(email))
}

#[test]
fn new_email_is_provisioned_and_granted() {
    let w = world();

    let subuser = w
        .panel
        .subuser_creation()
        .handle(&w.server, "new.user@example.com", &perms(&["file.read", "file.write"]))
        .unwrap();

    // One new principal with a derived username.
    let user = find_user(&w.panel, "new.user@example.com").unwrap();
    assert_eq!(user.username, "new.user_000001");
    assert_eq!(user.name_first, "Server");
    assert_eq!(user.name_last, "Subuser");
    assert!(!user.root_admin);
    assert_eq!(w.panel.db.count::<User>(), 2);

    // One committed grant with a generated secret.
    assert_eq!(subuser.user_id, user.id);
    assert_eq!(subuser.server_id, w.server.id);
    assert_eq!(subuser.daemon_secret, SequenceTokens::nth(2, 36));
    assert_eq!(subuser.permissions, ["file.read", "file.write"]);
    assert_eq!(w.panel.db.get::<Subuser>(subuser.id).unwrap(), Some(subuser.clone()));

    // One daemon call carrying the key and encoded permissions.
    let requests = w.panel.daemon.requests();
    assert_eq!(requests.len(), 1);
    let req = &requests[0];
    assert_eq!(req.url, "https://eu-1.nodes.test:8080/v1/server");
    assert_eq!(req.header(ACCESS_TOKEN_HEADER), Some(w.node.daemon_secret.as_str()));
    let server_uuid = w.server.uuid.to_string();
    assert_eq!(req.header(ACCESS_SERVER_HEADER), Some(server_uuid.as_str()));
    let body: SubuserKeyUpdate = req.json().unwrap();
    assert_eq!(
        body.keys[&subuser.daemon_secret],
        ["s:get", "s:console", "s:files:read", "s:files:post"]
    );

    assert!(w.panel.sink.is_empty());
    assert_eq!(w.panel.db.active_count(), 0);
}

#[test]
fn daemon_400_rolls_back_grant_but_keeps_user() {
    let w = world();
    w.panel.daemon.push_reply(Reply::Status(400));

    let err = w
        .panel
        .subuser_creation()
        .handle(&w.server, "new.user@example.com", &perms(&["file.read", "file.write"]))
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::DaemonUnreachable {
            code: DaemonCode::Status(400),
            ..
        }
    ));
    assert_eq!(w.panel.db.count::<Subuser>(), 0);
    assert!(find_user(&w.panel, "new.user@example.com").is_some());

    let entries = w.panel.sink.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].operation, "subuser.create");
    assert_eq!(entries[0].code, DaemonCode::Status(400));
    assert_eq!(w.panel.db.active_count(), 0);
}

#[test]
fn refused_connection_reports_sentinel() {
    let w = world();
    w.panel.daemon.push_reply(Reply::Refuse);

    let err = w
        .panel
        .subuser_creation()
        .handle(w.server.id, "friend@example.com", &perms(&["power.start"]))
        .unwrap_err();

    assert_eq!(err.daemon_code(), Some(DaemonCode::ConnectionRefused));
    assert!(err.to_string().contains("E_CONN_REFUSED"));
    assert_eq!(w.panel.sink.len(), 1);
}

#[test]
fn timeout_is_treated_as_connection_failure() {
    let w = world();
    w.panel.daemon.push_reply(Reply::Timeout);

    let err = w
        .panel
        .subuser_creation()
        .handle(&w.server, "friend@example.com", &perms(&["power.start"]))
        .unwrap_err();

    assert_eq!(err.daemon_code(), Some(DaemonCode::ConnectionRefused));
    assert_eq!(w.panel.db.count::<Subuser>(), 0);
}

#[test]
fn repeated_request_is_duplicate_and_provisions_once() {
    let w = world();
    let service = w.panel.subuser_creation();
    let set = perms(&["power.start"]);

    service.handle(&w.server, "new.user@example.com", &set).unwrap();
    let err = service
        .handle(&w.server, "NEW.USER@example.com", &set)
        .unwrap_err();

    assert!(matches!(err, ServiceError::DuplicateGrant { .. }));
    assert_eq!(w.panel.db.count::<User>(), 2);
    assert_eq!(w.panel.db.count::<Subuser>(), 1);
    assert_eq!(w.panel.daemon.request_count(), 1);
    assert!(w.panel.sink.is_empty());
}

#[test]
fn owner_cannot_be_subuser() {
    let w = world();

    let err = w
        .panel
        .subuser_creation()
        .handle(&w.server, &w.owner.email, &perms(&["power.start"]))
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::OwnershipConflict { user_id, server_id }
            if user_id == w.owner.id && server_id == w.server.id
    ));
    assert_eq!(w.panel.db.count::<Subuser>(), 0);
    assert_eq!(w.panel.daemon.request_count(), 0);
    assert!(w.panel.sink.is_empty());
}

#[test]
fn owner_check_precedes_duplicate_check() {
    let w = world();
    // Hand ownership to a user who already is a subuser.
    let friend = w.panel.seed_user("friend@example.com", "friend");
    w.panel
        .subuser_creation()
        .handle(&w.server, "friend@example.com", &perms(&["power.start"]))
        .unwrap();
    let server = w
        .panel
        .db
        .transaction(|txn| {
            w.panel.db.update::<Server>(
                txn,
                w.server.id,
                panelsync_store::ServerChanges {
                    owner_id: Some(friend.id),
                    ..Default::default()
                },
            )?;
            w.panel.db.find::<Server>(txn, w.server.id)
        })
        .unwrap()
        .unwrap();

    let err = w
        .panel
        .subuser_creation()
        .handle(server, "friend@example.com", &perms(&["power.start"]))
        .unwrap_err();
    assert!(matches!(err, ServiceError::OwnershipConflict { .. }));
}

#[test]
fn invalid_permissions_never_reach_the_daemon() {
    let w = world();

    for bad in [&["power"][..], &["power.explode"][..], &[][..]] {
        let err = w
            .panel
            .subuser_creation()
            .handle(&w.server, "friend@example.com", &perms(bad))
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)), "{bad:?}: {err}");
    }

    assert_eq!(w.panel.daemon.request_count(), 0);
    assert_eq!(w.panel.db.count::<Subuser>(), 0);
    assert!(w.panel.sink.is_empty());
    assert_eq!(w.panel.db.active_count(), 0);
}

#[test]
fn unknown_server_is_not_found() {
    let w = world();

    let err = w
        .panel
        .subuser_creation()
        .handle(ServerRef::Id(ServerId::new(999)), "friend@example.com", &perms(&["power.start"]))
        .unwrap_err();

    assert!(matches!(
        err,
        ServiceError::NotFound {
            entity: Table::Servers,
            id: 999
        }
    ));
    assert!(find_user(&w.panel, "friend@example.com").is_none());
}

#[test]
fn missing_node_rolls_back() {
    let w = world();
    let orphan = w
        .panel
        .db
        .transaction(|txn| {
            w.panel.db.create::<Server>(
                txn,
                NewServer {
                    name: "orphan".into(),
                    owner_id: w.owner.id,
                    node_id: NodeId::new(77),
                },
            )
        })
        .unwrap();

    let err = w
        .panel
        .subuser_creation()
        .handle(&orphan, "friend@example.com", &perms(&["power.start"]))
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound { entity: Table::Nodes, .. }));
    assert_eq!(w.panel.db.count::<Subuser>(), 0);
    assert_eq!(w.panel.daemon.request_count(), 0);
    assert_eq!(w.panel.db.active_count(), 0);
}
