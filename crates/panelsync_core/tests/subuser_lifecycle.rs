//! Subuser permission updates and deletion.

use panelsync_core::ServiceError;
use panelsync_daemon::{PermissionSet, SubuserKeyUpdate};
use panelsync_store::{Store, Subuser, SubuserChanges, SubuserId};
use panelsync_testkit::{Reply, TestPanel};

fn granted() -> (TestPanel, Subuser) {
    let panel = TestPanel::new();
    let owner = panel.seed_user("owner@example.com", "owner");
    let node = panel.seed_node("eu-1");
    let server = panel.seed_server(&owner, &node);
    panel.seed_user("friend@example.com", "friend");

    let subuser = panel
        .subuser_creation()
        .handle(&server, "friend@example.com", &PermissionSet::new(["power.start"]))
        .unwrap();
    panel.daemon.reset();
    (panel, subuser)
}

#[test]
fn update_replaces_permissions() {
    let (panel, subuser) = granted();

    let updated = panel
        .subuser_update()
        .handle(subuser.id, &PermissionSet::new(["file.list", "Power.Stop"]))
        .unwrap();

    assert_eq!(updated.permissions, ["file.list", "power.stop"]);
    assert_eq!(updated.daemon_secret, subuser.daemon_secret);

    let body: SubuserKeyUpdate = panel.daemon.last_request().unwrap().json().unwrap();
    assert_eq!(
        body.keys[&subuser.daemon_secret],
        ["s:get", "s:console", "s:files:get", "s:power:stop"]
    );
}

#[test]
fn failed_update_keeps_old_permissions() {
    let (panel, subuser) = granted();
    panel.daemon.push_reply(Reply::Refuse);

    let err = panel
        .subuser_update()
        .handle(subuser.id, &PermissionSet::new(["file.list"]))
        .unwrap_err();

    assert!(matches!(err, ServiceError::DaemonUnreachable { .. }));
    let stored = panel.db.get::<Subuser>(subuser.id).unwrap().unwrap();
    assert_eq!(stored.permissions, ["power.start"]);
    assert_eq!(panel.sink.len(), 1);
}

#[test]
fn update_of_unknown_subuser_is_not_found() {
    let (panel, _) = granted();

    let err = panel
        .subuser_update()
        .handle(SubuserId::new(99), &PermissionSet::new(["file.list"]))
        .unwrap_err();

    assert!(matches!(err, ServiceError::NotFound { .. }));
    assert_eq!(panel.daemon.request_count(), 0);
}

#[test]
fn delete_revokes_key() {
    let (panel, subuser) = granted();

    assert!(panel.subuser_deletion().handle(subuser.id).unwrap());
    assert!(panel.db.get::<Subuser>(subuser.id).unwrap().is_none());

    let body: SubuserKeyUpdate = panel.daemon.last_request().unwrap().json().unwrap();
    assert!(body.keys[&subuser.daemon_secret].is_empty());
}

#[test]
fn failed_delete_keeps_row() {
    let (panel, subuser) = granted();
    panel.daemon.push_reply(Reply::Status(500));

    let err = panel.subuser_deletion().handle(subuser.id).unwrap_err();

    assert_eq!(err.daemon_code().map(|c| c.to_string()), Some("500".to_string()));
    assert!(panel.db.get::<Subuser>(subuser.id).unwrap().is_some());
    assert_eq!(panel.db.active_count(), 0);
}

#[test]
fn delete_of_unknown_subuser_is_false() {
    let (panel, _) = granted();

    assert!(!panel.subuser_deletion().handle(SubuserId::new(99)).unwrap());
    assert_eq!(panel.daemon.request_count(), 0);
}

#[test]
fn delete_while_another_transaction_writes_the_grant_conflicts() {
    let (panel, subuser) = granted();
    let mut writer = panel.db.begin().unwrap();
    panel
        .db
        .update::<Subuser>(
            &mut writer,
            subuser.id,
            SubuserChanges {
                permissions: Some(vec!["file.list".into()]),
                ..SubuserChanges::default()
            },
        )
        .unwrap();

    let err = panel.subuser_deletion().handle(subuser.id).unwrap_err();
    assert!(matches!(err, ServiceError::Conflict { .. }), "{err}");
    assert_eq!(panel.daemon.request_count(), 0);
    assert!(panel.sink.is_empty());
    assert_eq!(panel.db.active_count(), 1);

    let err = panel
        .subuser_update()
        .handle(subuser.id, &PermissionSet::new(["power.stop"]))
        .unwrap_err();
    assert_eq!(err.kind(), "conflict");

    panel.db.rollback(&mut writer).unwrap();
    assert!(panel.subuser_deletion().handle(subuser.id).unwrap());
    assert_eq!(panel.daemon.request_count(), 1);
}

#[test]
fn delete_after_concurrent_delete_skips_daemon() {
    let (panel, subuser) = granted();
    panel
        .db
        .transaction(|txn| panel.db.delete::<Subuser>(txn, subuser.id))
        .unwrap();

    assert!(!panel.subuser_deletion().handle(subuser.id).unwrap());
    assert_eq!(panel.daemon.request_count(), 0);
    assert_eq!(panel.db.active_count(), 0);
}
