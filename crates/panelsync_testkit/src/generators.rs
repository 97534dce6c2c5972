//! Property-based test generators using proptest.

use panelsync_daemon::permissions::CATALOG;
use panelsync_daemon::PermissionSet;
use proptest::prelude::*;

/// Strategy for emails whose local part yields a valid derived username.
pub fn email_strategy() -> impl Strategy<Value = String> {
    (
        prop::string::string_regex("[a-z][a-z0-9]{0,11}").expect("Invalid regex"),
        prop::string::string_regex("[a-z]{1,10}").expect("Invalid regex"),
        prop::sample::select(vec!["com", "io", "net"]),
    )
        .prop_map(|(local, domain, tld)| format!("{local}@{domain}.{tld}"))
}

/// Strategy for non-empty sets of catalog permissions.
pub fn permission_set_strategy() -> impl Strategy<Value = PermissionSet> {
    prop::sample::subsequence(CATALOG.iter().map(|e| e.name).collect::<Vec<_>>(), 1..8)
        .prop_map(PermissionSet::new)
}

/// Strategy for tokens that violate the permission grammar.
pub fn malformed_permission_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z]{1,10}").expect("Invalid regex"),
        prop::string::string_regex("[0-9][a-z]{0,5}\\.[a-z]{1,5}").expect("Invalid regex"),
        prop::string::string_regex("[a-z]{1,5}\\.\\.[a-z]{1,5}").expect("Invalid regex"),
        prop::string::string_regex("[a-z]{1,5}\\.[a-z]{1,5}[!@#$%]").expect("Invalid regex"),
    ]
}
