//! Request bodies sent to daemons.

use crate::permissions::SyncedPermissionSet;
use panelsync_store::Node;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Body of `PATCH /v1/server`: subuser keys and their daemon permissions.
///
/// An empty permission list revokes the key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubuserKeyUpdate {
    /// Key secret to daemon permissions.
    pub keys: BTreeMap<String, Vec<String>>,
}

impl SubuserKeyUpdate {
    /// Builds an update for a single key.
    #[must_use]
    pub fn single(key: &str, permissions: &SyncedPermissionSet) -> Self {
        let mut keys = BTreeMap::new();
        keys.insert(key.to_string(), permissions.as_slice().to_vec());
        Self { keys }
    }
}

/// Body of `PATCH /v1/config`: the daemon's core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeConfiguration {
    /// HTTP listener.
    pub web: WebConfig,
    /// Embedded SFTP server.
    pub sftp: SftpConfig,
    /// Panel the daemon calls back to.
    pub remote: RemoteConfig,
    /// Upload limits.
    pub uploads: UploadConfig,
    /// Tokens accepted as `X-Access-Token`.
    pub keys: Vec<String>,
}

/// HTTP listener section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebConfig {
    /// Listen port.
    pub listen: u16,
    /// TLS settings.
    pub ssl: SslConfig,
}

/// TLS section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslConfig {
    /// Whether the daemon terminates TLS itself.
    pub enabled: bool,
    /// Certificate chain path.
    pub certificate: String,
    /// Private key path.
    pub key: String,
}

/// SFTP section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SftpConfig {
    /// Data directory served over SFTP.
    pub path: String,
    /// Listen port.
    pub port: u16,
}

/// Panel callback section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Panel base URL.
    pub base: String,
}

/// Upload section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Maximum upload size in megabytes.
    pub size_limit: u32,
}

impl NodeConfiguration {
    /// Builds the configuration a daemon should run with for `node`.
    #[must_use]
    pub fn for_node(node: &Node, panel_url: &str) -> Self {
        let live = format!("/etc/letsencrypt/live/{}", node.fqdn);
        Self {
            web: WebConfig {
                listen: node.daemon_listen,
                ssl: SslConfig {
                    enabled: node.uses_ssl(),
                    certificate: format!("{live}/fullchain.pem"),
                    key: format!("{live}/privkey.pem"),
                },
            },
            sftp: SftpConfig {
                path: node.daemon_base.clone(),
                port: node.daemon_sftp,
            },
            remote: RemoteConfig {
                base: panel_url.trim_end_matches('/').to_string(),
            },
            uploads: UploadConfig {
                size_limit: node.upload_size,
            },
            keys: vec![node.daemon_secret.clone()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::{encode, PermissionSet};
    use panelsync_store::{NewNode, NodeId, Record};

    fn node(behind_proxy: bool) -> Node {
        Node::from_fields(
            NodeId::new(3),
            NewNode {
                name: "us-east".into(),
                description: None,
                fqdn: "us-east.example.com".into(),
                scheme: "https".into(),
                behind_proxy,
                daemon_listen: 8443,
                daemon_sftp: 2022,
                daemon_base: "/srv/daemon-data".into(),
                upload_size: 250,
                daemon_secret: "node-secret".into(),
            },
        )
    }

    #[test]
    fn configuration_mirrors_node() {
        let config = NodeConfiguration::for_node(&node(false), "https://panel.example.com/");
        assert_eq!(config.web.listen, 8443);
        assert!(config.web.ssl.enabled);
        assert_eq!(
            config.web.ssl.certificate,
            "/etc/letsencrypt/live/us-east.example.com/fullchain.pem"
        );
        assert_eq!(config.sftp.port, 2022);
        assert_eq!(config.remote.base, "https://panel.example.com");
        assert_eq!(config.uploads.size_limit, 250);
        assert_eq!(config.keys, vec!["node-secret".to_string()]);
    }

    #[test]
    fn ssl_disabled_behind_proxy() {
        let config = NodeConfiguration::for_node(&node(true), "https://panel.example.com");
        assert!(!config.web.ssl.enabled);
    }

    #[test]
    fn key_update_json_shape() {
        let wire = encode(&PermissionSet::new(["power.start"])).unwrap();
        let body = serde_json::to_value(SubuserKeyUpdate::single("abc", &wire)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({ "keys": { "abc": ["s:get", "s:console", "s:power:start"] } })
        );
    }
}
