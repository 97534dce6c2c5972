//! Address-then-act façade over the daemon API.
//!
//! ```text
//! client.for_node(&node)                          // X-Access-Token: node secret
//!       .for_server(server.uuid)                  // X-Access-Server: server uuid
//!       .set_subuser_key(&secret, &permissions)   // PATCH /v1/server
//!
//! client.for_node(&node)
//!       .set_access_token(old_secret)
//!       .update_configuration(&config)            // PATCH /v1/config
//! ```
//!
//! Every call is a single attempt. Retrying is left to callers.

use crate::error::{DaemonError, DaemonResult};
use crate::messages::{NodeConfiguration, SubuserKeyUpdate};
use crate::permissions::SyncedPermissionSet;
use crate::transport::{HttpClient, HttpRequest, Method};
use panelsync_store::{Node, NodeId};
use serde::Serialize;
use uuid::Uuid;

/// Header carrying the node's daemon secret.
pub const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";
/// Header selecting the server a call applies to.
pub const ACCESS_SERVER_HEADER: &str = "X-Access-Server";

const MAX_ERROR_BODY: usize = 256;

/// Entry point for daemon calls.
#[derive(Debug, Clone)]
pub struct DaemonClient<C> {
    http: C,
}

impl<C: HttpClient> DaemonClient<C> {
    /// Creates a client over an HTTP transport.
    pub fn new(http: C) -> Self {
        Self { http }
    }

    /// Returns the transport.
    pub fn http(&self) -> &C {
        &self.http
    }

    /// Addresses the daemon running on `node`.
    pub fn for_node(&self, node: &Node) -> NodeScope<'_, C> {
        NodeScope {
            client: self,
            node_id: node.id,
            base_url: format!("{}/v1", node.connection_address()),
            access_token: node.daemon_secret.clone(),
        }
    }
}

/// Calls addressed to one daemon.
#[derive(Debug)]
pub struct NodeScope<'a, C> {
    client: &'a DaemonClient<C>,
    node_id: NodeId,
    base_url: String,
    access_token: String,
}

impl<'a, C: HttpClient> NodeScope<'a, C> {
    /// Overrides the token sent as `X-Access-Token`.
    ///
    /// Used when the node's secret is being rotated: the daemon still only
    /// accepts the previous one.
    #[must_use]
    pub fn set_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = token.into();
        self
    }

    /// Returns the API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Narrows the scope to one server.
    pub fn for_server(self, server: Uuid) -> ServerScope<'a, C> {
        ServerScope { node: self, server }
    }

    /// Pushes the daemon's core configuration.
    pub fn update_configuration(&self, config: &NodeConfiguration) -> DaemonResult<()> {
        self.send(Method::Patch, "/config", None, config)
    }

    fn send<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        server: Option<Uuid>,
        body: &B,
    ) -> DaemonResult<()> {
        let body = serde_json::to_vec(body).map_err(|e| DaemonError::Protocol(e.to_string()))?;
        let mut request = HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .with_header(ACCESS_TOKEN_HEADER, self.access_token.clone())
            .with_header("Accept", "application/json")
            .with_header("Content-Type", "application/json")
            .with_body(body);
        if let Some(server) = server {
            request = request.with_header(ACCESS_SERVER_HEADER, server.to_string());
        }

        tracing::debug!(node = %self.node_id, %method, url = %request.url, "daemon request");
        let response = self.client.http.send(request)?;
        if response.is_success() {
            return Ok(());
        }

        let mut message = String::from_utf8_lossy(&response.body).into_owned();
        if message.len() > MAX_ERROR_BODY {
            let cut = (0..=MAX_ERROR_BODY)
                .rev()
                .find(|&i| message.is_char_boundary(i))
                .unwrap_or(0);
            message.truncate(cut);
        }
        Err(DaemonError::rejected(response.status, message))
    }
}

/// Calls addressed to one server on one daemon.
#[derive(Debug)]
pub struct ServerScope<'a, C> {
    node: NodeScope<'a, C>,
    server: Uuid,
}

impl<C: HttpClient> ServerScope<'_, C> {
    /// Sets the daemon permissions of a subuser key.
    pub fn set_subuser_key(&self, key: &str, permissions: &SyncedPermissionSet) -> DaemonResult<()> {
        let body = SubuserKeyUpdate::single(key, permissions);
        self.node
            .send(Method::Patch, "/server", Some(self.server), &body)
    }

    /// Revokes a subuser key.
    pub fn revoke_subuser_key(&self, key: &str) -> DaemonResult<()> {
        self.set_subuser_key(key, &SyncedPermissionSet::revoked())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectionKind;
    use crate::permissions::{encode, PermissionSet};
    use crate::transport::HttpResponse;
    use panelsync_store::{NewNode, Record};
    use std::sync::Mutex;

    struct Recorder {
        reply: Result<u16, ConnectionKind>,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl Recorder {
        fn replying(reply: Result<u16, ConnectionKind>) -> Self {
            Self {
                reply,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl HttpClient for Recorder {
        fn send(&self, request: HttpRequest) -> Result<HttpResponse, DaemonError> {
            self.seen.lock().unwrap().push(request);
            match self.reply {
                Ok(status) => Ok(HttpResponse::new(status).with_body("nope")),
                Err(kind) => Err(DaemonError::connection(kind, "down")),
            }
        }
    }

    fn node() -> Node {
        Node::from_fields(
            NodeId::new(1),
            NewNode {
                name: "eu".into(),
                description: None,
                fqdn: "eu.example.com".into(),
                scheme: "https".into(),
                behind_proxy: false,
                daemon_listen: 8080,
                daemon_sftp: 2022,
                daemon_base: "/srv".into(),
                upload_size: 100,
                daemon_secret: "node-secret".into(),
            },
        )
    }

    #[test]
    fn subuser_key_request_shape() {
        let client = DaemonClient::new(Recorder::replying(Ok(204)));
        let server = Uuid::new_v4();
        let wire = encode(&PermissionSet::new(["command.send"])).unwrap();

        client
            .for_node(&node())
            .for_server(server)
            .set_subuser_key("sub-secret", &wire)
            .unwrap();

        let seen = client.http().seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        let req = &seen[0];
        assert_eq!(req.method, Method::Patch);
        assert_eq!(req.url, "https://eu.example.com:8080/v1/server");
        assert_eq!(req.header(ACCESS_TOKEN_HEADER), Some("node-secret"));
        let server_header = server.to_string();
        assert_eq!(req.header(ACCESS_SERVER_HEADER), Some(server_header.as_str()));
        let body: SubuserKeyUpdate = req.json().unwrap();
        assert_eq!(body.keys["sub-secret"], ["s:get", "s:console", "s:command"]);
    }

    #[test]
    fn access_token_override() {
        let client = DaemonClient::new(Recorder::replying(Ok(200)));
        let node = node();
        client
            .for_node(&node)
            .set_access_token("old-secret")
            .update_configuration(&NodeConfiguration::for_node(&node, "https://panel"))
            .unwrap();

        let seen = client.http().seen.lock().unwrap();
        assert_eq!(seen[0].path(), "/v1/config");
        assert_eq!(seen[0].header(ACCESS_TOKEN_HEADER), Some("old-secret"));
        assert_eq!(seen[0].header(ACCESS_SERVER_HEADER), None);
    }

    #[test]
    fn non_success_status_is_rejected() {
        let client = DaemonClient::new(Recorder::replying(Ok(400)));
        let err = client
            .for_node(&node())
            .for_server(Uuid::new_v4())
            .revoke_subuser_key("k")
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn transport_failure_passes_through() {
        let client = DaemonClient::new(Recorder::replying(Err(ConnectionKind::ConnectionRefused)));
        let err = client
            .for_node(&node())
            .update_configuration(&NodeConfiguration::for_node(&node(), "https://panel"))
            .unwrap_err();
        assert_eq!(err.code().to_string(), "E_CONN_REFUSED");
    }
}
