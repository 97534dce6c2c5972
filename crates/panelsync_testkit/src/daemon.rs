//! A scripted stand-in for a daemon.

use panelsync_daemon::{ConnectionKind, DaemonError, HttpClient, HttpRequest, HttpResponse};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;

/// What the mock answers with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Respond with this status and an empty body.
    Status(u16),
    /// Fail as if the connection was refused.
    Refuse,
    /// Fail as if the request timed out.
    Timeout,
}

/// Records every request and answers from a script.
///
/// Scripted replies are consumed in order; once exhausted the default reply
/// (`204 No Content` unless changed) is used.
#[derive(Debug)]
pub struct MockDaemon {
    requests: Mutex<Vec<HttpRequest>>,
    script: Mutex<VecDeque<Reply>>,
    default: Mutex<Reply>,
    delay: Mutex<Option<Duration>>,
}

impl Default for MockDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl MockDaemon {
    /// Creates a mock that accepts every request.
    pub fn new() -> Self {
        Self {
            requests: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            default: Mutex::new(Reply::Status(204)),
            delay: Mutex::new(None),
        }
    }

    /// Sets the reply used once the script is exhausted.
    pub fn set_default(&self, reply: Reply) {
        *self.default.lock() = reply;
    }

    /// Queues a reply for the next unanswered request.
    pub fn push_reply(&self, reply: Reply) {
        self.script.lock().push_back(reply);
    }

    /// Sleeps this long before answering each request.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Returns all recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of recorded requests.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Returns the most recent request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    /// Forgets recorded requests and scripted replies.
    pub fn reset(&self) {
        self.requests.lock().clear();
        self.script.lock().clear();
    }
}

impl HttpClient for MockDaemon {
    fn send(&self, request: HttpRequest) -> Result<HttpResponse, DaemonError> {
        self.requests.lock().push(request);
        if let Some(delay) = *self.delay.lock() {
            std::thread::sleep(delay);
        }

        let reply = self
            .script
            .lock()
            .pop_front()
            .unwrap_or(*self.default.lock());
        match reply {
            Reply::Status(status) => Ok(HttpResponse::new(status)),
            Reply::Refuse => Err(DaemonError::connection(
                ConnectionKind::ConnectionRefused,
                "connection refused",
            )),
            Reply::Timeout => Err(DaemonError::connection(
                ConnectionKind::Timeout,
                "operation timed out",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panelsync_daemon::Method;

    fn request() -> HttpRequest {
        HttpRequest::new(Method::Patch, "http://node:8080/v1/server")
    }

    #[test]
    fn script_then_default() {
        let mock = MockDaemon::new();
        mock.push_reply(Reply::Status(400));
        mock.push_reply(Reply::Refuse);

        assert_eq!(mock.send(request()).unwrap().status, 400);
        assert!(mock.send(request()).is_err());
        assert_eq!(mock.send(request()).unwrap().status, 204);
        assert_eq!(mock.request_count(), 3);

        mock.set_default(Reply::Timeout);
        let err = mock.send(request()).unwrap_err();
        assert!(matches!(
            err,
            DaemonError::Connection {
                kind: ConnectionKind::Timeout,
                ..
            }
        ));
    }

    #[test]
    fn reset_clears_history() {
        let mock = MockDaemon::new();
        mock.send(request()).unwrap();
        mock.reset();
        assert_eq!(mock.request_count(), 0);
        assert!(mock.last_request().is_none());
    }
}
