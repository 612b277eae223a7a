//! Transport abstraction for backend requests.
//!
//! The transport receives fully built requests (frame plus body bytes) and
//! returns the raw response. Implementations may use a real HTTP client or
//! a scripted in-memory backend.

use async_trait::async_trait;
use bytes::Bytes;

use covertrace_core::WireRequest;

use crate::error::Result;

/// Status and body of a backend response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Bytes,
}

impl Response {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response carrying `value` as JSON.
    pub fn json(value: &serde_json::Value) -> Self {
        Self::new(200, value.to_string())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport trait for executing backend requests.
///
/// Implementations must be thread-safe (Send + Sync). A failure to obtain
/// any response is reported as [`NetworkError::Connection`](crate::NetworkError::Connection);
/// non-success statuses are returned as responses, not errors.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, request: WireRequest) -> Result<Response>;
}

/// A scripted in-memory backend for testing.
///
/// Replies are matched by URL suffix. One-shot replies are consumed in
/// order before the route's standing reply is used. Every executed request
/// is recorded.
pub mod memory {
    use super::*;
    use std::collections::VecDeque;
    use tokio::sync::Mutex;

    use crate::error::NetworkError;

    /// What a route answers with.
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Reply {
        Respond(Response),
        /// Fail as if the connection dropped.
        Drop,
        /// Hang for the given time, then fail as if the connection timed out.
        Stall(std::time::Duration),
    }

    #[derive(Debug)]
    struct Route {
        suffix: String,
        once: VecDeque<Reply>,
        standing: Option<Reply>,
    }

    #[derive(Debug, Default)]
    struct Script {
        routes: Vec<Route>,
        requests: Vec<WireRequest>,
    }

    impl Script {
        fn route_mut(&mut self, suffix: &str) -> &mut Route {
            let position = self.routes.iter().position(|r| r.suffix == suffix);
            let index = match position {
                Some(index) => index,
                None => {
                    self.routes.push(Route {
                        suffix: suffix.to_string(),
                        once: VecDeque::new(),
                        standing: None,
                    });
                    self.routes.len() - 1
                }
            };
            &mut self.routes[index]
        }

        fn next_reply(&mut self, url: &str) -> Option<Reply> {
            let mut matching = self.routes.iter_mut().filter(|r| url.ends_with(&r.suffix));
            let mut standing = None;
            for route in &mut matching {
                if let Some(reply) = route.once.pop_front() {
                    return Some(reply);
                }
                if standing.is_none() {
                    standing = route.standing.clone();
                }
            }
            standing
        }
    }

    /// In-memory transport implementation.
    #[derive(Debug, Default)]
    pub struct ScriptedTransport {
        script: Mutex<Script>,
    }

    impl ScriptedTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every request whose URL ends with `suffix` with `reply`.
        pub async fn on(&self, suffix: &str, reply: Reply) {
            self.script.lock().await.route_mut(suffix).standing = Some(reply);
        }

        /// Answer the next request whose URL ends with `suffix` with `reply`.
        pub async fn once(&self, suffix: &str, reply: Reply) {
            self.script.lock().await.route_mut(suffix).once.push_back(reply);
        }

        /// Every request executed so far, in order.
        pub async fn requests(&self) -> Vec<WireRequest> {
            self.script.lock().await.requests.clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: WireRequest) -> Result<Response> {
            let reply = {
                let mut script = self.script.lock().await;
                let reply = script.next_reply(&request.frame.url);
                script.requests.push(request);
                reply
            };
            match reply {
                Some(Reply::Respond(response)) => Ok(response),
                Some(Reply::Drop) => Err(NetworkError::Connection),
                Some(Reply::Stall(delay)) => {
                    tokio::time::sleep(delay).await;
                    Err(NetworkError::Connection)
                }
                None => Ok(Response::new(404, Bytes::new())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::{Reply, ScriptedTransport};
    use super::*;
    use crate::error::NetworkError;
    use covertrace_core::catalog::endpoints;
    use covertrace_core::KeysRequest;

    fn index_request() -> WireRequest {
        KeysRequest::Index { country: None }.build(endpoints::KEYS_BASE_URL)
    }

    #[tokio::test]
    async fn test_scripted_standing_reply() {
        let transport = ScriptedTransport::new();
        transport
            .on("/v1/keys/index", Reply::Respond(Response::new(200, "ok")))
            .await;

        for _ in 0..2 {
            let response = transport.execute(index_request()).await.unwrap();
            assert!(response.is_success());
        }
        assert_eq!(transport.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_scripted_once_before_standing() {
        let transport = ScriptedTransport::new();
        transport
            .on("/v1/keys/index", Reply::Respond(Response::new(200, "later")))
            .await;
        transport.once("/v1/keys/index", Reply::Drop).await;

        let first = transport.execute(index_request()).await;
        assert!(matches!(first, Err(NetworkError::Connection)));
        let second = transport.execute(index_request()).await.unwrap();
        assert_eq!(second.body, Bytes::from_static(b"later"));
    }

    #[tokio::test]
    async fn test_stalled_route_times_out() {
        let transport = ScriptedTransport::new();
        transport
            .on("/v1/keys/index", Reply::Stall(std::time::Duration::from_secs(5)))
            .await;

        let result = tokio::time::timeout(
            std::time::Duration::from_millis(20),
            transport.execute(index_request()),
        )
        .await;
        assert!(result.is_err());
        // The stalled request was still recorded and did not hold the script.
        assert_eq!(transport.requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_unscripted_route_is_not_found() {
        let transport = ScriptedTransport::new();
        let response = transport.execute(index_request()).await.unwrap();
        assert_eq!(response.status, 404);
        assert!(!response.is_success());
    }
}
