//! Transport layer abstraction for version requests.

use crate::error::{ClientError, ClientResult};
use parking_lot::Mutex;
use revisor_history::VersionMessage;
use revisor_server::VersionServer;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A version transport delivers requests to a version server.
///
/// Error replies from the server are returned as
/// [`VersionMessage::Error`]; only failures of the transport itself are
/// returned as `Err`.
pub trait VersionTransport: Send + Sync {
    /// Sends one request and waits for its reply.
    fn exchange(&self, request: &VersionMessage) -> ClientResult<VersionMessage>;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport.
    fn close(&self) -> ClientResult<()>;
}

/// A transport that routes CBOR-encoded requests to an in-process server.
///
/// Every request goes through the same encode/decode path a network
/// transport would use.
#[derive(Debug)]
pub struct LoopbackTransport {
    server: Arc<VersionServer>,
    connected: AtomicBool,
}

impl LoopbackTransport {
    /// Creates a transport connected to `server`.
    pub fn new(server: Arc<VersionServer>) -> Self {
        Self {
            server,
            connected: AtomicBool::new(true),
        }
    }

    /// Returns the server this transport is connected to.
    pub fn server(&self) -> &Arc<VersionServer> {
        &self.server
    }
}

impl VersionTransport for LoopbackTransport {
    fn exchange(&self, request: &VersionMessage) -> ClientResult<VersionMessage> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }

        let body = request.encode()?;
        let reply = self
            .server
            .handle_bytes(&body)
            .map_err(|e| ClientError::transport_retryable(e.to_string()))?;
        Ok(VersionMessage::decode(&reply)?)
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// A scripted transport for testing.
///
/// Replies are returned in the order they were queued; every request is
/// recorded.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    replies: Mutex<VecDeque<ClientResult<VersionMessage>>>,
    requests: Mutex<Vec<VersionMessage>>,
}

impl MockTransport {
    /// Creates a connected mock transport with no queued replies.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queues a reply.
    pub fn push_reply(&self, reply: VersionMessage) {
        self.replies.lock().push_back(Ok(reply));
    }

    /// Queues a transport failure.
    pub fn push_error(&self, error: ClientError) {
        self.replies.lock().push_back(Err(error));
    }

    /// Returns every request sent so far.
    pub fn requests(&self) -> Vec<VersionMessage> {
        self.requests.lock().clone()
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl VersionTransport for MockTransport {
    fn exchange(&self, request: &VersionMessage) -> ClientResult<VersionMessage> {
        if !self.is_connected() {
            return Err(ClientError::NotConnected);
        }
        self.requests.lock().push(request.clone());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(ClientError::Protocol("no mock reply queued".into())))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> ClientResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use revisor_history::{AuthToken, DocumentRevision, HeadRequest};
    use revisor_server::ServerConfig;

    fn head_request() -> VersionMessage {
        VersionMessage::Head(HeadRequest {
            token: AuthToken::new("alice"),
            document_id: "pizza".into(),
        })
    }

    #[test]
    fn mock_transport_connection() {
        let transport = MockTransport::new();
        assert!(transport.is_connected());

        transport.close().unwrap();
        assert!(!transport.is_connected());
        assert!(matches!(
            transport.exchange(&head_request()),
            Err(ClientError::NotConnected)
        ));
    }

    #[test]
    fn mock_transport_replays_script() {
        let transport = MockTransport::new();
        transport.push_reply(VersionMessage::HeadRevision(DocumentRevision::new(3)));
        transport.push_error(ClientError::transport_retryable("reset"));

        assert_eq!(
            transport.exchange(&head_request()).unwrap(),
            VersionMessage::HeadRevision(DocumentRevision::new(3))
        );
        assert!(transport.exchange(&head_request()).is_err());
        assert!(matches!(
            transport.exchange(&head_request()),
            Err(ClientError::Protocol(_))
        ));
        assert_eq!(transport.requests().len(), 3);
    }

    #[test]
    fn loopback_reaches_server() {
        let server = Arc::new(VersionServer::open(ServerConfig::default()).unwrap());
        server
            .create_project(&AuthToken::new("alice"), "pizza", "")
            .unwrap();

        let transport = LoopbackTransport::new(Arc::clone(&server));
        assert_eq!(
            transport.exchange(&head_request()).unwrap(),
            VersionMessage::HeadRevision(DocumentRevision::ZERO)
        );
    }
}
