//! Routing of protocol messages to server operations.

use crate::error::{ServerError, ServerResult};
use crate::server::VersionServer;
use revisor_history::VersionMessage;

/// Handles one request message, turning failures into error replies.
pub(crate) fn dispatch(server: &VersionServer, message: VersionMessage) -> VersionMessage {
    let type_code = message.type_code();
    match route(server, message) {
        Ok(reply) => reply,
        Err(e) => {
            if e.is_server_error() {
                tracing::warn!(type_code, error = %e, "request failed");
            } else {
                tracing::debug!(type_code, error = %e, "request rejected");
            }
            VersionMessage::Error(e.to_response())
        }
    }
}

fn route(server: &VersionServer, message: VersionMessage) -> ServerResult<VersionMessage> {
    match message {
        VersionMessage::CreateProject(req) => server
            .create_project(&req.token, &req.document_id, &req.description)
            .map(VersionMessage::ProjectCreated),
        VersionMessage::Commit(req) => server
            .commit(&req.token, &req.document_id, req.commit)
            .map(VersionMessage::Committed),
        VersionMessage::Head(req) => server
            .head_revision(&req.token, &req.document_id)
            .map(VersionMessage::HeadRevision),
        VersionMessage::FetchChanges(req) => server
            .fetch_changes(&req.token, &req.document_id, req.after, req.through)
            .map(VersionMessage::Changes),
        VersionMessage::LatestCheckpoint(req) => server
            .latest_checkpoint(&req.token, &req.document_id, req.target)
            .map(VersionMessage::Checkpoint),
        VersionMessage::RevisionLog(req) => server
            .revision_log(&req.token, &req.document_id, req.revision)
            .map(VersionMessage::RevisionLogEntry),
        VersionMessage::LatestRevisionLog(req) => server
            .latest_revision_log(&req.token, &req.document_id, req.limit as usize)
            .map(VersionMessage::RevisionLogEntries),
        VersionMessage::ListDocuments(req) => server
            .list_documents(&req.token)
            .map(VersionMessage::Documents),
        other => Err(ServerError::InvalidRequest(format!(
            "message type {} is not a request",
            other.type_code()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use crate::config::ServerConfig;
    use crate::server::VersionServer;
    use revisor_history::{
        AuthToken, ChangeOperation, CommitBundle, CommitRequest, CreateProjectRequest,
        DocumentRevision, ErrorKind, HeadRequest, Statement, VersionMessage,
    };

    fn token() -> AuthToken {
        AuthToken::new("alice")
    }

    fn server() -> VersionServer {
        let server = VersionServer::open(ServerConfig::default()).unwrap();
        let reply = server.handle_message(VersionMessage::CreateProject(CreateProjectRequest {
            token: token(),
            document_id: "pizza".into(),
            description: "Pizza".into(),
        }));
        assert!(matches!(reply, VersionMessage::ProjectCreated(_)));
        server
    }

    fn commit(baseline: u64, op: ChangeOperation) -> VersionMessage {
        VersionMessage::Commit(CommitRequest {
            token: token(),
            document_id: "pizza".into(),
            commit: CommitBundle::new(DocumentRevision::new(baseline), vec![op], "c"),
        })
    }

    #[test]
    fn message_dispatch() {
        let server = server();
        let reply = server.handle_message(commit(
            0,
            ChangeOperation::AddStatement(Statement::new("S1")),
        ));
        match reply {
            VersionMessage::Committed(outcome) => {
                assert_eq!(outcome.revision, DocumentRevision::START)
            }
            other => panic!("unexpected reply {other:?}"),
        }

        let head = server.handle_message(VersionMessage::Head(HeadRequest {
            token: token(),
            document_id: "pizza".into(),
        }));
        assert_eq!(head, VersionMessage::HeadRevision(DocumentRevision::START));
    }

    #[test]
    fn conflict_becomes_error_reply() {
        let server = server();
        server.handle_message(commit(0, ChangeOperation::AddStatement(Statement::new("S1"))));
        let reply = server.handle_message(commit(
            0,
            ChangeOperation::RemoveStatement(Statement::new("S1")),
        ));
        match reply {
            VersionMessage::Error(err) => {
                assert_eq!(err.kind, ErrorKind::Conflict);
                assert_eq!(err.conflicts.len(), 1);
            }
            other => panic!("unexpected reply {other:?}"),
        }
    }

    #[test]
    fn responses_are_not_requests() {
        let server = server();
        let reply = server.handle_message(VersionMessage::HeadRevision(DocumentRevision::ZERO));
        assert!(matches!(
            reply,
            VersionMessage::Error(err) if err.kind == ErrorKind::InvalidRequest
        ));
    }

    #[test]
    fn bytes_round_trip() {
        let server = server();
        let request = commit(0, ChangeOperation::AddStatement(Statement::new("S1")));
        let reply = server.handle_bytes(&request.encode().unwrap()).unwrap();
        assert!(matches!(
            VersionMessage::decode(&reply).unwrap(),
            VersionMessage::Committed(_)
        ));

        let garbage = server.handle_bytes(&[0xff, 0xfe]).unwrap();
        assert!(matches!(
            VersionMessage::decode(&garbage).unwrap(),
            VersionMessage::Error(err) if err.kind == ErrorKind::InvalidRequest
        ));
    }
}
