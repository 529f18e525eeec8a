//! Wire messages of the recorder control protocol.
//!
//! The channel carries one JSON object per line in each direction. The
//! server opens with `hello`; when `hello` carries a challenge the
//! client must answer with `identify` before any request is accepted.
//! Every `request` is matched to a `response` by its `id`.

use serde::{Deserialize, Serialize};

/// Messages sent by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Greeting sent immediately after the TCP accept.
    Hello {
        version: String,
        /// Present when the server requires authentication.
        #[serde(default)]
        challenge: Option<String>,
    },
    /// Authentication accepted.
    Identified,
    /// Reply to a request.
    Response {
        id: u64,
        status: ResponseStatus,
        /// Payload for queries (version string, output path).
        #[serde(default)]
        data: Option<String>,
        /// Human-readable detail for errors.
        #[serde(default)]
        comment: Option<String>,
    },
}

/// Messages sent by this client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Answer to an authentication challenge:
    /// `hex(sha256(secret ++ challenge))`.
    Identify { auth: String },
    Request { id: u64, r#type: RequestType },
}

/// Request types the recorder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    StartRecord,
    StopRecord,
    GetVersion,
    GetOutputPath,
}

impl std::fmt::Display for RequestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestType::StartRecord => "StartRecord",
            RequestType::StopRecord => "StopRecord",
            RequestType::GetVersion => "GetVersion",
            RequestType::GetOutputPath => "GetOutputPath",
        };
        write!(f, "{}", s)
    }
}

/// Request outcome as reported by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseStatus {
    Ok,
    /// Start requested while already recording. Not an error.
    AlreadyActive,
    /// Stop requested while not recording. Not an error.
    NotActive,
    Error,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hello_with_challenge_round_trips() {
        let raw = r#"{"op":"hello","version":"recorder 1.4","challenge":"abc123"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::Hello { version, challenge } => {
                assert_eq!(version, "recorder 1.4");
                assert_eq!(challenge.as_deref(), Some("abc123"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_hello_without_challenge() {
        let raw = r#"{"op":"hello","version":"recorder 1.4"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::Hello { challenge, .. } => assert!(challenge.is_none()),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn test_request_serializes_with_type_name() {
        let msg = ClientMessage::Request {
            id: 7,
            r#type: RequestType::StartRecord,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["op"], "request");
        assert_eq!(json["id"], 7);
        assert_eq!(json["type"], "StartRecord");
    }

    #[test]
    fn test_response_status_spellings() {
        let raw = r#"{"op":"response","id":1,"status":"already_active"}"#;
        let msg: ServerMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ServerMessage::Response { status, .. } => {
                assert_eq!(status, ResponseStatus::AlreadyActive);
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }
}
