//! Defines the JSON-RPC 2.0 envelope spoken over stdin/stdout, one message
//! per line.

use serde::Serialize;
use serde_json::{Number, Value};

use crate::error::RpcError;
use crate::record::Params;

pub const JSONRPC_VERSION: &str = "2.0";

/// Written when a response cannot be serialized at all.
const FALLBACK_ERROR: &str =
    r#"{"jsonrpc":"2.0","id":null,"error":{"code":1004,"message":"Internal error"}}"#;

/// The request `id`, echoed verbatim in the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestId {
    /// A notification: the response carries no `id` member.
    Absent,
    Null,
    Number(Number),
    String(String),
}

impl RequestId {
    /// `None` for JSON types an id may not have.
    fn from_member(value: Option<&Value>) -> Option<Self> {
        match value {
            None => Some(RequestId::Absent),
            Some(Value::Null) => Some(RequestId::Null),
            Some(Value::Number(n)) => Some(RequestId::Number(n.clone())),
            Some(Value::String(s)) => Some(RequestId::String(s.clone())),
            Some(_) => None,
        }
    }

    fn to_member(&self) -> Option<Value> {
        match self {
            RequestId::Absent => None,
            RequestId::Null => Some(Value::Null),
            RequestId::Number(n) => Some(Value::Number(n.clone())),
            RequestId::String(s) => Some(Value::String(s.clone())),
        }
    }
}

/// A decoded inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub id: RequestId,
    pub method: String,
    pub params: Params,
}

/// A line that is not a valid request, with whatever id could be recovered.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeFailure {
    pub id: RequestId,
    pub error: RpcError,
}

/// Decode one line of input into a request.
pub fn decode(line: &str) -> Result<Request, DecodeFailure> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| malformed(RequestId::Null, format!("Parse error: {e}")))?;

    let Value::Object(mut message) = value else {
        return Err(malformed(RequestId::Null, "Request must be a JSON object"));
    };

    // Malformed requests are answered with a null id unless a valid one is recoverable
    let id = RequestId::from_member(message.get("id"));
    let reply_id = match &id {
        Some(RequestId::Absent) | None => RequestId::Null,
        Some(id) => id.clone(),
    };
    let Some(id) = id else {
        return Err(malformed(reply_id, "id must be a string, number or null"));
    };

    match message.get("jsonrpc") {
        None => {}
        Some(Value::String(v)) if v == JSONRPC_VERSION => {}
        Some(_) => return Err(malformed(reply_id, "jsonrpc must be \"2.0\"")),
    }

    let method = match message.remove("method") {
        Some(Value::String(method)) => method,
        Some(_) => return Err(malformed(reply_id, "method must be a string")),
        None => return Err(malformed(reply_id, "method is required")),
    };

    let params = match message.remove("params") {
        None | Some(Value::Null) => Params::new(),
        Some(Value::Object(params)) => params,
        Some(_) => return Err(malformed(reply_id, "params must be an object")),
    };

    Ok(Request { id, method, params })
}

fn malformed(id: RequestId, message: impl Into<String>) -> DecodeFailure {
    DecodeFailure {
        id,
        error: RpcError::MalformedRequest(message.into()),
    }
}

#[derive(Serialize)]
struct Response {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorBody>,
}

#[derive(Serialize)]
struct ErrorBody {
    code: i64,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// Encode a success response as a single line (no trailing newline).
pub fn encode_result(id: &RequestId, result: Value) -> String {
    to_line(&Response {
        jsonrpc: JSONRPC_VERSION,
        id: id.to_member(),
        result: Some(result),
        error: None,
    })
}

/// Encode an error response as a single line (no trailing newline).
pub fn encode_error(id: &RequestId, error: &RpcError) -> String {
    to_line(&Response {
        jsonrpc: JSONRPC_VERSION,
        id: id.to_member(),
        result: None,
        error: Some(ErrorBody {
            code: error.code(),
            message: error.to_string(),
            data: error.data(),
        }),
    })
}

fn to_line(response: &Response) -> String {
    serde_json::to_string(response).unwrap_or_else(|e| {
        tracing::error!("Failed to serialize response: {}", e);
        FALLBACK_ERROR.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::code;
    use crate::kind::ResourceKind;
    use serde_json::json;

    fn parse(line: &str) -> Value {
        serde_json::from_str(line).unwrap()
    }

    #[test]
    fn test_decode_full_request() {
        let request = decode(
            r#"{"jsonrpc":"2.0","id":7,"method":"caldav.event.read","params":{"id":"abc"}}"#,
        )
        .unwrap();

        assert_eq!(request.id, RequestId::Number(7.into()));
        assert_eq!(request.method, "caldav.event.read");
        assert_eq!(request.params.get("id"), Some(&json!("abc")));
    }

    #[test]
    fn test_decode_without_version_or_params() {
        let request = decode(r#"{"id":"a1","method":"caldav.todo.list"}"#).unwrap();
        assert_eq!(request.id, RequestId::String("a1".into()));
        assert!(request.params.is_empty());
    }

    #[test]
    fn test_decode_null_params() {
        let request = decode(r#"{"id":1,"method":"caldav.todo.list","params":null}"#).unwrap();
        assert!(request.params.is_empty());
    }

    #[test]
    fn test_invalid_json_has_null_id() {
        let failure = decode("{not json").unwrap_err();
        assert_eq!(failure.id, RequestId::Null);
        assert_eq!(failure.error.code(), code::MALFORMED_REQUEST);
    }

    #[test]
    fn test_failure_keeps_recoverable_id() {
        let failure = decode(r#"{"id":"req-9","method":42}"#).unwrap_err();
        assert_eq!(failure.id, RequestId::String("req-9".into()));

        let failure = decode(r#"{"id":3,"method":"caldav.event.list","params":[1]}"#).unwrap_err();
        assert_eq!(failure.id, RequestId::Number(3.into()));
    }

    #[test]
    fn test_rejects_other_versions_and_id_types() {
        let failure = decode(r#"{"jsonrpc":"1.0","id":1,"method":"x"}"#).unwrap_err();
        assert_eq!(failure.id, RequestId::Number(1.into()));
        assert_eq!(failure.error.code(), code::MALFORMED_REQUEST);

        let failure = decode(r#"{"id":{"a":1},"method":"x"}"#).unwrap_err();
        assert_eq!(failure.id, RequestId::Null);

        assert!(decode("[1,2]").is_err());
    }

    #[test]
    fn test_encode_result_echoes_id() {
        let line = encode_result(&RequestId::String("abc".into()), json!({"items": []}));
        assert_eq!(
            parse(&line),
            json!({"jsonrpc": "2.0", "id": "abc", "result": {"items": []}})
        );
        assert!(!line.contains('\n'));
    }

    #[test]
    fn test_null_id_is_echoed_and_absent_id_is_omitted() {
        let null = parse(&encode_result(&RequestId::Null, json!(1)));
        assert_eq!(null.get("id"), Some(&Value::Null));

        let absent = parse(&encode_result(&RequestId::Absent, json!(1)));
        assert!(absent.get("id").is_none());
    }

    #[test]
    fn test_encode_error_with_data() {
        let err = RpcError::NotFound {
            kind: ResourceKind::Event,
            id: "nope".into(),
        };
        let line = encode_error(&RequestId::Number(5.into()), &err);

        assert_eq!(
            parse(&line),
            json!({
                "jsonrpc": "2.0",
                "id": 5,
                "error": {
                    "code": 1002,
                    "message": "Event not found: nope",
                    "data": {"kind": "event", "id": "nope"}
                }
            })
        );
    }

    #[test]
    fn test_encode_error_without_data() {
        let line = encode_error(&RequestId::Null, &RpcError::Internal);
        let value = parse(&line);
        assert_eq!(value["error"], json!({"code": 1004, "message": "Internal error"}));
    }

    #[test]
    fn test_fallback_is_valid_json() {
        let value = parse(FALLBACK_ERROR);
        assert_eq!(value["error"]["code"], json!(code::INTERNAL_ERROR));
    }
}
