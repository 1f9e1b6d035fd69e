/// Job descriptors written by the guest and the error payloads sent back
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use super::BridgeError;

/// Outbound HTTP request the guest wants performed
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpJob {
    #[serde(default = "default_method")]
    pub method: String,
    pub url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    /// Guest path holding the request body; ignored when `body` is set
    #[serde(default)]
    pub body_file: Option<String>,
    /// Seconds
    #[serde(default)]
    pub timeout: Option<f64>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Tokenized chain command line
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CastJob {
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum JobKind {
    Http(HttpJob),
    Cast(CastJob),
    /// Parsed fine but names a type this host does not serve
    Unknown(String),
}

/// Parse a request descriptor. Malformed JSON or a malformed body for a
/// known type is an error; an unrecognized `type` is not.
pub fn parse_job(raw: &[u8]) -> Result<JobKind, BridgeError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| BridgeError::Descriptor(format!("invalid JSON: {}", e)))?;

    let kind = match value.get("type") {
        Some(Value::String(kind)) => kind.clone(),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    };

    match kind.as_str() {
        "http" => serde_json::from_value(value)
            .map(JobKind::Http)
            .map_err(|e| BridgeError::Descriptor(format!("invalid http request: {}", e))),
        "cast" => serde_json::from_value(value)
            .map(JobKind::Cast)
            .map_err(|e| BridgeError::Descriptor(format!("invalid cast request: {}", e))),
        _ => Ok(JobKind::Unknown(kind)),
    }
}

/// `{"error":{"message":...}}`
pub fn error_payload(message: impl Into<String>) -> String {
    json!({ "error": { "message": message.into() } }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_job() {
        let raw = br#"{"type":"http","method":"POST","url":"https://api.test/v1",
            "headers":{"Authorization":"Bearer x"},"bodyFile":"/tmp/body.json","timeout":30}"#;
        match parse_job(raw).unwrap() {
            JobKind::Http(job) => {
                assert_eq!(job.method, "POST");
                assert_eq!(job.headers.get("Authorization").unwrap(), "Bearer x");
                assert_eq!(job.body_file.as_deref(), Some("/tmp/body.json"));
                assert!(job.body.is_none());
                assert_eq!(job.timeout, Some(30.0));
            }
            other => panic!("expected http job, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_cast_job() {
        let raw = br#"{"type":"cast","args":["block-number","--rpc-url","http://node"]}"#;
        match parse_job(raw).unwrap() {
            JobKind::Cast(job) => assert_eq!(job.args.len(), 3),
            other => panic!("expected cast job, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_and_malformed() {
        match parse_job(br#"{"type":"ftp"}"#).unwrap() {
            JobKind::Unknown(kind) => assert_eq!(kind, "ftp"),
            other => panic!("expected unknown, got {:?}", other),
        }
        assert!(matches!(parse_job(b"{}").unwrap(), JobKind::Unknown(k) if k == "undefined"));
        assert!(parse_job(b"{not json").is_err());
        // http without a url is malformed, not unknown
        assert!(parse_job(br#"{"type":"http"}"#).is_err());
    }

    #[test]
    fn test_error_payload_shape() {
        let payload: Value = serde_json::from_str(&error_payload("unknown request type: ftp")).unwrap();
        assert_eq!(payload, json!({"error": {"message": "unknown request type: ftp"}}));
    }
}
