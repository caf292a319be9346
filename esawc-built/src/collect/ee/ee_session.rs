use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use crate::collect::ee::auth;
use crate::collect::ee::expression::Expression;
use crate::collect::ee::{ComputeBackend, MapRequest};
use crate::error::{BuiltupError, Result};

/// Public Earth Engine REST endpoint (EE_API_URL overrides it)
pub const DEFAULT_API_URL: &str = "https://earthengine.googleapis.com/v1";

/// Earth Engine session
/// Created once before a batch run and passed by reference to every query.
/// Holds the HTTP client, the project and the OAuth access token.
pub struct EeSession {
    client: Client,
    api_url: Url,
    project: String,
    access_token: String,
}

#[derive(Deserialize)]
struct ComputeValueResponse {
    result: Option<Value>,
}

#[derive(Deserialize)]
struct MapResponse {
    name: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    status: Option<String>,
}

impl EeSession {
    /// Authenticate and open a session
    /// Runs the interactive `earthengine authenticate` flow when no credentials exist yet.
    pub fn initialize() -> Result<Self> {
        let client = Client::new();
        let grant = auth::resolve_access(&client)?;
        let api_url = std::env::var("EE_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self::from_parts(client, &api_url, grant.project, grant.access_token)
    }

    /// Open a session with an already issued access token
    pub fn new(api_url: &str, project: &str, access_token: &str) -> Result<Self> {
        Self::from_parts(
            Client::new(),
            api_url,
            project.to_string(),
            access_token.to_string(),
        )
    }

    fn from_parts(
        client: Client,
        api_url: &str,
        project: String,
        access_token: String,
    ) -> Result<Self> {
        let api_url = Url::parse(api_url)
            .map_err(|e| BuiltupError::InvalidResponse(format!("invalid API URL {}: {}", api_url, e)))?;
        Ok(EeSession {
            client,
            api_url,
            project,
            access_token,
        })
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// `{api}/projects/{project}/{method}`
    fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.api_url.as_str().trim_end_matches('/'),
            self.project,
            method
        )
    }

    fn post_json(&self, url: &str, body: &Value) -> Result<Value> {
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(body)
            .send()?;

        let status = response.status();
        let text = response.text()?;
        if !status.is_success() {
            return Err(classify_error(status.as_u16(), &text));
        }

        Ok(serde_json::from_str(&text)?)
    }
}

/// Fragments of INVALID_ARGUMENT messages that mean "no value for this region"
/// rather than a malformed request. An empty filtered collection surfaces as a
/// missing `input` image downstream of `Collection.first`.
const NO_DATA_MESSAGES: &[&str] = &[
    "parameter 'input' is required",
    "geometry",
    "empty",
    "no data",
];

fn is_no_data_message(message: &str) -> bool {
    let message = message.to_lowercase();
    NO_DATA_MESSAGES.iter().any(|fragment| message.contains(fragment))
}

/// Map a non-2xx response onto the error taxonomy
///
/// Only a 400 whose message points at the region (empty collection, invalid
/// geometry) is recoverable; any other 400 is a request error and aborts.
pub(crate) fn classify_error(status: u16, body: &str) -> BuiltupError {
    let (message, remote_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.to_string(), None),
    };

    let invalid_argument = remote_status
        .as_deref()
        .map_or(true, |remote| remote == "INVALID_ARGUMENT");

    match status {
        400 if invalid_argument && is_no_data_message(&message) => {
            BuiltupError::DataUnavailable(message)
        }
        401 | 403 => BuiltupError::Auth(match remote_status {
            Some(remote_status) => format!("{}: {}", remote_status, message),
            None => message,
        }),
        _ => BuiltupError::Service { status, message },
    }
}

impl ComputeBackend for EeSession {
    fn compute_value(&self, expression: &Expression) -> Result<Value> {
        let url = self.endpoint("value:compute");
        let body = json!({ "expression": expression });
        let response: ComputeValueResponse = serde_json::from_value(self.post_json(&url, &body)?)?;
        Ok(response.result.unwrap_or(Value::Null))
    }

    fn create_map(&self, request: &MapRequest) -> Result<String> {
        let url = self.endpoint("maps");
        let body = serde_json::to_value(request)?;
        let response: MapResponse = serde_json::from_value(self.post_json(&url, &body)?)?;
        Ok(response.name)
    }

    fn tile_url(&self, map_name: &str) -> String {
        format!(
            "{}/{}/tiles/{{z}}/{{x}}/{{y}}",
            self.api_url.as_str().trim_end_matches('/'),
            map_name
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let session = EeSession::new(DEFAULT_API_URL, "my-project", "token").unwrap();
        assert_eq!(
            session.endpoint("value:compute"),
            "https://earthengine.googleapis.com/v1/projects/my-project/value:compute"
        );
        assert_eq!(session.project(), "my-project");
    }

    #[test]
    fn test_tile_url() {
        let session = EeSession::new("https://earthengine.googleapis.com/v1/", "p", "t").unwrap();
        assert_eq!(
            session.tile_url("projects/p/maps/abc"),
            "https://earthengine.googleapis.com/v1/projects/p/maps/abc/tiles/{z}/{x}/{y}"
        );
    }

    #[test]
    fn test_invalid_api_url() {
        assert!(EeSession::new("not a url", "p", "t").is_err());
    }

    #[test]
    fn test_classify_invalid_argument() {
        let body = r#"{"error": {"code": 400, "message": "Image.clip: Parameter 'input' is required.", "status": "INVALID_ARGUMENT"}}"#;
        match classify_error(400, body) {
            BuiltupError::DataUnavailable(message) => {
                assert!(message.contains("Image.clip"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_classify_invalid_geometry() {
        let body = r#"{"error": {"code": 400, "message": "Geometry.evenOdd: Invalid GeoJSON geometry.", "status": "INVALID_ARGUMENT"}}"#;
        assert!(classify_error(400, body).is_data_unavailable());
    }

    #[test]
    fn test_classify_malformed_request_aborts() {
        let body = r#"{"error": {"code": 400, "message": "Image.reduceRegion: Unrecognized argument 'maxPixel'.", "status": "INVALID_ARGUMENT"}}"#;
        match classify_error(400, body) {
            BuiltupError::Service { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("maxPixel"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let body = r#"{"error": {"code": 400, "message": "Empty request body.", "status": "FAILED_PRECONDITION"}}"#;
        assert!(!classify_error(400, body).is_data_unavailable());
    }

    #[test]
    fn test_classify_auth() {
        let body = r#"{"error": {"code": 401, "message": "Request had invalid authentication credentials.", "status": "UNAUTHENTICATED"}}"#;
        match classify_error(401, body) {
            BuiltupError::Auth(message) => assert!(message.starts_with("UNAUTHENTICATED")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_classify_service_with_plain_body() {
        match classify_error(503, "upstream connect error") {
            BuiltupError::Service { status, message } => {
                assert_eq!(status, 503);
                assert_eq!(message, "upstream connect error");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
