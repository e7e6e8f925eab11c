//! Submission of a seed MIDI file to the remote generation service.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::multipart::{Form, Part};
use serde_json::Value;

use crate::error::{UserError, FALLBACK_GENERATION_MESSAGE};
use crate::input::PendingFile;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:5000/generate";

/// Multipart field carrying the uploaded file.
pub const UPLOAD_FIELD: &str = "file";

/// Something that turns a seed file into generated MIDI bytes.
pub trait GenerationService: Send + Sync {
    fn generate(&self, file: &PendingFile) -> Result<Vec<u8>, UserError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    /// `None` waits for as long as the service takes.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: None,
        }
    }
}

/// User-facing message for a rejected request body.
///
/// Uses the JSON `error` field when present and non-empty, otherwise the
/// generic fallback. Non-string values are shown as their JSON text.
pub fn rejection_message(body: &[u8]) -> String {
    let payload = match serde_json::from_slice::<Value>(body) {
        Ok(payload) => payload,
        Err(e) => {
            log::debug!("Error response was not JSON: {}", e);
            return FALLBACK_GENERATION_MESSAGE.to_string();
        }
    };
    match payload.get("error") {
        None | Some(Value::Null) => FALLBACK_GENERATION_MESSAGE.to_string(),
        Some(Value::String(msg)) if msg.is_empty() => FALLBACK_GENERATION_MESSAGE.to_string(),
        Some(Value::String(msg)) => msg.clone(),
        Some(other) => other.to_string(),
    }
}

pub struct HttpGenerationClient {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpGenerationClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn build_form(file: &PendingFile) -> Result<Form> {
        let part = Part::bytes(file.contents.clone())
            .file_name(file.name.clone())
            .mime_str(&file.mime_type)
            .with_context(|| format!("Invalid media type '{}'", file.mime_type))?;
        Ok(Form::new().part(UPLOAD_FIELD, part))
    }
}

impl GenerationService for HttpGenerationClient {
    fn generate(&self, file: &PendingFile) -> Result<Vec<u8>, UserError> {
        let form = Self::build_form(file).map_err(|e| {
            log::error!("{:#}", e);
            UserError::Network(format!("{:#}", e))
        })?;

        log::info!(
            "Submitting '{}' ({} bytes) to {}",
            file.name,
            file.contents.len(),
            self.endpoint
        );
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .map_err(|e| {
                log::error!("Generation request failed: {}", e);
                UserError::Network(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.bytes().map(|b| b.to_vec()).unwrap_or_default();
            let message = rejection_message(&body);
            log::error!("Generation service returned {}: {}", status, message);
            return Err(UserError::Rejected(message));
        }

        let bytes = response.bytes().map_err(|e| {
            log::error!("Failed to read generated body: {}", e);
            UserError::MalformedResponse
        })?;
        log::info!("Received {} bytes of generated MIDI", bytes.len());
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread::JoinHandle;

    /// Serve exactly one HTTP response and hand back the raw request.
    fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: Vec<u8>,
    ) -> (String, JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}/generate", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut request = Vec::new();
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                request.extend_from_slice(line.as_bytes());
                let lower = line.to_ascii_lowercase();
                if let Some(v) = lower.strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap();
                }
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut req_body = vec![0u8; content_length];
            reader.read_exact(&mut req_body).unwrap();
            request.extend_from_slice(&req_body);

            let mut stream = reader.into_inner();
            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status,
                content_type,
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(&body).unwrap();
            stream.flush().unwrap();
            request
        });
        (url, handle)
    }

    fn client(url: String) -> HttpGenerationClient {
        HttpGenerationClient::new(ClientConfig {
            endpoint: url,
            timeout: Some(Duration::from_secs(10)),
        })
        .unwrap()
    }

    fn seed() -> PendingFile {
        PendingFile::new("seed.mid", "audio/midi", b"MThd-seed-bytes".to_vec())
    }

    /// Canned service for studio tests.
    pub(crate) struct FakeService {
        pub response: Result<Vec<u8>, UserError>,
        pub calls: Arc<Mutex<usize>>,
    }

    impl FakeService {
        pub(crate) fn new(response: Result<Vec<u8>, UserError>) -> Self {
            Self {
                response,
                calls: Arc::new(Mutex::new(0)),
            }
        }

        pub(crate) fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    impl GenerationService for FakeService {
        fn generate(&self, _file: &PendingFile) -> Result<Vec<u8>, UserError> {
            *self.calls.lock().unwrap() += 1;
            self.response.clone()
        }
    }

    #[test]
    fn test_rejection_message_uses_error_field() {
        assert_eq!(rejection_message(br#"{ "error": "bad file" }"#), "bad file");
    }

    #[test]
    fn test_rejection_message_fallbacks() {
        assert_eq!(rejection_message(b"<html>500</html>"), FALLBACK_GENERATION_MESSAGE);
        assert_eq!(rejection_message(b"{}"), FALLBACK_GENERATION_MESSAGE);
        assert_eq!(rejection_message(br#"{"error": ""}"#), FALLBACK_GENERATION_MESSAGE);
        assert_eq!(rejection_message(b""), FALLBACK_GENERATION_MESSAGE);
        assert_eq!(rejection_message(br#"{"error": null}"#), FALLBACK_GENERATION_MESSAGE);
        assert_eq!(rejection_message(b"[1, 2]"), FALLBACK_GENERATION_MESSAGE);
    }

    #[test]
    fn test_rejection_message_shows_non_string_error() {
        assert_eq!(rejection_message(br#"{"error": 42}"#), "42");
        assert_eq!(rejection_message(br#"{"error": true}"#), "true");
        assert_eq!(
            rejection_message(br#"{"error": {"code": 7}}"#),
            r#"{"code":7}"#
        );
    }

    #[test]
    fn test_success_returns_body_and_sends_multipart() {
        let (url, server) = serve_once("200 OK", "audio/midi", b"MThd-generated".to_vec());
        let bytes = client(url).generate(&seed()).unwrap();
        assert_eq!(bytes, b"MThd-generated");

        let request = String::from_utf8_lossy(&server.join().unwrap()).to_string();
        assert!(request.starts_with("POST /generate"));
        assert!(request.to_ascii_lowercase().contains("multipart/form-data"));
        assert!(request.contains("name=\"file\""));
        assert!(request.contains("filename=\"seed.mid\""));
        assert!(request.contains("MThd-seed-bytes"));
    }

    #[test]
    fn test_json_error_is_surfaced() {
        let (url, server) = serve_once(
            "400 Bad Request",
            "application/json",
            br#"{ "error": "bad file" }"#.to_vec(),
        );
        let err = client(url).generate(&seed()).unwrap_err();
        assert_eq!(err, UserError::Rejected("bad file".into()));
        server.join().unwrap();
    }

    #[test]
    fn test_undecodable_error_uses_fallback() {
        let (url, server) = serve_once(
            "500 Internal Server Error",
            "text/html",
            b"<h1>oops</h1>".to_vec(),
        );
        let err = client(url).generate(&seed()).unwrap_err();
        assert_eq!(err.to_string(), FALLBACK_GENERATION_MESSAGE);
        server.join().unwrap();
    }

    #[test]
    fn test_connection_refused_is_network_error() {
        // Bind then drop to get a port nothing listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = client(format!("http://127.0.0.1:{}/generate", port))
            .generate(&seed())
            .unwrap_err();
        assert!(matches!(err, UserError::Network(_)));
    }

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert!(config.timeout.is_none());
    }
}
