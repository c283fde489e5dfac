//! Newline-delimited JSON client for the local embedding server.
//!
//! One connection per request: write a single JSON line, read a single JSON line back.

use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{truncate_chars, EmbeddingError, EmbeddingProvider};
use crate::config::EmbeddingConfig;

#[derive(Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Request<'a> {
    Embed { text: &'a str },
    EmbedBatch { texts: Vec<&'a str> },
    Ping,
}

#[derive(Deserialize, Default)]
struct Response {
    embedding: Option<Vec<f32>>,
    embeddings: Option<Vec<Vec<f32>>>,
    error: Option<String>,
    status: Option<String>,
    model: Option<String>,
    uptime: Option<f64>,
}

/// Health report from the server's `ping` action.
#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub status: String,
    pub model: Option<String>,
    pub uptime: Option<f64>,
}

pub struct SocketEmbeddingProvider {
    socket_path: PathBuf,
    dimensions: usize,
    max_chars: usize,
    timeout: Duration,
    batch_timeout: Duration,
}

impl SocketEmbeddingProvider {
    pub fn new(config: &EmbeddingConfig) -> Self {
        Self {
            socket_path: crate::config::expand_tilde(&config.socket_path),
            dimensions: config.dimensions,
            max_chars: config.max_chars,
            timeout: Duration::from_secs(config.timeout_secs),
            batch_timeout: Duration::from_secs(config.batch_timeout_secs),
        }
    }

    /// Ask the server for its status. Fails if the socket is unreachable.
    pub fn ping(&self) -> Result<ServerStatus, EmbeddingError> {
        let response = self.round_trip(&Request::Ping, self.timeout)?;
        Ok(ServerStatus {
            status: response.status.unwrap_or_else(|| "unknown".into()),
            model: response.model,
            uptime: response.uptime,
        })
    }

    fn round_trip(&self, request: &Request<'_>, timeout: Duration) -> Result<Response, EmbeddingError> {
        let mut stream =
            UnixStream::connect(&self.socket_path).map_err(|source| EmbeddingError::Connect {
                path: self.socket_path.display().to_string(),
                source,
            })?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut line = serde_json::to_vec(request)?;
        line.push(b'\n');
        stream.write_all(&line)?;
        stream.flush()?;

        let mut reader = BufReader::new(stream);
        let mut buf = String::new();
        let read = reader.read_line(&mut buf)?;
        if read == 0 {
            return Err(EmbeddingError::Malformed("connection closed before reply".into()));
        }

        let response: Response = serde_json::from_str(buf.trim_end())?;
        if let Some(err) = response.error {
            return Err(EmbeddingError::Server(err));
        }
        Ok(response)
    }

    fn check_dim(&self, v: &[f32]) -> Result<(), EmbeddingError> {
        if v.len() != self.dimensions {
            return Err(EmbeddingError::Malformed(format!(
                "expected {} dimensions, got {}",
                self.dimensions,
                v.len()
            )));
        }
        Ok(())
    }
}

impl EmbeddingProvider for SocketEmbeddingProvider {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let text = truncate_chars(text, self.max_chars);
        let response = self.round_trip(&Request::Embed { text }, self.timeout)?;
        let embedding = response
            .embedding
            .ok_or_else(|| EmbeddingError::Malformed("missing `embedding` field".into()))?;
        self.check_dim(&embedding)?;
        tracing::trace!(elapsed_ms = start.elapsed().as_millis() as u64, "embedded text");
        Ok(embedding)
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let start = Instant::now();
        let texts: Vec<&str> = texts
            .iter()
            .map(|t| truncate_chars(t, self.max_chars))
            .collect();
        let expected = texts.len();
        let response = self.round_trip(&Request::EmbedBatch { texts }, self.batch_timeout)?;
        let embeddings = response
            .embeddings
            .ok_or_else(|| EmbeddingError::Malformed("missing `embeddings` field".into()))?;
        if embeddings.len() != expected {
            return Err(EmbeddingError::Malformed(format!(
                "asked for {expected} embeddings, got {}",
                embeddings.len()
            ))
            .into());
        }
        for e in &embeddings {
            self.check_dim(e)?;
        }
        tracing::debug!(
            count = expected,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "embedded batch"
        );
        Ok(embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::net::UnixListener;

    fn config_for(path: &std::path::Path) -> EmbeddingConfig {
        EmbeddingConfig {
            socket_path: path.to_string_lossy().into_owned(),
            dimensions: 3,
            ..Default::default()
        }
    }

    /// Serve exactly one request with a canned reply, returning the request line.
    fn serve_once(listener: UnixListener, reply: &'static str) -> std::thread::JoinHandle<String> {
        std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let mut stream = stream;
            stream.write_all(reply.as_bytes()).unwrap();
            stream.write_all(b"\n").unwrap();
            line
        })
    }

    #[test]
    fn embed_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embed.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = serve_once(listener, r#"{"embedding":[0.0,0.6,0.8],"ms":1.5}"#);

        let provider = SocketEmbeddingProvider::new(&config_for(&path));
        let v = provider.embed("hello").unwrap();
        assert_eq!(v, vec![0.0, 0.6, 0.8]);

        let sent: serde_json::Value = serde_json::from_str(&handle.join().unwrap()).unwrap();
        assert_eq!(sent["action"], "embed");
        assert_eq!(sent["text"], "hello");
    }

    #[test]
    fn server_error_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embed.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = serve_once(listener, r#"{"error":"model not loaded"}"#);

        let provider = SocketEmbeddingProvider::new(&config_for(&path));
        let err = provider.embed("hello").unwrap_err();
        assert!(err.to_string().contains("model not loaded"));
        handle.join().unwrap();
    }

    #[test]
    fn wrong_dimension_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embed.sock");
        let listener = UnixListener::bind(&path).unwrap();
        let handle = serve_once(listener, r#"{"embeddings":[[1.0,0.0]]}"#);

        let provider = SocketEmbeddingProvider::new(&config_for(&path));
        let err = provider.embed_batch(&["a"]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EmbeddingError>(),
            Some(EmbeddingError::Malformed(_))
        ));
        handle.join().unwrap();
    }

    #[test]
    fn missing_socket_is_connect_error() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SocketEmbeddingProvider::new(&config_for(&dir.path().join("absent.sock")));
        let err = provider.embed("x").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<EmbeddingError>(),
            Some(EmbeddingError::Connect { .. })
        ));
    }
}
