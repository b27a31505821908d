use std::time::Duration;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::app::ports::PolarityModel;

#[derive(Serialize)]
struct PolarityRequest<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct PolarityResponse {
    polarity: f64,
}

/// Polarity model served over HTTP: `POST {"text": ...}` answered with `{"polarity": f64}`.
///
/// Uses the blocking client; construct and call it off the async executor.
pub struct HttpPolarityModel {
    client: reqwest::blocking::Client,
    endpoint: String,
}

impl HttpPolarityModel {
    pub fn new(endpoint: impl Into<String>, timeout_ms: u64) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl PolarityModel for HttpPolarityModel {
    fn name(&self) -> &str {
        &self.endpoint
    }

    fn polarity(&self, text: &str) -> anyhow::Result<f64> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&PolarityRequest { text })
            .send()
            .with_context(|| format!("POST {} failed", self.endpoint))?
            .error_for_status()?;
        let body: PolarityResponse = resp.json().context("malformed polarity response")?;
        Ok(body.polarity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::{self, JoinHandle};

    /// Answers one request with `status` and `body`; yields the request body it received.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/polarity", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
            }
            let mut request = vec![0; content_length];
            reader.read_exact(&mut request).unwrap();

            let mut stream = stream;
            write!(
                stream,
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            )
            .unwrap();
            String::from_utf8(request).unwrap()
        });
        (endpoint, handle)
    }

    #[test]
    fn posts_text_and_reads_polarity() {
        let (endpoint, server) = serve_once("200 OK", r#"{"polarity": -0.25}"#);
        let model = HttpPolarityModel::new(endpoint, 2_000).unwrap();

        assert_eq!(model.polarity("cold soup").unwrap(), -0.25);
        let sent: serde_json::Value = serde_json::from_str(&server.join().unwrap()).unwrap();
        assert_eq!(sent, serde_json::json!({ "text": "cold soup" }));
    }

    #[test]
    fn server_error_status_is_an_error() {
        let (endpoint, server) = serve_once("503 Service Unavailable", r#"{"error": "warming up"}"#);
        let model = HttpPolarityModel::new(endpoint, 2_000).unwrap();

        assert!(model.polarity("fine").is_err());
        server.join().unwrap();
    }

    #[test]
    fn malformed_body_is_an_error() {
        let (endpoint, server) = serve_once("200 OK", r#"{"score": 0.5}"#);
        let model = HttpPolarityModel::new(endpoint, 2_000).unwrap();

        let err = model.polarity("fine").unwrap_err();
        assert!(format!("{:#}", err).contains("malformed polarity response"), "{:#}", err);
        server.join().unwrap();
    }

    #[test]
    fn unreachable_endpoint_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}/polarity", listener.local_addr().unwrap());
        drop(listener);
        let model = HttpPolarityModel::new(endpoint, 500).unwrap();

        assert!(model.polarity("fine").is_err());
    }
}
