use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use super::retry::{is_connect_failure, is_transient, retry, RetryConfig};
use super::OcctaxApi;
use crate::error::{Error, Result};
use crate::settings::AppSettings;

const USER_AGENT: &str = concat!("occtax/", env!("CARGO_PKG_VERSION"));

/// [`OcctaxApi`] over HTTP against the GeoNature REST routes.
pub struct HttpOcctaxApi {
    client: Client,
    server_url: String,
    module: String,
    token: Option<String>,
    retry: RetryConfig,
}

#[derive(Deserialize)]
struct Created {
    id: i64,
}

#[derive(Deserialize)]
struct UploadedMedia {
    id_media: i64,
}

impl HttpOcctaxApi {
    pub fn new(settings: &AppSettings) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_client(settings, client))
    }

    pub fn with_client(settings: &AppSettings, client: Client) -> Self {
        HttpOcctaxApi {
            client,
            server_url: settings.server_url.trim_end_matches('/').to_string(),
            module: settings.module.clone(),
            token: settings.token.clone(),
            retry: settings.sync.retry.clone(),
        }
    }

    fn module_url(&self, path: &str) -> String {
        format!("{}/{}/{}", self.server_url, self.module, path)
    }

    fn media_url(&self, path: &str) -> String {
        format!("{}/gn_commons/media{}", self.server_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends the request built by `build`, retrying the failures `should_retry`
    /// accepts, and fails on any non-success status.
    ///
    /// Creating routes pass [`is_connect_failure`]: a POST that timed out may
    /// already have created its resource, and sending it again would create
    /// another one the caller never learns about.
    async fn send<F>(
        &self,
        should_retry: fn(&Error) -> bool,
        build: F,
    ) -> Result<reqwest::Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let build = &build;

        retry(&self.retry, should_retry, move || async move {
            let response = self.authorize(build()).send().await?;
            Ok::<_, Error>(response.error_for_status()?)
        })
        .await
    }

    async fn send_json<T, F>(&self, should_retry: fn(&Error) -> bool, build: F) -> Result<T>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        Ok(self.send(should_retry, build).await?.json::<T>().await?)
    }
}

#[async_trait]
impl OcctaxApi for HttpOcctaxApi {
    async fn create_record(&self, payload: serde_json::Value) -> Result<i64> {
        let url = self.module_url("only/releve");
        debug!(%url, "creating record");

        let created: Created = self
            .send_json(is_connect_failure, || self.client.post(&url).json(&payload))
            .await?;

        Ok(created.id)
    }

    async fn create_occurrence(&self, record_id: i64, payload: serde_json::Value) -> Result<()> {
        let url = self.module_url(&format!("releve/{record_id}/occurrence"));
        debug!(%url, "creating occurrence");

        self.send(is_connect_failure, || self.client.post(&url).json(&payload))
            .await?;
        Ok(())
    }

    async fn delete_record(&self, record_id: i64) -> Result<()> {
        let url = self.module_url(&format!("releve/{record_id}"));
        debug!(%url, "deleting record");

        self.send(is_transient, || self.client.delete(&url)).await?;
        Ok(())
    }

    async fn upload_media(&self, path: &Path) -> Result<i64> {
        let url = self.media_url("");
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("media")
            .to_string();

        debug!(%url, file = %path.display(), "uploading media");

        // Multipart forms are consumed by sending, so each attempt builds
        // its own.
        let uploaded: UploadedMedia = self
            .send_json(is_connect_failure, || {
                let part = Part::bytes(bytes.clone()).file_name(file_name.clone());
                let form = Form::new().part("file", part);
                self.client.post(&url).multipart(form)
            })
            .await?;

        Ok(uploaded.id_media)
    }

    async fn delete_media(&self, media_id: i64) -> Result<()> {
        let url = self.media_url(&format!("/{media_id}"));
        debug!(%url, "deleting media");

        self.send(is_transient, || self.client.delete(&url)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use super::*;

    #[derive(Clone)]
    struct Reply {
        status: u16,
        body: &'static str,
        delay: Duration,
    }

    impl Reply {
        fn new(status: u16, body: &'static str) -> Self {
            Reply {
                status,
                body,
                delay: Duration::ZERO,
            }
        }

        fn after(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }
    }

    /// A local server answering each request with the next scripted reply,
    /// the last one repeating. Every request received is recorded as text.
    struct ScriptedServer {
        url: String,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl ScriptedServer {
        async fn start(replies: Vec<Reply>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let requests = Arc::new(Mutex::new(Vec::new()));
            let seen = requests.clone();

            tokio::spawn(async move {
                while let Ok((mut stream, _)) = listener.accept().await {
                    let Ok(request) = read_request(&mut stream).await else {
                        continue;
                    };

                    let reply = {
                        let mut seen = seen.lock().unwrap();
                        seen.push(request);
                        replies.get(seen.len() - 1).or(replies.last()).cloned()
                    };

                    if let Some(reply) = reply {
                        tokio::spawn(respond(stream, reply));
                    }
                }
            });

            ScriptedServer { url, requests }
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn api(&self, timeout: Duration) -> HttpOcctaxApi {
            let mut settings = AppSettings::new(&self.url);
            settings.token = Some("secret".to_string());
            settings.sync.retry = RetryConfig {
                max_attempts: 3,
                base_delay_ms: 1,
                max_delay_ms: 5,
                backoff_multiplier: 2.0,
            };

            let client = Client::builder()
                .timeout(timeout)
                .no_proxy()
                .build()
                .unwrap();
            HttpOcctaxApi::with_client(&settings, client)
        }
    }

    async fn read_request(stream: &mut TcpStream) -> std::io::Result<String> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 4096];

        while !is_complete(&buffer) {
            let read = stream.read(&mut chunk).await?;
            if read == 0 {
                break;
            }
            buffer.extend_from_slice(&chunk[..read]);
        }

        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    fn is_complete(buffer: &[u8]) -> bool {
        let Some(end) = buffer.windows(4).position(|w| w == b"\r\n\r\n") else {
            return false;
        };

        let head = String::from_utf8_lossy(&buffer[..end]).to_ascii_lowercase();
        let body = &buffer[end + 4..];

        if head.contains("transfer-encoding: chunked") {
            return body.ends_with(b"0\r\n\r\n");
        }

        let length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        body.len() >= length
    }

    async fn respond(mut stream: TcpStream, reply: Reply) {
        tokio::time::sleep(reply.delay).await;

        let response = format!(
            "HTTP/1.1 {} Scripted\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            reply.status,
            reply.body.len(),
            reply.body
        );

        // The client may have given up already.
        let _ = stream.write_all(response.as_bytes()).await;
        let _ = stream.shutdown().await;
    }

    #[test]
    fn test_routes() {
        let mut settings = AppSettings::new("https://demo.geonature.fr/geonature/api/");
        settings.token = Some("secret".to_string());
        let api = HttpOcctaxApi::with_client(&settings, Client::new());

        assert_eq!(
            api.module_url("only/releve"),
            "https://demo.geonature.fr/geonature/api/occtax/only/releve"
        );
        assert_eq!(
            api.module_url("releve/42/occurrence"),
            "https://demo.geonature.fr/geonature/api/occtax/releve/42/occurrence"
        );
        assert_eq!(
            api.media_url("/7"),
            "https://demo.geonature.fr/geonature/api/gn_commons/media/7"
        );
    }

    #[tokio::test]
    async fn test_create_record_parses_created_id() {
        let server = ScriptedServer::start(vec![Reply::new(201, r#"{"id": 42}"#)]).await;
        let api = server.api(Duration::from_secs(5));

        let id = api
            .create_record(serde_json::json!({"properties": {"comment": "pond"}}))
            .await
            .unwrap();

        assert_eq!(id, 42);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("POST /occtax/only/releve HTTP/1.1"));
        assert!(requests[0]
            .to_ascii_lowercase()
            .contains("authorization: bearer secret"));
        assert!(requests[0].contains(r#""comment":"pond""#));
    }

    #[tokio::test]
    async fn test_timed_out_create_is_not_sent_again() {
        let server = ScriptedServer::start(vec![
            Reply::new(201, r#"{"id": 42}"#).after(Duration::from_millis(500))
        ])
        .await;
        let api = server.api(Duration::from_millis(100));

        let result = api.create_record(serde_json::json!({})).await;

        assert!(matches!(result, Err(Error::Http(ref e)) if e.is_timeout()), "{result:?}");
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_server_error_on_create_is_not_retried() {
        let server = ScriptedServer::start(vec![Reply::new(503, "{}")]).await;
        let api = server.api(Duration::from_secs(5));

        let result = api.create_occurrence(42, serde_json::json!({})).await;

        assert!(matches!(result, Err(Error::Http(_))));
        assert_eq!(server.requests().len(), 1);
        assert!(server.requests()[0].starts_with("POST /occtax/releve/42/occurrence "));
    }

    #[tokio::test]
    async fn test_client_error_on_delete_is_not_retried() {
        let server = ScriptedServer::start(vec![Reply::new(404, "{}")]).await;
        let api = server.api(Duration::from_secs(5));

        let result = api.delete_record(42).await;

        assert!(
            matches!(result, Err(Error::Http(ref e)) if e.status() == Some(reqwest::StatusCode::NOT_FOUND)),
            "{result:?}"
        );
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_server_errors_on_delete_are_retried() {
        let server = ScriptedServer::start(vec![
            Reply::new(502, "{}"),
            Reply::new(503, "{}"),
            Reply::new(200, "{}"),
        ])
        .await;
        let api = server.api(Duration::from_secs(5));

        api.delete_media(7).await.unwrap();

        let requests = server.requests();
        assert_eq!(requests.len(), 3);
        assert!(requests
            .iter()
            .all(|r| r.starts_with("DELETE /gn_commons/media/7 HTTP/1.1")));
    }

    #[tokio::test]
    async fn test_upload_media_sends_multipart_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("heron.jpg");
        std::fs::write(&path, "jpeg bytes").unwrap();

        let server = ScriptedServer::start(vec![Reply::new(200, r#"{"id_media": 7}"#)]).await;
        let api = server.api(Duration::from_secs(5));

        let id = api.upload_media(&path).await.unwrap();

        assert_eq!(id, 7);

        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("POST /gn_commons/media HTTP/1.1"));
        assert!(requests[0]
            .to_ascii_lowercase()
            .contains("content-type: multipart/form-data"));
        assert!(requests[0].contains(r#"name="file""#));
        assert!(requests[0].contains(r#"filename="heron.jpg""#));
        assert!(requests[0].contains("jpeg bytes"));
    }

    #[tokio::test]
    async fn test_unexpected_body_is_an_error() {
        let server = ScriptedServer::start(vec![Reply::new(201, r#"{"created": true}"#)]).await;
        let api = server.api(Duration::from_secs(5));

        assert!(api.create_record(serde_json::json!({})).await.is_err());
        assert_eq!(server.requests().len(), 1);
    }
}
