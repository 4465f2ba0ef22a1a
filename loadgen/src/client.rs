//! Per-user HTTP session
use crate::error::RequestError;
use crate::stats::RequestKey;
use crate::transaction::transaction_hook;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Request, Response};
use serde::Serialize;
#[allow(unused)]
use tracing::{debug, trace};
use url::Url;

/// HTTP client owned by a single simulated user
///
/// Requests share the swarm's connection pool, but default headers are private to the user: a
/// header set in [`User::on_start`](crate::User::on_start) applies to every later request of that
/// user only. Every request sent is recorded in the run statistics.
#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client,
    host: Url,
    headers: HeaderMap,
}

impl HttpClient {
    pub fn new(inner: Client, host: Url) -> Self {
        Self {
            inner,
            host,
            headers: HeaderMap::new(),
        }
    }

    pub fn host(&self) -> &Url {
        &self.host
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) {
        self.headers.insert(name, value);
    }

    pub fn get(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::GET, path)
    }

    pub fn post(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::POST, path)
    }

    pub fn put(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::PUT, path)
    }

    pub fn delete(&self, path: &str) -> RequestBuilder<'_> {
        self.request(Method::DELETE, path)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder<'_> {
        let inner = self
            .resolve(path)
            .map(|url| {
                self.inner
                    .request(method.clone(), url)
                    .headers(self.headers.clone())
            })
            .map_err(|source| RequestError::Url {
                path: path.to_string(),
                source,
            });

        RequestBuilder {
            client: &self.inner,
            key: RequestKey::new(&method, path),
            method,
            inner,
        }
    }

    /// Absolute URLs are used as-is; anything else is appended to the host, keeping any path
    /// prefix the host carries.
    fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
        match Url::parse(path) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                let base = self.host.as_str().trim_end_matches('/');
                Url::parse(&format!("{base}/{}", path.trim_start_matches('/')))
            }
            Err(err) => Err(err),
        }
    }
}

#[must_use = "requests are only sent with `.send()`"]
pub struct RequestBuilder<'a> {
    client: &'a Client,
    key: RequestKey,
    method: Method,
    inner: Result<reqwest::RequestBuilder, RequestError>,
}

impl<'a> RequestBuilder<'a> {
    /// Record this request under `name` instead of its path, e.g. to group `/items/42` and
    /// `/items/7` together.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.key = RequestKey::new(&self.method, name);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.inner = self.inner.map(|b| b.header(name, value));
        self
    }

    pub fn json<T: Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.inner = self.inner.map(|b| b.json(json));
        self
    }

    pub fn body(mut self, body: impl Into<reqwest::Body>) -> Self {
        self.inner = self.inner.map(|b| b.body(body));
        self
    }

    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    /// Build the request without sending it.
    pub fn build(self) -> Result<Request, RequestError> {
        Ok(self.inner?.build()?)
    }

    /// Send the request, recording its latency and outcome.
    ///
    /// Responses with a 4xx or 5xx status count as failures and are returned as
    /// [`RequestError::Status`].
    pub async fn send(self) -> Result<Response, RequestError> {
        let Self {
            client, key, inner, ..
        } = self;
        transaction_hook(key.clone(), async move {
            let request = inner?.build()?;
            let response = client.execute(request).await?;

            let status = response.status();
            if status.is_client_error() || status.is_server_error() {
                debug!("{key} returned {status}");
                Err(RequestError::Status { key, status })
            } else {
                trace!("{key} returned {status}");
                Ok(response)
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::CONTENT_TYPE;

    fn client(host: &str) -> HttpClient {
        HttpClient::new(Client::new(), Url::parse(host).unwrap())
    }

    #[derive(Serialize)]
    struct Payload {
        id: String,
    }

    #[test]
    fn test_resolve_paths() {
        let c = client("http://localhost:3002");
        let req = c.get("/items").build().unwrap();
        assert_eq!(req.url().as_str(), "http://localhost:3002/items");

        let req = c.get("items/7").build().unwrap();
        assert_eq!(req.url().as_str(), "http://localhost:3002/items/7");

        let c = client("https://api.example.com/prod/");
        let req = c.get("/items").build().unwrap();
        assert_eq!(req.url().as_str(), "https://api.example.com/prod/items");

        let req = c.get("http://other.example.com/health").build().unwrap();
        assert_eq!(req.url().as_str(), "http://other.example.com/health");
    }

    #[test]
    fn test_default_headers_are_per_client() {
        let mut a = client("http://localhost");
        let b = a.clone();
        a.set_header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let req = a.get("/items").build().unwrap();
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");

        let req = b.get("/items").build().unwrap();
        assert!(req.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_json_body() {
        let c = client("http://localhost");
        let req = c
            .post("/items")
            .json(&Payload {
                id: "abc".to_string(),
            })
            .build()
            .unwrap();

        assert_eq!(req.method(), Method::POST);
        assert_eq!(req.headers()[CONTENT_TYPE], "application/json");
        let body = req.body().and_then(|b| b.as_bytes()).unwrap();
        assert_eq!(body, br#"{"id":"abc"}"#);
    }

    #[test]
    fn test_request_key() {
        let c = client("http://localhost");
        assert_eq!(c.get("/items/42").key().to_string(), "GET /items/42");
        assert_eq!(
            c.get("/items/42").name("/items/[id]").key().to_string(),
            "GET /items/[id]"
        );
        assert_eq!(
            c.delete("/items/42").name("/items/[id]").key().method(),
            "DELETE"
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_recorded() {
        use crate::stats::StatsRegistry;
        use crate::transaction::TRANSACTION_HOOK;
        use std::sync::Arc;
        use std::time::Duration;

        // Nothing listens on the discard port.
        let c = client("http://127.0.0.1:9");
        let registry = Arc::new(StatsRegistry::new(vec![]));

        let res = TRANSACTION_HOOK
            .scope(registry.clone(), c.get("/items").send())
            .await;
        assert!(matches!(res, Err(RequestError::Transport(_))));

        let stats = registry.collect(Duration::from_secs(1));
        let items = stats.request("GET", "/items").unwrap();
        assert_eq!(items.success, 0);
        assert_eq!(items.failure, 1);
    }
}
