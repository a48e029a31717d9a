use std::marker::PhantomData;
use std::sync::Arc;

use reqwest::cookie::Jar;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;

use crate::error::{AuthError, RequestError};
use crate::models::{Draft, EntityId, Identity, Record, Submission, UserProfile};
use crate::settings::ClientConfig;

/// The four calls every resource family supports.
#[allow(async_fn_in_trait)]
pub trait RemoteCollection<D: Draft> {
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Record<D>>, RequestError>;

    async fn create(
        &self,
        body: &Submission<'_, D>,
        cancel: &CancellationToken,
    ) -> Result<Record<D>, RequestError>;

    async fn update(
        &self,
        id: &EntityId,
        body: &Submission<'_, D>,
        cancel: &CancellationToken,
    ) -> Result<Record<D>, RequestError>;

    async fn delete(&self, id: &EntityId, cancel: &CancellationToken) -> Result<(), RequestError>;
}

/// Credentialed HTTP client bound to one API base URL.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, RequestError> {
        let session = config
            .session_cookie
            .as_deref()
            .map(|value| (config.cookie_name.as_str(), value));
        Self::with_session(config.api_url.clone(), session)
    }

    /// Builds a client whose cookie jar is seeded with `(name, value)`.
    /// Cookies set by the server are kept for the client's lifetime.
    pub fn with_session(base: Url, session: Option<(&str, &str)>) -> Result<Self, RequestError> {
        let jar = Arc::new(Jar::default());
        if let Some((name, value)) = session {
            jar.add_cookie_str(&format!("{name}={value}"), &base);
        }
        let client = Client::builder().cookie_provider(jar).build()?;
        Ok(ApiClient { client, base })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // Only http(s) bases reach this point, and those always have a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    pub fn collection<D: Draft>(&self) -> HttpCollection<D> {
        HttpCollection {
            api: self.clone(),
            _draft: PhantomData,
        }
    }

    async fn send(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<String, RequestError> {
        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            if !status.is_success() {
                log::warn!("request failed with {}: {}", status, body);
                return Err(RequestError::Status {
                    status: status.as_u16(),
                    body,
                });
            }
            Ok::<_, RequestError>(body)
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RequestError::Cancelled),
            result = exchange => result,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<T, RequestError> {
        let body = self.send(request, cancel).await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Asks the server who owns the current session.
    pub async fn auth_check(&self, cancel: &CancellationToken) -> Result<Identity, AuthError> {
        let url = self.endpoint(&["skill-posts", "auth", "check"]);
        match self.fetch::<Identity>(self.client.get(url), cancel).await {
            Ok(identity) if identity.is_authenticated() => Ok(identity),
            Ok(identity) => {
                log::debug!("auth check returned status '{}'", identity.status);
                Err(AuthError::Unauthenticated)
            }
            Err(RequestError::Status { status, .. }) => {
                log::debug!("auth check returned {}", status);
                Err(AuthError::Unauthenticated)
            }
            Err(e) => Err(AuthError::Request(e)),
        }
    }

    pub async fn get_profile(
        &self,
        email: &str,
        cancel: &CancellationToken,
    ) -> Result<UserProfile, RequestError> {
        let url = self.endpoint(&["users", email]);
        self.fetch(self.client.get(url), cancel).await
    }

    pub async fn put_profile(
        &self,
        email: &str,
        profile: &UserProfile,
        cancel: &CancellationToken,
    ) -> Result<UserProfile, RequestError> {
        let url = self.endpoint(&["users", email]);
        self.fetch(self.client.put(url).json(profile), cancel).await
    }
}

/// REST binding of one resource family, e.g. `/learning-plans`.
#[derive(Clone)]
pub struct HttpCollection<D> {
    api: ApiClient,
    _draft: PhantomData<fn() -> D>,
}

impl<D: Draft> RemoteCollection<D> for HttpCollection<D> {
    async fn list(&self, cancel: &CancellationToken) -> Result<Vec<Record<D>>, RequestError> {
        let url = self.api.endpoint(&[D::RESOURCE]);
        self.api.fetch(self.api.client.get(url), cancel).await
    }

    async fn create(
        &self,
        body: &Submission<'_, D>,
        cancel: &CancellationToken,
    ) -> Result<Record<D>, RequestError> {
        let url = self.api.endpoint(&[D::RESOURCE]);
        self.api.fetch(self.api.client.post(url).json(body), cancel).await
    }

    async fn update(
        &self,
        id: &EntityId,
        body: &Submission<'_, D>,
        cancel: &CancellationToken,
    ) -> Result<Record<D>, RequestError> {
        let url = self.api.endpoint(&[D::RESOURCE, id.as_str()]);
        self.api.fetch(self.api.client.put(url).json(body), cancel).await
    }

    async fn delete(&self, id: &EntityId, cancel: &CancellationToken) -> Result<(), RequestError> {
        let url = self.api.endpoint(&[D::RESOURCE, id.as_str()]);
        self.api.send(self.api.client.delete(url), cancel).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Author, PlanDraft};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serves exactly one HTTP exchange and hands back the raw request.
    async fn respond_once(status: &'static str, body: &'static str) -> (Url, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut chunk = [0u8; 4096];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .filter_map(|line| line.split_once(':'))
                        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        let base = Url::parse(&format!("http://{addr}/api")).unwrap();
        (base, handle)
    }

    fn author() -> Author {
        Author {
            name: "Morgan Lee".into(),
            avatar: "ML".into(),
            email: Some("morgan@example.com".into()),
        }
    }

    #[tokio::test]
    async fn list_sends_session_cookie_and_parses_records() {
        let (base, server) = respond_once(
            "200 OK",
            r#"[{"id":"p1","title":"Advanced Git","description":"Workflows","duration":"3 weeks","topics":["Git"],"author":{"name":"Morgan Lee","avatar":"ML"},"createdAt":"2024-01-01T00:00:00Z"}]"#,
        )
        .await;
        let api = ApiClient::with_session(base, Some(("JSESSIONID", "abc123"))).unwrap();

        let plans = api
            .collection::<PlanDraft>()
            .list(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].id.as_str(), "p1");
        assert_eq!(plans[0].fields.topics, vec!["Git"]);

        let request = server.await.unwrap().to_lowercase();
        assert!(request.starts_with("get /api/learning-plans http/1.1"));
        assert!(request.contains("cookie: jsessionid=abc123"));
    }

    #[tokio::test]
    async fn create_posts_json_and_maps_failure_status() {
        let (base, server) = respond_once("400 Bad Request", "title too short").await;
        let api = ApiClient::with_session(base, None).unwrap();
        let author = author();
        let draft = PlanDraft {
            title: "Spring Security Deep Dive".into(),
            ..Default::default()
        };

        let err = api
            .collection::<PlanDraft>()
            .create(
                &Submission {
                    author: &author,
                    draft: &draft,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();

        match err {
            RequestError::Status { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "title too short");
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/learning-plans HTTP/1.1"));
        assert!(request.contains(r#""title":"Spring Security Deep Dive""#));
        assert!(request.contains(r#""email":"morgan@example.com""#));
    }

    #[tokio::test]
    async fn delete_accepts_empty_no_content() {
        let (base, server) = respond_once("204 No Content", "").await;
        let api = ApiClient::with_session(base, None).unwrap();

        api.collection::<PlanDraft>()
            .delete(&EntityId::new("42"), &CancellationToken::new())
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("DELETE /api/learning-plans/42 HTTP/1.1"));
    }

    #[tokio::test]
    async fn auth_check_treats_rejection_as_unauthenticated() {
        let (base, _server) = respond_once("401 Unauthorized", "").await;
        let api = ApiClient::with_session(base, None).unwrap();
        let result = api.auth_check(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));

        let (base, _server) =
            respond_once("200 OK", r#"{"status":"Anonymous","name":"","email":""}"#).await;
        let api = ApiClient::with_session(base, None).unwrap();
        let result = api.auth_check(&CancellationToken::new()).await;
        assert!(matches!(result, Err(AuthError::Unauthenticated)));
    }

    #[tokio::test]
    async fn auth_check_returns_identity() {
        let (base, server) = respond_once(
            "200 OK",
            r#"{"status":"Authenticated","name":"Alex Johnson","email":"alex@example.com","picture":"https://img.example/a.png"}"#,
        )
        .await;
        let api = ApiClient::with_session(base, Some(("JSESSIONID", "s"))).unwrap();

        let identity = api.auth_check(&CancellationToken::new()).await.unwrap();
        assert_eq!(identity.name, "Alex Johnson");
        assert_eq!(identity.email, "alex@example.com");

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/skill-posts/auth/check HTTP/1.1"));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits() {
        let (base, _server) = respond_once("200 OK", "[]").await;
        let api = ApiClient::with_session(base, None).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = api
            .collection::<PlanDraft>()
            .list(&cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[test]
    fn endpoint_escapes_segments() {
        let api = ApiClient::with_session(Url::parse("http://localhost:8080/api/").unwrap(), None)
            .unwrap();
        assert_eq!(
            api.endpoint(&["users", "a b@example.com"]).as_str(),
            "http://localhost:8080/api/users/a%20b@example.com"
        );
    }
}
