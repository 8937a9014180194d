use anyhow::Result;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use smmshop_shared::api::ErrorBody;
use std::time::Duration;

/// Non-2xx answer from the panel. `message` is the panel's own text and is
/// safe to show to the user.
#[derive(Debug, Clone, thiserror::Error)]
#[error("Panel returned {status}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    /// User-facing text of an error coming out of an API call, if the panel
    /// produced one.
    pub fn user_message(err: &anyhow::Error) -> Option<&str> {
        err.downcast_ref::<ApiError>()
            .filter(|e| e.status.is_client_error())
            .map(|e| e.message.as_str())
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: String,
}

impl ApiClient {
    pub fn new(base_url: String, token: String) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(20)).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v2/bot{}", self.base_url, path)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send(self.client.post(self.url(path)).json(body)).await
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let resp = request.header("X-Bot-Token", &self.token).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|b| b.message)
                .unwrap_or_else(|_| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(ApiError { status, message }.into());
        }

        Ok(resp.json().await?)
    }

    pub fn has_token(&self) -> bool {
        !self.token.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smmshop_shared::api::UserView;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_token_and_surfaces_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/bot/users/5"))
            .and(header("X-Bot-Token", "secret"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_json(serde_json::json!({ "success": false, "message": "User 5 not found" })),
            )
            .mount(&server)
            .await;

        let api = ApiClient::new(format!("{}/", server.uri()), "secret".into()).unwrap();
        let err = api.get::<UserView>("/users/5").await.unwrap_err();

        assert_eq!(ApiError::user_message(&err), Some("User 5 not found"));
        assert!(api.has_token());
    }

    #[tokio::test]
    async fn server_errors_are_not_user_facing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v2/bot/categories"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let api = ApiClient::new(server.uri(), String::new()).unwrap();
        let err = api.get::<Vec<serde_json::Value>>("/categories").await.unwrap_err();

        assert!(ApiError::user_message(&err).is_none());
        assert!(err.to_string().contains("500"));
    }
}
