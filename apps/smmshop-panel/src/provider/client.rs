use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{ProviderError, lenient};

#[derive(Clone)]
pub struct ProviderClient {
    client: Client,
    api_url: String,
    api_key: String,
}

/// One entry of the provider's `services` listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderServiceInfo {
    #[serde(deserialize_with = "lenient::string")]
    pub service: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Price per 1000 units in the provider currency.
    #[serde(deserialize_with = "lenient::f64")]
    pub rate: f64,
    #[serde(deserialize_with = "lenient::i64")]
    pub min: i64,
    #[serde(deserialize_with = "lenient::i64")]
    pub max: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderOrderStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::opt_f64")]
    pub charge: Option<f64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub start_count: Option<i64>,
    #[serde(default, deserialize_with = "lenient::opt_i64")]
    pub remains: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderBalance {
    #[serde(deserialize_with = "lenient::f64")]
    pub balance: f64,
    #[serde(default)]
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddOrderResponse {
    #[serde(deserialize_with = "lenient::string")]
    order: String,
}

/// Provider-side order state, collapsed to what the shop acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Pending, In progress, Processing and anything unknown.
    Active,
    Completed,
    Partial,
    /// Canceled or refunded by the provider.
    Canceled,
}

impl ProviderOrderStatus {
    pub fn remote_status(&self) -> RemoteStatus {
        match self.status.trim().to_ascii_lowercase().as_str() {
            "completed" => RemoteStatus::Completed,
            "partial" => RemoteStatus::Partial,
            "canceled" | "cancelled" | "refunded" => RemoteStatus::Canceled,
            _ => RemoteStatus::Active,
        }
    }
}

impl ProviderClient {
    pub fn new(api_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            api_key: api_key.to_string(),
        })
    }

    /// Places an order and returns the provider's order id.
    pub async fn add_order(&self, service: &str, link: &str, quantity: i64) -> Result<String, ProviderError> {
        let quantity = quantity.to_string();
        let resp: AddOrderResponse = self
            .call("add", &[("service", service), ("link", link), ("quantity", &quantity)])
            .await?;
        Ok(resp.order)
    }

    pub async fn order_status(&self, order: &str) -> Result<ProviderOrderStatus, ProviderError> {
        self.call("status", &[("order", order)]).await
    }

    pub async fn services(&self) -> Result<Vec<ProviderServiceInfo>, ProviderError> {
        self.call("services", &[]).await
    }

    pub async fn balance(&self) -> Result<ProviderBalance, ProviderError> {
        self.call("balance", &[]).await
    }

    async fn call<T: DeserializeOwned>(&self, action: &str, params: &[(&str, &str)]) -> Result<T, ProviderError> {
        let mut form: Vec<(&str, &str)> = Vec::with_capacity(params.len() + 2);
        form.push(("key", &self.api_key));
        form.push(("action", action));
        form.extend_from_slice(params);

        debug!("Provider call {} -> {}", action, self.api_url);
        let resp = self.client.post(&self.api_url).form(&form).send().await?;

        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: truncate(&body, 200),
            });
        }

        let value: Value = serde_json::from_str(&body).map_err(|_| ProviderError::Decode(truncate(&body, 200)))?;
        if let Some(err) = value.get("error") {
            let msg = err.as_str().map(str::to_string).unwrap_or_else(|| err.to_string());
            return Err(ProviderError::Api(msg));
        }

        serde_json::from_value(value).map_err(|e| ProviderError::Decode(format!("{} ({})", action, e)))
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{}…", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> ProviderClient {
        ProviderClient::new(&format!("{}/api/v2", server.uri()), "secret", Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn add_order_accepts_numeric_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("action=add"))
            .and(body_string_contains("key=secret"))
            .and(body_string_contains("quantity=1500"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "order": 23501 })))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let id = client.add_order("7", "https://instagram.com/p/abc", 1500).await.unwrap();
        assert_eq!(id, "23501");
    }

    #[tokio::test]
    async fn error_field_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error": "Incorrect request" })))
            .mount(&server)
            .await;

        let err = client_for(&server).await.balance().await.unwrap_err();
        assert!(matches!(err, ProviderError::Api(ref m) if m == "Incorrect request"));
    }

    #[tokio::test]
    async fn status_and_services_tolerate_string_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("action=status"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "charge": "0.27819",
                "start_count": "3572",
                "status": "Partial",
                "remains": "157",
                "currency": "USD"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(body_string_contains("action=services"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                { "service": 1, "name": "Followers", "type": "Default", "category": "Instagram", "rate": "0.90", "min": "50", "max": "10000" },
                { "service": "2", "name": "Likes", "rate": 1.2, "min": 10, "max": 5000 }
            ])))
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let status = client.order_status("99").await.unwrap();
        assert_eq!(status.remote_status(), RemoteStatus::Partial);
        assert_eq!(status.remains, Some(157));

        let services = client.services().await.unwrap();
        assert_eq!(services.len(), 2);
        assert_eq!(services[0].service, "1");
        assert!((services[0].rate - 0.9).abs() < 1e-9);
        assert_eq!(services[1].kind, None);
    }

    #[tokio::test]
    async fn http_failure_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let err = client_for(&server).await.balance().await.unwrap_err();
        assert!(matches!(err, ProviderError::Status { status: 503, .. }));
    }

    #[test]
    fn remote_status_mapping() {
        let mk = |s: &str| ProviderOrderStatus {
            status: s.to_string(),
            charge: None,
            start_count: None,
            remains: None,
            currency: None,
        };
        assert_eq!(mk("Completed").remote_status(), RemoteStatus::Completed);
        assert_eq!(mk("Refunded").remote_status(), RemoteStatus::Canceled);
        assert_eq!(mk("Cancelled").remote_status(), RemoteStatus::Canceled);
        assert_eq!(mk("In progress").remote_status(), RemoteStatus::Active);
        assert_eq!(mk("").remote_status(), RemoteStatus::Active);
    }
}
