//! Telegram WebApp `initData` verification.

use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::collections::BTreeMap;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InitDataError {
    #[error("hash is missing")]
    MissingHash,
    #[error("signature mismatch")]
    BadSignature,
    #[error("auth_date is missing or invalid")]
    MissingAuthDate,
    #[error("init data expired")]
    Expired,
    #[error("user field is missing or invalid")]
    MissingUser,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebAppUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl WebAppUser {
    pub fn full_name(&self) -> Option<String> {
        let parts: Vec<&str> = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .filter(|s| !s.trim().is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }
}

fn secret_key(bot_token: &str) -> Result<Vec<u8>, InitDataError> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(b"WebAppData").map_err(|_| InitDataError::BadSignature)?;
    mac.update(bot_token.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

fn data_check_string(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Checks the signature and freshness of `init_data` and returns the user
/// it was issued for. `now` is unix seconds.
pub fn validate_init_data(
    init_data: &str,
    bot_token: &str,
    max_age_secs: i64,
    now: i64,
) -> Result<WebAppUser, InitDataError> {
    let mut params: BTreeMap<String, String> = url::form_urlencoded::parse(init_data.trim().as_bytes())
        .into_owned()
        .collect();
    let hash = params.remove("hash").ok_or(InitDataError::MissingHash)?;
    let expected = hex::decode(hash).map_err(|_| InitDataError::BadSignature)?;

    let mut mac =
        <HmacSha256 as Mac>::new_from_slice(&secret_key(bot_token)?).map_err(|_| InitDataError::BadSignature)?;
    mac.update(data_check_string(&params).as_bytes());
    mac.verify_slice(&expected).map_err(|_| InitDataError::BadSignature)?;

    let auth_date: i64 = params
        .get("auth_date")
        .and_then(|v| v.parse().ok())
        .ok_or(InitDataError::MissingAuthDate)?;
    if max_age_secs > 0 && now - auth_date > max_age_secs {
        return Err(InitDataError::Expired);
    }

    params
        .get("user")
        .and_then(|u| serde_json::from_str(u).ok())
        .ok_or(InitDataError::MissingUser)
}

#[cfg(test)]
pub(crate) fn sign_init_data(fields: &[(&str, &str)], bot_token: &str) -> String {
    let params: BTreeMap<String, String> = fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let mut mac = <HmacSha256 as Mac>::new_from_slice(&secret_key(bot_token).unwrap()).unwrap();
    mac.update(data_check_string(&params).as_bytes());
    let hash = hex::encode(mac.finalize().into_bytes());

    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (k, v) in fields {
        out.append_pair(k, v);
    }
    out.append_pair("hash", &hash);
    out.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "123456:TEST-TOKEN";
    const USER: &str = r#"{"id":4242,"first_name":"Ann","username":"ann"}"#;

    #[test]
    fn accepts_freshly_signed_data() {
        let data = sign_init_data(&[("auth_date", "1700000000"), ("query_id", "AAE"), ("user", USER)], TOKEN);
        let user = validate_init_data(&data, TOKEN, 86_400, 1_700_000_100).unwrap();
        assert_eq!(user.id, 4242);
        assert_eq!(user.full_name().as_deref(), Some("Ann"));
    }

    #[test]
    fn rejects_tampering_and_wrong_token() {
        let data = sign_init_data(&[("auth_date", "1700000000"), ("user", USER)], TOKEN);
        let tampered = data.replace("4242", "4243");
        assert_eq!(
            validate_init_data(&tampered, TOKEN, 0, 1_700_000_000).unwrap_err(),
            InitDataError::BadSignature
        );
        assert_eq!(
            validate_init_data(&data, "other:token", 0, 1_700_000_000).unwrap_err(),
            InitDataError::BadSignature
        );
        assert_eq!(
            validate_init_data("auth_date=1", TOKEN, 0, 0).unwrap_err(),
            InitDataError::MissingHash
        );
    }

    #[test]
    fn rejects_stale_data() {
        let data = sign_init_data(&[("auth_date", "1700000000"), ("user", USER)], TOKEN);
        assert_eq!(
            validate_init_data(&data, TOKEN, 3600, 1_700_003_601).unwrap_err(),
            InitDataError::Expired
        );
    }
}
