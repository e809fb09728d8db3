use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

const MAX_ENDPOINT_LEN: usize = 2048;
const MAX_KEY_LEN: usize = 512;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub endpoint: String,
    #[serde(skip_serializing)]
    pub p256dh: String,
    #[serde(skip_serializing)]
    pub auth: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Subscription material that has passed validation and may be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPushSubscription {
    endpoint: String,
    p256dh: String,
    auth: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum InvalidSubscription {
    #[error("endpoint is missing or empty")]
    MissingEndpoint,
    #[error("endpoint is not an absolute http(s) url")]
    MalformedEndpoint,
    #[error("keys.p256dh is missing or empty")]
    MissingP256dh,
    #[error("keys.auth is missing or empty")]
    MissingAuth,
    #[error("key material exceeds {MAX_KEY_LEN} bytes")]
    MalformedKey,
}

impl NewPushSubscription {
    pub fn new(
        endpoint: Option<String>,
        p256dh: Option<String>,
        auth: Option<String>,
    ) -> Result<Self, InvalidSubscription> {
        let endpoint = parse_endpoint(endpoint)?;
        let p256dh = parse_key(p256dh, InvalidSubscription::MissingP256dh)?;
        let auth = parse_key(auth, InvalidSubscription::MissingAuth)?;

        Ok(Self {
            endpoint,
            p256dh,
            auth,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn p256dh(&self) -> &str {
        &self.p256dh
    }

    pub fn auth(&self) -> &str {
        &self.auth
    }
}

/// Endpoint as supplied to unsubscribe. Only presence is checked so that rows
/// stored under any historical endpoint format can still be removed.
pub fn required_endpoint(endpoint: Option<String>) -> Result<String, InvalidSubscription> {
    endpoint
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(InvalidSubscription::MissingEndpoint)
}

/// Short stable digest of an endpoint for log lines. Push endpoints are
/// bearer-style capability URLs and must not be logged verbatim.
pub fn endpoint_fingerprint(endpoint: &str) -> String {
    let digest = Sha256::digest(endpoint.as_bytes());
    hex::encode(&digest[..8])
}

fn parse_endpoint(endpoint: Option<String>) -> Result<String, InvalidSubscription> {
    let endpoint = required_endpoint(endpoint)?;
    if endpoint.len() > MAX_ENDPOINT_LEN {
        return Err(InvalidSubscription::MalformedEndpoint);
    }

    let url = Url::parse(&endpoint).map_err(|_| InvalidSubscription::MalformedEndpoint)?;
    match url.scheme() {
        "https" | "http" if url.has_host() => Ok(endpoint),
        _ => Err(InvalidSubscription::MalformedEndpoint),
    }
}

fn parse_key(
    value: Option<String>,
    missing: InvalidSubscription,
) -> Result<String, InvalidSubscription> {
    let value = value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(missing)?;
    if value.len() > MAX_KEY_LEN {
        return Err(InvalidSubscription::MalformedKey);
    }
    Ok(value)
}
