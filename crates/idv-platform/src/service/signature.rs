//! Webhook Signature Verification
//!
//! Header format: `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`. The signed
//! payload is `"<t>." ++ raw body`, authenticated with HMAC-SHA256 under the
//! endpoint secret. The body is only parsed after a `v1` entry matches.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Deserializer};
use sha2::Sha256;
use subtle::ConstantTimeEq;
use tracing::debug;

use idv_common::VerificationEvent;

use crate::error::{PlatformError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

const SCHEME: &str = "v1";

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: SessionObject,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    metadata: HashMap<String, String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Verifies event deliveries against the shared endpoint secret
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
    tolerance: Duration,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>, tolerance: Duration) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            tolerance,
        }
    }

    /// Verify against the current time
    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> Result<VerificationEvent> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    /// Verify against an explicit unix timestamp
    pub fn verify_at(&self, payload: &[u8], header: Option<&str>, now: i64) -> Result<VerificationEvent> {
        let header = header
            .filter(|h| !h.trim().is_empty())
            .ok_or_else(|| PlatformError::invalid_signature("missing signature header"))?;
        let parsed = ParsedHeader::parse(header)?;

        let skew = now.abs_diff(parsed.timestamp);
        if skew > self.tolerance.as_secs() {
            return Err(PlatformError::invalid_signature(format!(
                "timestamp outside tolerance ({}s)",
                skew
            )));
        }

        let expected = self.compute(parsed.timestamp, payload);
        let matched = parsed
            .signatures
            .iter()
            .any(|candidate| bool::from(expected.as_slice().ct_eq(candidate.as_slice())));
        if !matched {
            return Err(PlatformError::invalid_signature("no matching signature"));
        }

        let event = parse_event(payload)?;
        debug!(event_id = %event.id, event_type = %event.event_type, "Signature verified");
        Ok(event)
    }

    /// Build a header value for `payload` signed at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> String {
        format!(
            "t={},{}={}",
            timestamp,
            SCHEME,
            hex::encode(self.compute(timestamp, payload))
        )
    }

    fn compute(&self, timestamp: i64, payload: &[u8]) -> Vec<u8> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

impl ParsedHeader {
    fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for item in header.split(',') {
            let Some((key, value)) = item.trim().split_once('=') else {
                continue;
            };
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|_| PlatformError::invalid_signature("malformed timestamp"))?;
                    timestamp = Some(t);
                }
                SCHEME => {
                    // Undecodable entries simply never match
                    if let Ok(bytes) = hex::decode(value) {
                        signatures.push(bytes);
                    }
                }
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| PlatformError::invalid_signature("missing timestamp"))?;
        if signatures.is_empty() {
            return Err(PlatformError::invalid_signature(format!(
                "no {} signature in header",
                SCHEME
            )));
        }
        Ok(Self { timestamp, signatures })
    }
}

fn parse_event(payload: &[u8]) -> Result<VerificationEvent> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)
        .map_err(|e| PlatformError::invalid_event(format!("unreadable event body: {}", e)))?;

    Ok(VerificationEvent {
        id: envelope.id,
        event_type: envelope.event_type,
        session_id: envelope.data.object.id,
        metadata: envelope.data.object.metadata,
    })
}
