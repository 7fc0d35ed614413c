//! Deliverable packaging in front of [`JobLifecycleClient::deliver_job`].

use std::sync::Arc;

use url::Url;

use crate::lifecycle::{JobLifecycleClient, LifecycleError, LifecycleResult};
use crate::types::DeliverablePayload;

/// Stateless validation + packaging layer: trims the raw payload, classifies
/// it as a URI or free text, and hands it to the lifecycle client.
pub struct DeliverableSubmitter {
    client: Arc<JobLifecycleClient>,
}

impl DeliverableSubmitter {
    pub fn new(client: Arc<JobLifecycleClient>) -> Self {
        Self { client }
    }

    pub async fn submit(&self, job_id: u64, raw: &str) -> LifecycleResult {
        let payload = normalize_payload(raw)?;
        self.client.deliver_job(job_id, payload).await
    }
}

/// Normalize a raw deliverable string into the protocol payload shape.
///
/// A payload that parses as an http/https/ipfs URL becomes a URI reference,
/// anything else is carried as inline text.
pub fn normalize_payload(raw: &str) -> Result<DeliverablePayload, LifecycleError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LifecycleError::EmptyDeliverable);
    }

    match Url::parse(trimmed) {
        Ok(url) if matches!(url.scheme(), "http" | "https" | "ipfs") => {
            Ok(DeliverablePayload::Uri(trimmed.to_string()))
        }
        _ => Ok(DeliverablePayload::Text(trimmed.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_payload_detected() {
        let payload = normalize_payload("https://ipfs.io/ipfs/xyz").unwrap();
        assert_eq!(
            payload,
            DeliverablePayload::Uri("https://ipfs.io/ipfs/xyz".to_string())
        );
    }

    #[test]
    fn test_free_text_payload() {
        let payload = normalize_payload("  final report attached  ").unwrap();
        assert_eq!(
            payload,
            DeliverablePayload::Text("final report attached".to_string())
        );
    }

    #[test]
    fn test_unknown_scheme_treated_as_text() {
        let payload = normalize_payload("ftp://example.com/file").unwrap();
        assert!(matches!(payload, DeliverablePayload::Text(_)));
    }

    #[test]
    fn test_empty_payload_rejected() {
        assert!(matches!(
            normalize_payload("   "),
            Err(LifecycleError::EmptyDeliverable)
        ));
        assert!(matches!(
            normalize_payload(""),
            Err(LifecycleError::EmptyDeliverable)
        ));
    }
}
