use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::clock::Clock;
use crate::error::{ServiceError, ValidationError};
use crate::store::BucketStore;

const LINKS_FIELD: &str = "links";

/// Acknowledgement of a stored batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub timestamp: u64,
    pub links: usize,
}

/// Pulls the `links` array out of a JSON request body.
///
/// Anything other than an object carrying `links` counts as a missing field;
/// a `links` value that is not an array of strings is rejected as non-string.
pub fn links_from_json(body: &Value) -> Result<Vec<String>, ValidationError> {
    let links = body
        .as_object()
        .and_then(|object| object.get(LINKS_FIELD))
        .ok_or(ValidationError::MissingLinksField)?;

    let items = links.as_array().ok_or(ValidationError::NonStringLink)?;
    items
        .iter()
        .map(|item| {
            item.as_str()
                .map(str::to_string)
                .ok_or(ValidationError::NonStringLink)
        })
        .collect()
}

/// Collects every `links` field of an urlencoded form body, in order.
pub fn links_from_form(body: &[u8]) -> Result<Vec<String>, ValidationError> {
    let links: Vec<String> = url::form_urlencoded::parse(body)
        .filter(|(name, _)| name == LINKS_FIELD)
        .map(|(_, value)| value.into_owned())
        .collect();
    if links.is_empty() {
        return Err(ValidationError::MissingLinksField);
    }
    Ok(links)
}

/// Stamps batches of visited links with the current second and stores them.
pub struct VisitRecorder {
    store: Arc<dyn BucketStore>,
    clock: Arc<dyn Clock>,
}

impl VisitRecorder {
    pub fn new(store: Arc<dyn BucketStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn record(&self, links: &[String]) -> Result<Ack, ServiceError> {
        let timestamp = self.clock.now_unix();
        self.store.add_to_bucket(timestamp, links)?;

        info!(
            action = "record",
            component = "visit_recorder",
            timestamp,
            link_count = links.len(),
            "Recorded visited links"
        );
        Ok(Ack {
            timestamp,
            links: links.len(),
        })
    }

    /// Validates a JSON body and records its links; nothing is written on rejection.
    pub fn record_json(&self, body: &Value) -> Result<Ack, ServiceError> {
        let links = links_from_json(body)?;
        self.record(&links)
    }
}
