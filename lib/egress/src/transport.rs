//! The HTTP transport for bulk requests: newline-delimited
//! `{"index":{...}}` / document pairs, the real Elasticsearch/OpenSearch
//! bulk wire format (§4.J expansion).

use serde_json::json;

use crate::error::{Error, TransportSnafu};

/// One index action: the destination it targets, the document-type label,
/// and the normalised document body.
#[derive(Debug, Clone)]
pub struct Action {
    pub destination_wire_name: String,
    pub doc_type: String,
    pub document: serde_json::Map<String, serde_json::Value>,
}

/// Renders a batch of actions as a bulk request body: one
/// `{"index":{"_index":...,"_type":...}}` line followed by the document
/// line, per action.
pub(crate) fn render_ndjson(actions: &[Action]) -> String {
    let mut body = String::new();
    for action in actions {
        let header = json!({
            "index": {
                "_index": action.destination_wire_name,
                "_type": action.doc_type,
            }
        });
        body.push_str(&header.to_string());
        body.push('\n');
        body.push_str(&serde_json::Value::Object(action.document.clone()).to_string());
        body.push('\n');
    }
    body
}

/// Abstracts the remote document store so the batcher (§4.J) is testable
/// without a live endpoint.
#[async_trait::async_trait]
pub trait BulkTransport: Send + Sync {
    async fn send_bulk(&self, body: String) -> Result<(), Error>;
}

/// Posts the bulk body to a real Elasticsearch/OpenSearch-compatible
/// `_bulk` endpoint.
pub struct ReqwestTransport {
    client: reqwest::Client,
    bulk_url: String,
}

impl ReqwestTransport {
    pub fn new(bulk_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            bulk_url: bulk_url.into(),
        }
    }
}

#[async_trait::async_trait]
impl BulkTransport for ReqwestTransport {
    async fn send_bulk(&self, body: String) -> Result<(), Error> {
        let response = self
            .client
            .post(&self.bulk_url)
            .header("content-type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .map_err(|error| TransportSnafu { message: error.to_string() }.build())?;

        if !response.status().is_success() {
            return TransportSnafu {
                message: format!("bulk endpoint returned {}", response.status()),
            }
            .fail();
        }
        Ok(())
    }
}
