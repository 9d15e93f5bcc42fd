//! Start and cancel calls against the transfer server.
//!
//! Starting returns the id the server assigned; everything after that is
//! observed through the transfer's event stream. Canceling only asks the
//! remote side to stop; the record changes when the `signal` message
//! arrives.

use crate::error::{Result, TransferError};
use crate::transfer::record::{Action, AgentRef, NewTransfer, TransferItem};
use crate::transfer::registry::RegistryHandle;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

/// Bytes left as-is in a destination, the same set a browser's
/// `encodeURIComponent` keeps. The server query-unescapes destinations.
const DESTINATION: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// One entry of a start request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceItem {
    pub source: String,
    pub destination: String,
    pub overwrite: bool,
    pub keep: bool,
}

#[derive(Debug, Clone)]
pub struct StartTransfer {
    pub agent: AgentRef,
    pub action: Action,
    pub items: Vec<TransferItem>,
    pub overwrite: bool,
    /// Keep both files on a name clash instead of failing
    pub keep: bool,
    pub compress: bool,
}

impl StartTransfer {
    /// Request body entries; sources go raw, destinations percent-encoded
    pub fn resource_items(&self) -> Vec<ResourceItem> {
        self.items
            .iter()
            .map(|item| ResourceItem {
                source: item.from.clone(),
                destination: utf8_percent_encode(&item.to, DESTINATION).to_string(),
                overwrite: self.overwrite,
                keep: self.keep,
            })
            .collect()
    }
}

/// Server reply to a start request
#[derive(Debug, Clone, Deserialize)]
pub struct StartReply {
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

impl StartReply {
    /// The assigned transfer id, or the server's refusal
    pub fn into_transfer_id(self) -> Result<String> {
        if self.code != 0 {
            return Err(TransferError::Remote {
                code: self.code,
                message: self.message,
            });
        }

        let transfer_id = self.message.trim();
        if transfer_id.is_empty() {
            return Err(TransferError::Remote {
                code: self.code,
                message: "empty transfer id".to_string(),
            });
        }
        Ok(transfer_id.to_string())
    }
}

#[async_trait]
pub trait TransferApi: Send + Sync {
    /// Start the operation; returns its transfer id
    async fn start(&self, request: &StartTransfer) -> Result<String>;

    async fn cancel(&self, agent_id: u64, transfer_id: &str) -> Result<()>;
}

// =============================================================================
// HTTP
// =============================================================================

pub struct HttpTransferApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransferApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn start_url(&self, request: &StartTransfer) -> String {
        format!(
            "{}/api/remote/{}?action={}&compress={}",
            self.base_url,
            request.agent.id,
            request.action.remote_action(),
            request.compress
        )
    }

    pub fn cancel_url(&self, agent_id: u64, transfer_id: &str) -> String {
        format!(
            "{}/api/remote/{}/transfers/{}",
            self.base_url, agent_id, transfer_id
        )
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransferError::Remote {
            code: i32::from(status.as_u16()),
            message: body.trim().to_string(),
        })
    }
}

#[async_trait]
impl TransferApi for HttpTransferApi {
    async fn start(&self, request: &StartTransfer) -> Result<String> {
        let response = self
            .client
            .patch(self.start_url(request))
            .json(&request.resource_items())
            .send()
            .await?;

        let reply: StartReply = Self::check(response).await?.json().await?;
        let transfer_id = reply.into_transfer_id()?;

        tracing::info!(
            agent_id = request.agent.id,
            transfer_id = %transfer_id,
            items = request.items.len(),
            "Transfer started"
        );
        Ok(transfer_id)
    }

    async fn cancel(&self, agent_id: u64, transfer_id: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.cancel_url(agent_id, transfer_id))
            .send()
            .await?;
        Self::check(response).await?;

        tracing::info!(agent_id, transfer_id, "Cancel requested");
        Ok(())
    }
}

/// Start a transfer remotely and begin tracking it
pub async fn start_tracked(
    api: &dyn TransferApi,
    registry: &RegistryHandle,
    request: StartTransfer,
) -> Result<String> {
    let transfer_id = api.start(&request).await?;

    registry
        .create(NewTransfer::new(
            transfer_id.clone(),
            request.action,
            request.agent,
            request.items,
        ))
        .await?;

    Ok(transfer_id)
}

/// Parse a `SOURCE=DESTINATION` pair. A trailing `/` on the source marks a
/// directory.
pub fn parse_item(arg: &str) -> Result<TransferItem> {
    let (from, to) = arg
        .split_once('=')
        .filter(|(from, to)| !from.is_empty() && !to.is_empty())
        .ok_or_else(|| TransferError::Config(format!("expected SOURCE=DESTINATION, got {:?}", arg)))?;

    let is_dir = from.ends_with('/');
    let name = from
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string();

    Ok(TransferItem {
        from: from.to_string(),
        to: to.to_string(),
        name,
        is_dir,
    })
}
