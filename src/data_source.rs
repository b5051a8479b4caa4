//! Data-source façade over the streaming client.
//!
//! Binds a built [`Query`] and a user [`FieldSelection`] to a
//! [`PortalClient`] and exposes one batch stream spanning every range
//! segment of the query, in ascending order.

use alloy::primitives::BlockNumber;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

use crate::{
    PortalError,
    query::{BlockRange, FieldSelection, Query},
    stream::{PortalClient, StreamOptions},
    types::BatchResult,
};

/// A portal dataset bound to a query and field selection.
#[derive(Clone, Debug)]
pub struct PortalDataSource {
    client: PortalClient,
    query: Query,
    fields: FieldSelection,
}

impl PortalDataSource {
    #[must_use]
    pub fn new(client: PortalClient, query: Query, fields: FieldSelection) -> Self {
        Self { client, query, fields }
    }

    /// The current finalized height reported by the portal.
    ///
    /// # Errors
    ///
    /// See [`PortalClient::get_finalized_height`].
    pub async fn get_height(&self) -> Result<BlockNumber, PortalError> {
        self.client.get_finalized_height().await
    }

    /// Alias of [`PortalDataSource::get_height`]; this data source serves
    /// finalized blocks only.
    ///
    /// # Errors
    ///
    /// See [`PortalClient::get_finalized_height`].
    pub async fn get_finalized_height(&self) -> Result<BlockNumber, PortalError> {
        self.client.get_finalized_height().await
    }

    /// Streams the batches of every range segment of the query, in order.
    ///
    /// When `range` is given, the query is clipped to it first. Each
    /// segment waits at the head until its blocks are finalized; dropping
    /// the returned stream cancels the whole pipeline.
    #[must_use]
    pub fn get_block_stream(&self, range: Option<BlockRange>) -> ReceiverStream<BatchResult> {
        let query = match range {
            Some(outer) => self.query.clipped(outer),
            None => self.query.clone(),
        };
        let segments = query.stream_queries(&self.fields);
        let client = self.client.clone();

        let (sender, receiver) = mpsc::channel(1);
        tokio::spawn(async move {
            debug!(segments = segments.len(), "Starting data-source block stream");
            for segment in segments {
                let mut stream = client.get_finalized_stream(segment, StreamOptions::default());
                loop {
                    let item = tokio::select! {
                        // receiver dropped; dropping the stream cancels ingest
                        () = sender.closed() => return,
                        item = stream.next() => item,
                    };
                    let Some(item) = item else { break };
                    let failed = item.is_err();
                    if sender.send(item).await.is_err() || failed {
                        return;
                    }
                }
            }
            debug!("Data-source block stream completed");
        });

        ReceiverStream::new(receiver)
    }
}
