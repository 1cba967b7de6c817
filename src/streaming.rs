//! # Streaming processor
//! Turns a sequence of byte chunks into [`Node`]s, one per complete
//! top-level value. Chunk boundaries may fall anywhere, including inside a
//! token.
//!
//! [`StreamingProcessor`] is driven synchronously by its owner. For async
//! producers [`spawn_streaming_processor`] moves it onto a tokio task fed
//! through channels.

use kanal::{AsyncReceiver, AsyncSender};
#[allow(unused_imports)]
use tracing::{debug, trace, warn};

use crate::{
    codecs::Codec,
    error::Result,
    splitter::Splitter,
    types::Node,
};

/// Emits complete values as their last bytes arrive
pub struct StreamingProcessor<C: Codec> {
    splitter: C::Splitter,
    emitted: u64,
}

impl<C: Codec> StreamingProcessor<C> {
    /// Creates a processor. With `stream_array`, a top-level array is
    /// emitted element by element instead of as one node.
    pub fn new(codec: C, stream_array: bool) -> Self {
        StreamingProcessor {
            splitter: codec.splitter(stream_array),
            emitted: 0,
        }
    }

    /// Feeds the next chunk and returns every value it completed.
    ///
    /// # Errors
    /// [`Error::MalformedInput`](crate::error::Error::MalformedInput) if the
    /// buffered bytes can no longer form a valid value.
    pub fn on_next(&mut self, chunk: &[u8]) -> Result<Vec<Node>> {
        trace!(len = chunk.len(), "Chunk received");
        let nodes = self.splitter.feed(chunk)?;
        self.emitted += nodes.len() as u64;
        Ok(nodes)
    }

    /// Ends the stream and returns the values completed by its last bytes.
    ///
    /// # Errors
    /// [`Error::MalformedInput`](crate::error::Error::MalformedInput) if the
    /// stream ends inside a value.
    pub fn on_complete(mut self) -> Result<Vec<Node>> {
        let nodes = self.splitter.finish()?;
        debug!(emitted = self.emitted + nodes.len() as u64, "Stream complete");
        Ok(nodes)
    }

    /// Number of nodes emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

/// Runs `processor` on a tokio task.
///
/// Chunks sent through the returned sender are fed to the processor and
/// every completed node, or the first error, arrives on the returned
/// receiver. Dropping the sender completes the stream. The task stops
/// after an error or once the receiver is dropped.
///
/// Must be called from within a tokio runtime.
pub fn spawn_streaming_processor<C: Codec + 'static>(
    mut processor: StreamingProcessor<C>,
) -> (AsyncSender<Vec<u8>>, AsyncReceiver<Result<Node>>) {
    let (chunk_tx, chunk_rx) = kanal::unbounded_async::<Vec<u8>>();
    let (node_tx, node_rx) = kanal::unbounded_async::<Result<Node>>();

    tokio::spawn(async move {
        while let Ok(chunk) = chunk_rx.recv().await {
            let nodes = match processor.on_next(&chunk) {
                Ok(nodes) => nodes,
                Err(err) => {
                    warn!(%err, "Streaming processor failed");
                    let _ = node_tx.send(Err(err)).await;
                    return;
                }
            };

            for node in nodes {
                if node_tx.send(Ok(node)).await.is_err() {
                    debug!("Node receiver dropped");
                    return;
                }
            }
        }

        match processor.on_complete() {
            Ok(nodes) => {
                for node in nodes {
                    if node_tx.send(Ok(node)).await.is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(%err, "Stream ended inside a value");
                let _ = node_tx.send(Err(err)).await;
            }
        }
    });

    (chunk_tx, node_rx)
}
