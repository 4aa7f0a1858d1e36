//! The generic worker-pool concurrency primitive described in the concurrency model: a
//! bounded channel fanning out to a fixed pool of tasks, each draining the channel in a loop.
//! Both the input-topic consumer and the retry-topic consumer are instances of this pool,
//! just parameterized over different item types and a different `EventProcessor`.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{error, info, instrument};

use crate::error::Result;

/// Something that consumes one item of type `T` at a time. The choreography engine and the
/// DLQ retry loop both implement this over their respective item types.
#[async_trait]
pub trait EventProcessor<T>: Send + Sync
where
    T: Send + 'static,
{
    async fn process(&self, item: T) -> Result<()>;

    async fn start(&self) -> Result<()> {
        info!("processor starting up");
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        info!("processor shutting down");
        Ok(())
    }
}

/// Concurrent processing pipeline: `worker_count` tasks sharing one receiver, draining a
/// bounded channel of capacity `buffer_size`.
pub struct EventPipeline<T>
where
    T: Send + 'static,
{
    processor: Arc<dyn EventProcessor<T>>,
    item_tx: mpsc::Sender<T>,
    item_rx: Option<mpsc::Receiver<T>>,
    buffer_size: usize,
    worker_count: usize,
}

impl<T> EventPipeline<T>
where
    T: Send + 'static,
{
    pub fn new(processor: Arc<dyn EventProcessor<T>>, buffer_size: usize, worker_count: usize) -> Self {
        let (item_tx, item_rx) = mpsc::channel(buffer_size);
        Self {
            processor,
            item_tx,
            item_rx: Some(item_rx),
            buffer_size,
            worker_count,
        }
    }

    /// A sender for submitting items to the pipeline. Clone freely; the bus consumer loop
    /// holds one and pushes each decoded message through it.
    pub fn sender(&self) -> mpsc::Sender<T> {
        self.item_tx.clone()
    }

    /// Run the pool to completion. Returns once the channel is closed and every in-flight
    /// item has been processed. Runs until cancelled by the caller dropping every sender.
    #[instrument(skip(self))]
    pub async fn run(mut self) -> Result<()> {
        let item_rx = self.item_rx.take().expect("pipeline already started");

        info!(
            worker_count = self.worker_count,
            buffer_size = self.buffer_size,
            "starting worker pool"
        );

        self.processor.start().await?;

        let item_rx = Arc::new(Mutex::new(item_rx));
        let mut handles = Vec::with_capacity(self.worker_count);

        for worker_id in 0..self.worker_count {
            let processor = self.processor.clone();
            let item_rx = item_rx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    let item = {
                        let mut rx = item_rx.lock().await;
                        rx.recv().await
                    };

                    match item {
                        Some(item) => {
                            if let Err(e) = processor.process(item).await {
                                error!(worker_id, error = %e, "item processing failed");
                            }
                        }
                        None => {
                            info!(worker_id, "channel closed, worker stopping");
                            break;
                        }
                    }
                }
            }));
        }

        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "worker task panicked");
            }
        }

        self.processor.shutdown().await?;
        info!("worker pool stopped");
        Ok(())
    }
}
