mod image_caption;

use crate::HandlerPayload;
pub use image_caption::*;
use tokio::sync::{mpsc, oneshot};

/// A loaded model that turns one input item into one output.
pub trait Model {
    type Item;
    type Output;

    fn process(
        &mut self,
        item: Self::Item,
    ) -> impl std::future::Future<Output = anyhow::Result<Self::Output>> + Send;
}

pub type ModelHandlerTx<Item, Output> = mpsc::Sender<HandlerPayload<Item, Output>>;

/// Cloneable handle to a model owned by a dedicated worker thread.
///
/// Generation needs `&mut` access to the model (the decoder kv cache is reset
/// between runs), so the model itself is never shared between requests:
/// callers queue items on a channel and the worker serves them one at a time.
#[derive(Debug)]
pub struct AIModel<TItem, TOutput> {
    model_id: String, // for better logging
    tx: ModelHandlerTx<TItem, TOutput>,
}

impl<TItem, TOutput> Clone for AIModel<TItem, TOutput> {
    fn clone(&self) -> Self {
        Self {
            model_id: self.model_id.clone(),
            tx: self.tx.clone(),
        }
    }
}

impl<TItem, TOutput> AIModel<TItem, TOutput>
where
    TItem: Send + 'static,
    TOutput: Send + 'static,
{
    /// Move an already loaded `model` onto its own worker thread and return a
    /// handle to it. The model stays resident until every handle is dropped.
    pub fn serve<T>(model_id: String, model: T) -> anyhow::Result<Self>
    where
        T: Model<Item = TItem, Output = TOutput> + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<HandlerPayload<TItem, TOutput>>(512);

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        std::thread::spawn(move || {
            rt.block_on(async move {
                let mut model = model;
                while let Some((item, result_tx)) = rx.recv().await {
                    // If the result channel closed, the caller is gone and the
                    // work can be skipped.
                    if result_tx.is_closed() {
                        continue;
                    }
                    let result = model.process(item).await;
                    if result_tx.send(result).is_err() {
                        tracing::error!("failed to send result");
                    }
                }
                tracing::warn!("all handles dropped, model worker stops");
            });
        });

        Ok(Self { model_id, tx })
    }

    #[tracing::instrument(name = "AIModel::process", err(Debug), skip_all, fields(model_id = %self.model_id))]
    pub async fn process(&self, item: TItem) -> anyhow::Result<TOutput> {
        let (result_tx, rx) = oneshot::channel();
        if self.tx.send((item, result_tx)).await.is_err() {
            anyhow::bail!("model worker is gone");
        }

        match rx.await {
            Ok(result) => result,
            Err(e) => {
                anyhow::bail!("failed to receive result: {:?}", e);
            }
        }
    }
}
