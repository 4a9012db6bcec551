mod traits;

pub mod blip;

pub use tokenizers;
pub use traits::*;

use tokio::sync::oneshot;

pub type HandlerPayload<TItem, TOutput> = (TItem, oneshot::Sender<anyhow::Result<TOutput>>);
