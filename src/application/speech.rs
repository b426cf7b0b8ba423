//! Worker-scoped speech model.
//!
//! The model is built on first use and then shared by every job this worker
//! runs. Inference calls are serialized; a failed load leaves the cell empty
//! so the next job tries again.

use crate::domain::errors::EngineError;
use crate::domain::timeline::TranscriptSegment;
use crate::ports::engines::SpeechToText;
use futures::future::BoxFuture;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

type Loader =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn SpeechToText>, EngineError>> + Send + Sync>;

pub struct SpeechModel {
    loader: Loader,
    engine: OnceCell<Arc<dyn SpeechToText>>,
    inference: Mutex<()>,
}

impl SpeechModel {
    pub fn lazy<F, Fut>(loader: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Arc<dyn SpeechToText>, EngineError>> + Send + 'static,
    {
        Self {
            loader: Box::new(move || Box::pin(loader())),
            engine: OnceCell::new(),
            inference: Mutex::new(()),
        }
    }

    /// A model that is already loaded.
    pub fn ready(engine: Arc<dyn SpeechToText>) -> Self {
        Self {
            loader: Box::new(|| {
                Box::pin(async { Err(EngineError::Unavailable("no loader".to_string())) })
            }),
            engine: OnceCell::new_with(Some(engine)),
            inference: Mutex::new(()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }

    pub async fn transcribe(&self, media: &Path) -> Result<Vec<TranscriptSegment>, EngineError> {
        let engine = self.engine.get_or_try_init(|| (self.loader)()).await?;
        let _guard = self.inference.lock().await;
        engine.transcribe(media).await
    }
}
