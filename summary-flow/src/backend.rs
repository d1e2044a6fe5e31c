use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::BackendError;
use crate::models::{GenerationRequest, GenerationResult};

/// The generative model, seen from the outside: prompt in, raw text out.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResult, BackendError>;
}

/// Serialises every `generate` call through one gate, so at most one generation is
/// in flight no matter how many sessions share the backend.
pub struct SingleFlight<B> {
    inner: B,
    gate: Mutex<()>,
}

impl<B> SingleFlight<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            gate: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }
}

#[async_trait]
impl<B: GenerationBackend> GenerationBackend for SingleFlight<B> {
    async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> std::result::Result<GenerationResult, BackendError> {
        let _permit = self.gate.lock().await;
        debug!(
            max_output_tokens = request.max_output_tokens,
            has_image = request.image.is_some(),
            "Dispatching generation"
        );
        self.inner.generate(request).await
    }
}
