//! LLM Gateway: owns the one active text-generation client for the process.
//!
//! The gateway is an explicitly owned object (held in `AppState` as an `Arc`)
//! rather than a global. The active client lives in a single slot:
//! - `configure` builds the new client outside the lock and swaps it in whole,
//!   so readers see either the old or the new configuration, never a mix.
//! - `get` lazily builds a client from environment defaults; the slot is
//!   re-checked under the write lock so concurrent first callers build once.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;
use tracing::info;

use crate::llm_client::{LlmClient, LlmError, LlmOptions, TextGenerator};

/// Configuration errors. These are caller bugs, not run-time data conditions.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid LLM configuration: {0}")]
    InvalidConfig(String),
}

type DefaultsFn = dyn Fn() -> Result<LlmOptions, GatewayError> + Send + Sync;
type BuildFn = dyn Fn(&LlmOptions) -> Result<Arc<dyn TextGenerator>, GatewayError> + Send + Sync;

/// A built generator paired with the exact options it was built from.
pub struct ActiveGenerator {
    options: LlmOptions,
    generator: Arc<dyn TextGenerator>,
}

impl ActiveGenerator {
    pub fn options(&self) -> &LlmOptions {
        &self.options
    }

    pub async fn generate(&self, system: &str, prompt: &str) -> Result<String, LlmError> {
        self.generator.generate(system, prompt).await
    }
}

pub struct LlmGateway {
    slot: RwLock<Option<Arc<ActiveGenerator>>>,
    defaults: Box<DefaultsFn>,
    build: Box<BuildFn>,
}

impl LlmGateway {
    /// Production gateway: Anthropic client, defaults read from the environment.
    pub fn new() -> Self {
        Self::with_builder(LlmOptions::from_env, |options| {
            let client = LlmClient::new(options.clone())?;
            Ok(Arc::new(client) as Arc<dyn TextGenerator>)
        })
    }

    /// Gateway with custom default and client construction.
    pub fn with_builder<D, B>(defaults: D, build: B) -> Self
    where
        D: Fn() -> Result<LlmOptions, GatewayError> + Send + Sync + 'static,
        B: Fn(&LlmOptions) -> Result<Arc<dyn TextGenerator>, GatewayError> + Send + Sync + 'static,
    {
        Self {
            slot: RwLock::new(None),
            defaults: Box::new(defaults),
            build: Box::new(build),
        }
    }

    /// Replaces the active configuration. Last write wins.
    pub fn configure(&self, options: LlmOptions) -> Result<Arc<ActiveGenerator>, GatewayError> {
        let active = self.activate(options)?;
        *self.write_slot() = Some(active.clone());
        info!(
            "LLM gateway configured (model: {}, temperature: {}, max_tokens: {})",
            active.options.model, active.options.temperature, active.options.max_output_tokens
        );
        Ok(active)
    }

    /// Returns the active client, building one from defaults on first use.
    pub fn get(&self) -> Result<Arc<ActiveGenerator>, GatewayError> {
        if let Some(active) = self.read_slot().as_ref() {
            return Ok(active.clone());
        }

        let mut slot = self.write_slot();
        if let Some(active) = slot.as_ref() {
            return Ok(active.clone());
        }

        let options = (self.defaults)()?;
        let active = self.activate(options)?;
        info!(
            "LLM gateway lazily initialized (model: {})",
            active.options.model
        );
        *slot = Some(active.clone());
        Ok(active)
    }

    pub fn is_initialized(&self) -> bool {
        self.read_slot().is_some()
    }

    fn activate(&self, options: LlmOptions) -> Result<Arc<ActiveGenerator>, GatewayError> {
        options.validate()?;
        let generator = (self.build)(&options)?;
        Ok(Arc::new(ActiveGenerator { options, generator }))
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Option<Arc<ActiveGenerator>>> {
        self.slot.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Option<Arc<ActiveGenerator>>> {
        self.slot.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LlmGateway {
    fn default() -> Self {
        Self::new()
    }
}
