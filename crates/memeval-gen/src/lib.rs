//! Evidence generation pipeline: scenario catalog, core builder,
//! conversation embedder, verification chain, and the supervisor that
//! drives them per person with timeouts and a circuit breaker.

pub mod config;
pub mod context;
pub mod corebuild;
pub mod embed;
pub mod pool;
pub mod scenario;
pub mod strategy;
pub mod supervisor;
pub mod verify;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::GenConfig;
pub use context::RuntimeContext;
pub use corebuild::EvidenceCoreBuilder;
pub use embed::ConversationEmbedder;
pub use scenario::ScenarioCatalog;
pub use strategy::{strategy_for, EvidenceTypeStrategy};
pub use supervisor::{GenerationSupervisor, RunSummary, UseCaseOutcome};
pub use verify::{CheckContext, VerificationCheck, VerificationExecutor};
