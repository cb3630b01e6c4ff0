//! Diagnostic reasoning for Agrow.
//!
//! A query moves through a fixed pipeline:
//!
//! 1. **Classify** the query into an [`Intent`] by keyword scoring
//! 2. **Route** it to the Fast Lane or a Deep Dive ([`RoutingPolicy`])
//! 3. **Tier** the context bundle into four priority slices for that intent
//! 4. **Reason** through one [`ReasoningProtocol`], one backend call per stage
//! 5. **Synthesize** the farmer-facing answer and a [`TraceRecord`]
//!
//! Every stage reply is parsed leniently. A reply that cannot be parsed is
//! replaced by that stage's fallback payload, so the only error a query can
//! surface is total exhaustion of the completion backend.

pub mod digest;
pub mod intent;
pub mod orchestrator;
pub mod persona;
pub mod priority;
pub mod prompts;
pub mod protocol;
pub mod router;
pub mod schema;
pub mod stage;
pub mod synthesizer;
pub mod trace;

pub use intent::{Intent, IntentResult, UnknownIntent, classify, is_comparison_query};
pub use orchestrator::{Answer, Orchestrator};
pub use persona::{Persona, Questionnaire, derive_persona};
pub use priority::{PriorityTiers, TierKeys, build_staged_context, get_tiers};
pub use protocol::{AdversarialDeepDive, FastLane, ReasoningProtocol, StagedDeepDive};
pub use router::{ProtocolSet, RoutingError, RoutingPolicy};
pub use stage::{ReasoningResult, RoutingMode, StageName, StageResult};
pub use synthesizer::Synthesizer;
pub use trace::{StageTrace, TraceRecord, build_trace, followups_for};
