//! Charter: a local-first, multi-tenant principle-compliance engine.
//!
//! Charter holds a versioned set of **principles** (policy statements
//! with semantic embeddings), gives each **tenant** its own enabled
//! subset, and scores free-text **actions** against the principles in
//! effect for that tenant. Every evaluation is appended to an
//! append-only audit log.
//!
//! # Architecture
//!
//! - `core` — the ambient stack: SQLite access through the [`DbBroker`]
//!   thin waist (serialized writes + JSONL operational audit), schema
//!   definitions, TOML configuration, error taxonomy, ids and
//!   timestamps.
//! - `engine` — the compliance kernel:
//!   - `principles`: canonical policy statements, immutable bodies,
//!     deactivate-never-delete lifecycle.
//!   - `tenants`: tenant registry and per-tenant principle links with
//!     upsert enable / soft disable semantics.
//!   - `embedding`: the [`EmbeddingProvider`] contract, the built-in
//!     deterministic hash-bucket provider, and timeout-bounded calls.
//!   - `matcher`: cosine ranking over a named candidate scope with a
//!     deterministic lower-id tie-break.
//!   - `polarity`: injectable match-interpretation strategy
//!     (compliant / violating / neutral).
//!   - `evaluator`: the orchestration — embed, match, classify,
//!     aggregate, log, return a verdict.
//!   - `log`: the append-only evaluation log.
//!
//! Deleting a tenant never deletes its evaluation history: the log's
//! tenant reference is nulled, not cascaded.
//!
//! [`DbBroker`]: core::broker::DbBroker
//! [`EmbeddingProvider`]: engine::embedding::EmbeddingProvider

pub mod cli;
pub mod core;
pub mod engine;
