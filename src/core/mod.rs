//! # Core Application Logic
//!
//! Everything between the HTTP surface and the LLM backends.
//! It knows nothing about axum or about any particular provider.
//!
//! ```text
//!   POST /api/chat
//!         │
//!         ▼
//!  ┌──────────────┐  reply call     ┌──────────────────────┐
//!  │   Gateway    │ ──────────────▶ │  CompletionProvider  │
//!  │              │  analysis call  │  (resolved once from │
//!  │              │ ──────────────▶ │   config at startup) │
//!  └──────┬───────┘                 └──────────────────────┘
//!         │ raw analysis text
//!         ▼
//!  ┌──────────────┐
//!  │   analysis   │  extract {...} → validate → or default score
//!  └──────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`config`]: layered settings (defaults, file, env, CLI)
//! - [`gateway`]: the two-call `converse` flow
//! - [`analysis`]: analysis prompt, JSON extraction and validation

pub mod analysis;
pub mod config;
pub mod gateway;
