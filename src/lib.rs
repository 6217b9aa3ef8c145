//! # Logan Harness
//!
//! Log query normalization and safe execution for a cloud log-analytics
//! backend, exposed as tools over HTTP and MCP.
//!
//! Queries written by people (or models) often use syntax the backend
//! rejects. The harness rewrites them into a form it accepts, adds a time
//! window, and when the backend still refuses, retries exactly once with a
//! simplified query.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌───────────────────────────────────┐   ┌───────────┐
//! │  Tools   │──▶│ normalize                         │──▶│  execute  │──▶ backend
//! │ CLI/HTTP │   │ preserve → rewrite → references   │   │ primary → │
//! │   MCP    │   │   → timefilter → validate         │   │ fallback  │
//! └──────────┘   └───────────────────────────────────┘   └───────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment overrides |
//! | [`models`] | Core data types |
//! | [`error`] | Normalization and backend error taxonomy |
//! | [`stages`] | Quote-aware pipe-stage model |
//! | [`preserve`] | Preservation classifier |
//! | [`rewrite`] | Rewrite-rule interpreter and syntax rule table |
//! | [`references`] | Log-source and field-name resolution |
//! | [`timefilter`] | Relative time filter injection |
//! | [`validate`] | Validation warnings and suggested alternatives |
//! | [`normalize`] | The full normalization pipeline |
//! | [`backend`] | Query backend trait and HTTP client |
//! | [`execute`] | Primary/fallback execution and console mode |
//! | [`catalog`] | Security query catalog and query builder |
//! | [`traits`] | Tool trait, registry, built-in tools |
//! | [`server`] | HTTP tool server |
//! | [`mcp`] | MCP bridge |

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod execute;
pub mod mcp;
pub mod models;
pub mod normalize;
pub mod preserve;
pub mod references;
pub mod rewrite;
pub mod server;
pub mod stages;
pub mod timefilter;
pub mod traits;
pub mod validate;
