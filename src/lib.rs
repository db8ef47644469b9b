//! # Corpus Sync
//!
//! An ingestion catalog and search-index synchronization engine.
//!
//! Corpus Sync ingests content from pluggable collectors into a
//! content-addressed store plus a durable catalog, then keeps an
//! external search index converged on that catalog through idempotent
//! reconciliation passes.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────┐
//! │ Collectors │──▶│ Persistence   │──▶│   Catalog    │
//! │ filesystem │   │ validate+store│   │   (SQLite)   │
//! └────────────┘   └──────────────┘   └──────┬──────┘
//!                                            │ diff
//!                                            ▼
//!                                    ┌──────────────┐
//!                                    │  Sync Engine  │
//!                                    │ chunk + embed │
//!                                    └──────┬───────┘
//!                                           ▼
//!                                    ┌──────────────┐
//!                                    │ Search Index  │
//!                                    └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`resource`] | The resource capability trait and validation |
//! | [`metadata`] | Metadata normalization and flattening |
//! | [`content_store`] | Atomic content-addressed blob storage |
//! | [`catalog`] | The durable resource catalog |
//! | [`persist`] | The validate → store → catalog pipeline |
//! | [`collector_fs`] | Filesystem collector |
//! | [`chunker`] | Deterministic text chunking |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`index`] | The search-index seam |
//! | [`sync`] | Catalog → index reconciliation |

pub mod catalog;
pub mod chunker;
pub mod collector;
pub mod collector_fs;
pub mod config;
pub mod content_store;
pub mod context;
pub mod db;
pub mod embedding;
pub mod error;
pub mod index;
pub mod metadata;
pub mod persist;
pub mod resource;
pub mod status;
pub mod sync;
