//! # ALFA Media Vault
//!
//! Password-protected, encrypted image and video library with AI tagging.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    ALFA MEDIA VAULT                      │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────┐  │
//! │  │ KEY MANAGER │  │  ENCRYPTION │  │  CATALOG        │  │
//! │  │ PBKDF2 +    │──│  ENGINE     │  │  categories +   │  │
//! │  │ verifier    │  │  AES-256-GCM│  │  AI configs     │  │
//! │  └─────────────┘  └──────┬──────┘  └────────┬────────┘  │
//! │                          │                   │           │
//! │  ┌─────────────┐  ┌──────┴──────┐  ┌────────┴────────┐  │
//! │  │  INGESTION  │──│ RECORD STORE│──│  TAGGING        │  │
//! │  │  PIPELINE   │  │  (SQLite)   │  │  PIPELINE       │  │
//! │  └──────┬──────┘  └─────────────┘  └────────┬────────┘  │
//! │         │                                    │           │
//! │  ┌──────┴──────────┐              ┌──────────┴────────┐  │
//! │  │ MEDIA ANALYZER  │              │ VISION ANALYZER   │  │
//! │  │ (image crate)   │              │ (OpenAI-style API)│  │
//! │  └─────────────────┘              └───────────────────┘  │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Model
//!
//! - Master key derived from the password with PBKDF2-HMAC-SHA256 (100k rounds)
//! - Password checked against an encrypted verifier, never stored
//! - Originals and thumbnails sealed separately with AES-256-GCM, fresh IV each
//! - AI API keys encrypted at rest
//! - Key held only while unlocked and zeroized on lock

pub mod analyzer;
pub mod batch;
pub mod catalog;
pub mod config;
pub mod crypto;
pub mod error;
pub mod export;
pub mod ingest;
pub mod model;
pub mod store;
pub mod tagging;
pub mod thumbs;
pub mod vault;

#[cfg(feature = "vision-http")]
pub mod vision;

#[cfg(test)]
pub(crate) mod testing;

pub use analyzer::{MediaAnalyzer, RawFile, VisionAnalyzer};
pub use batch::{BatchReport, CancelToken};
pub use catalog::{AiConfigDraft, Catalog};
pub use config::VaultConfig;
pub use error::{VaultError, VaultResult};
pub use export::MetadataExport;
pub use ingest::IngestionPipeline;
pub use model::{AiConfig, Category, MediaItem, MediaType};
pub use tagging::{extract_tags, TaggingPipeline};
pub use thumbs::ImageAnalyzer;
pub use vault::{MediaVault, VaultStats};

#[cfg(feature = "vision-http")]
pub use vision::OpenAiVision;

/// ALFA Media Vault version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// ALFA Media Vault signature
pub const SIGNATURE: &str = "ALFA_MEDIA_VAULT_v1";
