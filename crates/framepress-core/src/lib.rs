// crates/framepress-core/src/lib.rs
// ============================================================================
// Module: Framepress Core Library
// Description: Core types for the Framepress composition pipeline.
// Purpose: Provide identifiers, hashing, the error taxonomy, the response
//          envelope, the manifest model, and the output-store interface.
// Dependencies: serde, serde_json, sha2, thiserror
// ============================================================================

//! ## Overview
//! Framepress composes a final image from a raw photograph and a versioned,
//! remotely hosted template package. This crate holds the types every other
//! Framepress crate agrees on:
//! - strongly typed identifiers ([`TemplateKey`], [`JobId`]),
//! - SHA-256 helpers with stable lowercase-hex encoding,
//! - the closed error taxonomy ([`ErrorCode`]) and response envelope
//!   ([`JobResult`]),
//! - the manifest model and its lift into an absolute-path [`RuntimeSpec`],
//! - the [`OutputStore`] seam used to persist rendered outputs.
//!
//! Invariants:
//! - [`ErrorCode`] is closed; every failure a client can observe is one of
//!   its variants with a fixed retryability.
//! - A [`RuntimeSpec`] references only absolute paths.
//!
//! Security posture: manifests and template packages are untrusted input;
//! see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod envelope;
pub mod error;
pub mod hashing;
pub mod identifiers;
pub mod manifest;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use envelope::JobFailure;
pub use envelope::JobResult;
pub use envelope::JobSuccess;
pub use envelope::Note;
pub use envelope::OutputUrls;
pub use envelope::StepTiming;
pub use envelope::TemplateRef;
pub use envelope::Timing;
pub use error::ErrorBody;
pub use error::ErrorCode;
pub use error::StageName;
pub use identifiers::ChecksumSha256;
pub use identifiers::JobId;
pub use identifiers::KeyError;
pub use identifiers::TemplateCode;
pub use identifiers::TemplateKey;
pub use identifiers::VersionSemver;
pub use manifest::BackgroundSpec;
pub use manifest::FitMode;
pub use manifest::ManifestDoc;
pub use manifest::ManifestError;
pub use manifest::OutputSpec;
pub use manifest::PhotoLayer;
pub use manifest::PhotoSource;
pub use manifest::RuntimeSpec;
pub use manifest::StickerLayer;
pub use manifest::load_manifest;
pub use manifest::to_runtime_spec;
pub use manifest::validate_assets;
pub use manifest::validate_manifest;
pub use store::OutputKind;
pub use store::OutputStore;
pub use store::StoreError;
pub use store::StoredOutput;
