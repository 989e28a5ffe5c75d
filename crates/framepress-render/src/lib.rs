// crates/framepress-render/src/lib.rs
// ============================================================================
// Module: Framepress Render Library
// Description: Deterministic 2D compositor for runtime specs.
// Purpose: Turn a runtime spec plus a raw photograph into an RGBA image.
// Dependencies: framepress-core, image
// ============================================================================

//! ## Overview
//! The render engine consumes a [`framepress_core::RuntimeSpec`] and a
//! decoded raw photograph and produces the composed RGBA canvas. It owns no
//! I/O beyond reading the asset files the spec points at.
//! Invariants:
//! - Identical inputs produce byte-identical output (fixed bilinear
//!   resampling, no time, randomness, or parallelism).
//! - Layers render in ascending `z`; ties preserve declaration order with
//!   photos before stickers.
//! - Tiles are clipped to the canvas; off-canvas coordinates are not errors.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod engine;
pub mod ops;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use engine::RenderError;
pub use engine::render;
