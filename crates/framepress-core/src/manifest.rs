// crates/framepress-core/src/manifest.rs
// ============================================================================
// Module: Framepress Manifest Model
// Description: Manifest loading, validation, and lift into a runtime spec.
// Purpose: Understand a template and surface its errors before rendering.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A template package declares its layout in `manifest.json`. This module
//! loads that document, validates it structurally (first violation wins,
//! each error names the offending field), lifts it into an absolute-path
//! [`RuntimeSpec`] with defaults applied, and eagerly verifies that every
//! referenced asset exists on disk.
//!
//! The manifest is held as loose JSON and lifted field-by-field: a type
//! mismatch must surface as a validation error naming the field, not as a
//! parse failure, and unknown fields are ignored for forward compatibility.
//! Invariants:
//! - Callers invoke [`load_manifest`] → [`validate_manifest`] →
//!   [`to_runtime_spec`] → [`validate_assets`] in that order.
//! - A returned [`RuntimeSpec`] references only absolute paths that existed
//!   at validation time.
//! - `photos` is non-empty; `stickers` may be empty but never missing.
//!
//! Security posture: manifests arrive inside untrusted template archives;
//! see `Docs/security/threat_model.md`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use serde::Serialize;
use serde_json::Map;
use serde_json::Value;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Manifest filename at the root of every template directory.
pub const MANIFEST_FILE_NAME: &str = "manifest.json";
/// The only supported manifest schema version.
pub const SUPPORTED_MANIFEST_VERSION: u64 = 1;
/// Default asset base path when `assets.basePath` is absent.
pub const DEFAULT_ASSETS_BASE_PATH: &str = "assets";
/// Default output format when `output.format` is absent.
pub const DEFAULT_OUTPUT_FORMAT: &str = "png";
/// Sticker `src` prefix resolved relative to the template root.
const TEMPLATE_ROOT_PREFIX: &str = "assets/";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while loading or validating a manifest.
///
/// # Invariants
/// - `Load` maps to `MANIFEST_LOAD_ERROR`, `Invalid` to `MANIFEST_INVALID`,
///   `AssetNotFound` to `ASSET_NOT_FOUND`.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// Manifest file missing or JSON parse failed.
    #[error("manifest load failed: {0}")]
    Load(String),
    /// Structural validation failed for a named field.
    #[error("manifest invalid: {field}: {message}")]
    Invalid {
        /// Dotted path of the offending field.
        field: String,
        /// Violation description.
        message: String,
    },
    /// A referenced asset file does not exist on disk.
    #[error("asset not found: {path}")]
    AssetNotFound {
        /// Absolute path that was checked.
        path: PathBuf,
        /// Sticker identifier when the missing asset is a sticker.
        sticker_id: Option<String>,
    },
}

impl ManifestError {
    /// Builds a validation error for a named field.
    fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }
}

// ============================================================================
// SECTION: Manifest Document
// ============================================================================

/// Parsed but not yet validated manifest document.
#[derive(Debug, Clone)]
pub struct ManifestDoc {
    /// Raw JSON document.
    root: Value,
}

impl ManifestDoc {
    /// Wraps a raw JSON value as a manifest document.
    #[must_use]
    pub const fn new(root: Value) -> Self {
        Self {
            root,
        }
    }

    /// Returns the raw JSON document.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.root
    }
}

/// Reads and parses `{templateDir}/manifest.json`.
///
/// # Errors
///
/// Returns [`ManifestError::Load`] when the file is missing, unreadable, or
/// not valid JSON (the message carries the parser position).
pub fn load_manifest(template_dir: &Path) -> Result<ManifestDoc, ManifestError> {
    let manifest_path = template_dir.join(MANIFEST_FILE_NAME);
    let text = fs::read_to_string(&manifest_path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            ManifestError::Load(format!("{MANIFEST_FILE_NAME} not found at {}", manifest_path.display()))
        } else {
            ManifestError::Load(format!("{MANIFEST_FILE_NAME} unreadable: {err}"))
        }
    })?;
    let root: Value = serde_json::from_str(&text)
        .map_err(|err| ManifestError::Load(format!("{MANIFEST_FILE_NAME} parse failed: {err}")))?;
    Ok(ManifestDoc::new(root))
}

// ============================================================================
// SECTION: Structural Validation
// ============================================================================

/// Validates the manifest structure, halting on the first violation.
///
/// Checks run in a fixed order: schema version, template identity, output
/// dimensions, asset base path, background, photos, stickers.
///
/// # Errors
///
/// Returns [`ManifestError::Invalid`] naming the first offending field.
pub fn validate_manifest(doc: &ManifestDoc) -> Result<(), ManifestError> {
    let root = doc
        .as_value()
        .as_object()
        .ok_or_else(|| ManifestError::invalid("manifest", "must be a JSON object"))?;

    let version = require_integer(root, "manifestVersion", "manifestVersion")?;
    if version != i64::try_from(SUPPORTED_MANIFEST_VERSION).unwrap_or(i64::MAX) {
        return Err(ManifestError::invalid(
            "manifestVersion",
            format!("must be {SUPPORTED_MANIFEST_VERSION}, got {version}"),
        ));
    }

    require_non_empty_string(root, "templateCode", "templateCode")?;
    require_non_empty_string(root, "versionSemver", "versionSemver")?;

    let output = require_object(root, "output", "output")?;
    require_positive_integer(output, "width", "output.width")?;
    require_positive_integer(output, "height", "output.height")?;
    optional_string(output, "format", "output.format")?;

    if let Some(assets) = root.get("assets") {
        let assets = assets
            .as_object()
            .ok_or_else(|| ManifestError::invalid("assets", "must be an object"))?;
        optional_string(assets, "basePath", "assets.basePath")?;
    }

    let compose = require_object(root, "compose", "compose")?;
    require_non_empty_string(compose, "background", "compose.background")?;

    let photos = require_array(compose, "photos", "compose.photos")?;
    if photos.is_empty() {
        return Err(ManifestError::invalid("compose.photos", "must contain at least 1 item"));
    }
    for (index, photo) in photos.iter().enumerate() {
        validate_photo(photo, index)?;
    }

    if let Some(stickers) = compose.get("stickers") {
        let stickers = stickers
            .as_array()
            .ok_or_else(|| ManifestError::invalid("compose.stickers", "must be an array"))?;
        for (index, sticker) in stickers.iter().enumerate() {
            validate_sticker(sticker, index)?;
        }
    }

    Ok(())
}

/// Validates one photo declaration.
fn validate_photo(photo: &Value, index: usize) -> Result<(), ManifestError> {
    let field = |name: &str| format!("compose.photos[{index}].{name}");
    let photo = photo
        .as_object()
        .ok_or_else(|| ManifestError::invalid(format!("compose.photos[{index}]"), "must be an object"))?;
    require_string(photo, "id", &field("id"))?;
    let source = require_string(photo, "source", &field("source"))?;
    if PhotoSource::parse(source).is_none() {
        return Err(ManifestError::invalid(field("source"), "must be \"raw\" or \"cutout\""));
    }
    require_integer(photo, "x", &field("x"))?;
    require_integer(photo, "y", &field("y"))?;
    require_positive_integer(photo, "w", &field("w"))?;
    require_positive_integer(photo, "h", &field("h"))?;
    if let Some(fit) = optional_string(photo, "fit", &field("fit"))? {
        if FitMode::parse(fit).is_none() {
            return Err(ManifestError::invalid(field("fit"), "must be \"cover\" or \"contain\""));
        }
    }
    optional_integer(photo, "z", &field("z"))?;
    Ok(())
}

/// Validates one sticker declaration.
fn validate_sticker(sticker: &Value, index: usize) -> Result<(), ManifestError> {
    let field = |name: &str| format!("compose.stickers[{index}].{name}");
    let sticker = sticker.as_object().ok_or_else(|| {
        ManifestError::invalid(format!("compose.stickers[{index}]"), "must be an object")
    })?;
    require_string(sticker, "id", &field("id"))?;
    let src = require_string(sticker, "src", &field("src"))?;
    if src.is_empty() {
        return Err(ManifestError::invalid(field("src"), "must be a non-empty string"));
    }
    require_integer(sticker, "x", &field("x"))?;
    require_integer(sticker, "y", &field("y"))?;
    require_positive_integer(sticker, "w", &field("w"))?;
    require_positive_integer(sticker, "h", &field("h"))?;
    optional_number(sticker, "rotate", &field("rotate"))?;
    if let Some(opacity) = optional_number(sticker, "opacity", &field("opacity"))? {
        if !(0.0..=1.0).contains(&opacity) {
            return Err(ManifestError::invalid(field("opacity"), "must be within [0, 1]"));
        }
    }
    optional_integer(sticker, "z", &field("z"))?;
    Ok(())
}

// ============================================================================
// SECTION: Runtime Spec
// ============================================================================

/// Photo pixel source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PhotoSource {
    /// The raw uploaded photograph.
    Raw,
    /// A segmentation cutout; rendered from the raw photograph when no
    /// cutout artifact is supplied.
    Cutout,
}

impl PhotoSource {
    /// Parses a declared source value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "raw" => Some(Self::Raw),
            "cutout" => Some(Self::Cutout),
            _ => None,
        }
    }
}

/// Photo placement fit mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FitMode {
    /// Scale to fill the tile, center-cropping overflow.
    Cover,
    /// Scale to fit inside the tile, letterboxing with transparency.
    Contain,
}

impl FitMode {
    /// Parses a declared fit value.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "cover" => Some(Self::Cover),
            "contain" => Some(Self::Contain),
            _ => None,
        }
    }
}

/// Output canvas description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputSpec {
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Declared output format (always encoded as PNG on the wire).
    pub format: String,
}

/// Background asset reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackgroundSpec {
    /// Absolute path of the background image.
    pub path: PathBuf,
}

/// Photo layer placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoLayer {
    /// Declared photo identifier.
    pub id: String,
    /// Pixel source.
    pub source: PhotoSource,
    /// Tile left edge on the canvas.
    pub x: i64,
    /// Tile top edge on the canvas.
    pub y: i64,
    /// Tile width in pixels.
    pub w: u32,
    /// Tile height in pixels.
    pub h: u32,
    /// Fit mode.
    pub fit: FitMode,
    /// Z-order (lower renders first).
    pub z: i64,
}

/// Sticker layer placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StickerLayer {
    /// Declared sticker identifier.
    pub id: String,
    /// Absolute path of the sticker image.
    pub path: PathBuf,
    /// Tile left edge on the canvas.
    pub x: i64,
    /// Tile top edge on the canvas.
    pub y: i64,
    /// Tile width in pixels.
    pub w: u32,
    /// Tile height in pixels.
    pub h: u32,
    /// Rotation in degrees, positive counter-clockwise.
    pub rotate: f64,
    /// Alpha multiplier within [0, 1].
    pub opacity: f64,
    /// Z-order (lower renders first).
    pub z: i64,
}

/// Normalized manifest with defaults applied and all paths absolute.
///
/// # Invariants
/// - `photos` is non-empty; `stickers` may be empty but never missing.
/// - Every path is absolute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimeSpec {
    /// Manifest schema version.
    pub manifest_version: u64,
    /// Template identifier code.
    pub template_code: String,
    /// Template version.
    pub version_semver: String,
    /// Output canvas description.
    pub output: OutputSpec,
    /// Background asset reference.
    pub background: BackgroundSpec,
    /// Photo layers in declaration order.
    pub photos: Vec<PhotoLayer>,
    /// Sticker layers in declaration order.
    pub stickers: Vec<StickerLayer>,
}

/// Lifts a validated manifest into a [`RuntimeSpec`].
///
/// Applies defaults (`basePath="assets"`, `format="png"`, `fit="cover"`,
/// `rotate=0`, `opacity=1.0`, `z=0`) and resolves absolute paths. A sticker
/// `src` beginning with `assets/` resolves against the template root;
/// anything else resolves against the asset base path. The background always
/// resolves against the asset base path.
///
/// # Errors
///
/// Returns [`ManifestError::Invalid`] when a field shape does not hold
/// (callers are expected to run [`validate_manifest`] first).
pub fn to_runtime_spec(doc: &ManifestDoc, template_dir: &Path) -> Result<RuntimeSpec, ManifestError> {
    validate_manifest(doc)?;
    let root = doc
        .as_value()
        .as_object()
        .ok_or_else(|| ManifestError::invalid("manifest", "must be a JSON object"))?;

    let base_path = root
        .get("assets")
        .and_then(Value::as_object)
        .and_then(|assets| assets.get("basePath"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_ASSETS_BASE_PATH)
        .to_string();

    let output_obj = require_object(root, "output", "output")?;
    let output = OutputSpec {
        width: cast_dimension(require_positive_integer(output_obj, "width", "output.width")?),
        height: cast_dimension(require_positive_integer(output_obj, "height", "output.height")?),
        format: output_obj
            .get("format")
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_OUTPUT_FORMAT)
            .to_string(),
    };

    let compose = require_object(root, "compose", "compose")?;
    let background_rel = require_non_empty_string(compose, "background", "compose.background")?;
    let background = BackgroundSpec {
        path: template_dir.join(&base_path).join(background_rel),
    };

    let mut photos = Vec::new();
    for (index, photo) in require_array(compose, "photos", "compose.photos")?.iter().enumerate() {
        photos.push(lift_photo(photo, index)?);
    }

    let mut stickers = Vec::new();
    if let Some(declared) = compose.get("stickers").and_then(Value::as_array) {
        for (index, sticker) in declared.iter().enumerate() {
            stickers.push(lift_sticker(sticker, index, template_dir, &base_path)?);
        }
    }

    Ok(RuntimeSpec {
        manifest_version: SUPPORTED_MANIFEST_VERSION,
        template_code: require_non_empty_string(root, "templateCode", "templateCode")?.to_string(),
        version_semver: require_non_empty_string(root, "versionSemver", "versionSemver")?.to_string(),
        output,
        background,
        photos,
        stickers,
    })
}

/// Lifts one photo declaration, applying defaults.
fn lift_photo(photo: &Value, index: usize) -> Result<PhotoLayer, ManifestError> {
    let field = |name: &str| format!("compose.photos[{index}].{name}");
    let photo = photo
        .as_object()
        .ok_or_else(|| ManifestError::invalid(format!("compose.photos[{index}]"), "must be an object"))?;
    let source = require_string(photo, "source", &field("source"))?;
    let fit = optional_string(photo, "fit", &field("fit"))?.unwrap_or("cover");
    Ok(PhotoLayer {
        id: require_string(photo, "id", &field("id"))?.to_string(),
        source: PhotoSource::parse(source)
            .ok_or_else(|| ManifestError::invalid(field("source"), "must be \"raw\" or \"cutout\""))?,
        x: require_integer(photo, "x", &field("x"))?,
        y: require_integer(photo, "y", &field("y"))?,
        w: cast_dimension(require_positive_integer(photo, "w", &field("w"))?),
        h: cast_dimension(require_positive_integer(photo, "h", &field("h"))?),
        fit: FitMode::parse(fit)
            .ok_or_else(|| ManifestError::invalid(field("fit"), "must be \"cover\" or \"contain\""))?,
        z: optional_integer(photo, "z", &field("z"))?.unwrap_or(0),
    })
}

/// Lifts one sticker declaration, applying defaults and the path rule.
fn lift_sticker(
    sticker: &Value,
    index: usize,
    template_dir: &Path,
    base_path: &str,
) -> Result<StickerLayer, ManifestError> {
    let field = |name: &str| format!("compose.stickers[{index}].{name}");
    let sticker = sticker.as_object().ok_or_else(|| {
        ManifestError::invalid(format!("compose.stickers[{index}]"), "must be an object")
    })?;
    let src = require_string(sticker, "src", &field("src"))?;
    let path = if src.starts_with(TEMPLATE_ROOT_PREFIX) {
        template_dir.join(src)
    } else {
        template_dir.join(base_path).join(src)
    };
    Ok(StickerLayer {
        id: require_string(sticker, "id", &field("id"))?.to_string(),
        path,
        x: require_integer(sticker, "x", &field("x"))?,
        y: require_integer(sticker, "y", &field("y"))?,
        w: cast_dimension(require_positive_integer(sticker, "w", &field("w"))?),
        h: cast_dimension(require_positive_integer(sticker, "h", &field("h"))?),
        rotate: optional_number(sticker, "rotate", &field("rotate"))?.unwrap_or(0.0),
        opacity: optional_number(sticker, "opacity", &field("opacity"))?.unwrap_or(1.0),
        z: optional_integer(sticker, "z", &field("z"))?.unwrap_or(0),
    })
}

// ============================================================================
// SECTION: Asset Verification
// ============================================================================

/// Verifies that every asset referenced by the spec exists on disk.
///
/// Checks the background first, then stickers in declaration order, halting
/// at the first missing file.
///
/// # Errors
///
/// Returns [`ManifestError::AssetNotFound`] carrying the absolute path and,
/// for stickers, the declared sticker identifier.
pub fn validate_assets(spec: &RuntimeSpec) -> Result<(), ManifestError> {
    if !spec.background.path.is_file() {
        return Err(ManifestError::AssetNotFound {
            path: spec.background.path.clone(),
            sticker_id: None,
        });
    }
    for sticker in &spec.stickers {
        if !sticker.path.is_file() {
            return Err(ManifestError::AssetNotFound {
                path: sticker.path.clone(),
                sticker_id: Some(sticker.id.clone()),
            });
        }
    }
    Ok(())
}

// ============================================================================
// SECTION: Field Accessors
// ============================================================================

/// Narrows a validated positive integer into a pixel dimension.
fn cast_dimension(value: i64) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

/// Requires a field to be an object.
fn require_object<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a Map<String, Value>, ManifestError> {
    map.get(key)
        .ok_or_else(|| ManifestError::invalid(field, "is required"))?
        .as_object()
        .ok_or_else(|| ManifestError::invalid(field, "must be an object"))
}

/// Requires a field to be an array.
fn require_array<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a Vec<Value>, ManifestError> {
    map.get(key)
        .ok_or_else(|| ManifestError::invalid(field, "is required"))?
        .as_array()
        .ok_or_else(|| ManifestError::invalid(field, "must be an array"))
}

/// Requires a field to be a string.
fn require_string<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a str, ManifestError> {
    map.get(key)
        .ok_or_else(|| ManifestError::invalid(field, "is required"))?
        .as_str()
        .ok_or_else(|| ManifestError::invalid(field, "must be a string"))
}

/// Requires a field to be a non-empty string.
fn require_non_empty_string<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<&'a str, ManifestError> {
    let value = require_string(map, key, field)?;
    if value.is_empty() {
        return Err(ManifestError::invalid(field, "must be a non-empty string"));
    }
    Ok(value)
}

/// Requires a field to be an integer (floats are rejected).
fn require_integer(map: &Map<String, Value>, key: &str, field: &str) -> Result<i64, ManifestError> {
    map.get(key)
        .ok_or_else(|| ManifestError::invalid(field, "is required"))?
        .as_i64()
        .ok_or_else(|| ManifestError::invalid(field, "must be an integer"))
}

/// Requires a field to be a positive integer.
fn require_positive_integer(
    map: &Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<i64, ManifestError> {
    let value = require_integer(map, key, field)?;
    if value <= 0 {
        return Err(ManifestError::invalid(field, format!("must be a positive integer, got {value}")));
    }
    Ok(value)
}

/// Reads an optional integer field.
fn optional_integer(
    map: &Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<Option<i64>, ManifestError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| ManifestError::invalid(field, "must be an integer")),
    }
}

/// Reads an optional numeric field.
fn optional_number(
    map: &Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<Option<f64>, ManifestError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_f64()
            .map(Some)
            .ok_or_else(|| ManifestError::invalid(field, "must be a number")),
    }
}

/// Reads an optional string field.
fn optional_string<'a>(
    map: &'a Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<Option<&'a str>, ManifestError> {
    match map.get(key) {
        None => Ok(None),
        Some(value) => value
            .as_str()
            .map(Some)
            .ok_or_else(|| ManifestError::invalid(field, "must be a string")),
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sample_manifest() -> Value {
        json!({
            "manifestVersion": 1,
            "templateCode": "tpl_001",
            "versionSemver": "0.1.0",
            "output": {"width": 1024, "height": 768},
            "compose": {
                "background": "bg.png",
                "photos": [
                    {"id": "p1", "source": "raw", "x": 10, "y": 20, "w": 300, "h": 400}
                ],
                "stickers": [
                    {"id": "s1", "src": "star.png", "x": 5, "y": 6, "w": 32, "h": 32},
                    {"id": "s2", "src": "assets/moon.png", "x": 7, "y": 8, "w": 16, "h": 16}
                ]
            }
        })
    }

    /// Tests a well-formed manifest validates.
    #[test]
    fn valid_manifest_passes_validation() {
        let doc = ManifestDoc::new(sample_manifest());
        validate_manifest(&doc).expect("valid manifest");
    }

    /// Tests the schema version check fires first with the field name.
    #[test]
    fn wrong_manifest_version_is_rejected() {
        let mut manifest = sample_manifest();
        manifest["manifestVersion"] = json!(2);
        let err = validate_manifest(&ManifestDoc::new(manifest)).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { ref field, .. } if field == "manifestVersion"));
    }

    /// Tests missing required fields are named in order.
    #[test]
    fn missing_fields_are_named() {
        let cases: Vec<(fn(&mut Value), &str)> = vec![
            (|m| { m.as_object_mut().unwrap().remove("templateCode"); }, "templateCode"),
            (|m| { m.as_object_mut().unwrap().remove("output"); }, "output"),
            (|m| { m["output"].as_object_mut().unwrap().remove("height"); }, "output.height"),
            (|m| { m["compose"].as_object_mut().unwrap().remove("background"); }, "compose.background"),
            (|m| { m["compose"].as_object_mut().unwrap().remove("photos"); }, "compose.photos"),
        ];
        for (mutate, expected) in cases {
            let mut manifest = sample_manifest();
            mutate(&mut manifest);
            let err = validate_manifest(&ManifestDoc::new(manifest)).unwrap_err();
            match err {
                ManifestError::Invalid { field, .. } => assert_eq!(field, expected),
                other => panic!("expected Invalid, got {other:?}"),
            }
        }
    }

    /// Tests non-positive dimensions are rejected.
    #[test]
    fn non_positive_dimensions_are_rejected() {
        let mut manifest = sample_manifest();
        manifest["output"]["width"] = json!(0);
        let err = validate_manifest(&ManifestDoc::new(manifest)).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { ref field, .. } if field == "output.width"));

        let mut manifest = sample_manifest();
        manifest["compose"]["photos"][0]["w"] = json!(-5);
        let err = validate_manifest(&ManifestDoc::new(manifest)).unwrap_err();
        assert!(
            matches!(err, ManifestError::Invalid { ref field, .. } if field == "compose.photos[0].w")
        );
    }

    /// Tests an empty photo list is rejected.
    #[test]
    fn empty_photo_list_is_rejected() {
        let mut manifest = sample_manifest();
        manifest["compose"]["photos"] = json!([]);
        let err = validate_manifest(&ManifestDoc::new(manifest)).unwrap_err();
        assert!(matches!(err, ManifestError::Invalid { ref field, .. } if field == "compose.photos"));
    }

    /// Tests sticker opacity outside [0,1] is rejected.
    #[test]
    fn sticker_opacity_out_of_range_is_rejected() {
        let mut manifest = sample_manifest();
        manifest["compose"]["stickers"][0]["opacity"] = json!(1.5);
        let err = validate_manifest(&ManifestDoc::new(manifest)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Invalid { ref field, .. } if field == "compose.stickers[0].opacity"
        ));
    }

    /// Tests unknown source and fit values are rejected.
    #[test]
    fn unknown_enumerations_are_rejected() {
        let mut manifest = sample_manifest();
        manifest["compose"]["photos"][0]["source"] = json!("upload");
        let err = validate_manifest(&ManifestDoc::new(manifest)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Invalid { ref field, .. } if field == "compose.photos[0].source"
        ));

        let mut manifest = sample_manifest();
        manifest["compose"]["photos"][0]["fit"] = json!("stretch");
        let err = validate_manifest(&ManifestDoc::new(manifest)).unwrap_err();
        assert!(matches!(
            err,
            ManifestError::Invalid { ref field, .. } if field == "compose.photos[0].fit"
        ));
    }

    /// Tests unknown fields are ignored for forward compatibility.
    #[test]
    fn unknown_fields_are_ignored() {
        let mut manifest = sample_manifest();
        manifest["futureFeature"] = json!({"nested": true});
        manifest["compose"]["photos"][0]["futureKnob"] = json!(3);
        validate_manifest(&ManifestDoc::new(manifest)).expect("unknown fields ignored");
    }

    /// Tests defaults are applied when lifting to a runtime spec.
    #[test]
    fn lift_applies_defaults() {
        let doc = ManifestDoc::new(sample_manifest());
        let spec = to_runtime_spec(&doc, Path::new("/cache/tpl_001/0.1.0/abc")).expect("spec");
        assert_eq!(spec.output.format, "png");
        assert_eq!(spec.photos[0].fit, FitMode::Cover);
        assert_eq!(spec.photos[0].z, 0);
        assert_eq!(spec.stickers[0].rotate, 0.0);
        assert_eq!(spec.stickers[0].opacity, 1.0);
        assert_eq!(spec.stickers[0].z, 0);
    }

    /// Tests the sticker path rule and background resolution.
    #[test]
    fn lift_resolves_paths_by_prefix_rule() {
        let doc = ManifestDoc::new(sample_manifest());
        let template_dir = Path::new("/cache/tpl_001/0.1.0/abc");
        let spec = to_runtime_spec(&doc, template_dir).expect("spec");
        assert_eq!(spec.background.path, template_dir.join("assets").join("bg.png"));
        // Bare src resolves under the base path.
        assert_eq!(spec.stickers[0].path, template_dir.join("assets").join("star.png"));
        // An assets/ prefix resolves against the template root, not doubled.
        assert_eq!(spec.stickers[1].path, template_dir.join("assets/moon.png"));
        assert!(spec.background.path.is_absolute());
    }

    /// Tests a custom base path is honored for background and bare stickers.
    #[test]
    fn lift_honors_custom_base_path() {
        let mut manifest = sample_manifest();
        manifest["assets"] = json!({"basePath": "media"});
        let template_dir = Path::new("/cache/tpl_001/0.1.0/abc");
        let spec = to_runtime_spec(&ManifestDoc::new(manifest), template_dir).expect("spec");
        assert_eq!(spec.background.path, template_dir.join("media").join("bg.png"));
        assert_eq!(spec.stickers[0].path, template_dir.join("media").join("star.png"));
        // The assets/ prefix rule is independent of the base path.
        assert_eq!(spec.stickers[1].path, template_dir.join("assets/moon.png"));
    }

    /// Tests asset verification reports the background before stickers.
    #[test]
    fn asset_check_reports_background_first() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("manifest.json"), sample_manifest().to_string())
            .expect("write manifest");
        let doc = load_manifest(dir.path()).expect("load");
        let spec = to_runtime_spec(&doc, dir.path()).expect("spec");
        let err = validate_assets(&spec).unwrap_err();
        match err {
            ManifestError::AssetNotFound { path, sticker_id } => {
                assert_eq!(path, dir.path().join("assets").join("bg.png"));
                assert!(sticker_id.is_none());
            }
            other => panic!("expected AssetNotFound, got {other:?}"),
        }
    }

    /// Tests asset verification names the first missing sticker.
    #[test]
    fn asset_check_names_missing_sticker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let assets = dir.path().join("assets");
        std::fs::create_dir_all(&assets).expect("assets dir");
        std::fs::write(assets.join("bg.png"), b"png").expect("bg");
        std::fs::write(assets.join("star.png"), b"png").expect("star");
        std::fs::write(dir.path().join("manifest.json"), sample_manifest().to_string())
            .expect("write manifest");
        let doc = load_manifest(dir.path()).expect("load");
        let spec = to_runtime_spec(&doc, dir.path()).expect("spec");
        let err = validate_assets(&spec).unwrap_err();
        match err {
            ManifestError::AssetNotFound { path, sticker_id } => {
                assert_eq!(path, dir.path().join("assets/moon.png"));
                assert_eq!(sticker_id.as_deref(), Some("s2"));
            }
            other => panic!("expected AssetNotFound, got {other:?}"),
        }
    }

    /// Tests load failures distinguish missing files from parse errors.
    #[test]
    fn load_reports_missing_and_malformed_manifests() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_manifest(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Load(ref msg) if msg.contains("not found")));

        std::fs::write(dir.path().join("manifest.json"), b"{not json").expect("write");
        let err = load_manifest(dir.path()).unwrap_err();
        assert!(matches!(err, ManifestError::Load(ref msg) if msg.contains("parse failed")));
    }
}
