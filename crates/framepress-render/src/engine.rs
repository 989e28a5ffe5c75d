// crates/framepress-render/src/engine.rs
// ============================================================================
// Module: Render Engine
// Description: Runtime-spec compositor over background, photos, stickers.
// Purpose: Produce the final RGBA canvas for one composition job.
// Dependencies: framepress-core, image
// ============================================================================

//! ## Overview
//! [`render`] allocates the output canvas, composites the background at the
//! origin, then paints every layer in ascending `z`. Ties preserve
//! declaration order with photos before stickers. Layers are a tagged
//! variant dispatched in the render loop, keeping the paint order auditable
//! in one place.
//! Invariants:
//! - Asset files missing at render time are errors, not skips (the manifest
//!   gate should have caught them; anything else is a broken cache entry).
//! - The background is composited as-is at the origin; a size mismatch with
//!   the canvas is accepted behavior, not an error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;

use framepress_core::PhotoLayer;
use framepress_core::RuntimeSpec;
use framepress_core::StickerLayer;
use image::RgbaImage;
use thiserror::Error;

use crate::ops::apply_opacity;
use crate::ops::composite_over;
use crate::ops::fit_tile;
use crate::ops::resize_tile;
use crate::ops::rotate_expanded;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised during compositing.
///
/// # Invariants
/// - Every variant maps to the `RENDER_FAILED` wire code.
#[derive(Debug, Error)]
pub enum RenderError {
    /// An asset file disappeared between validation and rendering.
    #[error("asset missing at render time: {0}")]
    MissingAsset(PathBuf),
    /// An asset failed to decode.
    #[error("image decode failed: {0}")]
    Decode(String),
    /// Geometry was unusable (for example a zero-area source).
    #[error("render geometry invalid: {0}")]
    Geometry(String),
}

// ============================================================================
// SECTION: Layers
// ============================================================================

/// A compositing layer, tagged by kind.
enum Layer<'a> {
    /// Photo layer referencing the raw photograph.
    Photo(&'a PhotoLayer),
    /// Sticker layer referencing a template asset.
    Sticker(&'a StickerLayer),
}

impl Layer<'_> {
    /// Returns the layer z-order.
    const fn z(&self) -> i64 {
        match self {
            Layer::Photo(photo) => photo.z,
            Layer::Sticker(sticker) => sticker.z,
        }
    }
}

// ============================================================================
// SECTION: Rendering
// ============================================================================

/// Renders a runtime spec against a decoded raw photograph.
///
/// # Errors
///
/// Returns [`RenderError`] on any decode failure, missing asset, or
/// unusable geometry.
pub fn render(spec: &RuntimeSpec, raw: &RgbaImage) -> Result<RgbaImage, RenderError> {
    let mut canvas = RgbaImage::new(spec.output.width, spec.output.height);

    let background = load_rgba(&spec.background.path)?;
    composite_over(&mut canvas, &background, 0, 0);

    // Photos first, then stickers, so the stable sort keeps declaration
    // order within equal z and photos under stickers on ties.
    let mut layers: Vec<Layer<'_>> = spec
        .photos
        .iter()
        .map(Layer::Photo)
        .chain(spec.stickers.iter().map(Layer::Sticker))
        .collect();
    layers.sort_by_key(|layer| layer.z());

    for layer in &layers {
        match layer {
            Layer::Photo(photo) => paint_photo(&mut canvas, photo, raw)?,
            Layer::Sticker(sticker) => paint_sticker(&mut canvas, sticker)?,
        }
    }
    Ok(canvas)
}

/// Paints one photo layer from the raw photograph.
fn paint_photo(
    canvas: &mut RgbaImage,
    photo: &PhotoLayer,
    raw: &RgbaImage,
) -> Result<(), RenderError> {
    let tile = fit_tile(raw, photo.w, photo.h, photo.fit).ok_or_else(|| {
        RenderError::Geometry(format!("photo {} has a zero-area source or tile", photo.id))
    })?;
    composite_over(canvas, &tile, photo.x, photo.y);
    Ok(())
}

/// Paints one sticker layer from its asset file.
fn paint_sticker(canvas: &mut RgbaImage, sticker: &StickerLayer) -> Result<(), RenderError> {
    let image = load_rgba(&sticker.path)?;
    let mut tile = resize_tile(&image, sticker.w, sticker.h);
    if sticker.rotate != 0.0 {
        tile = rotate_expanded(&tile, sticker.rotate);
    }
    if sticker.opacity < 1.0 {
        apply_opacity(&mut tile, sticker.opacity);
    }
    composite_over(canvas, &tile, sticker.x, sticker.y);
    Ok(())
}

/// Loads an asset file as RGBA.
fn load_rgba(path: &Path) -> Result<RgbaImage, RenderError> {
    if !path.is_file() {
        return Err(RenderError::MissingAsset(path.to_path_buf()));
    }
    let image = image::open(path).map_err(|err| RenderError::Decode(err.to_string()))?;
    Ok(image.to_rgba8())
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use framepress_core::BackgroundSpec;
    use framepress_core::FitMode;
    use framepress_core::OutputSpec;
    use framepress_core::PhotoSource;
    use image::Rgba;

    use super::*;

    fn solid(w: u32, h: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba(rgba))
    }

    fn write_png(dir: &Path, name: &str, image: &RgbaImage) -> PathBuf {
        let path = dir.join(name);
        image.save(&path).expect("save png");
        path
    }

    fn photo(id: &str, x: i64, y: i64, w: u32, h: u32, z: i64) -> PhotoLayer {
        PhotoLayer {
            id: id.to_string(),
            source: PhotoSource::Raw,
            x,
            y,
            w,
            h,
            fit: FitMode::Cover,
            z,
        }
    }

    fn sticker(id: &str, path: PathBuf, x: i64, y: i64, w: u32, h: u32, z: i64) -> StickerLayer {
        StickerLayer {
            id: id.to_string(),
            path,
            x,
            y,
            w,
            h,
            rotate: 0.0,
            opacity: 1.0,
            z,
        }
    }

    fn spec_with(
        dir: &Path,
        background: &RgbaImage,
        photos: Vec<PhotoLayer>,
        stickers: Vec<StickerLayer>,
    ) -> RuntimeSpec {
        let bg_path = write_png(dir, "bg.png", background);
        RuntimeSpec {
            manifest_version: 1,
            template_code: "tpl_render".to_string(),
            version_semver: "0.1.0".to_string(),
            output: OutputSpec {
                width: 16,
                height: 16,
                format: "png".to_string(),
            },
            background: BackgroundSpec {
                path: bg_path,
            },
            photos,
            stickers,
        }
    }

    /// Tests the background is composited at the origin as-is.
    #[test]
    fn background_composites_at_origin() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = spec_with(
            dir.path(),
            &solid(8, 8, [0, 255, 0, 255]),
            vec![photo("p1", 100, 100, 4, 4, 0)],
            Vec::new(),
        );
        let raw = solid(4, 4, [255, 0, 0, 255]);
        let canvas = render(&spec, &raw).expect("render");
        // Background smaller than the canvas covers only its own extent.
        assert_eq!(*canvas.get_pixel(0, 0), Rgba([0, 255, 0, 255]));
        assert_eq!(canvas.get_pixel(12, 12)[3], 0);
    }

    /// Tests z-order: the higher-z sticker wins the overlap.
    #[test]
    fn higher_z_sticker_wins_overlap() {
        let dir = tempfile::tempdir().expect("tempdir");
        let red = write_png(dir.path(), "red.png", &solid(4, 4, [255, 0, 0, 255]));
        let blue = write_png(dir.path(), "blue.png", &solid(4, 4, [0, 0, 255, 255]));
        let spec = spec_with(
            dir.path(),
            &solid(16, 16, [255, 255, 255, 255]),
            vec![photo("p1", 0, 0, 2, 2, 0)],
            vec![
                sticker("s1", red, 4, 4, 4, 4, 0),
                sticker("s2", blue, 6, 6, 4, 4, 1),
            ],
        );
        let raw = solid(2, 2, [9, 9, 9, 255]);
        let canvas = render(&spec, &raw).expect("render");
        // Overlap region belongs to the z=1 sticker.
        assert_eq!(*canvas.get_pixel(7, 7), Rgba([0, 0, 255, 255]));
        // Non-overlapping part of the z=0 sticker survives.
        assert_eq!(*canvas.get_pixel(4, 4), Rgba([255, 0, 0, 255]));
    }

    /// Tests a z tie paints the sticker over the photo.
    #[test]
    fn z_tie_paints_photo_before_sticker() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blue = write_png(dir.path(), "blue.png", &solid(4, 4, [0, 0, 255, 255]));
        let spec = spec_with(
            dir.path(),
            &solid(16, 16, [255, 255, 255, 255]),
            vec![photo("p1", 0, 0, 8, 8, 0)],
            vec![sticker("s1", blue, 0, 0, 4, 4, 0)],
        );
        let raw = solid(8, 8, [255, 0, 0, 255]);
        let canvas = render(&spec, &raw).expect("render");
        assert_eq!(*canvas.get_pixel(1, 1), Rgba([0, 0, 255, 255]));
        assert_eq!(*canvas.get_pixel(6, 6), Rgba([255, 0, 0, 255]));
    }

    /// Tests rendering twice yields byte-identical output.
    #[test]
    fn render_is_deterministic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let star = write_png(dir.path(), "star.png", &solid(6, 3, [10, 200, 30, 255]));
        let mut rotated = sticker("s1", star, 3, 3, 6, 3, 1);
        rotated.rotate = 30.0;
        rotated.opacity = 0.7;
        let spec = spec_with(
            dir.path(),
            &solid(16, 16, [40, 40, 40, 255]),
            vec![photo("p1", 1, 1, 5, 5, 0)],
            vec![rotated],
        );
        let raw = solid(10, 7, [200, 100, 50, 255]);
        let first = render(&spec, &raw).expect("first render");
        let second = render(&spec, &raw).expect("second render");
        assert_eq!(first.as_raw(), second.as_raw());
    }

    /// Tests moving a photo by one pixel changes the output bytes.
    #[test]
    fn shifting_a_photo_changes_output_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec_a = spec_with(
            dir.path(),
            &solid(16, 16, [255, 255, 255, 255]),
            vec![photo("p1", 2, 2, 4, 4, 0)],
            Vec::new(),
        );
        let mut spec_b = spec_a.clone();
        spec_b.photos[0].x += 1;
        let raw = solid(4, 4, [0, 0, 0, 255]);
        let a = render(&spec_a, &raw).expect("render a");
        let b = render(&spec_b, &raw).expect("render b");
        assert_ne!(a.as_raw(), b.as_raw());
    }

    /// Tests a missing sticker file is a render error, not a skip.
    #[test]
    fn missing_sticker_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let spec = spec_with(
            dir.path(),
            &solid(16, 16, [1, 1, 1, 255]),
            vec![photo("p1", 0, 0, 4, 4, 0)],
            vec![sticker("s1", dir.path().join("gone.png"), 0, 0, 4, 4, 0)],
        );
        let raw = solid(4, 4, [0, 0, 0, 255]);
        let err = render(&spec, &raw).unwrap_err();
        assert!(matches!(err, RenderError::MissingAsset(_)));
    }

    /// Tests sticker opacity blends toward the background.
    #[test]
    fn sticker_opacity_blends_toward_background() {
        let dir = tempfile::tempdir().expect("tempdir");
        let white = write_png(dir.path(), "white.png", &solid(4, 4, [255, 255, 255, 255]));
        let mut translucent = sticker("s1", white, 8, 8, 4, 4, 1);
        translucent.opacity = 0.5;
        let spec = spec_with(
            dir.path(),
            &solid(16, 16, [0, 0, 0, 255]),
            vec![photo("p1", 0, 0, 2, 2, 0)],
            vec![translucent],
        );
        let raw = solid(2, 2, [0, 0, 0, 255]);
        let canvas = render(&spec, &raw).expect("render");
        let blended = canvas.get_pixel(9, 9);
        assert!((120..=135).contains(&blended[0]), "got {}", blended[0]);
        assert_eq!(blended[3], 255);
    }
}
