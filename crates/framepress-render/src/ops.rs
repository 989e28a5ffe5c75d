// crates/framepress-render/src/ops.rs
// ============================================================================
// Module: Raster Operations
// Description: Pixel-level primitives for the render engine.
// Purpose: Provide deterministic blend, fit, rotate, and opacity ops.
// Dependencies: framepress-core, image
// ============================================================================

//! ## Overview
//! All geometry uses fixed bilinear resampling (`FilterType::Triangle`) and
//! integer straight-alpha blending so the compositor output is byte-stable
//! across runs and platforms.
//! Invariants:
//! - `blend_over` is the straight-alpha Porter-Duff "over" operator.
//! - `composite_over` clips the tile to the canvas bounds.
//! - `rotate_expanded` returns the rotated tile inside its expanded
//!   bounding box, sampling transparency outside the source.

// ============================================================================
// SECTION: Imports
// ============================================================================

use framepress_core::FitMode;
use image::Rgba;
use image::RgbaImage;
use image::imageops;
use image::imageops::FilterType;

/// Fixed resampling filter for photos and stickers.
const RESAMPLE_FILTER: FilterType = FilterType::Triangle;

// ============================================================================
// SECTION: Blending
// ============================================================================

/// Straight-alpha "over" of `src` onto `dst`.
pub fn blend_over(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = u32::from(src[3]);
    if sa == 0 {
        return;
    }
    if sa == 255 {
        *dst = src;
        return;
    }
    let da = u32::from(dst[3]);
    let inv = 255 - sa;
    // Output alpha scaled by 255 to keep the math integral.
    let out_a = sa * 255 + da * inv;
    if out_a == 0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    for channel in 0..3 {
        let num = u32::from(src[channel]) * sa * 255 + u32::from(dst[channel]) * da * inv;
        dst[channel] = ((num + out_a / 2) / out_a) as u8;
    }
    dst[3] = ((out_a + 127) / 255) as u8;
}

/// Composites `tile` onto `canvas` at `(x, y)`, clipping to the canvas.
pub fn composite_over(canvas: &mut RgbaImage, tile: &RgbaImage, x: i64, y: i64) {
    let (canvas_w, canvas_h) = (i64::from(canvas.width()), i64::from(canvas.height()));
    let (tile_w, tile_h) = (i64::from(tile.width()), i64::from(tile.height()));
    let x0 = x.max(0);
    let y0 = y.max(0);
    let x1 = (x + tile_w).min(canvas_w);
    let y1 = (y + tile_h).min(canvas_h);
    for cy in y0..y1 {
        for cx in x0..x1 {
            let src = *tile.get_pixel((cx - x) as u32, (cy - y) as u32);
            blend_over(canvas.get_pixel_mut(cx as u32, cy as u32), src);
        }
    }
}

/// Multiplies the alpha channel of `tile` by `opacity` (clamped to [0, 1]).
pub fn apply_opacity(tile: &mut RgbaImage, opacity: f64) {
    let opacity = opacity.clamp(0.0, 1.0);
    for pixel in tile.pixels_mut() {
        let alpha = (f64::from(pixel[3]) * opacity).round();
        pixel[3] = alpha.clamp(0.0, 255.0) as u8;
    }
}

// ============================================================================
// SECTION: Fitting
// ============================================================================

/// Fits `src` into a `w`×`h` tile.
///
/// `Cover` scales until the tile is fully covered and center-crops the
/// overflow; `Contain` scales until the whole source fits and letterboxes
/// with transparency. Returns `None` when the source has a zero dimension.
#[must_use]
pub fn fit_tile(src: &RgbaImage, w: u32, h: u32, fit: FitMode) -> Option<RgbaImage> {
    let (sw, sh) = src.dimensions();
    if sw == 0 || sh == 0 || w == 0 || h == 0 {
        return None;
    }
    let scale_x = f64::from(w) / f64::from(sw);
    let scale_y = f64::from(h) / f64::from(sh);
    match fit {
        FitMode::Cover => {
            let scale = scale_x.max(scale_y);
            // Ceil so the scaled image always covers the tile.
            let nw = (f64::from(sw) * scale).ceil().max(1.0) as u32;
            let nh = (f64::from(sh) * scale).ceil().max(1.0) as u32;
            let resized = imageops::resize(src, nw, nh, RESAMPLE_FILTER);
            let x0 = (nw - w.min(nw)) / 2;
            let y0 = (nh - h.min(nh)) / 2;
            Some(imageops::crop_imm(&resized, x0, y0, w, h).to_image())
        }
        FitMode::Contain => {
            let scale = scale_x.min(scale_y);
            // Floor so the scaled image always fits inside the tile.
            let nw = (f64::from(sw) * scale).floor().max(1.0) as u32;
            let nh = (f64::from(sh) * scale).floor().max(1.0) as u32;
            let resized = imageops::resize(src, nw, nh, RESAMPLE_FILTER);
            let mut tile = RgbaImage::new(w, h);
            let x0 = i64::from((w - nw.min(w)) / 2);
            let y0 = i64::from((h - nh.min(h)) / 2);
            composite_over(&mut tile, &resized, x0, y0);
            Some(tile)
        }
    }
}

/// Resizes `src` to exactly `w`×`h` with the fixed filter.
#[must_use]
pub fn resize_tile(src: &RgbaImage, w: u32, h: u32) -> RgbaImage {
    imageops::resize(src, w, h, RESAMPLE_FILTER)
}

// ============================================================================
// SECTION: Rotation
// ============================================================================

/// Rotates `tile` by `degrees` (positive counter-clockwise) into its
/// expanded bounding box, sampling bilinearly with transparency outside
/// the source.
#[must_use]
pub fn rotate_expanded(tile: &RgbaImage, degrees: f64) -> RgbaImage {
    let theta = degrees.to_radians();
    let (cos_t, sin_t) = (theta.cos(), theta.sin());
    let (w, h) = (f64::from(tile.width()), f64::from(tile.height()));
    let out_w = ((w * cos_t.abs() + h * sin_t.abs()).round().max(1.0)) as u32;
    let out_h = ((w * sin_t.abs() + h * cos_t.abs()).round().max(1.0)) as u32;

    let src_cx = w / 2.0;
    let src_cy = h / 2.0;
    let out_cx = f64::from(out_w) / 2.0;
    let out_cy = f64::from(out_h) / 2.0;

    let mut out = RgbaImage::new(out_w, out_h);
    for oy in 0..out_h {
        for ox in 0..out_w {
            let rel_x = f64::from(ox) + 0.5 - out_cx;
            let rel_y = f64::from(oy) + 0.5 - out_cy;
            // Inverse of the visual-CCW rotation in y-down coordinates.
            let sx = rel_x * cos_t - rel_y * sin_t + src_cx - 0.5;
            let sy = rel_x * sin_t + rel_y * cos_t + src_cy - 0.5;
            out.put_pixel(ox, oy, sample_bilinear(tile, sx, sy));
        }
    }
    out
}

/// Samples `img` bilinearly at `(x, y)`, treating out-of-bounds as
/// fully transparent.
fn sample_bilinear(img: &RgbaImage, x: f64, y: f64) -> Rgba<u8> {
    let x0 = x.floor();
    let y0 = y.floor();
    let dx = x - x0;
    let dy = y - y0;
    let taps = [
        (x0 as i64, y0 as i64, (1.0 - dx) * (1.0 - dy)),
        (x0 as i64 + 1, y0 as i64, dx * (1.0 - dy)),
        (x0 as i64, y0 as i64 + 1, (1.0 - dx) * dy),
        (x0 as i64 + 1, y0 as i64 + 1, dx * dy),
    ];
    let mut acc = [0.0f64; 4];
    for (ix, iy, weight) in taps {
        if weight <= 0.0 {
            continue;
        }
        if ix < 0 || iy < 0 || ix >= i64::from(img.width()) || iy >= i64::from(img.height()) {
            continue;
        }
        let pixel = img.get_pixel(ix as u32, iy as u32);
        for channel in 0..4 {
            acc[channel] += weight * f64::from(pixel[channel]);
        }
    }
    Rgba([
        acc[0].round().clamp(0.0, 255.0) as u8,
        acc[1].round().clamp(0.0, 255.0) as u8,
        acc[2].round().clamp(0.0, 255.0) as u8,
        acc[3].round().clamp(0.0, 255.0) as u8,
    ])
}

// ============================================================================
// SECTION: Tests
// ============================================================================
