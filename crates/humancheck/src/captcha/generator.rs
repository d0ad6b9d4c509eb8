//! CAPTCHA image generation.
//!
//! Each solution character is rendered with its own face, size, rotation, and
//! vertical jitter, then composited left to right onto a fixed 180x40 canvas.

use humancheck_common::HumanCheckError;
use humancheck_common::constants::{
    BASE_TEXT_OFFSET, FONT_SIZE_RANGE, FOREGROUND_TINT, GLYPH_GAP_RANGE, GLYPH_Y_RANGE,
    IMAGE_SIZE, ROTATION_RANGE, SOLUTION_CHARS, SOLUTION_LENGTH,
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use imageproc::geometric_transformations::{Interpolation, rotate_about_center};
use rand::Rng;
use rusttype::{Font, Scale, point};
use std::io::Cursor;
use std::path::Path;

use super::glyphs;
use crate::config::CaptchaConfig;

/// A face glyphs can be drawn with
pub enum FontFace {
    /// A TrueType font loaded from disk
    TrueType(Font<'static>),
    /// The built-in 5x7 bitmap face
    Builtin,
}

impl FontFace {
    /// Render `text` white-on-black on a single-channel canvas
    fn rasterize(&self, text: &str, px: u32) -> GrayImage {
        match self {
            Self::TrueType(font) => rasterize_truetype(font, text, px as f32),
            Self::Builtin => glyphs::rasterize(text, px),
        }
    }
}

impl std::fmt::Debug for FontFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TrueType(_) => f.write_str("TrueType"),
            Self::Builtin => f.write_str("Builtin"),
        }
    }
}

/// Faces compiled into the binary
const BUNDLED_FONTS: [(&str, &[u8]); 3] = [
    ("DejaVuSans", include_bytes!("../../assets/fonts/DejaVuSans.ttf")),
    ("DejaVuSansMono", include_bytes!("../../assets/fonts/DejaVuSansMono.ttf")),
    ("DejaVuSerif", include_bytes!("../../assets/fonts/DejaVuSerif.ttf")),
];

/// The bundled DejaVu faces, or the bitmap face if none of them parse
pub fn bundled_faces() -> Vec<FontFace> {
    let mut faces: Vec<FontFace> = BUNDLED_FONTS
        .into_iter()
        .filter_map(|(name, data)| {
            let font = Font::try_from_bytes(data);
            if font.is_none() {
                tracing::warn!(font = %name, "Bundled font failed to parse");
            }
            font.map(FontFace::TrueType)
        })
        .collect();

    if faces.is_empty() {
        tracing::warn!("No TrueType fonts available, using built-in bitmap face");
        faces.push(FontFace::Builtin);
    }

    faces
}

/// Load every readable font in `paths`.
///
/// An empty list selects the bundled faces, as does a list where nothing loads.
pub fn load_faces<P: AsRef<Path>>(paths: &[P]) -> Vec<FontFace> {
    let mut faces = Vec::with_capacity(paths.len());

    for path in paths {
        let path = path.as_ref();
        let font = std::fs::read(path)
            .ok()
            .and_then(Font::try_from_vec);
        match font {
            Some(font) => faces.push(FontFace::TrueType(font)),
            None => tracing::warn!(path = %path.display(), "Font could not be loaded, skipping"),
        }
    }

    if faces.is_empty() {
        if !paths.is_empty() {
            tracing::warn!("No configured font loaded, using bundled faces");
        }
        return bundled_faces();
    }

    faces
}

/// The fixed canvas every challenge is drawn on
pub fn default_background() -> RgbaImage {
    let (width, height) = IMAGE_SIZE;
    RgbaImage::from_fn(width, height, |x, y| {
        // Faint diagonal hatching over a slate base
        if (x + 2 * y) % 9 == 0 {
            Rgba([0x4b, 0x57, 0x66, 0xff])
        } else {
            Rgba([0x37, 0x41, 0x4d, 0xff])
        }
    })
}

/// Load a background image, resized to the challenge dimensions
pub fn load_background(path: &Path) -> Result<RgbaImage, HumanCheckError> {
    let image = image::open(path)
        .map_err(|e| HumanCheckError::Config(format!("background {}: {e}", path.display())))?
        .to_rgba8();

    let (width, height) = IMAGE_SIZE;
    if image.dimensions() == IMAGE_SIZE {
        Ok(image)
    } else {
        Ok(image::imageops::resize(
            &image,
            width,
            height,
            image::imageops::FilterType::Triangle,
        ))
    }
}

/// Draw a solution from the CAPTCHA alphabet
pub fn sample_solution<R: Rng + ?Sized>(rng: &mut R) -> String {
    let alphabet = SOLUTION_CHARS.as_bytes();
    (0..SOLUTION_LENGTH)
        .map(|_| alphabet[rng.random_range(0..alphabet.len())] as char)
        .collect()
}

/// Challenge image generator
#[derive(Debug)]
pub struct CaptchaGenerator {
    faces: Vec<FontFace>,
    background: RgbaImage,
}

impl CaptchaGenerator {
    pub fn new(faces: Vec<FontFace>, background: RgbaImage) -> Self {
        let faces = if faces.is_empty() {
            vec![FontFace::Builtin]
        } else {
            faces
        };
        Self { faces, background }
    }

    /// Build from configuration, loading fonts and the background from disk
    pub fn from_config(config: &CaptchaConfig) -> Result<Self, HumanCheckError> {
        let faces = load_faces(&config.font_paths);
        let background = match &config.background_path {
            Some(path) => load_background(Path::new(path))?,
            None => default_background(),
        };

        tracing::info!(
            faces = faces.len(),
            custom_background = config.background_path.is_some(),
            "CAPTCHA generator ready"
        );

        Ok(Self::new(faces, background))
    }

    /// Generator with the bundled faces and the built-in background
    pub fn bundled() -> Self {
        Self::new(bundled_faces(), default_background())
    }

    /// Generate a fresh solution and its PNG image
    pub fn generate(&self) -> Result<(String, Vec<u8>), HumanCheckError> {
        self.generate_with(&mut rand::rng())
    }

    /// Generate a solution and image from the given randomness source
    pub fn generate_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<(String, Vec<u8>), HumanCheckError> {
        let solution = sample_solution(rng);
        let png = self.render_with(rng, &solution)?;
        Ok((solution, png))
    }

    /// Render the PNG image for an already chosen solution
    pub fn render(&self, solution: &str) -> Result<Vec<u8>, HumanCheckError> {
        self.render_with(&mut rand::rng(), solution)
    }

    pub fn render_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        solution: &str,
    ) -> Result<Vec<u8>, HumanCheckError> {
        let mut canvas = self.background.clone();
        let mut offset = BASE_TEXT_OFFSET;

        for character in solution.chars() {
            let face = &self.faces[rng.random_range(0..self.faces.len())];
            let size = rng.random_range(FONT_SIZE_RANGE.0..FONT_SIZE_RANGE.1);
            let angle = rng.random_range(ROTATION_RANGE.0..ROTATION_RANGE.1);

            let glyph = face.rasterize(&format!(" {character} "), size);
            let glyph = rotate_expanded(&glyph, angle as f32);

            let ypos = rng.random_range(GLYPH_Y_RANGE.0..GLYPH_Y_RANGE.1);
            let width = match crop_to_content(&glyph) {
                Some(glyph) => {
                    composite(&mut canvas, &glyph, offset, ypos);
                    glyph.width() as i64
                }
                None => 0,
            };

            offset += width + rng.random_range(GLYPH_GAP_RANGE.0..GLYPH_GAP_RANGE.1);
        }

        encode_png(canvas)
    }
}

fn rasterize_truetype(font: &Font<'static>, text: &str, px: f32) -> GrayImage {
    let scale = Scale::uniform(px);
    let v_metrics = font.v_metrics(scale);
    let glyphs: Vec<_> = font.layout(text, scale, point(0.0, v_metrics.ascent)).collect();

    let width = glyphs
        .last()
        .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
        .unwrap_or(0.0)
        .ceil()
        .max(1.0) as u32;
    let height = (v_metrics.ascent - v_metrics.descent).ceil().max(1.0) as u32;

    let mut canvas = GrayImage::new(width, height);
    for glyph in &glyphs {
        let Some(bb) = glyph.pixel_bounding_box() else {
            continue;
        };
        glyph.draw(|x, y, coverage| {
            let px = x as i32 + bb.min.x;
            let py = y as i32 + bb.min.y;
            if px < 0 || py < 0 || px >= width as i32 || py >= height as i32 {
                return;
            }
            let value = (coverage * 255.0).round().clamp(0.0, 255.0) as u8;
            let pixel = canvas.get_pixel_mut(px as u32, py as u32);
            pixel.0[0] = pixel.0[0].max(value);
        });
    }

    canvas
}

/// Rotate by `degrees` with bilinear resampling, growing the canvas so no
/// corner of the source is cut off.
fn rotate_expanded(glyph: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = glyph.dimensions();
    let side = ((width * width + height * height) as f32).sqrt().ceil() as u32 + 2;

    let mut padded = GrayImage::new(side, side);
    image::imageops::replace(
        &mut padded,
        glyph,
        ((side - width) / 2) as i64,
        ((side - height) / 2) as i64,
    );

    rotate_about_center(
        &padded,
        degrees.to_radians(),
        Interpolation::Bilinear,
        Luma([0]),
    )
}

/// Crop to the bounding box of non-zero pixels; `None` when the image is blank
fn crop_to_content(glyph: &GrayImage) -> Option<GrayImage> {
    let mut min_x = u32::MAX;
    let mut min_y = u32::MAX;
    let mut max_x = 0;
    let mut max_y = 0;

    for (x, y, pixel) in glyph.enumerate_pixels() {
        if pixel.0[0] != 0 {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if min_x == u32::MAX {
        return None;
    }

    Some(
        image::imageops::crop_imm(glyph, min_x, min_y, max_x - min_x + 1, max_y - min_y + 1)
            .to_image(),
    )
}

/// Blend the foreground tint into `canvas` through `mask` placed at `(x, y)`
fn composite(canvas: &mut RgbaImage, mask: &GrayImage, x: i64, y: i64) {
    let (canvas_w, canvas_h) = canvas.dimensions();

    for (mx, my, alpha) in mask.enumerate_pixels() {
        let alpha = alpha.0[0] as u32;
        if alpha == 0 {
            continue;
        }
        let cx = x + mx as i64;
        let cy = y + my as i64;
        if cx < 0 || cy < 0 || cx >= canvas_w as i64 || cy >= canvas_h as i64 {
            continue;
        }

        let pixel = canvas.get_pixel_mut(cx as u32, cy as u32);
        for (channel, tint) in pixel.0.iter_mut().zip(FOREGROUND_TINT) {
            *channel = ((tint as u32 * alpha + *channel as u32 * (255 - alpha)) / 255) as u8;
        }
    }
}

fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>, HumanCheckError> {
    let mut png = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| HumanCheckError::Image(e.to_string()))?;
    Ok(png)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    const SERIF_FONT: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/assets/fonts/DejaVuSerif.ttf");

    #[test]
    fn test_solution_alphabet_and_length() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..1_000 {
            let solution = sample_solution(&mut rng);
            assert_eq!(solution.chars().count(), SOLUTION_LENGTH);
            assert!(solution.chars().all(|c| SOLUTION_CHARS.contains(c)));
        }
    }

    #[test]
    fn test_generated_images_are_valid_png_of_fixed_size() {
        let generator = CaptchaGenerator::bundled();
        let mut rng = StdRng::seed_from_u64(42);

        for _ in 0..50 {
            let (solution, png) = generator.generate_with(&mut rng).unwrap();
            assert_eq!(solution.len(), SOLUTION_LENGTH);

            let format = image::guess_format(&png).unwrap();
            assert_eq!(format, ImageFormat::Png);
            let decoded = image::load_from_memory_with_format(&png, ImageFormat::Png).unwrap();
            assert_eq!((decoded.width(), decoded.height()), IMAGE_SIZE);
        }
    }

    #[test]
    fn test_glyphs_are_drawn_onto_background() {
        let generator = CaptchaGenerator::bundled();
        let png = generator
            .render_with(&mut StdRng::seed_from_u64(1), "hK3ytw")
            .unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        let background = default_background();

        let changed = decoded
            .pixels()
            .zip(background.pixels())
            .filter(|(a, b)| a != b)
            .count();
        assert!(changed > 100, "only {changed} pixels changed");
    }

    #[test]
    fn test_seeded_generation_is_reproducible() {
        let generator = CaptchaGenerator::bundled();
        let first = generator.generate_with(&mut StdRng::seed_from_u64(99)).unwrap();
        let second = generator.generate_with(&mut StdRng::seed_from_u64(99)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rotation_keeps_glyph_content() {
        let glyph = glyphs::rasterize(" W ", 32);
        let before = crop_to_content(&glyph).unwrap();

        let rotated = rotate_expanded(&glyph, 30.0);
        let after = crop_to_content(&rotated).unwrap();
        assert!(rotated.width() >= glyph.width());
        assert!(after.height() > before.height());
    }

    #[test]
    fn test_crop_blank_image() {
        assert!(crop_to_content(&GrayImage::new(10, 10)).is_none());
    }

    #[test]
    fn test_composite_clips_at_edges() {
        let mut canvas = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255]));
        let mask = GrayImage::from_pixel(3, 3, Luma([255]));

        composite(&mut canvas, &mask, 2, -1);

        assert_eq!(canvas.get_pixel(3, 0), &Rgba(FOREGROUND_TINT));
        assert_eq!(canvas.get_pixel(2, 1), &Rgba(FOREGROUND_TINT));
        assert_eq!(canvas.get_pixel(1, 0), &Rgba([0, 0, 0, 255]));
        assert_eq!(canvas.get_pixel(2, 2), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn test_default_config_uses_several_faces() {
        let generator = CaptchaGenerator::from_config(&CaptchaConfig::default()).unwrap();
        assert_eq!(generator.faces.len(), BUNDLED_FONTS.len());
        assert!(generator.faces.iter().all(|f| matches!(f, FontFace::TrueType(_))));
    }

    #[test]
    fn test_missing_fonts_fall_back_to_bundled() {
        let faces = load_faces(&["/nonexistent/font.ttf"]);
        assert_eq!(faces.len(), BUNDLED_FONTS.len());
        assert!(faces.iter().all(|f| matches!(f, FontFace::TrueType(_))));
    }

    #[test]
    fn test_configured_font_is_loaded_from_disk() {
        let faces = load_faces(&[SERIF_FONT]);
        assert_eq!(faces.len(), 1);
        assert!(matches!(faces[0], FontFace::TrueType(_)));

        let generator = CaptchaGenerator::new(faces, default_background());
        let (_, png) = generator.generate().unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), IMAGE_SIZE);
    }

    #[test]
    fn test_glyph_height_follows_font_size() {
        let mut faces = bundled_faces();
        faces.push(FontFace::Builtin);

        for face in &faces {
            let heights: Vec<u32> = (FONT_SIZE_RANGE.0..FONT_SIZE_RANGE.1)
                .map(|px| face.rasterize(" K ", px).height())
                .collect();
            assert!(heights[0] < heights[heights.len() - 1], "{face:?} heights {heights:?}");
        }
    }

    #[test]
    fn test_faces_draw_differently() {
        let faces = bundled_faces();
        let glyphs: Vec<GrayImage> = faces.iter().map(|f| f.rasterize(" K ", 32)).collect();
        assert!(glyphs.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_background_is_resized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bg.png");
        RgbaImage::from_pixel(360, 80, Rgba([10, 20, 30, 255]))
            .save(&path)
            .unwrap();

        let background = load_background(&path).unwrap();
        assert_eq!(background.dimensions(), IMAGE_SIZE);
    }
}
