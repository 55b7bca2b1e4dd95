use core::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use fontdb::{Database, Family, Query, Source, Stretch, Style, Weight};
use image::{Rgba, RgbaImage, imageops};
use rusttype::{Font, Scale, point};

use crate::components::codec::{self, RasterImage};
use crate::components::common::{MetadataKey, ThumbnailError};
use crate::components::metadata::ResolvedMetadata;
use crate::components::registry::PrinterProfile;

/// Side of the square canvas the statistics are drawn on.
pub const CANVAS_SIZE: u32 = 900;

/// The source is fitted into a square of this side before it is placed.
pub const PREVIEW_SIZE: u32 = 600;

/// Top-left corner of the fitted source on the canvas.
pub const PREVIEW_ORIGIN: (u32, u32) = (150, 160);

/// Pen used on dark printer screens.
pub const LIGHT_PEN: [u8; 3] = [200, 200, 200];

/// Pen used on light printer screens.
pub const DARK_PEN: [u8; 3] = [63, 63, 63];

const TEXT_HEIGHT: f32 = 80.0;
const TEXT_BOX: (f32, f32) = (400.0, 100.0);
// top left, top right, bottom left, bottom right
const TEXT_ORIGINS: [(f32, f32); 4] =
	[(30.0, 20.0), (470.0, 20.0), (30.0, 790.0), (470.0, 790.0)];

/// A TrueType or OpenType face used to draw the statistics.
pub struct OverlayFont {
	font: Font<'static>,
}

impl OverlayFont {
	pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ThumbnailError> {
		Font::try_from_vec(bytes)
			.map(|font| Self { font })
			.ok_or_else(|| ThumbnailError::Font("not a TrueType or OpenType font".into()))
	}

	pub fn load(path: &Path) -> Result<Self, ThumbnailError> {
		let bytes = fs::read(path)
			.map_err(|e| ThumbnailError::Font(format!("{}: {e}", path.display())))?;
		Self::from_bytes(bytes)
	}

	/// Arial, or else the system's sans-serif face. Looked up once per
	/// process; `None` when the system has no usable font.
	pub fn system() -> Option<&'static OverlayFont> {
		static FONT: OnceLock<Option<OverlayFont>> = OnceLock::new();
		FONT.get_or_init(load_system_font).as_ref()
	}
}

impl fmt::Debug for OverlayFont {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("OverlayFont")
			.field("glyphs", &self.font.glyph_count())
			.finish()
	}
}

fn load_system_font() -> Option<OverlayFont> {
	let mut db = Database::new();
	db.load_system_fonts();
	let families = [Family::Name("Arial"), Family::SansSerif];
	let query = Query {
		families: &families,
		weight: Weight::NORMAL,
		stretch: Stretch::Normal,
		style: Style::Normal,
	};
	let face = db.face(db.query(&query)?)?;
	let bytes = match &face.source {
		Source::File(path) | Source::SharedFile(path, _) => fs::read(path).ok()?,
		Source::Binary(data) => data.as_ref().as_ref().to_vec(),
	};
	let font = Font::try_from_vec_and_index(bytes, face.index)?;
	log::debug!("Loaded system font for the statistics overlay");
	Some(OverlayFont { font })
}

/// Print statistics drawn in the corners of the preview.
#[derive(Debug, Clone)]
pub struct Overlay<'a> {
	lines: Vec<String>,
	font: Option<&'a OverlayFont>,
}

impl<'a> Overlay<'a> {
	/// Take the on-screen values of `profile` from `metadata`, in display
	/// order: print time, model height, filament weight, filament cost.
	pub fn new(
		metadata: &ResolvedMetadata,
		profile: &PrinterProfile,
		font: Option<&'a OverlayFont>,
	) -> Self {
		let lines = profile
			.displayed
			.iter()
			.filter(|key| **key != MetadataKey::PrinterModel)
			.filter_map(|key| metadata.get(*key))
			.take(TEXT_ORIGINS.len())
			.map(str::to_string)
			.collect();
		Self { lines, font }
	}

	pub fn lines(&self) -> &[String] {
		&self.lines
	}

	/// Fit `source` into the preview area of a transparent canvas and write
	/// the statistics around it with `pen`. Without a font only the canvas
	/// layout is applied.
	pub fn compose(
		&self,
		source: &RasterImage,
		pen: [u8; 3],
	) -> Result<RasterImage, ThumbnailError> {
		let preview = codec::resize(source, PREVIEW_SIZE, PREVIEW_SIZE)?;
		let mut canvas = RgbaImage::new(CANVAS_SIZE, CANVAS_SIZE);
		let (x, y) = PREVIEW_ORIGIN;
		imageops::overlay(&mut canvas, preview.buffer(), x as i64, y as i64);

		if let Some(font) = self.font {
			for (slot, line) in self.lines.iter().enumerate() {
				draw_line(&mut canvas, &font.font, line, slot, pen);
			}
		}
		Ok(RasterImage::from_buffer(canvas))
	}
}

fn text_width(
	font: &Font<'static>,
	text: &str,
	scale: Scale,
) -> f32 {
	font.layout(text, scale, point(0.0, 0.0))
		.last()
		.map(|glyph| glyph.position().x + glyph.unpositioned().h_metrics().advance_width)
		.unwrap_or(0.0)
}

/// Left aligned in the left column, right aligned in the right one,
/// vertically centred in the box.
fn draw_line(
	canvas: &mut RgbaImage,
	font: &Font<'static>,
	text: &str,
	slot: usize,
	pen: [u8; 3],
) {
	let scale = Scale::uniform(TEXT_HEIGHT);
	let metrics = font.v_metrics(scale);
	let (box_x, box_y) = TEXT_ORIGINS[slot];
	let (box_width, box_height) = TEXT_BOX;
	let x = if slot % 2 == 0 {
		box_x
	} else {
		box_x + box_width - text_width(font, text, scale)
	};
	let text_height = metrics.ascent - metrics.descent;
	let baseline = box_y + (box_height - text_height) / 2.0 + metrics.ascent;

	let (width, height) = canvas.dimensions();
	for glyph in font.layout(text, scale, point(x, baseline)) {
		let Some(bounds) = glyph.pixel_bounding_box() else {
			continue;
		};
		glyph.draw(|gx, gy, coverage| {
			let px = bounds.min.x + gx as i32;
			let py = bounds.min.y + gy as i32;
			if px >= 0 && py >= 0 && (px as u32) < width && (py as u32) < height {
				blend(canvas.get_pixel_mut(px as u32, py as u32), pen, coverage);
			}
		});
	}
}

/// Source-over compositing of `pen` at `coverage` onto `pixel`.
fn blend(
	pixel: &mut Rgba<u8>,
	pen: [u8; 3],
	coverage: f32,
) {
	let src = coverage.clamp(0.0, 1.0);
	if src == 0.0 {
		return;
	}
	let dst = pixel.0[3] as f32 / 255.0;
	let out = src + dst * (1.0 - src);
	for c in 0..3 {
		let value = (pen[c] as f32 * src + pixel.0[c] as f32 * dst * (1.0 - src)) / out;
		pixel.0[c] = value.round() as u8;
	}
	pixel.0[3] = (out * 255.0).round() as u8;
}
