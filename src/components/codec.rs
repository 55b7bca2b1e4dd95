use std::collections::HashMap;
use std::io::Cursor;

use image::{
	ImageFormat, Rgb, RgbImage, Rgba, RgbaImage,
	codecs::jpeg::JpegEncoder,
	imageops::{self, FilterType},
};

use crate::components::common::{
	COLPIC_HEADER_LEN, COLPIC_MARK, COLPIC_MAX_COLORS, COLPIC_VERSION, EncodeFailure,
	PixelEncoding, ThumbnailError, ThumbnailSpec,
};

const JPEG_QUALITY: u8 = 90;

/// A decoded RGBA raster, row-major from the top-left pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterImage {
	pixels: RgbaImage,
}

impl RasterImage {
	/// Wraps raw RGBA bytes (4 bytes per pixel).
	pub fn from_rgba(
		width: u32,
		height: u32,
		rgba: Vec<u8>,
	) -> Result<Self, ThumbnailError> {
		if width == 0 || height == 0 {
			return Err(ThumbnailError::InvalidDimensions { width, height });
		}
		let len = rgba.len();
		let pixels = RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
			ThumbnailError::Decode(format!(
				"{len} bytes do not describe a {width}x{height} RGBA image"
			))
		})?;
		Ok(Self { pixels })
	}

	pub fn width(&self) -> u32 {
		self.pixels.width()
	}

	pub fn height(&self) -> u32 {
		self.pixels.height()
	}

	/// The RGBA value at `(x, y)`. Panics when out of bounds, like
	/// `ImageBuffer::get_pixel`.
	pub fn pixel(
		&self,
		x: u32,
		y: u32,
	) -> [u8; 4] {
		self.pixels.get_pixel(x, y).0
	}

	pub(crate) fn from_buffer(pixels: RgbaImage) -> Self {
		Self { pixels }
	}

	pub(crate) fn buffer(&self) -> &RgbaImage {
		&self.pixels
	}
}

/// Decode a PNG or JPEG file into a raster.
pub fn decode(bytes: &[u8]) -> Result<RasterImage, ThumbnailError> {
	if bytes.is_empty() {
		return Err(ThumbnailError::Decode("no image bytes".into()));
	}
	let format =
		image::guess_format(bytes).map_err(|e| ThumbnailError::Decode(e.to_string()))?;
	let decoded = image::load_from_memory_with_format(bytes, format)
		.map_err(|e| ThumbnailError::Decode(format!("{format:?}: {e}")))?;
	let pixels = decoded.to_rgba8();
	if pixels.width() == 0 || pixels.height() == 0 {
		return Err(ThumbnailError::Decode(format!(
			"{format:?} image has no pixels"
		)));
	}
	log::debug!(
		"Decoded {}x{} {:?} preview",
		pixels.width(),
		pixels.height(),
		format
	);
	Ok(RasterImage { pixels })
}

/// Resample to exactly `width`x`height`.
///
/// The source keeps its aspect ratio: it is scaled to fit with a triangle
/// filter and centred on a transparent canvas.
pub fn resize(
	image: &RasterImage,
	width: u32,
	height: u32,
) -> Result<RasterImage, ThumbnailError> {
	if width == 0 || height == 0 {
		return Err(ThumbnailError::InvalidDimensions { width, height });
	}
	let (src_width, src_height) = (image.width(), image.height());
	if src_width == width && src_height == height {
		return Ok(image.clone());
	}

	let scale = f64::min(
		width as f64 / src_width as f64,
		height as f64 / src_height as f64,
	);
	let fit_width = ((src_width as f64 * scale).round() as u32).clamp(1, width);
	let fit_height = ((src_height as f64 * scale).round() as u32).clamp(1, height);
	let fitted =
		imageops::resize(&image.pixels, fit_width, fit_height, FilterType::Triangle);
	if fit_width == width && fit_height == height {
		return Ok(RasterImage { pixels: fitted });
	}

	let mut canvas = RgbaImage::new(width, height);
	let x = (width - fit_width) / 2;
	let y = (height - fit_height) / 2;
	imageops::replace(&mut canvas, &fitted, x as i64, y as i64);
	Ok(RasterImage { pixels: canvas })
}

/// Encode a raster into the byte layout demanded by `spec`. The image must
/// already have the spec's dimensions.
pub fn encode(
	image: &RasterImage,
	spec: &ThumbnailSpec,
) -> Result<Vec<u8>, ThumbnailError> {
	if !spec.container.supports(spec.encoding) {
		return Err(ThumbnailError::encode(
			spec,
			EncodeFailure::UnsupportedContainer {
				encoding: spec.encoding,
				container: spec.container.name(),
			},
		));
	}
	if image.width() != spec.width || image.height() != spec.height {
		return Err(ThumbnailError::encode(
			spec,
			EncodeFailure::PixelCountMismatch {
				width: spec.width,
				height: spec.height,
				actual_width: image.width(),
				actual_height: image.height(),
			},
		));
	}

	let flat = || flatten(image, spec.background);
	let bytes = match spec.encoding {
		PixelEncoding::Png => {
			encode_png(image).map_err(|e| ThumbnailError::encode(spec, e))?
		}
		PixelEncoding::Jpeg => {
			encode_jpeg(&flat()).map_err(|e| ThumbnailError::encode(spec, e))?
		}
		PixelEncoding::Rgb565 => pack_rgb565(&flat()),
		PixelEncoding::Rgb888 => flat().into_raw(),
		PixelEncoding::Indexed => pack_colpic(&flat()),
	};
	Ok(bytes)
}

fn encode_png(image: &RasterImage) -> Result<Vec<u8>, EncodeFailure> {
	let mut bytes = Vec::new();
	image
		.pixels
		.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
	Ok(bytes)
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>, EncodeFailure> {
	let mut bytes = Vec::new();
	JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(image)?;
	Ok(bytes)
}

/// Composite every pixel over an opaque background colour.
fn flatten(
	image: &RasterImage,
	background: [u8; 3],
) -> RgbImage {
	RgbImage::from_fn(image.width(), image.height(), |x, y| {
		let Rgba([r, g, b, a]) = *image.pixels.get_pixel(x, y);
		let alpha = a as u32;
		let mix = |fg: u8, bg: u8| {
			((fg as u32 * alpha + bg as u32 * (255 - alpha) + 127) / 255) as u8
		};
		Rgb([
			mix(r, background[0]),
			mix(g, background[1]),
			mix(b, background[2]),
		])
	})
}

/// Convert an RGB pixel to a 16-bit RGB565 word.
pub(crate) fn rgb565(pixel: &Rgb<u8>) -> u16 {
	let r = (pixel.0[0] as u16) >> 3;
	let g = (pixel.0[1] as u16) >> 2;
	let b = (pixel.0[2] as u16) >> 3;
	r << 11 | g << 5 | b
}

fn pack_rgb565(image: &RgbImage) -> Vec<u8> {
	let pixels = image.width() as usize * image.height() as usize;
	let mut out = Vec::with_capacity(pixels * 2);
	for pixel in image.pixels() {
		out.extend(rgb565(pixel).to_le_bytes());
	}
	out
}

/// A palette colour with its RGB565 channels split out.
#[derive(Debug, Clone, Copy)]
struct PaletteEntry {
	word: u16,
	channels: [i32; 3],
	uses: usize,
}

impl PaletteEntry {
	fn new(word: u16) -> Self {
		let channels = [
			(word >> 11 & 0x1F) as i32,
			(word >> 5 & 0x3F) as i32,
			(word & 0x1F) as i32,
		];
		Self {
			word,
			channels,
			uses: 0,
		}
	}

	fn distance(
		&self,
		other: &PaletteEntry,
	) -> i32 {
		self.channels
			.iter()
			.zip(other.channels)
			.map(|(a, b)| (a - b).abs())
			.sum()
	}
}

/// Colours ordered by use, most used first. Colours used equally often keep
/// the later one first, as the firmware encoder does.
fn build_palette(words: &[u16]) -> Vec<PaletteEntry> {
	let mut seen: Vec<PaletteEntry> = Vec::new();
	let mut lookup: HashMap<u16, usize> = HashMap::new();
	for word in words {
		let index = *lookup.entry(*word).or_insert_with(|| {
			seen.push(PaletteEntry::new(*word));
			seen.len() - 1
		});
		seen[index].uses += 1;
	}

	let mut palette: Vec<PaletteEntry> = Vec::with_capacity(seen.len());
	for entry in seen {
		let at = palette
			.iter()
			.position(|other| entry.uses >= other.uses)
			.unwrap_or(palette.len());
		palette.insert(at, entry);
	}
	palette
}

/// Fold colours past `COLPIC_MAX_COLORS` onto their nearest kept colour,
/// measured as the summed channel distance.
fn limit_palette(
	words: &mut [u16],
	palette: &mut Vec<PaletteEntry>,
) {
	if palette.len() <= COLPIC_MAX_COLORS {
		return;
	}
	let dropped = palette.split_off(COLPIC_MAX_COLORS);
	let mut remap: HashMap<u16, u16> = HashMap::with_capacity(dropped.len());
	for entry in &dropped {
		let nearest = palette
			.iter()
			.min_by_key(|kept| kept.distance(entry))
			.map_or(entry.word, |kept| kept.word);
		remap.insert(entry.word, nearest);
	}
	log::debug!("Merged {} colours into the palette", dropped.len());
	for word in words.iter_mut() {
		if let Some(kept) = remap.get(word) {
			*word = *kept;
		}
	}
}

/// Run-length pack palette indices.
///
/// | byte                   | meaning                                      |
/// | ---------------------- | -------------------------------------------- |
/// | `0b111_sssss`          | switch to palette page `s` (32 colours each) |
/// | `0bnnn_ttttt`, n 1..=6 | `n` pixels of colour `t` on the current page |
/// | `0b000_ttttt`, `n`     | `n` pixels (up to 255) of colour `t`         |
fn pack_runs(
	words: &[u16],
	indices: &HashMap<u16, usize>,
) -> Vec<u8> {
	let mut out = Vec::new();
	let mut page = 0;
	let mut start = 0;
	while start < words.len() {
		let word = words[start];
		let run = words[start..]
			.iter()
			.take(255)
			.take_while(|other| **other == word)
			.count();
		let index = indices.get(&word).copied().unwrap_or(0);
		let (high, low) = ((index / 32) as u8, (index % 32) as u8);
		if high != page {
			out.push(0b111 << 5 | high);
			page = high;
		}
		if run <= 6 {
			out.push((run as u8) << 5 | low);
		} else {
			out.push(low);
			out.push(run as u8);
		}
		start += run;
	}
	out
}

/// The ColPic payload read by Neptune 3 and 4 screens.
///
/// | field       | type     | size     | description                      |
/// | ----------- | -------- | -------- | -------------------------------- |
/// | Version     | uint8_t  | 1 byte   | `3`                              |
/// | Reserved    |          | 3 bytes  | zero                             |
/// | Width       | uint32_t | 4 bytes  | pixels                           |
/// | Height      | uint32_t | 4 bytes  | pixels                           |
/// | Mark        | uint32_t | 4 bytes  | `0x05DDC33C`                     |
/// | Palette len | uint32_t | 4 bytes  | bytes of palette, 2 per colour   |
/// | Runs len    | uint32_t | 4 bytes  | bytes of run-length data         |
/// | Reserved    |          | 8 bytes  | zero                             |
/// | Palette     | [u16]    |          | RGB565 colours, most used first  |
/// | Runs        | [u8]     |          | see `pack_runs`                  |
///
/// All integers are little endian.
fn pack_colpic(image: &RgbImage) -> Vec<u8> {
	let mut words: Vec<u16> = image.pixels().map(rgb565).collect();
	let mut palette = build_palette(&words);
	limit_palette(&mut words, &mut palette);
	let indices: HashMap<u16, usize> = palette
		.iter()
		.enumerate()
		.map(|(index, entry)| (entry.word, index))
		.collect();
	let runs = pack_runs(&words, &indices);

	let mut out = Vec::with_capacity(COLPIC_HEADER_LEN + palette.len() * 2 + runs.len());
	out.push(COLPIC_VERSION);
	out.extend([0u8; 3]);
	out.extend(image.width().to_le_bytes());
	out.extend(image.height().to_le_bytes());
	out.extend(COLPIC_MARK.to_le_bytes());
	out.extend((palette.len() as u32 * 2).to_le_bytes());
	out.extend((runs.len() as u32).to_le_bytes());
	out.resize(COLPIC_HEADER_LEN, 0);
	for entry in &palette {
		out.extend(entry.word.to_le_bytes());
	}
	out.extend(runs);
	out
}

/// Printable text form of a ColPic payload.
///
/// The bytes are zero padded to a multiple of three (always adding at least
/// one byte), then every 6 bits become the character `'0' + value`, with `\`
/// replaced by `~`.
pub fn colpic_text(bytes: &[u8]) -> String {
	let mut padded = bytes.to_vec();
	padded.resize(bytes.len() + 3 - bytes.len() % 3, 0);

	let mut out = String::with_capacity(padded.len() / 3 * 4);
	for group in padded.chunks_exact(3) {
		let sextets = [
			group[0] >> 2,
			(group[0] & 0x03) << 4 | group[1] >> 4,
			(group[1] & 0x0F) << 2 | group[2] >> 6,
			group[2] & 0x3F,
		];
		for sextet in sextets {
			let c = char::from(b'0' + sextet);
			out.push(if c == '\\' { '~' } else { c });
		}
	}
	out
}

/// Test helpers reading ColPic data back.
#[cfg(test)]
pub(crate) mod colpic {
	/// Inverse of `colpic_text`, padding included.
	pub(crate) fn text_bytes(text: &str) -> Vec<u8> {
		let sextets: Vec<u8> = text
			.bytes()
			.map(|b| (if b == b'~' { b'\\' } else { b }) - b'0')
			.collect();
		sextets
			.chunks_exact(4)
			.flat_map(|s| {
				[
					s[0] << 2 | s[1] >> 4,
					(s[1] & 0x0F) << 4 | s[2] >> 2,
					(s[2] & 0x03) << 6 | s[3],
				]
			})
			.collect()
	}

	fn u32_at(
		bytes: &[u8],
		at: usize,
	) -> u32 {
		u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
	}

	/// Width, height and the RGB565 word of every pixel.
	pub(crate) fn decode(bytes: &[u8]) -> (u32, u32, Vec<u16>) {
		assert_eq!(bytes[0], 3);
		assert_eq!(u32_at(bytes, 12), 0x05DD_C33C);
		let (width, height) = (u32_at(bytes, 4), u32_at(bytes, 8));
		let palette_len = u32_at(bytes, 16) as usize;
		let runs_len = u32_at(bytes, 20) as usize;
		let palette: Vec<u16> = bytes[32..32 + palette_len]
			.chunks_exact(2)
			.map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
			.collect();
		let runs = &bytes[32 + palette_len..32 + palette_len + runs_len];

		let mut pixels = Vec::new();
		let mut page = 0;
		let mut i = 0;
		while i < runs.len() {
			let (high, low) = ((runs[i] >> 5) as usize, (runs[i] & 0x1F) as usize);
			match high {
				7 => page = low,
				0 => {
					i += 1;
					let word = palette[page * 32 + low];
					pixels.extend(std::iter::repeat_n(word, runs[i] as usize));
				}
				n => pixels.extend(std::iter::repeat_n(palette[page * 32 + low], n)),
			}
			i += 1;
		}
		(width, height, pixels)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::components::common::{Container, DEFAULT_BACKGROUND};
	use pretty_assertions::assert_eq;

	fn solid(
		width: u32,
		height: u32,
		rgba: [u8; 4],
	) -> RasterImage {
		let bytes = rgba.repeat((width * height) as usize);
		RasterImage::from_rgba(width, height, bytes).unwrap()
	}

	fn gradient(
		width: u32,
		height: u32,
	) -> RasterImage {
		let mut bytes = Vec::new();
		for y in 0..height {
			for x in 0..width {
				bytes.extend([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8, 255]);
			}
		}
		RasterImage::from_rgba(width, height, bytes).unwrap()
	}

	fn spec(
		width: u32,
		height: u32,
		encoding: PixelEncoding,
		container: Container,
	) -> ThumbnailSpec {
		ThumbnailSpec::new(width, height, encoding, container)
	}

	#[test]
	fn test_decode_empty() {
		let result = decode(&[]);
		assert!(matches!(result, Err(ThumbnailError::Decode(_))));
	}

	#[test]
	fn test_decode_garbage() {
		let result = decode(b"definitely not an image");
		assert!(matches!(result, Err(ThumbnailError::Decode(_))));
	}

	#[test]
	fn test_decode_truncated_png() {
		let target = spec(8, 8, PixelEncoding::Png, Container::Klipper);
		let png = encode(&gradient(8, 8), &target)
			.unwrap();
		let result = decode(&png[..png.len() / 2]);
		assert!(matches!(result, Err(ThumbnailError::Decode(_))));
	}

	#[test]
	fn test_png_decodes_back() {
		let image = gradient(16, 8);
		let target = spec(16, 8, PixelEncoding::Png, Container::Klipper);
		let png = encode(&image, &target).unwrap();
		let decoded = decode(&png).unwrap();
		assert_eq!(decoded, image);
	}

	#[test]
	fn test_from_rgba_wrong_length() {
		let result = RasterImage::from_rgba(2, 2, vec![0; 15]);
		assert!(matches!(result, Err(ThumbnailError::Decode(_))));
		let result = RasterImage::from_rgba(0, 2, vec![]);
		assert!(matches!(
			result,
			Err(ThumbnailError::InvalidDimensions { width: 0, height: 2 })
		));
	}

	#[test]
	fn test_resize_exact_dimensions() {
		let image = gradient(60, 60);
		for (w, h) in [(32, 32), (300, 300), (114, 114), (7, 3)] {
			let resized = resize(&image, w, h).unwrap();
			assert_eq!((resized.width(), resized.height()), (w, h));
		}
	}

	#[test]
	fn test_resize_keeps_aspect_ratio() {
		let image = solid(40, 20, [255, 0, 0, 255]);
		let resized = resize(&image, 10, 10).unwrap();
		// 10x5 content centred vertically
		assert_eq!(resized.pixel(5, 0)[3], 0);
		assert_eq!(resized.pixel(5, 9)[3], 0);
		let inside = resized.pixel(5, 4);
		assert!(inside[0] > 250 && inside[1] < 5 && inside[3] > 250);
	}

	#[test]
	fn test_resize_zero_target() {
		let image = solid(4, 4, [0, 0, 0, 255]);
		assert!(matches!(
			resize(&image, 0, 4),
			Err(ThumbnailError::InvalidDimensions { .. })
		));
	}

	#[test]
	fn test_resize_is_deterministic() {
		let image = gradient(50, 30);
		assert_eq!(resize(&image, 17, 23).unwrap(), resize(&image, 17, 23).unwrap());
	}

	#[test]
	fn test_rgb565_packing() {
		let mut bytes = Vec::new();
		bytes.extend([255, 0, 0, 255]);
		bytes.extend([255, 255, 255, 255]);
		let image = RasterImage::from_rgba(2, 1, bytes).unwrap();
		let out = encode(
			&image,
			&spec(2, 1, PixelEncoding::Rgb565, Container::TftHex { tag: "simage" }),
		)
		.unwrap();
		assert_eq!(out, vec![0x00, 0xF8, 0xFF, 0xFF]);
	}

	#[test]
	fn test_transparent_pixels_use_background() {
		let image = solid(1, 1, [255, 255, 255, 0]);
		let spec = spec(1, 1, PixelEncoding::Rgb888, Container::Base64Lines { tag: "x" })
			.with_background([10, 20, 30]);
		assert_eq!(encode(&image, &spec).unwrap(), vec![10, 20, 30]);
	}

	#[test]
	fn test_encode_dimension_mismatch() {
		let image = solid(4, 4, [0, 0, 0, 255]);
		let result = encode(
			&image,
			&spec(4, 5, PixelEncoding::Rgb565, Container::TftHex { tag: "simage" }),
		);
		match result {
			Err(ThumbnailError::Encode { source, .. }) => {
				assert!(matches!(source, EncodeFailure::PixelCountMismatch { .. }))
			}
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn test_encode_unsupported_container() {
		let image = solid(4, 4, [0, 0, 0, 255]);
		let target = spec(4, 4, PixelEncoding::Rgb565, Container::Klipper);
		let result = encode(&image, &target);
		match result {
			Err(ThumbnailError::Encode { source, .. }) => {
				assert!(matches!(source, EncodeFailure::UnsupportedContainer { .. }))
			}
			other => panic!("unexpected {other:?}"),
		}
	}

	#[test]
	fn test_encode_is_deterministic() {
		let image = gradient(24, 24);
		let specs = [
			spec(24, 24, PixelEncoding::Png, Container::Klipper),
			spec(24, 24, PixelEncoding::Jpeg, Container::Base64Lines { tag: "gimage" }),
			spec(24, 24, PixelEncoding::Rgb565, Container::TftHex { tag: "simage" }),
			spec(24, 24, PixelEncoding::Rgb888, Container::Base64Lines { tag: "gimage" }),
			spec(24, 24, PixelEncoding::Indexed, Container::ColPic { tag: "gimage" }),
		];
		for spec in specs {
			assert_eq!(encode(&image, &spec).unwrap(), encode(&image, &spec).unwrap());
		}
	}

	#[test]
	fn test_jpeg_output() {
		let image = gradient(16, 16);
		let out = encode(
			&image,
			&spec(16, 16, PixelEncoding::Jpeg, Container::Base64Lines { tag: "gimage" }),
		)
		.unwrap();
		assert_eq!(&out[..2], &[0xFF, 0xD8]);
		let decoded = decode(&out).unwrap();
		assert_eq!((decoded.width(), decoded.height()), (16, 16));
	}

	fn colpic_spec(
		width: u32,
		height: u32,
	) -> ThumbnailSpec {
		spec(width, height, PixelEncoding::Indexed, Container::ColPic { tag: "gimage" })
	}

	fn from_words(
		width: u32,
		height: u32,
		words: &[u16],
	) -> RasterImage {
		let mut bytes = Vec::new();
		for word in words {
			let r = (word >> 11 & 0x1F) as u8;
			let g = (word >> 5 & 0x3F) as u8;
			let b = (word & 0x1F) as u8;
			bytes.extend([r << 3, g << 2, b << 3, 255]);
		}
		RasterImage::from_rgba(width, height, bytes).unwrap()
	}

	#[test]
	fn test_colpic_known_image() {
		let mut bytes = Vec::new();
		bytes.extend([255, 0, 0, 255].repeat(3));
		bytes.extend([0, 0, 255, 255]);
		let image = RasterImage::from_rgba(2, 2, bytes).unwrap();
		let out = encode(&image, &colpic_spec(2, 2)).unwrap();

		let mut expected = vec![3, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0];
		expected.extend([0x3C, 0xC3, 0xDD, 0x05, 4, 0, 0, 0, 2, 0, 0, 0]);
		expected.extend([0; 8]);
		// red used three times, then blue
		expected.extend([0x00, 0xF8, 0x1F, 0x00]);
		// three of colour 0, one of colour 1
		expected.extend([0b011_00000, 0b001_00001]);
		assert_eq!(out, expected);

		assert_eq!(
			colpic_text(&out),
			"0`00008000020000?<?M1@@000020000000000000000n1l0H240"
		);
	}

	#[test]
	fn test_colpic_text_escapes_backslash() {
		assert_eq!(colpic_text(&[0xB0]), "~000");
		// a full group still gets three zero bytes appended
		assert_eq!(colpic_text(&[0, 0, 0]).len(), 8);
		assert_eq!(colpic::text_bytes(&colpic_text(&[7, 8, 9])), vec![7, 8, 9, 0, 0, 0]);
	}

	#[test]
	fn test_colpic_long_runs() {
		let words = vec![0x1234; 300];
		let out = encode(&from_words(300, 1, &words), &colpic_spec(300, 1)).unwrap();
		// 255 then 45 pixels of colour 0
		assert_eq!(&out[COLPIC_HEADER_LEN + 2..], &[0, 255, 0, 45]);
		assert_eq!(colpic::decode(&out), (300, 1, words));
	}

	#[test]
	fn test_colpic_palette_pages() {
		// 40 colours, each used once: indices past 31 need a page switch
		let words: Vec<u16> = (0..40u16).map(|i| i << 5).collect();
		let out = encode(&from_words(40, 1, &words), &colpic_spec(40, 1)).unwrap();
		let runs = &out[COLPIC_HEADER_LEN + 80..];
		assert!(runs.contains(&0b111_00001));
		assert_eq!(colpic::decode(&out), (40, 1, words));
	}

	#[test]
	fn test_colpic_round_trip() {
		let image = gradient(32, 30);
		let out = encode(&image, &colpic_spec(32, 30)).unwrap();
		let flat = flatten(&image, DEFAULT_BACKGROUND);
		let words: Vec<u16> = flat.pixels().map(rgb565).collect();
		assert_eq!(colpic::decode(&out), (32, 30, words));
	}

	#[test]
	fn test_colpic_palette_is_limited() {
		// 2048 distinct colours
		let words: Vec<u16> = (0..2048u16)
			.map(|i| (i % 32) << 11 | (i / 32) << 5)
			.collect();
		let out = encode(&from_words(64, 32, &words), &colpic_spec(64, 32)).unwrap();
		let palette_len = u32::from_le_bytes([out[16], out[17], out[18], out[19]]);
		assert_eq!(palette_len as usize, COLPIC_MAX_COLORS * 2);

		let (_, _, pixels) = colpic::decode(&out);
		assert_eq!(pixels.len(), 2048);
		let palette: Vec<u16> = out[COLPIC_HEADER_LEN..COLPIC_HEADER_LEN + 2048]
			.chunks_exact(2)
			.map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
			.collect();
		assert!(pixels.iter().all(|word| palette.contains(word)));
	}

	#[test]
	fn test_palette_order() {
		let palette = build_palette(&[5, 9, 9, 7, 5, 9, 7]);
		let order: Vec<u16> = palette.iter().map(|entry| entry.word).collect();
		// 9 is used three times; 5 and 7 tie, the later one goes first
		assert_eq!(order, vec![9, 7, 5]);
	}
}
