use core::fmt;

use thiserror::Error;

/// Most palette entries an indexed image may use.
pub const COLPIC_MAX_COLORS: usize = 1024;

/// Byte length of the header that leads an indexed payload.
pub const COLPIC_HEADER_LEN: usize = 32;

pub(crate) const COLPIC_VERSION: u8 = 3;
pub(crate) const COLPIC_MARK: u32 = 0x05DD_C33C;

/// Colour used to flatten transparent pixels when none is given.
pub const DEFAULT_BACKGROUND: [u8; 3] = [48, 57, 79];

/// The pixel encodings a firmware renderer can consume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelEncoding {
	Png,
	Jpeg,
	/// 16-bit `RRRRRGGGGGGBBBBB` words, little endian.
	Rgb565,
	Rgb888,
	/// Elegoo's ColPic layout: an RGB565 palette sorted by use, then
	/// run-length packed palette indices.
	Indexed,
}

impl PixelEncoding {
	/// Bytes used per pixel, `None` for compressed encodings.
	pub fn bytes_per_pixel(&self) -> Option<usize> {
		match *self {
			PixelEncoding::Png | PixelEncoding::Jpeg | PixelEncoding::Indexed => None,
			PixelEncoding::Rgb565 => Some(2),
			PixelEncoding::Rgb888 => Some(3),
		}
	}

	/// Returns true when the encoding has no alpha channel, in which case
	/// transparent pixels are flattened onto the thumbnail background.
	pub fn is_opaque(&self) -> bool {
		!matches!(self, PixelEncoding::Png)
	}
}

impl fmt::Display for PixelEncoding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match *self {
			PixelEncoding::Png => "PNG",
			PixelEncoding::Jpeg => "JPEG",
			PixelEncoding::Rgb565 => "RGB565",
			PixelEncoding::Rgb888 => "RGB888",
			PixelEncoding::Indexed => "indexed",
		};
		f.write_str(name)
	}
}

/// Defines how encoded bytes are framed and embedded as gcode comments.
///
/// | container     | text embedding                                         |
/// | ------------- | ------------------------------------------------------ |
/// | `Klipper`     | `; thumbnail begin` block, base64                      |
/// | `TftHex`      | `;TAG:` hex rows split by `M10086 ;`                   |
/// | `Base64Lines` | `;TAG:` base64 lines of up to 1015 chars               |
/// | `ColPic`      | `;TAG:` 6-bit text lines of up to 1015 chars + padding |
///
/// The tag is written verbatim after the leading `;`, so a tag of `;gimage`
/// produces `;;gimage:` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Container {
	Klipper,
	TftHex { tag: &'static str },
	Base64Lines { tag: &'static str },
	ColPic { tag: &'static str },
}

impl Container {
	/// Whether pixels of the given encoding may be carried by this container.
	pub fn supports(&self, encoding: PixelEncoding) -> bool {
		match *self {
			Container::Klipper => encoding == PixelEncoding::Png,
			Container::TftHex { .. } => encoding == PixelEncoding::Rgb565,
			Container::Base64Lines { .. } => encoding != PixelEncoding::Indexed,
			Container::ColPic { .. } => encoding == PixelEncoding::Indexed,
		}
	}

	pub fn name(&self) -> &'static str {
		match *self {
			Container::Klipper => "klipper",
			Container::TftHex { .. } => "tft-hex",
			Container::Base64Lines { .. } => "base64-lines",
			Container::ColPic { .. } => "colpic",
		}
	}
}

/// A single thumbnail a printer expects: resolution, pixel encoding and
/// container framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSpec {
	pub width: u32,
	pub height: u32,
	pub encoding: PixelEncoding,
	pub container: Container,
	pub background: [u8; 3],
	/// Pen colour of the print statistics drawn around the preview, `None`
	/// renders the plain slicer image.
	pub overlay: Option<[u8; 3]>,
}

impl ThumbnailSpec {
	pub const fn new(
		width: u32,
		height: u32,
		encoding: PixelEncoding,
		container: Container,
	) -> Self {
		Self {
			width,
			height,
			encoding,
			container,
			background: DEFAULT_BACKGROUND,
			overlay: None,
		}
	}

	pub const fn with_background(
		mut self,
		background: [u8; 3],
	) -> Self {
		self.background = background;
		self
	}

	pub const fn with_overlay(
		mut self,
		pen: [u8; 3],
	) -> Self {
		self.overlay = Some(pen);
		self
	}

	/// Number of pixels in the target image.
	pub fn pixel_count(&self) -> usize {
		self.width as usize * self.height as usize
	}

	/// Exact length of the encoded bytes, `None` for compressed encodings.
	pub fn expected_len(&self) -> Option<usize> {
		let bpp = self.encoding.bytes_per_pixel()?;
		Some(self.pixel_count() * bpp)
	}
}

impl fmt::Display for ThumbnailSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(
			f,
			"{}x{} {} ({})",
			self.width,
			self.height,
			self.encoding,
			self.container.name()
		)
	}
}

/// The closed set of metadata comments the scanner recognizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MetadataKey {
	PrintTime,
	ModelHeight,
	FilamentWeight,
	FilamentCost,
	PrinterModel,
}

impl MetadataKey {
	pub const ALL: [MetadataKey; 5] = [
		MetadataKey::PrintTime,
		MetadataKey::ModelHeight,
		MetadataKey::FilamentWeight,
		MetadataKey::FilamentCost,
		MetadataKey::PrinterModel,
	];

	/// The comment text between `; ` and the value.
	pub fn prefix(&self) -> &'static str {
		match *self {
			MetadataKey::PrintTime => "estimated printing time (normal mode) = ",
			MetadataKey::ModelHeight => "max_z_height: ",
			MetadataKey::FilamentWeight => "filament used [g] = ",
			MetadataKey::FilamentCost => "total filament cost = ",
			MetadataKey::PrinterModel => "printer_model = ",
		}
	}
}

/// Why a single thumbnail could not be encoded.
#[derive(Debug, Error)]
pub enum EncodeFailure {
	#[error("image is {actual_width}x{actual_height}, layout needs {width}x{height}")]
	PixelCountMismatch {
		width: u32,
		height: u32,
		actual_width: u32,
		actual_height: u32,
	},
	#[error("{encoding} pixels cannot be carried by a {container} container")]
	UnsupportedContainer {
		encoding: PixelEncoding,
		container: &'static str,
	},
	#[error(transparent)]
	Image(#[from] image::ImageError),
}

/// Every way a post-processing run can fail. None of them are recoverable
/// for the current run.
#[derive(Debug, Error)]
pub enum ThumbnailError {
	#[error("cannot decode preview image: {0}")]
	Decode(String),
	#[error("cannot encode {spec} thumbnail")]
	Encode {
		spec: String,
		#[source]
		source: EncodeFailure,
	},
	#[error("malformed thumbnail block starting at line {line}: {reason}")]
	MalformedBlock { line: usize, reason: String },
	#[error("unknown printer model `{0}`")]
	UnknownPrinter(String),
	#[error("no printer model given and none found in the gcode")]
	PrinterNotSpecified,
	#[error("no decodable thumbnail of at least {min_size}x{min_size} in the gcode")]
	MissingThumbnail { min_size: u32 },
	#[error("invalid thumbnail dimensions {width}x{height}")]
	InvalidDimensions { width: u32, height: u32 },
	#[error("cannot load overlay font: {0}")]
	Font(String),
}

impl ThumbnailError {
	pub(crate) fn encode(
		spec: &ThumbnailSpec,
		source: EncodeFailure,
	) -> Self {
		ThumbnailError::Encode {
			spec: spec.to_string(),
			source,
		}
	}
}
