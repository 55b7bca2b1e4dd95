use core::fmt;
use core::str::FromStr;

use crate::components::common::{
	Container, MetadataKey, PixelEncoding, ThumbnailError, ThumbnailSpec,
};
use crate::components::overlay::{DARK_PEN, LIGHT_PEN};

/// The printers this crate knows how to produce thumbnails for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrinterModel {
	Neptune2,
	Neptune2D,
	Neptune2S,
	NeptuneX,
	Neptune3Pro,
	Neptune3Plus,
	Neptune3Max,
	Neptune4,
	Neptune4Pro,
	Neptune4Plus,
	Neptune4Max,
	OrangeStormGiga,
	/// No model chosen; the caller detects it from the gcode.
	Unset,
}

impl PrinterModel {
	pub const SUPPORTED: [PrinterModel; 12] = [
		PrinterModel::Neptune2,
		PrinterModel::Neptune2D,
		PrinterModel::Neptune2S,
		PrinterModel::NeptuneX,
		PrinterModel::Neptune3Pro,
		PrinterModel::Neptune3Plus,
		PrinterModel::Neptune3Max,
		PrinterModel::Neptune4,
		PrinterModel::Neptune4Pro,
		PrinterModel::Neptune4Plus,
		PrinterModel::Neptune4Max,
		PrinterModel::OrangeStormGiga,
	];

	/// Short identifier used on the command line.
	pub fn identifier(&self) -> &'static str {
		match *self {
			PrinterModel::Neptune2 => "NEPTUNE2",
			PrinterModel::Neptune2D => "NEPTUNE2D",
			PrinterModel::Neptune2S => "NEPTUNE2S",
			PrinterModel::NeptuneX => "NEPTUNEX",
			PrinterModel::Neptune3Pro => "NEPTUNE3PRO",
			PrinterModel::Neptune3Plus => "NEPTUNE3PLUS",
			PrinterModel::Neptune3Max => "NEPTUNE3MAX",
			PrinterModel::Neptune4 => "NEPTUNE4",
			PrinterModel::Neptune4Pro => "NEPTUNE4PRO",
			PrinterModel::Neptune4Plus => "NEPTUNE4PLUS",
			PrinterModel::Neptune4Max => "NEPTUNE4MAX",
			PrinterModel::OrangeStormGiga => "ORANGESTORMGIGA",
			PrinterModel::Unset => "",
		}
	}

	/// Name slicer printer presets write into `; printer_model = `.
	pub fn preset_name(&self) -> Option<&'static str> {
		match *self {
			PrinterModel::Neptune2 => Some("Elegoo Neptune 2"),
			PrinterModel::Neptune2D => Some("Elegoo Neptune 2D"),
			PrinterModel::Neptune2S => Some("Elegoo Neptune 2S"),
			PrinterModel::NeptuneX => Some("Elegoo Neptune X"),
			PrinterModel::Neptune3Pro => Some("Elegoo Neptune 3 Pro"),
			PrinterModel::Neptune3Plus => Some("Elegoo Neptune 3 Plus"),
			PrinterModel::Neptune3Max => Some("Elegoo Neptune 3 Max"),
			PrinterModel::Neptune4 => Some("Elegoo Neptune 4"),
			PrinterModel::Neptune4Pro => Some("Elegoo Neptune 4 Pro"),
			PrinterModel::Neptune4Plus => Some("Elegoo Neptune 4 Plus"),
			PrinterModel::Neptune4Max => Some("Elegoo Neptune 4 Max"),
			PrinterModel::OrangeStormGiga => Some("Elegoo OrangeStorm Giga"),
			PrinterModel::Unset => None,
		}
	}
}

impl FromStr for PrinterModel {
	type Err = ThumbnailError;

	/// Accepts identifiers (any case) and preset names. An empty string is
	/// `Unset`.
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let s = s.trim();
		if s.is_empty() {
			return Ok(PrinterModel::Unset);
		}
		PrinterModel::SUPPORTED
			.into_iter()
			.find(|model| {
				model.identifier().eq_ignore_ascii_case(s)
					|| model.preset_name() == Some(s)
			})
			.ok_or_else(|| ThumbnailError::UnknownPrinter(s.to_string()))
	}
}

impl fmt::Display for PrinterModel {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			PrinterModel::Unset => f.write_str("unset"),
			model => f.write_str(model.identifier()),
		}
	}
}

/// Everything a printer's firmware expects to find in a file.
#[derive(Debug, PartialEq, Eq)]
pub struct PrinterProfile {
	pub model: PrinterModel,
	/// In the order they are written to the file.
	pub thumbnails: &'static [ThumbnailSpec],
	/// Metadata fields the printer shows on screen.
	pub displayed: &'static [MetadataKey],
}

impl PrinterProfile {
	pub fn displays(
		&self,
		key: MetadataKey,
	) -> bool {
		self.displayed.contains(&key)
	}
}

const WHITE: [u8; 3] = [255, 255, 255];

const KLIPPER_SMALL: ThumbnailSpec =
	ThumbnailSpec::new(32, 32, PixelEncoding::Png, Container::Klipper);
const KLIPPER_LARGE: ThumbnailSpec =
	ThumbnailSpec::new(300, 300, PixelEncoding::Png, Container::Klipper)
		.with_overlay(LIGHT_PEN);

static DISPLAYED: [MetadataKey; 4] = [
	MetadataKey::PrintTime,
	MetadataKey::ModelHeight,
	MetadataKey::FilamentWeight,
	MetadataKey::FilamentCost,
];

// Neptune 2 family: RGB565 rows in hex
static TFT_HEX: [ThumbnailSpec; 4] = [
	ThumbnailSpec::new(
		100,
		100,
		PixelEncoding::Rgb565,
		Container::TftHex { tag: "simage" },
	),
	ThumbnailSpec::new(
		200,
		200,
		PixelEncoding::Rgb565,
		Container::TftHex { tag: ";gimage" },
	),
	KLIPPER_SMALL,
	KLIPPER_LARGE,
];

// Neptune 3 / 4 families: ColPic text
static INDEXED: [ThumbnailSpec; 4] = [
	ThumbnailSpec::new(
		200,
		200,
		PixelEncoding::Indexed,
		Container::ColPic { tag: "gimage" },
	)
	.with_overlay(LIGHT_PEN),
	ThumbnailSpec::new(
		160,
		160,
		PixelEncoding::Indexed,
		Container::ColPic { tag: "simage" },
	)
	.with_overlay(LIGHT_PEN),
	KLIPPER_SMALL,
	KLIPPER_LARGE,
];

// OrangeStorm Giga: base64 JPEG on a light screen
static JPEG: [ThumbnailSpec; 4] = [
	ThumbnailSpec::new(
		400,
		400,
		PixelEncoding::Jpeg,
		Container::Base64Lines { tag: "gimage" },
	)
	.with_background(WHITE)
	.with_overlay(DARK_PEN),
	ThumbnailSpec::new(
		114,
		114,
		PixelEncoding::Jpeg,
		Container::Base64Lines { tag: "simage" },
	)
	.with_background(WHITE)
	.with_overlay(DARK_PEN),
	KLIPPER_SMALL,
	KLIPPER_LARGE,
];

static PROFILES: [PrinterProfile; 12] = [
	PrinterProfile {
		model: PrinterModel::Neptune2,
		thumbnails: &TFT_HEX,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune2D,
		thumbnails: &TFT_HEX,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune2S,
		thumbnails: &TFT_HEX,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::NeptuneX,
		thumbnails: &TFT_HEX,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune3Pro,
		thumbnails: &INDEXED,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune3Plus,
		thumbnails: &INDEXED,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune3Max,
		thumbnails: &INDEXED,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune4,
		thumbnails: &INDEXED,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune4Pro,
		thumbnails: &INDEXED,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune4Plus,
		thumbnails: &INDEXED,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::Neptune4Max,
		thumbnails: &INDEXED,
		displayed: &DISPLAYED,
	},
	PrinterProfile {
		model: PrinterModel::OrangeStormGiga,
		thumbnails: &JPEG,
		displayed: &DISPLAYED,
	},
];

/// Look up the profile of a model.
pub fn profile(model: PrinterModel) -> Result<&'static PrinterProfile, ThumbnailError> {
	if model == PrinterModel::Unset {
		return Err(ThumbnailError::PrinterNotSpecified);
	}
	PROFILES
		.iter()
		.find(|profile| profile.model == model)
		.ok_or_else(|| ThumbnailError::UnknownPrinter(model.identifier().to_string()))
}

/// Resolve an identifier or preset name to its profile. Unknown names are an
/// error, never a fallback to some default printer.
pub fn resolve(identifier: &str) -> Result<&'static PrinterProfile, ThumbnailError> {
	profile(identifier.parse()?)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_every_model_has_a_profile() {
		for model in PrinterModel::SUPPORTED {
			let profile = resolve(model.identifier()).unwrap();
			assert_eq!(profile.model, model);
			let by_name = resolve(model.preset_name().unwrap()).unwrap();
			assert_eq!(by_name.model, model);
		}
	}

	#[test]
	fn test_unknown_printer() {
		match resolve("NEPTUNEZ") {
			Err(ThumbnailError::UnknownPrinter(id)) => assert_eq!(id, "NEPTUNEZ"),
			other => panic!("unexpected {other:?}"),
		}
		assert!(matches!(
			resolve("Elegoo Neptune 9"),
			Err(ThumbnailError::UnknownPrinter(_))
		));
	}

	#[test]
	fn test_unset_is_not_resolvable() {
		assert_eq!("".parse::<PrinterModel>().unwrap(), PrinterModel::Unset);
		assert!(matches!(resolve(""), Err(ThumbnailError::PrinterNotSpecified)));
	}

	#[test]
	fn test_identifiers_are_case_insensitive() {
		assert_eq!(
			"neptune4pro".parse::<PrinterModel>().unwrap(),
			PrinterModel::Neptune4Pro
		);
	}

	#[test]
	fn test_specs_are_consistent() {
		for profile in PROFILES.iter() {
			for spec in profile.thumbnails {
				assert!(spec.container.supports(spec.encoding), "{spec}");
				assert!(spec.width > 0 && spec.height > 0);
			}
			let klipper: Vec<(u32, u32)> = profile
				.thumbnails
				.iter()
				.filter(|spec| spec.container == Container::Klipper)
				.map(|spec| (spec.width, spec.height))
				.collect();
			assert_eq!(klipper, vec![(32, 32), (300, 300)]);
			assert!(profile.displays(MetadataKey::ModelHeight));
			assert!(!profile.displays(MetadataKey::PrinterModel));
		}
	}

	#[test]
	fn test_neptune2_layout() {
		let profile = profile(PrinterModel::Neptune2).unwrap();
		assert_eq!(profile.thumbnails[0].container, Container::TftHex { tag: "simage" });
		assert_eq!(profile.thumbnails[0].width, 100);
		assert_eq!(profile.thumbnails[1].container, Container::TftHex { tag: ";gimage" });
	}

	#[test]
	fn test_only_the_small_icon_is_plain() {
		for profile in PROFILES.iter() {
			for spec in profile.thumbnails {
				if *spec == KLIPPER_SMALL {
					assert_eq!(spec.overlay, None);
				} else {
					assert!(spec.overlay.is_some(), "{spec}");
				}
			}
		}
	}

	#[test]
	fn test_pen_follows_screen() {
		let giga = profile(PrinterModel::OrangeStormGiga).unwrap();
		assert_eq!(giga.thumbnails[0].overlay, Some(DARK_PEN));
		assert_eq!(giga.thumbnails[3].overlay, Some(LIGHT_PEN));
		let neptune = profile(PrinterModel::Neptune3Max).unwrap();
		assert_eq!(neptune.thumbnails[0].container, Container::ColPic { tag: "gimage" });
		assert_eq!(neptune.thumbnails[1].overlay, Some(LIGHT_PEN));
	}
}
