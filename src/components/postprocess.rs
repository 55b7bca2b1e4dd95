use std::path::PathBuf;

use crate::components::codec::{self, RasterImage};
use crate::components::common::ThumbnailError;
use crate::components::metadata::SliceData;
use crate::components::overlay::{Overlay, OverlayFont};
use crate::components::registry::{self, PrinterModel, PrinterProfile};
use crate::components::rewriter;
use crate::components::scanner::{self, GcodeSegment};
use crate::components::synthesizer;

const CENSORED_SLICERS: [&str; 2] = ["PrusaSlicer", "OrcaSlicer"];

/// Settings for one post-processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostProcessOptions {
	/// `Unset` detects the model from the `printer_model` comment.
	pub printer: PrinterModel,
	/// Appended verbatim to the filament cost.
	pub currency: String,
	/// Smallest slicer thumbnail accepted as the source image.
	pub min_source_size: u32,
	/// Replace slicer names in comment lines.
	pub censor_slicer_names: bool,
	/// Draw the print statistics around the preview.
	pub overlay: bool,
	/// Font for the statistics; a system sans-serif face when `None`.
	pub font: Option<PathBuf>,
}

impl Default for PostProcessOptions {
	fn default() -> Self {
		Self {
			printer: PrinterModel::Unset,
			currency: "€".to_string(),
			min_source_size: 300,
			censor_slicer_names: false,
			overlay: true,
			font: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
	Rewritten { model: PrinterModel, gcode: String },
	/// The input already carries printer thumbnails and must be kept as is.
	AlreadyProcessed,
}

/// Rewrite a whole gcode file for the chosen printer.
///
/// Nothing is produced unless every stage succeeds, so a failed run leaves
/// the caller's file untouched.
pub fn process(
	gcode: &str,
	options: &PostProcessOptions,
) -> Result<Outcome, ThumbnailError> {
	let segments = scanner::parse(gcode)?;
	log::debug!("Parsed {} segments", segments.len());
	if scanner::has_printer_thumbnails(&segments) {
		log::info!("Printer thumbnails already present, leaving the gcode unchanged");
		return Ok(Outcome::AlreadyProcessed);
	}

	let slice_data = SliceData::from_segments(&segments);
	let profile = select_profile(options.printer, &slice_data)?;
	log::info!("Generating thumbnails for {}", profile.model);

	let image = source_image(&segments, options.min_source_size)?;
	let metadata = slice_data.display_strings(profile, &options.currency);

	let loaded;
	let font = match (&options.font, options.overlay) {
		(_, false) => None,
		(Some(path), true) => {
			loaded = OverlayFont::load(path)?;
			Some(&loaded)
		}
		(None, true) => OverlayFont::system(),
	};
	if options.overlay && font.is_none() {
		log::warn!("No system font found, statistics are left off the preview");
	}
	let overlay = Overlay::new(&metadata, profile, font);
	let thumbnails =
		synthesizer::synthesize(&image, profile, options.overlay.then_some(&overlay))?;

	let segments = if options.censor_slicer_names {
		censor(segments)
	} else {
		segments
	};
	Ok(Outcome::Rewritten {
		model: profile.model,
		gcode: rewriter::rewrite(&segments, &thumbnails, &metadata),
	})
}

fn select_profile(
	requested: PrinterModel,
	slice_data: &SliceData,
) -> Result<&'static PrinterProfile, ThumbnailError> {
	if requested != PrinterModel::Unset {
		return registry::profile(requested);
	}
	match slice_data.printer_model.as_deref() {
		Some(name) => {
			log::debug!("Printer model `{name}` taken from the gcode");
			registry::resolve(name)
		}
		None => Err(ThumbnailError::PrinterNotSpecified),
	}
}

/// Decode the first slicer thumbnail of at least `min_size` in both
/// dimensions. Blocks that fail to decode are skipped; if none decodes the
/// first failure is returned.
pub fn source_image(
	segments: &[GcodeSegment],
	min_size: u32,
) -> Result<RasterImage, ThumbnailError> {
	let mut first_error = None;
	let candidates = segments.iter().filter_map(|segment| match segment {
		GcodeSegment::Thumbnail(block) => {
			(block.width >= min_size && block.height >= min_size).then_some(block)
		}
		_ => None,
	});
	for block in candidates {
		match block.decode_payload().and_then(|bytes| codec::decode(&bytes)) {
			Ok(image) => {
				log::debug!(
					"Using the {} thumbnail at line {} as source",
					block.resolution(),
					block.line
				);
				return Ok(image);
			}
			Err(error) => {
				log::warn!("Skipping thumbnail at line {}: {error}", block.line);
				if first_error.is_none() {
					first_error = Some(error);
				}
			}
		}
	}
	Err(first_error.unwrap_or(ThumbnailError::MissingThumbnail { min_size }))
}

fn censor(segments: Vec<GcodeSegment>) -> Vec<GcodeSegment> {
	segments
		.into_iter()
		.map(|segment| match segment {
			GcodeSegment::Raw(line) if line.trim_start().starts_with(';') => {
				let line = CENSORED_SLICERS
					.iter()
					.fold(line, |line, name| line.replace(name, "CensoredSlicer"));
				GcodeSegment::Raw(line)
			}
			other => other,
		})
		.collect()
}
