use core::fmt::Write;

use base64::{Engine, engine::general_purpose::STANDARD};

use crate::components::codec::{self, RasterImage};
use crate::components::common::{Container, ThumbnailError, ThumbnailSpec};
use crate::components::overlay::Overlay;
use crate::components::registry::PrinterProfile;

/// An encoded thumbnail ready to be written into gcode comments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedThumbnail {
	pub spec: ThumbnailSpec,
	/// Encoded bytes, container framing included.
	pub data: Vec<u8>,
	/// Text carried by the comment lines: hex for `TftHex`, ColPic text for
	/// `ColPic`, base64 otherwise.
	pub payload: String,
}

/// Resize and encode the source for one spec.
pub fn render(
	image: &RasterImage,
	spec: &ThumbnailSpec,
) -> Result<RenderedThumbnail, ThumbnailError> {
	let resized = codec::resize(image, spec.width, spec.height)?;
	let data = codec::encode(&resized, spec)?;
	let payload = match spec.container {
		Container::TftHex { .. } => to_hex(&data),
		Container::ColPic { .. } => codec::colpic_text(&data),
		_ => STANDARD.encode(&data),
	};
	log::info!("Rendered {} thumbnail ({} bytes)", spec, data.len());
	Ok(RenderedThumbnail {
		spec: *spec,
		data,
		payload,
	})
}

/// Render every thumbnail of `profile`, in profile order. The first failure
/// aborts the whole set.
///
/// Specs that carry a pen are rendered from `overlay` composed over the
/// source, once per pen. Without an overlay every spec uses the plain source.
pub fn synthesize(
	image: &RasterImage,
	profile: &PrinterProfile,
	overlay: Option<&Overlay>,
) -> Result<Vec<RenderedThumbnail>, ThumbnailError> {
	log::debug!(
		"Synthesizing {} thumbnails for {}",
		profile.thumbnails.len(),
		profile.model
	);
	let mut composed: Vec<([u8; 3], RasterImage)> = Vec::new();
	let mut rendered = Vec::with_capacity(profile.thumbnails.len());
	for spec in profile.thumbnails {
		let (Some(pen), Some(overlay)) = (spec.overlay, overlay) else {
			rendered.push(render(image, spec)?);
			continue;
		};
		let index = match composed.iter().position(|(used, _)| *used == pen) {
			Some(index) => index,
			None => {
				composed.push((pen, overlay.compose(image, pen)?));
				composed.len() - 1
			}
		};
		rendered.push(render(&composed[index].1, spec)?);
	}
	Ok(rendered)
}

fn to_hex(data: &[u8]) -> String {
	let mut out = String::with_capacity(data.len() * 2);
	for byte in data {
		// writing to a String cannot fail
		let _ = write!(out, "{byte:02x}");
	}
	out
}
