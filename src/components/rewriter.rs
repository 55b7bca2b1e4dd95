use crate::components::common::{Container, MetadataKey};
use crate::components::metadata::{NOT_AVAILABLE, ResolvedMetadata};
use crate::components::scanner::GcodeSegment;
use crate::components::synthesizer::RenderedThumbnail;

/// Base64 characters per `; ` line in a Klipper thumbnail block.
pub const KLIPPER_LINE_WIDTH: usize = 78;

/// Characters per `;TAG:` line Elegoo screens accept.
pub const ELEGOO_LINE_WIDTH: usize = 1024 - 8 - 1;

// room the firmware reserves for the `;TAG:` prefix and terminator
const COLPIC_LINE_SLACK: usize = 10;

const TFT_ROW_SEPARATOR: &str = "M10086 ;";

/// Serialise the output file.
///
/// Slicer thumbnails are dropped and `thumbnails` are inserted, in order,
/// before the first command line. Metadata values found in `metadata`
/// replace the originals. Every raw line is written unchanged and in order.
pub fn rewrite(
	segments: &[GcodeSegment],
	thumbnails: &[RenderedThumbnail],
	metadata: &ResolvedMetadata,
) -> String {
	let newline = detect_newline(segments);
	let anchor = segments
		.iter()
		.position(is_command)
		.unwrap_or(segments.len());
	let has_height = segments.iter().any(|segment| match segment {
		GcodeSegment::Metadata(line) => line.key == MetadataKey::ModelHeight,
		_ => false,
	});
	let insertion = insertion(thumbnails, metadata, has_height, newline);

	let mut out = String::new();
	for (index, segment) in segments.iter().enumerate() {
		if index == anchor {
			out.push_str(&insertion);
		}
		match segment {
			GcodeSegment::Raw(line) => out.push_str(line),
			GcodeSegment::Thumbnail(block) => {
				log::debug!(
					"Dropping slicer thumbnail {} from line {}",
					block.resolution(),
					block.line
				);
			}
			GcodeSegment::Metadata(line) => {
				let value = metadata.get(line.key).unwrap_or(line.value.as_str());
				out.push_str(&line.render(value));
			}
		}
	}
	if anchor == segments.len() && !insertion.is_empty() {
		if !out.is_empty() && !out.ends_with(['\n', '\r']) {
			out.push_str(newline);
		}
		out.push_str(&insertion);
	}
	out
}

/// Comment lines for one thumbnail, without terminators.
pub fn format_block(thumbnail: &RenderedThumbnail) -> Vec<String> {
	let spec = &thumbnail.spec;
	let payload = thumbnail.payload.as_str();
	let mut lines = Vec::new();
	match spec.container {
		Container::Klipper => {
			lines.push(format!(
				"; thumbnail begin {}x{} {}",
				spec.width,
				spec.height,
				payload.len()
			));
			for chunk in chunks(payload, KLIPPER_LINE_WIDTH) {
				lines.push(format!("; {chunk}"));
			}
			lines.push("; thumbnail end".to_string());
		}
		Container::TftHex { tag } => {
			// two hex characters per byte
			let row_width = spec.width as usize * 2 * 2;
			for (row, hex) in chunks(payload, row_width).into_iter().enumerate() {
				if row == 0 {
					lines.push(format!(";{tag}:{hex}"));
				} else {
					lines.push(format!("{TFT_ROW_SEPARATOR}{hex}"));
				}
			}
			lines.push(TFT_ROW_SEPARATOR.to_string());
		}
		Container::Base64Lines { tag } => {
			let parts = chunks(payload, ELEGOO_LINE_WIDTH);
			let partial_tail = payload.len() % ELEGOO_LINE_WIDTH != 0;
			let last = parts.len().saturating_sub(1);
			for (index, part) in parts.into_iter().enumerate() {
				if partial_tail && index == last {
					lines.push(format!(";;{tag}:{part}"));
				} else {
					lines.push(format!(";{tag}:{part}"));
				}
			}
		}
		Container::ColPic { tag } => lines.extend(colpic_lines(tag, payload)),
	}
	lines
}

/// ColPic text split into `;TAG:` lines, then a `;000...` padding line.
///
/// The line at index `(len + 10) / 1015` is marked `;;TAG:`. The padding
/// brings the text up to a multiple of the line width, plus ten.
fn colpic_lines(
	tag: &str,
	text: &str,
) -> Vec<String> {
	let marked = (text.len() + COLPIC_LINE_SLACK) / ELEGOO_LINE_WIDTH;
	let mut lines: Vec<String> = chunks(text, ELEGOO_LINE_WIDTH)
		.into_iter()
		.enumerate()
		.map(|(index, part)| {
			if index == marked {
				format!(";;{tag}:{part}")
			} else {
				format!(";{tag}:{part}")
			}
		})
		.collect();
	let overflow = (text.len() + COLPIC_LINE_SLACK) % ELEGOO_LINE_WIDTH;
	let padding = ELEGOO_LINE_WIDTH - 3 - overflow + COLPIC_LINE_SLACK;
	lines.push(format!(";{}", "0".repeat(padding)));
	lines
}

fn insertion(
	thumbnails: &[RenderedThumbnail],
	metadata: &ResolvedMetadata,
	has_height: bool,
	newline: &str,
) -> String {
	let mut lines: Vec<String> = Vec::new();
	for thumbnail in thumbnails {
		lines.extend(format_block(thumbnail));
		lines.push(String::new());
	}
	if metadata.contains(MetadataKey::ModelHeight) && !has_height {
		lines.push(format!(
			"; {}{}",
			MetadataKey::ModelHeight.prefix(),
			NOT_AVAILABLE
		));
	}
	if !thumbnails.is_empty() {
		lines.push(format!(
			"; Thumbnails generated by neptune-thumbnails {}",
			env!("CARGO_PKG_VERSION")
		));
		lines.push("; Compatible with \"Cura_SteamEngine X.X\" screens".to_string());
		lines.push(String::new());
	}

	let mut out = String::new();
	for line in lines {
		out.push_str(&line);
		out.push_str(newline);
	}
	out
}

/// A line that does something on the printer: not blank, not a comment.
fn is_command(segment: &GcodeSegment) -> bool {
	match segment {
		GcodeSegment::Raw(line) => {
			let line = line.trim();
			!line.is_empty() && !line.starts_with(';')
		}
		_ => false,
	}
}

/// The first line terminator of the input, `\n` if there is none.
fn detect_newline(segments: &[GcodeSegment]) -> &'static str {
	for segment in segments {
		let ending = match segment {
			GcodeSegment::Raw(line) => line,
			GcodeSegment::Metadata(line) => &line.ending,
			GcodeSegment::Thumbnail(_) => continue,
		};
		if ending.ends_with("\r\n") {
			return "\r\n";
		} else if ending.ends_with('\n') {
			return "\n";
		} else if ending.ends_with('\r') {
			return "\r";
		}
	}
	"\n"
}

/// Split ASCII text into pieces of at most `width` characters.
fn chunks(
	text: &str,
	width: usize,
) -> Vec<&str> {
	let mut out = Vec::new();
	let mut rest = text;
	while !rest.is_empty() {
		let mut split = width.max(1).min(rest.len());
		while !rest.is_char_boundary(split) {
			split += 1;
		}
		let (head, tail) = rest.split_at(split);
		out.push(head);
		rest = tail;
	}
	out
}
