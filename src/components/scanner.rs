use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::STANDARD};
use regex::Regex;

use crate::components::common::{MetadataKey, ThumbnailError};

// "; thumbnail begin 300x300 12345", "; thumbnail_JPG begin 300 300 12345"
static BEGIN_MARKER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^;\s*thumbnail(?:_([A-Z]+))? begin (\d+)[x ](\d+) (\d+)$")
		.expect("begin marker pattern is valid")
});

static END_MARKER: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"^;\s*thumbnail(?:_([A-Z]+))? end$").expect("end marker pattern is valid")
});

/// Line prefixes of thumbnails already written for Elegoo screens.
const PRINTER_THUMBNAIL_PREFIXES: [&str; 4] =
	[";simage:", ";gimage:", ";;simage:", ";;gimage:"];

/// One typed piece of a gcode file. The order of segments is the order of
/// the input and must be preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcodeSegment {
	/// A line passed through verbatim, terminator included.
	Raw(String),
	Thumbnail(ThumbnailBlock),
	Metadata(MetadataLine),
}

/// A slicer thumbnail: everything between a begin and an end marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailBlock {
	pub width: u32,
	pub height: u32,
	/// Format suffix of the marker (`PNG`, `JPG`, `QOI`), if any.
	pub format: Option<String>,
	/// Byte count announced by the begin marker.
	pub declared_len: usize,
	/// Concatenated base64 payload with comment prefixes stripped.
	pub payload: String,
	/// 1-based line number of the begin marker.
	pub line: usize,
}

impl ThumbnailBlock {
	/// The `WxH` resolution tag.
	pub fn resolution(&self) -> String {
		format!("{}x{}", self.width, self.height)
	}

	pub fn decode_payload(&self) -> Result<Vec<u8>, ThumbnailError> {
		STANDARD.decode(self.payload.as_bytes()).map_err(|e| {
			ThumbnailError::Decode(format!(
				"{} thumbnail at line {}: {e}",
				self.resolution(),
				self.line
			))
		})
	}
}

/// A recognized metadata comment, `; <key prefix><value><ending>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataLine {
	pub key: MetadataKey,
	pub value: String,
	pub ending: String,
}

impl MetadataLine {
	/// The line as it appears in a file, with `value` in place of the original.
	pub fn render(
		&self,
		value: &str,
	) -> String {
		format!("; {}{}{}", self.key.prefix(), value, self.ending)
	}
}

/// Split text into `(content, terminator)` pairs. `\r\n`, `\n` and a bare
/// `\r` each end a line; the last line may have an empty terminator.
pub(crate) fn split_lines(text: &str) -> Vec<(&str, &str)> {
	let bytes = text.as_bytes();
	let mut lines = Vec::new();
	let mut start = 0;
	let mut i = 0;
	while i < bytes.len() {
		let end = match bytes[i] {
			b'\n' => i + 1,
			b'\r' if bytes.get(i + 1) == Some(&b'\n') => i + 2,
			b'\r' => i + 1,
			_ => {
				i += 1;
				continue;
			}
		};
		lines.push((&text[start..i], &text[i..end]));
		i = end;
		start = end;
	}
	if start < bytes.len() {
		lines.push((&text[start..], ""));
	}
	lines
}

/// Parse gcode text into segments in a single forward pass.
///
/// Thumbnail marker and payload lines collapse into one
/// [`GcodeSegment::Thumbnail`]; an unterminated or inconsistent block is a
/// [`ThumbnailError::MalformedBlock`].
pub fn parse(text: &str) -> Result<Vec<GcodeSegment>, ThumbnailError> {
	let mut segments = Vec::new();
	let mut open: Option<ThumbnailBlock> = None;

	for (index, (content, ending)) in split_lines(text).into_iter().enumerate() {
		let number = index + 1;
		let trimmed = content.trim_end();

		if let Some(mut block) = open.take() {
			if let Some(end) = END_MARKER.captures(trimmed) {
				let suffix = end.get(1).map(|m| m.as_str());
				if suffix != block.format.as_deref() {
					return Err(ThumbnailError::MalformedBlock {
						line: block.line,
						reason: format!(
							"end marker at line {number} does not match the begin marker"
						),
					});
				}
				if block.payload.len() != block.declared_len {
					log::warn!(
						"Thumbnail {} at line {} announces {} bytes but carries {}",
						block.resolution(),
						block.line,
						block.declared_len,
						block.payload.len()
					);
				}
				segments.push(GcodeSegment::Thumbnail(block));
				continue;
			}
			if BEGIN_MARKER.is_match(trimmed) {
				return Err(ThumbnailError::MalformedBlock {
					line: block.line,
					reason: format!("another block begins at line {number}"),
				});
			}
			match trimmed.strip_prefix(';') {
				Some(data) => block.payload.push_str(data.trim()),
				None => {
					return Err(ThumbnailError::MalformedBlock {
						line: block.line,
						reason: format!("line {number} is not a comment"),
					});
				}
			}
			open = Some(block);
			continue;
		}

		if let Some(block) = begin_block(trimmed, number)? {
			open = Some(block);
			continue;
		}

		if END_MARKER.is_match(trimmed) {
			return Err(ThumbnailError::MalformedBlock {
				line: number,
				reason: "end marker without a begin marker".into(),
			});
		}

		if let Some(metadata) = metadata_line(content, ending) {
			segments.push(GcodeSegment::Metadata(metadata));
			continue;
		}

		segments.push(GcodeSegment::Raw(format!("{content}{ending}")));
	}

	if let Some(block) = open {
		return Err(ThumbnailError::MalformedBlock {
			line: block.line,
			reason: "missing end marker".into(),
		});
	}
	Ok(segments)
}

/// A begin marker opens a block; one whose fields do not fit is malformed.
fn begin_block(
	line: &str,
	number: usize,
) -> Result<Option<ThumbnailBlock>, ThumbnailError> {
	let Some(captures) = BEGIN_MARKER.captures(line) else {
		return Ok(None);
	};
	let malformed = |reason: String| ThumbnailError::MalformedBlock {
		line: number,
		reason,
	};
	let dimension = |index: usize| {
		captures[index]
			.parse::<u32>()
			.ok()
			.filter(|value| *value > 0)
			.ok_or_else(|| malformed(format!("invalid dimension {}", &captures[index])))
	};
	let width = dimension(2)?;
	let height = dimension(3)?;
	let declared_len = captures[4]
		.parse()
		.map_err(|_| malformed(format!("invalid byte count {}", &captures[4])))?;
	Ok(Some(ThumbnailBlock {
		width,
		height,
		format: captures.get(1).map(|m| m.as_str().to_string()),
		declared_len,
		payload: String::new(),
		line: number,
	}))
}

fn metadata_line(
	content: &str,
	ending: &str,
) -> Option<MetadataLine> {
	let rest = content.strip_prefix("; ")?;
	MetadataKey::ALL.into_iter().find_map(|key| {
		rest.strip_prefix(key.prefix()).map(|value| MetadataLine {
			key,
			value: value.to_string(),
			ending: ending.to_string(),
		})
	})
}

/// Whether the file already carries thumbnails written for Elegoo screens.
pub fn has_printer_thumbnails(segments: &[GcodeSegment]) -> bool {
	segments.iter().any(|segment| match segment {
		GcodeSegment::Raw(line) => PRINTER_THUMBNAIL_PREFIXES
			.iter()
			.any(|prefix| line.starts_with(prefix)),
		_ => false,
	})
}
