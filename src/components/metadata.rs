use std::collections::BTreeMap;

use crate::components::common::MetadataKey;
use crate::components::registry::PrinterProfile;
use crate::components::scanner::GcodeSegment;

/// Shown for any value the slicer did not supply.
pub const NOT_AVAILABLE: &str = "N/A";

/// Display strings to write into metadata comments, keyed by field. Fields
/// that are absent keep their original value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMetadata {
	values: BTreeMap<MetadataKey, String>,
}

impl ResolvedMetadata {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert(
		&mut self,
		key: MetadataKey,
		value: impl Into<String>,
	) {
		self.values.insert(key, value.into());
	}

	pub fn get(
		&self,
		key: MetadataKey,
	) -> Option<&str> {
		self.values.get(&key).map(String::as_str)
	}

	pub fn contains(
		&self,
		key: MetadataKey,
	) -> bool {
		self.values.contains_key(&key)
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}
}

/// Print statistics the slicer left in its metadata comments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SliceData {
	pub print_time_seconds: Option<u64>,
	pub model_height: Option<f64>,
	pub filament_grams: Option<f64>,
	pub filament_cost: Option<f64>,
	pub printer_model: Option<String>,
}

impl SliceData {
	/// Collect values from metadata segments; the first occurrence of a key
	/// wins and unparsable values count as missing.
	pub fn from_segments(segments: &[GcodeSegment]) -> Self {
		let mut data = SliceData::default();
		let mut seen: Vec<MetadataKey> = Vec::with_capacity(MetadataKey::ALL.len());
		for segment in segments {
			let GcodeSegment::Metadata(line) = segment else {
				continue;
			};
			if seen.contains(&line.key) {
				continue;
			}
			seen.push(line.key);

			let value = line.value.trim();
			match line.key {
				MetadataKey::PrintTime => data.print_time_seconds = parse_duration(value),
				MetadataKey::ModelHeight => data.model_height = parse_positive(value),
				MetadataKey::FilamentWeight => data.filament_grams = sum_filament(value),
				MetadataKey::FilamentCost => data.filament_cost = parse_positive(value),
				MetadataKey::PrinterModel => {
					data.printer_model = Some(value.to_string()).filter(|v| !v.is_empty())
				}
			}
		}
		data
	}

	/// Display strings for every field `profile` shows. Missing values become
	/// [`NOT_AVAILABLE`]; `currency` is appended verbatim to the cost.
	pub fn display_strings(
		&self,
		profile: &PrinterProfile,
		currency: &str,
	) -> ResolvedMetadata {
		let mut resolved = ResolvedMetadata::new();
		for key in profile.displayed {
			let value = match key {
				MetadataKey::PrintTime => self.print_time_seconds.map(format_duration),
				MetadataKey::ModelHeight => self.model_height.map(format_height),
				MetadataKey::FilamentWeight => {
					self.filament_grams.map(|g| format!("{}g", g.round() as i64))
				}
				MetadataKey::FilamentCost => {
					self.filament_cost.map(|c| format!("{c:.2}{currency}"))
				}
				MetadataKey::PrinterModel => self.printer_model.clone(),
			};
			resolved.insert(*key, value.unwrap_or_else(|| NOT_AVAILABLE.to_string()));
		}
		resolved
	}
}

/// Parse slicer durations such as `1d 2h 32m 11s` into seconds.
pub fn parse_duration(text: &str) -> Option<u64> {
	let mut total: u64 = 0;
	let mut parts = 0;
	for part in text.split_whitespace() {
		let (split, _) = part.char_indices().last()?;
		let (number, unit) = part.split_at(split);
		let number: u64 = number.parse().ok()?;
		let scale = match unit {
			"s" => 1,
			"m" => 60,
			"h" => 60 * 60,
			"d" => 60 * 60 * 24,
			"w" => 60 * 60 * 24 * 7,
			_ => return None,
		};
		total = total.checked_add(number.checked_mul(scale)?)?;
		parts += 1;
	}
	(parts > 0).then_some(total)
}

/// `H:MMh`, minutes rounded down.
pub fn format_duration(seconds: u64) -> String {
	let minutes = seconds / 60;
	format!("{}:{:02}h", minutes / 60, minutes % 60)
}

fn format_height(height: f64) -> String {
	format!("{}mm", (height * 100.0).round() / 100.0)
}

fn parse_positive(text: &str) -> Option<f64> {
	text.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

/// Multi-extruder prints list one weight per extruder.
fn sum_filament(text: &str) -> Option<f64> {
	text.split(',')
		.map(|entry| parse_positive(entry.trim()))
		.sum::<Option<f64>>()
}
