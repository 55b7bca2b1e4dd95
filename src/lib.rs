#![doc = include_str!("../README.md")]

mod components;

pub use components::codec::{RasterImage, colpic_text, decode, encode, resize};
pub use components::common::{
	COLPIC_HEADER_LEN, COLPIC_MAX_COLORS, Container, DEFAULT_BACKGROUND, EncodeFailure,
	MetadataKey, PixelEncoding, ThumbnailError, ThumbnailSpec,
};
pub use components::metadata::{
	NOT_AVAILABLE, ResolvedMetadata, SliceData, format_duration, parse_duration,
};
pub use components::overlay::{
	CANVAS_SIZE, DARK_PEN, LIGHT_PEN, Overlay, OverlayFont, PREVIEW_SIZE,
};
pub use components::postprocess::{Outcome, PostProcessOptions, process, source_image};
pub use components::registry::{PrinterModel, PrinterProfile, profile, resolve};
pub use components::rewriter::{
	ELEGOO_LINE_WIDTH, KLIPPER_LINE_WIDTH, format_block, rewrite,
};
pub use components::scanner::{
	GcodeSegment, MetadataLine, ThumbnailBlock, has_printer_thumbnails, parse,
};
pub use components::synthesizer::{RenderedThumbnail, render, synthesize};
