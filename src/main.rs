use std::error::Error;
use std::{fs, path::PathBuf, process::ExitCode};

use clap::Parser;
use env_logger::Env;
use neptune_thumbnails::{Outcome, PostProcessOptions, PrinterModel, process};

/// Add Elegoo Neptune thumbnails and print metadata to sliced gcode.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
	/// Gcode file written by the slicer.
	gcode: PathBuf,

	/// Printer model, e.g. NEPTUNE4PRO. Taken from the gcode when omitted.
	#[arg(short, long)]
	printer: Option<PrinterModel>,

	/// Currency symbol appended to the filament cost.
	#[arg(short, long, default_value = "€")]
	currency: String,

	/// Smallest slicer thumbnail accepted as the source image.
	#[arg(long, default_value_t = 300)]
	min_source_size: u32,

	/// Replace slicer names in comments with "CensoredSlicer".
	#[arg(long)]
	censor_slicer: bool,

	/// TrueType or OpenType font for the print statistics.
	#[arg(long, value_name = "PATH")]
	font: Option<PathBuf>,

	/// Use the plain slicer preview, without print statistics.
	#[arg(long, conflicts_with = "font")]
	no_overlay: bool,

	/// Write here instead of rewriting the input in place.
	#[arg(short, long)]
	output: Option<PathBuf>,

	/// Log every pipeline step.
	#[arg(short, long)]
	verbose: bool,
}

pub fn main() -> ExitCode {
	let args = Args::parse();
	let level = if args.verbose { "debug" } else { "info" };
	env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

	match run(&args) {
		Ok(()) => ExitCode::SUCCESS,
		Err(error) => {
			log::error!("{}", report(&*error));
			ExitCode::FAILURE
		}
	}
}

fn run(args: &Args) -> Result<(), Box<dyn Error>> {
	let gcode = fs::read_to_string(&args.gcode)
		.map_err(|e| format!("cannot read {}: {e}", args.gcode.display()))?;

	let options = PostProcessOptions {
		printer: args.printer.unwrap_or(PrinterModel::Unset),
		currency: args.currency.clone(),
		min_source_size: args.min_source_size,
		censor_slicer_names: args.censor_slicer,
		overlay: !args.no_overlay,
		font: args.font.clone(),
	};

	match process(&gcode, &options)? {
		Outcome::AlreadyProcessed => {
			log::info!("{} already has printer thumbnails", args.gcode.display());
		}
		Outcome::Rewritten { model, gcode } => {
			let path = args.output.as_ref().unwrap_or(&args.gcode);
			fs::write(path, gcode.as_bytes())
				.map_err(|e| format!("cannot write {}: {e}", path.display()))?;
			log::info!("Wrote {} thumbnails to {}", model, path.display());
		}
	}
	Ok(())
}

/// The error followed by its chain of sources.
fn report(error: &dyn Error) -> String {
	let mut message = error.to_string();
	let mut source = error.source();
	while let Some(cause) = source {
		message.push_str(": ");
		message.push_str(&cause.to_string());
		source = cause.source();
	}
	message
}
