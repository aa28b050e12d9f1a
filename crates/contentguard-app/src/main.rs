use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use contentguard::{ExchangeContext, Phase, Pipeline, SanitizerConfig, ScanVerdict, StageOutcome};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Offline runner for the content sanitization stages
#[derive(Parser, Debug)]
#[command(name = "contentguard", version)]
struct Args {
	/// YAML sanitizer configuration
	#[arg(long, global = true)]
	config: Option<PathBuf>,

	/// Emit logs as JSON
	#[arg(long, global = true)]
	json_logs: bool,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Print the scan payload built for a document
	Extract {
		#[arg(long, value_enum)]
		phase: PhaseArg,

		/// Read the document from this file instead of stdin
		#[arg(long)]
		file: Option<PathBuf>,

		/// Extra exchange variables, as key=value
		#[arg(long = "var", value_parser = parse_var)]
		vars: Vec<(String, String)>,
	},
	/// Apply a scanner verdict to a document and print the result
	Mask {
		#[arg(long, value_enum)]
		phase: PhaseArg,

		/// Verdict action
		#[arg(long)]
		action: String,

		/// Redacted text supplied by the scanner
		#[arg(long)]
		redacted: Option<String>,

		/// Read the document from this file instead of stdin
		#[arg(long)]
		file: Option<PathBuf>,
	},
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum PhaseArg {
	Prompt,
	Response,
}

impl From<PhaseArg> for Phase {
	fn from(p: PhaseArg) -> Self {
		match p {
			PhaseArg::Prompt => Phase::Prompt,
			PhaseArg::Response => Phase::Response,
		}
	}
}

fn parse_var(s: &str) -> Result<(String, String), String> {
	let (k, v) = s
		.split_once('=')
		.ok_or_else(|| format!("expected key=value, got {s:?}"))?;
	Ok((k.to_string(), v.to_string()))
}

fn init_tracing(json: bool) {
	let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
	let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
	if json {
		tracing_subscriber::registry()
			.with(filter)
			.with(fmt.json())
			.init();
	} else {
		tracing_subscriber::registry().with(filter).with(fmt).init();
	}
}

fn read_document(file: Option<&PathBuf>) -> anyhow::Result<String> {
	match file {
		Some(path) => fs_err::read_to_string(path).context("reading document"),
		None => {
			let mut buf = String::new();
			std::io::stdin()
				.read_to_string(&mut buf)
				.context("reading document from stdin")?;
			Ok(buf)
		},
	}
}

fn main() -> anyhow::Result<()> {
	let args = Args::parse();
	init_tracing(args.json_logs);

	let config = match &args.config {
		Some(path) => SanitizerConfig::from_file(path)
			.with_context(|| format!("loading config {}", path.display()))?,
		None => SanitizerConfig::default(),
	};
	let pipeline = Pipeline::new(config);
	let config = pipeline.config();
	let mut ctx = ExchangeContext::new();

	match args.command {
		Command::Extract { phase, file, vars } => {
			let phase = Phase::from(phase);
			let keys = config.phase_keys(phase);
			ctx.extend(vars);
			ctx.set(&keys.document, read_document(file.as_ref())?);

			let outcome = match phase {
				Phase::Prompt => pipeline.build_prompt_payload(&mut ctx),
				Phase::Response => pipeline.build_response_payload(&mut ctx),
			};
			tracing::info!(%phase, degraded = outcome.is_degraded(), "extracted text");
			let payload = ctx
				.get(&keys.payload)
				.context("no scan payload was produced")?;
			println!("{payload}");
		},
		Command::Mask {
			phase,
			action,
			redacted,
			file,
		} => {
			let phase = Phase::from(phase);
			let keys = config.phase_keys(phase);
			ctx.set(&keys.document, read_document(file.as_ref())?);

			let mut verdict = ScanVerdict::new(action);
			verdict.redacted = redacted;
			verdict.record(&mut ctx, keys);

			let outcome = match phase {
				Phase::Prompt => pipeline.mask_prompt(&mut ctx),
				Phase::Response => pipeline.mask_response(&mut ctx),
			};
			if let StageOutcome::Degraded(e) = &outcome {
				tracing::warn!(%phase, error = %e, "document left unmasked");
			}
			tracing::info!(%phase, masked = ctx.flag(&keys.masking_applied), "mask finished");
			println!("{}", ctx.get(&keys.document).unwrap_or_default());
		},
	}
	Ok(())
}
