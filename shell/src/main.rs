mod builtin;
mod eval;
mod job;
mod lexer;
mod parser;
mod types;

use std::process::ExitCode;

use anyhow::{Context, Result};
use argh::FromArgs;
use log::LevelFilter;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use builtin::Flow;

#[derive(FromArgs)]
/// Run pipelines of external programs joined by pipes and redirections.
struct Args {
	/// run a single command line and exit
	#[argh(option, short = 'c')]
	command: Option<String>,

	/// prompt printed before each line
	#[argh(option, default = "String::from(\"$ \")")]
	prompt: String,

	/// print the parsed stages instead of running them
	#[argh(switch)]
	dry_run: bool,

	/// log level: off, error, warn, info, debug or trace
	#[argh(option, default = "LevelFilter::Warn")]
	log_level: LevelFilter,
}

enum LineStatus {
	Done,
	Rejected,
	Exit,
}

// Err is reserved for failures that end the interpreter.
fn eval_line(line: &str, dry_run: bool) -> Result<LineStatus> {
	let tokens = lexer::tokenize(line);
	let first = match tokens.first() {
		Some(first) => first,
		None => return Ok(LineStatus::Done),
	};
	log::debug!("tokens: {:?}", tokens);

	if let Some(builtin) = builtin::match_builtin(first) {
		return Ok(match builtin(&tokens) {
			Flow::Continue => LineStatus::Done,
			Flow::Exit => LineStatus::Exit,
		});
	}

	let pipeline = match parser::parse(&tokens) {
		Ok(pipeline) => pipeline,
		Err(e) if e.is_fatal() => return Err(e).context("cannot build pipeline"),
		Err(e) => {
			eprintln!("pipesh: {}", e);
			return Ok(LineStatus::Rejected);
		},
	};
	for stage in pipeline.stages() {
		log::debug!("{}", stage);
	}
	if pipeline.is_background() {
		log::info!("background execution is not supported, waiting for the pipeline");
	}

	if dry_run {
		for stage in pipeline.stages() {
			println!("{}", stage);
		}
		return Ok(LineStatus::Done);
	}

	log::debug!("running {} stage(s)", pipeline.len());
	let statuses = eval::run(pipeline).context("cannot run pipeline")?;
	log::debug!("pipeline finished, {} children reaped", statuses.len());
	Ok(LineStatus::Done)
}

fn repl(args: &Args) -> Result<()> {
	let mut editor = DefaultEditor::new().context("cannot set up line editor")?;
	loop {
		let line = match editor.readline(&args.prompt) {
			Ok(line) => line,
			Err(ReadlineError::Interrupted) => continue,
			Err(ReadlineError::Eof) => break,
			Err(e) => return Err(e).context("cannot read line"),
		};
		if !line.is_empty() {
			editor.add_history_entry(line.as_str()).context("cannot record history")?;
		}
		if let LineStatus::Exit = eval_line(&line, args.dry_run)? {
			break;
		}
	}
	Ok(())
}

fn run(args: &Args) -> Result<ExitCode> {
	if let Some(ref line) = args.command {
		return Ok(match eval_line(line, args.dry_run)? {
			LineStatus::Rejected => ExitCode::from(2),
			LineStatus::Done | LineStatus::Exit => ExitCode::SUCCESS,
		});
	}
	repl(args)?;
	Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
	let args: Args = argh::from_env();
	if let Err(e) = TermLogger::init(args.log_level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto) {
		eprintln!("pipesh: cannot set up logging: {}", e);
	}

	match run(&args) {
		Ok(code) => code,
		Err(e) => {
			eprintln!("pipesh: {:#}", e);
			ExitCode::FAILURE
		},
	}
}
