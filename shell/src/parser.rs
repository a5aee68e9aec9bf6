use std::fs;
use std::io;
use std::os::fd::OwnedFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;

use nix::fcntl::OFlag;
use nix::unistd;
use thiserror::Error;

use crate::lexer;
use crate::types::*;

/// File opened when `<` or `>` has nothing after it.
pub const PLACEHOLDER_FILE: &str = "file.txt";

const CREATE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum ParseError {
	#[error("empty command line")]
	Empty,
	#[error("syntax error near unexpected token `{token}'")]
	Syntax { token: String },
	#[error("{}: cannot open for {direction}: {source}", .path.display())]
	Open {
		path: PathBuf,
		direction: Direction,
		#[source]
		source: io::Error,
	},
	#[error("cannot create pipe: {0}")]
	Pipe(#[source] nix::Error),
}

impl ParseError {
	/// Errors the interpreter cannot recover from.
	pub fn is_fatal(&self) -> bool {
		matches!(*self, ParseError::Pipe(_))
	}
}

type ParseResult<T> = Result<T, ParseError>;

fn open_redirect(path: &str, direction: Direction) -> ParseResult<Descriptor> {
	let mut oopt = fs::OpenOptions::new();
	let _ = match direction {
		Direction::Input => oopt.read(true),
		Direction::Output => oopt.write(true).create(true).truncate(true).mode(CREATE_MODE),
	};
	let file = oopt.open(path).map_err(|source| ParseError::Open {
		path: PathBuf::from(path),
		direction: direction,
		source: source,
	})?;
	let fd = OwnedFd::from(file);
	log::trace!("opened {} for {} as {:?}", path, direction, fd);
	Ok(Descriptor::Owned(fd))
}

fn parse_stage(segment: &[String], is_last: bool) -> ParseResult<Stage> {
	let (name, rest) = match segment.split_first() {
		Some((name, _)) if lexer::is_operator(name) => {
			return Err(ParseError::Syntax { token: name.clone() });
		},
		Some(split) => split,
		None => {
			let token = if is_last { "newline" } else { "|" };
			return Err(ParseError::Syntax { token: token.to_owned() });
		},
	};

	let mut stage = Stage::new(name);
	let mut rest = rest.iter();
	while let Some(token) = rest.next() {
		match token.as_str() {
			"<" | ">" => {
				// the filename is taken literally, whatever it looks like
				let path = rest.next().map_or(PLACEHOLDER_FILE, String::as_str);
				if token == "<" {
					stage.input = open_redirect(path, Direction::Input)?;
				} else {
					stage.output = open_redirect(path, Direction::Output)?;
				}
			},
			"&" => stage.background = true,
			_ => stage.argv.push(token.clone()),
		}
	}
	Ok(stage)
}

/// Builds a pipeline from the tokens of one command line.
///
/// Redirection files are opened and the pipes between stages are created
/// here, so a returned pipeline is ready to run. On error everything opened
/// so far is closed again before returning.
///
/// The pipe on a boundary replaces any `<` or `>` a stage set on that same
/// side: `a > f | b` truncates `f` but `a` still writes into the pipe.
pub fn parse(tokens: &[String]) -> ParseResult<Pipeline> {
	if tokens.is_empty() {
		return Err(ParseError::Empty);
	}

	let segments: Vec<&[String]> = tokens.split(|t| t.as_str() == "|").collect();
	let mut stages: Vec<Stage> = Vec::with_capacity(segments.len());
	for (i, segment) in segments.iter().enumerate() {
		let mut stage = parse_stage(segment, i + 1 == segments.len())?;
		if let Some(prev) = stages.last_mut() {
			if !prev.output.is_inherit() {
				log::debug!("pipe replaces the output redirection of {}", prev.exec_name);
			}
			if !stage.input.is_inherit() {
				log::debug!("pipe replaces the input redirection of {}", stage.exec_name);
			}
			let (pipe_read, pipe_write) = unistd::pipe2(OFlag::O_CLOEXEC).map_err(ParseError::Pipe)?;
			prev.output = Descriptor::Owned(pipe_write);
			stage.input = Descriptor::Owned(pipe_read);
		}
		stages.push(stage);
	}
	Ok(Pipeline::new(stages))
}
