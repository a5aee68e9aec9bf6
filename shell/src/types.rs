use std::fmt;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Direction { Input, Output }

impl fmt::Display for Direction {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match *self {
			Direction::Input => f.write_str("reading"),
			Direction::Output => f.write_str("writing"),
		}
	}
}

/// Where a stage's standard input or output comes from.
///
/// `Inherit` keeps the interpreter's own stream; `Owned` is a redirection file
/// or pipe end that belongs to the stage until it is handed to the child.
#[derive(Debug, Default)]
pub enum Descriptor {
	#[default]
	Inherit,
	Owned(OwnedFd),
}

impl Descriptor {
	pub fn raw(&self) -> Option<RawFd> {
		match *self {
			Descriptor::Inherit => None,
			Descriptor::Owned(ref fd) => Some(fd.as_raw_fd()),
		}
	}

	pub fn is_inherit(&self) -> bool {
		matches!(*self, Descriptor::Inherit)
	}
}

impl fmt::Display for Descriptor {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		match self.raw() {
			None => f.write_str("inherit"),
			Some(fd) => write!(f, "{}", fd),
		}
	}
}

/// One program invocation of a pipeline.
#[derive(Debug)]
pub struct Stage {
	pub exec_name: String,
	/// Owned arguments; `argv[0]` is always `exec_name`.
	pub argv: Vec<String>,
	pub input: Descriptor,
	pub output: Descriptor,
	/// Set by a trailing `&`. Recorded only; pipelines always run in the foreground.
	pub background: bool,
}

impl Stage {
	pub fn new(exec_name: &str) -> Stage {
		Stage {
			exec_name: exec_name.to_owned(),
			argv: vec![exec_name.to_owned()],
			input: Descriptor::Inherit,
			output: Descriptor::Inherit,
			background: false,
		}
	}

	/// Drops both descriptors, closing them in this process.
	pub fn close_descriptors(&mut self) {
		self.input = Descriptor::Inherit;
		self.output = Descriptor::Inherit;
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{} [argv: {}] -- fd in: {}, out: {} ({})",
		       self.exec_name,
		       self.argv.join(" "),
		       self.input,
		       self.output,
		       if self.background { "background" } else { "foreground" })
	}
}

/// A non-empty sequence of stages joined by pipes.
#[derive(Debug)]
pub struct Pipeline {
	stages: Vec<Stage>,
}

impl Pipeline {
	pub(crate) fn new(stages: Vec<Stage>) -> Pipeline {
		assert!(!stages.is_empty());
		Pipeline { stages: stages }
	}

	pub fn stages(&self) -> &[Stage] {
		&self.stages
	}

	pub fn len(&self) -> usize {
		self.stages.len()
	}

	pub fn is_background(&self) -> bool {
		self.stages.iter().any(|s| s.background)
	}

	pub fn into_stages(self) -> Vec<Stage> {
		self.stages
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs::File;

	#[test]
	fn new_stage_inherits_both_streams() {
		let stage = Stage::new("ls");
		assert_eq!(stage.argv, vec!["ls"]);
		assert!(stage.input.is_inherit());
		assert!(stage.output.is_inherit());
		assert!(!stage.background);
	}

	#[test]
	fn display_shows_argv_and_descriptors() {
		let mut stage = Stage::new("wc");
		stage.argv.push("-l".to_owned());
		stage.background = true;
		assert_eq!(stage.to_string(), "wc [argv: wc -l] -- fd in: inherit, out: inherit (background)");

		let file = File::open("/dev/null").unwrap();
		stage.output = Descriptor::Owned(OwnedFd::from(file));
		let fd = stage.output.raw().unwrap();
		assert_eq!(stage.to_string(), format!("wc [argv: wc -l] -- fd in: inherit, out: {} (background)", fd));
	}

	#[test]
	fn close_descriptors_resets_to_inherit() {
		let mut stage = Stage::new("cat");
		stage.input = Descriptor::Owned(OwnedFd::from(File::open("/dev/null").unwrap()));
		stage.close_descriptors();
		assert!(stage.input.is_inherit());
		assert_eq!(stage.input.raw(), None);
	}

	#[test]
	fn background_if_any_stage_is() {
		let mut last = Stage::new("nl");
		let pipeline = Pipeline::new(vec![Stage::new("ls")]);
		assert!(!pipeline.is_background());
		last.background = true;
		let pipeline = Pipeline::new(vec![Stage::new("ls"), last]);
		assert!(pipeline.is_background());
		assert_eq!(pipeline.len(), 2);
	}

	#[test]
	#[should_panic]
	fn empty_pipeline_is_rejected() {
		Pipeline::new(vec![]);
	}
}
