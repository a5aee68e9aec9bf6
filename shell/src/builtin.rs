use std::env;
use std::path::PathBuf;

use nix::unistd;

/// Whether the read-eval loop keeps going after a builtin.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Flow { Continue, Exit }

pub type Builtin = fn(&[String]) -> Flow;

pub fn builtin_cd(args: &[String]) -> Flow {
	let target = match args.get(1) {
		Some(dir) => PathBuf::from(dir),
		None => match env::var_os("HOME") {
			Some(home) => PathBuf::from(home),
			None => {
				eprintln!("pipesh: cd: HOME not set");
				return Flow::Continue;
			},
		},
	};
	match unistd::chdir(target.as_path()) {
		Ok(()) => log::debug!("cwd is now {}", target.display()),
		Err(e) => eprintln!("pipesh: cd: {}: {}", target.display(), e.desc()),
	}
	Flow::Continue
}

pub fn builtin_exit(_: &[String]) -> Flow {
	Flow::Exit
}

/// Looks up a builtin by the first word of a line.
pub fn match_builtin(name: &str) -> Option<Builtin> {
	match name {
		"cd" => Some(builtin_cd),
		"exit" => Some(builtin_exit),
		_ => None,
	}
}
