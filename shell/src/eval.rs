use std::ffi::CString;
use std::os::fd::RawFd;
use std::ptr;

use nix::errno::Errno;
use nix::fcntl::{self, FcntlArg, FdFlag};
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::WaitStatus;
use nix::unistd::{self, ForkResult};
use thiserror::Error;

use crate::job::Job;
use crate::types::{Pipeline, Stage};

const DIAGNOSTIC_PREFIX: &str = "pipesh";

#[derive(Debug, Error)]
pub enum ExecError {
	#[error("fork failed: {0}")]
	Fork(#[source] nix::Error),
	#[error("wait failed: {0}")]
	Wait(#[source] nix::Error),
}

/// What a child needs to replace itself with the stage's program.
///
/// Built in the parent right before forking so the child never allocates.
struct Image {
	argv: Option<Vec<CString>>,
	// NUL-terminated pointer view into `argv`, valid while `argv` is untouched
	argv_ptrs: Vec<*const libc::c_char>,
	prefix: Vec<u8>,
}

impl Image {
	fn new(stage: &Stage) -> Image {
		let argv: Option<Vec<CString>> = stage.argv.iter().map(|a| CString::new(a.as_str()).ok()).collect();
		let mut argv_ptrs: Vec<*const libc::c_char> = match argv {
			Some(ref argv) => argv.iter().map(|a| a.as_ptr()).collect(),
			None => vec![],
		};
		argv_ptrs.push(ptr::null());
		let prefix = format!("{}: {}: ", DIAGNOSTIC_PREFIX, stage.exec_name).into_bytes();
		Image { argv: argv, argv_ptrs: argv_ptrs, prefix: prefix }
	}

	fn fail(&self, reason: &str, status: libc::c_int) -> ! {
		write_stderr(&self.prefix);
		write_stderr(reason.as_bytes());
		write_stderr(b"\n");
		unsafe { libc::_exit(status) }
	}

	fn exec(&self) -> ! {
		let name = match self.argv {
			Some(ref argv) => &argv[0],
			None => self.fail("argument contains a NUL byte", 126),
		};
		unsafe { libc::execvp(name.as_ptr(), self.argv_ptrs.as_ptr()) };
		let errno = Errno::last();
		let status = if errno == Errno::ENOENT { 127 } else { 126 };
		self.fail(errno.desc(), status)
	}
}

fn write_stderr(buf: &[u8]) {
	let _ = unsafe { libc::write(libc::STDERR_FILENO, buf.as_ptr() as *const libc::c_void, buf.len()) };
}

// Puts `fd` on `target`. An fd that already is the target only loses
// close-on-exec, which dup2 would otherwise have cleared.
fn redirect(fd: RawFd, target: RawFd) -> nix::Result<()> {
	if fd == target {
		fcntl::fcntl(fd, FcntlArg::F_SETFD(FdFlag::empty()))?;
	} else {
		unistd::dup2(fd, target)?;
	}
	Ok(())
}

// Runs in the child. `stages[0]` is the stage to start; the rest still hold
// descriptors the child inherited and must not keep.
fn exec_stage(stages: &[Stage], image: &Image) -> ! {
	let stage = &stages[0];
	if let Some(fd) = stage.input.raw() {
		if let Err(e) = redirect(fd, libc::STDIN_FILENO) {
			image.fail(e.desc(), 1);
		}
	}
	if let Some(fd) = stage.output.raw() {
		if let Err(e) = redirect(fd, libc::STDOUT_FILENO) {
			image.fail(e.desc(), 1);
		}
	}
	let held = stages.iter().flat_map(|s| [s.input.raw(), s.output.raw()]).flatten();
	for fd in held.filter(|&fd: &RawFd| fd > libc::STDERR_FILENO) {
		let _ = unistd::close(fd);
	}
	// the interpreter runs with SIGPIPE ignored, and that would survive exec
	let _ = unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) };
	image.exec()
}

/// Starts one process per stage and waits for all of them.
///
/// Each child gets the stage's descriptors on its stdin/stdout; the parent
/// closes its copies right after forking, so once every child is started the
/// parent holds no pipe ends and readers see end-of-file when their writers
/// exit. Statuses come back in the order children were reaped, which says
/// nothing about which stage produced them.
///
/// A failing `exec` only ends that child. A failing `fork` is returned after
/// the children already started have been reaped.
pub fn run(pipeline: Pipeline) -> Result<Vec<WaitStatus>, ExecError> {
	let mut stages = pipeline.into_stages();
	let mut job = Job::new(stages.len());
	for i in 0 .. stages.len() {
		let image = Image::new(&stages[i]);
		match job.push_fork() {
			Ok(ForkResult::Child) => exec_stage(&stages[i ..], &image),
			Ok(ForkResult::Parent { child }) => {
				log::debug!("started {} as pid {}", stages[i].exec_name, child);
				stages[i].close_descriptors();
			},
			Err(e) => {
				drop(stages);
				log::debug!("fork failed after {} children, reaping them", job.len());
				if let Err(we) = job.wait_all() {
					log::warn!("could not reap children: {}", we);
				}
				return Err(ExecError::Fork(e));
			},
		}
	}
	job.wait_all().map_err(ExecError::Wait)
}
