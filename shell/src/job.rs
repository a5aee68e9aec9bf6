use nix::errno::Errno;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, ForkResult, Pid};

pub trait WaitStatusExt {
	fn describe(self) -> String;
}

impl WaitStatusExt for WaitStatus {
	fn describe(self) -> String {
		match self {
			WaitStatus::Exited(pid, code) => format!("pid {} exited with status {}", pid, code),
			WaitStatus::Signaled(pid, sig, core) => {
				format!("pid {} killed by {:?}{}", pid, sig, if core { " (core dumped)" } else { "" })
			},
			other => format!("{:?}", other),
		}
	}
}

/// The children started for one pipeline.
///
/// Reaping is not tied to particular pids: `wait_all` blocks
/// once per started child for whichever child finishes next.
#[derive(Debug)]
pub struct Job {
	started: Vec<Pid>,
}

impl Job {
	pub fn new(size_hint: usize) -> Job {
		Job { started: Vec::with_capacity(size_hint) }
	}

	/// Forks, remembering the child in the parent.
	///
	/// The caller's child branch must stick to async-signal-safe calls until
	/// it execs or exits.
	pub fn push_fork(&mut self) -> nix::Result<ForkResult> {
		let r = unsafe { unistd::fork() }?;
		if let ForkResult::Parent { child } = r {
			self.started.push(child);
		}
		Ok(r)
	}

	pub fn len(&self) -> usize {
		self.started.len()
	}

	pub fn wait_all(self) -> nix::Result<Vec<WaitStatus>> {
		let mut statuses = Vec::with_capacity(self.started.len());
		while statuses.len() < self.started.len() {
			match wait::wait() {
				Ok(status) => {
					log::debug!("{}", status.describe());
					statuses.push(status);
				},
				Err(Errno::EINTR) => continue,
				Err(e) => return Err(e),
			}
		}
		Ok(statuses)
	}
}
