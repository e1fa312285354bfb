//! System command execution.
//!
//! Every OS-level operation of the emulator (namespaces, veth pairs, OVS
//! bridges, traffic control) goes through a [`CommandRunner`]. The
//! [`SystemRunner`] executes for real; the [`RecordingRunner`] only records
//! command lines and answers with scripted output, which powers `--dry-run`
//! and the tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::process::Command;

use super::EmulationError;

/// Captured result of one command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Successful run with the given stdout
    pub fn ok(stdout: &str) -> Self {
        Self {
            success: true,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    /// Failed run with the given stderr
    pub fn failed(stderr: &str) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }
}

/// Executes external programs on behalf of the emulator
pub trait CommandRunner {
    /// Run `program` with `args`, returning its output whatever the exit status
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError>;

    /// Run and fail with stderr if the program exits non-zero
    fn run_checked(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
        let output = self.run(program, args)?;
        if !output.success {
            return Err(EmulationError::CommandFailed {
                command: command_line(program, args),
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}

/// Render a program and its arguments as a single line
pub fn command_line(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Run a cleanup step whose failure is expected
///
/// A non-zero exit is ignored. A program that cannot be spawned at all is
/// logged, so a missing tool shows up before the checked call that follows.
pub fn run_best_effort(runner: &dyn CommandRunner, program: &str, args: &[&str]) {
    match runner.run(program, args) {
        Ok(output) if !output.success => {
            log::trace!("`{}` exited non-zero: {}", command_line(program, args), output.stderr.trim())
        }
        Ok(_) => {}
        Err(e) => log::debug!("Best-effort `{}` failed: {}", command_line(program, args), e),
    }
}

/// Runs commands on the local machine, optionally through `sudo`
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    use_sudo: bool,
}

impl SystemRunner {
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
        let mut command = if self.use_sudo {
            let mut c = Command::new("sudo");
            c.arg(program);
            c
        } else {
            Command::new(program)
        };
        command.args(args);

        log::trace!("exec: {}", command_line(program, args));

        let output = command.output().map_err(|source| EmulationError::Spawn {
            command: command_line(program, args),
            source,
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Scripted replies for command lines containing `needle`
#[derive(Debug)]
struct Scripted {
    needle: String,
    replies: VecDeque<CommandOutput>,
}

/// Records command lines instead of executing them
///
/// Commands succeed with empty output unless a reply was scripted with
/// [`RecordingRunner::reply`]. Replies for one needle are consumed in order;
/// the last one repeats.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<String>>,
    scripted: RefCell<Vec<Scripted>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `output` for the next command line containing `needle`
    pub fn reply(&self, needle: &str, output: CommandOutput) {
        let mut scripted = self.scripted.borrow_mut();
        match scripted.iter_mut().find(|s| s.needle == needle) {
            Some(entry) => entry.replies.push_back(output),
            None => scripted.push(Scripted {
                needle: needle.to_string(),
                replies: VecDeque::from([output]),
            }),
        }
    }

    /// All command lines seen so far
    pub fn commands(&self) -> Vec<String> {
        self.commands.borrow().clone()
    }

    /// Number of recorded command lines containing `needle`
    pub fn count(&self, needle: &str) -> usize {
        self.commands.borrow().iter().filter(|c| c.contains(needle)).count()
    }

    /// Index of the first recorded command line containing `needle`
    pub fn position(&self, needle: &str) -> Option<usize> {
        self.commands.borrow().iter().position(|c| c.contains(needle))
    }

    /// Forget recorded command lines, keeping scripted replies
    pub fn clear(&self) {
        self.commands.borrow_mut().clear();
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutput, EmulationError> {
        let line = command_line(program, args);
        self.commands.borrow_mut().push(line.clone());

        let mut scripted = self.scripted.borrow_mut();
        let reply = scripted
            .iter_mut()
            .find(|s| line.contains(&s.needle))
            .and_then(|s| {
                if s.replies.len() > 1 {
                    s.replies.pop_front()
                } else {
                    s.replies.front().cloned()
                }
            });

        Ok(reply.unwrap_or_else(|| CommandOutput::ok("")))
    }
}
