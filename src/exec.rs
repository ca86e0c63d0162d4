//! Running composed scripts on managed hosts.
//!
//! Any output on the diagnostic stream counts as failure, even when the
//! exit status is zero. A firewall change that printed a warning (an ssh
//! host-key notice included) is reported, never silently accepted.
//!
//! Bulk payloads travel on the transport's stdin, never in argv, so their
//! size is not bounded by the kernel's per-argument limit.

use crate::store::ServerEntry;
use crate::utils::config::SshOptions;
use crate::utils::error::{Result, RiptError, TransportFailure};
use log::debug;
use subprocess::{Exec, ExitStatus, NullFile, Redirection};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Used only to label output.
    pub label: String,
    pub address: String,
}

impl From<&ServerEntry> for Target {
    fn from(entry: &ServerEntry) -> Self {
        Target {
            label: entry.hostname.clone(),
            address: entry.ip.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub success: bool,
    /// `None` when the process did not exit normally.
    pub exit_code: Option<u32>,
    pub stdout: String,
    pub stderr: String,
}

pub trait Runner: Sync {
    /// `input` is written to the child's stdin; `None` gives it /dev/null.
    fn run(&self, label: &str, argv: &[String], input: Option<&str>) -> Result<RawOutput>;
}

pub struct SubprocessRunner;

impl Runner for SubprocessRunner {
    fn run(&self, label: &str, argv: &[String], input: Option<&str>) -> Result<RawOutput> {
        let (program, args) = argv
            .split_first()
            .ok_or_else(|| RiptError::transport(label, TransportFailure::Spawn, "empty command"))?;
        let exec = Exec::cmd(program).args(args);
        let exec = match input {
            Some(data) => exec.stdin(data),
            None => exec.stdin(NullFile),
        };
        let capture = exec
            .stdout(Redirection::Pipe)
            .stderr(Redirection::Pipe)
            .capture()
            .map_err(|e| RiptError::transport(label, TransportFailure::Spawn, e.to_string()))?;
        let exit_code = match capture.exit_status {
            ExitStatus::Exited(code) => Some(code),
            _ => None,
        };
        Ok(RawOutput {
            success: capture.exit_status.success(),
            exit_code,
            stdout: capture.stdout_str(),
            stderr: capture.stderr_str(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum Transport {
    /// `sh -c` on this machine; the target address is ignored.
    #[cfg(test)]
    Local,
    Ssh(SshOptions),
}

impl Transport {
    /// The script is always a single argv element, so nothing on this side
    /// splits or expands it.
    pub fn argv(&self, address: &str, script: &str) -> Vec<String> {
        match self {
            #[cfg(test)]
            Transport::Local => vec!["sh".to_owned(), "-c".to_owned(), script.to_owned()],
            Transport::Ssh(opts) => {
                let mut argv = vec![opts.program.clone()];
                if let Some(identity) = &opts.identity {
                    argv.push("-i".to_owned());
                    argv.push(identity.clone());
                }
                if let Some(user) = &opts.user {
                    argv.push("-l".to_owned());
                    argv.push(user.clone());
                }
                if let Some(port) = opts.port {
                    argv.push("-p".to_owned());
                    argv.push(port.to_string());
                }
                // An address starting with `-` must never parse as an option.
                argv.push("--".to_owned());
                argv.push(address.to_owned());
                argv.push(script.to_owned());
                argv
            }
        }
    }
}

pub fn classify(label: &str, raw: RawOutput) -> Result<String> {
    if !raw.success {
        let detail = match raw.stderr.trim() {
            "" => "no diagnostic output".to_owned(),
            err => err.to_owned(),
        };
        return Err(RiptError::transport(
            label,
            TransportFailure::NonZeroExit(raw.exit_code),
            detail,
        ));
    }
    if !raw.stderr.is_empty() {
        return Err(RiptError::transport(
            label,
            TransportFailure::Diagnostics,
            raw.stderr.trim(),
        ));
    }
    Ok(raw.stdout)
}

pub struct Executor<'a> {
    runner: &'a dyn Runner,
    transport: Transport,
}

impl<'a> Executor<'a> {
    pub fn new(runner: &'a dyn Runner, transport: Transport) -> Self {
        Executor { runner, transport }
    }

    pub fn execute(&self, target: &Target, script: &str) -> Result<String> {
        self.execute_with_input(target, script, None)
    }

    pub fn execute_with_input(
        &self,
        target: &Target,
        script: &str,
        input: Option<&str>,
    ) -> Result<String> {
        let argv = self.transport.argv(&target.address, script);
        debug!(
            "[{}] running {:?} with {} bytes on stdin",
            target.label,
            argv,
            input.map_or(0, str::len)
        );
        let raw = self.runner.run(&target.label, &argv, input)?;
        classify(&target.label, raw)
    }
}

/// Run `task` for every item on its own thread and collect each result
/// in item order. One host failing never stops the others.
pub fn fan_out<I, T, F>(items: &[I], task: F) -> Vec<Result<T>>
where
    I: Sync,
    T: Send,
    F: Fn(&I) -> Result<T> + Sync,
{
    let task = &task;
    std::thread::scope(|scope| {
        let handles: Vec<_> = items
            .iter()
            .map(|item| scope.spawn(move || task(item)))
            .collect();
        handles
            .into_iter()
            .map(|handle| {
                handle.join().unwrap_or_else(|_| {
                    Err(RiptError::transport(
                        "worker",
                        TransportFailure::Spawn,
                        "worker panicked",
                    ))
                })
            })
            .collect()
    })
}

#[cfg(test)]
pub mod testing {
    use super::{RawOutput, Runner};
    use crate::utils::error::Result;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Records every argv and stdin payload and answers per target address.
    #[derive(Default)]
    pub struct FakeRunner {
        calls: Mutex<Vec<Vec<String>>>,
        inputs: Mutex<Vec<Option<String>>>,
        replies: HashMap<String, RawOutput>,
    }

    impl FakeRunner {
        pub fn ok(stdout: &str) -> RawOutput {
            RawOutput {
                success: true,
                exit_code: Some(0),
                stdout: stdout.to_owned(),
                stderr: String::new(),
            }
        }

        pub fn reply(mut self, address: &str, output: RawOutput) -> Self {
            self.replies.insert(address.to_owned(), output);
            self
        }

        pub fn calls(&self) -> Vec<Vec<String>> {
            self.calls.lock().unwrap().clone()
        }

        pub fn inputs(&self) -> Vec<Option<String>> {
            self.inputs.lock().unwrap().clone()
        }
    }

    impl Runner for FakeRunner {
        fn run(&self, _label: &str, argv: &[String], input: Option<&str>) -> Result<RawOutput> {
            self.calls.lock().unwrap().push(argv.to_vec());
            self.inputs.lock().unwrap().push(input.map(str::to_owned));
            let address = &argv[argv.len() - 2];
            Ok(self
                .replies
                .get(address)
                .cloned()
                .unwrap_or_else(|| FakeRunner::ok("")))
        }
    }
}
