//! Check-before-apply of a whole rule set on one host.
//!
//! The remote script stages the desired rules from its stdin, snapshots the live rules
//! with comments dropped and counters zeroed, and restores the desired
//! set only when the two differ. The last stdout line names the branch.

use crate::utils::config::{IptablesCommands, RemotePaths};
use crate::utils::error::{Result, RiptError, TransportFailure};
use crate::utils::shell::{and_chain, pipeline, ShellCommand};
use sha1::{Digest, Sha1};

const STATE_MARKER: &str = "RIPT_STATE=";
const NO_OP: &str = "NO_OP";
const APPLIED: &str = "APPLIED";

/// `iptables-save` with comment lines removed and `[packets:bytes]`
/// counters zeroed, so two snapshots of the same policy compare equal.
pub fn snapshot_commands(commands: &IptablesCommands) -> Vec<ShellCommand> {
    vec![
        ShellCommand::from_tokens(&commands.save),
        ShellCommand::new("grep").arg("-v").arg("^#"),
        ShellCommand::new("sed")
            .arg("-e")
            .arg(r"s/\[[0-9]*:[0-9]*\]/[0:0]/g"),
    ]
}

pub fn snapshot_script(commands: &IptablesCommands) -> String {
    pipeline(&snapshot_commands(commands))
}

pub fn fingerprint(content: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    NoOp,
    Applied { diff: Option<String> },
}

pub struct RemoteApplyScript<'a> {
    desired: &'a str,
    paths: &'a RemotePaths,
    commands: &'a IptablesCommands,
    verbose: bool,
}

impl<'a> RemoteApplyScript<'a> {
    pub fn new(
        desired: &'a str,
        paths: &'a RemotePaths,
        commands: &'a IptablesCommands,
        verbose: bool,
    ) -> Self {
        RemoteApplyScript {
            desired,
            paths,
            commands,
            verbose,
        }
    }

    /// The desired rules, to be fed to the script on stdin.
    pub fn payload(&self) -> &'a str {
        self.desired
    }

    /// Copy stdin to the desired path byte for byte.
    fn stage(&self) -> String {
        ShellCommand::new("cat")
            .stdout_to(self.paths.desired.as_str())
            .render()
    }

    fn snapshot(&self) -> String {
        let mut commands = snapshot_commands(self.commands);
        if let Some(last) = commands.pop() {
            commands.push(last.stdout_to(self.paths.current.as_str()));
        }
        pipeline(&commands)
    }

    /// diff exit status 0 means equal, 1 different, anything else is an error.
    fn compare_and_apply(&self) -> String {
        let compare = ShellCommand::new("diff")
            .arg("-q")
            .arg(self.paths.current.as_str())
            .arg(self.paths.desired.as_str())
            .stdout_to("/dev/null");
        let show = if self.verbose {
            let diff = ShellCommand::new("diff")
                .arg("-u")
                .arg(self.paths.current.as_str())
                .arg(self.paths.desired.as_str());
            format!("{}; ", diff.render())
        } else {
            String::new()
        };
        let restore =
            ShellCommand::from_tokens(&self.commands.restore).stdin_from(self.paths.desired.as_str());
        format!(
            "{{ {compare}; rc=$?; if [ \"$rc\" -eq 0 ]; then echo {m}{noop}; \
             elif [ \"$rc\" -eq 1 ]; then {show}{restore} && echo {m}{applied}; \
             else exit \"$rc\"; fi; }}",
            compare = compare.render(),
            m = STATE_MARKER,
            noop = NO_OP,
            show = show,
            restore = restore.render(),
            applied = APPLIED,
        )
    }

    pub fn render(&self) -> String {
        and_chain([self.stage(), self.snapshot(), self.compare_and_apply()])
    }
}

/// Read the branch the remote script took from its stdout. Lines before
/// the marker are the diff body when verbose output was requested.
pub fn parse_report(host: &str, stdout: &str) -> Result<ApplyOutcome> {
    let lines: Vec<&str> = stdout.lines().collect();
    let pos = lines
        .iter()
        .rposition(|l| l.trim().starts_with(STATE_MARKER))
        .ok_or_else(|| {
            RiptError::transport(host, TransportFailure::NoReport, "remote script reported no state")
        })?;
    match lines[pos].trim().trim_start_matches(STATE_MARKER) {
        NO_OP => Ok(ApplyOutcome::NoOp),
        APPLIED => {
            let body = lines[..pos].join("\n");
            Ok(ApplyOutcome::Applied {
                diff: if body.trim().is_empty() { None } else { Some(body) },
            })
        }
        other => Err(RiptError::transport(
            host,
            TransportFailure::NoReport,
            format!("unknown state {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{Executor, SubprocessRunner, Target, Transport};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const LIVE: &str = "# Generated by iptables-save v1.8.7 on Mon Oct 12 10:00:00 2026\n\
                        *filter\n\
                        :INPUT DROP [1520:203441]\n\
                        :FORWARD DROP [0:0]\n\
                        :OUTPUT ACCEPT [880:99120]\n\
                        -A INPUT -p tcp -m tcp --dport 22 -j ACCEPT\n\
                        COMMIT\n\
                        # Completed on Mon Oct 12 10:00:00 2026\n";

    const SAME_POLICY: &str = "*filter\n\
                               :INPUT DROP [0:0]\n\
                               :FORWARD DROP [0:0]\n\
                               :OUTPUT ACCEPT [0:0]\n\
                               -A INPUT -p tcp -m tcp --dport 22 -j ACCEPT\n\
                               COMMIT\n";

    const NEW_POLICY: &str = "*filter\n\
                              :INPUT DROP [0:0]\n\
                              :FORWARD DROP [0:0]\n\
                              :OUTPUT ACCEPT [0:0]\n\
                              -A INPUT -p tcp -m tcp --dport 22 -j ACCEPT\n\
                              -A INPUT -p tcp -m tcp --dport 443 -j ACCEPT\n\
                              COMMIT\n";

    /// Stand-ins for iptables-save / iptables-restore backed by files in a
    /// temp dir: `live` is what save prints, `restored` collects restores.
    struct Host {
        dir: TempDir,
        paths: RemotePaths,
        commands: IptablesCommands,
    }

    impl Host {
        fn new(live: &str) -> Host {
            let dir = tempfile::tempdir().unwrap();
            let p = |name: &str| dir.path().join(name).display().to_string();
            fs::write(dir.path().join("live"), live).unwrap();
            let paths = RemotePaths {
                current: p("current rules"),
                desired: p("desired rules"),
            };
            let commands = IptablesCommands {
                save: vec!["cat".to_owned(), p("live")],
                restore: vec![
                    "sh".to_owned(),
                    "-c".to_owned(),
                    "cat >> \"$1\"".to_owned(),
                    "restore".to_owned(),
                    p("restored"),
                ],
                ..IptablesCommands::default()
            };
            Host {
                dir,
                paths,
                commands,
            }
        }

        fn run(&self, desired: &str, verbose: bool) -> Result<ApplyOutcome> {
            let script = RemoteApplyScript::new(desired, &self.paths, &self.commands, verbose);
            let exec = Executor::new(&SubprocessRunner, Transport::Local);
            let target = Target {
                label: "test".to_owned(),
                address: "localhost".to_owned(),
            };
            let out = exec.execute_with_input(&target, &script.render(), Some(script.payload()))?;
            parse_report("test", &out)
        }

        fn file(&self, name: &str) -> Option<String> {
            fs::read_to_string(self.dir.path().join(name)).ok()
        }
    }

    #[test]
    fn identical_policy_is_a_no_op() {
        let host = Host::new(LIVE);
        assert_eq!(host.run(SAME_POLICY, false).unwrap(), ApplyOutcome::NoOp);
        assert_eq!(host.file("restored"), None);
        assert_eq!(host.file("current rules").unwrap(), SAME_POLICY);
    }

    #[test]
    fn differing_policy_restores_once_from_desired() {
        let host = Host::new(LIVE);
        assert_eq!(
            host.run(NEW_POLICY, false).unwrap(),
            ApplyOutcome::Applied { diff: None }
        );
        assert_eq!(host.file("restored").unwrap(), NEW_POLICY);
    }

    #[test]
    fn verbose_apply_reports_diff() {
        let host = Host::new(LIVE);
        match host.run(NEW_POLICY, true).unwrap() {
            ApplyOutcome::Applied { diff: Some(diff) } => {
                assert!(diff.contains("+-A INPUT -p tcp -m tcp --dport 443 -j ACCEPT"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(host.file("restored").unwrap(), NEW_POLICY);
    }

    #[test]
    fn staged_content_round_trips_byte_for_byte() {
        let tricky = "\n\nline with 'single' and \"double\" quotes\n$HOME `id` $(reboot) \\ %s %%\n\ttab;|&<>*?!\n\n\n";
        let host = Host::new(LIVE);
        host.run(tricky, false).unwrap();
        assert_eq!(host.file("desired rules").unwrap(), tricky);
        assert_eq!(host.file("restored").unwrap(), tricky);
    }

    #[test]
    fn large_rule_set_is_staged_whole() {
        let mut desired = String::from("*filter\n:INPUT DROP [0:0]\n");
        for port in 0..6000 {
            desired.push_str(&format!("-A INPUT -p tcp -m tcp --dport {} -j ACCEPT\n", 10000 + port));
        }
        desired.push_str("COMMIT\n");
        assert!(desired.len() > 256 * 1024);
        let host = Host::new(LIVE);
        assert_eq!(
            host.run(&desired, false).unwrap(),
            ApplyOutcome::Applied { diff: None }
        );
        assert_eq!(host.file("desired rules").unwrap(), desired);
        assert_eq!(host.file("restored").unwrap(), desired);
    }

    #[test]
    fn failed_snapshot_stops_before_compare() {
        let mut host = Host::new(LIVE);
        // The snapshot cannot be written, so nothing after it may run.
        host.paths.current = Path::new("/nonexistent/dir/current").display().to_string();
        let result = host.run(SAME_POLICY, false);
        assert!(matches!(result, Err(RiptError::Transport { .. })));
        assert_eq!(host.file("restored"), None);
    }

    #[test]
    fn report_parsing() {
        assert_eq!(parse_report("h", "RIPT_STATE=NO_OP\n").unwrap(), ApplyOutcome::NoOp);
        assert_eq!(
            parse_report("h", "--- a\n+++ b\nRIPT_STATE=APPLIED\n").unwrap(),
            ApplyOutcome::Applied {
                diff: Some("--- a\n+++ b".to_owned())
            }
        );
        assert!(matches!(
            parse_report("h", "something else\n"),
            Err(RiptError::Transport { kind: TransportFailure::NoReport, .. })
        ));
    }

    #[test]
    fn script_shape() {
        let paths = RemotePaths::default();
        let commands = IptablesCommands::default();
        let apply = RemoteApplyScript::new("*filter\nCOMMIT\n", &paths, &commands, false);
        assert_eq!(apply.payload(), "*filter\nCOMMIT\n");
        let script = apply.render();
        assert!(script.starts_with("cat > /tmp/ript.desired.rules && "));
        assert!(!script.contains("COMMIT"));
        assert!(script.contains(
            "iptables-save | grep -v '^#' | sed -e 's/\\[[0-9]*:[0-9]*\\]/[0:0]/g' > /tmp/ript.current.rules && "
        ));
        assert_eq!(script.matches("iptables-restore < /tmp/ript.desired.rules").count(), 1);
    }

    #[test]
    fn fingerprint_is_sha1_hex() {
        assert_eq!(fingerprint(""), "da39a3ee5e6b4b0d3255bfef95601890afd80709");
    }
}
