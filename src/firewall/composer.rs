use crate::firewall::fragment::FragmentDir;
use crate::utils::config::{IptablesCommands, Settings};
use crate::utils::error::{Result, RiptError};
use crate::utils::shell::{and_chain, quote, split, ShellCommand};
use log::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    Flush,
    Rule { source: String },
    Persist,
    List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub kind: StepKind,
    pub command: ShellCommand,
}

/// flush, header rules, group rules in list order, footer rules, persist, list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedCommand {
    steps: Vec<Step>,
}

impl ComposedCommand {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The `&&` chain handed to the remote shell.
    pub fn render(&self) -> String {
        and_chain(self.steps.iter().map(|s| s.command.render()))
    }

    /// The chain as one quoted word, ready to paste after `ssh host`.
    pub fn quoted(&self) -> String {
        quote(&self.render()).into_owned()
    }
}

pub struct Composer<'a> {
    fragments: FragmentDir,
    header: &'a str,
    footer: &'a str,
    commands: &'a IptablesCommands,
}

impl<'a> Composer<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        Composer {
            fragments: FragmentDir::new(&settings.groups_dir),
            header: &settings.header,
            footer: &settings.footer,
            commands: &settings.iptables,
        }
    }

    fn iptables(&self, args: &[String]) -> ShellCommand {
        ShellCommand::from_tokens(&self.commands.iptables).args(args)
    }

    fn rule_steps(&self, source: &str, steps: &mut Vec<Step>) -> Result<()> {
        for line in self.fragments.load(source)? {
            let words = split(&line).map_err(|e| {
                RiptError::validation("rule", format!("{} in fragment {}: {}", e, source, line))
            })?;
            steps.push(Step {
                kind: StepKind::Rule {
                    source: source.to_owned(),
                },
                command: self.iptables(&words),
            });
        }
        Ok(())
    }

    /// Every fragment must load; a missing one fails the whole composition.
    pub fn compose(&self, groups: &[String]) -> Result<ComposedCommand> {
        let mut steps = vec![Step {
            kind: StepKind::Flush,
            command: self.iptables(&["-F".to_owned()]),
        }];
        self.rule_steps(self.header, &mut steps)?;
        for group in groups {
            self.rule_steps(group, &mut steps)?;
        }
        self.rule_steps(self.footer, &mut steps)?;
        steps.push(Step {
            kind: StepKind::Persist,
            command: ShellCommand::from_tokens(&self.commands.save)
                .stdout_to(self.commands.persist_path.as_str()),
        });
        steps.push(Step {
            kind: StepKind::List,
            command: self.iptables(&["-S".to_owned()]),
        });
        debug!("composed {} steps for groups {:?}", steps.len(), groups);
        Ok(ComposedCommand { steps })
    }
}
