use crate::commands::Action;
use crate::utils::config::Overrides;
use crate::utils::error::{Result, RiptError};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;

fn term_arg() -> Arg<'static> {
    Arg::new("term")
        .takes_value(true)
        .help("Hostname fragment, exact IP or group name to match")
}

pub fn command() -> Command<'static> {
    Command::new("ript")
        .version("1.1.0")
        .about("Keeps iptables rule sets consistent across a fleet of hosts")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .takes_value(true)
                .global(true)
                .help("Settings file (default ./ript.json)"),
        )
        .arg(
            Arg::new("db")
                .long("db")
                .takes_value(true)
                .global(true)
                .help("Server record file"),
        )
        .arg(
            Arg::new("groups-dir")
                .long("groups-dir")
                .takes_value(true)
                .global(true)
                .help("Directory holding security group fragments"),
        )
        .arg(
            Arg::new("log-dir")
                .long("log-dir")
                .takes_value(true)
                .global(true)
                .help("Directory for run logs"),
        )
        .arg(
            Arg::new("identity")
                .short('i')
                .long("identity")
                .takes_value(true)
                .global(true)
                .help("ssh identity file"),
        )
        .arg(
            Arg::new("user")
                .short('l')
                .long("user")
                .takes_value(true)
                .global(true)
                .help("ssh login user"),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .takes_value(true)
                .global(true)
                .value_parser(value_parser!(u16))
                .help("ssh port"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Debug logging and rule diffs on apply"),
        )
        .subcommand(
            Command::new("show")
                .about("List server entries")
                .arg(term_arg()),
        )
        .subcommand(
            Command::new("generate")
                .about("Print the iptables commands for one server")
                .arg(term_arg()),
        )
        .subcommand(Command::new("create").about("Add a server entry"))
        .subcommand(
            Command::new("edit")
                .about("Change a server entry")
                .arg(term_arg()),
        )
        .subcommand(
            Command::new("delete")
                .about("Delete server entries")
                .arg(term_arg()),
        )
        .subcommand(
            Command::new("assign")
                .about("Add a security group to server entries")
                .arg(term_arg()),
        )
        .subcommand(
            Command::new("remove")
                .about("Remove a security group from server entries")
                .arg(term_arg()),
        )
        .subcommand(
            Command::new("import")
                .about("Add server entries from a file of `hostname ip groups...` lines")
                .arg(Arg::new("file").required(true).takes_value(true))
                .arg(
                    Arg::new("overwrite")
                        .short('o')
                        .long("overwrite")
                        .action(ArgAction::SetTrue)
                        .help("Delete every existing entry first"),
                ),
        )
        .subcommand(
            Command::new("update")
                .about("Push composed rules to servers over ssh")
                .arg(term_arg()),
        )
        .subcommand(
            Command::new("export")
                .about("Fetch the live rule set of a host")
                .arg(Arg::new("host").required(true).takes_value(true))
                .arg(
                    Arg::new("output")
                        .long("output")
                        .takes_value(true)
                        .help("Write the rules here instead of printing them"),
                ),
        )
        .subcommand(
            Command::new("apply")
                .about("Restore a saved rule set on hosts whose live rules differ")
                .arg(
                    Arg::new("rules")
                        .short('r')
                        .long("rules")
                        .required(true)
                        .takes_value(true)
                        .help("iptables-save formatted rule file"),
                )
                .arg(
                    Arg::new("group")
                        .short('g')
                        .long("group")
                        .takes_value(true)
                        .help("Also target every server holding this group"),
                )
                .arg(
                    Arg::new("whitelist")
                        .short('w')
                        .long("whitelist")
                        .takes_value(true)
                        .help("Comma separated hostnames or IPs; only these are touched"),
                )
                .arg(
                    Arg::new("hosts")
                        .takes_value(true)
                        .multiple_values(true)
                        .help("Hostnames or addresses"),
                ),
        )
}

fn string(matches: &ArgMatches, id: &str) -> Option<String> {
    matches.get_one::<String>(id).cloned()
}

fn flag(matches: &ArgMatches, id: &str) -> bool {
    matches.get_one::<bool>(id).copied().unwrap_or(false)
}

fn split_list(value: Option<String>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

/// Global options may sit on either side of the subcommand name.
pub fn overrides(levels: &[&ArgMatches]) -> Overrides {
    let pick = |id: &str| levels.iter().find_map(|m| string(m, id));
    Overrides {
        config: pick("config").map(PathBuf::from),
        db_path: pick("db").map(PathBuf::from),
        groups_dir: pick("groups-dir").map(PathBuf::from),
        log_dir: pick("log-dir").map(PathBuf::from),
        identity: pick("identity"),
        user: pick("user"),
        port: levels.iter().find_map(|m| m.get_one::<u16>("port").copied()),
        verbose: levels.iter().any(|m| flag(m, "verbose")),
    }
}

pub fn parse(matches: &ArgMatches) -> Result<(Action, Overrides)> {
    let action = match matches.subcommand() {
        Some(("show", cmd)) => Action::Show {
            term: string(cmd, "term"),
        },
        Some(("generate", cmd)) => Action::Generate {
            term: string(cmd, "term"),
        },
        Some(("create", _)) => Action::Create,
        Some(("edit", cmd)) => Action::Edit {
            term: string(cmd, "term"),
        },
        Some(("delete", cmd)) => Action::Delete {
            term: string(cmd, "term"),
        },
        Some(("assign", cmd)) => Action::Assign {
            term: string(cmd, "term"),
        },
        Some(("remove", cmd)) => Action::Remove {
            term: string(cmd, "term"),
        },
        Some(("import", cmd)) => Action::Import {
            file: string(cmd, "file")
                .map(PathBuf::from)
                .ok_or_else(|| RiptError::Input("import needs a file".to_owned()))?,
            overwrite: flag(cmd, "overwrite"),
        },
        Some(("update", cmd)) => Action::Update {
            term: string(cmd, "term"),
        },
        Some(("export", cmd)) => Action::Export {
            host: string(cmd, "host")
                .ok_or_else(|| RiptError::Input("export needs a host".to_owned()))?,
            output: string(cmd, "output").map(PathBuf::from),
        },
        Some(("apply", cmd)) => Action::Apply {
            rules: string(cmd, "rules")
                .map(PathBuf::from)
                .ok_or_else(|| RiptError::Input("apply needs --rules".to_owned()))?,
            hosts: cmd
                .get_many::<String>("hosts")
                .map(|hosts| hosts.cloned().collect())
                .unwrap_or_default(),
            group: string(cmd, "group"),
            whitelist: split_list(string(cmd, "whitelist")),
        },
        Some((other, _)) => return Err(RiptError::Input(format!("unknown command {}", other))),
        None => return Err(RiptError::Input("no command given".to_owned())),
    };
    let levels = match matches.subcommand() {
        Some((_, cmd)) => vec![cmd, matches],
        None => vec![matches],
    };
    Ok((action, overrides(&levels)))
}
