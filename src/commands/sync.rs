use crate::commands::Context;
use crate::exec::{fan_out, Executor, Target, Transport};
use crate::firewall::apply::{fingerprint, parse_report, snapshot_script, ApplyOutcome, RemoteApplyScript};
use crate::store::{validate_hostname, Query, RecordStore};
use crate::utils::error::{Result, RiptError};
use crate::utils::tools::format_output;
use log::{error, info};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// A host argument naming a stored hostname is reached at its stored IP.
fn resolve_host(store: &dyn RecordStore, host: &str) -> Result<Target> {
    validate_hostname(host)?;
    let known = store
        .find(&Query::term(host))?
        .into_iter()
        .find(|e| e.hostname == host);
    Ok(match known {
        Some(entry) => Target::from(&entry),
        None => Target {
            label: host.to_owned(),
            address: host.to_owned(),
        },
    })
}

/// Explicit hosts, then every entry holding `group`, optionally narrowed
/// to the whitelist. Duplicates by address are dropped.
pub fn resolve_targets(
    store: &dyn RecordStore,
    hosts: &[String],
    group: Option<&str>,
    whitelist: &[String],
) -> Result<Vec<Target>> {
    let mut targets = Vec::new();
    for host in hosts {
        targets.push(resolve_host(store, host)?);
    }
    if let Some(group) = group {
        for entry in store.find(&Query::term(group))? {
            if entry.groups.iter().any(|g| g == group) {
                targets.push(Target::from(&entry));
            }
        }
    }
    if !whitelist.is_empty() {
        targets.retain(|t| whitelist.iter().any(|w| *w == t.label || *w == t.address));
    }
    let mut seen = Vec::new();
    targets.retain(|t| {
        if seen.contains(&t.address) {
            false
        } else {
            seen.push(t.address.clone());
            true
        }
    });
    if targets.is_empty() {
        return Err(RiptError::Input("no target hosts".to_owned()));
    }
    Ok(targets)
}

pub fn export(ctx: &mut Context, host: &str, output: Option<&Path>) -> Result<String> {
    let target = resolve_host(ctx.store, host)?;
    let executor = Executor::new(ctx.runner, Transport::Ssh(ctx.settings.ssh.clone()));
    let rules = executor.execute(&target, &snapshot_script(&ctx.settings.iptables))?;
    match output {
        Some(path) => {
            fs::write(path, &rules)?;
            Ok(format!("Exported {} rules to {}", target.label, path.display()))
        }
        None => {
            for line in format_output(&target.label, &rules) {
                println!("{}", line);
            }
            Ok(format!("Exported {} rules", target.label))
        }
    }
}

pub fn apply(
    ctx: &mut Context,
    rules: &Path,
    hosts: &[String],
    group: Option<&str>,
    whitelist: &[String],
) -> Result<String> {
    let desired = fs::read_to_string(rules).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RiptError::NotFound(format!("rule set {}", rules.display())),
        _ => RiptError::Io(e),
    })?;
    let targets = resolve_targets(ctx.store, hosts, group, whitelist)?;
    info!(
        "Applying {} (sha1 {}) to {} hosts",
        rules.display(),
        fingerprint(&desired),
        targets.len()
    );

    let settings = ctx.settings;
    let apply = RemoteApplyScript::new(&desired, &settings.remote, &settings.iptables, settings.verbose);
    let script = apply.render();
    let executor = Executor::new(ctx.runner, Transport::Ssh(settings.ssh.clone()));
    let results = fan_out(&targets, |target| {
        executor
            .execute_with_input(target, &script, Some(apply.payload()))
            .and_then(|out| parse_report(&target.label, &out))
    });

    let (mut applied, mut unchanged, mut failed) = (0, 0, 0);
    for (target, result) in targets.iter().zip(results) {
        match result {
            Ok(ApplyOutcome::NoOp) => {
                unchanged += 1;
                println!("[{}]: no update needed", target.label);
            }
            Ok(ApplyOutcome::Applied { diff }) => {
                applied += 1;
                println!("[{}]: updated", target.label);
                if let Some(diff) = diff {
                    for line in format_output(&target.label, &diff) {
                        println!("{}", line);
                    }
                }
            }
            Err(e) => {
                failed += 1;
                error!("{}", e);
            }
        }
    }
    Ok(format!(
        "{} updated, {} unchanged, {} failed",
        applied, unchanged, failed
    ))
}
