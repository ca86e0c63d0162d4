use crate::commands::Context;
use crate::exec::{fan_out, Executor, Target, Transport};
use crate::firewall::composer::Composer;
use crate::store::{Query, ServerEntry};
use crate::utils::error::{Result, RiptError};
use crate::utils::tools::{ask_selection, display_results, format_output, yes_no, Selection};
use log::{debug, error};

pub fn generate(ctx: &mut Context, term: Option<&str>) -> Result<String> {
    println!("Generating iptables commands for server: ");
    let results = ctx.store.find(&Query::from_arg(term))?;
    display_results(&results);
    if results.is_empty() {
        return Ok("Nothing generated".to_owned());
    }
    let entry = match ask_selection(ctx.prompt, results.len(), false)? {
        Selection::One(i) => &results[i],
        Selection::All => return Err(RiptError::Input("Invalid selection".to_owned())),
    };
    let composed = Composer::new(ctx.settings).compose(&entry.groups)?;
    println!("{}", composed.quoted());
    Ok(format!("Generated {} steps for {}", composed.steps().len(), entry.hostname))
}

/// Compose and push each entry's rule set over ssh, one thread per host.
pub fn push_rules(ctx: &Context, entries: &[ServerEntry]) -> Vec<(Target, Result<String>)> {
    let composer = Composer::new(ctx.settings);
    let executor = Executor::new(ctx.runner, Transport::Ssh(ctx.settings.ssh.clone()));
    let results = fan_out(entries, |entry| {
        let target = Target::from(entry);
        let composed = composer.compose(&entry.groups)?;
        let output = executor.execute(&target, &composed.render());
        debug!("[{}] update finished", target.label);
        output
    });
    entries.iter().map(Target::from).zip(results).collect()
}

pub fn update(ctx: &mut Context, term: Option<&str>) -> Result<String> {
    println!("Select server(s) to apply iptables update");
    let results = ctx.store.find(&Query::from_arg(term))?;
    display_results(&results);
    if results.is_empty() {
        return Ok("No servers updated".to_owned());
    }
    let selection = ask_selection(ctx.prompt, results.len(), true)?;
    if !yes_no(ctx.prompt, "confirm applying iptables update")? {
        return Ok("No servers updated".to_owned());
    }
    let entries = selection.pick(&results);
    let reports = push_rules(ctx, &entries);
    let mut updated = 0;
    for (target, result) in &reports {
        match result {
            Ok(output) => {
                updated += 1;
                for line in format_output(&target.label, output) {
                    println!("{}", line);
                }
                println!();
            }
            Err(e) => error!("{}", e),
        }
    }
    Ok(format!("Updated {} of {} servers", updated, reports.len()))
}
