use crate::commands::Context;
use crate::store::{
    parse_groups, validate_hostname, validate_ip, NewServer, Query, ServerEntry,
};
use crate::utils::error::{Result, RiptError};
use crate::utils::tools::{ask_selection, ask_validated, display_results, yes_no, Selection};
use log::{info, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

pub fn show(ctx: &mut Context, term: Option<&str>) -> Result<String> {
    println!("Showing server results: ");
    let results = ctx.store.find(&Query::from_arg(term))?;
    display_results(&results);
    Ok(format!("Found {} server entries", results.len()))
}

pub fn create(ctx: &mut Context) -> Result<String> {
    println!("Add a new server:");
    let hostname = ask_validated(ctx.prompt, "hostname", |s| validate_hostname(s).map(str::to_owned))?;
    let ip = ask_validated(ctx.prompt, "IP", |s| validate_ip(s).map(str::to_owned))?;
    let groups = ask_validated(ctx.prompt, "groups", parse_groups)?;
    let entry = ctx.store.insert(NewServer::new(&hostname, &ip, groups)?)?;
    info!("Created {}", entry);
    Ok("New server entry added".to_owned())
}

/// Blank answers keep the current value.
fn optional<T, F>(validate: F) -> impl Fn(&str) -> Result<Option<T>>
where
    F: Fn(&str) -> Result<T>,
{
    move |s: &str| {
        if s.is_empty() {
            Ok(None)
        } else {
            validate(s).map(Some)
        }
    }
}

pub fn edit(ctx: &mut Context, term: Option<&str>) -> Result<String> {
    let results = ctx.store.find(&Query::from_arg(term))?;
    display_results(&results);
    if results.is_empty() {
        return Ok("No changes made".to_owned());
    }
    let mut entry = match ask_selection(ctx.prompt, results.len(), false)? {
        Selection::One(i) => results[i].clone(),
        Selection::All => return Err(RiptError::Input("Invalid selection".to_owned())),
    };
    let hostname = ask_validated(
        ctx.prompt,
        "new hostname",
        optional(|s| validate_hostname(s).map(str::to_owned)),
    )?;
    let ip = ask_validated(ctx.prompt, "new IP", optional(|s| validate_ip(s).map(str::to_owned)))?;
    let groups = ask_validated(ctx.prompt, "new groups", optional(parse_groups))?;
    if hostname.is_none() && ip.is_none() && groups.is_none() {
        return Ok("No changes made".to_owned());
    }
    if let Some(hostname) = hostname {
        entry.hostname = hostname;
    }
    if let Some(ip) = ip {
        entry.ip = ip;
    }
    if let Some(groups) = groups {
        entry.groups = groups;
    }
    ctx.store.update(&entry)?;
    Ok(format!("Entry updated to: {}", entry))
}

pub fn delete(ctx: &mut Context, term: Option<&str>) -> Result<String> {
    println!("Select server(s) to delete:");
    let query = Query::from_arg(term);
    let results = ctx.store.find(&query)?;
    display_results(&results);
    if results.is_empty() {
        return Ok("No entries deleted".to_owned());
    }
    let selection = ask_selection(ctx.prompt, results.len(), true)?;
    if !yes_no(ctx.prompt, "confirm deletion")? {
        return Ok("No entries deleted".to_owned());
    }
    let removed = match selection {
        Selection::One(i) => ctx.store.remove(results[i].id)?,
        Selection::All => ctx.store.remove_matching(&query)?,
    };
    Ok(format!("Deleted {} entries", removed))
}

/// Every line is checked before anything is written.
pub fn read_import_file(path: &Path) -> Result<Vec<NewServer>> {
    let content = fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RiptError::NotFound(format!("import file {}", path.display())),
        _ => RiptError::Io(e),
    })?;
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(NewServer::from_line)
        .collect()
}

pub fn import(ctx: &mut Context, file: &Path, overwrite: bool) -> Result<String> {
    let servers = read_import_file(file)?;
    if overwrite {
        if !yes_no(ctx.prompt, "confirm deleting all existing entries before import")? {
            return Ok("No changes made".to_owned());
        }
        let removed = ctx.store.remove_matching(&Query::All)?;
        warn!("Deleted all {} entries", removed);
    }
    let count = servers.len();
    let imported: Vec<ServerEntry> = servers
        .into_iter()
        .map(|s| ctx.store.insert(s))
        .collect::<Result<_>>()?;
    info!("Imported {:?}", imported.iter().map(|s| &s.hostname).collect::<Vec<_>>());
    Ok(format!("Successfully imported {} servers", count))
}
