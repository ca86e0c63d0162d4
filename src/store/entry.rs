use crate::utils::error::{Result, RiptError};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEntry {
    pub id: u64,
    pub hostname: String,
    pub ip: String,
    pub groups: Vec<String>,
}

/// A server entry before the store has assigned it an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewServer {
    pub hostname: String,
    pub ip: String,
    pub groups: Vec<String>,
}

impl NewServer {
    pub fn new(hostname: &str, ip: &str, groups: Vec<String>) -> Result<NewServer> {
        validate_hostname(hostname)?;
        validate_ip(ip)?;
        for group in &groups {
            validate_group(group)?;
        }
        Ok(NewServer {
            hostname: hostname.to_owned(),
            ip: ip.to_owned(),
            groups,
        })
    }

    /// Parse an import line: `hostname ip group...`.
    pub fn from_line(line: &str) -> Result<NewServer> {
        let mut comps = line.split_whitespace();
        let hostname = comps
            .next()
            .ok_or_else(|| RiptError::validation("entry", "empty line"))?;
        let ip = comps
            .next()
            .ok_or_else(|| RiptError::validation("entry", format!("{} has no IP", hostname)))?;
        NewServer::new(hostname, ip, comps.map(str::to_owned).collect())
    }
}

impl Display for ServerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}  {}  {}", self.hostname, self.ip, self.groups.join(","))
    }
}

pub fn validate_hostname(input: &str) -> Result<&str> {
    if input.is_empty() || input.chars().any(char::is_whitespace) {
        return Err(RiptError::validation("hostname", "No spaces"));
    }
    if input.starts_with('-') {
        return Err(RiptError::validation("hostname", "Must not start with '-'"));
    }
    Ok(input)
}

/// Dotted-quad shape only; octet ranges are not checked.
pub fn validate_ip(input: &str) -> Result<&str> {
    let octets: Vec<&str> = input.split('.').collect();
    if octets.len() != 4
        || octets
            .iter()
            .any(|o| o.is_empty() || !o.chars().all(|c| c.is_ascii_digit()))
    {
        return Err(RiptError::validation("IP", "Invalid IP format"));
    }
    Ok(input)
}

pub fn validate_group(input: &str) -> Result<&str> {
    if input.is_empty()
        || input == "."
        || input == ".."
        || !input
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(RiptError::validation(
            "group",
            "No special characters except - . _",
        ));
    }
    Ok(input)
}

/// Space separated group names; repeated spaces collapse.
pub fn parse_groups(input: &str) -> Result<Vec<String>> {
    let groups: Vec<String> = input.split_whitespace().map(str::to_owned).collect();
    if groups.is_empty() {
        return Err(RiptError::validation("groups", "At least one group"));
    }
    for group in &groups {
        validate_group(group)?;
    }
    Ok(groups)
}
