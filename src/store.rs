mod entry;
mod json;

pub use entry::{
    parse_groups, validate_group, validate_hostname, validate_ip, NewServer, ServerEntry,
};
pub use json::JsonStore;

use crate::utils::error::Result;

/// Search used by every record command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    All,
    /// Hostname contains the term, IP equals it, or a group equals it.
    Term(String),
}

impl Query {
    pub fn term(term: &str) -> Query {
        Query::Term(term.to_owned())
    }

    pub fn from_arg(term: Option<&str>) -> Query {
        match term {
            Some(t) if !t.is_empty() => Query::term(t),
            _ => Query::All,
        }
    }

    pub fn matches(&self, entry: &ServerEntry) -> bool {
        match self {
            Query::All => true,
            Query::Term(t) => {
                entry.hostname.contains(t.as_str())
                    || entry.ip == *t
                    || entry.groups.iter().any(|g| g == t)
            }
        }
    }
}

pub trait RecordStore {
    fn find(&self, query: &Query) -> Result<Vec<ServerEntry>>;
    fn insert(&mut self, entry: NewServer) -> Result<ServerEntry>;
    fn update(&mut self, entry: &ServerEntry) -> Result<()>;
    fn remove(&mut self, id: u64) -> Result<usize>;
    fn remove_matching(&mut self, query: &Query) -> Result<usize>;
}
