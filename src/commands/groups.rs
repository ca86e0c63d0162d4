use crate::commands::Context;
use crate::store::{validate_group, Query, RecordStore, ServerEntry};
use crate::utils::error::{Result, RiptError};
use crate::utils::tools::{ask_selection, ask_validated, display_results};
use log::error;

/// Per-entry results of a bulk mutation. Entries are written one by one;
/// a failure leaves earlier writes in place.
#[derive(Debug, Default)]
pub struct BulkOutcome {
    pub updated: Vec<u64>,
    pub skipped: Vec<u64>,
    pub failed: Vec<(u64, RiptError)>,
}

impl BulkOutcome {
    fn summary(self, verb: &str, group: &str) -> Result<String> {
        for (id, e) in &self.failed {
            error!("entry {}: {}", id, e);
        }
        let attempted = self.updated.len() + self.failed.len();
        match (self.updated.len(), self.failed.len()) {
            (0, 0) => Ok(format!("No entries held {}", group)),
            (_, 0) => Ok(format!("{} {} on {} entries", verb, group, attempted)),
            (0, _) => Err(self
                .failed
                .into_iter()
                .next()
                .map(|(_, e)| e)
                .unwrap_or_else(|| RiptError::Store("no entries updated".to_owned()))),
            (ok, bad) => Ok(format!(
                "{} {} on {} of {} entries ({} failed)",
                verb, group, ok, attempted, bad
            )),
        }
    }
}

fn mutate_each<F>(store: &mut dyn RecordStore, entries: Vec<ServerEntry>, change: F) -> BulkOutcome
where
    F: Fn(&mut Vec<String>) -> bool,
{
    let mut outcome = BulkOutcome::default();
    for mut entry in entries {
        if !change(&mut entry.groups) {
            outcome.skipped.push(entry.id);
            continue;
        }
        match store.update(&entry) {
            Ok(()) => outcome.updated.push(entry.id),
            Err(e) => outcome.failed.push((entry.id, e)),
        }
    }
    outcome
}

pub fn assign_group(store: &mut dyn RecordStore, entries: Vec<ServerEntry>, group: &str) -> BulkOutcome {
    mutate_each(store, entries, |groups| {
        groups.push(group.to_owned());
        true
    })
}

/// Drops the first occurrence only; entries without the group are skipped.
pub fn remove_group(store: &mut dyn RecordStore, entries: Vec<ServerEntry>, group: &str) -> BulkOutcome {
    mutate_each(store, entries, |groups| {
        match groups.iter().position(|g| g == group) {
            Some(i) => {
                groups.remove(i);
                true
            }
            None => false,
        }
    })
}

fn select_entries(ctx: &mut Context, term: Option<&str>) -> Result<Option<(Vec<ServerEntry>, String)>> {
    let results = ctx.store.find(&Query::from_arg(term))?;
    display_results(&results);
    if results.is_empty() {
        return Ok(None);
    }
    let selection = ask_selection(ctx.prompt, results.len(), true)?;
    let group = ask_validated(ctx.prompt, "group name", |s| validate_group(s).map(str::to_owned))?;
    Ok(Some((selection.pick(&results), group)))
}

pub fn assign(ctx: &mut Context, term: Option<&str>) -> Result<String> {
    println!("Select server(s) to assign a security group to:");
    match select_entries(ctx, term)? {
        Some((entries, group)) => assign_group(ctx.store, entries, &group).summary("Added", &group),
        None => Ok("No entries changed".to_owned()),
    }
}

pub fn remove(ctx: &mut Context, term: Option<&str>) -> Result<String> {
    println!("Select server(s) to remove a security group from:");
    match select_entries(ctx, term)? {
        Some((entries, group)) => remove_group(ctx.store, entries, &group).summary("Removed", &group),
        None => Ok("No entries changed".to_owned()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::Fixture;
    use crate::exec::testing::FakeRunner;
    use crate::store::{JsonStore, NewServer};
    use crate::utils::tools::testing::ScriptedPrompt;

    /// Refuses to update one particular entry.
    struct FlakyStore {
        inner: JsonStore,
        fail_id: u64,
    }

    impl RecordStore for FlakyStore {
        fn find(&self, query: &Query) -> Result<Vec<ServerEntry>> {
            self.inner.find(query)
        }
        fn insert(&mut self, entry: NewServer) -> Result<ServerEntry> {
            self.inner.insert(entry)
        }
        fn update(&mut self, entry: &ServerEntry) -> Result<()> {
            if entry.id == self.fail_id {
                return Err(RiptError::Store("disk full".to_owned()));
            }
            self.inner.update(entry)
        }
        fn remove(&mut self, id: u64) -> Result<usize> {
            self.inner.remove(id)
        }
        fn remove_matching(&mut self, query: &Query) -> Result<usize> {
            self.inner.remove_matching(query)
        }
    }

    #[test]
    fn bulk_assign_survives_one_failed_write() {
        let fx = Fixture::new();
        let seeded = fx.seed(&[
            ("web01", "10.0.0.1", &["web"]),
            ("web02", "10.0.0.2", &["web"]),
            ("web03", "10.0.0.3", &["web"]),
        ]);
        let mut store = FlakyStore {
            inner: fx.store(),
            fail_id: seeded[1].id,
        };
        let mut prompt = ScriptedPrompt::new(&["*", "g1"]);
        let runner = FakeRunner::default();
        let mut ctx = Context {
            settings: &fx.settings,
            store: &mut store,
            prompt: &mut prompt,
            runner: &runner,
        };
        let status = assign(&mut ctx, Some("web")).unwrap();
        assert_eq!(status, "Added g1 on 2 of 3 entries (1 failed)");

        let after = fx.store().find(&Query::All).unwrap();
        assert_eq!(after[0].groups, vec!["web", "g1"]);
        assert_eq!(after[1].groups, vec!["web"]);
        assert_eq!(after[2].groups, vec!["web", "g1"]);
    }

    #[test]
    fn assign_allows_duplicates() {
        let fx = Fixture::new();
        let seeded = fx.seed(&[("web01", "10.0.0.1", &["web"])]);
        let mut store = fx.store();
        let outcome = assign_group(&mut store, seeded, "web");
        assert_eq!(outcome.updated.len(), 1);
        assert_eq!(store.find(&Query::All).unwrap()[0].groups, vec!["web", "web"]);
    }

    #[test]
    fn remove_takes_first_occurrence_and_skips_others() {
        let fx = Fixture::new();
        let seeded = fx.seed(&[
            ("web01", "10.0.0.1", &["web", "ssh", "web"]),
            ("db01", "10.0.0.2", &["db"]),
        ]);
        let mut store = fx.store();
        let outcome = remove_group(&mut store, seeded, "web");
        assert_eq!(outcome.updated.len(), 1);
        assert_eq!(outcome.skipped.len(), 1);
        let after = store.find(&Query::All).unwrap();
        assert_eq!(after[0].groups, vec!["ssh", "web"]);
        assert_eq!(after[1].groups, vec!["db"]);
    }

    #[test]
    fn single_selection_remove() {
        let fx = Fixture::new();
        fx.seed(&[
            ("web01", "10.0.0.1", &["web", "ssh"]),
            ("web02", "10.0.0.2", &["web", "ssh"]),
        ]);
        let mut store = fx.store();
        let mut prompt = ScriptedPrompt::new(&["1", "bad/name", "ssh"]);
        let runner = FakeRunner::default();
        let mut ctx = Context {
            settings: &fx.settings,
            store: &mut store,
            prompt: &mut prompt,
            runner: &runner,
        };
        assert_eq!(remove(&mut ctx, None).unwrap(), "Removed ssh on 1 entries");
        let after = fx.store().find(&Query::All).unwrap();
        assert_eq!(after[0].groups, vec!["web", "ssh"]);
        assert_eq!(after[1].groups, vec!["web"]);
    }

    #[test]
    fn total_failure_is_an_error() {
        let fx = Fixture::new();
        let seeded = fx.seed(&[("web01", "10.0.0.1", &["web"])]);
        let mut store = FlakyStore {
            inner: fx.store(),
            fail_id: seeded[0].id,
        };
        let outcome = assign_group(&mut store, seeded, "g1");
        assert!(matches!(outcome.summary("Added", "g1"), Err(RiptError::Store(_))));
    }
}
