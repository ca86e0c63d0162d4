pub mod deploy;
pub mod groups;
pub mod records;
pub mod sync;

use crate::exec::Runner;
use crate::store::RecordStore;
use crate::utils::config::Settings;
use crate::utils::error::Result;
use crate::utils::tools::Prompt;
use std::path::PathBuf;

/// One command line invocation, decided once at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Show { term: Option<String> },
    Generate { term: Option<String> },
    Create,
    Edit { term: Option<String> },
    Delete { term: Option<String> },
    Assign { term: Option<String> },
    Remove { term: Option<String> },
    Import { file: PathBuf, overwrite: bool },
    Update { term: Option<String> },
    Export { host: String, output: Option<PathBuf> },
    Apply {
        rules: PathBuf,
        hosts: Vec<String>,
        group: Option<String>,
        whitelist: Vec<String>,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Show { .. } => "show",
            Action::Generate { .. } => "generate",
            Action::Create => "create",
            Action::Edit { .. } => "edit",
            Action::Delete { .. } => "delete",
            Action::Assign { .. } => "assign",
            Action::Remove { .. } => "remove",
            Action::Import { .. } => "import",
            Action::Update { .. } => "update",
            Action::Export { .. } => "export",
            Action::Apply { .. } => "apply",
        }
    }
}

pub struct Context<'a> {
    pub settings: &'a Settings,
    pub store: &'a mut dyn RecordStore,
    pub prompt: &'a mut dyn Prompt,
    pub runner: &'a dyn Runner,
}

/// Run one action and return its status line.
pub fn dispatch(action: Action, ctx: &mut Context) -> Result<String> {
    match action {
        Action::Show { term } => records::show(ctx, term.as_deref()),
        Action::Generate { term } => deploy::generate(ctx, term.as_deref()),
        Action::Create => records::create(ctx),
        Action::Edit { term } => records::edit(ctx, term.as_deref()),
        Action::Delete { term } => records::delete(ctx, term.as_deref()),
        Action::Assign { term } => groups::assign(ctx, term.as_deref()),
        Action::Remove { term } => groups::remove(ctx, term.as_deref()),
        Action::Import { file, overwrite } => records::import(ctx, &file, overwrite),
        Action::Update { term } => deploy::update(ctx, term.as_deref()),
        Action::Export { host, output } => sync::export(ctx, &host, output.as_deref()),
        Action::Apply {
            rules,
            hosts,
            group,
            whitelist,
        } => sync::apply(ctx, &rules, &hosts, group.as_deref(), &whitelist),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::Fixture;
    use super::*;
    use crate::exec::testing::FakeRunner;
    use crate::utils::tools::testing::ScriptedPrompt;

    #[test]
    fn dispatch_routes_to_handler() {
        let fx = Fixture::new();
        fx.seed(&[("web01", "10.0.0.1", &["web"])]);
        let mut store = fx.store();
        let mut prompt = ScriptedPrompt::new(&[]);
        let runner = FakeRunner::default();
        let mut ctx = Context {
            settings: &fx.settings,
            store: &mut store,
            prompt: &mut prompt,
            runner: &runner,
        };
        let status = dispatch(Action::Show { term: None }, &mut ctx).unwrap();
        assert_eq!(status, "Found 1 server entries");
        assert_eq!(Action::Create.name(), "create");
    }
}
