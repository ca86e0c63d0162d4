use chrono::prelude::*;
use log::{error, info};
use simplelog::*;

use std::fs::File;

mod cli;
mod commands;
mod exec;
mod firewall;
mod store;
mod utils;

use commands::{dispatch, Action, Context};
use exec::SubprocessRunner;
use store::JsonStore;
use utils::config::Settings;
use utils::error::Result;
use utils::tools::StdinPrompt;

fn init_logging(settings: &Settings, action: &Action) -> Result<()> {
    let dt = Local::now();
    let log_file = settings.log_dir.join(format!(
        "ript_{}_{}.log",
        action.name(),
        dt.format("%Y_%m_%d_%H_%M_%S")
    ));
    let term_level = if settings.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    CombinedLogger::init(vec![
        TermLogger::new(
            term_level,
            Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(LevelFilter::Info, Config::default(), File::create(&log_file)?),
    ])?;
    Ok(())
}

fn run() -> Result<String> {
    let matches = cli::command().get_matches();
    let (action, overrides) = cli::parse(&matches)?;
    let settings = Settings::load(&overrides)?;
    init_logging(&settings, &action)?;
    info!("Running {}", action.name());

    let mut store = JsonStore::open(&settings.db_path)?;
    let mut prompt = StdinPrompt;
    let runner = SubprocessRunner;
    let mut ctx = Context {
        settings: &settings,
        store: &mut store,
        prompt: &mut prompt,
        runner: &runner,
    };
    dispatch(action, &mut ctx)
}

fn main() {
    match run() {
        Ok(status) => info!("{}", status),
        Err(e) => {
            // The logger may not be up yet when settings fail to load.
            if log::log_enabled!(log::Level::Error) {
                error!("{}", e);
            } else {
                eprintln!("{}", e);
            }
            std::process::exit(1);
        }
    }
}
