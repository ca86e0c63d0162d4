use crate::utils::error::{Result, RiptError};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "./ript.json";

/// Command token lists used on the managed hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IptablesCommands {
    pub iptables: Vec<String>,
    pub save: Vec<String>,
    pub restore: Vec<String>,
    pub persist_path: String,
}

impl Default for IptablesCommands {
    fn default() -> Self {
        IptablesCommands {
            iptables: vec!["iptables".to_owned()],
            save: vec!["iptables-save".to_owned()],
            restore: vec!["iptables-restore".to_owned()],
            persist_path: "/etc/sysconfig/iptables".to_owned(),
        }
    }
}

/// Staging locations on the managed hosts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RemotePaths {
    pub current: String,
    pub desired: String,
}

impl Default for RemotePaths {
    fn default() -> Self {
        RemotePaths {
            current: "/tmp/ript.current.rules".to_owned(),
            desired: "/tmp/ript.desired.rules".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshOptions {
    pub program: String,
    pub identity: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
}

impl Default for SshOptions {
    fn default() -> Self {
        SshOptions {
            program: "ssh".to_owned(),
            identity: None,
            user: None,
            port: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub db_path: PathBuf,
    pub groups_dir: PathBuf,
    pub header: String,
    pub footer: String,
    pub iptables: IptablesCommands,
    pub remote: RemotePaths,
    pub ssh: SshOptions,
    pub log_dir: PathBuf,
    pub verbose: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            db_path: PathBuf::from("servers.json"),
            groups_dir: PathBuf::from("security-groups"),
            header: "default-header".to_owned(),
            footer: "default-footer".to_owned(),
            iptables: IptablesCommands::default(),
            remote: RemotePaths::default(),
            ssh: SshOptions::default(),
            log_dir: PathBuf::from("."),
            verbose: false,
        }
    }
}

/// Values given on the command line; each one wins over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub groups_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub identity: Option<String>,
    pub user: Option<String>,
    pub port: Option<u16>,
    pub verbose: bool,
}

impl Settings {
    pub fn from_file(path: &Path) -> Result<Settings> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                RiptError::NotFound(format!("config file {}", path.display()))
            }
            _ => RiptError::Io(e),
        })?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    /// Explicit `--config` must exist; otherwise `./ript.json` is used
    /// when present and built-in defaults when not.
    pub fn load(overrides: &Overrides) -> Result<Settings> {
        let mut settings = match &overrides.config {
            Some(path) => Settings::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Settings::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Settings::default(),
        };
        settings.apply(overrides);
        debug!("{:?}", settings);
        Ok(settings)
    }

    pub fn apply(&mut self, overrides: &Overrides) {
        if let Some(db) = &overrides.db_path {
            self.db_path = db.clone();
        }
        if let Some(dir) = &overrides.groups_dir {
            self.groups_dir = dir.clone();
        }
        if let Some(dir) = &overrides.log_dir {
            self.log_dir = dir.clone();
        }
        if overrides.identity.is_some() {
            self.ssh.identity = overrides.identity.clone();
        }
        if overrides.user.is_some() {
            self.ssh.user = overrides.user.clone();
        }
        if overrides.port.is_some() {
            self.ssh.port = overrides.port;
        }
        self.verbose |= overrides.verbose;
    }
}
