/// CLI + environment configuration for the single-user desktop host.
/// Flags take precedence over environment variables; environment variables
/// take precedence over defaults.
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "auralis-server", version)]
pub struct Cli {
    /// Enable interactive API docs (not for a public-facing deployment).
    #[arg(long)]
    pub dev: bool,

    #[arg(long)]
    pub db_path: Option<PathBuf>,

    #[arg(long)]
    pub music_dir: Option<PathBuf>,

    /// Loopback-only bind; there is no flag to bind any other interface.
    #[arg(long, default_value_t = 8765)]
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub dev: bool,
    pub db_path: PathBuf,
    pub music_dir: PathBuf,
    pub port: u16,
    pub log_level: String,
}

/// Process exit codes the CLI surface promises: 0 clean, 1 fatal init
/// (bad config, can't create db/music directories), 2 port already in use.
pub const EXIT_OK: i32 = 0;
pub const EXIT_FATAL_INIT: i32 = 1;
pub const EXIT_PORT_IN_USE: i32 = 2;

impl Config {
    pub fn from_cli(cli: Cli) -> Self {
        let home = home_dir();
        let db_path = cli
            .db_path
            .or_else(|| std::env::var("AURALIS_DB_PATH").ok().map(PathBuf::from))
            .unwrap_or_else(|| home.join(".auralis").join("library.db"));
        let music_dir = cli
            .music_dir
            .or_else(|| std::env::var("AURALIS_MUSIC_DIR").ok().map(PathBuf::from))
            .unwrap_or_else(|| home.join("Music"));
        let log_level = std::env::var("AURALIS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            dev: cli.dev,
            db_path,
            music_dir,
            port: cli.port,
            log_level,
        }
    }

    /// Directories an `input_path` (or similar filesystem-facing request
    /// field) is allowed to resolve inside. `music_dir` plus a Documents
    /// sibling; deliberately NOT the bare home directory, which would make
    /// the allowlist meaningless.
    pub fn allowlisted_dirs(&self) -> Vec<PathBuf> {
        let home = home_dir();
        vec![self.music_dir.clone(), home.join("Documents")]
    }

    pub fn artwork_dir(&self) -> PathBuf {
        self.db_path
            .parent()
            .map(|p| p.join("artwork"))
            .unwrap_or_else(|| home_dir().join(".auralis").join("artwork"))
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.db_path
            .parent()
            .map(|p| p.join("uploads"))
            .unwrap_or_else(|| home_dir().join(".auralis").join("uploads"))
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_home_directory_is_not_in_the_allowlist() {
        let cli = Cli {
            dev: false,
            db_path: None,
            music_dir: Some(PathBuf::from("/home/user/Music")),
            port: 8765,
        };
        let config = Config::from_cli(cli);
        let home = home_dir();
        assert!(!config.allowlisted_dirs().contains(&home));
    }

    #[test]
    fn default_port_is_8765() {
        let cli = Cli::parse_from(["auralis-server"]);
        assert_eq!(cli.port, 8765);
    }
}
