use clap::{Parser, Subcommand};

/// CLI surface definition.
#[derive(Parser, Debug)]
#[command(
    name = "slotvault",
    about = "Encrypted, tamper-evident key-value records",
    version,
    propagate_version = true
)]
pub struct Cli {
    /// Use an in-memory backend; records are gone when the process exits.
    #[arg(long, global = true)]
    pub session: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Store a value. VALUE is parsed as JSON, or stored as a plain string if it is not JSON.
    Put { key: String, value: String },
    /// Print the verified value stored under KEY.
    Get { key: String },
    /// Remove both slots of KEY (idempotent).
    Remove { key: String },
    /// Show the data and auth slot ids KEY maps to.
    Slots { key: String },
    /// Print version and exit.
    Version,
    /// Write, read back and remove a health-check record.
    Health,
    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Create a default config file if one does not exist.
    Init,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_put_subcommand() {
        let cli = Cli::try_parse_from(["slotvault", "put", "user.token", "\"abc123\""])
            .expect("parse should succeed");
        assert_eq!(
            cli.command,
            Command::Put {
                key: "user.token".into(),
                value: "\"abc123\"".into()
            }
        );
        assert!(!cli.session);
    }

    #[test]
    fn session_flag_is_global() {
        let cli = Cli::try_parse_from(["slotvault", "get", "k", "--session"])
            .expect("parse should succeed");
        assert_eq!(cli.command, Command::Get { key: "k".into() });
        assert!(cli.session);
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["slotvault"]).is_err());
    }

    #[test]
    fn parses_health_subcommand() {
        let cli = Cli::try_parse_from(["slotvault", "health"]).expect("parse should succeed");
        assert_eq!(cli.command, Command::Health);
    }

    #[test]
    fn parses_config_init_subcommand() {
        let cli =
            Cli::try_parse_from(["slotvault", "config", "init"]).expect("parse should succeed");
        assert_eq!(cli.command, Command::Config(ConfigCommand::Init));
    }
}
