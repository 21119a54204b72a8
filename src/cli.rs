//! CLI definitions for webreplay.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use webreplay_api::Framing;

/// webreplay CLI.
#[derive(Parser)]
#[command(name = "webreplay")]
#[command(about = "Record browser interactions as instructions and replay them")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(
        short,
        long,
        default_value = "config/webreplay.toml",
        env = "WEBREPLAY_CONFIG",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Replay a stored instruction in the connected browser
    Run {
        /// Instruction ID
        id: String,

        /// Variable override, repeatable
        #[arg(long = "var", value_name = "NAME=VALUE", value_parser = parse_var)]
        vars: Vec<(String, String)>,

        /// Chrome debugging endpoint (overrides browser.endpoint)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// List stored instructions
    List {
        /// Only instructions whose URL pattern matches this URL
        #[arg(long)]
        url: Option<String>,

        /// Case-insensitive name filter
        #[arg(long)]
        name: Option<String>,

        /// Output format (table, json)
        #[arg(long, default_value = "table")]
        format: String,
    },

    /// Show an instruction and its recent runs
    Show {
        /// Instruction ID
        id: String,

        /// Number of execution logs to include
        #[arg(long, default_value_t = 5)]
        logs: usize,
    },

    /// Delete an instruction and its execution logs
    Delete {
        /// Instruction ID
        id: String,
    },

    /// Import an instruction bundle
    Import {
        /// Bundle file, `-` for stdin
        file: PathBuf,
    },

    /// Export instructions as a bundle
    Export {
        /// Instruction IDs (all when omitted)
        ids: Vec<String>,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Serve the request protocol on stdin/stdout
    Bridge {
        /// Message framing
        #[arg(long, value_enum, default_value_t = FramingArg::Lines)]
        framing: FramingArg,

        /// Chrome debugging endpoint (overrides browser.endpoint)
        #[arg(long)]
        endpoint: Option<String>,
    },

    /// Validate the configuration file
    CheckConfig,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum FramingArg {
    /// One JSON document per line
    Lines,
    /// Browser native messaging (u32 length prefix)
    Native,
}

impl From<FramingArg> for Framing {
    fn from(arg: FramingArg) -> Self {
        match arg {
            FramingArg::Lines => Framing::Lines,
            FramingArg::Native => Framing::Native,
        }
    }
}

fn parse_var(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got `{raw}`"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(format!("empty variable name in `{raw}`"));
    }
    Ok((name.to_string(), value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_var() {
        assert_eq!(
            parse_var("user=bob").unwrap(),
            ("user".to_string(), "bob".to_string())
        );
        assert_eq!(parse_var("q=a=b").unwrap().1, "a=b");
        assert_eq!(parse_var("empty=").unwrap().1, "");
        assert!(parse_var("novalue").is_err());
        assert!(parse_var("=x").is_err());
    }

    #[test]
    fn test_run_arguments() {
        let cli = Cli::try_parse_from([
            "webreplay", "run", "abc", "--var", "user=bob", "--var", "pwd=x",
        ])
        .unwrap();
        match cli.command {
            Commands::Run { id, vars, endpoint } => {
                assert_eq!(id, "abc");
                assert_eq!(vars.len(), 2);
                assert!(endpoint.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_bridge_framing() {
        let cli = Cli::try_parse_from(["webreplay", "bridge", "--framing", "native"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Bridge {
                framing: FramingArg::Native,
                ..
            }
        ));
    }
}
