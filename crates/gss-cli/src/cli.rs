use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "gss",
    about = "GameState Service: typed key-value state over a local bus",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Service endpoint: `unix:<path>`, `tcp:<addr>` or `<addr>`
    #[arg(short, long, global = true, default_value = "127.0.0.1:7411")]
    pub endpoint: String,

    /// Object path calls are addressed to
    #[arg(long, global = true)]
    pub object_path: Option<String>,

    /// Interface calls are addressed to
    #[arg(long, global = true)]
    pub interface: Option<String>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the service
    Serve(ServeArgs),
    /// Read a key
    Get(GetArgs),
    /// Write a key
    Set(SetArgs),
    /// Print changes as they happen
    Watch(WatchArgs),
    /// Run the conformance battery against a running service
    Check(CheckArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Listen address, overriding the config file
    #[arg(long)]
    pub listen: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
}

#[derive(Args)]
pub struct SetArgs {
    pub key: String,
    /// Type tag: b, x, d, s, ax or as
    pub signature: String,
    /// Value text; sequences are comma-separated
    pub value: String,
}

#[derive(Args)]
pub struct WatchArgs {
    /// Only watch these keys
    pub keys: Vec<String>,
    /// Stop after this many changes
    #[arg(short = 'n', long)]
    pub count: Option<usize>,
}

#[derive(Args)]
pub struct CheckArgs {
    /// Seconds to wait for each Changed signal
    #[arg(long, default_value = "5")]
    pub timeout: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_serve() {
        let cli = Cli::try_parse_from(["gss", "serve", "--listen", "unix:/tmp/gss.sock"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.listen, Some("unix:/tmp/gss.sock".into()));
            assert!(args.config.is_none());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_serve_config() {
        let cli = Cli::try_parse_from(["gss", "serve", "-c", "gss.toml"]).unwrap();
        if let Command::Serve(args) = cli.command {
            assert_eq!(args.config, Some(PathBuf::from("gss.toml")));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from(["gss", "get", "SAMPLE_001"]).unwrap();
        if let Command::Get(args) = cli.command {
            assert_eq!(args.key, "SAMPLE_001");
        } else { panic!("wrong command"); }
        assert_eq!(cli.endpoint, "127.0.0.1:7411");
    }

    #[test]
    fn parse_set() {
        let cli = Cli::try_parse_from(["gss", "set", "SAMPLE_005", "ax", "1,2,3"]).unwrap();
        if let Command::Set(args) = cli.command {
            assert_eq!(args.key, "SAMPLE_005");
            assert_eq!(args.signature, "ax");
            assert_eq!(args.value, "1,2,3");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_watch() {
        let cli = Cli::try_parse_from(["gss", "watch", "A", "B", "-n", "3"]).unwrap();
        if let Command::Watch(args) = cli.command {
            assert_eq!(args.keys, vec!["A", "B"]);
            assert_eq!(args.count, Some(3));
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_check() {
        let cli = Cli::try_parse_from(["gss", "check", "--timeout", "2"]).unwrap();
        if let Command::Check(args) = cli.command {
            assert_eq!(args.timeout, 2);
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "gss", "--endpoint", "unix:/run/gss.sock", "--interface", "org.example.State",
            "--verbose", "--format", "json", "get", "k",
        ])
        .unwrap();
        assert_eq!(cli.endpoint, "unix:/run/gss.sock");
        assert_eq!(cli.interface, Some("org.example.State".into()));
        assert!(cli.verbose);
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
