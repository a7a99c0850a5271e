use std::time::Duration;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;

use gss_protocol::BusAddress;
use gss_sdk::{ChangeEvent, GameStateClient};
use gss_server::{GameStateService, ListenAddr, ServerConfig};
use gss_types::{TypedValue, ValueKind};

use crate::check::{self, Probe};
use crate::cli::*;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let Cli {
        command,
        endpoint,
        object_path,
        interface,
        format,
        ..
    } = cli;
    let overrides = BusOverrides { object_path, interface };

    match command {
        Command::Serve(args) => cmd_serve(args, &overrides).await,
        Command::Get(args) => {
            let client = connect(&endpoint, &overrides).await?;
            cmd_get(&client, args, &format).await
        }
        Command::Set(args) => {
            let client = connect(&endpoint, &overrides).await?;
            cmd_set(&client, args, &format).await
        }
        Command::Watch(args) => {
            let client = connect(&endpoint, &overrides).await?;
            cmd_watch(&client, args, &format).await
        }
        Command::Check(args) => {
            let client = connect(&endpoint, &overrides).await?;
            cmd_check(&client, args).await
        }
    }
}

struct BusOverrides {
    object_path: Option<String>,
    interface: Option<String>,
}

impl BusOverrides {
    fn apply(&self, mut bus: BusAddress) -> BusAddress {
        if let Some(path) = &self.object_path {
            bus.object_path = path.clone();
        }
        if let Some(iface) = &self.interface {
            bus.interface = iface.clone();
        }
        bus
    }
}

async fn connect(endpoint: &str, overrides: &BusOverrides) -> anyhow::Result<GameStateClient> {
    let addr: ListenAddr = endpoint.parse()?;
    let bus = overrides.apply(BusAddress::default());
    let client = match &addr {
        ListenAddr::Tcp(sock) => GameStateClient::connect_tcp(*sock, bus).await,
        #[cfg(unix)]
        ListenAddr::Unix(path) => GameStateClient::connect_unix(path, bus).await,
        #[cfg(not(unix))]
        ListenAddr::Unix(_) => anyhow::bail!("unix sockets are not supported on this platform"),
    };
    client.with_context(|| format!("cannot reach service at {addr}"))
}

async fn cmd_serve(args: ServeArgs, overrides: &BusOverrides) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(listen) = &args.listen {
        config.listen = listen.parse()?;
    }
    config.bus = overrides.apply(config.bus);
    config.validate()?;

    println!(
        "{} GameState service on {} ({})",
        "✓".green().bold(),
        config.listen.to_string().bold(),
        config.bus.service.cyan()
    );
    GameStateService::new(config).serve().await?;
    Ok(())
}

async fn cmd_get(client: &GameStateClient, args: GetArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let value = client.get(&args.key).await?;
    match format {
        OutputFormat::Text => println!(
            "{} = {} ({})",
            args.key.bold(),
            value,
            value.signature().cyan()
        ),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "key": args.key,
                "signature": value.signature(),
                "value": value_json(&value),
            })
        ),
    }
    Ok(())
}

async fn cmd_set(client: &GameStateClient, args: SetArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let kind = ValueKind::from_signature(&args.signature)?;
    let value = TypedValue::parse(kind, &args.value)?;
    client.set(&args.key, &value).await?;
    match format {
        OutputFormat::Text => println!(
            "{} Set {} = {} ({})",
            "✓".green().bold(),
            args.key.bold(),
            value,
            kind.name().cyan()
        ),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "key": args.key,
                "signature": value.signature(),
                "value": value_json(&value),
            })
        ),
    }
    Ok(())
}

async fn cmd_watch(client: &GameStateClient, args: WatchArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let filter = if args.keys.is_empty() { None } else { Some(args.keys) };
    let mut changes = client.subscribe(filter).await?;
    if matches!(format, OutputFormat::Text) {
        println!("Watching {} (Ctrl-C to stop)", client.bus().object_path.cyan());
    }

    let mut seen = 0usize;
    while args.count.map_or(true, |n| seen < n) {
        let change = tokio::select! {
            change = changes.recv() => change,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(change) = change else {
            anyhow::bail!("service closed the connection");
        };
        print_change(&change, format);
        seen += 1;
    }
    Ok(())
}

fn print_change(change: &ChangeEvent, format: &OutputFormat) {
    match format {
        OutputFormat::Text => println!(
            "{} {} = {} ({})",
            format!("#{}", change.sequence).yellow(),
            change.key.bold(),
            change.value,
            change.value.signature().cyan()
        ),
        OutputFormat::Json => println!(
            "{}",
            json!({
                "sequence": change.sequence,
                "key": change.key,
                "signature": change.value.signature(),
                "value": value_json(&change.value),
            })
        ),
    }
}

async fn cmd_check(client: &GameStateClient, args: CheckArgs) -> anyhow::Result<()> {
    let report = check::run_check(client, Duration::from_secs(args.timeout)).await?;
    for line in &report.lines {
        let tag = match (line.probe, line.passed) {
            (Probe::Signal, true) => "OK(c)".green(),
            (Probe::Signal, false) => "FAILED(c)".red(),
            (_, true) => "OK".green(),
            (_, false) => "FAILED".red(),
        };
        println!("{} {}  {}", line.key.bold(), tag, line.detail.dimmed());
    }

    if !report.passed() {
        anyhow::bail!("{} of {} checks failed", report.failures(), report.lines.len());
    }
    println!("{} All {} checks passed.", "✓".green().bold(), report.lines.len());
    Ok(())
}

fn value_json(value: &TypedValue) -> serde_json::Value {
    match value {
        TypedValue::Bool(b) => json!(b),
        TypedValue::Int64(i) => json!(i),
        TypedValue::Double(d) => json!(d),
        TypedValue::String(s) => json!(s),
        TypedValue::IntSequence(v) => json!(v),
        TypedValue::StringSequence(v) => json!(v),
    }
}
