use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use arango_rdbc::{ResultTable, Value, connect};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "arango-rdbc")]
#[command(about = "Query ArangoDB collections as rows and columns")]
struct Cli {
    /// Connection string, arangodb://host[:port][/database]
    #[arg(long, default_value = "arangodb://localhost:8529/_system")]
    url: String,
    #[arg(long, short = 'u')]
    user: Option<String>,
    #[arg(long)]
    password: Option<String>,
    /// Extra connection property, e.g. `-o timeout=5000`
    #[arg(long = "option", short = 'o', value_name = "KEY=VALUE")]
    options: Vec<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a query and print its rows
    Query {
        query: String,
        /// Bind parameter, e.g. `-p min=18`; values are read as JSON, else as text
        #[arg(long = "param", short = 'p', value_name = "NAME=VALUE")]
        params: Vec<String>,
        #[arg(long)]
        fetch_size: Option<u32>,
    },
    /// List collections and views
    Tables {
        #[arg(long = "type")]
        types: Vec<String>,
    },
    /// List inferred columns
    Columns {
        #[arg(long)]
        table: Option<String>,
    },
    /// List accessible databases
    Catalogs,
    /// Print server product and version
    Version,
}

fn split_pair(pair: &str) -> Result<(String, String)> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| anyhow!("expected KEY=VALUE, got '{}'", pair))?;
    Ok((key.trim().to_string(), value.to_string()))
}

fn parse_param_value(raw: &str) -> Value {
    serde_json::from_str::<serde_json::Value>(raw)
        .map(Value::from)
        .unwrap_or_else(|_| Value::from(raw))
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut properties: HashMap<String, String> = cli
        .options
        .iter()
        .map(|pair| split_pair(pair))
        .collect::<Result<_>>()?;
    if let Some(user) = cli.user {
        properties.insert("user".to_string(), user);
    }
    if let Some(password) = cli.password {
        properties.insert("password".to_string(), password);
    }

    let mut conn = connect(&cli.url, &properties)
        .with_context(|| format!("failed to connect to {}", cli.url))?;

    match cli.command {
        Command::Query {
            query,
            params,
            fetch_size,
        } => {
            let table = if params.is_empty() {
                let mut stmt = conn.create_statement()?;
                if let Some(size) = fetch_size {
                    stmt.set_fetch_size(size)?;
                }
                let rows = stmt.execute_query(&query).context("query failed")?;
                ResultTable::from_cursor(rows)?
            } else {
                let mut stmt = conn.prepare(&query)?;
                if let Some(size) = fetch_size {
                    stmt.set_fetch_size(size)?;
                }
                for pair in &params {
                    let (name, raw) = split_pair(pair)?;
                    stmt.bind_named(&name, parse_param_value(&raw))?;
                }
                let rows = stmt.execute_query().context("query failed")?;
                ResultTable::from_cursor(rows)?
            };
            table.print();
        }
        Command::Tables { types } => {
            let meta = conn.metadata()?;
            let wanted: Vec<&str> = types.iter().map(String::as_str).collect();
            let filter = if wanted.is_empty() { None } else { Some(wanted.as_slice()) };
            let mut rows = meta.tables(None, None, filter)?;
            ResultTable::from_cursor(&mut rows)?.print();
        }
        Command::Columns { table } => {
            let meta = conn.metadata()?;
            let mut rows = meta.columns(None, table.as_deref(), None)?;
            ResultTable::from_cursor(&mut rows)?.print();
        }
        Command::Catalogs => {
            let meta = conn.metadata()?;
            let mut rows = meta.catalogs()?;
            ResultTable::from_cursor(&mut rows)?.print();
        }
        Command::Version => {
            let meta = conn.metadata()?;
            println!("{} {}", meta.product_name()?, meta.product_version()?);
            println!("{} {}", meta.driver_name(), meta.driver_version());
        }
    }

    conn.close()?;
    Ok(())
}
