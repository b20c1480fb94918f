//! Conduit - a lightweight SQL execution gateway.

mod cli;

use clap::Parser;
use cli::{Cli, Command, ConnCommand, OutputFormat};
use db_conduit::backend::{MockBackend, PostgresBackend, QueryBackend};
use db_conduit::config::Config;
use db_conduit::error::{ConduitError, Result};
use db_conduit::format;
use db_conduit::gateway::{ExecuteOptions, Gateway, QueryError, QueryResult};
use db_conduit::history::{HistoryFilter, HistoryStore};
use db_conduit::registry::{ConnectionProfile, ConnectionRegistry};
use db_conduit::storage::{KeyValueStore, StateStore};
use std::io::Read;
use std::sync::Arc;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    db_conduit::logging::init_stderr_logging();

    if let Err(e) = run().await {
        error!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let config = Config::load_from_file(&config_path)?;

    let storage: Arc<dyn KeyValueStore> = match cli.state.clone().or(config.state_path.clone()) {
        Some(path) => Arc::new(StateStore::open(&path).await?),
        None => Arc::new(StateStore::open_default().await?),
    };

    let registry = Arc::new(ConnectionRegistry::open(storage.clone()).await?);
    let history = Arc::new(HistoryStore::open(storage, config.history_capacity).await);
    let backend: Arc<dyn QueryBackend> = if cli.mock_backend {
        Arc::new(MockBackend::new())
    } else {
        Arc::new(PostgresBackend::new())
    };
    let gateway = Gateway::new(registry.clone(), history.clone(), backend);

    match cli.command {
        Command::Conn(command) => run_conn(command, &registry).await,
        Command::Exec {
            sql,
            connection,
            max_rows,
            timeout,
            format,
        } => {
            let connection_id = resolve_connection(&registry, connection).await?;
            let output: OutputFormat = format.parse().map_err(ConduitError::validation)?;

            let mut options = ExecuteOptions::default()
                .with_timeout_ms(config.query.timeout_ms)
                .with_max_rows(config.query.max_rows);
            if let Some(timeout_ms) = timeout {
                options = options.with_timeout_ms(timeout_ms);
            }
            if let Some(max_rows) = max_rows {
                options = options.with_max_rows(max_rows);
            }

            let result = gateway.execute(&connection_id, &sql, &options).await;
            print_result(&result, output)
        }
        Command::Batch {
            file,
            connection,
            continue_on_error,
        } => {
            let connection_id = resolve_connection(&registry, connection).await?;
            let statements = read_statements(&file)?;
            if statements.is_empty() {
                return Err(ConduitError::validation("No statements to execute"));
            }

            let options = ExecuteOptions::default()
                .with_timeout_ms(config.query.timeout_ms)
                .with_max_rows(config.query.max_rows)
                .with_continue_on_error(continue_on_error);

            let results = gateway
                .execute_batch(&connection_id, &statements, &options)
                .await;
            print_batch(&statements, &results)
        }
        Command::History {
            connection,
            success_only,
            limit,
            clear,
        } => {
            if clear {
                history.clear(connection.as_deref()).await;
                println!("History cleared");
                return Ok(());
            }

            let filter = HistoryFilter {
                connection_id: connection,
                success_only,
                limit,
            };
            for entry in history.list(&filter).await {
                let status = if entry.success { "ok" } else { "failed" };
                println!(
                    "{}  {:<8} {:<7} {:>5} rows  {:>6} ms  {}",
                    entry.executed_at.format("%Y-%m-%d %H:%M:%S"),
                    entry.query_type,
                    status,
                    entry.row_count,
                    entry.elapsed_ms,
                    entry.sql.replace('\n', " ")
                );
            }
            Ok(())
        }
        Command::Plan { sql, connection } => {
            let connection_id = resolve_connection(&registry, connection).await?;
            let plan = gateway.execution_plan(&connection_id, &sql).await?;
            println!("Estimated cost: {:.1}", plan.estimated_cost);
            println!("Estimated rows: {}", plan.estimated_rows);
            println!("Operations: {}", plan.operations.join(" -> "));
            Ok(())
        }
        Command::Active => {
            let active = gateway.active_queries();
            if active.is_empty() {
                println!("No active queries");
            }
            for query in active {
                println!(
                    "{}  {}  {}",
                    query.query_id, query.connection_id, query.sql
                );
            }
            Ok(())
        }
    }
}

async fn run_conn(command: ConnCommand, registry: &ConnectionRegistry) -> Result<()> {
    match command {
        ConnCommand::Add {
            id,
            url,
            host,
            user,
            port,
            schema,
            name,
            password,
            no_tls,
            default,
        } => {
            let mut profile = match url {
                Some(url) => ConnectionProfile::from_url(&id, &url)?,
                None => ConnectionProfile::new(
                    &id,
                    host.unwrap_or_default(),
                    user.unwrap_or_default(),
                )
                .with_port(port),
            };
            if let Some(name) = name {
                profile = profile.with_name(name);
            }
            if let Some(schema) = schema {
                profile = profile.with_schema(schema);
            }
            if let Some(password) = password {
                profile = profile.with_password(password);
            }
            if no_tls {
                profile = profile.with_tls(false);
            }
            profile.is_default = default;

            let registered = registry.register(profile).await?;
            let marker = if registered.is_default { " (default)" } else { "" };
            println!(
                "Registered connection '{}'{}: {}",
                registered.id,
                marker,
                registered.display_string()
            );
            Ok(())
        }
        ConnCommand::List => {
            let profiles = registry.get_all().await;
            if profiles.is_empty() {
                println!("No saved connections");
            }
            for profile in profiles {
                let marker = if profile.is_default { "*" } else { " " };
                println!("{} {:<16} {}", marker, profile.id, profile.display_string());
            }
            Ok(())
        }
        ConnCommand::Remove { id } => {
            if registry.remove(&id).await? {
                println!("Removed connection '{}'", id);
            } else {
                println!("No connection named '{}'", id);
            }
            Ok(())
        }
        ConnCommand::SetDefault { id } => {
            registry.set_default(&id).await?;
            println!("Default connection is now '{}'", id);
            Ok(())
        }
    }
}

/// Resolves the connection to execute against: an explicit id, or the
/// registry default.
async fn resolve_connection(
    registry: &ConnectionRegistry,
    connection: Option<String>,
) -> Result<String> {
    if let Some(id) = connection {
        return Ok(id);
    }
    registry
        .get_default()
        .await
        .map(|p| p.id)
        .ok_or_else(|| {
            ConduitError::validation(
                "No connection specified and no default connection configured",
            )
        })
}

/// Reads batch statements from a file or stdin, one per line, skipping blank
/// lines and comment lines.
fn read_statements(file: &str) -> Result<Vec<String>> {
    let contents = if file == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .map_err(|e| ConduitError::validation(format!("Failed to read stdin: {e}")))?;
        buffer
    } else {
        std::fs::read_to_string(file)
            .map_err(|e| ConduitError::validation(format!("Failed to read {file}: {e}")))?
    };

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with("--"))
        .map(String::from)
        .collect())
}

fn print_result(result: &QueryResult, output: OutputFormat) -> Result<()> {
    if let Some(error) = &result.error {
        return Err(to_error(error.clone()));
    }

    match output {
        OutputFormat::Table => {
            println!("{}", format::to_display_table(result));
            let summary = format::summarize(result);
            println!(
                "{} ms{}",
                summary.elapsed_ms,
                if summary.truncated { " (truncated)" } else { "" }
            );
        }
        OutputFormat::Csv => print!("{}", format::to_delimited_text(result, b',')?),
        OutputFormat::Tsv => print!("{}", format::to_delimited_text(result, b'\t')?),
        OutputFormat::Json => println!("{}", format::to_structured_document(result)?),
    }

    for warning in &result.metadata.warnings {
        eprintln!("Warning: {warning}");
    }

    Ok(())
}

fn print_batch(statements: &[String], results: &[QueryResult]) -> Result<()> {
    let mut failures = 0;
    for (i, result) in results.iter().enumerate() {
        match &result.error {
            Some(error) => {
                failures += 1;
                println!("[{}] failed: {}", i + 1, error.message);
            }
            None => println!(
                "[{}] ok: {} rows in {} ms",
                i + 1,
                result.row_count,
                result.elapsed_ms
            ),
        }
    }

    if results.len() < statements.len() {
        println!(
            "Stopped after statement {} of {}",
            results.len(),
            statements.len()
        );
    }

    if failures > 0 {
        Err(ConduitError::backend(format!(
            "{failures} of {} statements failed",
            results.len()
        )))
    } else {
        Ok(())
    }
}

/// Rebuilds a typed error from a result's error payload.
fn to_error(error: QueryError) -> ConduitError {
    match error.code.as_str() {
        "validation" => ConduitError::validation(error.message),
        "not_found" => ConduitError::not_found(error.message),
        "storage" => ConduitError::storage(error.message),
        _ => ConduitError::backend(error.message),
    }
}
