use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use gridedit_core::{Filters, GridConfig, GridConfigStore, GridController, SortSpec};
use gridedit_driver_http::HttpRecordSource;

const USAGE: &str = "\
Usage:
  gridedit [--api URL] [--config PATH] tables <schema> [pattern]
  gridedit [--api URL] [--config PATH] show <schema> <table>
           [--page N] [--limit N] [--sort COLUMN[:desc]] [--filter COLUMN=PATTERN]...
  gridedit [--config PATH] config";

#[derive(Debug, Default, PartialEq)]
struct GlobalOptions {
    api: Option<String>,
    config: Option<PathBuf>,
}

#[derive(Debug, PartialEq)]
struct ShowOptions {
    schema: String,
    table: String,
    page: Option<u32>,
    limit: Option<u32>,
    sort: Option<SortSpec>,
    filters: Vec<(String, String)>,
}

#[derive(Debug, PartialEq)]
enum Command {
    Tables {
        schema: String,
        pattern: Option<String>,
    },
    Show(ShowOptions),
    Config,
}

pub fn run(args: &[String]) -> i32 {
    let (options, command) = match parse_args(args) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            return 2;
        }
    };

    match execute(options, command) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

fn parse_args(args: &[String]) -> Result<(GlobalOptions, Command)> {
    let mut options = GlobalOptions::default();
    let mut positional = Vec::new();
    let mut page = None;
    let mut limit = None;
    let mut sort = None;
    let mut filters = Vec::new();

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--api" => options.api = Some(flag_value(&mut iter, "--api")?.to_string()),
            "--config" => options.config = Some(PathBuf::from(flag_value(&mut iter, "--config")?)),
            "--page" => page = Some(parse_number(flag_value(&mut iter, "--page")?, "--page")?),
            "--limit" => limit = Some(parse_number(flag_value(&mut iter, "--limit")?, "--limit")?),
            "--sort" => sort = Some(parse_sort(flag_value(&mut iter, "--sort")?)?),
            "--filter" => filters.push(parse_filter(flag_value(&mut iter, "--filter")?)?),
            "-h" | "--help" => bail!("Help requested"),
            other if other.starts_with("--") => bail!("Unknown option: {}", other),
            other => positional.push(other.to_string()),
        }
    }

    let mut positional = positional.into_iter();
    let command = match positional.next().as_deref() {
        Some("tables") => {
            let schema = positional
                .next()
                .ok_or_else(|| anyhow!("Missing <schema>"))?;
            Command::Tables {
                schema,
                pattern: positional.next(),
            }
        }
        Some("show") => {
            let schema = positional
                .next()
                .ok_or_else(|| anyhow!("Missing <schema>"))?;
            let table = positional
                .next()
                .ok_or_else(|| anyhow!("Missing <table>"))?;
            Command::Show(ShowOptions {
                schema,
                table,
                page,
                limit,
                sort,
                filters,
            })
        }
        Some("config") => Command::Config,
        Some(other) => bail!("Unknown command: {}", other),
        None => bail!("Missing command"),
    };

    if let Some(extra) = positional.next() {
        bail!("Unexpected argument: {}", extra);
    }

    Ok((options, command))
}

fn flag_value<'a>(iter: &mut std::slice::Iter<'a, String>, flag: &str) -> Result<&'a str> {
    iter.next()
        .map(String::as_str)
        .ok_or_else(|| anyhow!("{} requires a value", flag))
}

fn parse_number(raw: &str, flag: &str) -> Result<u32> {
    match raw.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => bail!("{} expects a positive number, got '{}'", flag, raw),
    }
}

fn parse_sort(raw: &str) -> Result<SortSpec> {
    let (column, direction) = match raw.rsplit_once(':') {
        Some((column, direction)) => (column, Some(direction)),
        None => (raw, None),
    };

    if column.is_empty() {
        bail!("--sort expects COLUMN[:asc|:desc]");
    }

    match direction {
        None | Some("asc") => Ok(SortSpec::asc(column)),
        Some("desc") => Ok(SortSpec::desc(column)),
        Some(other) => bail!("Unknown sort direction: {}", other),
    }
}

fn parse_filter(raw: &str) -> Result<(String, String)> {
    let (column, pattern) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("--filter expects COLUMN=PATTERN, got '{}'", raw))?;
    Ok((column.trim().to_string(), pattern.to_string()))
}

fn load_config(options: &GlobalOptions) -> Result<(GridConfig, PathBuf)> {
    let store = match &options.config {
        Some(path) => GridConfigStore::at(path.clone()),
        None => GridConfigStore::new().context("Could not locate the config directory")?,
    };

    let mut config = store
        .load()
        .with_context(|| format!("Failed to read {}", store.path().display()))?;

    if let Some(api) = &options.api {
        config.api_base_url = api.clone();
    }

    Ok((config, store.path().to_path_buf()))
}

fn execute(options: GlobalOptions, command: Command) -> Result<()> {
    let (mut config, config_path) = load_config(&options)?;

    if command == Command::Config {
        println!("# {}", config_path.display());
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    if let Command::Show(show) = &command {
        if let Some(limit) = show.limit {
            config.rows_per_page = limit;
        }
    }

    let source = HttpRecordSource::from_config(&config)?;
    let mut grid = GridController::new(Arc::new(source), config);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(async move {
        match command {
            Command::Tables { schema, pattern } => list_tables(&mut grid, &schema, pattern).await,
            Command::Show(show) => show_page(&mut grid, show).await,
            Command::Config => Ok(()),
        }
    })
}

async fn list_tables(grid: &mut GridController, schema: &str, pattern: Option<String>) -> Result<()> {
    let tables = grid.list_tables(schema, pattern.as_deref()).await?;
    for table in tables {
        println!("{}", table.table_name);
    }
    Ok(())
}

async fn show_page(grid: &mut GridController, show: ShowOptions) -> Result<()> {
    // Each change issues a newer ticket; only the last one is fetched.
    let mut ticket = grid.select_table(&show.schema, &show.table)?;

    if let Some(sort) = show.sort {
        if let Some(next) = grid.set_sort(sort) {
            ticket = next;
        }
    }

    if !show.filters.is_empty() {
        if let Some(next) = grid.apply_filters(Filters::from_inputs(show.filters)) {
            ticket = next;
        }
    }

    grid.run_load(ticket).await?;

    if let Some(page) = show.page.filter(|p| *p > 1) {
        let ticket = grid.set_page(page).ok_or_else(|| {
            let total = grid.pagination().map_or(1, |p| p.total_pages());
            anyhow!("Page {} is out of range (1-{})", page, total)
        })?;
        grid.run_load(ticket).await?;
    }

    print_page(grid)
}

fn print_page(grid: &GridController) -> Result<()> {
    let pagination = grid
        .pagination()
        .ok_or_else(|| anyhow!("No table loaded"))?;

    let rows: Vec<_> = grid.rows().iter().map(|row| row.values()).collect();
    let output = serde_json::json!({
        "table": grid.loaded_table().map(|t| t.qualified_name()),
        "page": pagination.current_page,
        "total_pages": pagination.total_pages(),
        "total_rows": pagination.total_rows,
        "aggregates": grid.aggregates(),
        "columns": grid.columns(),
        "rows": rows,
    });

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
