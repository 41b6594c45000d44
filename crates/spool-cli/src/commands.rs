use std::path::Path;

use anyhow::{bail, Context};
use colored::Colorize;
use serde_json::json;
use spool_pool::{PoolConfig, ValuePool};
use spool_types::{NodeId, TypedValue};
use tracing::debug;

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => PoolConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => PoolConfig::default(),
    };
    let format = cli.format;
    match cli.command {
        Command::Init(args) => cmd_init(&config, args, format),
        Command::Info(args) => cmd_info(&config, args, format),
        Command::Put(args) => cmd_put(&config, args, format),
        Command::Get(args) => cmd_get(&config, args, format),
        Command::Find(args) => cmd_find(&config, args, format),
        Command::Range(args) => cmd_range(&config, args, format),
        Command::Blank(args) => cmd_blank(&config, args, format),
    }
}

/// Open the pool at `path` on its newest generation.
///
/// With `create`, a directory holding no pool gets a freshly formatted one.
/// Without it, nothing is written: read-only commands fail instead.
fn open_pool(
    path: &Path,
    config: &PoolConfig,
    create: bool,
) -> anyhow::Result<(ValuePool, Vec<u32>)> {
    if !create && !path.join(config.metaroot_file()).is_file() {
        bail!("no pool at {}", path.display());
    }
    let pool = ValuePool::open_path(path, config.clone())
        .with_context(|| format!("opening pool at {}", path.display()))?;
    let phases = pool.recover().context("recovering metaroots")?;
    match phases.iter().max() {
        Some(&latest) => pool.select_phase(latest)?,
        None if create => pool.clear()?,
        None => bail!("no pool at {}: no committed generation", path.display()),
    }
    debug!(?phases, "pool ready");
    Ok((pool, phases))
}

/// Run `write` and commit it, rolling back if anything fails.
fn transact<T>(
    pool: &ValuePool,
    write: impl FnOnce(&ValuePool) -> anyhow::Result<T>,
) -> anyhow::Result<T> {
    let result = write(pool).and_then(|out| {
        pool.prepare()?;
        pool.commit()?;
        Ok(out)
    });
    if result.is_err() {
        if let Err(e) = pool.rollback() {
            tracing::warn!(error = %e, "rollback after failed write");
        }
    }
    result
}

fn parse_value(s: &str) -> anyhow::Result<TypedValue> {
    s.parse()
        .with_context(|| format!("cannot parse value {s}"))
}

fn show_id(id: NodeId) -> String {
    match id.blank_counter() {
        Some(c) => format!("_:b{c}"),
        None => id.to_string(),
    }
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn cmd_init(config: &PoolConfig, args: InitArgs, format: OutputFormat) -> anyhow::Result<()> {
    let pool = ValuePool::open_path(&args.path, config.clone())?;
    let phases = pool.recover()?;
    if !phases.is_empty() {
        bail!(
            "{} already holds a pool (phases {:?})",
            args.path.display(),
            phases
        );
    }
    pool.clear_at(args.phase)?;
    pool.prepare()?;
    pool.commit()?;
    let phase = pool.phase_number()?;
    match format {
        OutputFormat::Json => print_json(&json!({ "path": args.path, "phase": phase })),
        OutputFormat::Text => {
            println!(
                "{} Initialized string pool in {}",
                "✓".green().bold(),
                args.path.display().to_string().bold()
            );
            println!("  Phase: {}", phase.to_string().yellow());
            Ok(())
        }
    }
}

fn cmd_info(config: &PoolConfig, args: InfoArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (pool, phases) = open_pool(&args.path, config, false)?;
    let stats = pool.stats();
    match format {
        OutputFormat::Json => print_json(&json!({
            "path": args.path,
            "name": config.name,
            "recovered_phases": phases,
            "stats": stats,
        })),
        OutputFormat::Text => {
            println!("Pool {} ({})", args.path.display().to_string().bold(), config.name);
            let list: Vec<String> = phases.iter().map(u32::to_string).collect();
            println!("  Recovered: {}", list.join(", "));
            if let Some(phase) = stats.phase_number {
                println!("  Phase: {}", phase.to_string().yellow().bold());
            }
            println!("  Values: {}", stats.entries);
            println!("  Value log: {} bytes", stats.log_end);
            println!("  Next blank: {}", show_id(NodeId::blank(stats.next_blank)).cyan());
            Ok(())
        }
    }
}

fn cmd_put(config: &PoolConfig, args: PutArgs, format: OutputFormat) -> anyhow::Result<()> {
    let values = args
        .values
        .iter()
        .map(|s| parse_value(s))
        .collect::<anyhow::Result<Vec<_>>>()?;
    let (pool, _) = open_pool(&args.path, config, true)?;
    let ids = transact(&pool, |pool| {
        values
            .iter()
            .map(|v| Ok(pool.find_or_create(v)?))
            .collect::<anyhow::Result<Vec<_>>>()
    })?;
    match format {
        OutputFormat::Json => print_json(&json!(values
            .iter()
            .zip(&ids)
            .map(|(v, id)| json!({ "id": id, "value": v.to_string() }))
            .collect::<Vec<_>>())),
        OutputFormat::Text => {
            for (v, id) in values.iter().zip(&ids) {
                println!("{} {:>10}  {}", "✓".green(), id.to_string().yellow(), v);
            }
            println!("Committed phase {}", pool.phase_number()?.to_string().bold());
            Ok(())
        }
    }
}

fn cmd_get(config: &PoolConfig, args: GetArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (pool, _) = open_pool(&args.path, config, false)?;
    let mut rows = Vec::with_capacity(args.ids.len());
    for &raw in &args.ids {
        let id = NodeId::new(raw);
        rows.push((id, pool.find_value(id)?));
    }
    match format {
        OutputFormat::Json => print_json(&json!(rows
            .iter()
            .map(|(id, v)| {
                let mut row = json!({
                    "id": id,
                    "blank": id.is_blank(),
                    "value": v.as_ref().map(|v| v.to_string()),
                });
                if args.raw {
                    row["payload"] = json!(v.as_ref().map(|v| hex::encode(v.data())));
                }
                row
            })
            .collect::<Vec<_>>())),
        OutputFormat::Text => {
            for (id, v) in &rows {
                match v {
                    Some(v) if args.raw => println!(
                        "{:>10}  {}  {}",
                        id.to_string().yellow(),
                        v,
                        hex::encode(v.data()).dimmed()
                    ),
                    Some(v) => println!("{:>10}  {}", id.to_string().yellow(), v),
                    None if id.is_blank() => {
                        println!("{:>10}  {}", id.to_string().yellow(), show_id(*id).cyan())
                    }
                    None => println!("{:>10}  {}", id.to_string().yellow(), "(not found)".red()),
                }
            }
            Ok(())
        }
    }
}

fn cmd_find(config: &PoolConfig, args: FindArgs, format: OutputFormat) -> anyhow::Result<()> {
    let value = parse_value(&args.value)?;
    let (pool, _) = open_pool(&args.path, config, false)?;
    let id = pool.find_id(&value)?;
    match format {
        OutputFormat::Json => print_json(&json!({ "value": value.to_string(), "id": id })),
        OutputFormat::Text => {
            match id {
                Some(id) => println!("{}", id.to_string().yellow()),
                None => println!("{}", "not found".red()),
            }
            Ok(())
        }
    }
}

fn cmd_range(config: &PoolConfig, args: RangeArgs, format: OutputFormat) -> anyhow::Result<()> {
    let by_type = args.category.is_some() || args.datatype.is_some();
    let by_value = args.low.is_some() || args.high.is_some();
    if by_type && by_value {
        bail!("--category/--datatype cannot be combined with --low/--high");
    }
    let low = args.low.as_deref().map(parse_value).transpose()?;
    let high = args.high.as_deref().map(parse_value).transpose()?;

    let (pool, _) = open_pool(&args.path, config, false)?;
    let range = if by_type {
        pool.find_range_by_type(args.category, args.datatype.as_deref())?
    } else {
        pool.find_range(low.as_ref(), !args.exclusive_low, high.as_ref(), !args.exclusive_high)?
    };
    let total = range.len();
    let mut rows = Vec::new();
    for id in range.take(args.limit.unwrap_or(usize::MAX)) {
        let value = pool
            .find_value(id)?
            .with_context(|| format!("indexed node {id} has no value"))?;
        rows.push((id, value));
    }

    match format {
        OutputFormat::Json => print_json(&json!({
            "total": total,
            "rows": rows
                .iter()
                .map(|(id, v)| json!({ "id": id, "value": v.to_string() }))
                .collect::<Vec<_>>(),
        })),
        OutputFormat::Text => {
            for (id, v) in &rows {
                println!("{:>10}  {}", id.to_string().yellow(), v);
            }
            if rows.len() < total {
                println!("{}", format!("... {} more", total - rows.len()).dimmed());
            }
            println!("{} {} value(s)", "✓".green(), total);
            Ok(())
        }
    }
}

fn cmd_blank(config: &PoolConfig, args: BlankArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (pool, _) = open_pool(&args.path, config, true)?;
    let ids = transact(&pool, |pool| {
        (0..args.count)
            .map(|_| Ok(pool.allocate_blank()?))
            .collect::<anyhow::Result<Vec<_>>>()
    })?;
    match format {
        OutputFormat::Json => print_json(&json!(ids
            .iter()
            .map(|id| json!({ "id": id, "label": show_id(*id) }))
            .collect::<Vec<_>>())),
        OutputFormat::Text => {
            for id in &ids {
                println!("{} {:>20}  {}", "✓".green(), id.to_string().yellow(), show_id(*id).cyan());
            }
            Ok(())
        }
    }
}
