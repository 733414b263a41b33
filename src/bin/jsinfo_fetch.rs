//! jsinfo-fetch: 命令行取数与查询参数调试工具
//!
//! Usage:
//!   jsinfo-fetch get <key> [--pagination <spec>] [--from <date>] [--to <date>]
//!   jsinfo-fetch watch <key> [--interval <secs>]
//!   jsinfo-fetch item-count <key>
//!   jsinfo-fetch pagination <spec>
//!   jsinfo-fetch date-range [--from <date>] [--to <date>] [--clamp]

use anyhow::{anyhow, bail, Context};
use jsinfo_fetch::query::{
    clamp_date_range, compose_date_range, parse_pagination, DateBound, DateRangeQuery,
    DateRangeSpec,
};
use jsinfo_fetch::{FetchClient, FetchSnapshot, RequestKey, RetryFetcher};
use std::time::Duration;

#[tokio::main]
async fn main() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "get" => cmd_get(&args[2..]).await,
        "watch" => cmd_watch(&args[2..]).await,
        "item-count" => cmd_item_count(&args[2..]).await,
        "pagination" => cmd_pagination(&args[2..]),
        "date-range" => cmd_date_range(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("jsinfo-fetch {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"jsinfo-fetch: JSINFO 后端取数工具

USAGE:
    jsinfo-fetch <COMMAND> [OPTIONS]

COMMANDS:
    get <key>                   Fetch with retries until data, empty, or failure
        --pagination <spec>     Fold `sortKey,a|d,page,perPage` into the key
        --from <date>           Range start (YYYY-MM-DD or RFC 3339)
        --to <date>             Range end
    watch <key>                 Re-fetch periodically and print each change
        --interval <secs>       Refresh interval (default 30)
    item-count <key>            Row count for a paginated resource
    pagination <spec>           Parse and re-compose a pagination value
    date-range                  Show the f/t values for a range
        --from <date> --to <date> --clamp
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    JSINFO_REST_URL             Backend base URL (default http://localhost:8081)
    JSINFO_CACHE_TTL_SECS       Cache time-to-live in seconds
    JSINFO_CACHE_TIMEOUT_MS     Per-request timeout
    JSINFO_CACHE_RETRY_COUNT    Transport re-sends
    RUST_LOG                    Log filter, e.g. jsinfo_fetch=debug"#
    );
}

fn flag<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == name)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

fn has_flag(args: &[String], name: &str) -> bool {
    args.iter().any(|a| a == name)
}

fn positional(args: &[String], what: &str) -> anyhow::Result<String> {
    args.first()
        .filter(|a| !a.starts_with("--"))
        .cloned()
        .ok_or_else(|| anyhow!("missing <{what}> argument"))
}

fn date_range_from_args(args: &[String]) -> Option<DateRangeSpec> {
    let from = flag(args, "--from");
    let to = flag(args, "--to");
    if from.is_none() && to.is_none() {
        return None;
    }
    Some(DateRangeSpec {
        from: from.map(DateBound::from),
        to: to.map(DateBound::from),
    })
}

fn key_from_args(args: &[String]) -> anyhow::Result<RequestKey> {
    let mut key = RequestKey::from(positional(args, "key")?);
    if let Some(raw) = flag(args, "--pagination") {
        let spec = parse_pagination(raw)?;
        key = key.with_pagination(&spec);
    }
    if let Some(range) = date_range_from_args(args) {
        key = key.with_date_range(&range);
    }
    Ok(key)
}

fn print_snapshot(snapshot: &FetchSnapshot) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(snapshot)?);
    Ok(())
}

async fn cmd_get(args: &[String]) -> anyhow::Result<()> {
    let key = key_from_args(args)?;
    let client = FetchClient::global().context("building client")?;
    let fetcher = RetryFetcher::for_key(client, key);
    let snapshot = fetcher.settled().await;
    print_snapshot(&snapshot)?;
    if let Some(err) = snapshot.error {
        bail!(err);
    }
    Ok(())
}

async fn cmd_watch(args: &[String]) -> anyhow::Result<()> {
    let key = key_from_args(args)?;
    let interval: u64 = match flag(args, "--interval") {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid --interval {raw:?}"))?,
        None => 30,
    };
    let client = FetchClient::global().context("building client")?;
    let fetcher = RetryFetcher::for_key(client, key);
    let mut updates = fetcher.subscribe();
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    return Ok(());
                }
                let snapshot = updates.borrow_and_update().clone();
                print_snapshot(&snapshot)?;
            }
            _ = ticker.tick() => fetcher.refresh(),
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

async fn cmd_item_count(args: &[String]) -> anyhow::Result<()> {
    let key = key_from_args(args)?;
    let client = FetchClient::global().context("building client")?;
    let count = client.item_count(&key).await?;
    println!("{count}");
    Ok(())
}

fn cmd_pagination(args: &[String]) -> anyhow::Result<()> {
    let raw = positional(args, "spec")?;
    let spec = parse_pagination(&raw)?;
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

fn cmd_date_range(args: &[String]) -> anyhow::Result<()> {
    let range = date_range_from_args(args).unwrap_or_default();
    let query = if has_flag(args, "--clamp") {
        let from = range.from.as_ref().and_then(DateBound::to_date);
        let to = range.to.as_ref().and_then(DateBound::to_date);
        match (from, to) {
            (Some(from), Some(to)) => {
                let (from, to) = clamp_date_range(from, to);
                DateRangeQuery {
                    f: from.format("%Y-%m-%d").to_string(),
                    t: to.format("%Y-%m-%d").to_string(),
                }
            }
            _ => bail!("--clamp needs readable --from and --to dates"),
        }
    } else {
        compose_date_range(&range)
    };
    println!("{}", serde_json::to_string_pretty(&query)?);
    Ok(())
}
