use std::time::Instant;

use anyhow::Context;
use boundlexx::config::AppConfig;
use boundlexx::core::context::DataContext;

const USAGE: &str = "\
Usage: boundlexx [OPTIONS]

Warm the local Boundlexx cache: load every required collection and persist it.

Options:
  --purge          Reset all cached data before loading
  --print-config   Print the effective configuration as TOML and exit
  -h, --help       Show this help";

#[derive(Debug, Default)]
struct Args {
    purge: bool,
    print_config: bool,
}

fn parse_args() -> anyhow::Result<Option<Args>> {
    let mut args = Args::default();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--purge" => args.purge = true,
            "--print-config" => args.print_config = true,
            "-h" | "--help" => return Ok(None),
            other => anyhow::bail!("unknown argument '{other}'\n\n{USAGE}"),
        }
    }
    Ok(Some(args))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let Some(args) = parse_args()? else {
        println!("{USAGE}");
        return Ok(());
    };

    let config = AppConfig::load();
    if args.print_config {
        print!("{}", toml::to_string_pretty(&config).context("Failed to render config")?);
        return Ok(());
    }

    let _log_guard = boundlexx::core::logging::init(&config.data_dir());
    tracing::info!("{} v{} starting", boundlexx::NAME, boundlexx::VERSION);

    let ctx = DataContext::open(config)
        .await
        .context("Failed to open the persisted store")?;

    if args.purge {
        ctx.store().purge().await.context("Failed to purge cached data")?;
    }

    let started = Instant::now();
    ctx.preconditions().require_all().await;
    ctx.store().flush().await.context("Failed to persist the store")?;

    println!("{:<14} {:>8} {:>8}", "slice", "records", "count");
    for (slice, records, count) in ctx.summary().await {
        let count = count.map_or_else(|| "-".to_string(), |c| c.to_string());
        println!("{:<14} {:>8} {:>8}", slice.as_str(), records, count);
    }
    println!("loaded in {:.1}s", started.elapsed().as_secs_f64());

    Ok(())
}
