use std::collections::HashSet;

use anyhow::{Result, anyhow};
use clap::Parser;
use solana_sdk::pubkey::Pubkey;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::args::{Cli, Command, SweepArgs};
use crate::cli::context::{
    build_catalog_source, build_http_client, build_session, init_config, init_tracing,
};
use crate::cli::report::{ConsoleProgress, print_catalog, print_listing, print_submission};
use crate::config::{ScoopConfig, apply_env_overrides, load_config, validate_config};
use crate::monitoring::init_prometheus;
use crate::sweep::{AssetCatalog, NoopObserver, SweepSession};

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let command = match cli.command {
        Command::Init(args) => return init_config(args),
        other => other,
    };

    let mut config = load_config(cli.config.clone())?;
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    init_tracing(&config.global.logging)?;
    init_prometheus(&config.prometheus)?;

    let cancel = CancellationToken::new();
    spawn_interrupt_watch(cancel.clone());

    match command {
        Command::Catalog => run_catalog(&config).await,
        Command::Scan(args) => {
            let session = build_session(&config, &args)?;
            scan(&session, &args, &cancel).await
        }
        Command::Sweep(args) => {
            let session = build_session(&config, &args)?;
            scan(&session, &args, &cancel).await?;
            let report = session.sweep(&ConsoleProgress, &cancel).await?;
            print_submission(&report);
            Ok(())
        }
        Command::Send(args) => {
            let session = build_session(&config, &args.sweep)?;
            scan(&session, &args.sweep, &cancel).await?;
            let report = session.send(&args.to, &ConsoleProgress, &cancel).await?;
            print_submission(&report);
            Ok(())
        }
        Command::Init(_) => Err(anyhow!("init 已在加载配置前处理")),
    }
}

fn spawn_interrupt_watch(cancel: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(target: "cli", "收到中断信号，正在取消");
            cancel.cancel();
        }
    });
}

async fn run_catalog(config: &ScoopConfig) -> Result<()> {
    let source = build_catalog_source(config, build_http_client()?);
    let catalog = AssetCatalog::load(&source, source.url()).await?;
    print_catalog(&catalog);
    Ok(())
}

/// 发现并报价，按 `--only` 收窄勾选范围后打印清单。
async fn scan(session: &SweepSession, args: &SweepArgs, cancel: &CancellationToken) -> Result<()> {
    let catalog = session.catalog().await?;
    print_catalog(&catalog);

    let report = session.discover(&NoopObserver, cancel).await?;
    info!(
        target: "cli",
        balances = report.balances.len(),
        quoted = report.quoted,
        failed = report.failed,
        "扫描完成"
    );

    if !args.only.is_empty() {
        let wanted: HashSet<Pubkey> = args.only.iter().copied().collect();
        session.set_all_included(false).await?;
        for mint in &wanted {
            if !session.set_included(mint, true).await? {
                warn!(target: "cli", mint = %mint, "该代币无法勾选（不在清单中或余额为零）");
            }
        }
    }

    let items = session.items().await?;
    let totals = session.totals().await?;
    print_listing(&items, &totals);
    Ok(())
}
