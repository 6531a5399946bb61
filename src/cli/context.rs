use std::fs;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::pubkey::Pubkey;
use time::{UtcOffset, macros::format_description};
use tracing::info;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::{EnvFilter, fmt};

use crate::api::catalog::TokenListClient;
use crate::api::jupiter::JupiterApiClient;
use crate::cli::args::{InitCmd, SweepArgs};
use crate::config::{LoggingConfig, LoggingProfile, ScoopConfig};
use crate::lander::{RpcLander, parse_commitment};
use crate::rpc::RpcLedger;
use crate::sweep::discovery::ExclusionList;
use crate::sweep::ports::BatchSigner;
use crate::sweep::{Percentage, SessionServices, SessionSettings, SweepSession};
use crate::wallet::{AutoApprove, KeypairSigner, PromptApproval, parse_keypair_string};

const CONFIG_TEMPLATE: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/scoop.yaml.example"));

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if matches!(config.profile, LoggingProfile::Lean) {
        const QUIET_TARGETS: &[(&str, &str)] = &[
            ("hyper", "warn"),
            ("hyper_util::client::legacy", "warn"),
            ("reqwest", "info"),
            ("rustls", "warn"),
        ];
        for (module, level) in QUIET_TARGETS {
            if !config.level.contains(module) {
                if let Ok(directive) = format!("{module}={level}").parse() {
                    filter = filter.add_directive(directive);
                }
            }
        }
    }

    if matches!(config.profile, LoggingProfile::Verbose) {
        const VERBOSE_TARGETS: &[(&str, &str)] = &[
            ("jupiter::quote", "debug"),
            ("jupiter::swap", "debug"),
            ("sweep::builder", "debug"),
            ("cache::alt", "debug"),
        ];
        for (module, level) in VERBOSE_TARGETS {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let offset = UtcOffset::from_hms(config.timezone_offset_hours, 0, 0).map_err(|err| {
        anyhow!(
            "invalid logging timezone offset {}: {err}",
            config.timezone_offset_hours
        )
    })?;
    let offset_timer = OffsetTime::new(offset, time_format);

    let base = fmt()
        .with_timer(offset_timer)
        .with_file(false)
        .with_line_number(false)
        .with_thread_ids(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

pub fn build_http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("scoop/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|err| anyhow!("构建 HTTP 客户端失败: {err}"))
}

pub fn build_catalog_source(config: &ScoopConfig, http: reqwest::Client) -> TokenListClient {
    TokenListClient::new(
        http,
        config.jupiter.catalog_url.clone(),
        Duration::from_millis(config.timeouts.catalog_ms),
    )
}

pub fn resolve_rpc_client(config: &ScoopConfig) -> Result<Arc<RpcClient>> {
    let url = config.global.rpc_url.trim();
    if url.is_empty() {
        return Err(anyhow!("global.rpc_url 不能为空"));
    }
    let commitment = parse_commitment(&config.lander.commitment)?;
    Ok(Arc::new(RpcClient::new_with_timeout_and_commitment(
        url.to_string(),
        Duration::from_millis(config.timeouts.rpc_ms),
        commitment,
    )))
}

/// 命令行参数优先于配置文件。
pub fn resolve_settings(config: &ScoopConfig, args: &SweepArgs) -> Result<SessionSettings> {
    let target_mint = match args.target_mint {
        Some(mint) => mint,
        None => Pubkey::from_str(config.sweep.target_mint.trim())
            .map_err(|err| anyhow!("sweep.target_mint 无效 {}: {err}", config.sweep.target_mint))?,
    };
    let percentage = match args.percentage {
        Some(value) => Percentage::new(value)?,
        None => config.sweep.percentage,
    };
    Ok(SessionSettings {
        target_mint,
        percentage,
        slippage_bps: args.slippage_bps.unwrap_or(config.sweep.slippage_bps),
        exclusions: ExclusionList::new(config.sweep.excluded_symbols.iter().cloned()),
        verified_only: config.sweep.verified_only,
        prefetch_instructions: config.jupiter.prefetch_instructions,
        catalog_key: config.jupiter.catalog_url.clone(),
    })
}

fn build_signer(config: &ScoopConfig, skip_prompt: bool) -> Result<Arc<dyn BatchSigner>> {
    let keypair = parse_keypair_string(&config.global.wallet.private_key)?;
    if skip_prompt || config.global.wallet.auto_approve {
        Ok(Arc::new(KeypairSigner::new(keypair, AutoApprove)))
    } else {
        Ok(Arc::new(KeypairSigner::new(keypair, PromptApproval)))
    }
}

/// 组装一个连接真实 RPC 与 Jupiter 的清扫会话。
pub fn build_session(config: &ScoopConfig, args: &SweepArgs) -> Result<SweepSession> {
    let settings = resolve_settings(config, args)?;
    let http = build_http_client()?;
    let rpc_client = resolve_rpc_client(config)?;
    let lander = RpcLander::new(rpc_client.clone(), &config.lander, &config.timeouts)?;
    let signer = build_signer(config, args.yes)?;

    let quotes = JupiterApiClient::new(
        http.clone(),
        &config.jupiter,
        &config.timeouts,
        &config.global.logging,
    );
    let services = SessionServices {
        ledger: Arc::new(RpcLedger::new(rpc_client, lander)),
        quotes: Arc::new(quotes),
        signer,
        catalog: Arc::new(build_catalog_source(config, http)),
    };
    info!(
        target: "config",
        wallet = %services.signer.pubkey(),
        target_mint = %settings.target_mint,
        percentage = settings.percentage.value(),
        slippage_bps = settings.slippage_bps,
        "清扫会话已就绪"
    );
    Ok(SweepSession::new(services, settings))
}

pub fn init_config(args: InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("创建目录失败 {}", output_dir.display()))?;

    let target_path = output_dir.join("scoop.yaml");
    if target_path.exists() && !args.force {
        println!(
            "跳过 {}（文件已存在，如需覆盖请加 --force）",
            target_path.display()
        );
        return Ok(());
    }
    fs::write(&target_path, CONFIG_TEMPLATE)
        .with_context(|| format!("写入配置失败 {}", target_path.display()))?;
    println!("已写入 {}", target_path.display());
    Ok(())
}
