use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use solana_sdk::pubkey::Pubkey;

#[derive(Parser, Debug)]
#[command(name = "scoop", version, about = "把钱包里的零散代币一次性兑换或转出")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 scoop.yaml 或 config/scoop.yaml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 加载代币目录并输出概况
    Catalog,
    /// 发现余额并报价，不提交交易
    Scan(SweepArgs),
    /// 报价后把勾选的代币兑换为目标代币
    Sweep(SweepArgs),
    /// 报价后把勾选的代币直接转给指定钱包
    Send(SendArgs),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug, Clone, Default)]
pub struct SweepArgs {
    #[arg(long, value_name = "MINT", help = "目标代币 mint，缺省使用配置 sweep.target_mint")]
    pub target_mint: Option<Pubkey>,
    #[arg(long, value_name = "PCT", help = "每个代币参与的比例（0-100）")]
    pub percentage: Option<u8>,
    #[arg(long, value_name = "BPS", help = "报价滑点（基点）")]
    pub slippage_bps: Option<u16>,
    #[arg(
        long,
        value_name = "MINT",
        value_delimiter = ',',
        help = "只处理这些 mint，逗号分隔；缺省处理全部非零余额"
    )]
    pub only: Vec<Pubkey>,
    #[arg(long, short = 'y', help = "跳过整批签名前的确认提示")]
    pub yes: bool,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    #[arg(long, value_name = "WALLET", help = "接收代币的钱包地址")]
    pub to: Pubkey,
    #[command(flatten)]
    pub sweep: SweepArgs,
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}
