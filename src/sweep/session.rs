use std::fmt;
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cache::{AltCache, Cache, InMemoryBackend};

use super::amount::Percentage;
use super::book::ItemBook;
use super::catalog::AssetCatalog;
use super::discovery::{DiscoveryFilter, ExclusionList};
use super::error::{SweepError, SweepResult};
use super::listing::{SweepTotals, sweep_totals};
use super::observer::{DiscoveryObserver, Fanout, SubmissionObserver};
use super::pipeline::{
    DiscoveryReport, DiscoveryRequest, SweepServices, find_quotes, send_tokens, sweep_tokens,
};
use super::ports::{AssetCatalogSource, BatchSigner, LedgerProvider, QuoteService};
use super::quote::QuotePlan;
use super::submission::SubmissionReport;
use super::types::SweepItem;

/// 会话所处阶段。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    Loading,
    CatalogLoaded,
    Quoted,
    Sweeping,
    Swept,
    Sending,
    Sent,
}

impl SessionPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionPhase::Loading => "loading",
            SessionPhase::CatalogLoaded => "catalog_loaded",
            SessionPhase::Quoted => "quoted",
            SessionPhase::Sweeping => "sweeping",
            SessionPhase::Swept => "swept",
            SessionPhase::Sending => "sending",
            SessionPhase::Sent => "sent",
        }
    }

    pub fn is_busy(self) -> bool {
        matches!(self, SessionPhase::Sweeping | SessionPhase::Sending)
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 会话使用的外部能力。
#[derive(Clone)]
pub struct SessionServices {
    pub ledger: Arc<dyn LedgerProvider>,
    pub quotes: Arc<dyn QuoteService>,
    pub signer: Arc<dyn BatchSigner>,
    pub catalog: Arc<dyn AssetCatalogSource>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub target_mint: Pubkey,
    pub percentage: Percentage,
    pub slippage_bps: u16,
    pub exclusions: ExclusionList,
    pub verified_only: bool,
    pub prefetch_instructions: bool,
    /// 代币目录的缓存键，通常为目录 URL。
    pub catalog_key: String,
}

impl SessionSettings {
    pub fn plan(&self) -> QuotePlan {
        QuotePlan::new(self.target_mint, self.percentage, self.slippage_bps)
    }
}

/// 一个钱包的清扫会话：持有清单、目录缓存与阶段状态。
pub struct SweepSession {
    services: SessionServices,
    settings: SessionSettings,
    catalogs: Cache<InMemoryBackend<String, AssetCatalog>>,
    alt_cache: AltCache,
    book: ItemBook,
    phase: watch::Sender<SessionPhase>,
}

impl SweepSession {
    /// 需要在 tokio 运行时内调用，清单任务随之启动。
    pub fn new(services: SessionServices, settings: SessionSettings) -> Self {
        let (book, _handle) = ItemBook::spawn();
        let (phase, _) = watch::channel(SessionPhase::Loading);
        Self {
            services,
            settings,
            catalogs: Cache::new(InMemoryBackend::default()),
            alt_cache: AltCache::new(),
            book,
            phase,
        }
    }

    pub fn owner(&self) -> Pubkey {
        self.services.signer.pubkey()
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SessionSettings {
        &mut self.settings
    }

    pub fn phase(&self) -> SessionPhase {
        *self.phase.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionPhase> {
        self.phase.subscribe()
    }

    /// 首次调用时加载代币目录，之后直接复用缓存。
    pub async fn catalog(&self) -> SweepResult<Arc<AssetCatalog>> {
        let source = self.services.catalog.clone();
        let label = self.settings.catalog_key.clone();
        let catalog = self
            .catalogs
            .load_or_fetch(self.settings.catalog_key.clone(), |_| async move {
                AssetCatalog::load(source.as_ref(), &label).await
            })
            .await?;
        if self.phase() == SessionPhase::Loading {
            self.set_phase(SessionPhase::CatalogLoaded);
        }
        Ok(catalog)
    }

    /// 发现余额并报价，结果写入清单。
    pub async fn discover(
        &self,
        observer: &dyn DiscoveryObserver,
        cancel: &CancellationToken,
    ) -> SweepResult<DiscoveryReport> {
        self.ensure_idle("discover")?;
        let catalog = self.catalog().await?;
        let request = DiscoveryRequest {
            owner: self.owner(),
            plan: QuotePlan::new(
                self.settings.target_mint,
                Percentage::FULL,
                self.settings.slippage_bps,
            ),
            filter: DiscoveryFilter {
                exclusions: Some(&self.settings.exclusions),
                verified_only: self.settings.verified_only,
            },
            prefetch_instructions: self.settings.prefetch_instructions,
        };
        let fanout = Fanout(&self.book, observer);
        let report = find_quotes(self.services(), &catalog, &request, &fanout, cancel).await?;
        self.set_phase(SessionPhase::Quoted);
        Ok(report)
    }

    pub async fn items(&self) -> SweepResult<Vec<SweepItem>> {
        self.book.snapshot().await
    }

    pub async fn set_included(&self, mint: &Pubkey, included: bool) -> SweepResult<bool> {
        self.ensure_idle("set_included")?;
        Ok(self.book.set_included(Some(*mint), included).await? > 0)
    }

    pub async fn set_all_included(&self, included: bool) -> SweepResult<usize> {
        self.ensure_idle("set_all_included")?;
        self.book.set_included(None, included).await
    }

    /// 按当前比例汇总已勾选且已报价的代币。
    pub async fn totals(&self) -> SweepResult<SweepTotals> {
        let items = self.items().await?;
        Ok(sweep_totals(&items, self.settings.percentage))
    }

    /// 把勾选的代币兑换为目标代币。
    pub async fn sweep(
        &self,
        observer: &dyn SubmissionObserver,
        cancel: &CancellationToken,
    ) -> SweepResult<SubmissionReport> {
        self.ensure_phase(SessionPhase::Quoted, "sweep")?;
        let plan = self.settings.plan();
        self.run_batch(SessionPhase::Sweeping, SessionPhase::Swept, |services, items| {
            let fanout = Fanout(&self.book, observer);
            async move { sweep_tokens(services, &items, &plan, &fanout, cancel).await }
        })
        .await
    }

    /// 把勾选的代币直接转给 `destination`。
    pub async fn send(
        &self,
        destination: &Pubkey,
        observer: &dyn SubmissionObserver,
        cancel: &CancellationToken,
    ) -> SweepResult<SubmissionReport> {
        self.ensure_phase(SessionPhase::Quoted, "send")?;
        let percentage = self.settings.percentage;
        self.run_batch(SessionPhase::Sending, SessionPhase::Sent, |services, items| {
            let fanout = Fanout(&self.book, observer);
            async move {
                send_tokens(services, &items, destination, percentage, &fanout, cancel).await
            }
        })
        .await
    }

    /// 丢弃报价与提交结果，回到加载阶段以便重新发现。
    pub fn reload(&self) {
        self.book.reset();
        self.set_phase(SessionPhase::Loading);
    }

    async fn run_batch<'s, F, Fut>(
        &'s self,
        running: SessionPhase,
        finished: SessionPhase,
        run: F,
    ) -> SweepResult<SubmissionReport>
    where
        F: FnOnce(SweepServices<'s>, Vec<SweepItem>) -> Fut,
        Fut: std::future::Future<Output = SweepResult<SubmissionReport>>,
    {
        let items = self.book.snapshot().await?;
        let capture = self.book.capture_items().await?;
        self.set_phase(running);

        match run(self.services(), items).await {
            Ok(report) => {
                self.set_phase(finished);
                Ok(report)
            }
            Err(err) => {
                if matches!(err, SweepError::Rejected | SweepError::Signer(_)) {
                    warn!(
                        target: "sweep::submission",
                        error = %err,
                        "签名未完成，清单状态回滚"
                    );
                    self.book.restore_items(capture);
                }
                self.set_phase(SessionPhase::Quoted);
                Err(err)
            }
        }
    }

    fn services(&self) -> SweepServices<'_> {
        SweepServices {
            ledger: self.services.ledger.as_ref(),
            quotes: self.services.quotes.as_ref(),
            signer: self.services.signer.as_ref(),
            alt_cache: &self.alt_cache,
        }
    }

    fn set_phase(&self, phase: SessionPhase) {
        let previous = self.phase.send_replace(phase);
        if previous != phase {
            info!(
                target: "sweep::submission",
                from = %previous,
                to = %phase,
                "会话阶段切换"
            );
        }
    }

    fn ensure_idle(&self, operation: &'static str) -> SweepResult<()> {
        let phase = self.phase();
        if phase.is_busy() {
            return Err(SweepError::InvalidPhase { phase, operation });
        }
        Ok(())
    }

    fn ensure_phase(&self, expected: SessionPhase, operation: &'static str) -> SweepResult<()> {
        let phase = self.phase();
        if phase != expected {
            return Err(SweepError::InvalidPhase { phase, operation });
        }
        Ok(())
    }
}
