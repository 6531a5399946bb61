use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::VersionedTransaction;
use tokio_util::sync::CancellationToken;

use crate::cache::AltCache;

use super::amount::Percentage;
use super::catalog::AssetCatalog;
use super::discovery::{DiscoveryFilter, ExclusionList};
use super::error::SweepError;
use super::observer::NoopObserver;
use super::pipeline::{DiscoveryRequest, SweepServices, find_quotes, send_tokens, sweep_tokens};
use super::ports::BatchSigner;
use super::quote::QuotePlan;
use super::session::{SessionPhase, SessionServices, SessionSettings, SweepSession};
use super::testing::{
    FakeCatalog, FakeLedger, FakeQuoteService, FakeSigner, Recorded, RecordingObserver,
    catalog_entry, held_balance,
};
use super::transfer::transfer_instructions;
use super::types::{
    AssetCatalogEntry, ErrorStage, LifecycleState, SweepItem, TokenProgramKind,
};

struct Harness {
    ledger: FakeLedger,
    quotes: FakeQuoteService,
    signer: FakeSigner,
    alt_cache: AltCache,
    entries: Vec<AssetCatalogEntry>,
    target: Pubkey,
}

impl Harness {
    fn new(signer: FakeSigner) -> Self {
        Self {
            ledger: FakeLedger::new(),
            quotes: FakeQuoteService::new(),
            signer,
            alt_cache: AltCache::new(),
            entries: Vec::new(),
            target: Pubkey::new_unique(),
        }
    }

    fn approving() -> Self {
        Self::new(FakeSigner::approving())
    }

    fn owner(&self) -> Pubkey {
        self.signer.pubkey()
    }

    fn hold(&mut self, symbol: &str, decimals: u8, raw: u64) -> Pubkey {
        let mint = Pubkey::new_unique();
        self.entries.push(catalog_entry(mint, symbol, decimals, true));
        let owner = self.owner();
        self.ledger
            .add_token_account(TokenProgramKind::Legacy, &owner, mint, raw);
        mint
    }

    fn services(&self) -> SweepServices<'_> {
        SweepServices {
            ledger: &self.ledger,
            quotes: &self.quotes,
            signer: &self.signer,
            alt_cache: &self.alt_cache,
        }
    }

    fn catalog(&self) -> AssetCatalog {
        AssetCatalog::from_entries(self.entries.clone())
    }

    fn plan(&self, percentage: u8) -> QuotePlan {
        QuotePlan::new(self.target, Percentage::new(percentage).unwrap(), 100)
    }

    async fn discover(&self, observer: &RecordingObserver) -> Vec<SweepItem> {
        let request = DiscoveryRequest {
            owner: self.owner(),
            plan: self.plan(100),
            filter: DiscoveryFilter::default(),
            prefetch_instructions: false,
        };
        let report = find_quotes(
            self.services(),
            &self.catalog(),
            &request,
            observer,
            &CancellationToken::new(),
        )
        .await
        .expect("discovery");
        report.balances.into_iter().map(SweepItem::new).collect()
    }
}

fn transfer_amount(tx: &VersionedTransaction) -> Option<u64> {
    let keys = tx.message.static_account_keys();
    tx.message.instructions().iter().find_map(|ix| {
        let program = keys.get(usize::from(ix.program_id_index))?;
        if *program != TokenProgramKind::Legacy.program_id() || ix.data.first() != Some(&12) {
            return None;
        }
        let bytes: [u8; 8] = ix.data.get(1..9)?.try_into().ok()?;
        Some(u64::from_le_bytes(bytes))
    })
}

#[tokio::test]
async fn only_non_zero_balances_are_quoted() {
    let mut harness = Harness::approving();
    let x = harness.hold("XXX", 6, 1_000_000);
    let y = harness.hold("YYY", 6, 0);
    let observer = RecordingObserver::default();

    let items = harness.discover(&observer).await;

    assert_eq!(items.len(), 2);
    assert_eq!(harness.quotes.quote_calls(), vec![(x, 1_000_000)]);
    assert_eq!(observer.assets(), vec![x]);
    assert_eq!(observer.quotes(), vec![x]);
    assert!(!observer.mentions(&y));
}

#[tokio::test]
async fn every_balance_settles_independently() {
    let mut harness = Harness::approving();
    let mints: Vec<Pubkey> = (0..5)
        .map(|i| harness.hold(&format!("T{i}"), 6, 1_000 + i))
        .collect();
    harness.quotes.fail_quote(mints[1]);
    harness.quotes.fail_quote(mints[3]);
    let observer = RecordingObserver::default();

    harness.discover(&observer).await;

    assert_eq!(observer.assets().len(), 5);
    assert_eq!(observer.quotes().len(), 3);
    let errors = observer.errors();
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|(_, err)| err.stage == ErrorStage::Quote));

    let events = observer.events();
    for mint in &mints {
        let asset = events
            .iter()
            .position(|event| *event == Recorded::Asset(*mint))
            .expect("asset event");
        let outcome = events
            .iter()
            .position(|event| {
                matches!(event, Recorded::Quote(m) | Recorded::Error(m, _) if m == mint)
            })
            .expect("outcome event");
        assert!(asset < outcome);
    }
}

#[tokio::test]
async fn half_percentage_quotes_and_sends_exact_amount() {
    let mut harness = Harness::approving();
    let x = harness.hold("XXX", 6, 1_000_000);
    let items = harness.discover(&RecordingObserver::default()).await;
    let plan = harness.plan(50);

    let report = sweep_tokens(
        harness.services(),
        &items,
        &plan,
        &NoopObserver,
        &CancellationToken::new(),
    )
    .await
    .expect("sweep");
    assert_eq!(report.landed.len(), 1);
    assert!(harness.quotes.quote_calls().contains(&(x, 500_000)));

    let destination = Pubkey::new_unique();
    let report = send_tokens(
        harness.services(),
        &items,
        &destination,
        plan.percentage,
        &NoopObserver,
        &CancellationToken::new(),
    )
    .await
    .expect("send");
    assert_eq!(report.landed.len(), 1);
    let sent = harness.ledger.submitted();
    assert_eq!(sent.last().and_then(transfer_amount), Some(500_000));
}

#[test]
fn quote_and_transfer_amounts_are_identical() {
    let payer = Pubkey::new_unique();
    let destination = Pubkey::new_unique();
    for raw in [0u64, 1, 7, 999_999, 1 << 53, (1 << 53) + 1, (1 << 63) - 1] {
        let balance = held_balance("AAA", 9, raw);
        for pct in [0u8, 1, 33, 50, 99, 100] {
            let plan = QuotePlan::new(Pubkey::new_unique(), Percentage::new(pct).unwrap(), 50);
            let quoted = plan.amount_for(&balance);
            assert_eq!(u128::from(quoted), u128::from(raw) * u128::from(pct) / 100);

            let ixs = transfer_instructions(&payer, &balance, &destination, quoted);
            match ixs.get(1) {
                Some(transfer) => {
                    let bytes: [u8; 8] = transfer.data[1..9].try_into().unwrap();
                    assert_eq!(u64::from_le_bytes(bytes), quoted);
                }
                None => assert_eq!(quoted, 0),
            }
        }
    }
}

#[tokio::test]
async fn batch_shares_one_blockhash_and_one_signature_call() {
    let mut harness = Harness::approving();
    for i in 0..3 {
        harness.hold(&format!("T{i}"), 6, 10_000);
    }
    let items = harness.discover(&RecordingObserver::default()).await;

    let report = sweep_tokens(
        harness.services(),
        &items,
        &harness.plan(100),
        &NoopObserver,
        &CancellationToken::new(),
    )
    .await
    .expect("sweep");

    assert_eq!(report.landed.len(), 3);
    assert_eq!(harness.signer.calls(), 1);
    assert_eq!(harness.ledger.blockhash_calls(), 1);
    let submitted = harness.ledger.submitted();
    assert_eq!(submitted.len(), 3);
    for tx in submitted {
        assert_eq!(*tx.message.recent_blockhash(), harness.ledger.blockhash());
    }
}

#[tokio::test]
async fn build_failure_is_reported_apart_from_submission() {
    let mut harness = Harness::approving();
    let good_a = harness.hold("AAA", 6, 5_000);
    let good_b = harness.hold("BBB", 6, 6_000);
    let broken = harness.hold("CCC", 6, 7_000);
    harness.quotes.fail_build(broken);
    let items = harness.discover(&RecordingObserver::default()).await;
    let observer = RecordingObserver::default();

    let report = sweep_tokens(
        harness.services(),
        &items,
        &harness.plan(100),
        &observer,
        &CancellationToken::new(),
    )
    .await
    .expect("sweep");

    let mut landed: Vec<Pubkey> = report.landed.iter().map(|(mint, _)| *mint).collect();
    landed.sort();
    let mut expected = vec![good_a, good_b];
    expected.sort();
    assert_eq!(landed, expected);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, broken);
    assert_eq!(report.failed[0].1.stage, ErrorStage::Build);

    let errors = observer.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].1.stage, ErrorStage::Build);
    assert!(observer.states_for(&broken).is_empty());
    assert_eq!(harness.ledger.submitted().len(), 2);
}

#[tokio::test]
async fn failed_submission_does_not_affect_siblings() {
    let mut harness = Harness::approving();
    let ok = harness.hold("AAA", 6, 5_000);
    let bad = harness.hold("BBB", 6, 6_000);
    harness.ledger.fail_submission_for(bad);
    let items = harness.discover(&RecordingObserver::default()).await;
    let observer = RecordingObserver::default();

    let report = sweep_tokens(
        harness.services(),
        &items,
        &harness.plan(100),
        &observer,
        &CancellationToken::new(),
    )
    .await
    .expect("sweep");

    assert_eq!(report.landed.len(), 1);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].1.stage, ErrorStage::Submission);
    assert_eq!(
        observer.states_for(&ok),
        vec![LifecycleState::Swapping, LifecycleState::Swapped]
    );
    assert_eq!(
        observer.states_for(&bad),
        vec![LifecycleState::Swapping, LifecycleState::Error]
    );
}

#[tokio::test]
async fn shared_lookup_table_is_fetched_once() {
    let mut harness = Harness::approving();
    let a = harness.hold("AAA", 6, 5_000);
    let b = harness.hold("BBB", 6, 6_000);
    let table = Pubkey::new_unique();
    harness
        .ledger
        .add_lookup_table(table, &[Pubkey::new_unique(), Pubkey::new_unique()]);
    harness.quotes.use_lookup_tables(a, vec![table]);
    harness.quotes.use_lookup_tables(b, vec![table]);
    let items = harness.discover(&RecordingObserver::default()).await;

    for _ in 0..2 {
        let report = sweep_tokens(
            harness.services(),
            &items,
            &harness.plan(100),
            &NoopObserver,
            &CancellationToken::new(),
        )
        .await
        .expect("sweep");
        assert_eq!(report.landed.len(), 2);
    }
    assert_eq!(harness.ledger.get_accounts_calls(), 1);
}

#[tokio::test]
async fn missing_lookup_table_fails_the_build() {
    let mut harness = Harness::approving();
    let a = harness.hold("AAA", 6, 5_000);
    harness.quotes.use_lookup_tables(a, vec![Pubkey::new_unique()]);
    let items = harness.discover(&RecordingObserver::default()).await;

    let report = sweep_tokens(
        harness.services(),
        &items,
        &harness.plan(100),
        &NoopObserver,
        &CancellationToken::new(),
    )
    .await
    .expect("sweep");

    assert!(report.landed.is_empty());
    assert_eq!(report.failed[0].1.stage, ErrorStage::Build);
    assert_eq!(harness.signer.calls(), 0);
}

#[tokio::test]
async fn prefetch_reports_instructions_and_build_errors() {
    let mut harness = Harness::approving();
    let good = harness.hold("AAA", 6, 5_000);
    let broken = harness.hold("BBB", 6, 6_000);
    harness.quotes.fail_build(broken);
    let observer = RecordingObserver::default();
    let request = DiscoveryRequest {
        owner: harness.owner(),
        plan: harness.plan(100),
        filter: DiscoveryFilter::default(),
        prefetch_instructions: true,
    };

    let report = find_quotes(
        harness.services(),
        &harness.catalog(),
        &request,
        &observer,
        &CancellationToken::new(),
    )
    .await
    .expect("discovery");

    assert_eq!(report.quoted, 2);
    assert_eq!(report.built, 1);
    assert_eq!(observer.instructions(), vec![good]);
    let errors = observer.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, broken);
    assert_eq!(errors[0].1.stage, ErrorStage::Build);
}

#[tokio::test]
async fn cancelled_discovery_returns_early() {
    let mut harness = Harness::approving();
    harness.hold("AAA", 6, 5_000);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let request = DiscoveryRequest {
        owner: harness.owner(),
        plan: harness.plan(100),
        filter: DiscoveryFilter::default(),
        prefetch_instructions: false,
    };
    let result = find_quotes(
        harness.services(),
        &harness.catalog(),
        &request,
        &NoopObserver,
        &cancel,
    )
    .await;
    assert!(matches!(result, Err(SweepError::Cancelled)));
    assert!(harness.quotes.quote_calls().is_empty());
}

struct SessionFixture {
    session: SweepSession,
    ledger: Arc<FakeLedger>,
    quotes: Arc<FakeQuoteService>,
    signer: Arc<FakeSigner>,
    catalog: Arc<FakeCatalog>,
    mints: Vec<Pubkey>,
}

fn session_with(signer: FakeSigner, balances: &[(&str, u64)]) -> SessionFixture {
    let ledger = Arc::new(FakeLedger::new());
    let signer = Arc::new(signer);
    let owner = signer.pubkey();
    let mut entries = Vec::new();
    let mut mints = Vec::new();
    for (symbol, raw) in balances {
        let mint = Pubkey::new_unique();
        entries.push(catalog_entry(mint, symbol, 6, true));
        ledger.add_token_account(TokenProgramKind::Legacy, &owner, mint, *raw);
        mints.push(mint);
    }
    let catalog = Arc::new(FakeCatalog::new(entries));
    let quotes = Arc::new(FakeQuoteService::new());
    let services = SessionServices {
        ledger: ledger.clone(),
        quotes: quotes.clone(),
        signer: signer.clone(),
        catalog: catalog.clone(),
    };
    let settings = SessionSettings {
        target_mint: Pubkey::new_unique(),
        percentage: Percentage::FULL,
        slippage_bps: 100,
        exclusions: ExclusionList::default(),
        verified_only: false,
        prefetch_instructions: false,
        catalog_key: "memory".to_string(),
    };
    SessionFixture {
        session: SweepSession::new(services, settings),
        ledger,
        quotes,
        signer,
        catalog,
        mints,
    }
}

#[tokio::test]
async fn rejected_batch_reverts_every_item() {
    let fixture = session_with(FakeSigner::rejecting(), &[("AAA", 1_000), ("BBB", 2_000)]);
    let cancel = CancellationToken::new();
    fixture
        .session
        .discover(&NoopObserver, &cancel)
        .await
        .expect("discover");
    let before: Vec<LifecycleState> = fixture
        .session
        .items()
        .await
        .unwrap()
        .iter()
        .map(|item| item.state)
        .collect();
    assert!(before.iter().all(|state| *state == LifecycleState::Quoted));

    let observer = RecordingObserver::default();
    let result = fixture.session.sweep(&observer, &cancel).await;

    assert!(matches!(result, Err(SweepError::Rejected)));
    assert_eq!(fixture.signer.calls(), 1);
    assert!(fixture.ledger.submitted().is_empty());
    assert!(observer.states().is_empty());
    let after: Vec<LifecycleState> = fixture
        .session
        .items()
        .await
        .unwrap()
        .iter()
        .map(|item| item.state)
        .collect();
    assert_eq!(before, after);
    assert_eq!(fixture.session.phase(), SessionPhase::Quoted);
}

#[tokio::test]
async fn rejected_batch_restores_items_that_failed_requote() {
    let fixture = session_with(FakeSigner::rejecting(), &[("AAA", 1_000), ("BBB", 2_000)]);
    let cancel = CancellationToken::new();
    fixture
        .session
        .discover(&NoopObserver, &cancel)
        .await
        .expect("discover");
    let before = fixture.session.items().await.unwrap();

    fixture.quotes.fail_quote(fixture.mints[1]);
    let result = fixture.session.sweep(&NoopObserver, &cancel).await;
    assert!(matches!(result, Err(SweepError::Rejected)));

    let after = fixture.session.items().await.unwrap();
    assert_eq!(after.len(), before.len());
    for (old, new) in before.iter().zip(&after) {
        assert_eq!(old.mint(), new.mint());
        assert_eq!(old.state, new.state);
        assert_eq!(old.included, new.included);
        assert_eq!(
            old.quote_result().map(|quote| quote.output_amount),
            new.quote_result().map(|quote| quote.output_amount)
        );
        assert!(new.last_error.is_none());
    }
    let requote_failed = after
        .iter()
        .find(|item| item.mint() == fixture.mints[1])
        .unwrap();
    assert_eq!(requote_failed.state, LifecycleState::Quoted);
    assert!(requote_failed.included);
}

#[tokio::test]
async fn rediscovery_picks_up_changed_balances() {
    let fixture = session_with(
        FakeSigner::approving(),
        &[("AAA", 1_000), ("BBB", 2_000), ("CCC", 300)],
    );
    let cancel = CancellationToken::new();
    fixture
        .session
        .discover(&NoopObserver, &cancel)
        .await
        .expect("discover");

    fixture.ledger.set_balance(fixture.mints[0], 0);
    fixture.ledger.set_balance(fixture.mints[1], 1_500);
    fixture.ledger.close_accounts(fixture.mints[2]);
    fixture.session.reload();
    fixture
        .session
        .discover(&NoopObserver, &cancel)
        .await
        .expect("rediscover");

    let items = fixture.session.items().await.unwrap();
    assert_eq!(items.len(), 2);
    let drained = items.iter().find(|item| item.mint() == fixture.mints[0]).unwrap();
    assert_eq!(drained.balance.raw_amount, 0);
    assert!(!drained.included);
    assert!(drained.quote_result().is_none());
    let reduced = items.iter().find(|item| item.mint() == fixture.mints[1]).unwrap();
    assert_eq!(reduced.balance.raw_amount, 1_500);
    assert_eq!(
        reduced.quote_result().map(|quote| quote.input_amount),
        Some(1_500)
    );

    let destination = Pubkey::new_unique();
    let report = fixture
        .session
        .send(&destination, &NoopObserver, &cancel)
        .await
        .expect("send");
    assert_eq!(report.landed.len(), 1);
    assert_eq!(report.landed[0].0, fixture.mints[1]);
    let amounts: Vec<Option<u64>> = fixture.ledger.submitted().iter().map(transfer_amount).collect();
    assert_eq!(amounts, vec![Some(1_500)]);
}

#[tokio::test]
async fn session_send_flow_and_reload() {
    let fixture = session_with(
        FakeSigner::approving(),
        &[("AAA", 1_000), ("BBB", 2_000), ("ZERO", 0)],
    );
    let cancel = CancellationToken::new();
    let phases = fixture.session.subscribe();
    assert_eq!(fixture.session.phase(), SessionPhase::Loading);

    fixture
        .session
        .discover(&NoopObserver, &cancel)
        .await
        .expect("discover");
    assert_eq!(*phases.borrow(), SessionPhase::Quoted);
    assert!(!fixture.session.set_included(&fixture.mints[2], true).await.unwrap());
    assert!(fixture.session.set_included(&fixture.mints[1], false).await.unwrap());

    let totals = fixture.session.totals().await.unwrap();
    assert_eq!(totals.items, 1);
    assert_eq!(totals.quoted_output, 500);

    let destination = Pubkey::new_unique();
    let report = fixture
        .session
        .send(&destination, &NoopObserver, &cancel)
        .await
        .expect("send");
    assert_eq!(report.landed.len(), 1);
    assert_eq!(report.landed[0].0, fixture.mints[0]);
    assert_eq!(fixture.session.phase(), SessionPhase::Sent);

    let items = fixture.session.items().await.unwrap();
    let sent = items.iter().find(|item| item.mint() == fixture.mints[0]).unwrap();
    assert_eq!(sent.state, LifecycleState::Sent);
    assert!(sent.signature.is_some());

    let again = fixture.session.sweep(&NoopObserver, &cancel).await;
    assert!(matches!(again, Err(SweepError::InvalidPhase { .. })));

    fixture.session.reload();
    assert_eq!(fixture.session.phase(), SessionPhase::Loading);
    let items = fixture.session.items().await.unwrap();
    assert!(items.iter().all(|item| item.state == LifecycleState::Pending));
    assert!(items.iter().all(|item| item.quote_result().is_none()));

    fixture
        .session
        .discover(&NoopObserver, &cancel)
        .await
        .expect("rediscover");
    assert_eq!(fixture.catalog.calls(), 1);
}
