use crate::ui;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use daily_gm::{
    address::Address,
    chain::ChainTarget,
    config::AppConfig,
    gm_counter::{
        GmCountClient,
        GmStats,
    },
    network::{
        DEFAULT_SETTLE_DELAY,
        NetworkGuard,
        SwitchOutcome,
    },
    notice::{
        Notice,
        Notifier,
    },
    observer::{
        ChainObserver,
        NetworkLabel,
    },
    platform::{
        HostContext,
        Navigator,
        NoHost,
        PlatformContext,
        PlatformController,
        PlatformKind,
        PlatformReader,
        SystemBrowser,
    },
    rpc_wallet::RpcWallet,
    submission::{
        GmRequest,
        RequestKind,
        SubmissionEvent,
        SubmissionOutcome,
        SubmitResult,
        Submitter,
    },
    wallet::{
        TxHash,
        WalletConnector,
    },
};
use futures::{
    FutureExt,
    StreamExt,
    future::LocalBoxFuture,
    stream::FuturesUnordered,
};
use std::{
    fs,
    path::Path,
    rc::Rc,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    debug,
    error,
    info,
};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling,
};
use tracing_subscriber::EnvFilter;

const NETWORK_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct AppSnapshot {
    pub target: ChainTarget,
    pub platform: PlatformContext,
    pub network: Option<NetworkLabel>,
    pub account: Option<Address>,
    pub stats: Option<GmStats>,
    pub notice: Option<Notice>,
    pub sending_self: bool,
    pub sending_recipient: bool,
    pub last_tx: Option<TxHash>,
}

pub struct AppChannels {
    pub notices: mpsc::UnboundedReceiver<Notice>,
    pub events: mpsc::UnboundedReceiver<SubmissionEvent>,
}

/// Work that suspends on the wallet or the explorer, polled by the run loop.
pub enum TaskDone {
    Submission(RequestKind, SubmitResult),
    Remediation(SwitchOutcome),
    Stats(Result<GmStats>),
}

pub type PendingTask = LocalBoxFuture<'static, TaskDone>;

pub struct AppController<W, H, N> {
    config: AppConfig,
    wallet: Rc<W>,
    platform: PlatformController<H, N>,
    reader: PlatformReader,
    observer: Rc<ChainObserver>,
    submitter: Rc<Submitter<Rc<W>>>,
    guard: NetworkGuard,
    notifier: Notifier,
    counter: Option<GmCountClient>,
    network: Option<NetworkLabel>,
    account: Option<Address>,
    stats: Option<GmStats>,
    notice: Option<Notice>,
    last_tx: Option<TxHash>,
    stats_in_flight: bool,
}

impl<W, H, N> AppController<W, H, N>
where
    W: WalletConnector + 'static,
    H: HostContext,
    N: Navigator,
{
    pub fn new(
        config: AppConfig,
        wallet: W,
        host: H,
        navigator: N,
        counter: Option<GmCountClient>,
    ) -> (Self, AppChannels) {
        let (notifier, notices) = Notifier::channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let wallet = Rc::new(wallet);
        let guard = NetworkGuard::new(DEFAULT_SETTLE_DELAY, notifier.clone());
        let submitter = Submitter::new(
            wallet.clone(),
            guard.clone(),
            config.target,
            config.contract.address,
            notifier.clone(),
        )
        .with_events(events_tx);
        let platform = PlatformController::new(host, navigator, config.probe_timeout);
        let reader = platform.reader();
        let controller = Self {
            observer: Rc::new(ChainObserver::new(config.target)),
            config,
            wallet,
            platform,
            reader,
            submitter: Rc::new(submitter),
            guard,
            notifier,
            counter,
            network: None,
            account: None,
            stats: None,
            notice: None,
            last_tx: None,
            stats_in_flight: false,
        };
        (controller, AppChannels { notices, events })
    }

    #[cfg(test)]
    pub fn wallet(&self) -> &Rc<W> {
        &self.wallet
    }

    /// Settles the platform, then lets the observer render.
    pub async fn start(&mut self) -> PlatformKind {
        let kind = self.platform.bootstrap().await;
        self.observer.mount(&self.reader);
        self.refresh_network().await;
        info!(
            %kind,
            chain = %self.config.target,
            contract = %self.config.contract.address,
            "app started"
        );
        kind
    }

    pub async fn refresh_network(&mut self) {
        self.network = self.observer.label(&self.wallet).await;
        self.account = self.wallet.account().await;
    }

    pub fn submit_task(&self, request: GmRequest) -> PendingTask {
        let submitter = self.submitter.clone();
        let kind = request.kind();
        async move { TaskDone::Submission(kind, submitter.submit(request).await) }.boxed_local()
    }

    pub fn remediation_task(&self) -> PendingTask {
        let wallet = self.wallet.clone();
        let observer = self.observer.clone();
        let guard = self.guard.clone();
        let notifier = self.notifier.clone();
        async move { TaskDone::Remediation(observer.remediate(&wallet, &guard, &notifier).await) }
            .boxed_local()
    }

    /// `None` when there is nothing to count yet or a refresh is already running.
    pub fn stats_task(&mut self) -> Option<PendingTask> {
        if self.stats_in_flight {
            return None;
        }
        let counter = self.counter.clone()?;
        let account = self.account?;
        self.stats_in_flight = true;
        Some(async move { TaskDone::Stats(counter.stats(&account).await) }.boxed_local())
    }

    /// Returns true when the wallet network should be read again.
    pub fn apply(&mut self, done: TaskDone) -> bool {
        match done {
            TaskDone::Submission(kind, SubmitResult::Ignored) => {
                debug!(%kind, "duplicate submit ignored");
                false
            }
            TaskDone::Submission(kind, SubmitResult::Finished(outcome)) => {
                debug!(%kind, ?outcome, "submission task done");
                if let SubmissionOutcome::Succeeded(tx) = outcome {
                    self.last_tx = Some(tx);
                }
                true
            }
            TaskDone::Remediation(outcome) => {
                debug!(?outcome, "network remediation done");
                true
            }
            TaskDone::Stats(result) => {
                self.stats_in_flight = false;
                match result {
                    Ok(stats) => self.stats = Some(stats),
                    Err(err) => {
                        error!(?err, "failed to load GM stats");
                        self.notifier.error("Failed to load GM stats");
                    }
                }
                false
            }
        }
    }

    pub fn has_stats(&self) -> bool {
        self.stats.is_some()
    }

    pub fn on_notice(&mut self, notice: Notice) {
        self.notice = Some(notice);
    }

    /// Returns true when an interaction finished and the modal should close.
    pub fn on_submission_event(&mut self, event: SubmissionEvent) -> bool {
        match event {
            SubmissionEvent::Transition { .. } => false,
            SubmissionEvent::Completed { kind, tx } => {
                info!(%kind, %tx, "gm completed");
                self.last_tx = Some(tx);
                true
            }
        }
    }

    pub async fn open_home(&self) {
        self.platform.open_url(&self.config.home_url).await;
    }

    pub async fn open_last_tx(&self) {
        match self.last_tx {
            Some(tx) => self.platform.open_url(&self.config.tx_url(&tx)).await,
            None => self.notifier.info("No GM sent yet"),
        }
    }

    pub async fn quit(&self) {
        self.platform.close().await;
    }

    pub fn snapshot(&self) -> AppSnapshot {
        AppSnapshot {
            target: self.config.target,
            platform: self.reader.snapshot(),
            network: self.network.clone(),
            account: self.account,
            stats: self.stats,
            notice: self.notice.clone(),
            sending_self: self.submitter.is_pending(RequestKind::ToSelf),
            sending_recipient: self.submitter.is_pending(RequestKind::ToRecipient),
            last_tx: self.last_tx,
        }
    }
}

pub fn init_tracing(log_dir: &Path) -> Result<WorkerGuard> {
    fs::create_dir_all(log_dir)
        .wrap_err_with(|| format!("failed to create log directory {}", log_dir.display()))?;
    let appender = rolling::daily(log_dir, "daily-gm.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("daily_gm=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|err| eyre!("failed to install tracing subscriber: {err}"))?;
    Ok(guard)
}

pub async fn run_app(config: AppConfig) -> Result<()> {
    let wallet = RpcWallet::new(&config.rpc_url, config.account, config.can_switch)
        .wrap_err("failed to set up wallet connection")?;
    let counter = GmCountClient::new(
        &config.explorer_api_url,
        config.contract.address,
        config.contract.from_block,
    )?;
    let (controller, channels) =
        AppController::new(config, wallet, NoHost, SystemBrowser, Some(counter));
    let mut ui_state = ui::UiState::default();
    let mut input_events = ui::input_event_stream();

    info!("Starting UI");
    ui::terminal_enter(&mut ui_state)?;
    let res = run_loop(controller, channels, &mut ui_state, &mut input_events).await;
    ui::terminal_exit()?;
    res
}

async fn run_loop<W, H, N>(
    mut controller: AppController<W, H, N>,
    mut channels: AppChannels,
    ui_state: &mut ui::UiState,
    input_events: &mut ui::InputEventReceiver,
) -> Result<()>
where
    W: WalletConnector + 'static,
    H: HostContext,
    N: Navigator,
{
    ui::draw(ui_state, &controller.snapshot()).wrap_err("initial draw failed")?;
    controller.start().await;

    let mut tasks: FuturesUnordered<PendingTask> = FuturesUnordered::new();
    tasks.extend(controller.stats_task());
    let mut ticker = time::interval(NETWORK_POLL_INTERVAL);

    loop {
        tokio::select! {
            Some(done) = tasks.next(), if !tasks.is_empty() => {
                if controller.apply(done) {
                    controller.refresh_network().await;
                }
            }
            Some(notice) = channels.notices.recv() => controller.on_notice(notice),
            Some(event) = channels.events.recv() => {
                if controller.on_submission_event(event) {
                    ui::close_modal(ui_state);
                    tasks.extend(controller.stats_task());
                }
            }
            _ = ticker.tick() => {
                controller.refresh_network().await;
                if !controller.has_stats() {
                    tasks.extend(controller.stats_task());
                }
            }
            _ = tokio::signal::ctrl_c() => {
                controller.quit().await;
                break;
            }
            raw_ev = ui::next_raw_event(input_events) => {
                let event = raw_ev?;
                let Some(ev) = ui::interpret_event(ui_state, event) else {
                    continue;
                };
                match ev {
                    ui::UserEvent::Quit => {
                        controller.quit().await;
                        break;
                    }
                    ui::UserEvent::Redraw => {}
                    ui::UserEvent::SayGm => tasks.push(controller.submit_task(GmRequest::ToSelf)),
                    ui::UserEvent::SayGmTo(raw) => {
                        tasks.push(controller.submit_task(GmRequest::ToRecipient(raw)))
                    }
                    ui::UserEvent::SwitchNetwork => tasks.push(controller.remediation_task()),
                    ui::UserEvent::OpenHome => controller.open_home().await,
                    ui::UserEvent::OpenLastTx => controller.open_last_tx().await,
                    ui::UserEvent::RefreshStats => tasks.extend(controller.stats_task()),
                }
            }
        }
        ui::draw(ui_state, &controller.snapshot()).wrap_err("draw failed")?;
    }
    info!(abandoned = tasks.len(), "app loop finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use daily_gm::{
        chain::{
            BASE_MAINNET,
            BASE_SEPOLIA,
        },
        deployment::{
            ContractDeployment,
            DEFAULT_CONTRACT,
        },
        platform::{
            DEFAULT_PROBE_TIMEOUT,
            HostSnapshot,
        },
        test_helpers::{
            ContextBehavior,
            FakeHost,
            FakeWallet,
            RecordingNavigator,
            TEST_TX,
        },
    };

    fn config() -> AppConfig {
        AppConfig {
            target: BASE_SEPOLIA,
            home_url: "https://gm.example".to_string(),
            contract: ContractDeployment {
                address: DEFAULT_CONTRACT,
                from_block: 18_000_000,
            },
            rpc_url: "http://localhost:8545".to_string(),
            explorer_api_url: BASE_SEPOLIA.explorer_api_url(),
            account: None,
            can_switch: true,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }

    type TestController = AppController<FakeWallet, Rc<FakeHost>, Rc<RecordingNavigator>>;

    fn controller(
        wallet: FakeWallet,
        host: &Rc<FakeHost>,
        navigator: &Rc<RecordingNavigator>,
    ) -> (TestController, AppChannels) {
        AppController::new(config(), wallet, host.clone(), navigator.clone(), None)
    }

    fn mini_app() -> Rc<FakeHost> {
        Rc::new(FakeHost::new(ContextBehavior::Resolves(HostSnapshot::default())))
    }

    #[tokio::test(start_paused = true)]
    async fn start__network_label_only_after_platform_settles() {
        // given
        let host = Rc::new(FakeHost::new(ContextBehavior::Never));
        let navigator = Rc::new(RecordingNavigator::default());
        let (mut controller, _channels) =
            controller(FakeWallet::connected_on(BASE_MAINNET.id), &host, &navigator);
        controller.refresh_network().await;
        assert_eq!(controller.snapshot().network, None);

        // when
        let kind = controller.start().await;

        // then
        let snapshot = controller.snapshot();
        assert_eq!(kind, PlatformKind::GenericBrowser);
        assert!(snapshot.platform.ready);
        assert_eq!(
            snapshot.network,
            Some(NetworkLabel::WrongKnownNetwork("Base Mainnet"))
        );
        assert!(snapshot.account.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn submit_task__completion_records_tx_and_closes_modal() {
        // given
        let host = mini_app();
        let navigator = Rc::new(RecordingNavigator::default());
        let (mut controller, mut channels) =
            controller(FakeWallet::connected_on(BASE_SEPOLIA.id), &host, &navigator);
        controller.start().await;

        // when
        let done = controller.submit_task(GmRequest::ToSelf).await;
        let refresh = controller.apply(done);

        // then
        assert!(refresh);
        let mut closes = Vec::new();
        while let Ok(event) = channels.events.try_recv() {
            closes.push(controller.on_submission_event(event));
        }
        assert_eq!(closes.last(), Some(&true));
        assert_eq!(closes.iter().filter(|close| **close).count(), 1);
        assert_eq!(controller.snapshot().last_tx, Some(TEST_TX));
        let notice = channels.notices.try_recv().unwrap();
        assert_eq!(notice.text, "GM sent successfully! 🎉");
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot__send_button_reflects_pending_slot() {
        // given
        let host = mini_app();
        let navigator = Rc::new(RecordingNavigator::default());
        let (mut controller, _channels) =
            controller(FakeWallet::connected_on(BASE_SEPOLIA.id), &host, &navigator);
        controller.start().await;
        let _gate = controller.wallet().gate_next_write();

        // when
        let mut task = controller.submit_task(GmRequest::ToSelf);
        assert!(futures::poll!(&mut task).is_pending());

        // then
        let snapshot = controller.snapshot();
        assert!(snapshot.sending_self);
        assert!(!snapshot.sending_recipient);
        drop(task);
        assert!(!controller.snapshot().sending_self);
    }

    #[tokio::test(start_paused = true)]
    async fn remediation_task__moves_wallet_and_label_follows() {
        // given
        let host = mini_app();
        let navigator = Rc::new(RecordingNavigator::default());
        let (mut controller, _channels) =
            controller(FakeWallet::connected_on(BASE_MAINNET.id), &host, &navigator);
        controller.start().await;

        // when
        let done = controller.remediation_task().await;
        if controller.apply(done) {
            controller.refresh_network().await;
        }

        // then
        assert_eq!(
            controller.snapshot().network,
            Some(NetworkLabel::Matched("Base Sepolia"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn open_last_tx__goes_through_host_in_mini_app() {
        // given
        let host = mini_app();
        let navigator = Rc::new(RecordingNavigator::default());
        let (mut controller, _channels) =
            controller(FakeWallet::connected_on(BASE_SEPOLIA.id), &host, &navigator);
        controller.start().await;
        let done = controller.submit_task(GmRequest::ToSelf).await;
        controller.apply(done);

        // when
        controller.open_last_tx().await;
        controller.open_home().await;

        // then
        assert_eq!(
            host.opened(),
            vec![
                format!("https://base-sepolia.blockscout.com/tx/{TEST_TX}"),
                "https://gm.example".to_string(),
            ]
        );
        assert!(navigator.opened().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn quit__dismisses_host_once() {
        // given
        let host = mini_app();
        let navigator = Rc::new(RecordingNavigator::default());
        let (mut controller, _channels) =
            controller(FakeWallet::connected_on(BASE_SEPOLIA.id), &host, &navigator);
        controller.start().await;

        // when
        controller.quit().await;
        controller.quit().await;

        // then
        assert_eq!(host.close_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stats_task__skipped_without_counter_or_account() {
        let host = mini_app();
        let navigator = Rc::new(RecordingNavigator::default());
        let (mut controller, _channels) =
            controller(FakeWallet::disconnected(), &host, &navigator);
        controller.start().await;

        assert!(controller.stats_task().is_none());
    }
}
