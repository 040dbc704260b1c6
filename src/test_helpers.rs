//! Scriptable stand-ins for the wallet and the host runtime.

use crate::{
    address::Address,
    chain::{
        BASE_SEPOLIA,
        ChainId,
        ChainTarget,
    },
    network::NetworkGuard,
    notice::{
        Notice,
        Notifier,
    },
    platform::{
        HostContext,
        HostError,
        HostSnapshot,
        Navigator,
    },
    submission::{
        SubmissionEvent,
        Submitter,
    },
    wallet::{
        ContractCall,
        TxHash,
        WalletConnector,
        WalletError,
    },
};
use std::{
    cell::{
        Cell,
        RefCell,
    },
    collections::VecDeque,
    rc::Rc,
};
use tokio::sync::{
    mpsc,
    oneshot,
};

pub const TEST_CONTRACT: Address = Address::new([0x42; 20]);
pub const TEST_ACCOUNT: Address = Address::new([0xaa; 20]);
pub const TEST_TX: TxHash = TxHash([1; 32]);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum WalletCall {
    Switch(ChainId),
    Write(ContractCall),
}

enum Scripted<T> {
    Now(Result<T, WalletError>),
    Gated(oneshot::Receiver<Result<T, WalletError>>),
}

impl<T> Scripted<T> {
    async fn resolve(self) -> Result<T, WalletError> {
        match self {
            Scripted::Now(result) => result,
            Scripted::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(WalletError::new("gate dropped"))),
        }
    }
}

/// A wallet whose answers are queued up front. Unscripted switches succeed
/// and land on the requested network; unscripted writes return [`TEST_TX`].
pub struct FakeWallet {
    connected: Cell<bool>,
    network: Cell<Option<ChainId>>,
    account: Cell<Option<Address>>,
    switch_supported: bool,
    switch_lands: bool,
    switches: RefCell<VecDeque<Scripted<()>>>,
    writes: RefCell<VecDeque<Scripted<TxHash>>>,
    calls: RefCell<Vec<WalletCall>>,
    interactions: Cell<usize>,
}

impl FakeWallet {
    pub fn connected_on(network: ChainId) -> Self {
        Self {
            connected: Cell::new(true),
            network: Cell::new(Some(network)),
            account: Cell::new(Some(TEST_ACCOUNT)),
            switch_supported: true,
            switch_lands: true,
            switches: RefCell::default(),
            writes: RefCell::default(),
            calls: RefCell::default(),
            interactions: Cell::new(0),
        }
    }

    pub fn disconnected() -> Self {
        let wallet = Self::connected_on(BASE_SEPOLIA.id);
        wallet.connected.set(false);
        wallet.network.set(None);
        wallet.account.set(None);
        wallet
    }

    pub fn without_switch_support(mut self) -> Self {
        self.switch_supported = false;
        self
    }

    /// Switches report success but the wallet stays where it was.
    pub fn with_switch_that_does_not_land(mut self) -> Self {
        self.switch_lands = false;
        self
    }

    pub fn fail_next_switch(&self, err: WalletError) {
        self.switches.borrow_mut().push_back(Scripted::Now(Err(err)));
    }

    pub fn fail_next_write(&self, err: WalletError) {
        self.writes.borrow_mut().push_back(Scripted::Now(Err(err)));
    }

    /// The next write suspends until the returned sender is used.
    pub fn gate_next_write(&self) -> oneshot::Sender<Result<TxHash, WalletError>> {
        let (tx, rx) = oneshot::channel();
        self.writes.borrow_mut().push_back(Scripted::Gated(rx));
        tx
    }

    pub fn gate_next_switch(&self) -> oneshot::Sender<Result<(), WalletError>> {
        let (tx, rx) = oneshot::channel();
        self.switches.borrow_mut().push_back(Scripted::Gated(rx));
        tx
    }

    pub fn set_network(&self, network: Option<ChainId>) {
        self.network.set(network);
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.set(connected);
    }

    pub fn network(&self) -> Option<ChainId> {
        self.network.get()
    }

    /// Switch and write requests, in order.
    pub fn calls(&self) -> Vec<WalletCall> {
        self.calls.borrow().clone()
    }

    pub fn writes(&self) -> Vec<ContractCall> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                WalletCall::Write(write) => Some(*write),
                WalletCall::Switch(_) => None,
            })
            .collect()
    }

    /// Every call made on the wallet, reads included.
    pub fn interactions(&self) -> usize {
        self.interactions.get()
    }

    fn touch(&self) {
        self.interactions.set(self.interactions.get() + 1);
    }
}

impl WalletConnector for FakeWallet {
    async fn is_connected(&self) -> bool {
        self.touch();
        self.connected.get()
    }

    async fn current_network(&self) -> Option<ChainId> {
        self.touch();
        self.network.get()
    }

    async fn account(&self) -> Option<Address> {
        self.touch();
        self.account.get()
    }

    fn can_switch_network(&self) -> bool {
        self.touch();
        self.switch_supported
    }

    async fn switch_network(&self, id: ChainId) -> Result<(), WalletError> {
        self.touch();
        self.calls.borrow_mut().push(WalletCall::Switch(id));
        let scripted = self.switches.borrow_mut().pop_front();
        let result = match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Ok(()),
        };
        if result.is_ok() && self.switch_lands {
            self.network.set(Some(id));
        }
        result
    }

    async fn write_contract(&self, call: ContractCall) -> Result<TxHash, WalletError> {
        self.touch();
        self.calls.borrow_mut().push(WalletCall::Write(call));
        let scripted = self.writes.borrow_mut().pop_front();
        match scripted {
            Some(scripted) => scripted.resolve().await,
            None => Ok(TEST_TX),
        }
    }
}

#[derive(Clone, Debug)]
pub enum ContextBehavior {
    Resolves(HostSnapshot),
    Absent,
    Fails(String),
    /// The probe never answers, as when no host is listening.
    Never,
}

pub struct FakeHost {
    behavior: ContextBehavior,
    ready_fails: bool,
    ready_hangs: bool,
    close_fails: bool,
    open_fails: bool,
    context_calls: Cell<usize>,
    ready_calls: Cell<usize>,
    close_calls: Cell<usize>,
    opened: RefCell<Vec<String>>,
}

impl FakeHost {
    pub fn new(behavior: ContextBehavior) -> Self {
        Self {
            behavior,
            ready_fails: false,
            ready_hangs: false,
            close_fails: false,
            open_fails: false,
            context_calls: Cell::new(0),
            ready_calls: Cell::new(0),
            close_calls: Cell::new(0),
            opened: RefCell::default(),
        }
    }

    pub fn with_failing_ready(mut self) -> Self {
        self.ready_fails = true;
        self
    }

    /// The host hands over its context but never acknowledges `ready()`.
    pub fn with_hanging_ready(mut self) -> Self {
        self.ready_hangs = true;
        self
    }

    pub fn with_failing_close(mut self) -> Self {
        self.close_fails = true;
        self
    }

    pub fn with_failing_open(mut self) -> Self {
        self.open_fails = true;
        self
    }

    pub fn context_calls(&self) -> usize {
        self.context_calls.get()
    }

    pub fn ready_calls(&self) -> usize {
        self.ready_calls.get()
    }

    pub fn close_calls(&self) -> usize {
        self.close_calls.get()
    }

    /// URLs the host was asked to open, including the ones it failed on.
    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

fn scripted_failure(fails: bool, what: &str) -> Result<(), HostError> {
    if fails {
        Err(HostError(format!("{what} failed")))
    } else {
        Ok(())
    }
}

impl HostContext for FakeHost {
    async fn context(&self) -> Result<Option<HostSnapshot>, HostError> {
        self.context_calls.set(self.context_calls.get() + 1);
        match self.behavior.clone() {
            ContextBehavior::Resolves(snapshot) => Ok(Some(snapshot)),
            ContextBehavior::Absent => Ok(None),
            ContextBehavior::Fails(reason) => Err(HostError(reason)),
            ContextBehavior::Never => std::future::pending().await,
        }
    }

    async fn ready(&self) -> Result<(), HostError> {
        self.ready_calls.set(self.ready_calls.get() + 1);
        if self.ready_hangs {
            std::future::pending::<()>().await;
        }
        scripted_failure(self.ready_fails, "ready")
    }

    async fn close(&self) -> Result<(), HostError> {
        self.close_calls.set(self.close_calls.get() + 1);
        scripted_failure(self.close_fails, "close")
    }

    async fn open_url(&self, url: &str) -> Result<(), HostError> {
        self.opened.borrow_mut().push(url.to_string());
        scripted_failure(self.open_fails, "open_url")
    }
}

#[derive(Debug, Default)]
pub struct RecordingNavigator {
    fails: bool,
    opened: RefCell<Vec<String>>,
}

impl RecordingNavigator {
    pub fn failing() -> Self {
        Self {
            fails: true,
            opened: RefCell::default(),
        }
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.borrow().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn open_in_new_tab(&self, url: &str) -> Result<(), HostError> {
        self.opened.borrow_mut().push(url.to_string());
        scripted_failure(self.fails, "new tab")
    }
}

/// A submitter wired to a [`FakeWallet`] with its notices and events captured.
pub struct TestContext {
    pub wallet: Rc<FakeWallet>,
    pub submitter: Submitter<Rc<FakeWallet>>,
    /// Shares its switch lock with the submitter's guard.
    pub guard: NetworkGuard,
    pub notices: mpsc::UnboundedReceiver<Notice>,
    pub events: mpsc::UnboundedReceiver<SubmissionEvent>,
}

impl TestContext {
    pub fn new(wallet: FakeWallet) -> Self {
        Self::with_target(wallet, BASE_SEPOLIA)
    }

    pub fn with_target(wallet: FakeWallet, target: ChainTarget) -> Self {
        let wallet = Rc::new(wallet);
        let (notifier, notices) = Notifier::channel();
        let (events_tx, events) = mpsc::unbounded_channel();
        let guard = NetworkGuard::new(crate::network::DEFAULT_SETTLE_DELAY, notifier.clone());
        let submitter =
            Submitter::new(wallet.clone(), guard.clone(), target, TEST_CONTRACT, notifier)
                .with_events(events_tx);
        Self {
            wallet,
            submitter,
            guard,
            notices,
            events,
        }
    }

    pub fn drain_notices(&mut self) -> Vec<Notice> {
        let mut out = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            out.push(notice);
        }
        out
    }

    pub fn drain_events(&mut self) -> Vec<SubmissionEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }

    pub fn notice_texts(&mut self) -> Vec<String> {
        self.drain_notices()
            .into_iter()
            .map(|notice| notice.text)
            .collect()
    }
}
