//! The "say GM" submission state machine.
//!
//! One attempt walks `ValidatingInput → CheckingConnection →
//! SynchronizingNetwork → Submitting` and ends in exactly one
//! [`SubmissionOutcome`]. Each request kind has its own slot; while a slot is
//! pending, further submits of that kind are ignored. Dropping the future
//! returned by [`Submitter::submit`] abandons the attempt and frees its slot.

use crate::{
    address::Address,
    chain::ChainTarget,
    classify::{
        ErrorKind,
        classify_write_error,
    },
    network::{
        NetworkGuard,
        SwitchOutcome,
    },
    notice::{
        NoticeLevel,
        Notifier,
    },
    wallet::{
        ContractCall,
        GmCall,
        TxHash,
        WalletConnector,
    },
};
use std::{
    cell::{
        Cell,
        RefCell,
    },
    fmt,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_SUCCESS_DELAY: Duration = Duration::from_millis(2_000);

/// What the user asked for. The recipient stays raw text until validation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum GmRequest {
    ToSelf,
    ToRecipient(String),
}

impl GmRequest {
    pub fn kind(&self) -> RequestKind {
        match self {
            GmRequest::ToSelf => RequestKind::ToSelf,
            GmRequest::ToRecipient(_) => RequestKind::ToRecipient,
        }
    }

    fn resolve(&self) -> Option<GmCall> {
        match self {
            GmRequest::ToSelf => Some(GmCall::Gm),
            GmRequest::ToRecipient(raw) => {
                raw.parse::<Address>().ok().map(GmCall::GmTo)
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RequestKind {
    ToSelf,
    ToRecipient,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::ToSelf => write!(f, "gm"),
            RequestKind::ToRecipient => write!(f, "gm-to"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmissionOutcome {
    Succeeded(TxHash),
    Cancelled,
    Rejected(ErrorKind),
    NetworkMismatch,
    Failed {
        kind: ErrorKind,
        detail: Option<String>,
    },
}

impl SubmissionOutcome {
    fn failed(kind: ErrorKind) -> Self {
        SubmissionOutcome::Failed { kind, detail: None }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, SubmissionOutcome::Succeeded(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            SubmissionOutcome::Succeeded(_) | SubmissionOutcome::NetworkMismatch => None,
            SubmissionOutcome::Cancelled => Some(ErrorKind::NetworkSwitchCancelled),
            SubmissionOutcome::Rejected(kind) => Some(*kind),
            SubmissionOutcome::Failed { kind, .. } => Some(*kind),
        }
    }

    /// The single notification shown for this terminal state.
    pub fn notification(&self, target: &ChainTarget) -> (NoticeLevel, String) {
        let text = match self {
            SubmissionOutcome::Succeeded(_) => {
                return (NoticeLevel::Success, "GM sent successfully! 🎉".to_string());
            }
            SubmissionOutcome::Cancelled => "Network switch cancelled".to_string(),
            SubmissionOutcome::NetworkMismatch => format!(
                "Wallet is still not on {}. Switch networks and try again",
                target.display_name
            ),
            SubmissionOutcome::Failed {
                kind: ErrorKind::NetworkSwitchFailed,
                detail,
            } => format!(
                "Failed to switch network: {}",
                detail.as_deref().unwrap_or("unknown error")
            ),
            SubmissionOutcome::Rejected(kind) | SubmissionOutcome::Failed { kind, .. } => {
                match kind {
                    ErrorKind::InvalidInput => "Invalid address format".to_string(),
                    ErrorKind::NotConnected => "Please connect your wallet".to_string(),
                    ErrorKind::NetworkUnavailable => format!(
                        "Please switch to {} network manually in your wallet",
                        target.display_name
                    ),
                    ErrorKind::NetworkSwitchCancelled => {
                        "Network switch cancelled".to_string()
                    }
                    ErrorKind::NetworkSwitchFailed => {
                        "Failed to switch network".to_string()
                    }
                    ErrorKind::UserRejected => "Transaction rejected".to_string(),
                    ErrorKind::AlreadyDoneToday => {
                        "You already GM'd today! Come back tomorrow".to_string()
                    }
                    ErrorKind::InvalidRecipient => "Invalid recipient address".to_string(),
                    ErrorKind::Unknown => {
                        "Failed to send GM. Please try again".to_string()
                    }
                }
            }
        };
        (NoticeLevel::Error, text)
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum SubmissionState {
    #[default]
    Idle,
    ValidatingInput,
    CheckingConnection,
    SynchronizingNetwork,
    Submitting,
    Finished(SubmissionOutcome),
}

impl SubmissionState {
    pub fn is_pending(&self) -> bool {
        !matches!(self, SubmissionState::Idle | SubmissionState::Finished(_))
    }

    pub fn outcome(&self) -> Option<&SubmissionOutcome> {
        match self {
            SubmissionState::Finished(outcome) => Some(outcome),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmissionEvent {
    Transition {
        kind: RequestKind,
        state: SubmissionState,
    },
    /// Fired after the success delay; the caller closes the interaction and
    /// refreshes whatever it reads from chain.
    Completed {
        kind: RequestKind,
        tx: TxHash,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SubmitResult {
    /// A submit of the same kind was already pending.
    Ignored,
    Finished(SubmissionOutcome),
}

#[derive(Debug, Default)]
struct Slot {
    state: RefCell<SubmissionState>,
    attempt: Cell<u64>,
}

#[derive(Debug, Default)]
struct Slots {
    to_self: Slot,
    to_recipient: Slot,
}

impl Slots {
    fn get(&self, kind: RequestKind) -> &Slot {
        match kind {
            RequestKind::ToSelf => &self.to_self,
            RequestKind::ToRecipient => &self.to_recipient,
        }
    }
}

/// Holds a slot for the duration of one attempt. If the attempt is dropped
/// before reaching a terminal state, the slot goes back to `Idle`, unless a
/// newer attempt owns it by then.
struct InFlight<'a> {
    slot: &'a Slot,
    kind: RequestKind,
    attempt: u64,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.slot.attempt.get() != self.attempt {
            return;
        }
        let mut state = self.slot.state.borrow_mut();
        if state.is_pending() {
            warn!(kind = %self.kind, state = ?*state, "submission abandoned mid-flight");
            *state = SubmissionState::Idle;
        }
    }
}

pub struct Submitter<W> {
    wallet: W,
    guard: NetworkGuard,
    target: ChainTarget,
    contract: Address,
    success_delay: Duration,
    notifier: Notifier,
    events: Option<mpsc::UnboundedSender<SubmissionEvent>>,
    slots: Slots,
}

impl<W: WalletConnector> Submitter<W> {
    pub fn new(
        wallet: W,
        guard: NetworkGuard,
        target: ChainTarget,
        contract: Address,
        notifier: Notifier,
    ) -> Self {
        Self {
            wallet,
            guard,
            target,
            contract,
            success_delay: DEFAULT_SUCCESS_DELAY,
            notifier,
            events: None,
            slots: Slots::default(),
        }
    }

    pub fn with_success_delay(mut self, delay: Duration) -> Self {
        self.success_delay = delay;
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<SubmissionEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn target(&self) -> &ChainTarget {
        &self.target
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    pub fn state(&self, kind: RequestKind) -> SubmissionState {
        self.slots.get(kind).state.borrow().clone()
    }

    pub fn is_pending(&self, kind: RequestKind) -> bool {
        self.slots.get(kind).state.borrow().is_pending()
    }

    pub async fn submit(&self, request: GmRequest) -> SubmitResult {
        let kind = request.kind();
        let Some(_in_flight) = self.begin(kind) else {
            debug!(%kind, "submit ignored, attempt already pending");
            return SubmitResult::Ignored;
        };

        let outcome = self.run(kind, &request).await;
        self.finish(kind, outcome.clone());

        if let SubmissionOutcome::Succeeded(tx) = outcome {
            time::sleep(self.success_delay).await;
            self.emit(SubmissionEvent::Completed { kind, tx });
        }
        SubmitResult::Finished(outcome)
    }

    fn begin(&self, kind: RequestKind) -> Option<InFlight<'_>> {
        let slot = self.slots.get(kind);
        if slot.state.borrow().is_pending() {
            return None;
        }
        let attempt = slot.attempt.get() + 1;
        slot.attempt.set(attempt);
        self.transition(kind, SubmissionState::ValidatingInput);
        Some(InFlight {
            slot,
            kind,
            attempt,
        })
    }

    async fn run(&self, kind: RequestKind, request: &GmRequest) -> SubmissionOutcome {
        let Some(call) = request.resolve() else {
            debug!(%kind, ?request, "recipient failed validation");
            return SubmissionOutcome::Rejected(ErrorKind::InvalidInput);
        };

        self.transition(kind, SubmissionState::CheckingConnection);
        if !self.wallet.is_connected().await {
            return SubmissionOutcome::Rejected(ErrorKind::NotConnected);
        }

        self.transition(kind, SubmissionState::SynchronizingNetwork);
        let current = self.wallet.current_network().await;
        match self
            .guard
            .ensure_target_network(&self.wallet, current, &self.target)
            .await
        {
            SwitchOutcome::AlreadyCorrect => {}
            SwitchOutcome::Switched => {
                // trust only what the wallet reports after the switch settled
                let now = self.wallet.current_network().await;
                if now != Some(self.target.id) {
                    warn!(?now, chain = %self.target, "wallet still off target after switch");
                    return SubmissionOutcome::NetworkMismatch;
                }
            }
            SwitchOutcome::Cancelled => return SubmissionOutcome::Cancelled,
            SwitchOutcome::Unavailable => {
                return SubmissionOutcome::Rejected(ErrorKind::NetworkUnavailable);
            }
            SwitchOutcome::Failed(reason) => {
                return SubmissionOutcome::Failed {
                    kind: ErrorKind::NetworkSwitchFailed,
                    detail: Some(reason),
                };
            }
        }

        self.transition(kind, SubmissionState::Submitting);
        info!(
            %kind,
            function = call.function_name(),
            contract = %self.contract,
            "submitting write"
        );
        let write = ContractCall {
            contract: self.contract,
            call,
        };
        match self.wallet.write_contract(write).await {
            Ok(tx) => SubmissionOutcome::Succeeded(tx),
            Err(err) => {
                let to_recipient = matches!(call, GmCall::GmTo(_));
                let error_kind = classify_write_error(&err, to_recipient);
                debug!(%kind, %err, ?error_kind, "write failed");
                match error_kind {
                    ErrorKind::Unknown => SubmissionOutcome::failed(error_kind),
                    _ => SubmissionOutcome::Rejected(error_kind),
                }
            }
        }
    }

    fn finish(&self, kind: RequestKind, outcome: SubmissionOutcome) {
        match &outcome {
            SubmissionOutcome::Succeeded(tx) => info!(%kind, %tx, "gm submitted"),
            other => info!(%kind, outcome = ?other, "gm attempt ended"),
        }
        let (level, text) = outcome.notification(&self.target);
        self.notifier.notify(level, text);
        self.transition(kind, SubmissionState::Finished(outcome));
    }

    fn transition(&self, kind: RequestKind, state: SubmissionState) {
        debug!(%kind, ?state, "submission transition");
        *self.slots.get(kind).state.borrow_mut() = state.clone();
        self.emit(SubmissionEvent::Transition { kind, state });
    }

    fn emit(&self, event: SubmissionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
