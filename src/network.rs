use crate::{
    chain::{
        ChainId,
        ChainTarget,
    },
    classify::{
        SwitchFailure,
        classify_switch_error,
    },
    notice::Notifier,
    wallet::WalletConnector,
};
use std::{
    rc::Rc,
    time::Duration,
};
use tokio::{
    sync::Mutex,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1_000);

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SwitchOutcome {
    AlreadyCorrect,
    Switched,
    Cancelled,
    Unavailable,
    Failed(String),
}

impl SwitchOutcome {
    /// True when the wallet should now be on the target network.
    pub fn can_proceed(&self) -> bool {
        matches!(self, SwitchOutcome::AlreadyCorrect | SwitchOutcome::Switched)
    }
}

/// Brings the wallet onto the target network, asking at most once per call.
///
/// Clones share one switch lock, so at most one switch request is ever
/// outstanding against the wallet. A caller that finds a switch in flight
/// waits for it and re-reads the network before deciding to ask again.
#[derive(Clone, Debug)]
pub struct NetworkGuard {
    settle_delay: Duration,
    notifier: Notifier,
    switching: Rc<Mutex<()>>,
}

impl NetworkGuard {
    pub fn new(settle_delay: Duration, notifier: Notifier) -> Self {
        Self {
            settle_delay,
            notifier,
            switching: Rc::new(Mutex::new(())),
        }
    }

    /// True while some clone of this guard has a switch request open.
    pub fn is_switching(&self) -> bool {
        self.switching.try_lock().is_err()
    }

    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    pub async fn ensure_target_network<W: WalletConnector>(
        &self,
        wallet: &W,
        current: Option<ChainId>,
        target: &ChainTarget,
    ) -> SwitchOutcome {
        if current == Some(target.id) {
            return SwitchOutcome::AlreadyCorrect;
        }
        if !wallet.can_switch_network() {
            warn!(?current, chain = %target, "wallet cannot switch networks");
            return SwitchOutcome::Unavailable;
        }

        let _switching = match self.switching.try_lock() {
            Ok(held) => held,
            Err(_) => {
                debug!(chain = %target, "network switch already in flight, waiting");
                let held = self.switching.lock().await;
                let now = wallet.current_network().await;
                if now == Some(target.id) {
                    return SwitchOutcome::AlreadyCorrect;
                }
                held
            }
        };

        info!(?current, chain = %target, "requesting network switch");
        self.notifier
            .loading(format!("Switching to {}...", target.display_name));
        match wallet.switch_network(target.id).await {
            Ok(()) => {
                self.notifier
                    .success(format!("Switched to {}!", target.display_name));
                // dependent reads may still see the old network for a moment
                time::sleep(self.settle_delay).await;
                debug!(chain = %target, "network switch settled");
                SwitchOutcome::Switched
            }
            Err(err) => match classify_switch_error(&err) {
                SwitchFailure::Cancelled => {
                    info!(%err, "network switch cancelled by user");
                    SwitchOutcome::Cancelled
                }
                SwitchFailure::Failed(reason) => {
                    warn!(%err, "network switch failed");
                    SwitchOutcome::Failed(reason)
                }
            },
        }
    }
}

impl Default for NetworkGuard {
    fn default() -> Self {
        Self::new(DEFAULT_SETTLE_DELAY, Notifier::silent())
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        chain::BASE_SEPOLIA,
        test_helpers::{
            FakeWallet,
            WalletCall,
        },
        wallet::WalletError,
    };

    #[tokio::test(start_paused = true)]
    async fn ensure_target_network__already_correct_issues_no_switch() {
        // given
        let wallet = FakeWallet::connected_on(BASE_SEPOLIA.id);
        let guard = NetworkGuard::default();

        // when
        let outcome = guard
            .ensure_target_network(&wallet, Some(BASE_SEPOLIA.id), &BASE_SEPOLIA)
            .await;

        // then
        assert_eq!(outcome, SwitchOutcome::AlreadyCorrect);
        assert!(wallet.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_target_network__unavailable_when_wallet_cannot_switch() {
        // given
        let wallet = FakeWallet::connected_on(ChainId(1)).without_switch_support();
        let guard = NetworkGuard::default();

        // when
        let outcome = guard
            .ensure_target_network(&wallet, Some(ChainId(1)), &BASE_SEPOLIA)
            .await;

        // then
        assert_eq!(outcome, SwitchOutcome::Unavailable);
        assert!(wallet.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_target_network__waits_settle_delay_after_switch() {
        // given
        let wallet = FakeWallet::connected_on(ChainId(1));
        let guard = NetworkGuard::new(Duration::from_millis(1_000), Notifier::silent());
        let started = time::Instant::now();

        // when
        let outcome = guard
            .ensure_target_network(&wallet, Some(ChainId(1)), &BASE_SEPOLIA)
            .await;

        // then
        assert_eq!(outcome, SwitchOutcome::Switched);
        assert!(started.elapsed() >= Duration::from_millis(1_000));
        assert_eq!(wallet.calls(), vec![WalletCall::Switch(BASE_SEPOLIA.id)]);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_target_network__clones_wait_for_the_switch_in_flight() {
        // given
        let wallet = FakeWallet::connected_on(ChainId(1));
        let gate = wallet.gate_next_switch();
        let guard = NetworkGuard::default();
        let other = guard.clone();
        let mut first =
            Box::pin(guard.ensure_target_network(&wallet, Some(ChainId(1)), &BASE_SEPOLIA));
        assert!(futures::poll!(&mut first).is_pending());

        // when
        let mut second =
            Box::pin(other.ensure_target_network(&wallet, Some(ChainId(1)), &BASE_SEPOLIA));
        assert!(futures::poll!(&mut second).is_pending());

        // then
        assert!(other.is_switching());
        assert_eq!(wallet.calls(), vec![WalletCall::Switch(BASE_SEPOLIA.id)]);
        gate.send(Ok(())).unwrap();
        assert_eq!(first.await, SwitchOutcome::Switched);
        assert_eq!(second.await, SwitchOutcome::AlreadyCorrect);
        assert_eq!(wallet.calls(), vec![WalletCall::Switch(BASE_SEPOLIA.id)]);
        assert!(!guard.is_switching());
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_target_network__waiter_asks_again_when_first_switch_failed() {
        // given
        let wallet = FakeWallet::connected_on(ChainId(1));
        let gate = wallet.gate_next_switch();
        let guard = NetworkGuard::default();
        let mut first =
            Box::pin(guard.ensure_target_network(&wallet, Some(ChainId(1)), &BASE_SEPOLIA));
        assert!(futures::poll!(&mut first).is_pending());
        let mut second =
            Box::pin(guard.ensure_target_network(&wallet, Some(ChainId(1)), &BASE_SEPOLIA));
        assert!(futures::poll!(&mut second).is_pending());

        // when
        gate.send(Err(WalletError::new("chain not configured"))).unwrap();
        let first = first.await;
        let second = second.await;

        // then
        assert_eq!(first, SwitchOutcome::Failed("chain not configured".to_string()));
        assert_eq!(second, SwitchOutcome::Switched);
        assert_eq!(
            wallet.calls(),
            vec![
                WalletCall::Switch(BASE_SEPOLIA.id),
                WalletCall::Switch(BASE_SEPOLIA.id),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_target_network__unknown_current_network_is_a_mismatch() {
        let wallet = FakeWallet::connected_on(BASE_SEPOLIA.id);
        let outcome = NetworkGuard::default()
            .ensure_target_network(&wallet, None, &BASE_SEPOLIA)
            .await;
        assert_eq!(outcome, SwitchOutcome::Switched);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_target_network__user_rejection_is_cancelled() {
        // given
        let wallet = FakeWallet::connected_on(ChainId(1));
        wallet.fail_next_switch(WalletError::new("User rejected the request."));

        // when
        let outcome = NetworkGuard::default()
            .ensure_target_network(&wallet, Some(ChainId(1)), &BASE_SEPOLIA)
            .await;

        // then
        assert_eq!(outcome, SwitchOutcome::Cancelled);
        assert_eq!(wallet.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn ensure_target_network__other_failure_keeps_raw_reason() {
        // given
        let wallet = FakeWallet::connected_on(ChainId(1));
        wallet.fail_next_switch(WalletError::new("chain not configured"));

        // when
        let outcome = NetworkGuard::default()
            .ensure_target_network(&wallet, Some(ChainId(1)), &BASE_SEPOLIA)
            .await;

        // then
        assert_eq!(
            outcome,
            SwitchOutcome::Failed("chain not configured".to_string())
        );
        assert_eq!(wallet.network(), Some(ChainId(1)));
    }
}
