//! Display-only view of where the wallet is, plus the manual fix.

use crate::{
    chain::{
        ChainId,
        ChainTarget,
        known_network_name,
    },
    network::{
        NetworkGuard,
        SwitchOutcome,
    },
    notice::Notifier,
    platform::PlatformReader,
    wallet::WalletConnector,
};
use std::cell::Cell;
use tracing::debug;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NetworkLabel {
    Matched(&'static str),
    WrongKnownNetwork(&'static str),
    Unknown,
}

impl NetworkLabel {
    pub fn from_ids(current: ChainId, target: &ChainTarget) -> Self {
        if current == target.id {
            return NetworkLabel::Matched(target.display_name);
        }
        match known_network_name(current) {
            Some(name) => NetworkLabel::WrongKnownNetwork(name),
            None => NetworkLabel::Unknown,
        }
    }

    pub fn is_matched(&self) -> bool {
        matches!(self, NetworkLabel::Matched(_))
    }

    pub fn text(&self) -> String {
        match self {
            NetworkLabel::Matched(name) => format!("{name} ✅"),
            NetworkLabel::WrongKnownNetwork(name) => format!("{name} ⚠️"),
            NetworkLabel::Unknown => "Wrong Network ⚠️".to_string(),
        }
    }
}

pub struct ChainObserver {
    target: ChainTarget,
    mounted: Cell<bool>,
}

impl ChainObserver {
    pub fn new(target: ChainTarget) -> Self {
        Self {
            target,
            mounted: Cell::new(false),
        }
    }

    /// Mounts once the platform has settled. Returns whether it is mounted.
    pub fn mount(&self, platform: &PlatformReader) -> bool {
        if !self.mounted.get() && platform.is_ready() {
            debug!(chain = %self.target, "chain observer mounted");
            self.mounted.set(true);
        }
        self.mounted.get()
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.get()
    }

    /// Nothing to render before mount or while the wallet is disconnected.
    pub async fn label<W: WalletConnector>(&self, wallet: &W) -> Option<NetworkLabel> {
        if !self.mounted.get() || !wallet.is_connected().await {
            return None;
        }
        // a connected wallet on an unreadable network is still a wrong network
        let current = wallet.current_network().await;
        Some(match current {
            Some(id) => NetworkLabel::from_ids(id, &self.target),
            None => NetworkLabel::Unknown,
        })
    }

    /// The user-initiated switch. Same guard call the submission path uses.
    pub async fn remediate<W: WalletConnector>(
        &self,
        wallet: &W,
        guard: &NetworkGuard,
        notifier: &Notifier,
    ) -> SwitchOutcome {
        let current = wallet.current_network().await;
        let outcome = guard
            .ensure_target_network(wallet, current, &self.target)
            .await;
        match &outcome {
            SwitchOutcome::AlreadyCorrect | SwitchOutcome::Switched => {}
            SwitchOutcome::Unavailable => {
                notifier.error("Please switch network manually in your wallet")
            }
            SwitchOutcome::Cancelled => notifier.error("Network switch cancelled"),
            SwitchOutcome::Failed(_) => notifier.error("Failed to switch network"),
        }
        outcome
    }
}
