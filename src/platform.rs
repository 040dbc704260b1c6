//! Host environment detection.
//!
//! The app either runs inside a host mini-app runtime (a social client that
//! embeds it and hands over the signed-in user) or on its own. The
//! [`PlatformController`] probes once at startup, settles on one of the two,
//! and from then on routes `close` and `open_url` to whatever the settled
//! platform can do. Everyone else observes the outcome through a
//! [`PlatformReader`].

use std::{
    cell::Cell,
    fmt,
    rc::Rc,
    time::Duration,
};
use tokio::{
    sync::watch,
    time,
};
use tracing::{
    debug,
    info,
    warn,
};

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(1_500);

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PlatformKind {
    HostMiniApp,
    GenericBrowser,
}

impl fmt::Display for PlatformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformKind::HostMiniApp => write!(f, "mini-app"),
            PlatformKind::GenericBrowser => write!(f, "browser"),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UserIdentity {
    pub external_id: u64,
    pub handle: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserIdentity {
    pub fn label(&self) -> String {
        match (&self.display_name, &self.handle) {
            (Some(name), Some(handle)) => format!("{name} (@{handle})"),
            (None, Some(handle)) => format!("@{handle}"),
            (Some(name), None) => name.clone(),
            (None, None) => format!("user #{}", self.external_id),
        }
    }
}

/// What a host hands back when asked for its context.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct HostSnapshot {
    pub user: Option<UserIdentity>,
    pub client_id: Option<u64>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HostError(pub String);

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for HostError {}

/// A host mini-app runtime.
pub trait HostContext {
    /// May never resolve when no host is listening.
    fn context(&self) -> impl Future<Output = Result<Option<HostSnapshot>, HostError>>;

    /// Ends the host's splash/loading state.
    fn ready(&self) -> impl Future<Output = Result<(), HostError>>;

    fn close(&self) -> impl Future<Output = Result<(), HostError>>;

    fn open_url(&self, url: &str) -> impl Future<Output = Result<(), HostError>>;
}

/// The absent host. Its context resolves immediately to nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoHost;

impl HostContext for NoHost {
    async fn context(&self) -> Result<Option<HostSnapshot>, HostError> {
        Ok(None)
    }

    async fn ready(&self) -> Result<(), HostError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), HostError> {
        Ok(())
    }

    async fn open_url(&self, _url: &str) -> Result<(), HostError> {
        Err(HostError("no host present".to_string()))
    }
}

impl<H: HostContext> HostContext for Rc<H> {
    fn context(&self) -> impl Future<Output = Result<Option<HostSnapshot>, HostError>> {
        (**self).context()
    }

    fn ready(&self) -> impl Future<Output = Result<(), HostError>> {
        (**self).ready()
    }

    fn close(&self) -> impl Future<Output = Result<(), HostError>> {
        (**self).close()
    }

    fn open_url(&self, url: &str) -> impl Future<Output = Result<(), HostError>> {
        (**self).open_url(url)
    }
}

/// Plain new-tab navigation, the path that is always available.
pub trait Navigator {
    fn open_in_new_tab(&self, url: &str) -> Result<(), HostError>;
}

/// Hands URLs to the operating system's default browser.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemBrowser;

impl Navigator for SystemBrowser {
    fn open_in_new_tab(&self, url: &str) -> Result<(), HostError> {
        open::that_detached(url).map_err(|err| HostError(err.to_string()))
    }
}

impl<N: Navigator> Navigator for Rc<N> {
    fn open_in_new_tab(&self, url: &str) -> Result<(), HostError> {
        (**self).open_in_new_tab(url)
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PlatformContext {
    pub kind: PlatformKind,
    pub ready: bool,
    pub identity: Option<UserIdentity>,
}

impl PlatformContext {
    fn initial() -> Self {
        Self {
            kind: PlatformKind::GenericBrowser,
            ready: false,
            identity: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootstrapState {
    Uninitialized,
    Probing,
    Ready(PlatformKind),
}

/// Read-only view of the platform context.
#[derive(Clone, Debug)]
pub struct PlatformReader {
    rx: watch::Receiver<PlatformContext>,
}

impl PlatformReader {
    pub fn snapshot(&self) -> PlatformContext {
        self.rx.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        self.rx.borrow().ready
    }

    pub fn kind(&self) -> PlatformKind {
        self.rx.borrow().kind
    }

    pub fn identity(&self) -> Option<UserIdentity> {
        self.rx.borrow().identity.clone()
    }

    pub fn is_in_mini_app(&self) -> bool {
        self.kind() == PlatformKind::HostMiniApp
    }

    /// Resolves once the controller has settled. Returns the settled context,
    /// or the current one if the controller was dropped first.
    pub async fn wait_ready(&mut self) -> PlatformContext {
        let settled = self
            .rx
            .wait_for(|ctx| ctx.ready)
            .await
            .map(|ctx| (*ctx).clone());
        settled.unwrap_or_else(|_| self.snapshot())
    }
}

/// Sole writer of the process-wide [`PlatformContext`].
pub struct PlatformController<H, N> {
    host: H,
    navigator: N,
    probe_timeout: Duration,
    state: BootstrapState,
    context: watch::Sender<PlatformContext>,
    dismissed: Cell<bool>,
}

impl<H: HostContext, N: Navigator> PlatformController<H, N> {
    pub fn new(host: H, navigator: N, probe_timeout: Duration) -> Self {
        let (context, _) = watch::channel(PlatformContext::initial());
        Self {
            host,
            navigator,
            probe_timeout,
            state: BootstrapState::Uninitialized,
            context,
            dismissed: Cell::new(false),
        }
    }

    pub fn reader(&self) -> PlatformReader {
        PlatformReader {
            rx: self.context.subscribe(),
        }
    }

    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// Probes for a host once. Later calls return the settled platform without
    /// probing again.
    pub async fn bootstrap(&mut self) -> PlatformKind {
        if let BootstrapState::Ready(kind) = self.state {
            debug!(%kind, "platform already settled, not probing again");
            return kind;
        }
        self.state = BootstrapState::Probing;

        let (kind, identity) = match self.probe().await {
            Some(identity) => (PlatformKind::HostMiniApp, identity),
            None => (PlatformKind::GenericBrowser, None),
        };

        info!(%kind, has_identity = identity.is_some(), "platform ready");
        self.context.send_replace(PlatformContext {
            kind,
            ready: true,
            identity,
        });
        self.state = BootstrapState::Ready(kind);
        kind
    }

    /// `Some(identity)` when a host answered and accepted the ready signal.
    async fn probe(&self) -> Option<Option<UserIdentity>> {
        let snapshot = match time::timeout(self.probe_timeout, self.host.context()).await
        {
            Ok(Ok(Some(snapshot))) => snapshot,
            Ok(Ok(None)) => {
                debug!("no host context, running standalone");
                return None;
            }
            Ok(Err(err)) => {
                debug!(%err, "host context probe failed, running standalone");
                return None;
            }
            Err(_) => {
                debug!(
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "host context probe timed out, running standalone"
                );
                return None;
            }
        };

        match time::timeout(self.probe_timeout, self.host.ready()).await {
            Ok(Ok(())) => Some(snapshot.user),
            Ok(Err(err)) => {
                warn!(%err, "host rejected ready signal, running standalone");
                None
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "host never acknowledged ready signal, running standalone"
                );
                None
            }
        }
    }

    fn settled_kind(&self) -> Option<PlatformKind> {
        match self.state {
            BootstrapState::Ready(kind) => Some(kind),
            _ => None,
        }
    }

    /// Asks the host to dismiss the app. A no-op outside a host, and after the
    /// first call.
    pub async fn close(&self) {
        if self.settled_kind() != Some(PlatformKind::HostMiniApp) {
            return;
        }
        if self.dismissed.replace(true) {
            debug!("host dismiss already requested");
            return;
        }
        if let Err(err) = self.host.close().await {
            warn!(%err, "host failed to close the mini-app");
        }
    }

    /// Opens `url` through the host when there is one, otherwise (or when the
    /// host fails) in a new browser tab. Never fails.
    pub async fn open_url(&self, url: &str) {
        if self.settled_kind() == Some(PlatformKind::HostMiniApp) {
            match self.host.open_url(url).await {
                Ok(()) => return,
                Err(err) => warn!(%err, url, "host failed to open url, using browser"),
            }
        }
        if let Err(err) = self.navigator.open_in_new_tab(url) {
            warn!(%err, url, "browser navigation failed");
        }
    }
}

#[cfg(test)]
mod tests;
