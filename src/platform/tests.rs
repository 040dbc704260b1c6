#![allow(non_snake_case)]

use super::*;
use crate::test_helpers::{
    ContextBehavior,
    FakeHost,
    RecordingNavigator,
};

fn alice() -> UserIdentity {
    UserIdentity {
        external_id: 3621,
        handle: Some("alice".to_string()),
        display_name: Some("Alice".to_string()),
        avatar_url: None,
    }
}

fn controller(
    host: &Rc<FakeHost>,
    navigator: &Rc<RecordingNavigator>,
) -> PlatformController<Rc<FakeHost>, Rc<RecordingNavigator>> {
    PlatformController::new(host.clone(), navigator.clone(), DEFAULT_PROBE_TIMEOUT)
}

#[tokio::test(start_paused = true)]
async fn bootstrap__host_context_settles_on_mini_app_with_identity() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Resolves(HostSnapshot {
        user: Some(alice()),
        client_id: Some(9152),
    })));
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);
    let reader = controller.reader();
    assert!(!reader.is_ready());

    // when
    let kind = controller.bootstrap().await;

    // then
    assert_eq!(kind, PlatformKind::HostMiniApp);
    assert_eq!(
        reader.snapshot(),
        PlatformContext {
            kind: PlatformKind::HostMiniApp,
            ready: true,
            identity: Some(alice()),
        }
    );
    assert_eq!(host.ready_calls(), 1);
    assert_eq!(controller.state(), BootstrapState::Ready(PlatformKind::HostMiniApp));
}

#[tokio::test(start_paused = true)]
async fn bootstrap__probe_that_never_resolves_falls_back_to_browser() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Never));
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);

    // when
    let kind = controller.bootstrap().await;

    // then
    let ctx = controller.reader().snapshot();
    assert_eq!(kind, PlatformKind::GenericBrowser);
    assert!(ctx.ready);
    assert_eq!(ctx.identity, None);
    assert_eq!(host.ready_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn bootstrap__probe_error_or_absence_falls_back_to_browser() {
    for behavior in [
        ContextBehavior::Absent,
        ContextBehavior::Fails("sdk not loaded".to_string()),
    ] {
        let host = Rc::new(FakeHost::new(behavior));
        let navigator = Rc::new(RecordingNavigator::default());
        let mut controller = controller(&host, &navigator);

        assert_eq!(controller.bootstrap().await, PlatformKind::GenericBrowser);
        assert_eq!(host.context_calls(), 1);
    }
}

#[tokio::test(start_paused = true)]
async fn bootstrap__failed_ready_signal_settles_on_browser_without_identity() {
    // given
    let host = Rc::new(
        FakeHost::new(ContextBehavior::Resolves(HostSnapshot {
            user: Some(alice()),
            client_id: None,
        }))
        .with_failing_ready(),
    );
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);

    // when
    let kind = controller.bootstrap().await;

    // then
    assert_eq!(kind, PlatformKind::GenericBrowser);
    assert_eq!(controller.reader().identity(), None);
}

#[tokio::test(start_paused = true)]
async fn bootstrap__unacknowledged_ready_signal_times_out_to_browser() {
    // given
    let host = Rc::new(
        FakeHost::new(ContextBehavior::Resolves(HostSnapshot {
            user: Some(alice()),
            client_id: None,
        }))
        .with_hanging_ready(),
    );
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);

    // when
    let kind = controller.bootstrap().await;

    // then
    assert_eq!(kind, PlatformKind::GenericBrowser);
    assert_eq!(controller.state(), BootstrapState::Ready(PlatformKind::GenericBrowser));
    assert_eq!(host.ready_calls(), 1);
    assert!(controller.reader().is_ready());
    assert_eq!(controller.reader().identity(), None);
}

#[tokio::test(start_paused = true)]
async fn bootstrap__second_call_does_not_probe_again() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Absent));
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);
    controller.bootstrap().await;

    // when
    let kind = controller.bootstrap().await;

    // then
    assert_eq!(kind, PlatformKind::GenericBrowser);
    assert_eq!(host.context_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn wait_ready__resolves_after_bootstrap() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Absent));
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);
    let mut reader = controller.reader();

    // when
    controller.bootstrap().await;
    let ctx = reader.wait_ready().await;

    // then
    assert!(ctx.ready);
    assert_eq!(ctx.kind, PlatformKind::GenericBrowser);
}

#[tokio::test(start_paused = true)]
async fn close__dismisses_host_at_most_once() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Resolves(HostSnapshot::default())));
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);
    controller.bootstrap().await;

    // when
    controller.close().await;
    controller.close().await;

    // then
    assert_eq!(host.close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn close__is_a_noop_in_browser_and_before_ready() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Absent));
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);

    // when
    controller.close().await;
    controller.bootstrap().await;
    controller.close().await;

    // then
    assert_eq!(host.close_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn close__host_failure_is_swallowed() {
    let host = Rc::new(
        FakeHost::new(ContextBehavior::Resolves(HostSnapshot::default())).with_failing_close(),
    );
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);
    controller.bootstrap().await;

    controller.close().await;

    assert_eq!(host.close_calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn open_url__mini_app_uses_host_only() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Resolves(HostSnapshot::default())));
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);
    controller.bootstrap().await;

    // when
    controller.open_url("https://example.com").await;

    // then
    assert_eq!(host.opened(), vec!["https://example.com".to_string()]);
    assert!(navigator.opened().is_empty());
}

#[tokio::test(start_paused = true)]
async fn open_url__host_failure_falls_back_to_new_tab() {
    // given
    let host = Rc::new(
        FakeHost::new(ContextBehavior::Resolves(HostSnapshot::default())).with_failing_open(),
    );
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller = controller(&host, &navigator);
    controller.bootstrap().await;

    // when
    controller.open_url("https://example.com").await;

    // then
    assert_eq!(navigator.opened(), vec!["https://example.com".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn open_url__browser_goes_straight_to_new_tab_and_swallows_failure() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Absent));
    let navigator = Rc::new(RecordingNavigator::failing());
    let mut controller = controller(&host, &navigator);
    controller.bootstrap().await;

    // when
    controller.open_url("https://example.com").await;

    // then
    assert!(host.opened().is_empty());
    assert_eq!(navigator.opened(), vec!["https://example.com".to_string()]);
}

#[test]
fn user_identity__label_prefers_name_and_handle() {
    assert_eq!(alice().label(), "Alice (@alice)");
    let anonymous = UserIdentity {
        external_id: 7,
        handle: None,
        display_name: None,
        avatar_url: None,
    };
    assert_eq!(anonymous.label(), "user #7");
}
