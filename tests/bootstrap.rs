#![allow(non_snake_case)]

use daily_gm::{
    platform::{
        BootstrapState,
        HostSnapshot,
        PlatformController,
        PlatformKind,
        UserIdentity,
    },
    test_helpers::{
        ContextBehavior,
        FakeHost,
        RecordingNavigator,
    },
};
use std::{
    rc::Rc,
    time::Duration,
};
use tokio::time;

fn host_user() -> UserIdentity {
    UserIdentity {
        external_id: 194,
        handle: Some("gm".to_string()),
        display_name: None,
        avatar_url: Some("https://example.com/gm.png".to_string()),
    }
}

#[tokio::test(start_paused = true)]
async fn bootstrap__readers_observe_a_single_settled_context() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Resolves(HostSnapshot {
        user: Some(host_user()),
        client_id: Some(1),
    })));
    let mut controller = PlatformController::new(
        host.clone(),
        RecordingNavigator::default(),
        Duration::from_millis(1_500),
    );
    let mut first = controller.reader();
    let second = controller.reader();

    // when
    controller.bootstrap().await;
    let settled = first.wait_ready().await;

    // then
    assert_eq!(settled, second.snapshot());
    assert!(second.is_in_mini_app());
    assert_eq!(second.identity(), Some(host_user()));
    assert_eq!(controller.state(), BootstrapState::Ready(PlatformKind::HostMiniApp));
}

#[tokio::test(start_paused = true)]
async fn bootstrap__silent_host_settles_after_probe_timeout() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Never));
    let timeout = Duration::from_millis(1_500);
    let mut controller =
        PlatformController::new(host.clone(), RecordingNavigator::default(), timeout);
    let started = time::Instant::now();

    // when
    let kind = controller.bootstrap().await;

    // then
    assert_eq!(kind, PlatformKind::GenericBrowser);
    assert!(started.elapsed() >= timeout);
    assert_eq!(controller.reader().identity(), None);
    assert_eq!(host.ready_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn bootstrap__browser_links_open_in_new_tab_and_close_is_inert() {
    // given
    let host = Rc::new(FakeHost::new(ContextBehavior::Absent));
    let navigator = Rc::new(RecordingNavigator::default());
    let mut controller =
        PlatformController::new(host.clone(), navigator.clone(), Duration::from_millis(1_500));
    controller.bootstrap().await;

    // when
    controller.open_url("https://base-sepolia.blockscout.com/tx/0x01").await;
    controller.close().await;

    // then
    assert_eq!(
        navigator.opened(),
        vec!["https://base-sepolia.blockscout.com/tx/0x01".to_string()]
    );
    assert_eq!(host.close_calls(), 0);
}
