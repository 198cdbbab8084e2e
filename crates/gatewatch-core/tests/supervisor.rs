mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{MockConnector, MockModem};
use gatewatch_core::modem::{DeviceWait, ModemStatusMessage, Supervisor, SupervisorSettings};
use gatewatch_core::protocol::TransportConfig;
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const BACKOFF: Duration = Duration::from_secs(30);

fn settings() -> SupervisorSettings {
    SupervisorSettings::new(TransportConfig::new("/dev/ttyUSB3"))
}

#[tokio::test(start_paused = true)]
async fn test_backs_off_between_failed_opens() {
    let connector = MockConnector::missing_device();
    let opens = connector.opens();
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = Supervisor::new(connector, settings(), tx, cancel.clone()).spawn();

    assert_eq!(rx.recv().await, Some(ModemStatusMessage::unavailable()));
    let first_failure = Instant::now();
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    for attempt in 2..=4 {
        assert_eq!(rx.recv().await, Some(ModemStatusMessage::unavailable()));
        assert_eq!(opens.load(Ordering::SeqCst), attempt);
    }
    assert!(first_failure.elapsed() >= BACKOFF * 3);

    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_stops_reconnecting() {
    let connector = MockConnector::missing_device();
    let opens = connector.opens();
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = Supervisor::new(connector, settings(), tx, cancel.clone()).spawn();

    rx.recv().await;
    tokio::time::sleep(BACKOFF / 2).await;
    cancel.cancel();
    handle.await.unwrap();

    tokio::time::sleep(BACKOFF * 4).await;
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(rx.recv().await, None);
}

#[tokio::test(start_paused = true)]
async fn test_transport_closed_after_failed_session() {
    let modem = MockModem::healthy().silent("AT");
    let recorder = modem.recorder();
    let connector = MockConnector::new(modem);
    let opens = connector.opens();
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = Supervisor::new(connector, settings(), tx, cancel.clone()).spawn();

    assert_eq!(rx.recv().await, Some(ModemStatusMessage::unavailable()));
    let first_failure = Instant::now();
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.closes(), 1);

    for attempt in 2..=3 {
        assert_eq!(rx.recv().await, Some(ModemStatusMessage::unavailable()));
        assert_eq!(opens.load(Ordering::SeqCst), attempt);
        assert_eq!(recorder.closes(), attempt);
    }
    assert!(first_failure.elapsed() >= BACKOFF * 2);

    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(recorder.closes(), opens.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_transport_closed_on_cancel() {
    let modem = MockModem::healthy();
    let recorder = modem.recorder();
    let connector = MockConnector::new(modem);
    let opens = connector.opens();
    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = Supervisor::new(connector, settings(), tx, cancel.clone()).spawn();

    let status = rx.recv().await.unwrap();
    assert!(status.modem_available);
    assert!(status.sim_ready);

    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(opens.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stops_when_receiver_dropped() {
    let modem = MockModem::healthy();
    let recorder = modem.recorder();
    let connector = MockConnector::new(modem);
    let (tx, rx) = mpsc::channel(1);
    drop(rx);

    Supervisor::new(connector, settings(), tx, CancellationToken::new())
        .run()
        .await;
    assert_eq!(recorder.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_missing_modem_config_reports_unconfigured() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::new(MockModem::healthy());
    let opens = connector.opens();
    let mut settings = settings();
    settings.modem_config_file = Some(dir.path().join("wvdial.conf"));

    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = Supervisor::new(connector, settings, tx, cancel.clone()).spawn();

    assert_eq!(rx.recv().await, Some(ModemStatusMessage::unconfigured()));
    cancel.cancel();
    handle.await.unwrap();
    assert_eq!(opens.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_present_modem_config_allows_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("wvdial.conf");
    std::fs::write(&config, "[Dialer Defaults]\n").unwrap();

    let connector = MockConnector::new(MockModem::healthy());
    let mut settings = settings();
    settings.modem_config_file = Some(config);

    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let handle = Supervisor::new(connector, settings, tx, cancel.clone()).spawn();

    let status = rx.recv().await.unwrap();
    assert!(status.config_available);
    assert!(status.modem_available);
    cancel.cancel();
    handle.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_waits_for_device_before_opening() {
    let dir = tempfile::tempdir().unwrap();
    let connector = MockConnector::missing_device();
    let opens = connector.opens();
    let mut settings = SupervisorSettings::new(TransportConfig::new(
        dir.path().join("ttyUSB3").to_string_lossy(),
    ));
    settings.device_wait = Some(DeviceWait {
        attempts: 3,
        interval: Duration::from_secs(5),
    });

    let (tx, mut rx) = mpsc::channel(1);
    let cancel = CancellationToken::new();
    let start = Instant::now();
    let handle = Supervisor::new(connector, settings, tx, cancel.clone()).spawn();

    assert_eq!(rx.recv().await, Some(ModemStatusMessage::unavailable()));
    assert!(start.elapsed() >= Duration::from_secs(15));
    assert_eq!(opens.load(Ordering::SeqCst), 1);

    cancel.cancel();
    handle.await.unwrap();
}
