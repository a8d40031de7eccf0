//! Page draining and notification handling tests

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{record, Delivery, PageStep, ScriptedService};
use wx_common::{ChannelHandle, NotificationKind, WeatherInfoReady};
use wx_router::{NotificationDemux, PageDrainer, RequestOutcome, RequestState, ResultStore};
use wx_service::ServiceError;

const CHANNEL: ChannelHandle = ChannelHandle(1);

async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_pages_concatenate_in_order() {
    let service = Arc::new(ScriptedService::new(&["Flint"]).with_pages(
        "Flint",
        vec![
            PageStep::Page(vec![record("Flint", 3, 30), record("Flint", 10, 32)], true),
            PageStep::Page(vec![record("Flint", 17, 28)], true),
            PageStep::Page(vec![record("Flint", 24, 25)], false),
        ],
    ));
    let id = service.seed_request("Flint");

    let drained = PageDrainer::new(service.clone()).drain(CHANNEL, id).await;

    assert!(drained.is_complete());
    assert_eq!(drained.pages, 3);
    let temps: Vec<i32> = drained
        .outcome
        .records()
        .iter()
        .map(|r| r.temperature_avg)
        .collect();
    assert_eq!(temps, vec![30, 32, 28, 25]);
    assert_eq!(service.page_calls(), 3);
}

#[tokio::test]
async fn test_failure_keeps_partial_records() {
    let service = Arc::new(ScriptedService::new(&["Flint"]).with_pages(
        "Flint",
        vec![
            PageStep::Page(vec![record("Flint", 3, 30)], true),
            PageStep::Fail,
            PageStep::Page(vec![record("Flint", 10, 32)], false),
        ],
    ));
    let id = service.seed_request("Flint");

    let drained = PageDrainer::new(service.clone()).drain(CHANNEL, id).await;

    assert!(!drained.is_complete());
    assert!(matches!(drained.failure, Some(ServiceError::Unavailable(_))));
    assert_eq!(drained.pages, 1);
    assert_eq!(drained.outcome.records().len(), 1);
    // the drain stops at the failure instead of retrying
    assert_eq!(service.page_calls(), 2);
}

#[tokio::test]
async fn test_no_records_is_empty_outcome() {
    let service = Arc::new(ScriptedService::new(&["Pellston"]));
    let id = service.seed_request("Pellston");

    let drained = PageDrainer::new(service.clone()).drain(CHANNEL, id).await;

    assert!(drained.is_complete());
    assert!(matches!(drained.outcome, RequestOutcome::Empty));
}

#[tokio::test]
async fn test_failure_on_first_page_is_empty_outcome() {
    let service = Arc::new(ScriptedService::new(&["Flint"]).with_pages("Flint", vec![PageStep::Fail]));
    let id = service.seed_request("Flint");

    let drained = PageDrainer::new(service.clone()).drain(CHANNEL, id).await;

    assert_eq!(drained.pages, 0);
    assert!(drained.outcome.is_empty());
}

#[tokio::test]
async fn test_demux_records_once_for_repeated_notifications() {
    let service = Arc::new(ScriptedService::new(&["Flint"]).with_pages(
        "Flint",
        vec![PageStep::Page(vec![record("Flint", 3, 30)], false)],
    ));
    let id = service.seed_request("Flint");
    let store = Arc::new(ResultStore::new());
    store.mark_submitted(id);

    let demux = NotificationDemux::new(service.clone(), store.clone()).unwrap();
    let ready = WeatherInfoReady {
        channel: CHANNEL,
        request_id: id,
    };

    assert!(demux.on_notification(NotificationKind::WeatherInfoReady, ready));
    assert!(!demux.on_notification(NotificationKind::WeatherInfoReady, ready));

    wait_until(|| store.ready_count() == 1).await;
    assert!(!demux.on_notification(NotificationKind::WeatherInfoReady, ready));

    let taken = store.take_ready();
    assert_eq!(taken.len(), 1);
    assert_eq!(taken[0].1.records().len(), 1);
    assert_eq!(store.state(id), Some(RequestState::Consumed));

    // late notification after consumption does not resurrect the request
    assert!(!demux.on_notification(NotificationKind::WeatherInfoReady, ready));
    assert!(store.take_ready().is_empty());

    let stats = demux.stats();
    assert_eq!(stats.received, 4);
    assert_eq!(stats.duplicates, 3);
    assert_eq!(service.page_calls(), 1);
}

#[tokio::test]
async fn test_demux_callback_from_foreign_thread() {
    let service = Arc::new(ScriptedService::new(&["Flint"]).with_pages(
        "Flint",
        vec![
            PageStep::Page(vec![record("Flint", 3, 30)], true),
            PageStep::Page(vec![record("Flint", 10, 32)], false),
        ],
    ));
    let id = service.seed_request("Flint");
    let store = Arc::new(ResultStore::new());
    let demux = NotificationDemux::new(service.clone(), store.clone()).unwrap();

    let callback = demux.callback();
    std::thread::spawn(move || {
        callback(
            NotificationKind::WeatherInfoReady,
            WeatherInfoReady {
                channel: CHANNEL,
                request_id: id,
            },
        )
    })
    .join()
    .unwrap();

    wait_until(|| store.ready_count() == 1).await;
    wait_until(|| demux.in_flight_drains() == 0).await;

    let taken = store.take_ready();
    assert_eq!(taken[0].0, id);
    assert_eq!(taken[0].1.records().len(), 2);
}

#[tokio::test]
async fn test_demux_counts_page_failures() {
    let service = Arc::new(ScriptedService::new(&["Flint"]).with_pages(
        "Flint",
        vec![
            PageStep::Page(vec![record("Flint", 3, 30)], true),
            PageStep::Fail,
        ],
    ));
    let id = service.seed_request("Flint");
    let store = Arc::new(ResultStore::new());
    let demux = NotificationDemux::new(service.clone(), store.clone()).unwrap();

    demux.on_notification(
        NotificationKind::WeatherInfoReady,
        WeatherInfoReady {
            channel: CHANNEL,
            request_id: id,
        },
    );

    wait_until(|| store.ready_count() == 1).await;
    wait_until(|| demux.in_flight_drains() == 0).await;
    assert_eq!(demux.stats().page_failures, 1);
    assert_eq!(store.take_ready()[0].1.records().len(), 1);
}

#[test]
fn test_demux_requires_runtime() {
    let service = Arc::new(ScriptedService::new(&[]).with_delivery(Delivery::Never));
    let store = Arc::new(ResultStore::new());
    assert!(NotificationDemux::new(service, store).is_err());
}

#[tokio::test]
async fn test_panicking_drain_records_empty_result() {
    let service = Arc::new(ScriptedService::new(&["Flint"]).with_pages("Flint", vec![PageStep::Panic]));
    let id = service.seed_request("Flint");
    let store = Arc::new(ResultStore::new());
    let demux = NotificationDemux::new(service.clone(), store.clone()).unwrap();

    assert!(demux.on_notification(
        NotificationKind::WeatherInfoReady,
        WeatherInfoReady {
            channel: CHANNEL,
            request_id: id,
        },
    ));

    wait_until(|| store.ready_count() == 1).await;
    wait_until(|| demux.in_flight_drains() == 0).await;

    let taken = store.take_ready();
    assert_eq!(taken[0].0, id);
    assert!(taken[0].1.is_empty());
    assert_eq!(demux.stats().page_failures, 1);
}
