//! Host session lifecycle against the simulated connector.
use rtd_common::SnapshotError;
use rtd_common::host::{Activation, AutomationHost};
use rtd_common::request::CellCoord;
use rtd_common::session::HostSession;
use rtd_common::value::RawValue;
use rtd_feed::{FaultPlan, FeedConfig, HostCall, SimulatedConnector};

fn connector() -> SimulatedConnector {
    SimulatedConnector::new(FeedConfig::default())
}

#[test]
fn test_open_configures_host_and_scratch_document() {
    let connector = connector();
    let probe = connector.probe();

    let mut session = HostSession::open(connector, "Excel.Application").unwrap();
    {
        let mut ws = session.workspace().unwrap();
        let cell = ws.host.cell(ws.sheet, CellCoord::CORNER).unwrap();
        ws.host.set_value(&cell, &RawValue::from("Ticker")).unwrap();
        assert_eq!(ws.host.get_value(&cell).unwrap(), RawValue::from("Ticker"));
    }

    let record = probe.read();
    assert_eq!(record.threading_inits, 1);
    assert_eq!(record.visible, Some(false));
    assert_eq!(record.alerts_suppressed, Some(true));
    assert_eq!(record.documents_created, 1);
    assert_eq!(record.activations, vec![(Activation::CachedTypeInfo, true)]);
    session.close();
}

#[test]
fn test_close_runs_once_even_when_called_twice_and_dropped() {
    let connector = connector();
    let probe = connector.probe();

    let mut session = HostSession::open(connector, "Excel.Application").unwrap();
    session.close();
    session.close();
    assert!(session.is_closed());
    assert!(session.workspace().is_err());
    drop(session);

    let record = probe.read();
    assert_eq!(record.documents_closed, 1);
    assert_eq!(record.quit_calls, 1);
    assert_eq!(record.threading_releases, 1);
}

#[test]
fn test_drop_tears_down_unclosed_session() {
    let connector = connector();
    let probe = connector.probe();

    let session = HostSession::open(connector, "Excel.Application").unwrap();
    drop(session);

    assert_eq!(probe.read().teardown_calls(), 3);
}

#[test]
fn test_activation_falls_back_to_late_binding() {
    let connector = connector().failing_activation(Activation::CachedTypeInfo);
    let probe = connector.probe();

    let session = HostSession::open(connector, "Excel.Application").unwrap();
    drop(session);

    let record = probe.read();
    assert_eq!(
        record.activations,
        vec![
            (Activation::CachedTypeInfo, false),
            (Activation::LateBound, true)
        ]
    );
    assert_eq!(record.cache_clears, 0);
}

#[test]
fn test_last_resort_clears_metadata_cache() {
    let connector = connector()
        .failing_activation(Activation::CachedTypeInfo)
        .failing_activation(Activation::LateBound);
    let probe = connector.probe();

    let session = HostSession::open(connector, "Excel.Application").unwrap();
    drop(session);

    let record = probe.read();
    assert_eq!(record.cache_clears, 1);
    assert_eq!(record.activations.last(), Some(&(Activation::RegeneratedTypeInfo, true)));
}

#[test]
fn test_unregistered_host_is_unavailable() {
    let connector = connector();
    let probe = connector.probe();

    let err = HostSession::open(connector, "Calc.Application").err().unwrap();

    match err {
        SnapshotError::HostUnavailable { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other:?}"),
    }
    let record = probe.read();
    assert_eq!(record.activations.len(), 3);
    assert_eq!(record.documents_created, 0);
    assert_eq!(record.quit_calls, 0);
    assert_eq!(record.threading_releases, 1);
}

#[test]
fn test_threading_failure_is_unavailable() {
    let connector = connector().failing_threading();
    let probe = connector.probe();

    let err = HostSession::open(connector, "Excel.Application").err().unwrap();

    assert_eq!(err.kind(), "host_unavailable");
    let record = probe.read();
    assert!(record.activations.is_empty());
    assert_eq!(record.threading_releases, 0);
}

#[test]
fn test_configuration_failure_quits_activated_host() {
    let connector = connector().with_faults(FaultPlan::new().fail(HostCall::SetAlertsSuppressed, 0));
    let probe = connector.probe();

    let err = HostSession::open(connector, "Excel.Application").err().unwrap();

    assert_eq!(err.kind(), "host_fault");
    let record = probe.read();
    assert_eq!(record.quit_calls, 1);
    assert_eq!(record.documents_created, 0);
    assert_eq!(record.documents_closed, 0);
    assert_eq!(record.threading_releases, 1);
}

#[test]
fn test_teardown_failures_do_not_stop_later_steps() {
    let faults = FaultPlan::new()
        .fail(HostCall::CloseDocument, 0)
        .fail(HostCall::Quit, 0);
    let connector = connector().with_faults(faults);
    let probe = connector.probe();

    let mut session = HostSession::open(connector, "Excel.Application").unwrap();
    session.close();

    let record = probe.read();
    assert_eq!(record.documents_closed, 0);
    assert_eq!(record.quit_calls, 1);
    assert_eq!(record.threading_releases, 1);
}
