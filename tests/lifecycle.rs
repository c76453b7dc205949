//! Construction, teardown and error propagation

mod common;

use common::*;
use holonomic::prelude::*;
use holonomic::runtime::cpu::HostFault;

#[test]
fn test_signal_allocated_only_with_ccma() {
    let (client, _) = create_cpu_client();
    let engine = create_engine(
        &client,
        IntegrationConfig::default(),
        SystemLayout::new(9).with_settle(3).with_shake(1),
        noop_kernels(&client),
    );
    assert!(engine.convergence_signal().is_none());
    assert_eq!(client.live_events(), 0);
    assert_eq!(client.live_mapped_words(), 0);

    let engine = create_engine(
        &client,
        IntegrationConfig::default(),
        SystemLayout::new(9).with_ccma(4),
        noop_kernels(&client),
    );
    assert!(engine.convergence_signal().is_some());
    assert_eq!(client.live_events(), 1);
    assert_eq!(client.live_mapped_words(), 1);

    drop(engine);
    assert_eq!(client.live_events(), 0);
    assert_eq!(client.live_mapped_words(), 0);
}

#[test]
fn test_event_creation_failure_aborts_construction() {
    let (client, _) = create_cpu_client();
    client.inject_fault(HostFault::CreateEvent, 2);

    let err = IntegrationUtilities::<CpuRuntime>::new(
        client.clone(),
        IntegrationConfig::default(),
        SystemLayout::new(4).with_ccma(1),
        noop_kernels(&client),
        create_buffers(&client, 4),
    )
    .unwrap_err();

    assert_eq!(err.code(), Some(2));
    let msg = err.to_string();
    assert!(msg.starts_with("Error creating event"), "{msg}");
    assert!(msg.contains(".rs:"), "missing call site: {msg}");
    assert_eq!(client.live_events(), 0);
    assert_eq!(client.live_mapped_words(), 0);
}

#[test]
fn test_pinned_allocation_failure_releases_event() {
    let (client, _) = create_cpu_client();
    client.inject_fault(HostFault::AllocMappedWord, 2);

    let err = IntegrationUtilities::<CpuRuntime>::new(
        client.clone(),
        IntegrationConfig::default(),
        SystemLayout::new(4).with_ccma(1),
        noop_kernels(&client),
        create_buffers(&client, 4),
    )
    .unwrap_err();

    assert!(matches!(err, Error::Runtime { code: 2, .. }));
    assert!(err.to_string().starts_with("Error allocating pinned memory"));
    assert_eq!(client.live_events(), 0);
    assert_eq!(client.live_mapped_words(), 0);
}

#[test]
fn test_invalid_config_rejected() {
    let (client, _) = create_cpu_client();
    let err = IntegrationUtilities::<CpuRuntime>::new(
        client.clone(),
        IntegrationConfig::default().with_ccma_limits(150, 0),
        SystemLayout::new(4).with_ccma(1),
        noop_kernels(&client),
        create_buffers(&client, 4),
    )
    .unwrap_err();

    assert!(matches!(
        err,
        Error::InvalidArgument {
            arg: "ccma.check_interval",
            ..
        }
    ));
    assert_eq!(client.live_events(), 0);
}

#[test]
fn test_launch_failure_propagates() {
    let (client, _) = create_cpu_client();
    let mut engine = create_engine(
        &client,
        IntegrationConfig::default(),
        SystemLayout::new(6).with_settle(2).with_shake(1),
        noop_kernels(&client),
    );
    client.inject_fault(HostFault::Launch(SETTLE_POS.into()), 700);

    let err = engine.apply_constraints(false, 1e-6).unwrap_err();
    assert_eq!(err.code(), Some(700));
    assert!(err.to_string().starts_with("Error launching kernel"));
    // Nothing after the failed launch was enqueued.
    assert!(client.launches().is_empty());

    engine.apply_constraints(false, 1e-6).unwrap();
    assert_eq!(client.launches().len(), 2);
}

#[test]
fn test_checkpoint_failures_propagate() {
    for fault in [HostFault::RecordEvent, HostFault::SynchronizeEvent] {
        let (client, _) = create_cpu_client();
        let mut kernels = noop_kernels(&client);
        kernels.ccma_pos_force = converging_force(&client, CCMA_POS_FORCE, Some(20));
        let mut engine = create_engine(
            &client,
            IntegrationConfig::default(),
            SystemLayout::new(4).with_ccma(2),
            kernels,
        );
        client.inject_fault(fault.clone(), 999);

        let err = engine.apply_constraints(false, 1e-6).unwrap_err();
        assert_eq!(err.code(), Some(999), "{fault:?}");
        assert_eq!(client.launch_count(CCMA_POS_FORCE), 4, "{fault:?}");
        assert_eq!(engine.stats().ccma_solves, 0, "{fault:?}");
    }
}

#[test]
fn test_unconverged_is_not_an_error() {
    let (client, _) = create_cpu_client();
    let mut kernels = noop_kernels(&client);
    kernels.ccma_vel_force = converging_force(&client, CCMA_VEL_FORCE, None);
    let mut engine = create_engine(
        &client,
        IntegrationConfig::default(),
        SystemLayout::new(4).with_ccma(2),
        kernels,
    );

    assert!(engine.apply_velocity_constraints(1e-6).is_ok());
    assert_eq!(engine.stats().unconverged_solves, 1);
}

#[test]
fn test_buffer_accessors() {
    let (client, _) = create_cpu_client();
    let buffers = create_buffers(&client, 5);
    let engine = IntegrationUtilities::<CpuRuntime>::new(
        client.clone(),
        IntegrationConfig::with_precision(Precision::Mixed),
        SystemLayout::new(5),
        noop_kernels(&client),
        buffers,
    )
    .unwrap();

    assert_eq!(*engine.pos_delta(), buffers.pos_delta);
    assert_eq!(*engine.random(), buffers.random);
    assert_eq!(*engine.step_size(), buffers.step_size);
    assert_eq!(engine.precision(), Precision::Mixed);
    assert_eq!(engine.pos_delta().len(), 20);
}
