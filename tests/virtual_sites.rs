//! Virtual-site force redistribution

mod common;

use common::*;
use holonomic::prelude::*;
use holonomic::runtime::cpu::{CpuClient, CpuKernel};

/// Two-particle average sites: site `s` sits at the midpoint of `parents[s]`
/// and hands half its force to each. Slot 0: site list, slot 2: force.
fn midpoint_redistribution(client: &CpuClient) -> CpuKernel {
    client.kernel(VSITE_FORCE, |launch| {
        let sites: Vec<i32> = launch.read(0)?;
        let mut force: Vec<i64> = launch.read(2)?;
        for s in 0..launch.work_units() {
            let (site, a, b) = (
                sites[3 * s] as usize,
                sites[3 * s + 1] as usize,
                sites[3 * s + 2] as usize,
            );
            for c in 0..3 {
                let f = std::mem::take(&mut force[3 * site + c]);
                force[3 * a + c] += f / 2;
                force[3 * b + c] += f - f / 2;
            }
        }
        launch.write(2, &force)
    })
}

#[test]
fn test_no_sites_no_launch() {
    let (client, _) = create_cpu_client();
    let mut engine = create_engine(
        &client,
        IntegrationConfig::default(),
        SystemLayout::new(9).with_settle(3),
        noop_kernels(&client),
    );

    engine.distribute_forces_from_virtual_sites().unwrap();

    assert_eq!(client.launch_count(VSITE_FORCE), 0);
    assert!(client.activity().is_empty());
    assert_eq!(engine.stats().vsite_redistributions, 0);
}

#[test]
fn test_one_launch_over_all_sites() {
    let (client, _) = create_cpu_client();
    let mut engine = create_engine(
        &client,
        IntegrationConfig::default(),
        SystemLayout::new(12).with_vsites(3),
        noop_kernels(&client),
    );

    engine.distribute_forces_from_virtual_sites().unwrap();

    assert_eq!(client.launch_count(VSITE_FORCE), 1);
    assert_eq!(client.host_syncs(), 0);
    assert_eq!(
        engine.kernels().vsite_force.arg(2),
        Some(engine.buffers().long_force.as_arg())
    );
    assert_eq!(engine.stats().vsite_redistributions, 1);
}

#[test]
fn test_independent_of_constraint_state() {
    let (client, _) = create_cpu_client();
    let mut kernels = noop_kernels(&client);
    kernels.ccma_pos_force = converging_force(&client, CCMA_POS_FORCE, None);
    let mut engine = create_engine(
        &client,
        IntegrationConfig::default(),
        SystemLayout::new(8).with_ccma(2).with_vsites(1),
        kernels,
    );

    engine.apply_constraints(false, 1e-6).unwrap();
    client.clear_activity();
    engine.distribute_forces_from_virtual_sites().unwrap();

    assert_eq!(client.launches(), vec![VSITE_FORCE.to_string()]);
}

#[test]
fn test_forces_moved_onto_parents() {
    let (client, _) = create_cpu_client();
    let mut kernels = noop_kernels(&client);
    kernels.vsite_force = midpoint_redistribution(&client);
    kernels
        .vsite_force
        .set_arg(0, client.alloc_array(&[2i32, 0, 1]).unwrap().as_arg())
        .unwrap();
    let mut engine = create_engine(
        &client,
        IntegrationConfig::default(),
        SystemLayout::new(3).with_vsites(1),
        kernels,
    );
    let force = engine.buffers().long_force;
    client
        .write_array(&force, &[10i64, 0, 0, -4, 6, 0, 8, -2, 7])
        .unwrap();

    engine.distribute_forces_from_virtual_sites().unwrap();

    let out: Vec<i64> = client.read_array(&force).unwrap();
    assert_eq!(out, vec![14, -1, 3, 0, 5, 4, 0, 0, 0]);
    assert_eq!(out.iter().sum::<i64>(), 25);
}
