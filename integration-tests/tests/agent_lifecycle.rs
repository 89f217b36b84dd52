use crate::common::TestFleet;
use std::time::Duration;

#[tokio::test]
async fn test_agent_registers_and_goes_online() {
    let mut fleet = TestFleet::new().await;
    let token = fleet.provision_pc("PC-1").await;
    fleet.add_agent("PC-1", &token).await;

    let pcs = fleet.list_pcs().await;
    assert_eq!(pcs.len(), 1, "Expected 1 PC, got {}", pcs.len());

    let pc = &pcs[0];
    assert_eq!(pc.pc_id, "PC-1");
    assert_eq!(pc.status, "ONLINE", "PC should be online after registration");
    assert!(pc.hostname.is_some(), "Registration should record the hostname");
    assert!(pc.registered_at.is_some());

    // The first heartbeat fires immediately after registration: its metrics
    // are visible well before the first 3s interval has elapsed.
    assert!(
        pc.uptime_seconds.is_some(),
        "Immediate first heartbeat should have reported metrics"
    );
    assert_eq!(
        pc.last_heartbeat_success,
        Some(true),
        "First heartbeat reports the successful registration exchange"
    );
}

#[tokio::test]
async fn test_steady_heartbeats_keep_pc_online() {
    // Tight presence threshold: only live heartbeats keep the PC online
    let mut fleet = TestFleet::with_options(4, 900).await;
    let token = fleet.provision_pc("PC-1").await;
    fleet.add_agent("PC-1", &token).await;

    // Outlive several presence-monitor sweeps
    tokio::time::sleep(Duration::from_secs(9)).await;

    let pcs = fleet.list_pcs().await;
    assert_eq!(
        pcs[0].status, "ONLINE",
        "Steady heartbeats should keep the PC online"
    );
    assert_eq!(pcs[0].last_heartbeat_success, Some(true));
}
