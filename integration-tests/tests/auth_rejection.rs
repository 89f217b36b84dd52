use crate::common::TestFleet;
use std::time::Duration;

#[tokio::test]
async fn test_wrong_token_is_fatal_at_registration() {
    let mut fleet = TestFleet::new().await;
    fleet.provision_pc("PC-1").await;
    fleet.spawn_agent("PC-1", "not-the-token");

    let status = fleet.wait_for_agent_exit(0, Duration::from_secs(10)).await;
    assert_eq!(
        status.code(),
        Some(1),
        "Rejected registration should exit 1, got {:?}",
        status
    );

    let pcs = fleet.list_pcs().await;
    assert_eq!(pcs[0].status, "OFFLINE");
    assert!(
        pcs[0].registered_at.is_none(),
        "A rejected agent must not register"
    );
    assert!(
        pcs[0].last_seen.is_none(),
        "No heartbeat should have been recorded"
    );
}

#[tokio::test]
async fn test_unprovisioned_pc_is_rejected() {
    let mut fleet = TestFleet::new().await;
    fleet.spawn_agent("PC-GHOST", "some-token");

    let status = fleet.wait_for_agent_exit(0, Duration::from_secs(10)).await;
    assert_eq!(status.code(), Some(1));
    assert!(fleet.list_pcs().await.is_empty());
}

#[tokio::test]
async fn test_revoked_credentials_stop_the_agent() {
    let mut fleet = TestFleet::new().await;
    let token = fleet.provision_pc("PC-1").await;
    fleet.add_agent("PC-1", &token).await;
    assert_eq!(fleet.list_pcs().await[0].status, "ONLINE");

    // Deleting the PC invalidates its token; the next heartbeat gets a 401
    let resp = reqwest::Client::new()
        .delete(format!("{}/api/pcs/PC-1", fleet.collector_url()))
        .send()
        .await
        .expect("Failed to delete PC");
    assert!(resp.status().is_success());

    // The agent notices on its next 3s beat and stops for good
    let status = fleet.wait_for_agent_exit(0, Duration::from_secs(15)).await;
    assert_eq!(
        status.code(),
        Some(1),
        "Agent should stop after a 401, got {:?}",
        status
    );
}
