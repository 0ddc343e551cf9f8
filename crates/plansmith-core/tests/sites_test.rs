use plansmith_core::gateway::Gateway;
use plansmith_core::model::Site;
use plansmith_core::sites::classify;
use plansmith_test_utils::FakeGateway;

const HOST: &str = "contoso.sharepoint.com";

#[tokio::test]
async fn listed_sites_partition_into_share_point_and_one_drive() {
    let gateway = FakeGateway::new();
    gateway.add_site(Site::new("Team A", format!("https://{HOST}/sites/teamA"), HOST));
    gateway.add_site(Site::new("User B", format!("https://{HOST}/personal/userB"), HOST));
    gateway.add_site(Site::new("Other", format!("https://{HOST}/other/x"), HOST));
    gateway.add_site(Site::new("", format!("https://{HOST}/sites/unnamed"), HOST));
    gateway.add_site(Site::new("Root", format!("https://{HOST}"), HOST));
    gateway.add_site(Site::new("Moved", "https://fabrikam.com/sites/moved", HOST));

    let classified = classify(gateway.list_sites().await.unwrap());

    let share_point: Vec<&str> = classified
        .share_point
        .iter()
        .filter_map(|s| s.display_name.as_deref())
        .collect();
    let one_drive: Vec<&str> = classified
        .one_drive
        .iter()
        .filter_map(|s| s.display_name.as_deref())
        .collect();
    assert_eq!(share_point, vec!["Team A", "Root"]);
    assert_eq!(one_drive, vec!["User B"]);
}

#[test]
fn classification_is_disjoint() {
    let sites: Vec<Site> = (0..20)
        .map(|i| {
            let segment = ["sites", "personal", "teams", ""][i % 4];
            Site::new(format!("site {i}"), format!("https://{HOST}/{segment}/s{i}"), HOST)
        })
        .collect();
    let classified = classify(sites);
    for site in &classified.share_point {
        assert!(!classified.one_drive.contains(site));
    }
    assert_eq!(classified.share_point.len(), 10);
    assert_eq!(classified.one_drive.len(), 5);
}
