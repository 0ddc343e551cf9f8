//! Provisioning and plan discovery against the in-memory gateway.

use tokio_util::sync::CancellationToken;

use plansmith_core::error::ErrorKind;
use plansmith_core::provision::{
    ProvisionError, ProvisionRequest, find_plan_by_title, provision_plan,
};
use plansmith_test_utils::{Call, FakeGateway, Op, fault};

fn request(members: &[&str]) -> ProvisionRequest {
    ProvisionRequest {
        group_name: "Tech Events".into(),
        group_description: "Company technical events".into(),
        plan_title: "Events 2024".into(),
        members: members.iter().map(|m| m.to_string()).collect(),
    }
}

#[tokio::test]
async fn provisions_group_members_and_plan_in_order() {
    let gateway = FakeGateway::new();
    let alice = gateway.add_user("alice@contoso.com", "Alice");

    let provisioned = provision_plan(
        &gateway,
        &request(&["alice@contoso.com", "nobody@contoso.com"]),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(provisioned.group.display_name.as_deref(), Some("Tech Events"));
    assert_eq!(provisioned.plan.title.as_deref(), Some("Events 2024"));
    assert_eq!(provisioned.plan.owner.as_deref(), Some(provisioned.group.id.as_str()));
    assert_eq!(provisioned.added_members, vec![alice.clone()]);
    assert_eq!(provisioned.missing_members, vec!["nobody@contoso.com"]);
    assert_eq!(gateway.members_of(&provisioned.group.id), vec![alice.id.clone()]);

    let ops: Vec<Op> = gateway.calls().iter().map(Call::op).collect();
    assert_eq!(
        ops,
        vec![
            Op::CreateGroup,
            Op::FindUser,
            Op::AddMember,
            Op::FindUser,
            Op::CreatePlan
        ]
    );
}

#[tokio::test]
async fn duplicate_group_name_is_reported() {
    let gateway = FakeGateway::new();
    gateway.add_group("Tech Events");

    let err = provision_plan(&gateway, &request(&[]), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ProvisionError::CreateGroup { source, .. } => {
            assert_eq!(source.kind(), Some(ErrorKind::Conflict));
        }
        other => panic!("expected CreateGroup error, got {other:?}"),
    }
    assert!(gateway.plans().is_empty());
}

#[tokio::test]
async fn plan_failure_keeps_the_created_group() {
    let gateway = FakeGateway::new();
    gateway.fail_next(Op::CreatePlan, fault(ErrorKind::Transient));

    let err = provision_plan(&gateway, &request(&[]), &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        ProvisionError::CreatePlan { group, title, .. } => {
            assert_eq!(group.display_name.as_deref(), Some("Tech Events"));
            assert_eq!(title, "Events 2024");
        }
        other => panic!("expected CreatePlan error, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_stops_provisioning() {
    let gateway = FakeGateway::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = provision_plan(&gateway, &request(&[]), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, ProvisionError::Cancelled));
    assert!(gateway.calls().is_empty());
}

#[tokio::test]
async fn find_plan_by_title_reports_group_failures() {
    let gateway = FakeGateway::new();
    let broken = gateway.add_group("Broken");
    let events = gateway.add_group("Events");
    gateway.add_plan(&events.id, "Other");
    let wanted = gateway.add_plan(&events.id, "Events 2024");
    gateway.fail_group_plans(&broken.id, fault(ErrorKind::Unauthorized));

    let lookup = find_plan_by_title(&gateway, "Events 2024").await.unwrap();
    let (group, plan) = lookup.found.unwrap();
    assert_eq!(group.id, events.id);
    assert_eq!(plan.id, wanted.id);
    assert_eq!(lookup.failures.len(), 1);
    assert_eq!(lookup.failures[0].0.id, broken.id);
}

#[tokio::test]
async fn find_plan_by_title_returns_none_when_absent() {
    let gateway = FakeGateway::new();
    let group = gateway.add_group("Events");
    gateway.add_plan(&group.id, "Other");

    let lookup = find_plan_by_title(&gateway, "Missing").await.unwrap();
    assert!(lookup.found.is_none());
    assert!(lookup.failures.is_empty());
}
