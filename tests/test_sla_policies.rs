mod helpers;

use helpers::*;
use oxidesk_sla::domain::entities::*;
use oxidesk_sla::domain::errors::DomainError;

#[tokio::test]
async fn test_create_and_get_policy() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;

    let policy = create_test_policy(
        &t.engine,
        "Standard",
        "2h",
        "1d",
        "4h",
        vec![
            warning_rule("15m", vec![NotificationRecipient::AssignedUser]),
            breach_rule(vec![NotificationRecipient::Agent("lead-1".to_string())]),
        ],
    )
    .await;

    let loaded = t.engine.sla_service.get_policy(&policy.id).await.unwrap();
    assert_eq!(loaded.name, "Standard");
    assert_eq!(loaded.description.as_deref(), Some("Test policy: Standard"));
    assert_eq!(loaded.first_response_time, "2h");
    assert_eq!(loaded.resolution_time, "1d");
    assert_eq!(loaded.next_response_time, "4h");
    assert_eq!(loaded.notifications, policy.notifications);
    assert_eq!(loaded.notifications.len(), 2);
}

#[tokio::test]
async fn test_list_policies_sorted_by_name() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;
    create_test_policy(&t.engine, "Premium", "1h", "", "", vec![]).await;
    create_test_policy(&t.engine, "Basic", "8h", "", "", vec![]).await;

    let names: Vec<String> = t
        .engine
        .sla_service
        .list_policies()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Basic".to_string(), "Premium".to_string()]);
}

#[tokio::test]
async fn test_invalid_durations_are_rejected() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;

    let result = t
        .engine
        .sla_service
        .create_policy(CreateSlaPolicyRequest {
            name: "Broken".to_string(),
            first_response_time: "2 hours".to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DomainError::ValidationError(_))));

    let result = t
        .engine
        .sla_service
        .create_policy(CreateSlaPolicyRequest {
            name: "Bad rule".to_string(),
            first_response_time: "2h".to_string(),
            notifications: vec![warning_rule("soon", vec![NotificationRecipient::AssignedUser])],
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DomainError::ValidationError(_))));

    assert!(t.engine.sla_service.list_policies().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_name_is_conflict() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;
    create_test_policy(&t.engine, "Standard", "2h", "", "", vec![]).await;

    let result = t
        .engine
        .sla_service
        .create_policy(CreateSlaPolicyRequest {
            name: "Standard".to_string(),
            first_response_time: "4h".to_string(),
            ..Default::default()
        })
        .await;
    assert!(matches!(result, Err(DomainError::Conflict(_))));
}

#[tokio::test]
async fn test_partial_update() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;
    let policy = create_test_policy(&t.engine, "Standard", "2h", "1d", "", vec![]).await;

    let updated = t
        .engine
        .sla_service
        .update_policy(
            &policy.id,
            UpdateSlaPolicyRequest {
                resolution_time: Some("2d".to_string()),
                description: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.first_response_time, "2h");
    assert_eq!(updated.resolution_time, "2d");
    assert_eq!(updated.description, None);

    let loaded = t.engine.sla_service.get_policy(&policy.id).await.unwrap();
    assert_eq!(loaded.resolution_time, "2d");
    assert_eq!(loaded.description, None);

    let invalid = t
        .engine
        .sla_service
        .update_policy(
            &policy.id,
            UpdateSlaPolicyRequest {
                next_response_time: Some("later".to_string()),
                ..Default::default()
            },
        )
        .await;
    assert!(matches!(invalid, Err(DomainError::ValidationError(_))));
}

#[tokio::test]
async fn test_missing_policy_is_not_found() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;

    assert!(matches!(
        t.engine.sla_service.get_policy("missing").await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        t.engine.sla_service.delete_policy("missing").await,
        Err(DomainError::NotFound(_))
    ));
    assert!(matches!(
        t.engine
            .sla_service
            .update_policy("missing", UpdateSlaPolicyRequest::default())
            .await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_delete_policy() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;
    let policy = create_test_policy(&t.engine, "Standard", "2h", "", "", vec![]).await;

    t.engine.sla_service.delete_policy(&policy.id).await.unwrap();

    assert!(matches!(
        t.engine.sla_service.get_policy(&policy.id).await,
        Err(DomainError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_policy_in_use_cannot_be_deleted() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;
    setup_weekday_calendar(t.db()).await;
    let conversation = create_test_conversation(t.db(), 1042, None).await;
    let policy = create_test_policy(&t.engine, "Standard", "2h", "", "", vec![]).await;
    t.engine
        .sla_service
        .apply_sla(utc(2023, 10, 10, 10, 0), &conversation.id, None, &policy.id)
        .await
        .unwrap();

    let result = t.engine.sla_service.delete_policy(&policy.id).await;
    assert!(matches!(result, Err(DomainError::Conflict(_))));
}
