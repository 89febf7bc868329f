mod helpers;

use helpers::*;
use oxidesk_sla::domain::entities::*;
use oxidesk_sla::domain::errors::DomainError;
use oxidesk_sla::domain::ports::conversation_repository::ConversationRepository;
use tokio_util::sync::CancellationToken;

/// Engine at Tuesday 10:00 with a weekday calendar, one conversation and a
/// policy tracking first response (2h) and next response (30m)
async fn setup_with_applied_sla() -> (TestEngine, ConversationSlaState, AppliedSla) {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;
    setup_weekday_calendar(t.db()).await;
    let conversation = create_test_conversation(t.db(), 1042, None).await;
    let policy = create_test_policy(&t.engine, "Standard", "2h", "", "30m", vec![]).await;

    t.engine
        .sla_service
        .apply_sla(utc(2023, 10, 10, 10, 0), &conversation.id, None, &policy.id)
        .await
        .unwrap();
    let applied = t
        .engine
        .sla_service
        .get_latest_applied_sla(&conversation.id)
        .await
        .unwrap()
        .unwrap();

    (t, conversation, applied)
}

fn created(outcome: NextResponseOutcome) -> SlaEvent {
    match outcome {
        NextResponseOutcome::Created(event) => event,
        other => panic!("Expected a created event, got {:?}", other),
    }
}

#[tokio::test]
async fn test_create_next_response_event() {
    let (t, conversation, applied) = setup_with_applied_sla().await;

    let event = created(
        t.engine
            .sla_service
            .create_next_response_event(&conversation.id, None)
            .await
            .unwrap(),
    );

    assert_eq!(event.applied_sla_id, applied.id);
    assert_eq!(event.metric, SlaMetric::NextResponse);
    assert_eq!(event.status, SlaEventStatus::Pending);
    assert_eq!(event.deadline_at, utc(2023, 10, 10, 10, 30));

    // The event deadline is earlier than the first response deadline
    let state = t
        .db()
        .get_conversation_sla_state(&conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.next_sla_deadline_at, Some(utc(2023, 10, 10, 10, 30)));
}

#[tokio::test]
async fn test_applied_sla_pass_clears_next_deadline() {
    let (t, conversation, _applied) = setup_with_applied_sla().await;
    created(
        t.engine
            .sla_service
            .create_next_response_event(&conversation.id, None)
            .await
            .unwrap(),
    );

    t.clock.set(utc(2023, 10, 10, 10, 5));
    t.engine
        .sla_service
        .evaluate_pending_slas(&CancellationToken::new())
        .await
        .unwrap();

    let state = t
        .db()
        .get_conversation_sla_state(&conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.next_sla_deadline_at, None);
}

#[tokio::test]
async fn test_second_open_event_is_refused() {
    let (t, conversation, applied) = setup_with_applied_sla().await;

    created(
        t.engine
            .sla_service
            .create_next_response_event(&conversation.id, None)
            .await
            .unwrap(),
    );
    let second = t
        .engine
        .sla_service
        .create_next_response_event(&conversation.id, None)
        .await
        .unwrap();
    assert!(matches!(second, NextResponseOutcome::AlreadyExists));

    let events = t.engine.sla_service.list_events(&applied.id).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_concurrent_event_creation_converges_to_one() {
    let (t, conversation, applied) = setup_with_applied_sla().await;

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = t.engine.sla_service.clone();
        let conversation_id = conversation.id.clone();
        handles.push(tokio::spawn(async move {
            service
                .create_next_response_event(&conversation_id, None)
                .await
        }));
    }

    let mut created_count = 0;
    for handle in handles {
        if let NextResponseOutcome::Created(_) = handle.await.unwrap().unwrap() {
            created_count += 1;
        }
    }
    assert_eq!(created_count, 1);

    let events = t.engine.sla_service.list_events(&applied.id).await.unwrap();
    assert_eq!(events.len(), 1);
}

#[tokio::test]
async fn test_event_not_configured_without_next_response_time() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;
    setup_weekday_calendar(t.db()).await;
    let conversation = create_test_conversation(t.db(), 1042, None).await;
    let policy = create_test_policy(&t.engine, "First only", "2h", "", "", vec![]).await;
    t.engine
        .sla_service
        .apply_sla(utc(2023, 10, 10, 10, 0), &conversation.id, None, &policy.id)
        .await
        .unwrap();

    let outcome = t
        .engine
        .sla_service
        .create_next_response_event(&conversation.id, None)
        .await
        .unwrap();
    assert!(matches!(outcome, NextResponseOutcome::NotConfigured));
}

#[tokio::test]
async fn test_event_without_applied_sla_is_not_found() {
    let t = setup_engine(utc(2023, 10, 10, 10, 0)).await;
    setup_weekday_calendar(t.db()).await;
    let conversation = create_test_conversation(t.db(), 1042, None).await;

    let result = t
        .engine
        .sla_service
        .create_next_response_event(&conversation.id, None)
        .await;
    assert!(matches!(result, Err(DomainError::NotFound(_))));
}

#[tokio::test]
async fn test_reply_before_deadline_meets_event() {
    let (t, conversation, applied) = setup_with_applied_sla().await;
    let event = created(
        t.engine
            .sla_service
            .create_next_response_event(&conversation.id, None)
            .await
            .unwrap(),
    );

    let marked = t
        .engine
        .sla_service
        .set_latest_sla_event_met_at(&applied.id, SlaMetric::NextResponse, utc(2023, 10, 10, 10, 20))
        .await
        .unwrap();
    assert_eq!(marked, Some(event.id.clone()));

    t.clock.set(utc(2023, 10, 10, 10, 25));
    let evaluated = t
        .engine
        .sla_service
        .evaluate_pending_events(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(evaluated, 1);

    let events = t.engine.sla_service.list_events(&applied.id).await.unwrap();
    assert_eq!(events[0].status, SlaEventStatus::Met);
    assert_eq!(events[0].met_at, Some(utc(2023, 10, 10, 10, 20)));
    assert_eq!(events[0].breached_at, None);

    // A closed event makes room for the next one
    let next = t
        .engine
        .sla_service
        .create_next_response_event(&conversation.id, None)
        .await
        .unwrap();
    assert!(matches!(next, NextResponseOutcome::Created(_)));
}

#[tokio::test]
async fn test_unanswered_event_breaches_after_deadline() {
    let (t, conversation, applied) = setup_with_applied_sla().await;
    created(
        t.engine
            .sla_service
            .create_next_response_event(&conversation.id, None)
            .await
            .unwrap(),
    );

    // Still within the window: nothing happens
    t.clock.set(utc(2023, 10, 10, 10, 29));
    t.engine
        .sla_service
        .evaluate_pending_events(&CancellationToken::new())
        .await
        .unwrap();
    let events = t.engine.sla_service.list_events(&applied.id).await.unwrap();
    assert_eq!(events[0].status, SlaEventStatus::Pending);

    t.clock.set(utc(2023, 10, 10, 10, 45));
    t.engine
        .sla_service
        .evaluate_pending_events(&CancellationToken::new())
        .await
        .unwrap();

    let events = t.engine.sla_service.list_events(&applied.id).await.unwrap();
    assert_eq!(events[0].status, SlaEventStatus::Breached);
    assert_eq!(events[0].breached_at, Some(utc(2023, 10, 10, 10, 45)));

    let applied = t.engine.sla_service.get_applied_sla(&applied.id).await.unwrap();
    assert_eq!(applied.status, AppliedSlaStatus::Breached);

    // The breached event no longer drives the next deadline
    let state = t
        .db()
        .get_conversation_sla_state(&conversation.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(state.next_sla_deadline_at, Some(utc(2023, 10, 10, 12, 0)));
}

#[tokio::test]
async fn test_late_reply_breaches_event() {
    let (t, conversation, applied) = setup_with_applied_sla().await;
    created(
        t.engine
            .sla_service
            .create_next_response_event(&conversation.id, None)
            .await
            .unwrap(),
    );

    t.engine
        .sla_service
        .set_latest_sla_event_met_at(&applied.id, SlaMetric::NextResponse, utc(2023, 10, 10, 10, 40))
        .await
        .unwrap();
    t.clock.set(utc(2023, 10, 10, 10, 41));
    t.engine
        .sla_service
        .evaluate_pending_events(&CancellationToken::new())
        .await
        .unwrap();

    let events = t.engine.sla_service.list_events(&applied.id).await.unwrap();
    assert_eq!(events[0].status, SlaEventStatus::Breached);
    assert_eq!(events[0].met_at, Some(utc(2023, 10, 10, 10, 40)));
    assert_eq!(events[0].breached_at, Some(utc(2023, 10, 10, 10, 41)));
}

#[tokio::test]
async fn test_reply_without_open_event_records_nothing() {
    let (t, _conversation, applied) = setup_with_applied_sla().await;

    let marked = t
        .engine
        .sla_service
        .set_latest_sla_event_met_at(&applied.id, SlaMetric::NextResponse, utc(2023, 10, 10, 10, 5))
        .await
        .unwrap();
    assert_eq!(marked, None);
}
