// Project lifecycle, messaging, dashboards and payments over the full app

mod common;

use actix_web::test;
use serde_json::json;

use common::{call_json, project_body, register, test_state};

#[actix_rt::test]
async fn test_project_assign_and_complete() {
    let state = test_state().await;
    let app = test_app!(state);
    let client = register(&app, "owner@example.com", "client").await;
    let professional = register(&app, "builder@example.com", "professional").await;
    let outsider = register(&app, "outsider@example.com", "client").await;

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .insert_header(client.bearer())
        .set_json(project_body("Storefront"))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["status"], "open");
    let project_id = body["data"]["id"].as_str().unwrap().to_string();

    // only the owner may assign
    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/assign", project_id))
        .insert_header(outsider.bearer())
        .set_json(json!({"professionalId": professional.id}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 403);

    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/assign", project_id))
        .insert_header(client.bearer())
        .set_json(json!({"professionalId": outsider.id}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 400);

    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/assign", project_id))
        .insert_header(client.bearer())
        .set_json(json!({"professionalId": professional.id}))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "in_progress");
    assert_eq!(body["data"]["professionalId"], professional.id.as_str());

    // already taken, a second assignment does not overwrite the first
    let rival = register(&app, "rival@example.com", "professional").await;
    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/assign", project_id))
        .insert_header(client.bearer())
        .set_json(json!({"professionalId": rival.id}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 409);

    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}", project_id))
        .insert_header(client.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"]["professionalId"], professional.id.as_str());

    // open -> in_progress happened, cannot go back to draft
    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/status", project_id))
        .insert_header(professional.bearer())
        .set_json(json!({"status": "draft"}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 400);

    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/status", project_id))
        .insert_header(outsider.bearer())
        .set_json(json!({"status": "completed"}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 403);

    let req = test::TestRequest::put()
        .uri(&format!("/api/projects/{}/status", project_id))
        .insert_header(professional.bearer())
        .set_json(json!({"status": "completed"}))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "completed");

    let req = test::TestRequest::get()
        .uri("/api/projects?status=completed")
        .to_request();
    let (status, page) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(page["data"]["totalCount"], 1);
    assert_eq!(page["data"]["pageItems"][0]["id"], project_id.as_str());

    let req = test::TestRequest::get()
        .uri("/api/projects?status=archived")
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 400);

    // the assignment and the completion each notified the other party
    let req = test::TestRequest::get()
        .uri("/api/notifications?unreadOnly=true")
        .insert_header(client.bearer())
        .to_request();
    let (_, notifications) = call_json(&app, req).await;
    assert!(
        notifications["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|n| n["type"] == "project")
    );
}

#[actix_rt::test]
async fn test_messages_and_notifications() {
    let state = test_state().await;
    let app = test_app!(state);
    let alice = register(&app, "alice@example.com", "client").await;
    let bob = register(&app, "bob@example.com", "professional").await;

    // welcome notification from registration
    let req = test::TestRequest::get()
        .uri("/api/notifications/unread-count")
        .insert_header(bob.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"]["count"], 1);

    let req = test::TestRequest::post()
        .uri("/api/messages")
        .insert_header(alice.bearer())
        .set_json(json!({"receiverId": bob.id, "content": "  Are you available?  "}))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 201);
    assert_eq!(body["data"]["online"], false);
    assert_eq!(body["data"]["message"]["content"], "Are you available?");

    let req = test::TestRequest::post()
        .uri("/api/messages")
        .insert_header(alice.bearer())
        .set_json(json!({"receiverId": alice.id, "content": "note to self"}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 400);

    let req = test::TestRequest::post()
        .uri("/api/messages")
        .insert_header(alice.bearer())
        .set_json(json!({"receiverId": "missing-user", "content": "hello"}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 404);

    // bob was offline so the message also left a notification
    let req = test::TestRequest::get()
        .uri("/api/notifications/unread-count")
        .insert_header(bob.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"]["count"], 2);

    let req = test::TestRequest::get()
        .uri("/api/messages")
        .insert_header(bob.bearer())
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    let conversations = body["data"].as_array().unwrap();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0]["peerId"], alice.id.as_str());
    assert_eq!(conversations[0]["unreadCount"], 1);

    let req = test::TestRequest::get()
        .uri(&format!("/api/messages/{}", alice.id))
        .insert_header(bob.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let req = test::TestRequest::put()
        .uri(&format!("/api/messages/{}/read", alice.id))
        .insert_header(bob.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"], 1);

    let req = test::TestRequest::get()
        .uri("/api/notifications")
        .insert_header(bob.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    let message_notification = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .find(|n| n["type"] == "message")
        .cloned()
        .unwrap();
    assert_eq!(
        message_notification["actionUrl"],
        format!("/messages/{}", alice.id).as_str()
    );

    // another user's notification cannot be marked
    let req = test::TestRequest::put()
        .uri(&format!(
            "/api/notifications/{}/read",
            message_notification["id"]
        ))
        .insert_header(alice.bearer())
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 404);

    let req = test::TestRequest::put()
        .uri(&format!(
            "/api/notifications/{}/read",
            message_notification["id"]
        ))
        .insert_header(bob.bearer())
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 200);

    let req = test::TestRequest::put()
        .uri("/api/notifications/read-all")
        .insert_header(bob.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"], 1);
}

#[actix_rt::test]
async fn test_dashboard_cache_is_invalidated_by_writes() {
    let state = test_state().await;
    let app = test_app!(state);
    let client = register(&app, "dash@example.com", "client").await;
    let key = format!("dashboard:{}", client.id);

    let req = test::TestRequest::get()
        .uri("/api/dashboard")
        .insert_header(client.bearer())
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["plan"], "free");
    assert_eq!(body["data"]["activeProjects"], 0);
    assert_eq!(body["data"]["unreadNotifications"], 1);
    assert!(state.dashboards.cache().contains_key(&key));

    let req = test::TestRequest::post()
        .uri("/api/projects")
        .insert_header(client.bearer())
        .set_json(project_body("Invalidates"))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 201);
    assert!(!state.dashboards.cache().contains_key(&key));

    let req = test::TestRequest::get()
        .uri("/api/dashboard")
        .insert_header(client.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"]["activeProjects"], 1);
    assert_eq!(body["data"]["projectsByStatus"]["open"], 1);
    assert_eq!(body["data"]["recentProjects"][0]["title"], "Invalidates");
}

#[actix_rt::test]
async fn test_plan_upgrade_through_payment() {
    let state = test_state().await;
    let app = test_app!(state);
    let professional = register(&app, "upgrade@example.com", "professional").await;

    let req = test::TestRequest::post()
        .uri("/api/subscriptions/change")
        .insert_header(professional.bearer())
        .set_json(json!({"plan": "professional"}))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert!(body["data"]["subscription"].is_null());
    assert_eq!(body["data"]["paymentIntent"]["status"], "requires_payment_method");
    assert_eq!(body["data"]["paymentIntent"]["amountCents"], 2900);

    let req = test::TestRequest::post()
        .uri("/api/payments/intents")
        .insert_header(professional.bearer())
        .set_json(json!({"plan": "professional"}))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 201);
    let intent_id = body["data"]["id"].as_str().unwrap().to_string();

    // plan is unchanged until the payment succeeds
    let req = test::TestRequest::get()
        .uri("/api/subscriptions/current")
        .insert_header(professional.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"]["subscription"]["plan"], "free");

    let outsider = register(&app, "peek@example.com", "client").await;
    let req = test::TestRequest::get()
        .uri(&format!("/api/payments/intents/{}", intent_id))
        .insert_header(outsider.bearer())
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 404);

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/intents/{}/confirm", intent_id))
        .insert_header(professional.bearer())
        .set_json(json!({"paymentMethod": "pm_card_visa"}))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "succeeded");

    let req = test::TestRequest::get()
        .uri("/api/subscriptions/current")
        .insert_header(professional.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"]["subscription"]["plan"], "professional");
    assert_eq!(body["data"]["features"]["analyticsDashboard"], true);

    let req = test::TestRequest::get()
        .uri("/api/analytics")
        .insert_header(professional.bearer())
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["commissionBps"], 1500);

    // a settled intent cannot be confirmed twice
    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/intents/{}/confirm", intent_id))
        .insert_header(professional.bearer())
        .set_json(json!({"paymentMethod": "pm_card_visa"}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 409);

    let req = test::TestRequest::post()
        .uri("/api/subscriptions/cancel")
        .insert_header(professional.bearer())
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["plan"], "professional");
}

#[actix_rt::test]
async fn test_declined_payment_keeps_free_plan() {
    let state = test_state().await;
    let app = test_app!(state);
    let user = register(&app, "declined@example.com", "client").await;

    let req = test::TestRequest::post()
        .uri("/api/payments/intents")
        .insert_header(user.bearer())
        .set_json(json!({"plan": "business"}))
        .to_request();
    let (_, body) = call_json(&app, req).await;
    let intent_id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/payments/intents/{}/confirm", intent_id))
        .insert_header(user.bearer())
        .set_json(json!({"paymentMethod": "pm_card_declined"}))
        .to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "requires_payment_method");
    assert_eq!(body["data"]["lastPaymentError"], "card declined");

    let req = test::TestRequest::get()
        .uri("/api/subscriptions/current")
        .insert_header(user.bearer())
        .to_request();
    let (_, body) = call_json(&app, req).await;
    assert_eq!(body["data"]["subscription"]["plan"], "free");

    let req = test::TestRequest::post()
        .uri("/api/payments/intents")
        .insert_header(user.bearer())
        .set_json(json!({"plan": "free"}))
        .to_request();
    let (status, _) = call_json(&app, req).await;
    assert_eq!(status, 400);
}

#[actix_rt::test]
async fn test_health_endpoints() {
    let state = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/health/liveness").to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "UP");

    let req = test::TestRequest::get().uri("/api/health/readiness").to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["database"], "UP");
}

#[actix_rt::test]
async fn test_plans_are_public() {
    let state = test_state().await;
    let app = test_app!(state);

    let req = test::TestRequest::get().uri("/api/subscriptions/plans").to_request();
    let (status, body) = call_json(&app, req).await;
    assert_eq!(status, 200);
    let tiers: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|plan| plan["tier"].as_str().unwrap())
        .collect();
    assert_eq!(tiers, ["free", "professional", "business", "elite"]);
}
