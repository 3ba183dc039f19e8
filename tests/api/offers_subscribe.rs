use sqlx::{postgres::PgRow, Row};
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::helpers::TestApp;

#[tokio::test]
async fn subscribe_returns_200_with_the_coupon_code_when_email_is_valid() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_email_server_ok().await;

    let response = test_app.subscribe_email("frank@test.com").await;

    assert_eq!(200, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(
        body,
        serde_json::json!({
            "message": "Successfully subscribed",
            "couponCode": "SAAJ10",
            "remainingOffers": 4
        })
    );
}

#[tokio::test]
async fn subscribe_persists_the_normalized_subscriber() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_email_server_ok().await;
    test_app.subscribe_email("  Frank@Test.COM ").await;

    let (email, coupon_code): (String, String) =
        sqlx::query("SELECT email, coupon_code FROM offer_subscribers;")
            .map(|row: PgRow| (row.get("email"), row.get("coupon_code")))
            .fetch_one(&test_app.db_pool)
            .await
            .expect("Query to fetch offer subscribers failed.");

    assert_eq!(email, "frank@test.com");
    assert_eq!(coupon_code, "SAAJ10");
}

#[tokio::test]
async fn subscribe_returns_400_when_email_is_missing_or_invalid() {
    let test_app = TestApp::spawn_app().await;

    // This is a common practice and it is called table-driven tests. In this case, it simulates different kind of possible request bodies
    // where API should return 400.
    let test_cases = vec![
        (serde_json::json!({}), "Email is required", "missing email"),
        (
            serde_json::json!({ "email": "" }),
            "Email is required",
            "empty email",
        ),
        (
            serde_json::json!({ "email": "not-an-email" }),
            "Invalid email format",
            "email without domain",
        ),
        (
            serde_json::json!({ "email": "frank@localhost" }),
            "Invalid email format",
            "email without top level domain",
        ),
        (
            serde_json::json!({ "email": 42 }),
            "Invalid email format",
            "email that is not a string",
        ),
    ];

    for (invalid_body, expected_message, description) in test_cases {
        let response = test_app.post_subscribe(invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            description
        );

        let body: serde_json::Value = response.json().await.unwrap();

        assert_eq!(body, serde_json::json!({ "message": expected_message }));
    }

    // Bodies the JSON extractor rejects must answer with the same message shape.
    let raw_test_cases = vec![
        (None, "", "Email is required", "no body"),
        (
            Some("application/json"),
            "",
            "Email is required",
            "empty json body",
        ),
        (
            Some("application/x-www-form-urlencoded"),
            "email=frank%40test.com",
            "Email is required",
            "form body",
        ),
    ];

    for (content_type, raw_body, expected_message, description) in raw_test_cases {
        let response = test_app
            .post_raw("/offers/subscribe", content_type, raw_body)
            .await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            description
        );

        let body: serde_json::Value = response.json().await.unwrap();

        assert_eq!(body, serde_json::json!({ "message": expected_message }));
    }

    assert_eq!(test_app.stored_subscriber_count().await, 0);
}

#[tokio::test]
async fn subscribe_twice_with_any_case_variant_returns_already_claimed() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_email_server_ok().await;

    let first = test_app.subscribe_email("frank@test.com").await;
    let second = test_app.subscribe_email("FRANK@Test.com").await;

    assert_eq!(200, first.status().as_u16());
    assert_eq!(400, second.status().as_u16());

    let body: serde_json::Value = second.json().await.unwrap();

    assert_eq!(
        body,
        serde_json::json!({
            "message": "This email has already claimed the offer",
            "couponCode": "SAAJ10",
            "remainingOffers": 4
        })
    );
    assert_eq!(test_app.stored_subscriber_count().await, 1);
}

#[tokio::test]
async fn subscribe_sends_a_coupon_email() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&test_app.email_server)
        .await;

    test_app.subscribe_email("frank@test.com").await;

    let received_requests = test_app.wait_for_email_requests(1).await;
    let body: serde_json::Value = serde_json::from_slice(&received_requests[0].body).unwrap();

    assert_eq!(
        body["personalizations"][0]["to"][0]["email"],
        "frank@test.com"
    );
    assert!(body["content"][0]["value"]
        .as_str()
        .unwrap()
        .contains("SAAJ10"));
}

#[tokio::test]
async fn subscribe_keeps_the_claim_when_the_coupon_email_fails() {
    let test_app = TestApp::spawn_app().await;

    Mock::given(path("/mail/send"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&test_app.email_server)
        .await;

    let response = test_app.subscribe_email("frank@test.com").await;

    assert_eq!(200, response.status().as_u16());

    test_app.wait_for_email_requests(1).await;

    assert_eq!(test_app.stored_subscriber_count().await, 1);
}

#[tokio::test]
async fn subscribe_rejects_new_emails_once_the_quota_is_exhausted() {
    let test_app = TestApp::spawn_app_with_offers(5).await;

    test_app.mount_email_server_ok().await;

    for (index, email) in ["a@test.com", "b@test.com", "c@test.com", "d@test.com", "e@test.com"]
        .iter()
        .enumerate()
    {
        let response = test_app.subscribe_email(email).await;

        assert_eq!(200, response.status().as_u16(), "{} was not accepted", email);

        let body: serde_json::Value = response.json().await.unwrap();

        assert_eq!(body["remainingOffers"], 4 - index as i64);
    }

    let sixth = test_app.subscribe_email("f@test.com").await;

    assert_eq!(400, sixth.status().as_u16());

    let body: serde_json::Value = sixth.json().await.unwrap();

    assert_eq!(
        body,
        serde_json::json!({
            "message": "Sorry, all offers have been claimed",
            "remainingOffers": 0
        })
    );

    // An email that already claimed is told so even when nothing is left
    let repeated = test_app.subscribe_email("c@test.com").await;
    let body: serde_json::Value = repeated.json().await.unwrap();

    assert_eq!(body["message"], "This email has already claimed the offer");
    assert_eq!(body["remainingOffers"], 0);
    assert_eq!(test_app.stored_subscriber_count().await, 5);
}

#[tokio::test]
async fn concurrent_subscriptions_of_the_same_email_claim_once() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_email_server_ok().await;

    let (first, second) = tokio::join!(
        test_app.subscribe_email("frank@test.com"),
        test_app.subscribe_email("Frank@test.com")
    );
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];

    statuses.sort();

    assert_eq!(statuses, vec![200, 400]);
    assert_eq!(test_app.stored_subscriber_count().await, 1);
}

#[tokio::test]
async fn concurrent_subscriptions_never_oversell_the_last_offer() {
    let test_app = TestApp::spawn_app_with_offers(1).await;

    test_app.mount_email_server_ok().await;

    let (first, second) = tokio::join!(
        test_app.subscribe_email("first@test.com"),
        test_app.subscribe_email("second@test.com")
    );
    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];

    statuses.sort();

    assert_eq!(statuses, vec![200, 400]);
    assert_eq!(test_app.stored_subscriber_count().await, 1);
}
