use crate::helpers::TestApp;

#[tokio::test]
async fn check_without_email_is_rejected_with_400() {
    let test_app = TestApp::spawn_app().await;

    for email in [None, Some(""), Some("   ")] {
        let response = test_app.get_check(email).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when email was {:?}",
            email
        );

        let body: serde_json::Value = response.json().await.unwrap();

        assert_eq!(body["message"], "Email is required");
    }
}

#[tokio::test]
async fn check_reports_unclaimed_emails() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app.get_check(Some("frank@test.com")).await;

    assert_eq!(200, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(
        body,
        serde_json::json!({ "claimed": false, "remainingOffers": 5 })
    );
}

#[tokio::test]
async fn check_matches_claims_case_insensitively() {
    let test_app = TestApp::spawn_app().await;

    test_app.mount_email_server_ok().await;
    test_app.subscribe_email("A@B.com").await;

    let body: serde_json::Value = test_app
        .get_check(Some("a@b.com"))
        .await
        .json()
        .await
        .unwrap();

    assert_eq!(
        body,
        serde_json::json!({ "claimed": true, "remainingOffers": 4 })
    );
}

#[tokio::test]
async fn check_does_not_create_claims() {
    let test_app = TestApp::spawn_app().await;

    test_app.get_check(Some("frank@test.com")).await;
    test_app.get_check(Some("not-an-email")).await;

    assert_eq!(test_app.stored_subscriber_count().await, 0);
}
