mod harness;

use harness::config::ConfigBuilder;
use harness::mock_replicate::MockReplicate;
use harness::server::TestServer;
use serde_json::json;

#[tokio::test]
async fn uploaded_image_is_served_back() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let (status, body) = server
        .post_json(
            "/api/upload-image",
            json!({ "imageData": "data:image/png;base64,AAAA", "fileName": "a.png" }),
        )
        .await;

    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let image_id = body["imageId"].as_str().unwrap();
    let image_url = body["imageUrl"].as_str().unwrap();
    assert_eq!(image_url, format!("http://localhost:3001/temp-images/{image_id}"));

    let resp = server
        .client()
        .get(server.url(&format!("/temp-images/{image_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.headers()["content-type"], "image/png");
    assert_eq!(resp.bytes().await.unwrap().as_ref(), &[0u8, 0, 0]);
}

#[tokio::test]
async fn uploads_past_capacity_stay_reachable() {
    let config = ConfigBuilder::new().with_temp_images(3, 1024 * 1024).build();
    let server = TestServer::start(config).await.unwrap();

    let mut last_id = String::new();
    for _ in 0..10 {
        let (status, body) = server
            .post_json("/api/upload-image", json!({ "imageData": "data:image/png;base64,AAAA" }))
            .await;
        assert_eq!(status, 200);
        last_id = body["imageId"].as_str().unwrap().to_owned();
    }

    let resp = server
        .client()
        .get(server.url(&format!("/temp-images/{last_id}")))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn upload_over_store_budget_is_413() {
    let config = ConfigBuilder::new().with_temp_images(2, 16).build();
    let server = TestServer::start(config).await.unwrap();

    let image_data = format!("data:image/png;base64,{}", "A".repeat(24));
    let (status, body) = server
        .post_json("/api/upload-image", json!({ "imageData": image_data }))
        .await;

    assert_eq!(status, 413);
    assert!(body["error"].as_str().unwrap().contains("too large"));
}

#[tokio::test]
async fn public_url_controls_links() {
    let config = ConfigBuilder::new().with_public_url("https://edit.example.com/").build();
    let server = TestServer::start(config).await.unwrap();

    let (_, body) = server
        .post_json("/api/upload-image", json!({ "imageData": "data:image/jpeg;base64,/9j/4AAQ" }))
        .await;

    assert!(
        body["imageUrl"]
            .as_str()
            .unwrap()
            .starts_with("https://edit.example.com/temp-images/")
    );
}

#[tokio::test]
async fn upload_requires_image_data() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let (status, body) = server.post_json("/api/upload-image", json!({ "fileName": "a.png" })).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "No image data provided");
}

#[tokio::test]
async fn upload_rejects_non_data_url() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let (status, body) = server
        .post_json("/api/upload-image", json!({ "imageData": "https://example.com/a.png" }))
        .await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn unknown_temp_image_is_404() {
    let server = TestServer::start(ConfigBuilder::new().build()).await.unwrap();

    let resp = server
        .client()
        .get(server.url("/temp-images/1700000000000-nothere00"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("1700000000000-nothere00"));
}

#[tokio::test]
async fn uploaded_image_is_inlined_for_the_model() {
    let mock = MockReplicate::start().await.unwrap();
    let server = TestServer::start(ConfigBuilder::new().with_replicate(&mock.base_url()).build())
        .await
        .unwrap();

    let (_, upload) = server
        .post_json("/api/upload-image", json!({ "imageData": "data:image/png;base64,AAAA" }))
        .await;

    let (status, _) = server
        .post_json(
            "/api/nano-banana",
            json!({ "prompt": "brighten", "image_input": upload["imageUrl"] }),
        )
        .await;
    assert_eq!(status, 200);

    let calls = mock.calls();
    assert_eq!(calls[0].input["image_input"], json!(["data:image/png;base64,AAAA"]));
}
