mod helpers;

use helpers::{pdf_part, setup_test_app, upload_form};
use axum_test::multipart::Part;
use intake_core::models::SessionStatus;
use intake_core::new_session_id;
use intake_storage::keys;
use serde_json::{json, Value};

#[tokio::test]
async fn test_upload_pdf() {
    let app = setup_test_app().await;
    let id = app.new_session().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(
            &id.to_string(),
            vec![pdf_part("cv.pdf", 2 * 1024 * 1024)],
        ))
        .await;
    assert_eq!(response.status_code(), 200);

    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    let file = &body["files"][0];
    assert_eq!(file["name"], "cv.pdf");
    assert_eq!(file["key"], keys::object_key(&id, "cv.pdf"));
    assert_eq!(file["size"], 2 * 1024 * 1024);
    assert_eq!(
        file["url"],
        format!("{}/{}", helpers::FILES_BASE_URL, keys::object_key(&id, "cv.pdf"))
    );

    // Local storage URLs are served back by the API.
    let download = app
        .client()
        .get(&format!("/files/{}", keys::object_key(&id, "cv.pdf")))
        .await;
    assert_eq!(download.status_code(), 200);
    assert_eq!(download.as_bytes().len(), 2 * 1024 * 1024);
}

#[tokio::test]
async fn test_upload_rejects_non_pdf() {
    let app = setup_test_app().await;
    let id = app.new_session().await;

    let text = Part::bytes(bytes::Bytes::from_static(b"hello"))
        .file_name("notes.txt")
        .mime_type("text/plain");
    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(&id.to_string(), vec![text]))
        .await;
    assert_eq!(response.status_code(), 400);

    let body: Value = response.json();
    assert_eq!(body["error"], "unsupported file type");
    assert_eq!(body["code"], "FILE_REJECTED");
}

#[tokio::test]
async fn test_upload_rejects_oversize() {
    let app = setup_test_app().await;
    let id = app.new_session().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(
            &id.to_string(),
            vec![pdf_part("big.pdf", 5_242_881)],
        ))
        .await;
    assert_eq!(response.status_code(), 400);

    let body: Value = response.json();
    assert_eq!(body["error"], "file too large");
}

#[tokio::test]
async fn test_upload_rejects_fourth_file() {
    let app = setup_test_app().await;
    let id = app.new_session().await;
    let session = id.to_string();

    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(
            &session,
            vec![
                pdf_part("a.pdf", 10),
                pdf_part("b.pdf", 10),
                pdf_part("c.pdf", 10),
                pdf_part("d.pdf", 10),
            ],
        ))
        .await;
    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert_eq!(body["error"], "only 3 files allowed");

    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(
            &session,
            vec![pdf_part("a.pdf", 10), pdf_part("b.pdf", 10), pdf_part("c.pdf", 10)],
        ))
        .await;
    assert_eq!(response.status_code(), 200);

    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(&session, vec![pdf_part("d.pdf", 10)]))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_requires_active_session() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(
            &new_session_id().to_string(),
            vec![pdf_part("a.pdf", 10)],
        ))
        .await;
    assert_eq!(response.status_code(), 409);

    let done = new_session_id();
    app.store.seed(done, SessionStatus::Complete).await;
    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(&done.to_string(), vec![pdf_part("a.pdf", 10)]))
        .await;
    assert_eq!(response.status_code(), 409);

    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form("not-a-uuid", vec![pdf_part("a.pdf", 10)]))
        .await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_upload_requires_session_field() {
    let app = setup_test_app().await;

    let form = axum_test::multipart::MultipartForm::new().add_part("file", pdf_part("a.pdf", 10));
    let response = app.client().post("/upload").multipart(form).await;
    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_delete_file() {
    let app = setup_test_app().await;
    let id = app.new_session().await;

    let response = app
        .client()
        .post("/upload")
        .multipart(upload_form(&id.to_string(), vec![pdf_part("cv.pdf", 10)]))
        .await;
    let body: Value = response.json();
    let key = body["files"][0]["key"].as_str().unwrap().to_string();
    let url = body["files"][0]["url"].as_str().unwrap().to_string();

    // Another session cannot remove it.
    let other = app.new_session().await;
    let response = app
        .client()
        .post("/delete")
        .json(&json!({ "key": key, "sessionId": other.to_string() }))
        .await;
    assert_eq!(response.status_code(), 400);
    assert!(app.storage().exists(&key).await.unwrap());

    let response = app
        .client()
        .post("/delete")
        .json(&json!({ "url": url, "sessionId": id.to_string() }))
        .await;
    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "success");
    assert!(!app.storage().exists(&key).await.unwrap());

    let response = app
        .client()
        .post("/delete")
        .json(&json!({ "sessionId": id.to_string() }))
        .await;
    assert_eq!(response.status_code(), 400);
}
