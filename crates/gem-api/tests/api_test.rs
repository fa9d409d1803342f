//! REST API against a real Postgres. Needs a Docker daemon:
//! `cargo test -p gem-api --test api_test -- --ignored`

mod helpers;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use gem_storage::Storage;
use helpers::{db_app, login_token, png_bytes};
use serde_json::{json, Value};

fn image_form(filename: &str, mime: &str, data: Vec<u8>) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(data).file_name(filename).mime_type(mime),
    )
}

/// Stored path behind a signed URL issued in a response
fn stored_path(app: &helpers::DbApp, url: &str) -> String {
    app.state
        .assets
        .signer
        .parse(url)
        .expect("signed URL")
        .path
}

#[tokio::test]
#[ignore]
async fn register_login_and_me() {
    let app = db_app().await;
    let token = login_token(&app.server, "ada").await;

    let response = app.server.get("/api/v1/auth/me").authorization_bearer(&token).await;
    response.assert_status_ok();
    let me: Value = response.json();
    assert_eq!(me["username"], "ada");
    assert!(me.get("password_hash").is_none());

    let duplicate = app
        .server
        .post("/api/v1/auth/register")
        .json(&json!({ "email": "ada@example.org", "username": "ada2", "password": "long-enough" }))
        .await;
    duplicate.assert_status(StatusCode::BAD_REQUEST);

    let bad = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "ada", "password": "wrong-password" }))
        .await;
    bad.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore]
async fn inactive_user_cannot_log_in() {
    let app = db_app().await;
    login_token(&app.server, "grace").await;
    sqlx::query("UPDATE users SET is_active = FALSE WHERE username = 'grace'")
        .execute(&app.pool)
        .await
        .unwrap();

    let response = app
        .server
        .post("/api/v1/auth/login")
        .json(&json!({ "username": "grace", "password": "correct-horse-battery" }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
#[ignore]
async fn subgroup_crud_and_membership() {
    let app = db_app().await;
    let token = login_token(&app.server, "admin").await;

    let created = app
        .server
        .post("/api/v1/subgroups")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Energy Policy", "description": "Grid studies" }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let subgroup: Value = created.json();
    let subgroup_id = subgroup["id"].as_i64().unwrap();

    app.server
        .post("/api/v1/subgroups")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Energy Policy" }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let member: Value = app
        .server
        .post("/api/v1/members")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Marie Curie", "email": "marie@example.org" }))
        .await
        .json();
    let member_id = member["id"].as_i64().unwrap();

    let link = format!("/api/v1/subgroups/{}/members/{}", subgroup_id, member_id);
    app.server
        .post(&link)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::CREATED);
    app.server
        .post(&link)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .post(&format!("/api/v1/subgroups/{}/members/999999", subgroup_id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    let listed: Value = app.server.get("/api/v1/subgroups?q=energy").await.json();
    assert_eq!(listed["total"], 1);
    assert_eq!(listed["items"][0]["members"][0]["name"], "Marie Curie");
    assert_eq!(listed["has_next"], false);

    let members: Value = app
        .server
        .get(&format!("/api/v1/members?subgroup_id={}", subgroup_id))
        .await
        .json();
    assert_eq!(members["total"], 1);

    app.server
        .delete(&link)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .delete(&link)
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    app.server
        .delete(&format!("/api/v1/subgroups/{}", subgroup_id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .get(&format!("/api/v1/subgroups/{}", subgroup_id))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn icon_replace_deletes_previous_file() {
    let app = db_app().await;
    let token = login_token(&app.server, "admin").await;
    let subgroup: Value = app
        .server
        .post("/api/v1/subgroups")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Icons" }))
        .await
        .json();
    let id = subgroup["id"].as_i64().unwrap();
    let url = format!("/api/v1/subgroups/{}/icon", id);

    let first: Value = app
        .server
        .post(&url)
        .authorization_bearer(&token)
        .multipart(image_form("a.png", "image/png", png_bytes()))
        .await
        .json();
    let first_path = stored_path(&app, first["icon_url"].as_str().unwrap());
    assert!(first_path.starts_with("subgrupos/icons/"));

    let second: Value = app
        .server
        .post(&url)
        .authorization_bearer(&token)
        .multipart(image_form("b.PNG", "image/png", png_bytes()))
        .await
        .json();
    let second_path = stored_path(&app, second["icon_url"].as_str().unwrap());
    assert!(second_path.ends_with(".png"));
    assert_ne!(first_path, second_path);

    let storage = &app.state.assets.storage;
    assert!(!storage.exists(&first_path).await.unwrap());
    assert!(storage.exists(&second_path).await.unwrap());

    // The URL in the response is directly fetchable
    let parts = app
        .state
        .assets
        .signer
        .parse(second["icon_url"].as_str().unwrap())
        .unwrap();
    app.server
        .get(&format!("/api/v1/files/{}", parts.path))
        .add_query_param("token", &parts.token)
        .add_query_param("expires", &parts.expires)
        .await
        .assert_status_ok();
}

#[tokio::test]
#[ignore]
async fn upload_validation_order() {
    let app = db_app().await;
    let token = login_token(&app.server, "admin").await;
    let member: Value = app
        .server
        .post("/api/v1/members")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Ada" }))
        .await
        .json();
    let url = format!("/api/v1/members/{}/photo", member["id"].as_i64().unwrap());

    let wrong_field = MultipartForm::new().add_part(
        "upload",
        Part::bytes(png_bytes()).file_name("a.png").mime_type("image/png"),
    );
    app.server
        .post(&url)
        .authorization_bearer(&token)
        .multipart(wrong_field)
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let not_multipart = app
        .server
        .post(&url)
        .authorization_bearer(&token)
        .json(&json!({ "file": "a.png" }))
        .await;
    not_multipart.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(not_multipart.json::<Value>()["code"], "BAD_REQUEST");

    app.server
        .post(&url)
        .authorization_bearer(&token)
        .multipart(image_form("a.png", "text/plain", png_bytes()))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post(&url)
        .authorization_bearer(&token)
        .multipart(image_form("a.exe", "image/png", png_bytes()))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post(&url)
        .authorization_bearer(&token)
        .multipart(image_form("a.png", "image/png", Vec::new()))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post(&url)
        .authorization_bearer(&token)
        .multipart(image_form("a.png", "image/png", vec![0u8; 2 * 1024 * 1024]))
        .await
        .assert_status(StatusCode::PAYLOAD_TOO_LARGE);

    app.server
        .post("/api/v1/members/999999/photo")
        .authorization_bearer(&token)
        .multipart(image_form("a.png", "image/png", png_bytes()))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
#[ignore]
async fn infographics_append_and_remove_by_index() {
    let app = db_app().await;
    let token = login_token(&app.server, "admin").await;
    let subgroup: Value = app
        .server
        .post("/api/v1/subgroups")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Charts" }))
        .await
        .json();
    let id = subgroup["id"].as_i64().unwrap();
    let url = format!("/api/v1/subgroups/{}/infographics", id);

    let mut paths = Vec::new();
    for name in ["one.png", "two.png", "three.png"] {
        let response = app
            .server
            .post(&url)
            .authorization_bearer(&token)
            .multipart(image_form(name, "image/png", png_bytes()))
            .await;
        response.assert_status(StatusCode::CREATED);
        let body: Value = response.json();
        let last = body["infographic_urls"].as_array().unwrap().last().unwrap();
        paths.push(stored_path(&app, last.as_str().unwrap()));
    }

    let out_of_range = app
        .server
        .delete(&format!("{}/5", url))
        .authorization_bearer(&token)
        .await;
    out_of_range.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = out_of_range.json();
    assert!(body["error"].as_str().unwrap().contains('3'));

    let removed = app
        .server
        .delete(&format!("{}/1", url))
        .authorization_bearer(&token)
        .await;
    removed.assert_status_ok();
    let body: Value = removed.json();
    assert_eq!(body["removed_index"], 1);
    assert_eq!(body["remaining"], 2);

    let remaining: Vec<String> = body["infographic_urls"]
        .as_array()
        .unwrap()
        .iter()
        .map(|url| stored_path(&app, url.as_str().unwrap()))
        .collect();
    assert_eq!(remaining, vec![paths[0].clone(), paths[2].clone()]);

    let storage = &app.state.assets.storage;
    assert!(!storage.exists(&paths[1]).await.unwrap());
    assert!(storage.exists(&paths[0]).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn deleting_a_member_removes_its_files() {
    let app = db_app().await;
    let token = login_token(&app.server, "admin").await;
    let member: Value = app
        .server
        .post("/api/v1/members")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Rosalind" }))
        .await
        .json();
    let id = member["id"].as_i64().unwrap();

    let updated: Value = app
        .server
        .post(&format!("/api/v1/members/{}/photo", id))
        .authorization_bearer(&token)
        .multipart(image_form("r.jpg", "image/jpeg", png_bytes()))
        .await
        .json();
    let path = stored_path(&app, updated["photo_url"].as_str().unwrap());
    assert!(app.state.assets.storage.exists(&path).await.unwrap());

    app.server
        .delete(&format!("/api/v1/members/{}", id))
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    assert!(!app.state.assets.storage.exists(&path).await.unwrap());
}

#[tokio::test]
#[ignore]
async fn publications_validate_relations_and_search() {
    let app = db_app().await;
    let token = login_token(&app.server, "admin").await;
    let author: Value = app
        .server
        .post("/api/v1/members")
        .authorization_bearer(&token)
        .json(&json!({ "name": "Lise Meitner" }))
        .await
        .json();
    let author_id = author["id"].as_i64().unwrap();

    let missing = app
        .server
        .post("/api/v1/publications")
        .authorization_bearer(&token)
        .json(&json!({
            "title": "Nuclear fission",
            "kind": "Artigo",
            "author_ids": [author_id, 424242],
        }))
        .await;
    missing.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = missing.json();
    assert!(body["error"].as_str().unwrap().contains("424242"));

    let created = app
        .server
        .post("/api/v1/publications")
        .authorization_bearer(&token)
        .json(&json!({
            "title": "Nuclear fission",
            "kind": "Artigo",
            "published_on": "1939-02-11",
            "author_ids": [author_id],
        }))
        .await;
    created.assert_status(StatusCode::CREATED);
    let publication: Value = created.json();
    assert_eq!(publication["authors"][0]["id"], author_id);
    let publication_id = publication["id"].as_i64().unwrap();

    let by_year: Value = app
        .server
        .get("/api/v1/publications?year=1939&kind=Artigo")
        .await
        .json();
    assert_eq!(by_year["total"], 1);

    let by_author: Value = app
        .server
        .get(&format!("/api/v1/publications?author_id={}", author_id))
        .await
        .json();
    assert_eq!(by_author["total"], 1);

    app.server
        .get("/api/v1/publications/search/advanced?q=n")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    let search: Value = app
        .server
        .get("/api/v1/publications/search/advanced?q=fission&kind=Artigo")
        .await
        .json();
    assert_eq!(search["total"], 1);
    assert_eq!(search["filters"]["query"], "fission");
    assert_eq!(search["filters"]["kind"], "Artigo");

    let stats: Value = app.server.get("/api/v1/publications/statistics").await.json();
    assert_eq!(stats["total"], 1);
    assert_eq!(stats["by_kind"]["Artigo"], 1);
    assert_eq!(stats["by_kind"]["livro"], 0);

    let kinds: Value = app.server.get("/api/v1/publications/kinds").await.json();
    assert_eq!(kinds.as_array().unwrap().len(), 7);

    let cleared = app
        .server
        .put(&format!("/api/v1/publications/{}", publication_id))
        .authorization_bearer(&token)
        .json(&json!({ "author_ids": [] }))
        .await;
    cleared.assert_status_ok();
    let body: Value = cleared.json();
    assert_eq!(body["authors"].as_array().unwrap().len(), 0);
}

#[tokio::test]
#[ignore]
async fn readiness_is_ok_with_database() {
    let app = db_app().await;
    app.server.get("/health/ready").await.assert_status_ok();
}
