mod common;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::{json, Campus, TestServer};
use school_api_rust::auth::{JwtTokenService, TokenClaims};

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = TestServer::start().await?;

    let res = reqwest::get(server.url("/health")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = json(res).await?;
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["status"], "healthy");
    Ok(())
}

#[tokio::test]
async fn missing_bearer_token_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server.api(Method::GET, "school", "getSchool").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json(res).await?,
        json!({
            "ok": false,
            "code": 401,
            "message": "Authorization header with Bearer token required"
        })
    );

    let res = server
        .api(Method::GET, "school", "getSchool")
        .header("authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn invalid_and_expired_tokens_look_the_same() -> Result<()> {
    let server = TestServer::start().await?;
    let campus = Campus::seed(&server.directory).await?;

    let forged = JwtTokenService::new("not-the-server-secret", 1)?
        .issue(campus.north_admin.user_id(), "north.admin")?;

    let mut claims = TokenClaims::new(campus.north_admin.user_id().clone(), "north.admin", 1);
    claims.exp = Utc::now().timestamp() - 3600;
    claims.iat = claims.exp - 3600;
    let expired = server.tokens.issue_claims(&claims)?;

    for token in ["garbage", forged.as_str(), expired.as_str()] {
        let res = server
            .api(Method::GET, "school", "getSchool")
            .bearer_auth(token)
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json(res).await?["message"], "Invalid token");
    }
    Ok(())
}

#[tokio::test]
async fn token_for_removed_user_is_rejected() -> Result<()> {
    let server = TestServer::start().await?;
    let token = server.tokens.issue(&"no-such-user".into(), "ghost")?;

    let res = server
        .api(Method::GET, "school", "getSchool")
        .bearer_auth(token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json(res).await?["message"], "User not found");
    Ok(())
}

#[tokio::test]
async fn valid_token_reaches_the_handler() -> Result<()> {
    let server = TestServer::start().await?;
    let campus = Campus::seed(&server.directory).await?;

    let res = server
        .api(Method::GET, "school", "getSchool")
        .bearer_auth(server.token(&campus.north_admin))
        .query(&[("schoolId", campus.north.as_str())])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = json(res).await?;
    assert_eq!(body["ok"], true);
    assert_eq!(body["data"]["name"], "North High");
    Ok(())
}

#[tokio::test]
async fn public_routes_need_no_token() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .api(Method::POST, "auth", "login")
        .json(&json!({ "username": "someone", "password": "guess" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key("x-ratelimit-limit"));
    assert_eq!(json(res).await?["message"], "Invalid credentials");

    // Other auth functions stay protected
    let res = server.api(Method::GET, "auth", "whoami").send().await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json(res).await?["message"],
        "Authorization header with Bearer token required"
    );
    Ok(())
}

#[tokio::test]
async fn registered_school_admin_works_within_their_school() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;

    let res = server
        .api(Method::POST, "auth", "register")
        .json(&json!({
            "username": "grace",
            "password": "cobol-1959",
            "email": "grace@north.edu",
            "role": "schoolAdmin",
            "schoolId": campus.north
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let body = json(res).await?;
    assert_eq!(body["data"]["message"], "User registered successfully");
    assert_eq!(body["data"]["user"]["role"], "schoolAdmin");

    let res = server
        .api(Method::POST, "auth", "login")
        .json(&json!({ "username": "grace", "password": "cobol-1959" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let token = json(res).await?["data"]["longToken"]
        .as_str()
        .context("login returns a long token")?
        .to_string();

    let res = server
        .api(Method::GET, "classroom", "getClassroom")
        .bearer_auth(&token)
        .query(&[("classroomId", campus.classroom.as_str())])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);

    let res = server
        .api(Method::GET, "school", "getSchool")
        .bearer_auth(&token)
        .query(&[("schoolId", campus.south.as_str())])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .api(Method::POST, "auth", "login")
        .json(&json!({ "username": "grace", "password": "wrong" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn registration_needs_an_existing_school_for_school_admins() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;

    let register = |username: &str, extra: serde_json::Value| {
        let mut body = json!({
            "username": username,
            "password": "pw",
            "email": format!("{}@example.edu", username),
        });
        if let (Some(body), Some(extra)) = (body.as_object_mut(), extra.as_object()) {
            body.extend(extra.clone());
        }
        server.api(Method::POST, "auth", "register").json(&body).send()
    };

    let res = register("a", json!({ "role": "schoolAdmin" })).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json(res).await?["message"],
        "School ID is required for school administrators"
    );

    let res = register("b", json!({ "role": "schoolAdmin", "schoolId": "nowhere" })).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    // The seeded root already exists
    let res = register("c", json!({ "role": "superadmin" })).await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = register("d", json!({ "role": "schoolAdmin", "schoolId": campus.south })).await?;
    assert_eq!(res.status(), StatusCode::OK);
    let res = register("d", json!({ "role": "schoolAdmin", "schoolId": campus.south })).await?;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json(res).await?["message"], "Username or email already exists");
    Ok(())
}

#[tokio::test]
async fn malformed_body_without_token_is_unauthorized() -> Result<()> {
    let server = TestServer::start().await?;

    let res = server
        .api(Method::POST, "classroom", "createClassroom")
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json(res).await?["message"],
        "Authorization header with Bearer token required"
    );
    Ok(())
}
