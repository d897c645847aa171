mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};
use serde_json::json;

use common::{json, Campus, TestServer};

const FUNCTIONS: [(&str, &str); 3] = [
    ("school", "getSchool"),
    ("classroom", "getClassroom"),
    ("student", "getStudent"),
];

#[tokio::test]
async fn school_admin_cannot_reach_another_school() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;
    let token = server.token(&campus.south_admin);

    let scopes = [
        json!({ "schoolId": campus.north }),
        json!({ "classroomId": campus.classroom }),
        json!({ "studentId": campus.student }),
    ];

    for (module, function) in FUNCTIONS {
        for method in [Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE] {
            for scope in &scopes {
                let res = server
                    .api(method.clone(), module, function)
                    .bearer_auth(&token)
                    .json(scope)
                    .send()
                    .await?;
                assert_eq!(res.status(), StatusCode::FORBIDDEN, "{} {}.{} {}", method, module, function, scope);

                let body = json(res).await?;
                assert_eq!(body["ok"], false);
                assert_eq!(body["code"], 403);
                assert!(body["message"].as_str().unwrap().starts_with("Unauthorized - "));
            }
        }
    }
    Ok(())
}

#[tokio::test]
async fn superadmin_reaches_every_school() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;
    let token = server.token(&campus.root);

    let res = server
        .api(Method::GET, "student", "getStudent")
        .bearer_auth(&token)
        .query(&[("studentId", campus.student.as_str())])
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res).await?["data"]["schoolId"], campus.north.as_str());

    let res = server
        .api(Method::POST, "school", "createSchool")
        .bearer_auth(&token)
        .json(&json!({ "name": "East High" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn school_admin_manages_their_own_school() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;
    let token = server.token(&campus.north_admin);

    let res = server
        .api(Method::POST, "classroom", "createClassroom")
        .bearer_auth(&token)
        .json(&json!({ "schoolId": campus.north, "name": "Room 102" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    let classroom = json(res).await?["data"]["_id"].clone();

    let res = server
        .api(Method::POST, "student", "createStudent")
        .bearer_auth(&token)
        .json(&json!({ "classroomId": classroom, "firstName": "Grace", "lastName": "Hopper" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res).await?["data"]["schoolId"], campus.north.as_str());

    // Creating schools is not part of a school admin's role
    let res = server
        .api(Method::POST, "school", "createSchool")
        .bearer_auth(&token)
        .json(&json!({ "schoolId": campus.north, "name": "Annex" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn classroom_and_student_scopes_agree() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;

    for admin in [&campus.north_admin, &campus.south_admin] {
        let token = server.token(admin);

        let by_classroom = server
            .api(Method::GET, "classroom", "getClassroom")
            .bearer_auth(&token)
            .query(&[("classroomId", campus.classroom.as_str())])
            .send()
            .await?
            .status();
        let by_student = server
            .api(Method::GET, "student", "getStudent")
            .bearer_auth(&token)
            .query(&[("studentId", campus.student.as_str())])
            .send()
            .await?
            .status();

        assert_eq!(by_classroom, by_student);
    }
    Ok(())
}

#[tokio::test]
async fn unresolvable_scope_is_forbidden() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;
    let token = server.token(&campus.north_admin);

    let res = server
        .api(Method::GET, "student", "getStudent")
        .bearer_auth(&token)
        .json(&json!({ "studentId": "does-not-exist" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    let res = server
        .api(Method::GET, "classroom", "getClassroom")
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);

    // Unknown modules never fall through to a handler
    let res = server
        .api(Method::GET, "course", "getCourse")
        .bearer_auth(&token)
        .json(&json!({ "schoolId": campus.north }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn extended_json_ids_are_normalized() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;

    let res = server
        .api(Method::GET, "school", "getSchool")
        .bearer_auth(server.token(&campus.north_admin))
        .json(&json!({ "schoolId": { "$oid": campus.north } }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn own_school_id_does_not_unlock_foreign_records() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;
    let token = server.token(&campus.south_admin);
    let south = campus.south.as_str();

    let reads = [
        ("student", "getStudent", "studentId", campus.student.as_str()),
        ("classroom", "getClassroom", "classroomId", campus.classroom.as_str()),
    ];
    for (module, function, key, id) in reads {
        let res = server
            .api(Method::GET, module, function)
            .bearer_auth(&token)
            .query(&[("schoolId", south), (key, id)])
            .send()
            .await?;
        assert_eq!(res.status(), StatusCode::FORBIDDEN, "{}.{}", module, function);

        let body = json(res).await?;
        assert_eq!(body["ok"], false);
        assert!(body["data"].is_null());
    }

    let res = server
        .api(Method::POST, "student", "createStudent")
        .bearer_auth(&token)
        .json(&json!({
            "schoolId": campus.south,
            "classroomId": campus.classroom,
            "firstName": "Grace",
            "lastName": "Hopper"
        }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn blank_body_id_falls_back_to_query() -> Result<()> {
    let server = TestServer::without_rate_limit().await?;
    let campus = Campus::seed(&server.directory).await?;

    let res = server
        .api(Method::GET, "school", "getSchool")
        .bearer_auth(server.token(&campus.north_admin))
        .query(&[("schoolId", campus.north.as_str())])
        .json(&json!({ "schoolId": "" }))
        .send()
        .await?;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json(res).await?["data"]["name"], "North High");
    Ok(())
}
