mod common;

use std::collections::HashSet;
use std::time::Duration;

use reqwest::StatusCode;
use serde_json::{Value, json};

use common::{CLUSTER_ADDRESS, FakeSettings, TestApp};

fn application() -> Value {
    json!({
        "customer_name": "Acme",
        "project_name": "Shop",
        "subdomain": "shop.flapi.org",
        "template_repo": "template-next",
        "workflow_name": "deploy.yml",
        "workflow_inputs": { "environment": "dev" },
        "protect_branches": true,
    })
}

fn completed_steps(body: &Value) -> Vec<String> {
    body["completed_steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap().to_string())
        .collect()
}

async fn project_count(app: &TestApp) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM projects")
        .fetch_one(&app.pool)
        .await
        .unwrap()
}

#[tokio::test]
async fn provisions_every_stage_in_order() {
    let app = common::spawn_app_with_fakes(FakeSettings::default()).await;
    let (user_id, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["application"]["repository"], "shop");
    assert_eq!(
        body["application"]["hosts"],
        json!(["dev.shop.flapi.org", "staging.shop.flapi.org", "shop.flapi.org"])
    );
    assert_eq!(
        body["application"]["databases"],
        json!(["acct_shop_dev", "acct_shop_staging", "acct_shop_prod"])
    );

    let target = CLUSTER_ADDRESS;
    assert_eq!(
        app.log.calls(),
        vec![
            "subdomain_exists:dev.shop.flapi.org".to_string(),
            "subdomain_exists:staging.shop.flapi.org".to_string(),
            "subdomain_exists:shop.flapi.org".to_string(),
            format!("create_subdomain:dev.shop.flapi.org->{target}"),
            format!("create_subdomain:staging.shop.flapi.org->{target}"),
            format!("create_subdomain:shop.flapi.org->{target}"),
            "create_database:shop_dev".to_string(),
            "link_user:shop_dev".to_string(),
            "create_database:shop_staging".to_string(),
            "link_user:shop_staging".to_string(),
            "create_database:shop_prod".to_string(),
            "link_user:shop_prod".to_string(),
            "create_repository:template-next->shop:private=true".to_string(),
            "protect_branches:shop:main,staging,develop".to_string(),
            "list_workflows:shop".to_string(),
            "trigger_workflow:shop:deploy.yml@main:1".to_string(),
        ]
    );

    // The project is recorded against the production database
    let project = &body["application"]["project"];
    assert_eq!(project["application_name"], "Shop");
    assert_eq!(project["domain_name"], "shop.flapi.org");
    assert_eq!(project["user_id"], json!(user_id));

    let prod_name: String = sqlx::query_scalar(
        "SELECT d.name FROM projects p JOIN databases d ON d.id = p.database_id WHERE p.id = $1",
    )
    .bind(uuid::Uuid::parse_str(project["id"].as_str().unwrap()).unwrap())
    .fetch_one(&app.pool)
    .await
    .unwrap();
    assert_eq!(prod_name, "shop_prod");

    let databases: i64 = sqlx::query_scalar("SELECT count(*) FROM databases")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(databases, 3);

    common::cleanup(app).await;
}

#[tokio::test]
async fn existing_subdomain_creates_nothing() {
    let settings = FakeSettings {
        existing_hosts: HashSet::from(["staging.shop.flapi.org".to_string()]),
        ..Default::default()
    };
    let app = common::spawn_app_with_fakes(settings).await;
    let (_, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::CONFLICT, "{body}");
    assert_eq!(body["success"], false);
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("staging.shop.flapi.org")
    );
    assert_eq!(body["completed_steps"], json!([]));

    assert!(app.log.matching("create_").is_empty());
    assert!(app.log.matching("link_user").is_empty());

    let projects: i64 = sqlx::query_scalar("SELECT count(*) FROM projects")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(projects, 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn repository_failure_reports_completed_steps_without_rollback() {
    let settings = FakeSettings {
        repo_creation_fails: true,
        ..Default::default()
    };
    let app = common::spawn_app_with_fakes(settings).await;
    let (_, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Unable to create the repository");

    let completed: Vec<&str> = body["completed_steps"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s.as_str().unwrap())
        .collect();
    assert_eq!(completed.len(), 9);
    assert_eq!(completed[0], "subdomain_created:dev.shop.flapi.org");
    assert_eq!(completed[8], "database_user_linked:shop_prod");

    // Nothing is undone and nothing after the failing step runs
    assert!(app.log.matching("delete_database").is_empty());
    assert!(app.log.matching("trigger_workflow").is_empty());
    assert!(app.log.matching("protect_branches").is_empty());

    let projects: i64 = sqlx::query_scalar("SELECT count(*) FROM projects")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(projects, 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn invalid_request_is_rejected_before_any_call() {
    let app = common::spawn_app_with_fakes(FakeSettings::default()).await;
    let (_, token) = app.login_as("client@example.com").await;

    let mut body = application();
    body["subdomain"] = json!("not a host");
    let (resp, status) = app.post_auth("/client/app/create", &token, &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["errors"][0]["field"], "subdomain");
    assert!(app.log.calls().is_empty());

    common::cleanup(app).await;
}

#[tokio::test]
async fn provisioning_needs_configured_providers() {
    let app = common::spawn_app().await;
    let (_, token) = app.login_as("client@example.com").await;

    let (_, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    common::cleanup(app).await;
}

#[tokio::test]
async fn subdomain_check_reports_availability() {
    let settings = FakeSettings {
        existing_hosts: HashSet::from(["shop.flapi.org".to_string()]),
        ..Default::default()
    };
    let app = common::spawn_app_with_fakes(settings).await;
    let (_, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .get_auth("/aws/subdomain/check?subdomain=shop.flapi.org", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "subdomain": "shop.flapi.org", "is_available": false }));

    let (body, _) = app
        .get_auth("/aws/subdomain/check?subdomain=blog.flapi.org", &token)
        .await;
    assert_eq!(body["is_available"], true);

    let (body, status) = app
        .get_auth("/aws/domain/check?domain=taken.org", &token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "domain": "taken.org", "is_available": false }));

    common::cleanup(app).await;
}

#[tokio::test]
async fn database_records_follow_the_hosting_panel() {
    let app = common::spawn_app_with_fakes(FakeSettings::default()).await;
    let (_, token) = app.login_as("dba@example.com").await;

    let (_, status) = app
        .post_auth("/databases", &token, &json!({ "name": "blog_prod" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (list, _) = app.get_auth("/databases", &token).await;
    let id = list[0]["id"].as_str().unwrap().to_string();

    app.put_auth(&format!("/databases/{id}"), &token, &json!({ "name": "blog_main" }))
        .await;
    let (_, status) = app.delete_auth(&format!("/databases/{id}"), &token).await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(
        app.log.calls(),
        vec![
            "create_database:blog_prod",
            "link_user:blog_prod",
            "rename_database:blog_prod->blog_main",
            "delete_database:blog_main",
        ]
    );

    common::cleanup(app).await;
}

#[tokio::test]
async fn hosting_maintenance_routes() {
    let app = common::spawn_app_with_fakes(FakeSettings::default()).await;
    let (_, token) = app.login_as("ops@example.com").await;

    let (body, status) = app.get_auth("/hosting/databases", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["database"], "acct_shop_prod");

    let (body, _) = app.get_auth("/hosting/server", &token).await;
    assert_eq!(body["version"], "10.6");

    let (body, status) = app
        .post_auth("/hosting/databases/shop_prod/check", &token, &json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, status) = app
        .post_auth(
            "/hosting/restore",
            &token,
            &json!({ "backup_file": "backup.sql.gz", "verbose": true }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(app.log.matching("restore:"), vec!["restore:backup.sql.gz:0:true"]);

    let (_, status) = app
        .post_auth("/hosting/remote-hosts", &token, &json!({ "host": "198.51.100.7" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (body, _) = app.get_auth("/hosting/remote-hosts", &token).await;
    assert_eq!(body["198.51.100.7"], "ci runner");

    common::cleanup(app).await;
}

#[tokio::test]
async fn branches_are_protected_once_the_repository_is_ready() {
    let settings = FakeSettings {
        repo_ready_after: Duration::from_millis(300),
        ..Default::default()
    };
    let app = common::spawn_app_with_fakes_and_config(settings, |c| {
        c.repo_ready_delay = Duration::from_millis(300);
    })
    .await;
    let (_, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(
        app.log.matching("protect_branches"),
        vec!["protect_branches:shop:main,staging,develop"]
    );
    assert_eq!(app.log.matching("trigger_workflow").len(), 1);

    common::cleanup(app).await;
}

#[tokio::test]
async fn protecting_a_repository_still_generating_fails() {
    let settings = FakeSettings {
        repo_ready_after: Duration::from_secs(60),
        ..Default::default()
    };
    let app = common::spawn_app_with_fakes(settings).await;
    let (_, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
    assert_eq!(body["message"], "Unable to protect branches");
    let completed = completed_steps(&body);
    assert_eq!(completed.last().unwrap(), "repository_created:shop");
    assert!(app.log.matching("trigger_workflow").is_empty());
    assert_eq!(project_count(&app).await, 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn rejected_workflow_dispatch_keeps_earlier_steps() {
    let settings = FakeSettings {
        workflow_not_accepted: true,
        ..Default::default()
    };
    let app = common::spawn_app_with_fakes(settings).await;
    let (_, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
    assert_eq!(body["success"], false);
    assert_eq!(
        body["message"],
        "The repository was created, but triggering the workflow failed"
    );
    let completed = completed_steps(&body);
    assert!(completed.contains(&"repository_created:shop".to_string()));
    assert!(completed.contains(&"branches_protected:shop".to_string()));
    assert!(!completed.iter().any(|s| s.starts_with("workflow_dispatched")));

    assert!(app.log.matching("delete_database").is_empty());
    assert_eq!(project_count(&app).await, 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn workflow_dispatch_error_is_a_server_error() {
    let settings = FakeSettings {
        workflow_dispatch_errors: true,
        ..Default::default()
    };
    let app = common::spawn_app_with_fakes(settings).await;
    let (_, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
    assert!(body["error"].as_str().unwrap().contains("workflow not found"));
    assert_eq!(completed_steps(&body).len(), 11);
    assert_eq!(project_count(&app).await, 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn database_refusal_stops_at_the_failing_stage() {
    let settings = FakeSettings {
        refused_databases: HashSet::from(["shop_staging".to_string()]),
        ..Default::default()
    };
    let app = common::spawn_app_with_fakes(settings).await;
    let (_, token) = app.login_as("client@example.com").await;

    let (body, status) = app
        .post_auth("/client/app/create", &token, &application())
        .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR, "{body}");
    assert_eq!(body["message"], "Unable to create database");

    let completed = completed_steps(&body);
    assert_eq!(
        &completed[3..],
        ["database_created:shop_dev", "database_user_linked:shop_dev"]
    );
    assert!(app.log.matching("link_user:shop_staging").is_empty());
    assert!(app.log.matching("create_database:shop_prod").is_empty());
    assert!(app.log.matching("create_repository").is_empty());
    assert!(app.log.matching("delete_database").is_empty());

    // The dev database stays recorded; nothing is rolled back
    let names: Vec<String> = sqlx::query_scalar("SELECT name FROM databases")
        .fetch_all(&app.pool)
        .await
        .unwrap();
    assert_eq!(names, vec!["shop_dev".to_string()]);
    assert_eq!(project_count(&app).await, 0);

    common::cleanup(app).await;
}

#[tokio::test]
async fn project_name_without_letters_or_digits_is_rejected() {
    let app = common::spawn_app_with_fakes(FakeSettings::default()).await;
    let (_, token) = app.login_as("client@example.com").await;

    let mut body = application();
    body["project_name"] = json!("!!!");
    let (resp, status) = app.post_auth("/client/app/create", &token, &body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{resp}");
    assert_eq!(resp["errors"][0]["field"], "project_name");
    assert!(app.log.calls().is_empty());

    common::cleanup(app).await;
}
