use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use loanops_api::config::AppConfig;
use loanops_auth::TokenClaims;
use loanops_core::UserId;
use reqwest::StatusCode;
use serde_json::{json, Value};

const JWT_SECRET: &str = "test-secret";
const ADMIN_USER: &str = "root";
const ADMIN_PASSWORD: &str = "root-password-1";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let config = AppConfig::for_tests(JWT_SECRET).with_bootstrap_admin(ADMIN_USER, ADMIN_PASSWORD);
        let app = loanops_api::app::build_app(&config).await.expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}/api/v1", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn mint_jwt(sub: UserId, issued_at: chrono::DateTime<Utc>, lifetime: ChronoDuration) -> String {
    let claims = TokenClaims {
        sub,
        username: "ghost".to_string(),
        email: None,
        iat: issued_at.timestamp(),
        exp: (issued_at + lifetime).timestamp(),
    };

    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("failed to encode jwt")
}

async fn login(client: &reqwest::Client, srv: &TestServer, username: &str, password: &str) -> String {
    let res = client
        .post(srv.url("/login"))
        .json(&json!({ "username": username, "password": password }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK, "login as {username}");
    let body: Value = res.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

async fn post_json(client: &reqwest::Client, url: String, token: &str, body: Value) -> (StatusCode, Value) {
    let res = client.post(url).bearer_auth(token).json(&body).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

async fn get_json(client: &reqwest::Client, url: String, token: &str) -> (StatusCode, Value) {
    let res = client.get(url).bearer_auth(token).send().await.unwrap();
    let status = res.status();
    let body = res.json().await.unwrap_or(Value::Null);
    (status, body)
}

/// Create a user through the admin API and grant it a built-in role.
async fn user_with_role(client: &reqwest::Client, srv: &TestServer, admin: &str, username: &str, role: &str) -> String {
    let (status, user) = post_json(
        client,
        srv.url("/users"),
        admin,
        json!({ "username": username, "password": "field-password-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let user_id = user["id"].as_str().unwrap().to_string();

    let (_, roles) = get_json(client, srv.url("/roles"), admin).await;
    let role_id = roles["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["name"] == role)
        .map(|r| r["id"].as_str().unwrap().to_string())
        .unwrap();

    let (status, _) = post_json(client, srv.url(&format!("/users/{user_id}/roles")), admin, json!({ "role_id": role_id })).await;
    assert_eq!(status, StatusCode::CREATED);
    user_id
}

const CSV: &str = "\
loan_id,external_customer_id,emi_amount,principal_outstanding,interest_outstanding,case_status,emi_date,dpd_bucket,dpd,disbursal_date,insurance_active,loan_description,emis_paid_till_date,emis_pending,bounce_charges,nach_presentation_status
LN-100,CUST-1,12500.50,250000,1830.25,OPEN,2024-03-05,31-60,45,2022-01-15,yes,Two-wheeler loan,18,6,500,BOUNCED
LN-101,CUST-2,8000,120000,900,OPEN,2024-03-10,0-30,12,2023-06-01,no,Personal loan,9,15,0,PRESENTED
LN-BAD,CUST-3,-5,1,1,OPEN,2024-03-10,0-30,12,2023-06-01,no,Broken row,9,15,0,PRESENTED
";

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(srv.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client.get(srv.url("/whoami")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");
}

#[tokio::test]
async fn login_issues_token_for_the_user() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let token = login(&client, &srv, ADMIN_USER, ADMIN_PASSWORD).await;
    let (status, me) = get_json(&client, srv.url("/whoami"), &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["username"], ADMIN_USER);
    assert!(me["roles"].as_array().unwrap().iter().any(|r| r == "admin"));

    let res = client
        .post(srv.url("/login"))
        .json(&json!({ "username": ADMIN_USER, "password": "root-password-2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_credentials");
}

#[tokio::test]
async fn forged_expired_and_orphan_tokens_are_rejected() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    // Valid signature, but no such user.
    let orphan = mint_jwt(UserId::new(), Utc::now(), ChronoDuration::hours(24));
    let (status, _) = get_json(&client, srv.url("/whoami"), &orphan).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Real user, token issued 25 hours ago.
    let token = login(&client, &srv, ADMIN_USER, ADMIN_PASSWORD).await;
    let (_, me) = get_json(&client, srv.url("/whoami"), &token).await;
    let admin_id: UserId = me["user"]["user_id"].as_str().unwrap().parse().unwrap();
    let stale = mint_jwt(admin_id, Utc::now() - ChronoDuration::hours(25), ChronoDuration::hours(24));
    let (status, _) = get_json(&client, srv.url("/whoami"), &stale).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let forged = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &TokenClaims {
            sub: admin_id,
            username: ADMIN_USER.to_string(),
            email: None,
            iat: Utc::now().timestamp(),
            exp: (Utc::now() + ChronoDuration::hours(1)).timestamp(),
        },
        &EncodingKey::from_secret(b"some-other-secret"),
    )
    .unwrap();
    let (status, _) = get_json(&client, srv.url("/whoami"), &forged).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn registration_conflicts_and_weak_passwords() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let register = |username: &'static str, password: &'static str| {
        let client = client.clone();
        let url = srv.url("/register");
        async move {
            client
                .post(url)
                .json(&json!({ "username": username, "password": password }))
                .send()
                .await
                .unwrap()
                .status()
        }
    };

    assert_eq!(register("asha", "long-enough-1").await, StatusCode::CREATED);
    assert_eq!(register("asha", "long-enough-2").await, StatusCode::CONFLICT);
    assert_eq!(register("bilal", "short").await, StatusCode::BAD_REQUEST);

    // A freshly registered user holds no roles, so nothing is permitted.
    let token = login(&client, &srv, "asha", "long-enough-1").await;
    let (status, body) = get_json(&client, srv.url("/me/permissions"), &token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn agent_cannot_administer_but_can_read_cases() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &srv, ADMIN_USER, ADMIN_PASSWORD).await;

    user_with_role(&client, &srv, &admin, "field", "agent").await;
    let agent = login(&client, &srv, "field", "field-password-1").await;

    let (status, body) = post_json(&client, srv.url("/agencies"), &agent, json!({ "name": "Nope" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");

    let (status, body) = get_json(&client, srv.url("/me/cases"), &agent).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"].as_array().unwrap().len(), 0);

    let (status, body) = get_json(
        &client,
        srv.url("/me/permissions/explain?permission=create_agency"),
        &agent,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["explanation"]["granted"], false);
    assert!(body["explanation"]["denial_reason"]["granting_roles"]
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r == "admin"));
}

#[tokio::test]
async fn case_lifecycle_upload_assign_work() {
    let srv = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let admin = login(&client, &srv, ADMIN_USER, ADMIN_PASSWORD).await;

    // Agency with a manager and an agent.
    let (status, agency) = post_json(&client, srv.url("/agencies"), &admin, json!({ "name": "North Recovery" })).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(agency["status"], "ACTIVE");
    let agency_id = agency["id"].as_str().unwrap().to_string();

    let manager_id = user_with_role(&client, &srv, &admin, "boss", "manager").await;
    let agent_id = user_with_role(&client, &srv, &admin, "field", "agent").await;
    for (user_id, role, manager) in [(&manager_id, "manager", None), (&agent_id, "collector", Some(&manager_id))] {
        let (status, _) = post_json(
            &client,
            srv.url("/agencies/users"),
            &admin,
            json!({ "agency_id": agency_id, "user_id": user_id, "agency_role": role, "manager_id": manager }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // Upload: two good rows, one rejected.
    let res = client
        .post(srv.url("/cases/upload"))
        .bearer_auth(&admin)
        .header("content-type", "text/csv")
        .body(CSV)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let upload: Value = res.json().await.unwrap();
    assert_eq!(upload["inserted"], 2);
    assert_eq!(upload["rejected"][0]["line"], 4);
    let case_ids: Vec<String> = upload["case_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap().to_string())
        .collect();

    let (_, pool) = get_json(&client, srv.url("/cases/unassigned"), &admin).await;
    assert_eq!(pool["items"].as_array().unwrap().len(), 2);
    assert_eq!(pool["items"][0]["status"], "PENDING");

    // A batch with an unknown id changes nothing.
    let (status, _) = post_json(
        &client,
        srv.url("/cases/assign"),
        &admin,
        json!({ "agency_id": agency_id, "case_ids": [case_ids[0], UserId::new().to_string()] }),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, pool) = get_json(&client, srv.url("/cases/unassigned"), &admin).await;
    assert_eq!(pool["items"].as_array().unwrap().len(), 2);

    let (status, assigned) = post_json(
        &client,
        srv.url("/cases/assign"),
        &admin,
        json!({ "agency_id": agency_id, "case_ids": [case_ids[0]] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(assigned["items"][0]["status"], "ASSIGNED");

    // Manager hands the case to the agent.
    let manager = login(&client, &srv, "boss", "field-password-1").await;
    let (status, _) = post_json(
        &client,
        srv.url("/cases/assign-agent"),
        &manager,
        json!({ "case_id": case_ids[0], "user_id": agent_id }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    // Agent works it.
    let agent = login(&client, &srv, "field", "field-password-1").await;
    let (_, mine) = get_json(&client, srv.url("/me/cases"), &agent).await;
    assert_eq!(mine["items"][0]["loan_id"], "LN-100");

    let (status, trail) = post_json(
        &client,
        srv.url(&format!("/cases/{}/trails", case_ids[0])),
        &agent,
        json!({ "contacted": true, "payment_date": "2024-04-01", "remarks": "promised to pay" }),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(trail["payment_date"], "2024-04-01");

    let (_, trails) = get_json(&client, srv.url(&format!("/cases/{}/trails", case_ids[0])), &manager).await;
    assert_eq!(trails["items"].as_array().unwrap().len(), 1);

    let (status, link) = get_json(&client, srv.url(&format!("/cases/{}/payment-link", case_ids[0])), &agent).await;
    assert_eq!(status, StatusCode::OK);
    assert!(link["url"].as_str().unwrap().ends_with(&format!("caseID={}", case_ids[0])));

    // The other case is not the agent's business.
    let (status, _) = get_json(&client, srv.url(&format!("/cases/{}", case_ids[1])), &agent).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The agency is still referenced, so it cannot go.
    let res = client
        .delete(srv.url(&format!("/agencies/{agency_id}")))
        .bearer_auth(&admin)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}
