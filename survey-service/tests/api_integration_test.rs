//! Integration tests for the API server with JWT authentication

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::json;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use survey_cache::{
    MemoryCacheConfig, MemoryFastCache, MemorySurveyStore, OrchestratorConfig, Question,
    QuestionType, SurveyCacheOrchestrator, SurveyDocument, SurveyError, SurveyGenerator,
};
use tokio::net::TcpListener;

use survey_service::api::routes::DevLogin;
use survey_service::api::{JwtAuth, RateLimit};
use survey_service::{ApiServer, ApiServerConfig};

const SECRET: &str = "test_secret_key_12345";
const EMAIL: &str = "dev@example.com";
const PASSWORD: &str = "let-me-in";

enum Behavior {
    Succeed,
    Fail,
    Stall,
}

struct StubGenerator {
    behavior: Behavior,
    calls: AtomicU32,
}

#[async_trait]
impl SurveyGenerator for StubGenerator {
    async fn generate(&self, description: &str) -> survey_cache::Result<SurveyDocument> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            Behavior::Succeed => Ok(SurveyDocument::new(
                format!("Survey #{}: {}", n, description),
                "Stub survey",
                vec![
                    Question::with_options(
                        QuestionType::SingleChoice,
                        "How satisfied are you?",
                        vec!["Very".to_string(), "Not at all".to_string()],
                    ),
                    Question::new(QuestionType::OpenQuestion, "What should we change?"),
                ],
            )),
            Behavior::Fail => Err(SurveyError::GenerationUnavailable(
                "backend returned 503".to_string(),
            )),
            Behavior::Stall => {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Err(SurveyError::GenerationUnavailable("too slow".to_string()))
            }
        }
    }

    fn model(&self) -> &str {
        "stub"
    }
}

struct TestServer {
    base: String,
    generator: Arc<StubGenerator>,
}

/// Start the API server on an ephemeral port
async fn start_test_server(behavior: Behavior, request_timeout: Duration) -> TestServer {
    start_limited_server(behavior, request_timeout, None).await
}

async fn start_limited_server(
    behavior: Behavior,
    request_timeout: Duration,
    rate_limit: Option<RateLimit>,
) -> TestServer {
    let generator = Arc::new(StubGenerator {
        behavior,
        calls: AtomicU32::new(0),
    });
    let orchestrator = SurveyCacheOrchestrator::new(
        Arc::new(MemoryFastCache::new(MemoryCacheConfig::default())),
        Arc::new(MemorySurveyStore::new()),
        generator.clone(),
        OrchestratorConfig::default().with_request_timeout(request_timeout),
    );

    let config = ApiServerConfig {
        jwt_secret: SECRET.to_string(),
        dev_login: Some(DevLogin {
            email: EMAIL.to_string(),
            password: PASSWORD.to_string(),
        }),
        rate_limit,
        ..ApiServerConfig::default()
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = ApiServer::new(config, orchestrator);
    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    TestServer {
        base: format!("http://{}/api", addr),
        generator,
    }
}

fn bearer() -> String {
    bearer_for("tester")
}

fn bearer_for(subject: &str) -> String {
    let token = JwtAuth::new(SECRET, 3600)
        .generate_token(subject, Some("developer"))
        .unwrap();
    format!("Bearer {}", token)
}

#[tokio::test]
async fn test_health_check() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;

    let response = Client::new()
        .get(format!("{}/health", server.base))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["fast_cache"], "memory");
    assert_eq!(body["durable_store"]["backend"], "memory");
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;

    let response = Client::new()
        .get(format!("{}/health", server.base))
        .header("x-request-id", "req-42")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()["x-request-id"], "req-42");
}

#[tokio::test]
async fn test_login_and_use_token() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;
    let client = Client::new();

    let response = client
        .post(format!("{}/auth/token", server.base))
        .json(&json!({"email": EMAIL, "password": PASSWORD}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["token_type"], "bearer");
    assert_eq!(body["expires_in"], 3600);
    let token = body["access_token"].as_str().unwrap();

    let response = client
        .post(format!("{}/surveys/generate", server.base))
        .bearer_auth(token)
        .json(&json!({"description": "Feedback on our onboarding flow"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_login_wrong_credentials() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;

    let response = Client::new()
        .post(format!("{}/auth/token", server.base))
        .json(&json!({"email": EMAIL, "password": "nope"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_login_empty_credentials() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;

    let response = Client::new()
        .post(format!("{}/auth/token", server.base))
        .json(&json!({"email": "", "password": ""}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_generate_unauthorized() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;
    let client = Client::new();

    let response = client
        .post(format!("{}/surveys/generate", server.base))
        .json(&json!({"description": "Feedback on our onboarding flow"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(response.headers().contains_key("x-request-id"));

    let response = client
        .post(format!("{}/surveys/generate", server.base))
        .header("Authorization", "Bearer invalid.token.here")
        .json(&json!({"description": "Feedback on our onboarding flow"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let forged = JwtAuth::new("some_other_secret", 3600)
        .generate_token("intruder", None)
        .unwrap();
    let response = client
        .post(format!("{}/surveys/generate", server.base))
        .bearer_auth(forged)
        .json(&json!({"description": "Feedback on our onboarding flow"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    assert_eq!(server.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_generate_then_cached() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;
    let client = Client::new();
    let url = format!("{}/surveys/generate", server.base);

    let first = client
        .post(&url)
        .header("Authorization", bearer())
        .json(&json!({"description": "Customer satisfaction for an online store"}))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);
    assert_eq!(first.headers()["x-survey-source"], "generated");
    let first_body: serde_json::Value = first.json().await.unwrap();
    assert_eq!(first_body["questions"][0]["type"], "singleChoice");
    assert!(first_body["questions"][1].get("options").is_none());

    // Write-back is detached; give it a moment
    tokio::time::sleep(Duration::from_millis(200)).await;

    let second = client
        .post(&url)
        .header("Authorization", bearer())
        .json(&json!({"description": "customer   satisfaction for an ONLINE store"}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.headers()["x-survey-source"], "fast_cache");
    let second_body: serde_json::Value = second.json().await.unwrap();
    assert_eq!(second_body, first_body);
}

#[tokio::test]
async fn test_generate_invalid_description() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;

    let response = Client::new()
        .post(format!("{}/surveys/generate", server.base))
        .header("Authorization", bearer())
        .json(&json!({"description": "abcd"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    assert_eq!(server.generator.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_generation_failure_is_503() {
    let server = start_test_server(Behavior::Fail, Duration::from_secs(5)).await;

    let response = Client::new()
        .post(format!("{}/surveys/generate", server.base))
        .header("Authorization", bearer())
        .json(&json!({"description": "Feedback on our onboarding flow"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn test_slow_generation_is_504() {
    let server = start_test_server(Behavior::Stall, Duration::from_millis(100)).await;

    let response = Client::new()
        .post(format!("{}/surveys/generate", server.base))
        .header("Authorization", bearer())
        .json(&json!({"description": "Feedback on our onboarding flow"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "TIMEOUT_ERROR");
    assert_eq!(body["error"]["message"], "Request timed out");
}

#[tokio::test]
async fn test_cors_preflight_skips_auth() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;

    let response = Client::new()
        .request(
            reqwest::Method::OPTIONS,
            format!("{}/surveys/generate", server.base),
        )
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_concurrent_requests_all_succeed() {
    let server = start_test_server(Behavior::Succeed, Duration::from_secs(5)).await;
    let client = Client::new();
    let url = format!("{}/surveys/generate", server.base);

    let requests = (0..5).map(|_| {
        client
            .post(&url)
            .header("Authorization", bearer())
            .json(&json!({"description": "Quarterly all-hands feedback"}))
            .send()
    });
    let responses = futures::future::join_all(requests).await;

    for response in responses {
        let response = response.unwrap();
        assert!(response.status().is_success());
        assert!(response.headers().contains_key("x-survey-source"));
    }
}

#[tokio::test]
async fn test_rate_limit_per_client() {
    let limit: RateLimit = "2/minute".parse().unwrap();
    let server = start_limited_server(Behavior::Succeed, Duration::from_secs(5), Some(limit)).await;
    let client = Client::new();
    let url = format!("{}/surveys/generate", server.base);

    for _ in 0..2 {
        let response = client
            .post(&url)
            .header("Authorization", bearer_for("alice"))
            .json(&json!({"description": "Conference talk feedback"}))
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());
    }

    let response = client
        .post(&url)
        .header("Authorization", bearer_for("alice"))
        .json(&json!({"description": "Conference talk feedback"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(response.headers().contains_key("retry-after"));
    assert!(response.headers().contains_key("x-request-id"));
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"]["code"], "RATE_LIMIT_EXCEEDED");

    // Another client still has its own budget
    let response = client
        .post(&url)
        .header("Authorization", bearer_for("bob"))
        .json(&json!({"description": "Conference talk feedback"}))
        .send()
        .await
        .unwrap();
    assert!(response.status().is_success());

    // Unauthenticated requests are rejected before they count
    let response = client
        .post(&url)
        .json(&json!({"description": "Conference talk feedback"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
