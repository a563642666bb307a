// Local development proxy for the analysis backend. Forwards prompt pairs
// to a locally running chat-completions server (LM Studio by default) so
// the app can be exercised without an OpenRouter key.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use log::{error, info};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Clone)]
struct ProxyContext {
    client: reqwest::Client,
    upstream_url: String,
    model: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeRequest {
    system_prompt: String,
    user_prompt: String,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

async fn analyze(
    State(ctx): State<Arc<ProxyContext>>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    info!("Proxying analysis request to {}", ctx.upstream_url);

    let payload = json!({
        "model": ctx.model,
        "messages": [
            { "role": "system", "content": req.system_prompt },
            { "role": "user", "content": req.user_prompt },
        ],
        "temperature": req.temperature.unwrap_or(0.7),
        "max_tokens": req.max_tokens.unwrap_or(1000),
        "stream": false,
    });

    let response = ctx
        .client
        .post(&ctx.upstream_url)
        .json(&payload)
        .send()
        .await
        .map_err(|e| {
            error!("Upstream request failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("upstream request failed: {}", e) })),
            )
        })?;

    let status = response.status();
    let body: Value = response.json().await.map_err(|e| {
        error!("Upstream returned non-JSON body: {}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("upstream returned invalid JSON: {}", e) })),
        )
    })?;

    if !status.is_success() {
        error!("Upstream returned status {}", status);
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": format!("upstream returned status {}", status) })),
        ));
    }

    Ok(Json(body))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    let upstream_url = std::env::var("LM_STUDIO_URL")
        .unwrap_or_else(|_| "http://127.0.0.1:1234/v1/chat/completions".to_string());
    let model = std::env::var("LM_STUDIO_MODEL")
        .unwrap_or_else(|_| "deepseek-r1-distill-qwen-7b".to_string());
    let port: u16 = std::env::var("LLM_PROXY_PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(4000);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(120))
        .build()?;

    let ctx = Arc::new(ProxyContext {
        client,
        upstream_url,
        model,
    });

    let app = Router::new()
        .route("/analyze", post(analyze))
        .with_state(ctx);

    let addr = format!("0.0.0.0:{}", port);
    info!("LLM proxy listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
