use std::net::SocketAddr;

use axum::{routing::get, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, reset, users};

pub fn build_app(state: AppState) -> Router {
    let cors = if state.config.cors_allow_all {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(auth::router())
                .merge(reset::router())
                .merge(users::router())
                .route("/health", get(|| async { "ok" })),
        )
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::{
        body::Body,
        http::{
            header::{AUTHORIZATION, CONTENT_TYPE},
            Method, Request, StatusCode,
        },
    };
    use serde_json::Value;
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::build_app;
    use crate::{
        auth::{
            repo::CredentialStore,
            repo_types::{AccessLevel, Credential, NewCredential},
        },
        state::{fake::Fakes, AppState},
        users::{
            repo::UserStore,
            repo_types::{NewUser, User},
        },
    };

    /// Sends one request through the full router and decodes the JSON body
    /// (`Null` when the body is not JSON).
    pub async fn call(
        state: AppState,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => req.body(Body::empty()),
        }
        .expect("request");

        let res = build_app(state).oneshot(req).await.expect("response");
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    pub async fn post_json(
        state: AppState,
        uri: &str,
        token: Option<&str>,
        body: Value,
    ) -> (StatusCode, Value) {
        call(state, Method::POST, uri, token, Some(body.to_string())).await
    }

    /// Creates a user profile with a credential attached.
    pub async fn seed_account(
        fakes: &Fakes,
        email: &str,
        secret: &str,
        level: AccessLevel,
    ) -> (User, Credential) {
        let username = email.split('@').next().unwrap_or(email).to_string();
        let user = fakes
            .users
            .create(None, NewUser::named(username.clone()))
            .await
            .expect("seed user");
        let credential = fakes
            .credentials
            .create(
                None,
                NewCredential {
                    user_id: user.id,
                    username,
                    secret: secret.into(),
                    email: email.into(),
                    level,
                },
            )
            .await
            .expect("seed credential");
        (user, credential)
    }

    pub fn bearer(state: &AppState, user_id: Uuid) -> String {
        state
            .keys
            .sign_session(user_id, state.keys.session_ttl)
            .expect("sign session")
    }
}
