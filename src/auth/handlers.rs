use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
    Json, Router,
};
use tracing::{instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, PublicUser, SignupRequest},
        middleware::{require_auth, AuthUser},
        services::AuthService,
    },
    error::AppError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
}

pub fn me_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(get_me))
        .route_layer(from_fn_with_state(state, require_auth))
}

fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(v)| v).map_err(|rej| {
        warn!(error = %rej.body_text(), "rejected request body");
        AppError::Validation("Invalid JSON body".into())
    })
}

#[instrument(skip_all)]
pub async fn signup(
    State(auth): State<AuthService>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), AppError> {
    let session = auth.signup(json_body(payload)?).await?;
    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            message: "Signup successful",
            token: session.token,
            user: session.user,
        }),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(auth): State<AuthService>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, AppError> {
    let session = auth.login(json_body(payload)?).await?;
    Ok(Json(AuthResponse {
        message: "Login successful",
        token: session.token,
        user: session.user,
    }))
}

#[instrument(skip_all, fields(user_id = %identity.id))]
pub async fn get_me(
    State(auth): State<AuthService>,
    AuthUser(identity): AuthUser,
) -> Result<Json<PublicUser>, AppError> {
    Ok(Json(auth.profile(&identity).await?))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::Body,
        http::{header, Request},
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::state::AppState;

    fn app() -> axum::Router {
        crate::app::build_app(AppState::fake())
    }

    async fn call(app: &axum::Router, req: Request<Body>) -> (u16, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status().as_u16();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_with(uri: &str, token: Option<&str>) -> Request<Body> {
        let mut b = Request::get(uri);
        if let Some(t) = token {
            b = b.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        b.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn signup_login_me_flow() {
        let app = app();

        let (status, body) = call(
            &app,
            post_json(
                "/api/user/signup",
                json!({"name": "Ada", "email": "ada@example.com", "password": "pw"}),
            ),
        )
        .await;
        assert_eq!(status, 201);
        assert_eq!(body["message"], "Signup successful");
        assert_eq!(body["user"]["role"], "user");
        assert!(body["user"].get("password_hash").is_none());

        let (status, body) = call(
            &app,
            post_json(
                "/api/user/login",
                json!({"email": "ada@example.com", "password": "pw"}),
            ),
        )
        .await;
        assert_eq!(status, 200);
        assert_eq!(body["message"], "Login successful");
        let token = body["token"].as_str().unwrap().to_string();

        let (status, me) = call(&app, get_with("/api/user/me", Some(&token))).await;
        assert_eq!(status, 200);
        assert_eq!(me["email"], "ada@example.com");
        assert_eq!(me["name"], "Ada");
    }

    #[tokio::test]
    async fn signup_errors_are_400_with_error_field() {
        let app = app();
        let (status, body) = call(
            &app,
            post_json("/api/user/signup", json!({"email": "x@example.com"})),
        )
        .await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Name, email, and password required");

        let req = json!({"name": "A", "email": "x@example.com", "password": "pw"});
        assert_eq!(call(&app, post_json("/api/user/signup", req.clone())).await.0, 201);
        let (status, body) = call(&app, post_json("/api/user/signup", req)).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Email already registered");
    }

    #[tokio::test]
    async fn malformed_body_is_validation_error() {
        let req = Request::post("/api/user/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(&app(), req).await;
        assert_eq!(status, 400);
        assert_eq!(body["error"], "Invalid JSON body");
    }

    #[tokio::test]
    async fn login_failures_share_one_body() {
        let app = app();
        call(
            &app,
            post_json(
                "/api/user/signup",
                json!({"name": "B", "email": "b@example.com", "password": "right"}),
            ),
        )
        .await;

        let wrong = call(
            &app,
            post_json("/api/user/login", json!({"email": "b@example.com", "password": "wrong"})),
        )
        .await;
        let ghost = call(
            &app,
            post_json("/api/user/login", json!({"email": "no@example.com", "password": "right"})),
        )
        .await;
        assert_eq!(wrong, ghost);
        assert_eq!(wrong.0, 400);
        assert_eq!(wrong.1["error"], "Invalid email or password");
    }

    #[tokio::test]
    async fn me_requires_valid_token() {
        let app = app();
        let (status, body) = call(&app, get_with("/api/user/me", None)).await;
        assert_eq!(status, 401);
        assert_eq!(body["error"], "No token provided");

        let (status, body) = call(&app, get_with("/api/user/me", Some("garbage.token.here"))).await;
        assert_eq!(status, 403);
        assert_eq!(body["error"], "Invalid or expired token");
    }
}
