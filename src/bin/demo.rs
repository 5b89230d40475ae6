//! A demonstration server wiring up routes, middleware, groups, typed
//! decoding, static files, and Basic authentication.
//!
//! ```text
//! curl http://127.0.0.1:8080/
//! curl http://127.0.0.1:8080/hello/rust
//! curl -d 'name=ada&zip=10115' http://127.0.0.1:8080/users
//! curl -H 'Content-Type: application/json' -d '{"name":"ada","zip":"10115"}' http://127.0.0.1:8080/api/users
//! curl -u admin:s3cret http://127.0.0.1:8080/admin/routes
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use skiff::{
    handler_fn, middleware_fn, share_directory, BasicAuthentication, HandlerResult, HttpResponse,
    HttpResponseBody, HttpServer, InterceptResult, Middleware, Request, ResponseHeaders,
};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Deserialize, Debug)]
struct User {
    name: String,
    zip: String,
}

async fn index(_request: &Request, _headers: &mut ResponseHeaders) -> HandlerResult {
    Ok(HttpResponse::Ok(HttpResponseBody::HtmlBody(
        "<h1>skiff demo</h1><p>try <code>/hello/:name</code></p>".to_string(),
    )))
}

async fn hello(request: &Request, _headers: &mut ResponseHeaders) -> HandlerResult {
    let name = request.path_params().get("name").unwrap_or("world");
    Ok(HttpResponse::Ok(HttpResponseBody::Text(format!(
        "hello {name}!\r\n"
    ))))
}

// curl -d 'name=ada&zip=10115' http://127.0.0.1:8080/users
async fn create_user_form(request: &Request, _headers: &mut ResponseHeaders) -> HandlerResult {
    let user: User = request.decode_form()?;
    info!(name = %user.name, "user via form");
    Ok(HttpResponse::Created)
}

// curl -H 'Content-Type: application/json' -d '{"name":"ada","zip":"10115"}' http://127.0.0.1:8080/api/users
async fn create_user_json(request: &Request, _headers: &mut ResponseHeaders) -> HandlerResult {
    let user: User = request.decode_body()?;
    Ok(HttpResponse::Ok(HttpResponseBody::Json(
        serde_json::json!({ "created": user.name, "zip": user.zip }),
    )))
}

// curl -u admin:s3cret http://127.0.0.1:8080/admin/routes
async fn admin_routes(_request: &Request, _headers: &mut ResponseHeaders) -> HandlerResult {
    Ok(HttpResponse::Ok(HttpResponseBody::Text(
        "routes are listed in the startup log\r\n".to_string(),
    )))
}

/// Tags every response with the request id the access log carries.
async fn tag_request_id(request: &Request, headers: &mut ResponseHeaders) -> InterceptResult {
    headers.add("X-Request-Id", request.id().to_string());
    Ok(None)
}

/// Requires Basic credentials for everything under `/admin`.
struct AdminGate {
    auth: BasicAuthentication,
}

#[async_trait]
impl Middleware for AdminGate {
    async fn intercept(
        &self,
        request: &Request,
        headers: &mut ResponseHeaders,
    ) -> InterceptResult {
        if !request.path().starts_with("/admin") {
            return Ok(None);
        }
        match self.auth.authorized_user(request) {
            Some(user) => {
                info!(%user, "admin access");
                Ok(None)
            }
            None => {
                headers.add("WWW-Authenticate", "Basic realm=\"admin\"");
                Ok(Some(HttpResponse::Unauthorized))
            }
        }
    }
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder().with_max_level(Level::INFO).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let server = Arc::new(HttpServer::new());

    server.add_middleware(middleware_fn(tag_request_id));
    server.add_middleware(AdminGate {
        auth: BasicAuthentication::new(|username: &str| {
            (username == "admin").then(|| "s3cret".to_string())
        }),
    });

    server.get("/", handler_fn(index));
    server.get("/hello/:name", handler_fn(hello));
    server.post("/users", handler_fn(create_user_form));
    server.any("/static/**", share_directory("/static", "public"));

    let api = server.grouped("api");
    api.post("/users", handler_fn(create_user_json));

    let admin = server.grouped("admin");
    admin.get("/routes", handler_fn(admin_routes));

    server
        .metrics()
        .on_open_connections_changed(|open| info!(open, "open connections"));

    for route in server.routes() {
        info!(%route, "registered");
    }

    if let Err(e) = server.start(8080).await {
        error!(cause = %e, "bind server error");
        return;
    }

    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c");
    info!("shutting down");
    server.stop();
}
