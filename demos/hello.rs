//! A small hasty application.
//!
//! ```sh
//! RUST_LOG=hasty=debug cargo run --example hello
//! curl -i localhost:3000/users/42
//! ```

use std::time::Duration;

use hasty::{App, HandlerError, RateLimitConfig, ServerConfig};
use serde::Deserialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct NewUser {
    name: String,
}

#[tokio::main]
async fn main() -> Result<(), hasty::ServerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("hasty=info")))
        .init();

    let config = ServerConfig::default()
        .port(3000)
        .idle_timeout(Duration::from_secs(15))
        .cors(true)
        .rate_limit(RateLimitConfig::per_minute(120));
    let mut app = App::with_config(config);

    app.get("/", |_req, res| async move {
        res.send("<h1>Hello from hasty</h1>").await?;
        Ok(())
    });

    app.get("/users/:id", |req, res| async move {
        let id = req.param("id").unwrap_or_default().to_owned();
        res.json(&json!({ "id": id })).await?;
        Ok(())
    });

    app.post("/users", |req, res| async move {
        let user: NewUser = req
            .json()
            .map_err(|e| HandlerError::msg(format!("invalid user: {e}")))?;
        res.status(201)?.json(&json!({ "created": user.name })).await?;
        Ok(())
    });

    app.get("/search", |req, res| async move {
        let term = req.query_param("q").unwrap_or("").to_owned();
        res.json(&json!({ "q": term, "query": req.query() })).await?;
        Ok(())
    });

    app.static_files("./public", "/assets");
    app.listen().await
}
