//! Basic client usage against a public JSON API.
//!
//! Run with:
//! ```bash
//! RUST_LOG=restwell=debug cargo run --example basic_usage
//! ```

use restwell::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const BASE_URL: &str = "https://jsonplaceholder.typicode.com";

async fn async_example() -> anyhow::Result<()> {
    println!("=== Async Client ===\n");

    let client = ClientBuilder::new(BASE_URL)
        .header("Accept", "application/json")
        .build()?;

    let user: serde_json::Value = client
        .get("/users/1", RequestOptions::new())
        .await?
        .json()
        .await?;
    println!("User: {} ({})", user["name"], user["email"]);

    let posts: Vec<serde_json::Value> = client
        .get("/posts", RequestOptions::new().query("userId", 1))
        .await?
        .json()
        .await?;
    println!("Found {} posts", posts.len());

    let created: serde_json::Value = client
        .post(
            "/posts",
            RequestOptions::new().json(&serde_json::json!({
                "title": "Test Post",
                "body": "This is a test post",
                "userId": 1,
            }))?,
        )
        .await?
        .json()
        .await?;
    println!("Created post with id {}", created["id"]);

    let deleted = client.delete("/posts/1", RequestOptions::new()).await?;
    println!("Delete status: {}\n", deleted.status());

    // Clones share the connection pool.
    let tasks: Vec<_> = (1..=5)
        .map(|id| {
            let client = client.clone();
            tokio::spawn(async move {
                client
                    .get(&format!("/users/{id}"), RequestOptions::new())
                    .await
            })
        })
        .collect();
    for task in tasks {
        let response = task.await??;
        println!("  {} -> {}", response.url(), response.status());
    }
    println!();

    Ok(())
}

async fn error_example() -> anyhow::Result<()> {
    println!("=== Error Handling ===\n");

    let client = ClientBuilder::new(BASE_URL)
        .retry(
            RetryPolicy::new()
                .max_retries(3)
                .backoff_factor(0.5)
                .max_backoff(10.0),
        )
        .timeout(TimeoutConfig::default().read(Duration::from_secs(10)))
        .build()?;

    match client.get("/does-not-exist", RequestOptions::new()).await {
        Ok(response) => println!("Unexpected success: {}", response.status()),
        Err(err) if err.kind() == ErrorKind::Http => {
            println!("HTTP error {:?}: {err}", err.status());
        }
        Err(err) => return Err(err.into()),
    }
    println!();

    Ok(())
}

fn blocking_example() -> anyhow::Result<()> {
    println!("=== Blocking Client ===\n");

    let client = ClientBuilder::new(BASE_URL).build_blocking()?;
    let post: serde_json::Value = client.get("/posts/1", RequestOptions::new())?.json()?;
    println!("Post title: {}\n", post["title"]);

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    async_example().await?;
    error_example().await?;
    tokio::task::spawn_blocking(blocking_example).await??;

    Ok(())
}
