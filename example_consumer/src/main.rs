//! Example consumer: lists instances and, when SYNCANO_INSTANCE is set, its classes and a few objects.
//!
//! Run from repo root: `cargo run -p example-consumer`
//! Or from this directory: `cargo run`

use std::sync::Arc;
use syncano_sdk::{ConnectionConfig, HttpConnection, Session};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("syncano_sdk=info")),
        )
        .init();

    let config = ConnectionConfig::from_env();
    let instance = config.instance_name.clone();
    let connection = Arc::new(HttpConnection::new(config)?);
    let mut session = Session::with_builtins(connection)?;
    if let Some(name) = &instance {
        session = session.with_instance(name);
    }
    let session = session.into_shared();

    for inst in session.please("Instance")?.all().fetch().await? {
        tracing::info!(name = inst.get_str("name").unwrap_or_default(), "instance");
    }

    let Some(instance) = instance else {
        return Ok(());
    };
    for class in session.please("Class")?.all().fetch().await? {
        let Some(class_name) = class.get_str("name") else {
            continue;
        };
        let count = session.objects(&instance, class_name).await?.count().await?;
        tracing::info!(class = class_name, objects = count, "class");
        let objects = session.objects_for(&class)?;
        for object in objects.list().limit(3).fetch().await? {
            tracing::info!(class = class_name, id = ?object.get_i64("id"), "object");
        }
    }
    Ok(())
}
