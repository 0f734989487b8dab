use async_trait::async_trait;
use serde::Serialize;
use std::error::Error;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

use eventbus_core::{BusBuilder, BusConfig, Handler, HandlerError};

#[derive(Debug, Clone, Serialize)]
struct Event {
    code: i32,
    msg: String,
}

#[derive(Debug, Clone)]
struct Heartbeat;

struct PrintHandler;

#[async_trait]
impl Handler<Event> for PrintHandler {
    async fn handle(&self, event: Event) -> Result<(), HandlerError> {
        println!("PrintHandler: code={} msg={}", event.code, event.msg);
        Ok(())
    }
}

/// code が負の Event を失敗として扱う
async fn audit(event: Event) -> Result<(), HandlerError> {
    if event.code < 0 {
        return Err(HandlerError::new(format!("negative code {}", event.code)));
    }
    let json = serde_json::to_string(&event).map_err(|e| HandlerError::new(e.to_string()))?;
    tracing::info!(%json, "audited");
    Ok(())
}

fn load_config() -> Result<BusConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let json = std::fs::read_to_string(&path)?;
            Ok(BusConfig::from_json_str(&json)?)
        }
        None => Ok(BusConfig::default()),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // (A) handler を登録して Bus を起動（Event に handler が無ければ起動失敗）
    let bus = BusBuilder::new()
        .config(load_config()?)
        .register::<Event, _>(PrintHandler)?
        .register_fn(audit)?
        .expect::<Event>()
        .build()?;
    let mut faults = bus.faults();

    // (B) 同じ handler の二重登録は拒否される
    if let Err(e) = bus.register::<Event, _>(PrintHandler) {
        println!("second registration rejected: {e}");
    }

    // (C) message を送る。Heartbeat には handler が無いので捨てられる
    bus.send(Event {
        code: 0,
        msg: "hello".to_string(),
    })
    .await?;
    bus.send(Event {
        code: -1,
        msg: "broken".to_string(),
    })
    .await?;
    bus.send(Heartbeat).await?;

    sleep(Duration::from_millis(200)).await;
    while let Ok(fault) = faults.try_recv() {
        println!("fault: {fault}");
    }

    // (D) graceful shutdown
    let report = bus.shutdown().await;
    println!("shutdown: {}", serde_json::to_string(&report)?);
    println!("stats: {}", serde_json::to_string(&bus.stats())?);
    Ok(())
}
