//! Hive - 单目标任务编排器
//!
//! 入口：初始化日志、加载配置、构建编排器；新目标或 --recover 续跑最近的会话。
//! 进度事件打印到 stderr，最终报告以 JSON 打印到 stdout。

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use hive::config::{load_config, AppConfig};
use hive::core::LoopEvent;
use hive::OrchestratorBuilder;

#[derive(Parser, Debug)]
#[clap(
    name = "hive",
    version = env!("CARGO_PKG_VERSION"),
    about = "Decompose a goal into steps, run them with workers, recover from failures."
)]
struct Cli {
    /// Resume the most recently started session
    #[clap(long)]
    recover: bool,
    /// Extra config file (overrides config/default.toml)
    #[clap(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// The goal; read from stdin when omitted
    goal: Vec<String>,
}

async fn read_goal_from_stdin() -> anyhow::Result<String> {
    let mut stderr = tokio::io::stderr();
    stderr.write_all(b"Enter your goal: ").await?;
    stderr.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("Failed to read goal from stdin")?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    hive::observability::init();

    let cfg = load_config(cli.config.clone()).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<LoopEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            eprintln!("{}", event);
        }
    });

    let orchestrator = OrchestratorBuilder::new(cfg)
        .with_events(tx)
        .build()
        .context("Failed to build orchestrator")?;

    let report = if cli.recover {
        let id = orchestrator
            .store()
            .last_session_id()
            .await
            .context("No session to recover (last session id not found)")?;
        orchestrator
            .resume(id)
            .await
            .context("Failed to resume session")?
    } else {
        let mut goal = cli.goal.join(" ").trim().to_string();
        if goal.is_empty() {
            goal = read_goal_from_stdin().await?;
        }
        orchestrator.run(&goal).await.context("Orchestration failed")?
    };

    drop(orchestrator);
    let _ = printer.await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
