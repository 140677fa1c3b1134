//! Mentor 控制台入口
//!
//! 用法：`mentor [user_id] [--config path]`，之后逐行读取标准输入：
//! - `/setup <name> | <goal>`：创建（或重置）用户
//! - `/upload <path>`：上传文档
//! - `/profile`：查看画像与任务
//! - `/quit`：退出
//! - 其他内容：作为一轮对话发送

use std::path::PathBuf;

use anyhow::Context;
use mentor::config::load_config;
use mentor::memory::Profile;
use mentor::{SessionOrchestrator, Upload};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 日志：默认 info，可通过 RUST_LOG 覆盖
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("info".parse()?))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut args = std::env::args().skip(1);
    let mut user_id = "local".to_string();
    let mut config_path = None;
    while let Some(arg) = args.next() {
        if arg == "--config" {
            config_path = args.next().map(PathBuf::from);
        } else {
            user_id = arg;
        }
    }

    let cfg = load_config(config_path).context("Failed to load config")?;
    let orchestrator = SessionOrchestrator::from_config(&cfg)
        .await
        .context("Failed to open memory store")?;

    println!("Mentor ready for user '{}'. Type /setup <name> | <goal> to begin.", user_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = run_command(&orchestrator, &user_id, line).await {
            eprintln!("error: {:#}", e);
        }
    }

    Ok(())
}

async fn run_command(
    orchestrator: &SessionOrchestrator,
    user_id: &str,
    line: &str,
) -> anyhow::Result<()> {
    if let Some(rest) = line.strip_prefix("/setup") {
        let (name, goal) = rest.split_once('|').unwrap_or((rest, ""));
        let profile = Profile {
            name: name.trim().to_string(),
            goal: goal.trim().to_string(),
            ..Profile::default()
        };
        orchestrator.setup(user_id, profile).await?;
        println!("User setup complete");
    } else if let Some(path) = line.strip_prefix("/upload") {
        let path = PathBuf::from(path.trim());
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let receipt = orchestrator.upload(user_id, Upload::new(filename, bytes)).await?;
        println!("{}\n{}", receipt.message, receipt.content_snippet);
    } else if line == "/profile" {
        let record = orchestrator.get(user_id).await?;
        println!("{}", serde_json::to_string_pretty(&record.profile)?);
        for task in &record.tasks {
            println!("- [{:?}] {}", task.status, task.description);
        }
    } else {
        let envelope = orchestrator.handle(user_id, line, None).await?;
        println!("{}", envelope.reply);
        if let Some(analytics) = envelope.analytics {
            println!("(sentiment: {:?}, topic: {})", analytics.sentiment, analytics.topic);
        }
    }
    Ok(())
}
