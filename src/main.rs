// ==========================================
// 生产排程引擎 - 命令行入口
// ==========================================
// 协议: stdin 每行一个 JSON 请求,stdout 每行一个 JSON 响应
// 日志: 写 stderr (RUST_LOG / PRODUCTION_APS_LOG_FORMAT)
// 数据库: 第一个参数 > PRODUCTION_APS_DB > 用户数据目录
// ==========================================

use anyhow::Context;
use production_aps::app::{get_default_db_path, handle_line, AppState};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    production_aps::logging::init();

    tracing::info!("==================================================");
    tracing::info!("{} v{}", production_aps::APP_NAME, production_aps::VERSION);
    tracing::info!("==================================================");

    let db_path = std::env::args()
        .nth(1)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);

    let state = AppState::new(&db_path).context("无法初始化AppState")?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.next_line().await.context("读取请求失败")? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&state.schedule_api, &line).await;
        let mut out = serde_json::to_string(&response).context("响应序列化失败")?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
    }

    tracing::info!("输入结束，退出");
    Ok(())
}
