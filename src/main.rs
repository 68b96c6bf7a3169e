//! # mfi-session 命令行工具
//!
//! 运维用的会话调试工具：登录、登出、查看会话状态与认证头。
//! 凭证保存在本地 JSON 文件中，跨进程调用保持会话。

use clap::{Parser, Subcommand};
use mfi_resilience::{
    AppContext, ClientConfig, ClientError, Result,
    auth::NoopNavigator,
    config::{self, StorageBackendType},
    lerror, linfo, lwarn,
    logging::{self, LogComponent, LogStage},
};
use std::path::PathBuf;
use std::sync::Arc;

const DEFAULT_STORE_PATH: &str = ".mfi-session/credentials.json";

#[derive(Debug, Parser)]
#[command(name = "mfi-session", version, about = "MFI 仪表盘会话调试工具")]
struct Cli {
    /// 配置文件路径（默认按 RUST_ENV 读取 config/config.{env}.toml）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 凭证文件路径
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// 日志级别
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 登录并保存令牌
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// 通知服务端登出并清除本地令牌
    Logout,
    /// 显示会话状态与令牌过期时间
    Status,
    /// 显示当前用户
    Whoami,
    /// 输出当前请求应携带的认证头（必要时先刷新）
    Headers,
    /// 以当前会话 GET 一个业务接口
    Get {
        /// 相对 base_url 的路径
        path: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init_logging(Some(&cli.log_level));

    if let Err(e) = run(cli).await {
        lerror!(
            "system",
            LogStage::Internal,
            LogComponent::Main,
            "command_failed",
            &format!("命令执行失败: {e}")
        );
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

fn resolve_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config().unwrap_or_else(|e| {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::Config,
                "config_fallback",
                &format!("未能加载配置文件，使用默认配置: {e}")
            );
            ClientConfig::default()
        }),
    };

    config.storage.backend = StorageBackendType::File;
    config.storage.path = cli
        .store
        .clone()
        .or_else(|| config.storage.path.take())
        .or_else(|| Some(PathBuf::from(DEFAULT_STORE_PATH)));
    // 命令行进程内不需要后台清理
    config.cache.sweep_interval_secs = 0;
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;
    let ctx = AppContext::build(config, Arc::new(NoopNavigator))?;
    let lifecycle = &ctx.lifecycle;

    match cli.command {
        Command::Login { email, password } => {
            let outcome = lifecycle.login(&email, &password).await?;
            linfo!(
                "system",
                LogStage::Authentication,
                LogComponent::Main,
                "login",
                "登录成功"
            );
            match outcome.user {
                Some(user) => println!(
                    "logged in as {} ({})",
                    user.email.as_deref().unwrap_or("-"),
                    user.role.as_deref().unwrap_or("-")
                ),
                None => println!("logged in"),
            }
        }
        Command::Logout => {
            lifecycle.logout().await;
            println!("logged out");
        }
        Command::Status => {
            println!("state: {:?}", lifecycle.state());
            if let Some(token) = ctx.store.access_token() {
                match mfi_resilience::auth::jwt::expires_at(&token) {
                    Some(at) => println!("expires_at: {}", at.to_rfc3339()),
                    None => println!("expires_at: <undecodable>"),
                }
            }
            println!(
                "refresh_token: {}",
                if ctx.store.read().and_then(|c| c.refresh_token).is_some() {
                    "present"
                } else {
                    "absent"
                }
            );
        }
        Command::Whoami => {
            let user = lifecycle
                .get_current_user()
                .ok_or_else(|| ClientError::authentication("当前没有登录"))?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Headers => {
            let headers = lifecycle.get_auth_headers().await;
            if headers.is_empty() {
                return Err(ClientError::authentication("没有可用的会话，请先登录"));
            }
            for (name, value) in &headers {
                println!("{name}: {}", value.to_str().unwrap_or("<binary>"));
            }
        }
        Command::Get { path } => {
            let body = ctx.client.get_json(&path).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
    }

    ctx.shutdown().await;
    Ok(())
}
