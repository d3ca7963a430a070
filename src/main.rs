//! # Session Gate 运维命令行
//!
//! 加载配置后直接调用会话服务，用于排查和手工操作会话

use clap::{Parser, Subcommand};
use serde::Serialize;
use std::sync::Arc;

use session_gate::{
    Result, SessionError,
    auth::{AuthenticationService, NewAccount, Platform, SeaOrmUserRepository, TokenReply},
    cache, config, database, lerror, linfo,
    logging::{self, LogComponent, LogStage},
};

#[derive(Parser)]
#[command(name = "session-gate")]
#[command(about = "Multi-platform session and token lifecycle manager")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 配置文件路径（覆盖 SESSION_GATE_CONFIG_PATH / RUST_ENV）
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// 日志级别
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// 打印日志配置说明
    LogHelp,
    /// 执行数据库迁移
    Migrate,
    /// 注册新账号
    Register {
        #[arg(long)]
        login_name: String,
        #[arg(long, default_value = "")]
        nickname: String,
        #[arg(long)]
        password: String,
    },
    /// 登录并输出 Token
    Login {
        #[arg(long)]
        login_name: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        platform: Platform,
    },
    /// 使用刷新 Token 换取新 Token
    Refresh {
        #[arg(long)]
        refresh_token: String,
    },
    /// 登出指定平台
    Logout {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        platform: Platform,
    },
    /// 申请密码重置
    ApplyReset {
        #[arg(long)]
        login_name: String,
    },
    /// 使用重置 Token 和验证码设置新密码
    ResetPassword {
        #[arg(long)]
        token: String,
        #[arg(long)]
        code: String,
        #[arg(long)]
        new_password: String,
    },
    /// 列出用户当前的会话
    Sessions {
        #[arg(long)]
        user_id: i64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if matches!(cli.command, Commands::LogHelp) {
        logging::print_logging_help();
        return;
    }

    logging::init_optimized_logging(cli.log_level.as_deref());

    if let Err(e) = run(cli).await {
        lerror!("system", LogStage::Command, LogComponent::Main, "command_failed", &format!("命令执行失败: {e}"), status = e.status_code());
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let app_config = match &cli.config {
        Some(path) => config::load_config_from(path)?,
        None => config::load_config()?,
    };

    let db = database::init_database(&app_config.database).await?;

    if matches!(cli.command, Commands::Migrate) {
        database::run_migrations(&db).await?;
        linfo!("system", LogStage::Database, LogComponent::Main, "migrate_done", "数据库迁移完成");
        return Ok(());
    }

    if database::check_database_status(&db).await? > 0 {
        return Err(SessionError::config("数据库存在未执行的迁移，请先运行 migrate"));
    }

    let backend = cache::create_backend(&app_config.cache).await?;
    let service = AuthenticationService::new(
        Arc::new(SeaOrmUserRepository::new(db)),
        backend,
        app_config.token,
    )?;

    match cli.command {
        Commands::LogHelp | Commands::Migrate => Ok(()),
        Commands::Register {
            login_name,
            nickname,
            password,
        } => {
            let user = service
                .register_user(NewAccount {
                    login_name,
                    nickname,
                    password,
                })
                .await?;
            print_json(&user)
        }
        Commands::Login {
            login_name,
            password,
            platform,
        } => {
            let pair = service.login(&login_name, &password, platform).await?;
            print_json(&TokenReply::from(pair))
        }
        Commands::Refresh { refresh_token } => {
            let pair = service.refresh_token(&refresh_token).await?;
            print_json(&TokenReply::from(pair))
        }
        Commands::Logout { user_id, platform } => service.logout(user_id, platform).await,
        Commands::ApplyReset { login_name } => {
            let application = service.apply_password_reset(&login_name).await?;
            print_json(&application)
        }
        Commands::ResetPassword {
            token,
            code,
            new_password,
        } => service.reset_password(&token, &code, &new_password).await,
        Commands::Sessions { user_id } => {
            let sessions = service.list_sessions(user_id).await?;
            print_json(&sessions)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
