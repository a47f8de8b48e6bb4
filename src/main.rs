use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use toolbox::db::Database;
use toolbox::model::config::Config;
use toolbox::{seed, server};

#[derive(Parser, Debug)]
#[command(author, version, about = "爱奇吉工具箱后端")]
struct Cli {
    /// 配置文件路径
    #[arg(short, long, default_value = Config::default_config_path())]
    config: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 启动 HTTP 服务（默认）
    Serve,
    /// 写入种子数据
    Seed {
        /// 先清空工具、友链和反馈
        #[arg(long)]
        reset: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let mut config = Config::load(&cli.config)?;
    config.apply_env_overrides();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => server::serve(config).await,
        Command::Seed { reset } => {
            let db = Database::open(&config.database_path)?;
            let report = db.call(move |conn| Ok(seed::run(conn, reset)?)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }
    }
}
