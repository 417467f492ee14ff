use clap::{Parser, Subcommand};

// 确保 Parser trait 被使用
impl Cli {
    /// 解析命令行参数
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }
}

/// unified-push - 统一推送通知发送工具
#[derive(Parser, Debug)]
#[command(name = "unified-push")]
#[command(version)]
#[command(about = "向 APNs / GCM / MPNS 发送推送通知", long_about = None)]
pub struct Cli {
    /// 配置文件路径
    #[arg(long, value_name = "FILE", help = "指定配置文件路径")]
    pub config_file: Option<String>,

    /// 日志级别
    #[arg(
        long,
        value_name = "LEVEL",
        help = "日志级别: trace, debug, info, warn, error"
    )]
    pub log_level: Option<String>,

    /// 日志格式
    #[arg(long, value_name = "FORMAT", help = "日志格式: pretty, json, compact")]
    pub log_format: Option<String>,

    /// 日志文件路径
    #[arg(long, value_name = "PATH", help = "日志输出文件路径")]
    pub log_file: Option<String>,

    /// 详细输出（可重复使用：-v, -vv, -vvv）
    #[arg(short, action = clap::ArgAction::Count, help = "详细输出级别")]
    pub verbose: u8,

    /// 静默模式
    #[arg(long, short = 'q', help = "静默模式（只输出错误日志）")]
    pub quiet: bool,

    /// 使用 APNs 沙盒网关
    #[arg(long, help = "使用 APNs 沙盒网关")]
    pub sandbox: bool,

    /// 子命令
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// 发送消息并输出投递报告
    Send {
        /// 消息 JSON，或以 @ 开头的 JSON 文件路径
        #[arg(value_name = "MESSAGE_JSON")]
        message: String,
    },
    /// 校验设备令牌
    ValidateToken {
        /// 推送平台: apns, gcm, mpns
        #[arg(long, value_name = "PROVIDER")]
        provider: String,
        /// 设备令牌
        #[arg(value_name = "TOKEN")]
        token: String,
    },
    /// 输出编码后的 payload，不发送
    Encode {
        /// 消息 JSON，或以 @ 开头的 JSON 文件路径
        #[arg(value_name = "MESSAGE_JSON")]
        message: String,
    },
    /// 生成默认配置文件
    GenerateConfig {
        /// 输出文件路径
        #[arg(value_name = "PATH", default_value = "unified-push.toml")]
        path: String,
    },
    /// 显示最终配置（合并后的配置）
    ShowConfig,
}

impl Cli {
    /// 获取日志级别（考虑 verbose 和 quiet）
    pub fn get_log_level(&self) -> Option<String> {
        if self.quiet {
            return Some("error".to_string());
        }

        if let Some(level) = &self.log_level {
            return Some(level.clone());
        }

        // 根据 verbose 级别设置
        match self.verbose {
            0 => None, // 使用默认或配置文件
            1 => Some("info".to_string()),
            2 => Some("debug".to_string()),
            _ => Some("trace".to_string()),
        }
    }
}
