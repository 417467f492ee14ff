use std::fs;
use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use unified_push::{
    cli::{Cli, Commands},
    config::{self, PushConfig},
    logging,
    push::{
        codec, recipient, DispatchSession, EncodedPayload, GcmProvider, Message, MessageSpec,
        MpnsProvider, NotificationBuilder, PushService, PushVendor, TcpConnector,
    },
};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载 .env 文件（如果存在）
    let _ = dotenvy::dotenv();

    // 解析命令行参数
    let cli = Cli::parse();

    match &cli.command {
        Commands::GenerateConfig { path } => generate_config(path),
        Commands::ValidateToken { provider, token } => validate_token(provider, token),
        Commands::ShowConfig => show_config(&cli),
        Commands::Encode { message } => encode(message),
        Commands::Send { message } => {
            // 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
            let config = PushConfig::load(&cli).context("加载配置失败")?;
            let _guard = logging::init_logging(
                &config.logging.level,
                config.logging.format.as_deref(),
                config.logging.file.as_deref(),
                cli.quiet,
            )?;

            let complete = send(&config, message).await?;
            if !complete {
                process::exit(2);
            }
            Ok(())
        }
    }
}

/// 读取消息描述：JSON 字符串，或 `@path` 指向的 JSON 文件
fn read_message(arg: &str) -> Result<Message> {
    let json = match arg.strip_prefix('@') {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("无法读取消息文件: {}", path))?
        }
        None => arg.to_string(),
    };
    let spec: MessageSpec = serde_json::from_str(&json).context("消息 JSON 格式错误")?;
    Ok(spec.into_message()?)
}

/// 按消息平台创建推送服务
fn build_service(config: &PushConfig, vendor: PushVendor) -> Result<PushService> {
    let service = PushService::new();
    let service = match vendor {
        PushVendor::Apns => {
            let connector =
                TcpConnector::new(config.apns.gateway_address(), config.apns.connect_timeout());
            service.with_apns_session(DispatchSession::new(connector, config.apns.session_config()))
        }
        PushVendor::Gcm => {
            let api_key = config
                .gcm
                .api_key
                .clone()
                .context("发送 GCM 消息需要配置 gcm.api_key")?;
            let provider =
                GcmProvider::new(&config.gcm.endpoint, api_key, config.gcm.request_timeout())?;
            service.with_provider(Arc::new(provider))
        }
        PushVendor::Mpns => {
            let provider = MpnsProvider::new(config.mpns.request_timeout())?;
            service.with_provider(Arc::new(provider))
        }
    };
    Ok(service)
}

/// 发送消息，返回是否全部送达
async fn send(config: &PushConfig, arg: &str) -> Result<bool> {
    let message = read_message(arg)?;
    let mut service = build_service(config, message.vendor())?;

    tracing::info!(
        "Sending {} message to {} recipients",
        message.vendor(),
        message.recipients().len()
    );
    let report = service.send(&message).await.context("发送失败")?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(report.is_complete())
}

/// 输出编码结果
fn encode(arg: &str) -> Result<()> {
    let message = read_message(arg)?;
    let notifications = NotificationBuilder::with_default_handlers().build_notifications(&message)?;

    for notification in &notifications {
        println!(
            "# notification {} -> {}",
            notification.id(),
            notification.recipient().identifier()
        );
        match &**notification.payload() {
            EncodedPayload::Json(value) => println!("{}", serde_json::to_string(value)?),
            EncodedPayload::Xml {
                document,
                target,
                notification_class,
            } => {
                println!(
                    "# X-WindowsPhone-Target: {}, X-NotificationClass: {}",
                    target.unwrap_or("-"),
                    notification_class
                );
                println!("{}", document.to_xml_string()?);
            }
        }
        if notification.vendor() == PushVendor::Apns {
            let frame = codec::encode_notification(notification)?;
            println!("# frame: {}", hex::encode(&frame));
        }
    }

    Ok(())
}

/// 校验设备令牌
fn validate_token(provider: &str, token: &str) -> Result<()> {
    let vendor = PushVendor::from_str(provider)
        .with_context(|| format!("不支持的推送平台: {}", provider))?;

    if recipient::validate(vendor, token) {
        println!("✅ {} token is valid", vendor);
        Ok(())
    } else {
        println!("❌ {} token is invalid: {}", vendor, token);
        process::exit(1);
    }
}

/// 生成默认配置文件
fn generate_config(path: &str) -> Result<()> {
    fs::write(path, config::default_config_toml())
        .with_context(|| format!("无法写入配置文件: {}", path))?;

    println!("✅ 配置文件已生成: {}", path);
    Ok(())
}

/// 显示最终配置（合并后的配置）
fn show_config(cli: &Cli) -> Result<()> {
    let config = PushConfig::load(cli).context("加载配置失败")?;

    println!("📊 最终配置（合并后的配置）:");
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}
