use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::PushError;
use crate::push::dispatcher::SessionConfig;

/// 默认配置文件
pub const DEFAULT_CONFIG_FILE: &str = "unified-push.toml";

/// 环境变量前缀
pub const ENV_PREFIX: &str = "UNIFIED_PUSH_";

/// APNs 生产网关
pub const APNS_PRODUCTION_HOST: &str = "gateway.push.apple.com";

/// APNs 沙盒网关
pub const APNS_SANDBOX_HOST: &str = "gateway.sandbox.push.apple.com";

/// 推送配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushConfig {
    pub apns: ApnsConfig,
    pub gcm: GcmConfig,
    pub mpns: MpnsConfig,
    pub logging: LoggingConfig,
}

/// APNs 二进制网关配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApnsConfig {
    /// 网关地址，未设置时按 `sandbox` 选择官方网关
    pub host: Option<String>,
    pub port: u16,
    pub sandbox: bool,
    /// 建立连接的超时（毫秒）
    pub connect_timeout_ms: u64,
    /// 写完最后一帧后等待错误响应的时间（毫秒）
    pub error_wait_ms: u64,
    /// 会话级错误的重试次数，`None` 表示不限
    pub max_retries: Option<u32>,
    /// 连接失败后的重连间隔（毫秒）
    pub reconnect_delay_ms: u64,
}

impl Default for ApnsConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: 2195,
            sandbox: false,
            connect_timeout_ms: 10_000,
            error_wait_ms: 1_000,
            max_retries: Some(3),
            reconnect_delay_ms: 200,
        }
    }
}

impl ApnsConfig {
    pub fn gateway_host(&self) -> &str {
        match &self.host {
            Some(host) => host,
            None if self.sandbox => APNS_SANDBOX_HOST,
            None => APNS_PRODUCTION_HOST,
        }
    }

    pub fn gateway_address(&self) -> String {
        format!("{}:{}", self.gateway_host(), self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            error_wait: Duration::from_millis(self.error_wait_ms),
            max_retries: self.max_retries,
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
        }
    }
}

/// GCM 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcmConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    /// 请求超时（毫秒）
    pub request_timeout_ms: u64,
}

impl Default for GcmConfig {
    fn default() -> Self {
        Self {
            endpoint: crate::push::provider::GCM_ENDPOINT.to_string(),
            api_key: None,
            request_timeout_ms: 30_000,
        }
    }
}

impl GcmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// MPNS 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpnsConfig {
    /// 请求超时（毫秒）
    pub request_timeout_ms: u64,
}

impl Default for MpnsConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
        }
    }
}

impl MpnsConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: Option<String>,
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
            file: None,
        }
    }
}

impl PushConfig {
    /// 从 TOML 文件加载配置
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("无法读取配置文件: {:?}", path.as_ref()))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_config: TomlConfig = toml::from_str(content).context("配置文件格式错误")?;
        toml_config.try_into()
    }

    /// 从环境变量合并配置（UNIFIED_PUSH_ 前缀）
    pub fn merge_from_env(&mut self) -> Result<()> {
        self.merge_from_vars(env::vars())
    }

    /// 合并一组键值对，只识别带前缀的键
    pub fn merge_from_vars<I>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            let Some(name) = key.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match name {
                "APNS_HOST" => self.apns.host = Some(value),
                "APNS_PORT" => self.apns.port = parse_var(&key, &value)?,
                "APNS_SANDBOX" => self.apns.sandbox = parse_var(&key, &value)?,
                "APNS_CONNECT_TIMEOUT_MS" => self.apns.connect_timeout_ms = parse_var(&key, &value)?,
                "APNS_ERROR_WAIT_MS" => self.apns.error_wait_ms = parse_var(&key, &value)?,
                "APNS_MAX_RETRIES" => self.apns.max_retries = retry_budget(parse_var(&key, &value)?)?,
                "APNS_RECONNECT_DELAY_MS" => self.apns.reconnect_delay_ms = parse_var(&key, &value)?,
                "GCM_ENDPOINT" => self.gcm.endpoint = value,
                "GCM_API_KEY" => self.gcm.api_key = Some(value),
                "GCM_REQUEST_TIMEOUT_MS" => self.gcm.request_timeout_ms = parse_var(&key, &value)?,
                "MPNS_REQUEST_TIMEOUT_MS" => self.mpns.request_timeout_ms = parse_var(&key, &value)?,
                "LOG_LEVEL" => self.logging.level = value,
                "LOG_FORMAT" => self.logging.format = Some(value),
                "LOG_FILE" => self.logging.file = Some(value),
                _ => {}
            }
        }
        Ok(())
    }

    /// 从命令行参数合并（最高优先级）
    pub fn merge_from_cli(&mut self, cli: &crate::cli::Cli) {
        if let Some(log_level) = cli.get_log_level() {
            self.logging.level = log_level;
        }
        if let Some(log_format) = &cli.log_format {
            self.logging.format = Some(log_format.clone());
        }
        if let Some(log_file) = &cli.log_file {
            self.logging.file = Some(log_file.clone());
        }
        if cli.sandbox {
            self.apns.sandbox = true;
        }
    }

    /// 检查配置取值
    pub fn validate(&self) -> crate::error::Result<()> {
        let invalid = |reason: &str| Err(PushError::Configuration(reason.to_string()));
        if self.apns.port == 0 {
            return invalid("apns.port 不能为 0");
        }
        if self.apns.error_wait_ms == 0 {
            return invalid("apns.error_wait_ms 必须大于 0");
        }
        if self.gcm.endpoint.is_empty() {
            return invalid("gcm.endpoint 不能为空");
        }
        Ok(())
    }

    /// 加载配置（按优先级：命令行 > 环境变量 > 配置文件 > 默认值）
    pub fn load(cli: &crate::cli::Cli) -> Result<Self> {
        // 1. 从配置文件加载（如果存在）
        let mut config = match &cli.config_file {
            Some(config_file) if Path::new(config_file).exists() => {
                Self::from_toml_file(config_file)?
            }
            Some(config_file) => {
                warn!("配置文件不存在: {}", config_file);
                Self::default()
            }
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_toml_file(DEFAULT_CONFIG_FILE)?
            }
            None => Self::default(),
        };

        // 2. 从环境变量合并（优先级高于配置文件）
        config.merge_from_env()?;

        // 3. 从命令行参数合并（最高优先级）
        config.merge_from_cli(cli);

        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e| anyhow::anyhow!("环境变量 {} 的值 '{}' 无效: {}", key, value, e))
}

/// 负数表示不限次数
fn retry_budget(value: i64) -> Result<Option<u32>> {
    if value < 0 {
        return Ok(None);
    }
    let budget = u32::try_from(value).context("max_retries 超出范围")?;
    Ok(Some(budget))
}

/// 默认配置文件内容
pub fn default_config_toml() -> &'static str {
    r#"# unified-push 配置文件
# 此文件由 unified-push generate-config 生成

[apns]
# 未设置 host 时按 sandbox 选择官方网关
# host = "127.0.0.1"
port = 2195
sandbox = false
connect_timeout_ms = 10000
error_wait_ms = 1000
# 负数表示不限次数
max_retries = 3
reconnect_delay_ms = 200

[gcm]
endpoint = "https://gcm-http.googleapis.com/gcm/send"
# api_key = "your-server-key"
request_timeout_ms = 30000

[mpns]
request_timeout_ms = 30000

[logging]
level = "info"
format = "compact"
# file = "./logs/unified-push.log"
"#
}

/// TOML 配置文件结构（用于反序列化）
#[derive(Debug, Deserialize)]
struct TomlConfig {
    apns: Option<TomlApnsConfig>,
    gcm: Option<TomlGcmConfig>,
    mpns: Option<TomlMpnsConfig>,
    logging: Option<TomlLoggingConfig>,
}

#[derive(Debug, Deserialize)]
struct TomlApnsConfig {
    host: Option<String>,
    port: Option<u16>,
    sandbox: Option<bool>,
    connect_timeout_ms: Option<u64>,
    error_wait_ms: Option<u64>,
    max_retries: Option<i64>,
    reconnect_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlGcmConfig {
    endpoint: Option<String>,
    api_key: Option<String>,
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlMpnsConfig {
    request_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TomlLoggingConfig {
    level: Option<String>,
    format: Option<String>,
    file: Option<String>,
}

impl TryFrom<TomlConfig> for PushConfig {
    type Error = anyhow::Error;

    fn try_from(toml: TomlConfig) -> Result<Self> {
        let mut config = Self::default();

        if let Some(apns) = toml.apns {
            if apns.host.is_some() {
                config.apns.host = apns.host;
            }
            if let Some(port) = apns.port {
                config.apns.port = port;
            }
            if let Some(sandbox) = apns.sandbox {
                config.apns.sandbox = sandbox;
            }
            if let Some(timeout) = apns.connect_timeout_ms {
                config.apns.connect_timeout_ms = timeout;
            }
            if let Some(wait) = apns.error_wait_ms {
                config.apns.error_wait_ms = wait;
            }
            if let Some(retries) = apns.max_retries {
                config.apns.max_retries = retry_budget(retries)?;
            }
            if let Some(delay) = apns.reconnect_delay_ms {
                config.apns.reconnect_delay_ms = delay;
            }
        }

        if let Some(gcm) = toml.gcm {
            if let Some(endpoint) = gcm.endpoint {
                config.gcm.endpoint = endpoint;
            }
            if gcm.api_key.is_some() {
                config.gcm.api_key = gcm.api_key;
            }
            if let Some(timeout) = gcm.request_timeout_ms {
                config.gcm.request_timeout_ms = timeout;
            }
        }

        if let Some(mpns) = toml.mpns {
            if let Some(timeout) = mpns.request_timeout_ms {
                config.mpns.request_timeout_ms = timeout;
            }
        }

        if let Some(logging) = toml.logging {
            if let Some(level) = logging.level {
                config.logging.level = level;
            }
            if logging.format.is_some() {
                config.logging.format = logging.format;
            }
            if logging.file.is_some() {
                config.logging.file = logging.file;
            }
        }

        Ok(config)
    }
}
