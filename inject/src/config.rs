use inject_domain::Limits;
use inject_service::PasswordAlgorithm;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub limits: LimitsConfig,
    pub security: SecurityConfig,
    pub cache: CacheConfig,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// 请求体上限（字节）
    pub max_request_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8090,
            host: "0.0.0.0".to_string(),
            max_request_body_size: 4 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// 选项文件所在目录
    pub data_dir: PathBuf,
    /// 托管文件目录
    pub files_dir: PathBuf,
    /// 托管文件的公开URL前缀
    pub files_base_url: String,
    /// 网络级默认选项文件，站点没有值时读取
    pub network_defaults: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let work_dir = work_dir();
        Self {
            data_dir: work_dir.clone(),
            files_dir: work_dir.join("files"),
            files_base_url: "/inject-files".to_string(),
            network_defaults: None,
        }
    }
}

impl StorageConfig {
    pub fn options_path(&self) -> PathBuf {
        self.data_dir.join("options.json")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub max_history: usize,
    pub max_log_entries: usize,
    pub max_content_bytes: usize,
    pub max_file_bytes: usize,
    pub rate_limit_seconds: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        let limits = Limits::default();
        Self {
            max_history: limits.max_history,
            max_log_entries: limits.max_log_entries,
            max_content_bytes: limits.max_content_bytes,
            max_file_bytes: limits.max_file_bytes,
            rate_limit_seconds: limits.rate_limit_seconds,
        }
    }
}

impl From<&LimitsConfig> for Limits {
    fn from(config: &LimitsConfig) -> Self {
        Limits {
            max_history: config.max_history.max(1),
            max_log_entries: config.max_log_entries.max(1),
            max_content_bytes: config.max_content_bytes,
            max_file_bytes: config.max_file_bytes,
            rate_limit_seconds: config.rate_limit_seconds,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub rest_enabled: bool,
    /// 精确地址或CIDR，空表示不限制
    pub allowed_ips: Vec<String>,
    pub password_algorithm: PasswordAlgorithm,
    pub bcrypt_cost: u32,
    /// 位于反向代理之后时开启
    pub trust_proxy_headers: bool,
    /// 首次启动时创建的管理员登录名
    pub admin_login: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            rest_enabled: true,
            allowed_ips: Vec::new(),
            password_algorithm: PasswordAlgorithm::Bcrypt,
            bcrypt_cost: 12,
            trust_proxy_headers: false,
            admin_login: "admin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    #[serde(rename = "type")]
    pub cache_type: String,
    pub redis_url: String,
    pub memory_max_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_type: "memory".to_string(),
            redis_url: "redis://localhost:6379".to_string(),
            memory_max_size: 10000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            limits: LimitsConfig::default(),
            security: SecurityConfig::default(),
            cache: CacheConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

fn work_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".inject")
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // .env中的变量需要在读取环境变量之前加载
        dotenv::dotenv().ok();

        let config_path = work_dir().join("inject.toml");
        let config = config::Config::builder()
            .add_source(config::File::with_name("inject.toml").required(false))
            .add_source(config::File::from(config_path.as_path()).required(false))
            .add_source(
                config::Environment::with_prefix("INJECT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("security.allowed_ips")
                    .try_parsing(true),
            )
            .build()?;
        config.try_deserialize()
    }
}
