use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use async_trait::async_trait;
use bcrypt::{hash, verify, DEFAULT_COST};
use serde::Deserialize;
use uuid::Uuid;

/// 密码加密算法类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PasswordAlgorithm {
    #[default]
    Bcrypt,
    Argon2,
}

impl PasswordAlgorithm {
    /// 根据哈希前缀识别算法
    pub fn detect(hash: &str) -> Option<Self> {
        if hash.starts_with("$argon2") {
            Some(PasswordAlgorithm::Argon2)
        } else if hash.starts_with("$2") {
            Some(PasswordAlgorithm::Bcrypt)
        } else {
            None
        }
    }
}

/// 密码服务trait
#[async_trait]
pub trait PasswordService: Send + Sync {
    /// 加密密码
    async fn hash(&self, password: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;

    /// 验证密码
    async fn verify(&self, password: &str, hash: &str) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;

    /// 获取使用的加密算法
    fn algorithm(&self) -> PasswordAlgorithm;
}

/// 默认密码服务实现
///
/// 新哈希使用配置的算法；验证时按哈希前缀选择算法，切换算法后旧密码仍然有效。
pub struct DefaultPasswordService {
    algorithm: PasswordAlgorithm,
    bcrypt_cost: u32,
}

impl DefaultPasswordService {
    pub fn new(algorithm: PasswordAlgorithm) -> Self {
        Self {
            algorithm,
            bcrypt_cost: DEFAULT_COST,
        }
    }

    pub fn with_bcrypt_cost(mut self, cost: u32) -> Self {
        self.bcrypt_cost = cost;
        self
    }
}

#[async_trait]
impl PasswordService for DefaultPasswordService {
    async fn hash(&self, password: &str) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        match self.algorithm {
            PasswordAlgorithm::Bcrypt => {
                hash(password, self.bcrypt_cost).map_err(|e| format!("Bcrypt hash error: {}", e).into())
            }
            PasswordAlgorithm::Argon2 => {
                let salt = SaltString::generate(&mut OsRng);
                let password_hash = Argon2::default()
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| format!("Argon2 hash error: {}", e))?;
                Ok(password_hash.to_string())
            }
        }
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        match PasswordAlgorithm::detect(hash).unwrap_or(self.algorithm) {
            PasswordAlgorithm::Bcrypt => {
                verify(password, hash).map_err(|e| format!("Bcrypt verify error: {}", e).into())
            }
            PasswordAlgorithm::Argon2 => {
                let parsed_hash =
                    PasswordHash::new(hash).map_err(|e| format!("Argon2 parse hash error: {}", e))?;
                match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
                    Ok(()) => Ok(true),
                    Err(argon2::password_hash::Error::Password) => Ok(false),
                    Err(e) => Err(format!("Argon2 verify error: {}", e).into()),
                }
            }
        }
    }

    fn algorithm(&self) -> PasswordAlgorithm {
        self.algorithm
    }
}

/// 生成应用密码：24个字符，每4个一组以空格分隔
pub fn generate_application_password() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    raw.as_bytes()[..24]
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// 去掉应用密码中的空白（用户可以带或不带分组空格输入）
pub fn normalize_application_password(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}
