use crate::error::{Result, ServiceError};
use crate::security::password_service::{
    generate_application_password, normalize_application_password, PasswordService,
};
use async_trait::async_trait;
use chrono::Utc;
use inject_api::{AuthenticatedUser, OptionStore, MANAGE_CAPABILITY};
use inject_domain::constant::ACCOUNTS_KEY;
use inject_domain::{Account, ApplicationPassword};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 账户转为认证后的操作者
pub fn to_authenticated_user(account: &Account) -> AuthenticatedUser {
    AuthenticatedUser::new(account.id, account.login.clone(), account.capabilities.clone())
        .with_display_name(account.display_name.clone())
}

/// 账户和应用密码服务
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn list(&self) -> Result<Vec<Account>>;

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>>;

    async fn create_account(&self, login: &str, display_name: &str, capabilities: Vec<String>) -> Result<Account>;

    /// 创建应用密码，返回明文（只在此时可见）和保存的记录
    async fn create_application_password(&self, login: &str, name: &str) -> Result<(String, ApplicationPassword)>;

    async fn revoke_application_password(&self, login: &str, uuid: &str) -> Result<()>;

    /// 用应用密码认证，成功时更新最近使用时间
    async fn authenticate(&self, login: &str, password: &str) -> Result<Option<Account>>;

    /// 没有任何账户时创建管理员，返回其应用密码
    async fn ensure_admin(&self, login: &str) -> Result<Option<String>>;
}

pub struct DefaultAccountService {
    options: Arc<dyn OptionStore>,
    password_service: Arc<dyn PasswordService>,
}

impl DefaultAccountService {
    pub fn new(options: Arc<dyn OptionStore>, password_service: Arc<dyn PasswordService>) -> Self {
        Self {
            options,
            password_service,
        }
    }

    async fn save_all(&self, accounts: &[Account]) -> Result<()> {
        self.options.save(ACCOUNTS_KEY, accounts).await?;
        Ok(())
    }
}

#[async_trait]
impl AccountService for DefaultAccountService {
    async fn list(&self) -> Result<Vec<Account>> {
        Ok(self.options.load_or_default(ACCOUNTS_KEY).await?)
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<Account>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|a| a.login.eq_ignore_ascii_case(login)))
    }

    async fn create_account(&self, login: &str, display_name: &str, capabilities: Vec<String>) -> Result<Account> {
        let login = login.trim();
        if login.is_empty() {
            return Err(ServiceError::InvalidContent("login must not be empty".to_string()));
        }
        let mut accounts = self.list().await?;
        if accounts.iter().any(|a| a.login.eq_ignore_ascii_case(login)) {
            return Err(ServiceError::Conflict(format!("account {} already exists", login)));
        }

        let account = Account {
            id: accounts.iter().map(|a| a.id).max().unwrap_or(0) + 1,
            login: login.to_string(),
            display_name: match display_name.trim() {
                "" => login.to_string(),
                name => name.to_string(),
            },
            capabilities,
            application_passwords: Vec::new(),
            disabled: false,
        };
        accounts.push(account.clone());
        self.save_all(&accounts).await?;

        info!(login = %account.login, id = account.id, "Account created");
        Ok(account)
    }

    async fn create_application_password(&self, login: &str, name: &str) -> Result<(String, ApplicationPassword)> {
        let mut accounts = self.list().await?;
        let account = accounts
            .iter_mut()
            .find(|a| a.login.eq_ignore_ascii_case(login))
            .ok_or_else(|| ServiceError::NotFound(format!("account {}", login)))?;

        let plain = generate_application_password();
        let password_hash = self
            .password_service
            .hash(&normalize_application_password(&plain))
            .await
            .map_err(|e| ServiceError::Backend(e.to_string()))?;
        let record = ApplicationPassword {
            uuid: Uuid::new_v4().to_string(),
            name: name.trim().to_string(),
            password_hash,
            created_at: Utc::now(),
            last_used: None,
        };
        account.application_passwords.push(record.clone());
        self.save_all(&accounts).await?;

        info!(login = %login, name = %record.name, "Application password created");
        Ok((plain, record))
    }

    async fn revoke_application_password(&self, login: &str, uuid: &str) -> Result<()> {
        let mut accounts = self.list().await?;
        let account = accounts
            .iter_mut()
            .find(|a| a.login.eq_ignore_ascii_case(login))
            .ok_or_else(|| ServiceError::NotFound(format!("account {}", login)))?;
        let before = account.application_passwords.len();
        account.application_passwords.retain(|p| p.uuid != uuid);
        if account.application_passwords.len() == before {
            return Err(ServiceError::NotFound(format!("application password {}", uuid)));
        }
        self.save_all(&accounts).await?;
        info!(login = %login, uuid = %uuid, "Application password revoked");
        Ok(())
    }

    async fn authenticate(&self, login: &str, password: &str) -> Result<Option<Account>> {
        let mut accounts = self.list().await?;
        let Some(index) = accounts
            .iter()
            .position(|a| a.login.eq_ignore_ascii_case(login) && !a.disabled)
        else {
            debug!(login = %login, "Unknown or disabled account");
            return Ok(None);
        };

        let password = normalize_application_password(password);
        let mut matched = None;
        for (i, record) in accounts[index].application_passwords.iter().enumerate() {
            match self.password_service.verify(&password, &record.password_hash).await {
                Ok(true) => {
                    matched = Some(i);
                    break;
                }
                Ok(false) => {}
                Err(e) => warn!(login = %login, uuid = %record.uuid, error = %e, "Unreadable password hash"),
            }
        }
        let Some(matched) = matched else {
            return Ok(None);
        };

        accounts[index].application_passwords[matched].last_used = Some(Utc::now());
        let account = accounts[index].clone();
        if let Err(e) = self.save_all(&accounts).await {
            warn!(login = %login, error = %e, "Failed to record application password use");
        }
        Ok(Some(account))
    }

    async fn ensure_admin(&self, login: &str) -> Result<Option<String>> {
        if !self.list().await?.is_empty() {
            return Ok(None);
        }
        self.create_account(login, login, vec![MANAGE_CAPABILITY.to_string()]).await?;
        let (plain, _) = self.create_application_password(login, "bootstrap").await?;
        Ok(Some(plain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::security::password_service::{DefaultPasswordService, PasswordAlgorithm};
    use inject_infra::MemoryOptionStore;

    fn service() -> DefaultAccountService {
        DefaultAccountService::new(
            Arc::new(MemoryOptionStore::new()),
            Arc::new(DefaultPasswordService::new(PasswordAlgorithm::Bcrypt).with_bcrypt_cost(4)),
        )
    }

    #[tokio::test]
    async fn test_create_and_authenticate() {
        let service = service();
        let account = service
            .create_account("admin", "Site Admin", vec![MANAGE_CAPABILITY.to_string()])
            .await
            .unwrap();
        assert_eq!(account.id, 1);

        let (plain, record) = service.create_application_password("admin", "deploy").await.unwrap();
        assert!(!record.password_hash.contains(&plain));

        let authed = service.authenticate("ADMIN", &plain).await.unwrap().unwrap();
        assert_eq!(authed.login, "admin");
        assert!(authed.application_passwords[0].last_used.is_some());

        let compact = normalize_application_password(&plain);
        assert!(service.authenticate("admin", &compact).await.unwrap().is_some());
        assert!(service.authenticate("admin", "nope").await.unwrap().is_none());
        assert!(service.authenticate("ghost", &plain).await.unwrap().is_none());

        let user = to_authenticated_user(&authed);
        assert_eq!(user.display_name, "Site Admin");
        assert!(user.has_capability(MANAGE_CAPABILITY));
    }

    #[tokio::test]
    async fn test_duplicate_login_conflicts() {
        let service = service();
        service.create_account("admin", "", vec![]).await.unwrap();
        let err = service.create_account("Admin", "", vec![]).await.unwrap_err();
        assert_eq!(err.code(), "conflict");
    }

    #[tokio::test]
    async fn test_revoked_password_stops_working() {
        let service = service();
        service.create_account("admin", "", vec![]).await.unwrap();
        let (plain, record) = service.create_application_password("admin", "ci").await.unwrap();
        service.revoke_application_password("admin", &record.uuid).await.unwrap();
        assert!(service.authenticate("admin", &plain).await.unwrap().is_none());
        assert!(service.revoke_application_password("admin", &record.uuid).await.is_err());
    }

    #[tokio::test]
    async fn test_ensure_admin_only_once() {
        let service = service();
        let plain = service.ensure_admin("admin").await.unwrap().unwrap();
        assert!(service.authenticate("admin", &plain).await.unwrap().is_some());
        assert!(service.ensure_admin("admin").await.unwrap().is_none());
    }
}
