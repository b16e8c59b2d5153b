//! UseCase: ログインとワンタイムトークン発行
//!
//! ユーザー名とパスワードを照合し、成功した場合に WebSocket 接続用の
//! ワンタイムトークンを発行します。

use std::{collections::HashMap, sync::Arc};

use crate::{domain::OneTimeToken, infrastructure::credential::CredentialStore};

use super::error::LoginError;

/// ログインのユースケース
pub struct LoginUseCase {
    /// username -> password
    users: Arc<HashMap<String, String>>,
    credentials: Arc<CredentialStore>,
}

impl LoginUseCase {
    pub fn new(users: Arc<HashMap<String, String>>, credentials: Arc<CredentialStore>) -> Self {
        Self { users, credentials }
    }

    /// ログインを実行
    ///
    /// # Returns
    ///
    /// * `Ok(OneTimeToken)` - 認証成功。トークンは 1 回だけ使用できる
    /// * `Err(LoginError)` - 認証失敗
    pub async fn execute(&self, username: &str, password: &str) -> Result<OneTimeToken, LoginError> {
        match self.users.get(username) {
            Some(expected) if expected == password => {
                let token = self.credentials.issue().await;
                tracing::info!(username = %username, "Login succeeded");
                Ok(token)
            }
            _ => {
                tracing::warn!(username = %username, "Login rejected");
                Err(LoginError::InvalidCredentials)
            }
        }
    }
}
