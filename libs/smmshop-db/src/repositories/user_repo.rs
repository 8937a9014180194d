use anyhow::{Context, Result};
use chrono::Utc;
use smmshop_shared::WithdrawalKind;
use sqlx::{Executor, Sqlite, SqlitePool};

use crate::models::user::User;

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

/// Values needed to insert a first-time user.
#[derive(Debug, Clone)]
pub struct NewUser<'a> {
    pub telegram_id: i64,
    pub username: Option<&'a str>,
    pub full_name: Option<&'a str>,
    pub referral_code: &'a str,
    pub is_admin: bool,
    pub referrer_id: Option<i64>,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get_by_tg_id(&self, telegram_id: i64) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE telegram_id = ?")
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by telegram id")
    }

    pub async fn get_by_referral_code(&self, code: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE referral_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user by referral code")
    }

    pub async fn get_all(&self) -> Result<Vec<User>> {
        sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY id DESC")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch all users")
    }

    /// Substring search over telegram id, username, full name and referral code.
    pub async fn search(&self, query: &str) -> Result<Vec<User>> {
        let escaped = query
            .trim()
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let pattern = format!("%{}%", escaped);

        sqlx::query_as::<_, User>(
            "SELECT * FROM users
             WHERE CAST(telegram_id AS TEXT) LIKE ?1 ESCAPE '\\'
                OR username LIKE ?1 ESCAPE '\\'
                OR full_name LIKE ?1 ESCAPE '\\'
                OR referral_code LIKE ?1 ESCAPE '\\'
             ORDER BY id DESC",
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search users")
    }

    pub async fn update_profile(
        &self,
        telegram_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
    ) -> Result<Option<User>> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET username = ?, full_name = ? WHERE telegram_id = ? RETURNING *",
        )
        .bind(username)
        .bind(full_name)
        .bind(telegram_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update user profile")
    }

    /// Inserts a user unless the telegram id already exists. Returns `None`
    /// when another request registered the same id first. A referral code
    /// collision surfaces as a UNIQUE error for the caller to retry.
    pub async fn insert<'e, E>(executor: E, new_user: &NewUser<'_>) -> Result<Option<User>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (telegram_id, username, full_name, referral_code, is_admin, referrer_id, registered_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(telegram_id) DO NOTHING
             RETURNING *",
        )
        .bind(new_user.telegram_id)
        .bind(new_user.username)
        .bind(new_user.full_name)
        .bind(new_user.referral_code)
        .bind(new_user.is_admin)
        .bind(new_user.referrer_id)
        .bind(Utc::now())
        .fetch_optional(executor)
        .await
        .context("Failed to insert user")
    }

    /// Counts a new referral and credits the bonus. Returns the referrer's new
    /// referral balance.
    pub async fn reward_referrer<'e, E>(executor: E, referrer_tg_id: i64, bonus: i64) -> Result<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_scalar(
            "UPDATE users
             SET referred_users_count = referred_users_count + 1,
                 referral_balance = referral_balance + ?
             WHERE telegram_id = ?
             RETURNING referral_balance",
        )
        .bind(bonus.max(0))
        .bind(referrer_tg_id)
        .fetch_optional(executor)
        .await
        .context("Failed to reward referrer")
    }

    pub async fn set_admin(&self, telegram_id: i64, is_admin: bool) -> Result<bool> {
        let res = sqlx::query("UPDATE users SET is_admin = ? WHERE telegram_id = ?")
            .bind(is_admin)
            .bind(telegram_id)
            .execute(&self.pool)
            .await
            .context("Failed to update admin flag")?;
        Ok(res.rows_affected() > 0)
    }

    pub async fn set_balance(&self, telegram_id: i64, kind: WithdrawalKind, cents: i64) -> Result<Option<User>> {
        let sql = format!(
            "UPDATE users SET {} = ? WHERE telegram_id = ? RETURNING *",
            kind.balance_column()
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(cents)
            .bind(telegram_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to set balance")
    }

    /// Adds `amount` to the chosen balance and returns the new value.
    pub async fn credit<'e, E>(executor: E, telegram_id: i64, kind: WithdrawalKind, amount: i64) -> Result<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let column = kind.balance_column();
        let sql = format!(
            "UPDATE users SET {col} = {col} + ? WHERE telegram_id = ? RETURNING {col}",
            col = column
        );
        sqlx::query_scalar(&sql)
            .bind(amount)
            .bind(telegram_id)
            .fetch_optional(executor)
            .await
            .context("Failed to credit balance")
    }

    /// Guarded debit: only succeeds when the balance covers `amount`.
    /// `None` means nothing was changed, either the user is unknown or the
    /// funds are insufficient.
    pub async fn debit<'e, E>(executor: E, telegram_id: i64, kind: WithdrawalKind, amount: i64) -> Result<Option<i64>>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let column = kind.balance_column();
        let sql = format!(
            "UPDATE users SET {col} = {col} - ?1 WHERE telegram_id = ?2 AND {col} >= ?1 RETURNING {col}",
            col = column
        );
        sqlx::query_scalar(&sql)
            .bind(amount)
            .bind(telegram_id)
            .fetch_optional(executor)
            .await
            .context("Failed to debit balance")
    }

    pub async fn admin_ids(&self) -> Result<Vec<i64>> {
        sqlx::query_scalar("SELECT telegram_id FROM users WHERE is_admin = 1")
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch admin ids")
    }

    pub async fn count(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count users")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;

    async fn seed(pool: &SqlitePool, tg: i64, code: &str) -> User {
        UserRepository::insert(
            pool,
            &NewUser {
                telegram_id: tg,
                username: Some("alice"),
                full_name: Some("Alice Doe"),
                referral_code: code,
                is_admin: false,
                referrer_id: None,
            },
        )
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn debit_never_goes_negative() {
        let pool = init_memory_db().await.unwrap();
        seed(&pool, 100, "AAAA1111").await;

        let after = UserRepository::credit(&pool, 100, WithdrawalKind::Main, 500).await.unwrap();
        assert_eq!(after, Some(500));

        let ok = UserRepository::debit(&pool, 100, WithdrawalKind::Main, 300).await.unwrap();
        assert_eq!(ok, Some(200));

        let refused = UserRepository::debit(&pool, 100, WithdrawalKind::Main, 300).await.unwrap();
        assert_eq!(refused, None);

        let repo = UserRepository::new(pool);
        assert_eq!(repo.get_by_tg_id(100).await.unwrap().unwrap().balance, 200);
    }

    #[tokio::test]
    async fn duplicate_telegram_id_is_ignored() {
        let pool = init_memory_db().await.unwrap();
        seed(&pool, 7, "BBBB2222").await;
        let again = UserRepository::insert(
            &pool,
            &NewUser {
                telegram_id: 7,
                username: None,
                full_name: None,
                referral_code: "CCCC3333",
                is_admin: false,
                referrer_id: None,
            },
        )
        .await
        .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn duplicate_referral_code_is_a_unique_violation() {
        let pool = init_memory_db().await.unwrap();
        seed(&pool, 1, "DDDD4444").await;
        let err = UserRepository::insert(
            &pool,
            &NewUser {
                telegram_id: 2,
                username: None,
                full_name: None,
                referral_code: "DDDD4444",
                is_admin: false,
                referrer_id: None,
            },
        )
        .await
        .unwrap_err();
        assert!(crate::utils::anyhow_is_unique_violation(&err, Some("referral_code")));
    }

    #[tokio::test]
    async fn search_matches_any_field() {
        let pool = init_memory_db().await.unwrap();
        seed(&pool, 555001, "EEEE5555").await;
        let repo = UserRepository::new(pool);

        assert_eq!(repo.search("5550").await.unwrap().len(), 1);
        assert_eq!(repo.search("ALI").await.unwrap().len(), 1);
        assert_eq!(repo.search("eeee5").await.unwrap().len(), 1);
        assert!(repo.search("zzz").await.unwrap().is_empty());
        assert!(repo.search("%").await.unwrap().is_empty());
    }
}
