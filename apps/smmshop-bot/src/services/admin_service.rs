use crate::api_client::ApiClient;
use anyhow::Result;
use smmshop_shared::api::{AdminCheckRequest, AdminCheckResponse, AdminCreditRequest, BalanceChange};

#[derive(Clone)]
pub struct AdminService {
    api: ApiClient,
}

impl AdminService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn is_admin(&self, tg_id: i64) -> bool {
        match self
            .api
            .post::<AdminCheckResponse, _>("/admin/check", &AdminCheckRequest { telegram_id: tg_id })
            .await
        {
            Ok(resp) => resp.is_admin,
            Err(e) => {
                tracing::warn!("Admin check for {} failed: {}", tg_id, e);
                false
            }
        }
    }

    /// Credits `amount` cents to a user's main balance. The panel re-checks
    /// the admin flag of `admin_tg_id`.
    pub async fn credit(&self, admin_tg_id: i64, target_tg_id: i64, amount: i64) -> Result<BalanceChange> {
        self.api
            .post(
                "/admin/credit",
                &AdminCreditRequest {
                    admin_telegram_id: admin_tg_id,
                    target_telegram_id: target_tg_id,
                    amount,
                },
            )
            .await
    }
}
