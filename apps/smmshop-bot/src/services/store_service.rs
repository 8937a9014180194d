use crate::api_client::ApiClient;
use anyhow::Result;
use smmshop_shared::WithdrawalKind;
use smmshop_shared::api::{
    CategoryPage, CategoryView, OrderView, PaymentMethodView, PlaceOrderRequest, PlaceOrderResponse, Quote,
    QuoteRequest, ReferralSummary, RegisterUserRequest, RegisterUserResponse, ServiceView, UserView,
    WithdrawalRequest, WithdrawalView,
};

/// Shop operations the bot performs on behalf of a Telegram user.
#[derive(Clone)]
pub struct StoreService {
    api: ApiClient,
}

impl StoreService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn register_user(
        &self,
        tg_id: i64,
        username: Option<&str>,
        full_name: Option<&str>,
        start_payload: Option<&str>,
    ) -> Result<RegisterUserResponse> {
        self.api
            .post(
                "/users/register",
                &RegisterUserRequest {
                    telegram_id: tg_id,
                    username: username.map(str::to_string),
                    full_name: full_name.map(str::to_string),
                    start_payload: start_payload.map(str::to_string),
                },
            )
            .await
    }

    pub async fn get_user(&self, tg_id: i64) -> Result<UserView> {
        self.api.get(&format!("/users/{}", tg_id)).await
    }

    pub async fn user_orders(&self, tg_id: i64, limit: i64) -> Result<Vec<OrderView>> {
        self.api.get(&format!("/users/{}/orders?limit={}", tg_id, limit)).await
    }

    pub async fn referral_summary(&self, tg_id: i64) -> Result<ReferralSummary> {
        self.api.get(&format!("/users/{}/referral", tg_id)).await
    }

    pub async fn root_categories(&self) -> Result<Vec<CategoryView>> {
        self.api.get("/categories").await
    }

    pub async fn category_page(&self, id: i64) -> Result<CategoryPage> {
        self.api.get(&format!("/categories/{}", id)).await
    }

    pub async fn get_service(&self, id: i64) -> Result<ServiceView> {
        self.api.get(&format!("/services/{}", id)).await
    }

    pub async fn quote(&self, tg_id: i64, service_id: i64, quantity: i64) -> Result<Quote> {
        self.api
            .post(
                "/orders/quote",
                &QuoteRequest {
                    telegram_id: tg_id,
                    service_id,
                    quantity,
                },
            )
            .await
    }

    pub async fn place_order(&self, req: &PlaceOrderRequest) -> Result<PlaceOrderResponse> {
        self.api.post("/orders", req).await
    }

    pub async fn request_withdrawal(
        &self,
        tg_id: i64,
        amount: i64,
        kind: WithdrawalKind,
        payment_info: &str,
    ) -> Result<WithdrawalView> {
        self.api
            .post(
                "/withdrawals",
                &WithdrawalRequest {
                    telegram_id: tg_id,
                    amount,
                    kind,
                    payment_info: payment_info.to_string(),
                },
            )
            .await
    }

    pub async fn payment_methods(&self) -> Result<Vec<PaymentMethodView>> {
        self.api.get("/payment-methods").await
    }
}
