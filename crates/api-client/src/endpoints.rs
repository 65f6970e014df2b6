//! Typed finance API endpoints
//!
//! Thin wrappers that pair a path with its request and response types. All
//! calls go through [`ApiClient`], so they pick up the stored credential and
//! report 401s like any other request.

use serde_json::{json, Value};
use tracing::instrument;

use crate::client::ApiClient;
use crate::http::ApiRequest;
use crate::types::{
    ChatReply, ExpenseEntry, Goal, IncomeEntry, NewGoal, NewTransaction, RegisterRequest,
    RegisterResponse, TokenPair, TokenRequest, Transaction, UserProfile,
};
use crate::Result;

/// Typed access to the finance API
#[derive(Clone)]
pub struct FinanceApi {
    client: ApiClient,
}

impl FinanceApi {
    /// Wrap a configured client
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// The underlying client
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Exchange username and password for a token pair
    #[instrument(skip(self, password))]
    pub async fn obtain_token(&self, username: &str, password: &str) -> Result<TokenPair> {
        self.client.post("token/", &TokenRequest { username, password }).await
    }

    /// Create a new account
    ///
    /// The form is sent as given; check it with [`RegisterRequest::validate`]
    /// first.
    #[instrument(skip_all, fields(username = %request.username))]
    pub async fn register(&self, request: &RegisterRequest) -> Result<RegisterResponse> {
        self.client.post("register/", request).await
    }

    /// Profile of the signed-in user
    pub async fn profile(&self) -> Result<UserProfile> {
        self.client.get("me/").await
    }

    /// All transactions for the signed-in user
    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.client.get("transactions/").await
    }

    /// Record a transaction
    pub async fn create_transaction(&self, transaction: &NewTransaction) -> Result<Transaction> {
        self.client.post("transactions/", transaction).await
    }

    /// All savings goals
    pub async fn goals(&self) -> Result<Vec<Goal>> {
        self.client.get("goals/").await
    }

    /// Create a savings goal
    pub async fn create_goal(&self, goal: &NewGoal) -> Result<Goal> {
        self.client.post("goals/", goal).await
    }

    /// Delete a savings goal
    pub async fn delete_goal(&self, id: i64) -> Result<()> {
        self.client.delete(&format!("goals/{}/", id)).await
    }

    /// Income entries
    pub async fn income(&self) -> Result<Vec<IncomeEntry>> {
        self.client.get("income/").await
    }

    /// Expense entries
    pub async fn expenses(&self) -> Result<Vec<ExpenseEntry>> {
        self.client.get("expenses/").await
    }

    /// Financial health score, passed through as raw JSON
    pub async fn financial_score(&self) -> Result<Value> {
        self.client.get("score/").await
    }

    /// Spending forecast, passed through as raw JSON
    pub async fn forecast(&self) -> Result<Value> {
        self.client.get("forecast-v2/").await
    }

    /// Ask the assistant a question
    #[instrument(skip_all)]
    pub async fn ask_assistant(&self, message: &str) -> Result<ChatReply> {
        let request = ApiRequest::post("chatbot/llm/").json_body(&json!({ "message": message }))?;
        Ok(self.client.send(request).await?.data)
    }
}
