//! Wire types for the finance API
//!
//! These mirror the JSON the server sends and accepts. Decimal amounts
//! arrive as strings (e.g. `"1500.00"`) and are kept that way; the client
//! does no arithmetic on them.

use serde::{Deserialize, Serialize};

/// Token pair returned by `token/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPair {
    /// Short-lived bearer token sent on every request
    pub access: String,
    /// Refresh token (not used by this client, kept for completeness)
    #[serde(default)]
    pub refresh: Option<String>,
}

/// Credentials posted to `token/`
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    /// Account username
    pub username: &'a str,
    /// Account password
    pub password: &'a str,
}

/// Signed-in user as returned by `me/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserProfile {
    /// Server-side user id
    pub id: i64,
    /// Display identity
    pub username: String,
}

/// Registration form posted to `register/`
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RegisterRequest {
    /// Desired username
    pub username: String,
    /// Contact email
    pub email: String,
    /// Password
    pub password: String,
    /// Password typed a second time
    pub confirm_password: String,
    /// Optional first name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub first_name: String,
    /// Optional last name
    #[serde(skip_serializing_if = "String::is_empty")]
    pub last_name: String,
}

/// Reasons a registration form is rejected before it is sent
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterValidationError {
    /// A required field is blank
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Password and confirmation differ
    #[error("Passwords do not match")]
    PasswordMismatch,
}

impl RegisterRequest {
    /// Check required fields and the password confirmation
    pub fn validate(&self) -> Result<(), RegisterValidationError> {
        let required = [
            ("username", &self.username),
            ("email", &self.email),
            ("password", &self.password),
            ("confirm_password", &self.confirm_password),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(RegisterValidationError::MissingField(name));
            }
        }
        if self.password != self.confirm_password {
            return Err(RegisterValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

/// Response from `register/`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct RegisterResponse {
    /// Confirmation message
    #[serde(default)]
    pub message: Option<String>,
}

/// Direction of a transaction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionCategory {
    /// Money in
    Income,
    /// Money out
    Expense,
}

/// A recorded transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Server id
    pub id: i64,
    /// Income or expense
    pub category: TransactionCategory,
    /// Amount
    pub amount: f64,
    /// Free-text description
    #[serde(default)]
    pub description: String,
    /// ISO date the transaction was recorded
    #[serde(default)]
    pub date: Option<String>,
}

/// Body for creating a transaction
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewTransaction {
    /// Income or expense
    pub category: TransactionCategory,
    /// Amount
    pub amount: f64,
    /// Free-text description
    pub description: String,
}

/// A savings goal
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Goal {
    /// Server id
    pub id: i64,
    /// Goal title
    pub title: String,
    /// Target amount as a decimal string
    pub target_amount: String,
    /// ISO deadline date
    pub deadline: String,
    /// Optional note
    #[serde(default)]
    pub note: Option<String>,
}

/// Body for creating a goal
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NewGoal {
    /// Goal title
    pub title: String,
    /// Target amount as a decimal string
    pub target_amount: String,
    /// ISO deadline date
    pub deadline: String,
    /// Optional note
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// An income entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncomeEntry {
    /// Server id
    pub id: i64,
    /// Amount as a decimal string
    pub amount: String,
    /// Where the money came from
    pub source: String,
    /// ISO date
    pub date: String,
}

/// An expense entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpenseEntry {
    /// Server id
    pub id: i64,
    /// Amount as a decimal string
    pub amount: String,
    /// Spending category
    pub category: String,
    /// ISO date
    pub date: String,
    /// Optional note
    #[serde(default)]
    pub note: Option<String>,
}

/// Assistant reply from `chatbot/llm/`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatReply {
    /// The question as stored by the server
    pub message: String,
    /// The assistant's answer
    pub reply: String,
    /// Which backend produced the answer
    #[serde(default)]
    pub source: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> RegisterRequest {
        RegisterRequest {
            username: "alice".into(),
            email: "alice@example.com".into(),
            password: "hunter22".into(),
            confirm_password: "hunter22".into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_register_validation_accepts_complete_form() {
        assert_eq!(form().validate(), Ok(()));
    }

    #[test]
    fn test_register_validation_missing_field() {
        let request = RegisterRequest { email: "  ".into(), ..form() };
        assert_eq!(request.validate(), Err(RegisterValidationError::MissingField("email")));
    }

    #[test]
    fn test_register_validation_password_mismatch() {
        let request = RegisterRequest { confirm_password: "hunter23".into(), ..form() };
        assert_eq!(request.validate(), Err(RegisterValidationError::PasswordMismatch));
    }

    #[test]
    fn test_register_request_omits_blank_names() {
        let json = serde_json::to_value(form()).unwrap();
        assert!(json.get("first_name").is_none());
        assert_eq!(json["confirm_password"], "hunter22");
    }

    #[test]
    fn test_token_pair_without_refresh() {
        let pair: TokenPair = serde_json::from_str(r#"{"access":"abc"}"#).unwrap();
        assert_eq!(pair.access, "abc");
        assert!(pair.refresh.is_none());
    }

    #[test]
    fn test_transaction_category_wire_format() {
        let tx: Transaction = serde_json::from_str(
            r#"{"id":1,"category":"expense","amount":45.5,"description":"Lunch","date":"2024-11-02"}"#,
        )
        .unwrap();
        assert_eq!(tx.category, TransactionCategory::Expense);

        let body = serde_json::to_value(NewTransaction {
            category: TransactionCategory::Income,
            amount: 500.0,
            description: "Salary".into(),
        })
        .unwrap();
        assert_eq!(body["category"], "income");
    }
}
