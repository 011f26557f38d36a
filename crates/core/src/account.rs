use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::Schema;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

/// Identity and format details of one account, as seen by importers.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInfo {
    pub id: AccountId,
    pub provider: String,
    pub name: Option<String>,
    pub locale: String,
    pub currency: String,
    /// Columns every batch of this account carries after import.
    pub schema: Schema,
}

impl AccountInfo {
    pub fn new(id: impl Into<String>, provider: &str, locale: &str, currency: &str) -> Self {
        AccountInfo {
            id: AccountId::new(id),
            provider: provider.to_string(),
            name: None,
            locale: locale.to_string(),
            currency: currency.to_string(),
            schema: Schema::transaction(),
        }
    }

    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_id_display_and_serde_are_bare_strings() {
        let id = AccountId::from("uc-main");
        assert_eq!(id.to_string(), "uc-main");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"uc-main\"");
    }

    #[test]
    fn display_name_falls_back_to_id() {
        let info = AccountInfo::new("pp", "paypal", "it_IT", "EUR");
        assert_eq!(info.display_name(), "pp");
        assert_eq!(info.with_name("PayPal").display_name(), "PayPal");
    }
}
