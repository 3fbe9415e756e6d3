use serde::{Deserialize, Serialize};

use super::{Category, Draft};
use crate::error::ValidationError;

/// A single spending record.
///
/// `category` is only present when the remote query joined the categories
/// table. Amounts are in rubles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub title: String,
    pub amount: f64,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    pub date: String,
    pub user_id: String,
    #[serde(default)]
    pub created_at: String,
}

impl Expense {
    /// Name of the joined category, or the placeholder used for uncategorized spending.
    pub fn category_name(&self) -> &str {
        self.category
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or(crate::stats::UNCATEGORIZED_NAME)
    }

    /// Insert form for a queued record, dropping its temporary id.
    pub fn to_draft(&self) -> NewExpense {
        NewExpense {
            title: self.title.clone(),
            amount: self.amount,
            category_id: self.category_id.clone(),
            date: self.date.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Insert form for an expense (the record without its identifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExpense {
    pub title: String,
    pub amount: f64,
    pub category_id: Option<String>,
    pub date: String,
    pub user_id: String,
    #[serde(default)]
    pub created_at: String,
}

impl NewExpense {
    /// Build a form with the title trimmed and `created_at` left for the remote.
    pub fn new(
        user_id: &str,
        title: &str,
        amount: f64,
        category_id: Option<String>,
        date: &str,
    ) -> Self {
        Self {
            title: title.trim().to_string(),
            amount,
            category_id: category_id.filter(|id| !id.is_empty()),
            date: date.to_string(),
            user_id: user_id.to_string(),
            created_at: String::new(),
        }
    }
}

impl Draft for NewExpense {
    type Record = Expense;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err(ValidationError::NonPositiveAmount);
        }
        Ok(())
    }

    fn into_record(self, id: String) -> Expense {
        Expense {
            id,
            title: self.title,
            amount: self.amount,
            category_id: self.category_id,
            category: None,
            date: self.date,
            user_id: self.user_id,
            created_at: self.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_blank_title() {
        let form = NewExpense::new("u1", "   ", 100.0, None, "2024-01-01");
        assert_eq!(form.validate(), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        let zero = NewExpense::new("u1", "Lunch", 0.0, None, "2024-01-01");
        assert_eq!(zero.validate(), Err(ValidationError::NonPositiveAmount));

        let negative = NewExpense::new("u1", "Lunch", -5.0, None, "2024-01-01");
        assert_eq!(negative.validate(), Err(ValidationError::NonPositiveAmount));

        let nan = NewExpense::new("u1", "Lunch", f64::NAN, None, "2024-01-01");
        assert_eq!(nan.validate(), Err(ValidationError::NonPositiveAmount));
    }

    #[test]
    fn test_new_trims_title_and_drops_empty_category() {
        let form = NewExpense::new("u1", "  Lunch ", 500.0, Some(String::new()), "2024-01-01");
        assert_eq!(form.title, "Lunch");
        assert_eq!(form.category_id, None);
        assert!(form.validate().is_ok());
    }

    #[test]
    fn test_deserialize_joined_row() {
        let json = r##"{
            "id": "e1",
            "title": "Lunch",
            "amount": 500,
            "category_id": "c1",
            "category": {"id": "c1", "name": "Food", "icon": "🍔", "color": "#F59E0B",
                         "user_id": "u1", "created_at": "2024-01-01T00:00:00Z"},
            "date": "2024-01-01",
            "user_id": "u1",
            "created_at": "2024-01-01T10:00:00Z"
        }"##;
        let expense: Expense = serde_json::from_str(json).unwrap();
        assert_eq!(expense.amount, 500.0);
        assert_eq!(expense.category_name(), "Food");
    }

    #[test]
    fn test_category_name_placeholder() {
        let expense = NewExpense::new("u1", "Taxi", 300.0, None, "2024-01-01")
            .into_record("e2".to_string());
        assert_eq!(expense.category_name(), crate::stats::UNCATEGORIZED_NAME);
    }
}
