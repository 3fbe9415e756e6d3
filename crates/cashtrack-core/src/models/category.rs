use serde::{Deserialize, Serialize};

use super::Draft;
use crate::error::ValidationError;

/// Icon used when the user does not pick one.
pub const DEFAULT_ICON: &str = "📦";

/// Color used when the user does not pick one.
pub const DEFAULT_COLOR: &str = "#3B82F6";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub color: String,
    pub user_id: String,
    #[serde(default)]
    pub created_at: String,
}

impl Category {
    pub fn label(&self) -> String {
        format!("{} {}", self.icon, self.name)
    }

    pub fn to_draft(&self) -> NewCategory {
        NewCategory {
            name: self.name.clone(),
            icon: self.icon.clone(),
            color: self.color.clone(),
            user_id: self.user_id.clone(),
            created_at: self.created_at.clone(),
        }
    }
}

/// Insert form for a category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub icon: String,
    pub color: String,
    pub user_id: String,
    #[serde(default)]
    pub created_at: String,
}

impl NewCategory {
    pub fn new(user_id: &str, name: &str, icon: Option<&str>, color: Option<&str>) -> Self {
        Self {
            name: name.trim().to_string(),
            icon: icon.unwrap_or(DEFAULT_ICON).to_string(),
            color: color.unwrap_or(DEFAULT_COLOR).to_string(),
            user_id: user_id.to_string(),
            created_at: String::new(),
        }
    }
}

impl Draft for NewCategory {
    type Record = Category;

    fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::EmptyName);
        }
        Ok(())
    }

    fn into_record(self, id: String) -> Category {
        Category {
            id,
            name: self.name,
            icon: self.icon,
            color: self.color,
            user_id: self.user_id,
            created_at: self.created_at,
        }
    }
}
