//! Spending totals per category.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::models::{Category, Expense};

/// Grouping key for expenses without a category.
pub const UNCATEGORIZED_ID: &str = "no-category";
pub const UNCATEGORIZED_NAME: &str = "Без категории";
pub const UNCATEGORIZED_ICON: &str = "❓";
pub const UNCATEGORIZED_COLOR: &str = "#9CA3AF";

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryStats {
    pub category: Category,
    pub total: f64,
    /// Share of the grand total, 0..=100
    pub percentage: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statistics {
    pub total: f64,
    pub by_category: Vec<CategoryStats>,
}

fn uncategorized(user_id: &str) -> Category {
    Category {
        id: UNCATEGORIZED_ID.to_string(),
        name: UNCATEGORIZED_NAME.to_string(),
        icon: UNCATEGORIZED_ICON.to_string(),
        color: UNCATEGORIZED_COLOR.to_string(),
        user_id: user_id.to_string(),
        created_at: String::new(),
    }
}

/// Sum expenses per category, largest total first.
///
/// Expenses are grouped by `category_id`; the joined category (or the
/// uncategorized placeholder) of the first expense in a group labels it.
pub fn category_totals(expenses: &[Expense], user_id: &str) -> Statistics {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<CategoryStats> = Vec::new();
    let mut total = 0.0;

    for expense in expenses {
        let key = expense
            .category_id
            .clone()
            .unwrap_or_else(|| UNCATEGORIZED_ID.to_string());

        let slot = *index.entry(key).or_insert_with(|| {
            let category = expense
                .category
                .clone()
                .unwrap_or_else(|| uncategorized(user_id));
            groups.push(CategoryStats {
                category,
                total: 0.0,
                percentage: 0.0,
            });
            groups.len() - 1
        });

        groups[slot].total += expense.amount;
        total += expense.amount;
    }

    for group in &mut groups {
        group.percentage = if total > 0.0 { group.total / total * 100.0 } else { 0.0 };
    }

    // Stable sort keeps first-seen order among equal totals
    groups.sort_by(|a, b| b.total.partial_cmp(&a.total).unwrap_or(Ordering::Equal));

    Statistics {
        total,
        by_category: groups,
    }
}
