//! Plain-text rendering of lists and reports.

use cashtrack_core::models::{Category, Expense};
use cashtrack_core::stats::Statistics;
use cashtrack_core::sync::DrainReport;
use cashtrack_core::utils::{format_amount, format_date, truncate_string};

const TITLE_WIDTH: usize = 28;
const CATEGORY_WIDTH: usize = 20;

pub fn print_expenses(expenses: &[Expense], limit: Option<usize>) {
    if expenses.is_empty() {
        println!("No expenses yet");
        return;
    }

    let shown = limit.unwrap_or(expenses.len()).min(expenses.len());
    for expense in &expenses[..shown] {
        print_expense_row(expense);
    }
    if shown < expenses.len() {
        println!("... {} more", expenses.len() - shown);
    }

    let total: f64 = expenses.iter().map(|e| e.amount).sum();
    println!("{:>width$}", format!("Total: {}", format_amount(total)), width = 70);
}

pub fn print_pending_expenses(expenses: &[Expense]) {
    println!("Waiting to sync:");
    for expense in expenses {
        print_expense_row(expense);
    }
}

fn print_expense_row(expense: &Expense) {
    println!(
        "{:<10}  {:<title$}  {:<cat$}  {:>16}",
        format_date(&expense.date),
        truncate_string(&expense.title, TITLE_WIDTH),
        truncate_string(expense.category_name(), CATEGORY_WIDTH),
        format_amount(expense.amount),
        title = TITLE_WIDTH,
        cat = CATEGORY_WIDTH,
    );
}

pub fn print_categories(categories: &[Category]) {
    if categories.is_empty() {
        println!("No categories yet");
        return;
    }
    for category in categories {
        println!("{:<30}  {}  {}", category.label(), category.color, category.id);
    }
}

pub fn print_pending_categories(categories: &[Category]) {
    println!("Categories waiting to sync:");
    for category in categories {
        println!("{:<30}  {}", category.label(), category.color);
    }
}

pub fn print_stats(stats: &Statistics) {
    if stats.by_category.is_empty() {
        println!("No expenses to summarise");
        return;
    }
    for entry in &stats.by_category {
        println!(
            "{:<30}  {:>16}  {:>5.1}%",
            truncate_string(&entry.category.label(), 30),
            format_amount(entry.total),
            entry.percentage
        );
    }
    println!("{:<30}  {:>16}", "Total", format_amount(stats.total));
}

pub fn print_drain(report: &DrainReport) {
    if report.sent() == 0 && report.kept() == 0 && report.rejected() == 0 {
        println!("Nothing pending");
        return;
    }
    println!(
        "Sent {} categor{} and {} expense(s)",
        report.sent_categories,
        if report.sent_categories == 1 { "y" } else { "ies" },
        report.sent_expenses
    );
    if report.kept() > 0 {
        println!("{} change(s) still waiting", report.kept());
    }
    for category in &report.rejected_categories {
        println!("Rejected by the server, discarded: category {}", category.name);
    }
    for expense in &report.rejected_expenses {
        println!(
            "Rejected by the server, discarded: {} {}",
            truncate_string(&expense.title, TITLE_WIDTH),
            format_amount(expense.amount)
        );
    }
}
