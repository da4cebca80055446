//! Constraint extraction from retrieved text.
//!
//! Scans chunks in retrieval order for date ranges, a category mention, and
//! KPI definitions. First valid match wins for each constraint. A category
//! is never constrained when the question asks about the category dimension
//! itself; doing so would make the generated query answer its own question.

use once_cell::sync::Lazy;
use regex::Regex;

use super::types::Constraints;
use crate::retrieval::RetrievedChunk;

/// Fixed catalog of product categories recognized in document text
const CATEGORIES: &[&str] = &[
    "Beverages",
    "Condiments",
    "Confections",
    "Dairy Products",
    "Grains/Cereals",
    "Meat/Poultry",
    "Produce",
    "Seafood",
];

/// Phrasings that mean the question is asking ABOUT categories
const CATEGORY_QUESTION_PHRASES: &[&str] = &[
    "which category",
    "which product category",
    "what category",
    "top category",
    "highest category",
    "best category",
];

const AOV_FORMULA: &str = "SUM(UnitPrice * Quantity * (1 - Discount)) / COUNT(DISTINCT OrderID)";
const MARGIN_COST_APPROXIMATION: f64 = 0.7;

static DATE_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})\s+to\s+(\d{4}-\d{2}-\d{2})").unwrap());

/// Derive structured filters from the question and retrieved chunks
pub fn extract(question: &str, chunks: &[RetrievedChunk]) -> Constraints {
    let mut constraints = Constraints::default();
    let q_lower = question.to_lowercase();

    let asking_about_category = CATEGORY_QUESTION_PHRASES
        .iter()
        .any(|phrase| q_lower.contains(phrase));
    let wants_aov = q_lower.contains("aov") || q_lower.contains("average order value");
    let wants_margin = q_lower.contains("margin");

    for chunk in chunks {
        let content = &chunk.content;

        if constraints.date_range.is_none() {
            constraints.date_range = DATE_RANGE
                .captures_iter(content)
                .map(|caps| (caps[1].to_string(), caps[2].to_string()))
                .find(|(start, end)| valid_date(start) && valid_date(end));
        }

        if !asking_about_category && constraints.category.is_none() {
            constraints.category = CATEGORIES
                .iter()
                .find(|category| content.contains(**category))
                .map(|category| category.to_string());
        }

        if wants_aov && constraints.kpi_type.is_none() && content.contains("AOV") {
            constraints.kpi_type = Some("AOV".to_string());
            constraints.kpi_formula = Some(AOV_FORMULA.to_string());
        }

        if wants_margin
            && constraints.kpi_type.is_none()
            && (content.contains("Gross Margin") || content.to_lowercase().contains("margin"))
        {
            constraints.kpi_type = Some("gross_margin".to_string());
            constraints.cost_approximation = Some(MARGIN_COST_APPROXIMATION);
        }
    }

    constraints
}

fn valid_date(s: &str) -> bool {
    chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}
