//! Question bank — the ordered list of Excel questions a session walks through.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// A single interview question. `tags` are skill hints passed to the evaluation prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub key: String,
    pub text: String,
    pub tags: Vec<String>,
}

impl Question {
    fn new(key: &str, text: &str, tags: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            text: text.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }
}

/// Ordered, keyed collection of questions.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(questions: Vec<Question>) -> Self {
        Self { questions }
    }

    /// The built-in Excel skills bank, easiest first.
    pub fn default_excel() -> Self {
        Self::new(vec![
            Question::new(
                "vlookup_vs_xlookup",
                "What is the difference between VLOOKUP and XLOOKUP? When would you still use VLOOKUP?",
                &["lookup", "functions"],
            ),
            Question::new(
                "absolute_references",
                "Explain relative, absolute and mixed cell references. Give an example where a mixed reference like $A1 is the right choice.",
                &["references", "formulas"],
            ),
            Question::new(
                "pivot_tables",
                "You have 50,000 rows of sales data with region, product, date and revenue. How would you use a PivotTable to show monthly revenue by region, and how would you keep it current as new rows arrive?",
                &["pivot_tables", "data_analysis"],
            ),
            Question::new(
                "index_match",
                "Write an INDEX/MATCH formula that returns the price of the product named in cell F2 from a table where names are in column A and prices in column C. Why do some analysts prefer INDEX/MATCH over VLOOKUP?",
                &["lookup", "functions"],
            ),
            Question::new(
                "conditional_aggregation",
                "How would you total revenue for the 'West' region in Q1 only? Show the formula and explain how SUMIFS differs from SUMIF.",
                &["aggregation", "functions"],
            ),
            Question::new(
                "data_cleaning",
                "A column of customer names has leading and trailing spaces, inconsistent capitalisation and duplicate rows. Describe how you would clean it, using formulas or Power Query.",
                &["data_cleaning", "power_query"],
            ),
            Question::new(
                "error_handling",
                "A lookup column shows #N/A for missing items. How would you display 'Not found' instead, and what is the risk of wrapping every formula in IFERROR?",
                &["error_handling", "formulas"],
            ),
        ])
    }

    pub fn get(&self, key: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.key == key)
    }

    pub fn all(&self) -> &[Question] {
        &self.questions
    }

    pub fn keys(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.key.clone()).collect()
    }

    /// Resolves the question list for a new session.
    ///
    /// `None` selects the whole bank in bank order. A caller-supplied subset keeps the
    /// caller's order and must be non-empty, known and free of duplicates.
    pub fn select(&self, keys: Option<&[String]>) -> Result<Vec<Question>, AppError> {
        let Some(keys) = keys else {
            return Ok(self.questions.clone());
        };

        if keys.is_empty() {
            return Err(AppError::Validation(
                "questions must name at least one question".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        let mut selected = Vec::with_capacity(keys.len());
        for key in keys {
            if !seen.insert(key.as_str()) {
                return Err(AppError::Validation(format!(
                    "question '{key}' is listed more than once"
                )));
            }
            let question = self
                .get(key)
                .ok_or_else(|| AppError::Validation(format!("unknown question '{key}'")))?;
            selected.push(question.clone());
        }
        Ok(selected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_bank_keys_are_unique() {
        let bank = QuestionBank::default_excel();
        let keys = bank.keys();
        let unique: HashSet<_> = keys.iter().collect();
        assert_eq!(keys.len(), unique.len());
        assert!(!keys.is_empty());
    }

    #[test]
    fn test_every_default_question_has_tags() {
        let bank = QuestionBank::default_excel();
        assert!(bank.all().iter().all(|q| !q.tags.is_empty()));
    }

    #[test]
    fn test_select_none_returns_bank_order() {
        let bank = QuestionBank::default_excel();
        let selected = bank.select(None).unwrap();
        let keys: Vec<_> = selected.into_iter().map(|q| q.key).collect();
        assert_eq!(keys, bank.keys());
    }

    #[test]
    fn test_select_subset_keeps_caller_order() {
        let bank = QuestionBank::default_excel();
        let wanted = vec!["pivot_tables".to_string(), "vlookup_vs_xlookup".to_string()];
        let selected = bank.select(Some(&wanted)).unwrap();
        assert_eq!(selected[0].key, "pivot_tables");
        assert_eq!(selected[1].key, "vlookup_vs_xlookup");
    }

    #[test]
    fn test_select_rejects_unknown_key() {
        let bank = QuestionBank::default_excel();
        let wanted = vec!["macros".to_string()];
        let err = bank.select(Some(&wanted)).unwrap_err();
        assert!(matches!(err, AppError::Validation(msg) if msg.contains("macros")));
    }

    #[test]
    fn test_select_rejects_duplicates() {
        let bank = QuestionBank::default_excel();
        let wanted = vec!["index_match".to_string(), "index_match".to_string()];
        assert!(matches!(
            bank.select(Some(&wanted)),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_select_rejects_empty_subset() {
        let bank = QuestionBank::default_excel();
        assert!(matches!(bank.select(Some(&[])), Err(AppError::Validation(_))));
    }
}
