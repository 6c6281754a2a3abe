use serde::{Deserialize, Serialize};

use super::{present, require, Record};
use crate::core::data::Table;

/// A must-do task for a tower, ticked off when complete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NonNegotiable {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub tower: String,
    #[serde(default)]
    pub task: String,
    #[serde(default)]
    pub completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CriticalIssue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default)]
    pub description: String,
    pub category: Option<String>,
}

impl Record for NonNegotiable {
    const TABLE: Table = Table::NonNegotiables;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[("tower", present(&self.tower)), ("task", present(&self.task))])
    }

    fn normalize(&mut self) {
        self.tower = self.tower.trim().to_string();
    }
}

impl Record for CriticalIssue {
    const TABLE: Table = Table::CriticalIssues;

    fn id(&self) -> Option<i64> {
        self.id
    }

    fn validate(&self) -> Result<(), String> {
        require(&[("description", present(&self.description))])
    }

    fn normalize(&mut self) {
        self.category = self.category.take().filter(|c| present(c));
    }
}
