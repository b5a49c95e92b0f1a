// To-do wire models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single to-do item as returned by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub date: NaiveDate,
    pub status: TodoStatus,
}

/// Completion state of a to-do item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TodoStatus {
    #[serde(rename = "TODO")]
    Todo,
    #[serde(rename = "DONE")]
    Done,
}

impl TodoStatus {
    pub fn is_done(self) -> bool {
        matches!(self, TodoStatus::Done)
    }
}

/// Create-todo request
#[derive(Debug, Clone, Serialize)]
pub struct CreateTodoRequest {
    pub title: String,
    pub date: NaiveDate,
}

/// Set-status request for `POST /todo/{id}/status`
#[derive(Debug, Clone, Serialize)]
pub struct SetTodoStatusRequest {
    pub done: bool,
}
