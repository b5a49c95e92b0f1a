// Wire models

mod todo;

pub use todo::{CreateTodoRequest, SetTodoStatusRequest, Todo, TodoStatus};
