pub use crate::api::{LoginRequest, StartVerificationRequest, VerificationStarted, VerifyRequest};
pub use crate::filter::TaskFilter;
pub use crate::identity::IssuedToken;
pub use crate::tables::{Subtask, Tag, Task, TaskWithSubtasks, User};
pub use crate::validation::{CreateTaskRequest, RegisterRequest, SubtaskRequest, UpdateTaskRequest};
pub mod auth;
pub mod tasks;
// Re-export the modules
pub use auth::*;
pub use tasks::*;
