pub mod assignment;
pub mod calendar;
pub mod category;
pub mod connection;
pub mod email;
pub mod session;
pub mod task;
pub mod user;

pub use assignment::{
    Assignment, AssignmentMetadata, AssignmentMetadataUpdate, AssignmentStatus, ValidatedMetadata,
};
pub use calendar::{CalendarEvent, CalendarItem, EventCategory, ItemSource};
pub use category::{Category, CreateCategoryRequest};
pub use connection::{ComposioConnection, ConnectedService};
pub use email::{EmailAnalysis, EmailCategory, EmailPriority, EmailSummary, EmailView};
pub use session::Session;
pub use task::{
    CreateTaskRequest, NewTask, Priority, Task, TaskChanges, TaskStatus, UpdateTaskRequest,
};
pub use user::{GithubProfile, Identity, User};
