//! External integrations
//!
//! GitHub is called directly for login. Google Calendar, Canvas and Gmail go
//! through a Composio [`ToolBroker`](crate::composio::ToolBroker).

pub mod calendar;
pub mod canvas;
pub mod github;
pub mod gmail;
