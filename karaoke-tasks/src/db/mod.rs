//! Database access for karaoke-tasks
//!
//! Free functions over a `SqlitePool`. Every statement binds its values;
//! no caller-supplied string is ever formatted into SQL text.

pub mod lyrics;
pub mod tasks;
pub mod tracks;
