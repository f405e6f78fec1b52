//! Domain - ドメインモデル（ids, task, board, errors, events）

pub mod board;
pub mod errors;
pub mod events;
pub mod ids;
pub mod task;

pub use self::board::{BoardSnapshot, BoardStats, sort_for_display, visible_tasks};
pub use self::errors::{BackendError, ErrorKind, OfftasksError};
pub use self::events::ChangeEvent;
pub use self::ids::{TaskId, UserId};
pub use self::task::{DATE_FORMAT, NewTask, Priority, Task, TaskGroup, TaskPatch, format_date};
