//! Dispatcher core logic: task enumeration, retry, pooling and response handling

pub mod cleaning;
pub mod coordinator;
pub mod paths;
pub mod pool;
pub mod prompt;
pub mod retry;
pub mod task_set;

pub use cleaning::{clean_functions_response, clean_probability_response, EXPECTED_FUNCTIONS};
pub use coordinator::RunCoordinator;
pub use paths::{ResultPaths, DEFAULT_RESULTS_DIR};
pub use pool::WorkerPool;
pub use prompt::{TemplatePromptSource, DEFAULT_TEMPLATE_NAME};
pub use retry::RetryPolicy;
pub use task_set::TaskSet;
