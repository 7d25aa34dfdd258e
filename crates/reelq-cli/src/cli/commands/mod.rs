//! CLI command handlers, grouped by what they act on.

mod add;
mod control;
mod delete;
mod run;
mod settings;
mod status;
mod worker;

pub use add::{run_add, run_add_list, run_add_series};
pub use control::{run_requeue, run_requeue_series, run_start, run_stop};
pub use delete::{run_delete, run_delete_file, run_delete_series};
pub use run::run_loop;
pub use settings::run_settings;
pub use status::run_status;
pub use worker::run_worker_command;
