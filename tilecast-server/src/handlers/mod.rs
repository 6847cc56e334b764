pub mod work;

pub use work::{poll_job_handler, submit_result_handler, trigger_work_handler};
