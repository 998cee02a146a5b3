mod allocate;
mod history;
mod run;
mod validate;

pub(crate) use allocate::cmd_allocate;
pub(crate) use history::cmd_history;
pub(crate) use run::{cmd_run, RunOptions};
pub(crate) use validate::cmd_validate;
