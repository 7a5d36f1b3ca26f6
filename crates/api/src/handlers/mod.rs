pub mod baseline;
pub mod commits;
pub mod compare;
pub mod eval_runs;
pub mod generate;
pub mod history;
pub mod projects;
