mod admission_flow;
mod change_watch;
mod common;
