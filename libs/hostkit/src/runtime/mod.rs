mod runner;

pub use runner::{
    bootstrap, resolve_manifest, resolve_plan, run, ResolvedPlan, RunOptions, ShutdownOptions,
};
