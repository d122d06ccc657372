pub mod bench_cmd;
pub mod build_cmd;
pub mod export_cmd;
pub mod inspect_cmd;
pub mod search_cmd;
pub mod validate_cmd;

pub use bench_cmd::cmd_bench;
pub use build_cmd::cmd_build;
pub use export_cmd::cmd_export;
pub use inspect_cmd::cmd_inspect;
pub use search_cmd::cmd_search;
pub use validate_cmd::cmd_validate;
