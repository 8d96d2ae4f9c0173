mod lockfile;

use std::sync::Arc;

use affected_pkgs_core::{LockfileDefinition, LockfileFormat, LockfileParser, ParserOptions};
pub use lockfile::NpmLockfileParser;

pub fn lockfile_definition() -> LockfileDefinition {
    LockfileDefinition {
        format: LockfileFormat::PackageLock,
        create_parser,
    }
}

fn create_parser(options: &ParserOptions) -> Arc<dyn LockfileParser> {
    Arc::new(NpmLockfileParser::with_options(*options))
}
