mod lockfile;

use std::sync::Arc;

use affected_pkgs_core::{LockfileDefinition, LockfileFormat, LockfileParser, ParserOptions};
pub use lockfile::YarnLockfileParser;

pub fn lockfile_definition() -> LockfileDefinition {
    LockfileDefinition {
        format: LockfileFormat::YarnLock,
        create_parser,
    }
}

fn create_parser(_options: &ParserOptions) -> Arc<dyn LockfileParser> {
    Arc::new(YarnLockfileParser::new())
}
