//! Lockfile parser catalog and file-name dispatch.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub use affected_pkgs_core::{
    LockfileDefinition, LockfileError, LockfileFormat, LockfileParser, ParsedLockfile,
    ParserOptions,
};

/// Runtime parser catalog built from app-registered definitions.
#[derive(Clone)]
pub struct LockfileCatalog {
    parsers_by_format: HashMap<LockfileFormat, Arc<dyn LockfileParser>>,
    file_names: Vec<&'static str>,
}

impl LockfileCatalog {
    /// Builds a catalog from explicit definitions, in registration order.
    pub fn from_definitions(definitions: &[LockfileDefinition], options: ParserOptions) -> Self {
        let mut parsers_by_format = HashMap::new();
        let mut file_names = Vec::with_capacity(definitions.len());
        for def in definitions {
            if parsers_by_format
                .insert(def.format, (def.create_parser)(&options))
                .is_none()
            {
                file_names.push(def.format.file_name());
            }
        }

        Self {
            parsers_by_format,
            file_names,
        }
    }

    /// Returns the parser registered for an exact lockfile name.
    ///
    /// # Errors
    ///
    /// Returns [`LockfileError::UnsupportedFormat`] for any other name.
    pub fn parser_for(&self, file_name: &str) -> Result<&dyn LockfileParser, LockfileError> {
        LockfileFormat::from_file_name(file_name)
            .and_then(|format| self.parsers_by_format.get(&format))
            .map(|parser| parser.as_ref())
            .ok_or_else(|| unsupported_format_error(file_name, &self.file_names))
    }

    /// Selects a parser by file name and runs it over the full file content.
    ///
    /// One leading byte order mark is dropped before parsing. A panic inside
    /// a parser is reported as [`LockfileError::Unexpected`] instead of
    /// unwinding into the caller.
    ///
    /// # Errors
    ///
    /// Returns the dispatch or parser failure.
    pub fn detect_and_parse(
        &self,
        file_name: &str,
        content: &str,
    ) -> Result<ParsedLockfile, LockfileError> {
        let parser = self.parser_for(file_name)?;
        let content = strip_byte_order_mark(content);
        panic::catch_unwind(AssertUnwindSafe(|| parser.parse(content))).unwrap_or_else(|payload| {
            Err(LockfileError::Unexpected {
                detail: panic_detail(payload.as_ref()),
            })
        })
    }
}

/// Builds the catalog from app-level definitions.
pub fn register_default_catalog(options: ParserOptions) -> LockfileCatalog {
    LockfileCatalog::from_definitions(&crate::app_lockfile_definitions(), options)
}

/// Returns all accepted lockfile names in registration order.
pub fn supported_file_names() -> Vec<&'static str> {
    crate::app_lockfile_definitions()
        .iter()
        .map(|def| def.format.file_name())
        .collect()
}

fn strip_byte_order_mark(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}

fn unsupported_format_error(file_name: &str, supported: &[&str]) -> LockfileError {
    LockfileError::UnsupportedFormat {
        file_name: file_name.to_string(),
        expected: supported.join(" or "),
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "parser panicked".to_string())
}

#[cfg(test)]
#[path = "../tests/lockfiles.rs"]
mod tests;
