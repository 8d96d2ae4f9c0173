use affected_pkgs_core::{
    LockfileError, LockfileFormat, LockfileParser, PackageVersionMap, ParsedLockfile,
    ParserOptions,
};
use serde_json::{Map, Value};
use std::collections::VecDeque;

const NODE_MODULES_MARKER: &str = "node_modules/";
const PACKAGES_NOT_OBJECT_MESSAGE: &str =
    "Invalid package-lock.json format: 'packages' property must be an object.";

#[derive(Debug, Clone, Default)]
pub struct NpmLockfileParser {
    options: ParserOptions,
}

impl NpmLockfileParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParserOptions) -> Self {
        Self { options }
    }
}

impl LockfileParser for NpmLockfileParser {
    fn format(&self) -> LockfileFormat {
        LockfileFormat::PackageLock
    }

    fn parse(&self, content: &str) -> Result<ParsedLockfile, LockfileError> {
        parse_package_lock(content, self.options)
    }
}

fn parse_package_lock(raw: &str, options: ParserOptions) -> Result<ParsedLockfile, LockfileError> {
    let root: Value = serde_json::from_str(raw).map_err(|error| LockfileError::MalformedInput {
        detail: error.to_string(),
    })?;
    let mut packages = PackageVersionMap::new();
    let mut missing_versions = 0usize;

    if let Some(value) = root.get("packages").filter(|value| !value.is_null()) {
        let entries = value
            .as_object()
            .ok_or_else(|| LockfileError::InvalidSchema {
                message: PACKAGES_NOT_OBJECT_MESSAGE.to_string(),
            })?;
        for (module_path, value) in entries {
            if module_path.is_empty() {
                continue;
            }
            let Some(name) = extract_package_name_from_node_modules_path(module_path) else {
                continue;
            };
            let version = entry_version(value).unwrap_or_else(|| {
                missing_versions += 1;
                ""
            });
            packages.insert_first(name, version);
        }
    } else if options.legacy_dependencies
        && let Some(dependencies) = root.get("dependencies").and_then(|value| value.as_object())
    {
        collect_legacy_dependencies(dependencies, &mut packages, &mut missing_versions);
    } else if options.legacy_dependencies {
        return Err(LockfileError::InvalidSchema {
            message: "Invalid package-lock.json format: neither 'packages' nor 'dependencies' property is present.".to_string(),
        });
    } else {
        return Err(LockfileError::missing_packages());
    }

    Ok(ParsedLockfile {
        format: LockfileFormat::PackageLock,
        packages,
        diagnostic: missing_version_diagnostic(missing_versions),
    })
}

/// Walks a lockfileVersion 1 `dependencies` tree one depth level at a time so
/// hoisted copies are recorded before nested duplicates.
fn collect_legacy_dependencies(
    top_level: &Map<String, Value>,
    packages: &mut PackageVersionMap,
    missing_versions: &mut usize,
) {
    let mut levels = VecDeque::from([top_level]);
    while let Some(level) = levels.pop_front() {
        for (name, value) in level {
            let version = entry_version(value).unwrap_or_else(|| {
                *missing_versions += 1;
                ""
            });
            packages.insert_first(name.as_str(), version);

            if let Some(nested) = value.get("dependencies").and_then(|value| value.as_object()) {
                levels.push_back(nested);
            }
        }
    }
}

fn entry_version(value: &Value) -> Option<&str> {
    value
        .as_object()
        .and_then(|obj| obj.get("version"))
        .and_then(|version| version.as_str())
}

fn extract_package_name_from_node_modules_path(module_path: &str) -> Option<&str> {
    let idx = module_path.rfind(NODE_MODULES_MARKER)?;
    let remainder = &module_path[idx + NODE_MODULES_MARKER.len()..];
    if remainder.is_empty() {
        return None;
    }

    Some(remainder)
}

fn missing_version_diagnostic(count: usize) -> Option<String> {
    match count {
        0 => None,
        1 => Some("1 package entry had no version field".to_string()),
        n => Some(format!("{n} package entries had no version field")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use affected_pkgs_core::LockfileErrorKind;

    fn parse(raw: &str) -> Result<ParsedLockfile, LockfileError> {
        NpmLockfileParser::new().parse(raw)
    }

    fn parse_legacy(raw: &str) -> Result<ParsedLockfile, LockfileError> {
        NpmLockfileParser::with_options(ParserOptions {
            legacy_dependencies: true,
        })
        .parse(raw)
    }

    fn names(parsed: &ParsedLockfile) -> Vec<&str> {
        parsed.packages.iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn parse_package_lock_keeps_first_occurrence_of_nested_duplicates() {
        let parsed = parse(
            r#"{"packages": {
                "": {"version": "1.0.0"},
                "node_modules/lodash": {"version": "4.17.21"},
                "node_modules/a/node_modules/lodash": {"version": "4.17.20"}
            }}"#,
        )
        .expect("parse lock");

        assert_eq!(parsed.format, LockfileFormat::PackageLock);
        assert_eq!(parsed.packages.len(), 1);
        assert_eq!(parsed.packages.get("lodash"), Some("4.17.21"));
        assert_eq!(parsed.diagnostic, None);
    }

    #[test]
    fn parse_package_lock_prefers_earlier_entry_even_when_deeper() {
        let parsed = parse(
            r#"{"packages": {
                "node_modules/a/node_modules/lodash": {"version": "4.17.20"},
                "node_modules/lodash": {"version": "4.17.21"}
            }}"#,
        )
        .expect("parse lock");

        assert_eq!(parsed.packages.get("lodash"), Some("4.17.20"));
    }

    #[test]
    fn parse_package_lock_preserves_document_order() {
        let parsed = parse(
            r#"{
              "name": "demo",
              "lockfileVersion": 3,
              "packages": {
                "": { "name": "demo", "version": "0.1.0" },
                "node_modules/zod": { "version": "3.22.4" },
                "node_modules/@types/node": { "version": "20.11.0" },
                "node_modules/axios": { "version": "1.6.7" }
              }
            }"#,
        )
        .expect("parse lock");

        assert_eq!(names(&parsed), vec!["zod", "@types/node", "axios"]);
        assert_eq!(parsed.packages.get("@types/node"), Some("20.11.0"));
    }

    #[test]
    fn parse_package_lock_skips_paths_outside_node_modules() {
        let parsed = parse(
            r#"{"packages": {
                "": {"version": "1.0.0"},
                "packages/workspace-a": {"version": "0.0.1"},
                "node_modules/react": {"version": "18.2.0"}
            }}"#,
        )
        .expect("parse lock");

        assert_eq!(names(&parsed), vec!["react"]);
    }

    #[test]
    fn parse_package_lock_counts_entries_without_version() {
        let parsed = parse(
            r#"{"packages": {
                "node_modules/linked": {"resolved": "../linked", "link": true},
                "node_modules/react": {"version": "18.2.0"}
            }}"#,
        )
        .expect("parse lock");

        assert_eq!(parsed.packages.len(), 2);
        assert_eq!(parsed.packages.get("linked"), Some(""));
        assert_eq!(
            parsed.diagnostic.as_deref(),
            Some("1 package entry had no version field")
        );
    }

    #[test]
    fn parse_package_lock_accepts_empty_packages_object() {
        let parsed = parse(r#"{"packages": {"": {"version": "1.0.0"}}}"#).expect("parse lock");
        assert!(parsed.packages.is_empty());
    }

    #[test]
    fn parse_package_lock_rejects_invalid_json() {
        let err = parse("{not valid json").expect_err("invalid json should fail");
        assert_eq!(err.kind(), LockfileErrorKind::MalformedInput);
        assert_eq!(
            err.to_string(),
            "Failed to parse file. Please ensure it's a valid JSON file."
        );
    }

    #[test]
    fn parse_package_lock_requires_packages_property() {
        let err = parse(r#"{"dependencies": {"left-pad": {"version": "1.3.0"}}}"#)
            .expect_err("missing packages should fail");
        assert_eq!(err.kind(), LockfileErrorKind::InvalidSchema);
        assert_eq!(
            err.to_string(),
            "Invalid package-lock.json format: 'packages' property is missing."
        );

        let err = parse("[]").expect_err("non-object root should fail");
        assert_eq!(err.kind(), LockfileErrorKind::InvalidSchema);
    }

    #[test]
    fn parse_package_lock_names_non_object_packages_property() {
        for raw in [r#"{"packages": []}"#, r#"{"packages": 3}"#, r#"{"packages": "x"}"#] {
            let err = parse(raw).expect_err("non-object packages should fail");
            assert_eq!(err.kind(), LockfileErrorKind::InvalidSchema);
            assert_eq!(
                err.to_string(),
                "Invalid package-lock.json format: 'packages' property must be an object."
            );
        }

        let err = parse(r#"{"packages": null}"#).expect_err("null packages should fail");
        assert_eq!(
            err.to_string(),
            "Invalid package-lock.json format: 'packages' property is missing."
        );
    }

    #[test]
    fn legacy_dependencies_tree_is_walked_shallow_first() {
        let parsed = parse_legacy(
            r#"{"lockfileVersion": 1, "dependencies": {
                "a": {"version": "1.0.0", "dependencies": {
                    "lodash": {"version": "4.17.20"}
                }},
                "lodash": {"version": "4.17.21"},
                "b": {"version": "2.0.0", "dependencies": {
                    "c": {"version": "3.0.0", "dependencies": {
                        "d": {"version": "4.0.0"}
                    }}
                }}
            }}"#,
        )
        .expect("parse legacy lock");

        assert_eq!(names(&parsed), vec!["a", "lodash", "b", "c", "d"]);
        assert_eq!(parsed.packages.get("lodash"), Some("4.17.21"));
        assert_eq!(parsed.packages.get("d"), Some("4.0.0"));
    }

    #[test]
    fn legacy_mode_still_prefers_packages_when_present() {
        let parsed = parse_legacy(
            r#"{"packages": {"node_modules/react": {"version": "18.2.0"}},
                "dependencies": {"react": {"version": "17.0.0"}, "vue": {"version": "3.0.0"}}}"#,
        )
        .expect("parse lock");

        assert_eq!(names(&parsed), vec!["react"]);
        assert_eq!(parsed.packages.get("react"), Some("18.2.0"));
    }

    #[test]
    fn legacy_mode_rejects_documents_without_either_tree() {
        let err = parse_legacy(r#"{"name": "demo"}"#).expect_err("no trees should fail");
        assert_eq!(err.kind(), LockfileErrorKind::InvalidSchema);
        assert!(err.to_string().contains("'dependencies'"));
    }

    #[test]
    fn extract_package_name_from_node_modules_path_handles_nested_scopes() {
        assert_eq!(
            extract_package_name_from_node_modules_path("node_modules/react"),
            Some("react")
        );
        assert_eq!(
            extract_package_name_from_node_modules_path(
                "node_modules/react/node_modules/@scope/pkg"
            ),
            Some("@scope/pkg")
        );
        assert_eq!(
            extract_package_name_from_node_modules_path("node_modules/a/node_modules/b"),
            Some("b")
        );
        assert_eq!(
            extract_package_name_from_node_modules_path("node_modules/"),
            None
        );
        assert_eq!(
            extract_package_name_from_node_modules_path("packages/demo"),
            None
        );
    }

    #[test]
    fn missing_version_diagnostic_pluralizes() {
        assert_eq!(missing_version_diagnostic(0), None);
        assert_eq!(
            missing_version_diagnostic(3).as_deref(),
            Some("3 package entries had no version field")
        );
    }
}
