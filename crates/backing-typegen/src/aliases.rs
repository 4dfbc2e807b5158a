//! Import alias assignment and module specifiers.
//!
//! Every distinct module referenced by generated code is imported exactly once
//! as `import * as <alias> from "<specifier>"`. Configured sources bring their
//! own alias; modules named only by root typings or backing types get an alias
//! minted from their file stem.
//!
//! A module is known by two keys. The lexical key of its configured or declared
//! path makes `./src/../src/types.ts` and `src/types` the same module. The key
//! of the file it resolved to makes `src/models` and `src/models/index.ts` the
//! same module, as well as relative and absolute spellings of one file.

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use indexmap::IndexMap;

use crate::config::SourceConfig;
use crate::error::TypegenError;

/// File suffixes a TypeScript import specifier leaves out. Longest first.
const TS_EXTENSIONS: [&str; 5] = [".d.ts", ".tsx", ".ts", ".jsx", ".js"];

/// Words that cannot name an import binding in a module.
const RESERVED_WORDS: [&str; 47] = [
    "arguments", "await", "break", "case", "catch", "class", "const", "continue", "debugger",
    "default", "delete", "do", "else", "enum", "eval", "export", "extends", "false", "finally",
    "for", "function", "if", "implements", "import", "in", "instanceof", "interface", "let",
    "new", "null", "package", "private", "protected", "public", "return", "static", "super",
    "switch", "this", "throw", "true", "try", "typeof", "var", "void", "while", "with",
];

/// A module imported under an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportAlias {
    pub alias: String,
    /// The module path as configured or declared.
    pub module: PathBuf,
    /// `true` when the alias was minted rather than configured.
    pub minted: bool,
}

/// Alias table for one assembly. Configured sources first, minted aliases after,
/// each in the order they were assigned.
#[derive(Debug, Clone, Default)]
pub struct ImportAliases {
    entries: IndexMap<String, ImportAlias>,
    by_module: HashMap<PathBuf, String>,
}

impl ImportAliases {
    /// Seed the table from configured sources.
    ///
    /// # Errors
    ///
    /// Fails on an alias that is not an identifier, an empty module path, one
    /// alias used for two modules, or one module configured under two aliases.
    pub fn from_sources(sources: &[SourceConfig]) -> Result<Self, TypegenError> {
        let mut aliases = Self::default();
        for source in sources {
            if !is_identifier(&source.alias) {
                return Err(TypegenError::InvalidAlias(source.alias.clone()));
            }
            if source.module_path.as_os_str().is_empty() {
                return Err(TypegenError::EmptyModulePath(source.alias.clone()));
            }
            let key = module_key(&source.module_path);
            if let Some(existing) = aliases.entries.get(&source.alias) {
                if module_key(&existing.module) == key {
                    continue;
                }
                return Err(TypegenError::AliasCollision {
                    alias: source.alias.clone(),
                    first: existing.module.clone(),
                    second: source.module_path.clone(),
                });
            }
            if let Some(first_alias) = aliases.by_module.get(&key) {
                return Err(TypegenError::DuplicateSource {
                    module: source.module_path.clone(),
                    first_alias: first_alias.clone(),
                    second_alias: source.alias.clone(),
                });
            }
            aliases.insert(source.alias.clone(), source.module_path.clone(), key, false);
        }
        Ok(aliases)
    }

    fn insert(&mut self, alias: String, module: PathBuf, key: PathBuf, minted: bool) {
        self.by_module.insert(key, alias.clone());
        self.entries.insert(
            alias.clone(),
            ImportAlias {
                alias,
                module,
                minted,
            },
        );
    }

    /// The module behind an alias.
    pub fn module_for(&self, alias: &str) -> Option<&Path> {
        self.entries.get(alias).map(|entry| entry.module.as_path())
    }

    /// Record that the source `alias` resolved to the file `resolved`.
    ///
    /// # Errors
    ///
    /// Fails when another source already resolved to the same file.
    pub fn bind_resolved(&mut self, alias: &str, resolved: &Path) -> Result<(), TypegenError> {
        let key = module_key(resolved);
        match self.by_module.get(&key) {
            Some(existing) if existing != alias => Err(TypegenError::DuplicateSource {
                module: resolved.to_path_buf(),
                first_alias: existing.clone(),
                second_alias: alias.to_string(),
            }),
            Some(_) => Ok(()),
            None => {
                self.by_module.insert(key, alias.to_string());
                Ok(())
            }
        }
    }

    /// Return the alias for `module`, minting a fresh one if it has none yet.
    ///
    /// `resolved` is the file the module was read from. A module whose file
    /// already has an alias reuses it.
    pub fn alias_for_module(&mut self, module: &Path, resolved: &Path) -> String {
        let key = module_key(module);
        let resolved_key = module_key(resolved);
        if let Some(alias) = self
            .by_module
            .get(&resolved_key)
            .or_else(|| self.by_module.get(&key))
        {
            return alias.clone();
        }
        let base = alias_base(&key);
        let mut alias = base.clone();
        let mut suffix = 2;
        while self.entries.contains_key(&alias) {
            alias = format!("{base}_{suffix}");
            suffix += 1;
        }
        self.insert(alias.clone(), module.to_path_buf(), key, true);
        self.by_module.insert(resolved_key, alias.clone());
        alias
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImportAlias> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derive an identifier from a module's file stem. `index` modules use their directory name.
fn alias_base(key: &Path) -> String {
    let stem = match key.file_name().and_then(|n| n.to_str()) {
        Some("index") => key
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .unwrap_or("index"),
        Some(name) => name,
        None => "",
    };
    let mut alias: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '$' { c } else { '_' })
        .collect();
    if alias.is_empty() {
        alias.push_str("module");
    } else if alias.starts_with(|c: char| c.is_ascii_digit()) {
        alias.insert(0, '_');
    } else if is_reserved_word(&alias) {
        alias.push('_');
    }
    alias
}

pub fn is_reserved_word(s: &str) -> bool {
    RESERVED_WORDS.contains(&s)
}

/// Whether `s` is a plain ASCII TypeScript identifier that can name a binding.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') && !is_reserved_word(s)
}

/// Lexically resolve `.` and `..` components without touching the file system.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Drop a TypeScript/JavaScript extension from the final path segment.
pub fn strip_ts_extension(path: &Path) -> PathBuf {
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        for ext in TS_EXTENSIONS {
            if let Some(stem) = name.strip_suffix(ext)
                && !stem.is_empty()
            {
                return path.with_file_name(stem);
            }
        }
    }
    path.to_path_buf()
}

/// The identity of a module: normalized, without extension.
pub fn module_key(path: &Path) -> PathBuf {
    strip_ts_extension(&normalize_path(path))
}

/// The import specifier for `module` as seen from the typegen file.
///
/// Without a typegen file the normalized module path is used as is.
pub fn module_specifier(module: &Path, typegen_file: Option<&Path>) -> String {
    let target = module_key(module);
    let Some(file) = typegen_file else {
        return to_slash(&target);
    };
    let from = normalize_path(file.parent().unwrap_or_else(|| Path::new("")));
    match relative_path(&from, &target) {
        Some(rel) => {
            let rel = to_slash(&rel);
            if rel == ".." || rel.starts_with("../") {
                rel
            } else {
                format!("./{rel}")
            }
        }
        None => to_slash(&target),
    }
}

/// `to` relative to the directory `from`. Both must already be normalized.
fn relative_path(from: &Path, to: &Path) -> Option<PathBuf> {
    if from.has_root() != to.has_root() {
        return None;
    }
    let from: Vec<Component<'_>> = from.components().collect();
    let to: Vec<Component<'_>> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();
    if from[common..].iter().any(|c| *c == Component::ParentDir) {
        return None;
    }
    let mut rel = PathBuf::new();
    for _ in common..from.len() {
        rel.push("..");
    }
    for component in &to[common..] {
        rel.push(component.as_os_str());
    }
    Some(rel)
}

fn to_slash(path: &Path) -> String {
    let mut absolute = false;
    let mut parts = Vec::new();
    for component in path.components() {
        match component {
            Component::RootDir => absolute = true,
            other => parts.push(other.as_os_str().to_string_lossy().into_owned()),
        }
    }
    let joined = parts.join("/");
    if absolute { format!("/{joined}") } else { joined }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sources_keep_configured_aliases() {
        let aliases = ImportAliases::from_sources(&[
            SourceConfig::new("t", "tests/_types.ts"),
            SourceConfig::new("db", "src/db/models.ts"),
        ])
        .unwrap();
        let names: Vec<_> = aliases.iter().map(|a| a.alias.as_str()).collect();
        assert_eq!(names, vec!["t", "db"]);
        assert_eq!(aliases.module_for("db"), Some(Path::new("src/db/models.ts")));
    }

    #[test]
    fn test_same_source_twice_is_deduplicated() {
        let aliases = ImportAliases::from_sources(&[
            SourceConfig::new("t", "types.ts"),
            SourceConfig::new("t", "./types"),
        ])
        .unwrap();
        assert_eq!(aliases.len(), 1);
    }

    #[test]
    fn test_module_under_two_aliases_is_rejected() {
        let err = ImportAliases::from_sources(&[
            SourceConfig::new("a", "types.ts"),
            SourceConfig::new("b", "types.ts"),
        ])
        .unwrap_err();
        assert!(matches!(err, TypegenError::DuplicateSource { .. }));
    }

    #[test]
    fn test_invalid_alias_is_rejected() {
        let err = ImportAliases::from_sources(&[SourceConfig::new("my-types", "types.ts")])
            .unwrap_err();
        assert!(matches!(err, TypegenError::InvalidAlias(alias) if alias == "my-types"));
    }

    #[test]
    fn test_root_typing_reuses_source_alias() {
        let mut aliases =
            ImportAliases::from_sources(&[SourceConfig::new("t", "tests/_types.ts")]).unwrap();
        let module = Path::new("./tests/_types");
        assert_eq!(aliases.alias_for_module(module, module), "t");
        assert_eq!(aliases.len(), 1);
    }

    #[test]
    fn test_resolved_file_reuses_source_alias() {
        let mut aliases =
            ImportAliases::from_sources(&[SourceConfig::new("t", "/work/models")]).unwrap();
        aliases
            .bind_resolved("t", Path::new("/work/models/index.ts"))
            .unwrap();

        let alias = aliases.alias_for_module(
            Path::new("/work/models/index.ts"),
            Path::new("/work/models/index.ts"),
        );
        assert_eq!(alias, "t");
        let alias = aliases.alias_for_module(
            Path::new("models/index.ts"),
            Path::new("/work/models/index.ts"),
        );
        assert_eq!(alias, "t");
        assert_eq!(aliases.len(), 1);
    }

    #[test]
    fn test_two_sources_resolving_to_one_file_are_rejected() {
        let mut aliases = ImportAliases::from_sources(&[
            SourceConfig::new("a", "/work/models"),
            SourceConfig::new("b", "models/index.ts"),
        ])
        .unwrap();
        aliases
            .bind_resolved("a", Path::new("/work/models/index.ts"))
            .unwrap();
        let err = aliases
            .bind_resolved("b", Path::new("/work/models/index.ts"))
            .unwrap_err();
        assert!(matches!(
            err,
            TypegenError::DuplicateSource { first_alias, second_alias, .. }
                if first_alias == "a" && second_alias == "b"
        ));
    }

    #[test]
    fn test_reserved_words_are_not_aliases() {
        let err = ImportAliases::from_sources(&[SourceConfig::new("class", "types.ts")])
            .unwrap_err();
        assert!(matches!(err, TypegenError::InvalidAlias(alias) if alias == "class"));

        let mut aliases = ImportAliases::default();
        for (file, expected) in [("src/enum.ts", "enum_"), ("src/default/index.ts", "default_")] {
            let module = Path::new(file);
            assert_eq!(aliases.alias_for_module(module, module), expected);
        }
    }

    #[test]
    fn test_minted_aliases_are_deterministic() {
        let mut aliases =
            ImportAliases::from_sources(&[SourceConfig::new("models", "src/db.ts")]).unwrap();
        let mut alias_for = |file: &str| {
            let module = Path::new(file);
            aliases.alias_for_module(module, module)
        };
        assert_eq!(alias_for("tests/backingTypes.spec.ts"), "backingTypes_spec");
        assert_eq!(alias_for("src/models/index.ts"), "models_2");
        assert_eq!(alias_for("src/1st.ts"), "_1st");
        assert_eq!(alias_for("tests/backingTypes.spec.ts"), "backingTypes_spec");
        assert!(aliases.iter().skip(1).all(|a| a.minted));
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path(Path::new("./a/b/../c")), PathBuf::from("a/c"));
        assert_eq!(normalize_path(Path::new("../a")), PathBuf::from("../a"));
        assert_eq!(normalize_path(Path::new("/a/../../b")), PathBuf::from("/b"));
    }

    #[test]
    fn test_strip_ts_extension() {
        assert_eq!(strip_ts_extension(Path::new("a/types.d.ts")), PathBuf::from("a/types"));
        assert_eq!(strip_ts_extension(Path::new("a/view.tsx")), PathBuf::from("a/view"));
        assert_eq!(strip_ts_extension(Path::new("a/types")), PathBuf::from("a/types"));
    }

    #[test]
    fn test_module_specifier_relative_to_typegen_file() {
        let file = Path::new("src/generated/typegen.ts");
        assert_eq!(
            module_specifier(Path::new("src/backing.ts"), Some(file)),
            "../backing"
        );
        assert_eq!(
            module_specifier(Path::new("src/generated/types.ts"), Some(file)),
            "./types"
        );
        assert_eq!(
            module_specifier(Path::new("/abs/types.ts"), Some(Path::new("/abs/out/gen.ts"))),
            "../types"
        );
    }

    #[test]
    fn test_module_specifier_without_typegen_file() {
        assert_eq!(module_specifier(Path::new("./tests/_types.ts"), None), "tests/_types");
        assert_eq!(module_specifier(Path::new("/abs/_types.ts"), None), "/abs/_types");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("t"));
        assert!(is_identifier("$ctx_1"));
        assert!(!is_identifier("1t"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a.b"));
        assert!(!is_identifier("default"));
        assert!(is_identifier("type"));
    }
}
