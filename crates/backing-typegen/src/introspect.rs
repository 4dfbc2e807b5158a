//! Source module introspection: discovering the type names a module exports.
//!
//! This is the only part of the crate that performs I/O. It sits behind the
//! [`SourceModuleIntrospector`] trait so resolution and printing stay pure:
//!
//! - [`FsIntrospector`] reads TypeScript modules from disk, resolving module
//!   paths the way `tsc` does and following `export * from "./x"` re-exports.
//! - [`MemoryIntrospector`] serves canned module text for tests.
//! - [`ExportCache`] wraps either one with a per-module timeout and caches
//!   results so each module is read at most once per assembly.
//!
//! ## Export scanning
//!
//! [`scan_exports`] parses a module with `swc_ecma_parser` and walks its
//! top-level items. It collects:
//!
//! - exported interfaces, type aliases, enums and classes (`declare` and
//!   `const enum` included)
//! - names listed in `export [type] { A, B as C } [from "..."]` clauses
//! - specifiers of `export * from "..."`, which [`FsIntrospector`] follows
//!
//! Default exports cannot be referenced by name and are ignored.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use indexmap::IndexMap;
use swc_common::sync::Lrc;
use swc_common::{FileName, SourceMap, Spanned};
use swc_ecma_ast::{
    Decl, EsVersion, ExportSpecifier, Ident, ModuleDecl, ModuleExportName, ModuleItem, Str,
};
use swc_ecma_parser::lexer::Lexer;
use swc_ecma_parser::{Parser, StringInput, Syntax, TsSyntax};
use tracing::{debug, warn};

use crate::aliases::module_key;
use crate::error::IntrospectError;

/// How a name came to be exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Interface,
    TypeAlias,
    Enum,
    Class,
    /// Listed in an `export { ... }` clause.
    Named,
}

/// The type-position exports of one module, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleExports {
    /// The file the exports were read from. [`FsIntrospector`] reports the
    /// canonical path of the resolved file.
    pub module: PathBuf,
    exports: IndexMap<String, ExportKind>,
}

impl ModuleExports {
    pub fn new(module: impl Into<PathBuf>) -> Self {
        Self {
            module: module.into(),
            exports: IndexMap::new(),
        }
    }

    /// Add an export unless the name is already present.
    pub fn insert(&mut self, name: impl Into<String>, kind: ExportKind) {
        self.exports.entry(name.into()).or_insert(kind);
    }

    /// Exact, case-sensitive lookup.
    pub fn contains(&self, name: &str) -> bool {
        self.exports.contains_key(name)
    }

    pub fn kind(&self, name: &str) -> Option<ExportKind> {
        self.exports.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }
}

/// Result of scanning a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScannedModule {
    pub exports: Vec<(String, ExportKind)>,
    /// Specifiers of `export * from "..."` statements.
    pub reexports: Vec<String>,
}

/// Parser settings for a file, picked by its name.
fn syntax_for(path: &Path) -> Syntax {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    Syntax::Typescript(TsSyntax {
        tsx: name.ends_with(".tsx") || name.ends_with(".jsx"),
        decorators: true,
        dts: name.ends_with(".d.ts"),
        ..Default::default()
    })
}

fn declared_type(decl: &Decl) -> Option<(&Ident, ExportKind)> {
    match decl {
        Decl::Class(class) => Some((&class.ident, ExportKind::Class)),
        Decl::TsInterface(interface) => Some((&interface.id, ExportKind::Interface)),
        Decl::TsTypeAlias(alias) => Some((&alias.id, ExportKind::TypeAlias)),
        Decl::TsEnum(decl) => Some((&decl.id, ExportKind::Enum)),
        _ => None,
    }
}

/// The text of a string literal without its quotes.
fn unquoted(src: &Str) -> Option<String> {
    let raw = src.raw.as_deref()?;
    let inner = raw
        .strip_prefix(['"', '\''])
        .and_then(|r| r.strip_suffix(['"', '\'']))?;
    Some(inner.to_string())
}

/// Parse TypeScript module text and collect its exported type names.
///
/// `path` only selects the dialect: `.tsx`/`.jsx` enable JSX and `.d.ts`
/// parses as a declaration file.
///
/// # Errors
///
/// Returns the parser's message for modules with a fatal syntax error.
pub fn scan_exports(path: &Path, source: &str) -> Result<ScannedModule, String> {
    let cm: Lrc<SourceMap> = Default::default();
    let fm = cm.new_source_file(
        Lrc::new(FileName::Real(path.to_path_buf())),
        source.to_string(),
    );
    let lexer = Lexer::new(
        syntax_for(path),
        EsVersion::EsNext,
        StringInput::from(&*fm),
        None,
    );
    let mut parser = Parser::new_from(lexer);
    let module = parser.parse_module().map_err(|e| {
        let loc = cm.lookup_char_pos(e.span().lo);
        format!("{} at line {}, column {}", e.kind().msg(), loc.line, loc.col.0 + 1)
    })?;

    let mut scanned = ScannedModule::default();
    for item in &module.body {
        let ModuleItem::ModuleDecl(decl) = item else {
            continue;
        };
        match decl {
            ModuleDecl::ExportDecl(export) => {
                if let Some((ident, kind)) = declared_type(&export.decl) {
                    scanned.exports.push((ident.sym.to_string(), kind));
                }
            }
            ModuleDecl::ExportNamed(named) => {
                for specifier in &named.specifiers {
                    let ExportSpecifier::Named(specifier) = specifier else {
                        continue;
                    };
                    let exported = specifier.exported.as_ref().unwrap_or(&specifier.orig);
                    if let ModuleExportName::Ident(ident) = exported
                        && &*ident.sym != "default"
                    {
                        scanned.exports.push((ident.sym.to_string(), ExportKind::Named));
                    }
                }
            }
            ModuleDecl::ExportAll(all) => {
                if let Some(specifier) = unquoted(&all.src) {
                    scanned.reexports.push(specifier);
                }
            }
            _ => {}
        }
    }
    Ok(scanned)
}

/// Discovers the exported type names of a source module.
///
/// Implementations are best-effort: any error is a soft failure for
/// AutoConfig and only becomes fatal for explicit declarations.
#[async_trait]
pub trait SourceModuleIntrospector: Send + Sync + fmt::Debug {
    async fn exports(&self, module: &Path) -> Result<ModuleExports, IntrospectError>;
}

/// Candidate files for a module path, in `tsc` resolution order.
fn module_candidates(path: &Path) -> Vec<PathBuf> {
    let raw = path.to_string_lossy();
    let mut candidates = vec![path.to_path_buf()];
    if let Some(stem) = raw.strip_suffix(".js") {
        candidates.push(PathBuf::from(format!("{stem}.ts")));
        candidates.push(PathBuf::from(format!("{stem}.tsx")));
    }
    for ext in ["ts", "tsx", "d.ts"] {
        candidates.push(PathBuf::from(format!("{raw}.{ext}")));
    }
    for index in ["index.ts", "index.tsx", "index.d.ts"] {
        candidates.push(path.join(index));
    }
    candidates
}

/// The canonical path of the first candidate that is a file.
async fn resolve_module(path: &Path) -> Option<PathBuf> {
    for candidate in module_candidates(path) {
        if let Ok(meta) = tokio::fs::metadata(&candidate).await
            && meta.is_file()
        {
            return Some(tokio::fs::canonicalize(&candidate).await.unwrap_or(candidate));
        }
    }
    None
}

/// Extensions of files the parser understands. `.d.ts` ends in `ts`.
const MODULE_EXTENSIONS: [&str; 6] = ["ts", "tsx", "mts", "cts", "js", "jsx"];

async fn read_and_scan(path: &Path) -> Result<ScannedModule, IntrospectError> {
    let supported = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| MODULE_EXTENSIONS.contains(&ext));
    if !supported {
        return Err(IntrospectError::Unsupported {
            path: path.to_path_buf(),
        });
    }
    let source = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| IntrospectError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    scan_exports(path, &source).map_err(|message| IntrospectError::Parse {
        path: path.to_path_buf(),
        message,
    })
}

/// Reads TypeScript modules from the file system.
#[derive(Debug, Clone)]
pub struct FsIntrospector {
    max_reexport_depth: usize,
}

impl Default for FsIntrospector {
    fn default() -> Self {
        Self {
            max_reexport_depth: 8,
        }
    }
}

impl FsIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit how many `export * from` hops are followed.
    pub fn with_max_reexport_depth(mut self, depth: usize) -> Self {
        self.max_reexport_depth = depth;
        self
    }
}

#[async_trait]
impl SourceModuleIntrospector for FsIntrospector {
    async fn exports(&self, module: &Path) -> Result<ModuleExports, IntrospectError> {
        let root = resolve_module(module)
            .await
            .ok_or_else(|| IntrospectError::NotFound {
                path: module.to_path_buf(),
            })?;
        let scanned = read_and_scan(&root).await?;

        let mut exports = ModuleExports::new(root.clone());
        for (name, kind) in scanned.exports {
            exports.insert(name, kind);
        }

        let mut visited = HashSet::from([root.clone()]);
        let mut queue: VecDeque<(PathBuf, String, usize)> = scanned
            .reexports
            .into_iter()
            .map(|specifier| (root.clone(), specifier, 1))
            .collect();

        while let Some((from, specifier, depth)) = queue.pop_front() {
            if !specifier.starts_with('.') {
                debug!(module = %from.display(), specifier = %specifier, "Skipping package re-export");
                continue;
            }
            if depth > self.max_reexport_depth {
                warn!(module = %from.display(), specifier = %specifier, "Re-export chain too deep");
                continue;
            }
            let target = from.parent().unwrap_or_else(|| Path::new("")).join(&specifier);
            let Some(resolved) = resolve_module(&target).await else {
                warn!(module = %from.display(), specifier = %specifier, "Re-exported module not found");
                continue;
            };
            if !visited.insert(resolved.clone()) {
                continue;
            }
            match read_and_scan(&resolved).await {
                Ok(nested) => {
                    for (name, kind) in nested.exports {
                        exports.insert(name, kind);
                    }
                    queue.extend(
                        nested
                            .reexports
                            .into_iter()
                            .map(|s| (resolved.clone(), s, depth + 1)),
                    );
                }
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable re-exported module");
                }
            }
        }

        Ok(exports)
    }
}

#[derive(Debug, Clone)]
enum MemoryModule {
    Source(String),
    Unreadable(String),
}

/// In-memory modules keyed by path, for tests and embedding.
///
/// Re-exports are not followed.
#[derive(Debug, Default)]
pub struct MemoryIntrospector {
    modules: HashMap<PathBuf, MemoryModule>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl MemoryIntrospector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `source` as the text of `path`.
    pub fn with_source(mut self, path: impl AsRef<Path>, source: impl Into<String>) -> Self {
        self.modules
            .insert(module_key(path.as_ref()), MemoryModule::Source(source.into()));
        self
    }

    /// Serve a module exporting one empty interface per name.
    pub fn with_exports(self, path: impl AsRef<Path>, names: &[&str]) -> Self {
        let source: String = names
            .iter()
            .map(|name| format!("export interface {name} {{}}\n"))
            .collect();
        self.with_source(path, source)
    }

    /// Make reads of `path` fail.
    pub fn with_unreadable(mut self, path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        self.modules
            .insert(module_key(path.as_ref()), MemoryModule::Unreadable(message.into()));
        self
    }

    /// Sleep before answering, to simulate slow reads.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `exports` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceModuleIntrospector for MemoryIntrospector {
    async fn exports(&self, module: &Path) -> Result<ModuleExports, IntrospectError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match self.modules.get(&module_key(module)) {
            Some(MemoryModule::Source(source)) => {
                let scanned = scan_exports(module, source).map_err(|message| IntrospectError::Parse {
                    path: module.to_path_buf(),
                    message,
                })?;
                let mut exports = ModuleExports::new(module);
                for (name, kind) in scanned.exports {
                    exports.insert(name, kind);
                }
                Ok(exports)
            }
            Some(MemoryModule::Unreadable(message)) => Err(IntrospectError::Io {
                path: module.to_path_buf(),
                source: io::Error::other(message.clone()),
            }),
            None => Err(IntrospectError::NotFound {
                path: module.to_path_buf(),
            }),
        }
    }
}

/// Outcome of introspecting one module, shared by every lookup of it.
pub type CachedExports = Result<Arc<ModuleExports>, Arc<IntrospectError>>;

/// Caches module exports for the lifetime of one assembly and enforces the
/// per-module timeout.
///
/// Failures are cached too, so a broken or stuck module costs at most one
/// timeout per assembly.
#[derive(Debug)]
pub struct ExportCache {
    introspector: Arc<dyn SourceModuleIntrospector>,
    timeout: Option<Duration>,
    modules: DashMap<PathBuf, CachedExports>,
}

impl ExportCache {
    pub fn new(introspector: Arc<dyn SourceModuleIntrospector>, timeout: Option<Duration>) -> Self {
        Self {
            introspector,
            timeout,
            modules: DashMap::new(),
        }
    }

    /// Exports of `module`, introspecting it on first use.
    pub async fn exports(&self, module: &Path) -> CachedExports {
        let key = module_key(module);
        if let Some(hit) = self.modules.get(&key) {
            return hit.value().clone();
        }

        let result = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.introspector.exports(module))
                .await
                .unwrap_or_else(|_| {
                    Err(IntrospectError::Timeout {
                        path: module.to_path_buf(),
                        after: limit,
                    })
                }),
            None => self.introspector.exports(module).await,
        };
        let cached = match result {
            Ok(exports) => {
                debug!(
                    module = %module.display(),
                    exports = exports.len(),
                    "Introspected source module"
                );
                Ok(Arc::new(exports))
            }
            Err(e) => {
                debug!(module = %module.display(), error = %e, "Source module introspection failed");
                Err(Arc::new(e))
            }
        };
        self.modules.insert(key, cached.clone());
        cached
    }

    /// Introspect several modules concurrently. Failures land in the cache.
    pub async fn prefetch<'a>(&self, modules: impl IntoIterator<Item = &'a Path>) {
        let pending: Vec<_> = modules.into_iter().map(|m| self.exports(m)).collect();
        futures::future::join_all(pending).await;
    }

    /// Number of modules introspected so far, failed ones included.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
