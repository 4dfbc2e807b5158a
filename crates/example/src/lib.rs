//! Example crate demonstrating backing-typegen usage.
//!
//! Defines a small blog schema whose backing types live in the TypeScript
//! modules under `fixtures/`:
//!
//! - `User`, `Post`, `Status` and `Context` are found by AutoConfig in
//!   `fixtures/backing.ts` (partly through `export * from "./models"`).
//! - `Session` carries a root typing pointing at `fixtures/session.ts`.
//! - `DateTime` is mapped straight to `Date`.
//! - `Comment` has no backing type and falls back to `any`.

use std::env;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use backing_typegen::{RootTyping, Schema, SchemaBuilder, SchemaError, TypegenConfig};

/// Directory holding the example backing modules.
pub fn fixtures_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

/// Where the generated file goes, made absolute against the working
/// directory. Default: `generated/typegen.ts`.
pub fn output_path(arg: Option<&str>) -> io::Result<PathBuf> {
    let path = Path::new(arg.unwrap_or("generated/typegen.ts"));
    Ok(env::current_dir()?.join(path))
}

/// The example schema.
pub fn blog_schema(fixtures: &Path) -> Result<Arc<Schema>, SchemaError> {
    let mut builder = SchemaBuilder::new();
    builder
        .add_scalar("DateTime")
        .add_enum("Status", &["ACTIVE", "DISABLED"])
        .add_interface("Node", &[("id", "ID!")])
        .add_object(
            "User",
            &[("id", "ID!"), ("name", "String!"), ("status", "Status!")],
        )
        .add_object(
            "Post",
            &[("id", "ID!"), ("author", "User!"), ("publishedAt", "DateTime")],
        )
        .add_object("Comment", &[("id", "ID!"), ("body", "String!")])
        .add_object("Session", &[("token", "String!"), ("expiresAt", "DateTime!")])
        .add_union("Feed", &["Post", "Comment"])
        .add_input("PostFilter", &[("authorId", "ID"), ("status", "Status")])
        .add_object(
            "Query",
            &[
                ("me", "User"),
                ("feed", "[Feed!]!"),
                ("node", "Node"),
                ("session", "Session"),
            ],
        )
        .implement("User", &["Node"])
        .implement("Post", &["Node"])
        .implement("Comment", &["Node"])
        .set_root_typing(
            "Session",
            RootTyping::new(fixtures.join("session.ts"), "SessionRecord"),
        );
    builder.finish()
}

/// Typegen settings for the example schema, writing to `typegen_file`.
pub fn typegen_config(fixtures: &Path, typegen_file: &Path) -> TypegenConfig {
    let mut config = TypegenConfig::new()
        .with_source("t", fixtures.join("backing.ts"))
        .with_context_type("t.Context")
        .with_typegen_file(typegen_file)
        .with_backing_type("DateTime", "Date");
    config.skip_types.push("Query".to_string());
    config
}
