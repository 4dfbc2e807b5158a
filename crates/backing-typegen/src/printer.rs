//! Rendering a [`TypegenInfo`] snapshot as TypeScript declarations.

use std::io::{self, Write};

use crate::aliases::module_specifier;
use crate::metadata::TypegenInfo;
use crate::resolver::UNKNOWN_PLACEHOLDER;
use crate::schema::{Schema, TypeKind};

const DEFAULT_HEADER: &str =
    "This file was automatically generated by backing-typegen\nDo not make changes to this file directly";

/// Pure renderer from a resolved snapshot and its schema to declaration text.
///
/// Entries follow type registration order. Output is byte-identical across
/// calls for the same inputs.
///
/// # Example
///
/// ```ignore
/// let info = metadata.get_typegen_info(Some(&schema)).await?;
/// let printer = TypegenPrinter::new(&schema, &info);
/// assert!(printer.print_enum_type_map().starts_with("export interface NexusGenEnums {"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TypegenPrinter<'a> {
    schema: &'a Schema,
    info: &'a TypegenInfo,
}

impl<'a> TypegenPrinter<'a> {
    /// `info` must be the snapshot assembled for `schema`. With any other
    /// snapshot every entry would print as the placeholder.
    pub fn new(schema: &'a Schema, info: &'a TypegenInfo) -> Self {
        debug_assert_eq!(
            info.schema_id,
            schema.id(),
            "typegen info was assembled for another schema"
        );
        Self { schema, info }
    }

    /// The whole typegen file.
    pub fn print(&self) -> String {
        let mut output = self.print_header();

        let imports = self.print_imports();
        if !imports.is_empty() {
            output.push_str(&imports);
            output.push_str("\n\n");
        }

        let blocks = [
            self.print_global_augmentation(),
            self.print_input_type_map(),
            self.print_enum_type_map(),
            self.print_scalar_type_map(),
            self.print_object_type_map(),
            self.print_interface_type_map(),
            self.print_union_type_map(),
            self.print_root_type_map(),
            self.print_abstract_type_members(),
            self.print_context_type(),
            self.print_types_interface(),
        ];
        for block in blocks {
            output.push_str(&block);
            output.push_str("\n\n");
        }

        output.trim_end().to_string() + "\n"
    }

    /// Stream [`print`](Self::print) into a writer.
    pub fn write_to<W: Write>(&self, mut writer: W) -> io::Result<()> {
        writer.write_all(self.print().as_bytes())
    }

    fn print_header(&self) -> String {
        let header = self.info.config.header.as_deref().unwrap_or(DEFAULT_HEADER);
        let mut output = String::from("/**\n");
        for line in header.lines() {
            output.push_str(" * ");
            output.push_str(&line.replace("*/", "*\\/"));
            output.push('\n');
        }
        output.push_str(" */\n\n");
        output
    }

    /// One namespace import per referenced module.
    pub fn print_imports(&self) -> String {
        let typegen_file = self.info.config.typegen_file();
        self.info
            .imports
            .iter()
            .map(|import| {
                format!(
                    "import * as {} from \"{}\"",
                    import.alias,
                    module_specifier(&import.module, typegen_file)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn print_global_augmentation(&self) -> String {
        "declare global {\n  interface NexusGen extends NexusGenTypes {}\n}".to_string()
    }

    pub fn print_input_type_map(&self) -> String {
        self.print_kind_map("NexusGenInputs", &[TypeKind::Input])
    }

    pub fn print_enum_type_map(&self) -> String {
        self.print_kind_map("NexusGenEnums", &[TypeKind::Enum])
    }

    pub fn print_scalar_type_map(&self) -> String {
        self.print_kind_map("NexusGenScalars", &[TypeKind::Scalar])
    }

    pub fn print_object_type_map(&self) -> String {
        self.print_kind_map("NexusGenObjects", &[TypeKind::Object])
    }

    pub fn print_interface_type_map(&self) -> String {
        self.print_kind_map("NexusGenInterfaces", &[TypeKind::Interface])
    }

    pub fn print_union_type_map(&self) -> String {
        self.print_kind_map("NexusGenUnions", &[TypeKind::Union])
    }

    /// Every type a resolver can return: objects, interfaces and unions.
    pub fn print_root_type_map(&self) -> String {
        self.print_kind_map(
            "NexusGenRootTypes",
            &[TypeKind::Object, TypeKind::Interface, TypeKind::Union],
        )
    }

    /// Member object names of each interface and union.
    pub fn print_abstract_type_members(&self) -> String {
        let entries = self
            .schema
            .types()
            .filter(|t| t.kind.is_abstract())
            .map(|t| {
                let members = self.schema.possible_types(&t.name);
                let value = if members.is_empty() {
                    "never".to_string()
                } else {
                    members
                        .iter()
                        .map(|m| format!("\"{m}\""))
                        .collect::<Vec<_>>()
                        .join(" | ")
                };
                (t.name.clone(), value)
            })
            .collect::<Vec<_>>();
        print_interface("NexusGenAbstractTypeMembers", &entries)
    }

    pub fn print_context_type(&self) -> String {
        let reference = self
            .info
            .context
            .as_ref()
            .map(|c| c.reference())
            .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string());
        format!("export type NexusGenContext = {reference}")
    }

    /// The aggregate interface the global augmentation extends.
    pub fn print_types_interface(&self) -> String {
        let entries = [
            ("context", "NexusGenContext"),
            ("inputTypes", "NexusGenInputs"),
            ("enumTypes", "NexusGenEnums"),
            ("scalarTypes", "NexusGenScalars"),
            ("objectTypes", "NexusGenObjects"),
            ("interfaceTypes", "NexusGenInterfaces"),
            ("unionTypes", "NexusGenUnions"),
            ("rootTypes", "NexusGenRootTypes"),
            ("abstractTypeMembers", "NexusGenAbstractTypeMembers"),
        ]
        .map(|(key, value)| (key.to_string(), value.to_string()));
        print_interface("NexusGenTypes", &entries)
    }

    fn print_kind_map(&self, name: &str, kinds: &[TypeKind]) -> String {
        let entries = self
            .schema
            .types()
            .filter(|t| kinds.contains(&t.kind))
            .map(|t| (t.name.clone(), self.reference(&t.name)))
            .collect::<Vec<_>>();
        print_interface(name, &entries)
    }

    fn reference(&self, type_name: &str) -> String {
        self.info
            .binding(type_name)
            .map(|b| b.reference())
            .unwrap_or_else(|| UNKNOWN_PLACEHOLDER.to_string())
    }
}

fn print_interface(name: &str, entries: &[(String, String)]) -> String {
    let mut output = format!("export interface {name} {{\n");
    for (key, value) in entries {
        output.push_str("  ");
        output.push_str(key);
        output.push_str(": ");
        output.push_str(value);
        output.push('\n');
    }
    output.push('}');
    output
}
