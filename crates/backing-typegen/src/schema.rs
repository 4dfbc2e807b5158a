//! Schema builder and the finalized, immutable schema it produces.
//!
//! Types are registered on a [`SchemaBuilder`] in declaration order. That order
//! is preserved all the way into the printed typegen blocks. Calling
//! [`SchemaBuilder::finish`] validates cross references and freezes the result
//! into an [`Arc<Schema>`] carrying a process-unique [`SchemaId`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::error::{DeclarationKind, SchemaError};

/// Scalars every schema understands without declaring them.
pub const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "Boolean", "ID"];

static NEXT_SCHEMA_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a finalized schema. Two `finish()` calls never share an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaId(u64);

impl SchemaId {
    fn next() -> Self {
        Self(NEXT_SCHEMA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SchemaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema#{}", self.0)
    }
}

/// The kind of a named schema type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Object,
    Interface,
    Union,
    Enum,
    Scalar,
    Input,
}

impl TypeKind {
    /// Interfaces and unions resolve to one of several object types.
    pub fn is_abstract(self) -> bool {
        matches!(self, Self::Interface | Self::Union)
    }
}

/// One entry in a type's ordered member list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Member {
    /// A field on an object, interface or input type.
    ///
    /// `type_ref` may carry list and non-null wrappers, e.g. `"[Post!]!"`.
    Field { name: String, type_ref: String },
    /// An enum value.
    Value(String),
    /// A union member.
    Possible(String),
    /// An interface implemented by an object.
    Implements(String),
}

/// A named type as registered with the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaTypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    pub members: Vec<Member>,
}

impl SchemaTypeDescriptor {
    fn new(name: String, kind: TypeKind, members: Vec<Member>) -> Self {
        Self {
            name,
            kind,
            members,
        }
    }

    /// Field names and their type references, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().filter_map(|m| match m {
            Member::Field { name, type_ref } => Some((name.as_str(), type_ref.as_str())),
            _ => None,
        })
    }

    /// Enum values, in declaration order.
    pub fn values(&self) -> impl Iterator<Item = &str> {
        self.members.iter().filter_map(|m| match m {
            Member::Value(v) => Some(v.as_str()),
            _ => None,
        })
    }

    /// Union members, in declaration order.
    pub fn possible_types(&self) -> impl Iterator<Item = &str> {
        self.members.iter().filter_map(|m| match m {
            Member::Possible(p) => Some(p.as_str()),
            _ => None,
        })
    }

    /// Interfaces implemented by an object, in declaration order.
    pub fn interfaces(&self) -> impl Iterator<Item = &str> {
        self.members.iter().filter_map(|m| match m {
            Member::Implements(i) => Some(i.as_str()),
            _ => None,
        })
    }
}

/// An arbitrary external import declared directly on a schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootTyping {
    pub path: PathBuf,
    pub name: String,
}

impl RootTyping {
    pub fn new(path: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
        }
    }
}

/// A backing type name, resolved against the module that declares the schema type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackingTypeName {
    pub name: String,
    pub module: Option<PathBuf>,
}

impl BackingTypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            module: None,
        }
    }

    /// Set the declaring module the name is exported from.
    pub fn in_module(mut self, module: impl Into<PathBuf>) -> Self {
        self.module = Some(module.into());
        self
    }
}

/// Explicit backing-type annotations attached to one schema type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExplicitDeclaration {
    pub root_typing: Option<RootTyping>,
    pub backing_type: Option<BackingTypeName>,
}

/// Strip list and non-null wrappers from a type reference: `"[Post!]!"` -> `"Post"`.
pub fn named_type(type_ref: &str) -> &str {
    type_ref.trim_matches(|c: char| c == '[' || c == ']' || c == '!' || c.is_whitespace())
}

/// Collects type declarations before the schema is frozen.
///
/// # Example
///
/// ```
/// use backing_typegen::{RootTyping, SchemaBuilder};
///
/// let mut builder = SchemaBuilder::new();
/// builder
///     .add_enum("Status", &["ACTIVE", "DISABLED"])
///     .add_object("Query", &[("status", "Status")])
///     .set_root_typing("Status", RootTyping::new("src/models.ts", "Status"));
/// let schema = builder.finish().unwrap();
/// assert_eq!(schema.len(), 2);
/// ```
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    types: IndexMap<String, SchemaTypeDescriptor>,
    declarations: IndexMap<String, ExplicitDeclaration>,
    errors: Vec<SchemaError>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, name: &str, kind: TypeKind, members: Vec<Member>) -> &mut Self {
        if name.is_empty() {
            self.errors.push(SchemaError::EmptyTypeName);
        } else if self.types.contains_key(name) {
            self.errors.push(SchemaError::DuplicateType(name.to_string()));
        } else {
            self.types.insert(
                name.to_string(),
                SchemaTypeDescriptor::new(name.to_string(), kind, members),
            );
        }
        self
    }

    fn field_members(fields: &[(&str, &str)]) -> Vec<Member> {
        fields
            .iter()
            .map(|(name, type_ref)| Member::Field {
                name: name.to_string(),
                type_ref: type_ref.to_string(),
            })
            .collect()
    }

    /// Add an object type with `(field, type_ref)` pairs.
    pub fn add_object(&mut self, name: &str, fields: &[(&str, &str)]) -> &mut Self {
        self.register(name, TypeKind::Object, Self::field_members(fields))
    }

    /// Add an interface type.
    pub fn add_interface(&mut self, name: &str, fields: &[(&str, &str)]) -> &mut Self {
        self.register(name, TypeKind::Interface, Self::field_members(fields))
    }

    /// Add an input object type.
    pub fn add_input(&mut self, name: &str, fields: &[(&str, &str)]) -> &mut Self {
        self.register(name, TypeKind::Input, Self::field_members(fields))
    }

    /// Add an enum type.
    pub fn add_enum(&mut self, name: &str, values: &[&str]) -> &mut Self {
        let members = values.iter().map(|v| Member::Value(v.to_string())).collect();
        self.register(name, TypeKind::Enum, members)
    }

    /// Add a union of object types.
    pub fn add_union(&mut self, name: &str, members: &[&str]) -> &mut Self {
        let members = members
            .iter()
            .map(|m| Member::Possible(m.to_string()))
            .collect();
        self.register(name, TypeKind::Union, members)
    }

    /// Add a custom scalar.
    pub fn add_scalar(&mut self, name: &str) -> &mut Self {
        self.register(name, TypeKind::Scalar, Vec::new())
    }

    /// Declare that an already added object implements the given interfaces.
    pub fn implement(&mut self, object: &str, interfaces: &[&str]) -> &mut Self {
        match self.types.get_mut(object) {
            Some(descriptor) => descriptor
                .members
                .extend(interfaces.iter().map(|i| Member::Implements(i.to_string()))),
            None => self.errors.push(SchemaError::UnknownTypeReference {
                owner: interfaces.join(", "),
                referenced: object.to_string(),
            }),
        }
        self
    }

    /// Attach a root typing import to a type. Wins over every other binding source.
    pub fn set_root_typing(&mut self, type_name: &str, root_typing: RootTyping) -> &mut Self {
        self.declarations
            .entry(type_name.to_string())
            .or_default()
            .root_typing = Some(root_typing);
        self
    }

    /// Attach a backing type name to a type.
    pub fn set_backing_type(&mut self, type_name: &str, backing_type: BackingTypeName) -> &mut Self {
        self.declarations
            .entry(type_name.to_string())
            .or_default()
            .backing_type = Some(backing_type);
        self
    }

    /// Validate all references and freeze the schema.
    pub fn finish(mut self) -> Result<Arc<Schema>, SchemaError> {
        if let Some(err) = self.errors.drain(..).next() {
            return Err(err);
        }

        let mut builtins: Vec<&'static str> = Vec::new();
        for descriptor in self.types.values() {
            for (_, type_ref) in descriptor.fields() {
                let referenced = named_type(type_ref);
                if self.types.contains_key(referenced) {
                    continue;
                }
                match BUILTIN_SCALARS.iter().find(|s| **s == referenced) {
                    Some(builtin) if !builtins.contains(builtin) => builtins.push(*builtin),
                    Some(_) => {}
                    None => {
                        return Err(SchemaError::UnknownTypeReference {
                            owner: descriptor.name.clone(),
                            referenced: referenced.to_string(),
                        });
                    }
                }
            }
            for member in descriptor.possible_types() {
                match self.types.get(member) {
                    Some(t) if t.kind == TypeKind::Object => {}
                    _ => {
                        return Err(SchemaError::InvalidUnionMember {
                            union: descriptor.name.clone(),
                            member: member.to_string(),
                        });
                    }
                }
            }
            for interface in descriptor.interfaces() {
                match self.types.get(interface) {
                    Some(t) if t.kind == TypeKind::Interface => {}
                    _ => {
                        return Err(SchemaError::InvalidInterface {
                            object: descriptor.name.clone(),
                            interface: interface.to_string(),
                        });
                    }
                }
            }
        }

        for builtin in builtins {
            self.types.insert(
                builtin.to_string(),
                SchemaTypeDescriptor::new(builtin.to_string(), TypeKind::Scalar, Vec::new()),
            );
        }

        for (type_name, declaration) in &self.declarations {
            if !self.types.contains_key(type_name) {
                let kind = if declaration.root_typing.is_some() {
                    DeclarationKind::RootTyping
                } else {
                    DeclarationKind::BackingType
                };
                return Err(SchemaError::UnknownDeclarationTarget {
                    kind,
                    type_name: type_name.clone(),
                });
            }
        }

        Ok(Arc::new(Schema {
            id: SchemaId::next(),
            types: self.types,
            declarations: self.declarations,
        }))
    }
}

/// A finalized schema. Immutable; shared behind an `Arc`.
#[derive(Debug)]
pub struct Schema {
    id: SchemaId,
    types: IndexMap<String, SchemaTypeDescriptor>,
    declarations: IndexMap<String, ExplicitDeclaration>,
}

impl Schema {
    pub fn id(&self) -> SchemaId {
        self.id
    }

    /// All types in registration order. Referenced built-in scalars come last.
    pub fn types(&self) -> impl Iterator<Item = &SchemaTypeDescriptor> {
        self.types.values()
    }

    /// Types of one kind, in registration order.
    pub fn types_of_kind(&self, kind: TypeKind) -> impl Iterator<Item = &SchemaTypeDescriptor> {
        self.types.values().filter(move |t| t.kind == kind)
    }

    pub fn get(&self, name: &str) -> Option<&SchemaTypeDescriptor> {
        self.types.get(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Explicit declarations attached to a type, if any.
    pub fn declaration(&self, type_name: &str) -> Option<&ExplicitDeclaration> {
        self.declarations.get(type_name)
    }

    /// Object types an interface or union can resolve to, in registration order.
    pub fn possible_types(&self, abstract_type: &str) -> Vec<&str> {
        let Some(descriptor) = self.types.get(abstract_type) else {
            return Vec::new();
        };
        match descriptor.kind {
            TypeKind::Union => {
                let members: Vec<&str> = descriptor.possible_types().collect();
                self.types_of_kind(TypeKind::Object)
                    .filter(|t| members.contains(&t.name.as_str()))
                    .map(|t| t.name.as_str())
                    .collect()
            }
            TypeKind::Interface => self
                .types_of_kind(TypeKind::Object)
                .filter(|t| t.interfaces().any(|i| i == abstract_type))
                .map(|t| t.name.as_str())
                .collect(),
            _ => Vec::new(),
        }
    }
}
