//! Template function runtime.
//!
//! Each render gets its own function set, built already bound to the unit
//! and file it serves and registered into a fresh environment; nothing is
//! pre-registered globally. Context-free filters are shared with the plan
//! expansion stage via [`register_filters`].

use std::collections::HashMap;
use std::sync::Arc;

use minijinja::{Environment, Error, ErrorKind, Value};
use once_cell::sync::OnceCell;
use prost_types::FileDescriptorProto;
use serde::Serialize;

use crate::pkg::PackageResolver;
use crate::util;
use crate::walk::{resolve, FileArena, Node};

/// Comment metadata surfaced to templates by `location()`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CommentEntry {
    pub leading_comments: String,
    pub trailing_comments: String,
}

/// Context-free filters available to the plan template and to every unit
/// template: `trim_ext`, `ext`, `base`, `clean_type`.
pub fn register_filters(env: &mut Environment<'_>) {
    env.add_filter("trim_ext", |s: String| util::strip_ext(&s).to_string());
    env.add_filter("ext", |s: String| util::file_ext(&s).to_string());
    env.add_filter("base", |s: String| util::base(&s).to_string());
    env.add_filter("clean_type", |s: String| clean_type(&s));
}

/// Last segment of a dotted type path, `".foo.bar.Baz"` → `"Baz"`.
pub fn clean_type(type_path: &str) -> String {
    type_path
        .rsplit('.')
        .next()
        .unwrap_or_default()
        .to_string()
}

/// The callable set exposed to one render.
///
/// Scoped to the current file for target-bound units (`file` is `None` for
/// target-less units, where the file-relative functions answer empty/none).
/// Owns everything it needs so it can outlive the borrowed request inside
/// the `'static` closures minijinja requires.
pub struct TemplateFuncs {
    file: Option<Arc<FileDescriptorProto>>,
    /// Output name of the file being rendered; cross-reference URLs are
    /// computed relative to its directory.
    output_file: String,
    /// Output extension (with dot) swapped onto cross-referenced files,
    /// taken from the unit's template name.
    ext: String,
    resolver: Arc<PackageResolver>,
    /// Node id -> comments, built on first `location()` query, per file.
    locations: OnceCell<HashMap<usize, CommentEntry>>,
}

impl TemplateFuncs {
    pub fn new(
        file: Option<Arc<FileDescriptorProto>>,
        output_file: String,
        ext: String,
        resolver: Arc<PackageResolver>,
    ) -> Self {
        TemplateFuncs {
            file,
            output_file,
            ext,
            resolver,
            locations: OnceCell::new(),
        }
    }

    /// Register the bound function set into `env` alongside the shared
    /// filters.
    pub fn bind(self: &Arc<Self>, env: &mut Environment<'static>) {
        register_filters(env);

        env.add_function("clean_label", |label: i64| -> Result<String, Error> {
            let label = i32::try_from(label)
                .map_err(|_| Error::new(ErrorKind::InvalidOperation, "label out of range"))?;
            util::label_name(label)
                .map(str::to_string)
                .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
        });

        env.add_function("clean_type", |type_path: String| clean_type(&type_path));

        env.add_function("field_type", |field: Value| -> Result<String, Error> {
            let type_name = attr_str(&field, "type_name");
            if !type_name.is_empty() {
                return Ok(clean_type(&type_name));
            }
            let ty = attr_i64(&field, "type").ok_or_else(|| {
                Error::new(ErrorKind::InvalidOperation, "field has no type attribute")
            })?;
            let ty = i32::try_from(ty)
                .map_err(|_| Error::new(ErrorKind::InvalidOperation, "field type out of range"))?;
            util::field_type_name(ty)
                .map(str::to_string)
                .map_err(|e| Error::new(ErrorKind::InvalidOperation, e.to_string()))
        });

        let funcs = Arc::clone(self);
        env.add_function("fully_qualified", move |type_path: String| {
            funcs.fully_qualified(&type_path)
        });

        let funcs = Arc::clone(self);
        env.add_function("url_to_type", move |type_path: String| {
            funcs.url_to_type(&type_path)
        });

        let funcs = Arc::clone(self);
        env.add_function("location", move |node: Value| funcs.location(&node));
    }

    /// Fully qualify a type path against the current file's inferred
    /// package (the file stem, i.e. the package-statement fallback).
    ///
    /// TODO: this assumes the reference scope is the package itself, so a
    /// symbol nested more than one scope level above the reference point
    /// qualifies incorrectly. Full resolution needs C++-style scope
    /// crawling; the single-level behavior is kept as documented.
    pub fn fully_qualified(&self, type_path: &str) -> String {
        if util::is_fully_qualified(type_path) {
            return type_path.to_string();
        }
        let Some(file) = &self.file else {
            return type_path.to_string();
        };
        let pkg = util::strip_ext(util::base(file.name()));
        format!(".{pkg}.{type_path}")
    }

    /// URL to the documentation file declaring `type_path`: path relative
    /// to the current output file's directory, extension swapped for the
    /// run's output extension, fragment set to the fully-qualified symbol.
    /// Empty when the declaring file cannot be resolved.
    fn url_to_type(&self, type_path: &str) -> String {
        let Some(file) = &self.file else {
            return String::new();
        };
        if type_path.is_empty() {
            return String::new();
        }
        let qualified = self.fully_qualified(type_path);
        let Some(package) = qualified.split('.').nth(1) else {
            return String::new();
        };
        let Some(declaring) =
            self.resolver
                .declaring_file(package, file.name(), &file.dependency)
        else {
            return String::new();
        };
        let output = util::unix_path(&self.output_file);
        let rel = util::relative_path(util::dir_of(&output), &declaring);
        format!("{}{}#{}", util::strip_ext(&rel), self.ext, qualified)
    }

    /// Comment entry for a node view, or undefined when the node has no
    /// recorded location or belongs to another file.
    fn location(&self, node: &Value) -> Value {
        let Some(file) = &self.file else {
            return Value::UNDEFINED;
        };
        if attr_str(node, "_file") != file.name() {
            return Value::UNDEFINED;
        }
        let Some(id) = attr_i64(node, "_id").and_then(|id| usize::try_from(id).ok()) else {
            return Value::UNDEFINED;
        };
        match self.location_index().get(&id) {
            Some(entry) => Value::from_serialize(entry),
            None => Value::UNDEFINED,
        }
    }

    fn location_index(&self) -> &HashMap<usize, CommentEntry> {
        self.locations.get_or_init(|| {
            let mut index = HashMap::new();
            let Some(file) = &self.file else {
                return index;
            };
            let arena = FileArena::build(file);
            let Some(info) = &file.source_code_info else {
                return index;
            };
            for loc in &info.location {
                let Some(node) = resolve(Node::File(file), &loc.path) else {
                    continue;
                };
                let Some(id) = arena.id_of(node) else {
                    continue;
                };
                // First recorded entry per node wins.
                index.entry(id).or_insert_with(|| CommentEntry {
                    leading_comments: loc.leading_comments.clone().unwrap_or_default(),
                    trailing_comments: loc.trailing_comments.clone().unwrap_or_default(),
                });
            }
            index
        })
    }
}

fn attr_str(value: &Value, name: &str) -> String {
    value
        .get_attr(name)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default()
}

fn attr_i64(value: &Value, name: &str) -> Option<i64> {
    let attr = value.get_attr(name).ok()?;
    if attr.is_undefined() || attr.is_none() {
        return None;
    }
    serde_json::to_value(&attr).ok()?.as_i64()
}
