//! Declarative generation pipeline.
//!
//! A plan (file map) describes which templates run against which input
//! files and where the output goes. The plan text is itself a template,
//! expanded against the whole request before being decoded, so a plan can
//! declare "one unit per input file" in two lines. Each expanded unit then
//! renders independently; a broken render is accumulated, never fatal, and
//! the response is all-or-nothing at the end.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use minijinja::Environment;
use prost_types::compiler::code_generator_response;
use prost_types::compiler::{CodeGeneratorRequest, CodeGeneratorResponse};
use prost_types::FileDescriptorProto;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use crate::funcs::{self, TemplateFuncs};
use crate::pkg::PackageResolver;
use crate::util;
use crate::view;

/// One (template, target, output) job within a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationUnit {
    /// Template file, relative to the plan's base directory.
    pub template: String,
    /// Additional template files parsed into the same environment, for
    /// `{% include %}` / `{% import %}` from the main template.
    #[serde(default)]
    pub include: Vec<String>,
    /// Input file this unit renders against. Absent (or empty) means the
    /// unit runs exactly once over the whole request instead.
    #[serde(default)]
    pub target: Option<String>,
    /// Output path expression, typically input stem + template extension.
    #[serde(default)]
    pub output: String,
    /// Free-form key/value data exposed to the template as `data`.
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl GenerationUnit {
    fn is_targetless(&self) -> bool {
        self.target.as_deref().is_none_or(str::is_empty)
    }
}

/// The expanded plan: base directory plus ordered generation units.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FileMap {
    #[serde(skip)]
    pub dir: PathBuf,
    #[serde(default, deserialize_with = "null_as_default")]
    pub generate: Vec<GenerationUnit>,
}

impl FileMap {
    /// Resolve a plan-relative path against the base directory. Absolute
    /// paths pass through unchanged.
    fn relative(&self, path: &str) -> PathBuf {
        self.dir.join(path)
    }
}

// A plan that expands to zero units renders `generate:` with a null value;
// map it to an empty list so the invariant check reports it, not serde.
fn null_as_default<'de, D, T>(de: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(de)?.unwrap_or_default())
}

/// Built-in plan used with the `template=` parameter: one target-bound unit
/// per input file, output named after the input stem plus the template's
/// extension.
pub fn basic_file_map(template_path: &str) -> String {
    let template_yaml = serde_yaml::to_string(template_path)
        .unwrap_or_default()
        .trim_end()
        .to_string();
    let ext = util::file_ext(template_path);
    format!(
        "generate:\n\
         {{%- for f in request.proto_file %}}\n\
         {{%- if f.name in request.file_to_generate %}}\n  \
         - template: {template_yaml}\n    \
           target: \"{{{{ f.name }}}}\"\n    \
           output: \"{{{{ f.name | trim_ext }}}}{ext}\"\n\
         {{%- endif %}}\n\
         {{%- endfor %}}\n"
    )
}

/// Runs the generation pipeline for one decoded request.
pub struct Generator {
    /// Request from the protoc compiler, already decoded.
    pub request: CodeGeneratorRequest,
    /// Expanded plan; populated by [`Generator::parse_file_map`].
    pub file_map: FileMap,
    /// Root directory prefix exposed to templates as `options.root_dir`.
    pub root_dir: String,
    /// Base URL for cross-reference routing, exposed as
    /// `options.api_host`.
    pub api_host: String,
    /// Search paths for package inference over dependency files.
    pub proto_path: Vec<PathBuf>,
}

impl Generator {
    pub fn new(request: CodeGeneratorRequest) -> Self {
        Generator {
            request,
            file_map: FileMap::default(),
            root_dir: String::new(),
            api_host: String::new(),
            proto_path: Vec::new(),
        }
    }

    /// Expand and decode a plan.
    ///
    /// Stage one renders `data` as a template against the request view;
    /// stage two decodes the result into units. Decode failure or an empty
    /// unit list is fatal: no generation proceeds from a bad plan.
    pub fn parse_file_map(&mut self, dir: &Path, data: &str) -> anyhow::Result<()> {
        let mut env = Environment::new();
        funcs::register_filters(&mut env);
        let expanded = env
            .render_str(data, json!({ "request": view::request_view(&self.request) }))
            .context("failed to expand file map template")?;

        let mut file_map: FileMap =
            serde_yaml::from_str(&expanded).context("failed to decode file map")?;
        anyhow::ensure!(
            !file_map.generate.is_empty(),
            "no generate entries found in file map"
        );
        file_map.dir = dir.to_path_buf();
        self.file_map = file_map;
        Ok(())
    }

    /// Execute every generation unit and aggregate the response.
    ///
    /// Unit failures are isolated: each failed render appends to the error
    /// log and the run continues. The response boundary is all-or-nothing:
    /// any accumulated error discards all files produced in the same run.
    pub fn generate(&self) -> anyhow::Result<CodeGeneratorResponse> {
        let request_view = view::request_view(&self.request);
        let resolver = Arc::new(PackageResolver::new(self.proto_path.clone()));
        let mut errors = String::new();
        let mut files = Vec::new();

        // Target-bound units, in file order then plan order.
        for file in &self.request.proto_file {
            for unit in &self.file_map.generate {
                if unit.is_targetless() || unit.target.as_deref() != Some(file.name()) {
                    continue;
                }
                match self.run_unit(unit, Some(file), &request_view, &resolver) {
                    Ok(generated) => files.push(generated),
                    Err(err) => {
                        let _ = writeln!(errors, "{}: {err:#}", file.name());
                    }
                }
            }
        }

        // Target-less units run once over the whole request (index pages).
        for unit in &self.file_map.generate {
            if !unit.is_targetless() {
                continue;
            }
            match self.run_unit(unit, None, &request_view, &resolver) {
                Ok(generated) => files.push(generated),
                Err(err) => {
                    let _ = writeln!(errors, "{}: {err:#}", unit.template);
                }
            }
        }

        let mut response = CodeGeneratorResponse::default();
        if errors.is_empty() {
            tracing::debug!(files = files.len(), "generation complete");
            response.file = files;
        } else {
            tracing::warn!("generation failed:\n{errors}");
            response.error = Some(errors);
        }
        Ok(response)
    }

    /// Prepare and render one unit against one file (or the request).
    fn run_unit(
        &self,
        unit: &GenerationUnit,
        file: Option<&FileDescriptorProto>,
        request_view: &serde_json::Value,
        resolver: &Arc<PackageResolver>,
    ) -> anyhow::Result<code_generator_response::File> {
        let mut env = Environment::new();
        for include in &unit.include {
            let path = self.file_map.relative(include);
            let source = fs::read_to_string(&path)
                .with_context(|| format!("failed to read include {}", path.display()))?;
            env.add_template_owned(util::base(include).to_string(), source)?;
        }
        let template_path = self.file_map.relative(&unit.template);
        let source = fs::read_to_string(&template_path)
            .with_context(|| format!("failed to read template {}", template_path.display()))?;
        let template_name = util::base(&unit.template).to_string();
        env.add_template_owned(template_name.clone(), source)?;

        let funcs = Arc::new(TemplateFuncs::new(
            file.map(|f| Arc::new(f.clone())),
            unit.output.clone(),
            util::file_ext(&unit.template).to_string(),
            Arc::clone(resolver),
        ));
        funcs.bind(&mut env);

        let options = json!({
            "root_dir": self.root_dir,
            "api_host": self.api_host,
        });
        let context = match file {
            Some(f) => json!({
                "file": view::file_view(f),
                "generate": unit,
                "data": &unit.data,
                "request": request_view,
                "options": options,
            }),
            None => json!({
                "request": request_view,
                "generate": unit,
                "data": &unit.data,
                "options": options,
            }),
        };

        let content = env.get_template(&template_name)?.render(&context)?;
        Ok(code_generator_response::File {
            name: Some(util::unix_path(&unit.output)),
            content: Some(content),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_file_map_expands_one_unit_per_input_file() {
        let request = CodeGeneratorRequest {
            file_to_generate: vec!["a.proto".to_string()],
            proto_file: vec![
                FileDescriptorProto {
                    name: Some("a.proto".to_string()),
                    ..Default::default()
                },
                FileDescriptorProto {
                    name: Some("dep.proto".to_string()),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let mut generator = Generator::new(request);
        generator
            .parse_file_map(Path::new(""), &basic_file_map("doc/tmpl.html"))
            .unwrap();

        // Only files listed for generation get a unit; dependencies do not.
        assert_eq!(generator.file_map.generate.len(), 1);
        let unit = &generator.file_map.generate[0];
        assert_eq!(unit.template, "doc/tmpl.html");
        assert_eq!(unit.target.as_deref(), Some("a.proto"));
        assert_eq!(unit.output, "a.html");
    }

    #[test]
    fn plan_with_zero_units_is_fatal() {
        let request = CodeGeneratorRequest::default();
        let mut generator = Generator::new(request);
        let err = generator
            .parse_file_map(Path::new(""), &basic_file_map("doc/tmpl.html"))
            .unwrap_err();
        assert!(err.to_string().contains("no generate entries"));
    }

    #[test]
    fn plan_decode_failure_is_fatal() {
        let mut generator = Generator::new(CodeGeneratorRequest::default());
        let err = generator
            .parse_file_map(Path::new(""), "generate: {not: [valid")
            .unwrap_err();
        assert!(err.to_string().contains("file map"));
    }
}
