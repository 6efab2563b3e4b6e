//! `protoc-gen-doc`: protoc plugin entry point.
//!
//! protoc invokes the plugin with a binary-encoded `CodeGeneratorRequest`
//! on stdin and expects a binary-encoded `CodeGeneratorResponse` on stdout.
//! All diagnostics go to stderr; any error returned from `main` is a fatal
//! setup failure and terminates the process before output is written.
//!
//! Recognized parameters (comma-separated `key` / `key=value`, passed via
//! `--doc_opt=` or the plugin parameter):
//!
//! - `template=<path>`  render this template once per input file
//! - `filemap=<path>`   use a plan file instead (exclusive with `template`)
//! - `conf=<path>`      read more `key=value` pairs, without overriding
//! - `root=<dir>`       root directory exposed to templates
//! - `apihost=<url>`    base URL exposed to templates
//! - `dump-filemap=<path>`  write the expanded plan for diagnosis
//!
//! The `PROTO_PATH` environment variable supplies the search paths used to
//! infer package names from dependency files.

use std::env;
use std::fs;
use std::io::{self, Read as _, Write as _};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use prost::Message as _;
use prost_types::compiler::CodeGeneratorRequest;
use tracing_subscriber::EnvFilter;

use protodoc::{basic_file_map, util, Generator};

/// Plan template used when neither `template` nor `filemap` is supplied.
const DEFAULT_TEMPLATE: &str = "templates/tmpl.html";

fn main() -> anyhow::Result<()> {
    // stdout carries the encoded response, so logging must stay on stderr.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let mut input = Vec::new();
    io::stdin()
        .read_to_end(&mut input)
        .context("failed to read input")?;
    let request =
        CodeGeneratorRequest::decode(input.as_slice()).context("failed to parse input proto")?;
    anyhow::ensure!(!request.file_to_generate.is_empty(), "no input files");

    let mut params = util::parse_params(request.parameter());
    if let Some(conf) = params.get("conf").cloned() {
        let text =
            fs::read_to_string(&conf).with_context(|| format!("could not read conf file {conf}"))?;
        util::extend_params(&mut params, util::parse_params(&text));
    }

    let template = params.get("template");
    let filemap = params.get("filemap");
    anyhow::ensure!(
        template.is_none() || filemap.is_none(),
        "expected either template or filemap argument, not both"
    );

    // Build the plan: an explicit plan file, or the built-in one-unit-per-
    // input-file expansion around a single template.
    let (file_map_dir, file_map_data) = if let Some(template) = template {
        (PathBuf::new(), basic_file_map(template))
    } else if let Some(filemap) = filemap {
        let data = fs::read_to_string(filemap)
            .with_context(|| format!("failed to read file map {filemap}"))?;
        let dir = Path::new(filemap)
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .to_path_buf();
        (dir, data)
    } else {
        (PathBuf::new(), basic_file_map(DEFAULT_TEMPLATE))
    };

    let mut generator = Generator::new(request);
    generator.proto_path = util::parse_proto_path(&env::var("PROTO_PATH").unwrap_or_default());
    generator
        .parse_file_map(&file_map_dir, &file_map_data)
        .context("failed to parse file map")?;

    if let Some(dump) = params.get("dump-filemap") {
        let dump_text =
            serde_yaml::to_string(&generator.file_map).context("failed to encode file map")?;
        fs::write(dump, dump_text)
            .with_context(|| format!("failed to write dump file {dump}"))?;
    }

    generator.root_dir = match params.get("root") {
        Some(root) => root.clone(),
        None => env::current_dir()
            .context("failed to determine working directory")?
            .display()
            .to_string(),
    };
    if let Some(apihost) = params.get("apihost") {
        generator.api_host = apihost.clone();
    }

    let response = generator.generate().context("failed to generate")?;

    let mut output = Vec::new();
    response
        .encode(&mut output)
        .context("failed to encode output proto")?;
    io::stdout()
        .write_all(&output)
        .context("failed to write output proto")?;
    Ok(())
}
