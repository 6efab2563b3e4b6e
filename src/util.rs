//! Small path/string helpers shared by the generator and the plugin binary.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::bail;

/// Parse the comma-separated parameter string protoc hands to a plugin.
///
/// Tokens are `key` or `key=value` with whitespace trimmed around both
/// sides. Later duplicates overwrite earlier ones.
pub fn parse_params(parameter: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    for token in parameter.split(',') {
        if token.trim().is_empty() {
            continue;
        }
        match token.split_once('=') {
            Some((key, value)) => {
                params.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => {
                params.insert(token.trim().to_string(), String::new());
            }
        }
    }
    params
}

/// Merge `second` into `params` without overriding keys already present.
/// Used for configuration files, which must not beat explicit parameters.
pub fn extend_params(params: &mut HashMap<String, String>, second: HashMap<String, String>) {
    for (k, v) in second {
        params.entry(k).or_insert(v);
    }
}

/// Parse the `PROTO_PATH` environment value into a search-path list.
/// Entries are whitespace-separated; a `--proto_path=` prefix is tolerated
/// so the variable can be built from the protoc invocation verbatim.
pub fn parse_proto_path(value: &str) -> Vec<PathBuf> {
    value
        .split_whitespace()
        .map(|s| s.trim_start_matches("--proto_path="))
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Protobuf-syntax keyword for a numeric field label.
///
/// Anything outside 1..=3 is a contract violation in the descriptor and is
/// reported as an error rather than silently defaulted.
pub fn label_name(label: i32) -> anyhow::Result<&'static str> {
    Ok(match label {
        1 => "optional",
        2 => "required",
        3 => "repeated",
        other => bail!("unknown field label {other}"),
    })
}

/// Protobuf-syntax keyword for a numeric field type, per the standard
/// `FieldDescriptorProto.Type` enumeration (1..=18).
pub fn field_type_name(ty: i32) -> anyhow::Result<&'static str> {
    Ok(match ty {
        1 => "double",
        2 => "float",
        3 => "int64",
        4 => "uint64",
        5 => "int32",
        6 => "fixed64",
        7 => "fixed32",
        8 => "bool",
        9 => "string",
        10 => "group",
        11 => "message",
        12 => "bytes",
        13 => "uint32",
        14 => "enum",
        15 => "sfixed32",
        16 => "sfixed64",
        17 => "sint32",
        18 => "sint64",
        other => bail!("unknown field type {other}"),
    })
}

/// A symbol path is fully-qualified iff it starts with the `.` separator.
pub fn is_fully_qualified(symbol_path: &str) -> bool {
    symbol_path.starts_with('.')
}

/// Normalize a path to forward-slash form and clean it.
///
/// The plugin response protocol requires portable separators in output file
/// names regardless of host convention.
pub fn unix_path(path: &str) -> String {
    clean(&path.replace('\\', "/"))
}

/// Lexical path cleaning over `/`-separated paths: collapses empty and `.`
/// segments, resolves `..` against prior segments, drops trailing slashes.
fn clean(path: &str) -> String {
    let rooted = path.starts_with('/');
    let mut out: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                if out.last().is_some_and(|s| *s != "..") {
                    out.pop();
                } else if !rooted {
                    out.push("..");
                }
            }
            seg => out.push(seg),
        }
    }
    let joined = out.join("/");
    if rooted {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

/// Final path element.
pub fn base(path: &str) -> &str {
    match path.rfind(['/', '\\']) {
        Some(i) => &path[i + 1..],
        None => path,
    }
}

/// Extension of the final path element including the dot, or `""`.
pub fn file_ext(path: &str) -> &str {
    let name = base(path);
    match name.rfind('.') {
        Some(i) => &name[i..],
        None => "",
    }
}

/// Strip the extension (if any) off the final path element.
pub fn strip_ext(path: &str) -> &str {
    let ext = file_ext(path);
    &path[..path.len() - ext.len()]
}

/// Lexical relative path from directory `base_dir` to `target`, both
/// `/`-separated and relative to the same root. Mirrors what the doc URLs
/// need: hop up out of the current file's directory, then down to the
/// declaring file.
pub fn relative_path(base_dir: &str, target: &str) -> String {
    let base_clean = clean(base_dir);
    let target_clean = clean(target);
    if base_clean == "." {
        return target_clean;
    }
    let base_segs: Vec<&str> = base_clean.split('/').filter(|s| !s.is_empty()).collect();
    let target_segs: Vec<&str> = target_clean.split('/').filter(|s| !s.is_empty()).collect();
    let common = base_segs
        .iter()
        .zip(target_segs.iter())
        .take_while(|(a, b)| a == b)
        .count();
    let mut out: Vec<&str> = Vec::new();
    for _ in common..base_segs.len() {
        out.push("..");
    }
    out.extend(&target_segs[common..]);
    if out.is_empty() {
        ".".to_string()
    } else {
        out.join("/")
    }
}

/// Directory part of a `/`-separated file path, `""` for bare names.
pub fn dir_of(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..i],
        None => "",
    }
}
