//! JSON views of descriptor trees for template contexts.
//!
//! The decoded descriptors are exposed to templates as `serde_json::Value`
//! trees whose keys mirror the descriptor field names. Every node carries
//! two markers: `_id`, its arena id within the owning file (the identity
//! handle `location()` resolves against), and `_file`, the owning file's
//! name (so lookups against a different file's runtime answer none instead
//! of hitting a colliding id).

use prost_types::compiler::CodeGeneratorRequest;
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    ServiceDescriptorProto,
};
use serde_json::{json, Value};

use crate::walk::{FileArena, Node};

/// View of the whole request, used by the plan expansion stage and by
/// target-less generation units.
pub fn request_view(request: &CodeGeneratorRequest) -> Value {
    json!({
        "file_to_generate": &request.file_to_generate,
        "parameter": request.parameter.clone().unwrap_or_default(),
        "proto_file": request
            .proto_file
            .iter()
            .map(file_view)
            .collect::<Vec<_>>(),
    })
}

/// View of a single file, used as the render context for target-bound units.
pub fn file_view(file: &FileDescriptorProto) -> Value {
    let arena = FileArena::build(file);
    let file_name = file.name().to_string();
    json!({
        "_id": id_value(&arena, Node::File(file)),
        "_file": file_name,
        "name": file.name(),
        "package": file.package(),
        "syntax": file.syntax(),
        "dependency": &file.dependency,
        "message_type": file
            .message_type
            .iter()
            .map(|m| message_view(m, &arena, &file_name))
            .collect::<Vec<_>>(),
        "enum_type": file
            .enum_type
            .iter()
            .map(|e| enum_view(e, &arena, &file_name))
            .collect::<Vec<_>>(),
        "service": file
            .service
            .iter()
            .map(|s| service_view(s, &arena, &file_name))
            .collect::<Vec<_>>(),
        "extension": file
            .extension
            .iter()
            .map(|f| field_view(f, &arena, &file_name))
            .collect::<Vec<_>>(),
    })
}

fn message_view(message: &DescriptorProto, arena: &FileArena, file_name: &str) -> Value {
    json!({
        "_id": id_value(arena, Node::Message(message)),
        "_file": file_name,
        "name": message.name(),
        "field": message
            .field
            .iter()
            .map(|f| field_view(f, arena, file_name))
            .collect::<Vec<_>>(),
        "nested_type": message
            .nested_type
            .iter()
            .map(|m| message_view(m, arena, file_name))
            .collect::<Vec<_>>(),
        "enum_type": message
            .enum_type
            .iter()
            .map(|e| enum_view(e, arena, file_name))
            .collect::<Vec<_>>(),
        "oneof_decl": message
            .oneof_decl
            .iter()
            .map(|o| {
                json!({
                    "_id": id_value(arena, Node::Oneof(o)),
                    "_file": file_name,
                    "name": o.name(),
                })
            })
            .collect::<Vec<_>>(),
    })
}

fn field_view(field: &FieldDescriptorProto, arena: &FileArena, file_name: &str) -> Value {
    json!({
        "_id": id_value(arena, Node::Field(field)),
        "_file": file_name,
        "name": field.name(),
        "number": field.number.unwrap_or_default(),
        // Raw numeric label/type; templates prettify via clean_label /
        // field_type, which reject out-of-range values.
        "label": field.label.unwrap_or_default(),
        "type": field.r#type.unwrap_or_default(),
        "type_name": field.type_name.clone().unwrap_or_default(),
        "default_value": field.default_value.clone().unwrap_or_default(),
        "json_name": field.json_name.clone().unwrap_or_default(),
        "oneof_index": field.oneof_index,
    })
}

fn enum_view(e: &EnumDescriptorProto, arena: &FileArena, file_name: &str) -> Value {
    json!({
        "_id": id_value(arena, Node::Enum(e)),
        "_file": file_name,
        "name": e.name(),
        "value": e
            .value
            .iter()
            .map(|v| {
                json!({
                    "_id": id_value(arena, Node::EnumValue(v)),
                    "_file": file_name,
                    "name": v.name(),
                    "number": v.number.unwrap_or_default(),
                })
            })
            .collect::<Vec<_>>(),
    })
}

fn service_view(service: &ServiceDescriptorProto, arena: &FileArena, file_name: &str) -> Value {
    json!({
        "_id": id_value(arena, Node::Service(service)),
        "_file": file_name,
        "name": service.name(),
        "method": service
            .method
            .iter()
            .map(|m| {
                json!({
                    "_id": id_value(arena, Node::Method(m)),
                    "_file": file_name,
                    "name": m.name(),
                    "input_type": m.input_type.clone().unwrap_or_default(),
                    "output_type": m.output_type.clone().unwrap_or_default(),
                    "client_streaming": m.client_streaming.unwrap_or_default(),
                    "server_streaming": m.server_streaming.unwrap_or_default(),
                })
            })
            .collect::<Vec<_>>(),
    })
}

fn id_value(arena: &FileArena, node: Node) -> Value {
    match arena.id_of(node) {
        Some(id) => Value::from(id),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk::resolve;

    fn fixture() -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("v/test.proto".to_string()),
            package: Some("v".to_string()),
            message_type: vec![DescriptorProto {
                name: Some("Msg".to_string()),
                field: vec![FieldDescriptorProto {
                    name: Some("title".to_string()),
                    number: Some(1),
                    label: Some(1),
                    r#type: Some(9),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn view_ids_agree_with_arena_ids() {
        let file = fixture();
        let arena = FileArena::build(&file);
        let view = file_view(&file);

        let field_node = resolve(Node::File(&file), &[4, 0, 2, 0]).unwrap();
        let field_id = arena.id_of(field_node).unwrap();
        assert_eq!(
            view["message_type"][0]["field"][0]["_id"],
            Value::from(field_id)
        );
        assert_eq!(view["message_type"][0]["field"][0]["_file"], "v/test.proto");
    }

    #[test]
    fn field_view_keeps_raw_numeric_label_and_type() {
        let view = file_view(&fixture());
        let field = &view["message_type"][0]["field"][0];
        assert_eq!(field["label"], 1);
        assert_eq!(field["type"], 9);
        assert_eq!(field["name"], "title");
    }

    #[test]
    fn request_view_lists_files_and_parameter() {
        let request = CodeGeneratorRequest {
            file_to_generate: vec!["v/test.proto".to_string()],
            parameter: Some("template=doc.html".to_string()),
            proto_file: vec![fixture()],
            ..Default::default()
        };
        let view = request_view(&request);
        assert_eq!(view["file_to_generate"][0], "v/test.proto");
        assert_eq!(view["parameter"], "template=doc.html");
        assert_eq!(view["proto_file"][0]["package"], "v");
    }
}
