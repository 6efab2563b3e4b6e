//! Tag-driven traversal of a decoded descriptor tree.
//!
//! `SourceCodeInfo` locations address schema elements by *protobuf field tag
//! numbers* interleaved with repeated-field indices, e.g. `[4, 0, 2, 1]` is
//! `message_type(4)[0].field(2)[1]`. Tag numbers are intrinsic schema
//! metadata, so the walk is driven by static per-type tag tables rather than
//! by the names of the generated Rust fields.

use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, MethodDescriptorProto, OneofDescriptorProto, ServiceDescriptorProto,
};

/// A borrowed reference to one element of the descriptor tree.
///
/// The tree is owned by the decoded request and is read-only for the whole
/// run; nodes are cheap copies of references into it.
#[derive(Clone, Copy, Debug)]
pub enum Node<'a> {
    File(&'a FileDescriptorProto),
    Message(&'a DescriptorProto),
    Field(&'a FieldDescriptorProto),
    Enum(&'a EnumDescriptorProto),
    EnumValue(&'a EnumValueDescriptorProto),
    Service(&'a ServiceDescriptorProto),
    Method(&'a MethodDescriptorProto),
    Oneof(&'a OneofDescriptorProto),
}

/// A repeated member of a record node, selected by its declared tag.
#[derive(Clone, Copy, Debug)]
pub enum NodeList<'a> {
    Messages(&'a [DescriptorProto]),
    Fields(&'a [FieldDescriptorProto]),
    Enums(&'a [EnumDescriptorProto]),
    EnumValues(&'a [EnumValueDescriptorProto]),
    Services(&'a [ServiceDescriptorProto]),
    Methods(&'a [MethodDescriptorProto]),
    Oneofs(&'a [OneofDescriptorProto]),
}

impl<'a> NodeList<'a> {
    pub fn len(&self) -> usize {
        match *self {
            NodeList::Messages(s) => s.len(),
            NodeList::Fields(s) => s.len(),
            NodeList::Enums(s) => s.len(),
            NodeList::EnumValues(s) => s.len(),
            NodeList::Services(s) => s.len(),
            NodeList::Methods(s) => s.len(),
            NodeList::Oneofs(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at a zero-based index, or `None` when out of range.
    pub fn get(&self, index: usize) -> Option<Node<'a>> {
        match *self {
            NodeList::Messages(s) => s.get(index).map(Node::Message),
            NodeList::Fields(s) => s.get(index).map(Node::Field),
            NodeList::Enums(s) => s.get(index).map(Node::Enum),
            NodeList::EnumValues(s) => s.get(index).map(Node::EnumValue),
            NodeList::Services(s) => s.get(index).map(Node::Service),
            NodeList::Methods(s) => s.get(index).map(Node::Method),
            NodeList::Oneofs(s) => s.get(index).map(Node::Oneof),
        }
    }
}

impl<'a> Node<'a> {
    /// Look up the repeated member declared with `tag` on this node.
    ///
    /// The tables mirror `descriptor.proto`. Scalar members (names, numbers,
    /// options) are not addressable nodes and answer `None`; comment entries
    /// pointing at them are simply never indexed.
    pub fn member(&self, tag: i32) -> Option<NodeList<'a>> {
        match *self {
            Node::File(f) => match tag {
                4 => Some(NodeList::Messages(&f.message_type)),
                5 => Some(NodeList::Enums(&f.enum_type)),
                6 => Some(NodeList::Services(&f.service)),
                7 => Some(NodeList::Fields(&f.extension)),
                _ => None,
            },
            Node::Message(m) => match tag {
                2 => Some(NodeList::Fields(&m.field)),
                3 => Some(NodeList::Messages(&m.nested_type)),
                4 => Some(NodeList::Enums(&m.enum_type)),
                6 => Some(NodeList::Fields(&m.extension)),
                8 => Some(NodeList::Oneofs(&m.oneof_decl)),
                _ => None,
            },
            Node::Enum(e) => match tag {
                2 => Some(NodeList::EnumValues(&e.value)),
                _ => None,
            },
            Node::Service(s) => match tag {
                2 => Some(NodeList::Methods(&s.method)),
                _ => None,
            },
            _ => None,
        }
    }

    /// Declared tags of this node's repeated members, in ascending order.
    /// This fixed order is what makes arena ids positionally stable.
    fn member_tags(&self) -> &'static [i32] {
        match self {
            Node::File(_) => &[4, 5, 6, 7],
            Node::Message(_) => &[2, 3, 4, 6, 8],
            Node::Enum(_) => &[2],
            Node::Service(_) => &[2],
            _ => &[],
        }
    }

    /// Identity comparison: two nodes are the same only when they wrap the
    /// same position in the same tree. Structurally equal values at distinct
    /// positions stay distinct.
    pub fn same(&self, other: &Node<'a>) -> bool {
        match (self, other) {
            (Node::File(a), Node::File(b)) => std::ptr::eq(*a, *b),
            (Node::Message(a), Node::Message(b)) => std::ptr::eq(*a, *b),
            (Node::Field(a), Node::Field(b)) => std::ptr::eq(*a, *b),
            (Node::Enum(a), Node::Enum(b)) => std::ptr::eq(*a, *b),
            (Node::EnumValue(a), Node::EnumValue(b)) => std::ptr::eq(*a, *b),
            (Node::Service(a), Node::Service(b)) => std::ptr::eq(*a, *b),
            (Node::Method(a), Node::Method(b)) => std::ptr::eq(*a, *b),
            (Node::Oneof(a), Node::Oneof(b)) => std::ptr::eq(*a, *b),
            _ => false,
        }
    }
}

/// Resolve a numeric source-info path against `root`.
///
/// The empty path is the root itself. Each step selects a member by tag and
/// then an element by index; only the matching branch is descended. Any miss
/// (unknown tag, out-of-range index, path ending on the repeated member
/// itself) yields `None` and never aborts the run.
pub fn resolve<'a>(root: Node<'a>, path: &[i32]) -> Option<Node<'a>> {
    let mut node = root;
    let mut rest = path;
    while let [tag, after_tag @ ..] = rest {
        let list = node.member(*tag)?;
        let [index, tail @ ..] = after_tag else {
            // A path stopping on the repeated member has no single node.
            return None;
        };
        let index = usize::try_from(*index).ok()?;
        node = list.get(index)?;
        rest = tail;
    }
    Some(node)
}

/// Per-file arena assigning every node a stable integer id.
///
/// Ids are handed out by a deterministic depth-first walk in tag order, so
/// two builds over equal trees (even over distinct clones) agree on every id.
/// This is the identity basis for the location index: duplicate values at
/// different positions keep different ids.
pub struct FileArena<'a> {
    nodes: Vec<Node<'a>>,
}

impl<'a> FileArena<'a> {
    pub fn build(file: &'a FileDescriptorProto) -> Self {
        let mut nodes = Vec::new();
        push_subtree(Node::File(file), &mut nodes);
        FileArena { nodes }
    }

    /// Id of `node` within this arena, by identity.
    pub fn id_of(&self, node: Node<'a>) -> Option<usize> {
        self.nodes.iter().position(|n| n.same(&node))
    }

    pub fn get(&self, id: usize) -> Option<Node<'a>> {
        self.nodes.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

fn push_subtree<'a>(node: Node<'a>, out: &mut Vec<Node<'a>>) {
    out.push(node);
    for &tag in node.member_tags() {
        if let Some(list) = node.member(tag) {
            for i in 0..list.len() {
                if let Some(child) = list.get(i) {
                    push_subtree(child, out);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(name: &str, number: i32) -> FieldDescriptorProto {
        FieldDescriptorProto {
            name: Some(name.to_string()),
            number: Some(number),
            label: Some(1),
            r#type: Some(9),
            ..Default::default()
        }
    }

    fn fixture() -> FileDescriptorProto {
        FileDescriptorProto {
            name: Some("test.proto".to_string()),
            package: Some("test".to_string()),
            message_type: vec![
                DescriptorProto {
                    name: Some("Outer".to_string()),
                    field: vec![field("first", 1), field("second", 2)],
                    nested_type: vec![DescriptorProto {
                        name: Some("Inner".to_string()),
                        field: vec![field("inner_field", 1)],
                        ..Default::default()
                    }],
                    ..Default::default()
                },
                DescriptorProto {
                    name: Some("Other".to_string()),
                    ..Default::default()
                },
            ],
            enum_type: vec![EnumDescriptorProto {
                name: Some("Kind".to_string()),
                value: vec![EnumValueDescriptorProto {
                    name: Some("KIND_A".to_string()),
                    number: Some(0),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            service: vec![ServiceDescriptorProto {
                name: Some("Svc".to_string()),
                method: vec![MethodDescriptorProto {
                    name: Some("Call".to_string()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn empty_path_resolves_to_root() {
        let file = fixture();
        let node = resolve(Node::File(&file), &[]).unwrap();
        assert!(matches!(node, Node::File(f) if std::ptr::eq(f, &file)));
    }

    #[test]
    fn resolves_nested_field_by_tag_path() {
        let file = fixture();
        let node = resolve(Node::File(&file), &[4, 0, 2, 1]).unwrap();
        match node {
            Node::Field(f) => assert_eq!(f.name(), "second"),
            other => panic!("expected field, got {other:?}"),
        }
        let node = resolve(Node::File(&file), &[4, 0, 3, 0, 2, 0]).unwrap();
        match node {
            Node::Field(f) => assert_eq!(f.name(), "inner_field"),
            other => panic!("expected field, got {other:?}"),
        }
    }

    #[test]
    fn resolves_enum_value_and_method() {
        let file = fixture();
        match resolve(Node::File(&file), &[5, 0, 2, 0]).unwrap() {
            Node::EnumValue(v) => assert_eq!(v.name(), "KIND_A"),
            other => panic!("expected enum value, got {other:?}"),
        }
        match resolve(Node::File(&file), &[6, 0, 2, 0]).unwrap() {
            Node::Method(m) => assert_eq!(m.name(), "Call"),
            other => panic!("expected method, got {other:?}"),
        }
    }

    #[test]
    fn invalid_steps_return_none_without_panicking() {
        let file = fixture();
        let root = Node::File(&file);
        assert!(resolve(root, &[99]).is_none());
        assert!(resolve(root, &[99, 0]).is_none());
        assert!(resolve(root, &[4, 7]).is_none());
        assert!(resolve(root, &[4, -1]).is_none());
        assert!(resolve(root, &[4, 0, 2, 1, 5, 0]).is_none());
        // Path ending on the repeated member itself is not a node.
        assert!(resolve(root, &[4]).is_none());
    }

    #[test]
    fn resolution_is_deterministic() {
        let file = fixture();
        let a = resolve(Node::File(&file), &[4, 0, 2, 0]).unwrap();
        let b = resolve(Node::File(&file), &[4, 0, 2, 0]).unwrap();
        assert!(a.same(&b));
    }

    #[test]
    fn arena_ids_are_stable_across_builds_of_equal_trees() {
        let file = fixture();
        let clone = file.clone();
        let a = FileArena::build(&file);
        let b = FileArena::build(&clone);
        assert_eq!(a.len(), b.len());
        let node = resolve(Node::File(&file), &[4, 0, 2, 1]).unwrap();
        let twin = resolve(Node::File(&clone), &[4, 0, 2, 1]).unwrap();
        assert_eq!(a.id_of(node), b.id_of(twin));
    }

    #[test]
    fn structurally_equal_nodes_keep_distinct_ids() {
        let mut file = fixture();
        // Two messages with identical contents at different positions.
        file.message_type = vec![
            DescriptorProto {
                name: Some("Dup".to_string()),
                ..Default::default()
            },
            DescriptorProto {
                name: Some("Dup".to_string()),
                ..Default::default()
            },
        ];
        let arena = FileArena::build(&file);
        let first = resolve(Node::File(&file), &[4, 0]).unwrap();
        let second = resolve(Node::File(&file), &[4, 1]).unwrap();
        assert_ne!(arena.id_of(first), arena.id_of(second));
        assert!(!first.same(&second));
    }
}
