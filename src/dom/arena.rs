//! Arena-based DOM for HTML parsing and rewriting.
//!
//! The adaptation engine needs a tree it can mutate heavily: retagging
//! elements, stripping attributes, detaching subtrees, and injecting
//! materialized pseudo-elements. All nodes live in a contiguous vector;
//! parent/child/sibling links are indices into that vector, so node ids
//! stay valid across structural edits (a detached node is simply
//! unreachable from the document root).

use std::collections::HashMap;

use html5ever::{LocalName, Namespace, QualName, ns};

/// Unique identifier for a node in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Sentinel value for no node.
    pub const NONE: NodeId = NodeId(u32::MAX);

    pub fn is_some(&self) -> bool {
        self.0 != u32::MAX
    }

    pub fn is_none(&self) -> bool {
        self.0 == u32::MAX
    }
}

/// Node type in the arena DOM.
#[derive(Debug, Clone)]
pub enum NodeData {
    /// Document root.
    Document,
    /// Element with name and attributes.
    Element {
        name: QualName,
        attrs: Vec<Attribute>,
        /// Pre-extracted id for fast matching.
        id: Option<String>,
        /// Pre-extracted classes for fast matching.
        classes: Vec<String>,
    },
    /// Text content.
    Text(String),
    /// Comment (kept for TreeSink, skipped by the serializer).
    Comment(String),
    /// Document type declaration.
    Doctype { name: String },
}

/// HTML attribute.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: QualName,
    pub value: String,
}

/// A node in the arena DOM.
#[derive(Debug)]
pub struct Node {
    pub data: NodeData,
    pub parent: NodeId,
    pub first_child: NodeId,
    pub last_child: NodeId,
    pub prev_sibling: NodeId,
    pub next_sibling: NodeId,
}

impl Node {
    fn new(data: NodeData) -> Self {
        Self {
            data,
            parent: NodeId::NONE,
            first_child: NodeId::NONE,
            last_child: NodeId::NONE,
            prev_sibling: NodeId::NONE,
            next_sibling: NodeId::NONE,
        }
    }
}

/// Arena-based DOM tree.
pub struct Dom {
    nodes: Vec<Node>,
    document: NodeId,
    id_map: HashMap<String, NodeId>,
}

impl Dom {
    /// Create a new empty DOM with a document root.
    pub fn new() -> Self {
        let mut dom = Self {
            nodes: Vec::new(),
            document: NodeId::NONE,
            id_map: HashMap::new(),
        };
        dom.document = dom.alloc(Node::new(NodeData::Document));
        dom
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn document(&self) -> NodeId {
        self.document
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        if id.is_none() {
            return None;
        }
        self.nodes.get_mut(id.0 as usize)
    }

    /// Create a new element node.
    pub fn create_element(&mut self, name: QualName, attrs: Vec<Attribute>) -> NodeId {
        // Pre-extract id and class for fast CSS matching
        let mut id = None;
        let mut classes = Vec::new();

        for attr in &attrs {
            if attr.name.local.as_ref() == "id" {
                id = Some(attr.value.clone());
            } else if attr.name.local.as_ref() == "class" {
                classes = attr
                    .value
                    .split_whitespace()
                    .map(|s| s.to_string())
                    .collect();
            }
        }

        let node_id = self.alloc(Node::new(NodeData::Element {
            name,
            attrs,
            id: id.clone(),
            classes,
        }));

        if let Some(id_str) = id {
            self.id_map.insert(id_str, node_id);
        }

        node_id
    }

    /// Create an element in the HTML namespace by local name.
    pub fn create_html_element(&mut self, local: &str) -> NodeId {
        let name = QualName::new(None, ns!(html), LocalName::from(local));
        self.create_element(name, Vec::new())
    }

    pub fn create_text(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Text(text)))
    }

    pub fn create_comment(&mut self, text: String) -> NodeId {
        self.alloc(Node::new(NodeData::Comment(text)))
    }

    pub fn create_doctype(&mut self, name: String) -> NodeId {
        self.alloc(Node::new(NodeData::Doctype { name }))
    }

    /// Append a child to a parent node.
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(child_node) = self.get_mut(child) {
            child_node.parent = parent;
            child_node.prev_sibling = last_child;
            child_node.next_sibling = NodeId::NONE;
        }

        if last_child.is_some()
            && let Some(last_node) = self.get_mut(last_child)
        {
            last_node.next_sibling = child;
        }

        if let Some(parent_node) = self.get_mut(parent) {
            if parent_node.first_child.is_none() {
                parent_node.first_child = child;
            }
            parent_node.last_child = child;
        }
    }

    /// Insert a node as the first child of a parent.
    pub fn prepend(&mut self, parent: NodeId, child: NodeId) {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        if first.is_some() {
            self.insert_before(first, child);
        } else {
            self.append(parent, child);
        }
    }

    /// Insert a node before a sibling.
    pub fn insert_before(&mut self, sibling: NodeId, new_node: NodeId) {
        let parent = self.get(sibling).map(|n| n.parent).unwrap_or(NodeId::NONE);
        let prev = self
            .get(sibling)
            .map(|n| n.prev_sibling)
            .unwrap_or(NodeId::NONE);

        if let Some(new) = self.get_mut(new_node) {
            new.parent = parent;
            new.prev_sibling = prev;
            new.next_sibling = sibling;
        }

        if let Some(sib) = self.get_mut(sibling) {
            sib.prev_sibling = new_node;
        }

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = new_node;
            }
        } else if let Some(par) = self.get_mut(parent) {
            par.first_child = new_node;
        }
    }

    /// Unlink a node (and implicitly its subtree) from its parent.
    pub fn detach(&mut self, id: NodeId) {
        let (parent, prev, next) = {
            let node = match self.get(id) {
                Some(n) => n,
                None => return,
            };
            (node.parent, node.prev_sibling, node.next_sibling)
        };

        if prev.is_some() {
            if let Some(p) = self.get_mut(prev) {
                p.next_sibling = next;
            }
        } else if parent.is_some()
            && let Some(p) = self.get_mut(parent)
        {
            p.first_child = next;
        }

        if next.is_some() {
            if let Some(n) = self.get_mut(next) {
                n.prev_sibling = prev;
            }
        } else if parent.is_some()
            && let Some(p) = self.get_mut(parent)
        {
            p.last_child = prev;
        }

        if let Some(node) = self.get_mut(id) {
            node.parent = NodeId::NONE;
            node.prev_sibling = NodeId::NONE;
            node.next_sibling = NodeId::NONE;
        }
    }

    /// Append text to an existing text node, or create new if last child isn't text.
    pub fn append_text(&mut self, parent: NodeId, text: &str) {
        let last_child = self
            .get(parent)
            .map(|n| n.last_child)
            .unwrap_or(NodeId::NONE);

        if let Some(last) = self.get_mut(last_child)
            && let NodeData::Text(ref mut existing) = last.data
        {
            existing.push_str(text);
            return;
        }

        let text_node = self.create_text(text.to_string());
        self.append(parent, text_node);
    }

    pub fn get_by_id(&self, id: &str) -> Option<NodeId> {
        self.id_map.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// Iterate over children of a node.
    pub fn children(&self, parent: NodeId) -> Children<'_> {
        let first = self
            .get(parent)
            .map(|n| n.first_child)
            .unwrap_or(NodeId::NONE);
        Children {
            dom: self,
            current: first,
        }
    }

    /// All descendant element ids of `root` in document order, excluding `root`.
    ///
    /// The ids are collected up front so callers can mutate the tree while
    /// walking the list (detached nodes are the caller's concern).
    pub fn descendant_elements(&self, root: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = {
            let mut kids: Vec<_> = self.children(root).collect();
            kids.reverse();
            kids
        };
        while let Some(id) = stack.pop() {
            if self.is_element(id) {
                out.push(id);
            }
            let mut kids: Vec<_> = self.children(id).collect();
            kids.reverse();
            stack.extend(kids);
        }
        out
    }

    /// True when `id` is still reachable from `root` through parent links.
    pub fn is_attached_to(&self, id: NodeId, root: NodeId) -> bool {
        let mut current = id;
        while current.is_some() {
            if current == root {
                return true;
            }
            current = self.get(current).map(|n| n.parent).unwrap_or(NodeId::NONE);
        }
        false
    }

    /// Find the first element matching a predicate (DFS).
    pub fn find<F>(&self, predicate: F) -> Option<NodeId>
    where
        F: Fn(&Node) -> bool,
    {
        let mut stack = vec![self.document];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.get(id) {
                if predicate(node) {
                    return Some(id);
                }
                let mut children: Vec<_> = self.children(id).collect();
                children.reverse();
                stack.extend(children);
            }
        }
        None
    }

    /// Find element by tag name (first match).
    pub fn find_by_tag(&self, tag: &str) -> Option<NodeId> {
        self.find(|node| {
            if let NodeData::Element { name, .. } = &node.data {
                name.local.as_ref() == tag
            } else {
                false
            }
        })
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over children of a node.
pub struct Children<'a> {
    dom: &'a Dom,
    current: NodeId,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current.is_none() {
            return None;
        }
        let id = self.current;
        self.current = self
            .dom
            .get(id)
            .map(|n| n.next_sibling)
            .unwrap_or(NodeId::NONE);
        Some(id)
    }
}

/// Element accessors and mutators.
impl Dom {
    pub fn element_name(&self, id: NodeId) -> Option<&LocalName> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.local),
            _ => None,
        })
    }

    pub fn element_namespace(&self, id: NodeId) -> Option<&Namespace> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { name, .. } => Some(&name.ns),
            _ => None,
        })
    }

    pub fn attrs(&self, id: NodeId) -> &[Attribute] {
        static EMPTY: &[Attribute] = &[];
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { attrs, .. } => Some(attrs.as_slice()),
                _ => None,
            })
            .unwrap_or(EMPTY)
    }

    pub fn get_attr(&self, id: NodeId, attr_name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|a| a.name.local.as_ref() == attr_name)
            .map(|a| a.value.as_str())
    }

    /// Set (or replace) an attribute on an element.
    pub fn set_attr(&mut self, id: NodeId, attr_name: &str, value: &str) {
        if let Some(node) = self.get_mut(id)
            && let NodeData::Element { attrs, classes, .. } = &mut node.data
        {
            if attr_name == "class" {
                *classes = value.split_whitespace().map(|s| s.to_string()).collect();
            }
            if let Some(attr) = attrs.iter_mut().find(|a| a.name.local.as_ref() == attr_name) {
                attr.value = value.to_string();
                return;
            }
            attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(attr_name)),
                value: value.to_string(),
            });
        }
    }

    pub fn remove_attr(&mut self, id: NodeId, attr_name: &str) {
        if let Some(node) = self.get_mut(id)
            && let NodeData::Element { attrs, classes, .. } = &mut node.data
        {
            if attr_name == "class" {
                classes.clear();
            }
            attrs.retain(|a| a.name.local.as_ref() != attr_name);
        }
    }

    /// Append a fragment to the element's `style` attribute, `; `-joined.
    pub fn append_style(&mut self, id: NodeId, extra: &str) {
        let merged = match self.get_attr(id, "style") {
            Some(existing) if !existing.trim().is_empty() => {
                format!("{}; {}", existing.trim_end_matches([';', ' ']), extra)
            }
            _ => extra.to_string(),
        };
        self.set_attr(id, "style", &merged);
    }

    /// Append a class name unless already present.
    pub fn append_class(&mut self, id: NodeId, class: &str) {
        let current = self.get_attr(id, "class").unwrap_or("").to_string();
        if current.split_whitespace().any(|c| c == class) {
            return;
        }
        let merged = if current.is_empty() {
            class.to_string()
        } else {
            format!("{current} {class}")
        };
        self.set_attr(id, "class", &merged);
    }

    /// Replace the element's tag name, keeping children and dropping all
    /// attributes except those accepted by `keep_attr`.
    pub fn retag<F>(&mut self, id: NodeId, new_local: &str, keep_attr: F)
    where
        F: Fn(&str) -> bool,
    {
        if let Some(node) = self.get_mut(id)
            && let NodeData::Element {
                name,
                attrs,
                id: elem_id,
                classes,
            } = &mut node.data
        {
            *name = QualName::new(None, ns!(html), LocalName::from(new_local));
            attrs.retain(|a| keep_attr(a.name.local.as_ref()));
            if !attrs.iter().any(|a| a.name.local.as_ref() == "id") {
                *elem_id = None;
            }
            if !attrs.iter().any(|a| a.name.local.as_ref() == "class") {
                classes.clear();
            }
        }
    }

    pub fn element_id(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Element { id, .. } => id.as_deref(),
            _ => None,
        })
    }

    pub fn element_classes(&self, id: NodeId) -> &[String] {
        static EMPTY: &[String] = &[];
        self.get(id)
            .and_then(|n| match &n.data {
                NodeData::Element { classes, .. } => Some(classes.as_slice()),
                _ => None,
            })
            .unwrap_or(EMPTY)
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Element { .. }))
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.get(id)
            .is_some_and(|n| matches!(n.data, NodeData::Text(_)))
    }

    pub fn text_content(&self, id: NodeId) -> Option<&str> {
        self.get(id).and_then(|n| match &n.data {
            NodeData::Text(s) => Some(s.as_str()),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_qname(local: &str) -> QualName {
        QualName::new(None, ns!(html), LocalName::from(local))
    }

    #[test]
    fn test_create_elements() {
        let mut dom = Dom::new();

        let div = dom.create_element(
            make_qname("div"),
            vec![Attribute {
                name: make_qname("id"),
                value: "main".to_string(),
            }],
        );

        dom.append(dom.document(), div);

        assert_eq!(dom.element_name(div).unwrap().as_ref(), "div");
        assert_eq!(dom.element_id(div), Some("main"));
        assert_eq!(dom.get_by_id("main"), Some(div));
    }

    #[test]
    fn test_retag_keeps_children_filters_attrs() {
        let mut dom = Dom::new();
        let section = dom.create_element(
            make_qname("section"),
            vec![
                Attribute {
                    name: make_qname("class"),
                    value: "hero".to_string(),
                },
                Attribute {
                    name: make_qname("onclick"),
                    value: "evil()".to_string(),
                },
            ],
        );
        dom.append(dom.document(), section);
        let p = dom.create_element(make_qname("p"), vec![]);
        dom.append(section, p);

        dom.retag(section, "div", |name| name == "class");

        assert_eq!(dom.element_name(section).unwrap().as_ref(), "div");
        assert_eq!(dom.get_attr(section, "class"), Some("hero"));
        assert_eq!(dom.get_attr(section, "onclick"), None);
        assert_eq!(dom.children(section).count(), 1);
    }

    #[test]
    fn test_detach() {
        let mut dom = Dom::new();
        let parent = dom.create_element(make_qname("div"), vec![]);
        let a = dom.create_element(make_qname("p"), vec![]);
        let b = dom.create_element(make_qname("p"), vec![]);
        dom.append(dom.document(), parent);
        dom.append(parent, a);
        dom.append(parent, b);

        dom.detach(a);

        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, vec![b]);
        assert!(!dom.is_attached_to(a, dom.document()));
        assert!(dom.is_attached_to(b, dom.document()));
    }

    #[test]
    fn test_append_style_and_class() {
        let mut dom = Dom::new();
        let p = dom.create_element(make_qname("p"), vec![]);
        dom.append(dom.document(), p);

        dom.append_style(p, "color: red");
        dom.append_style(p, "margin: 0");
        assert_eq!(dom.get_attr(p, "style"), Some("color: red; margin: 0"));

        dom.append_class(p, "wechat-p");
        dom.append_class(p, "wechat-p");
        assert_eq!(dom.get_attr(p, "class"), Some("wechat-p"));
    }

    #[test]
    fn test_prepend() {
        let mut dom = Dom::new();
        let parent = dom.create_element(make_qname("div"), vec![]);
        dom.append(dom.document(), parent);
        let a = dom.create_element(make_qname("span"), vec![]);
        let b = dom.create_element(make_qname("span"), vec![]);
        dom.append(parent, a);
        dom.prepend(parent, b);

        let children: Vec<_> = dom.children(parent).collect();
        assert_eq!(children, vec![b, a]);
    }

    #[test]
    fn test_text_merging() {
        let mut dom = Dom::new();

        let p = dom.create_element(make_qname("p"), vec![]);
        dom.append(dom.document(), p);

        dom.append_text(p, "Hello, ");
        dom.append_text(p, "World!");

        let children: Vec<_> = dom.children(p).collect();
        assert_eq!(children.len(), 1);
        assert_eq!(dom.text_content(children[0]), Some("Hello, World!"));
    }
}
