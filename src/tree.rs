//! Hierarchical view of a repository's flat path listing

use crate::github::{EntryKind, TreeEntry};
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Serialize, Serializer};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Directory,
    File,
}

/// One node of the repository tree.
///
/// Built once by [`FileTreeNode::from_entries`] or
/// [`FileTreeNode::from_paths`]; at every level directories come before
/// files and siblings are ordered case-insensitively by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTreeNode {
    name: String,
    kind: NodeKind,
    path: String,
    children: Vec<FileTreeNode>,
}

impl FileTreeNode {
    fn new(name: &str, kind: NodeKind, path: &str) -> Self {
        Self {
            name: name.to_string(),
            kind,
            path: path.to_string(),
            children: Vec::new(),
        }
    }

    fn root() -> Self {
        Self::new("root", NodeKind::Directory, "")
    }

    /// Builds the tree from a recursive listing. `tree` entries become
    /// directories; blobs and submodules become files.
    pub fn from_entries(entries: &[TreeEntry]) -> Self {
        let mut root = Self::root();
        for entry in entries {
            let kind = match entry.kind {
                EntryKind::Tree => NodeKind::Directory,
                EntryKind::Blob | EntryKind::Commit => NodeKind::File,
            };
            root.insert(&entry.path, kind);
        }
        root.sort_recursive();
        root
    }

    /// Builds the tree treating every path as a file
    pub fn from_paths<S: AsRef<str>>(paths: &[S]) -> Self {
        let mut root = Self::root();
        for path in paths {
            root.insert(path.as_ref(), NodeKind::File);
        }
        root.sort_recursive();
        root
    }

    fn insert(&mut self, path: &str, leaf_kind: NodeKind) {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut current = self;

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i + 1 == segments.len();
            let kind = if is_last { leaf_kind } else { NodeKind::Directory };

            let index = match current.children.iter().position(|c| c.name == *segment) {
                Some(index) => {
                    // A path seen earlier as a file turned out to have children.
                    if kind == NodeKind::Directory {
                        current.children[index].kind = NodeKind::Directory;
                    }
                    index
                }
                None => {
                    let child_path = segments[..=i].join("/");
                    current.children.push(Self::new(segment, kind, &child_path));
                    current.children.len() - 1
                }
            };
            current = &mut current.children[index];
        }
    }

    fn sort_recursive(&mut self) {
        self.children.sort_by(compare_nodes);
        for child in &mut self.children {
            child.sort_recursive();
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn children(&self) -> &[FileTreeNode] {
        &self.children
    }

    pub fn is_directory(&self) -> bool {
        self.kind == NodeKind::Directory
    }

    pub fn child(&self, name: &str) -> Option<&FileTreeNode> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Paths of every file node, depth-first in display order
    pub fn file_paths(&self) -> Vec<String> {
        let mut paths = Vec::new();
        self.collect_files(&mut paths);
        paths
    }

    fn collect_files(&self, out: &mut Vec<String>) {
        for child in &self.children {
            match child.kind {
                NodeKind::File => out.push(child.path.clone()),
                NodeKind::Directory => child.collect_files(out),
            }
        }
    }

    /// Indented text rendering used in reports (`dir/` suffix for directories)
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        for child in &self.children {
            out.push_str(&"  ".repeat(depth));
            out.push_str("- ");
            out.push_str(&child.name);
            if child.is_directory() {
                out.push('/');
            }
            out.push('\n');
            child.render_into(out, depth + 1);
        }
    }
}

fn compare_nodes(a: &FileTreeNode, b: &FileTreeNode) -> Ordering {
    match (a.kind, b.kind) {
        (NodeKind::Directory, NodeKind::File) => Ordering::Less,
        (NodeKind::File, NodeKind::Directory) => Ordering::Greater,
        _ => a
            .name
            .to_lowercase()
            .cmp(&b.name.to_lowercase())
            .then_with(|| a.name.cmp(&b.name)),
    }
}

struct ChildMap<'a>(&'a [FileTreeNode]);

impl Serialize for ChildMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for child in self.0 {
            map.serialize_entry(&child.name, child)?;
        }
        map.end()
    }
}

/// Serialized as `{name, type, path, children: {name: node}}` with children
/// in display order
impl Serialize for FileTreeNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut node = serializer.serialize_struct("FileTreeNode", 4)?;
        node.serialize_field("name", &self.name)?;
        node.serialize_field("type", &self.kind)?;
        node.serialize_field("path", &self.path)?;
        node.serialize_field("children", &ChildMap(&self.children))?;
        node.end()
    }
}
