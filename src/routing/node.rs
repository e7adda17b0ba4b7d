//! Path trie: node arena, segment grammar, insertion and backtracking search.
//!
//! # Responsibilities
//! - Parse registration segments (`literal`, `:name`, `:name(regex)`)
//! - Pave paths into the arena, reusing equal nodes
//! - Reject sibling leaves that would match the same request
//! - Match request paths with parameter capture
//!
//! # Design Decisions
//! - Nodes live in a `Vec` and refer to each other by index; child lists keep
//!   literal nodes at the front and wildcard nodes at the back, which is the
//!   whole disambiguation rule: literals are tried first at every level
//! - Regex constraints are anchored to the full segment
//! - Search is a plain backtracking walk without memoization; route tables
//!   are fixed at startup and shallow

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::Method;
use regex::Regex;

use crate::error::RouteError;
use crate::handler::Handler;
use crate::routing::params::Params;

/// Index of a node in the arena.
pub type NodeId = usize;

/// The root node is always at index 0.
pub const ROOT: NodeId = 0;

/// A parsed registration segment.
#[derive(Debug, Clone)]
pub struct Segment {
    text: String,
    wildcard: bool,
    pattern: Option<(String, Regex)>,
}

impl Segment {
    /// Parse one `/`-separated piece of a registration path.
    pub fn parse(raw: &str) -> Result<Self, RouteError> {
        if raw.is_empty() {
            return Err(RouteError::EmptySegment(raw.to_string()));
        }

        let Some(rest) = raw.strip_prefix(':') else {
            return Ok(Self {
                text: raw.to_string(),
                wildcard: false,
                pattern: None,
            });
        };

        let Some(open) = rest.find('(') else {
            if rest.is_empty() || rest.contains(')') {
                return Err(RouteError::MalformedSegment(raw.to_string()));
            }
            return Ok(Self {
                text: rest.to_string(),
                wildcard: true,
                pattern: None,
            });
        };

        let name = &rest[..open];
        let source = rest[open + 1..]
            .strip_suffix(')')
            .ok_or_else(|| RouteError::MalformedSegment(raw.to_string()))?;
        if name.is_empty() || source.is_empty() {
            return Err(RouteError::MalformedSegment(raw.to_string()));
        }

        let regex = Regex::new(&format!("^(?:{source})$")).map_err(|source| {
            RouteError::InvalidPattern {
                segment: raw.to_string(),
                source,
            }
        })?;

        Ok(Self {
            text: name.to_string(),
            wildcard: true,
            pattern: Some((source.to_string(), regex)),
        })
    }

    fn raw_pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(|(raw, _)| raw.as_str())
    }

    fn display(&self) -> String {
        match (self.wildcard, self.raw_pattern()) {
            (false, _) => self.text.clone(),
            (true, None) => format!(":{}", self.text),
            (true, Some(raw)) => format!(":{}({})", self.text, raw),
        }
    }
}

/// One path segment of the trie.
#[derive(Debug)]
pub struct RouteNode {
    segment: Segment,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
    handlers: HashMap<Method, Arc<Handler>>,
    full_path: String,
}

impl RouteNode {
    fn root() -> Self {
        Self {
            segment: Segment {
                text: String::new(),
                wildcard: false,
                pattern: None,
            },
            children: Vec::new(),
            parent: None,
            handlers: HashMap::new(),
            full_path: "/".to_string(),
        }
    }

    /// Literal text, or the parameter name of a wildcard.
    pub fn text(&self) -> &str {
        &self.segment.text
    }

    pub fn is_wildcard(&self) -> bool {
        self.segment.wildcard
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.segment.pattern.as_ref().map(|(_, re)| re)
    }

    /// A node is a leaf iff some method is bound on it.
    pub fn is_leaf(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// Registered path of this node, e.g. `/users/:id(\d+)`.
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn handler(&self, method: &Method) -> Option<&Arc<Handler>> {
        self.handlers.get(method)
    }

    /// Whether this node accepts `token` as its segment.
    fn fits(&self, token: &str) -> bool {
        if !self.segment.wildcard {
            return self.segment.text == token;
        }
        !token.is_empty() && self.pattern().map_or(true, |re| re.is_match(token))
    }

    fn same_segment(&self, segment: &Segment) -> bool {
        self.segment.wildcard == segment.wildcard
            && self.segment.text == segment.text
            && self.segment.raw_pattern() == segment.raw_pattern()
    }

    /// Whether this node and `other` (siblings) could both match one token.
    fn overlaps(&self, other: &RouteNode) -> bool {
        match (self.is_wildcard(), other.is_wildcard()) {
            (true, true) => true,
            (true, false) => self.pattern().is_some_and(|re| re.is_match(other.text())),
            (false, true) => other.pattern().is_some_and(|re| re.is_match(self.text())),
            (false, false) => false,
        }
    }
}

/// Arena of route nodes rooted at [`ROOT`].
#[derive(Debug)]
pub struct Trie {
    nodes: Vec<RouteNode>,
}

impl Trie {
    pub fn new() -> Self {
        Self {
            nodes: vec![RouteNode::root()],
        }
    }

    pub fn node(&self, id: NodeId) -> &RouteNode {
        &self.nodes[id]
    }

    /// Bind `handler` to `method` at `path`, creating nodes as needed.
    /// Returns the terminal node.
    pub fn add_path(
        &mut self,
        method: Method,
        path: &str,
        handler: Arc<Handler>,
    ) -> Result<NodeId, RouteError> {
        let mark = self.nodes.len();
        let id = self.pave(path)?;

        if let Err(e) = self.check_binding(id, &method) {
            self.truncate(mark);
            return Err(e);
        }
        self.nodes[id].handlers.insert(method, handler);
        Ok(id)
    }

    fn check_binding(&self, id: NodeId, method: &Method) -> Result<(), RouteError> {
        self.check_conflicts(id, method)?;

        let node = &self.nodes[id];
        if node.handlers.contains_key(method) {
            return Err(RouteError::DuplicateRoute {
                method: method.to_string(),
                path: node.full_path.clone(),
            });
        }
        Ok(())
    }

    /// Drop nodes created at or after `mark` and unlink them from their
    /// parents.
    fn truncate(&mut self, mark: usize) {
        if self.nodes.len() == mark {
            return;
        }
        self.nodes.truncate(mark);
        for node in &mut self.nodes {
            node.children.retain(|&child| child < mark);
        }
    }

    /// Walk `path` from the root, reusing matching children and creating the
    /// rest. Every segment is parsed (and its regex compiled) before the trie
    /// is touched.
    fn pave(&mut self, path: &str) -> Result<NodeId, RouteError> {
        let trimmed = path.trim_start_matches('/');
        if trimmed.is_empty() {
            return Ok(ROOT);
        }

        let segments = trimmed
            .split('/')
            .map(|raw| {
                Segment::parse(raw).map_err(|e| match e {
                    RouteError::EmptySegment(_) => RouteError::EmptySegment(path.to_string()),
                    other => other,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut current = ROOT;
        for segment in segments {
            let existing = self.nodes[current]
                .children
                .iter()
                .copied()
                .find(|&child| self.nodes[child].same_segment(&segment));
            current = match existing {
                Some(child) => child,
                None => self.add_child(current, segment),
            };
        }
        Ok(current)
    }

    fn add_child(&mut self, parent: NodeId, segment: Segment) -> NodeId {
        let id = self.nodes.len();
        let parent_path = &self.nodes[parent].full_path;
        let full_path = if parent == ROOT {
            format!("/{}", segment.display())
        } else {
            format!("{}/{}", parent_path, segment.display())
        };
        let wildcard = segment.wildcard;

        self.nodes.push(RouteNode {
            segment,
            children: Vec::new(),
            parent: Some(parent),
            handlers: HashMap::new(),
            full_path,
        });

        let children = &mut self.nodes[parent].children;
        if wildcard {
            children.push(id);
        } else {
            children.insert(0, id);
        }
        id
    }

    /// Compare a node about to receive `method` against sibling leaves
    /// already bound to the same method.
    fn check_conflicts(&self, id: NodeId, method: &Method) -> Result<(), RouteError> {
        let Some(parent) = self.nodes[id].parent else {
            return Ok(());
        };
        let node = &self.nodes[id];

        for &sibling_id in &self.nodes[parent].children {
            if sibling_id == id {
                continue;
            }
            let sibling = &self.nodes[sibling_id];
            if sibling.handlers.contains_key(method) && node.overlaps(sibling) {
                return Err(RouteError::Conflict {
                    path: node.full_path.clone(),
                    existing: sibling.full_path.clone(),
                });
            }
        }
        Ok(())
    }

    /// Find the leaf matching `path`.
    ///
    /// Children are scanned in list order at every depth; the scan position
    /// of each depth is kept so a dead end resumes with the next sibling one
    /// level up. `acquire` is called at most once, on the first capture.
    pub fn search<F>(&self, path: &str, acquire: F) -> Option<(NodeId, Option<Params>)>
    where
        F: FnOnce() -> Params,
    {
        let rest = path.strip_prefix('/').unwrap_or(path);
        let tokens: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split('/').collect()
        };

        let mut acquire = Some(acquire);
        let mut params: Option<Params> = None;
        // trail[d] is the node matched for tokens[d - 1]; trail[0] is the root.
        let mut trail: Vec<NodeId> = Vec::with_capacity(tokens.len() + 1);
        trail.push(ROOT);
        // cursors[d] is the next child of trail[d] to try for tokens[d].
        let mut cursors: Vec<usize> = vec![0; tokens.len()];
        let mut depth = 0;

        while depth < tokens.len() {
            let token = tokens[depth];
            let children = &self.nodes[trail[depth]].children;

            let mut next = None;
            while cursors[depth] < children.len() {
                let child = children[cursors[depth]];
                cursors[depth] += 1;
                if self.nodes[child].fits(token) {
                    next = Some(child);
                    break;
                }
            }

            match next {
                Some(child) => {
                    if self.nodes[child].is_wildcard() {
                        let buf = params
                            .get_or_insert_with(|| acquire.take().map_or_else(Params::new, |f| f()));
                        buf.push(self.nodes[child].text(), token);
                    }
                    trail.push(child);
                    depth += 1;
                    if depth < tokens.len() {
                        cursors[depth] = 0;
                    }
                }
                None => {
                    if depth == 0 {
                        return None;
                    }
                    if let Some(abandoned) = trail.pop() {
                        if self.nodes[abandoned].is_wildcard() {
                            if let Some(buf) = params.as_mut() {
                                buf.pop();
                            }
                        }
                    }
                    depth -= 1;
                }
            }
        }

        let terminal = *trail.last()?;
        if self.nodes[terminal].is_leaf() {
            Some((terminal, params))
        } else {
            None
        }
    }
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}
