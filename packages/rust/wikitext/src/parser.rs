//! A small wikitext parser.
//!
//! Produces a tree of the constructs the cleaner cares about: links,
//! templates, tags (including `{| |}` tables) and comments. Everything else is
//! text. A construct that is not closed before the end of input is read as
//! plain text instead.

use std::collections::HashSet;
use std::fmt;

/// Tags that never have a body or closing tag.
const VOID_TAGS: [&str; 4] = ["br", "hr", "img", "wbr"];

/// One node of parsed wikitext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Text(String),
    /// `[[target]]` or `[[target|text]]`.
    WikiLink {
        target: String,
        text: Option<Vec<Node>>,
    },
    /// `[url]` or `[url label]`.
    ExternalLink {
        url: String,
        label: Option<Vec<Node>>,
    },
    /// `{{name|param|name=param}}`.
    Template {
        name: String,
        params: Vec<Param>,
    },
    /// An HTML-style tag; wiki tables are tags named `table`.
    Tag {
        name: String,
        children: Vec<Node>,
    },
    /// `<!-- ... -->`
    Comment(String),
}

/// A template parameter, positional when `name` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Param {
    pub name: Option<String>,
    pub value: Vec<Node>,
}

impl Param {
    /// Build from the already parsed parameter body. A `name=` prefix is only
    /// recognised in leading text, before any nested construct.
    fn from_nodes(mut nodes: Vec<Node>) -> Self {
        let split = match nodes.first() {
            Some(Node::Text(text)) => split_param_name(text),
            _ => None,
        };
        let Some((name, value)) = split else {
            return Self {
                name: None,
                value: nodes,
            };
        };
        if value.is_empty() {
            nodes.remove(0);
        } else {
            nodes[0] = Node::Text(value);
        }
        Self {
            name: Some(name),
            value: nodes,
        }
    }

    /// Length of the value in characters, as wikitext.
    pub fn value_len(&self) -> usize {
        self.value.iter().map(|n| n.to_string().chars().count()).sum()
    }
}

/// `name=value` split of leading text, unless the name holds stray markup.
fn split_param_name(text: &str) -> Option<(String, String)> {
    let (name, value) = text.split_once('=')?;
    if ["{{", "[[", "<"].iter().any(|m| name.contains(m)) {
        return None;
    }
    Some((name.trim().to_string(), value.to_string()))
}

fn write_nodes(f: &mut fmt::Formatter<'_>, nodes: &[Node]) -> fmt::Result {
    nodes.iter().try_for_each(|n| write!(f, "{n}"))
}

/// Renders the node back to wikitext (tag attributes are not kept).
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Text(text) => f.write_str(text),
            Node::WikiLink { target, text } => {
                write!(f, "[[{target}")?;
                if let Some(text) = text {
                    f.write_str("|")?;
                    write_nodes(f, text)?;
                }
                f.write_str("]]")
            }
            Node::ExternalLink { url, label } => {
                write!(f, "[{url}")?;
                if let Some(label) = label {
                    f.write_str(" ")?;
                    write_nodes(f, label)?;
                }
                f.write_str("]")
            }
            Node::Template { name, params } => {
                write!(f, "{{{{{name}")?;
                for param in params {
                    f.write_str("|")?;
                    if let Some(name) = &param.name {
                        write!(f, "{name}=")?;
                    }
                    write_nodes(f, &param.value)?;
                }
                f.write_str("}}")
            }
            Node::Tag { name, children } if children.is_empty() => write!(f, "<{name} />"),
            Node::Tag { name, children } => {
                write!(f, "<{name}>")?;
                write_nodes(f, children)?;
                write!(f, "</{name}>")
            }
            Node::Comment(body) => write!(f, "<!--{body}-->"),
        }
    }
}

/// Parse `src` into a node list.
pub fn parse(src: &str) -> Vec<Node> {
    let mut parser = Parser {
        src,
        pos: 0,
        failed: HashSet::new(),
    };
    parser.nodes(&[])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Construct {
    Comment,
    Table,
    Template,
    WikiLink,
    ExternalLink,
    Tag,
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Constructs known not to close when opened at a given offset.
    failed: HashSet<(usize, Construct)>,
}

impl<'a> Parser<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_line_start(&self) -> bool {
        self.pos == 0 || self.src[..self.pos].ends_with('\n')
    }

    /// Read nodes until end of input or until one of `stops` begins.
    fn nodes(&mut self, stops: &[&str]) -> Vec<Node> {
        let mut nodes = Vec::new();
        let mut text = String::new();

        while let Some(c) = self.rest().chars().next() {
            if stops.iter().any(|s| self.rest().starts_with(s)) {
                break;
            }
            if let Some(node) = self.construct() {
                flush(&mut text, &mut nodes);
                nodes.push(node);
                continue;
            }
            text.push(c);
            self.pos += c.len_utf8();
        }
        flush(&mut text, &mut nodes);
        nodes
    }

    fn opening(&self) -> Option<Construct> {
        let rest = self.rest();
        if rest.starts_with("<!--") {
            Some(Construct::Comment)
        } else if rest.starts_with("{|") && self.at_line_start() {
            Some(Construct::Table)
        } else if rest.starts_with("{{") {
            Some(Construct::Template)
        } else if rest.starts_with("[[") {
            Some(Construct::WikiLink)
        } else if rest.starts_with('[') && is_url_start(&rest[1..]) {
            Some(Construct::ExternalLink)
        } else if rest.starts_with('<') && rest[1..].starts_with(|c: char| c.is_ascii_alphabetic())
        {
            Some(Construct::Tag)
        } else {
            None
        }
    }

    fn construct(&mut self) -> Option<Node> {
        let kind = self.opening()?;
        let start = self.pos;
        if self.failed.contains(&(start, kind)) {
            return None;
        }

        let node = match kind {
            Construct::Comment => self.comment(),
            Construct::Table => self.table(),
            Construct::Template => self.template(),
            Construct::WikiLink => self.wikilink(),
            Construct::ExternalLink => self.external_link(),
            Construct::Tag => self.tag(),
        };
        if node.is_none() {
            self.pos = start;
            self.failed.insert((start, kind));
        }
        node
    }

    fn comment(&mut self) -> Option<Node> {
        self.pos += "<!--".len();
        let end = self.rest().find("-->")?;
        let body = self.rest()[..end].to_string();
        self.pos += end + "-->".len();
        Some(Node::Comment(body))
    }

    fn table(&mut self) -> Option<Node> {
        self.pos += "{|".len();
        let children = self.nodes(&["|}"]);
        self.expect("|}")?;
        Some(Node::Tag {
            name: "table".into(),
            children,
        })
    }

    fn template(&mut self) -> Option<Node> {
        self.pos += "{{".len();
        let name_start = self.pos;
        self.nodes(&["|", "}}"]);
        let name = self.src[name_start..self.pos].trim().to_string();

        let mut params = Vec::new();
        loop {
            if self.expect("}}").is_some() {
                return Some(Node::Template { name, params });
            }
            self.expect("|")?;
            let value = self.nodes(&["|", "}}"]);
            params.push(Param::from_nodes(value));
        }
    }

    fn wikilink(&mut self) -> Option<Node> {
        self.pos += "[[".len();
        let rest = self.rest();
        let end = rest.find(|c| matches!(c, '|' | ']' | '[' | '{' | '<' | '\n'))?;
        let target = rest[..end].trim().to_string();
        self.pos += end;

        let text = if self.expect("|").is_some() {
            Some(self.nodes(&["]]"]))
        } else {
            None
        };
        self.expect("]]")?;
        Some(Node::WikiLink { target, text })
    }

    fn external_link(&mut self) -> Option<Node> {
        self.pos += "[".len();
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == ']')
            .unwrap_or(rest.len());
        let url = rest[..end].to_string();
        self.pos += end;
        while self.rest().starts_with([' ', '\t']) {
            self.pos += 1;
        }

        let label = self.nodes(&["]", "\n"]);
        self.expect("]")?;
        Some(Node::ExternalLink {
            url,
            label: (!label.is_empty()).then_some(label),
        })
    }

    fn tag(&mut self) -> Option<Node> {
        self.pos += "<".len();
        let rest = self.rest();
        let name_len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        let raw_name = &rest[..name_len];
        let name = raw_name.to_ascii_lowercase();

        let head_end = rest.find('>')?;
        let head = &rest[..head_end];
        if head.contains('<') {
            return None;
        }
        self.pos += head_end + 1;
        if head.ends_with('/') || VOID_TAGS.contains(&name.as_str()) {
            return Some(Node::Tag {
                name,
                children: Vec::new(),
            });
        }

        let closing = format!("</{raw_name}");
        let children = self.nodes(&[closing.as_str()]);
        self.expect(&closing)?;
        let close_end = self.rest().find('>')?;
        self.pos += close_end + 1;
        Some(Node::Tag { name, children })
    }

    /// Consume `token` if the input continues with it.
    fn expect(&mut self, token: &str) -> Option<()> {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            Some(())
        } else {
            None
        }
    }
}

fn is_url_start(s: &str) -> bool {
    ["http://", "https://", "ftp://", "//", "mailto:"]
        .iter()
        .any(|scheme| s.starts_with(scheme))
}

fn flush(text: &mut String, nodes: &mut Vec<Node>) {
    if !text.is_empty() {
        nodes.push(Node::Text(std::mem::take(text)));
    }
}
