//! Stripping passes turning parsed wikitext into plain text.
//!
//! Tree passes run first, in a fixed order: media and category links go
//! before template merging, so a merged parameter never brings one back.
//! Text passes then normalize the flattened output.

use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

use crate::parser::{self, Node};

/// Template parameters at least this long (in characters) are kept as prose.
pub const TEMPLATE_MERGE_THRESHOLD: usize = 25;

/// Link namespaces removed outright.
const MEDIA_PREFIXES: [&str; 3] = ["file:", "image:", "category:"];

/// Tags removed with everything inside them.
const REMOVED_TAGS: [&str; 2] = ["ref", "table"];

/// Tags whose contents are never rendered as text.
const INVISIBLE_TAGS: [&str; 11] = [
    "categorytree",
    "gallery",
    "graph",
    "imagemap",
    "inputbox",
    "math",
    "references",
    "score",
    "section",
    "templatedata",
    "timeline",
];

/// Run the full stripping pipeline on raw wikitext.
pub(crate) fn run_pipeline(text: &str) -> String {
    let nodes = parser::parse(text);
    let nodes = remove_media_links(nodes);
    let nodes = merge_templates(nodes);
    let nodes = remove_tags(nodes);

    let mut result = flatten(&nodes);
    result = strip_emphasis(&result);
    result = strip_headings(&result);
    result = strip_list_markers(&result);
    result = decode_entities(&result);
    result = trim_line_ends(&result);
    result = collapse_newlines(&result);

    result.trim().to_string()
}

/// Rebuild `node` with `pass` applied to every nested node list.
fn map_children(node: Node, pass: fn(Vec<Node>) -> Vec<Node>) -> Node {
    match node {
        Node::WikiLink { target, text } => Node::WikiLink {
            target,
            text: text.map(pass),
        },
        Node::ExternalLink { url, label } => Node::ExternalLink {
            url,
            label: label.map(pass),
        },
        Node::Template { name, params } => Node::Template {
            name,
            params: params
                .into_iter()
                .map(|mut p| {
                    p.value = pass(p.value);
                    p
                })
                .collect(),
        },
        Node::Tag { name, children } => Node::Tag {
            name,
            children: pass(children),
        },
        leaf @ (Node::Text(_) | Node::Comment(_)) => leaf,
    }
}

// ---------------------------------------------------------------------------
// Pass 1: Remove media and category links
// ---------------------------------------------------------------------------

fn is_media_link(target: &str) -> bool {
    let target = target.trim().to_lowercase();
    MEDIA_PREFIXES.iter().any(|p| target.starts_with(p))
}

fn remove_media_links(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter(|node| !matches!(node, Node::WikiLink { target, .. } if is_media_link(target)))
        .map(|node| map_children(node, remove_media_links))
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 2: Merge long template parameters
// ---------------------------------------------------------------------------

/// Replace each template by its long parameters, space-separated and padded,
/// or drop it when it has none. Nested templates are merged first.
fn merge_templates(nodes: Vec<Node>) -> Vec<Node> {
    let mut merged = Vec::with_capacity(nodes.len());
    for node in nodes {
        let Node::Template { params, .. } = node else {
            merged.push(map_children(node, merge_templates));
            continue;
        };

        let chunks: Vec<Vec<Node>> = params
            .into_iter()
            .filter(|p| p.value_len() >= TEMPLATE_MERGE_THRESHOLD)
            .map(|p| merge_templates(p.value))
            .collect();
        if chunks.is_empty() {
            continue;
        }

        merged.push(Node::Text(" ".into()));
        for (i, chunk) in chunks.into_iter().enumerate() {
            if i > 0 {
                merged.push(Node::Text(" ".into()));
            }
            merged.extend(chunk);
        }
        merged.push(Node::Text(" ".into()));
    }
    merged
}

// ---------------------------------------------------------------------------
// Pass 3: Remove references and tables
// ---------------------------------------------------------------------------

fn remove_tags(nodes: Vec<Node>) -> Vec<Node> {
    nodes
        .into_iter()
        .filter(|node| {
            !matches!(node, Node::Tag { name, .. } if REMOVED_TAGS.contains(&name.as_str()))
        })
        .map(|node| map_children(node, remove_tags))
        .collect()
}

// ---------------------------------------------------------------------------
// Pass 4: Flatten to text
// ---------------------------------------------------------------------------

fn flatten(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        flatten_into(node, &mut out);
    }
    out
}

fn flatten_into(node: &Node, out: &mut String) {
    match node {
        Node::Text(text) => out.push_str(text),
        Node::WikiLink {
            text: Some(text), ..
        } => out.push_str(&flatten(text)),
        Node::WikiLink { target, text: None } => out.push_str(target.trim_start_matches(':')),
        Node::ExternalLink {
            label: Some(label), ..
        } => out.push_str(&flatten(label)),
        Node::Tag { name, children } if !INVISIBLE_TAGS.contains(&name.as_str()) => {
            out.push_str(&flatten(children));
        }
        Node::ExternalLink { label: None, .. }
        | Node::Template { .. }
        | Node::Tag { .. }
        | Node::Comment(_) => {}
    }
}

// ---------------------------------------------------------------------------
// Pass 5: Text normalization
// ---------------------------------------------------------------------------

/// Drop `''italic''` and `'''bold'''` quote runs.
fn strip_emphasis(text: &str) -> String {
    static EMPHASIS_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"'{2,}").expect("valid regex"));

    EMPHASIS_RE.replace_all(text, "").to_string()
}

/// `== Heading ==` becomes `Heading`.
fn strip_headings(text: &str) -> String {
    static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"(?m)^[ \t]*={1,6}[ \t]*(.*?)[ \t]*={1,6}[ \t]*$").expect("valid regex")
    });

    HEADING_RE.replace_all(text, "$1").to_string()
}

/// Drop leading `*`, `#`, `:` and `;` list markers.
fn strip_list_markers(text: &str) -> String {
    static LIST_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?m)^[*#:;]+[ \t]*").expect("valid regex"));

    LIST_RE.replace_all(text, "").to_string()
}

/// Replace HTML character references by the characters they stand for.
fn decode_entities(text: &str) -> String {
    static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"&(?:#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[A-Za-z][A-Za-z0-9]{1,31});")
            .expect("valid regex")
    });

    if !text.contains('&') {
        return text.to_string();
    }
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let fragment = Html::parse_fragment(&caps[0]);
            fragment.root_element().text().collect::<String>()
        })
        .to_string()
}

fn trim_line_ends(text: &str) -> String {
    text.lines().map(str::trim_end).collect::<Vec<_>>().join("\n")
}

/// Collapse every run of two or more newlines into one.
fn collapse_newlines(text: &str) -> String {
    static NEWLINES_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\n{2,}").expect("valid regex"));

    NEWLINES_RE.replace_all(text, "\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_and_category_links_are_removed() {
        let input = concat!(
            "Odessa[[File:Odessa.jpg|thumb|Harbour]] is a [[port]].",
            "[[ category:Ports]][[Image:x.png]]",
        );
        assert_eq!(run_pipeline(input), "Odessa is a port.");
    }

    #[test]
    fn piped_links_keep_their_text() {
        assert_eq!(
            run_pipeline("[[Blade Runner (film)|Blade Runner]] and [[:Deckard]]"),
            "Blade Runner and Deckard"
        );
    }

    #[test]
    fn short_templates_are_dropped() {
        assert_eq!(run_pipeline("Hello {{cn}}world{{lang|fr|Bonjour}}"), "Hello world");
    }

    #[test]
    fn long_template_params_are_merged_with_padding() {
        let input = "A{{quote|This sentence is long enough to keep.|short}}B";
        assert_eq!(run_pipeline(input), "A This sentence is long enough to keep. B");
    }

    #[test]
    fn nested_templates_merge_depth_first() {
        let input = "{{outer|{{inner|an inner value that is long enough}} tail text}}";
        assert_eq!(
            run_pipeline(input),
            "an inner value that is long enough  tail text"
        );
    }

    #[test]
    fn media_link_inside_template_does_not_survive_merge() {
        let input = "{{box|[[File:Huge.jpg|a caption long enough to count]] kept text here}}";
        let result = run_pipeline(input);
        assert!(!result.contains("caption"));
        assert!(!result.contains("kept"), "value shrank under the threshold: {result}");
    }

    #[test]
    fn refs_and_tables_are_removed() {
        let input = concat!(
            "Fact.<ref>{{cite web|url=http://x|title=A very long citation title indeed}}</ref>",
            " More.\n{|\n|-\n| cell\n|}\nEnd",
        );
        assert_eq!(run_pipeline(input), "Fact. More.\nEnd");
    }

    #[test]
    fn invisible_tags_and_comments_vanish() {
        assert_eq!(
            run_pipeline("E<math>mc^2</math> = <!-- note -->energy<small>!</small>"),
            "E = energy!"
        );
    }

    #[test]
    fn emphasis_headings_and_lists() {
        let input = "== History ==\n'''Bold''' and ''italic''\n* first\n** second\n# third";
        assert_eq!(
            run_pipeline(input),
            "History\nBold and italic\nfirst\nsecond\nthird"
        );
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode_entities("Caf&eacute; &amp; &#8212; &#x41;"), "Café & — A");
        assert_eq!(decode_entities("AT&T"), "AT&T");
    }

    #[test]
    fn blank_lines_collapse_and_ends_are_trimmed() {
        assert_eq!(run_pipeline("\n\nOne   \n\n\n\nTwo\t\n\n"), "One\nTwo");
    }

    #[test]
    fn external_links_keep_labels_only() {
        assert_eq!(
            run_pipeline("See [https://example.org the site] or [https://example.org]."),
            "See the site or ."
        );
    }
}
