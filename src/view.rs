//! Static landing view.
//!
//! DESIGN
//! ======
//! The view is a plain value: a small element tree built by `coming_soon()`
//! and serialized by `Node::render`. There are no props, no state and no
//! branching, so every render of the same tree yields the same bytes.

pub const TITLE: &str = "Personal Finance Tracker";
pub const TAGLINE: &str = "Coming Soon! We are building something amazing.";

// =============================================================================
// NODE TREE
// =============================================================================

/// A DOM-like node. Elements carry an optional class list and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element { tag: &'static str, class: Option<&'static str>, children: Vec<Node> },
    Text(String),
}

impl Node {
    #[must_use]
    pub fn element(tag: &'static str, class: &'static str, children: Vec<Node>) -> Self {
        Self::Element { tag, class: Some(class), children }
    }

    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Serialize the tree to HTML. Text and attribute values are escaped.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        match self {
            Self::Text(value) => out.push_str(&htmlescape::encode_minimal(value)),
            Self::Element { tag, class, children } => {
                out.push('<');
                out.push_str(tag);
                if let Some(class) = class {
                    out.push_str(" class=\"");
                    out.push_str(&htmlescape::encode_attribute(class));
                    out.push('"');
                }
                out.push('>');
                for child in children {
                    child.write_html(out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }
}

// =============================================================================
// VIEWS
// =============================================================================

/// The "Coming Soon" landing view: one heading and one paragraph.
#[must_use]
pub fn coming_soon() -> Node {
    Node::element(
        "div",
        "min-h-screen bg-gray-100 flex flex-col items-center justify-center",
        vec![Node::element(
            "header",
            "text-center",
            vec![
                Node::element("h1", "text-4xl font-bold text-blue-600 mb-4", vec![Node::text(TITLE)]),
                Node::element("p", "text-lg text-gray-700", vec![Node::text(TAGLINE)]),
            ],
        )],
    )
}

/// Wrap a rendered tree in a complete HTML5 document.
#[must_use]
pub fn page(title: &str, body: &Node) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"UTF-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">\n\
         <title>{}</title>\n</head>\n<body>\n<div id=\"root\">{}</div>\n</body>\n</html>\n",
        htmlescape::encode_minimal(title),
        body.render()
    )
}

#[cfg(test)]
#[path = "view_test.rs"]
mod tests;
