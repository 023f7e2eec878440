//! Code for building the landing page HTML document.

use crate::metadata::{DocumentMetadata, FormattedString};
use ego_tree::{tree, NodeMut, NodeRef};
use jiff::Timestamp;
use markup5ever::{namespace_url, ns, Attribute, LocalName, QualName};
use scraper::{
    node::{Doctype, Element, Node, Text},
    Html,
};
use tracing::warn;

/// Everything a theme shows on the landing page.
pub(crate) struct IndexPage<'a> {
    pub(crate) metadata: &'a DocumentMetadata,
    // File names relative to the site root
    pub(crate) pdf_name: &'a str,
    pub(crate) attachments: &'a [String],
    pub(crate) stylesheets: &'a [&'a str],
    // Class of the `<body>` element, for theme-specific styling
    pub(crate) body_class: &'a str,
}

impl IndexPage<'_> {
    /// Outputs a string containing a complete HTML document.
    pub(crate) fn render(&self) -> String {
        let metadata = self.metadata;

        let mut html = Html::new_document();
        let mut root_node = html.tree.root_mut();

        // Add `<!DOCTYPE html>`
        root_node.append(Node::Doctype(Doctype {
            name: "html".into(),
            public_id: "".into(),
            system_id: "".into(),
        }));

        let mut html_el_node = root_node.append(create_el_with_attrs("html", [("lang", "en")]));

        {
            let mut head = html_el_node.append(create_el("head"));
            let authors = metadata
                .authors
                .iter()
                .map(|person| person.name.plain.as_str())
                .collect::<Vec<_>>()
                .join(", ");

            head.append(create_el_with_attrs("meta", [("charset", "utf-8")]));
            head.append(create_el_with_attrs(
                "meta",
                [
                    ("name", "viewport"),
                    ("content", "width=device-width, initial-scale=1"),
                ],
            ));
            if !authors.is_empty() {
                head.append(create_el_with_attrs(
                    "meta",
                    [("name", "author"), ("content", authors.as_str())],
                ));
            }
            if let Some(abstract_text) = &metadata.abstract_text {
                head.append(create_el_with_attrs(
                    "meta",
                    [("name", "description"), ("content", abstract_text.plain.as_str())],
                ));
            }
            if let Some(url) = &metadata.canonical_url {
                head.append(create_el_with_attrs(
                    "link",
                    [("rel", "canonical"), ("href", url.as_str())],
                ));
            }
            head.append_subtree(tree! {
                create_el("title") => { text(&metadata.title.plain) }
            });
            for &stylesheet in self.stylesheets {
                head.append(create_el_with_attrs(
                    "link",
                    [("rel", "stylesheet"), ("href", stylesheet)],
                ));
            }
        }

        let mut body = html_el_node.append(create_el_with_attrs("body", [("class", self.body_class)]));
        self.append_header(&mut body.append(create_el("header")));
        self.append_main(&mut body.append(create_el("main")));
        self.append_footer(&mut body.append(create_el("footer")));

        html.html()
    }

    fn append_header(&self, header: &mut NodeMut<'_, Node>) {
        let metadata = self.metadata;

        if let Some(identifier) = &metadata.identifier {
            header.append_subtree(tree! {
                create_el_with_attrs("p", [("class", "handle")]) => { text(identifier) }
            });
        }
        if let Some(series_name) = &metadata.series_name {
            header.append_subtree(tree! {
                create_el_with_attrs("p", [("class", "series")]) => { text(series_name) }
            });
        }

        append_markup(&mut header.append(create_el("h1")), &metadata.title);

        if !metadata.authors.is_empty() {
            let mut authors = header.append(create_el_with_attrs("p", [("class", "authors")]));
            for (i, person) in metadata.authors.iter().enumerate() {
                if i > 0 {
                    authors.append(text(", "));
                }
                append_markup(&mut authors, &person.name);
            }
        }

        if let Some(revision) = metadata.revision {
            let datetime = revision.timestamp.to_string();
            header.append_subtree(tree! {
                create_el_with_attrs("p", [("class", "date")]) => {
                    text("Last revised "),
                    create_el_with_attrs("time", [("datetime", datetime.as_str())]) => {
                        text(&simple_date(revision.timestamp))
                    }
                }
            });
        }
    }

    fn append_main(&self, main: &mut NodeMut<'_, Node>) {
        if let Some(abstract_text) = &self.metadata.abstract_text {
            let mut section = main.append(create_el_with_attrs("section", [("class", "abstract")]));
            section.append_subtree(tree! { create_el("h2") => { text("Abstract") } });

            if !append_converted_html(&mut section, abstract_text) {
                for paragraph in paragraphify(&abstract_text.plain) {
                    section.append_subtree(tree! { create_el("p") => { text(paragraph) } });
                }
            }
        }

        let mut downloads = main.append(create_el_with_attrs("section", [("class", "downloads")]));
        downloads.append_subtree(tree! { create_el("h2") => { text("Downloads") } });
        let mut list = downloads.append(create_el("ul"));
        list.append_subtree(tree! {
            create_el("li") => {
                create_el_with_attrs("a", [("href", self.pdf_name), ("download", "")]) => {
                    text(self.pdf_name)
                }
            }
        });
        for attachment in self.attachments {
            list.append_subtree(tree! {
                create_el("li") => {
                    create_el_with_attrs("a", [("href", attachment.as_str()), ("download", "")]) => {
                        text(attachment)
                    }
                }
            });
        }
    }

    fn append_footer(&self, footer: &mut NodeMut<'_, Node>) {
        let metadata = self.metadata;

        if let Some(url) = &metadata.repository_url {
            footer.append_subtree(tree! {
                create_el("p") => {
                    create_el_with_attrs("a", [("href", url.as_str())]) => { text("Source repository") }
                }
            });
        }
        if let Some(url) = &metadata.ci_url {
            footer.append_subtree(tree! {
                create_el("p") => {
                    create_el_with_attrs("a", [("href", url.as_str())]) => { text("Continuous integration build") }
                }
            });
        }
        if let Some(copyright) = &metadata.copyright {
            footer.append_subtree(tree! {
                create_el_with_attrs("p", [("class", "copyright")]) => { text(copyright) }
            });
        }
        if let Some(license) = &metadata.license_identifier {
            let url = format!("https://spdx.org/licenses/{license}.html");
            footer.append_subtree(tree! {
                create_el_with_attrs("p", [("class", "license")]) => {
                    text("License: "),
                    create_el_with_attrs("a", [("href", url.as_str())]) => {
                        text(license)
                    }
                }
            });
        }
    }
}

/// Formats a timestamp as a UTC calendar date, like `2018-01-01`.
pub(crate) fn simple_date(timestamp: Timestamp) -> String {
    timestamp.strftime("%Y-%m-%d").to_string()
}

/// Splits plain text into paragraphs on blank lines.
pub(crate) fn paragraphify(text: &str) -> Vec<&str> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

/// Appends a text field as HTML if it was converted, or as plain text otherwise.
fn append_markup(parent: &mut NodeMut<'_, Node>, field: &FormattedString) {
    if !append_converted_html(parent, field) {
        parent.append(text(&field.plain));
    }
}

/// Appends the HTML encoding of a text field, returning `false` if there is no usable HTML.
/// Conversion failures leave the HTML equal to the TeX source, which must not be shown as markup.
fn append_converted_html(parent: &mut NodeMut<'_, Node>, field: &FormattedString) -> bool {
    if field.html == field.tex {
        return false;
    }

    let fragment = Html::parse_fragment(&field.html);
    if let Some(error) = fragment.errors.first() {
        warn!("Showing plain text instead of invalid HTML: {error}");
        return false;
    }

    graft(parent, *fragment.root_element());
    true
}

/// Copies the children of `source` under `parent`, leaving out scripts and styles.
fn graft(parent: &mut NodeMut<'_, Node>, source: NodeRef<'_, Node>) {
    for child in source.children() {
        if let Node::Element(element) = child.value() {
            if matches!(element.name(), "script" | "style") {
                continue;
            }
        }

        let mut copy = parent.append(child.value().clone());
        graft(&mut copy, child);
    }
}

fn text(value: &str) -> Node {
    Node::Text(Text {
        text: value.into(),
    })
}

fn create_el(name: &str) -> Node {
    Node::Element(Element::new(create_name(name), vec![]))
}

fn create_el_with_attrs<const N: usize>(name: &str, attrs: [(&str, &str); N]) -> Node {
    let attrs = attrs
        .map(|(key, value)| Attribute {
            name: QualName::new(None, ns!(), LocalName::from(key)),
            value: value.into(),
        })
        .to_vec();

    Node::Element(Element::new(create_name(name), attrs))
}

fn create_name(name: &str) -> QualName {
    QualName {
        prefix: None,
        ns: ns!(html),
        local: LocalName::from(name),
    }
}
