use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Turns a message body's markup into plain text for translation and display.
///
/// Policy: tags are removed, entities decoded, `<br>` and block elements become
/// line breaks, blank lines are capped at one, anchors are replaced by their
/// visible text and dropped when they have none.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn normalize(&self, body_html: &str) -> String {
        if body_html.trim().is_empty() {
            return String::new();
        }
        let fragment = Html::parse_fragment(body_html);
        let mut ctx = TextBuilder::default();
        for child in fragment.root_element().children() {
            self.visit_node(child, &mut ctx);
        }
        ctx.finish()
    }

    fn visit_node(&self, node: NodeRef<'_, Node>, ctx: &mut TextBuilder) {
        match node.value() {
            Node::Text(text) => ctx.append_text(text),
            Node::Element(_) => {
                if let Some(element) = ElementRef::wrap(node) {
                    self.visit_element(element, ctx);
                }
            }
            _ => {
                for child in node.children() {
                    self.visit_node(child, ctx);
                }
            }
        }
    }

    fn visit_element(&self, element: ElementRef, ctx: &mut TextBuilder) {
        let tag = element.value().name().to_ascii_lowercase();
        match tag.as_str() {
            "br" => ctx.line_break(),
            "p" | "div" | "blockquote" | "pre" | "li" | "ul" | "ol" | "tr" => {
                ctx.line_break();
                self.visit_children(element, ctx);
                ctx.line_break();
            }
            "script" | "style" | "noscript" | "template" => {}
            // Anchors contribute their text only; the href is not kept.
            _ => self.visit_children(element, ctx),
        }
    }

    fn visit_children(&self, element: ElementRef, ctx: &mut TextBuilder) {
        for child in element.children() {
            self.visit_node(child, ctx);
        }
    }
}

#[derive(Default)]
struct TextBuilder {
    lines: Vec<String>,
    current: String,
    pending_space: bool,
}

impl TextBuilder {
    fn append_text(&mut self, text: &str) {
        for ch in text.chars() {
            if ch.is_whitespace() {
                self.pending_space = !self.current.is_empty();
            } else {
                if self.pending_space {
                    self.current.push(' ');
                    self.pending_space = false;
                }
                self.current.push(ch);
            }
        }
    }

    fn line_break(&mut self) {
        self.lines.push(std::mem::take(&mut self.current));
        self.pending_space = false;
    }

    fn finish(mut self) -> String {
        self.line_break();
        let mut out = String::new();
        let mut blank_run = 0;
        for line in self.lines.iter().map(|l| l.trim()) {
            if line.is_empty() {
                blank_run += 1;
                continue;
            }
            if !out.is_empty() {
                out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
            }
            out.push_str(line);
            blank_run = 0;
        }
        out
    }
}
