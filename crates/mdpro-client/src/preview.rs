//! Markdown preview rendering.

use pulldown_cmark::{html, Options, Parser};

fn options() -> Options {
    Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES
}

/// Render GitHub-flavoured Markdown to HTML.
///
/// Fenced blocks such as `mermaid` are emitted as ordinary code blocks with a
/// `language-*` class; rendering them is left to the viewer.
pub fn render_markdown(markdown: &str) -> String {
    let parser = Parser::new_ext(markdown, options());
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, parser);
    out
}
