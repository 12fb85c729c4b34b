//! Markdown toolbar snippets.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tool {
    pub label: &'static str,
    pub snippet: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolGroup {
    pub title: &'static str,
    pub tools: &'static [Tool],
}

const MERMAID_SNIPPET: &str =
    "```mermaid\ngraph TD;\n    A-->B;\n    A-->C;\n    B-->D;\n    C-->D;\n```\n";

pub const TOOL_GROUPS: &[ToolGroup] = &[
    ToolGroup {
        title: "Headings",
        tools: &[
            Tool { label: "H1", snippet: "# " },
            Tool { label: "H2", snippet: "## " },
            Tool { label: "H3", snippet: "### " },
        ],
    },
    ToolGroup {
        title: "Formatting",
        tools: &[
            Tool { label: "Bold", snippet: "**" },
            Tool { label: "Italic", snippet: "*" },
            Tool { label: "Code", snippet: "``" },
            Tool { label: "Code block", snippet: "```" },
            Tool { label: "Strikethrough", snippet: "~~" },
        ],
    },
    ToolGroup {
        title: "Lists",
        tools: &[
            Tool { label: "List", snippet: "- " },
            Tool { label: "Numbered list", snippet: "1. " },
        ],
    },
    ToolGroup {
        title: "Other",
        tools: &[
            Tool { label: "Quote", snippet: "> " },
            Tool { label: "Link", snippet: "[]" },
            Tool { label: "Image", snippet: "![]" },
            Tool { label: "Rule", snippet: "---\n" },
        ],
    },
    ToolGroup {
        title: "Diagrams",
        tools: &[
            Tool { label: "Mermaid", snippet: MERMAID_SNIPPET },
            Tool { label: "Math", snippet: "$E = mc^2$" },
        ],
    },
];

/// Look up a tool by label, ignoring case.
pub fn find_tool(label: &str) -> Option<&'static Tool> {
    TOOL_GROUPS
        .iter()
        .flat_map(|g| g.tools.iter())
        .find(|t| t.label.eq_ignore_ascii_case(label))
}

/// Insert `snippet` at a cursor counted in characters.
///
/// A cursor past the end appends. Returns the new content and the cursor
/// placed right after the inserted text.
pub fn insert_at(content: &str, cursor: usize, snippet: &str) -> (String, usize) {
    let byte_pos = content
        .char_indices()
        .nth(cursor)
        .map(|(i, _)| i)
        .unwrap_or(content.len());
    let mut out = String::with_capacity(content.len() + snippet.len());
    out.push_str(&content[..byte_pos]);
    out.push_str(snippet);
    out.push_str(&content[byte_pos..]);

    let cursor = content[..byte_pos].chars().count() + snippet.chars().count();
    (out, cursor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_groups() {
        let titles: Vec<_> = TOOL_GROUPS.iter().map(|g| g.title).collect();
        assert_eq!(
            titles,
            vec!["Headings", "Formatting", "Lists", "Other", "Diagrams"]
        );
        assert_eq!(find_tool("mermaid").unwrap().snippet, MERMAID_SNIPPET);
        assert_eq!(find_tool("H2").unwrap().snippet, "## ");
        assert!(find_tool("Table").is_none());
    }

    #[test]
    fn test_insert_at_cursor() {
        let (out, cursor) = insert_at("hello world", 6, "**");
        assert_eq!(out, "hello **world");
        assert_eq!(cursor, 8);
    }

    #[test]
    fn test_insert_counts_characters() {
        let (out, cursor) = insert_at("héllo", 2, "~~");
        assert_eq!(out, "hé~~llo");
        assert_eq!(cursor, 4);
    }

    #[test]
    fn test_insert_past_end_appends() {
        let (out, cursor) = insert_at("abc", 99, "---\n");
        assert_eq!(out, "abc---\n");
        assert_eq!(cursor, 7);

        let (out, cursor) = insert_at("", 0, "# ");
        assert_eq!(out, "# ");
        assert_eq!(cursor, 2);
    }
}
