use lorebook_core::model::{
    truncate_chars, ContextNode, Entry, NodeSummary, PathSegment, TreeNode,
};

use super::OutputFormat;

const PREVIEW_CHARS: usize = 50;

fn marker(selected: bool) -> char {
    if selected {
        '\u{25cf}'
    } else {
        '\u{25cb}'
    }
}

/// `text` collapsed onto one line and cut for previews.
fn one_line(text: &str) -> String {
    truncate_chars(&text.replace('\n', " "), PREVIEW_CHARS)
}

pub fn format_summary_list(rows: &[NodeSummary], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(rows).unwrap_or_default(),
        OutputFormat::Text => format_summary_list_text(rows),
    }
}

fn format_summary_list_text(rows: &[NodeSummary]) -> String {
    if rows.is_empty() {
        return "No contexts found.\n".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let items = if row.selected_item_count > 0 {
            format!("{}/{} items", row.selected_item_count, row.item_count)
        } else {
            format!("{} items", row.item_count)
        };
        let children = if row.has_children { " +" } else { "" };
        out.push_str(&format!(
            "{} {} [{}] {}{children}  ({items}, {})\n",
            marker(row.is_selected),
            row.id,
            row.context_type.label(),
            row.name,
            row.updated_at.format("%Y-%m-%d %H:%M"),
        ));
        if !row.preview.is_empty() {
            out.push_str(&format!("    {}\n", row.preview.replace('\n', " ")));
        }
    }
    out
}

pub fn format_node(node: &ContextNode, selected: bool, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let mut value = serde_json::to_value(node).unwrap_or_default();
            value["is_selected"] = serde_json::Value::Bool(selected);
            serde_json::to_string_pretty(&value).unwrap_or_default()
        }
        OutputFormat::Text => format_node_text(node, selected),
    }
}

fn format_node_text(node: &ContextNode, selected: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Context: {}\n", node.id));
    out.push_str(&format!("Name:    {}\n", node.name));
    out.push_str(&format!("Type:    {}\n", node.context_type.label()));
    out.push_str(&format!("Project: {}\n", node.project_id));
    if let Some(parent) = &node.parent_id {
        out.push_str(&format!("Parent:  {parent}\n"));
    }
    if !node.children.is_empty() {
        out.push_str(&format!("Children: {}\n", node.children.join(", ")));
    }
    out.push_str(&format!("Selected: {}\n", if selected { "yes" } else { "no" }));
    out.push_str(&format!(
        "Updated: {}\n",
        node.updated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if !node.metadata.is_empty() {
        out.push_str("\n--- Metadata ---\n");
        for (key, value) in &node.metadata {
            out.push_str(&format!("  {key}: {value}\n"));
        }
    }

    out.push_str(&format!("\n--- Items ({}) ---\n", node.content.len()));
    for entry in &node.content {
        let mark = if node.selected_items.contains(&entry.id) {
            "*"
        } else {
            " "
        };
        out.push_str(&format!("{mark} [{}]\n", entry.id));
        for line in entry.content.lines() {
            out.push_str(&format!("    {line}\n"));
        }
    }
    out
}

pub fn format_items(node: &ContextNode, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => {
            let items: Vec<serde_json::Value> = node
                .content
                .iter()
                .map(|e| {
                    serde_json::json!({
                        "id": e.id,
                        "content": e.content,
                        "selected": node.selected_items.contains(&e.id),
                        "created_at": e.created_at,
                        "updated_at": e.updated_at,
                    })
                })
                .collect();
            serde_json::to_string_pretty(&items).unwrap_or_default()
        }
        OutputFormat::Text => {
            if node.content.is_empty() {
                return "No items.\n".to_string();
            }
            let mut out = String::new();
            for entry in &node.content {
                out.push_str(&format!(
                    "{} {}  {}\n",
                    marker(node.selected_items.contains(&entry.id)),
                    entry.id,
                    one_line(&entry.content)
                ));
            }
            out
        }
    }
}

pub fn format_entry(entry: &Entry, fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(entry).unwrap_or_default(),
        OutputFormat::Text => format!("{}\n", entry.content),
    }
}

pub fn format_path(path: &[PathSegment], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(path).unwrap_or_default(),
        OutputFormat::Text => {
            let names: Vec<String> = path
                .iter()
                .map(|s| format!("{} [{}]", s.name, s.context_type.label()))
                .collect();
            format!("{}\n", names.join(" / "))
        }
    }
}

pub fn format_tree(roots: &[TreeNode], fmt: OutputFormat) -> String {
    match fmt {
        OutputFormat::Json => serde_json::to_string_pretty(roots).unwrap_or_default(),
        OutputFormat::Text => {
            if roots.is_empty() {
                return "No contexts found.\n".to_string();
            }
            let mut out = String::new();
            for root in roots {
                push_tree_text(&mut out, root, 0);
            }
            out
        }
    }
}

fn push_tree_text(out: &mut String, node: &TreeNode, depth: usize) {
    let preview = node
        .content
        .first()
        .map(|e| one_line(&e.content))
        .unwrap_or_default();
    out.push_str(&format!(
        "{}{} {} [{}] ({})",
        "  ".repeat(depth),
        marker(node.is_selected),
        node.name,
        node.context_type.label(),
        node.id,
    ));
    if !preview.is_empty() {
        out.push_str(&format!("  {preview}"));
    }
    out.push('\n');
    for child in &node.children {
        push_tree_text(out, child, depth + 1);
    }
}
