//! Renderer for the prover's pretty-print (`Ppcmd_*`) trees.
//!
//! Goals, hypotheses, query replies and search results all arrive as tagged
//! trees: either a bare string, or an array whose head names the node kind.
//! Rendering flattens the tree to plain text; layout hints (box types,
//! break offsets) are discarded.

use serde_json::Value;

/// Flatten one pretty-print tree to a string.
///
/// Unknown tags render to the empty string. A node that is neither a string
/// nor a tagged array renders to its raw JSON text as a best-effort
/// fallback; this never panics on malformed input.
pub fn render(node: &Value) -> String {
    let arr = match node {
        Value::String(s) => return s.clone(),
        Value::Array(arr) if !arr.is_empty() => arr,
        other => return other.to_string(),
    };
    let Some(tag) = arr[0].as_str() else {
        return node.to_string();
    };
    match tag {
        "Ppcmd_string" => arr
            .get(1)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        "Ppcmd_glue" => arr
            .get(1)
            .and_then(Value::as_array)
            .map(|children| children.iter().map(render).collect())
            .unwrap_or_default(),
        // ["Ppcmd_box", box-type, content] / ["Ppcmd_tag", tag-name, content]
        "Ppcmd_box" | "Ppcmd_tag" => arr.get(2).map(render).unwrap_or_default(),
        // ["Ppcmd_print_break", nspaces, offset]; the offset is ignored.
        "Ppcmd_print_break" => match arr.get(1) {
            Some(n) => " ".repeat(n.as_u64().unwrap_or(0) as usize),
            None => " ".to_string(),
        },
        "Ppcmd_force_newline" => "\n".to_string(),
        "Ppcmd_comment" => arr
            .get(1)
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bare_string_renders_as_itself() {
        assert_eq!(render(&json!("forall n : nat, 0 + n = n")), "forall n : nat, 0 + n = n");
    }

    #[test]
    fn string_node() {
        assert_eq!(render(&json!(["Ppcmd_string", "nat"])), "nat");
    }

    #[test]
    fn glue_concatenates_children() {
        let node = json!([
            "Ppcmd_glue",
            [
                ["Ppcmd_string", "0 + n"],
                ["Ppcmd_print_break", 1, 0],
                ["Ppcmd_string", "= n"]
            ]
        ]);
        assert_eq!(render(&node), "0 + n = n");
    }

    #[test]
    fn box_and_tag_render_their_content() {
        let node = json!(["Ppcmd_box", ["Pp_hovbox", 2], ["Ppcmd_string", "x"]]);
        assert_eq!(render(&node), "x");
        let node = json!(["Ppcmd_tag", "constr.variable", ["Ppcmd_string", "y"]]);
        assert_eq!(render(&node), "y");
    }

    #[test]
    fn print_break_emits_nspaces() {
        assert_eq!(render(&json!(["Ppcmd_print_break", 3, 0])), "   ");
        // Absent count: a single space.
        assert_eq!(render(&json!(["Ppcmd_print_break"])), " ");
    }

    #[test]
    fn force_newline() {
        assert_eq!(render(&json!(["Ppcmd_force_newline"])), "\n");
    }

    #[test]
    fn comment_joins_with_spaces() {
        assert_eq!(render(&json!(["Ppcmd_comment", ["a", "b", "c"]])), "a b c");
    }

    #[test]
    fn unknown_tag_renders_empty() {
        assert_eq!(render(&json!(["Ppcmd_mystery", 1, 2, 3])), "");
    }

    #[test]
    fn malformed_node_falls_back_to_raw_json() {
        assert_eq!(render(&json!(42)), "42");
        assert_eq!(render(&json!([1, 2])), "[1,2]");
        assert_eq!(render(&json!({"odd": true})), r#"{"odd":true}"#);
    }

    #[test]
    fn empty_array_falls_back_to_raw_json() {
        assert_eq!(render(&json!([])), "[]");
    }

    #[test]
    fn nested_tree() {
        let node = json!([
            "Ppcmd_box",
            ["Pp_vbox", 0],
            [
                "Ppcmd_glue",
                [
                    ["Ppcmd_string", "Nat.add"],
                    ["Ppcmd_force_newline"],
                    ["Ppcmd_tag", "constr.path", ["Ppcmd_string", ": nat -> nat -> nat"]]
                ]
            ]
        ]);
        assert_eq!(render(&node), "Nat.add\n: nat -> nat -> nat");
    }
}
