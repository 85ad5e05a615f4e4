use super::*;

const COMPONENT: &str = "const Component = () => {\n  return <div>Hi</div>;\n};";

#[test]
fn plain_component_passes_through() {
    assert_eq!(clean(COMPONENT), COMPONENT);
}

#[test]
fn tagged_fences_are_removed() {
    for tag in ["", "jsx", "tsx", "javascript", "typescript", "js", "ts"] {
        let raw = format!("```{tag}\n{COMPONENT}\n```");
        assert_eq!(clean(&raw), COMPONENT, "tag {tag:?}");
    }
}

#[test]
fn surrounding_whitespace_and_fence_padding_are_removed() {
    let raw = format!("\n\n  ```jsx   \n{COMPONENT}\n```   \n");
    assert_eq!(clean(&raw), COMPONENT);
}

#[test]
fn prose_before_the_component_is_dropped() {
    let raw = format!("Sure! Here is your component:\n\n```jsx\n{COMPONENT}\n```");
    assert_eq!(clean(&raw), COMPONENT);
}

#[test]
fn prose_after_the_last_definition_is_dropped() {
    let raw = format!("{COMPONENT}\n\nThis component renders a greeting.");
    assert_eq!(clean(&raw), COMPONENT);
}

#[test]
fn trailing_declarations_are_kept() {
    let raw = format!("{COMPONENT}\n\nconst helper = 1;");
    assert_eq!(clean(&raw), raw);
    let raw = format!("{COMPONENT}\nfunction format(n) {{ return n; }}");
    assert_eq!(clean(&raw), raw);
}

#[test]
fn helpers_before_the_component_are_dropped() {
    let raw = format!("const PAD = 4;\n\n{COMPONENT}");
    assert_eq!(clean(&raw), COMPONENT);
}

#[test]
fn text_without_component_is_only_trimmed() {
    assert_eq!(clean("  function App() { return null; }  "), "function App() { return null; }");
    assert_eq!(clean(""), "");
    assert_eq!(clean("```\n```"), "");
}

#[test]
fn fences_between_blocks_are_removed() {
    let raw = "```jsx\nconst Component = () => <p />;\n```\n\n```js\nconst x = 1;\n```";
    assert_eq!(clean(raw), "const Component = () => <p />;\n\nconst x = 1;");
}

#[test]
fn clean_is_idempotent() {
    let inputs = [
        format!("Here you go:\n```tsx\n{COMPONENT}\n```\nEnjoy!"),
        format!("{COMPONENT}\nconst extra = 2;\nMore text"),
        "````jsx\nconst Component = () => null;\n````".to_owned(),
        "no code at all".to_owned(),
    ];
    for raw in inputs {
        let once = clean(&raw);
        assert_eq!(clean(&once), once, "input {raw:?}");
    }
}

#[test]
fn strip_fences_keeps_inner_text() {
    assert_eq!(strip_fences("```jsx\nconst a = 1;\n```"), "const a = 1;");
    assert_eq!(strip_fences("const a = 1;"), "const a = 1;");
}
