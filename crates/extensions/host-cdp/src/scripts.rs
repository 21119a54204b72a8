//! Page-side JavaScript snippets.
//!
//! Elements are addressed by their element-child path from `<html>`, the same
//! path [`webreplay_selectors::ElementTree::path_of`] computes on a snapshot.
//! Element snippets run with `el` bound and evaluate to `{ detached: true }`
//! when the path no longer leads anywhere, `{ value }` otherwise.

const LOCATE: &str = "const locate = (path) => { \
    let el = document.documentElement; \
    for (const i of path) { if (!el) return null; el = el.children[i]; } \
    return el || null; };";

pub(crate) const OUTER_HTML: &str = "document.documentElement.outerHTML";
pub(crate) const READY_STATE: &str = "document.readyState";
pub(crate) const CURRENT_URL: &str = "window.location.href";
pub(crate) const PAGE_TEXT: &str = "document.body ? document.body.innerText : ''";

/// Installs a mutation observer on first use and returns the running count.
pub(crate) const MUTATION_COUNT: &str = "(() => { \
    if (window.__webreplayMutations === undefined) { \
      window.__webreplayMutations = 0; \
      new MutationObserver((records) => { window.__webreplayMutations += records.length; }) \
        .observe(document, { subtree: true, childList: true, attributes: true, characterData: true }); \
    } \
    return window.__webreplayMutations; })()";

/// Path of the focused element, or null.
pub(crate) const FOCUSED_PATH: &str = "(() => { \
    let el = document.activeElement; \
    if (!el) return null; \
    const path = []; \
    while (el !== document.documentElement) { \
      const parent = el.parentElement; \
      if (!parent) return null; \
      path.unshift(Array.prototype.indexOf.call(parent.children, el)); \
      el = parent; \
    } \
    return path; })()";

/// Fields match `ElementState`.
pub(crate) const ELEMENT_STATE: &str = "const style = getComputedStyle(el); \
    const r = el.getBoundingClientRect(); \
    const tag = el.tagName.toLowerCase(); \
    const inViewport = r.bottom > 0 && r.right > 0 && r.top < innerHeight && r.left < innerWidth; \
    return { \
      tag, \
      input_type: tag === 'input' ? (el.getAttribute('type') || 'text').toLowerCase() : null, \
      visible: r.width > 0 && r.height > 0 && inViewport \
        && style.visibility !== 'hidden' && style.display !== 'none', \
      enabled: !el.disabled, \
      value: typeof el.value === 'string' ? el.value : null, \
      text: (el.innerText ?? el.textContent ?? '').trim(), \
      options: tag === 'select' \
        ? Array.from(el.options).map((o) => ({ value: o.value, text: o.text.trim() })) : [], \
      rect: { x: r.x, y: r.y, width: r.width, height: r.height }, \
    };";

pub(crate) const FOCUS: &str = "el.focus(); return true;";
pub(crate) const BLUR: &str = "el.blur(); return true;";
pub(crate) const SCROLL_INTO_VIEW: &str =
    "el.scrollIntoView({ block: 'center', inline: 'center' }); return true;";
pub(crate) const CLEAR_VALUE: &str =
    "el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); return true;";
pub(crate) const ELEMENT_ITSELF: &str = "return el;";

/// A JavaScript string literal for `value`.
pub(crate) fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn js_path(path: &[usize]) -> String {
    let items: Vec<String> = path.iter().map(usize::to_string).collect();
    format!("[{}]", items.join(","))
}

/// Expression running `body` against the element at `path`.
pub(crate) fn on_element(path: &[usize], body: &str) -> String {
    format!(
        "(() => {{ {LOCATE} const el = locate({}); if (!el) return {{ detached: true }}; \
         return {{ value: (() => {{ {body} }})() }}; }})()",
        js_path(path)
    )
}

/// Expression evaluating to the element itself, for remote object handles.
pub(crate) fn element_object(path: &[usize]) -> String {
    format!("(() => {{ {LOCATE} return locate({}); }})()", js_path(path))
}

pub(crate) fn read_property(name: &str) -> String {
    format!(
        "const v = el[{}]; return v === undefined || v === null ? null : String(v);",
        js_string(name)
    )
}

pub(crate) fn read_attribute(name: &str) -> String {
    format!("return el.getAttribute({});", js_string(name))
}

pub(crate) fn set_value(value: &str) -> String {
    format!(
        "el.value = {}; el.dispatchEvent(new Event('input', {{ bubbles: true }})); return true;",
        js_string(value)
    )
}

pub(crate) fn fire(event: &str) -> String {
    format!(
        "el.dispatchEvent(new Event({}, {{ bubbles: true }})); return true;",
        js_string(event)
    )
}

fn scroll_options(x: f64, y: f64, smooth: bool) -> String {
    let behavior = if smooth { "smooth" } else { "auto" };
    format!("{{ left: {x}, top: {y}, behavior: '{behavior}' }}")
}

pub(crate) fn scroll_element(x: f64, y: f64, smooth: bool) -> String {
    format!("el.scrollTo({}); return true;", scroll_options(x, y, smooth))
}

pub(crate) fn scroll_window(x: f64, y: f64, smooth: bool) -> String {
    format!("window.scrollTo({})", scroll_options(x, y, smooth))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("plain"), "\"plain\"");
        assert_eq!(js_string("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
        assert_eq!(js_string("</script>"), "\"</script>\"");
    }

    #[test]
    fn test_on_element_embeds_path_and_body() {
        let script = on_element(&[1, 0, 3], FOCUS);
        assert!(script.contains("locate([1,0,3])"));
        assert!(script.contains("el.focus()"));
        assert!(script.contains("detached: true"));
        assert!(on_element(&[], BLUR).contains("locate([])"));
    }

    #[test]
    fn test_value_snippets_are_quoted() {
        let script = set_value("O'Brien \"quoted\"");
        assert!(script.contains(r#"el.value = "O'Brien \"quoted\"";"#));
        assert!(read_attribute("data-id").contains(r#"getAttribute("data-id")"#));
        assert!(fire("change").contains(r#"new Event("change""#));
    }

    #[test]
    fn test_scroll_snippets() {
        assert_eq!(
            scroll_window(0.0, 250.0, true),
            "window.scrollTo({ left: 0, top: 250, behavior: 'smooth' })"
        );
        assert!(scroll_element(10.5, 0.0, false).contains("left: 10.5, top: 0, behavior: 'auto'"));
    }
}
