//! In-page JavaScript used by the Chromium driver.
//!
//! Every script evaluates one [`ElementQuery`] against the live DOM and
//! returns a [`ScriptReply`]. Only visible, enabled elements count as
//! matches.

use serde::Deserialize;

use crate::commands::{ElementProbe, ElementQuery};
use crate::error::{AdapterError, AdapterErrorKind};

/// What the script does with the chosen element.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScriptMode {
    /// Report only.
    Probe,
    /// Scroll into view, then report the centre point.
    Locate,
    /// Focus and clear the current value, ready for text insertion.
    Focus,
}

impl ScriptMode {
    fn as_str(&self) -> &'static str {
        match self {
            ScriptMode::Probe => "probe",
            ScriptMode::Locate => "locate",
            ScriptMode::Focus => "focus",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ScriptReply {
    pub found: bool,
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub tag: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub error: Option<String>,
}

impl ScriptReply {
    pub fn into_probe(self) -> Result<Option<ElementProbe>, AdapterError> {
        if let Some(error) = self.error {
            return Err(AdapterError::new(AdapterErrorKind::Script).with_hint(error));
        }
        if !self.found {
            return Ok(None);
        }
        Ok(Some(ElementProbe {
            count: self.count,
            x: self.x,
            y: self.y,
            tag: self.tag,
            text: self.text,
        }))
    }
}

const PRELUDE: &str = r#"
  const norm = (s) => (s || '').replace(/\s+/g, ' ').trim();
  const ROLE_SELECTORS = {
    button: 'button, [role="button"], input[type="button"], input[type="submit"], input[type="reset"]',
    textbox: 'input:not([type]), input[type="text"], input[type="email"], input[type="password"], input[type="search"], input[type="tel"], input[type="url"], textarea, [role="textbox"], [contenteditable="true"]',
    menuitem: '[role="menuitem"], [role="menuitemcheckbox"], [role="menuitemradio"]',
    link: 'a[href], [role="link"]',
    dialog: 'dialog, [role="dialog"], [role="alertdialog"]',
  };
  const visible = (el) => {
    if (!el || !el.isConnected) return false;
    if (el.disabled || el.getAttribute('aria-disabled') === 'true') return false;
    const style = window.getComputedStyle(el);
    if (style.visibility === 'hidden' || style.display === 'none') return false;
    const rect = el.getBoundingClientRect();
    return rect.width > 0 && rect.height > 0;
  };
  const textOf = (el) => norm(el.innerText || el.textContent || el.value || '');
  const accessibleName = (el) => {
    const labelledBy = el.getAttribute('aria-labelledby');
    if (labelledBy) {
      const parts = labelledBy.split(/\s+/).map((id) => document.getElementById(id)).filter(Boolean);
      if (parts.length) return norm(parts.map(textOf).join(' '));
    }
    const aria = el.getAttribute('aria-label');
    if (aria) return norm(aria);
    if (el.labels && el.labels.length) return norm(Array.from(el.labels).map(textOf).join(' '));
    const tag = el.tagName.toLowerCase();
    if (tag === 'input' || tag === 'textarea' || tag === 'select') {
      if (el.id) {
        const label = document.querySelector('label[for="' + CSS.escape(el.id) + '"]');
        if (label) return textOf(label);
      }
      const wrapping = el.closest('label');
      if (wrapping) return textOf(wrapping);
      if (el.placeholder) return norm(el.placeholder);
      if (tag === 'input' && ['button', 'submit', 'reset'].includes(el.type)) return norm(el.value);
      return norm(el.title);
    }
    return textOf(el) || norm(el.title);
  };
  const matchesText = (actual, wanted, exact) =>
    exact ? actual === norm(wanted) : actual.toLowerCase().includes(norm(wanted).toLowerCase());
"#;

const COLLECT: &str = r#"
  let candidates = [];
  try {
    switch (rule.kind) {
      case 'role': {
        const selector = ROLE_SELECTORS[rule.role] || ('[role="' + rule.role + '"]');
        candidates = Array.from(document.querySelectorAll(selector))
          .filter((el) => matchesText(accessibleName(el), rule.name, rule.exact));
        break;
      }
      case 'text': {
        const pool = Array.from(document.querySelectorAll(rule.scope || 'body *'));
        const hit = (el) => rule.patterns.some((p) => matchesText(textOf(el), p, rule.exact));
        candidates = pool.filter((el) => hit(el) && !Array.from(el.children).some((child) => pool.includes(child) && hit(child)));
        break;
      }
      case 'test_id':
        candidates = Array.from(document.querySelectorAll('[data-testid="' + CSS.escape(rule.id) + '"]'));
        break;
      case 'css':
        candidates = Array.from(document.querySelectorAll(rule.selector));
        break;
      default:
        return { found: false, error: 'unknown rule kind ' + rule.kind };
    }
  } catch (err) {
    return { found: false, error: String(err && err.message ? err.message : err) };
  }
  const matches = candidates.filter(visible);
  const count = matches.length;
  if (!count) return { found: false, count: 0 };
  let index = 0;
  switch (pick.mode) {
    case 'last': index = count - 1; break;
    case 'nth': index = pick.index; break;
    case 'nth_or_first': index = pick.index < count ? pick.index : 0; break;
    default: index = 0;
  }
  const el = matches[index];
  if (!el) return { found: false, count };
"#;

const FINISH: &str = r#"
  if (mode === 'locate' || mode === 'focus') {
    el.scrollIntoView({ block: 'center', inline: 'center' });
  }
  if (mode === 'focus') {
    if (typeof el.focus === 'function') el.focus();
    if ('value' in el) {
      const proto = el instanceof HTMLTextAreaElement ? HTMLTextAreaElement.prototype : HTMLInputElement.prototype;
      const setter = Object.getOwnPropertyDescriptor(proto, 'value');
      if (setter && setter.set) setter.set.call(el, ''); else el.value = '';
      el.dispatchEvent(new Event('input', { bubbles: true }));
    } else if (el.isContentEditable) {
      el.textContent = '';
    }
  }
  const rect = el.getBoundingClientRect();
  return {
    found: true,
    count,
    x: rect.left + rect.width / 2,
    y: rect.top + rect.height / 2,
    tag: el.tagName.toLowerCase(),
    text: textOf(el).slice(0, 80),
  };
"#;

/// Builds the self-invoking expression for `query` in `mode`.
pub fn element_script(query: &ElementQuery, mode: ScriptMode) -> Result<String, AdapterError> {
    let rule = serde_json::to_string(&query.rule)
        .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))?;
    let pick = serde_json::to_string(&query.pick)
        .map_err(|err| AdapterError::new(AdapterErrorKind::Internal).with_hint(err.to_string()))?;
    Ok(format!(
        "(() => {{\n  const rule = {rule};\n  const pick = {pick};\n  const mode = '{mode}';\n{PRELUDE}{COLLECT}{FINISH}}})()",
        mode = mode.as_str(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{LocatorRule, Pick};

    #[test]
    fn script_embeds_query_as_json() {
        let query = ElementQuery::new(LocatorRule::Css {
            selector: r#"[data-testid*="remix"]"#.into(),
        })
        .with_pick(Pick::NthOrFirst { index: 1 });
        let script = element_script(&query, ScriptMode::Locate).unwrap();
        assert!(script.starts_with("(() => {"));
        assert!(script.trim_end().ends_with("})()"));
        assert!(script.contains(r#""kind":"css""#));
        assert!(script.contains(r#"[data-testid*=\"remix\"]"#));
        assert!(script.contains(r#""mode":"nth_or_first","index":1"#));
        assert!(script.contains("const mode = 'locate';"));
    }

    #[test]
    fn reply_maps_to_probe() {
        let reply: ScriptReply = serde_json::from_str(
            r#"{"found":true,"count":2,"x":10.5,"y":4,"tag":"button","text":"Remix"}"#,
        )
        .unwrap();
        let probe = reply.into_probe().unwrap().unwrap();
        assert_eq!(probe.count, 2);
        assert_eq!(probe.tag, "button");

        let missing: ScriptReply = serde_json::from_str(r#"{"found":false,"count":0}"#).unwrap();
        assert!(missing.into_probe().unwrap().is_none());
    }

    #[test]
    fn script_errors_surface_as_adapter_errors() {
        let reply: ScriptReply =
            serde_json::from_str(r#"{"found":false,"error":"is not a valid selector"}"#).unwrap();
        let err = reply.into_probe().unwrap_err();
        assert_eq!(err.kind, AdapterErrorKind::Script);
        assert!(!err.is_session_fault());
    }
}
