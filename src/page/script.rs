/// In-page collector. Returns a JSON string shaped like `PageExtraction`.
///
/// `__BACKGROUND_LIMIT__` is replaced with a number or `null` (no limit).
const EXTRACTION_TEMPLATE: &str = r#"
(() => {
  const BACKGROUND_LIMIT = __BACKGROUND_LIMIT__;
  const MAX_CHAIN = 11;
  const candidates = [];

  const describe = (el) => {
    try {
      const r = el.getBoundingClientRect();
      const ancestors = [];
      let node = el;
      while (node && ancestors.length < MAX_CHAIN) {
        const cls = typeof node.className === 'string'
          ? node.className
          : (node.getAttribute('class') || '');
        ancestors.push({ tag: node.tagName.toLowerCase(), className: cls, id: node.id || '' });
        node = node.parentElement;
      }
      const figure = el.closest('figure');
      const caption = figure ? figure.querySelector('figcaption') : null;
      return {
        rect: { x: r.left, y: r.top, width: r.width, height: r.height },
        ancestors,
        alt: el.getAttribute('alt'),
        title: el.getAttribute('title'),
        caption: caption ? caption.textContent : null,
      };
    } catch (e) {
      return { error: String((e && e.message) || e) };
    }
  };

  const push = (strategy, value, el) => {
    if (typeof value === 'string' && value.trim() !== '') {
      candidates.push({ strategy, value, element: describe(el) });
    }
  };

  const guarded = (fn) => { try { fn(); } catch (e) { /* keep other strategies */ } };

  guarded(() => document.querySelectorAll('img').forEach((img) => {
    push('imgSrc', img.getAttribute('src'), img);
    ['data-src', 'data-lazy-src', 'data-original']
      .forEach((a) => push('lazyAttribute', img.getAttribute(a), img));
    ['srcset', 'data-srcset']
      .forEach((a) => push('srcset', img.getAttribute(a), img));
  }));

  guarded(() => document.querySelectorAll('picture source').forEach((source) => {
    const picture = source.closest('picture');
    const owner = (picture && picture.querySelector('img')) || picture || source;
    push('pictureSource', source.getAttribute('srcset'), owner);
    push('pictureSource', source.getAttribute('data-srcset'), owner);
  }));

  guarded(() => {
    const all = document.querySelectorAll('*');
    const count = BACKGROUND_LIMIT === null ? all.length : Math.min(all.length, BACKGROUND_LIMIT);
    for (let i = 0; i < count; i++) {
      const el = all[i];
      let bg = '';
      try { bg = window.getComputedStyle(el).backgroundImage; } catch (e) { continue; }
      if (bg && bg !== 'none' && bg.indexOf('url(') !== -1) push('cssBackground', bg, el);
    }
  });

  const doc = document.documentElement;
  return JSON.stringify({
    metrics: {
      scrollX: window.scrollX || window.pageXOffset || 0,
      scrollY: window.scrollY || window.pageYOffset || 0,
      documentHeight: Math.max(doc.scrollHeight, document.body ? document.body.scrollHeight : 0),
    },
    candidates,
  });
})()
"#;

pub(crate) fn extraction_script(background_limit: Option<usize>) -> String {
    let limit = background_limit
        .map(|n| n.to_string())
        .unwrap_or_else(|| "null".to_string());
    EXTRACTION_TEMPLATE.replace("__BACKGROUND_LIMIT__", &limit)
}

pub(crate) fn scroll_script(fraction: f64) -> String {
    format!(
        "(() => {{ const h = Math.max(document.documentElement.scrollHeight, \
         document.body ? document.body.scrollHeight : 0); \
         window.scrollTo(0, Math.floor(h * {})); return true; }})()",
        fraction.clamp(0.0, 1.0)
    )
}

pub(crate) const READY_STATE_SCRIPT: &str = "document.readyState";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_placeholder_is_replaced() {
        assert!(extraction_script(Some(1000)).contains("const BACKGROUND_LIMIT = 1000;"));
        assert!(extraction_script(None).contains("const BACKGROUND_LIMIT = null;"));
        assert!(!extraction_script(None).contains("__BACKGROUND_LIMIT__"));
    }

    #[test]
    fn ancestry_chain_starts_at_the_element() {
        let script = extraction_script(None);
        assert!(script.contains("let node = el;"));
        assert!(!script.contains("let node = el.parentElement;"));
    }

    #[test]
    fn scroll_fraction_is_clamped() {
        assert!(scroll_script(1.7).contains("h * 1)"));
        assert!(scroll_script(0.25).contains("h * 0.25)"));
    }
}
