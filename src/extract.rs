//! Article title and body extraction.
//!
//! Naver article pages come in two heading layouts, so the headline is tried
//! against a primary selector and a fallback. The body container is fixed.
//! If either is absent the extraction is a miss (`None`), which the caller
//! persists as an empty record; a miss is an expected site condition
//! (removed article, layout variant, paywall), not an error.
//!
//! Body cleaning drops the lead-summary blurb and non-prose structural tags,
//! then joins the remaining paragraph-level text in document order. Finally
//! a script-boundary pass inserts a space wherever Korean/CJK text butts
//! directly against Latin letters in either direction, which Naver's markup
//! frequently collapses ("속보News" -> "속보 News").

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use tracing::debug;

static TITLE_PRIMARY: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h2#title_area span").expect("valid selector"));
static TITLE_FALLBACK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3#articleTitle").expect("valid selector"));
static BODY_CONTAINER: Lazy<Selector> =
    Lazy::new(|| Selector::parse("article#dic_area").expect("valid selector"));

static CJK_THEN_LATIN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([\p{Hangul}\p{Han}\p{Hiragana}\p{Katakana}])([A-Za-z])").expect("valid regex")
});
static LATIN_THEN_CJK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z])([\p{Hangul}\p{Han}\p{Hiragana}\p{Katakana}])").expect("valid regex")
});

/// Extracted title and cleaned body. Both guaranteed non-empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    pub title: String,
    pub body: String,
}

/// Extract title and cleaned body text from a rendered article page.
///
/// Returns `None` when the headline or the body container is absent, or
/// when cleaning leaves nothing behind.
pub fn extract_article(html: &str) -> Option<Extracted> {
    let document = Html::parse_document(html);

    let title_element = document
        .select(&TITLE_PRIMARY)
        .next()
        .or_else(|| document.select(&TITLE_FALLBACK).next())?;
    let title = normalize_script_boundaries(&collapse_text(title_element));

    let body_element = document.select(&BODY_CONTAINER).next()?;
    let body = normalize_script_boundaries(&clean_body(body_element));

    if title.is_empty() || body.is_empty() {
        debug!(
            title_len = title.len(),
            body_len = body.len(),
            "extraction produced empty title or body"
        );
        return None;
    }

    Some(Extracted { title, body })
}

/// Non-prose tags whose subtrees never contribute body text.
fn is_structural(name: &str) -> bool {
    matches!(name, "table" | "script" | "style" | "aside" | "footer")
}

/// The lead-summary blurb Naver renders above the body proper.
fn is_lead_summary(el: ElementRef) -> bool {
    el.value().name() == "strong"
        && el
            .value()
            .attr("class")
            .is_some_and(|c| c.split_whitespace().any(|cls| cls == "media_end_summary"))
}

fn is_excluded(el: ElementRef) -> bool {
    is_structural(el.value().name()) || is_lead_summary(el)
}

fn is_paragraph(el: ElementRef) -> bool {
    matches!(el.value().name(), "span" | "p")
}

/// True when `el` has an excluded or paragraph-level ancestor strictly
/// between itself and `root`. Paragraph ancestors are filtered so nested
/// spans are not collected twice.
fn has_blocking_ancestor(el: ElementRef, root: ElementRef) -> bool {
    let mut node = el.parent();
    while let Some(n) = node {
        if n.id() == root.id() {
            return false;
        }
        if let Some(ancestor) = ElementRef::wrap(n) {
            if is_excluded(ancestor) || is_paragraph(ancestor) {
                return true;
            }
        }
        node = n.parent();
    }
    false
}

/// Collect paragraph-level text inside the body container in document order,
/// each piece trimmed, joined by newline.
fn clean_body(body: ElementRef) -> String {
    let mut paragraphs = Vec::new();
    for node in body.descendants() {
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        if !is_paragraph(el) || is_excluded(el) || has_blocking_ancestor(el, body) {
            continue;
        }
        let text = collapse_text(el);
        if !text.is_empty() {
            paragraphs.push(text);
        }
    }
    paragraphs.join("\n")
}

/// All text under an element, whitespace-collapsed and trimmed.
fn collapse_text(el: ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Insert a space at every CJK/Latin boundary, both directions.
pub fn normalize_script_boundaries(text: &str) -> String {
    let pass_one = CJK_THEN_LATIN.replace_all(text, "$1 $2");
    let pass_two = LATIN_THEN_CJK.replace_all(&pass_one, "$1 $2");
    pass_two.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boundary_spacing_cjk_then_latin() {
        assert_eq!(normalize_script_boundaries("속보News"), "속보 News");
    }

    #[test]
    fn test_boundary_spacing_latin_then_cjk() {
        assert_eq!(normalize_script_boundaries("News속보"), "News 속보");
    }

    #[test]
    fn test_boundary_spacing_both_directions_in_one_string() {
        assert_eq!(
            normalize_script_boundaries("미국Fed가 금리를BPS인하"),
            "미국 Fed 가 금리를 BPS 인하"
        );
    }

    #[test]
    fn test_boundary_spacing_leaves_spaced_text_alone() {
        assert_eq!(normalize_script_boundaries("속보 News"), "속보 News");
        assert_eq!(normalize_script_boundaries("plain english"), "plain english");
    }

    const ARTICLE_HTML: &str = r#"
        <html><body>
          <h2 id="title_area"><span>코스피 급등Market</span></h2>
          <article id="dic_area">
            <strong class="media_end_summary">요약 블러브는 제외된다</strong>
            <span>첫 번째 문단입니다.</span>
            <table><tr><td><span>표 안의 텍스트</span></td></tr></table>
            <p>두 번째 문단GDP 관련.</p>
            <aside><span>사이드바</span></aside>
          </article>
        </body></html>"#;

    #[test]
    fn test_extracts_title_with_primary_selector() {
        let extracted = extract_article(ARTICLE_HTML).unwrap();
        assert_eq!(extracted.title, "코스피 급등 Market");
    }

    #[test]
    fn test_body_cleaning_drops_summary_and_structural_tags() {
        let extracted = extract_article(ARTICLE_HTML).unwrap();
        assert_eq!(extracted.body, "첫 번째 문단입니다.\n두 번째 문단 GDP 관련.");
    }

    #[test]
    fn test_fallback_title_selector() {
        let html = r#"
            <html><body>
              <h3 id="articleTitle">옛날 레이아웃 제목</h3>
              <article id="dic_area"><span>본문.</span></article>
            </body></html>"#;
        let extracted = extract_article(html).unwrap();
        assert_eq!(extracted.title, "옛날 레이아웃 제목");
    }

    #[test]
    fn test_missing_body_container_is_a_miss() {
        let html = r#"
            <html><body>
              <h2 id="title_area"><span>제목만 있음</span></h2>
            </body></html>"#;
        assert!(extract_article(html).is_none());
    }

    #[test]
    fn test_missing_title_is_a_miss() {
        let html = r#"
            <html><body>
              <article id="dic_area"><span>본문만 있음.</span></article>
            </body></html>"#;
        assert!(extract_article(html).is_none());
    }

    #[test]
    fn test_body_with_only_excluded_content_is_a_miss() {
        let html = r#"
            <html><body>
              <h2 id="title_area"><span>제목</span></h2>
              <article id="dic_area">
                <table><tr><td><span>표</span></td></tr></table>
              </article>
            </body></html>"#;
        assert!(extract_article(html).is_none());
    }

    #[test]
    fn test_nested_spans_not_collected_twice() {
        let html = r#"
            <html><body>
              <h2 id="title_area"><span>제목</span></h2>
              <article id="dic_area">
                <span>바깥 <span>안쪽</span> 텍스트</span>
              </article>
            </body></html>"#;
        let extracted = extract_article(html).unwrap();
        assert_eq!(extracted.body, "바깥 안쪽 텍스트");
    }
}
