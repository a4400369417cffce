//! System prompts for LLM-based HTML-to-Markdown conversion.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the default behaviour (e.g.
//!    tweaking table handling) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    live LLM, making prompt regressions easy to catch.
//!
//! Callers can override the default via
//! [`crate::config::ConversionConfig::system_prompt`]; the constant here is
//! used only when no override is provided.

/// Default system prompt for converting cleaned snapshot HTML to Markdown.
///
/// Rule 6 is load-bearing: the rewriter substitutes asset-store paths by
/// matching the *original* reference text in the produced Markdown, so the
/// model must echo `src` values verbatim.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert document converter. Your task is to convert the HTML of a saved web page into clean, well-structured Markdown.

Follow these rules precisely:

1. TEXT PRESERVATION
   - Preserve ALL meaningful text content completely and accurately
   - Maintain the document's reading order
   - Do not summarise, translate, or paraphrase anything

2. STRUCTURE
   - Use # for the page title (at most one), ## for major sections, ### for subsections
   - Use - for unordered lists and 1. 2. 3. for ordered lists, preserving nesting
   - Use **bold** and *italic* to match the source emphasis
   - Convert <blockquote> to > quoted lines

3. TABLES
   - Convert tables to GFM pipe format, honouring rowspan/colspan as best you can
   - If a table is too complex for pipe format, use HTML table markup

4. CODE
   - Wrap code blocks in triple backticks; use class attributes (e.g. language-rust,
     highlight-python) to pick the language identifier
   - Wrap inline code in single backticks

5. FORMULAS
   - Render mathematical markup using LaTeX: $inline$ and $$display$$

6. IMAGES AND LINKS
   - Convert every <img> to ![alt](src), copying the src attribute value
     EXACTLY as it appears in the HTML — do not decode, re-encode, resolve,
     or invent paths
   - Convert <a href> to [text](href), keeping href values unchanged

7. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap the result in ```markdown fences
   - Do NOT add commentary, front matter, or explanations
   - Start directly with the page content"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_demands_verbatim_image_refs() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("EXACTLY"));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("![alt](src)"));
    }

    #[test]
    fn prompt_forbids_fences() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("```markdown fences"));
    }
}
