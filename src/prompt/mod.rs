//! Prompt assembly.
//!
//! Turns a query and a ranked document list into one of two fixed textual
//! templates. Document text is inserted verbatim into a fixed-shape
//! container; it is never re-interpreted as template syntax.

use crate::retriever::{round_score, RankedResult};

/// 基础提示词模板
const BASE_TEMPLATE: &str = "你是一个专业的法律顾问。请根据以下参考文档回答用户的问题。
如果无法从参考文档中找到答案，请明确说明。请不要编造信息。

参考文档：
{context}

用户问题：{query}

请给出专业、准确的回答：";

/// 带评分的提示词模板
const SCORING_TEMPLATE: &str = "你是一个专业的法律顾问。请根据以下参考文档回答用户的问题，并为每个参考文档的相关性打分。
如果无法从参考文档中找到答案，请明确说明。请不要编造信息。

参考文档：
{context}

用户问题：{query}

请先为每个参考文档的相关性打分（0-10分），然后给出专业、准确的回答：";

/// Deterministic prompt builder over the two fixed templates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PromptAssembler;

impl PromptAssembler {
    pub fn new() -> Self {
        Self
    }

    /// Build the full prompt: context block first, then the literal query.
    ///
    /// `scoring` selects the template that additionally asks the generator
    /// to score each reference 0-10 before answering.
    pub fn assemble(&self, query: &str, documents: &[RankedResult], scoring: bool) -> String {
        let context = Self::format_context(documents);
        let template = if scoring { SCORING_TEMPLATE } else { BASE_TEMPLATE };
        // Substitute the query slot first: the context placeholder sits
        // earlier in the template, so untrusted text inserted by either step
        // can never be picked up as the other placeholder.
        template
            .replacen("{query}", query, 1)
            .replacen("{context}", &context, 1)
    }

    /// Context block: one entry per document in rank order,
    /// `[rank] 相关度 <score to 4 dp>:` then the text, separated by blank
    /// lines.
    fn format_context(documents: &[RankedResult]) -> String {
        documents
            .iter()
            .map(|doc| {
                format!(
                    "[{}] 相关度 {:.4}:\n{}\n",
                    doc.rank,
                    round_score(doc.score),
                    doc.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ranked(rank: usize, text: &str, score: f32) -> RankedResult {
        RankedResult {
            rank,
            text: text.to_string(),
            score,
            index: rank - 1,
        }
    }

    #[test]
    fn test_assemble_base_template() {
        let assembler = PromptAssembler::new();
        let docs = vec![ranked(1, "D1", 0.812_345_6)];

        let prompt = assembler.assemble("Q", &docs, false);
        assert!(prompt.contains("[1] 相关度 0.8123:"));
        assert!(prompt.contains("用户问题：Q"));
        assert!(prompt.contains("D1"));
        assert!(!prompt.contains("0-10分"));
    }

    #[test]
    fn test_assemble_scoring_template() {
        let assembler = PromptAssembler::new();
        let docs = vec![ranked(1, "D1", 0.9)];

        let prompt = assembler.assemble("Q", &docs, true);
        assert!(prompt.contains("0-10分"));
        assert!(prompt.contains("[1] 相关度 0.9000:"));
    }

    #[test]
    fn test_context_before_query() {
        let assembler = PromptAssembler::new();
        let docs = vec![ranked(1, "参考内容", 0.7)];

        let prompt = assembler.assemble("我的问题", &docs, false);
        let context_pos = prompt.find("参考内容").unwrap();
        let query_pos = prompt.find("我的问题").unwrap();
        assert!(context_pos < query_pos);
    }

    #[test]
    fn test_multiple_documents_in_rank_order() {
        let assembler = PromptAssembler::new();
        let docs = vec![ranked(1, "第一篇", 0.95), ranked(2, "第二篇", 0.85)];

        let prompt = assembler.assemble("Q", &docs, false);
        assert!(prompt.contains("[1] 相关度 0.9500:"));
        assert!(prompt.contains("[2] 相关度 0.8500:"));
        assert!(prompt.find("第一篇").unwrap() < prompt.find("第二篇").unwrap());
    }

    #[test]
    fn test_document_text_inserted_verbatim() {
        // Braces inside document text must not be treated as placeholders
        let assembler = PromptAssembler::new();
        let docs = vec![ranked(1, "文本 {query} {context}", 0.8)];

        let prompt = assembler.assemble("真实问题", &docs, false);
        assert!(prompt.contains("文本 {query} {context}"));
        assert!(prompt.contains("用户问题：真实问题"));
    }

    #[test]
    fn test_empty_documents_still_well_formed() {
        let assembler = PromptAssembler::new();
        let prompt = assembler.assemble("Q", &[], false);
        assert!(prompt.contains("参考文档："));
        assert!(prompt.contains("用户问题：Q"));
    }

    #[test]
    fn test_deterministic() {
        let assembler = PromptAssembler::new();
        let docs = vec![ranked(1, "D", 0.5)];
        assert_eq!(
            assembler.assemble("Q", &docs, false),
            assembler.assemble("Q", &docs, false)
        );
    }
}
