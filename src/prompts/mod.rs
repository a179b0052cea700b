//! Prompt builders for every judge call in the pipeline.
//!
//! All structured prompts demand a single valid JSON object with exact
//! fields; decoding happens in [`crate::llm::parse_structured`]. Item lists
//! are rendered by each item's `prompt_block`, which tags the source-native
//! identifier with `<id>` so reviewer output is uniform across sources.

use crate::types::{ClinicalTrial, FullText, ResearchPlan, Scored, WebResult};

fn sub_question_lines(plan: &ResearchPlan) -> String {
    plan.sub_questions
        .iter()
        .enumerate()
        .map(|(i, sq)| format!("{}. {}", i + 1, sq.question))
        .collect::<Vec<_>>()
        .join("\n    ")
}

/// Initial planning call: topic in, structured plan out.
pub fn research_strategist(topic: &str) -> String {
    format!(
        r#"You are a helpful and collaborative research strategist specializing in biomedical fields. Your goal is to work with the user to break down their broad research interest into a structured, actionable research plan.

The user's topic is: "{topic}"

Let's start by drafting a plan. Please perform the following steps:
1. Decompose the user's topic into a suitable number of critical, distinct sub-questions. Frame these as questions we want to answer. Each should represent a key facet of the topic.
2. For each sub-question, generate a concise list of 3-5 effective literature search keywords. These should be a mix of MeSH terms and common phrases.
3. Formulate a single, insightful clarification question to ask the user. This will help us refine the focus of the research together.
4. Propose a short, natural-language web search query for the topic.

Your final output MUST be a single, valid JSON object, with no markdown formatting or other text outside of the JSON. The JSON object should have the following structure:
{{
  "subQuestions": [
    {{
      "id": "placeholder_id_1",
      "question": "The first sub-question text.",
      "keywords": ["keyword1", "keyword2", "keyword3"]
    }}
  ],
  "clarification": "The single clarification question to the user.",
  "webQuery": "short natural-language web query"
}}"#
    )
}

/// Plan refinement call: prior plan plus user feedback in, replacement plan out.
pub fn refine_plan(topic: &str, current_plan: &ResearchPlan, feedback: &str) -> String {
    let plan_json = serde_json::to_string_pretty(current_plan).unwrap_or_default();
    format!(
        r#"You are a helpful research strategist in an ongoing conversation with a user. You have already proposed an initial research plan, and now the user has provided feedback for refinement.

**Original Research Topic:** "{topic}"

**Current Research Plan (in JSON format):**
```json
{plan_json}
```

**User's Feedback and Request for Changes:**
"{feedback}"

**Your Task:**
Carefully analyze the user's feedback and revise the **ENTIRE** research plan accordingly. You can add, remove, merge, or rephrase sub-questions and their keywords. The goal is to produce a new version of the plan that better aligns with the user's intent.

**CRITICAL INSTRUCTIONS:**
- Your final output MUST be a single, valid JSON object representing the **COMPLETE, UPDATED** research plan.
- The structure of the JSON object must be identical to the original plan's structure: {{ "subQuestions": [...], "clarification": "...", "webQuery": "..." }}.
- You can update the clarification question if the user's feedback implies a new direction.
- Do NOT just output the changes. Output the full, revised plan."#
    )
}

/// Query planning call: confirmed plan in, one query per source out.
///
/// All three fields are required; a response missing any of them fails the
/// whole search transition.
pub fn query_planner(plan: &ResearchPlan) -> String {
    let plan_json = serde_json::to_string_pretty(plan).unwrap_or_default();
    format!(
        r#"You are an expert biomedical search librarian. Turn the confirmed research plan below into three search queries, one per information source, each optimized for that source's query grammar.

**Research Plan:**
```json
{plan_json}
```

**Queries to produce:**
1. "pubmed_query": a boolean query for PubMed combining the plan's keywords, using AND within a sub-question and OR across sub-questions. MeSH-style terms are welcome.
2. "clinical_trials_query": a boolean query in the same style, phrased for ClinicalTrials.gov condition/intervention terminology.
3. "web_query": a short, natural-language query suitable for a general web search engine.

Your final output MUST be a single, valid JSON object with exactly these three string fields and no other text:
{{ "pubmed_query": "...", "clinical_trials_query": "...", "web_query": "..." }}"#
    )
}

/// Self-critique call: decide whether supplemental queries are needed.
///
/// `item_blocks` is the rendered `<...><id>...</id>...</...>` list for the
/// source's current working set.
pub fn search_refiner(
    plan: &ResearchPlan,
    item_blocks: &str,
    source_label: &str,
    query_grammar: &str,
) -> String {
    format!(
        r#"You are an expert research analyst. Your task is to determine if the current {source_label} search results adequately cover all aspects of the user's research plan. If not, you must generate new search queries to fill the gaps.

**Research Plan:**
- Main Topic: "{clarification}"
- Sub-questions to address:
    {sub_questions}

**Current Search Results:**
{item_blocks}

**Your Analysis & Task:**
1. Review the sub-questions in the research plan.
2. Review the results found so far.
3. Identify any sub-questions that are **poorly covered** or **not covered at all** by the current results.
4. For each identified gap, formulate one or two new, specific, and effective {source_label} queries ({query_grammar}) that are likely to find relevant records. These can be more targeted than the initial broad search.
5. If you believe the current results are sufficient and all sub-questions are well-covered, return an empty array.

**CRITICAL INSTRUCTIONS:**
- Your final output MUST be a single, valid JSON object, with no markdown formatting or other text outside of the JSON.
- The JSON object must have a single key "new_queries" which is an array of strings.
- If no new queries are needed, output: {{ "new_queries": [] }}"#,
        clarification = plan.clarification,
        sub_questions = sub_question_lines(plan),
    )
}

/// Final scoring call: the complete merged working set in, one review per id out.
pub fn relevance_reviewer(plan: &ResearchPlan, item_blocks: &str, source_label: &str) -> String {
    format!(
        r#"You are a meticulous research reviewer. Your task is to evaluate a list of {source_label} records based on their relevance to a given research plan.

The research plan is as follows:
- Main Topic: "{clarification}"
- Sub-questions:
    {sub_questions}

Here are the records you need to evaluate. Each carries its identifier in an <id> tag:
{item_blocks}

Please evaluate each record and provide a relevance score from 1 (not relevant) to 10 (highly relevant). Also, provide a single, concise sentence explaining your reasoning for the score.

Your final output MUST be a single, valid JSON object, with no markdown formatting or other text outside of the JSON. The object must have a single key "reviews" whose value is an array with one entry per record:
{{
  "reviews": [
    {{ "id": "the record's identifier", "score": 8, "reason": "The concise reason for the score." }}
  ]
}}"#,
        clarification = plan.clarification,
        sub_questions = sub_question_lines(plan),
    )
}

/// Synthesis call: plan plus all three evidence pools in, cited report out.
pub fn synthesis_writer(
    plan: &ResearchPlan,
    full_texts: &[FullText],
    trials: &[Scored<ClinicalTrial>],
    web_results: &[Scored<WebResult>],
) -> String {
    let documents = full_texts
        .iter()
        .map(|doc| format!("<document pmid=\"{}\">\n{}\n</document>", doc.pmid, doc.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let trial_blocks = trials
        .iter()
        .map(|t| {
            format!(
                "<trial nctId=\"{}\" status=\"{}\">\n{}\n{}\n</trial>",
                t.item.nct_id,
                t.item.status,
                t.item.title,
                t.item.summary
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let web_blocks = web_results
        .iter()
        .map(|w| {
            format!(
                "<webpage url=\"{}\">\n{}\n{}\n</webpage>",
                w.item.url, w.item.title, w.item.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"You are a top-tier medical researcher and writer. Your task is to synthesize the information from the provided full-text articles, clinical trial records and web results into a comprehensive, structured, and insightful literature review.

The research is guided by the following plan:
- Main Topic/Clarification: "{clarification}"
- Key Sub-questions to address:
    {sub_questions}

Here are the full texts of the selected articles. Each article is tagged with its PMID.
{documents}

Here are the screened clinical trial records:
{trial_blocks}

Here are the screened web results:
{web_blocks}

**CRITICAL INSTRUCTIONS:**
Your final output MUST be a single, well-formatted Markdown document. Do not include any other text or explanations outside of the Markdown report itself. The report must be structured with the following sections using Markdown headings:

1. **Executive Summary**: Start with a bulleted list of 3-5 key takeaways from the entire review. This should be concise and high-level for quick understanding.

2. **Introduction**: Write a brief introduction that sets the context for the research topic, states its importance, and outlines the structure of this review.

3. **Methodology Overview**: Briefly summarize the types of evidence included in this review (study designs, trial phases, web sources). Do not go into deep detail, just provide a high-level overview of the evidence base to establish its credibility.

4. **Synthesis by Sub-question**: This is the main body of the report. For each sub-question in the research plan, create a subsection and synthesize the findings from ALL relevant provided sources.
    - Do not just summarize one source at a time.
    - Integrate findings, highlight corroborating evidence, and note any contradictions or gaps.
    - **Crucially, every piece of information or claim from a source must be immediately followed by its citation.**

5. **Limitations**: Based on the provided sources, write a dedicated section discussing the overall limitations of the current body of research.

6. **Conclusion and Future Directions**: Write a strong concluding paragraph that summarizes the main findings of the entire review, then suggest specific and actionable future research directions based on the identified gaps and limitations.

**Formatting and Citation Style:**
- Use Markdown headings (`##`) for each section title as specified above.
- Inline citations are mandatory and must distinguish the source type:
  - full-text articles: **[PMID:XXXXXXXX]**
  - clinical trials: **[NCT:NCTXXXXXXXX]**
  - web results: **[WEB:https://...]**"#,
        clarification = plan.clarification,
        sub_questions = sub_question_lines(plan),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SubQuestion;

    fn plan() -> ResearchPlan {
        ResearchPlan {
            sub_questions: vec![
                SubQuestion {
                    id: "a".to_string(),
                    question: "What is the first facet?".to_string(),
                    keywords: vec!["k1".to_string()],
                },
                SubQuestion {
                    id: "b".to_string(),
                    question: "What is the second facet?".to_string(),
                    keywords: vec!["k2".to_string()],
                },
            ],
            clarification: "The narrowed topic".to_string(),
            web_query: "narrow topic".to_string(),
        }
    }

    #[test]
    fn refiner_prompt_numbers_the_sub_questions() {
        let prompt = search_refiner(&plan(), "<article/>", "PubMed", "boolean MeSH style");
        assert!(prompt.contains("1. What is the first facet?"));
        assert!(prompt.contains("2. What is the second facet?"));
        assert!(prompt.contains("\"new_queries\""));
    }

    #[test]
    fn synthesis_prompt_tags_every_evidence_pool() {
        let full_texts = vec![FullText {
            pmid: "111".to_string(),
            text: "body".to_string(),
        }];
        let trials = vec![Scored {
            item: ClinicalTrial {
                nct_id: "NCT01".to_string(),
                title: "Trial".to_string(),
                status: "RECRUITING".to_string(),
                summary: "S".to_string(),
                conditions: vec![],
                interventions: vec![],
                url: String::new(),
            },
            score: 7,
            reason: "r".to_string(),
        }];
        let web = vec![Scored {
            item: WebResult {
                url: "https://example.org".to_string(),
                title: "Page".to_string(),
                snippet: "text".to_string(),
            },
            score: 5,
            reason: "r".to_string(),
        }];

        let prompt = synthesis_writer(&plan(), &full_texts, &trials, &web);
        assert!(prompt.contains("<document pmid=\"111\">"));
        assert!(prompt.contains("nctId=\"NCT01\""));
        assert!(prompt.contains("url=\"https://example.org\""));
        assert!(prompt.contains("[PMID:"));
        assert!(prompt.contains("[NCT:"));
        assert!(prompt.contains("[WEB:"));
    }
}
