//! Report synthesis from the gathered evidence pools.

use crate::llm::{JudgeClient, ResponseFormat};
use crate::prompts;
use crate::types::{AppError, ClinicalTrial, FullText, ResearchPlan, Result, Scored, WebResult};

/// Produce the final Markdown report.
///
/// At least one gathered full text is required; trial and web pools may be
/// empty and simply contribute nothing.
pub async fn synthesize_report(
    judge: &dyn JudgeClient,
    plan: &ResearchPlan,
    full_texts: &[FullText],
    trials: &[Scored<ClinicalTrial>],
    web_results: &[Scored<WebResult>],
) -> Result<String> {
    if full_texts.is_empty() {
        return Err(AppError::Precondition(
            "no full texts gathered; nothing to synthesize".to_string(),
        ));
    }

    let prompt = prompts::synthesis_writer(plan, full_texts, trials, web_results);
    let report = judge.complete(&prompt, ResponseFormat::Text).await?;
    Ok(report.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use crate::types::SubQuestion;

    struct EchoJudge;

    #[async_trait]
    impl JudgeClient for EchoJudge {
        async fn complete(&self, _prompt: &str, _format: ResponseFormat) -> Result<String> {
            Ok("\n## Executive Summary\n- finding\n".to_string())
        }

        fn model_name(&self) -> &str {
            "echo"
        }
    }

    fn plan() -> ResearchPlan {
        ResearchPlan {
            sub_questions: vec![SubQuestion {
                id: "a".to_string(),
                question: "Q".to_string(),
                keywords: vec![],
            }],
            clarification: "topic".to_string(),
            web_query: "topic".to_string(),
        }
    }

    #[tokio::test]
    async fn refuses_to_synthesize_without_full_texts() {
        let result = synthesize_report(&EchoJudge, &plan(), &[], &[], &[]).await;
        assert!(matches!(result, Err(AppError::Precondition(_))));
    }

    #[tokio::test]
    async fn trims_the_report() {
        let full_texts = vec![FullText {
            pmid: "1".to_string(),
            text: "body".to_string(),
        }];
        let report = synthesize_report(&EchoJudge, &plan(), &full_texts, &[], &[])
            .await
            .unwrap();
        assert!(report.starts_with("## Executive Summary"));
    }
}
