//! Idea expansion: new Ideas captures get an async heavy-model brainstorm
//! written to `Research/Ideas/`.

use std::sync::Arc;

use crate::llm::OllamaClient;
use crate::vault::Vault;

const IDEA_EXPANDER_PROMPT: &str = r#"Expand on this idea with questions and angles to explore.

Idea: "{idea}"
Category context: {context}

Generate:
- 3-5 probing questions about this idea
- 2-3 potential applications or directions
- 1-2 potential challenges or considerations

Do NOT search the web. Use only reasoning.
Output as markdown with headers."#;

pub struct IdeaExpander {
    llm: Arc<OllamaClient>,
    vault: Arc<Vault>,
}

impl IdeaExpander {
    pub fn new(llm: Arc<OllamaClient>, vault: Arc<Vault>) -> Self {
        Self { llm, vault }
    }

    /// Generates research prose for an idea with the heavy model.
    pub async fn expand_idea(&self, idea_text: &str, context: &str) -> anyhow::Result<String> {
        let prompt = IDEA_EXPANDER_PROMPT
            .replace("{idea}", idea_text)
            .replace("{context}", context);
        Ok(self.llm.generate_text(&prompt, true).await?)
    }

    /// Writes the research file and returns its vault-relative path.
    pub fn write_research_file(
        &self,
        idea_id: &str,
        title: &str,
        content: &str,
    ) -> anyhow::Result<String> {
        self.vault.write_research(idea_id, title, content)
    }
}

/// Builds the category-context string from tags.
pub fn idea_context(tags: &[String]) -> String {
    if tags.is_empty() {
        "Ideas".to_string()
    } else {
        format!("Ideas (tags: {})", tags.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idea_context() {
        assert_eq!(idea_context(&[]), "Ideas");
        assert_eq!(
            idea_context(&["cache".to_string(), "feed".to_string()]),
            "Ideas (tags: cache, feed)"
        );
    }

    #[test]
    fn test_prompt_substitution() {
        let prompt = IDEA_EXPANDER_PROMPT
            .replace("{idea}", "an eviction cache")
            .replace("{context}", "Ideas (tags: cache)");
        assert!(prompt.contains("Idea: \"an eviction cache\""));
        assert!(prompt.contains("Category context: Ideas (tags: cache)"));
    }
}
