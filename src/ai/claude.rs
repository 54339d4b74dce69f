use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{BillAction, BillKey};

use super::{Classifier, Summarizer};

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const CLAUDE_MODEL: &str = "claude-3-5-haiku-20241022";

/// Longest document slice forwarded to the model.
const MAX_TEXT_CHARS: usize = 10000;

#[derive(Debug, Serialize)]
struct MessageRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
    system: Option<String>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    content_type: String,
    text: Option<String>,
}

pub struct Claude {
    client: Client,
    api_key: String,
}

impl Claude {
    pub fn new(api_key: String) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");
        Self { client, api_key }
    }

    async fn send(&self, system_prompt: &str, user_message: String, max_tokens: u32) -> Result<String> {
        let request = MessageRequest {
            model: CLAUDE_MODEL.to_string(),
            max_tokens,
            messages: vec![Message {
                role: "user".to_string(),
                content: user_message,
            }],
            system: Some(system_prompt.to_string()),
        };

        let response = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(AppError::ClaudeApi(format!("API error: {}", error_text)));
        }

        let message_response: MessageResponse = response.json().await?;

        let reply = message_response
            .content
            .into_iter()
            .filter_map(|block| block.text)
            .collect::<Vec<_>>()
            .join("\n");

        Ok(reply)
    }
}

impl Classifier for Claude {
    async fn classify_importance(
        &self,
        key: BillKey,
        title: &str,
        actions: &[BillAction],
    ) -> Result<String> {
        let system_prompt = r#"You are a helpful assistant tasked with providing a concise assessment of legislative importance.
Your response must be a single phrase chosen from "Must Know", "Important", or "Minimal".
Base the assessment on the bill's potential impact on the nation and society, considering its full context from an unbiased perspective.
Any bill actions involving the President are always "Must Know".
Do not provide any additional context or explanation beyond the label."#;

        let user_message = format!(
            "Please assess the importance of the following bill:\n\n\
             Congress: {}\n\
             Bill Title: {}\n\
             Bill Number: {}{}\n\n\
             Bill Actions:\n{}\n\n\
             Respond with only one of: \"Must Know\", \"Important\", or \"Minimal\".",
            key.congress,
            title,
            key.bill_type,
            key.number,
            format_actions(actions)
        );

        self.send(system_prompt, user_message, 32).await
    }
}

impl Summarizer for Claude {
    async fn summarize_bill(
        &self,
        key: BillKey,
        title: &str,
        actions: &[BillAction],
        text: &str,
    ) -> Result<String> {
        let system_prompt = r#"You are an unbiased reporter tasked with summarizing legislation. Provide a detailed 4-5 paragraph summary of the given bill, including current actions and important facts. Follow these guidelines:
- Do not provide a title or helper text like "Here is a summary of [x]..."
- Use plain text without formatting
- Avoid bullet points or lists
- Omit party affiliations of sponsors or co-sponsors
- Present insights chronologically if applicable
- Include section numbers for referenced bill text"#;

        // Truncate content if too long
        let text = match text.char_indices().nth(MAX_TEXT_CHARS) {
            Some((idx, _)) => &text[..idx],
            None => text,
        };

        let user_message = format!(
            "Summarize the following legislation:\n\n\
             Congress: {}\n\
             Bill Title: {}\n\
             Bill Type and Number: {}{}\n\n\
             Bill Text:\n{}\n\n\
             Bill Actions:\n{}",
            key.congress,
            title,
            key.bill_type,
            key.number,
            text,
            format_actions(actions)
        );

        self.send(system_prompt, user_message, 1024).await
    }

    fn model_version(&self) -> &str {
        CLAUDE_MODEL
    }
}

fn format_actions(actions: &[BillAction]) -> String {
    actions
        .iter()
        .map(|a| match a.action_date {
            Some(date) => format!("{}: {}", date, a.action_text),
            None => a.action_text.clone(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
