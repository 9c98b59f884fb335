use std::io::Write;

use anyhow::Result;
use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};

use konspekt_core::{
    Assistant, AssistantError, ChatMessage, Transcript, format_chat, types::VideoDescriptor,
};

use crate::ui::{create_spinner, print_rule};

enum Input {
    Exit,
    Clear,
    Skip,
    Message(String),
}

fn parse_input(line: &str) -> Input {
    match line.trim() {
        "" => Input::Skip,
        "/exit" | "/quit" => Input::Exit,
        "/clear" => Input::Clear,
        text => Input::Message(text.to_string()),
    }
}

fn prompt() -> Result<()> {
    print!("{} ", style(">").cyan().bold());
    std::io::stdout().flush()?;
    Ok(())
}

/// One video's conversation. `history` only ever holds answered turns, so
/// the assistant never sees or persists a failed question or its apology.
struct ChatSession<'a> {
    assistant: &'a Assistant,
    video: &'a VideoDescriptor,
    transcript: Option<&'a Transcript>,
    history: Vec<ChatMessage>,
}

impl<'a> ChatSession<'a> {
    async fn load(
        assistant: &'a Assistant,
        video: &'a VideoDescriptor,
        transcript: Option<&'a Transcript>,
    ) -> Self {
        let history = match assistant.store().get_chat(&video.video_id).await {
            Ok(messages) => messages.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "Could not load chat history");
                Vec::new()
            }
        };
        Self {
            assistant,
            video,
            transcript,
            history,
        }
    }

    async fn ask(&mut self, question: String) -> Result<String, AssistantError> {
        self.history.push(ChatMessage::user(question));
        let reply = self
            .assistant
            .try_chat_with_video(
                &self.video.video_id,
                &self.video.video_title,
                self.transcript,
                &self.history,
            )
            .await;

        match &reply {
            Ok(answer) => self.history.push(ChatMessage::model(answer.clone())),
            Err(_) => {
                self.history.pop();
            }
        }
        reply
    }

    async fn clear(&mut self) -> Result<()> {
        self.assistant.store().remove_chat(&self.video.video_id).await?;
        self.history.clear();
        Ok(())
    }
}

/// Interactive Q&A about one video. Each answered exchange is persisted by
/// the assistant; failed replies are only printed.
pub async fn run_chat(
    assistant: &Assistant,
    video: &VideoDescriptor,
    transcript: Option<&Transcript>,
) -> Result<()> {
    let mut session = ChatSession::load(assistant, video, transcript).await;

    if !session.history.is_empty() {
        print_rule();
        print!("{}", format_chat(&session.history));
    }
    println!(
        "{}",
        style("Ask about the video. /clear forgets this chat, /exit quits.").dim()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let question = match parse_input(&line) {
            Input::Exit => break,
            Input::Skip => continue,
            Input::Clear => {
                session.clear().await?;
                println!("{}", style("Chat cleared.").dim());
                continue;
            }
            Input::Message(text) => text,
        };

        let spinner = create_spinner("Thinking...");
        let reply = session.ask(question).await;
        spinner.finish_and_clear();

        let content = reply.unwrap_or_else(|e| e.message);
        print!("{}", format_chat(&[ChatMessage::model(content)]));
    }

    Ok(())
}
