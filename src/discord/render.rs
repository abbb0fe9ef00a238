use std::sync::Arc;

use indexmap::IndexMap;
use serenity::all::{
    ButtonStyle, ChannelId, Colour, CreateActionRow, CreateButton, CreateEmbed, CreateEmbedAuthor, CreateInputText, CreateInteractionResponse, CreateInteractionResponseFollowup,
    CreateInteractionResponseMessage, CreateMessage, CreateModal, EditMessage, Http, InputTextStyle, MessageId, ReactionType, Timestamp,
};
use serenity::async_trait;

use crate::ai::{Reply, ReplySink, ReplyTarget};
use crate::errors::{BotError, BotResult};
use crate::session::control::BLANK_LABEL;
use crate::session::manager::{component_id, parse_component_id};
use crate::session::paginator::Paginator;
use crate::session::session::{ModalSpec, Transition};
use crate::session::{Control, ControlStyle, EmbedSpec, Notice, RenderInstruction, RenderTarget, Renderer, SessionManager};

const MAX_BUTTONS_PER_ROW: usize = 5;

pub fn embed_from_spec(spec: &EmbedSpec) -> CreateEmbed {
    let mut embed = CreateEmbed::new().colour(Colour::new(spec.colour));
    if let Some(title) = &spec.title {
        embed = embed.title(title);
    }
    if let Some(description) = &spec.description {
        embed = embed.description(description);
    }
    if let Some(author) = &spec.author {
        embed = embed.author(CreateEmbedAuthor::new(author));
    }
    for field in &spec.fields {
        embed = embed.field(&field.name, &field.value, field.inline);
    }
    embed
}

fn button_style(style: ControlStyle) -> ButtonStyle {
    match style {
        ControlStyle::Primary => ButtonStyle::Primary,
        ControlStyle::Secondary => ButtonStyle::Secondary,
        ControlStyle::Success => ButtonStyle::Success,
        ControlStyle::Danger => ButtonStyle::Danger,
    }
}

fn button(session_id: &str, control: &Control) -> CreateButton {
    let mut button = CreateButton::new(component_id(session_id, &control.token))
        .style(button_style(control.style))
        .disabled(control.disabled);
    if let Some(emoji) = &control.emoji {
        button = button.emoji(ReactionType::Unicode(emoji.clone()));
    }
    match &control.label {
        Some(label) => button.label(label),
        None if control.emoji.is_none() => button.label(BLANK_LABEL),
        None => button,
    }
}

/// Groups controls by their row, keeping registration order inside a row.
pub fn action_rows(session_id: &str, controls: &[Control]) -> Vec<CreateActionRow> {
    let mut rows: IndexMap<u8, Vec<CreateButton>> = IndexMap::new();
    for control in controls {
        rows.entry(control.row).or_default().push(button(session_id, control));
    }
    rows.sort_keys();
    rows.into_values()
        .flat_map(|buttons| buttons.chunks(MAX_BUTTONS_PER_ROW).map(|chunk| CreateActionRow::Buttons(chunk.to_vec())).collect::<Vec<_>>())
        .collect()
}

pub fn reply_from_instruction(instruction: &RenderInstruction) -> poise::CreateReply {
    let mut reply = poise::CreateReply::default().components(action_rows(&instruction.session_id, &instruction.controls));
    if let Some(content) = &instruction.content {
        reply = reply.content(content);
    }
    if let Some(embed) = &instruction.embed {
        reply = reply.embed(embed_from_spec(embed));
    }
    reply
}

pub fn message_from_instruction(instruction: &RenderInstruction) -> CreateMessage {
    let mut message = CreateMessage::new().components(action_rows(&instruction.session_id, &instruction.controls));
    if let Some(content) = &instruction.content {
        message = message.content(content);
    }
    if let Some(embed) = &instruction.embed {
        message = message.embed(embed_from_spec(embed));
    }
    message
}

fn edit_from_instruction(instruction: &RenderInstruction) -> EditMessage {
    let mut edit = EditMessage::new().components(action_rows(&instruction.session_id, &instruction.controls));
    if let Some(content) = &instruction.content {
        edit = edit.content(content);
    }
    if let Some(embed) = &instruction.embed {
        edit = edit.embed(embed_from_spec(embed));
    }
    edit
}

fn update_from_instruction(instruction: &RenderInstruction) -> CreateInteractionResponseMessage {
    let mut update = CreateInteractionResponseMessage::new().components(action_rows(&instruction.session_id, &instruction.controls));
    if let Some(content) = &instruction.content {
        update = update.content(content);
    }
    if let Some(embed) = &instruction.embed {
        update = update.embed(embed_from_spec(embed));
    }
    update
}

/// How an interaction gets answered.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponsePlan {
    Modal(ModalSpec),
    Update {
        render: RenderInstruction,
        followup: Option<Notice>,
    },
    Message(Notice),
    Acknowledge,
}

/// Turns the outcome of a dispatch into a response plan.
/// Ended sessions are acknowledged silently; infrastructure faults get a generic private notice.
pub fn plan_response(outcome: BotResult<Transition>) -> ResponsePlan {
    match outcome {
        Ok(transition) => {
            if let Some(modal) = transition.modal {
                return ResponsePlan::Modal(modal);
            }
            match (transition.render, transition.notice) {
                (Some(render), followup) => ResponsePlan::Update { render, followup },
                (None, Some(notice)) => ResponsePlan::Message(notice),
                (None, None) => ResponsePlan::Acknowledge,
            }
        }
        Err(BotError::SessionEnded) => ResponsePlan::Acknowledge,
        Err(e) => {
            if !e.is_user_facing() {
                tracing::error!("Interaction failed: {}", e);
            }
            ResponsePlan::Message(Notice::private(e.user_message()))
        }
    }
}

/// Serenity builders for a plan. `custom_id` is the id the interaction came in on.
pub fn build_response(custom_id: &str, plan: ResponsePlan) -> (CreateInteractionResponse, Option<CreateInteractionResponseFollowup>) {
    match plan {
        ResponsePlan::Modal(modal) => {
            let session_id = parse_component_id(custom_id).map(|(session, _)| session).unwrap_or_default();
            let input = CreateInputText::new(InputTextStyle::Short, &modal.input_label, "input").placeholder(&modal.placeholder).required(true);
            let response = CreateModal::new(component_id(session_id, &modal.token), &modal.title).components(vec![CreateActionRow::InputText(input)]);
            (CreateInteractionResponse::Modal(response), None)
        }
        ResponsePlan::Update { render, followup } => {
            let followup = followup.map(|notice| CreateInteractionResponseFollowup::new().content(notice.content).ephemeral(notice.ephemeral));
            (CreateInteractionResponse::UpdateMessage(update_from_instruction(&render)), followup)
        }
        ResponsePlan::Message(notice) => (
            CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().content(notice.content).ephemeral(notice.ephemeral)),
            None,
        ),
        ResponsePlan::Acknowledge => (CreateInteractionResponse::Acknowledge, None),
    }
}

/// Redraws session messages over HTTP when a timer or deferred step fires.
pub struct DiscordRenderer {
    http: Arc<Http>,
}

impl DiscordRenderer {
    pub fn new(http: Arc<Http>) -> Self {
        DiscordRenderer { http }
    }
}

#[async_trait]
impl Renderer for DiscordRenderer {
    async fn render(&self, target: RenderTarget, instruction: RenderInstruction) -> BotResult<()> {
        ChannelId::new(target.channel_id)
            .edit_message(self.http.as_ref(), MessageId::new(target.message_id), edit_from_instruction(&instruction))
            .await?;
        Ok(())
    }

    async fn announce(&self, target: RenderTarget, notice: Notice) -> BotResult<()> {
        let channel = ChannelId::new(target.channel_id);
        let message = CreateMessage::new().content(notice.content).reference_message((channel, MessageId::new(target.message_id)));
        channel.send_message(self.http.as_ref(), message).await?;
        Ok(())
    }
}

/// Posts request queue results as replies to the invoking message.
pub struct DiscordReplySink {
    http: Arc<Http>,
    sessions: SessionManager,
}

impl DiscordReplySink {
    pub fn new(http: Arc<Http>, sessions: SessionManager) -> Self {
        DiscordReplySink { http, sessions }
    }

    async fn send_paginated(&self, channel: ChannelId, origin: MessageId, content: &str) -> BotResult<()> {
        let (id, opening) = self.sessions.start(Box::new(Paginator::new(content))).await;
        let Some(instruction) = opening.render else {
            return Ok(());
        };
        let message = message_from_instruction(&instruction).reference_message((channel, origin));
        match channel.send_message(self.http.as_ref(), message).await {
            Ok(sent) => {
                let target = RenderTarget { channel_id: channel.get(), message_id: sent.id.get() };
                self.sessions.attach(&id, target).await;
                Ok(())
            }
            Err(e) => {
                self.sessions.stop(&id).await;
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl ReplySink for DiscordReplySink {
    async fn deliver(&self, origin: ReplyTarget, reply: Reply) -> BotResult<()> {
        let channel = ChannelId::new(origin.channel_id);
        let origin_message = MessageId::new(origin.message_id);
        let message = match reply {
            Reply::Paginated(content) => return self.send_paginated(channel, origin_message, &content).await,
            Reply::Text(content) | Reply::Failure(content) => CreateMessage::new().content(content),
            Reply::Image { requester_name, prompt, url } => {
                let embed = CreateEmbed::new()
                    .title(format!("{}'s Request", requester_name))
                    .description(format!("Prompt: **{}**", prompt))
                    .colour(Colour::new(rand::random::<u32>() & 0xffffff))
                    .image(url)
                    .timestamp(Timestamp::now());
                CreateMessage::new().embed(embed)
            }
        };
        channel.send_message(self.http.as_ref(), message.reference_message((channel, origin_message))).await?;
        Ok(())
    }
}
