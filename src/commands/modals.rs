//! Form commands: buttons that open feedback, bug report and suggestion modals

use serenity::all::{
    ActionRow, ActionRowComponent, ButtonStyle, Colour, ComponentInteraction, Context,
    CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, CreateInputText,
    CreateInteractionResponse, CreateInteractionResponseMessage, CreateMessage, CreateModal,
    InputTextStyle, Message, ModalInteraction, Timestamp,
};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{error, info, warn};

use super::general::find_text_channel;
use super::interactive::Widgets;
use super::{ephemeral, CommandResult, GREEN};
use crate::bot::BotState;
use crate::database::{MAX_RATING, MIN_RATING};

pub const FEEDBACK_BUTTON_ID: &str = "open_feedback";
pub const BUG_REPORT_BUTTON_ID: &str = "open_bug_report";
pub const SUGGESTION_BUTTON_ID: &str = "open_suggestion";

pub const FEEDBACK_MODAL_ID: &str = "feedback_modal";
pub const BUG_REPORT_MODAL_ID: &str = "bug_report_modal";
pub const SUGGESTION_MODAL_ID: &str = "suggestion_modal";

const BUTTON_TIMEOUT: Duration = Duration::from_secs(60);

/// The three forms and their launch buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Form {
    Feedback,
    BugReport,
    Suggestion,
}

impl Form {
    pub fn from_button(custom_id: &str) -> Option<Self> {
        match custom_id {
            FEEDBACK_BUTTON_ID => Some(Form::Feedback),
            BUG_REPORT_BUTTON_ID => Some(Form::BugReport),
            SUGGESTION_BUTTON_ID => Some(Form::Suggestion),
            _ => None,
        }
    }

    fn prompt(self) -> &'static str {
        match self {
            Form::Feedback => "Please fill out our feedback form:",
            Form::BugReport => "Please fill out the bug report form:",
            Form::Suggestion => "Please submit your suggestion:",
        }
    }

    fn button(self) -> CreateButton {
        let (id, label, style) = match self {
            Form::Feedback => (FEEDBACK_BUTTON_ID, "Open Feedback Form", ButtonStyle::Primary),
            Form::BugReport => (BUG_REPORT_BUTTON_ID, "Report Bug", ButtonStyle::Danger),
            Form::Suggestion => (SUGGESTION_BUTTON_ID, "Make Suggestion", ButtonStyle::Success),
        };
        CreateButton::new(id).label(label).style(style)
    }

    pub fn modal(self) -> CreateModal {
        let (id, title, inputs) = match self {
            Form::Feedback => (
                FEEDBACK_MODAL_ID,
                "Feedback Form",
                vec![
                    input(InputTextStyle::Short, "Rating (1-10)", "rating", "Enter a number between 1 and 10")
                        .min_length(1)
                        .max_length(2),
                    input(InputTextStyle::Paragraph, "Your Feedback", "feedback", "Tell us what you think..."),
                ],
            ),
            Form::BugReport => (
                BUG_REPORT_MODAL_ID,
                "Bug Report",
                vec![
                    input(InputTextStyle::Short, "Bug Title", "bug_title", "Brief description of the bug"),
                    input(
                        InputTextStyle::Paragraph,
                        "Steps to Reproduce",
                        "steps",
                        "1. Step one\n2. Step two\n3. Step three",
                    ),
                    input(InputTextStyle::Short, "Expected Behavior", "expected", "What should happen?"),
                    input(InputTextStyle::Short, "Actual Behavior", "actual", "What actually happened?"),
                ],
            ),
            Form::Suggestion => (
                SUGGESTION_MODAL_ID,
                "Suggestion Form",
                vec![
                    input(InputTextStyle::Short, "Suggestion Title", "suggestion_title", "Brief title for your suggestion"),
                    input(
                        InputTextStyle::Paragraph,
                        "Description",
                        "description",
                        "Describe your suggestion in detail...",
                    ),
                    input(InputTextStyle::Paragraph, "Benefits", "benefit", "How will this improve things?"),
                ],
            ),
        };
        CreateModal::new(id, title).components(inputs.into_iter().map(CreateActionRow::InputText).collect())
    }
}

fn input(style: InputTextStyle, label: &str, custom_id: &str, placeholder: &str) -> CreateInputText {
    CreateInputText::new(style, label, custom_id)
        .placeholder(placeholder)
        .required(true)
}

/// Submitted modal values by input id
pub fn modal_values(rows: &[ActionRow]) -> HashMap<String, String> {
    rows.iter()
        .flat_map(|row| row.components.iter())
        .filter_map(|component| match component {
            ActionRowComponent::InputText(text) => {
                Some((text.custom_id.clone(), text.value.clone().unwrap_or_default()))
            }
            _ => None,
        })
        .collect()
}

/// Rating typed into the feedback form, if it is an integer from 1 to 10
pub fn parse_rating(value: &str) -> Option<i64> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .filter(|r| (MIN_RATING..=MAX_RATING).contains(r))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BugReport {
    pub title: String,
    pub steps: String,
    pub expected: String,
    pub actual: String,
}

pub fn bug_report_embed(report: &BugReport, reporter: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("🐛 Bug Report: {}", report.title))
        .colour(Colour::RED)
        .timestamp(Timestamp::now())
        .field("Steps to Reproduce", &report.steps, false)
        .field("Expected Behavior", &report.expected, false)
        .field("Actual Behavior", &report.actual, false)
        .footer(CreateEmbedFooter::new(format!("Reported by {}", reporter)))
}

pub fn suggestion_form_embed(title: &str, description: &str, benefits: &str, author: &str) -> CreateEmbed {
    CreateEmbed::new()
        .title(format!("💡 Suggestion: {}", title))
        .colour(GREEN)
        .timestamp(Timestamp::now())
        .field("Description", description, false)
        .field("Benefits", benefits, false)
        .footer(CreateEmbedFooter::new(format!("Suggested by {}", author)))
}

/// Handle !feedback, !bug_report and !suggestion
pub async fn open_form(ctx: &Context, msg: &Message, widgets: &Widgets, form: Form) -> CommandResult {
    let sent = msg
        .channel_id
        .send_message(
            &ctx.http,
            CreateMessage::new()
                .content(form.prompt())
                .components(vec![CreateActionRow::Buttons(vec![form.button()])]),
        )
        .await?;
    widgets.forms.insert(sent.id, (), BUTTON_TIMEOUT);
    Ok(())
}

/// Click on one of the form buttons
pub async fn form_button(ctx: &Context, interaction: &ComponentInteraction, widgets: &Widgets, form: Form) -> CommandResult {
    let response = match widgets.forms.with(interaction.message.id, |_| ()) {
        Some(()) => CreateInteractionResponse::Modal(form.modal()),
        None => ephemeral("This interaction has expired."),
    };
    interaction.create_response(&ctx.http, response).await?;
    Ok(())
}

/// Submission of one of the three modals
pub async fn submit(ctx: &Context, state: &BotState, interaction: &ModalInteraction) -> CommandResult {
    let values = modal_values(&interaction.data.components);
    let value = |key: &str| values.get(key).cloned().unwrap_or_default();
    let user = interaction.user.tag();

    match interaction.data.custom_id.as_str() {
        FEEDBACK_MODAL_ID => {
            let reply = match parse_rating(&value("rating")) {
                None => "Please enter a valid rating between 1 and 10!".to_string(),
                Some(rating) => match state.db.save_feedback(&user, rating, &value("feedback")) {
                    Ok(id) => {
                        info!("Feedback {} saved from {}", id, user);
                        format!("Thank you for your feedback! Rating: {}/10", rating)
                    }
                    Err(e) => {
                        error!("Failed to save feedback from {}: {}", user, e);
                        "There was an error saving your feedback. Please try again.".to_string()
                    }
                },
            };
            interaction.create_response(&ctx.http, ephemeral(reply)).await?;
        }
        BUG_REPORT_MODAL_ID => {
            let report = BugReport {
                title: value("bug_title"),
                steps: value("steps"),
                expected: value("expected"),
                actual: value("actual"),
            };
            let embed = bug_report_embed(&report, &user);
            let channel = interaction
                .guild_id
                .and_then(|g| find_text_channel(ctx, g, &state.config.bug_report_channel));

            let response = match channel {
                Some(channel_id) => {
                    channel_id
                        .send_message(&ctx.http, CreateMessage::new().embed(embed))
                        .await?;
                    ephemeral("Bug report submitted successfully!")
                }
                None => CreateInteractionResponse::Message(
                    CreateInteractionResponseMessage::new().embed(embed),
                ),
            };
            interaction.create_response(&ctx.http, response).await?;
        }
        SUGGESTION_MODAL_ID => {
            let embed = suggestion_form_embed(
                &value("suggestion_title"),
                &value("description"),
                &value("benefit"),
                &user,
            );
            interaction
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(CreateInteractionResponseMessage::new().embed(embed)),
                )
                .await?;

            let message = interaction.get_response(&ctx.http).await?;
            message.react(&ctx.http, '👍').await?;
            message.react(&ctx.http, '👎').await?;
        }
        other => warn!("Unknown modal submitted: {}", other),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{embed_json, field, fields};

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("7"), Some(7));
        assert_eq!(parse_rating(" 10 "), Some(10));
        assert_eq!(parse_rating("0"), None);
        assert_eq!(parse_rating("11"), None);
        assert_eq!(parse_rating("great"), None);
    }

    #[test]
    fn test_form_buttons() {
        assert_eq!(Form::from_button("open_feedback"), Some(Form::Feedback));
        assert_eq!(Form::from_button("open_suggestion"), Some(Form::Suggestion));
        assert_eq!(Form::from_button("upvote"), None);
    }

    #[test]
    fn test_feedback_modal_layout() {
        let modal = serde_json::to_value(Form::Feedback.modal()).unwrap();
        assert_eq!(modal["custom_id"], FEEDBACK_MODAL_ID);
        assert_eq!(modal["title"], "Feedback Form");
        let rows = modal["components"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["components"][0]["custom_id"], "rating");
        assert_eq!(rows[0]["components"][0]["max_length"], 2);

        let modal = serde_json::to_value(Form::BugReport.modal()).unwrap();
        assert_eq!(modal["components"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn test_bug_report_embed() {
        let report = BugReport {
            title: "Crash".to_string(),
            steps: "1. Run".to_string(),
            expected: "Works".to_string(),
            actual: "Crashes".to_string(),
        };
        let embed = bug_report_embed(&report, "alice");
        let json = embed_json(&embed);
        assert_eq!(json["title"], "🐛 Bug Report: Crash");
        assert_eq!(json["color"], Colour::RED.0);
        assert_eq!(json["footer"]["text"], "Reported by alice");

        let fields = fields(&embed);
        assert_eq!(field(&fields, "Steps to Reproduce"), Some("1. Run"));
        assert_eq!(field(&fields, "Actual Behavior"), Some("Crashes"));
    }

    #[test]
    fn test_suggestion_form_embed() {
        let embed = suggestion_form_embed("Music", "Add a music channel", "More fun", "bob");
        let json = embed_json(&embed);
        assert_eq!(json["title"], "💡 Suggestion: Music");
        assert_eq!(json["color"], GREEN);
        assert_eq!(field(&fields(&embed), "Benefits"), Some("More fun"));
    }
}
