//! Profile intake wizard.

use blogger_flow_core::BloggerProfile;
use serde_json::json;
use tracing::{info, warn};

use super::{Input, Workflow};
use crate::models::conversation::{ConversationState, ProfileDraft, ProfileStep};
use crate::services::remote::types::IncomingUpdate;
use crate::utils::error::{AppError, AppResult};

const PROMPT_NAME: &str = "1. Your nickname or channel name";
const PROMPT_FOLLOWERS: &str = "2. How many followers do you have?";
const PROMPT_PLATFORMS: &str = "3. Which platforms do you advertise on? (comma separated)";
const PROMPT_THEME: &str = "4. What is your blog about?";
const PROMPT_REACH: &str = "5. Send a screenshot of your reach for the last 7-14 days";

impl Workflow {
    pub(crate) async fn start_profile(&self, update: &IncomingUpdate) -> AppResult<()> {
        if self.db.has_profile(update.user_id)? {
            return self
                .reply_with_menu(update, "Your profile is already filled ✅")
                .await;
        }
        self.db
            .set_conversation(update.chat_id, &ConversationState::profile_start())?;
        self.send(update.chat_id, PROMPT_NAME).await?;
        Ok(())
    }

    pub(crate) async fn profile_step(
        &self,
        update: &IncomingUpdate,
        step: ProfileStep,
        mut draft: ProfileDraft,
        input: Input<'_>,
    ) -> AppResult<()> {
        if step == ProfileStep::ReachScreenshot {
            return match input {
                Input::Photo(file_id) => self.finish_profile(update, draft, file_id).await,
                _ => {
                    self.send(update.chat_id, "This is not a photo. Please send a screenshot.")
                        .await?;
                    Ok(())
                }
            };
        }

        let answer = match input {
            Input::Text(text) if !text.trim().is_empty() => text.trim().to_string(),
            _ => {
                self.send(update.chat_id, "Please answer with text.").await?;
                return Ok(());
            }
        };

        let (next, prompt) = match step {
            ProfileStep::Name => {
                draft.display_name = Some(answer);
                (ProfileStep::Followers, PROMPT_FOLLOWERS)
            }
            ProfileStep::Followers => {
                draft.followers = Some(answer);
                (ProfileStep::Platforms, PROMPT_PLATFORMS)
            }
            ProfileStep::Platforms => {
                draft.platforms = BloggerProfile::parse_platforms(&answer);
                (ProfileStep::Theme, PROMPT_THEME)
            }
            ProfileStep::Theme | ProfileStep::ReachScreenshot => {
                draft.theme = Some(answer);
                (ProfileStep::ReachScreenshot, PROMPT_REACH)
            }
        };

        self.db.set_conversation(
            update.chat_id,
            &ConversationState::Profile { step: next, draft },
        )?;
        self.send(update.chat_id, prompt).await?;
        Ok(())
    }

    async fn finish_profile(
        &self,
        update: &IncomingUpdate,
        draft: ProfileDraft,
        file_id: &str,
    ) -> AppResult<()> {
        let now = Self::now(update);
        match self
            .media
            .store(
                self.adapter.as_ref(),
                &self.db,
                update.user_id,
                file_id,
                "reach.jpg",
                now,
            )
            .await
        {
            Ok(stored) if stored.duplicate => {
                self.notify_admin(format!(
                    "⚠️ Duplicate media (reach) from {}",
                    update.user_id
                ))
                .await;
            }
            Ok(_) => {}
            Err(e) => warn!(user_id = update.user_id, error = %e, "Could not store reach screenshot"),
        }

        let profile = BloggerProfile {
            user_id: update.user_id,
            display_name: draft.display_name.unwrap_or_default(),
            followers: draft.followers.unwrap_or_default(),
            platforms: draft.platforms,
            theme: draft.theme.unwrap_or_default(),
            reach_file_id: file_id.to_string(),
            referral_source: self.db.referral_of(update.user_id)?,
            tg_username: update.username.clone(),
            consent_at: now,
        };

        self.db.clear_conversation(update.chat_id)?;
        match self.db.save_profile(&profile) {
            Ok(()) => {}
            Err(AppError::Validation(_)) => {
                return self
                    .reply_with_menu(update, "Your profile is already filled ✅")
                    .await;
            }
            Err(e) => return Err(e),
        }

        info!(user_id = update.user_id, "Profile filled");
        self.audit(
            "form_filled",
            update.user_id,
            json!({ "display_name": profile.display_name, "platforms": profile.platforms }),
        );
        self.reply_with_menu(update, "Thank you! Profile accepted ✅ Now get the task.")
            .await
    }
}
