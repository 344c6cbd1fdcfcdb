use chrono::Utc;
use email_address::EmailAddress;
use serde_json::json;
use url::Url;

use super::{Applied, MutationResult, SocialLayer};
use crate::{
    blob::BlobStorage,
    errors::{MutationError, ValidationError, ValidationIssue},
    mirror::TIMESTAMP_FIELD,
    models::client_timestamp,
    store::{DocumentFields, DocumentStore, FieldMutation},
    types::Collection,
};

const AVATAR_SERVICE: &str = "https://ui-avatars.com/api/";

#[derive(Debug, Clone)]
pub struct NewProfile {
    pub email: String,
    pub username: String,
}

/// Editable profile fields.
#[derive(Debug, Clone, Default)]
pub struct ProfileEdit {
    pub username: Option<String>,
    pub avatar: Option<String>,
    pub bio: Option<String>,
}

/// Generated initials avatar for `username`.
pub fn default_avatar_url(username: &str) -> String {
    match Url::parse_with_params(
        AVATAR_SERVICE,
        &[("name", username), ("background", "ff0051"), ("color", "fff")],
    ) {
        Ok(url) => url.to_string(),
        Err(_) => AVATAR_SERVICE.to_string(),
    }
}

fn validate_new_profile(profile: &NewProfile) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    if !EmailAddress::is_valid(&profile.email) {
        issues.push(ValidationIssue::new("email", "invalid_email", "email address is not valid"));
    }
    if profile.username.trim().is_empty() {
        issues.push(ValidationIssue::new("username", "required", "username is required"));
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(issues))
    }
}

fn validate_edit(edit: &ProfileEdit) -> Result<(), ValidationError> {
    let mut issues = Vec::new();
    if edit.username.as_deref().is_some_and(|name| name.trim().is_empty()) {
        issues.push(ValidationIssue::new("username", "required", "username cannot be blank"));
    }
    if let Some(avatar) = edit.avatar.as_deref()
        && Url::parse(avatar).is_err()
    {
        issues.push(ValidationIssue::new("avatar", "invalid_url", "avatar must be a URL"));
    }
    if issues.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::new(issues))
    }
}

impl<S: DocumentStore, B: BlobStorage> SocialLayer<S, B> {
    /// Create the profile document for an authenticated account id.
    pub async fn create_profile(&self, user_id: &str, profile: NewProfile) -> MutationResult {
        validate_new_profile(&profile)?;
        let username = profile.username.trim();
        let fields = DocumentFields::new()
            .set("email", profile.email.as_str())
            .set("username", username)
            .set("avatar", default_avatar_url(username))
            .set("bio", "")
            .set("followers", json!([]))
            .set("following", json!([]))
            .set("favorites", json!([]))
            .set("blocked", json!([]))
            .server_timestamp(TIMESTAMP_FIELD)
            .set("createdAt", client_timestamp(Utc::now()));
        self.store().set_document(Collection::Users, user_id, fields).await?;
        Ok(Applied::created(user_id))
    }

    /// Update display fields. Membership sets are only reachable through the toggles.
    pub async fn update_profile(&self, user_id: &str, edit: ProfileEdit) -> MutationResult {
        validate_edit(&edit)?;
        let mut mutations = Vec::new();
        if let Some(username) = edit.username {
            mutations.push(FieldMutation::set("username", username.trim()));
        }
        if let Some(avatar) = edit.avatar {
            mutations.push(FieldMutation::set("avatar", avatar));
        }
        if let Some(bio) = edit.bio {
            mutations.push(FieldMutation::set("bio", bio));
        }
        if mutations.is_empty() {
            return Err(MutationError::invalid("profile edit changes nothing"));
        }
        self.store().update_document(Collection::Users, user_id, mutations).await?;
        Ok(Applied::done())
    }
}
