use anyhow::{Context, Result};
use clap::Args;
use reelsync::store::DocumentStore;

use super::MutationReport;
use crate::examples::ExampleGroup;
use crate::output::OutputManager;
use crate::session::Session;

pub const TOGGLE_EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Toggles",
        commands: &[
            "reelsync like V8pQ2 --as ann       # Like, or unlike if already liked",
            "reelsync repost V8pQ2 --as ann",
            "reelsync favorite V8pQ2 --as ann",
        ],
    },
    ExampleGroup {
        title: "Social Graph",
        commands: &[
            "reelsync follow bob --as ann       # ann follows (or unfollows) bob",
            "reelsync block bob --as ann",
        ],
    },
];

pub const REACT_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Reactions",
    commands: &[
        "reelsync react Cm3xR fire --as ann # like | heart | fire | smile",
    ],
}];

pub const COMMENT_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Comments",
    commands: &["reelsync comment V8pQ2 \"great shot\" --as bob"],
}];

#[derive(Args)]
pub struct ToggleArgs {
    /// Video id (like, repost, favorite) or user id (follow, block)
    pub target: String,

    /// Acting user id
    #[arg(long = "as", value_name = "USER")]
    pub actor: String,
}

#[derive(Args)]
pub struct ReactArgs {
    /// Comment id
    pub comment: String,

    /// Reaction kind: like, heart, fire or smile
    pub reaction: String,

    /// Acting user id
    #[arg(long = "as", value_name = "USER")]
    pub actor: String,
}

#[derive(Args)]
pub struct CommentArgs {
    /// Video id
    pub video: String,

    /// Comment text
    pub text: String,

    /// Commenting user id
    #[arg(long = "as", value_name = "USER")]
    pub actor: String,
}

#[derive(Args)]
pub struct ViewArgs {
    /// Video id
    pub video: String,
}

#[derive(Debug, Clone, Copy)]
pub enum ToggleAction {
    Like,
    Repost,
    Favorite,
    Follow,
    Block,
}

impl ToggleAction {
    fn name(self) -> &'static str {
        match self {
            ToggleAction::Like => "like",
            ToggleAction::Repost => "repost",
            ToggleAction::Favorite => "favorite",
            ToggleAction::Follow => "follow",
            ToggleAction::Block => "block",
        }
    }
}

pub async fn handle_toggle<S: DocumentStore>(
    action: ToggleAction,
    args: ToggleArgs,
    session: &Session<S>,
    output: &OutputManager,
) -> Result<()> {
    let social = &session.social;
    let (target, actor) = (args.target.as_str(), args.actor.as_str());
    let result = match action {
        ToggleAction::Like => social.toggle_like(target, actor).await,
        ToggleAction::Repost => social.toggle_repost(target, actor).await,
        ToggleAction::Favorite => social.toggle_favorite(target, actor).await,
        ToggleAction::Follow => social.toggle_follow(target, actor).await,
        ToggleAction::Block => social.toggle_block(actor, target).await,
    };
    let applied = result.with_context(|| format!("{} {target} as {actor} failed", action.name()))?;

    let report = MutationReport::new(action.name(), target, Some(actor), applied);
    let verb = if report.outcome == "removed" {
        format!("un{}", action.name())
    } else {
        action.name().to_string()
    };
    report.emit(output, &format!("{actor}: {verb} {target}"))
}

pub async fn handle_react<S: DocumentStore>(args: ReactArgs, session: &Session<S>, output: &OutputManager) -> Result<()> {
    let applied = session
        .social
        .toggle_comment_reaction(&args.comment, &args.actor, &args.reaction)
        .await
        .with_context(|| format!("react {} on {} failed", args.reaction, args.comment))?;
    let report = MutationReport::new("react", &args.comment, Some(&args.actor), applied);
    report.emit(
        output,
        &format!("{}: {} {} on {}", args.actor, report.outcome, args.reaction, args.comment),
    )
}

pub async fn handle_comment<S: DocumentStore>(
    args: CommentArgs,
    session: &Session<S>,
    output: &OutputManager,
) -> Result<()> {
    let applied = session
        .social
        .add_comment(&args.video, &args.actor, &args.text)
        .await
        .with_context(|| format!("comment on {} failed", args.video))?;
    let report = MutationReport::new("comment", &args.video, Some(&args.actor), applied);
    report.emit(output, &format!("{} commented on {}", args.actor, args.video))
}

pub async fn handle_view<S: DocumentStore>(args: ViewArgs, session: &Session<S>, output: &OutputManager) -> Result<()> {
    let applied = session
        .social
        .increment_views(&args.video)
        .await
        .with_context(|| format!("view of {} not recorded", args.video))?;
    let report = MutationReport::new("view", &args.video, None, applied);
    report.emit(output, &format!("view recorded for {}", args.video))
}
