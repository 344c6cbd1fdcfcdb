use anyhow::{Context, Result, anyhow};
use clap::{Args, ValueEnum};
use comfy_table::{Cell, Table};
use serde::Serialize;

use reelsync::{
    Collection, CollectionQuery, Document, Snapshot,
    models::{Notification, User, Video},
    social::{VideoStats, truncate_preview},
    store::DocumentStore,
};

use crate::examples::ExampleGroup;
use crate::output::{GlobalOptions, OutputManager, TableDisplay, TableRow, themed_table};
use crate::session::Session;
use crate::theme::ICONS;

const FIELDS_PREVIEW_CHARS: usize = 60;

pub const WATCH_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Live Feeds",
    commands: &[
        "reelsync watch videos              # Print every new snapshot until Ctrl-C",
        "reelsync watch comments --updates 5",
        "reelsync --output json watch notifications --limit 100",
    ],
}];

pub const SEARCH_EXAMPLES: &[ExampleGroup] = &[
    ExampleGroup {
        title: "Search",
        commands: &[
            "reelsync search videos beach       # Caption or hashtag match",
            "reelsync search users ann          # Username or email match",
            "reelsync search videos             # Blank query lists everything",
        ],
    },
    ExampleGroup {
        title: "Statistics",
        commands: &["reelsync stats V8pQ2"],
    },
];

pub const NOTIFICATION_EXAMPLES: &[ExampleGroup] = &[ExampleGroup {
    title: "Notifications",
    commands: &[
        "reelsync notifications ann",
        "reelsync notifications ann --unread --mark-read",
    ],
}];

#[derive(Args)]
pub struct WatchArgs {
    /// Collection to watch
    pub collection: String,

    /// Stop after this many snapshot updates
    #[arg(long)]
    pub updates: Option<usize>,

    /// Rows shown per snapshot
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum SearchKind {
    Videos,
    Users,
}

#[derive(Args)]
pub struct SearchArgs {
    #[arg(value_enum)]
    pub kind: SearchKind,

    /// Case-insensitive substring; blank returns everything
    #[arg(default_value = "")]
    pub query: String,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Video id
    pub video: String,
}

#[derive(Args)]
pub struct NotificationsArgs {
    /// Recipient user id
    pub user: String,

    /// Only unread notifications
    #[arg(long)]
    pub unread: bool,

    /// Mark the listed notifications as read
    #[arg(long)]
    pub mark_read: bool,
}

#[derive(Debug, Serialize)]
pub struct DocumentRow {
    id: String,
    fields: serde_json::Value,
}

impl From<&Document> for DocumentRow {
    fn from(doc: &Document) -> Self {
        Self {
            id: doc.id.clone(),
            fields: serde_json::Value::Object(doc.fields.clone()),
        }
    }
}

impl TableRow for DocumentRow {
    const HEADERS: &'static [&'static str] = &["ID", "Fields"];

    fn cells(&self) -> Vec<String> {
        vec![self.id.clone(), truncate_preview(&self.fields.to_string(), FIELDS_PREVIEW_CHARS)]
    }
}

#[derive(Debug, Serialize)]
pub struct VideoRow {
    id: String,
    owner: String,
    caption: String,
    hashtags: Vec<String>,
    #[serde(flatten)]
    stats: VideoStats,
}

impl TableRow for VideoRow {
    const HEADERS: &'static [&'static str] =
        &["ID", "Owner", "Caption", "Hashtags", "Views", "Likes", "Comments", "Reposts", "Engagement"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.owner.clone(),
            self.caption.clone(),
            self.hashtags.iter().map(|tag| format!("#{tag}")).collect::<Vec<_>>().join(" "),
            self.stats.views.to_string(),
            self.stats.likes.to_string(),
            self.stats.comments.to_string(),
            self.stats.reposts.to_string(),
            format!("{:.1}%", self.stats.engagement),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct UserRow {
    id: String,
    username: String,
    email: String,
    followers: usize,
    following: usize,
}

impl From<User> for UserRow {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email.unwrap_or_default(),
            followers: user.followers.len(),
            following: user.following.len(),
        }
    }
}

impl TableRow for UserRow {
    const HEADERS: &'static [&'static str] = &["ID", "Username", "Email", "Followers", "Following"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.clone(),
            self.username.clone(),
            self.email.clone(),
            self.followers.to_string(),
            self.following.to_string(),
        ]
    }
}

impl TableRow for Notification {
    const HEADERS: &'static [&'static str] = &["", "ID", "Type", "From", "Message"];

    fn cells(&self) -> Vec<String> {
        vec![
            if self.read { String::new() } else { ICONS.unread.to_string() },
            self.id.clone(),
            self.kind.as_str().to_string(),
            self.from_user_id.clone(),
            self.message.clone(),
        ]
    }
}

#[derive(Debug, Serialize)]
pub struct StatsReport {
    video_id: String,
    #[serde(flatten)]
    stats: VideoStats,
}

impl TableDisplay for StatsReport {
    fn to_table(&self, options: &GlobalOptions) -> Table {
        let mut table = themed_table(options, &["Metric", "Value"]);
        table.add_row(vec![Cell::new("views"), Cell::new(self.stats.views)]);
        table.add_row(vec![Cell::new("likes"), Cell::new(self.stats.likes)]);
        table.add_row(vec![Cell::new("comments"), Cell::new(self.stats.comments)]);
        table.add_row(vec![Cell::new("reposts"), Cell::new(self.stats.reposts)]);
        table.add_row(vec![
            Cell::new("engagement"),
            Cell::new(format!("{:.1}%", self.stats.engagement)),
        ]);
        table
    }

    fn to_compact(&self) -> String {
        format!(
            "{} views={} likes={} comments={} reposts={} engagement={:.1}",
            self.video_id,
            self.stats.views,
            self.stats.likes,
            self.stats.comments,
            self.stats.reposts,
            self.stats.engagement
        )
    }
}

fn video_rows<S: DocumentStore>(session: &Session<S>, documents: &[Document]) -> Vec<VideoRow> {
    documents
        .iter()
        .filter_map(|doc| doc.decode::<Video>().ok())
        .filter_map(|video| {
            let stats = session.social.video_stats(&video.id)?;
            Some(VideoRow {
                owner: if video.username.is_empty() { video.user_id } else { video.username },
                id: video.id,
                caption: video.caption,
                hashtags: video.hashtags,
                stats,
            })
        })
        .collect()
}

fn show_snapshot(output: &OutputManager, collection: Collection, snapshot: &Snapshot, limit: usize) -> Result<()> {
    output.heading(&format!(
        "{collection} · revision {} · {} documents",
        snapshot.revision(),
        snapshot.len()
    ));
    let rows: Vec<DocumentRow> = snapshot.documents().iter().take(limit).map(DocumentRow::from).collect();
    output.display(&rows)
}

/// Print the collection's snapshot each time the mirror replaces it.
pub async fn handle_watch<S: DocumentStore>(args: WatchArgs, session: &Session<S>, output: &OutputManager) -> Result<()> {
    let collection: Collection = args.collection.parse().map_err(|err: String| anyhow!(err))?;
    let mut subscription = match session.mirror.feed(collection) {
        Some(feed) => feed,
        None => session.mirror.subscribe(CollectionQuery::all(collection)),
    };

    let snapshot = subscription.wait_until_loaded().await;
    show_snapshot(output, collection, &snapshot, args.limit)?;
    output.verbose("Waiting for changes (Ctrl-C to stop)");

    let mut seen = 0;
    while args.updates.is_none_or(|limit| seen < limit) {
        let next = tokio::select! {
            interrupted = tokio::signal::ctrl_c() => {
                interrupted.context("Failed to listen for Ctrl-C")?;
                break;
            }
            next = subscription.changed() => next,
        };
        let Some(snapshot) = next else {
            output.warning("Subscription ended; the last snapshot above is still current");
            break;
        };
        show_snapshot(output, collection, &snapshot, args.limit)?;
        seen += 1;
    }
    Ok(())
}

pub async fn handle_search<S: DocumentStore>(args: SearchArgs, session: &Session<S>, output: &OutputManager) -> Result<()> {
    match args.kind {
        SearchKind::Videos => {
            let found = session.social.search_videos(&args.query);
            output.heading(&format!("Videos matching '{}'", args.query));
            output.display(&video_rows(session, &found))
        }
        SearchKind::Users => {
            let rows: Vec<UserRow> = session
                .social
                .search_users(&args.query)
                .iter()
                .filter_map(|doc| doc.decode::<User>().ok())
                .map(UserRow::from)
                .collect();
            output.heading(&format!("Users matching '{}'", args.query));
            output.display(&rows)
        }
    }
}

pub async fn handle_stats<S: DocumentStore>(args: StatsArgs, session: &Session<S>, output: &OutputManager) -> Result<()> {
    let stats = session
        .social
        .video_stats(&args.video)
        .with_context(|| format!("video {} is not in the mirror", args.video))?;
    output.heading(&format!("Video {}", args.video));
    output.display(&StatsReport {
        video_id: args.video,
        stats,
    })
}

pub async fn handle_notifications<S: DocumentStore>(
    args: NotificationsArgs,
    session: &Session<S>,
    output: &OutputManager,
) -> Result<()> {
    let notifications: Vec<Notification> = session
        .social
        .notifications_for(&args.user)
        .into_iter()
        .filter(|notification| !args.unread || !notification.read)
        .collect();
    output.heading(&format!("Notifications for {}", args.user));
    output.display(&notifications)?;

    if args.mark_read {
        let mut marked = 0;
        for notification in notifications.iter().filter(|notification| !notification.read) {
            session
                .social
                .mark_notification_read(&notification.id)
                .await
                .with_context(|| format!("Failed to mark {} read", notification.id))?;
            marked += 1;
        }
        output.success(&format!("Marked {marked} notifications read"));
    }
    Ok(())
}
