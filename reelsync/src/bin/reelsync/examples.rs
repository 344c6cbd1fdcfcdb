use crate::commands::{actions, feeds, init, media, index};

#[derive(Clone, Copy)]
pub struct ExampleGroup {
    pub title: &'static str,
    pub commands: &'static [&'static str],
}

#[derive(Clone, Copy)]
pub struct CommandExample {
    pub name: &'static str,
    pub groups: &'static [ExampleGroup],
}

pub fn command_examples() -> &'static [CommandExample] {
    &[
        CommandExample {
            name: "init",
            groups: init::EXAMPLES,
        },
        CommandExample {
            name: "index",
            groups: index::EXAMPLES,
        },
        CommandExample {
            name: "watch",
            groups: feeds::WATCH_EXAMPLES,
        },
        CommandExample {
            name: "search",
            groups: feeds::SEARCH_EXAMPLES,
        },
        CommandExample {
            name: "notifications",
            groups: feeds::NOTIFICATION_EXAMPLES,
        },
        CommandExample {
            name: "like",
            groups: actions::TOGGLE_EXAMPLES,
        },
        CommandExample {
            name: "follow",
            groups: actions::TOGGLE_EXAMPLES,
        },
        CommandExample {
            name: "react",
            groups: actions::REACT_EXAMPLES,
        },
        CommandExample {
            name: "comment",
            groups: actions::COMMENT_EXAMPLES,
        },
        CommandExample {
            name: "upload",
            groups: media::EXAMPLES,
        },
    ]
}
