//! Runnable walkthroughs of the mirror and the social layer.
//!
//! Examples 01–07 run against the in-memory store; example 08 needs redis-stack.

pub mod support;

pub mod ex01_live_mirror;
pub mod ex02_ordering_fallback;
pub mod ex03_likes_and_notifications;
pub mod ex04_follow_graph;
pub mod ex05_comments_and_reactions;
pub mod ex06_media_and_search;
pub mod ex07_direct_messages;
pub mod ex08_redis_backend;
