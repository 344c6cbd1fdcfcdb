//! Integration tests that run all walkthrough examples.
//!
//! Each example asserts its own behavior; these tests only require it to finish cleanly.

use serial_test::serial;

#[tokio::test]
async fn ex01_live_mirror() {
    reelsync::examples::ex01_live_mirror::run()
        .await
        .expect("example should succeed");
}

#[tokio::test]
async fn ex02_ordering_fallback() {
    reelsync::examples::ex02_ordering_fallback::run()
        .await
        .expect("example should succeed");
}

#[tokio::test]
async fn ex03_likes_and_notifications() {
    reelsync::examples::ex03_likes_and_notifications::run()
        .await
        .expect("example should succeed");
}

#[tokio::test]
async fn ex04_follow_graph() {
    reelsync::examples::ex04_follow_graph::run()
        .await
        .expect("example should succeed");
}

#[tokio::test]
async fn ex05_comments_and_reactions() {
    reelsync::examples::ex05_comments_and_reactions::run()
        .await
        .expect("example should succeed");
}

#[tokio::test]
async fn ex06_media_and_search() {
    reelsync::examples::ex06_media_and_search::run()
        .await
        .expect("example should succeed");
}

#[tokio::test]
async fn ex07_direct_messages() {
    reelsync::examples::ex07_direct_messages::run()
        .await
        .expect("example should succeed");
}

#[tokio::test]
#[serial]
#[ignore = "requires redis-stack at REDIS_URL"]
async fn ex08_redis_backend() {
    reelsync::examples::ex08_redis_backend::run()
        .await
        .expect("example should succeed");
}
