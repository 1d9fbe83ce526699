#![cfg(feature = "inmem-store")]

use chrono::{Duration, TimeZone, Utc};
use forum::{
    models::{NewForum, NewPost, NewThread, ThreadRef, User, Vote},
    pagination::Page,
    repo::{inmem::InMemRepo, RepoError},
};
// Bring trait method namespaces into scope so calls on InMemRepo resolve.
use forum::repo::{ForumRepo, PostRepo, ServiceRepo, ThreadRepo, UserRepo, VoteRepo};

fn user(nickname: &str) -> User {
    User {
        nickname: nickname.into(),
        fullname: format!("{nickname} fullname"),
        email: format!("{nickname}@example.org"),
        about: String::new(),
    }
}

fn thread(author: &str, slug: Option<&str>, minutes: i64) -> NewThread {
    NewThread {
        title: "title".into(),
        author: author.into(),
        message: "message".into(),
        slug: slug.map(Into::into),
        created: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::minutes(minutes)),
    }
}

/// Fresh repository holding users `alice`, `bob`, `carol` and forum `rust` owned by alice.
async fn seeded() -> InMemRepo {
    let r = InMemRepo::new();
    for nick in ["alice", "bob", "carol"] {
        r.create_user(user(nick)).await.unwrap();
    }
    r.create_forum(NewForum { title: "Rust".into(), user: "alice".into(), slug: "rust".into() })
        .await
        .unwrap();
    r
}

#[tokio::test]
async fn user_conflicts_on_nickname_or_email() {
    let r = InMemRepo::new();
    r.create_user(user("alice")).await.unwrap();
    r.create_user(user("bob")).await.unwrap();

    let err = r.create_user(user("alice")).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict));

    let mut clash = user("zed");
    clash.email = "bob@example.org".into();
    assert!(matches!(r.create_user(clash).await, Err(RepoError::Conflict)));

    let both = r.list_users_by_nickname_or_email("alice", "bob@example.org").await.unwrap();
    let nicks: Vec<_> = both.iter().map(|u| u.nickname.as_str()).collect();
    assert_eq!(nicks, ["alice", "bob"]);
}

#[tokio::test]
async fn update_user_rejects_foreign_email() {
    let r = seeded().await;
    let mut alice = r.get_user("alice").await.unwrap();
    alice.email = "bob@example.org".into();
    assert!(matches!(r.update_user(alice.clone()).await, Err(RepoError::Conflict)));

    alice.email = "alice@new.example.org".into();
    alice.about = "hi".into();
    let updated = r.update_user(alice).await.unwrap();
    assert_eq!(r.get_user_by_email("alice@new.example.org").await.unwrap(), updated);
    assert!(matches!(r.get_user("nobody").await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn missing_users_keeps_input_order_without_duplicates() {
    let r = seeded().await;
    let names: Vec<String> = ["zed", "alice", "amy", "zed", "bob"].iter().map(|s| s.to_string()).collect();
    assert_eq!(r.missing_users(&names).await.unwrap(), vec!["zed".to_string(), "amy".to_string()]);
}

#[tokio::test]
async fn forum_slug_conflict_and_unknown_owner() {
    let r = seeded().await;
    let dup = NewForum { title: "Again".into(), user: "bob".into(), slug: "rust".into() };
    assert!(matches!(r.create_forum(dup).await, Err(RepoError::Conflict)));
    let orphan = NewForum { title: "Go".into(), user: "nobody".into(), slug: "go".into() };
    assert!(matches!(r.create_forum(orphan).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn threads_bump_counters_and_resolve_by_slug() {
    let r = seeded().await;
    let t = r.create_thread("rust", thread("bob", Some("borrowck"), 0)).await.unwrap();
    assert_eq!(t.forum, "rust");
    assert_eq!(t.votes, 0);
    assert_eq!(r.get_forum("rust").await.unwrap().threads, 1);

    assert_eq!(r.get_thread(&ThreadRef::Slug("borrowck".into())).await.unwrap(), t);
    assert_eq!(r.get_thread(&ThreadRef::Id(t.id)).await.unwrap(), t);

    let dup = r.create_thread("rust", thread("carol", Some("borrowck"), 1)).await;
    assert!(matches!(dup, Err(RepoError::Conflict)));
    assert_eq!(r.get_forum("rust").await.unwrap().threads, 1);

    let missing_forum = r.create_thread("go", thread("bob", None, 0)).await;
    assert!(matches!(missing_forum, Err(RepoError::NotFound)));

    let updated = r.update_thread(t.id, "new title", "new message").await.unwrap();
    assert_eq!((updated.title.as_str(), updated.message.as_str()), ("new title", "new message"));
}

#[tokio::test]
async fn forum_threads_page_by_created_exclusive() {
    let r = seeded().await;
    for minutes in [20, 0, 10, 30] {
        r.create_thread("rust", thread("alice", None, minutes)).await.unwrap();
    }
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let minutes = |threads: Vec<forum::models::Thread>| -> Vec<i64> {
        threads.iter().map(|t| (t.created - base).num_minutes()).collect()
    };

    let all = r.list_forum_threads("rust", &Page::default()).await.unwrap();
    assert_eq!(minutes(all), vec![0, 10, 20, 30]);

    let after = r
        .list_forum_threads("rust", &Page::new(2, Some(base + Duration::minutes(10)), false))
        .await
        .unwrap();
    assert_eq!(minutes(after), vec![20, 30]);

    let before = r
        .list_forum_threads("rust", &Page::new(0, Some(base + Duration::minutes(20)), true))
        .await
        .unwrap();
    assert_eq!(minutes(before), vec![10, 0]);

    assert!(r.list_forum_threads("go", &Page::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn forum_users_are_thread_and_post_authors() {
    let r = seeded().await;
    let t = r.create_thread("rust", thread("carol", None, 0)).await.unwrap();
    let drafts = vec![
        NewPost { author: "bob".into(), message: "a".into(), parent: 0 },
        NewPost { author: "carol".into(), message: "b".into(), parent: 0 },
    ];
    r.insert_posts(&t, drafts).await.unwrap();

    let nicks = |users: Vec<User>| -> Vec<String> { users.into_iter().map(|u| u.nickname).collect() };
    assert_eq!(nicks(r.list_forum_users("rust", &Page::default()).await.unwrap()), ["bob", "carol"]);
    assert_eq!(nicks(r.list_forum_users("rust", &Page::new(1, None, true)).await.unwrap()), ["carol"]);
    assert_eq!(
        nicks(r.list_forum_users("rust", &Page::new(0, Some("bob".to_string()), false)).await.unwrap()),
        ["carol"]
    );

    let forum = r.get_forum("rust").await.unwrap();
    assert_eq!((forum.threads, forum.posts), (1, 2));
}

#[tokio::test]
async fn post_edit_marks_post() {
    let r = seeded().await;
    let t = r.create_thread("rust", thread("alice", None, 0)).await.unwrap();
    let posts = r
        .insert_posts(&t, vec![NewPost { author: "alice".into(), message: "first".into(), parent: 0 }])
        .await
        .unwrap();
    assert!(!posts[0].is_edited);

    let edited = r.update_post_message(posts[0].id, "second").await.unwrap();
    assert!(edited.is_edited);
    assert_eq!(r.get_post(posts[0].id).await.unwrap(), edited);
    assert!(matches!(r.get_post(999).await, Err(RepoError::NotFound)));
}

#[tokio::test]
async fn clear_empties_every_table() {
    let r = seeded().await;
    let t = r.create_thread("rust", thread("alice", None, 0)).await.unwrap();
    r.insert_posts(&t, vec![NewPost { author: "bob".into(), message: "m".into(), parent: 0 }])
        .await
        .unwrap();
    r.upsert_vote(t.id, &Vote { nickname: "bob".into(), voice: 1 }).await.unwrap();

    let status = r.status().await.unwrap();
    assert_eq!((status.user, status.forum, status.thread, status.post), (3, 1, 1, 1));

    r.clear().await.unwrap();
    let status = r.status().await.unwrap();
    assert_eq!((status.user, status.forum, status.thread, status.post), (0, 0, 0, 0));
    assert!(matches!(r.get_user("alice").await, Err(RepoError::NotFound)));
}
