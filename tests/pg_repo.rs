#![cfg(feature = "postgres-store")]

use forum::models::{Id, NewForum, NewPost, NewThread, Post, ThreadRef, User, Vote};
use forum::pagination::{Page, PostSort};
use forum::repo::pg::PgRepo;
use forum::repo::{ForumRepo, PostRepo, RepoError, ServiceRepo, ThreadRepo, UserRepo, VoteRepo};
use serial_test::serial;
use sqlx::postgres::PgPoolOptions;

/// Migrated, emptied store; `None` when no database is configured.
async fn pg_repo() -> Option<PgRepo> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new().max_connections(2).connect(&url).await.ok()?;
    let repo = PgRepo::new(pool);
    repo.migrate().await.unwrap();
    repo.clear().await.unwrap();
    Some(repo)
}

async fn seed(repo: &PgRepo) -> forum::models::Thread {
    for nick in ["alice", "bob"] {
        repo.create_user(User {
            nickname: nick.into(),
            fullname: nick.into(),
            email: format!("{nick}@example.org"),
            about: String::new(),
        })
        .await
        .unwrap();
    }
    repo.create_forum(NewForum { title: "Rust".into(), user: "alice".into(), slug: "rust".into() })
        .await
        .unwrap();
    repo.create_thread(
        "rust",
        NewThread {
            title: "t".into(),
            author: "bob".into(),
            message: "m".into(),
            slug: Some("main".into()),
            created: None,
        },
    )
    .await
    .unwrap()
}

fn draft(parent: Id) -> NewPost {
    NewPost { author: "alice".into(), message: "m".into(), parent }
}

fn ids(posts: &[Post]) -> Vec<Id> {
    posts.iter().map(|p| p.id).collect()
}

#[tokio::test]
#[serial]
async fn pg_listings_match_in_memory_orderings() {
    let Some(repo) = pg_repo().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };
    let thread = seed(&repo).await;

    let roots = ids(&repo.insert_posts(&thread, vec![draft(0), draft(0)]).await.unwrap());
    let replies = ids(&repo.insert_posts(&thread, vec![draft(roots[0]), draft(roots[1])]).await.unwrap());
    let deep = ids(&repo.insert_posts(&thread, vec![draft(replies[0])]).await.unwrap());

    let flat = repo.list_thread_posts(thread.id, PostSort::Flat, &Page::default()).await.unwrap();
    assert_eq!(ids(&flat), vec![roots[0], roots[1], replies[0], replies[1], deep[0]]);

    let tree = repo.list_thread_posts(thread.id, PostSort::Tree, &Page::default()).await.unwrap();
    assert_eq!(ids(&tree), vec![roots[0], replies[0], deep[0], roots[1], replies[1]]);

    let page = Page::new(1, None, false);
    let parent_tree = repo.list_thread_posts(thread.id, PostSort::ParentTree, &page).await.unwrap();
    assert_eq!(ids(&parent_tree), vec![roots[0], replies[0], deep[0]]);

    let page = Page::new(1, Some(deep[0]), false);
    let next = repo.list_thread_posts(thread.id, PostSort::ParentTree, &page).await.unwrap();
    assert_eq!(ids(&next), vec![roots[1], replies[1]]);

    let page = Page::new(2, Some(replies[0]), true);
    let back = repo.list_thread_posts(thread.id, PostSort::Tree, &page).await.unwrap();
    assert_eq!(ids(&back), vec![roots[0]]);

    let unknown = Page::new(0, Some(9999), false);
    assert!(repo.list_thread_posts(thread.id, PostSort::Tree, &unknown).await.unwrap().is_empty());

    let forum = repo.get_forum("rust").await.unwrap();
    assert_eq!((forum.threads, forum.posts), (1, 5));
}

#[tokio::test]
#[serial]
async fn pg_batch_is_atomic() {
    let Some(repo) = pg_repo().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };
    let thread = seed(&repo).await;
    let root = repo.insert_posts(&thread, vec![draft(0)]).await.unwrap()[0].id;

    let batch = vec![draft(0), draft(root), draft(424242), draft(0), draft(root)];
    assert_eq!(repo.missing_parents(&batch).await.unwrap(), vec![424242]);
    let err = repo.insert_posts(&thread, batch).await.unwrap_err();
    assert!(matches!(err, RepoError::ParentNotFound { thread: t } if t == thread.id));

    let status = repo.status().await.unwrap();
    assert_eq!(status.post, 1);
    assert_eq!(repo.get_forum("rust").await.unwrap().posts, 1);
}

#[tokio::test]
#[serial]
async fn pg_votes_and_conflicts() {
    let Some(repo) = pg_repo().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };
    let thread = seed(&repo).await;

    let up = Vote { nickname: "alice".into(), voice: 1 };
    assert_eq!(repo.upsert_vote(thread.id, &up).await.unwrap().votes, 1);
    assert_eq!(repo.upsert_vote(thread.id, &up).await.unwrap().votes, 1);
    let down = Vote { nickname: "alice".into(), voice: -1 };
    assert_eq!(repo.upsert_vote(thread.id, &down).await.unwrap().votes, -1);
    assert!(matches!(repo.upsert_vote(thread.id + 100, &up).await, Err(RepoError::NotFound)));

    let dup = repo
        .create_user(User { nickname: "carol".into(), fullname: "c".into(), email: "bob@example.org".into(), about: String::new() })
        .await;
    assert!(matches!(dup, Err(RepoError::Conflict)));

    let missing = repo.missing_users(&["bob".into(), "zed".into(), "zed".into()]).await.unwrap();
    assert_eq!(missing, vec!["zed".to_string()]);

    let members = repo.list_forum_users("rust", &Page::default()).await.unwrap();
    assert_eq!(members.iter().map(|u| u.nickname.as_str()).collect::<Vec<_>>(), ["bob"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn pg_concurrent_votes_sum_exactly() {
    let Some(repo) = pg_repo().await else {
        eprintln!("skip: no DATABASE_URL");
        return;
    };
    let thread = seed(&repo).await;
    let voters: Vec<String> = (0..16).map(|i| format!("voter{i:02}")).collect();
    for nick in &voters {
        repo.create_user(User {
            nickname: nick.clone(),
            fullname: nick.clone(),
            email: format!("{nick}@example.org"),
            about: String::new(),
        })
        .await
        .unwrap();
    }

    // posts race the votes on the same thread row
    let mut tasks = Vec::new();
    for (i, nick) in voters.iter().enumerate() {
        let (repo, nick, thread) = (repo.clone(), nick.clone(), thread.clone());
        tasks.push(tokio::spawn(async move {
            let voice = if i % 4 == 0 { -1 } else { 1 };
            repo.upsert_vote(thread.id, &Vote { nickname: nick.clone(), voice }).await.unwrap();
            repo.insert_posts(&thread, vec![NewPost { author: nick, message: "m".into(), parent: 0 }])
                .await
                .unwrap();
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // 4 down, 12 up
    assert_eq!(repo.get_thread(&ThreadRef::Id(thread.id)).await.unwrap().votes, 8);
    assert_eq!(repo.get_forum("rust").await.unwrap().posts, 16);
}
