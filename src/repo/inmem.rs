//! Process-local store. Every write holds the state's write lock for the whole
//! operation, so a failed batch leaves nothing behind and readers never see a
//! half-applied change.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::hierarchy::{self, PathedPost};
use super::*;

#[derive(Default)]
struct State {
    users: BTreeMap<String, User>,
    forums: HashMap<String, Forum>,
    threads: BTreeMap<Id, Thread>,
    posts: BTreeMap<Id, PathedPost>,
    votes: HashMap<(String, Id), i32>,
    forum_users: HashMap<String, BTreeSet<String>>,
    next_thread_id: Id,
    next_post_id: Id,
}

impl State {
    fn find_thread(&self, thread: &ThreadRef) -> Option<&Thread> {
        match thread {
            ThreadRef::Id(id) => self.threads.get(id),
            ThreadRef::Slug(slug) => self.threads.values().find(|t| t.slug.as_deref() == Some(slug.as_str())),
        }
    }

    fn join_forum(&mut self, forum: &str, nickname: &str) {
        self.forum_users
            .entry(forum.to_string())
            .or_default()
            .insert(nickname.to_string());
    }
}

#[derive(Clone, Default)]
pub struct InMemRepo {
    state: Arc<RwLock<State>>,
}

impl InMemRepo {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
        self.state.read().map_err(|_| RepoError::Internal("in-memory state poisoned".into()))
    }

    fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
        self.state.write().map_err(|_| RepoError::Internal("in-memory state poisoned".into()))
    }
}

#[async_trait]
impl UserRepo for InMemRepo {
    async fn create_user(&self, user: User) -> RepoResult<User> {
        let mut s = self.write()?;
        if s.users.contains_key(&user.nickname) || s.users.values().any(|u| u.email == user.email) {
            return Err(RepoError::Conflict);
        }
        s.users.insert(user.nickname.clone(), user.clone());
        Ok(user)
    }

    async fn get_user(&self, nickname: &str) -> RepoResult<User> {
        self.read()?.users.get(nickname).cloned().ok_or(RepoError::NotFound)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
        let s = self.read()?;
        s.users.values().find(|u| u.email == email).cloned().ok_or(RepoError::NotFound)
    }

    async fn list_users_by_nickname_or_email(&self, nickname: &str, email: &str) -> RepoResult<Vec<User>> {
        let s = self.read()?;
        Ok(s.users
            .values()
            .filter(|u| u.nickname == nickname || u.email == email)
            .cloned()
            .collect())
    }

    async fn update_user(&self, user: User) -> RepoResult<User> {
        let mut s = self.write()?;
        if s.users.values().any(|u| u.email == user.email && u.nickname != user.nickname) {
            return Err(RepoError::Conflict);
        }
        let stored = s.users.get_mut(&user.nickname).ok_or(RepoError::NotFound)?;
        *stored = user.clone();
        Ok(user)
    }

    async fn missing_users(&self, nicknames: &[String]) -> RepoResult<Vec<String>> {
        let s = self.read()?;
        let mut missing: Vec<String> = Vec::new();
        for nickname in nicknames {
            if !s.users.contains_key(nickname) && !missing.contains(nickname) {
                missing.push(nickname.clone());
            }
        }
        Ok(missing)
    }

    async fn list_forum_users(&self, forum: &str, page: &Page<String>) -> RepoResult<Vec<User>> {
        let s = self.read()?;
        let Some(members) = s.forum_users.get(forum) else { return Ok(Vec::new()) };
        let mut users: Vec<User> = members
            .iter()
            .filter(|nickname| page.admits(nickname))
            .filter_map(|nickname| s.users.get(nickname).cloned())
            .collect();
        if page.desc {
            users.reverse();
        }
        page.truncate(&mut users);
        Ok(users)
    }
}

#[async_trait]
impl ForumRepo for InMemRepo {
    async fn create_forum(&self, new: NewForum) -> RepoResult<Forum> {
        let mut s = self.write()?;
        if s.forums.contains_key(&new.slug) {
            return Err(RepoError::Conflict);
        }
        if !s.users.contains_key(&new.user) {
            return Err(RepoError::NotFound);
        }
        let forum = Forum { title: new.title, user: new.user, slug: new.slug, posts: 0, threads: 0 };
        s.forums.insert(forum.slug.clone(), forum.clone());
        Ok(forum)
    }

    async fn get_forum(&self, slug: &str) -> RepoResult<Forum> {
        self.read()?.forums.get(slug).cloned().ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl ThreadRepo for InMemRepo {
    async fn create_thread(&self, forum: &str, new: NewThread) -> RepoResult<Thread> {
        let mut s = self.write()?;
        if let Some(slug) = new.slug.as_deref() {
            if s.threads.values().any(|t| t.slug.as_deref() == Some(slug)) {
                return Err(RepoError::Conflict);
            }
        }
        if !s.users.contains_key(&new.author) {
            return Err(RepoError::NotFound);
        }
        let counters = s.forums.get_mut(forum).ok_or(RepoError::NotFound)?;
        counters.threads += 1;

        s.next_thread_id += 1;
        let thread = Thread {
            id: s.next_thread_id,
            title: new.title,
            author: new.author,
            forum: forum.to_string(),
            message: new.message,
            votes: 0,
            slug: new.slug,
            created: new.created.unwrap_or_else(timestamp),
        };
        s.join_forum(forum, &thread.author);
        s.threads.insert(thread.id, thread.clone());
        Ok(thread)
    }

    async fn get_thread(&self, thread: &ThreadRef) -> RepoResult<Thread> {
        self.read()?.find_thread(thread).cloned().ok_or(RepoError::NotFound)
    }

    async fn update_thread(&self, id: Id, title: &str, message: &str) -> RepoResult<Thread> {
        let mut s = self.write()?;
        let thread = s.threads.get_mut(&id).ok_or(RepoError::NotFound)?;
        thread.title = title.to_string();
        thread.message = message.to_string();
        Ok(thread.clone())
    }

    async fn list_forum_threads(&self, forum: &str, page: &Page<DateTime<Utc>>) -> RepoResult<Vec<Thread>> {
        let s = self.read()?;
        let mut threads: Vec<Thread> = s
            .threads
            .values()
            .filter(|t| t.forum == forum && page.admits(&t.created))
            .cloned()
            .collect();
        threads.sort_by(|a, b| page.direction(a.created.cmp(&b.created)).then_with(|| a.id.cmp(&b.id)));
        page.truncate(&mut threads);
        Ok(threads)
    }
}

#[async_trait]
impl VoteRepo for InMemRepo {
    async fn upsert_vote(&self, thread: Id, vote: &Vote) -> RepoResult<Thread> {
        let mut s = self.write()?;
        if !s.threads.contains_key(&thread) {
            return Err(RepoError::NotFound);
        }
        if !s.users.contains_key(&vote.nickname) {
            return Err(RepoError::NotFound);
        }
        let previous = s.votes.insert((vote.nickname.clone(), thread), vote.voice).unwrap_or(0);
        let stored = s.threads.get_mut(&thread).ok_or(RepoError::NotFound)?;
        stored.votes += i64::from(vote.voice - previous);
        Ok(stored.clone())
    }
}

#[async_trait]
impl PostRepo for InMemRepo {
    async fn insert_posts(&self, thread: &Thread, drafts: Vec<NewPost>) -> RepoResult<Vec<Post>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let mut guard = self.write()?;
        let s = &mut *guard;
        if !s.threads.contains_key(&thread.id) {
            return Err(RepoError::NotFound);
        }
        if drafts.iter().any(|d| !s.users.contains_key(&d.author)) {
            return Err(RepoError::NotFound);
        }

        let ids: Vec<Id> = (1..=drafts.len() as Id).map(|n| s.next_post_id + n).collect();
        let paths = hierarchy::materialize_paths(thread.id, &drafts, &ids, |id| {
            s.posts.get(&id).map(|p| (p.post.thread, p.path.as_slice()))
        })?;

        let created = timestamp();
        let mut inserted = Vec::with_capacity(drafts.len());
        for ((draft, id), path) in drafts.into_iter().zip(ids).zip(paths) {
            let post = Post {
                id,
                parent: draft.parent,
                author: draft.author,
                message: draft.message,
                is_edited: false,
                forum: thread.forum.clone(),
                thread: thread.id,
                created,
            };
            s.join_forum(&thread.forum, &post.author);
            s.posts.insert(id, PathedPost { post: post.clone(), path });
            inserted.push(post);
        }
        s.next_post_id += inserted.len() as Id;
        if let Some(forum) = s.forums.get_mut(&thread.forum) {
            forum.posts += inserted.len() as i64;
        }
        Ok(inserted)
    }

    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        let s = self.read()?;
        s.posts.get(&id).map(|p| p.post.clone()).ok_or(RepoError::NotFound)
    }

    async fn update_post_message(&self, id: Id, message: &str) -> RepoResult<Post> {
        let mut s = self.write()?;
        let stored = s.posts.get_mut(&id).ok_or(RepoError::NotFound)?;
        stored.post.message = message.to_string();
        stored.post.is_edited = true;
        Ok(stored.post.clone())
    }

    async fn missing_parents(&self, drafts: &[NewPost]) -> RepoResult<Vec<Id>> {
        let s = self.read()?;
        Ok(hierarchy::unknown_parents(drafts, |id| s.posts.contains_key(&id)))
    }

    async fn list_thread_posts(&self, thread: Id, sort: PostSort, page: &Page<Id>) -> RepoResult<Vec<Post>> {
        let s = self.read()?;
        Ok(hierarchy::list_thread(&s.posts, thread, sort, page))
    }
}

#[async_trait]
impl ServiceRepo for InMemRepo {
    async fn clear(&self) -> RepoResult<()> {
        *self.write()? = State::default();
        Ok(())
    }

    async fn status(&self) -> RepoResult<Status> {
        let s = self.read()?;
        Ok(Status {
            user: s.users.len() as i64,
            forum: s.forums.len() as i64,
            thread: s.threads.len() as i64,
            post: s.posts.len() as i64,
        })
    }
}
