use std::collections::{HashMap, HashSet};

use sqlx::{Pool, Postgres, QueryBuilder};

use super::hierarchy;
use super::*;

const USER_COLUMNS: &str = "nickname, fullname, email, about";
const FORUM_COLUMNS: &str = "title, author, slug, posts, threads";
const THREAD_COLUMNS: &str = "id, title, author, forum, message, votes, slug, created";
const POST_COLUMNS: &str = "id, parent, author, message, isedited, forum, thread, created";

/// Rows per multi-row `INSERT` of a post batch; keeps bind counts well below
/// the protocol's 65535 parameter ceiling.
const INSERT_CHUNK: usize = 1000;

impl From<sqlx::Error> for RepoError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => RepoError::NotFound,
            other => RepoError::Internal(other.to_string()),
        }
    }
}

#[derive(Clone)]
pub struct PgRepo {
    pool: Pool<Postgres>,
}

impl PgRepo {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Applies `migrations/` to the connected database.
    pub async fn migrate(&self) -> RepoResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepoError::Internal(format!("migrate: {e}")))
    }
}

fn distinct<T: Clone + Eq + std::hash::Hash>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items.into_iter().filter(|item| seen.insert(item.clone())).collect()
}

#[async_trait]
impl UserRepo for PgRepo {
    async fn create_user(&self, user: User) -> RepoResult<User> {
        let rec = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (nickname, fullname, email, about) VALUES ($1,$2,$3,$4) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.nickname)
        .bind(&user.fullname)
        .bind(&user.email)
        .bind(&user.about)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn get_user(&self, nickname: &str) -> RepoResult<User> {
        let rec = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE nickname = $1"))
            .bind(nickname)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec)
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<User> {
        let rec = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec)
    }

    async fn list_users_by_nickname_or_email(&self, nickname: &str, email: &str) -> RepoResult<Vec<User>> {
        let recs = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE nickname = $1 OR email = $2 ORDER BY nickname"
        ))
        .bind(nickname)
        .bind(email)
        .fetch_all(&self.pool)
        .await?;
        Ok(recs)
    }

    async fn update_user(&self, user: User) -> RepoResult<User> {
        let rec = sqlx::query_as::<_, User>(&format!(
            "UPDATE users SET fullname = $2, email = $3, about = $4 WHERE nickname = $1 RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.nickname)
        .bind(&user.fullname)
        .bind(&user.email)
        .bind(&user.about)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn missing_users(&self, nicknames: &[String]) -> RepoResult<Vec<String>> {
        let candidates = distinct(nicknames.iter().cloned());
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let missing = sqlx::query_scalar::<_, String>(
            r#"
            SELECT c.nickname
            FROM UNNEST($1::text[]) WITH ORDINALITY AS c(nickname, ord)
            WHERE NOT EXISTS (SELECT 1 FROM users u WHERE u.nickname = c.nickname)
            ORDER BY c.ord
            "#,
        )
        .bind(&candidates)
        .fetch_all(&self.pool)
        .await?;
        Ok(missing)
    }

    async fn list_forum_users(&self, forum: &str, page: &Page<String>) -> RepoResult<Vec<User>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT u.nickname, u.fullname, u.email, u.about FROM forum_users fu \
             JOIN users u ON u.nickname = fu.nickname WHERE fu.forum = ",
        );
        qb.push_bind(forum);
        page.push_since(&mut qb, r#"fu.nickname COLLATE "C""#);
        page.push_order(&mut qb, r#"fu.nickname COLLATE "C""#);
        page.push_limit(&mut qb);
        let recs = qb.build_query_as::<User>().fetch_all(&self.pool).await?;
        Ok(recs)
    }
}

#[async_trait]
impl ForumRepo for PgRepo {
    async fn create_forum(&self, new: NewForum) -> RepoResult<Forum> {
        let rec = sqlx::query_as::<_, Forum>(&format!(
            "INSERT INTO forums (slug, title, author) VALUES ($1,$2,$3) RETURNING {FORUM_COLUMNS}"
        ))
        .bind(&new.slug)
        .bind(&new.title)
        .bind(&new.user)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn get_forum(&self, slug: &str) -> RepoResult<Forum> {
        let rec = sqlx::query_as::<_, Forum>(&format!("SELECT {FORUM_COLUMNS} FROM forums WHERE slug = $1"))
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec)
    }
}

#[async_trait]
impl ThreadRepo for PgRepo {
    async fn create_thread(&self, forum: &str, new: NewThread) -> RepoResult<Thread> {
        let mut tx = self.pool.begin().await?;
        let thread = sqlx::query_as::<_, Thread>(&format!(
            "INSERT INTO threads (slug, title, author, forum, message, created) \
             VALUES ($1,$2,$3,$4,$5,$6) RETURNING {THREAD_COLUMNS}"
        ))
        .bind(new.slug.as_deref())
        .bind(&new.title)
        .bind(&new.author)
        .bind(forum)
        .bind(&new.message)
        .bind(new.created.unwrap_or_else(timestamp))
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE forums SET threads = threads + 1 WHERE slug = $1")
            .bind(forum)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO forum_users (forum, nickname) VALUES ($1,$2) ON CONFLICT DO NOTHING")
            .bind(forum)
            .bind(&thread.author)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(thread)
    }

    async fn get_thread(&self, thread: &ThreadRef) -> RepoResult<Thread> {
        let query = match thread {
            ThreadRef::Id(id) => {
                sqlx::query_as::<_, Thread>(&format!("SELECT {THREAD_COLUMNS} FROM threads WHERE id = $1"))
                    .bind(*id)
                    .fetch_one(&self.pool)
                    .await
            }
            ThreadRef::Slug(slug) => {
                sqlx::query_as::<_, Thread>(&format!("SELECT {THREAD_COLUMNS} FROM threads WHERE slug = $1"))
                    .bind(slug)
                    .fetch_one(&self.pool)
                    .await
            }
        };
        Ok(query?)
    }

    async fn update_thread(&self, id: Id, title: &str, message: &str) -> RepoResult<Thread> {
        let rec = sqlx::query_as::<_, Thread>(&format!(
            "UPDATE threads SET title = $2, message = $3 WHERE id = $1 RETURNING {THREAD_COLUMNS}"
        ))
        .bind(id)
        .bind(title)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn list_forum_threads(&self, forum: &str, page: &Page<DateTime<Utc>>) -> RepoResult<Vec<Thread>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {THREAD_COLUMNS} FROM threads WHERE forum = "));
        qb.push_bind(forum);
        page.push_since(&mut qb, "created");
        page.push_order(&mut qb, "created");
        qb.push(", id");
        page.push_limit(&mut qb);
        let recs = qb.build_query_as::<Thread>().fetch_all(&self.pool).await?;
        Ok(recs)
    }
}

#[async_trait]
impl VoteRepo for PgRepo {
    async fn upsert_vote(&self, thread: Id, vote: &Vote) -> RepoResult<Thread> {
        let mut tx = self.pool.begin().await?;
        // Serializes votes on the thread, so the previous voice read below is
        // the one the upsert replaces. NO KEY keeps the KEY SHARE locks taken
        // by concurrent post and vote foreign-key checks unblocked.
        sqlx::query_scalar::<_, Id>("SELECT id FROM threads WHERE id = $1 FOR NO KEY UPDATE")
            .bind(thread)
            .fetch_one(&mut *tx)
            .await?;
        let previous = sqlx::query_scalar::<_, i32>("SELECT voice FROM votes WHERE nickname = $1 AND thread = $2")
            .bind(&vote.nickname)
            .bind(thread)
            .fetch_optional(&mut *tx)
            .await?
            .unwrap_or(0);
        sqlx::query(
            "INSERT INTO votes (nickname, thread, voice) VALUES ($1,$2,$3) \
             ON CONFLICT (nickname, thread) DO UPDATE SET voice = EXCLUDED.voice",
        )
        .bind(&vote.nickname)
        .bind(thread)
        .bind(vote.voice)
        .execute(&mut *tx)
        .await?;
        let rec = sqlx::query_as::<_, Thread>(&format!(
            "UPDATE threads SET votes = votes + $2 WHERE id = $1 RETURNING {THREAD_COLUMNS}"
        ))
        .bind(thread)
        .bind(i64::from(vote.voice - previous))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(rec)
    }
}

#[async_trait]
impl PostRepo for PgRepo {
    async fn insert_posts(&self, thread: &Thread, drafts: Vec<NewPost>) -> RepoResult<Vec<Post>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }
        let mut tx = self.pool.begin().await?;

        let mut ids = sqlx::query_scalar::<_, Id>(
            "SELECT nextval(pg_get_serial_sequence('posts', 'id')) FROM generate_series(1, $1)",
        )
        .bind(drafts.len() as i64)
        .fetch_all(&mut *tx)
        .await?;
        ids.sort_unstable();

        let parents = distinct(drafts.iter().map(|d| d.parent).filter(|&p| p != 0));
        let known: HashMap<Id, (Id, Vec<Id>)> =
            sqlx::query_as::<_, (Id, Id, Vec<Id>)>("SELECT id, thread, path FROM posts WHERE id = ANY($1)")
                .bind(&parents)
                .fetch_all(&mut *tx)
                .await?
                .into_iter()
                .map(|(id, thread, path)| (id, (thread, path)))
                .collect();
        let paths = hierarchy::materialize_paths(thread.id, &drafts, &ids, |id| {
            known.get(&id).map(|(thread, path)| (*thread, path.as_slice()))
        })?;

        let created = timestamp();
        let rows: Vec<(Id, NewPost, Vec<Id>)> = ids
            .into_iter()
            .zip(drafts)
            .zip(paths)
            .map(|((id, draft), path)| (id, draft, path))
            .collect();
        for chunk in rows.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::<Postgres>::new(
                "INSERT INTO posts (id, parent, author, message, forum, thread, created, path) ",
            );
            qb.push_values(chunk, |mut b, (id, draft, path)| {
                b.push_bind(*id)
                    .push_bind(draft.parent)
                    .push_bind(&draft.author)
                    .push_bind(&draft.message)
                    .push_bind(&thread.forum)
                    .push_bind(thread.id)
                    .push_bind(created)
                    .push_bind(path);
            });
            qb.build().execute(&mut *tx).await?;
        }

        sqlx::query("UPDATE forums SET posts = posts + $2 WHERE slug = $1")
            .bind(&thread.forum)
            .bind(rows.len() as i64)
            .execute(&mut *tx)
            .await?;
        let authors = distinct(rows.iter().map(|(_, draft, _)| draft.author.clone()));
        sqlx::query(
            "INSERT INTO forum_users (forum, nickname) SELECT $1, UNNEST($2::text[]) ON CONFLICT DO NOTHING",
        )
        .bind(&thread.forum)
        .bind(&authors)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(rows
            .into_iter()
            .map(|(id, draft, _)| Post {
                id,
                parent: draft.parent,
                author: draft.author,
                message: draft.message,
                is_edited: false,
                forum: thread.forum.clone(),
                thread: thread.id,
                created,
            })
            .collect())
    }

    async fn get_post(&self, id: Id) -> RepoResult<Post> {
        let rec = sqlx::query_as::<_, Post>(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(rec)
    }

    async fn update_post_message(&self, id: Id, message: &str) -> RepoResult<Post> {
        let rec = sqlx::query_as::<_, Post>(&format!(
            "UPDATE posts SET message = $2, isedited = TRUE WHERE id = $1 RETURNING {POST_COLUMNS}"
        ))
        .bind(id)
        .bind(message)
        .fetch_one(&self.pool)
        .await?;
        Ok(rec)
    }

    async fn missing_parents(&self, drafts: &[NewPost]) -> RepoResult<Vec<Id>> {
        let candidates = distinct(drafts.iter().map(|d| d.parent).filter(|&p| p != 0));
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let missing = sqlx::query_scalar::<_, Id>(
            r#"
            SELECT c.id
            FROM UNNEST($1::bigint[]) WITH ORDINALITY AS c(id, ord)
            WHERE NOT EXISTS (SELECT 1 FROM posts p WHERE p.id = c.id)
            ORDER BY c.ord
            "#,
        )
        .bind(&candidates)
        .fetch_all(&self.pool)
        .await?;
        Ok(missing)
    }

    async fn list_thread_posts(&self, thread: Id, sort: PostSort, page: &Page<Id>) -> RepoResult<Vec<Post>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {POST_COLUMNS} FROM posts WHERE thread = "));
        qb.push_bind(thread);
        match sort {
            PostSort::Flat => {
                page.push_since(&mut qb, "id");
                page.push_order(&mut qb, "id");
                page.push_limit(&mut qb);
            }
            PostSort::Tree => {
                if let Some(since) = page.since {
                    qb.push(" AND path ")
                        .push(page.comparator())
                        .push(" (SELECT path FROM posts WHERE id = ")
                        .push_bind(since)
                        .push(")");
                }
                page.push_order(&mut qb, "path");
                page.push_limit(&mut qb);
            }
            PostSort::ParentTree => {
                qb.push(" AND path[1] IN (SELECT id FROM posts WHERE thread = ")
                    .push_bind(thread)
                    .push(" AND parent = 0");
                if let Some(since) = page.since {
                    qb.push(" AND id ")
                        .push(page.comparator())
                        .push(" (SELECT path[1] FROM posts WHERE id = ")
                        .push_bind(since)
                        .push(")");
                }
                page.push_order(&mut qb, "id");
                page.push_limit(&mut qb);
                qb.push(")");
                page.push_order(&mut qb, "path[1]");
                qb.push(", path ASC, id ASC");
            }
        }
        let recs = qb.build_query_as::<Post>().fetch_all(&self.pool).await?;
        Ok(recs)
    }
}

#[async_trait]
impl ServiceRepo for PgRepo {
    async fn clear(&self) -> RepoResult<()> {
        sqlx::query("TRUNCATE forum_users, votes, posts, threads, forums, users RESTART IDENTITY")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn status(&self) -> RepoResult<Status> {
        let rec = sqlx::query_as::<_, Status>(
            r#"
            SELECT (SELECT count(*) FROM users)   AS "user",
                   (SELECT count(*) FROM forums)  AS forum,
                   (SELECT count(*) FROM threads) AS thread,
                   (SELECT count(*) FROM posts)   AS post
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(rec)
    }
}
