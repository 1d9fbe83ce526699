//! Materialized post paths and the three thread traversals built on them.
//!
//! A post's path is its parent's path with its own id appended, so `path[0]`
//! is always the id of the root post of its subtree. Ordering rows by path
//! (component-wise, a prefix before its extensions) yields a depth-first
//! pre-order walk of the reply tree, which is what `tree` and `parent_tree`
//! listings page through. The Postgres store evaluates the same orderings in
//! SQL over a `BIGINT[]` column; the in-memory store calls [`list_thread`].

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use crate::models::{Id, NewPost, Post};
use crate::pagination::{Page, PostSort};

use super::{RepoError, RepoResult};

pub type Path = Vec<Id>;

/// A post together with its materialized path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathedPost {
    pub post: Post,
    pub path: Path,
}

impl PathedPost {
    pub fn root(&self) -> Id {
        self.path[0]
    }
}

pub fn child_path(parent: Option<&[Id]>, id: Id) -> Path {
    let mut path = parent.map(<[Id]>::to_vec).unwrap_or_default();
    path.push(id);
    path
}

/// On-insert hook: computes the path of every draft of a batch.
///
/// `ids` are the ids allocated for `drafts`, index for index. `lookup`
/// resolves an existing post id to its `(thread, path)`. A parent that is
/// unknown or belongs to a different thread rejects the whole batch.
pub fn materialize_paths<'a, F>(thread: Id, drafts: &[NewPost], ids: &[Id], lookup: F) -> RepoResult<Vec<Path>>
where
    F: Fn(Id) -> Option<(Id, &'a [Id])>,
{
    debug_assert_eq!(drafts.len(), ids.len());
    drafts
        .iter()
        .zip(ids)
        .map(|(draft, &id)| {
            if draft.parent == 0 {
                return Ok(child_path(None, id));
            }
            match lookup(draft.parent) {
                Some((parent_thread, parent_path)) if parent_thread == thread => {
                    Ok(child_path(Some(parent_path), id))
                }
                _ => Err(RepoError::ParentNotFound { thread }),
            }
        })
        .collect()
}

/// Distinct nonzero parent ids of `drafts` for which `exists` is false, in
/// order of first appearance.
pub fn unknown_parents(drafts: &[NewPost], exists: impl Fn(Id) -> bool) -> Vec<Id> {
    let mut seen = HashSet::new();
    drafts
        .iter()
        .map(|d| d.parent)
        .filter(|&parent| parent != 0 && seen.insert(parent))
        .filter(|&parent| !exists(parent))
        .collect()
}

/// Lists the posts of `thread` from `posts` (keyed by id, all threads).
///
/// The cursor of `tree` and `parent_tree` is resolved against every post, not
/// just this thread's; an unknown cursor id yields an empty page.
pub fn list_thread(posts: &BTreeMap<Id, PathedPost>, thread: Id, sort: PostSort, page: &Page<Id>) -> Vec<Post> {
    let rows: Vec<&PathedPost> = posts.values().filter(|p| p.post.thread == thread).collect();
    let cursor = match page.since {
        None => None,
        Some(id) => match posts.get(&id) {
            Some(p) => Some(p.path.as_slice()),
            None if sort == PostSort::Flat => None,
            None => return Vec::new(),
        },
    };

    let selected = match sort {
        PostSort::Flat => flat(rows, page),
        PostSort::Tree => tree(rows, &page.with_since(cursor.map(<[Id]>::to_vec))),
        PostSort::ParentTree => parent_tree(rows, &page.with_since(cursor.map(|path| path[0]))),
    };
    selected.into_iter().map(|p| p.post.clone()).collect()
}

fn flat<'a>(rows: Vec<&'a PathedPost>, page: &Page<Id>) -> Vec<&'a PathedPost> {
    let mut out: Vec<_> = rows.into_iter().filter(|p| page.admits(&p.post.id)).collect();
    out.sort_by(|a, b| page.direction(a.post.id.cmp(&b.post.id)));
    page.truncate(&mut out);
    out
}

fn tree<'a>(rows: Vec<&'a PathedPost>, page: &Page<Path>) -> Vec<&'a PathedPost> {
    let mut out: Vec<_> = rows.into_iter().filter(|p| page.admits(&p.path)).collect();
    out.sort_by(|a, b| page.direction(compare_paths(&a.path, &b.path)));
    page.truncate(&mut out);
    out
}

/// `page.since` is the root id of the cursor post; `limit` counts roots.
fn parent_tree<'a>(rows: Vec<&'a PathedPost>, page: &Page<Id>) -> Vec<&'a PathedPost> {
    let roots: Vec<&PathedPost> = rows.iter().copied().filter(|p| p.post.parent == 0).collect();
    let picked: HashSet<Id> = flat(roots, page).into_iter().map(|p| p.post.id).collect();

    let mut out: Vec<_> = rows.into_iter().filter(|p| picked.contains(&p.root())).collect();
    out.sort_by(|a, b| {
        page.direction(a.root().cmp(&b.root()))
            .then_with(|| compare_paths(&a.path, &b.path))
            .then_with(|| a.post.id.cmp(&b.post.id))
    });
    out
}

/// Component-wise comparison with length as the final tie-break; identical
/// to `Ord for [Id]`, spelled out for stores without native array ordering.
pub fn compare_paths(a: &[Id], b: &[Id]) -> Ordering {
    for (x, y) in a.iter().zip(b) {
        match x.cmp(y) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}
