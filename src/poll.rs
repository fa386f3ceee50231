// src/poll.rs
use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::config::Policy;
use crate::error::PollError;
use crate::models::{
    Identity, NewPoll, Page, Poll, PollEdit, PollFilter, PollId, PollSummary, UserId, ANONYMOUS_USER,
};
use crate::tally;

const MAX_PER_PAGE: u32 = 100;

/// A `NewPoll` that passed validation, with normalized fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPoll {
    pub title: String,
    pub description: String,
    pub category: Option<String>,
    pub options: Vec<String>,
    pub tags: BTreeSet<String>,
}

pub fn validate(new: &NewPoll, policy: &Policy) -> Result<ValidatedPoll, PollError> {
    let title = new.title.trim();
    if title.is_empty() {
        return Err(PollError::validation("title is required"));
    }

    let options: Vec<String> = new.options.iter().map(|o| o.trim().to_string()).collect();
    if options.iter().any(|o| o.is_empty()) {
        return Err(PollError::validation("option text cannot be empty"));
    }
    if options.len() < 2 {
        return Err(PollError::validation("a poll needs at least two options"));
    }
    if options.len() > policy.max_options_per_poll {
        return Err(PollError::validation(format!(
            "a poll can have at most {} options",
            policy.max_options_per_poll
        )));
    }

    let mut seen = HashSet::new();
    if !options.iter().all(|o| seen.insert(o.to_lowercase())) {
        return Err(PollError::validation("option texts must be distinct"));
    }

    Ok(ValidatedPoll {
        title: title.to_string(),
        description: new.description.trim().to_string(),
        category: normalize_category(new.category.as_deref()),
        options,
        tags: normalize_tags(&new.tags),
    })
}

fn normalize_category(category: Option<&str>) -> Option<String> {
    category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_string)
}

pub fn normalize_tags<S: AsRef<str>>(tags: &[S]) -> BTreeSet<String> {
    tags.iter()
        .map(|t| t.as_ref().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

pub fn option_id(position: usize) -> String {
    format!("option_{}", position + 1)
}

/// Inserts the poll and its options; run it inside a write transaction.
pub async fn insert_poll(
    conn: &mut SqliteConnection,
    poll: &ValidatedPoll,
    is_active: bool,
    created_by: &Identity,
) -> Result<PollId, PollError> {
    let id = PollId::new();

    sqlx::query(
        r#"
        INSERT INTO polls (id, title, description, category, tags, is_active, created_by, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(id)
    .bind(&poll.title)
    .bind(&poll.description)
    .bind(&poll.category)
    .bind(Json(&poll.tags))
    .bind(is_active)
    .bind(created_by.user_id())
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    for (position, text) in poll.options.iter().enumerate() {
        sqlx::query("INSERT INTO poll_options (poll_id, option_id, text, position) VALUES (?, ?, ?, ?)")
            .bind(id)
            .bind(option_id(position))
            .bind(text)
            .bind(position as i64)
            .execute(&mut *conn)
            .await?;
    }

    Ok(id)
}

#[derive(sqlx::FromRow)]
struct PollRow {
    id: PollId,
    title: String,
    description: String,
    category: Option<String>,
    tags: Json<BTreeSet<String>>,
    is_active: bool,
    created_by: UserId,
    created_at: DateTime<Utc>,
}

pub async fn get_poll(conn: &mut SqliteConnection, id: PollId) -> Result<Poll, PollError> {
    let row = sqlx::query_as::<_, PollRow>(
        r#"
        SELECT id, title, description, category, tags, is_active, created_by, created_at
        FROM polls WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(PollError::NotFound)?;

    let options = tally::option_counts(conn, id).await?;

    Ok(Poll {
        id: row.id,
        title: row.title,
        description: row.description,
        category: row.category,
        options,
        tags: row.tags.0,
        is_active: row.is_active,
        created_by: (row.created_by != ANONYMOUS_USER).then_some(row.created_by),
        created_at: row.created_at,
    })
}

pub async fn poll_exists(conn: &mut SqliteConnection, id: PollId) -> Result<bool, sqlx::Error> {
    let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM polls WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &PollFilter) {
    qb.push(" WHERE 1 = 1");

    if filter.active_only {
        qb.push(" AND p.is_active = 1");
    }
    if let Some(category) = normalize_category(filter.category.as_deref()) {
        qb.push(" AND p.category = ").push_bind(category);
    }
    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        qb.push(" AND (p.title LIKE ")
            .push_bind(pattern.clone())
            .push(" ESCAPE '\\' OR p.description LIKE ")
            .push_bind(pattern)
            .push(" ESCAPE '\\')");
    }
    if let Some(tag) = filter.tag.as_deref().and_then(|t| normalize_tags(&[t]).pop_first()) {
        qb.push(" AND EXISTS (SELECT 1 FROM json_each(p.tags) WHERE json_each.value = ")
            .push_bind(tag)
            .push(")");
    }
    if let Some(user_id) = filter.created_by {
        qb.push(" AND p.created_by = ").push_bind(user_id);
    }
}

/// Newest polls first. `page` starts at 1.
pub async fn list_polls(
    conn: &mut SqliteConnection,
    filter: &PollFilter,
) -> Result<Page<PollSummary>, PollError> {
    let page = filter.page.max(1);
    let per_page = filter.per_page.clamp(1, MAX_PER_PAGE);

    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM polls p");
    push_filters(&mut count, filter);
    let total: i64 = count.build_query_scalar().fetch_one(&mut *conn).await?;

    let mut select = QueryBuilder::<Sqlite>::new(
        r#"
        SELECT p.id, p.title, p.category, p.is_active,
            (SELECT COUNT(*) FROM poll_options o WHERE o.poll_id = p.id) AS option_count,
            (SELECT COUNT(*) FROM votes v WHERE v.poll_id = p.id) AS total_votes,
            p.created_at
        FROM polls p
        "#,
    );
    push_filters(&mut select, filter);
    select
        .push(" ORDER BY p.created_at DESC, p.rowid DESC LIMIT ")
        .push_bind(i64::from(per_page))
        .push(" OFFSET ")
        .push_bind(i64::from(page - 1) * i64::from(per_page));

    let items = select
        .build_query_as::<PollSummary>()
        .fetch_all(&mut *conn)
        .await?;

    Ok(Page {
        items,
        total,
        page,
        per_page,
    })
}

pub async fn update_poll(conn: &mut SqliteConnection, id: PollId, edit: &PollEdit) -> Result<(), PollError> {
    let current = sqlx::query_as::<_, PollRow>(
        r#"
        SELECT id, title, description, category, tags, is_active, created_by, created_at
        FROM polls WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(PollError::NotFound)?;

    let title = match edit.title.as_deref().map(str::trim) {
        Some("") => return Err(PollError::validation("title is required")),
        Some(title) => title.to_string(),
        None => current.title,
    };
    let description = edit
        .description
        .as_deref()
        .map(|d| d.trim().to_string())
        .unwrap_or(current.description);
    let category = match edit.category.as_deref() {
        Some(category) => normalize_category(Some(category)),
        None => current.category,
    };
    let tags = edit
        .tags
        .as_deref()
        .map(normalize_tags)
        .unwrap_or(current.tags.0);

    sqlx::query("UPDATE polls SET title = ?, description = ?, category = ?, tags = ? WHERE id = ?")
        .bind(title)
        .bind(description)
        .bind(category)
        .bind(Json(&tags))
        .bind(id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

pub async fn set_active(conn: &mut SqliteConnection, id: PollId, active: bool) -> Result<(), PollError> {
    let result = sqlx::query("UPDATE polls SET is_active = ? WHERE id = ?")
        .bind(active)
        .bind(id)
        .execute(conn)
        .await?;

    if result.rows_affected() == 0 {
        return Err(PollError::NotFound);
    }
    Ok(())
}

/// Removes the poll with its votes, bookmarks and options.
/// Run it inside a write transaction so no orphan rows survive a failure.
pub async fn delete_poll(conn: &mut SqliteConnection, id: PollId) -> Result<(), PollError> {
    if !poll_exists(&mut *conn, id).await? {
        return Err(PollError::NotFound);
    }

    for statement in [
        "DELETE FROM votes WHERE poll_id = ?",
        "DELETE FROM bookmarks WHERE poll_id = ?",
        "DELETE FROM poll_options WHERE poll_id = ?",
        "DELETE FROM polls WHERE id = ?",
    ] {
        sqlx::query(statement).bind(id).execute(&mut *conn).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_poll(options: &[&str]) -> NewPoll {
        NewPoll {
            title: "Lunch?".to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            ..NewPoll::default()
        }
    }

    #[test]
    fn needs_two_options() {
        let policy = Policy::default();
        assert!(matches!(validate(&new_poll(&[]), &policy), Err(PollError::Validation(_))));
        assert!(matches!(validate(&new_poll(&["Pizza"]), &policy), Err(PollError::Validation(_))));
        assert!(validate(&new_poll(&["Pizza", "Tacos"]), &policy).is_ok());
    }

    #[test]
    fn rejects_blank_title_and_duplicate_options() {
        let policy = Policy::default();
        let mut blank = new_poll(&["a", "b"]);
        blank.title = "   ".to_string();
        assert!(validate(&blank, &policy).is_err());
        assert!(validate(&new_poll(&["Pizza", " pizza "]), &policy).is_err());
        assert!(validate(&new_poll(&["Pizza", ""]), &policy).is_err());
    }

    #[test]
    fn enforces_option_limit() {
        let policy = Policy {
            max_options_per_poll: 3,
            ..Policy::default()
        };
        assert!(validate(&new_poll(&["a", "b", "c"]), &policy).is_ok());
        assert!(validate(&new_poll(&["a", "b", "c", "d"]), &policy).is_err());
    }

    #[test]
    fn normalizes_fields() {
        let mut new = new_poll(&[" Pizza ", "Tacos"]);
        new.category = Some("  ".to_string());
        new.tags = vec!["Food".to_string(), "food ".to_string(), "".to_string()];
        let valid = validate(&new, &Policy::default()).unwrap();
        assert_eq!(valid.options, vec!["Pizza", "Tacos"]);
        assert_eq!(valid.category, None);
        assert_eq!(valid.tags.into_iter().collect::<Vec<_>>(), vec!["food"]);
        assert_eq!(option_id(0), "option_1");
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
    }
}
