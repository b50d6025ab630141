//! Postgres-backed storage reads.
//!
//! Entity tables keep each resource as a JSON document in a `doc` column;
//! table names come from [`Kind::table_name`]. The `users` table additionally
//! carries `id`, `name` and `type` columns, and access tokens are plain rows
//! read back through `to_jsonb`.
//!
//! ## Error Mapping
//!
//! | SQLx Error     | StorageError |
//! |----------------|--------------|
//! | RowNotFound    | `NotFound`   |
//! | ColumnDecode / Decode | `Decode` |
//! | anything else  | `Backend`    |

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::{PgPool, Row};
use tracing::{Span, instrument};

use gatekeep_auth::{
    AccessToken, AccessTokenStore, GlobalRole, GlobalRoleBinding, PermissionSource, Role,
    RoleBinding, User, UserDirectory, UserType,
};
use gatekeep_core::{Kind, StorageError, StorageResult, UserId};

/// Storage reads over a Postgres schema.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
    schema: Option<String>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
            schema: None,
        }
    }

    /// Qualify every table with `schema`.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub async fn connect(database_url: &str) -> StorageResult<Self> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    fn table(&self, kind: Kind) -> String {
        self.qualify(kind.table_name())
    }

    fn qualify(&self, table: &str) -> String {
        match &self.schema {
            Some(schema) => format!("{schema}.{table}"),
            None => table.to_string(),
        }
    }

    /// Every document of `kind`, decoded as `T`.
    async fn list_documents<T: DeserializeOwned + Send>(&self, kind: Kind) -> StorageResult<Vec<T>> {
        let operation = kind.table_name();
        let rows = sqlx::query(&format!("SELECT doc FROM {}", self.table(kind)))
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error(operation, e))?;

        let docs = rows
            .iter()
            .map(|row| {
                let doc: serde_json::Value = row
                    .try_get("doc")
                    .map_err(|e| map_sqlx_error(operation, e))?;
                serde_json::from_value(doc)
                    .map_err(|e| StorageError::decode(format!("{kind} document: {e}")))
            })
            .collect::<StorageResult<Vec<T>>>()?;

        Span::current().record("row_count", docs.len());
        Ok(docs)
    }

    async fn fetch_users(&self, filter: &str, bind: UserFilter<'_>) -> StorageResult<Vec<User>> {
        let sql = format!(
            "SELECT id, name, type, email FROM {} {filter}",
            self.table(Kind::User)
        );
        let query = sqlx::query(&sql);
        let query = match bind {
            UserFilter::None => query,
            UserFilter::Name(name) => query.bind(name),
            UserFilter::Id(id) => query.bind(id.get()),
        };
        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("users", e))?;
        rows.iter().map(user_from_row).collect()
    }
}

enum UserFilter<'a> {
    None,
    Name(&'a str),
    Id(UserId),
}

fn user_from_row(row: &sqlx::postgres::PgRow) -> StorageResult<User> {
    let id: i64 = row.try_get("id").map_err(|e| map_sqlx_error("users", e))?;
    let name: String = row.try_get("name").map_err(|e| map_sqlx_error("users", e))?;
    let user_type: String = row.try_get("type").map_err(|e| map_sqlx_error("users", e))?;
    let email: Option<String> = row.try_get("email").map_err(|e| map_sqlx_error("users", e))?;

    let mut user = User::new(id, name);
    user.user_type = if user_type.eq_ignore_ascii_case("org") {
        UserType::Org
    } else {
        UserType::User
    };
    user.email = email.filter(|e| !e.is_empty());
    Ok(user)
}

fn single(mut users: Vec<User>, what: String) -> StorageResult<User> {
    if users.is_empty() {
        return Err(StorageError::not_found(what));
    }
    Ok(users.swap_remove(0))
}

#[async_trait]
impl PermissionSource for PostgresStore {
    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn list_users(&self) -> StorageResult<Vec<User>> {
        let users = self.fetch_users("", UserFilter::None).await?;
        Span::current().record("row_count", users.len());
        Ok(users)
    }

    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn list_roles(&self) -> StorageResult<Vec<Role>> {
        self.list_documents(Kind::Role).await
    }

    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn list_role_bindings(&self) -> StorageResult<Vec<RoleBinding>> {
        self.list_documents(Kind::RoleBinding).await
    }

    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn list_global_roles(&self) -> StorageResult<Vec<GlobalRole>> {
        self.list_documents(Kind::GlobalRole).await
    }

    #[instrument(skip(self), fields(row_count = tracing::field::Empty), err)]
    async fn list_global_role_bindings(&self) -> StorageResult<Vec<GlobalRoleBinding>> {
        self.list_documents(Kind::GlobalRoleBinding).await
    }
}

#[async_trait]
impl AccessTokenStore for PostgresStore {
    #[instrument(skip(self, last_eight), fields(row_count = tracing::field::Empty), err)]
    async fn candidates_by_suffix(&self, last_eight: &str) -> StorageResult<Vec<AccessToken>> {
        let sql = format!(
            "SELECT to_jsonb(a.*) AS token FROM {} AS a WHERE a.token_last_eight = $1",
            self.table(Kind::AccessToken)
        );
        let rows = sqlx::query(&sql)
            .bind(last_eight)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("candidates_by_suffix", e))?;

        let tokens = rows
            .iter()
            .map(|row| {
                let raw: serde_json::Value = row
                    .try_get("token")
                    .map_err(|e| map_sqlx_error("candidates_by_suffix", e))?;
                serde_json::from_value(raw)
                    .map_err(|e| StorageError::decode(format!("access token row: {e}")))
            })
            .collect::<StorageResult<Vec<AccessToken>>>()?;

        Span::current().record("row_count", tokens.len());
        Ok(tokens)
    }
}

#[async_trait]
impl UserDirectory for PostgresStore {
    #[instrument(skip(self), err)]
    async fn user_by_name(&self, name: &str) -> StorageResult<User> {
        let users = self.fetch_users("WHERE name = $1", UserFilter::Name(name)).await?;
        single(users, format!("user '{name}'"))
    }

    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn user_by_id(&self, id: UserId) -> StorageResult<User> {
        let users = self.fetch_users("WHERE id = $1", UserFilter::Id(id)).await?;
        single(users, format!("user #{id}"))
    }

    #[instrument(skip(self), err)]
    async fn organizations_of(&self, name: &str) -> StorageResult<Vec<User>> {
        let sql = format!(
            "SELECT org.id, org.name, org.type, org.email \
             FROM {users} org \
             JOIN {team} t ON org.id = t.org_id \
             JOIN {member} tm ON t.id = tm.team_id \
             JOIN {users} u ON u.id = tm.user_id \
             WHERE u.name = $1 AND org.type = 'org'",
            users = self.table(Kind::User),
            team = self.qualify("team"),
            member = self.qualify("team_member"),
        );
        let rows = sqlx::query(&sql)
            .bind(name)
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("organizations_of", e))?;

        let mut orgs = rows.iter().map(user_from_row).collect::<StorageResult<Vec<User>>>()?;
        // A user in several teams of one org yields one row per team.
        orgs.sort_by_key(|o| o.id);
        orgs.dedup_by_key(|o| o.id);
        Ok(orgs)
    }
}

/// Map SQLx errors to storage errors.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StorageError {
    match err {
        sqlx::Error::RowNotFound => StorageError::not_found(format!("row in {operation}")),
        sqlx::Error::ColumnDecode { index, source } => {
            StorageError::decode(format!("column {index} in {operation}: {source}"))
        }
        sqlx::Error::Decode(source) => StorageError::decode(format!("{operation}: {source}")),
        sqlx::Error::Database(db_err) => {
            StorageError::backend(format!("database error in {operation}: {}", db_err.message()))
        }
        sqlx::Error::PoolClosed => {
            StorageError::backend(format!("connection pool closed in {operation}"))
        }
        other => StorageError::backend(format!("sqlx error in {operation}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err = map_sqlx_error("users", sqlx::Error::RowNotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn pool_closed_maps_to_backend() {
        let err = map_sqlx_error("list_roles", sqlx::Error::PoolClosed);
        assert_eq!(err, StorageError::backend("connection pool closed in list_roles"));
    }

    #[test]
    fn single_reports_what_was_missing() {
        let err = single(Vec::new(), "user 'ghost'".to_string()).unwrap_err();
        assert_eq!(err, StorageError::not_found("user 'ghost'"));
        let user = single(vec![User::new(1, "alice")], String::new()).unwrap();
        assert_eq!(user.name, "alice");
    }

    #[test]
    fn access_token_rows_decode_from_jsonb() {
        let raw = serde_json::json!({
            "id": 12, "uid": 4, "name": "ci",
            "token_hash": "ab", "token_salt": "cd", "token_last_eight": "12345678",
            "created_at": "2025-03-01T10:00:00Z", "updated_at": "2025-03-01T10:00:00Z",
            "has_used": true, "exp_date": "0001-01-01T00:00:00Z"
        });
        let token: AccessToken = serde_json::from_value(raw).unwrap();
        assert_eq!(token.uid, UserId::new(4));
        assert!(token.exp_date.is_none());
    }
}
