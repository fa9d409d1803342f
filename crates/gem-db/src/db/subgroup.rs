use std::collections::HashMap;

use gem_core::{
    models::{
        CreateSubgroupRequest, MemberSummary, Page, PublicationSummary, Subgroup,
        UpdateSubgroupRequest,
    },
    AppError,
};
use sqlx::{PgPool, Postgres};

use super::links::{group_by_owner, search_term, LinkedMember, LinkedPublication};

const SUBGROUP_COLUMNS: &str =
    "id, name, description, icon_path, background_path, infographics, created_at, updated_at";

/// Repository for research subgroups and the `member_subgroups` association
#[derive(Clone)]
pub struct SubgroupRepository {
    pool: PgPool,
}

impl SubgroupRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List subgroups ordered by name, optionally filtered by a substring of
    /// name or description. Returns the page and the total match count.
    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "select"))]
    pub async fn list(&self, q: Option<&str>, page: Page) -> Result<(Vec<Subgroup>, i64), AppError> {
        let pattern = search_term(q);

        let items = sqlx::query_as::<Postgres, Subgroup>(&format!(
            r#"
            SELECT {SUBGROUP_COLUMNS}
            FROM subgroups
            WHERE $1::text IS NULL OR name ILIKE $1 OR description ILIKE $1
            ORDER BY name ASC, id ASC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(&pattern)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>(
            r#"
            SELECT COUNT(*)
            FROM subgroups
            WHERE $1::text IS NULL OR name ILIKE $1 OR description ILIKE $1
            "#,
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Subgroup>, AppError> {
        let subgroup = sqlx::query_as::<Postgres, Subgroup>(&format!(
            "SELECT {SUBGROUP_COLUMNS} FROM subgroups WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subgroup)
    }

    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "select"))]
    pub async fn get_by_name(&self, name: &str) -> Result<Option<Subgroup>, AppError> {
        let subgroup = sqlx::query_as::<Postgres, Subgroup>(&format!(
            "SELECT {SUBGROUP_COLUMNS} FROM subgroups WHERE name = $1"
        ))
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subgroup)
    }

    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "select"))]
    pub async fn exists(&self, id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM subgroups WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Return the subset of `ids` that exist
    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "select"))]
    pub async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>, AppError> {
        let found = sqlx::query_scalar::<Postgres, i64>(
            "SELECT id FROM subgroups WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(found)
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "subgroups", db.operation = "insert"))]
    pub async fn create(&self, request: &CreateSubgroupRequest) -> Result<Subgroup, AppError> {
        let subgroup = sqlx::query_as::<Postgres, Subgroup>(&format!(
            r#"
            INSERT INTO subgroups (name, description)
            VALUES ($1, $2)
            RETURNING {SUBGROUP_COLUMNS}
            "#
        ))
        .bind(&request.name)
        .bind(&request.description)
        .fetch_one(&self.pool)
        .await?;

        Ok(subgroup)
    }

    /// Apply the fields present in `request`. Returns `None` if the subgroup
    /// does not exist.
    #[tracing::instrument(skip(self, request), fields(db.table = "subgroups", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: i64,
        request: &UpdateSubgroupRequest,
    ) -> Result<Option<Subgroup>, AppError> {
        let subgroup = sqlx::query_as::<Postgres, Subgroup>(&format!(
            r#"
            UPDATE subgroups
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {SUBGROUP_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subgroup)
    }

    /// Delete a subgroup and return the removed row so its assets can be
    /// cleaned up. Association rows go with it via `ON DELETE CASCADE`.
    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<Option<Subgroup>, AppError> {
        let subgroup = sqlx::query_as::<Postgres, Subgroup>(&format!(
            "DELETE FROM subgroups WHERE id = $1 RETURNING {SUBGROUP_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subgroup)
    }

    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "update", db.record_id = %id))]
    pub async fn set_icon(&self, id: i64, path: &str) -> Result<Option<Subgroup>, AppError> {
        self.set_path_column(id, "icon_path", path).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "update", db.record_id = %id))]
    pub async fn set_background(&self, id: i64, path: &str) -> Result<Option<Subgroup>, AppError> {
        self.set_path_column(id, "background_path", path).await
    }

    async fn set_path_column(
        &self,
        id: i64,
        column: &'static str,
        path: &str,
    ) -> Result<Option<Subgroup>, AppError> {
        let subgroup = sqlx::query_as::<Postgres, Subgroup>(&format!(
            r#"
            UPDATE subgroups
            SET {column} = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {SUBGROUP_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subgroup)
    }

    /// Append one infographic path in a single statement, so concurrent
    /// appends never lose each other.
    #[tracing::instrument(skip(self), fields(db.table = "subgroups", db.operation = "update", db.record_id = %id))]
    pub async fn append_infographic(
        &self,
        id: i64,
        path: &str,
    ) -> Result<Option<Subgroup>, AppError> {
        let subgroup = sqlx::query_as::<Postgres, Subgroup>(&format!(
            r#"
            UPDATE subgroups
            SET infographics = array_append(infographics, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING {SUBGROUP_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subgroup)
    }

    /// Replace the infographic list, but only if it still equals `expected`.
    /// Returns `None` when the subgroup is gone or the list changed meanwhile.
    #[tracing::instrument(skip(self, expected, replacement), fields(db.table = "subgroups", db.operation = "update", db.record_id = %id))]
    pub async fn replace_infographics(
        &self,
        id: i64,
        expected: &[String],
        replacement: &[String],
    ) -> Result<Option<Subgroup>, AppError> {
        let subgroup = sqlx::query_as::<Postgres, Subgroup>(&format!(
            r#"
            UPDATE subgroups
            SET infographics = $3, updated_at = NOW()
            WHERE id = $1 AND infographics = $2
            RETURNING {SUBGROUP_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(expected)
        .bind(replacement)
        .fetch_optional(&self.pool)
        .await?;

        Ok(subgroup)
    }

    /// Associate a member. Returns `false` if they were already associated.
    #[tracing::instrument(skip(self), fields(db.table = "member_subgroups", db.operation = "insert"))]
    pub async fn add_member(&self, subgroup_id: i64, member_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            INSERT INTO member_subgroups (member_id, subgroup_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(member_id)
        .bind(subgroup_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a member association. Returns `false` if there was none.
    #[tracing::instrument(skip(self), fields(db.table = "member_subgroups", db.operation = "delete"))]
    pub async fn remove_member(&self, subgroup_id: i64, member_id: i64) -> Result<bool, AppError> {
        let result = sqlx::query(
            "DELETE FROM member_subgroups WHERE member_id = $1 AND subgroup_id = $2",
        )
        .bind(member_id)
        .bind(subgroup_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    #[tracing::instrument(skip(self), fields(db.table = "member_subgroups", db.operation = "select"))]
    pub async fn members_of(&self, subgroup_id: i64) -> Result<Vec<MemberSummary>, AppError> {
        let mut grouped = self.members_of_many(&[subgroup_id]).await?;
        Ok(grouped.remove(&subgroup_id).unwrap_or_default())
    }

    /// Member summaries for several subgroups at once, keyed by subgroup id
    #[tracing::instrument(skip(self), fields(db.table = "member_subgroups", db.operation = "select"))]
    pub async fn members_of_many(
        &self,
        subgroup_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<MemberSummary>>, AppError> {
        let rows = sqlx::query_as::<Postgres, LinkedMember>(
            r#"
            SELECT ms.subgroup_id AS owner_id, m.id, m.name
            FROM member_subgroups ms
            JOIN members m ON m.id = ms.member_id
            WHERE ms.subgroup_id = ANY($1)
            ORDER BY m.name ASC, m.id ASC
            "#,
        )
        .bind(subgroup_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_by_owner(rows))
    }

    #[tracing::instrument(skip(self), fields(db.table = "publication_subgroups", db.operation = "select"))]
    pub async fn publications_of(
        &self,
        subgroup_id: i64,
    ) -> Result<Vec<PublicationSummary>, AppError> {
        let mut grouped = self.publications_of_many(&[subgroup_id]).await?;
        Ok(grouped.remove(&subgroup_id).unwrap_or_default())
    }

    /// Publication summaries for several subgroups at once, keyed by subgroup id
    #[tracing::instrument(skip(self), fields(db.table = "publication_subgroups", db.operation = "select"))]
    pub async fn publications_of_many(
        &self,
        subgroup_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<PublicationSummary>>, AppError> {
        let rows = sqlx::query_as::<Postgres, LinkedPublication>(
            r#"
            SELECT ps.subgroup_id AS owner_id, p.id, p.title, p.kind
            FROM publication_subgroups ps
            JOIN publications p ON p.id = ps.publication_id
            WHERE ps.subgroup_id = ANY($1)
            ORDER BY p.published_on DESC NULLS LAST, p.id DESC
            "#,
        )
        .bind(subgroup_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_by_owner(rows))
    }
}
