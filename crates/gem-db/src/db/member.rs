use std::collections::HashMap;

use gem_core::{
    models::{
        CreateMemberRequest, Member, Page, PublicationSummary, SubgroupSummary,
        UpdateMemberRequest,
    },
    AppError,
};
use sqlx::{PgPool, Postgres};

use super::links::{group_by_owner, search_term, LinkedPublication, LinkedSubgroup};

const MEMBER_COLUMNS: &str = "id, name, description, experience, photo_path, background_path, \
     email, linkedin, lattes, created_at, updated_at";

/// Repository for members (researchers)
#[derive(Clone)]
pub struct MemberRepository {
    pool: PgPool,
}

impl MemberRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List members ordered by name.
    ///
    /// `q` matches name, description or experience. `subgroup_id` restricts the
    /// listing to members of that subgroup.
    #[tracing::instrument(skip(self), fields(db.table = "members", db.operation = "select"))]
    pub async fn list(
        &self,
        q: Option<&str>,
        subgroup_id: Option<i64>,
        page: Page,
    ) -> Result<(Vec<Member>, i64), AppError> {
        let pattern = search_term(q);
        let filter = r#"
            ($1::text IS NULL OR m.name ILIKE $1 OR m.description ILIKE $1 OR m.experience ILIKE $1)
            AND ($2::bigint IS NULL OR EXISTS (
                SELECT 1 FROM member_subgroups ms
                WHERE ms.member_id = m.id AND ms.subgroup_id = $2
            ))
        "#;

        let items = sqlx::query_as::<Postgres, Member>(&format!(
            r#"
            SELECT {columns}
            FROM members m
            WHERE {filter}
            ORDER BY m.name ASC, m.id ASC
            LIMIT $3 OFFSET $4
            "#,
            columns = qualified_columns(),
        ))
        .bind(&pattern)
        .bind(subgroup_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>(&format!(
            "SELECT COUNT(*) FROM members m WHERE {filter}"
        ))
        .bind(&pattern)
        .bind(subgroup_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    /// Search by name only
    #[tracing::instrument(skip(self), fields(db.table = "members", db.operation = "select"))]
    pub async fn search_by_name(
        &self,
        name: &str,
        page: Page,
    ) -> Result<(Vec<Member>, i64), AppError> {
        let pattern = search_term(Some(name));

        let items = sqlx::query_as::<Postgres, Member>(&format!(
            r#"
            SELECT {MEMBER_COLUMNS}
            FROM members
            WHERE $1::text IS NULL OR name ILIKE $1
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
            "SELECT COUNT(*) FROM members WHERE $1::text IS NULL OR name ILIKE $1",
        )
        .bind(&pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "members", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Member>, AppError> {
        let member = sqlx::query_as::<Postgres, Member>(&format!(
            "SELECT {MEMBER_COLUMNS} FROM members WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    #[tracing::instrument(skip(self), fields(db.table = "members", db.operation = "select"))]
    pub async fn exists(&self, id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM members WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Return the subset of `ids` that exist
    #[tracing::instrument(skip(self), fields(db.table = "members", db.operation = "select"))]
    pub async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>, AppError> {
        let found = sqlx::query_scalar::<Postgres, i64>("SELECT id FROM members WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;

        Ok(found)
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "members", db.operation = "insert"))]
    pub async fn create(&self, request: &CreateMemberRequest) -> Result<Member, AppError> {
        let member = sqlx::query_as::<Postgres, Member>(&format!(
            r#"
            INSERT INTO members (name, description, experience, email, linkedin, lattes)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {MEMBER_COLUMNS}
            "#
        ))
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.experience)
        .bind(&request.email)
        .bind(&request.linkedin)
        .bind(&request.lattes)
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }

    #[tracing::instrument(skip(self, request), fields(db.table = "members", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: i64,
        request: &UpdateMemberRequest,
    ) -> Result<Option<Member>, AppError> {
        let member = sqlx::query_as::<Postgres, Member>(&format!(
            r#"
            UPDATE members
            SET name = COALESCE($2, name),
                description = COALESCE($3, description),
                experience = COALESCE($4, experience),
                email = COALESCE($5, email),
                linkedin = COALESCE($6, linkedin),
                lattes = COALESCE($7, lattes),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {MEMBER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.name)
        .bind(&request.description)
        .bind(&request.experience)
        .bind(&request.email)
        .bind(&request.linkedin)
        .bind(&request.lattes)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    /// Delete a member and return the removed row for asset cleanup
    #[tracing::instrument(skip(self), fields(db.table = "members", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<Option<Member>, AppError> {
        let member = sqlx::query_as::<Postgres, Member>(&format!(
            "DELETE FROM members WHERE id = $1 RETURNING {MEMBER_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    #[tracing::instrument(skip(self), fields(db.table = "members", db.operation = "update", db.record_id = %id))]
    pub async fn set_photo(&self, id: i64, path: &str) -> Result<Option<Member>, AppError> {
        self.set_path_column(id, "photo_path", path).await
    }

    #[tracing::instrument(skip(self), fields(db.table = "members", db.operation = "update", db.record_id = %id))]
    pub async fn set_background(&self, id: i64, path: &str) -> Result<Option<Member>, AppError> {
        self.set_path_column(id, "background_path", path).await
    }

    async fn set_path_column(
        &self,
        id: i64,
        column: &'static str,
        path: &str,
    ) -> Result<Option<Member>, AppError> {
        let member = sqlx::query_as::<Postgres, Member>(&format!(
            r#"
            UPDATE members
            SET {column} = $2, updated_at = NOW()
            WHERE id = $1
            RETURNING {MEMBER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(member)
    }

    #[tracing::instrument(skip(self), fields(db.table = "member_subgroups", db.operation = "select"))]
    pub async fn subgroups_of(&self, member_id: i64) -> Result<Vec<SubgroupSummary>, AppError> {
        let mut grouped = self.subgroups_of_many(&[member_id]).await?;
        Ok(grouped.remove(&member_id).unwrap_or_default())
    }

    /// Subgroup summaries for several members at once, keyed by member id
    #[tracing::instrument(skip(self), fields(db.table = "member_subgroups", db.operation = "select"))]
    pub async fn subgroups_of_many(
        &self,
        member_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<SubgroupSummary>>, AppError> {
        let rows = sqlx::query_as::<Postgres, LinkedSubgroup>(
            r#"
            SELECT ms.member_id AS owner_id, s.id, s.name
            FROM member_subgroups ms
            JOIN subgroups s ON s.id = ms.subgroup_id
            WHERE ms.member_id = ANY($1)
            ORDER BY s.name ASC, s.id ASC
            "#,
        )
        .bind(member_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_by_owner(rows))
    }

    /// Publications the member authored
    #[tracing::instrument(skip(self), fields(db.table = "publication_authors", db.operation = "select"))]
    pub async fn publications_of(
        &self,
        member_id: i64,
    ) -> Result<Vec<PublicationSummary>, AppError> {
        let mut grouped = self.publications_of_many(&[member_id]).await?;
        Ok(grouped.remove(&member_id).unwrap_or_default())
    }

    #[tracing::instrument(skip(self), fields(db.table = "publication_authors", db.operation = "select"))]
    pub async fn publications_of_many(
        &self,
        member_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<PublicationSummary>>, AppError> {
        let rows = sqlx::query_as::<Postgres, LinkedPublication>(
            r#"
            SELECT pa.member_id AS owner_id, p.id, p.title, p.kind
            FROM publication_authors pa
            JOIN publications p ON p.id = pa.publication_id
            WHERE pa.member_id = ANY($1)
            ORDER BY p.published_on DESC NULLS LAST, p.id DESC
            "#,
        )
        .bind(member_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_by_owner(rows))
    }
}

fn qualified_columns() -> String {
    MEMBER_COLUMNS
        .split(',')
        .map(|column| format!("m.{}", column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qualified_columns_prefixes_every_column() {
        let columns = qualified_columns();
        assert!(columns.starts_with("m.id, m.name"));
        assert!(columns.ends_with("m.updated_at"));
        assert_eq!(columns.matches("m.").count(), MEMBER_COLUMNS.split(',').count());
    }
}
