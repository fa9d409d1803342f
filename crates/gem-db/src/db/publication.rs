use std::collections::HashMap;

use gem_core::{
    models::{
        CreatePublicationRequest, MemberSummary, Page, Publication, PublicationFilter,
        PublicationKind, SubgroupSummary, UpdatePublicationRequest,
    },
    AppError,
};
use sqlx::{PgConnection, PgPool, Postgres};

use super::links::{group_by_owner, search_term, LinkedMember, LinkedSubgroup};

const PUBLICATION_COLUMNS: &str = "p.id, p.title, p.description, p.kind, p.published_on, \
     p.external_link, p.image_path, p.created_at, p.updated_at";

const PUBLICATION_FILTER: &str = r#"
    ($1::text IS NULL OR p.title ILIKE $1 OR p.description ILIKE $1)
    AND ($2::publication_kind IS NULL OR p.kind = $2)
    AND ($3::int IS NULL OR EXTRACT(YEAR FROM p.published_on)::int = $3)
    AND ($4::bigint IS NULL OR EXISTS (
        SELECT 1 FROM publication_authors pa
        WHERE pa.publication_id = p.id AND pa.member_id = $4
    ))
"#;

/// Repository for publications and their author/subgroup associations
#[derive(Clone)]
pub struct PublicationRepository {
    pool: PgPool,
}

impl PublicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// List publications, newest first, with every filter in `filter` applied.
    #[tracing::instrument(skip(self), fields(db.table = "publications", db.operation = "select"))]
    pub async fn list(
        &self,
        filter: &PublicationFilter,
        page: Page,
    ) -> Result<(Vec<Publication>, i64), AppError> {
        let pattern = search_term(filter.q.as_deref());

        let items = sqlx::query_as::<Postgres, Publication>(&format!(
            r#"
            SELECT {PUBLICATION_COLUMNS}
            FROM publications p
            WHERE {PUBLICATION_FILTER}
            ORDER BY p.published_on DESC NULLS LAST, p.id DESC
            LIMIT $5 OFFSET $6
            "#
        ))
        .bind(&pattern)
        .bind(filter.kind)
        .bind(filter.year)
        .bind(filter.author_id)
        .bind(page.limit)
        .bind(page.skip)
        .fetch_all(&self.pool)
        .await?;

        let total = sqlx::query_scalar::<Postgres, i64>(&format!(
            "SELECT COUNT(*) FROM publications p WHERE {PUBLICATION_FILTER}"
        ))
        .bind(&pattern)
        .bind(filter.kind)
        .bind(filter.year)
        .bind(filter.author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok((items, total))
    }

    #[tracing::instrument(skip(self), fields(db.table = "publications", db.operation = "select", db.record_id = %id))]
    pub async fn get(&self, id: i64) -> Result<Option<Publication>, AppError> {
        let publication = sqlx::query_as::<Postgres, Publication>(&format!(
            "SELECT {PUBLICATION_COLUMNS} FROM publications p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(publication)
    }

    #[tracing::instrument(skip(self), fields(db.table = "publications", db.operation = "select"))]
    pub async fn exists(&self, id: i64) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM publications WHERE id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    /// Insert a publication together with its author and subgroup links in
    /// one transaction. Callers validate the ids beforehand.
    #[tracing::instrument(skip(self, request), fields(db.table = "publications", db.operation = "insert"))]
    pub async fn create(&self, request: &CreatePublicationRequest) -> Result<Publication, AppError> {
        let mut tx = self.pool.begin().await?;

        let publication = sqlx::query_as::<Postgres, Publication>(&format!(
            r#"
            INSERT INTO publications AS p (title, description, kind, published_on, external_link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {PUBLICATION_COLUMNS}
            "#
        ))
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.kind)
        .bind(request.published_on)
        .bind(&request.external_link)
        .fetch_one(&mut *tx)
        .await?;

        link_authors(&mut *tx, publication.id, &request.author_ids).await?;
        link_subgroups(&mut *tx, publication.id, &request.subgroup_ids).await?;

        tx.commit().await?;

        tracing::debug!(
            publication_id = publication.id,
            authors = request.author_ids.len(),
            subgroups = request.subgroup_ids.len(),
            "Publication created"
        );

        Ok(publication)
    }

    /// Apply a partial update. Relation sets present in `request` replace the
    /// existing ones. Returns `None` if the publication does not exist.
    #[tracing::instrument(skip(self, request), fields(db.table = "publications", db.operation = "update", db.record_id = %id))]
    pub async fn update(
        &self,
        id: i64,
        request: &UpdatePublicationRequest,
    ) -> Result<Option<Publication>, AppError> {
        let mut tx = self.pool.begin().await?;

        let publication = sqlx::query_as::<Postgres, Publication>(&format!(
            r#"
            UPDATE publications AS p
            SET title = COALESCE($2, p.title),
                description = COALESCE($3, p.description),
                kind = COALESCE($4, p.kind),
                published_on = COALESCE($5, p.published_on),
                external_link = COALESCE($6, p.external_link),
                updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PUBLICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&request.title)
        .bind(&request.description)
        .bind(request.kind)
        .bind(request.published_on)
        .bind(&request.external_link)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(publication) = publication else {
            tx.rollback().await?;
            return Ok(None);
        };

        if let Some(author_ids) = &request.author_ids {
            sqlx::query("DELETE FROM publication_authors WHERE publication_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_authors(&mut *tx, id, author_ids).await?;
        }

        if let Some(subgroup_ids) = &request.subgroup_ids {
            sqlx::query("DELETE FROM publication_subgroups WHERE publication_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            link_subgroups(&mut *tx, id, subgroup_ids).await?;
        }

        tx.commit().await?;

        Ok(Some(publication))
    }

    /// Delete a publication and return the removed row for asset cleanup
    #[tracing::instrument(skip(self), fields(db.table = "publications", db.operation = "delete", db.record_id = %id))]
    pub async fn delete(&self, id: i64) -> Result<Option<Publication>, AppError> {
        let publication = sqlx::query_as::<Postgres, Publication>(&format!(
            "DELETE FROM publications AS p WHERE p.id = $1 RETURNING {PUBLICATION_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(publication)
    }

    #[tracing::instrument(skip(self), fields(db.table = "publications", db.operation = "update", db.record_id = %id))]
    pub async fn set_image(&self, id: i64, path: &str) -> Result<Option<Publication>, AppError> {
        let publication = sqlx::query_as::<Postgres, Publication>(&format!(
            r#"
            UPDATE publications AS p
            SET image_path = $2, updated_at = NOW()
            WHERE p.id = $1
            RETURNING {PUBLICATION_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(path)
        .fetch_optional(&self.pool)
        .await?;

        Ok(publication)
    }

    /// Publication count per kind; kinds with no publications are absent
    #[tracing::instrument(skip(self), fields(db.table = "publications", db.operation = "select"))]
    pub async fn count_by_kind(&self) -> Result<Vec<(PublicationKind, i64)>, AppError> {
        let counts = sqlx::query_as::<Postgres, (PublicationKind, i64)>(
            "SELECT kind, COUNT(*) FROM publications GROUP BY kind",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }

    #[tracing::instrument(skip(self), fields(db.table = "publication_authors", db.operation = "select"))]
    pub async fn authors_of(&self, publication_id: i64) -> Result<Vec<MemberSummary>, AppError> {
        let mut grouped = self.authors_of_many(&[publication_id]).await?;
        Ok(grouped.remove(&publication_id).unwrap_or_default())
    }

    #[tracing::instrument(skip(self), fields(db.table = "publication_authors", db.operation = "select"))]
    pub async fn authors_of_many(
        &self,
        publication_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<MemberSummary>>, AppError> {
        let rows = sqlx::query_as::<Postgres, LinkedMember>(
            r#"
            SELECT pa.publication_id AS owner_id, m.id, m.name
            FROM publication_authors pa
            JOIN members m ON m.id = pa.member_id
            WHERE pa.publication_id = ANY($1)
            ORDER BY m.name ASC, m.id ASC
            "#,
        )
        .bind(publication_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_by_owner(rows))
    }

    #[tracing::instrument(skip(self), fields(db.table = "publication_subgroups", db.operation = "select"))]
    pub async fn subgroups_of(
        &self,
        publication_id: i64,
    ) -> Result<Vec<SubgroupSummary>, AppError> {
        let mut grouped = self.subgroups_of_many(&[publication_id]).await?;
        Ok(grouped.remove(&publication_id).unwrap_or_default())
    }

    #[tracing::instrument(skip(self), fields(db.table = "publication_subgroups", db.operation = "select"))]
    pub async fn subgroups_of_many(
        &self,
        publication_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<SubgroupSummary>>, AppError> {
        let rows = sqlx::query_as::<Postgres, LinkedSubgroup>(
            r#"
            SELECT ps.publication_id AS owner_id, s.id, s.name
            FROM publication_subgroups ps
            JOIN subgroups s ON s.id = ps.subgroup_id
            WHERE ps.publication_id = ANY($1)
            ORDER BY s.name ASC, s.id ASC
            "#,
        )
        .bind(publication_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(group_by_owner(rows))
    }
}

async fn link_authors(
    conn: &mut PgConnection,
    publication_id: i64,
    member_ids: &[i64],
) -> Result<(), AppError> {
    if member_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO publication_authors (publication_id, member_id)
        SELECT $1, UNNEST($2::bigint[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(publication_id)
    .bind(member_ids)
    .execute(conn)
    .await?;
    Ok(())
}

async fn link_subgroups(
    conn: &mut PgConnection,
    publication_id: i64,
    subgroup_ids: &[i64],
) -> Result<(), AppError> {
    if subgroup_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO publication_subgroups (publication_id, subgroup_id)
        SELECT $1, UNNEST($2::bigint[])
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(publication_id)
    .bind(subgroup_ids)
    .execute(conn)
    .await?;
    Ok(())
}
