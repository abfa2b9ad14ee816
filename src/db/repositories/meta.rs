use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Decode, Row, SqlitePool, Sqlite, Type};

use crate::core::{
    errors::{AppError, AppResult},
    types::{BlobRef, DocumentMeta, DocumentStatus, SignatureField},
};

fn parse_timestamp(value: String) -> AppResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|v| v.with_timezone(&Utc))
        .map_err(|err| AppError::Internal(format!("invalid timestamp {value}: {err}")))
}

/// Reads a column; a value that does not decode is a corrupt record, not a transient failure.
fn column<'r, T>(row: &'r SqliteRow, name: &str) -> AppResult<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|err| AppError::Internal(format!("corrupt document record, column {name}: {err}")))
}

pub async fn read_meta(pool: &SqlitePool) -> AppResult<DocumentMeta> {
    let maybe_row = sqlx::query(
        r#"
        SELECT document_id, status, created_at, original_name, checksum, original_ref,
               preview_ref, signed_ref, page_count, signature_field_json, last_error
        FROM document_meta
        WHERE id = 1
        "#,
    )
    .fetch_optional(pool)
    .await?;

    match maybe_row {
        Some(row) => map_meta(row),
        None => Ok(DocumentMeta::empty()),
    }
}

pub async fn write_meta(pool: &SqlitePool, meta: &DocumentMeta) -> AppResult<DocumentMeta> {
    let field_json = meta
        .signature_field
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| AppError::StorageWrite(err.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO document_meta (
          id, document_id, status, created_at, original_name, checksum, original_ref,
          preview_ref, signed_ref, page_count, signature_field_json, last_error, updated_at
        )
        VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        ON CONFLICT(id) DO UPDATE SET
          document_id = excluded.document_id,
          status = excluded.status,
          created_at = excluded.created_at,
          original_name = excluded.original_name,
          checksum = excluded.checksum,
          original_ref = excluded.original_ref,
          preview_ref = excluded.preview_ref,
          signed_ref = excluded.signed_ref,
          page_count = excluded.page_count,
          signature_field_json = excluded.signature_field_json,
          last_error = excluded.last_error,
          updated_at = excluded.updated_at
        "#,
    )
    .bind(&meta.document_id)
    .bind(meta.status.as_str())
    .bind(meta.created_at.map(|at| at.to_rfc3339()))
    .bind(&meta.original_name)
    .bind(&meta.checksum)
    .bind(meta.original_ref.as_ref().map(BlobRef::as_str))
    .bind(meta.preview_ref.as_ref().map(BlobRef::as_str))
    .bind(meta.signed_ref.as_ref().map(BlobRef::as_str))
    .bind(meta.page_count.map(i64::from))
    .bind(field_json)
    .bind(&meta.last_error)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await
    .map_err(|err| AppError::StorageWrite(err.to_string()))?;

    read_meta(pool).await
}

fn map_meta(row: SqliteRow) -> AppResult<DocumentMeta> {
    let status_raw: String = column(&row, "status")?;
    let status = DocumentStatus::from_str(&status_raw)
        .ok_or_else(|| AppError::Internal(format!("unknown document status {status_raw}")))?;
    let created_at = column::<Option<String>>(&row, "created_at")?
        .map(parse_timestamp)
        .transpose()?;
    let signature_field = column::<Option<String>>(&row, "signature_field_json")?
        .map(|raw| serde_json::from_str::<SignatureField>(&raw))
        .transpose()
        .map_err(|err| AppError::Internal(format!("invalid signature field: {err}")))?;
    let page_count = column::<Option<i64>>(&row, "page_count")?
        .map(|count| u32::try_from(count).map_err(|_| AppError::Internal(format!("invalid page count {count}"))))
        .transpose()?;

    Ok(DocumentMeta {
        document_id: column(&row, "document_id")?,
        status,
        created_at,
        original_name: column(&row, "original_name")?,
        checksum: column(&row, "checksum")?,
        original_ref: column::<Option<String>>(&row, "original_ref")?.map(BlobRef),
        preview_ref: column::<Option<String>>(&row, "preview_ref")?.map(BlobRef),
        signed_ref: column::<Option<String>>(&row, "signed_ref")?.map(BlobRef),
        page_count,
        signature_field,
        last_error: column(&row, "last_error")?,
    })
}
