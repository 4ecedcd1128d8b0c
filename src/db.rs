pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::Value;
    use sqlx::postgres::PgPool;
    use sqlx::types::Json;
    use sqlx::{self, Postgres, QueryBuilder};
    use uuid::Uuid;

    use crate::errors::MeetlyError;
    use crate::store::{self, Collection, Document, DocumentStore, FieldOp, Predicate, StoredDocument};

    const DOCUMENTS_PRIMARY_KEY: &str = "documents_primary_key";

    const QUERY_PREFIX: &str = "SELECT id, body FROM documents WHERE collection = ";

    /// A `DocumentStore` keeping each document as a JSONB row in the
    /// `documents` table.
    pub struct PgDocumentStore {
        pool: PgPool,
    }

    impl PgDocumentStore {
        pub fn new(pool: PgPool) -> Self {
            PgDocumentStore { pool }
        }

        /// Creates the `documents` table if it does not exist yet.
        pub async fn initialize(&self) -> Result<(), MeetlyError> {
            sqlx::query(include_str!("queries/create_documents.sql"))
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;

            Ok(())
        }
    }

    // these can be simplified once async functions in traits are usable with `dyn`
    impl DocumentStore for PgDocumentStore {
        fn get(
            &self,
            collection: Collection,
            id: &str,
        ) -> BoxFuture<Result<Option<StoredDocument>, MeetlyError>> {
            let id = id.to_owned();

            async move {
                let query = sqlx::query_as::<_, (Json<Document>,)>(include_str!(
                    "queries/retrieve_document.sql"
                ));

                let row = query
                    .bind(collection.name())
                    .bind(&id)
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(row.map(|(Json(fields),)| StoredDocument { id, fields }))
            }
            .boxed()
        }

        fn query(
            &self,
            collection: Collection,
            predicates: Vec<Predicate>,
        ) -> BoxFuture<Result<Vec<StoredDocument>, MeetlyError>> {
            async move {
                let mut builder = QueryBuilder::<Postgres>::new(QUERY_PREFIX);
                builder.push_bind(collection.name());

                for predicate in predicates {
                    builder.push(" AND ");
                    push_predicate(&mut builder, predicate)?;
                }

                let rows = builder
                    .build_query_as::<(String, Json<Document>)>()
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(rows
                    .into_iter()
                    .map(|(id, Json(fields))| StoredDocument { id, fields })
                    .collect())
            }
            .boxed()
        }

        fn set(
            &self,
            collection: Collection,
            id: &str,
            fields: Document,
        ) -> BoxFuture<Result<(), MeetlyError>> {
            let id = id.to_owned();

            async move {
                let query = sqlx::query(include_str!("queries/upsert_document.sql"));

                query
                    .bind(collection.name())
                    .bind(&id)
                    .bind(Json(fields))
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn add(&self, collection: Collection, fields: Document) -> BoxFuture<Result<String, MeetlyError>> {
            async move {
                let id = Uuid::new_v4().to_string();
                let query = sqlx::query(include_str!("queries/insert_document.sql"));

                query
                    .bind(collection.name())
                    .bind(&id)
                    .bind(Json(fields))
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(id)
            }
            .boxed()
        }

        fn update(
            &self,
            collection: Collection,
            id: &str,
            ops: Vec<FieldOp>,
        ) -> BoxFuture<Result<(), MeetlyError>> {
            let id = id.to_owned();

            async move {
                let mut transaction = self.pool.begin().await.map_err(map_sqlx_error)?;

                let locked = sqlx::query_as::<_, (Json<Document>,)>(include_str!(
                    "queries/lock_document.sql"
                ))
                .bind(collection.name())
                .bind(&id)
                .fetch_optional(&mut *transaction)
                .await
                .map_err(map_sqlx_error)?;

                let (Json(mut fields),) =
                    locked.ok_or_else(|| MeetlyError::not_found(collection, id.as_str()))?;

                store::apply(&mut fields, &ops)?;

                sqlx::query(include_str!("queries/update_document.sql"))
                    .bind(collection.name())
                    .bind(&id)
                    .bind(Json(fields))
                    .execute(&mut *transaction)
                    .await
                    .map_err(map_sqlx_error)?;

                transaction.commit().await.map_err(map_sqlx_error)?;

                Ok(())
            }
            .boxed()
        }

        fn delete(&self, collection: Collection, id: &str) -> BoxFuture<Result<(), MeetlyError>> {
            let id = id.to_owned();

            async move {
                let query = sqlx::query(include_str!("queries/delete_document.sql"));

                let count = query
                    .bind(collection.name())
                    .bind(&id)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(MeetlyError::not_found(collection, id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }
    }

    /// Splits a dotted field path into the `text[]` form taken by the
    /// `#>` and `#>>` operators.
    fn path(field: &str) -> Vec<String> {
        field.split('.').map(str::to_owned).collect()
    }

    fn push_predicate(
        builder: &mut QueryBuilder<'_, Postgres>,
        predicate: Predicate,
    ) -> Result<(), MeetlyError> {
        match predicate {
            Predicate::Range { field, min, max } => {
                builder.push("(body #>> ");
                builder.push_bind(path(&field));
                builder.push(")::float8 BETWEEN ");
                builder.push_bind(min);
                builder.push(" AND ");
                builder.push_bind(max);
            }
            Predicate::Equals { field, value } => {
                builder.push("body #> ");
                builder.push_bind(path(&field));
                builder.push(" = ");
                builder.push_bind(Json(value));
            }
            Predicate::ArrayContainsAny { field, values } => {
                // `?|` only looks at string elements
                let values = values
                    .into_iter()
                    .map(|value| match value {
                        Value::String(s) => Ok(s),
                        other => Err(MeetlyError::invalid(format!(
                            "cannot match non-string array element {}",
                            other
                        ))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;

                builder.push("body #> ");
                builder.push_bind(path(&field));
                builder.push(" ?| ");
                builder.push_bind(values);
            }
        }

        Ok(())
    }

    fn map_sqlx_error(error: sqlx::Error) -> MeetlyError {
        use sqlx::Error;

        match error {
            Error::Database(ref e) if e.constraint() == Some(DOCUMENTS_PRIMARY_KEY) => {
                MeetlyError::conflict("document already exists")
            }
            Error::PoolTimedOut | Error::PoolClosed | Error::Io(_) => {
                MeetlyError::unavailable(error.to_string())
            }
            _ => MeetlyError::Sqlx { source: error },
        }
    }
}
