use crate::{
    ChosenDB, ListingParams, Pool,
    error::{Error, Result},
};
use futures::TryStreamExt as _;
use garde::Validate;
use serde::{Deserialize, Serialize};
use sqlx::Transaction;
use tracing::debug;

/// Persisted movie record
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Movie {
    /// 0 until record is inserted
    pub id: i64,
    pub title: String,
    pub genre: String,
    pub duration: i32,
}

// Input shapes keep all fields optional, so missing values are reported
// by validation (`required`) rather than by JSON deserialization.

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CreateMovie {
    #[garde(required, length(chars, min = 1), custom(not_blank))]
    pub title: Option<String>,
    #[garde(required, length(chars, min = 1, max = 50), custom(not_blank))]
    pub genre: Option<String>,
    /// Duration in minutes
    #[garde(required, range(min = 70, max = 600))]
    pub duration: Option<i32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, Validate)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct UpdateMovie {
    #[garde(required, length(chars, min = 1), custom(not_blank))]
    pub title: Option<String>,
    #[garde(required, length(chars, min = 1, max = 50), custom(not_blank))]
    pub genre: Option<String>,
    /// Duration in minutes
    #[garde(required, range(min = 70, max = 600))]
    pub duration: Option<i32>,
}

/// Whitespace only text, empty text is left to the length rule
fn not_blank(value: &Option<String>, _context: &()) -> garde::Result {
    match value {
        Some(text) if !text.is_empty() && text.trim().is_empty() => {
            Err(garde::Error::new("must not be blank"))
        }
        _ => Ok(()),
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ReadMovie {
    pub id: i64,
    pub title: String,
    pub genre: String,
    pub duration: i32,
}

// Mapping between shapes does no validation, input shapes are expected
// to be validated before they are turned into a record.

impl From<CreateMovie> for Movie {
    fn from(payload: CreateMovie) -> Self {
        Movie {
            id: 0,
            title: payload.title.unwrap_or_default(),
            genre: payload.genre.unwrap_or_default(),
            duration: payload.duration.unwrap_or_default(),
        }
    }
}

impl From<Movie> for ReadMovie {
    fn from(movie: Movie) -> Self {
        ReadMovie {
            id: movie.id,
            title: movie.title,
            genre: movie.genre,
            duration: movie.duration,
        }
    }
}

impl From<&Movie> for UpdateMovie {
    fn from(movie: &Movie) -> Self {
        UpdateMovie {
            title: Some(movie.title.clone()),
            genre: Some(movie.genre.clone()),
            duration: Some(movie.duration),
        }
    }
}

impl Movie {
    /// Overwrites all mutable fields, id stays
    pub fn merge(&mut self, payload: UpdateMovie) {
        self.title = payload.title.unwrap_or_default();
        self.genre = payload.genre.unwrap_or_default();
        self.duration = payload.duration.unwrap_or_default();
    }
}

/// Movie store, every statement runs on its own pooled connection
/// and is committed immediately.
#[derive(Clone)]
pub struct MovieRepository {
    executor: Pool,
}

impl MovieRepository {
    pub fn new(executor: Pool) -> Self {
        Self { executor }
    }

    pub async fn insert(&self, movie: &Movie) -> Result<i64> {
        let result = sqlx::query("INSERT INTO movie (title, genre, duration) VALUES (?, ?, ?)")
            .bind(&movie.title)
            .bind(&movie.genre)
            .bind(movie.duration)
            .execute(&self.executor)
            .await?;

        let id = result.last_insert_rowid();
        debug!("Inserted movie {id}");
        Ok(id)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Movie>> {
        find_by_id(id, &self.executor).await
    }

    /// Page of movies in insertion order
    pub async fn find_page(&self, params: ListingParams) -> Result<Vec<Movie>> {
        let records = sqlx::query_as::<_, Movie>(
            "SELECT id, title, genre, duration FROM movie ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(params.limit)
        .bind(params.offset)
        .fetch(&self.executor)
        .try_collect::<Vec<_>>()
        .await?;
        Ok(records)
    }

    pub async fn update(&self, movie: &Movie) -> Result<()> {
        update(movie, &self.executor).await
    }

    pub async fn delete(&self, id: i64) -> Result<()> {
        let result = sqlx::query("DELETE FROM movie WHERE id = ?")
            .bind(id)
            .execute(&self.executor)
            .await?;

        if result.rows_affected() == 0 {
            Err(Error::RecordNotFound("Movie".to_string()))
        } else {
            debug!("Deleted movie {id}");
            Ok(())
        }
    }

    /// Starts read-modify-write transaction, database write lock is taken
    /// right at the start, so concurrent writers wait for each other
    pub async fn begin_write(&self) -> Result<MovieTransaction> {
        let transaction = self.executor.begin_with("BEGIN IMMEDIATE").await?;
        Ok(MovieTransaction { transaction })
    }
}

/// Write transaction over movies.
///
/// Changes are pending until [`MovieTransaction::commit`] is called,
/// dropping the transaction rolls them back.
pub struct MovieTransaction {
    transaction: Transaction<'static, ChosenDB>,
}

impl MovieTransaction {
    pub async fn find_by_id(&mut self, id: i64) -> Result<Option<Movie>> {
        find_by_id(id, &mut *self.transaction).await
    }

    pub async fn update(&mut self, movie: &Movie) -> Result<()> {
        update(movie, &mut *self.transaction).await
    }

    pub async fn commit(self) -> Result<()> {
        self.transaction.commit().await?;
        Ok(())
    }
}

async fn find_by_id<'c, E>(id: i64, executor: E) -> Result<Option<Movie>>
where
    E: sqlx::Executor<'c, Database = ChosenDB>,
{
    let record =
        sqlx::query_as::<_, Movie>("SELECT id, title, genre, duration FROM movie WHERE id = ?")
            .bind(id)
            .fetch_optional(executor)
            .await?;
    Ok(record)
}

async fn update<'c, E>(movie: &Movie, executor: E) -> Result<()>
where
    E: sqlx::Executor<'c, Database = ChosenDB>,
{
    let result = sqlx::query("UPDATE movie SET title = ?, genre = ?, duration = ? WHERE id = ?")
        .bind(&movie.title)
        .bind(&movie.genre)
        .bind(movie.duration)
        .bind(movie.id)
        .execute(executor)
        .await?;

    if result.rows_affected() == 0 {
        Err(Error::RecordNotFound("Movie".to_string()))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(title: &str, genre: &str, duration: i32) -> CreateMovie {
        CreateMovie {
            title: Some(title.to_string()),
            genre: Some(genre.to_string()),
            duration: Some(duration),
        }
    }

    fn failed_fields(report: &garde::Report) -> Vec<String> {
        report.iter().map(|(path, _)| path.to_string()).collect()
    }

    #[test]
    fn test_valid_movie() {
        assert!(create("Dune", "SciFi", 155).validate().is_ok());
        assert!(create("Short", "Drama", 70).validate().is_ok());
        assert!(create("Long", "Drama", 600).validate().is_ok());
    }

    #[test]
    fn test_duration_bounds() {
        let report = create("Short", "Drama", 69).validate().unwrap_err();
        assert_eq!(vec!["duration"], failed_fields(&report));

        let report = create("Long", "Drama", 601).validate().unwrap_err();
        assert_eq!(vec!["duration"], failed_fields(&report));
    }

    #[test]
    fn test_genre_length() {
        let genre = "g".repeat(50);
        assert!(create("Title", &genre, 100).validate().is_ok());

        let genre = "g".repeat(51);
        let report = create("Title", &genre, 100).validate().unwrap_err();
        assert_eq!(vec!["genre"], failed_fields(&report));

        // counted in characters, not bytes
        let genre = "č".repeat(50);
        assert!(create("Title", &genre, 100).validate().is_ok());
    }

    #[test]
    fn test_all_violations_reported() {
        let report = CreateMovie::default().validate().unwrap_err();
        let mut fields = failed_fields(&report);
        fields.sort();
        assert_eq!(vec!["duration", "genre", "title"], fields);

        let report = create("", "", 10).validate().unwrap_err();
        assert_eq!(3, report.iter().count());
    }

    #[test]
    fn test_blank_text_rejected() {
        let report = create("   ", "\t", 100).validate().unwrap_err();
        let mut fields = failed_fields(&report);
        fields.sort();
        assert_eq!(vec!["genre", "title"], fields);

        let update = UpdateMovie {
            title: Some(" \n ".to_string()),
            genre: Some("Drama".to_string()),
            duration: Some(100),
        };
        let report = update.validate().unwrap_err();
        assert_eq!(vec!["title"], failed_fields(&report));

        assert!(create(" Dune ", "Sci Fi", 155).validate().is_ok());
    }

    #[test]
    fn test_missing_fields_from_json() {
        let payload: UpdateMovie =
            serde_json::from_str(r#"{"title": "Dune", "genre": null}"#).unwrap();
        let report = payload.validate().unwrap_err();
        let mut fields = failed_fields(&report);
        fields.sort();
        assert_eq!(vec!["duration", "genre"], fields);
    }

    #[test]
    fn test_mapping() {
        let mut movie = Movie::from(create("Dune", "SciFi", 155));
        assert_eq!(0, movie.id);
        movie.id = 7;

        let mut update = UpdateMovie::from(&movie);
        assert_eq!(Some("Dune"), update.title.as_deref());
        update.genre = Some("Adventure".to_string());
        movie.merge(update);

        let read = ReadMovie::from(movie);
        assert_eq!(
            ReadMovie {
                id: 7,
                title: "Dune".to_string(),
                genre: "Adventure".to_string(),
                duration: 155
            },
            read
        );
    }
}
